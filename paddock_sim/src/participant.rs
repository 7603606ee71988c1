//! ParticipantAgent - one racer's progression state machine.
//!
//! ```text
//!   Start ──StrategyResolved──▶ Racing ──TargetReached──▶ Finish
//!                                 │  ▲
//!                                 └──┘ LapCompleted
//! ```
//!
//! The agent is the only writer of its [`ParticipantRecord`]. Every wait is
//! bounded; on timeout the agent falls back (default equipment, stale rank)
//! and carries on, so a participant always reaches `Finish`.

use crate::agent::{await_payload, send_payload, Awaited};
use paddock_core::{
    EquipmentClass, LapModel, ParticipantRecord, PerformanceTraits, ProgressReport, RaceConfig, RankReply,
    StrategyAssignment,
};
use paddock_env::{AgentAddr, MessageTransport, RaceContext};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantState {
    Start,
    Racing,
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantEvent {
    /// Strategy received, malformed, or timed out
    StrategyResolved,
    LapCompleted,
    TargetReached,
}

impl ParticipantState {
    /// Transition table. `None` for events the state does not accept.
    pub fn next(self, event: ParticipantEvent) -> Option<Self> {
        use ParticipantEvent::*;
        use ParticipantState::*;

        match (self, event) {
            (Start, StrategyResolved) => Some(Racing),
            (Racing, LapCompleted) => Some(Racing),
            (Racing, TargetReached) => Some(Finish),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ParticipantState::Finish
    }
}

/// Where the participant's equipment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategySource {
    Team,

    /// No usable strategy arrived; the default class was used
    Fallback,
}

/// What a participant task hands back when it terminates.
#[derive(Debug, Clone)]
pub struct ParticipantOutcome {
    pub record: ParticipantRecord,
    pub state: ParticipantState,
    pub strategy_source: StrategySource,

    /// Laps whose rank reply never arrived (or could not be read)
    pub missed_rank_replies: u32,

    /// Whether the bus accepted the final result
    pub result_sent: bool,
}

pub struct ParticipantAgent<Ctx: RaceContext, Net: MessageTransport> {
    ctx: Arc<Ctx>,
    net: Arc<Net>,
    config: Arc<RaceConfig>,
    model: LapModel,
    rng: ChaCha8Rng,
    team: AgentAddr,

    record: ParticipantRecord,
    state: ParticipantState,
    strategy_source: StrategySource,
    missed_rank_replies: u32,
    result_sent: bool,
}

impl<Ctx: RaceContext, Net: MessageTransport> ParticipantAgent<Ctx, Net> {
    /// Creates participant `id` with traits drawn from its own RNG stream.
    pub fn new(id: u32, ctx: Arc<Ctx>, net: Arc<Net>, config: Arc<RaceConfig>) -> Self {
        let mut rng = ctx.derive_rng(id as u64);
        let traits = PerformanceTraits::draw(&mut rng, &config);

        Self {
            model: LapModel::from_config(&config),
            team: AgentAddr::Team(config.team_of(id)),
            record: ParticipantRecord::new(id, traits),
            state: ParticipantState::Start,
            strategy_source: StrategySource::Fallback,
            missed_rank_replies: 0,
            result_sent: false,
            ctx,
            net,
            config,
            rng,
        }
    }

    pub fn state(&self) -> ParticipantState {
        self.state
    }

    pub fn record(&self) -> &ParticipantRecord {
        &self.record
    }

    /// Runs the state machine to `Finish`.
    pub async fn run(mut self) -> ParticipantOutcome {
        let addr = self.net.local_addr();
        let traits = self.record.traits;
        info!(
            "{} on grid slot {} (skill {:.3}, aggression {:.3}, consistency {:.3})",
            addr, self.record.rank, traits.skill, traits.aggression, traits.consistency
        );

        loop {
            let event = match self.state {
                ParticipantState::Start => {
                    self.resolve_strategy().await;
                    ParticipantEvent::StrategyResolved
                }
                ParticipantState::Racing => self.race_lap().await,
                ParticipantState::Finish => {
                    self.report_result().await;
                    break;
                }
            };

            match self.state.next(event) {
                Some(next) => self.state = next,
                None => {
                    warn!("{}: no transition from {:?} on {:?}", addr, self.state, event);
                    break;
                }
            }
        }

        ParticipantOutcome {
            record: self.record,
            state: self.state,
            strategy_source: self.strategy_source,
            missed_rank_replies: self.missed_rank_replies,
            result_sent: self.result_sent,
        }
    }

    async fn resolve_strategy(&mut self) {
        let addr = self.net.local_addr();
        let wait = self.config.duration(self.config.timings.strategy_wait);

        match await_payload(&*self.ctx, &*self.net, wait, |_: &StrategyAssignment| true).await {
            Awaited::Received(strategy) => {
                info!("{}: team assigned {} equipment", addr, strategy.equipment_class);
                self.record.adopt_equipment(strategy.equipment_class);
                self.strategy_source = StrategySource::Team;
                return;
            }
            Awaited::Malformed(e) => warn!("{}: unreadable strategy: {}", addr, e),
            Awaited::TimedOut => info!("{}: no strategy within {:?}", addr, wait),
            Awaited::Closed => warn!("{}: inbox closed while waiting for strategy", addr),
        }

        let fallback = EquipmentClass::default();
        info!("{}: falling back to {} equipment", addr, fallback);
        self.record.adopt_equipment(fallback);
        self.strategy_source = StrategySource::Fallback;
    }

    async fn race_lap(&mut self) -> ParticipantEvent {
        if self.record.has_finished(self.config.num_laps) {
            return ParticipantEvent::TargetReached;
        }

        let equipment = self.record.equipment;
        let wear = self.record.wear;
        let duration = self.model.simulate_lap(&mut self.rng, equipment, wear, &self.record.traits);
        let new_wear = self.model.next_wear(equipment, wear, &self.record.traits);
        let report = self.record.complete_lap(duration, new_wear);

        self.exchange_progress(report).await;

        if self.config.telemetry_interval > 0 && report.lap % self.config.telemetry_interval == 0 {
            let sample = self.record.telemetry_sample();
            send_payload(&*self.net, self.team, &sample).await;
        }

        debug!(
            "{}: lap {}/{} in {:.3}s (total {:.3}s, wear {:.3}, P{})",
            self.net.local_addr(),
            report.lap,
            self.config.num_laps,
            duration,
            self.record.elapsed_time,
            self.record.wear,
            self.record.rank
        );

        self.ctx.sleep(self.config.duration(self.config.timings.lap_pacing)).await;
        ParticipantEvent::LapCompleted
    }

    /// Sends the lap's progress and applies the coordinator's answer.
    ///
    /// No reply in time keeps the previous rank; there is no retry.
    async fn exchange_progress(&mut self, report: ProgressReport) {
        let addr = self.net.local_addr();

        if !send_payload(&*self.net, AgentAddr::Coordinator, &report).await {
            self.missed_rank_replies += 1;
            return;
        }

        let wait = self.config.duration(self.config.timings.rank_reply_wait);
        let lap = report.lap;

        match await_payload(&*self.ctx, &*self.net, wait, |reply: &RankReply| reply.lap == lap).await {
            Awaited::Received(reply) => {
                if self.record.apply_rank(reply.rank) {
                    debug!("{}: overtake on lap {}, now P{}", addr, lap, reply.rank);
                }
            }
            Awaited::Malformed(e) => {
                warn!("{}: unreadable rank reply for lap {}: {}", addr, lap, e);
                self.missed_rank_replies += 1;
            }
            Awaited::TimedOut | Awaited::Closed => {
                debug!("{}: no rank reply for lap {}, keeping P{}", addr, lap, self.record.rank);
                self.missed_rank_replies += 1;
            }
        }
    }

    async fn report_result(&mut self) {
        let result = self.record.result_report();
        self.result_sent = send_payload(&*self.net, AgentAddr::Coordinator, &result).await;

        info!(
            "{} finished: {:.3}s on {}, {} overtakes, self-reported P{}",
            self.net.local_addr(),
            result.elapsed_time,
            result.equipment_class,
            result.overtakes,
            result.final_rank
        );
    }
}
