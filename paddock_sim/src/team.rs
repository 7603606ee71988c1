//! TeamAgent - one-shot strategy dispatch plus a passive telemetry watch.
//!
//! A team has no say over ranking. It tells its roster which equipment to
//! run, then only listens.

use crate::agent::send_payload;
use paddock_core::{EquipmentClass, Payload, RaceConfig, StrategyAssignment, TelemetrySample};
use paddock_env::{AgentAddr, EnvError, Envelope, MessageKind, MessageTransport, RaceContext};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What a team task hands back on shutdown.
#[derive(Debug, Clone, Serialize)]
pub struct TeamReport {
    pub team_id: u32,
    pub equipment_class: EquipmentClass,
    pub roster: Vec<u32>,

    /// Roster members the bus accepted a strategy for
    pub strategies_sent: usize,

    /// Telemetry in arrival order
    pub telemetry: Vec<TelemetrySample>,

    /// Samples above the wear alert threshold
    pub wear_alerts: usize,
}

pub struct TeamAgent<Ctx: RaceContext, Net: MessageTransport> {
    team_id: u32,
    ctx: Arc<Ctx>,
    net: Arc<Net>,
    config: Arc<RaceConfig>,
    equipment_class: EquipmentClass,
    roster: Vec<u32>,
    telemetry: Vec<TelemetrySample>,
    wear_alerts: usize,
}

impl<Ctx: RaceContext, Net: MessageTransport> TeamAgent<Ctx, Net> {
    pub fn new(team_id: u32, ctx: Arc<Ctx>, net: Arc<Net>, config: Arc<RaceConfig>) -> Self {
        Self {
            team_id,
            equipment_class: EquipmentClass::for_team(team_id),
            roster: config.roster(team_id),
            telemetry: Vec::new(),
            wear_alerts: 0,
            ctx,
            net,
            config,
        }
    }

    pub fn equipment_class(&self) -> EquipmentClass {
        self.equipment_class
    }

    pub fn roster(&self) -> &[u32] {
        &self.roster
    }

    /// Runs dispatch and the telemetry watch side by side until `shutdown`
    /// flips to true (or its sender is dropped).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> TeamReport {
        info!(
            "team_{} running {} for participants {:?}",
            self.team_id, self.equipment_class, self.roster
        );

        let dispatch = dispatch_strategy(
            self.ctx.clone(),
            self.net.clone(),
            self.config.clone(),
            self.equipment_class,
            self.roster.clone(),
        );
        let (strategies_sent, ()) = tokio::join!(dispatch, self.watch_telemetry(&mut shutdown));

        info!(
            "team_{} done: {} samples, {} wear alerts",
            self.team_id,
            self.telemetry.len(),
            self.wear_alerts
        );

        TeamReport {
            team_id: self.team_id,
            equipment_class: self.equipment_class,
            roster: self.roster,
            strategies_sent,
            telemetry: self.telemetry,
            wear_alerts: self.wear_alerts,
        }
    }

    async fn watch_telemetry(&mut self, shutdown: &mut watch::Receiver<bool>) {
        let poll = self.config.duration(self.config.timings.receive_poll);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = self.net.recv_timeout(poll) => match received {
                    Ok(envelope) => self.handle_envelope(&envelope),
                    Err(EnvError::Timeout(_)) => {}
                    Err(e) => {
                        warn!("team_{}: inbox failed: {}", self.team_id, e);
                        break;
                    }
                },
            }
        }
    }

    /// Records a telemetry sample. Anything else is logged and dropped.
    pub fn handle_envelope(&mut self, envelope: &Envelope) {
        if envelope.kind != MessageKind::Telemetry {
            debug!("team_{}: ignoring {} from {}", self.team_id, envelope.kind, envelope.from);
            return;
        }

        let sample = match TelemetrySample::decode(envelope) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("team_{}: unreadable telemetry from {}: {}", self.team_id, envelope.from, e);
                return;
            }
        };

        if sample.wear > self.config.wear_alert_threshold {
            self.wear_alerts += 1;
            warn!(
                "team_{}: participant_{} wear at {:.1}% on lap {}",
                self.team_id,
                sample.id,
                sample.wear * 100.0,
                sample.lap
            );
        } else {
            debug!(
                "team_{}: participant_{} lap {} P{} wear {:.3} pace {:.3}",
                self.team_id, sample.id, sample.lap, sample.rank, sample.wear, sample.recent_avg_lap_time
            );
        }
        self.telemetry.push(sample);
    }

    pub fn telemetry(&self) -> &[TelemetrySample] {
        &self.telemetry
    }
}

/// Waits for participants to come up, then sends each one the strategy.
async fn dispatch_strategy<Ctx: RaceContext, Net: MessageTransport>(
    ctx: Arc<Ctx>,
    net: Arc<Net>,
    config: Arc<RaceConfig>,
    equipment_class: EquipmentClass,
    roster: Vec<u32>,
) -> usize {
    ctx.sleep(config.duration(config.timings.settle_delay)).await;

    let strategy = StrategyAssignment::new(equipment_class);
    let pacing = config.duration(config.timings.dispatch_pacing);
    let mut sent = 0;

    for (i, id) in roster.iter().enumerate() {
        if i > 0 {
            ctx.sleep(pacing).await;
        }
        if send_payload(&*net, AgentAddr::Participant(*id), &strategy).await {
            debug!("{}: sent {} strategy to participant_{}", net.local_addr(), equipment_class, id);
            sent += 1;
        }
    }
    sent
}
