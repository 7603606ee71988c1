//! RaceWorld - wires agents onto the bus and runs a race to completion.

use crate::bus::{BusController, BusStats, MessageBus};
use crate::coordinator::{CoordinatorAgent, CoordinatorHandle};
use crate::error::SimError;
use crate::participant::{ParticipantAgent, ParticipantOutcome};
use crate::team::{TeamAgent, TeamReport};

use paddock_core::{CoordinatorLedger, FinalStanding, RaceAnalysis, RaceConfig, RaceProgress};
use paddock_env::{AgentAddr, RaceContext, TokioContext};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// RNG stream reserved for bus loss decisions (participants use their ids).
const BUS_RNG_STREAM: u64 = u64::MAX;

/// Everything a finished race produced.
#[derive(Debug, Clone)]
pub struct RaceOutcome {
    pub progress: RaceProgress,

    /// Final positions by elapsed time
    pub leaderboard: Vec<FinalStanding>,

    pub analysis: RaceAnalysis,

    /// Participant outcomes ordered by id
    pub participants: Vec<ParticipantOutcome>,

    /// Each team's telemetry history, ordered by team id
    pub telemetry: Vec<TeamReport>,

    pub bus: BusStats,

    /// Wall-clock start of the race
    pub started_at: SystemTime,

    /// Race clock at completion
    pub race_time: Duration,
}

impl RaceOutcome {
    pub fn is_complete(&self) -> bool {
        self.progress.complete
    }
}

/// Live tasks of a launched race.
pub struct RaceHandles {
    pub coordinator: CoordinatorHandle,
    coordinator_task: JoinHandle<CoordinatorLedger>,
    participant_tasks: Vec<JoinHandle<ParticipantOutcome>>,
    team_tasks: Vec<JoinHandle<TeamReport>>,
    shutdown: watch::Sender<bool>,
}

/// The race container: configuration, context and bus.
pub struct RaceWorld<Ctx: RaceContext> {
    config: Arc<RaceConfig>,
    ctx: Arc<Ctx>,
    bus: MessageBus,
}

impl RaceWorld<TokioContext> {
    /// Creates a world on the tokio clock, seeded from the config.
    pub fn new(config: RaceConfig) -> Result<Self, SimError> {
        let ctx = TokioContext::shared(config.seed);
        Self::with_context(config, ctx)
    }
}

impl<Ctx: RaceContext> RaceWorld<Ctx> {
    /// Validates the configuration and builds an empty bus.
    pub fn with_context(config: RaceConfig, ctx: Arc<Ctx>) -> Result<Self, SimError> {
        config.validate()?;
        let bus = MessageBus::new(ctx.derive_rng(BUS_RNG_STREAM));

        Ok(Self {
            config: Arc::new(config),
            ctx,
            bus,
        })
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Fault injection; apply before `launch`/`run`.
    pub fn controller(&self) -> &BusController {
        self.bus.controller()
    }

    pub fn participant_addrs(&self) -> Vec<AgentAddr> {
        (0..self.config.num_participants).map(AgentAddr::Participant).collect()
    }

    pub fn team_addrs(&self) -> Vec<AgentAddr> {
        (0..self.config.num_teams()).map(AgentAddr::Team).collect()
    }

    /// Registers every inbox, then spawns coordinator, participants and teams.
    ///
    /// All inboxes exist before any agent starts, so no early send can hit
    /// an unregistered address.
    pub fn launch(&self) -> RaceHandles {
        let coordinator_net = Arc::new(self.bus.register(AgentAddr::Coordinator));
        let participant_nets: Vec<_> = self
            .participant_addrs()
            .into_iter()
            .map(|addr| (addr, Arc::new(self.bus.register(addr))))
            .collect();
        let team_nets: Vec<_> = self
            .team_addrs()
            .into_iter()
            .map(|addr| (addr, Arc::new(self.bus.register(addr))))
            .collect();

        let (shutdown, shutdown_rx) = watch::channel(false);

        let (coordinator, coordinator_handle) = CoordinatorAgent::new(coordinator_net, &self.config);
        let coordinator_task = self
            .ctx
            .spawn("coordinator", coordinator.run(shutdown_rx.clone()));

        let participant_tasks = participant_nets
            .into_iter()
            .enumerate()
            .map(|(id, (addr, net))| {
                let agent = ParticipantAgent::new(id as u32, self.ctx.clone(), net, self.config.clone());
                self.ctx.spawn(&addr.to_string(), agent.run())
            })
            .collect();

        let team_tasks = team_nets
            .into_iter()
            .enumerate()
            .map(|(team_id, (addr, net))| {
                let agent = TeamAgent::new(team_id as u32, self.ctx.clone(), net, self.config.clone());
                self.ctx.spawn(&addr.to_string(), agent.run(shutdown_rx.clone()))
            })
            .collect();

        info!(
            "race launched: {} participants, {} teams, {} laps (seed={})",
            self.config.num_participants,
            self.config.num_teams(),
            self.config.num_laps,
            self.ctx.seed()
        );

        RaceHandles {
            coordinator: coordinator_handle,
            coordinator_task,
            participant_tasks,
            team_tasks,
            shutdown,
        }
    }

    /// Launches a race and waits for completion, giving up after `deadline`.
    ///
    /// Every agent is shut down and joined before this returns.
    pub async fn run(&self, deadline: Option<Duration>) -> Result<RaceOutcome, SimError> {
        let started_at = self.ctx.system_time();
        let started = self.ctx.now();
        let mut race = self.launch();

        let progress = match deadline {
            Some(limit) => tokio::time::timeout(limit, race.coordinator.wait_for_completion())
                .await
                .unwrap_or_else(|_| race.coordinator.progress()),
            None => race.coordinator.wait_for_completion().await,
        };
        let race_time = self.ctx.now().saturating_sub(started);

        race.shutdown.send_replace(true);

        if !progress.complete {
            warn!(
                "race abandoned after {:?}: {}/{} results",
                race_time, progress.finished, progress.expected
            );
            for task in &race.participant_tasks {
                task.abort();
            }
            join("coordinator", race.coordinator_task).await?;
            for (id, task) in race.team_tasks.into_iter().enumerate() {
                join_logged(&format!("team_{}", id), task).await;
            }
            return Err(SimError::Incomplete {
                finished: progress.finished,
                expected: progress.expected,
            });
        }

        let ledger = join("coordinator", race.coordinator_task).await?;

        let mut participants = Vec::with_capacity(race.participant_tasks.len());
        for (id, task) in race.participant_tasks.into_iter().enumerate() {
            participants.push(join(&format!("participant_{}", id), task).await?);
        }

        let mut telemetry = Vec::with_capacity(race.team_tasks.len());
        for (id, task) in race.team_tasks.into_iter().enumerate() {
            telemetry.push(join(&format!("team_{}", id), task).await?);
        }

        let leaderboard = ledger.leaderboard();
        info!(
            "race complete after {:?}: {} results, winner participant_{}",
            race_time,
            progress.finished,
            leaderboard.first().map(|s| s.record.id()).unwrap_or_default()
        );

        Ok(RaceOutcome {
            progress,
            analysis: RaceAnalysis::from_leaderboard(&leaderboard),
            leaderboard,
            participants,
            telemetry,
            bus: self.bus.stats(),
            started_at,
            race_time,
        })
    }
}

async fn join<T>(name: &str, task: JoinHandle<T>) -> Result<T, SimError> {
    task.await.map_err(|e| SimError::AgentPanicked {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Joins a task on a path that is already failing; errors are logged only.
async fn join_logged<T>(name: &str, task: JoinHandle<T>) -> Option<T> {
    match join(name, task).await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::StrategySource;
    use paddock_core::{ConfigError, EquipmentClass, RankSource};
    use paddock_env::TransportController;

    fn config(seed: u64) -> RaceConfig {
        RaceConfig {
            seed,
            num_participants: 5,
            num_laps: 6,
            team_size: 2,
            telemetry_interval: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = RaceConfig {
            num_participants: 0,
            ..Default::default()
        };
        assert!(matches!(
            RaceWorld::new(bad),
            Err(SimError::Config(ConfigError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_addresses() {
        let world = RaceWorld::new(config(1)).unwrap();
        assert_eq!(world.participant_addrs().len(), 5);
        assert_eq!(
            world.team_addrs(),
            vec![AgentAddr::Team(0), AgentAddr::Team(1), AgentAddr::Team(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_nominal_race_completes() {
        let world = RaceWorld::new(config(42)).unwrap();
        let outcome = world.run(None).await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.progress.finished, 5);

        // Leaderboard is a permutation ordered by time
        let positions: Vec<u32> = outcome.leaderboard.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
        let mut ids: Vec<u32> = outcome.leaderboard.iter().map(|s| s.record.id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        for pair in outcome.leaderboard.windows(2) {
            assert!(pair[0].record.elapsed_time() <= pair[1].record.elapsed_time());
        }
        assert!(outcome
            .leaderboard
            .iter()
            .all(|s| s.record.rank_source == RankSource::Coordinator));

        for p in &outcome.participants {
            assert_eq!(p.record.current_lap, 6);
            assert_eq!(p.strategy_source, StrategySource::Team);
            assert_eq!(p.record.equipment, EquipmentClass::for_team(p.record.id / 2));
            assert_eq!(p.missed_rank_replies, 0);
        }

        // Three samples per participant (laps 2, 4, 6), routed to the right team
        assert_eq!(outcome.telemetry.len(), 3);
        assert_eq!(outcome.telemetry[0].telemetry.len(), 6);
        assert_eq!(outcome.telemetry[2].telemetry.len(), 3);
        assert!(outcome.telemetry[2].telemetry.iter().all(|s| s.id == 4));

        assert_eq!(outcome.bus.dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_seed_same_result() {
        let a = RaceWorld::new(config(7)).unwrap().run(None).await.unwrap();
        let b = RaceWorld::new(config(7)).unwrap().run(None).await.unwrap();

        let times = |o: &RaceOutcome| -> Vec<(u32, f64)> {
            o.leaderboard
                .iter()
                .map(|s| (s.record.id(), s.record.elapsed_time()))
                .collect()
        };
        assert_eq!(times(&a), times(&b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_race() {
        let world = RaceWorld::new(config(3)).unwrap();

        // Results can never reach the coordinator
        for addr in world.participant_addrs() {
            world.controller().set_link_loss(addr, AgentAddr::Coordinator, 1.0);
        }

        let err = world.run(Some(Duration::from_secs(120))).await.unwrap_err();
        assert!(matches!(err, SimError::Incomplete { finished: 0, expected: 5 }));
    }

    #[tokio::test]
    async fn test_join_logged_swallows_panicked_task() {
        let crashed: JoinHandle<u32> = tokio::spawn(async { panic!("team crashed") });
        assert_eq!(join_logged("team_0", crashed).await, None);

        let fine = tokio::spawn(async { 7u32 });
        assert_eq!(join_logged("team_1", fine).await, Some(7));
    }

    #[tokio::test]
    async fn test_join_names_the_panicked_agent() {
        let crashed: JoinHandle<()> = tokio::spawn(async { panic!("boom") });
        match join("team_2", crashed).await {
            Err(SimError::AgentPanicked { name, .. }) => assert_eq!(name, "team_2"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
