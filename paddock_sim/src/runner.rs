//! Scenario runner - runs a race under a scenario's faults and checks it.

use crate::participant::StrategySource;
use crate::scenarios::ScenarioId;
use crate::world::{RaceOutcome, RaceWorld};

use paddock_core::{EquipmentClass, RaceConfig};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,

    /// The race itself, when it completed
    pub outcome: Option<RaceOutcome>,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub envelopes_sent: u64,
    pub envelopes_dropped: u64,
    pub missed_rank_replies: u64,
    pub strategy_fallbacks: usize,
    pub total_overtakes: u64,
    pub wear_alerts: usize,
    pub race_time_secs: f64,
}

impl ScenarioMetrics {
    fn from_outcome(outcome: &RaceOutcome) -> Self {
        Self {
            envelopes_sent: outcome.bus.sent,
            envelopes_dropped: outcome.bus.dropped,
            missed_rank_replies: outcome
                .participants
                .iter()
                .map(|p| p.missed_rank_replies as u64)
                .sum(),
            strategy_fallbacks: outcome
                .participants
                .iter()
                .filter(|p| p.strategy_source == StrategySource::Fallback)
                .count(),
            total_overtakes: outcome
                .participants
                .iter()
                .map(|p| p.record.overtake_count as u64)
                .sum(),
            wear_alerts: outcome.telemetry.iter().map(|t| t.wear_alerts).sum(),
            race_time_secs: outcome.race_time.as_secs_f64(),
        }
    }
}

/// Runs fault-injection scenarios against one race configuration.
pub struct ScenarioRunner {
    config: RaceConfig,

    /// Give-up time for a single race
    deadline: Option<Duration>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(config: RaceConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    /// Sets the orchestrator deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        let seed = self.config.seed;
        info!("Starting scenario: {} (seed={})", scenario.name(), seed);
        info!("  {}", scenario.description());

        let world = match RaceWorld::new(self.config.clone()) {
            Ok(world) => world,
            Err(e) => return ScenarioResult::failed(scenario, seed, e.to_string()),
        };
        scenario.inject_faults(world.controller(), world.config());

        let outcome = match world.run(self.deadline).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("  {} did not produce an outcome: {}", scenario.name(), e);
                return ScenarioResult::failed(scenario, seed, e.to_string());
            }
        };

        let metrics = ScenarioMetrics::from_outcome(&outcome);
        info!(
            "  {} envelopes ({} dropped), {} missed rank replies, {} strategy fallbacks",
            metrics.envelopes_sent, metrics.envelopes_dropped, metrics.missed_rank_replies, metrics.strategy_fallbacks
        );

        let verdict = check_race(world.config(), &outcome).and_then(|()| check_scenario(scenario, &outcome));
        ScenarioResult {
            scenario,
            seed,
            passed: verdict.is_ok(),
            failure_reason: verdict.err(),
            metrics,
            outcome: Some(outcome),
        }
    }
}

impl ScenarioResult {
    fn failed(scenario: ScenarioId, seed: u64, reason: String) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
            outcome: None,
        }
    }
}

/// Checks that hold for every scenario.
fn check_race(config: &RaceConfig, outcome: &RaceOutcome) -> Result<(), String> {
    if !outcome.is_complete() {
        return Err(format!(
            "race incomplete: {}/{}",
            outcome.progress.finished, outcome.progress.expected
        ));
    }

    let n = config.num_participants as usize;
    if outcome.leaderboard.len() != n {
        return Err(format!("leaderboard has {} rows, expected {}", outcome.leaderboard.len(), n));
    }

    let ids: HashSet<u32> = outcome.leaderboard.iter().map(|s| s.record.id()).collect();
    if ids.len() != n || ids.iter().any(|id| *id >= config.num_participants) {
        return Err("leaderboard ids are not a permutation of the field".to_string());
    }

    for (i, row) in outcome.leaderboard.iter().enumerate() {
        if row.position != i as u32 + 1 {
            return Err(format!("row {} has position {}", i, row.position));
        }
    }

    if let Some(pair) = outcome
        .leaderboard
        .windows(2)
        .find(|pair| pair[0].record.elapsed_time() > pair[1].record.elapsed_time())
    {
        return Err(format!(
            "P{} ({:.3}s) ahead of P{} ({:.3}s) out of time order",
            pair[0].position,
            pair[0].record.elapsed_time(),
            pair[1].position,
            pair[1].record.elapsed_time()
        ));
    }

    if let Some(p) = outcome
        .participants
        .iter()
        .find(|p| p.record.current_lap != config.num_laps)
    {
        return Err(format!(
            "participant_{} stopped at lap {}/{}",
            p.record.id, p.record.current_lap, config.num_laps
        ));
    }

    Ok(())
}

/// The fallback each scenario is meant to exercise.
fn check_scenario(scenario: ScenarioId, outcome: &RaceOutcome) -> Result<(), String> {
    match scenario {
        ScenarioId::Nominal => {
            if let Some(p) = outcome
                .participants
                .iter()
                .find(|p| p.strategy_source != StrategySource::Team)
            {
                return Err(format!("participant_{} never received its strategy", p.record.id));
            }
        }
        ScenarioId::StrategyBlackout => {
            if let Some(p) = outcome
                .participants
                .iter()
                .find(|p| p.strategy_source != StrategySource::Fallback || p.record.equipment != EquipmentClass::default())
            {
                return Err(format!(
                    "participant_{} raced on {} despite the blackout",
                    p.record.id, p.record.equipment
                ));
            }
        }
        ScenarioId::RankBlackout => {
            if let Some(p) = outcome
                .participants
                .iter()
                .find(|p| p.missed_rank_replies != p.record.current_lap || p.record.overtake_count > 0)
            {
                return Err(format!(
                    "participant_{} saw a rank reply during the blackout",
                    p.record.id
                ));
            }
        }
        ScenarioId::FlakyRanks => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(seed: u64) -> ScenarioRunner {
        ScenarioRunner::new(RaceConfig {
            seed,
            num_participants: 4,
            num_laps: 5,
            ..Default::default()
        })
        .with_deadline(Duration::from_secs(600))
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_scenario_passes() {
        let runner = runner(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario).await;
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
            assert!(result.outcome.is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blackout_metrics() {
        let runner = runner(9);

        let strategy = runner.run(ScenarioId::StrategyBlackout).await;
        assert_eq!(strategy.metrics.strategy_fallbacks, 4);

        let ranks = runner.run(ScenarioId::RankBlackout).await;
        assert_eq!(ranks.metrics.missed_rank_replies, 20);
        assert_eq!(ranks.metrics.total_overtakes, 0);
        assert!(ranks.metrics.envelopes_dropped >= 20);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_scenario() {
        let runner = ScenarioRunner::new(RaceConfig {
            num_laps: 0,
            ..Default::default()
        });
        let result = runner.run(ScenarioId::Nominal).await;

        assert!(!result.passed);
        assert!(result.outcome.is_none());
        assert!(result.failure_reason.unwrap().contains("num_laps"));
    }
}
