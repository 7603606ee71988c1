//! Fault-injection scenarios.
//!
//! Each scenario disturbs the bus in a way one of the agents' timeout
//! fallbacks has to absorb. The race must still complete.

use paddock_core::RaceConfig;
use paddock_env::{AgentAddr, TransportController};

/// Loss rate on coordinator → participant links in `FlakyRanks`.
pub const FLAKY_RANK_LOSS: f64 = 0.5;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// No faults
    Nominal,

    /// Teams cannot reach participants; everyone races on default equipment
    StrategyBlackout,

    /// No rank reply ever arrives; participants keep their grid slots
    RankBlackout,

    /// Half of all rank replies are lost
    FlakyRanks,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Nominal,
            ScenarioId::StrategyBlackout,
            ScenarioId::RankBlackout,
            ScenarioId::FlakyRanks,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Nominal => "nominal",
            ScenarioId::StrategyBlackout => "strategy_blackout",
            ScenarioId::RankBlackout => "rank_blackout",
            ScenarioId::FlakyRanks => "flaky_ranks",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Nominal => "Clean bus, every message delivered",
            ScenarioId::StrategyBlackout => "Teams partitioned from participants, strategy wait times out",
            ScenarioId::RankBlackout => "Coordinator to participant links dead, every rank wait times out",
            ScenarioId::FlakyRanks => "50% loss on coordinator to participant links",
        }
    }

    /// Applies this scenario's faults to a bus before launch.
    pub fn inject_faults(&self, controller: &dyn TransportController, config: &RaceConfig) {
        let participants: Vec<AgentAddr> = (0..config.num_participants).map(AgentAddr::Participant).collect();

        match self {
            ScenarioId::Nominal => {}
            ScenarioId::StrategyBlackout => {
                let teams: Vec<AgentAddr> = (0..config.num_teams()).map(AgentAddr::Team).collect();
                controller.partition(&teams, &participants);
            }
            ScenarioId::RankBlackout => {
                // Directed, so progress and results still reach the coordinator
                for p in &participants {
                    controller.set_link_loss(AgentAddr::Coordinator, *p, 1.0);
                }
            }
            ScenarioId::FlakyRanks => {
                for p in &participants {
                    controller.set_link_loss(AgentAddr::Coordinator, *p, FLAKY_RANK_LOSS);
                }
            }
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nominal" => Ok(ScenarioId::Nominal),
            "strategy_blackout" | "strategyblackout" => Ok(ScenarioId::StrategyBlackout),
            "rank_blackout" | "rankblackout" => Ok(ScenarioId::RankBlackout),
            "flaky_ranks" | "flakyranks" => Ok(ScenarioId::FlakyRanks),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
