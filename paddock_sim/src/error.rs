//! Orchestration errors.
//!
//! Nothing inside the agents is fatal; these only describe why a whole race
//! could not produce an outcome.

use paddock_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid race configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Race incomplete: {finished}/{expected} results before the deadline")]
    Incomplete { finished: usize, expected: u32 },

    #[error("Agent {name} did not finish: {reason}")]
    AgentPanicked { name: String, reason: String },
}
