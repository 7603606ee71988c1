//! Paddock Core - Race Coordination Protocol
//!
//! Pure domain logic for a race run by autonomous agents:
//! 1. **Lap model**: traits, equipment classes, lap time and wear
//! 2. **Message contracts**: typed payloads exchanged over the bus
//! 3. **Ranking authority**: full-recompute ranking table, result book,
//!    completion detection and the final leaderboard
//!
//! Nothing here performs I/O or logs; the agents in `paddock_sim` own the
//! state defined here and decide what to report.

pub mod analysis;
pub mod config;
pub mod equipment;
pub mod error;
pub mod lap_model;
pub mod ledger;
pub mod messages;
pub mod participant;
pub mod ranking;
pub mod results;
pub mod stats;

// Re-export key types for convenience
pub use analysis::{ClassSummary, Correlations, RaceAnalysis};
pub use config::{RaceConfig, RaceTimings};
pub use equipment::{EquipmentClass, EquipmentProfile};
pub use error::{ConfigError, ProtocolError};
pub use lap_model::{LapModel, PerformanceTraits};
pub use ledger::{CoordinatorLedger, RaceProgress};
pub use messages::{Payload, ProgressReport, RankReply, ResultReport, StrategyAssignment, TelemetrySample};
pub use participant::{LapRecord, ParticipantRecord};
pub use ranking::{RankingTable, TableEntry};
pub use results::{FinalStanding, RankSource, RecordOutcome, ResultBook, ResultRecord};
