//! Paddock race simulation
//!
//! Runs a race as a set of concurrent agents talking over an in-process
//! message bus:
//! - **Participants** race their laps and report to the coordinator
//! - **Teams** hand out equipment and watch telemetry
//! - **Coordinator** owns the ranking table and detects completion
//!
//! # Architecture
//!
//! ```text
//!          strategy                     progress_report
//!   Team ────────────▶ Participant i ──────────────────▶ Coordinator
//!        ◀────────────  (FSM task)   ◀──────────────────      ▲
//!          telemetry         │            rank_reply          │
//!                            └────────── result_report ───────┘
//!
//!   every envelope passes through the MessageBus (partitions, link loss)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use paddock_core::RaceConfig;
//! use paddock_sim::RaceWorld;
//!
//! let world = RaceWorld::new(RaceConfig::default())?;
//! let outcome = world.run(None).await?;
//! println!("winner: {}", outcome.leaderboard[0].record.id());
//! ```

pub mod agent;
pub mod bus;
pub mod coordinator;
pub mod error;
pub mod participant;
pub mod runner;
pub mod scenarios;
pub mod team;
pub mod world;

pub use bus::{BusController, BusEndpoint, BusStats, MessageBus};
pub use coordinator::{CoordinatorAgent, CoordinatorHandle};
pub use error::SimError;
pub use participant::{ParticipantAgent, ParticipantEvent, ParticipantOutcome, ParticipantState, StrategySource};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use team::{TeamAgent, TeamReport};
pub use world::{RaceHandles, RaceOutcome, RaceWorld};
