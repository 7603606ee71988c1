//! Paddock Environment Abstraction Layer
//!
//! This crate provides the seam between the race agents and the world they
//! run in. Agents never touch the clock, the RNG or the message bus directly;
//! they go through:
//! - [`RaceContext`]: time (`now()`, `sleep()`), task spawning and seeded randomness
//! - [`MessageTransport`]: addressed send, receive, and receive-with-timeout
//! - [`TransportController`]: fault injection (partitions, link loss)
//!
//! By deriving all entropy from a single 64-bit seed, a race can be replayed
//! from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use paddock_env::{AgentAddr, MessageTransport, RaceContext};
//!
//! async fn wait_for_strategy<Ctx: RaceContext, Net: MessageTransport>(
//!     ctx: &Ctx,
//!     net: &Net,
//! ) {
//!     match net.recv_timeout(Duration::from_secs(15)).await {
//!         Ok(envelope) => adopt(envelope),
//!         Err(_) => fall_back_to_default(),
//!     }
//! }
//! ```

mod context;
mod transport;
mod types;
mod error;
mod tokio_impl;

pub use context::RaceContext;
pub use transport::{MessageTransport, TransportController};
pub use types::{AgentAddr, Envelope, MessageKind};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
