//! Message transport abstraction for Paddock agents.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{AgentAddr, Envelope, MessageKind};
use std::time::Duration;

/// Abstraction for message I/O between race agents.
///
/// # Envelope Flow
///
/// ```text
/// Participant                  Bus                     Coordinator
///   |                           |                          |
///   |-- send(coord, report) --->|                          |
///   |                           |-- [partition/loss] ----->|
///   |                           |                          |-- recv() -> envelope
/// ```
#[async_trait]
pub trait MessageTransport: Send + Sync + 'static {
    /// Sends a payload of the given kind to a target agent.
    ///
    /// # Returns
    /// * `Ok(())` - Envelope accepted by the bus
    /// * `Err(EnvError::NodeUnreachable)` - Target not registered
    /// * `Err(EnvError::NetworkError)` - Immediate send failure (e.g., inbox closed)
    ///
    /// # Note
    /// Success does not guarantee delivery - envelopes may be dropped by
    /// injected faults.
    async fn send(&self, target: AgentAddr, kind: MessageKind, payload: Vec<u8>) -> Result<(), EnvError>;

    /// Receives the next envelope addressed to this agent.
    ///
    /// Returns `None` once the inbox is closed.
    async fn recv(&self) -> Option<Envelope>;

    /// Waits for the next envelope, giving up after `timeout`.
    ///
    /// A timeout is an expected outcome: callers branch to their fallback
    /// on `EnvError::Timeout`.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Envelope, EnvError> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(Some(envelope)) => Ok(envelope),
            Ok(None) => Err(EnvError::ChannelClosed),
            Err(_) => Err(EnvError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Returns this agent's address.
    fn local_addr(&self) -> AgentAddr;
}

/// Fault injection on the bus.
///
/// Used to exercise the agents' timeout fallbacks.
pub trait TransportController: Send + Sync {
    /// Creates a partition between two address sets.
    fn partition(&self, group_a: &[AgentAddr], group_b: &[AgentAddr]);

    /// Heals all partitions.
    fn heal_all(&self);

    /// Sets the loss probability for a directed link (0.0 - 1.0).
    fn set_link_loss(&self, from: AgentAddr, to: AgentAddr, loss_rate: f64);
}
