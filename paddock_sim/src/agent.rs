//! Plumbing shared by every race agent.
//!
//! Agents speak typed [`Payload`]s; these helpers do the encode/send and the
//! "wait for one kind of message or fall back" dance on top of a
//! [`MessageTransport`].

use paddock_core::{Payload, ProtocolError};
use paddock_env::{AgentAddr, EnvError, MessageTransport, RaceContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of waiting for a specific payload.
#[derive(Debug)]
pub enum Awaited<P> {
    /// An acceptable payload arrived in time
    Received(P),

    /// A message of the right kind arrived but did not decode
    Malformed(ProtocolError),

    /// The wait elapsed
    TimedOut,

    /// The inbox is gone
    Closed,
}

/// Encodes and sends a payload.
pub async fn try_send_payload<Net, P>(net: &Net, to: AgentAddr, payload: &P) -> Result<(), EnvError>
where
    Net: MessageTransport,
    P: Payload,
{
    let bytes = payload
        .encode()
        .map_err(|e| EnvError::serialization(format!("{}: {}", P::KIND, e)))?;
    net.send(to, P::KIND, bytes).await
}

/// Encodes and sends a payload. Failures are logged, never raised.
///
/// Returns whether the bus accepted the envelope.
pub async fn send_payload<Net, P>(net: &Net, to: AgentAddr, payload: &P) -> bool
where
    Net: MessageTransport,
    P: Payload,
{
    match try_send_payload(net, to, payload).await {
        Ok(()) => true,
        Err(e) => {
            warn!("{}: failed to send {} to {}: {}", net.local_addr(), P::KIND, to, e);
            false
        }
    }
}

/// Waits up to `wait` for a payload of type `P` that passes `accept`.
///
/// Messages of other kinds, and payloads `accept` rejects, are skipped while
/// the deadline keeps running.
pub async fn await_payload<Ctx, Net, P>(
    ctx: &Ctx,
    net: &Net,
    wait: Duration,
    accept: impl Fn(&P) -> bool,
) -> Awaited<P>
where
    Ctx: RaceContext,
    Net: MessageTransport,
    P: Payload,
{
    let deadline = ctx.now() + wait;

    loop {
        let remaining = deadline.saturating_sub(ctx.now());
        if remaining.is_zero() {
            return Awaited::TimedOut;
        }

        let envelope = match net.recv_timeout(remaining).await {
            Ok(envelope) => envelope,
            Err(EnvError::Timeout(_)) => return Awaited::TimedOut,
            Err(_) => return Awaited::Closed,
        };

        if envelope.kind != P::KIND {
            debug!(
                "{}: ignoring {} from {} while waiting for {}",
                net.local_addr(),
                envelope.kind,
                envelope.from,
                P::KIND
            );
            continue;
        }

        match P::decode(&envelope) {
            Ok(payload) if accept(&payload) => return Awaited::Received(payload),
            Ok(_) => debug!("{}: discarding stale {} from {}", net.local_addr(), P::KIND, envelope.from),
            Err(e) => return Awaited::Malformed(e),
        }
    }
}
