//! In-process message bus with fault injection.
//!
//! Every agent registers an inbox with the bus and receives a [`BusEndpoint`]
//! implementing [`MessageTransport`]. Sends are routed straight into the
//! target's inbox after the [`BusController`] has had its say on partitions
//! and link loss.

use async_trait::async_trait;
use paddock_env::{AgentAddr, EnvError, Envelope, MessageKind, MessageTransport, TransportController};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Default inbox depth per agent.
pub const INBOX_CAPACITY: usize = 1000;

/// Delivery counters for a bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BusStats {
    pub sent: u64,
    pub delivered: u64,
    pub dropped: u64,
}

struct BusShared {
    inboxes: RwLock<HashMap<AgentAddr, mpsc::Sender<Envelope>>>,
    controller: BusController,
    sent: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// The router shared by every endpoint.
#[derive(Clone)]
pub struct MessageBus {
    shared: Arc<BusShared>,
}

impl MessageBus {
    /// Creates an empty bus. `rng` drives link-loss decisions.
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            shared: Arc::new(BusShared {
                inboxes: RwLock::new(HashMap::new()),
                controller: BusController::new(rng),
                sent: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Registers an inbox for `addr` and returns its endpoint.
    ///
    /// Registering the same address twice replaces the earlier inbox.
    pub fn register(&self, addr: AgentAddr) -> BusEndpoint {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        self.shared
            .inboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(addr, tx);

        BusEndpoint {
            local_addr: addr,
            shared: self.shared.clone(),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Removes an inbox. Later sends to `addr` fail as unreachable.
    pub fn unregister(&self, addr: AgentAddr) {
        self.shared
            .inboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&addr);
    }

    pub fn is_registered(&self, addr: AgentAddr) -> bool {
        self.shared
            .inboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&addr)
    }

    pub fn controller(&self) -> &BusController {
        &self.shared.controller
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            sent: self.shared.sent.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }
}

/// One agent's connection to the bus.
pub struct BusEndpoint {
    local_addr: AgentAddr,
    shared: Arc<BusShared>,

    /// Inbox (behind tokio mutex so `recv` can take `&self`)
    rx: tokio::sync::Mutex<mpsc::Receiver<Envelope>>,
}

#[async_trait]
impl MessageTransport for BusEndpoint {
    async fn send(&self, target: AgentAddr, kind: MessageKind, payload: Vec<u8>) -> Result<(), EnvError> {
        let inbox = self
            .shared
            .inboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target)
            .cloned()
            .ok_or_else(|| EnvError::unreachable(target))?;

        self.shared.sent.fetch_add(1, Ordering::Relaxed);

        if !self.shared.controller.should_deliver(self.local_addr, target) {
            // Dropped in flight; the sender cannot tell
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let envelope = Envelope::new(self.local_addr, target, kind, payload, unix_millis());
        inbox
            .send(envelope)
            .await
            .map_err(|_| EnvError::network(format!("inbox of {} closed", target)))?;

        self.shared.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn recv(&self) -> Option<Envelope> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    fn local_addr(&self) -> AgentAddr {
        self.local_addr
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fault injection for the bus.
pub struct BusController {
    /// Per-link loss rate (0.0 - 1.0), directed
    link_loss: Mutex<HashMap<(AgentAddr, AgentAddr), f64>>,

    /// Active partitions (groups that cannot communicate)
    partitions: Mutex<Vec<(Vec<AgentAddr>, Vec<AgentAddr>)>>,

    rng: Mutex<ChaCha8Rng>,
}

impl BusController {
    fn new(rng: ChaCha8Rng) -> Self {
        Self {
            link_loss: Mutex::new(HashMap::new()),
            partitions: Mutex::new(Vec::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Checks if two agents can communicate (not partitioned).
    pub fn can_communicate(&self, from: AgentAddr, to: AgentAddr) -> bool {
        let partitions = lock(&self.partitions);

        !partitions.iter().any(|(group_a, group_b)| {
            (group_a.contains(&from) && group_b.contains(&to))
                || (group_b.contains(&from) && group_a.contains(&to))
        })
    }

    /// Gets the loss rate for a link (default 0.0).
    pub fn get_loss(&self, from: AgentAddr, to: AgentAddr) -> f64 {
        lock(&self.link_loss).get(&(from, to)).copied().unwrap_or(0.0)
    }

    /// Decides the fate of one envelope: partition first, then a loss roll.
    pub fn should_deliver(&self, from: AgentAddr, to: AgentAddr) -> bool {
        if !self.can_communicate(from, to) {
            return false;
        }

        let loss = self.get_loss(from, to);
        if loss <= 0.0 {
            return true;
        }
        if loss >= 1.0 {
            return false;
        }
        !lock(&self.rng).gen_bool(loss)
    }
}

impl TransportController for BusController {
    fn partition(&self, group_a: &[AgentAddr], group_b: &[AgentAddr]) {
        lock(&self.partitions).push((group_a.to_vec(), group_b.to_vec()));
    }

    fn heal_all(&self) {
        lock(&self.partitions).clear();
        lock(&self.link_loss).clear();
    }

    fn set_link_loss(&self, from: AgentAddr, to: AgentAddr, loss_rate: f64) {
        let rate = if loss_rate.is_nan() { 0.0 } else { loss_rate.clamp(0.0, 1.0) };
        lock(&self.link_loss).insert((from, to), rate);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::time::Duration;

    fn bus() -> MessageBus {
        MessageBus::new(ChaCha8Rng::seed_from_u64(7))
    }

    #[tokio::test]
    async fn test_send_and_recv() {
        let bus = bus();
        let coordinator = bus.register(AgentAddr::Coordinator);
        let p0 = bus.register(AgentAddr::Participant(0));

        p0.send(AgentAddr::Coordinator, MessageKind::ProgressReport, b"{}".to_vec())
            .await
            .unwrap();

        let envelope = coordinator.recv().await.unwrap();
        assert_eq!(envelope.from, AgentAddr::Participant(0));
        assert_eq!(envelope.to, AgentAddr::Coordinator);
        assert_eq!(envelope.kind, MessageKind::ProgressReport);
        assert_eq!(envelope.payload, b"{}".to_vec());
        assert_eq!(bus.stats(), BusStats { sent: 1, delivered: 1, dropped: 0 });
    }

    #[tokio::test]
    async fn test_unregistered_target_is_unreachable() {
        let bus = bus();
        let p0 = bus.register(AgentAddr::Participant(0));

        let err = p0
            .send(AgentAddr::Team(9), MessageKind::Telemetry, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EnvError::NodeUnreachable(_)));
        assert_eq!(bus.stats().sent, 0);
    }

    #[tokio::test]
    async fn test_unregister() {
        let bus = bus();
        let _team = bus.register(AgentAddr::Team(0));
        assert!(bus.is_registered(AgentAddr::Team(0)));

        bus.unregister(AgentAddr::Team(0));
        assert!(!bus.is_registered(AgentAddr::Team(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partition_drops_silently() {
        let bus = bus();
        let team = bus.register(AgentAddr::Team(0));
        let p0 = bus.register(AgentAddr::Participant(0));

        bus.controller().partition(&[AgentAddr::Team(0)], &[AgentAddr::Participant(0)]);

        // Sender sees success, receiver sees nothing
        team.send(AgentAddr::Participant(0), MessageKind::Strategy, Vec::new())
            .await
            .unwrap();
        let err = p0.recv_timeout(Duration::from_millis(500)).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(bus.stats().dropped, 1);

        bus.controller().heal_all();
        team.send(AgentAddr::Participant(0), MessageKind::Strategy, Vec::new())
            .await
            .unwrap();
        assert!(p0.recv_timeout(Duration::from_millis(500)).await.is_ok());
    }

    #[test]
    fn test_controller_partition() {
        let controller = BusController::new(ChaCha8Rng::seed_from_u64(1));
        let c = AgentAddr::Coordinator;
        let p0 = AgentAddr::Participant(0);
        let p1 = AgentAddr::Participant(1);

        assert!(controller.can_communicate(c, p0));

        controller.partition(&[c], &[p0, p1]);
        assert!(!controller.can_communicate(c, p0));
        assert!(!controller.can_communicate(p1, c));

        // Within a group is unaffected
        assert!(controller.can_communicate(p0, p1));
    }

    #[test]
    fn test_loss_is_directed() {
        let controller = BusController::new(ChaCha8Rng::seed_from_u64(1));
        let c = AgentAddr::Coordinator;
        let p0 = AgentAddr::Participant(0);

        controller.set_link_loss(c, p0, 1.0);
        assert_eq!(controller.get_loss(c, p0), 1.0);
        assert_eq!(controller.get_loss(p0, c), 0.0);

        assert!(!controller.should_deliver(c, p0));
        assert!(controller.should_deliver(p0, c));

        // Out-of-range rates are clamped
        controller.set_link_loss(p0, c, 3.0);
        assert_eq!(controller.get_loss(p0, c), 1.0);
    }

    #[test]
    fn test_partial_loss_drops_some() {
        let controller = BusController::new(ChaCha8Rng::seed_from_u64(3));
        let c = AgentAddr::Coordinator;
        let p0 = AgentAddr::Participant(0);
        controller.set_link_loss(c, p0, 0.5);

        let delivered = (0..1000).filter(|_| controller.should_deliver(c, p0)).count();
        assert!(delivered > 350 && delivered < 650, "delivered {}", delivered);
    }
}
