//! Production implementation of RaceContext using Tokio.

use crate::RaceContext;
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Context backed by the Tokio runtime clock.
///
/// Time comes from `tokio::time`, so under a paused test runtime the clock
/// is virtual and auto-advances whenever every task is waiting.
/// Randomness comes from the OS unless the context is seeded.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Master seed (0 = unseeded)
    seed: u64,
}

impl TokioContext {
    /// Creates an unseeded context.
    pub fn new() -> Self {
        Self::seeded(0)
    }

    /// Creates a context whose randomness is derived from `seed`.
    ///
    /// A seed of 0 means "unseeded": RNG streams come from OS entropy.
    pub fn seeded(seed: u64) -> Self {
        Self {
            start: Instant::now(),
            seed,
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::seeded(seed))
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RaceContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F, T>(&self, _name: &str, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(future)
    }

    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng {
        if self.seed == 0 {
            return ChaCha8Rng::from_entropy();
        }

        // Golden-ratio mix keeps neighbouring extensions far apart
        let stream_seed = self.seed
            .wrapping_mul(0x9e3779b97f4a7c15)
            .wrapping_add(seed_extension.wrapping_mul(0x517cc1b727220a95));
        ChaCha8Rng::seed_from_u64(stream_seed)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
