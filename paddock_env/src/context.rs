//! Core environment context trait for Paddock agents.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the race agents can run
/// against the wall clock or against tokio's paused test clock without
/// knowing which.
///
/// # Determinism
///
/// All methods that would normally introduce non-determinism
/// (time, randomness) are controlled by the implementation.
#[async_trait]
pub trait RaceContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time, used to stamp race outcomes.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// This is a cooperative yield: other agents keep running.
    async fn sleep(&self, duration: Duration);

    /// Spawns a named background task.
    fn spawn<F, T>(&self, name: &str, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static;

    /// Derives an independent RNG stream from the master seed.
    ///
    /// Each agent gets its own stream so that adding participants does not
    /// perturb the draws of existing ones.
    ///
    /// # Arguments
    /// * `seed_extension` - A value to combine with the global seed
    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng;

    /// Returns the context's seed (0 when unseeded).
    fn seed(&self) -> u64;
}
