//! Time provider abstraction for real and test-controlled time.
//!
//! All deadline math in the crate goes through [`TimeProvider::now`], so a
//! test can pin "now" with [`ManualTimeProvider`] and exercise expiry
//! boundaries exactly, while production uses [`TokioTimeProvider`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Provider trait for time operations.
///
/// `now()` is monotonic elapsed time since an arbitrary provider-local
/// epoch; only differences between `now()` values are meaningful. `sleep`
/// is used by the periodic tasks (sweeper, region monitors).
#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    /// Get elapsed time since the provider's epoch.
    fn now(&self) -> Duration;

    /// Sleep for the specified duration.
    async fn sleep(&self, duration: Duration);
}

/// Real time provider using Tokio's time facilities.
///
/// Built on `tokio::time::Instant`, so tests running under a paused tokio
/// clock (`#[tokio::test(start_paused = true)]`) see it advance in lockstep
/// with the runtime.
#[derive(Debug, Clone)]
pub struct TokioTimeProvider {
    start: tokio::time::Instant,
}

impl TokioTimeProvider {
    /// Create a new provider; its epoch is the moment of creation.
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimeProvider for TokioTimeProvider {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually advanced time provider for deterministic tests.
///
/// The clock only moves when [`advance`](ManualTimeProvider::advance) is
/// called — or when `sleep` is awaited, which fast-forwards the clock by the
/// requested duration and yields once so other tasks get a turn. That makes
/// periodic loops driven by this provider run as fast as the scheduler
/// allows while their observed timestamps stay exact.
#[derive(Debug, Default)]
pub struct ManualTimeProvider {
    nanos: AtomicU64,
}

impl ManualTimeProvider {
    /// Create a provider with the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with the clock already at `start`.
    pub fn starting_at(start: Duration) -> Self {
        let provider = Self::new();
        provider.advance(start);
        provider
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.nanos.fetch_add(delta.as_nanos() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
