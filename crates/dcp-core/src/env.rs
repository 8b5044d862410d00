//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from the system clock.
//! The master only needs time to enforce response deadlines, so a simulated
//! clock makes timeout behavior fully reproducible.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: Implementations must not share global state

use std::{fmt::Debug, future::Future, ops::Add, time::Duration};

/// Abstract environment providing time and async sleeping.
pub trait Environment: Clone {
    /// Point in time produced by [`Environment::now`].
    ///
    /// Deadlines are computed as `now() + timeout` and compared with `>=`.
    type Instant: Copy + Ord + Debug + Add<Duration, Output = Self::Instant>;

    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code calls this. Protocol logic never suspends.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Production environment backed by the tokio clock.
///
/// Uses `tokio::time::Instant` so that drivers running under a paused or
/// simulated tokio runtime observe the same time as the master.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}
