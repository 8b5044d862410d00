//! Virtual clock for deterministic simulations.

use std::{
    future::{Future, ready},
    ops::Add,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dcp_core::Environment;

/// Point on the virtual timeline, measured from the start of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time since the simulation started.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

/// Environment whose clock only moves when told to.
///
/// Clones share the same clock, so a master and the driver advancing time
/// always agree on `now()`.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    nanos: Arc<AtomicU64>,
}

impl SimEnv {
    /// Clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `by`, saturating at the end of time.
    pub fn advance(&self, by: Duration) {
        let step = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let advanced = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| now.checked_add(step));
        if advanced.is_err() {
            self.nanos.store(u64::MAX, Ordering::SeqCst);
        }
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(Duration::from_nanos(self.nanos.load(Ordering::SeqCst)))
    }

    /// Advances the clock and completes immediately.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        self.advance(duration);
        ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        env.advance(Duration::from_millis(250));

        assert_eq!(other.now().elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn sleep_advances_virtual_time() {
        let env = SimEnv::new();
        let start = env.now();

        drop(env.sleep(Duration::from_secs(3)));

        assert_eq!(env.now(), start + Duration::from_secs(3));
    }

    #[test]
    fn advancing_past_the_end_saturates() {
        let env = SimEnv::new();
        let end = Duration::from_nanos(u64::MAX);

        env.advance(Duration::from_nanos(u64::MAX - 5));
        env.advance(Duration::from_nanos(10));
        assert_eq!(env.now().elapsed(), end);

        env.advance(Duration::MAX);
        assert_eq!(env.now().elapsed(), end);
    }
}
