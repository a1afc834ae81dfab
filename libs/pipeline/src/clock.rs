use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// How [`Pacer::wait_until`] passes time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Sleep for the remaining time, at most one granularity step at a
    /// time, then re-check.
    #[default]
    Sleep,
    /// Hot busy-wait. Lowest jitter, one core at 100%.
    Spin,
}

impl std::fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitStrategy::Sleep => f.write_str("sleep"),
            WaitStrategy::Spin => f.write_str("spin"),
        }
    }
}

impl std::str::FromStr for WaitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sleep" => Ok(WaitStrategy::Sleep),
            "spin" => Ok(WaitStrategy::Spin),
            other => Err(format!("unknown wait strategy {other:?} (expected sleep or spin)")),
        }
    }
}

/// Monotonic replay start. Fixed once started.
#[derive(Debug, Clone, Copy)]
pub struct ReplayClock {
    start: Instant,
}

impl ReplayClock {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Wait-until primitive used by the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    strategy: WaitStrategy,
    granularity: Duration,
}

impl Pacer {
    pub fn new(strategy: WaitStrategy, granularity: Duration) -> Self {
        Self { strategy, granularity }
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    /// Block until `offset` has elapsed on `clock`.
    ///
    /// Never returns early: `true` means `clock.elapsed() >= offset`.
    /// Returns `false` only if `cancel` fired before the deadline.
    pub fn wait_until(&self, clock: &ReplayClock, offset: Duration, cancel: &CancellationToken) -> bool {
        loop {
            let elapsed = clock.elapsed();
            if elapsed >= offset {
                return true;
            }
            if cancel.is_cancelled() {
                return false;
            }
            match self.strategy {
                WaitStrategy::Sleep => std::thread::sleep((offset - elapsed).min(self.granularity)),
                WaitStrategy::Spin => std::hint::spin_loop(),
            }
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(WaitStrategy::Sleep, Duration::from_millis(5))
    }
}
