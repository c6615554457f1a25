//! Turmoil-based Environment implementation for deterministic testing.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use odonet_core::env::Environment;

/// Simulation environment using Turmoil's virtual time.
///
/// - `now()` returns tokio's instant, which Turmoil advances instantly on
///   sleep.
/// - `wall_clock()` is a fixed epoch plus the simulated time elapsed on the
///   current host, so timestamps are identical across runs.
///
/// # Panics
///
/// `wall_clock()` panics if called outside a Turmoil simulation.
#[derive(Clone, Copy, Debug)]
pub struct SimEnv {
    epoch: DateTime<Utc>,
}

impl SimEnv {
    /// Environment whose calendar starts at 2024-06-01 00:00:00 UTC
    #[must_use]
    pub fn new() -> Self {
        Self { epoch: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap_or_default() }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(turmoil::elapsed()).unwrap_or_default();
        self.epoch + elapsed
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
