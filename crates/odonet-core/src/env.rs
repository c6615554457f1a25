//! Environment abstraction for deterministic testing.
//!
//! Engine drivers never read the clock or sleep directly. They go through an
//! [`Environment`] so the same code runs against the system clock in
//! production and against Turmoil's virtual clock in simulation.
//!
//! Two clocks are exposed:
//!
//! - [`Environment::now`]: monotonic, for tick pacing and timeouts
//! - [`Environment::wall_clock`]: calendar time, for last-seen timestamps,
//!   event names, and image file names

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Abstract environment providing time and sleeping.
///
/// # Invariants
///
/// - Monotonicity: `now()` never goes backwards
/// - Isolation: implementations must not share global state
pub trait Environment: Clone + Send + Sync + 'static {
    /// Type representing a point in monotonic time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time
    fn now(&self) -> Self::Instant;

    /// Current calendar time
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Sleep for `duration`.
    ///
    /// In simulation this advances virtual time without wall-clock delay.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
