//! Core environment context trait for RailTrail services.

use std::time::SystemTime;

/// The central interface for reading time.
///
/// Fusion is a function of "now": report ages drive both the trust windows
/// and the dead-reckoning distance. Abstracting the clock lets the same
/// service run against the wall clock in production and against a virtual
/// clock in simulation.
///
/// # Implementations
///
/// - **Production**: `SystemContext` - wraps `SystemTime::now()`
/// - **Simulation**: `SimContext` - virtual clock advanced by the harness
pub trait RailTrailContext: Send + Sync + 'static {
    /// Returns the wall-clock time.
    fn system_time(&self) -> SystemTime;

    /// Returns the current time as Unix seconds.
    ///
    /// This is the timescale of [`crate::LocationReport::timestamp`].
    fn now_secs(&self) -> f64 {
        self.system_time()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}
