//! Simulation context implementing RailTrailContext with a virtual clock.

use railtrail_env::RailTrailContext;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Simulation context backed by a virtual clock.
///
/// Time only moves when the harness calls [`SimContext::advance_time`], so a
/// scenario replays identically for a given seed no matter how fast the host
/// machine is.
#[derive(Debug)]
pub struct SimContext {
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    pub fn new() -> Self {
        Self {
            virtual_time_ns: Arc::new(Mutex::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time += duration.as_nanos() as u64;
    }

    /// Returns the virtual time elapsed since simulation start.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(*self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            epoch: self.epoch,
        }
    }
}

impl RailTrailContext for SimContext {
    fn system_time(&self) -> SystemTime {
        self.epoch + self.elapsed()
    }
}
