//! Production implementation of RailTrailContext using the system clock.

use crate::RailTrailContext;
use std::sync::Arc;
use std::time::SystemTime;

/// Production context backed by the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemContext;

impl SystemContext {
    /// Creates a new SystemContext.
    pub fn new() -> Self {
        Self
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl RailTrailContext for SystemContext {
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}
