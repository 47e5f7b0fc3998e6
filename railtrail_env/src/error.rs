//! Error types for the RailTrail environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Clone, Error)]
pub enum EnvError {
    /// The backing store rejected or failed an operation (database-backed logs)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A report was appended for a vehicle that does not match the log entry
    #[error("Inconsistent report: {0}")]
    InconsistentReport(String),
}
