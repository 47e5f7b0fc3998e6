//! Error types for the simulation harness.

use railtrail_core::RailTrailError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Core(#[from] RailTrailError),

    #[error("Invalid simulation config: {0}")]
    Config(String),

    #[error("Unknown vehicle in oracle: {0}")]
    UnknownVehicle(String),
}

impl From<railtrail_env::EnvError> for SimError {
    fn from(e: railtrail_env::EnvError) -> Self {
        Self::Core(e.into())
    }
}
