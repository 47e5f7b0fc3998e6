//! Error types for the RailTrail positioning core.

use railtrail_env::{EnvError, TrackId, VehicleId};
use thiserror::Error;

/// Errors that can occur while building tracks, projecting positions or
/// answering queries.
///
/// Missing or outdated data is deliberately *not* an error: the fusion engine
/// answers with a [`crate::Freshness::Stale`] estimate instead.
#[derive(Debug, Clone, Error)]
pub enum RailTrailError {
    /// Fewer than two points, or a point with non-finite / out-of-range coordinates
    #[error("Invalid track geometry: {0}")]
    InvalidTrackGeometry(String),

    /// No bracketing pair of track points could be resolved
    #[error("Projection failure: {0}")]
    ProjectionFailure(String),

    /// A location report failed validation before ingestion
    #[error("Invalid location report: {0}")]
    InvalidReport(String),

    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// The vehicle has never reported or is not assigned to a track
    #[error("Unknown vehicle: {0}")]
    UnknownVehicle(VehicleId),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Env(#[from] EnvError),
}

impl RailTrailError {
    /// Creates an invalid-geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidTrackGeometry(msg.into())
    }

    /// Creates a projection error.
    pub fn projection(msg: impl Into<String>) -> Self {
        Self::ProjectionFailure(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RailTrailError>;
