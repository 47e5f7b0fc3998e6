//! Engine configuration.
//!
//! All weighting constants of the fusion engine live here as named values.
//! Every struct deserializes with `#[serde(default)]`, so a JSON file only
//! needs to mention the values it overrides:
//!
//! ```json
//! { "fusion": { "app_window_secs": 90.0 } }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RailTrailError, Result};

/// Configuration for the PositionProjector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// A projection closer than this to a track vertex snaps to the vertex's
    /// exact trackKm (default: 0.5 m)
    pub vertex_epsilon_m: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            vertex_epsilon_m: 0.5,
        }
    }
}

/// Configuration for the LocationFusionEngine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Trust window for tracker reports (default: 600 s)
    pub tracker_window_secs: f64,

    /// Tracker reports further off the track get zero weight (default: 50 m)
    pub tracker_max_off_track_m: f64,

    /// Trust window for app reports (default: 120 s)
    pub app_window_secs: f64,

    /// App reports further off the track get zero weight (default: 15 m)
    pub app_max_off_track_m: f64,

    /// Only the most recent N app reports are considered (default: 3)
    pub app_max_reports: usize,

    /// App reports are ignored unless at least this many are in the window,
    /// since a speed needs two fixes (default: 2)
    pub app_min_reports: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            tracker_window_secs: 600.0,
            tracker_max_off_track_m: 50.0,
            app_window_secs: 120.0,
            app_max_off_track_m: 15.0,
            app_max_reports: 3,
            app_min_reports: 2,
        }
    }
}

impl FusionConfig {
    /// The widest of the two trust windows; reads older than this never
    /// contribute to a FRESH estimate.
    pub fn max_window_secs(&self) -> f64 {
        self.tracker_window_secs.max(self.app_window_secs)
    }
}

/// Top-level configuration of the positioning core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub projection: ProjectionConfig,
    pub fusion: FusionConfig,
}

impl EngineConfig {
    /// Parses a (possibly partial) JSON configuration and validates it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| RailTrailError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| RailTrailError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Rejects values that would make the weighting functions meaningless.
    pub fn validate(&self) -> Result<()> {
        let f = &self.fusion;
        let positive = [
            ("fusion.tracker_window_secs", f.tracker_window_secs),
            ("fusion.tracker_max_off_track_m", f.tracker_max_off_track_m),
            ("fusion.app_window_secs", f.app_window_secs),
            ("fusion.app_max_off_track_m", f.app_max_off_track_m),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RailTrailError::Config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if f.app_min_reports < 2 {
            return Err(RailTrailError::Config(format!(
                "fusion.app_min_reports must be at least 2, got {}",
                f.app_min_reports
            )));
        }
        if f.app_max_reports < f.app_min_reports {
            return Err(RailTrailError::Config(format!(
                "fusion.app_max_reports ({}) is below app_min_reports ({})",
                f.app_max_reports, f.app_min_reports
            )));
        }

        let eps = self.projection.vertex_epsilon_m;
        if !(eps.is_finite() && eps >= 0.0) {
            return Err(RailTrailError::Config(format!(
                "projection.vertex_epsilon_m must be >= 0, got {}",
                eps
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.fusion.tracker_window_secs, 600.0);
        assert_eq!(config.fusion.tracker_max_off_track_m, 50.0);
        assert_eq!(config.fusion.app_window_secs, 120.0);
        assert_eq!(config.fusion.app_max_off_track_m, 15.0);
        assert_eq!(config.fusion.app_max_reports, 3);
        assert_eq!(config.fusion.max_window_secs(), 600.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config =
            EngineConfig::from_json_str(r#"{ "fusion": { "app_window_secs": 90.0 } }"#).unwrap();
        assert_eq!(config.fusion.app_window_secs, 90.0);
        assert_eq!(config.fusion.tracker_window_secs, 600.0);
        assert_eq!(config.projection.vertex_epsilon_m, 0.5);
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let result = EngineConfig::from_json_str(r#"{ "fusion": { "tracker_window_secs": 0 } }"#);
        assert!(matches!(result, Err(RailTrailError::Config(_))));
    }

    #[test]
    fn test_rejects_single_app_report_speed() {
        let result = EngineConfig::from_json_str(r#"{ "fusion": { "app_min_reports": 1 } }"#);
        assert!(matches!(result, Err(RailTrailError::Config(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(EngineConfig::from_json_str("{ fusion: ").is_err());
    }
}
