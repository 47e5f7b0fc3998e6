//! Rider warnings derived from a vehicle update.
//!
//! The positioning core only answers "how far"; deciding what is close enough
//! to warn about is a policy of the consumer, configured by [`WarningConfig`].

use railtrail_core::VehicleUpdate;
use railtrail_env::VehicleId;
use serde::{Deserialize, Serialize};

/// Distance thresholds for rider warnings, in meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningConfig {
    /// Warn about a level crossing ahead closer than this (default: 200 m)
    pub crossing_warning_m: f64,

    /// Warn about any vehicle closer than this (default: 10 m)
    pub too_close_m: f64,

    /// Warn about a vehicle heading towards the rider closer than this
    /// (default: 200 m)
    pub oncoming_warning_m: f64,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            crossing_warning_m: 200.0,
            too_close_m: 10.0,
            oncoming_warning_m: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    LevelCrossingAhead { poi_id: u32, name: String, distance_m: f64 },
    VehicleTooClose { vehicle_id: VehicleId, distance_m: f64 },
    OncomingVehicle { vehicle_id: VehicleId, distance_m: f64 },
}

impl Warning {
    pub fn distance_m(&self) -> f64 {
        match self {
            Self::LevelCrossingAhead { distance_m, .. }
            | Self::VehicleTooClose { distance_m, .. }
            | Self::OncomingVehicle { distance_m, .. } => *distance_m,
        }
    }
}

/// Warnings a rider should see for this update.
///
/// A vehicle closer than `too_close_m` only raises the too-close warning,
/// never both.
pub fn evaluate(update: &VehicleUpdate, config: &WarningConfig) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if let Some(crossing) = &update.next_crossing {
        let distance_m = crossing.delta_km.abs() * 1000.0;
        if distance_m <= config.crossing_warning_m {
            warnings.push(Warning::LevelCrossingAhead {
                poi_id: crossing.poi_id,
                name: crossing.name.clone(),
                distance_m,
            });
        }
    }

    for sighting in &update.vehicles {
        let distance_m = sighting.delta_km.abs() * 1000.0;
        if distance_m <= config.too_close_m {
            warnings.push(Warning::VehicleTooClose {
                vehicle_id: sighting.vehicle_id,
                distance_m,
            });
        } else if sighting.heading_towards_user && distance_m <= config.oncoming_warning_m {
            warnings.push(Warning::OncomingVehicle {
                vehicle_id: sighting.vehicle_id,
                distance_m,
            });
        }
    }
    warnings
}
