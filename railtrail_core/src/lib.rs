//! RailTrail Core - Track-Relative Positioning for Rail-Trail Draisines
//!
//! Draisines report their position intermittently: hardware trackers every
//! few minutes over LoRaWAN, rider phones every few seconds while the app is
//! open. This library turns those noisy fixes into one position per vehicle,
//! expressed as a distance along a one-dimensional track:
//! 1. **Geometry**: distance-annotated tracks (`track_geometry`)
//! 2. **Projection**: GPS fix → trackKm and back (`projection`)
//! 3. **Heading**: compass heading → direction along the track (`heading`)
//! 4. **Fusion**: weighted, dead-reckoned estimate from many reports (`fusion`)
//! 5. **Proximity**: nearest POI / vehicle ahead or behind (`proximity`)
//!
//! [`PositionService`] ties the engines to a report log and a clock.

pub mod config;
pub mod error;
pub mod fusion;
pub mod heading;
pub mod projection;
pub mod proximity;
pub mod registry;
pub mod service;
pub mod track_geometry;

// Re-export key types for convenience
pub use config::{EngineConfig, FusionConfig, ProjectionConfig};
pub use error::{RailTrailError, Result};
pub use fusion::{
    Contribution, Freshness, LocationFusionEngine, ReportSource, VehiclePositionEstimate,
};
pub use heading::{track_bearing, travel_direction_sign, TravelDirection};
pub use projection::{point_at_track_km, Bracket, PositionProjector, Projection};
pub use proximity::{NearbyQuery, Poi, PoiKind, QueryOrigin, TrackLocated};
pub use registry::{NewPoi, TrackEntry, TrackRegistry};
pub use service::{NearbyVehicle, PoiSighting, PositionService, VehicleSighting, VehicleUpdate};
pub use track_geometry::{Track, TrackPoint};
