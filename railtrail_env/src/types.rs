//! Common types shared between the RailTrail engines and their environment.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a draisine.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub Uuid);

impl VehicleId {
    /// Creates a new random VehicleId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a VehicleId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic VehicleId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for VehicleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 chars are enough to tell vehicles apart in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Identifier of an imported track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

/// Identifier of a hardware tracker (e.g. a LoRaWAN device EUI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackerId(pub String);

impl TrackerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TrackerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True if both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A single position fix for a vehicle.
///
/// Reports are append-only: once written to a [`crate::ReportLog`] they are
/// never mutated. A report without `tracker_id` was sent by a rider's phone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    /// Hardware tracker that produced the fix, `None` for app heartbeats
    pub tracker_id: Option<TrackerId>,

    /// Vehicle the fix belongs to
    pub vehicle_id: VehicleId,

    /// Unix timestamp (seconds since epoch)
    pub timestamp: f64,

    /// Reported position
    pub position: GeoPoint,

    /// Ground speed in km/h, if the source measured one
    pub speed_kmh: Option<f64>,

    /// Course over ground in degrees (0 = north, clockwise), if known
    pub heading_deg: Option<f64>,
}

impl LocationReport {
    /// Creates a report produced by a hardware tracker.
    pub fn from_tracker(
        tracker_id: TrackerId,
        vehicle_id: VehicleId,
        timestamp: f64,
        position: GeoPoint,
    ) -> Self {
        Self {
            tracker_id: Some(tracker_id),
            vehicle_id,
            timestamp,
            position,
            speed_kmh: None,
            heading_deg: None,
        }
    }

    /// Creates a report produced by the rider app.
    pub fn from_app(vehicle_id: VehicleId, timestamp: f64, position: GeoPoint) -> Self {
        Self {
            tracker_id: None,
            vehicle_id,
            timestamp,
            position,
            speed_kmh: None,
            heading_deg: None,
        }
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = Some(speed_kmh);
        self
    }

    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }

    /// True if this report came from the rider app rather than a tracker.
    pub fn is_app(&self) -> bool {
        self.tracker_id.is_none()
    }

    /// Seconds elapsed between the fix and `now`, never negative.
    ///
    /// Fixes stamped slightly in the future (clock skew on the device) count
    /// as brand new.
    pub fn age_at(&self, now: f64) -> f64 {
        (now - self.timestamp).max(0.0)
    }
}
