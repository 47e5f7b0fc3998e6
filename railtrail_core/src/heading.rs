//! The "HEADING" Resolver - travel direction relative to the track
//!
//! A draisine can only move in two directions: towards larger trackKm
//! (`Forward`) or towards smaller trackKm (`Backward`). The resolver turns a
//! compass heading into one of those by comparing it with the bearing of the
//! local track segment.

use geo::HaversineBearing;
use serde::{Deserialize, Serialize};

use crate::error::{RailTrailError, Result};
use crate::track_geometry::{to_geo_point, Track};

/// Direction of travel along the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TravelDirection {
    /// Towards increasing trackKm
    Forward,

    /// Towards decreasing trackKm
    Backward,

    /// No heading available
    #[default]
    Unknown,
}

impl TravelDirection {
    /// The direction as `+1`, `-1` or `0`.
    pub fn sign(self) -> i8 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
            Self::Unknown => 0,
        }
    }

    /// Direction matching the sign of a signed quantity (e.g. a speed).
    pub fn from_signum(value: f64) -> Self {
        if value > 0.0 {
            Self::Forward
        } else if value < 0.0 {
            Self::Backward
        } else {
            Self::Unknown
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
            Self::Unknown => Self::Unknown,
        }
    }
}

/// Normalizes an angle into `[0, 360)`.
#[inline]
pub fn normalize_deg(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Bearing (degrees, clockwise from north) of the segment bracketing `km`,
/// pointing towards increasing trackKm.
///
/// Zero-length segments (duplicate points) have no bearing, so the nearest
/// non-degenerate segment ahead, then behind, is used instead.
pub fn track_bearing(track: &Track, km: f64) -> Result<f64> {
    let (i, _) = track.segment_at(km).ok_or_else(|| {
        RailTrailError::projection(format!("no segment brackets trackKm {}", km))
    })?;

    let points = track.points();
    let usable = |idx: usize| points[idx + 1].track_km > points[idx].track_km;
    let segment = (i..points.len() - 1)
        .find(|&idx| usable(idx))
        .or_else(|| (0..i).rev().find(|&idx| usable(idx)))
        .ok_or_else(|| RailTrailError::projection("track has zero length, no bearing"))?;

    let from = to_geo_point(points[segment].position);
    let to = to_geo_point(points[segment + 1].position);
    Ok(normalize_deg(from.haversine_bearing(to)))
}

/// Resolves a compass heading into a direction along the track.
///
/// `Forward` when the heading is within ±90° (inclusive) of the track
/// bearing, `Backward` otherwise, `Unknown` without a usable heading.
pub fn travel_direction_sign(heading_deg: Option<f64>, track_bearing_deg: f64) -> TravelDirection {
    let heading = match heading_deg {
        Some(h) if h.is_finite() => h,
        _ => return TravelDirection::Unknown,
    };

    let mut diff = normalize_deg(heading - track_bearing_deg);
    if diff > 180.0 {
        diff -= 360.0;
    }

    if diff.abs() <= 90.0 {
        TravelDirection::Forward
    } else {
        TravelDirection::Backward
    }
}

/// Compass heading of a vehicle at `km` travelling in `direction`.
pub fn heading_deg_at(track: &Track, km: f64, direction: TravelDirection) -> Result<Option<f64>> {
    let bearing = track_bearing(track, km)?;
    Ok(match direction {
        TravelDirection::Forward => Some(bearing),
        TravelDirection::Backward => Some(normalize_deg(bearing + 180.0)),
        TravelDirection::Unknown => None,
    })
}

/// Two vehicles approach head-on when both directions are known and opposite.
pub fn is_oncoming(a: TravelDirection, b: TravelDirection) -> bool {
    a.is_known() && b.is_known() && a != b
}

/// True if a vehicle at `from_km` moving in `direction` heads towards
/// `target_km`.
pub fn heads_towards(from_km: f64, direction: TravelDirection, target_km: f64) -> bool {
    match direction {
        TravelDirection::Forward => target_km >= from_km,
        TravelDirection::Backward => target_km <= from_km,
        TravelDirection::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use railtrail_env::GeoPoint;

    /// East along the equator, then north.
    fn bent_track() -> Track {
        Track::build(&[
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.01),
            GeoPoint::new(0.01, 0.01),
        ])
        .unwrap()
    }

    #[test]
    fn test_track_bearing_follows_segments() {
        let track = bent_track();
        let corner = track.points()[1].track_km;

        assert_relative_eq!(track_bearing(&track, 0.1).unwrap(), 90.0, epsilon = 1e-6);
        assert_relative_eq!(
            track_bearing(&track, corner + 0.1).unwrap(),
            0.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_track_bearing_skips_duplicate_points() {
        let track = Track::build(&[
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.01),
        ])
        .unwrap();
        assert_relative_eq!(track_bearing(&track, 0.0).unwrap(), 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_length_track_has_no_bearing() {
        let track = Track::build(&[GeoPoint::new(1.0, 1.0), GeoPoint::new(1.0, 1.0)]).unwrap();
        assert!(track_bearing(&track, 0.0).is_err());
    }

    #[test]
    fn test_travel_direction_sign() {
        assert_eq!(travel_direction_sign(Some(80.0), 90.0), TravelDirection::Forward);
        assert_eq!(travel_direction_sign(Some(270.0), 90.0), TravelDirection::Backward);
        assert_eq!(travel_direction_sign(None, 90.0), TravelDirection::Unknown);
        assert_eq!(travel_direction_sign(Some(f64::NAN), 90.0), TravelDirection::Unknown);

        // Wraps around north
        assert_eq!(travel_direction_sign(Some(350.0), 10.0), TravelDirection::Forward);
        assert_eq!(travel_direction_sign(Some(-170.0), 10.0), TravelDirection::Backward);
    }

    #[test]
    fn test_right_angle_counts_as_forward() {
        assert_eq!(travel_direction_sign(Some(180.0), 90.0), TravelDirection::Forward);
        assert_eq!(travel_direction_sign(Some(0.0), 90.0), TravelDirection::Forward);
        assert_eq!(travel_direction_sign(Some(180.1), 90.0), TravelDirection::Backward);
    }

    #[test]
    fn test_heading_at_reverses_backward() {
        let track = bent_track();
        let forward = heading_deg_at(&track, 0.1, TravelDirection::Forward).unwrap();
        let backward = heading_deg_at(&track, 0.1, TravelDirection::Backward).unwrap();

        assert_relative_eq!(forward.unwrap(), 90.0, epsilon = 1e-6);
        assert_relative_eq!(backward.unwrap(), 270.0, epsilon = 1e-6);
        assert_eq!(heading_deg_at(&track, 0.1, TravelDirection::Unknown).unwrap(), None);
    }

    #[test]
    fn test_oncoming_and_heads_towards() {
        use TravelDirection::*;

        assert!(is_oncoming(Forward, Backward));
        assert!(!is_oncoming(Forward, Forward));
        assert!(!is_oncoming(Forward, Unknown));

        assert!(heads_towards(1.0, Forward, 2.0));
        assert!(!heads_towards(1.0, Forward, 0.5));
        assert!(heads_towards(1.0, Backward, 0.5));
        assert!(!heads_towards(1.0, Unknown, 2.0));
    }

    #[test]
    fn test_sign_helpers() {
        assert_eq!(TravelDirection::Forward.sign(), 1);
        assert_eq!(TravelDirection::Backward.sign(), -1);
        assert_eq!(TravelDirection::Unknown.sign(), 0);
        assert_eq!(TravelDirection::from_signum(-3.0), TravelDirection::Backward);
        assert_eq!(TravelDirection::Forward.reversed(), TravelDirection::Backward);
    }
}
