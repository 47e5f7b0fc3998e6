//! The "GEOMETRY" Index - distance-annotated track paths
//!
//! A raw track is an ordered list of GPS points. Building a [`Track`] walks
//! the list once and annotates every point with its cumulative great-circle
//! distance from the start (`track_km`). Every other engine works in that
//! one-dimensional coordinate.
//!
//! Tracks are immutable once built. An edited track is rebuilt from scratch
//! and swapped in whole (see [`crate::registry::TrackRegistry`]).

use geo::{HaversineDistance, LineString, Point};
use railtrail_env::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::error::{RailTrailError, Result};

/// Converts a WGS84 coordinate into a `geo` point (x = longitude).
#[inline]
pub fn to_geo_point(p: GeoPoint) -> Point<f64> {
    Point::new(p.lng, p.lat)
}

/// Great-circle distance in meters.
#[inline]
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    to_geo_point(a).haversine_distance(&to_geo_point(b))
}

/// A track point annotated with its distance along the track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub position: GeoPoint,

    /// Cumulative distance from the first point in kilometers
    pub track_km: f64,
}

/// An immutable, distance-annotated track.
///
/// Invariants (established by [`Track::build`]):
/// - at least two points
/// - `points[0].track_km == 0`
/// - `track_km` is non-decreasing
/// - `points[last].track_km == length_km()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Human readable name of the start (e.g. "Malente")
    pub start_label: String,

    /// Human readable name of the end (e.g. "Lütjenburg")
    pub end_label: String,

    points: Vec<TrackPoint>,
}

impl Track {
    /// Builds an annotated track from an ordered list of points.
    ///
    /// Fails with [`RailTrailError::InvalidTrackGeometry`] when fewer than two
    /// points are given or any coordinate is non-finite or out of range.
    pub fn build(raw: &[GeoPoint]) -> Result<Self> {
        if raw.len() < 2 {
            return Err(RailTrailError::geometry(format!(
                "a track needs at least 2 points, got {}",
                raw.len()
            )));
        }

        if let Some((idx, p)) = raw.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(RailTrailError::geometry(format!(
                "point {} has invalid coordinates ({}, {})",
                idx, p.lat, p.lng
            )));
        }

        let mut points = Vec::with_capacity(raw.len());
        let mut track_km = 0.0;
        points.push(TrackPoint {
            position: raw[0],
            track_km,
        });

        for pair in raw.windows(2) {
            track_km += haversine_m(pair[0], pair[1]) / 1000.0;
            points.push(TrackPoint {
                position: pair[1],
                track_km,
            });
        }

        Ok(Self {
            start_label: String::new(),
            end_label: String::new(),
            points,
        })
    }

    /// Attaches start/end labels.
    pub fn with_labels(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_label = start.into();
        self.end_label = end.into();
        self
    }

    /// Total track length in kilometers (trackKm of the last point).
    #[inline]
    pub fn length_km(&self) -> f64 {
        self.points.last().map(|p| p.track_km).unwrap_or(0.0)
    }

    /// The annotated points, in track order.
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Clamps a trackKm value into `[0, length]`.
    #[inline]
    pub fn clamp_km(&self, km: f64) -> f64 {
        km.clamp(0.0, self.length_km())
    }

    /// Index pair `(i, i + 1)` of the segment containing `km`.
    ///
    /// The first segment whose end reaches `km` wins, so a value sitting
    /// exactly on an inner vertex resolves to the segment *ending* there.
    /// Values outside the track are clamped first. `None` only for a track
    /// with fewer than two points, which `build` never produces.
    pub fn segment_at(&self, km: f64) -> Option<(usize, usize)> {
        if self.points.len() < 2 {
            return None;
        }
        let km = self.clamp_km(km);
        let last_segment = self.points.len() - 2;
        let idx = self.points[1..]
            .partition_point(|p| p.track_km < km)
            .min(last_segment);
        Some((idx, idx + 1))
    }

    /// Converts a trackKm value into a percentage (0 = start, 100 = end).
    ///
    /// Returns `None` for values outside `[0, length]` and for zero-length
    /// tracks.
    pub fn percentage_of(&self, km: f64) -> Option<f64> {
        let length = self.length_km();
        if length <= 0.0 || !(0.0..=length).contains(&km) {
            return None;
        }
        Some(km / length * 100.0)
    }

    /// The raw path as a `geo` line string, e.g. for map rendering.
    pub fn path(&self) -> LineString<f64> {
        self.points
            .iter()
            .map(|p| (p.position.lng, p.position.lat))
            .collect::<Vec<_>>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    /// Degrees of longitude spanning one kilometer on the equator.
    const KM_DEG: f64 = 1.0 / 111.195_08;

    fn straight_track(n: usize) -> Track {
        let raw: Vec<GeoPoint> = (0..n).map(|i| GeoPoint::new(0.0, i as f64 * KM_DEG)).collect();
        Track::build(&raw).unwrap()
    }

    #[test]
    fn test_build_annotates_cumulative_distance() {
        let track = straight_track(3);

        assert_eq!(track.points()[0].track_km, 0.0);
        assert_relative_eq!(track.points()[1].track_km, 1.0, epsilon = 1e-3);
        assert_relative_eq!(track.points()[2].track_km, 2.0, epsilon = 1e-3);
        assert_eq!(track.length_km(), track.points()[2].track_km);
    }

    #[test]
    fn test_build_rejects_short_tracks() {
        assert!(matches!(
            Track::build(&[]),
            Err(RailTrailError::InvalidTrackGeometry(_))
        ));
        assert!(matches!(
            Track::build(&[GeoPoint::new(54.0, 10.0)]),
            Err(RailTrailError::InvalidTrackGeometry(_))
        ));
    }

    #[test]
    fn test_build_rejects_non_finite_coordinates() {
        let raw = [GeoPoint::new(54.0, 10.0), GeoPoint::new(f64::NAN, 10.1)];
        assert!(matches!(
            Track::build(&raw),
            Err(RailTrailError::InvalidTrackGeometry(_))
        ));
    }

    #[test]
    fn test_duplicate_points_keep_annotation_flat() {
        let raw = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, KM_DEG),
            GeoPoint::new(0.0, KM_DEG),
            GeoPoint::new(0.0, 2.0 * KM_DEG),
        ];
        let track = Track::build(&raw).unwrap();
        assert_eq!(track.points()[1].track_km, track.points()[2].track_km);
    }

    #[test]
    fn test_segment_at() {
        let track = straight_track(4);

        assert_eq!(track.segment_at(0.0), Some((0, 1)));
        assert_eq!(track.segment_at(0.5), Some((0, 1)));
        assert_eq!(track.segment_at(track.points()[1].track_km), Some((0, 1)));
        assert_eq!(track.segment_at(1.5), Some((1, 2)));
        assert_eq!(track.segment_at(100.0), Some((2, 3)));
        assert_eq!(track.segment_at(-4.0), Some((0, 1)));
    }

    #[test]
    fn test_percentage_of() {
        let track = straight_track(3);
        let length = track.length_km();

        assert_eq!(track.percentage_of(0.0), Some(0.0));
        assert_relative_eq!(track.percentage_of(length / 2.0).unwrap(), 50.0);
        assert_eq!(track.percentage_of(length), Some(100.0));
        assert_eq!(track.percentage_of(length + 0.1), None);
        assert_eq!(track.percentage_of(-0.1), None);
    }

    #[test]
    fn test_path_and_labels() {
        let track = straight_track(3).with_labels("Malente", "Lütjenburg");
        assert_eq!(track.start_label, "Malente");
        assert_eq!(track.end_label, "Lütjenburg");
        assert_eq!(track.path().0.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_annotation_is_monotonic(
            coords in prop::collection::vec((-60.0f64..60.0, -170.0f64..170.0), 2..40)
        ) {
            let raw: Vec<GeoPoint> =
                coords.iter().map(|&(lat, lng)| GeoPoint::new(lat, lng)).collect();
            let track = Track::build(&raw).unwrap();
            let points = track.points();

            prop_assert_eq!(points[0].track_km, 0.0);
            prop_assert_eq!(points[points.len() - 1].track_km, track.length_km());
            for pair in points.windows(2) {
                prop_assert!(pair[1].track_km >= pair[0].track_km);
            }
        }
    }
}
