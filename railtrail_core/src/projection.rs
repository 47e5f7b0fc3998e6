//! The "PROJECTION" Engine - mapping GPS fixes onto a track
//!
//! Solves "where on the line is this fix?" in three steps:
//! 1. **Segment search**: for every segment, drop a perpendicular in a local
//!    equirectangular frame and measure the great-circle distance to it
//! 2. **Selection**: keep the segment with the smallest off-track distance
//!    (first one wins ties)
//! 3. **Interpolation**: split the segment's trackKm span by the ratio of the
//!    distances to its two end points, snapping to a vertex when the foot
//!    point sits on it
//!
//! The inverse mapping, trackKm → coordinate, is [`point_at_track_km`].

use nalgebra::Vector2;
use railtrail_env::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::config::ProjectionConfig;
use crate::error::{RailTrailError, Result};
use crate::track_geometry::{haversine_m, Track};

/// Mean earth radius in meters, matching the radius used by `geo`'s haversine.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Which track points the projection was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bracket {
    /// The foot point coincides with this vertex; its trackKm was used as-is
    Exact(usize),

    /// The foot point lies strictly inside the segment between these vertices
    Segment(usize, usize),
}

/// A position mapped onto a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Distance along the track, always within `[0, length]`
    pub track_km: f64,

    /// Great-circle distance between the input and the track, in meters
    pub off_track_m: f64,

    /// The foot point on the track
    pub position: GeoPoint,

    pub bracket: Bracket,
}

// ============================================================================
// PROJECTOR
// ============================================================================

/// Projects arbitrary coordinates onto tracks.
#[derive(Debug, Clone, Default)]
pub struct PositionProjector {
    config: ProjectionConfig,
}

impl PositionProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Projects `point` onto the closest location of `track`.
    ///
    /// Points beyond either end of the track clamp to that end; there is no
    /// extrapolation.
    pub fn project(&self, point: GeoPoint, track: &Track) -> Result<Projection> {
        if !point.is_valid() {
            return Err(RailTrailError::projection(format!(
                "cannot project invalid coordinate ({}, {})",
                point.lat, point.lng
            )));
        }

        let points = track.points();
        if points.len() < 2 {
            return Err(RailTrailError::projection(format!(
                "track has {} points, no segment to project onto",
                points.len()
            )));
        }

        // Stage 1 & 2: closest segment (strict < keeps the first on ties)
        let mut best: Option<(usize, GeoPoint, f64)> = None;
        for (idx, pair) in points.windows(2).enumerate() {
            let foot = foot_point(point, pair[0].position, pair[1].position);
            let dist = haversine_m(point, foot);
            if best.map_or(true, |(_, _, best_dist)| dist < best_dist) {
                best = Some((idx, foot, dist));
            }
        }

        let (idx, foot, off_track_m) = best.ok_or_else(|| {
            RailTrailError::projection("no bracketing pair of track points resolved")
        })?;

        // Stage 3: interpolate (or snap to a vertex)
        let p0 = points[idx];
        let p1 = points[idx + 1];
        let d0 = haversine_m(p0.position, foot);
        let d1 = haversine_m(foot, p1.position);
        let eps = self.config.vertex_epsilon_m;

        let (track_km, bracket) = if d0 <= eps {
            (p0.track_km, Bracket::Exact(idx))
        } else if d1 <= eps {
            (p1.track_km, Bracket::Exact(idx + 1))
        } else {
            let ratio = d0 / (d0 + d1);
            (
                p0.track_km + ratio * (p1.track_km - p0.track_km),
                Bracket::Segment(idx, idx + 1),
            )
        };

        Ok(Projection {
            track_km: track.clamp_km(track_km),
            off_track_m,
            position: foot,
            bracket,
        })
    }

    /// Projects `point` onto every candidate and keeps the closest track.
    ///
    /// Returns the candidate's index together with its projection, or `None`
    /// when there are no candidates. Ties go to the earlier candidate.
    pub fn project_on_nearest_track<'a, I>(
        &self,
        point: GeoPoint,
        candidates: I,
    ) -> Result<Option<(usize, Projection)>>
    where
        I: IntoIterator<Item = &'a Track>,
    {
        let mut best: Option<(usize, Projection)> = None;
        for (idx, track) in candidates.into_iter().enumerate() {
            let projection = self.project(point, track)?;
            if best
                .as_ref()
                .map_or(true, |(_, b)| projection.off_track_m < b.off_track_m)
            {
                best = Some((idx, projection));
            }
        }
        Ok(best)
    }
}

// ============================================================================
// GEOMETRY HELPERS
// ============================================================================

/// Foot of the perpendicular from `q` onto segment `a`–`b`, clamped to the
/// segment.
///
/// Works in an equirectangular frame centered on `a`; rail-trail segments are
/// short enough for the flat-earth error to vanish next to GPS noise.
fn foot_point(q: GeoPoint, a: GeoPoint, b: GeoPoint) -> GeoPoint {
    let cos_lat = ((a.lat + b.lat) / 2.0).to_radians().cos();
    let to_local = |p: GeoPoint| {
        Vector2::new(
            (p.lng - a.lng).to_radians() * EARTH_RADIUS_M * cos_lat,
            (p.lat - a.lat).to_radians() * EARTH_RADIUS_M,
        )
    };

    let ab = to_local(b);
    let aq = to_local(q);
    let len_sq = ab.norm_squared();

    let t = if len_sq <= f64::EPSILON {
        0.0
    } else {
        (aq.dot(&ab) / len_sq).clamp(0.0, 1.0)
    };

    lerp(a, b, t)
}

#[inline]
fn lerp(a: GeoPoint, b: GeoPoint, t: f64) -> GeoPoint {
    GeoPoint::new(a.lat + t * (b.lat - a.lat), a.lng + t * (b.lng - a.lng))
}

/// Coordinate of the point `km` kilometers along `track`.
///
/// Walks the cumulative-distance table to the bracketing pair and
/// interpolates linearly between them. `km` is clamped to `[0, length]`.
pub fn point_at_track_km(track: &Track, km: f64) -> Result<GeoPoint> {
    let (i, j) = track.segment_at(km).ok_or_else(|| {
        RailTrailError::projection(format!("no bracketing pair for trackKm {}", km))
    })?;

    let points = track.points();
    let (p0, p1) = (points[i], points[j]);
    let span = p1.track_km - p0.track_km;
    if span <= 0.0 {
        return Ok(p0.position);
    }

    let t = ((track.clamp_km(km) - p0.track_km) / span).clamp(0.0, 1.0);
    Ok(lerp(p0.position, p1.position, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const KM_DEG: f64 = 1.0 / 111.195_08;

    /// Three points one kilometer apart along the equator.
    fn equator_track() -> Track {
        Track::build(&[
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, KM_DEG),
            GeoPoint::new(0.0, 2.0 * KM_DEG),
        ])
        .unwrap()
    }

    #[test]
    fn test_point_at_middle_vertex_is_exact() {
        let track = equator_track();
        let projector = PositionProjector::default();

        let projection = projector.project(GeoPoint::new(0.0, KM_DEG), &track).unwrap();

        assert_eq!(projection.track_km, track.points()[1].track_km);
        assert_eq!(projection.bracket, Bracket::Exact(1));
        assert!(projection.off_track_m < 1e-6);
    }

    #[test]
    fn test_off_track_point_interpolates() {
        let track = equator_track();
        let projector = PositionProjector::default();

        // ~11 m north of the middle of the first segment
        let projection = projector
            .project(GeoPoint::new(0.0001, 0.5 * KM_DEG), &track)
            .unwrap();

        assert_relative_eq!(projection.track_km, 0.5, epsilon = 1e-3);
        assert_relative_eq!(projection.off_track_m, 11.12, epsilon = 0.05);
        assert_eq!(projection.bracket, Bracket::Segment(0, 1));
    }

    #[test]
    fn test_clamps_at_track_ends() {
        let track = equator_track();
        let projector = PositionProjector::default();

        let before = projector.project(GeoPoint::new(0.0, -KM_DEG), &track).unwrap();
        assert_eq!(before.track_km, 0.0);
        assert_eq!(before.bracket, Bracket::Exact(0));
        assert_relative_eq!(before.off_track_m, 1000.0, epsilon = 1.0);

        let after = projector.project(GeoPoint::new(0.0, 5.0 * KM_DEG), &track).unwrap();
        assert_eq!(after.track_km, track.length_km());
    }

    #[test]
    fn test_rejects_invalid_point() {
        let track = equator_track();
        let projector = PositionProjector::default();
        let result = projector.project(GeoPoint::new(f64::NAN, 0.0), &track);
        assert!(matches!(result, Err(RailTrailError::ProjectionFailure(_))));
    }

    #[test]
    fn test_nearest_track_selection() {
        let projector = PositionProjector::default();
        let near = equator_track();
        let far = Track::build(&[GeoPoint::new(0.01, 0.0), GeoPoint::new(0.01, 0.02)]).unwrap();

        let point = GeoPoint::new(0.001, 0.005);
        let (idx, projection) = projector
            .project_on_nearest_track(point, [&far, &near])
            .unwrap()
            .unwrap();

        assert_eq!(idx, 1);
        assert!(projection.off_track_m < 200.0);

        let none = projector
            .project_on_nearest_track(point, std::iter::empty::<&Track>())
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_nearest_track_tie_goes_to_first() {
        let projector = PositionProjector::default();
        let a = equator_track();
        let b = equator_track();

        let (idx, _) = projector
            .project_on_nearest_track(GeoPoint::new(0.0005, 0.5 * KM_DEG), [&a, &b])
            .unwrap()
            .unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn test_point_at_track_km() {
        let track = equator_track();

        let start = point_at_track_km(&track, 0.0).unwrap();
        assert_eq!(start, track.points()[0].position);

        let end = point_at_track_km(&track, 99.0).unwrap();
        assert_eq!(end, track.points()[2].position);

        let mid = point_at_track_km(&track, track.points()[1].track_km / 2.0).unwrap();
        assert_relative_eq!(mid.lng, 0.5 * KM_DEG, epsilon = 1e-9);
        assert_relative_eq!(mid.lat, 0.0, epsilon = 1e-12);
    }

    fn monotone_track() -> impl Strategy<Value = Track> {
        prop::collection::vec((0.0005f64..0.01, -0.01f64..0.01), 1..25).prop_map(|steps| {
            let mut raw = vec![GeoPoint::new(54.17, 10.55)];
            for (dlng, dlat) in steps {
                let last = raw[raw.len() - 1];
                raw.push(GeoPoint::new(last.lat + dlat, last.lng + dlng));
            }
            Track::build(&raw).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip(track in monotone_track(), fraction in 0.0f64..=1.0) {
            let projector = PositionProjector::default();
            let km = fraction * track.length_km();

            let point = point_at_track_km(&track, km).unwrap();
            let projection = projector.project(point, &track).unwrap();

            prop_assert!((projection.track_km - km).abs() < 1e-3,
                "expected {} got {}", km, projection.track_km);
        }

        #[test]
        fn prop_projection_within_track(
            track in monotone_track(),
            lat in 54.0f64..54.4,
            lng in 10.4f64..10.9,
        ) {
            let projector = PositionProjector::default();
            let projection = projector.project(GeoPoint::new(lat, lng), &track).unwrap();

            prop_assert!(projection.track_km >= 0.0);
            prop_assert!(projection.track_km <= track.length_km());
            prop_assert!(projection.off_track_m >= 0.0);
        }
    }
}
