//! The "PROXIMITY" Queries - what is ahead, what is behind
//!
//! Everything on a track (points of interest, other vehicles) reduces to a
//! trackKm. Proximity queries compare those against an origin trackKm,
//! optionally keep only one direction and a maximum distance, and sort by the
//! remaining distance along the track.
//!
//! The origin itself is resolved elsewhere (see [`QueryOrigin`]); the
//! functions here only ever see a plain trackKm.

use railtrail_env::{GeoPoint, TrackId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::heading::TravelDirection;

// ============================================================================
// LOCATED ITEMS
// ============================================================================

/// Anything with a position along a track.
pub trait TrackLocated {
    fn track_km(&self) -> f64;
}

/// Category of a point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoiKind {
    /// Road crossing with barriers or signals
    LevelCrossing,

    /// Unsecured farm or path crossing
    LesserLevelCrossing,

    Picnic,

    /// End of the usable track, draisines turn here
    TrackEnd,

    Generic,
}

impl PoiKind {
    /// Crossings trigger rider warnings.
    pub fn is_crossing(self) -> bool {
        matches!(self, Self::LevelCrossing | Self::LesserLevelCrossing)
    }
}

/// A point of interest on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: u32,
    pub name: String,
    pub kind: PoiKind,
    pub track_id: TrackId,

    /// Position as entered, not snapped to the track
    pub position: GeoPoint,

    /// Projected position along the track, recomputed whenever the track
    /// geometry is replaced
    pub track_km: f64,

    /// Riders may turn their draisine around here
    pub is_turning_point: bool,
}

impl TrackLocated for Poi {
    fn track_km(&self) -> f64 {
        self.track_km
    }
}

impl TrackLocated for f64 {
    fn track_km(&self) -> f64 {
        *self
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Where a proximity query starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QueryOrigin {
    /// An arbitrary coordinate, projected onto the track
    Point(GeoPoint),

    /// The current estimate of a vehicle
    Vehicle(VehicleId),
}

/// Filters of a `nearby` query. All of them are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NearbyQuery {
    /// Keep at most this many results (default: all matches)
    pub count: Option<usize>,

    /// `Forward` keeps items at or beyond the origin, `Backward` items at or
    /// before it, `Unknown` keeps both sides
    pub direction: TravelDirection,

    /// Drop items further away than this along the track
    pub max_distance_km: Option<f64>,
}

impl NearbyQuery {
    /// The single nearest match.
    pub fn nearest() -> Self {
        Self {
            count: Some(1),
            ..Self::default()
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_direction(mut self, direction: TravelDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_max_distance_km(mut self, km: f64) -> Self {
        self.max_distance_km = Some(km);
        self
    }

    /// True if an item `delta_km` away from the origin passes the filters.
    fn accepts(&self, delta_km: f64) -> bool {
        let side_ok = match self.direction {
            TravelDirection::Forward => delta_km >= 0.0,
            TravelDirection::Backward => delta_km <= 0.0,
            TravelDirection::Unknown => true,
        };
        let distance_ok = self
            .max_distance_km
            .map_or(true, |max| delta_km.abs() <= max);
        side_ok && distance_ok
    }
}

/// A query result: the item and its signed distance from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearby<'a, T> {
    pub item: &'a T,

    /// `item.track_km() - origin_km`; positive means ahead in trackKm terms
    pub delta_km: f64,
}

impl<T> Nearby<'_, T> {
    pub fn distance_km(&self) -> f64 {
        self.delta_km.abs()
    }
}

/// Items passing the query's filters, nearest first.
///
/// Equally distant items keep their input order.
pub fn nearby<'a, T, I>(items: I, origin_km: f64, query: &NearbyQuery) -> Vec<Nearby<'a, T>>
where
    T: TrackLocated + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut matches: Vec<Nearby<'a, T>> = items
        .into_iter()
        .map(|item| Nearby {
            item,
            delta_km: item.track_km() - origin_km,
        })
        .filter(|n| n.delta_km.is_finite() && query.accepts(n.delta_km))
        .collect();

    matches.sort_by(|a, b| a.distance_km().total_cmp(&b.distance_km()));
    if let Some(count) = query.count {
        matches.truncate(count);
    }
    matches
}

/// Nearby points of interest, optionally restricted to one kind.
pub fn nearby_pois<'a, I>(
    pois: I,
    origin_km: f64,
    kind: Option<PoiKind>,
    query: &NearbyQuery,
) -> Vec<Nearby<'a, Poi>>
where
    I: IntoIterator<Item = &'a Poi>,
{
    nearby(
        pois.into_iter()
            .filter(|poi| kind.map_or(true, |k| poi.kind == k)),
        origin_km,
        query,
    )
}

/// The nearest POI in `direction` from `origin_km`, or `None`.
///
/// `Unknown` looks both ways.
pub fn next_poi<'a, I>(
    pois: I,
    origin_km: f64,
    kind: Option<PoiKind>,
    direction: TravelDirection,
) -> Option<Nearby<'a, Poi>>
where
    I: IntoIterator<Item = &'a Poi>,
{
    let query = NearbyQuery::nearest().with_direction(direction);
    nearby_pois(pois, origin_km, kind, &query).into_iter().next()
}
