//! The position service - ingestion and queries on top of the engines.
//!
//! [`PositionService`] wires the stateless engines to their data sources: a
//! [`ReportLog`] for location history, a [`RailTrailContext`] for "now" and
//! the shared [`TrackRegistry`]. It holds no mutable state of its own, so any
//! number of requests for different vehicles can run concurrently.

use std::sync::Arc;

use railtrail_env::{LocationReport, RailTrailContext, ReportLog, TrackId, VehicleId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{RailTrailError, Result};
use crate::fusion::{Freshness, LocationFusionEngine, VehiclePositionEstimate};
use crate::heading::{heads_towards, is_oncoming, TravelDirection};
use crate::projection::PositionProjector;
use crate::proximity::{self, NearbyQuery, Poi, PoiKind, QueryOrigin, TrackLocated};
use crate::registry::{TrackEntry, TrackRegistry};

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Another vehicle's current estimate, as seen from a query origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyVehicle {
    pub vehicle_id: VehicleId,
    pub estimate: VehiclePositionEstimate,
}

impl TrackLocated for NearbyVehicle {
    fn track_km(&self) -> f64 {
        self.estimate.track_km
    }
}

/// A vehicle near the rider, reported in the vehicle update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSighting {
    pub vehicle_id: VehicleId,
    pub track_km: f64,

    /// Signed distance along the track from the rider, in kilometers
    pub delta_km: f64,

    pub direction: TravelDirection,

    /// The other vehicle is moving towards the rider
    pub heading_towards_user: bool,

    /// Both vehicles move and approach each other head-on
    pub oncoming: bool,

    pub freshness: Freshness,
}

/// The next crossing in the rider's direction of travel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiSighting {
    pub poi_id: u32,
    pub name: String,
    pub kind: PoiKind,
    pub delta_km: f64,
}

/// Everything a rider's app needs after sending its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleUpdate {
    pub vehicle_id: VehicleId,
    pub track_id: TrackId,
    pub estimate: VehiclePositionEstimate,

    /// 0 at the track start, 100 at the end
    pub percentage_position: Option<f64>,

    pub heading_deg: Option<f64>,
    pub speed_kmh: f64,

    /// Other vehicles on the track, nearest first
    pub vehicles: Vec<VehicleSighting>,

    pub next_crossing: Option<PoiSighting>,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Ingestion and query facade over the positioning engines.
pub struct PositionService<L: ReportLog, C: RailTrailContext> {
    log: Arc<L>,
    context: Arc<C>,
    registry: Arc<TrackRegistry>,
    projector: PositionProjector,
    engine: LocationFusionEngine,
}

impl<L: ReportLog, C: RailTrailContext> PositionService<L, C> {
    pub fn new(
        log: Arc<L>,
        context: Arc<C>,
        registry: Arc<TrackRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            log,
            context,
            registry,
            projector: PositionProjector::new(config.projection.clone()),
            engine: LocationFusionEngine::new(config.fusion, config.projection),
        }
    }

    pub fn registry(&self) -> &Arc<TrackRegistry> {
        &self.registry
    }

    pub fn log(&self) -> &Arc<L> {
        &self.log
    }

    // ========================================================================
    // INGESTION
    // ========================================================================

    /// Validates a report and appends it to the log.
    pub async fn ingest(&self, report: LocationReport) -> Result<()> {
        if let Err(e) = validate_report(&report) {
            warn!("Rejected report from vehicle {}: {}", report.vehicle_id, e);
            return Err(e);
        }
        self.log.append(report).await?;
        Ok(())
    }

    // ========================================================================
    // POSITION QUERIES
    // ========================================================================

    /// Current estimate of `vehicle` on the given track.
    ///
    /// `Ok(None)` means the vehicle has never reported.
    pub async fn vehicle_position(
        &self,
        vehicle: &VehicleId,
        track_id: TrackId,
    ) -> Result<Option<VehiclePositionEstimate>> {
        let entry = self.registry.get(track_id).await?;
        self.estimate_on(vehicle, &entry).await
    }

    /// Current estimate of `vehicle` on the track it is assigned to.
    pub async fn assigned_position(&self, vehicle: &VehicleId) -> Result<VehiclePositionEstimate> {
        let track_id = self
            .registry
            .track_of(vehicle)
            .await
            .ok_or(RailTrailError::UnknownVehicle(*vehicle))?;
        self.vehicle_position(vehicle, track_id)
            .await?
            .ok_or(RailTrailError::UnknownVehicle(*vehicle))
    }

    async fn estimate_on(
        &self,
        vehicle: &VehicleId,
        entry: &TrackEntry,
    ) -> Result<Option<VehiclePositionEstimate>> {
        let now = self.context.now_secs();
        let since = now - self.engine.config().max_window_secs();

        // Open upper bound: fixes stamped slightly ahead of our clock count as new
        let recent = self.log.window(vehicle, since, f64::INFINITY).await?;
        let last_known = self.log.latest(vehicle).await?;

        self.engine
            .estimate(&entry.track, &recent, last_known.as_ref(), now)
    }

    /// Resolves a query origin to a trackKm on the given track.
    pub async fn resolve_origin(&self, origin: QueryOrigin, entry: &TrackEntry) -> Result<f64> {
        match origin {
            QueryOrigin::Point(point) => Ok(self.projector.project(point, &entry.track)?.track_km),
            QueryOrigin::Vehicle(vehicle) => self
                .estimate_on(&vehicle, entry)
                .await?
                .map(|estimate| estimate.track_km)
                .ok_or(RailTrailError::UnknownVehicle(vehicle)),
        }
    }

    // ========================================================================
    // PROXIMITY QUERIES
    // ========================================================================

    /// Nearest POI of `kind` (any kind if `None`) from `origin` in `direction`.
    pub async fn next_poi(
        &self,
        track_id: TrackId,
        origin: QueryOrigin,
        kind: Option<PoiKind>,
        direction: TravelDirection,
    ) -> Result<Option<(Poi, f64)>> {
        let entry = self.registry.get(track_id).await?;
        let origin_km = self.resolve_origin(origin, &entry).await?;

        Ok(proximity::next_poi(&entry.pois, origin_km, kind, direction)
            .map(|hit| (hit.item.clone(), hit.delta_km)))
    }

    /// POIs around `origin` that pass `query`, nearest first.
    pub async fn nearby_pois(
        &self,
        track_id: TrackId,
        origin: QueryOrigin,
        kind: Option<PoiKind>,
        query: &NearbyQuery,
    ) -> Result<Vec<(Poi, f64)>> {
        let entry = self.registry.get(track_id).await?;
        let origin_km = self.resolve_origin(origin, &entry).await?;

        Ok(proximity::nearby_pois(&entry.pois, origin_km, kind, query)
            .into_iter()
            .map(|hit| (hit.item.clone(), hit.delta_km))
            .collect())
    }

    /// Vehicles on the track around `origin` that pass `query`, nearest
    /// first. A vehicle origin is never part of its own result.
    pub async fn nearby_vehicles(
        &self,
        track_id: TrackId,
        origin: QueryOrigin,
        query: &NearbyQuery,
    ) -> Result<Vec<(NearbyVehicle, f64)>> {
        let entry = self.registry.get(track_id).await?;
        let origin_km = self.resolve_origin(origin, &entry).await?;

        let exclude = match origin {
            QueryOrigin::Vehicle(vehicle) => Some(vehicle),
            QueryOrigin::Point(_) => None,
        };
        let others = self.other_vehicles(&entry, exclude).await?;

        Ok(proximity::nearby(&others, origin_km, query)
            .into_iter()
            .map(|hit| (hit.item.clone(), hit.delta_km))
            .collect())
    }

    async fn other_vehicles(
        &self,
        entry: &TrackEntry,
        exclude: Option<VehicleId>,
    ) -> Result<Vec<NearbyVehicle>> {
        let mut others = Vec::new();
        for vehicle_id in self.registry.vehicles_on(entry.id).await {
            if Some(vehicle_id) == exclude {
                continue;
            }
            if let Some(estimate) = self.estimate_on(&vehicle_id, entry).await? {
                others.push(NearbyVehicle {
                    vehicle_id,
                    estimate,
                });
            }
        }
        Ok(others)
    }

    // ========================================================================
    // VEHICLE UPDATE
    // ========================================================================

    /// The full picture for a rider: own position, the other vehicles on the
    /// track and the next crossing ahead.
    pub async fn vehicle_update(&self, vehicle: &VehicleId) -> Result<VehicleUpdate> {
        let track_id = self
            .registry
            .track_of(vehicle)
            .await
            .ok_or(RailTrailError::UnknownVehicle(*vehicle))?;
        let entry = self.registry.get(track_id).await?;

        let estimate = self
            .estimate_on(vehicle, &entry)
            .await?
            .ok_or(RailTrailError::UnknownVehicle(*vehicle))?;
        let own_km = estimate.track_km;

        let others = self.other_vehicles(&entry, Some(*vehicle)).await?;
        let vehicles: Vec<VehicleSighting> =
            proximity::nearby(&others, own_km, &NearbyQuery::default())
                .into_iter()
                .map(|hit| {
                    let other = &hit.item.estimate;
                    VehicleSighting {
                        vehicle_id: hit.item.vehicle_id,
                        track_km: other.track_km,
                        delta_km: hit.delta_km,
                        direction: other.direction,
                        heading_towards_user: heads_towards(
                            other.track_km,
                            other.direction,
                            own_km,
                        ),
                        oncoming: is_oncoming(estimate.direction, other.direction)
                            && heads_towards(own_km, estimate.direction, other.track_km),
                        freshness: other.freshness,
                    }
                })
                .collect();

        let crossings: Vec<&Poi> = entry.pois.iter().filter(|p| p.kind.is_crossing()).collect();
        let next_crossing =
            proximity::next_poi(crossings.iter().copied(), own_km, None, estimate.direction).map(
                |hit| PoiSighting {
                    poi_id: hit.item.id,
                    name: hit.item.name.clone(),
                    kind: hit.item.kind,
                    delta_km: hit.delta_km,
                },
            );

        debug!(
            "Update for {}: km {:.3}, {} other vehicles, next crossing {:?}",
            vehicle,
            own_km,
            vehicles.len(),
            next_crossing.as_ref().map(|c| c.delta_km)
        );

        Ok(VehicleUpdate {
            vehicle_id: *vehicle,
            track_id,
            percentage_position: entry.track.percentage_of(own_km),
            heading_deg: estimate.heading_deg,
            speed_kmh: estimate.speed_kmh,
            estimate,
            vehicles,
            next_crossing,
        })
    }
}

/// Rejects reports that would poison projection or fusion.
fn validate_report(report: &LocationReport) -> Result<()> {
    if !report.timestamp.is_finite() {
        return Err(RailTrailError::InvalidReport(format!(
            "non-finite timestamp {}",
            report.timestamp
        )));
    }
    if !report.position.is_valid() {
        return Err(RailTrailError::InvalidReport(format!(
            "invalid position ({}, {})",
            report.position.lat, report.position.lng
        )));
    }
    if let Some(speed) = report.speed_kmh {
        if !(speed.is_finite() && speed >= 0.0) {
            return Err(RailTrailError::InvalidReport(format!("invalid speed {}", speed)));
        }
    }
    if let Some(heading) = report.heading_deg {
        if !heading.is_finite() {
            return Err(RailTrailError::InvalidReport(format!("invalid heading {}", heading)));
        }
    }
    Ok(())
}
