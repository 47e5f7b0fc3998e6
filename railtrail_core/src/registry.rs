//! Track and POI registry.
//!
//! The read-mostly table of annotated tracks, their points of interest and
//! the vehicle→track assignment. Replacing a track rebuilds it outside the
//! lock and swaps the whole entry in one write, re-projecting the track's
//! POIs on the way, so readers only ever see a fully annotated track.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use railtrail_env::{GeoPoint, TrackId, VehicleId};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::ProjectionConfig;
use crate::error::{RailTrailError, Result};
use crate::projection::{PositionProjector, Projection};
use crate::proximity::{Poi, PoiKind};
use crate::track_geometry::Track;

/// An annotated track together with its points of interest.
#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub id: TrackId,
    pub track: Arc<Track>,
    pub pois: Vec<Poi>,
}

/// A point of interest before it is placed on a track.
#[derive(Debug, Clone)]
pub struct NewPoi {
    pub name: String,
    pub kind: PoiKind,
    pub position: GeoPoint,

    /// `None` attaches the POI to the closest track
    pub track_id: Option<TrackId>,

    pub is_turning_point: bool,
}

impl NewPoi {
    pub fn new(name: impl Into<String>, kind: PoiKind, position: GeoPoint) -> Self {
        Self {
            name: name.into(),
            kind,
            position,
            track_id: None,
            is_turning_point: false,
        }
    }

    pub fn on_track(mut self, track_id: TrackId) -> Self {
        self.track_id = Some(track_id);
        self
    }

    pub fn turning_point(mut self) -> Self {
        self.is_turning_point = true;
        self
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    tracks: BTreeMap<TrackId, Arc<TrackEntry>>,
    assignments: HashMap<VehicleId, TrackId>,
    next_track_id: u32,
    next_poi_id: u32,
}

impl RegistryState {
    fn entry(&self, id: TrackId) -> Result<&Arc<TrackEntry>> {
        self.tracks.get(&id).ok_or(RailTrailError::TrackNotFound(id))
    }
}

/// Shared table of tracks, POIs and vehicle assignments.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    projector: PositionProjector,
    state: RwLock<RegistryState>,
}

impl TrackRegistry {
    pub fn new(config: ProjectionConfig) -> Self {
        Self {
            projector: PositionProjector::new(config),
            state: RwLock::new(RegistryState::default()),
        }
    }

    // ========================================================================
    // TRACKS
    // ========================================================================

    /// Builds and stores a new track, returning its annotated entry.
    pub async fn insert_track(
        &self,
        start_label: &str,
        end_label: &str,
        raw: &[GeoPoint],
    ) -> Result<Arc<TrackEntry>> {
        let track = Arc::new(Track::build(raw)?.with_labels(start_label, end_label));

        let mut state = self.state.write().await;
        state.next_track_id += 1;
        let id = TrackId(state.next_track_id);

        let entry = Arc::new(TrackEntry {
            id,
            track,
            pois: Vec::new(),
        });
        state.tracks.insert(id, entry.clone());

        info!(
            "Inserted {} ({} -> {}, {:.3} km, {} points)",
            id,
            start_label,
            end_label,
            entry.track.length_km(),
            entry.track.len()
        );
        Ok(entry)
    }

    /// Replaces the geometry of an existing track.
    ///
    /// The new track is fully annotated before the swap and every POI of the
    /// track gets a fresh trackKm. On error the old entry stays untouched.
    pub async fn replace_track(
        &self,
        id: TrackId,
        start_label: &str,
        end_label: &str,
        raw: &[GeoPoint],
    ) -> Result<Arc<TrackEntry>> {
        let track = Arc::new(Track::build(raw)?.with_labels(start_label, end_label));

        let mut state = self.state.write().await;
        let old = state.entry(id)?.clone();

        let mut pois = Vec::with_capacity(old.pois.len());
        for poi in &old.pois {
            let projection = self.projector.project(poi.position, &track)?;
            pois.push(Poi {
                track_km: projection.track_km,
                ..poi.clone()
            });
        }

        let entry = Arc::new(TrackEntry { id, track, pois });
        state.tracks.insert(id, entry.clone());

        info!(
            "Replaced {} ({:.3} km -> {:.3} km, {} POIs re-projected)",
            id,
            old.track.length_km(),
            entry.track.length_km(),
            entry.pois.len()
        );
        Ok(entry)
    }

    pub async fn get(&self, id: TrackId) -> Result<Arc<TrackEntry>> {
        self.state.read().await.entry(id).cloned()
    }

    /// All tracks ordered by id.
    pub async fn tracks(&self) -> Vec<Arc<TrackEntry>> {
        self.state.read().await.tracks.values().cloned().collect()
    }

    /// The track passing closest to `point`, with the projection onto it.
    pub async fn closest_track(
        &self,
        point: GeoPoint,
    ) -> Result<Option<(Arc<TrackEntry>, Projection)>> {
        let entries = self.tracks().await;
        let nearest = self
            .projector
            .project_on_nearest_track(point, entries.iter().map(|e| e.track.as_ref()))?;
        Ok(nearest.map(|(idx, projection)| (entries[idx].clone(), projection)))
    }

    // ========================================================================
    // POINTS OF INTEREST
    // ========================================================================

    /// Places a POI on its track (or the closest one) and stores it.
    pub async fn add_poi(&self, new: NewPoi) -> Result<Poi> {
        if !new.position.is_valid() {
            return Err(RailTrailError::projection(format!(
                "POI '{}' has invalid coordinates",
                new.name
            )));
        }

        let track_id = match new.track_id {
            Some(id) => id,
            None => self
                .closest_track(new.position)
                .await?
                .map(|(entry, _)| entry.id)
                .ok_or_else(|| RailTrailError::projection("no track to attach the POI to"))?,
        };

        let mut state = self.state.write().await;
        let current = state.entry(track_id)?.clone();
        let projection = self.projector.project(new.position, &current.track)?;

        state.next_poi_id += 1;
        let poi = Poi {
            id: state.next_poi_id,
            name: new.name,
            kind: new.kind,
            track_id,
            position: new.position,
            track_km: projection.track_km,
            is_turning_point: new.is_turning_point,
        };

        let mut pois = current.pois.clone();
        pois.push(poi.clone());
        pois.sort_by(|a, b| a.track_km.total_cmp(&b.track_km));
        state.tracks.insert(
            track_id,
            Arc::new(TrackEntry {
                id: track_id,
                track: current.track.clone(),
                pois,
            }),
        );

        debug!("Added POI {} '{}' at km {:.3} on {}", poi.id, poi.name, poi.track_km, track_id);
        Ok(poi)
    }

    /// POIs of a track in trackKm order, optionally only one kind.
    pub async fn pois(&self, track_id: TrackId, kind: Option<PoiKind>) -> Result<Vec<Poi>> {
        let entry = self.get(track_id).await?;
        Ok(entry
            .pois
            .iter()
            .filter(|poi| kind.map_or(true, |k| poi.kind == k))
            .cloned()
            .collect())
    }

    // ========================================================================
    // VEHICLES
    // ========================================================================

    /// Puts a vehicle on a track, replacing any earlier assignment.
    pub async fn assign_vehicle(&self, vehicle: VehicleId, track_id: TrackId) -> Result<()> {
        let mut state = self.state.write().await;
        state.entry(track_id)?;
        state.assignments.insert(vehicle, track_id);
        debug!("Vehicle {} assigned to {}", vehicle, track_id);
        Ok(())
    }

    pub async fn track_of(&self, vehicle: &VehicleId) -> Option<TrackId> {
        self.state.read().await.assignments.get(vehicle).copied()
    }

    /// Vehicles assigned to a track, sorted.
    pub async fn vehicles_on(&self, track_id: TrackId) -> Vec<VehicleId> {
        let state = self.state.read().await;
        let mut vehicles: Vec<VehicleId> = state
            .assignments
            .iter()
            .filter(|(_, t)| **t == track_id)
            .map(|(v, _)| *v)
            .collect();
        vehicles.sort();
        vehicles
    }
}
