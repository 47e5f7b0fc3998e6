//! SimWorld - The simulation harness container.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use railtrail_core::{
    point_at_track_km, EngineConfig, NewPoi, Poi, PoiKind, PositionService, Track, TrackRegistry,
    TravelDirection,
};
use railtrail_env::{GeoPoint, MemoryReportLog, RailTrailContext, TrackId, VehicleId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::SimContext;
use crate::error::SimError;
use crate::oracle::{Oracle, SensorConfig};
use crate::warnings::WarningConfig;

/// Kilometers per degree of latitude (mean earth radius).
const KM_PER_DEG: f64 = 111.195_08;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Virtual seconds per tick
    pub tick_secs: f64,

    /// Positions are queried every this many virtual seconds
    pub eval_interval_secs: f64,

    /// Position errors before this are not scored
    pub warmup_secs: f64,

    /// Length of the synthetic track
    pub track_length_km: f64,

    pub sensors: SensorConfig,
    pub engine: EngineConfig,
    pub warnings: WarningConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_secs: 1.0,
            eval_interval_secs: 5.0,
            warmup_secs: 60.0,
            track_length_km: 12.0,
            sensors: SensorConfig::default(),
            engine: EngineConfig::default(),
            warnings: WarningConfig::default(),
        }
    }
}

impl SimConfig {
    /// Reads a (possibly partial) JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("{}: {}", path.display(), e)))?;
        let config: SimConfig =
            serde_json::from_str(&json).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.tick_secs > 0.0 && self.eval_interval_secs >= self.tick_secs) {
            return Err(SimError::Config(
                "tick_secs must be positive and not exceed eval_interval_secs".into(),
            ));
        }
        if !(self.track_length_km > 0.0) {
            return Err(SimError::Config("track_length_km must be positive".into()));
        }
        self.sensors.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// A winding track near Malente: one point every 100 m, the bearing swinging
/// between roughly 25° and 95°.
pub fn synthetic_track(length_km: f64) -> Vec<GeoPoint> {
    const STEP_KM: f64 = 0.1;
    let steps = (length_km / STEP_KM - 1e-9).ceil().max(1.0) as usize;

    let mut p = GeoPoint::new(54.1705, 10.5580);
    let mut points = Vec::with_capacity(steps + 1);
    points.push(p);

    for i in 0..steps {
        let s = i as f64 * STEP_KM;
        let bearing = (60.0 + 35.0 * (s / 1.3).sin()).to_radians();
        p = GeoPoint::new(
            p.lat + STEP_KM * bearing.cos() / KM_PER_DEG,
            p.lng + STEP_KM * bearing.sin() / (KM_PER_DEG * p.lat.to_radians().cos()),
        );
        points.push(p);
    }
    points
}

/// Per-tick report statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    pub ingested: u64,
    pub dropped: u64,
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    pub log: Arc<MemoryReportLog>,
    pub registry: Arc<TrackRegistry>,
    pub service: PositionService<MemoryReportLog, SimContext>,

    /// Ground truth oracle
    pub oracle: Oracle,

    pub track_id: TrackId,
    pub track: Arc<Track>,

    ticks: u64,
}

impl SimWorld {
    /// Builds the synthetic track and an empty world around it.
    pub async fn new(seed: u64, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let context = SimContext::shared();
        let log = Arc::new(MemoryReportLog::new());
        let registry = Arc::new(TrackRegistry::new(config.engine.projection.clone()));

        let entry = registry
            .insert_track("Malente", "Lütjenburg", &synthetic_track(config.track_length_km))
            .await?;

        let service = PositionService::new(
            log.clone(),
            context.clone(),
            registry.clone(),
            config.engine.clone(),
        );

        // Physics seed kept apart from the context so the clock never shifts noise
        let physics_seed = seed.wrapping_mul(0x9e3779b97f4a7c15);
        let oracle = Oracle::new(physics_seed, entry.track.clone(), config.sensors.clone())?;

        Ok(Self {
            config,
            context,
            log,
            registry,
            service,
            oracle,
            track_id: entry.id,
            track: entry.track.clone(),
            ticks: 0,
        })
    }

    /// Spawns a draisine and assigns it to the track.
    pub async fn spawn(
        &mut self,
        km: f64,
        speed_kmh: f64,
        direction: TravelDirection,
        with_tracker: bool,
        with_phone: bool,
    ) -> Result<VehicleId, SimError> {
        let vehicle = self
            .oracle
            .spawn(km, speed_kmh, direction, with_tracker, with_phone);
        self.registry.assign_vehicle(vehicle, self.track_id).await?;
        Ok(vehicle)
    }

    /// Places a POI on the track at `km`.
    pub async fn add_poi(&self, name: &str, kind: PoiKind, km: f64) -> Result<Poi, SimError> {
        let position = point_at_track_km(&self.track, km)?;
        Ok(self
            .registry
            .add_poi(NewPoi::new(name, kind, position).on_track(self.track_id))
            .await?)
    }

    /// Advances the world by one tick and ingests all uplinks that got through.
    pub async fn step(&mut self) -> Result<TickStats, SimError> {
        let dt = self.config.tick_secs;
        self.context.advance_time(Duration::from_secs_f64(dt));
        self.oracle.step(dt);
        self.ticks += 1;

        let uplinks = self.oracle.generate_reports(self.context.now_secs())?;
        let mut stats = TickStats {
            ingested: 0,
            dropped: uplinks.dropped,
        };
        for report in uplinks.reports {
            self.service.ingest(report).await?;
            stats.ingested += 1;
        }

        if stats.dropped > 0 {
            debug!("t={:.0}s: {} uplinks lost", self.elapsed_secs(), stats.dropped);
        }
        Ok(stats)
    }

    /// True if positions should be queried after the current tick.
    pub fn is_eval_tick(&self) -> bool {
        let every =
            (self.config.eval_interval_secs / self.config.tick_secs).round().max(1.0) as u64;
        self.ticks % every == 0
    }

    /// Number of ticks covering `secs` of virtual time.
    pub fn ticks_for(&self, secs: f64) -> u64 {
        (secs / self.config.tick_secs).ceil() as u64
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.context.elapsed().as_secs_f64()
    }

    /// Ground truth trackKm of a draisine.
    pub fn true_km(&self, vehicle: &VehicleId) -> Result<f64, SimError> {
        self.oracle
            .draisine(vehicle)
            .map(|d| d.km)
            .ok_or_else(|| SimError::UnknownVehicle(vehicle.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_track_has_requested_length() {
        let track = Track::build(&synthetic_track(12.0)).unwrap();
        assert_eq!(track.len(), 121);
        assert!((track.length_km() - 12.0).abs() < 0.01);
    }

    #[test]
    fn test_config_validation() {
        assert!(SimConfig::default().validate().is_ok());

        let config = SimConfig {
            tick_secs: 10.0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_world_ingests_uplinks() {
        let config = SimConfig {
            sensors: SensorConfig {
                dropout_probability: 0.0,
                ..SensorConfig::default()
            },
            ..SimConfig::default()
        };
        let mut world = SimWorld::new(42, config).await.unwrap();
        let vehicle = world.spawn(1.0, 15.0, TravelDirection::Forward, true, true).await.unwrap();

        let mut ingested = 0;
        for _ in 0..world.ticks_for(30.0) {
            ingested += world.step().await.unwrap().ingested;
        }

        // Tracker at t=1, phone at t=1, 11, 21
        assert_eq!(ingested, 4);
        assert!((world.elapsed_secs() - 30.0).abs() < 1e-9);
        assert!(world.true_km(&vehicle).unwrap() > 1.0);
        assert_eq!(world.registry.vehicles_on(world.track_id).await, vec![vehicle]);
    }
}
