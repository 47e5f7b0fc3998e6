//! Ground truth oracle for simulation.
//!
//! The Oracle knows where every draisine *really* is and plays the part of
//! the outside world:
//! - Kinematics along the track (draisines turn around at the track ends)
//! - Hardware trackers uplinking every `tracker_interval_secs`
//! - Rider phones sending heartbeats every `app_interval_secs`
//! - Gaussian GPS noise and random uplink dropouts

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use railtrail_core::{point_at_track_km, track_bearing, Track, TravelDirection};
use railtrail_env::{GeoPoint, LocationReport, TrackerId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Kilometers per degree of latitude (mean earth radius).
const KM_PER_DEG: f64 = 111.195_08;

/// Sensor behaviour of the simulated devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub tracker_interval_secs: f64,
    pub app_interval_secs: f64,

    /// Standard deviation of the GPS error per axis (meters)
    pub gps_noise_m: f64,

    /// Standard deviation of the tracker's course over ground (degrees)
    pub heading_noise_deg: f64,

    /// Standard deviation of the tracker's speed (km/h)
    pub speed_noise_kmh: f64,

    /// Probability that a single uplink is lost
    pub dropout_probability: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            tracker_interval_secs: 30.0,
            app_interval_secs: 10.0,
            gps_noise_m: 5.0,
            heading_noise_deg: 10.0,
            speed_noise_kmh: 0.5,
            dropout_probability: 0.05,
        }
    }
}

impl SensorConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.tracker_interval_secs > 0.0 && self.app_interval_secs > 0.0) {
            return Err(SimError::Config("report intervals must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.dropout_probability) {
            return Err(SimError::Config(format!(
                "dropout_probability must be within [0, 1], got {}",
                self.dropout_probability
            )));
        }
        let noise = [self.gps_noise_m, self.heading_noise_deg, self.speed_noise_kmh];
        if noise.iter().any(|n| !(n.is_finite() && *n >= 0.0)) {
            return Err(SimError::Config("noise levels must be finite and >= 0".into()));
        }
        Ok(())
    }
}

/// A ground truth draisine.
#[derive(Debug, Clone, Serialize)]
pub struct Draisine {
    pub vehicle_id: VehicleId,

    /// `None` for draisines without a hardware tracker
    pub tracker_id: Option<TrackerId>,

    pub has_phone: bool,

    /// True position along the track
    pub km: f64,

    pub speed_kmh: f64,
    pub direction: TravelDirection,

    pub tracker_online: bool,
    pub phone_online: bool,

    last_tracker_uplink: Option<f64>,
    last_app_uplink: Option<f64>,
}

/// Reports produced during one tick.
#[derive(Debug, Default)]
pub struct Uplinks {
    pub reports: Vec<LocationReport>,
    pub dropped: u64,
}

/// The Oracle - maintains ground truth and generates location reports.
pub struct Oracle {
    /// RNG for sensor noise and dropouts
    rng: ChaCha8Rng,

    track: Arc<Track>,
    draisines: Vec<Draisine>,
    config: SensorConfig,

    position_noise: Normal<f64>,
    heading_noise: Normal<f64>,
    speed_noise: Normal<f64>,

    /// Simulation time in seconds since start
    time_secs: f64,
}

impl Oracle {
    /// Creates a new Oracle with the given physics seed.
    pub fn new(
        physics_seed: u64,
        track: Arc<Track>,
        config: SensorConfig,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let normal = |std: f64| Normal::new(0.0, std).map_err(|e| SimError::Config(e.to_string()));

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(physics_seed),
            position_noise: normal(config.gps_noise_m)?,
            heading_noise: normal(config.heading_noise_deg)?,
            speed_noise: normal(config.speed_noise_kmh)?,
            track,
            draisines: Vec::new(),
            config,
            time_secs: 0.0,
        })
    }

    /// Puts a draisine on the track and returns its vehicle id.
    pub fn spawn(
        &mut self,
        km: f64,
        speed_kmh: f64,
        direction: TravelDirection,
        with_tracker: bool,
        with_phone: bool,
    ) -> VehicleId {
        let n = self.draisines.len() as u64;
        let vehicle_id = VehicleId::from_seed(n + 1);

        self.draisines.push(Draisine {
            vehicle_id,
            tracker_id: with_tracker.then(|| TrackerId::new(format!("trk-{:04}", n + 1))),
            has_phone: with_phone,
            km: self.track.clamp_km(km),
            speed_kmh,
            direction,
            tracker_online: with_tracker,
            phone_online: with_phone,
            last_tracker_uplink: None,
            last_app_uplink: None,
        });
        vehicle_id
    }

    pub fn draisines(&self) -> &[Draisine] {
        &self.draisines
    }

    pub fn draisine(&self, vehicle: &VehicleId) -> Option<&Draisine> {
        self.draisines.iter().find(|d| d.vehicle_id == *vehicle)
    }

    /// Switches a draisine's devices on or off (tunnels, dead batteries).
    pub fn set_online(
        &mut self,
        vehicle: &VehicleId,
        tracker: bool,
        phone: bool,
    ) -> Result<(), SimError> {
        let draisine = self
            .draisines
            .iter_mut()
            .find(|d| d.vehicle_id == *vehicle)
            .ok_or_else(|| SimError::UnknownVehicle(vehicle.to_string()))?;
        draisine.tracker_online = tracker && draisine.tracker_id.is_some();
        draisine.phone_online = phone && draisine.has_phone;
        Ok(())
    }

    pub fn time(&self) -> f64 {
        self.time_secs
    }

    /// Moves every draisine by `dt` seconds, turning around at the ends.
    pub fn step(&mut self, dt: f64) {
        self.time_secs += dt;
        let length = self.track.length_km();

        for d in &mut self.draisines {
            d.km += f64::from(d.direction.sign()) * d.speed_kmh * dt / 3600.0;
            if d.km > length {
                d.km = length - (d.km - length);
                d.direction = d.direction.reversed();
            } else if d.km < 0.0 {
                d.km = -d.km;
                d.direction = d.direction.reversed();
            }
            d.km = d.km.clamp(0.0, length);
        }
    }

    /// True coordinate of a draisine.
    pub fn true_position(&self, vehicle: &VehicleId) -> Result<GeoPoint, SimError> {
        let draisine = self
            .draisine(vehicle)
            .ok_or_else(|| SimError::UnknownVehicle(vehicle.to_string()))?;
        Ok(point_at_track_km(&self.track, draisine.km)?)
    }

    /// Produces every uplink that is due at `now` (Unix seconds).
    pub fn generate_reports(&mut self, now: f64) -> Result<Uplinks, SimError> {
        let mut uplinks = Uplinks::default();

        for idx in 0..self.draisines.len() {
            let d = &self.draisines[idx];
            let tracker_due = d.tracker_online
                && is_due(d.last_tracker_uplink, now, self.config.tracker_interval_secs);
            let app_due =
                d.phone_online && is_due(d.last_app_uplink, now, self.config.app_interval_secs);

            if tracker_due {
                self.draisines[idx].last_tracker_uplink = Some(now);
                match self.tracker_report(idx, now)? {
                    Some(report) => uplinks.reports.push(report),
                    None => uplinks.dropped += 1,
                }
            }
            if app_due {
                self.draisines[idx].last_app_uplink = Some(now);
                match self.app_report(idx, now)? {
                    Some(report) => uplinks.reports.push(report),
                    None => uplinks.dropped += 1,
                }
            }
        }
        Ok(uplinks)
    }

    fn tracker_report(&mut self, idx: usize, now: f64) -> Result<Option<LocationReport>, SimError> {
        if self.rng.gen_bool(self.config.dropout_probability) {
            return Ok(None);
        }

        let d = self.draisines[idx].clone();
        let Some(tracker_id) = d.tracker_id else {
            return Ok(None);
        };

        let mut heading = track_bearing(&self.track, d.km)?;
        if d.direction == TravelDirection::Backward {
            heading += 180.0;
        }
        heading = (heading + self.heading_noise.sample(&mut self.rng)).rem_euclid(360.0);
        let speed = (d.speed_kmh + self.speed_noise.sample(&mut self.rng)).max(0.0);
        let position = self.noisy_position(d.km)?;

        Ok(Some(
            LocationReport::from_tracker(tracker_id, d.vehicle_id, now, position)
                .with_speed(speed)
                .with_heading(heading),
        ))
    }

    fn app_report(&mut self, idx: usize, now: f64) -> Result<Option<LocationReport>, SimError> {
        if self.rng.gen_bool(self.config.dropout_probability) {
            return Ok(None);
        }
        let (vehicle_id, km) = (self.draisines[idx].vehicle_id, self.draisines[idx].km);
        let position = self.noisy_position(km)?;
        Ok(Some(LocationReport::from_app(vehicle_id, now, position)))
    }

    /// True position at `km` plus independent north/east GPS error.
    fn noisy_position(&mut self, km: f64) -> Result<GeoPoint, SimError> {
        let truth = point_at_track_km(&self.track, km)?;
        let north_m = self.position_noise.sample(&mut self.rng);
        let east_m = self.position_noise.sample(&mut self.rng);

        Ok(GeoPoint::new(
            truth.lat + north_m / 1000.0 / KM_PER_DEG,
            truth.lng + east_m / 1000.0 / (KM_PER_DEG * truth.lat.to_radians().cos()),
        ))
    }
}

#[inline]
fn is_due(last: Option<f64>, now: f64, interval: f64) -> bool {
    last.map_or(true, |t| now - t >= interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn track() -> Arc<Track> {
        let raw: Vec<GeoPoint> = (0..=5)
            .map(|i| {
                GeoPoint::new(
                    54.17,
                    10.55 + i as f64 / (KM_PER_DEG * 54.17f64.to_radians().cos()),
                )
            })
            .collect();
        Arc::new(Track::build(&raw).unwrap())
    }

    fn quiet() -> SensorConfig {
        SensorConfig {
            dropout_probability: 0.0,
            ..SensorConfig::default()
        }
    }

    #[test]
    fn test_draisine_turns_at_track_end() {
        let mut oracle = Oracle::new(7, track(), quiet()).unwrap();
        let length = track().length_km();
        let v = oracle.spawn(length - 0.01, 36.0, TravelDirection::Forward, true, false);

        // 36 km/h for 2 s = 20 m, 10 m past the end
        oracle.step(2.0);

        let d = oracle.draisine(&v).unwrap();
        assert_eq!(d.direction, TravelDirection::Backward);
        assert!((d.km - (length - 0.01)).abs() < 1e-9);
    }

    #[test]
    fn test_uplink_intervals() {
        let mut oracle = Oracle::new(7, track(), quiet()).unwrap();
        oracle.spawn(1.0, 12.0, TravelDirection::Forward, true, true);

        let mut trackers = 0;
        let mut apps = 0;
        for t in 1..=60 {
            oracle.step(1.0);
            let uplinks = oracle.generate_reports(1000.0 + t as f64).unwrap();
            trackers += uplinks.reports.iter().filter(|r| !r.is_app()).count();
            apps += uplinks.reports.iter().filter(|r| r.is_app()).count();
        }

        assert_eq!(trackers, 2);
        assert_eq!(apps, 6);
    }

    #[test]
    fn test_offline_devices_stay_silent() {
        let mut oracle = Oracle::new(7, track(), quiet()).unwrap();
        let v = oracle.spawn(1.0, 12.0, TravelDirection::Forward, true, true);
        oracle.set_online(&v, false, false).unwrap();

        let uplinks = oracle.generate_reports(1000.0).unwrap();
        assert!(uplinks.reports.is_empty());
        assert_eq!(uplinks.dropped, 0);
        assert!(oracle.set_online(&VehicleId::from_seed(99), true, true).is_err());
    }

    #[test]
    fn test_full_dropout_drops_everything() {
        let config = SensorConfig {
            dropout_probability: 1.0,
            ..SensorConfig::default()
        };
        let mut oracle = Oracle::new(7, track(), config).unwrap();
        oracle.spawn(1.0, 12.0, TravelDirection::Forward, true, true);

        let uplinks = oracle.generate_reports(1000.0).unwrap();
        assert!(uplinks.reports.is_empty());
        assert_eq!(uplinks.dropped, 2);
    }

    #[test]
    fn test_tracker_heading_matches_direction() {
        let config = SensorConfig {
            heading_noise_deg: 0.0,
            ..quiet()
        };
        let mut oracle = Oracle::new(7, track(), config).unwrap();
        oracle.spawn(1.0, 12.0, TravelDirection::Backward, true, false);

        let uplinks = oracle.generate_reports(1000.0).unwrap();
        let heading = uplinks.reports[0].heading_deg.unwrap();
        assert!((heading - 270.0).abs() < 0.5);
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = SensorConfig {
            dropout_probability: 1.5,
            ..SensorConfig::default()
        };
        assert!(Oracle::new(7, track(), config).is_err());
    }

    proptest! {
        #[test]
        fn prop_reports_are_valid(seed in any::<u64>(), km in 0.0f64..5.0) {
            let mut oracle = Oracle::new(seed, track(), quiet()).unwrap();
            oracle.spawn(km, 15.0, TravelDirection::Forward, true, true);

            let uplinks = oracle.generate_reports(1000.0).unwrap();
            prop_assert_eq!(uplinks.reports.len(), 2);
            for report in &uplinks.reports {
                prop_assert!(report.position.is_valid());
                prop_assert!(report.speed_kmh.map_or(true, |s| s >= 0.0));
            }
        }
    }
}
