//! The "FUSION" Engine - one position out of many noisy reports
//!
//! Combines the recent location reports of a single vehicle into one
//! best-estimate trackKm:
//!
//! 1. **Trackers**: the newest report of every hardware tracker inside the
//!    tracker window, dead-reckoned along the track with its measured speed
//! 2. **Apps**: the newest few phone reports inside the (shorter) app window,
//!    dead-reckoned with an empirical speed derived from consecutive fixes
//! 3. **Weighting**: every prediction is weighted by age and by how far the
//!    raw fix was off the track, then the weights are normalized
//! 4. **Fallback**: when nothing carries weight, the most recent fix ever seen
//!    is returned unchanged and marked [`Freshness::Stale`]
//!
//! The engine holds no state. Every call is an independent computation over
//! the reports it is given.

use std::collections::BTreeMap;

use railtrail_env::{GeoPoint, LocationReport, TrackerId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{FusionConfig, ProjectionConfig};
use crate::error::Result;
use crate::heading::{heading_deg_at, track_bearing, travel_direction_sign, TravelDirection};
use crate::projection::{point_at_track_km, PositionProjector};
use crate::track_geometry::Track;

const SECS_PER_HOUR: f64 = 3600.0;

// ============================================================================
// ESTIMATE TYPES
// ============================================================================

/// Whether an estimate was fused from in-window data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    /// Fused from reports inside their trust windows
    Fresh,

    /// The most recent fix ever recorded, without any extrapolation
    Stale,
}

/// Where a contributing report came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportSource {
    Tracker(TrackerId),
    App,
}

/// One report's share of a fused estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub source: ReportSource,
    pub timestamp: f64,

    /// trackKm of the raw fix
    pub observed_km: f64,

    /// trackKm after dead-reckoning to `computed_at`
    pub predicted_km: f64,

    pub off_track_m: f64,
    pub direction: TravelDirection,

    /// Normalized weight; all contributions of an estimate sum to 1
    pub weight: f64,
}

/// Best-estimate position of a vehicle at one instant.
///
/// Purely derived and never stored: recomputed for every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePositionEstimate {
    pub track_km: f64,

    /// Coordinate on the track centerline at `track_km`
    pub position: GeoPoint,

    pub direction: TravelDirection,

    /// Compass heading derived from the track bearing and `direction`
    pub heading_deg: Option<f64>,

    /// Mean speed of the in-window tracker reports (app speeds never enter)
    pub speed_kmh: f64,

    pub freshness: Freshness,
    pub computed_at: f64,

    /// Timestamp of the newest report that went into the estimate
    pub last_report_at: f64,

    /// Empty for stale estimates
    pub contributions: Vec<Contribution>,
}

impl VehiclePositionEstimate {
    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }

    /// Seconds since the newest report that went into the estimate.
    pub fn age_secs(&self) -> f64 {
        (self.computed_at - self.last_report_at).max(0.0)
    }
}

/// An unnormalized prediction collected by one of the two report classes.
struct Candidate {
    source: ReportSource,
    timestamp: f64,
    observed_km: f64,
    predicted_km: f64,
    off_track_m: f64,
    direction: TravelDirection,
    weight: f64,
    speed_kmh: Option<f64>,
}

/// Linear decay from 1 at distance 0 to 0 at `limit`.
#[inline]
fn linear_weight(value: f64, limit: f64) -> f64 {
    ((limit - value) / limit).max(0.0)
}

// ============================================================================
// ENGINE
// ============================================================================

/// Stateless fusion of a vehicle's recent reports into one estimate.
#[derive(Debug, Clone, Default)]
pub struct LocationFusionEngine {
    config: FusionConfig,
    projector: PositionProjector,
}

impl LocationFusionEngine {
    pub fn new(config: FusionConfig, projection: ProjectionConfig) -> Self {
        Self {
            config,
            projector: PositionProjector::new(projection),
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Fuses `recent` into an estimate at time `now`.
    ///
    /// `recent` may contain reports outside the trust windows; they are
    /// filtered here. `last_known` is the newest report ever recorded for the
    /// vehicle and only feeds the stale fallback (when absent, the newest of
    /// `recent` is used). Returns `Ok(None)` only when the vehicle has no
    /// report at all.
    pub fn estimate(
        &self,
        track: &Track,
        recent: &[LocationReport],
        last_known: Option<&LocationReport>,
        now: f64,
    ) -> Result<Option<VehiclePositionEstimate>> {
        let usable: Vec<&LocationReport> = recent
            .iter()
            .filter(|r| {
                let ok = r.position.is_valid() && r.timestamp.is_finite();
                if !ok {
                    warn!("Skipping report with invalid fix at t={}", r.timestamp);
                }
                ok
            })
            .collect();

        let mut candidates = self.tracker_candidates(track, &usable, now)?;
        candidates.extend(self.app_candidates(track, &usable, now)?);

        let total: f64 = candidates.iter().map(|c| c.weight).sum();
        if candidates.is_empty() || total <= 0.0 {
            debug!(
                "No weighted reports ({} in window), falling back to last known fix",
                candidates.len()
            );
            let fallback = last_known.or_else(|| {
                usable
                    .iter()
                    .copied()
                    .max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
            });
            return match fallback {
                Some(report) => self.stale(track, report, now).map(Some),
                None => Ok(None),
            };
        }

        let contributions: Vec<Contribution> = candidates
            .iter()
            .map(|c| Contribution {
                source: c.source.clone(),
                timestamp: c.timestamp,
                observed_km: c.observed_km,
                predicted_km: c.predicted_km,
                off_track_m: c.off_track_m,
                direction: c.direction,
                weight: c.weight / total,
            })
            .collect();

        let fused_km = track.clamp_km(
            contributions
                .iter()
                .map(|c| c.weight * c.predicted_km)
                .sum::<f64>(),
        );

        let weighted: Vec<&Candidate> = candidates.iter().filter(|c| c.weight > 0.0).collect();

        let tracker_speeds: Vec<f64> = weighted.iter().filter_map(|c| c.speed_kmh).collect();
        let speed_kmh = if tracker_speeds.is_empty() {
            0.0
        } else {
            tracker_speeds.iter().sum::<f64>() / tracker_speeds.len() as f64
        };

        let direction = fused_direction(&candidates);
        let last_report_at = weighted
            .iter()
            .map(|c| c.timestamp)
            .fold(f64::NEG_INFINITY, f64::max);

        debug!(
            "Fused {} reports into trackKm {:.3} ({:?}, {:.1} km/h)",
            contributions.len(),
            fused_km,
            direction,
            speed_kmh
        );

        Ok(Some(VehiclePositionEstimate {
            track_km: fused_km,
            position: point_at_track_km(track, fused_km)?,
            direction,
            heading_deg: resolve_heading(track, fused_km, direction),
            speed_kmh,
            freshness: Freshness::Fresh,
            computed_at: now,
            last_report_at,
            contributions,
        }))
    }

    /// Newest report per tracker inside the tracker window, dead-reckoned.
    fn tracker_candidates(
        &self,
        track: &Track,
        reports: &[&LocationReport],
        now: f64,
    ) -> Result<Vec<Candidate>> {
        let window = self.config.tracker_window_secs;

        // BTreeMap keeps the output ordered by tracker id
        let mut newest: BTreeMap<&TrackerId, &LocationReport> = BTreeMap::new();
        for &report in reports {
            let Some(tracker_id) = report.tracker_id.as_ref() else {
                continue;
            };
            if report.age_at(now) > window {
                continue;
            }
            newest
                .entry(tracker_id)
                .and_modify(|current| {
                    if report.timestamp > current.timestamp {
                        *current = report;
                    }
                })
                .or_insert(report);
        }

        let mut candidates = Vec::with_capacity(newest.len());
        for (tracker_id, report) in newest {
            let projection = self.projector.project(report.position, track)?;
            let bearing = track_bearing(track, projection.track_km)?;
            let direction = travel_direction_sign(report.heading_deg, bearing);

            let elapsed = report.age_at(now);
            let speed = report.speed_kmh.filter(|s| s.is_finite()).unwrap_or(0.0);
            let predicted_km = projection.track_km
                + speed * f64::from(direction.sign()) * elapsed / SECS_PER_HOUR;

            let weight = linear_weight(elapsed, window)
                * linear_weight(projection.off_track_m, self.config.tracker_max_off_track_m);

            debug!(
                "Tracker {}: km {:.3} -> {:.3}, off {:.1} m, weight {:.3}",
                tracker_id, projection.track_km, predicted_km, projection.off_track_m, weight
            );

            candidates.push(Candidate {
                source: ReportSource::Tracker(tracker_id.clone()),
                timestamp: report.timestamp,
                observed_km: projection.track_km,
                predicted_km: track.clamp_km(predicted_km),
                off_track_m: projection.off_track_m,
                direction,
                weight,
                speed_kmh: report.speed_kmh.filter(|s| s.is_finite()),
            });
        }
        Ok(candidates)
    }

    /// Newest app reports inside the app window, dead-reckoned with the
    /// empirical speed between them.
    fn app_candidates(
        &self,
        track: &Track,
        reports: &[&LocationReport],
        now: f64,
    ) -> Result<Vec<Candidate>> {
        let window = self.config.app_window_secs;
        let max_off_track_m = self.config.app_max_off_track_m;

        // Fixes that would carry no weight must not shape the empirical speed either
        let mut in_window = Vec::new();
        for &report in reports {
            if !report.is_app() || report.age_at(now) >= window {
                continue;
            }
            let projection = self.projector.project(report.position, track)?;
            if projection.off_track_m >= max_off_track_m {
                debug!(
                    "App fix at t={} is {:.1} m off the track, ignored",
                    report.timestamp, projection.off_track_m
                );
                continue;
            }
            in_window.push((report, projection));
        }
        in_window.sort_by(|a, b| a.0.timestamp.total_cmp(&b.0.timestamp));
        let skip = in_window.len().saturating_sub(self.config.app_max_reports);
        let projected = in_window.split_off(skip);

        if projected.len() < self.config.app_min_reports {
            debug!(
                "Only {} usable app reports in window, need {} for a speed",
                projected.len(),
                self.config.app_min_reports
            );
            return Ok(Vec::new());
        }

        // Signed km/h between consecutive fixes
        let speeds: Vec<f64> = projected
            .windows(2)
            .filter_map(|pair| {
                let dt = pair[1].0.timestamp - pair[0].0.timestamp;
                (dt > 0.0).then(|| {
                    (pair[1].1.track_km - pair[0].1.track_km) / (dt / SECS_PER_HOUR)
                })
            })
            .collect();

        if speeds.is_empty() {
            debug!("App reports share a timestamp, no empirical speed");
            return Ok(Vec::new());
        }
        let avg_speed = speeds.iter().sum::<f64>() / speeds.len() as f64;
        let direction = TravelDirection::from_signum(avg_speed);

        let candidates = projected
            .into_iter()
            .map(|(report, projection)| {
                let elapsed = report.age_at(now);
                let predicted_km = projection.track_km + avg_speed * elapsed / SECS_PER_HOUR;
                let weight = linear_weight(elapsed, window)
                    * linear_weight(projection.off_track_m, max_off_track_m);

                Candidate {
                    source: ReportSource::App,
                    timestamp: report.timestamp,
                    observed_km: projection.track_km,
                    predicted_km: track.clamp_km(predicted_km),
                    off_track_m: projection.off_track_m,
                    direction,
                    weight,
                    speed_kmh: None,
                }
            })
            .collect();
        Ok(candidates)
    }

    /// The newest fix ever recorded, projected but not extrapolated.
    fn stale(
        &self,
        track: &Track,
        report: &LocationReport,
        now: f64,
    ) -> Result<VehiclePositionEstimate> {
        let projection = self.projector.project(report.position, track)?;
        let direction = match track_bearing(track, projection.track_km) {
            Ok(bearing) => travel_direction_sign(report.heading_deg, bearing),
            Err(_) => TravelDirection::Unknown,
        };

        warn!(
            "Stale estimate for vehicle {}: last fix {:.0} s old",
            report.vehicle_id,
            report.age_at(now)
        );

        Ok(VehiclePositionEstimate {
            track_km: projection.track_km,
            position: projection.position,
            direction,
            heading_deg: resolve_heading(track, projection.track_km, direction),
            speed_kmh: report
                .speed_kmh
                .filter(|s| s.is_finite() && !report.is_app())
                .unwrap_or(0.0),
            freshness: Freshness::Stale,
            computed_at: now,
            last_report_at: report.timestamp,
            contributions: Vec::new(),
        })
    }
}

/// Compass heading at `km`; a degenerate track yields no heading.
fn resolve_heading(track: &Track, km: f64, direction: TravelDirection) -> Option<f64> {
    match heading_deg_at(track, km, direction) {
        Ok(heading) => heading,
        Err(e) => {
            warn!("No heading at km {:.3}: {}", km, e);
            None
        }
    }
}

/// Direction of the fused estimate.
///
/// The newest weighted tracker with a known direction wins; otherwise the
/// direction of the app-derived speed; otherwise unknown.
fn fused_direction(candidates: &[Candidate]) -> TravelDirection {
    let weighted = || candidates.iter().filter(|c| c.weight > 0.0 && c.direction.is_known());

    weighted()
        .filter(|c| matches!(c.source, ReportSource::Tracker(_)))
        .max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
        .or_else(|| weighted().find(|c| c.source == ReportSource::App))
        .map(|c| c.direction)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use railtrail_env::VehicleId;

    const KM_DEG: f64 = 1.0 / 111.195_08;
    const NOW: f64 = 1_704_067_200.0;
    const EAST: f64 = 90.0;

    /// 10 km due east along the equator, one point per kilometer.
    fn track() -> Track {
        let raw: Vec<GeoPoint> = (0..=10).map(|i| GeoPoint::new(0.0, i as f64 * KM_DEG)).collect();
        Track::build(&raw).unwrap()
    }

    fn at_km(km: f64) -> GeoPoint {
        GeoPoint::new(0.0, km * KM_DEG)
    }

    fn tracker(id: &str, age: f64, km: f64, speed: f64) -> LocationReport {
        LocationReport::from_tracker(
            TrackerId::new(id),
            VehicleId::from_seed(1),
            NOW - age,
            at_km(km),
        )
        .with_speed(speed)
        .with_heading(EAST)
    }

    fn app(age: f64, position: GeoPoint) -> LocationReport {
        LocationReport::from_app(VehicleId::from_seed(1), NOW - age, position)
    }

    #[test]
    fn test_fresh_report_dominates() {
        let engine = LocationFusionEngine::default();
        let reports = vec![tracker("a", 10.0, 5.0, 10.0), tracker("b", 400.0, 4.0, 8.0)];

        let estimate = engine.estimate(&track(), &reports, None, NOW).unwrap().unwrap();

        let fresh_prediction = 5.0 + 10.0 * 10.0 / 3600.0;
        let old_prediction = 4.0 + 8.0 * 400.0 / 3600.0;
        assert_eq!(estimate.freshness, Freshness::Fresh);
        assert!(
            (estimate.track_km - fresh_prediction).abs()
                < (estimate.track_km - old_prediction).abs()
        );
        assert_eq!(estimate.direction, TravelDirection::Forward);
        assert_relative_eq!(estimate.speed_kmh, 9.0);
        assert_relative_eq!(estimate.heading_deg.unwrap(), EAST, epsilon = 1e-6);
    }

    #[test]
    fn test_weights_normalize_to_one() {
        let engine = LocationFusionEngine::default();
        let reports = vec![
            tracker("a", 10.0, 5.0, 10.0),
            tracker("b", 300.0, 4.5, 8.0),
            app(40.0, at_km(5.0)),
            app(20.0, at_km(5.05)),
            app(5.0, at_km(5.1)),
        ];

        let estimate = engine.estimate(&track(), &reports, None, NOW).unwrap().unwrap();
        let sum: f64 = estimate.contributions.iter().map(|c| c.weight).sum();

        assert_eq!(estimate.contributions.len(), 5);
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_old_app_report_is_stale_without_extrapolation() {
        let engine = LocationFusionEngine::default();
        let old = app(130.0, at_km(3.0));

        let estimate = engine
            .estimate(&track(), std::slice::from_ref(&old), Some(&old), NOW)
            .unwrap()
            .unwrap();

        assert_eq!(estimate.freshness, Freshness::Stale);
        assert_relative_eq!(estimate.track_km, 3.0, epsilon = 1e-3);
        assert_eq!(estimate.last_report_at, old.timestamp);
        assert!(estimate.contributions.is_empty());
        assert_eq!(estimate.speed_kmh, 0.0);
    }

    #[test]
    fn test_all_reports_outside_windows_fall_back_to_last_known() {
        let engine = LocationFusionEngine::default();
        let reports = vec![tracker("a", 900.0, 2.0, 12.0), tracker("a", 700.0, 2.5, 12.0)];
        let last_known = reports[1].clone();

        let estimate = engine
            .estimate(&track(), &reports, Some(&last_known), NOW)
            .unwrap()
            .unwrap();

        assert_eq!(estimate.freshness, Freshness::Stale);
        assert_relative_eq!(estimate.track_km, 2.5, epsilon = 1e-3);
        assert_eq!(estimate.speed_kmh, 12.0);
    }

    #[test]
    fn test_zero_total_weight_is_stale() {
        let engine = LocationFusionEngine::default();
        // Exactly at the window edge: inside, but weighted 0
        let reports = vec![tracker("a", 600.0, 4.0, 10.0)];

        let estimate = engine.estimate(&track(), &reports, None, NOW).unwrap().unwrap();
        assert_eq!(estimate.freshness, Freshness::Stale);
        assert_relative_eq!(estimate.track_km, 4.0, epsilon = 1e-3);
    }

    #[test]
    fn test_no_reports_at_all() {
        let engine = LocationFusionEngine::default();
        assert!(engine.estimate(&track(), &[], None, NOW).unwrap().is_none());
    }

    fn assert_same_estimate(a: &VehiclePositionEstimate, b: &VehiclePositionEstimate) {
        assert_eq!(a.track_km, b.track_km);
        assert_eq!(a.position, b.position);
        assert_eq!(a.speed_kmh, b.speed_kmh);
        assert_eq!(a.direction, b.direction);
        assert_eq!(a.heading_deg, b.heading_deg);
        assert_eq!(a.freshness, b.freshness);
        assert_eq!(a.last_report_at, b.last_report_at);
    }

    #[test]
    fn test_far_off_track_tracker_has_no_influence() {
        let engine = LocationFusionEngine::default();
        let base = vec![tracker("a", 10.0, 5.0, 10.0), tracker("b", 200.0, 4.8, 10.0)];

        // ~60 m north of the track, faster, newest, and heading the other way
        let mut far = tracker("c", 5.0, 6.0, 30.0).with_heading(270.0);
        far.position = GeoPoint::new(60.0 / 111_195.08, 6.0 * KM_DEG);
        let mut with_far = base.clone();
        with_far.push(far);

        let without = engine.estimate(&track(), &base, None, NOW).unwrap().unwrap();
        let with = engine.estimate(&track(), &with_far, None, NOW).unwrap().unwrap();

        assert_same_estimate(&without, &with);
        assert_relative_eq!(with.speed_kmh, 10.0);
        assert_eq!(with.direction, TravelDirection::Forward);
        let far_weight = with
            .contributions
            .iter()
            .find(|c| c.source == ReportSource::Tracker(TrackerId::new("c")))
            .unwrap()
            .weight;
        assert_eq!(far_weight, 0.0);
    }

    #[test]
    fn test_far_off_track_app_fix_has_no_influence() {
        let engine = LocationFusionEngine::default();
        // 0.1 km every 20 s = 18 km/h forwards
        let base = vec![
            app(60.0, at_km(3.0)),
            app(40.0, at_km(3.1)),
            app(20.0, at_km(3.2)),
        ];

        // Newest fix, but ~30 m off the track and back at km 3.0
        let mut with_far = base.clone();
        with_far.push(app(5.0, GeoPoint::new(30.0 / 111_195.08, 3.0 * KM_DEG)));

        let without = engine.estimate(&track(), &base, None, NOW).unwrap().unwrap();
        let with = engine.estimate(&track(), &with_far, None, NOW).unwrap().unwrap();

        assert_same_estimate(&without, &with);
        assert_relative_eq!(with.track_km, 3.3, epsilon = 1e-6);
        assert_eq!(with.direction, TravelDirection::Forward);
        assert_eq!(with.contributions.len(), 3);
    }

    #[test]
    fn test_off_track_app_fixes_do_not_count_towards_minimum() {
        let engine = LocationFusionEngine::default();
        let reports = vec![
            app(20.0, GeoPoint::new(30.0 / 111_195.08, 2.0 * KM_DEG)),
            app(10.0, at_km(2.1)),
            tracker("a", 30.0, 6.0, 0.0),
        ];

        let estimate = engine.estimate(&track(), &reports, None, NOW).unwrap().unwrap();

        assert_eq!(estimate.contributions.len(), 1);
        assert_relative_eq!(estimate.track_km, 6.0, epsilon = 1e-3);
    }

    #[test]
    fn test_zero_length_track_yields_no_heading() {
        let engine = LocationFusionEngine::default();
        let point = GeoPoint::new(1.0, 1.0);
        let track = Track::build(&[point, point]).unwrap();
        let reports = vec![app(20.0, point), app(10.0, point)];

        let estimate = engine.estimate(&track, &reports, None, NOW).unwrap().unwrap();

        assert_eq!(estimate.freshness, Freshness::Fresh);
        assert_eq!(estimate.track_km, 0.0);
        assert_eq!(estimate.heading_deg, None);
    }

    #[test]
    fn test_only_newest_report_per_tracker_counts() {
        let engine = LocationFusionEngine::default();
        let reports = vec![tracker("a", 100.0, 4.0, 0.0), tracker("a", 10.0, 5.0, 0.0)];

        let estimate = engine.estimate(&track(), &reports, None, NOW).unwrap().unwrap();

        assert_eq!(estimate.contributions.len(), 1);
        assert_relative_eq!(estimate.track_km, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_unknown_heading_disables_dead_reckoning() {
        let engine = LocationFusionEngine::default();
        let mut report = tracker("a", 300.0, 5.0, 20.0);
        report.heading_deg = None;

        let estimate = engine.estimate(&track(), &[report], None, NOW).unwrap().unwrap();
        assert_relative_eq!(estimate.track_km, 5.0, epsilon = 1e-3);
        assert_eq!(estimate.direction, TravelDirection::Unknown);
    }

    #[test]
    fn test_single_app_report_is_skipped() {
        let engine = LocationFusionEngine::default();
        let reports = vec![app(10.0, at_km(2.0)), tracker("a", 30.0, 6.0, 0.0)];

        let estimate = engine.estimate(&track(), &reports, None, NOW).unwrap().unwrap();

        assert_eq!(estimate.contributions.len(), 1);
        assert_relative_eq!(estimate.track_km, 6.0, epsilon = 1e-3);
    }

    #[test]
    fn test_app_reports_use_empirical_speed() {
        let engine = LocationFusionEngine::default();
        // 0.1 km every 30 s = 12 km/h backwards
        let reports = vec![
            app(100.0, at_km(3.3)),
            app(70.0, at_km(3.2)),
            app(40.0, at_km(3.1)),
            app(10.0, at_km(3.0)),
        ];

        let estimate = engine.estimate(&track(), &reports, None, NOW).unwrap().unwrap();

        // Capped at the three most recent
        assert_eq!(estimate.contributions.len(), 3);
        assert_eq!(estimate.direction, TravelDirection::Backward);
        for c in &estimate.contributions {
            let expected = c.observed_km - 12.0 * (NOW - c.timestamp) / 3600.0;
            assert_relative_eq!(c.predicted_km, expected, epsilon = 1e-3);
        }
        // App speed never enters the speed field
        assert_eq!(estimate.speed_kmh, 0.0);
    }

    #[test]
    fn test_prediction_is_clamped_to_track() {
        let engine = LocationFusionEngine::default();
        let reports = vec![tracker("a", 500.0, 9.9, 30.0)];

        let estimate = engine.estimate(&track(), &reports, None, NOW).unwrap().unwrap();
        assert_eq!(estimate.track_km, track().length_km());
    }
}
