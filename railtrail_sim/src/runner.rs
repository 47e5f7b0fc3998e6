//! Scenario runner - drives the simulated world and scores the core.

use railtrail_core::{
    PoiKind, PositionProjector, TravelDirection, VehiclePositionEstimate, VehicleUpdate,
};
use railtrail_env::{ReportLog, VehicleId};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::SimError;
use crate::scenarios::ScenarioId;
use crate::warnings::{evaluate, Warning};
use crate::world::{SimConfig, SimWorld, TickStats};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Number of simulated draisines
    pub vehicle_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub reports_ingested: u64,
    pub reports_dropped: u64,

    pub estimates: u64,
    pub fresh_estimates: u64,
    pub stale_estimates: u64,

    /// Fresh estimates after warm-up that were compared with ground truth
    pub scored_estimates: u64,

    /// Along-track error of scored estimates (meters)
    pub max_error_m: f64,
    pub rms_error_m: f64,

    pub crossing_warnings: u64,
    pub too_close_warnings: u64,
    pub oncoming_warnings: u64,

    #[serde(skip)]
    error_sq_sum: f64,
}

impl ScenarioMetrics {
    fn record_tick(&mut self, stats: TickStats) {
        self.reports_ingested += stats.ingested;
        self.reports_dropped += stats.dropped;
    }

    fn record_estimate(&mut self, estimate: &VehiclePositionEstimate, true_km: f64, scored: bool) {
        self.estimates += 1;
        if !estimate.is_fresh() {
            self.stale_estimates += 1;
            return;
        }

        self.fresh_estimates += 1;
        if scored {
            let error_m = (estimate.track_km - true_km).abs() * 1000.0;
            self.scored_estimates += 1;
            self.error_sq_sum += error_m * error_m;
            self.max_error_m = self.max_error_m.max(error_m);
        }
    }

    fn record_warnings(&mut self, warnings: &[Warning]) {
        for warning in warnings {
            match warning {
                Warning::LevelCrossingAhead { .. } => self.crossing_warnings += 1,
                Warning::VehicleTooClose { .. } => self.too_close_warnings += 1,
                Warning::OncomingVehicle { .. } => self.oncoming_warnings += 1,
            }
        }
    }

    /// Share of estimates that were fresh (1.0 without estimates).
    pub fn fresh_ratio(&self) -> f64 {
        if self.estimates == 0 {
            1.0
        } else {
            self.fresh_estimates as f64 / self.estimates as f64
        }
    }

    fn finish(&mut self) {
        if self.scored_estimates > 0 {
            self.rms_error_m = (self.error_sq_sum / self.scored_estimates as f64).sqrt();
        }
    }
}

/// One queried vehicle update, with the warnings it raised.
struct Observation {
    update: VehicleUpdate,
    warnings: Vec<Warning>,
    true_km: f64,
}

/// Queries the update of `vehicle`; `None` until its first uplink got through.
async fn observe(
    world: &SimWorld,
    vehicle: &VehicleId,
    metrics: &mut ScenarioMetrics,
) -> Result<Option<Observation>, SimError> {
    if world.log.latest(vehicle).await?.is_none() {
        return Ok(None);
    }

    let update = world.service.vehicle_update(vehicle).await?;
    let true_km = world.true_km(vehicle)?;
    let scored = world.elapsed_secs() >= world.config.warmup_secs;
    metrics.record_estimate(&update.estimate, true_km, scored);

    let warnings = evaluate(&update, &world.config.warnings);
    metrics.record_warnings(&warnings);

    Ok(Some(Observation {
        update,
        warnings,
        true_km,
    }))
}

/// Runs simulation scenarios.
pub struct ScenarioRunner {
    seed: u64,

    /// Virtual duration in seconds (scenarios may need more)
    duration_secs: f64,

    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            duration_secs: 600.0,
            config: SimConfig::default(),
        }
    }

    /// Sets the duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        let duration = self.duration_secs.max(scenario.min_duration_secs());

        let outcome = match scenario {
            ScenarioId::Cruise => self.run_cruise(duration).await,
            ScenarioId::SignalLoss => self.run_signal_loss(duration).await,
            ScenarioId::PhoneOnly => self.run_phone_only(duration).await,
            ScenarioId::Oncoming => self.run_oncoming(duration).await,
            ScenarioId::LevelCrossing => self.run_level_crossing(duration).await,
        };

        outcome.unwrap_or_else(|e| {
            error!("Scenario {} aborted: {}", scenario.name(), e);
            ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                total_ticks: 0,
                final_time_secs: 0.0,
                vehicle_count: 0,
                failure_reason: Some(format!("aborted: {}", e)),
                metrics: ScenarioMetrics::default(),
            }
        })
    }

    fn finish(
        &self,
        scenario: ScenarioId,
        world: &SimWorld,
        mut metrics: ScenarioMetrics,
        failure_reason: Option<String>,
    ) -> ScenarioResult {
        metrics.finish();
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_ticks: world.ticks(),
            final_time_secs: world.elapsed_secs(),
            vehicle_count: world.oracle.draisines().len(),
            failure_reason,
            metrics,
        }
    }

    /// SIM-001: Cruise - three draisines with tracker and phone.
    ///
    /// **Assertion**: along-track RMS error < 30 m, ≥ 95% fresh estimates.
    async fn run_cruise(&self, duration: f64) -> Result<ScenarioResult, SimError> {
        let mut world = SimWorld::new(self.seed, self.config.clone()).await?;
        let mut fleet = Vec::new();
        for (km, speed) in [(1.0, 12.0), (2.5, 16.0), (4.0, 20.0)] {
            fleet.push(world.spawn(km, speed, TravelDirection::Forward, true, true).await?);
        }

        let mut metrics = ScenarioMetrics::default();
        for _ in 0..world.ticks_for(duration) {
            metrics.record_tick(world.step().await?);
            if world.is_eval_tick() {
                for vehicle in &fleet {
                    observe(&world, vehicle, &mut metrics).await?;
                }
            }
        }

        let mut probe = metrics.clone();
        probe.finish();
        let failure = if probe.rms_error_m >= 30.0 {
            Some(format!("RMS error {:.1} m exceeds 30 m", probe.rms_error_m))
        } else if probe.fresh_ratio() < 0.95 {
            Some(format!("only {:.0}% fresh estimates", probe.fresh_ratio() * 100.0))
        } else {
            None
        };
        Ok(self.finish(ScenarioId::Cruise, &world, metrics, failure))
    }

    /// SIM-002: SignalLoss - every device of a draisine goes dark.
    ///
    /// **Assertion**: estimates stay fresh while the tracker report is inside
    /// its window, then turn stale and pin exactly to the last recorded fix.
    async fn run_signal_loss(&self, duration: f64) -> Result<ScenarioResult, SimError> {
        const LOSS_AT: f64 = 120.0;

        let mut world = SimWorld::new(self.seed, self.config.clone()).await?;
        let vehicle = world.spawn(2.0, 12.0, TravelDirection::Forward, true, true).await?;

        let mut metrics = ScenarioMetrics::default();
        let mut lost = false;
        let mut stale_too_early = false;
        let mut last: Option<Observation> = None;

        for _ in 0..world.ticks_for(duration) {
            metrics.record_tick(world.step().await?);

            if !lost && world.elapsed_secs() >= LOSS_AT {
                world.oracle.set_online(&vehicle, false, false)?;
                lost = true;
                info!("t={:.0}s: devices of {} went dark", world.elapsed_secs(), vehicle);
            }

            if world.is_eval_tick() {
                let Some(obs) = observe(&world, &vehicle, &mut metrics).await? else {
                    continue;
                };
                let since_loss = world.elapsed_secs() - LOSS_AT;
                if lost && (30.0..=450.0).contains(&since_loss) && !obs.update.estimate.is_fresh() {
                    stale_too_early = true;
                }
                last = Some(obs);
            }
        }

        let last = last.ok_or_else(|| SimError::Config("scenario produced no observation".into()))?;
        let last_fix = world
            .log
            .latest(&vehicle)
            .await?
            .ok_or_else(|| SimError::UnknownVehicle(vehicle.to_string()))?;
        let projector = PositionProjector::new(world.config.engine.projection.clone());
        let last_fix_km = projector.project(last_fix.position, &world.track)?.track_km;

        let estimate = &last.update.estimate;
        let failure = if stale_too_early {
            Some("estimate turned stale while a tracker report was in its window".to_string())
        } else if estimate.is_fresh() {
            Some(format!(
                "estimate still fresh {:.0} s after signal loss",
                world.elapsed_secs() - LOSS_AT
            ))
        } else if (estimate.track_km - last_fix_km).abs() > 1e-9 {
            Some(format!(
                "stale estimate at km {:.4}, last fix at km {:.4}",
                estimate.track_km, last_fix_km
            ))
        } else {
            None
        };

        debug!(
            "Signal loss: truth km {:.3}, stale estimate km {:.3}",
            last.true_km, estimate.track_km
        );
        Ok(self.finish(ScenarioId::SignalLoss, &world, metrics, failure))
    }

    /// SIM-003: PhoneOnly - no hardware tracker.
    ///
    /// **Assertion**: RMS error < 40 m, ≥ 90% fresh estimates, and the
    /// reported speed stays 0 since it only ever comes from trackers.
    async fn run_phone_only(&self, duration: f64) -> Result<ScenarioResult, SimError> {
        let mut world = SimWorld::new(self.seed, self.config.clone()).await?;
        let vehicle = world.spawn(1.5, 14.0, TravelDirection::Forward, false, true).await?;

        let mut metrics = ScenarioMetrics::default();
        let mut speed_leaked = false;

        for _ in 0..world.ticks_for(duration) {
            metrics.record_tick(world.step().await?);
            if world.is_eval_tick() {
                let obs = observe(&world, &vehicle, &mut metrics).await?;
                if obs.is_some_and(|o| o.update.speed_kmh != 0.0) {
                    speed_leaked = true;
                }
            }
        }

        let mut probe = metrics.clone();
        probe.finish();
        let failure = if speed_leaked {
            Some("app-derived speed leaked into the speed field".to_string())
        } else if probe.rms_error_m >= 40.0 {
            Some(format!("RMS error {:.1} m exceeds 40 m", probe.rms_error_m))
        } else if probe.fresh_ratio() < 0.9 {
            Some(format!("only {:.0}% fresh estimates", probe.fresh_ratio() * 100.0))
        } else {
            None
        };
        Ok(self.finish(ScenarioId::PhoneOnly, &world, metrics, failure))
    }

    /// SIM-004: Oncoming - two draisines closing at 30 km/h.
    ///
    /// **Assertion**: the forward draisine is warned about the other one
    /// before they meet.
    async fn run_oncoming(&self, duration: f64) -> Result<ScenarioResult, SimError> {
        let mut world = SimWorld::new(self.seed, self.config.clone()).await?;
        let rider = world.spawn(4.0, 15.0, TravelDirection::Forward, true, true).await?;
        let other = world.spawn(6.0, 15.0, TravelDirection::Backward, true, true).await?;

        let mut metrics = ScenarioMetrics::default();
        let mut first_warning_gap_m: Option<f64> = None;

        for _ in 0..world.ticks_for(duration) {
            metrics.record_tick(world.step().await?);
            if !world.is_eval_tick() {
                continue;
            }

            observe(&world, &other, &mut metrics).await?;
            let Some(obs) = observe(&world, &rider, &mut metrics).await? else {
                continue;
            };

            let warned = obs.warnings.iter().any(|w| {
                matches!(w, Warning::OncomingVehicle { vehicle_id, .. } if *vehicle_id == other)
            });
            if warned && first_warning_gap_m.is_none() {
                let gap_m = (world.true_km(&other)? - obs.true_km) * 1000.0;
                info!("t={:.0}s: oncoming warning, true gap {:.0} m", world.elapsed_secs(), gap_m);
                first_warning_gap_m = Some(gap_m);
            }
        }

        let failure = match first_warning_gap_m {
            None => Some("no oncoming warning raised".to_string()),
            Some(gap) if gap <= 0.0 => Some(format!("warning came after passing ({:.0} m)", gap)),
            Some(_) => None,
        };
        Ok(self.finish(ScenarioId::Oncoming, &world, metrics, failure))
    }

    /// SIM-005: LevelCrossing - a draisine approaching a crossing.
    ///
    /// **Assertion**: the crossing warning first fires at a true distance
    /// close to the 200 m threshold, and picnic spots never warn.
    async fn run_level_crossing(&self, duration: f64) -> Result<ScenarioResult, SimError> {
        let mut world = SimWorld::new(self.seed, self.config.clone()).await?;
        let crossing = world.add_poi("Bahnübergang B76", PoiKind::LevelCrossing, 2.0).await?;
        world.add_poi("Rastplatz Kellersee", PoiKind::Picnic, 1.5).await?;
        let vehicle = world.spawn(1.0, 15.0, TravelDirection::Forward, true, true).await?;

        let mut metrics = ScenarioMetrics::default();
        let mut first_warning_m: Option<f64> = None;
        let mut wrong_poi = false;

        for _ in 0..world.ticks_for(duration) {
            metrics.record_tick(world.step().await?);
            if !world.is_eval_tick() {
                continue;
            }

            let Some(obs) = observe(&world, &vehicle, &mut metrics).await? else {
                continue;
            };
            for warning in &obs.warnings {
                if let Warning::LevelCrossingAhead { poi_id, .. } = warning {
                    if *poi_id != crossing.id {
                        wrong_poi = true;
                    } else if first_warning_m.is_none() {
                        let true_m = (crossing.track_km - obs.true_km) * 1000.0;
                        info!(
                            "t={:.0}s: crossing warning, true distance {:.0} m",
                            world.elapsed_secs(),
                            true_m
                        );
                        first_warning_m = Some(true_m);
                    }
                }
            }
        }

        let limit = world.config.warnings.crossing_warning_m;
        let failure = if wrong_poi {
            Some("warning raised for a POI that is not a crossing".to_string())
        } else {
            match first_warning_m {
                None => Some("no crossing warning raised".to_string()),
                Some(d) if !(-25.0..=limit + 60.0).contains(&d) => {
                    Some(format!("first crossing warning at true distance {:.0} m", d))
                }
                Some(_) => None,
            }
        };
        Ok(self.finish(ScenarioId::LevelCrossing, &world, metrics, failure))
    }
}
