//! The append-only location report log.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::EnvError;
use crate::types::{LocationReport, VehicleId};

/// Read/append access to the per-vehicle report history.
///
/// The positioning engine never deletes reports: windows are applied at read
/// time. Each call must observe a consistent snapshot of "reports up to now";
/// nothing stronger is required.
///
/// # Implementations
///
/// - **In-memory**: [`MemoryReportLog`], used by tests and the simulator
/// - **Production**: a database-backed log living outside this workspace
#[async_trait]
pub trait ReportLog: Send + Sync + 'static {
    /// Appends a report to the vehicle's history.
    async fn append(&self, report: LocationReport) -> Result<(), EnvError>;

    /// Returns all reports of `vehicle` with `since <= timestamp <= until`,
    /// oldest first.
    async fn window(
        &self,
        vehicle: &VehicleId,
        since: f64,
        until: f64,
    ) -> Result<Vec<LocationReport>, EnvError>;

    /// Returns the most recent report ever recorded for `vehicle`.
    async fn latest(&self, vehicle: &VehicleId) -> Result<Option<LocationReport>, EnvError>;

    /// Returns every vehicle that has at least one report.
    async fn vehicles(&self) -> Result<Vec<VehicleId>, EnvError>;
}

/// In-memory [`ReportLog`] keyed by vehicle.
///
/// Each vehicle's history is kept sorted by timestamp so late-arriving
/// uplinks (LoRaWAN gateways buffer) still land in order.
#[derive(Debug, Default)]
pub struct MemoryReportLog {
    reports: RwLock<HashMap<VehicleId, Vec<LocationReport>>>,
}

impl MemoryReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored reports across all vehicles.
    pub async fn len(&self) -> usize {
        self.reports.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ReportLog for MemoryReportLog {
    async fn append(&self, report: LocationReport) -> Result<(), EnvError> {
        if !report.timestamp.is_finite() {
            return Err(EnvError::InconsistentReport(format!(
                "non-finite timestamp for vehicle {}",
                report.vehicle_id
            )));
        }

        let mut reports = self.reports.write().await;
        let history = reports.entry(report.vehicle_id).or_default();

        // Equal timestamps keep arrival order
        let idx = history.partition_point(|r| r.timestamp <= report.timestamp);
        history.insert(idx, report);
        Ok(())
    }

    async fn window(
        &self,
        vehicle: &VehicleId,
        since: f64,
        until: f64,
    ) -> Result<Vec<LocationReport>, EnvError> {
        let reports = self.reports.read().await;
        let Some(history) = reports.get(vehicle) else {
            return Ok(Vec::new());
        };

        let start = history.partition_point(|r| r.timestamp < since);
        let end = history.partition_point(|r| r.timestamp <= until);
        Ok(history[start..end.max(start)].to_vec())
    }

    async fn latest(&self, vehicle: &VehicleId) -> Result<Option<LocationReport>, EnvError> {
        let reports = self.reports.read().await;
        Ok(reports.get(vehicle).and_then(|h| h.last().cloned()))
    }

    async fn vehicles(&self) -> Result<Vec<VehicleId>, EnvError> {
        let reports = self.reports.read().await;
        let mut ids: Vec<VehicleId> = reports.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoPoint, TrackerId};

    fn report(vehicle: VehicleId, t: f64) -> LocationReport {
        LocationReport::from_tracker(TrackerId::new("t1"), vehicle, t, GeoPoint::new(54.0, 10.0))
    }

    #[tokio::test]
    async fn test_append_keeps_time_order() {
        let log = MemoryReportLog::new();
        let vehicle = VehicleId::from_seed(1);

        log.append(report(vehicle, 30.0)).await.unwrap();
        log.append(report(vehicle, 10.0)).await.unwrap();
        log.append(report(vehicle, 20.0)).await.unwrap();

        let all = log.window(&vehicle, 0.0, 100.0).await.unwrap();
        let times: Vec<f64> = all.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![10.0, 20.0, 30.0]);
        assert_eq!(log.latest(&vehicle).await.unwrap().unwrap().timestamp, 30.0);
    }

    #[tokio::test]
    async fn test_window_bounds_are_inclusive() {
        let log = MemoryReportLog::new();
        let vehicle = VehicleId::from_seed(2);
        for t in [0.0, 10.0, 20.0, 30.0] {
            log.append(report(vehicle, t)).await.unwrap();
        }

        let window = log.window(&vehicle, 10.0, 20.0).await.unwrap();
        assert_eq!(window.len(), 2);

        let empty = log.window(&vehicle, 40.0, 50.0).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_vehicle_is_empty_not_error() {
        let log = MemoryReportLog::new();
        let vehicle = VehicleId::from_seed(3);

        assert!(log.window(&vehicle, 0.0, 1.0).await.unwrap().is_empty());
        assert!(log.latest(&vehicle).await.unwrap().is_none());
        assert!(log.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejects_non_finite_timestamp() {
        let log = MemoryReportLog::new();
        let result = log.append(report(VehicleId::from_seed(4), f64::NAN)).await;
        assert!(matches!(result, Err(EnvError::InconsistentReport(_))));
    }

    #[tokio::test]
    async fn test_vehicles_lists_each_once() {
        let log = MemoryReportLog::new();
        let a = VehicleId::from_seed(5);
        let b = VehicleId::from_seed(6);
        log.append(report(a, 1.0)).await.unwrap();
        log.append(report(a, 2.0)).await.unwrap();
        log.append(report(b, 1.0)).await.unwrap();

        let vehicles = log.vehicles().await.unwrap();
        assert_eq!(vehicles.len(), 2);
        assert!(vehicles.contains(&a) && vehicles.contains(&b));
    }
}
