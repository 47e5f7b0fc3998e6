//! RailTrail Environment Abstraction Layer
//!
//! This crate holds everything the positioning engines need from the outside
//! world, so that they can run unchanged in **Production** (system clock,
//! database-backed log) and **Simulation** (virtual clock, in-memory log).
//!
//! - Time (`RailTrailContext`)
//! - The append-only location report log (`ReportLog`)
//! - Identifier and report types shared by all crates
//!
//! # Example
//!
//! ```ignore
//! use railtrail_env::{MemoryReportLog, ReportLog, RailTrailContext, SystemContext};
//!
//! async fn recent<L: ReportLog, C: RailTrailContext>(log: &L, ctx: &C, vehicle: &VehicleId) {
//!     let now = ctx.now_secs();
//!     let reports = log.window(vehicle, now - 600.0, now).await?;
//! }
//! ```

mod context;
mod error;
mod report_log;
mod system_impl;
mod types;

pub use context::RailTrailContext;
pub use error::EnvError;
pub use report_log::{MemoryReportLog, ReportLog};
pub use system_impl::SystemContext;
pub use types::{GeoPoint, LocationReport, TrackId, TrackerId, VehicleId};
