//! RailTrail Deterministic Simulation Harness
//!
//! This crate drives the positioning core with simulated draisines on a
//! synthetic track, so fusion and proximity behavior can be checked against
//! ground truth.
//!
//! # Core Principle: One Seed, One Run
//!
//! All sources of non-determinism are controlled:
//! - **Time**: A virtual clock advanced tick by tick
//! - **Sensors**: GPS noise, heading noise and uplink loss drawn from a
//!   seeded ChaCha stream
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        SimWorld                          │
//! │  ┌────────────┐   reports   ┌──────────────────────────┐ │
//! │  │   Oracle   │────────────►│     PositionService      │ │
//! │  │ (draisines │             │ (log + registry + fusion)│ │
//! │  │  + noise)  │             └────────────┬─────────────┘ │
//! │  └─────▲──────┘                          │ VehicleUpdate │
//! │        │ truth                     ┌─────▼─────┐         │
//! │        └──────────────────────────►│  Runner   │         │
//! │                                    │ (scoring) │         │
//! │                                    └───────────┘         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use railtrail_sim::ScenarioRunner;
//! use railtrail_sim::scenarios::ScenarioId;
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Cruise).await;
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod oracle;
mod runner;
mod warnings;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use oracle::{Draisine, Oracle, SensorConfig, Uplinks};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use warnings::{evaluate, Warning, WarningConfig};
pub use world::{synthetic_track, SimConfig, SimWorld, TickStats};
