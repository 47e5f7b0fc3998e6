//! Simulation scenarios for the positioning core.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: Three draisines with tracker and phone, scored against truth
    Cruise,

    /// SIM-002: All devices go dark, the estimate must turn stale
    SignalLoss,

    /// SIM-003: No hardware tracker, the rider's phone only
    PhoneOnly,

    /// SIM-004: Two draisines approaching each other head-on
    Oncoming,

    /// SIM-005: A draisine approaching a level crossing
    LevelCrossing,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Cruise,
            ScenarioId::SignalLoss,
            ScenarioId::PhoneOnly,
            ScenarioId::Oncoming,
            ScenarioId::LevelCrossing,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Cruise => "cruise",
            ScenarioId::SignalLoss => "signal_loss",
            ScenarioId::PhoneOnly => "phone_only",
            ScenarioId::Oncoming => "oncoming",
            ScenarioId::LevelCrossing => "level_crossing",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Cruise => "3 draisines, tracker + phone, 5 m GPS noise, 5% uplink loss",
            ScenarioId::SignalLoss => {
                "Tracker and phone go dark, estimate must fall back to last fix"
            }
            ScenarioId::PhoneOnly => "Phone heartbeats only, speed derived from consecutive fixes",
            ScenarioId::Oncoming => {
                "Two draisines closing at 30 km/h, oncoming warning before passing"
            }
            ScenarioId::LevelCrossing => {
                "Crossing warning raised within 200 m, never for picnic spots"
            }
        }
    }

    /// Minimum virtual duration the scenario needs to reach its assertions.
    pub fn min_duration_secs(&self) -> f64 {
        match self {
            ScenarioId::Cruise | ScenarioId::PhoneOnly => 120.0,
            ScenarioId::SignalLoss => 900.0,
            ScenarioId::Oncoming | ScenarioId::LevelCrossing => 360.0,
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cruise" | "sim-001" => Ok(ScenarioId::Cruise),
            "signal_loss" | "signalloss" | "sim-002" => Ok(ScenarioId::SignalLoss),
            "phone_only" | "phoneonly" | "sim-003" => Ok(ScenarioId::PhoneOnly),
            "oncoming" | "sim-004" => Ok(ScenarioId::Oncoming),
            "level_crossing" | "levelcrossing" | "sim-005" => Ok(ScenarioId::LevelCrossing),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
