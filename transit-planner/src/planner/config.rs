//! Planner configuration.

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::store::{DEFAULT_WINDOW_COUNT, DEFAULT_WINDOW_SIZE};

use super::PlanError;

/// Configuration parameters for the planner and the store it reads.
///
/// Missing fields take their default values when loading from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Width of one connection index window (seconds).
    pub window_size_secs: u32,

    /// Number of index windows before the slots wrap around.
    pub window_count: u32,

    /// Minimum time to change vehicles at the same stop (seconds).
    pub min_transfer_secs: u32,

    /// Walking speed (metres per second).
    pub walking_speed: f64,

    /// Maximum walking distance between stops (metres).
    /// Zero disables walking.
    pub max_walk_metres: f64,

    /// Prune profile scans with earliest-arrival and latest-departure
    /// isochrones.
    pub prune_with_isochrones: bool,

    /// Drop journeys using more vehicles than this.
    pub max_vehicles: Option<u32>,
}

impl PlannerConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let json = std::fs::read_to_string(path).map_err(crate::store::StoreError::from)?;
        Self::from_json(&json)
    }

    /// Returns the minimum transfer time as a Duration.
    pub fn min_transfer(&self) -> Duration {
        Duration::seconds(i64::from(self.min_transfer_secs))
    }

    /// Returns the longest walk as a Duration.
    pub fn max_walk(&self) -> Duration {
        if self.walking_speed <= 0.0 {
            return Duration::zero();
        }
        Duration::seconds((self.max_walk_metres / self.walking_speed).ceil() as i64)
    }

    /// Returns true if walking between stops is enabled.
    pub fn walking_enabled(&self) -> bool {
        self.max_walk_metres > 0.0 && self.walking_speed > 0.0
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            window_size_secs: DEFAULT_WINDOW_SIZE,
            window_count: DEFAULT_WINDOW_COUNT,
            min_transfer_secs: 180,
            walking_speed: 1.4,
            max_walk_metres: 500.0,
            prune_with_isochrones: true,
            max_vehicles: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlannerConfig::default();

        assert_eq!(config.window_size_secs, 60);
        assert_eq!(config.window_count, 1440);
        assert_eq!(config.min_transfer_secs, 180);
        assert!(config.prune_with_isochrones);
        assert!(config.walking_enabled());
        assert_eq!(config.max_vehicles, None);
    }

    #[test]
    fn duration_methods() {
        let config = PlannerConfig::default();

        assert_eq!(config.min_transfer(), Duration::minutes(3));
        // 500 m at 1.4 m/s, rounded up.
        assert_eq!(config.max_walk(), Duration::seconds(358));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config =
            PlannerConfig::from_json(r#"{ "min_transfer_secs": 0, "max_vehicles": 2 }"#).unwrap();

        assert_eq!(config.min_transfer_secs, 0);
        assert_eq!(config.max_vehicles, Some(2));
        assert_eq!(config.window_count, 1440);
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            PlannerConfig::from_json("{ \"window_count\": \"many\" }"),
            Err(PlanError::Config(_))
        ));
    }

    #[test]
    fn json_roundtrip_through_file() {
        let config = PlannerConfig {
            max_walk_metres: 0.0,
            ..PlannerConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planner.json");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = PlannerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!loaded.walking_enabled());
    }
}
