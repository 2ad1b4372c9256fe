//! Routing profiles: how journeys are built, compared and filtered.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::journey::{Journey, MetricComparator, ProfileComparator, TransferMetric};
use crate::transfers::{CrowsFlightTransferGenerator, InternalTransferGenerator, TransferGenerator};

use super::PlannerConfig;

/// Post-processing applied to the journeys a profile scan returns.
pub trait JourneyFilter<T>: Send + Sync {
    fn filter(&self, journeys: Vec<Journey<T>>) -> Vec<Journey<T>>;
}

/// Drops journeys that use more than `max_vehicles` vehicles.
#[derive(Debug, Clone, Copy)]
pub struct MaxVehiclesFilter {
    pub max_vehicles: u32,
}

impl<T> JourneyFilter<T> for MaxVehiclesFilter {
    fn filter(&self, journeys: Vec<Journey<T>>) -> Vec<Journey<T>> {
        journeys
            .into_iter()
            .filter(|j| j.vehicle_count() <= self.max_vehicles as usize)
            .collect()
    }
}

/// Everything a scan needs besides the data: transfer rules, the
/// comparator for Pareto frontiers and an optional result filter.
pub struct Profile<T> {
    /// Transfers between vehicles at the same stop.
    pub internal_transfers: Arc<dyn TransferGenerator>,
    /// Walks to nearby stops; `None` disables walking.
    pub walks: Option<Arc<dyn TransferGenerator>>,
    pub comparator: Arc<dyn MetricComparator<T>>,
    pub journey_filter: Option<Arc<dyn JourneyFilter<T>>>,
    /// Bound profile scans with isochrones before running them.
    pub prune_with_isochrones: bool,
}

impl<T> Clone for Profile<T> {
    fn clone(&self) -> Self {
        Self {
            internal_transfers: Arc::clone(&self.internal_transfers),
            walks: self.walks.clone(),
            comparator: Arc::clone(&self.comparator),
            journey_filter: self.journey_filter.clone(),
            prune_with_isochrones: self.prune_with_isochrones,
        }
    }
}

impl<T> fmt::Debug for Profile<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("walks", &self.walks.is_some())
            .field("journey_filter", &self.journey_filter.is_some())
            .field("prune_with_isochrones", &self.prune_with_isochrones)
            .finish_non_exhaustive()
    }
}

impl<T> Profile<T> {
    /// Creates a profile without walking, filtering or pruning.
    pub fn new(
        internal_transfers: Arc<dyn TransferGenerator>,
        comparator: Arc<dyn MetricComparator<T>>,
    ) -> Self {
        Self {
            internal_transfers,
            walks: None,
            comparator,
            journey_filter: None,
            prune_with_isochrones: false,
        }
    }

    pub fn with_walks(mut self, walks: Arc<dyn TransferGenerator>) -> Self {
        self.walks = Some(walks);
        self
    }

    pub fn with_journey_filter(mut self, filter: Arc<dyn JourneyFilter<T>>) -> Self {
        self.journey_filter = Some(filter);
        self
    }

    pub fn with_isochrone_pruning(mut self, enabled: bool) -> Self {
        self.prune_with_isochrones = enabled;
        self
    }

    /// The same profile with instant changes between vehicles.
    ///
    /// Scans with it never arrive later, nor leave earlier, than with `self`.
    pub(crate) fn relaxed(&self) -> Self {
        Self {
            internal_transfers: Arc::new(InternalTransferGenerator::new(0)),
            ..self.clone()
        }
    }

    pub(crate) fn apply_journey_filter(&self, journeys: Vec<Journey<T>>) -> Vec<Journey<T>> {
        match &self.journey_filter {
            Some(filter) => filter.filter(journeys),
            None => journeys,
        }
    }
}

impl Profile<TransferMetric> {
    /// Builds the default profile: fixed transfer time, crow's-flight walks,
    /// later departure / earlier arrival / fewer vehicles.
    pub fn from_config(config: &PlannerConfig) -> Self {
        debug!(
            min_transfer = %config.min_transfer(),
            max_walk = %config.max_walk(),
            prune = config.prune_with_isochrones,
            "building profile"
        );
        let mut profile = Profile::new(
            Arc::new(InternalTransferGenerator::new(config.min_transfer_secs)),
            Arc::new(ProfileComparator),
        )
        .with_isochrone_pruning(config.prune_with_isochrones);
        if config.walking_enabled() {
            profile = profile.with_walks(Arc::new(CrowsFlightTransferGenerator::new(
                config.max_walk_metres,
                config.walking_speed,
            )));
        }
        if let Some(max_vehicles) = config.max_vehicles {
            profile = profile.with_journey_filter(Arc::new(MaxVehiclesFilter { max_vehicles }));
        }
        profile
    }
}

impl Default for Profile<TransferMetric> {
    fn default() -> Self {
        Self::from_config(&PlannerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Connection, ConnectionId, StopId, TripId};
    use crate::journey::Metric;

    #[test]
    fn from_config_wires_generators() {
        let config = PlannerConfig {
            min_transfer_secs: 240,
            max_walk_metres: 0.0,
            max_vehicles: Some(1),
            prune_with_isochrones: false,
            ..PlannerConfig::default()
        };
        let profile = Profile::from_config(&config);
        assert!(profile.walks.is_none());
        assert!(profile.journey_filter.is_some());
        assert!(!profile.prune_with_isochrones);
        assert_eq!(profile.internal_transfers.range(), 0.0);

        let walking = Profile::from_config(&PlannerConfig::default());
        assert_eq!(walking.walks.as_ref().map(|w| w.range()), Some(500.0));
    }

    #[test]
    fn max_vehicles_filter() {
        let start: Journey<TransferMetric> =
            Journey::genesis(StopId(0), 0, TransferMetric::zero());
        let one = start.chain_connection(
            ConnectionId(0),
            &Connection::new("a", StopId(0), StopId(1), 10, 20, TripId(0)).unwrap(),
        );
        let two = one.chain_connection(
            ConnectionId(1),
            &Connection::new("b", StopId(1), StopId(2), 30, 40, TripId(1)).unwrap(),
        );

        let filter = MaxVehiclesFilter { max_vehicles: 1 };
        let kept = filter.filter(vec![one.clone(), two]);
        assert_eq!(kept, vec![one]);
    }
}
