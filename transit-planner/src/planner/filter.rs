//! Connection filters that bound profile scans.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::{Connection, ConnectionId, StopId, Time, TripId};
use crate::journey::Direction;

use super::PlanError;
use super::scan::Isochrone;

/// Decides which connections a scan may use.
pub trait ConnectionFilter: Send + Sync {
    /// Returns false to veto `connection`.
    fn can_be_taken(&self, id: ConnectionId, connection: &Connection) -> bool;

    /// Fails if the filter cannot answer for a scan over `[earliest, latest]`.
    fn check_window(&self, earliest: Time, latest: Time) -> Result<(), PlanError>;
}

/// Admits only connections an isochrone proves usable.
///
/// Built from a forward isochrone, a connection passes if its departure
/// stop or its trip was reached by its departure time. Built from a
/// backward isochrone, it passes if its arrival stop or its trip still
/// leads to the targets after its arrival time.
#[derive(Debug, Clone)]
pub struct IsochroneFilter {
    direction: Direction,
    stops: HashMap<StopId, Time>,
    trips: HashMap<TripId, Time>,
    window: (Time, Time),
}

impl IsochroneFilter {
    pub fn new<T>(isochrone: &Isochrone<T>) -> Self {
        Self {
            direction: isochrone.direction(),
            stops: isochrone
                .iter()
                .map(|(stop, journey)| (stop, journey.time()))
                .collect(),
            trips: isochrone.trips().clone(),
            window: isochrone.window(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl ConnectionFilter for IsochroneFilter {
    fn can_be_taken(&self, _id: ConnectionId, c: &Connection) -> bool {
        match self.direction {
            Direction::Forward => {
                let departs = c.departure_time;
                self.stops
                    .get(&c.departure_stop)
                    .is_some_and(|&t| t <= departs)
                    || self.trips.get(&c.trip).is_some_and(|&t| t <= departs)
            }
            Direction::Backward => {
                let arrives = c.arrival_time();
                self.stops
                    .get(&c.arrival_stop)
                    .is_some_and(|&t| t >= arrives)
                    || self.trips.get(&c.trip).is_some_and(|&t| t >= arrives)
            }
        }
    }

    fn check_window(&self, earliest: Time, latest: Time) -> Result<(), PlanError> {
        let (filter_earliest, filter_latest) = self.window;
        if earliest < filter_earliest || latest > filter_latest {
            return Err(PlanError::FilterWindow {
                earliest,
                latest,
                filter_earliest,
                filter_latest,
            });
        }
        Ok(())
    }
}

/// Admits a connection only if every filter in the chain does.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ConnectionFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: Arc<dyn ConnectionFilter>) {
        self.filters.push(filter);
    }

    pub fn with(mut self, filter: Arc<dyn ConnectionFilter>) -> Self {
        self.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl ConnectionFilter for FilterChain {
    fn can_be_taken(&self, id: ConnectionId, connection: &Connection) -> bool {
        self.filters.iter().all(|f| f.can_be_taken(id, connection))
    }

    fn check_window(&self, earliest: Time, latest: Time) -> Result<(), PlanError> {
        self.filters
            .iter()
            .try_for_each(|f| f.check_window(earliest, latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(dep_stop: u32, arr_stop: u32, dep: Time, arr: Time, trip: u32) -> Connection {
        Connection::new("c", StopId(dep_stop), StopId(arr_stop), dep, arr, TripId(trip)).unwrap()
    }

    fn forward_filter() -> IsochroneFilter {
        IsochroneFilter {
            direction: Direction::Forward,
            stops: HashMap::from([(StopId(0), 100), (StopId(1), 300)]),
            trips: HashMap::from([(TripId(7), 200)]),
            window: (100, 1_000),
        }
    }

    #[test]
    fn forward_filter_needs_stop_or_trip_in_time() {
        let filter = forward_filter();
        assert!(filter.can_be_taken(ConnectionId(0), &conn(0, 1, 100, 200, 1)));
        // Stop 1 is only reached at 300.
        assert!(!filter.can_be_taken(ConnectionId(1), &conn(1, 2, 250, 400, 1)));
        // ...unless the traveller is already on trip 7.
        assert!(filter.can_be_taken(ConnectionId(2), &conn(1, 2, 250, 400, 7)));
        // Never reached.
        assert!(!filter.can_be_taken(ConnectionId(3), &conn(5, 2, 900, 950, 1)));
    }

    #[test]
    fn backward_filter_needs_stop_or_trip_in_time() {
        let filter = IsochroneFilter {
            direction: Direction::Backward,
            stops: HashMap::from([(StopId(2), 500)]),
            trips: HashMap::from([(TripId(3), 450)]),
            window: (100, 1_000),
        };
        assert!(filter.can_be_taken(ConnectionId(0), &conn(1, 2, 300, 500, 1)));
        assert!(!filter.can_be_taken(ConnectionId(1), &conn(1, 2, 300, 501, 1)));
        assert!(filter.can_be_taken(ConnectionId(2), &conn(0, 1, 300, 440, 3)));
        assert!(!filter.can_be_taken(ConnectionId(3), &conn(0, 1, 300, 460, 3)));
    }

    #[test]
    fn window_outside_filter_is_rejected() {
        let filter = forward_filter();
        assert!(filter.check_window(100, 1_000).is_ok());
        assert!(filter.check_window(200, 800).is_ok());
        assert!(matches!(
            filter.check_window(50, 800),
            Err(PlanError::FilterWindow {
                filter_earliest: 100,
                ..
            })
        ));
        assert!(filter.check_window(100, 1_001).is_err());
    }

    #[test]
    fn chain_requires_every_filter() {
        let backward = IsochroneFilter {
            direction: Direction::Backward,
            stops: HashMap::from([(StopId(1), 300)]),
            trips: HashMap::new(),
            window: (0, 500),
        };
        let chain = FilterChain::new()
            .with(Arc::new(forward_filter()))
            .with(Arc::new(backward));
        assert_eq!(chain.len(), 2);

        assert!(chain.can_be_taken(ConnectionId(0), &conn(0, 1, 100, 200, 1)));
        assert!(!chain.can_be_taken(ConnectionId(1), &conn(0, 1, 100, 400, 1)));
        // The backward filter only covers up to 500.
        assert!(chain.check_window(100, 500).is_ok());
        assert!(chain.check_window(100, 600).is_err());
        assert!(FilterChain::new().can_be_taken(ConnectionId(0), &conn(0, 1, 0, 1, 0)));
    }
}
