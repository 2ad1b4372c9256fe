//! Profile connection scan: every Pareto-optimal journey in a time window.
//!
//! The scan walks the departure axis backward from the latest arrival and
//! keeps two kinds of Pareto frontiers of backward journeys:
//!
//! - per stop: ways to get from that stop to a destination
//! - per trip: ways to get to a destination by staying on that trip past
//!   the connection last scanned
//!
//! Trip frontiers keep journeys that only stay optimal because the
//! traveller remains seated. Without them a journey riding on past a stop
//! where a better-looking change exists would be pruned at that stop.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::domain::{Connection, ConnectionId, StopId, Time, TripId};
use crate::journey::{Journey, LegKind, Metric, ParetoFrontier};
use crate::store::TransitSnapshot;
use crate::transfers::{create_transfer, reachable_stops};

use super::PlanError;
use super::filter::ConnectionFilter;
use super::profile::Profile;

/// Pareto frontiers per stop after a profile scan.
#[derive(Debug, Clone)]
pub struct ProfileResult<T> {
    frontiers: HashMap<StopId, ParetoFrontier<T>>,
    earliest_departure: Time,
}

impl<T: Metric> ProfileResult<T> {
    /// Backward journeys from `stop` to the destinations.
    pub fn frontier(&self, stop: StopId) -> Option<&ParetoFrontier<T>> {
        self.frontiers.get(&stop)
    }

    /// Journeys leaving `stop` no earlier than `access` seconds after the
    /// window start, in travel order. A merged journey yields one entry per
    /// alternative.
    pub fn journeys_from(&self, stop: StopId, access: u64) -> Vec<Journey<T>> {
        let earliest = self.earliest_departure.saturating_add(access);
        self.frontiers
            .get(&stop)
            .into_iter()
            .flat_map(|frontier| frontier.iter())
            .filter(|j| j.departure_time() >= earliest)
            .flat_map(Journey::reverse)
            .collect()
    }

    /// Number of stops with at least one journey.
    pub fn reached(&self) -> usize {
        self.frontiers.values().filter(|f| !f.is_empty()).count()
    }
}

/// Multi-criteria backward scan over `[earliest_departure, last_arrival]`.
pub struct ProfileScan<'a, T> {
    snapshot: &'a TransitSnapshot,
    profile: &'a Profile<T>,
    filter: Option<&'a dyn ConnectionFilter>,
    earliest_departure: Time,
    last_arrival: Time,
    /// Destinations and the seconds still needed after reaching each.
    destinations: HashMap<StopId, u64>,
    /// Stops from which a destination is one walk away, with the walks.
    walk_ins: HashMap<StopId, Vec<(StopId, u32)>>,
    stops: HashMap<StopId, ParetoFrontier<T>>,
    trips: HashMap<TripId, ParetoFrontier<T>>,
}

impl<'a, T: Metric> ProfileScan<'a, T> {
    pub fn new(
        snapshot: &'a TransitSnapshot,
        profile: &'a Profile<T>,
        destinations: HashMap<StopId, u64>,
        earliest_departure: Time,
        last_arrival: Time,
    ) -> Self {
        let mut walk_ins: HashMap<StopId, Vec<(StopId, u32)>> = HashMap::new();
        if let Some(walks) = &profile.walks {
            for &destination in destinations.keys() {
                for (stop, _) in reachable_stops(walks.as_ref(), &snapshot.stops, destination) {
                    // Walk from `stop` into `destination`.
                    let Some(secs) = snapshot
                        .stops
                        .get(stop)
                        .zip(snapshot.stops.get(destination))
                        .and_then(|(from, to)| walks.time_between(from, to))
                    else {
                        continue;
                    };
                    walk_ins.entry(stop).or_default().push((destination, secs));
                }
            }
        }
        Self {
            snapshot,
            profile,
            filter: None,
            earliest_departure,
            last_arrival,
            destinations,
            walk_ins,
            stops: HashMap::new(),
            trips: HashMap::new(),
        }
    }

    /// Vetoes connections through `filter`.
    ///
    /// # Errors
    ///
    /// Whatever `filter.check_window` reports for this scan's window.
    pub fn filter(mut self, filter: &'a dyn ConnectionFilter) -> Result<Self, PlanError> {
        filter.check_window(self.earliest_departure, self.last_arrival)?;
        self.filter = Some(filter);
        Ok(self)
    }

    /// Scans the window.
    ///
    /// # Errors
    ///
    /// [`PlanError::NoDataInRange`] if no connection departs at or before
    /// the latest arrival.
    pub fn run(mut self) -> Result<ProfileResult<T>, PlanError> {
        let mut cursor = self
            .snapshot
            .connections
            .enumerate_from_departure(self.last_arrival);
        if !cursor.move_previous() {
            return Err(PlanError::NoDataInRange {
                start: self.last_arrival,
            });
        }
        debug!(
            earliest_departure = self.earliest_departure,
            last_arrival = self.last_arrival,
            destinations = self.destinations.len(),
            filtered = self.filter.is_some(),
            "profile scan started"
        );

        let mut scanned = 0usize;
        let mut vetoed = 0usize;
        loop {
            let (Some(id), Some(connection)) = (cursor.current_id(), cursor.current()) else {
                break;
            };
            if connection.departure_time < self.earliest_departure {
                break;
            }
            if self.filter.is_some_and(|f| !f.can_be_taken(id, connection)) {
                vetoed += 1;
            } else if connection.arrival_time() <= self.last_arrival {
                self.scan_connection(id, connection);
                scanned += 1;
            }
            if !cursor.move_previous() {
                break;
            }
        }

        debug!(
            scanned,
            vetoed,
            stops = self.stops.len(),
            open_trips = self.trips.len(),
            "profile scan finished"
        );
        Ok(ProfileResult {
            frontiers: self.stops,
            earliest_departure: self.earliest_departure,
        })
    }

    fn scan_connection(&mut self, id: ConnectionId, c: &Connection) {
        let profile = self.profile;
        let comparator = profile.comparator.as_ref();
        let arrives = c.arrival_time();
        let mut candidates = Vec::new();

        // Stay seated: extend the trip's own journeys through `c`.
        if let Some(on_trip) = self.trips.get(&c.trip) {
            candidates.extend(
                on_trip
                    .iter()
                    .filter(|j| j.location() == c.arrival_stop && j.time() >= arrives)
                    .map(|j| j.chain_connection(id, c)),
            );
        }

        if c.can_get_off() {
            candidates.extend(self.final_legs(id, c));

            // Change at the arrival stop. Journeys continuing on the same
            // trip were handled above.
            if let Some(onward) = self.stops.get(&c.arrival_stop) {
                for journey in onward.iter() {
                    if journey.last_trip() == Some(c.trip) {
                        continue;
                    }
                    let Some(ready) = create_transfer(
                        profile.internal_transfers.as_ref(),
                        &self.snapshot.stops,
                        journey,
                        c.arrival_stop,
                    ) else {
                        continue;
                    };
                    if ready.time() >= arrives {
                        candidates.push(ready.chain_connection(id, c));
                    }
                }
            }
        }

        if candidates.is_empty() {
            self.trips.remove(&c.trip);
            return;
        }

        let mut on_trip = ParetoFrontier::new();
        for candidate in candidates {
            on_trip.add(candidate, comparator);
        }
        trace!(
            connection = %id,
            trip = %c.trip,
            journeys = on_trip.len(),
            "trip frontier updated"
        );

        if c.can_get_on() {
            for journey in on_trip.iter() {
                self.stops
                    .entry(c.departure_stop)
                    .or_default()
                    .add(journey.clone(), comparator);
                self.walk_from(journey);
            }
        }
        self.trips.insert(c.trip, on_trip);
    }

    /// One-leg journeys ending at a destination: alighting there, or
    /// alighting nearby and walking in.
    fn final_legs(&self, id: ConnectionId, c: &Connection) -> Vec<Journey<T>> {
        let arrives = c.arrival_time();
        let mut legs = Vec::new();
        if let Some(&egress) = self.destinations.get(&c.arrival_stop) {
            let end = arrives.saturating_add(egress);
            if end <= self.last_arrival {
                legs.push(
                    Journey::genesis_backward(c.arrival_stop, end, T::zero())
                        .chain_connection(id, c),
                );
            }
        }
        for &(destination, secs) in self.walk_ins.get(&c.arrival_stop).into_iter().flatten() {
            let egress = self.destinations.get(&destination).copied().unwrap_or(0);
            let walked = arrives.saturating_add(u64::from(secs));
            let end = walked.saturating_add(egress);
            if end > self.last_arrival {
                continue;
            }
            legs.push(
                Journey::genesis_backward(destination, end, T::zero())
                    .chain_special(LegKind::Walk, c.arrival_stop, destination, arrives, walked)
                    .chain_connection(id, c),
            );
        }
        legs
    }

    /// Adds walks from `journey`'s stop to the frontiers of nearby stops.
    fn walk_from(&mut self, journey: &Journey<T>) {
        let (profile, snapshot) = (self.profile, self.snapshot);
        let Some(walks) = &profile.walks else {
            return;
        };
        let comparator = profile.comparator.as_ref();
        let stops = &snapshot.stops;
        for (neighbour, _) in reachable_stops(walks.as_ref(), stops, journey.location()) {
            let Some(walked) = create_transfer(walks.as_ref(), stops, journey, neighbour) else {
                continue;
            };
            if walked.time() < self.earliest_departure {
                continue;
            }
            self.stops
                .entry(neighbour)
                .or_default()
                .add(walked, comparator);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Mode;
    use crate::journey::{Leg, TransferMetric};
    use crate::testing::{Fixture, at, init_tracing, no_transfer_profile};

    fn single(stop: StopId) -> HashMap<StopId, u64> {
        HashMap::from([(stop, 0)])
    }

    fn connections(j: &Journey<TransferMetric>) -> Vec<ConnectionId> {
        j.legs().iter().filter_map(Leg::connection_id).collect()
    }

    #[test]
    fn single_connection_gives_one_journey() {
        init_tracing();
        let mut f = Fixture::new();
        let (a, b) = (f.stop("stop0"), f.stop("stop1"));
        let trip = f.trip("t");
        f.connection("c0", a, b, at(9, 30), 600, trip);
        let snapshot = f.build();
        let profile = no_transfer_profile();

        let result = ProfileScan::new(&snapshot, &profile, single(b), at(9, 0), at(11, 0))
            .run()
            .unwrap();
        let journeys = result.journeys_from(a, 0);
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].metric().transfers(), 0);
        assert_eq!(connections(&journeys[0]), vec![ConnectionId(0)]);
    }

    #[test]
    fn dominated_connection_is_dropped() {
        let mut f = Fixture::new();
        let (a, b) = (f.stop("stop0"), f.stop("stop1"));
        let (x, y) = (f.trip("x"), f.trip("y"));
        f.connection("fast", a, b, at(16, 0), 1_800, x);
        f.connection("slow", a, b, at(16, 0), 2_400, y);
        let snapshot = f.build();
        let profile = Profile::<TransferMetric>::default();

        let journeys = ProfileScan::new(&snapshot, &profile, single(b), at(16, 0), at(18, 0))
            .run()
            .unwrap()
            .journeys_from(a, 0);
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].arrival_time(), at(16, 30));
    }

    #[test]
    fn restricted_connection_is_never_used() {
        let mut f = Fixture::new();
        let (a, b) = (f.stop("stop0"), f.stop("stop1"));
        let trip = f.trip("t");
        f.connection_with_mode("c0", a, b, at(16, 0), 1_800, trip, Mode::CANT_GET_ON_OFF);
        let snapshot = f.build();
        let profile = Profile::<TransferMetric>::default();

        let result = ProfileScan::new(&snapshot, &profile, single(b), at(15, 0), at(18, 0))
            .run()
            .unwrap();
        assert!(result.journeys_from(a, 0).is_empty());
        assert_eq!(result.reached(), 0);
    }

    #[test]
    fn trip_frontier_keeps_seated_journeys() {
        // X runs A 10:00 -> B 10:10 -> C 10:30, Y runs B 10:12 -> C 10:25.
        // At B, Y beats the rest of X, but staying on X avoids a change.
        let mut f = Fixture::new();
        let (a, b, c) = (f.stop("A"), f.stop("B"), f.stop("C"));
        let (x, y) = (f.trip("X"), f.trip("Y"));
        f.connection("x0", a, b, at(10, 0), 600, x);
        f.connection("x1", b, c, at(10, 10), 1_200, x);
        f.connection("y0", b, c, at(10, 12), 780, y);
        let snapshot = f.build();
        let profile = no_transfer_profile();

        let result = ProfileScan::new(&snapshot, &profile, single(c), at(9, 0), at(11, 0))
            .run()
            .unwrap();
        // From B only the Y journey survives...
        assert_eq!(result.frontier(b).unwrap().len(), 1);

        // ...but from A both the seated and the changing journey do.
        let mut journeys = result.journeys_from(a, 0);
        journeys.sort_by_key(|j| j.arrival_time());
        assert_eq!(journeys.len(), 2);
        assert_eq!(journeys[0].arrival_time(), at(10, 25));
        assert_eq!(journeys[0].metric().vehicles, 2);
        assert_eq!(journeys[1].arrival_time(), at(10, 30));
        assert_eq!(journeys[1].metric().vehicles, 1);
        assert_eq!(connections(&journeys[1]), vec![ConnectionId(0), ConnectionId(1)]);
    }

    #[test]
    fn change_needs_transfer_time() {
        let mut f = Fixture::new();
        let (a, b, c) = (f.stop("a"), f.stop("b"), f.stop("c"));
        let (x, y, z) = (f.trip("x"), f.trip("y"), f.trip("z"));
        f.connection("x0", a, b, at(10, 0), 600, x);
        f.connection("y0", b, c, at(10, 11), 600, y);
        f.connection("z0", b, c, at(10, 15), 900, z);
        let snapshot = f.build();
        let profile = Profile::<TransferMetric>::default();

        let journeys = ProfileScan::new(&snapshot, &profile, single(c), at(9, 0), at(12, 0))
            .run()
            .unwrap()
            .journeys_from(a, 0);
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].arrival_time(), at(10, 30));
        assert_eq!(journeys[0].last_trip(), Some(z));
    }

    #[test]
    fn journeys_before_the_window_are_ignored() {
        let mut f = Fixture::new();
        let (a, b) = (f.stop("a"), f.stop("b"));
        let (x, y) = (f.trip("x"), f.trip("y"));
        f.connection("x0", a, b, at(8, 50), 600, x);
        f.connection("y0", a, b, at(9, 30), 600, y);
        let snapshot = f.build();
        let profile = Profile::<TransferMetric>::default();

        let result = ProfileScan::new(&snapshot, &profile, single(b), at(9, 0), at(11, 0))
            .run()
            .unwrap();
        let journeys = result.journeys_from(a, 0);
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].departure_time(), at(9, 30));
        // Access time pushes the only journey out of reach.
        assert!(result.journeys_from(a, 31 * 60).is_empty());
    }

    #[test]
    fn vetoed_connections_never_appear() {
        struct Veto(ConnectionId);
        impl ConnectionFilter for Veto {
            fn can_be_taken(&self, id: ConnectionId, _: &Connection) -> bool {
                id != self.0
            }
            fn check_window(&self, _: Time, _: Time) -> Result<(), PlanError> {
                Ok(())
            }
        }

        let mut f = Fixture::new();
        let (a, b) = (f.stop("a"), f.stop("b"));
        let (x, y) = (f.trip("x"), f.trip("y"));
        let fast = f.connection("fast", a, b, at(10, 0), 600, x);
        f.connection("slow", a, b, at(10, 0), 1_200, y);
        let snapshot = f.build();
        let profile = Profile::<TransferMetric>::default();
        let veto = Veto(fast);

        let journeys = ProfileScan::new(&snapshot, &profile, single(b), at(9, 0), at(11, 0))
            .filter(&veto)
            .unwrap()
            .run()
            .unwrap()
            .journeys_from(a, 0);
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].arrival_time(), at(10, 20));
        assert!(!connections(&journeys[0]).contains(&fast));
    }

    #[test]
    fn trailing_walk_reaches_destination() {
        let mut f = Fixture::new();
        let a = f.stop_at("a", 4.3571, 50.8455);
        let b = f.stop_at("b", 4.3360, 50.8355);
        let c = f.stop_at("c", 4.3378, 50.8355);
        let x = f.trip("x");
        f.connection("x0", a, b, at(10, 0), 600, x);
        let snapshot = f.build();
        let profile = Profile::<TransferMetric>::default();

        let journeys = ProfileScan::new(&snapshot, &profile, single(c), at(9, 0), at(11, 0))
            .run()
            .unwrap()
            .journeys_from(a, 0);
        assert_eq!(journeys.len(), 1);
        let last = *journeys[0].legs().last().unwrap();
        assert_eq!(last.kind, LegKind::Walk);
        assert_eq!((last.from, last.to), (b, c));
        assert!(journeys[0].metric().walking_secs > 0);
    }

    #[test]
    fn no_data_is_an_error() {
        let mut f = Fixture::new();
        let (a, b) = (f.stop("a"), f.stop("b"));
        let trip = f.trip("t");
        f.connection("c0", a, b, at(12, 0), 600, trip);
        let snapshot = f.build();
        let profile = Profile::<TransferMetric>::default();

        assert!(matches!(
            ProfileScan::new(&snapshot, &profile, single(b), at(9, 0), at(11, 0)).run(),
            Err(PlanError::NoDataInRange { .. })
        ));
    }
}
