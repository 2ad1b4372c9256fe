//! Single-criterion connection scan shared by the earliest-arrival and
//! latest-departure scanners.
//!
//! A forward scan walks the departure axis towards later times and keeps,
//! per stop, the journey arriving there earliest. A backward scan walks the
//! arrival axis towards earlier times and keeps, per stop, the journey
//! leaving there latest that still reaches the seeds. Both advance one batch
//! of equally-timed connections per [`Scan::step`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::domain::{Connection, ConnectionId, StopId, Time, TripId};
use crate::journey::{Direction, Journey, LegKind, Metric};
use crate::store::{ConnectionCursor, TransitSnapshot};
use crate::transfers::{create_transfer, reachable_stops};

use super::filter::ConnectionFilter;
use super::profile::Profile;
use super::PlanError;

/// Where a scan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Seeds placed, nothing scanned yet.
    Initialized,
    /// Consuming batches; no target reached.
    Scanning,
    /// A target was reached; the bound has been narrowed to it.
    Converged,
    /// A target was reached and the caller widened the bound.
    Extended,
    /// Past the bound or out of connections.
    Done,
}

/// Best journey per reached stop, plus when each trip was first usable.
///
/// For a forward scan the journeys arrive as early as possible and trip times
/// are the earliest boarding times. For a backward scan the journeys leave as
/// late as possible and trip times are the latest alighting times.
#[derive(Debug, Clone)]
pub struct Isochrone<T> {
    direction: Direction,
    journeys: HashMap<StopId, Journey<T>>,
    trips: HashMap<TripId, Time>,
    window: (Time, Time),
}

impl<T> Isochrone<T> {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the best journey to (forward) or from (backward) `stop`.
    pub fn journey(&self, stop: StopId) -> Option<&Journey<T>> {
        self.journeys.get(&stop)
    }

    /// Returns the time at which `stop` is reached (forward) or must be
    /// left (backward).
    pub fn time_at(&self, stop: StopId) -> Option<Time> {
        self.journeys.get(&stop).map(Journey::time)
    }

    pub fn trip_time(&self, trip: TripId) -> Option<Time> {
        self.trips.get(&trip).copied()
    }

    /// Time window `(earliest, latest)` the scan covered.
    pub fn window(&self) -> (Time, Time) {
        self.window
    }

    pub fn iter(&self) -> impl Iterator<Item = (StopId, &Journey<T>)> {
        self.journeys.iter().map(|(stop, journey)| (*stop, journey))
    }

    pub fn len(&self) -> usize {
        self.journeys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journeys.is_empty()
    }

    pub(crate) fn trips(&self) -> &HashMap<TripId, Time> {
        &self.trips
    }
}

/// Outcome of a single-criterion scan.
#[derive(Debug, Clone)]
pub struct ScanResult<T> {
    /// Best journey to the target set, if one was reached.
    pub best: Option<Journey<T>>,
    pub isochrone: Isochrone<T>,
}

type BoundFn<'a> = Box<dyn Fn(Time) -> Time + 'a>;

pub(crate) struct Scan<'a, T> {
    snapshot: &'a TransitSnapshot,
    profile: &'a Profile<T>,
    filter: Option<&'a dyn ConnectionFilter>,
    cursor: ConnectionCursor<'a>,
    direction: Direction,
    state: ScanState,
    start: Time,
    bound: Time,
    /// Furthest time a journey may reach: the requested bound, or wider
    /// once `continue_until` widens it. Narrowing never moves it.
    limit: Time,
    seeds: Vec<Journey<T>>,
    /// Target stops and the extra seconds from (or to) each of them.
    targets: HashMap<StopId, u64>,
    continue_until: Option<BoundFn<'a>>,
    /// Walk on from stops that were themselves reached on foot.
    chain_walks: bool,
    stops: HashMap<StopId, Journey<T>>,
    trips: HashMap<TripId, Journey<T>>,
    trip_times: HashMap<TripId, Time>,
    best: Option<(Time, Journey<T>)>,
    /// The cursor stands on an unprocessed connection.
    has_current: bool,
}

impl<'a, T: Metric> Scan<'a, T> {
    /// Places the cursor on the first connection at or after (forward) or
    /// at or before (backward) `start`.
    pub(crate) fn new(
        snapshot: &'a TransitSnapshot,
        profile: &'a Profile<T>,
        direction: Direction,
        start: Time,
        bound: Time,
        seeds: Vec<Journey<T>>,
    ) -> Result<Self, PlanError> {
        let connections = &snapshot.connections;
        let mut cursor = match direction {
            Direction::Forward => connections.enumerate_from_departure(start),
            Direction::Backward => connections.enumerate_from_arrival(start),
        };
        let found = match direction {
            Direction::Forward => cursor.move_next(),
            Direction::Backward => cursor.move_previous(),
        };
        if !found {
            return Err(PlanError::NoDataInRange { start });
        }
        debug_assert!(seeds.iter().all(|s| s.direction() == direction));

        Ok(Self {
            snapshot,
            profile,
            filter: None,
            cursor,
            direction,
            state: ScanState::Initialized,
            start,
            bound,
            limit: bound,
            seeds,
            targets: HashMap::new(),
            continue_until: None,
            chain_walks: false,
            stops: HashMap::new(),
            trips: HashMap::new(),
            trip_times: HashMap::new(),
            best: None,
            has_current: true,
        })
    }

    pub(crate) fn set_targets(&mut self, targets: HashMap<StopId, u64>) {
        self.targets = targets;
    }

    pub(crate) fn set_filter(&mut self, filter: &'a dyn ConnectionFilter) -> Result<(), PlanError> {
        let (earliest, latest) = self.window();
        filter.check_window(earliest, latest)?;
        self.filter = Some(filter);
        Ok(())
    }

    pub(crate) fn set_continue_until(&mut self, until: BoundFn<'a>) {
        self.continue_until = Some(until);
    }

    pub(crate) fn set_chain_walks(&mut self, chain_walks: bool) {
        self.chain_walks = chain_walks;
    }

    pub(crate) fn state(&self) -> ScanState {
        self.state
    }

    fn window(&self) -> (Time, Time) {
        match self.direction {
            Direction::Forward => (self.start, self.bound),
            Direction::Backward => (self.bound, self.start),
        }
    }

    /// Advances by one batch. Returns false once the scan is done.
    pub(crate) fn step(&mut self) -> bool {
        match self.state {
            ScanState::Done => false,
            ScanState::Initialized => {
                self.place_seeds();
                self.state = ScanState::Scanning;
                self.update_best();
                true
            }
            ScanState::Scanning | ScanState::Converged | ScanState::Extended => {
                self.scan_batch();
                self.state != ScanState::Done
            }
        }
    }

    pub(crate) fn run(mut self) -> ScanResult<T> {
        debug!(
            direction = ?self.direction,
            start = self.start,
            bound = self.bound,
            seeds = self.seeds.len(),
            targets = self.targets.len(),
            "connection scan started"
        );
        while self.step() {}
        self.finish()
    }

    pub(crate) fn finish(self) -> ScanResult<T> {
        let (earliest, latest) = self.window();
        debug!(
            direction = ?self.direction,
            stops = self.stops.len(),
            trips = self.trip_times.len(),
            reached = self.best.is_some(),
            "connection scan finished"
        );
        ScanResult {
            best: self.best.map(|(_, journey)| journey),
            isochrone: Isochrone {
                direction: self.direction,
                journeys: self.stops,
                trips: self.trip_times,
                window: (earliest, latest),
            },
        }
    }

    fn place_seeds(&mut self) {
        let seeds = std::mem::take(&mut self.seeds);
        let mut placed = HashSet::new();
        for seed in &seeds {
            if self.offer(seed.clone()) {
                placed.insert(seed.location());
            }
        }
        self.seeds = seeds;
        self.expand_walks(placed);
    }

    /// Time on the scan's axis of the connection under the cursor.
    fn current_time(&self) -> Option<Time> {
        self.has_current
            .then(|| self.cursor.current_time())
            .flatten()
    }

    fn past_bound(&self, time: Time) -> bool {
        beyond(self.direction, time, self.bound)
    }

    fn advance(&mut self) {
        self.has_current = match self.direction {
            Direction::Forward => self.cursor.move_next(),
            Direction::Backward => self.cursor.move_previous(),
        };
    }

    fn scan_batch(&mut self) {
        let Some(time) = self.current_time() else {
            self.state = ScanState::Done;
            return;
        };
        if self.past_bound(time) {
            self.state = ScanState::Done;
            return;
        }

        let mut improved = HashSet::new();
        let mut scanned = 0usize;
        while self.current_time() == Some(time) {
            if let (Some(id), Some(connection)) = (self.cursor.current_id(), self.cursor.current())
            {
                if let Some(stop) = self.scan_connection(id, connection) {
                    improved.insert(stop);
                }
                scanned += 1;
            }
            self.advance();
        }
        trace!(time, scanned, improved = improved.len(), "scanned batch");

        self.expand_walks(improved);
        self.update_best();
    }

    /// Scans one connection. Returns the stop it improved, if any.
    fn scan_connection(&mut self, id: ConnectionId, c: &Connection) -> Option<StopId> {
        if self.filter.is_some_and(|f| !f.can_be_taken(id, c)) {
            return None;
        }

        let candidate = self
            .stay_seated(id, c)
            .or_else(|| self.enter_vehicle(id, c))?;
        self.trips.insert(c.trip, candidate.clone());

        let may_leave = match self.direction {
            Direction::Forward => c.can_get_off(),
            Direction::Backward => c.can_get_on(),
        };
        if may_leave && self.offer(candidate.clone()) {
            Some(candidate.location())
        } else {
            None
        }
    }

    /// Extends the journey already riding `c`'s trip.
    fn stay_seated(&self, id: ConnectionId, c: &Connection) -> Option<Journey<T>> {
        let on_trip = self.trips.get(&c.trip)?;
        let fits = match self.direction {
            Direction::Forward => {
                on_trip.location() == c.departure_stop && on_trip.time() <= c.departure_time
            }
            Direction::Backward => {
                on_trip.location() == c.arrival_stop && on_trip.time() >= c.arrival_time()
            }
        };
        fits.then(|| on_trip.chain_connection(id, c))
    }

    /// Boards (forward) or alights from (backward) `c` from the best journey
    /// at its stop, through the internal transfer generator.
    fn enter_vehicle(&mut self, id: ConnectionId, c: &Connection) -> Option<Journey<T>> {
        let (allowed, stop) = match self.direction {
            Direction::Forward => (c.can_get_on(), c.departure_stop),
            Direction::Backward => (c.can_get_off(), c.arrival_stop),
        };
        if !allowed {
            return None;
        }
        let here = self.stops.get(&stop)?;
        let ready = create_transfer(
            self.profile.internal_transfers.as_ref(),
            &self.snapshot.stops,
            here,
            stop,
        )?;
        let (in_time, trip_time) = match self.direction {
            Direction::Forward => (ready.time() <= c.departure_time, c.departure_time),
            Direction::Backward => (ready.time() >= c.arrival_time(), c.arrival_time()),
        };
        if !in_time {
            return None;
        }
        self.trip_times.entry(c.trip).or_insert(trip_time);
        Some(ready.chain_connection(id, c))
    }

    /// Keeps `candidate` if it stays within the limit and strictly improves
    /// its stop.
    fn offer(&mut self, candidate: Journey<T>) -> bool {
        if beyond(self.direction, candidate.time(), self.limit) {
            return false;
        }
        let better = match self.stops.get(&candidate.location()) {
            None => true,
            Some(known) => match self.direction {
                Direction::Forward => candidate.time() < known.time(),
                Direction::Backward => candidate.time() > known.time(),
            },
        };
        if better {
            self.stops.insert(candidate.location(), candidate);
        }
        better
    }

    /// Walks from every improved stop to its neighbours. Journeys that
    /// arrived on foot only walk again when walks are chained.
    fn expand_walks(&mut self, improved: HashSet<StopId>) {
        let Some(walks) = self.profile.walks.clone() else {
            return;
        };
        let mut pending: Vec<StopId> = improved.into_iter().collect();
        while let Some(stop) = pending.pop() {
            let Some(journey) = self.stops.get(&stop).cloned() else {
                continue;
            };
            let on_foot = journey.last_leg().is_some_and(|leg| leg.kind == LegKind::Walk);
            if on_foot && !self.chain_walks {
                continue;
            }
            for (neighbour, _) in reachable_stops(walks.as_ref(), &self.snapshot.stops, stop) {
                let Some(walked) =
                    create_transfer(walks.as_ref(), &self.snapshot.stops, &journey, neighbour)
                else {
                    continue;
                };
                if self.offer(walked) && self.chain_walks {
                    pending.push(neighbour);
                }
            }
        }
    }

    /// Re-evaluates the best target and narrows (or widens) the bound.
    fn update_best(&mut self) {
        let (direction, limit) = (self.direction, self.limit);
        let reached = self.targets.iter().filter_map(|(stop, extra)| {
            let journey = self.stops.get(stop)?;
            let score = match direction {
                Direction::Forward => journey.time().saturating_add(*extra),
                Direction::Backward => journey.time().checked_sub(*extra)?,
            };
            (!beyond(direction, score, limit)).then_some((score, journey))
        });
        let best = match self.direction {
            Direction::Forward => reached.min_by_key(|(score, _)| *score),
            Direction::Backward => reached.max_by_key(|(score, _)| *score),
        };
        let Some((score, journey)) = best else {
            return;
        };

        let unchanged = self
            .best
            .as_ref()
            .is_some_and(|(known, _)| *known == score);
        if unchanged {
            return;
        }
        self.best = Some((score, journey.clone()));

        match &self.continue_until {
            Some(until) => {
                self.bound = until(score);
                if beyond(self.direction, self.bound, self.limit) {
                    self.limit = self.bound;
                }
                self.state = ScanState::Extended;
            }
            None => {
                self.bound = match self.direction {
                    Direction::Forward => self.bound.min(score),
                    Direction::Backward => self.bound.max(score),
                };
                self.state = ScanState::Converged;
            }
        }
        trace!(score, bound = self.bound, state = ?self.state, "target reached");
    }
}

/// Whether `time` lies past `bound` in the scan direction.
fn beyond(direction: Direction, time: Time, bound: Time) -> bool {
    match direction {
        Direction::Forward => time > bound,
        Direction::Backward => time < bound,
    }
}
