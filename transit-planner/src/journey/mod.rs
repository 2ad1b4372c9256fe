//! Journeys as shared, immutable chains of legs.
//!
//! A `Journey` is a handle to the newest node of a chain. Every node points
//! at the node it extends, so journeys that share a prefix share its memory,
//! and extending a journey never touches the original. Chains grow either
//! forward in time (from an origin towards later arrivals) or backward in
//! time (from a destination towards earlier departures).
//!
//! Two journeys that land on the same stop at the same time with an equal
//! metric can be merged into one node carrying both histories, which turns
//! the chain into a DAG. [`Journey::alternatives`] enumerates every path
//! through it.

mod metric;
mod pareto;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::{Connection, ConnectionId, StopId, Time, TripId};

pub use metric::{
    Dominance, Metric, MetricComparator, ProfileComparator, TransferMetric, TravelTimeComparator,
};
pub use pareto::ParetoFrontier;

/// Which way a journey grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Built from the origin; each leg lands on its arrival stop.
    Forward,
    /// Built from the destination; each leg lands on its departure stop.
    Backward,
}

/// What a leg represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegKind {
    /// The starting point of a chain.
    Genesis,
    /// Changing vehicles at the same stop.
    Transfer,
    /// Walking between two stops.
    Walk,
    /// Riding a vehicle.
    Connection { id: ConnectionId, trip: TripId },
}

/// One step of a journey, always expressed in travel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Leg {
    pub kind: LegKind,
    pub from: StopId,
    pub to: StopId,
    pub departure: Time,
    pub arrival: Time,
}

impl Leg {
    /// Creates the leg for riding `connection`.
    pub fn connection(id: ConnectionId, connection: &Connection) -> Self {
        Self {
            kind: LegKind::Connection {
                id,
                trip: connection.trip,
            },
            from: connection.departure_stop,
            to: connection.arrival_stop,
            departure: connection.departure_time,
            arrival: connection.arrival_time(),
        }
    }

    fn genesis(location: StopId, time: Time) -> Self {
        Self {
            kind: LegKind::Genesis,
            from: location,
            to: location,
            departure: time,
            arrival: time,
        }
    }

    /// Returns the trip ridden on this leg, if it is a connection.
    pub fn trip(&self) -> Option<TripId> {
        match self.kind {
            LegKind::Connection { trip, .. } => Some(trip),
            _ => None,
        }
    }

    /// Returns the connection ridden on this leg, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self.kind {
            LegKind::Connection { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self.kind, LegKind::Connection { .. })
    }

    /// Seconds spent on this leg.
    pub fn duration(&self) -> Time {
        self.arrival.saturating_sub(self.departure)
    }
}

enum Step<T> {
    Genesis,
    Leg {
        previous: Journey<T>,
        leg: Leg,
    },
    Merged {
        primary: Journey<T>,
        alternative: Journey<T>,
    },
}

struct Node<T> {
    step: Step<T>,
    /// Stop the chain currently stands on.
    location: StopId,
    /// Time at `location`.
    time: Time,
    direction: Direction,
    metric: T,
    /// `None` on genesis nodes.
    root: Option<Journey<T>>,
}

/// Handle to an immutable journey node.
///
/// # Invariants
///
/// - Every chain starts with exactly one genesis node
/// - Forward chains never move back in time, backward chains never move forward
/// - Merged nodes join journeys with equal location, time and direction
pub struct Journey<T>(Arc<Node<T>>);

impl<T> Clone for Journey<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Journey<T> {
    /// Returns the stop the journey currently stands on.
    ///
    /// That is the arrival stop of a forward journey and the departure stop
    /// of a backward one.
    pub fn location(&self) -> StopId {
        self.0.location
    }

    /// Returns the time at [`location`](Self::location).
    pub fn time(&self) -> Time {
        self.0.time
    }

    pub fn direction(&self) -> Direction {
        self.0.direction
    }

    pub fn metric(&self) -> &T {
        &self.0.metric
    }

    /// Returns true for a genesis node.
    pub fn is_root(&self) -> bool {
        matches!(self.0.step, Step::Genesis)
    }

    /// Returns the genesis node this journey was built from.
    ///
    /// For a merged journey this is the root of its primary history.
    pub fn root(&self) -> Journey<T> {
        match &self.0.root {
            Some(root) => root.clone(),
            None => self.clone(),
        }
    }

    /// Returns the time of the root node.
    pub fn root_time(&self) -> Time {
        self.0.root.as_ref().map_or(self.0.time, |root| root.0.time)
    }

    /// Departure time at the origin end of the journey.
    pub fn departure_time(&self) -> Time {
        match self.0.direction {
            Direction::Forward => self.root_time(),
            Direction::Backward => self.time(),
        }
    }

    /// Arrival time at the destination end of the journey.
    pub fn arrival_time(&self) -> Time {
        match self.0.direction {
            Direction::Forward => self.time(),
            Direction::Backward => self.root_time(),
        }
    }

    /// Returns the most recently chained leg of the primary history.
    pub fn last_leg(&self) -> Option<&Leg> {
        let mut node: &Node<T> = &self.0;
        loop {
            match &node.step {
                Step::Genesis => return None,
                Step::Leg { leg, .. } => return Some(leg),
                Step::Merged { primary, .. } => node = &primary.0,
            }
        }
    }

    /// Returns the trip of the most recently chained connection, skipping
    /// transfers and walks.
    pub fn last_trip(&self) -> Option<TripId> {
        let mut node: &Node<T> = &self.0;
        loop {
            match &node.step {
                Step::Genesis => return None,
                Step::Leg { previous, leg } => match leg.kind {
                    LegKind::Connection { trip, .. } => return Some(trip),
                    _ => node = &previous.0,
                },
                Step::Merged { primary, .. } => node = &primary.0,
            }
        }
    }

    /// Returns true if the most recently chained leg is a connection.
    pub fn ends_with_connection(&self) -> bool {
        self.last_leg().is_some_and(Leg::is_connection)
    }

    /// Returns the legs of the primary history in travel order, including
    /// the genesis leg.
    pub fn legs(&self) -> Vec<Leg> {
        let mut legs = Vec::new();
        let mut node: &Node<T> = &self.0;
        loop {
            match &node.step {
                Step::Genesis => {
                    legs.push(Leg::genesis(node.location, node.time));
                    break;
                }
                Step::Leg { previous, leg } => {
                    legs.push(*leg);
                    node = &previous.0;
                }
                Step::Merged { primary, .. } => node = &primary.0,
            }
        }
        if self.0.direction == Direction::Forward {
            legs.reverse();
        }
        legs
    }

    /// Returns every history merged into this journey, each in travel order.
    ///
    /// The first entry is the primary history, i.e. equal to [`legs`](Self::legs).
    pub fn alternatives(&self) -> Vec<Vec<Leg>> {
        let mut paths = self.chain_paths();
        if self.0.direction == Direction::Backward {
            for path in &mut paths {
                path.reverse();
            }
        }
        paths
    }

    /// Paths in chaining order, genesis first.
    fn chain_paths(&self) -> Vec<Vec<Leg>> {
        match &self.0.step {
            Step::Genesis => vec![vec![Leg::genesis(self.0.location, self.0.time)]],
            Step::Leg { previous, leg } => {
                let mut paths = previous.chain_paths();
                for path in &mut paths {
                    path.push(*leg);
                }
                paths
            }
            Step::Merged {
                primary,
                alternative,
            } => {
                let mut paths = primary.chain_paths();
                paths.extend(alternative.chain_paths());
                paths
            }
        }
    }

    /// Number of vehicles used on the primary history.
    pub fn vehicle_count(&self) -> usize {
        let mut count = 0;
        let mut current = None;
        for trip in self.legs().iter().filter_map(Leg::trip) {
            if current != Some(trip) {
                count += 1;
                current = Some(trip);
            }
        }
        count
    }

    /// Returns true if every history of `other` is also a history of `self`.
    ///
    /// Works on the shared node graph, so the cost grows with the number of
    /// nodes rather than the number of histories.
    pub fn covers(&self, other: &Journey<T>) -> bool {
        self.0.direction == other.0.direction && covered_by(&[self], other, &mut HashMap::new())
    }

    fn node_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// The distinct last steps behind merged nodes: each leg with the
    /// journey it extends, or the genesis leg with no predecessor.
    fn heads(&self) -> Vec<(Leg, Option<&Journey<T>>)> {
        let mut heads = Vec::new();
        let mut pending = vec![self];
        while let Some(journey) = pending.pop() {
            match &journey.0.step {
                Step::Genesis => {
                    heads.push((Leg::genesis(journey.0.location, journey.0.time), None));
                }
                Step::Leg { previous, leg } => heads.push((*leg, Some(previous))),
                Step::Merged {
                    primary,
                    alternative,
                } => {
                    pending.push(alternative);
                    pending.push(primary);
                }
            }
        }
        heads
    }
}

type CoverMemo = HashMap<(Vec<usize>, usize), bool>;

/// Whether every history of `other` is a history of one of `mine`.
///
/// Histories are matched from their last leg backwards; the prefixes that
/// share a last leg are checked together, memoised per node set.
fn covered_by<'a, T>(mine: &[&'a Journey<T>], other: &'a Journey<T>, memo: &mut CoverMemo) -> bool {
    if mine.iter().any(|j| Arc::ptr_eq(&j.0, &other.0)) {
        return true;
    }
    let mut nodes: Vec<usize> = mine.iter().map(|j| j.node_id()).collect();
    nodes.sort_unstable();
    nodes.dedup();
    let key = (nodes, other.node_id());
    if let Some(&known) = memo.get(&key) {
        return known;
    }

    let my_heads: Vec<(Leg, Option<&'a Journey<T>>)> =
        mine.iter().flat_map(|j| j.heads()).collect();
    let covered = other.heads().into_iter().all(|(leg, previous)| {
        let mut matching = my_heads.iter().filter(|(head, _)| *head == leg);
        match previous {
            None => matching.any(|(_, p)| p.is_none()),
            Some(previous) => {
                let prefixes: Vec<&'a Journey<T>> = matching.filter_map(|(_, p)| *p).collect();
                !prefixes.is_empty() && covered_by(&prefixes, previous, memo)
            }
        }
    });
    memo.insert(key, covered);
    covered
}

impl<T: Metric> Journey<T> {
    /// Starts a forward journey at `location` at `time`.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_planner::domain::{Connection, ConnectionId, StopId, TripId};
    /// use transit_planner::journey::{Journey, TransferMetric};
    ///
    /// let c = Connection::new("c0", StopId(0), StopId(1), 600, 1200, TripId(4)).unwrap();
    /// let start: Journey<TransferMetric> = Journey::genesis(StopId(0), 500, TransferMetric::default());
    /// let journey = start.chain_connection(ConnectionId(0), &c);
    ///
    /// assert_eq!(journey.location(), StopId(1));
    /// assert_eq!(journey.time(), 1200);
    /// assert_eq!(journey.legs().len(), 2);
    /// assert_eq!(journey.metric().vehicles, 1);
    /// ```
    pub fn genesis(location: StopId, time: Time, metric: T) -> Self {
        Self::root_node(location, time, metric, Direction::Forward)
    }

    /// Starts a backward journey that arrives at `location` at `time`.
    pub fn genesis_backward(location: StopId, time: Time, metric: T) -> Self {
        Self::root_node(location, time, metric, Direction::Backward)
    }

    fn root_node(location: StopId, time: Time, metric: T, direction: Direction) -> Self {
        Self(Arc::new(Node {
            step: Step::Genesis,
            location,
            time,
            direction,
            metric,
            root: None,
        }))
    }

    /// Extends the journey by riding `connection`.
    pub fn chain_connection(&self, id: ConnectionId, connection: &Connection) -> Self {
        self.chain(Leg::connection(id, connection))
    }

    /// Extends the journey by a transfer or walk leg.
    pub fn chain_special(
        &self,
        kind: LegKind,
        from: StopId,
        to: StopId,
        departure: Time,
        arrival: Time,
    ) -> Self {
        self.chain(Leg {
            kind,
            from,
            to,
            departure,
            arrival,
        })
    }

    /// Extends the journey by `leg`, in the journey's direction.
    pub fn chain(&self, leg: Leg) -> Self {
        let (location, time) = match self.0.direction {
            Direction::Forward => {
                debug_assert_eq!(leg.from, self.0.location, "forward leg must start here");
                debug_assert!(leg.departure >= self.0.time, "forward leg departs too early");
                (leg.to, leg.arrival)
            }
            Direction::Backward => {
                debug_assert_eq!(leg.to, self.0.location, "backward leg must end here");
                debug_assert!(leg.arrival <= self.0.time, "backward leg arrives too late");
                (leg.from, leg.departure)
            }
        };
        let metric = self.0.metric.add(self, &leg);
        Self(Arc::new(Node {
            step: Step::Leg {
                previous: self.clone(),
                leg,
            },
            location,
            time,
            direction: self.0.direction,
            metric,
            root: Some(self.root()),
        }))
    }

    /// Joins two equally good journeys into one node.
    ///
    /// Both must stand on the same stop at the same time and grow in the
    /// same direction. The merged node keeps the metric of `primary`.
    pub fn merge(primary: &Journey<T>, alternative: &Journey<T>) -> Self {
        assert_eq!(primary.location(), alternative.location(), "merging different stops");
        assert_eq!(primary.time(), alternative.time(), "merging different times");
        assert_eq!(primary.direction(), alternative.direction(), "merging directions");
        Self(Arc::new(Node {
            step: Step::Merged {
                primary: primary.clone(),
                alternative: alternative.clone(),
            },
            location: primary.0.location,
            time: primary.0.time,
            direction: primary.0.direction,
            metric: primary.0.metric.clone(),
            root: Some(primary.root()),
        }))
    }

    /// Rebuilds the journey in the opposite direction.
    ///
    /// Returns one journey per history: a merged journey with two
    /// alternatives reverses into two journeys. Metrics are recomputed from
    /// [`Metric::zero`]. A reversed forward journey starts at its last
    /// arrival; a reversed backward journey starts at its first departure.
    pub fn reverse(&self) -> Vec<Journey<T>> {
        self.alternatives()
            .into_iter()
            .map(|path| {
                let legs: Vec<Leg> = path
                    .into_iter()
                    .filter(|leg| leg.kind != LegKind::Genesis)
                    .collect();
                match self.0.direction {
                    Direction::Backward => {
                        let (origin, start) = legs
                            .first()
                            .map_or((self.location(), self.time()), |leg| (leg.from, leg.departure));
                        legs.iter()
                            .fold(Journey::genesis(origin, start, T::zero()), |j, leg| j.chain(*leg))
                    }
                    Direction::Forward => {
                        let (destination, end) = legs
                            .last()
                            .map_or((self.location(), self.time()), |leg| (leg.to, leg.arrival));
                        legs.iter().rev().fold(
                            Journey::genesis_backward(destination, end, T::zero()),
                            |j, leg| j.chain(*leg),
                        )
                    }
                }
            })
            .collect()
    }
}

impl<T> PartialEq for Journey<T> {
    /// Journeys are equal when they hold the same set of histories, leg for leg.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.covers(other) && other.covers(self))
    }
}

impl<T: fmt::Debug> fmt::Debug for Journey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journey")
            .field("direction", &self.0.direction)
            .field("location", &self.0.location)
            .field("time", &self.0.time)
            .field("metric", &self.0.metric)
            .field("legs", &self.legs())
            .finish()
    }
}
