//! Journey metrics and the comparators that rank them.

use std::cmp::Ordering;
use std::fmt;

use super::{Direction, Journey, Leg, LegKind};

/// Quantity accumulated along a journey.
///
/// `add` receives the journey being extended and the new leg, and returns
/// the metric of the extended journey.
pub trait Metric: Clone + fmt::Debug + Sized {
    /// Metric of a fresh genesis node.
    fn zero() -> Self;

    fn add(&self, previous: &Journey<Self>, leg: &Leg) -> Self;
}

/// Vehicles used, time spent walking and total travel time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransferMetric {
    /// Number of distinct vehicles boarded.
    pub vehicles: u32,
    /// Seconds spent on walk legs.
    pub walking_secs: u64,
    /// Seconds between the root and the current node.
    pub travel_secs: u64,
}

impl TransferMetric {
    /// Number of changes between vehicles.
    pub fn transfers(&self) -> u32 {
        self.vehicles.saturating_sub(1)
    }
}

impl Metric for TransferMetric {
    fn zero() -> Self {
        Self::default()
    }

    fn add(&self, previous: &Journey<Self>, leg: &Leg) -> Self {
        let mut next = *self;
        match leg.kind {
            LegKind::Connection { trip, .. } => {
                if previous.last_trip() != Some(trip) {
                    next.vehicles += 1;
                }
            }
            LegKind::Walk => next.walking_secs += leg.duration(),
            LegKind::Transfer | LegKind::Genesis => {}
        }
        let reached = match previous.direction() {
            Direction::Forward => leg.arrival,
            Direction::Backward => leg.departure,
        };
        next.travel_secs = reached.abs_diff(previous.root_time());
        next
    }
}

/// Outcome of comparing journey `a` against journey `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    /// `a` is at least as good everywhere and better somewhere.
    Dominates,
    /// `b` dominates `a`.
    Dominated,
    /// Equally good on every criterion.
    Equal,
    /// Each is better somewhere.
    Incomparable,
}

impl Dominance {
    /// Combines per-criterion orderings, where `Less` means `a` is better.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::cmp::Ordering;
    /// use transit_planner::journey::Dominance;
    ///
    /// let d = Dominance::from_criteria([Ordering::Less, Ordering::Equal]);
    /// assert_eq!(d, Dominance::Dominates);
    /// let d = Dominance::from_criteria([Ordering::Less, Ordering::Greater]);
    /// assert_eq!(d, Dominance::Incomparable);
    /// ```
    pub fn from_criteria(criteria: impl IntoIterator<Item = Ordering>) -> Self {
        let (mut better, mut worse) = (false, false);
        for ordering in criteria {
            match ordering {
                Ordering::Less => better = true,
                Ordering::Greater => worse = true,
                Ordering::Equal => {}
            }
        }
        match (better, worse) {
            (true, true) => Dominance::Incomparable,
            (true, false) => Dominance::Dominates,
            (false, true) => Dominance::Dominated,
            (false, false) => Dominance::Equal,
        }
    }

    /// The same comparison seen from `b`.
    pub fn flip(self) -> Self {
        match self {
            Dominance::Dominates => Dominance::Dominated,
            Dominance::Dominated => Dominance::Dominates,
            other => other,
        }
    }
}

/// Partial order over journeys used by Pareto frontiers.
///
/// Implementations must be a strict partial order: irreflexive on
/// `Dominates`, and transitive.
pub trait MetricComparator<T>: Send + Sync {
    fn compare(&self, a: &Journey<T>, b: &Journey<T>) -> Dominance;
}

/// Later departure, earlier arrival, fewer vehicles.
///
/// Used by profile scans, where every Pareto-optimal trade-off between
/// leaving late, arriving early and changing rarely is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileComparator;

impl MetricComparator<TransferMetric> for ProfileComparator {
    fn compare(&self, a: &Journey<TransferMetric>, b: &Journey<TransferMetric>) -> Dominance {
        Dominance::from_criteria([
            b.departure_time().cmp(&a.departure_time()),
            a.arrival_time().cmp(&b.arrival_time()),
            a.metric().vehicles.cmp(&b.metric().vehicles),
        ])
    }
}

/// Shorter travel time, fewer vehicles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TravelTimeComparator;

impl MetricComparator<TransferMetric> for TravelTimeComparator {
    fn compare(&self, a: &Journey<TransferMetric>, b: &Journey<TransferMetric>) -> Dominance {
        Dominance::from_criteria([
            a.metric().travel_secs.cmp(&b.metric().travel_secs),
            a.metric().vehicles.cmp(&b.metric().vehicles),
        ])
    }
}
