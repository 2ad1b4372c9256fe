//! Pareto frontier of mutually non-dominated journeys.

use super::{Dominance, Journey, Metric, MetricComparator};

/// A set of journeys no member of which dominates another.
///
/// # Invariants
///
/// For any two members `a` and `b`, `compare(a, b)` is neither
/// `Dominates` nor `Dominated` under the comparator used to fill it.
#[derive(Debug, Clone)]
pub struct ParetoFrontier<T> {
    journeys: Vec<Journey<T>>,
}

impl<T> Default for ParetoFrontier<T> {
    fn default() -> Self {
        Self {
            journeys: Vec::new(),
        }
    }
}

impl<T: Metric> ParetoFrontier<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers `candidate` to the frontier. Returns true if the frontier changed.
    ///
    /// - dominated by a member: rejected, nothing changes
    /// - equal to a member that stands on the same stop at the same time:
    ///   merged into that member, unless the member already holds every
    ///   history of the candidate
    /// - otherwise the candidate is added and the members it dominates are
    ///   dropped
    pub fn add(&mut self, candidate: Journey<T>, comparator: &dyn MetricComparator<T>) -> bool {
        let mut same_slot = None;
        for (i, member) in self.journeys.iter().enumerate() {
            match comparator.compare(member, &candidate) {
                Dominance::Dominates => return false,
                Dominance::Equal
                    if same_slot.is_none()
                        && member.location() == candidate.location()
                        && member.time() == candidate.time()
                        && member.direction() == candidate.direction()
                        && member.departure_time() == candidate.departure_time()
                        && member.arrival_time() == candidate.arrival_time() =>
                {
                    same_slot = Some(i);
                }
                _ => {}
            }
        }

        if let Some(i) = same_slot {
            if self.journeys[i].covers(&candidate) {
                return false;
            }
            let merged = Journey::merge(&self.journeys[i], &candidate);
            self.journeys[i] = merged;
            return true;
        }

        self.journeys
            .retain(|member| comparator.compare(&candidate, member) != Dominance::Dominates);
        self.journeys.push(candidate);
        true
    }

    pub fn journeys(&self) -> &[Journey<T>] {
        &self.journeys
    }

    pub fn iter(&self) -> impl Iterator<Item = &Journey<T>> {
        self.journeys.iter()
    }

    pub fn len(&self) -> usize {
        self.journeys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journeys.is_empty()
    }

    pub fn into_vec(self) -> Vec<Journey<T>> {
        self.journeys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Connection, ConnectionId, StopId, Time, TripId};
    use crate::journey::{
        LegKind, Metric, ProfileComparator, TransferMetric, TravelTimeComparator,
    };

    type J = Journey<TransferMetric>;

    fn direct(id: u32, dep: Time, arr: Time, trip: u32) -> J {
        let c = Connection::new(format!("c{id}"), StopId(0), StopId(1), dep, arr, TripId(trip))
            .unwrap();
        J::genesis(StopId(0), dep, TransferMetric::zero()).chain_connection(ConnectionId(id), &c)
    }

    #[test]
    fn dominated_candidate_is_rejected() {
        let mut frontier = ParetoFrontier::new();
        assert!(frontier.add(direct(0, 100, 200, 1), &ProfileComparator));
        assert!(!frontier.add(direct(1, 100, 300, 2), &ProfileComparator));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn dominating_candidate_evicts_members() {
        let mut frontier = ParetoFrontier::new();
        frontier.add(direct(0, 100, 300, 1), &ProfileComparator);
        frontier.add(direct(1, 200, 400, 2), &ProfileComparator);
        assert_eq!(frontier.len(), 2);

        assert!(frontier.add(direct(2, 200, 250, 3), &ProfileComparator));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.journeys()[0].time(), 250);
    }

    #[test]
    fn equal_journeys_are_merged_once() {
        let mut frontier = ParetoFrontier::new();
        let a = direct(0, 100, 200, 1);
        let b = direct(1, 100, 200, 2);
        assert!(frontier.add(a.clone(), &ProfileComparator));
        assert!(frontier.add(b.clone(), &ProfileComparator));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.journeys()[0].alternatives().len(), 2);

        // Re-offering either history changes nothing.
        assert!(!frontier.add(a, &ProfileComparator));
        assert!(!frontier.add(b, &ProfileComparator));
        assert_eq!(frontier.journeys()[0].alternatives().len(), 2);
    }

    #[test]
    fn equal_metric_different_timing_kept_apart() {
        let mut frontier = ParetoFrontier::new();
        // Same travel time and vehicle count, different departures.
        assert!(frontier.add(direct(0, 100, 200, 1), &TravelTimeComparator));
        assert!(frontier.add(direct(1, 300, 400, 2), &TravelTimeComparator));
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn incomparable_candidates_accumulate() {
        let mut frontier = ParetoFrontier::new();
        frontier.add(direct(0, 100, 200, 1), &ProfileComparator);
        let walk_then_ride = J::genesis(StopId(0), 150, TransferMetric::zero())
            .chain_special(LegKind::Walk, StopId(0), StopId(1), 150, 300);
        assert!(frontier.add(walk_then_ride, &ProfileComparator));
        assert_eq!(frontier.len(), 2);
    }
}
