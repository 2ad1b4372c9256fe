//! Latest-departure scan.

use std::collections::HashMap;

use crate::domain::{StopId, Time};
use crate::journey::{Direction, Journey, Metric};
use crate::store::TransitSnapshot;

use super::PlanError;
use super::filter::ConnectionFilter;
use super::profile::Profile;
use super::scan::{Scan, ScanResult, ScanState};

/// Backward scan from a set of arrival stops towards earlier times.
///
/// The mirror image of [`EarliestArrivalScan`](super::EarliestArrivalScan):
/// connections are consumed by descending arrival time and every reached
/// stop keeps the journey that leaves it latest. Journeys in the
/// isochrone grow backward; [`run`](Self::run) returns the best one
/// reversed into travel order.
pub struct LatestDepartureScan<'a, T> {
    scan: Scan<'a, T>,
}

impl<'a, T: Metric> LatestDepartureScan<'a, T> {
    /// Seeds a scan with backward genesis journeys at `arrivals`, each
    /// reached `offset` seconds before `start`.
    ///
    /// # Errors
    ///
    /// [`PlanError::NoDataInRange`] if no connection arrives at or before `start`.
    pub fn new(
        snapshot: &'a TransitSnapshot,
        profile: &'a Profile<T>,
        arrivals: &HashMap<StopId, u64>,
        start: Time,
        bound: Time,
    ) -> Result<Self, PlanError> {
        let seeds = arrivals
            .iter()
            .map(|(&stop, &offset)| {
                Journey::genesis_backward(stop, start.saturating_sub(offset), T::zero())
            })
            .collect();
        Self::with_seeds(snapshot, profile, seeds, start, bound)
    }

    /// Seeds a scan with caller-built backward journeys.
    pub fn with_seeds(
        snapshot: &'a TransitSnapshot,
        profile: &'a Profile<T>,
        seeds: Vec<Journey<T>>,
        start: Time,
        bound: Time,
    ) -> Result<Self, PlanError> {
        let scan = Scan::new(snapshot, profile, Direction::Backward, start, bound, seeds)?;
        Ok(Self { scan })
    }

    /// Stops to leave from, with the seconds needed to reach each of them.
    pub fn targets(mut self, targets: HashMap<StopId, u64>) -> Self {
        self.scan.set_targets(targets);
        self
    }

    pub fn filter(mut self, filter: &'a dyn ConnectionFilter) -> Result<Self, PlanError> {
        self.scan.set_filter(filter)?;
        Ok(self)
    }

    /// Once a target is left at time `t`, keep scanning down to `until(t)`.
    pub fn continue_until(mut self, until: impl Fn(Time) -> Time + 'a) -> Self {
        self.scan.set_continue_until(Box::new(until));
        self
    }

    /// Lets journeys walk on from stops they reached on foot.
    pub fn chain_walks(mut self) -> Self {
        self.scan.set_chain_walks(true);
        self
    }

    pub fn state(&self) -> ScanState {
        self.scan.state()
    }

    pub fn step(&mut self) -> bool {
        self.scan.step()
    }

    /// Runs to completion. `best` is in travel order and leaves a target latest.
    pub fn run(self) -> ScanResult<T> {
        Self::forward_best(self.scan.run())
    }

    pub fn finish(self) -> ScanResult<T> {
        Self::forward_best(self.scan.finish())
    }

    fn forward_best(mut result: ScanResult<T>) -> ScanResult<T> {
        result.best = result.best.and_then(|j| j.reverse().into_iter().next());
        result
    }
}
