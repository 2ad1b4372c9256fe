//! Earliest-arrival scan.

use std::collections::HashMap;

use crate::domain::{StopId, Time};
use crate::journey::{Direction, Journey, Metric};
use crate::store::TransitSnapshot;

use super::PlanError;
use super::filter::ConnectionFilter;
use super::profile::Profile;
use super::scan::{Scan, ScanResult, ScanState};

/// Forward scan from a set of departure stops towards later times.
///
/// Each step consumes every connection departing at one instant. The scan
/// stops once connections depart after `bound`; reaching a target narrows
/// `bound` to the target's arrival time, so the first target found ends the
/// scan as soon as no earlier arrival is possible.
pub struct EarliestArrivalScan<'a, T> {
    scan: Scan<'a, T>,
}

impl<'a, T: Metric> EarliestArrivalScan<'a, T> {
    /// Seeds a scan with genesis journeys at `departures`, each entered
    /// `offset` seconds after `start`.
    ///
    /// # Errors
    ///
    /// [`PlanError::NoDataInRange`] if no connection departs at or after `start`.
    pub fn new(
        snapshot: &'a TransitSnapshot,
        profile: &'a Profile<T>,
        departures: &HashMap<StopId, u64>,
        start: Time,
        bound: Time,
    ) -> Result<Self, PlanError> {
        let seeds = departures
            .iter()
            .map(|(&stop, &offset)| Journey::genesis(stop, start.saturating_add(offset), T::zero()))
            .collect();
        Self::with_seeds(snapshot, profile, seeds, start, bound)
    }

    /// Seeds a scan with caller-built forward journeys.
    pub fn with_seeds(
        snapshot: &'a TransitSnapshot,
        profile: &'a Profile<T>,
        seeds: Vec<Journey<T>>,
        start: Time,
        bound: Time,
    ) -> Result<Self, PlanError> {
        let scan = Scan::new(snapshot, profile, Direction::Forward, start, bound, seeds)?;
        Ok(Self { scan })
    }

    /// Stops to reach, with the seconds still needed after arriving at each.
    pub fn targets(mut self, targets: HashMap<StopId, u64>) -> Self {
        self.scan.set_targets(targets);
        self
    }

    /// Vetoes connections through `filter`.
    ///
    /// # Errors
    ///
    /// Whatever `filter.check_window` reports for this scan's window.
    pub fn filter(mut self, filter: &'a dyn ConnectionFilter) -> Result<Self, PlanError> {
        self.scan.set_filter(filter)?;
        Ok(self)
    }

    /// Replaces bound narrowing: once a target is reached at time `t`, the
    /// scan continues until `until(t)`.
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

    /// Consumes one batch. Returns false once the scan is done.
    pub fn step(&mut self) -> bool {
        self.scan.step()
    }

    /// Runs to completion. `best` arrives at a target earliest.
    pub fn run(self) -> ScanResult<T> {
        self.scan.run()
    }

    /// Stops early and returns what has been found so far.
    pub fn finish(self) -> ScanResult<T> {
        self.scan.finish()
    }
}
