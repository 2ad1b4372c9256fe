//! Transfers and walks between stops.
//!
//! A transfer generator answers how long it takes to get from one stop to
//! another without a vehicle. The planner uses two of them: one for
//! changing vehicles at the same stop, one for walking to nearby stops.

use geo::HaversineDistance;

use crate::domain::{Stop, StopId};
use crate::journey::{Direction, Journey, LegKind, Metric};
use crate::store::StopsIndex;

/// Source of transfer and walk durations.
pub trait TransferGenerator: Send + Sync {
    /// Seconds needed to get from `from` to `to`, or `None` if this
    /// generator cannot connect them.
    fn time_between(&self, from: &Stop, to: &Stop) -> Option<u32>;

    /// Largest distance in metres this generator bridges.
    fn range(&self) -> f64;

    /// Kind of leg produced.
    fn leg_kind(&self) -> LegKind;
}

/// Fixed minimum change time at the same stop.
#[derive(Debug, Clone, Copy)]
pub struct InternalTransferGenerator {
    pub min_transfer_secs: u32,
}

impl InternalTransferGenerator {
    pub fn new(min_transfer_secs: u32) -> Self {
        Self { min_transfer_secs }
    }
}

impl TransferGenerator for InternalTransferGenerator {
    fn time_between(&self, from: &Stop, to: &Stop) -> Option<u32> {
        (from.global_id == to.global_id).then_some(self.min_transfer_secs)
    }

    fn range(&self) -> f64 {
        0.0
    }

    fn leg_kind(&self) -> LegKind {
        LegKind::Transfer
    }
}

/// Straight-line walking at constant speed, up to a maximum distance.
///
/// Symmetric: the walk from A to B takes as long as the walk from B to A.
#[derive(Debug, Clone, Copy)]
pub struct CrowsFlightTransferGenerator {
    /// Metres.
    pub max_distance: f64,
    /// Metres per second.
    pub speed: f64,
}

impl CrowsFlightTransferGenerator {
    pub fn new(max_distance: f64, speed: f64) -> Self {
        Self {
            max_distance,
            speed,
        }
    }
}

impl TransferGenerator for CrowsFlightTransferGenerator {
    fn time_between(&self, from: &Stop, to: &Stop) -> Option<u32> {
        if self.speed <= 0.0 {
            return None;
        }
        let distance = from.point().haversine_distance(&to.point());
        if distance > self.max_distance {
            return None;
        }
        Some((distance / self.speed).ceil() as u32)
    }

    fn range(&self) -> f64 {
        self.max_distance
    }

    fn leg_kind(&self) -> LegKind {
        LegKind::Walk
    }
}

/// Moves `journey` to `target` through `generator`, in the journey's direction.
///
/// A forward journey departs from its location at its current time and
/// lands on `target`; a backward journey arrives at its location at its
/// current time and so must have left `target` earlier.
///
/// Staying at the same stop only costs a transfer after riding a vehicle:
/// at the start of a journey or after a walk the journey is returned
/// unchanged, as it is when the transfer takes no time.
///
/// Returns `None` if either stop is unknown or the generator cannot connect them.
pub fn create_transfer<T: Metric>(
    generator: &dyn TransferGenerator,
    stops: &dyn StopsIndex,
    journey: &Journey<T>,
    target: StopId,
) -> Option<Journey<T>> {
    let here = journey.location();
    if here == target && !journey.ends_with_connection() {
        return Some(journey.clone());
    }

    let (from, to) = match journey.direction() {
        Direction::Forward => (here, target),
        Direction::Backward => (target, here),
    };
    let secs = generator.time_between(stops.stop(from)?, stops.stop(to)?)?;
    if here == target && secs == 0 {
        return Some(journey.clone());
    }

    let secs = u64::from(secs);
    let (departure, arrival) = match journey.direction() {
        Direction::Forward => (journey.time(), journey.time().checked_add(secs)?),
        Direction::Backward => (journey.time().checked_sub(secs)?, journey.time()),
    };
    Some(journey.chain_special(generator.leg_kind(), from, to, departure, arrival))
}

/// Stops reachable from `stop` through `generator`, with their durations.
///
/// `stop` itself is not included.
pub fn reachable_stops(
    generator: &dyn TransferGenerator,
    stops: &dyn StopsIndex,
    stop: StopId,
) -> Vec<(StopId, u32)> {
    let Some(origin) = stops.stop(stop) else {
        return Vec::new();
    };
    stops
        .stops_within(origin.point(), generator.range())
        .into_iter()
        .filter(|(id, _)| *id != stop)
        .filter_map(|(id, _)| {
            let other = stops.stop(id)?;
            generator.time_between(origin, other).map(|secs| (id, secs))
        })
        .collect()
}
