//! Query front-end: request validation and the planner entry points.

use std::collections::HashMap;
use std::sync::Arc;

use geo::Point;
use tracing::debug;

use crate::domain::{Stop, StopId, Time};
use crate::journey::{Journey, Metric};
use crate::store::{StopsIndex, TransitSnapshot};

use super::PlanError;
use super::eas::EarliestArrivalScan;
use super::filter::{FilterChain, IsochroneFilter};
use super::las::LatestDepartureScan;
use super::pcs::ProfileScan;
use super::profile::Profile;
use super::scan::Isochrone;

/// A journey query over a time window.
///
/// Departure and arrival may be given as stop sets, as coordinates, or
/// both. Coordinates are resolved to every stop within walking range, and
/// the walk is added as access (or egress) time.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyRequest {
    pub from: Vec<StopId>,
    pub to: Vec<StopId>,
    pub earliest_departure: Time,
    pub last_arrival: Time,
    pub from_point: Option<Point>,
    pub to_point: Option<Point>,
}

impl JourneyRequest {
    pub fn new(
        from: impl Into<Vec<StopId>>,
        to: impl Into<Vec<StopId>>,
        earliest_departure: Time,
        last_arrival: Time,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            earliest_departure,
            last_arrival,
            from_point: None,
            to_point: None,
        }
    }

    /// Also departs from the stops around `point`.
    pub fn from_point(mut self, point: Point) -> Self {
        self.from_point = Some(point);
        self
    }

    /// Also arrives at the stops around `point`.
    pub fn to_point(mut self, point: Point) -> Self {
        self.to_point = Some(point);
        self
    }

    /// Checks the request for a journey query.
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidRequest`] for an empty departure or arrival set,
    /// a window that does not move forward in time, or a stop that is both
    /// departure and arrival.
    pub fn validate(&self) -> Result<(), PlanError> {
        self.check(true, true)
    }

    fn check(&self, need_from: bool, need_to: bool) -> Result<(), PlanError> {
        if need_from && self.from.is_empty() && self.from_point.is_none() {
            return Err(PlanError::InvalidRequest("empty departure set".into()));
        }
        if need_to && self.to.is_empty() && self.to_point.is_none() {
            return Err(PlanError::InvalidRequest("empty arrival set".into()));
        }
        if self.earliest_departure >= self.last_arrival {
            return Err(PlanError::InvalidRequest(format!(
                "departure {} is not before arrival bound {}",
                self.earliest_departure, self.last_arrival
            )));
        }
        if need_from && need_to {
            if let Some(stop) = self.from.iter().find(|s| self.to.contains(s)) {
                return Err(PlanError::InvalidRequest(format!(
                    "{stop} is both departure and arrival"
                )));
            }
        }
        Ok(())
    }
}

/// Runs queries against one snapshot with one profile.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use transit_planner::domain::{Connection, Stop, Trip};
/// use transit_planner::journey::TransferMetric;
/// use transit_planner::planner::{JourneyRequest, Planner, Profile};
/// use transit_planner::store::TransitDb;
///
/// let db = TransitDb::new();
/// let mut writer = db.writer().unwrap();
/// let a = writer.add_or_update_stop(Stop::new("a", 4.35, 50.84).unwrap());
/// let b = writer.add_or_update_stop(Stop::new("b", 4.70, 50.88).unwrap());
/// let trip = writer.add_or_update_trip(Trip::new("ic-1").unwrap());
/// writer
///     .add_or_update_connection(Connection::new("c0", a, b, 1_000, 1_600, trip).unwrap())
///     .unwrap();
/// let snapshot = writer.close();
///
/// let planner = Planner::new(snapshot, Profile::<TransferMetric>::default());
/// let request = JourneyRequest::new([a], [b], 900, 2_000);
/// let journey = planner.earliest_arrival(&request).unwrap().unwrap();
/// assert_eq!(journey.arrival_time(), 1_600);
/// ```
#[derive(Debug, Clone)]
pub struct Planner<T> {
    snapshot: Arc<TransitSnapshot>,
    profile: Profile<T>,
}

impl<T: Metric> Planner<T> {
    pub fn new(snapshot: Arc<TransitSnapshot>, profile: Profile<T>) -> Self {
        Self { snapshot, profile }
    }

    pub fn snapshot(&self) -> &Arc<TransitSnapshot> {
        &self.snapshot
    }

    pub fn profile(&self) -> &Profile<T> {
        &self.profile
    }

    /// The journey reaching the arrival set earliest, if any.
    pub fn earliest_arrival(&self, request: &JourneyRequest) -> Result<Option<Journey<T>>, PlanError> {
        request.validate()?;
        let (from, to) = (self.departures(request)?, self.arrivals(request)?);
        let result = EarliestArrivalScan::new(
            &self.snapshot,
            &self.profile,
            &from,
            request.earliest_departure,
            request.last_arrival,
        )?
        .targets(to)
        .run();
        Ok(result.best)
    }

    /// The journey leaving the departure set latest, if any.
    pub fn latest_departure(&self, request: &JourneyRequest) -> Result<Option<Journey<T>>, PlanError> {
        request.validate()?;
        let (from, to) = (self.departures(request)?, self.arrivals(request)?);
        let result = LatestDepartureScan::new(
            &self.snapshot,
            &self.profile,
            &to,
            request.last_arrival,
            request.earliest_departure,
        )?
        .targets(from)
        .run();
        Ok(result.best)
    }

    /// Every Pareto-optimal journey in the window, by departure then arrival.
    ///
    /// With isochrone pruning enabled, an earliest-arrival scan and a
    /// latest-departure scan over the whole window first bound the set of
    /// connections the profile scan may use.
    pub fn all_journeys(&self, request: &JourneyRequest) -> Result<Vec<Journey<T>>, PlanError> {
        request.validate()?;
        let (from, to) = (self.departures(request)?, self.arrivals(request)?);
        let (earliest, latest) = (request.earliest_departure, request.last_arrival);

        let pruning = if self.profile.prune_with_isochrones {
            // Instant changes and chained walks: the isochrones may only
            // ever be more optimistic than the profile scan.
            let relaxed = self.profile.relaxed();
            let forward = EarliestArrivalScan::new(&self.snapshot, &relaxed, &from, earliest, latest)?
                .targets(to.clone())
                .chain_walks()
                .continue_until(move |_| latest)
                .run();
            if forward.best.is_none() {
                debug!("destinations unreachable, skipping profile scan");
                return Ok(Vec::new());
            }
            let backward = LatestDepartureScan::new(&self.snapshot, &relaxed, &to, latest, earliest)?
                .targets(from.clone())
                .chain_walks()
                .continue_until(move |_| earliest)
                .run();
            Some(
                FilterChain::new()
                    .with(Arc::new(IsochroneFilter::new(&forward.isochrone)))
                    .with(Arc::new(IsochroneFilter::new(&backward.isochrone))),
            )
        } else {
            None
        };

        let mut scan = ProfileScan::new(&self.snapshot, &self.profile, to, earliest, latest);
        if let Some(filter) = &pruning {
            scan = scan.filter(filter)?;
        }
        let result = scan.run()?;

        let mut journeys: Vec<Journey<T>> = from
            .iter()
            .flat_map(|(&stop, &access)| result.journeys_from(stop, access))
            .collect();
        journeys = self.profile.apply_journey_filter(journeys);
        journeys.sort_by_key(|j| (j.departure_time(), j.arrival_time()));
        debug!(journeys = journeys.len(), "profile query complete");
        Ok(journeys)
    }

    /// Earliest arrival at every stop reachable from the departure set.
    pub fn isochrone_from(&self, request: &JourneyRequest) -> Result<Isochrone<T>, PlanError> {
        request.check(true, false)?;
        let from = self.departures(request)?;
        let result = EarliestArrivalScan::new(
            &self.snapshot,
            &self.profile,
            &from,
            request.earliest_departure,
            request.last_arrival,
        )?
        .run();
        Ok(result.isochrone)
    }

    /// Latest departure from every stop that still reaches the arrival set.
    pub fn isochrone_to(&self, request: &JourneyRequest) -> Result<Isochrone<T>, PlanError> {
        request.check(false, true)?;
        let to = self.arrivals(request)?;
        let result = LatestDepartureScan::new(
            &self.snapshot,
            &self.profile,
            &to,
            request.last_arrival,
            request.earliest_departure,
        )?
        .run();
        Ok(result.isochrone)
    }

    fn departures(&self, request: &JourneyRequest) -> Result<HashMap<StopId, u64>, PlanError> {
        self.resolve(&request.from, request.from_point, "departure")
    }

    fn arrivals(&self, request: &JourneyRequest) -> Result<HashMap<StopId, u64>, PlanError> {
        self.resolve(&request.to, request.to_point, "arrival")
    }

    /// Stops with the walking seconds between them and the requested point.
    fn resolve(
        &self,
        stops: &[StopId],
        point: Option<Point>,
        side: &str,
    ) -> Result<HashMap<StopId, u64>, PlanError> {
        let index = &self.snapshot.stops;
        let mut resolved = HashMap::new();
        for &stop in stops {
            if index.stop(stop).is_none() {
                return Err(PlanError::InvalidRequest(format!("unknown {side} stop {stop}")));
            }
            resolved.insert(stop, 0);
        }

        if let Some(point) = point {
            let walks = self.profile.walks.as_ref().ok_or_else(|| {
                PlanError::InvalidRequest(format!("{side} point given but walking is disabled"))
            })?;
            // Walking times are measured between stops, so the point
            // stands in as a stop of its own.
            let here = Stop::new(format!("{side}-point"), point.x(), point.y())
                .map_err(|e| PlanError::InvalidRequest(format!("{side} point: {e}")))?;
            let before = resolved.len();
            for (stop, _) in index.stops_within(point, walks.range()) {
                let Some(secs) = index.stop(stop).and_then(|s| walks.time_between(&here, s)) else {
                    continue;
                };
                let entry = resolved.entry(stop).or_insert(u64::from(secs));
                *entry = (*entry).min(u64::from(secs));
            }
            if resolved.len() == before && stops.is_empty() {
                return Err(PlanError::InvalidRequest(format!(
                    "no stop within walking range of the {side} point"
                )));
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionId, Mode};
    use crate::journey::{Leg, TransferMetric};
    use crate::planner::PlannerConfig;
    use crate::testing::{Fixture, at, init_tracing, no_transfer_profile};

    fn scenario_single() -> (Arc<TransitSnapshot>, StopId, StopId) {
        let mut f = Fixture::new();
        let (a, b) = (f.stop("stop0"), f.stop("stop1"));
        let trip = f.trip("t0");
        f.connection("c0", a, b, at(9, 30), 600, trip);
        (f.build_shared(), a, b)
    }

    #[test]
    fn single_connection_scenario() {
        init_tracing();
        let (snapshot, a, b) = scenario_single();
        let request = JourneyRequest::new([a], [b], at(9, 0), at(11, 0));

        let planner = Planner::new(Arc::clone(&snapshot), Profile::<TransferMetric>::default());
        let journey = planner.earliest_arrival(&request).unwrap().unwrap();
        let legs = journey.legs();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[1].connection_id(), Some(ConnectionId(0)));

        let planner = Planner::new(snapshot, no_transfer_profile());
        let journeys = planner.all_journeys(&request).unwrap();
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].metric().transfers(), 0);
    }

    #[test]
    fn dominated_connection_scenario() {
        let mut f = Fixture::new();
        let (a, b) = (f.stop("stop0"), f.stop("stop1"));
        let (x, y) = (f.trip("x"), f.trip("y"));
        f.connection("thirty", a, b, at(16, 0), 1_800, x);
        f.connection("forty", a, b, at(16, 0), 2_400, y);
        let planner = Planner::new(f.build_shared(), Profile::<TransferMetric>::default());

        let journeys = planner
            .all_journeys(&JourneyRequest::new([a], [b], at(16, 0), at(18, 0)))
            .unwrap();
        assert_eq!(journeys.len(), 1);
        assert_eq!(journeys[0].arrival_time() - journeys[0].departure_time(), 1_800);
    }

    #[test]
    fn restricted_connection_scenario() {
        let mut f = Fixture::new();
        let (a, b) = (f.stop("stop0"), f.stop("stop1"));
        let trip = f.trip("t");
        f.connection_with_mode("c0", a, b, at(16, 0), 1_800, trip, Mode::CANT_GET_ON_OFF);
        let snapshot = f.build_shared();
        let request = JourneyRequest::new([a], [b], at(15, 0), at(18, 0));

        for prune in [true, false] {
            let profile = Profile::<TransferMetric>::default().with_isochrone_pruning(prune);
            let planner = Planner::new(Arc::clone(&snapshot), profile);
            assert!(planner.earliest_arrival(&request).unwrap().is_none());
            assert!(planner.latest_departure(&request).unwrap().is_none());
            assert!(planner.all_journeys(&request).unwrap().is_empty());
        }
    }

    #[test]
    fn pruning_does_not_change_results() {
        let mut f = Fixture::new();
        let (a, b, c, d) = (f.stop("a"), f.stop("b"), f.stop("c"), f.stop("d"));
        let (x, y, z, w) = (f.trip("x"), f.trip("y"), f.trip("z"), f.trip("w"));
        f.connection("x0", a, b, at(10, 0), 600, x);
        f.connection("x1", b, c, at(10, 10), 1_200, x);
        f.connection("y0", b, c, at(10, 15), 600, y);
        f.connection("z0", a, c, at(9, 0), 3_600, z);
        // Unrelated traffic the isochrones rule out.
        f.connection("w0", d, b, at(9, 30), 600, w);
        f.connection("w1", c, d, at(10, 40), 600, w);
        let snapshot = f.build_shared();
        let request = JourneyRequest::new([a], [c], at(8, 0), at(12, 0));

        let unpruned = Planner::new(
            Arc::clone(&snapshot),
            Profile::<TransferMetric>::default().with_isochrone_pruning(false),
        )
        .all_journeys(&request)
        .unwrap();
        let pruned = Planner::new(snapshot, Profile::<TransferMetric>::default())
            .all_journeys(&request)
            .unwrap();
        assert_eq!(pruned, unpruned);
        assert_eq!(pruned.len(), 3);
    }

    #[test]
    fn latest_departure_is_forward() {
        let (snapshot, a, b) = scenario_single();
        let planner = Planner::new(snapshot, Profile::<TransferMetric>::default());
        let journey = planner
            .latest_departure(&JourneyRequest::new([a], [b], at(9, 0), at(11, 0)))
            .unwrap()
            .unwrap();
        assert_eq!(journey.departure_time(), at(9, 30));
        assert_eq!(journey.arrival_time(), at(9, 40));
        assert_eq!(journey.legs().first().map(|l| l.from), Some(a));
    }

    #[test]
    fn journeys_stay_inside_the_window() {
        let mut f = Fixture::new();
        let (a, b) = (f.stop("a"), f.stop("b"));
        let (early, late) = (f.trip("early"), f.trip("late"));
        f.connection("early", a, b, at(8, 30), 3_600, early);
        f.connection("late", a, b, at(10, 50), 2_400, late);
        let snapshot = f.build_shared();
        let request = JourneyRequest::new([a], [b], at(9, 0), at(11, 0));

        for prune in [true, false] {
            let profile = Profile::<TransferMetric>::default().with_isochrone_pruning(prune);
            let planner = Planner::new(Arc::clone(&snapshot), profile);
            assert!(planner.earliest_arrival(&request).unwrap().is_none());
            assert!(planner.latest_departure(&request).unwrap().is_none());
            assert!(planner.all_journeys(&request).unwrap().is_empty());
        }
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let (snapshot, a, b) = scenario_single();
        let planner = Planner::new(snapshot, Profile::<TransferMetric>::default());
        let invalid = [
            JourneyRequest::new(Vec::<StopId>::new(), [b], at(9, 0), at(11, 0)),
            JourneyRequest::new([a], Vec::<StopId>::new(), at(9, 0), at(11, 0)),
            JourneyRequest::new([a], [b], at(11, 0), at(11, 0)),
            JourneyRequest::new([a, b], [b], at(9, 0), at(11, 0)),
            JourneyRequest::new([a], [StopId(42)], at(9, 0), at(11, 0)),
        ];
        for request in &invalid {
            assert!(
                matches!(
                    planner.all_journeys(request),
                    Err(PlanError::InvalidRequest(_))
                ),
                "{request:?}"
            );
        }
    }

    #[test]
    fn isochrones_need_one_side_only() {
        let (snapshot, a, b) = scenario_single();
        let planner = Planner::new(snapshot, Profile::<TransferMetric>::default());

        let from = planner
            .isochrone_from(&JourneyRequest::new([a], Vec::<StopId>::new(), at(9, 0), at(11, 0)))
            .unwrap();
        assert_eq!(from.time_at(b), Some(at(9, 40)));
        assert_eq!(from.window(), (at(9, 0), at(11, 0)));

        let to = planner
            .isochrone_to(&JourneyRequest::new(Vec::<StopId>::new(), [b], at(9, 0), at(11, 0)))
            .unwrap();
        assert_eq!(to.time_at(a), Some(at(9, 30)));

        assert!(planner
            .isochrone_to(&JourneyRequest::new([a], Vec::<StopId>::new(), at(9, 0), at(11, 0)))
            .is_err());
    }

    #[test]
    fn profile_scan_outside_isochrone_window_fails() {
        let (snapshot, a, b) = scenario_single();
        let profile = Profile::<TransferMetric>::default();
        let planner = Planner::new(Arc::clone(&snapshot), profile.clone());
        let isochrone = planner
            .isochrone_from(&JourneyRequest::new([a], Vec::<StopId>::new(), at(9, 20), at(10, 0)))
            .unwrap();
        let filter = IsochroneFilter::new(&isochrone);

        let scan = ProfileScan::new(&snapshot, &profile, HashMap::from([(b, 0)]), at(9, 0), at(11, 0));
        assert!(matches!(
            scan.filter(&filter),
            Err(PlanError::FilterWindow { .. })
        ));
    }

    #[test]
    fn departure_point_resolves_to_nearby_stops() {
        let mut f = Fixture::new();
        let a = f.stop_at("a", 4.3360, 50.8355);
        let b = f.stop_at("b", 4.3571, 50.8455);
        let trip = f.trip("t");
        f.connection("c0", a, b, at(10, 0), 600, trip);
        let planner = Planner::new(f.build_shared(), Profile::<TransferMetric>::default());

        // About 130 m east of a.
        let request = JourneyRequest::new(Vec::<StopId>::new(), [b], at(9, 55), at(11, 0))
            .from_point(Point::new(4.3378, 50.8355));
        let journey = planner.earliest_arrival(&request).unwrap().unwrap();
        assert_eq!(journey.legs()[0].from, a);
        assert_eq!(journey.arrival_time(), at(10, 10));

        // Too late to walk to a.
        let late = JourneyRequest::new(Vec::<StopId>::new(), [b], at(9, 59), at(11, 0))
            .from_point(Point::new(4.3378, 50.8355));
        assert!(planner.earliest_arrival(&late).unwrap().is_none());

        // Nothing within walking range of the North Sea.
        let nowhere = JourneyRequest::new(Vec::<StopId>::new(), [b], at(9, 0), at(11, 0))
            .from_point(Point::new(2.5, 51.5));
        assert!(matches!(
            planner.earliest_arrival(&nowhere),
            Err(PlanError::InvalidRequest(_))
        ));

        let config = PlannerConfig {
            max_walk_metres: 0.0,
            ..PlannerConfig::default()
        };
        let no_walks = Planner::new(Arc::clone(planner.snapshot()), Profile::from_config(&config));
        assert!(no_walks.earliest_arrival(&request).is_err());
    }

    #[test]
    fn max_vehicles_filter_applies_to_profile_results() {
        let mut f = Fixture::new();
        let (a, b, c) = (f.stop("a"), f.stop("b"), f.stop("c"));
        let (x, y, z) = (f.trip("x"), f.trip("y"), f.trip("z"));
        f.connection("x0", a, b, at(10, 0), 600, x);
        f.connection("y0", b, c, at(10, 15), 600, y);
        f.connection("z0", a, c, at(10, 0), 3_600, z);
        let snapshot = f.build_shared();
        let request = JourneyRequest::new([a], [c], at(9, 0), at(12, 0));

        let all = Planner::new(Arc::clone(&snapshot), Profile::<TransferMetric>::default())
            .all_journeys(&request)
            .unwrap();
        assert_eq!(all.len(), 2);

        let config = PlannerConfig {
            max_vehicles: Some(1),
            ..PlannerConfig::default()
        };
        let direct = Planner::new(snapshot, Profile::from_config(&config))
            .all_journeys(&request)
            .unwrap();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].last_trip(), Some(z));
        let rides: Vec<_> = direct[0].legs().iter().filter_map(Leg::trip).collect();
        assert_eq!(rides, vec![z]);
    }
}
