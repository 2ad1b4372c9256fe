//! Shared test fixtures.

use std::sync::{Arc, Once};

use crate::domain::{Connection, ConnectionId, Mode, Stop, StopId, Time, Trip, TripId};
use crate::journey::TransferMetric;
use crate::planner::{PlannerConfig, Profile};
use crate::store::TransitSnapshot;

/// 2018-12-04T00:00:00Z.
pub(crate) const DEC_4_2018: Time = 1_543_881_600;

/// Seconds since the epoch at `hour:minute` UTC on 2018-12-04.
pub(crate) fn at(hour: u64, minute: u64) -> Time {
    DEC_4_2018 + hour * 3600 + minute * 60
}

/// Installs a test subscriber once; honours `RUST_LOG`.
pub(crate) fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Default profile with instant changes between vehicles.
pub(crate) fn no_transfer_profile() -> Profile<TransferMetric> {
    Profile::from_config(&PlannerConfig {
        min_transfer_secs: 0,
        ..PlannerConfig::default()
    })
}

/// Builds snapshots stop by stop.
///
/// Stops added with [`Fixture::stop`] sit on a grid about 7 km apart, out of
/// walking range of each other.
#[derive(Debug, Default)]
pub(crate) struct Fixture {
    snapshot: TransitSnapshot,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn stop(&mut self, global_id: &str) -> StopId {
        let n = self.snapshot.stops.len() as f64;
        self.stop_at(global_id, 4.0 + 0.1 * (n % 10.0), 50.0 + 0.1 * (n / 10.0).floor())
    }

    pub(crate) fn stop_at(&mut self, global_id: &str, longitude: f64, latitude: f64) -> StopId {
        self.snapshot
            .stops
            .add_or_update(Stop::new(global_id, longitude, latitude).unwrap())
    }

    pub(crate) fn trip(&mut self, global_id: &str) -> TripId {
        self.snapshot.trips.add_or_update(Trip::new(global_id).unwrap())
    }

    pub(crate) fn connection(
        &mut self,
        global_id: &str,
        from: StopId,
        to: StopId,
        departure: Time,
        travel_secs: u64,
        trip: TripId,
    ) -> ConnectionId {
        self.connection_with_mode(global_id, from, to, departure, travel_secs, trip, Mode::NORMAL)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn connection_with_mode(
        &mut self,
        global_id: &str,
        from: StopId,
        to: StopId,
        departure: Time,
        travel_secs: u64,
        trip: TripId,
        mode: Mode,
    ) -> ConnectionId {
        let connection =
            Connection::new(global_id, from, to, departure, departure + travel_secs, trip)
                .unwrap()
                .with_mode(mode);
        self.snapshot.connections.add_or_update(connection)
    }

    pub(crate) fn build(self) -> TransitSnapshot {
        self.snapshot
    }

    pub(crate) fn build_shared(self) -> Arc<TransitSnapshot> {
        Arc::new(self.snapshot)
    }
}
