//! Connection types.
//!
//! A `Connection` is one scheduled vehicle movement between two stops.
//! Trips are sequences of connections sharing the same `TripId`.

use std::fmt;

use super::{DomainError, StopId, Time, TripId};

/// Boarding/alighting restrictions of a connection.
///
/// Bit 0 forbids alighting at the arrival stop, bit 1 forbids boarding at
/// the departure stop. A traveller who is already on the vehicle may always
/// stay seated through a restricted connection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mode(pub u16);

impl Mode {
    /// Boarding and alighting allowed.
    pub const NORMAL: Mode = Mode(0);
    /// Boarding allowed, alighting forbidden.
    pub const GET_ON_ONLY: Mode = Mode(1);
    /// Alighting allowed, boarding forbidden.
    pub const GET_OFF_ONLY: Mode = Mode(2);
    /// Neither boarding nor alighting allowed.
    pub const CANT_GET_ON_OFF: Mode = Mode(3);

    /// Returns true if a traveller may board at the departure stop.
    pub fn can_get_on(self) -> bool {
        self.0 & 2 == 0
    }

    /// Returns true if a traveller may alight at the arrival stop.
    pub fn can_get_off(self) -> bool {
        self.0 & 1 == 0
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Mode::NORMAL => "NORMAL",
            Mode::GET_ON_ONLY => "GET_ON_ONLY",
            Mode::GET_OFF_ONLY => "GET_OFF_ONLY",
            Mode::CANT_GET_ON_OFF => "CANT_GET_ON_OFF",
            _ => return write!(f, "Mode({})", self.0),
        };
        f.write_str(name)
    }
}

/// A single scheduled movement between two stops.
///
/// # Invariants
///
/// - `global_id` is non-empty
/// - `arrival_time() >= departure_time`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Stable external identifier, used for add-or-update.
    pub global_id: String,
    pub departure_stop: StopId,
    pub arrival_stop: StopId,
    /// Unix seconds.
    pub departure_time: Time,
    /// Seconds between departure and arrival.
    pub travel_time: u16,
    /// Seconds.
    pub departure_delay: u16,
    /// Seconds.
    pub arrival_delay: u16,
    pub trip: TripId,
    pub mode: Mode,
}

impl Connection {
    /// Constructs a connection from departure and arrival times.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the global id is empty, the arrival precedes the
    /// departure, or the travel time does not fit in 16 bits (~18 hours).
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_planner::domain::{Connection, StopId, TripId};
    ///
    /// let c = Connection::new("c0", StopId(0), StopId(1), 1_000, 1_600, TripId(0)).unwrap();
    /// assert_eq!(c.arrival_time(), 1_600);
    /// assert_eq!(c.travel_time, 600);
    /// ```
    pub fn new(
        global_id: impl Into<String>,
        departure_stop: StopId,
        arrival_stop: StopId,
        departure_time: Time,
        arrival_time: Time,
        trip: TripId,
    ) -> Result<Self, DomainError> {
        let global_id = global_id.into();
        if global_id.is_empty() {
            return Err(DomainError::EmptyGlobalId);
        }
        if arrival_time < departure_time {
            return Err(DomainError::NegativeTravelTime(global_id));
        }
        let travel = arrival_time - departure_time;
        let travel_time =
            u16::try_from(travel).map_err(|_| DomainError::TravelTimeTooLong(travel))?;

        Ok(Self {
            global_id,
            departure_stop,
            arrival_stop,
            departure_time,
            travel_time,
            departure_delay: 0,
            arrival_delay: 0,
            trip,
            mode: Mode::NORMAL,
        })
    }

    /// Returns the connection with the given mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the connection with the given delays (seconds).
    pub fn with_delays(mut self, departure_delay: u16, arrival_delay: u16) -> Self {
        self.departure_delay = departure_delay;
        self.arrival_delay = arrival_delay;
        self
    }

    /// Returns the arrival time, derived from departure and travel time.
    pub fn arrival_time(&self) -> Time {
        self.departure_time + Time::from(self.travel_time)
    }

    /// Returns true if a traveller may board here.
    pub fn can_get_on(&self) -> bool {
        self.mode.can_get_on()
    }

    /// Returns true if a traveller may alight here.
    pub fn can_get_off(&self) -> bool {
        self.mode.can_get_off()
    }
}
