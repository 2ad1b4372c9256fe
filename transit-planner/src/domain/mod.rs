//! Domain types for the journey planner.
//!
//! This module contains the record types stored in the transit database.
//! Constructors enforce their invariants, so stores and scanners can trust
//! every value they receive.

mod connection;
mod error;
mod ids;
mod stop;
mod time;

pub use connection::{Connection, Mode};
pub use error::DomainError;
pub use ids::{ConnectionId, StopId, TripId};
pub use stop::{Attributes, Stop, Trip};
pub use time::{Time, TimeError, from_unix, seconds_between, to_unix};
