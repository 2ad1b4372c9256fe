//! Transit database.
//!
//! Stops, trips and time-indexed connections, published to readers as
//! immutable snapshots and persisted in a versioned binary format.

mod connections;
mod cursor;
mod error;
mod index;
mod persist;
mod stops;
mod transit_db;
mod trips;

pub use connections::{ConnectionsDb, DEFAULT_WINDOW_COUNT, DEFAULT_WINDOW_SIZE};
pub use cursor::ConnectionCursor;
pub use error::{RecordKind, StoreError};
pub use index::Axis;
pub use persist::FORMAT_VERSION;
pub use stops::{StopsDb, StopsIndex};
pub use transit_db::{TransitDb, TransitDbWriter, TransitSnapshot};
pub use trips::TripsDb;
