//! Internal handles for stored entities.
//!
//! Every stop, trip and connection gets a dense `u32` handle when it is
//! first written to a store. Handles index directly into the store's arena
//! and stay stable across updates of the same global id.

use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the handle as an arena index.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// Handle of a stop in a `StopsDb`.
    StopId,
    "StopId"
);

handle!(
    /// Handle of a trip in a `TripsDb`.
    TripId,
    "TripId"
);

handle!(
    /// Handle of a connection in a `ConnectionsDb`.
    ConnectionId,
    "ConnectionId"
);
