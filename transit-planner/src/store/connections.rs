//! Connection store.
//!
//! Connections live in a dense arena addressed by `ConnectionId`. Two time
//! indices (departure and arrival) make "first connection at or after `t`"
//! cheap for every scanner, and a global-id map turns re-submitted records
//! into in-place updates.

use std::collections::HashMap;

use tracing::trace;

use crate::domain::{Connection, ConnectionId, Time};

use super::cursor::ConnectionCursor;
use super::error::{RecordKind, StoreError};
use super::index::{Axis, TimeIndex};

/// Default width of one index window, in seconds.
pub const DEFAULT_WINDOW_SIZE: u32 = 60;

/// Default number of windows (one day at the default width).
pub const DEFAULT_WINDOW_COUNT: u32 = 1440;

/// Append-only, add-or-update store of connections.
#[derive(Debug, Clone)]
pub struct ConnectionsDb {
    pub(crate) connections: Vec<Connection>,
    pub(crate) global_ids: HashMap<String, ConnectionId>,
    pub(crate) departure_index: TimeIndex,
    pub(crate) arrival_index: TimeIndex,
    /// Earliest departure and latest arrival ever stored. Only widens.
    pub(crate) date_range: Option<(Time, Time)>,
}

impl Default for ConnectionsDb {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionsDb {
    /// Creates an empty store with the default window layout.
    pub fn new() -> Self {
        Self::build(DEFAULT_WINDOW_SIZE, DEFAULT_WINDOW_COUNT)
    }

    /// Creates an empty store with a custom window layout.
    ///
    /// # Errors
    ///
    /// Returns `Err` if either the window size or count is zero.
    pub fn with_windows(window_size: u32, window_count: u32) -> Result<Self, StoreError> {
        if window_size == 0 || window_count == 0 {
            return Err(StoreError::InvalidWindows {
                size: window_size,
                count: window_count,
            });
        }
        Ok(Self::build(window_size, window_count))
    }

    fn build(window_size: u32, window_count: u32) -> Self {
        Self {
            connections: Vec::new(),
            global_ids: HashMap::new(),
            departure_index: TimeIndex::new(Axis::Departure, window_size, window_count),
            arrival_index: TimeIndex::new(Axis::Arrival, window_size, window_count),
            date_range: None,
        }
    }

    /// Adds a connection, or updates the stored one with the same global id.
    ///
    /// An update overwrites times, delays, stops, trip and mode and moves
    /// the record between index windows as needed. Re-submitting an
    /// unchanged record leaves the indices untouched.
    pub fn add_or_update(&mut self, connection: Connection) -> ConnectionId {
        self.widen_date_range(&connection);

        if let Some(&id) = self.global_ids.get(&connection.global_id) {
            let old = &self.connections[id.index()];
            let old_departure_slot = self.departure_index.window_of(old.departure_time);
            let old_arrival_slot = self.arrival_index.window_of(old.arrival_time());

            self.connections[id.index()] = connection;
            let updated = &self.connections[id.index()];
            let new_departure_slot = self.departure_index.window_of(updated.departure_time);
            let new_arrival_slot = self.arrival_index.window_of(updated.arrival_time());

            trace!(%id, "updating connection in place");
            Self::reindex(
                &mut self.departure_index,
                &self.connections,
                id,
                old_departure_slot,
                new_departure_slot,
            );
            Self::reindex(
                &mut self.arrival_index,
                &self.connections,
                id,
                old_arrival_slot,
                new_arrival_slot,
            );
            return id;
        }

        let id = ConnectionId(self.connections.len() as u32);
        self.global_ids.insert(connection.global_id.clone(), id);
        self.connections.push(connection);
        self.departure_index.insert(id, &self.connections);
        self.arrival_index.insert(id, &self.connections);
        id
    }

    fn reindex(
        index: &mut TimeIndex,
        connections: &[Connection],
        id: ConnectionId,
        old_slot: usize,
        new_slot: usize,
    ) {
        if old_slot == new_slot {
            index.resort(new_slot, connections);
        } else {
            index.remove(id, old_slot);
            index.insert(id, connections);
        }
    }

    fn widen_date_range(&mut self, connection: &Connection) {
        let departure = connection.departure_time;
        let arrival = connection.arrival_time();
        self.date_range = Some(match self.date_range {
            None => (departure, arrival),
            Some((earliest, latest)) => (earliest.min(departure), latest.max(arrival)),
        });
    }

    /// Returns the connection with the given internal id.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.index())
    }

    /// Returns the connection with the given global id, if stored.
    pub fn get_by_global_id(&self, global_id: &str) -> Option<(ConnectionId, &Connection)> {
        let id = *self.global_ids.get(global_id)?;
        let connection = self.get(id)?;
        // The map is rebuilt from the records on load; a mismatch means no match.
        (connection.global_id == global_id).then_some((id, connection))
    }

    /// Like [`get_by_global_id`](Self::get_by_global_id) but surfaces absence as an error.
    pub fn try_get_by_global_id(
        &self,
        global_id: &str,
    ) -> Result<(ConnectionId, &Connection), StoreError> {
        self.get_by_global_id(global_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: RecordKind::Connection,
                global_id: global_id.to_string(),
            })
    }

    /// Returns a cursor over connections ordered by departure time.
    pub fn enumerate_from_departure(&self, time: Time) -> ConnectionCursor<'_> {
        ConnectionCursor::new(self, Axis::Departure, time)
    }

    /// Returns a cursor over connections ordered by arrival time.
    pub fn enumerate_from_arrival(&self, time: Time) -> ConnectionCursor<'_> {
        ConnectionCursor::new(self, Axis::Arrival, time)
    }

    /// Returns (earliest departure, latest arrival), or `None` when empty.
    pub fn date_range(&self) -> Option<(Time, Time)> {
        self.date_range
    }

    /// Returns all stored connections in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections
            .iter()
            .enumerate()
            .map(|(i, c)| (ConnectionId(i as u32), c))
    }

    pub(crate) fn records(&self) -> &[Connection] {
        &self.connections
    }

    /// Returns the number of stored connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connection is stored.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns the width of one index window, in seconds.
    pub fn window_size(&self) -> u32 {
        self.departure_index.window_size
    }

    /// Returns the number of index windows.
    pub fn window_count(&self) -> u32 {
        self.departure_index.windows.len() as u32
    }
}
