//! Time-bucketed connection index.
//!
//! The time axis is cut into fixed-width windows that wrap around after
//! `window_count` windows (one day with the defaults), so a window holds
//! connections from every day that falls into its slot. Each window is kept
//! sorted by absolute time; a cursor recovers the connections of one
//! concrete window occurrence with two binary searches.

use crate::domain::{Connection, ConnectionId, Time};

/// Which time of a connection an index is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Departure,
    Arrival,
}

impl Axis {
    /// Returns the connection's time on this axis.
    pub fn time_of(self, connection: &Connection) -> Time {
        match self {
            Axis::Departure => connection.departure_time,
            Axis::Arrival => connection.arrival_time(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TimeIndex {
    pub(crate) axis: Axis,
    pub(crate) window_size: u32,
    pub(crate) windows: Vec<Vec<ConnectionId>>,
}

impl TimeIndex {
    pub(crate) fn new(axis: Axis, window_size: u32, window_count: u32) -> Self {
        Self {
            axis,
            window_size,
            windows: vec![Vec::new(); window_count as usize],
        }
    }

    /// Slot of the window containing `time`.
    pub(crate) fn window_of(&self, time: Time) -> usize {
        ((time / Time::from(self.window_size)) % self.windows.len() as Time) as usize
    }

    /// Start of the window occurrence containing `time`.
    pub(crate) fn window_start(&self, time: Time) -> Time {
        time - time % Time::from(self.window_size)
    }

    pub(crate) fn window_size(&self) -> Time {
        Time::from(self.window_size)
    }

    /// Inserts `id` after all entries with an equal or earlier time.
    pub(crate) fn insert(&mut self, id: ConnectionId, connections: &[Connection]) {
        let axis = self.axis;
        let time = axis.time_of(&connections[id.index()]);
        let slot = self.window_of(time);
        let window = &mut self.windows[slot];
        let pos = window.partition_point(|c| axis.time_of(&connections[c.index()]) <= time);
        window.insert(pos, id);
    }

    /// Removes `id` from the window slot it was filed under.
    pub(crate) fn remove(&mut self, id: ConnectionId, slot: usize) {
        let window = &mut self.windows[slot];
        if let Some(pos) = window.iter().position(|c| *c == id) {
            window.remove(pos);
        }
    }

    /// Restores the ordering of one window after a record changed in place.
    pub(crate) fn resort(&mut self, slot: usize, connections: &[Connection]) {
        let axis = self.axis;
        // Stable, so unchanged records keep their relative order.
        self.windows[slot].sort_by_key(|c| axis.time_of(&connections[c.index()]));
    }

    /// Index range of the entries of one window occurrence with times in
    /// `[from, until)`.
    pub(crate) fn range(
        &self,
        window_start: Time,
        from: Time,
        until: Time,
        connections: &[Connection],
    ) -> (usize, usize) {
        let axis = self.axis;
        let window = &self.windows[self.window_of(window_start)];
        let lo = window.partition_point(|c| axis.time_of(&connections[c.index()]) < from);
        let hi = window.partition_point(|c| axis.time_of(&connections[c.index()]) < until);
        (lo, hi.max(lo))
    }

    pub(crate) fn get(&self, window_start: Time, pos: usize) -> ConnectionId {
        self.windows[self.window_of(window_start)][pos]
    }

    /// Total number of entries over all windows.
    pub(crate) fn entry_count(&self) -> usize {
        self.windows.iter().map(Vec::len).sum()
    }
}
