//! Bidirectional time-ordered cursor over a connection index.

use crate::domain::{Connection, ConnectionId, Time};

use super::connections::ConnectionsDb;
use super::index::{Axis, TimeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Not moved yet; anchored at the requested time.
    Fresh,
    /// On entry `pos` of the window occurrence starting at `window_start`.
    At { window_start: Time, pos: usize },
    /// Ran off the late end; remembers the last entry stood on.
    AfterLast(Option<(Time, usize)>),
    /// Ran off the early end; remembers the first entry stood on.
    BeforeFirst(Option<(Time, usize)>),
}

/// Cursor over the connections of one index, in (time, insertion) order.
///
/// A fresh cursor anchored at `t` yields on `move_next` the first
/// connection with axis time `>= t`, and on `move_previous` the last
/// connection with axis time `<= t`. After that every step moves strictly
/// forward or backward. Empty windows are skipped and the walk stops at the
/// store's earliest/latest dates. A cursor that ran off one end steps back
/// onto the entry it left from when moved the other way.
///
/// # Examples
///
/// ```
/// use transit_planner::domain::{Connection, StopId, TripId};
/// use transit_planner::store::ConnectionsDb;
///
/// let mut db = ConnectionsDb::new();
/// db.add_or_update(Connection::new("c0", StopId(0), StopId(1), 600, 900, TripId(0)).unwrap());
/// db.add_or_update(Connection::new("c1", StopId(1), StopId(2), 960, 1200, TripId(0)).unwrap());
///
/// let mut cursor = db.enumerate_from_departure(700);
/// assert!(cursor.move_next());
/// assert_eq!(cursor.current().unwrap().global_id, "c1");
/// assert!(cursor.move_previous());
/// assert_eq!(cursor.current().unwrap().global_id, "c0");
/// assert!(!cursor.move_previous());
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionCursor<'a> {
    db: &'a ConnectionsDb,
    index: &'a TimeIndex,
    anchor: Time,
    position: Position,
}

impl<'a> ConnectionCursor<'a> {
    pub(crate) fn new(db: &'a ConnectionsDb, axis: Axis, anchor: Time) -> Self {
        let index = match axis {
            Axis::Departure => &db.departure_index,
            Axis::Arrival => &db.arrival_index,
        };
        Self {
            db,
            index,
            anchor,
            position: Position::Fresh,
        }
    }

    /// Returns the axis this cursor walks.
    pub fn axis(&self) -> Axis {
        self.index.axis
    }

    /// Returns the id of the connection under the cursor.
    pub fn current_id(&self) -> Option<ConnectionId> {
        match self.position {
            Position::At { window_start, pos } => Some(self.index.get(window_start, pos)),
            _ => None,
        }
    }

    /// Returns the connection under the cursor.
    pub fn current(&self) -> Option<&'a Connection> {
        let db = self.db;
        self.current_id().and_then(|id| db.get(id))
    }

    /// Returns the axis time of the connection under the cursor.
    pub fn current_time(&self) -> Option<Time> {
        self.current().map(|c| self.index.axis.time_of(c))
    }

    /// Moves to the next connection. Returns false when none is left.
    pub fn move_next(&mut self) -> bool {
        let Some((earliest, latest)) = self.db.date_range() else {
            return false;
        };
        let width = self.index.window_size();
        let db = self.db;
        let connections = db.records();

        match self.position {
            Position::AfterLast(_) => false,
            Position::BeforeFirst(Some((window_start, pos))) => {
                self.position = Position::At { window_start, pos };
                true
            }
            Position::Fresh | Position::BeforeFirst(None) => {
                let from = self.anchor.max(self.index.window_start(earliest));
                let window_start = self.index.window_start(from);
                let (lo, hi) = self
                    .index
                    .range(window_start, from, window_start + width, connections);
                if lo < hi {
                    self.position = Position::At {
                        window_start,
                        pos: lo,
                    };
                    true
                } else {
                    self.seek_forward(window_start + width, latest)
                }
            }
            Position::At { window_start, pos } => {
                let (_, hi) = self.index.range(
                    window_start,
                    window_start,
                    window_start + width,
                    connections,
                );
                if pos + 1 < hi {
                    self.position = Position::At {
                        window_start,
                        pos: pos + 1,
                    };
                    true
                } else {
                    self.seek_forward(window_start + width, latest)
                }
            }
        }
    }

    /// Moves to the previous connection. Returns false when none is left.
    pub fn move_previous(&mut self) -> bool {
        let Some((earliest, latest)) = self.db.date_range() else {
            return false;
        };
        let width = self.index.window_size();
        let db = self.db;
        let connections = db.records();

        match self.position {
            Position::BeforeFirst(_) => false,
            Position::AfterLast(Some((window_start, pos))) => {
                self.position = Position::At { window_start, pos };
                true
            }
            Position::Fresh | Position::AfterLast(None) => {
                let until = self.anchor.min(latest);
                let window_start = self.index.window_start(until);
                let (lo, hi) = self
                    .index
                    .range(window_start, window_start, until + 1, connections);
                if lo < hi {
                    self.position = Position::At {
                        window_start,
                        pos: hi - 1,
                    };
                    true
                } else {
                    self.seek_backward(window_start, earliest)
                }
            }
            Position::At { window_start, pos } => {
                let (lo, _) = self.index.range(
                    window_start,
                    window_start,
                    window_start + width,
                    connections,
                );
                if pos > lo {
                    self.position = Position::At {
                        window_start,
                        pos: pos - 1,
                    };
                    true
                } else {
                    self.seek_backward(window_start, earliest)
                }
            }
        }
    }

    /// Finds the first non-empty window occurrence starting at or after
    /// `window_start`.
    fn seek_forward(&mut self, mut window_start: Time, latest: Time) -> bool {
        let width = self.index.window_size();
        let db = self.db;
        let connections = db.records();
        while window_start <= latest {
            let (lo, hi) = self
                .index
                .range(window_start, window_start, window_start + width, connections);
            if lo < hi {
                self.position = Position::At {
                    window_start,
                    pos: lo,
                };
                return true;
            }
            window_start += width;
        }
        self.position = Position::AfterLast(self.slot());
        false
    }

    /// Finds the last non-empty window occurrence ending at or before
    /// `window_end`.
    fn seek_backward(&mut self, mut window_end: Time, earliest: Time) -> bool {
        let width = self.index.window_size();
        let db = self.db;
        let connections = db.records();
        while window_end > earliest && window_end >= width {
            let window_start = window_end - width;
            let (lo, hi) = self
                .index
                .range(window_start, window_start, window_end, connections);
            if lo < hi {
                self.position = Position::At {
                    window_start,
                    pos: hi - 1,
                };
                return true;
            }
            window_end = window_start;
        }
        self.position = Position::BeforeFirst(self.slot());
        false
    }

    fn slot(&self) -> Option<(Time, usize)> {
        match self.position {
            Position::At { window_start, pos } => Some((window_start, pos)),
            _ => None,
        }
    }
}
