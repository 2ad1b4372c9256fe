//! Binary persistence of the stores.
//!
//! Every blob starts with [`FORMAT_VERSION`]; readers refuse anything else.
//! Integers are little-endian, arrays are prefixed with a `u32` length.
//!
//! Connections section, in order:
//!
//! 1. window size, window count
//! 2. date range (presence byte, earliest, latest)
//! 3. connection records
//! 4. global ids, one per record
//! 5. departure window pointers (`count + 1` offsets) and window content
//! 6. arrival window pointers and window content
//!
//! The window arrays are stored as-is rather than rebuilt, so a loaded store
//! walks its cursors in exactly the order the written one did.

use std::collections::HashMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use crate::domain::{Attributes, Connection, ConnectionId, Mode, Stop, StopId, Trip, TripId};

use super::connections::ConnectionsDb;
use super::error::StoreError;
use super::index::{Axis, TimeIndex};
use super::stops::StopsDb;
use super::trips::TripsDb;

/// Version tag written at the start of every blob.
pub const FORMAT_VERSION: u8 = 1;

/// Largest length prefix accepted when reading; guards against allocating
/// for garbage input.
const MAX_LEN: u32 = 1 << 28;

/// Largest window count accepted when reading. A year of one-minute windows.
const MAX_WINDOWS: u32 = 366 * 1440;

pub(crate) fn write_version<W: Write>(w: &mut W) -> Result<(), StoreError> {
    w.write_u8(FORMAT_VERSION)?;
    Ok(())
}

pub(crate) fn read_version<R: Read>(r: &mut R) -> Result<(), StoreError> {
    let version = r.read_u8()?;
    if version != FORMAT_VERSION {
        warn!(version, expected = FORMAT_VERSION, "rejecting persisted store");
        return Err(StoreError::UnsupportedVersion(version));
    }
    Ok(())
}

fn write_len<W: Write>(w: &mut W, len: usize) -> Result<(), StoreError> {
    let len = u32::try_from(len)
        .map_err(|_| StoreError::Corrupt(format!("array of {len} entries is too long")))?;
    w.write_u32::<LittleEndian>(len)?;
    Ok(())
}

fn read_len<R: Read>(r: &mut R) -> Result<usize, StoreError> {
    let len = r.read_u32::<LittleEndian>()?;
    if len > MAX_LEN {
        return Err(StoreError::Corrupt(format!("length prefix {len} out of range")));
    }
    Ok(len as usize)
}

fn write_str<W: Write>(w: &mut W, s: &str) -> Result<(), StoreError> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(r: &mut R) -> Result<String, StoreError> {
    let len = read_len(r)?;
    let mut bytes = Vec::with_capacity(len.min(4096));
    Read::take(&mut *r, len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(StoreError::Io(std::io::ErrorKind::UnexpectedEof.into()));
    }
    String::from_utf8(bytes).map_err(|e| StoreError::Corrupt(format!("invalid utf-8: {e}")))
}

fn write_attributes<W: Write>(w: &mut W, attributes: &Attributes) -> Result<(), StoreError> {
    write_len(w, attributes.len())?;
    for (key, value) in attributes {
        write_str(w, key)?;
        write_str(w, value)?;
    }
    Ok(())
}

fn read_attributes<R: Read>(r: &mut R) -> Result<Attributes, StoreError> {
    let len = read_len(r)?;
    let mut attributes = Attributes::new();
    for _ in 0..len {
        let key = read_string(r)?;
        let value = read_string(r)?;
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn write_index<W: Write>(w: &mut W, index: &TimeIndex) -> Result<(), StoreError> {
    let mut offset = 0usize;
    write_len(w, index.windows.len() + 1)?;
    w.write_u32::<LittleEndian>(0)?;
    for window in &index.windows {
        offset += window.len();
        write_len(w, offset)?;
    }
    write_len(w, offset)?;
    for id in index.windows.iter().flatten() {
        w.write_u32::<LittleEndian>(id.0)?;
    }
    Ok(())
}

fn read_index<R: Read>(
    r: &mut R,
    axis: Axis,
    window_size: u32,
    window_count: u32,
    connections: &[Connection],
) -> Result<TimeIndex, StoreError> {
    let pointer_count = read_len(r)?;
    if pointer_count != window_count as usize + 1 {
        return Err(StoreError::Corrupt(format!(
            "{axis:?} index has {pointer_count} pointers for {window_count} windows"
        )));
    }
    let mut pointers = Vec::with_capacity(pointer_count);
    for _ in 0..pointer_count {
        pointers.push(r.read_u32::<LittleEndian>()? as usize);
    }

    let content_len = read_len(r)?;
    if content_len != connections.len() || pointers.last() != Some(&content_len) {
        return Err(StoreError::Corrupt(format!(
            "{axis:?} index holds {content_len} entries for {} connections",
            connections.len()
        )));
    }
    // As many entries as connections and none twice: each appears exactly once.
    let mut seen = vec![false; connections.len()];
    let mut content = Vec::with_capacity(content_len);
    for _ in 0..content_len {
        let id = r.read_u32::<LittleEndian>()?;
        let Some(slot) = seen.get_mut(id as usize) else {
            return Err(StoreError::DanglingReference(format!("{axis:?} index entry {id}")));
        };
        if std::mem::replace(slot, true) {
            return Err(StoreError::Corrupt(format!("{axis:?} index lists connection {id} twice")));
        }
        content.push(ConnectionId(id));
    }

    let mut index = TimeIndex::new(axis, window_size, window_count);
    for (slot, bounds) in pointers.windows(2).enumerate() {
        let (start, end) = (bounds[0], bounds[1]);
        if start > end || end > content.len() {
            return Err(StoreError::Corrupt(format!("{axis:?} window {slot} out of bounds")));
        }
        let window = content[start..end].to_vec();
        let sorted = window.windows(2).all(|pair| {
            axis.time_of(&connections[pair[0].index()]) <= axis.time_of(&connections[pair[1].index()])
        });
        let placed = window
            .iter()
            .all(|id| index.window_of(axis.time_of(&connections[id.index()])) == slot);
        if !sorted || !placed {
            return Err(StoreError::Corrupt(format!("{axis:?} window {slot} is not ordered")));
        }
        index.windows[slot] = window;
    }
    Ok(index)
}

impl ConnectionsDb {
    /// Writes the store, prefixed with the format version.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), StoreError> {
        write_version(w)?;
        self.write_body(w)
    }

    /// Reads a store written by [`write_to`](Self::write_to).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedVersion`] for an unknown version tag
    /// and [`StoreError::Corrupt`] for structurally invalid data.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, StoreError> {
        read_version(r)?;
        Self::read_body(r)
    }

    pub(crate) fn write_body<W: Write>(&self, w: &mut W) -> Result<(), StoreError> {
        w.write_u32::<LittleEndian>(self.window_size())?;
        w.write_u32::<LittleEndian>(self.window_count())?;
        match self.date_range {
            Some((earliest, latest)) => {
                w.write_u8(1)?;
                w.write_u64::<LittleEndian>(earliest)?;
                w.write_u64::<LittleEndian>(latest)?;
            }
            None => {
                w.write_u8(0)?;
                w.write_u64::<LittleEndian>(0)?;
                w.write_u64::<LittleEndian>(0)?;
            }
        }

        write_len(w, self.connections.len())?;
        for c in &self.connections {
            w.write_u32::<LittleEndian>(c.departure_stop.0)?;
            w.write_u32::<LittleEndian>(c.arrival_stop.0)?;
            w.write_u64::<LittleEndian>(c.departure_time)?;
            w.write_u16::<LittleEndian>(c.travel_time)?;
            w.write_u16::<LittleEndian>(c.departure_delay)?;
            w.write_u16::<LittleEndian>(c.arrival_delay)?;
            w.write_u32::<LittleEndian>(c.trip.0)?;
            w.write_u16::<LittleEndian>(c.mode.0)?;
        }
        write_len(w, self.connections.len())?;
        for c in &self.connections {
            write_str(w, &c.global_id)?;
        }

        write_index(w, &self.departure_index)?;
        write_index(w, &self.arrival_index)?;
        Ok(())
    }

    pub(crate) fn read_body<R: Read>(r: &mut R) -> Result<Self, StoreError> {
        let window_size = r.read_u32::<LittleEndian>()?;
        let window_count = r.read_u32::<LittleEndian>()?;
        if window_count > MAX_WINDOWS {
            return Err(StoreError::Corrupt(format!("{window_count} windows out of range")));
        }
        let mut db = Self::with_windows(window_size, window_count)?;

        let has_range = r.read_u8()?;
        let earliest = r.read_u64::<LittleEndian>()?;
        let latest = r.read_u64::<LittleEndian>()?;
        db.date_range = match has_range {
            0 => None,
            1 => Some((earliest, latest)),
            other => return Err(StoreError::Corrupt(format!("date range tag {other}"))),
        };

        let count = read_len(r)?;
        let mut records = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            records.push(Connection {
                global_id: String::new(),
                departure_stop: StopId(r.read_u32::<LittleEndian>()?),
                arrival_stop: StopId(r.read_u32::<LittleEndian>()?),
                departure_time: r.read_u64::<LittleEndian>()?,
                travel_time: r.read_u16::<LittleEndian>()?,
                departure_delay: r.read_u16::<LittleEndian>()?,
                arrival_delay: r.read_u16::<LittleEndian>()?,
                trip: TripId(r.read_u32::<LittleEndian>()?),
                mode: Mode(r.read_u16::<LittleEndian>()?),
            });
        }

        let id_count = read_len(r)?;
        if id_count != count {
            return Err(StoreError::Corrupt(format!(
                "{id_count} global ids for {count} connections"
            )));
        }
        let mut global_ids = HashMap::with_capacity(count);
        for (i, record) in records.iter_mut().enumerate() {
            record.global_id = read_string(r)?;
            if global_ids
                .insert(record.global_id.clone(), ConnectionId(i as u32))
                .is_some()
            {
                return Err(StoreError::Corrupt(format!(
                    "duplicate connection id {}",
                    record.global_id
                )));
            }
        }

        db.departure_index = read_index(r, Axis::Departure, window_size, window_count, &records)?;
        db.arrival_index = read_index(r, Axis::Arrival, window_size, window_count, &records)?;
        db.connections = records;
        db.global_ids = global_ids;
        Ok(db)
    }
}

impl StopsDb {
    pub(crate) fn write_body<W: Write>(&self, w: &mut W) -> Result<(), StoreError> {
        write_len(w, self.len())?;
        for (_, stop) in self.iter() {
            write_str(w, &stop.global_id)?;
            w.write_f64::<LittleEndian>(stop.longitude)?;
            w.write_f64::<LittleEndian>(stop.latitude)?;
            write_attributes(w, &stop.attributes)?;
        }
        Ok(())
    }

    pub(crate) fn read_body<R: Read>(r: &mut R) -> Result<Self, StoreError> {
        let count = read_len(r)?;
        let mut db = Self::new();
        for i in 0..count {
            let global_id = read_string(r)?;
            let longitude = r.read_f64::<LittleEndian>()?;
            let latitude = r.read_f64::<LittleEndian>()?;
            let mut stop = Stop::new(global_id, longitude, latitude)?;
            stop.attributes = read_attributes(r)?;
            let id = db.add_or_update(stop);
            if id.index() != i {
                return Err(StoreError::Corrupt(format!("duplicate stop at position {i}")));
            }
        }
        Ok(db)
    }
}

impl TripsDb {
    pub(crate) fn write_body<W: Write>(&self, w: &mut W) -> Result<(), StoreError> {
        write_len(w, self.len())?;
        for (_, trip) in self.iter() {
            write_str(w, &trip.global_id)?;
            write_attributes(w, &trip.attributes)?;
        }
        Ok(())
    }

    pub(crate) fn read_body<R: Read>(r: &mut R) -> Result<Self, StoreError> {
        let count = read_len(r)?;
        let mut db = Self::new();
        for i in 0..count {
            let mut trip = Trip::new(read_string(r)?)?;
            trip.attributes = read_attributes(r)?;
            let id = db.add_or_update(trip);
            if id.index() != i {
                return Err(StoreError::Corrupt(format!("duplicate trip at position {i}")));
            }
        }
        Ok(db)
    }
}
