//! Snapshot-publishing transit database.
//!
//! Readers take an `Arc<TransitSnapshot>` and query it without locking; the
//! single writer edits a private copy and swaps it in on `close()`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::domain::{Connection, ConnectionId, Stop, StopId, Trip, TripId};
use crate::planner::PlannerConfig;

use super::connections::ConnectionsDb;
use super::error::StoreError;
use super::persist::{read_version, write_version};
use super::stops::StopsDb;
use super::trips::TripsDb;

/// Immutable view of stops, trips and connections.
#[derive(Debug, Clone, Default)]
pub struct TransitSnapshot {
    pub stops: StopsDb,
    pub trips: TripsDb,
    pub connections: ConnectionsDb,
}

impl TransitSnapshot {
    /// Creates an empty snapshot whose connection store uses a custom window layout.
    pub fn with_windows(window_size: u32, window_count: u32) -> Result<Self, StoreError> {
        Ok(Self {
            stops: StopsDb::new(),
            trips: TripsDb::new(),
            connections: ConnectionsDb::with_windows(window_size, window_count)?,
        })
    }

    /// Creates an empty snapshot laid out as `config` asks.
    pub fn from_config(config: &PlannerConfig) -> Result<Self, StoreError> {
        Self::with_windows(config.window_size_secs, config.window_count)
    }

    /// Writes stops, trips and connections behind one version tag.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), StoreError> {
        write_version(w)?;
        self.stops.write_body(w)?;
        self.trips.write_body(w)?;
        self.connections.write_body(w)?;
        Ok(())
    }

    /// Reads a snapshot written by [`write_to`](Self::write_to).
    ///
    /// Connections referring to stops or trips the blob does not contain are
    /// rejected with [`StoreError::DanglingReference`].
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, StoreError> {
        read_version(r)?;
        let stops = StopsDb::read_body(r)?;
        let trips = TripsDb::read_body(r)?;
        let connections = ConnectionsDb::read_body(r)?;
        let snapshot = Self {
            stops,
            trips,
            connections,
        };
        for (_, c) in snapshot.connections.iter() {
            snapshot.check_references(c)?;
        }
        Ok(snapshot)
    }

    /// Saves to `path` through a temporary file, so readers never see a
    /// half-written store.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");

        let mut writer = BufWriter::new(File::create(&temp)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        drop(writer);
        std::fs::rename(&temp, path)?;
        debug!(path = %path.display(), connections = self.connections.len(), "saved snapshot");
        Ok(())
    }

    /// Loads a snapshot saved by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let snapshot = Self::read_from(&mut reader)?;
        debug!(
            path = %path.display(),
            stops = snapshot.stops.len(),
            connections = snapshot.connections.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    fn check_references(&self, c: &Connection) -> Result<(), StoreError> {
        for stop in [c.departure_stop, c.arrival_stop] {
            if self.stops.get(stop).is_none() {
                return Err(StoreError::DanglingReference(format!(
                    "connection {} refers to {stop}",
                    c.global_id
                )));
            }
        }
        if self.trips.get(c.trip).is_none() {
            return Err(StoreError::DanglingReference(format!(
                "connection {} refers to {}",
                c.global_id, c.trip
            )));
        }
        Ok(())
    }
}

/// Holder of the current snapshot and the single-writer flag.
#[derive(Debug, Default)]
pub struct TransitDb {
    current: RwLock<Arc<TransitSnapshot>>,
    writer_active: AtomicBool,
}

impl TransitDb {
    /// Creates a database with an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a database publishing `snapshot`.
    pub fn from_snapshot(snapshot: TransitSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer_active: AtomicBool::new(false),
        }
    }

    /// Returns the latest published snapshot.
    pub fn latest(&self) -> Arc<TransitSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Opens the writer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WriterActive`] while another writer is open.
    pub fn writer(&self) -> Result<TransitDbWriter<'_>, StoreError> {
        if self
            .writer_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StoreError::WriterActive);
        }
        let draft = TransitSnapshot::clone(&self.latest());
        Ok(TransitDbWriter {
            db: self,
            draft,
            closed: false,
        })
    }

    fn publish(&self, snapshot: TransitSnapshot) -> Arc<TransitSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);
        snapshot
    }
}

/// The single writer of a [`TransitDb`].
///
/// Changes go to a private copy. [`close`](Self::close) publishes them;
/// dropping the writer without closing discards them.
#[derive(Debug)]
pub struct TransitDbWriter<'a> {
    db: &'a TransitDb,
    draft: TransitSnapshot,
    closed: bool,
}

impl TransitDbWriter<'_> {
    /// Returns the draft, including unpublished changes.
    pub fn draft(&self) -> &TransitSnapshot {
        &self.draft
    }

    pub fn add_or_update_stop(&mut self, stop: Stop) -> StopId {
        self.draft.stops.add_or_update(stop)
    }

    pub fn add_or_update_trip(&mut self, trip: Trip) -> TripId {
        self.draft.trips.add_or_update(trip)
    }

    /// Adds or updates a connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DanglingReference`] if the connection refers to
    /// a stop or trip the draft does not contain.
    pub fn add_or_update_connection(
        &mut self,
        connection: Connection,
    ) -> Result<ConnectionId, StoreError> {
        let draft = &mut self.draft;
        draft.check_references(&connection)?;
        Ok(draft.connections.add_or_update(connection))
    }

    /// Publishes the draft and releases the writer.
    pub fn close(mut self) -> Arc<TransitSnapshot> {
        let draft = std::mem::take(&mut self.draft);
        self.closed = true;
        debug!(
            stops = draft.stops.len(),
            trips = draft.trips.len(),
            connections = draft.connections.len(),
            "publishing snapshot"
        );
        self.db.publish(draft)
    }
}

impl Drop for TransitDbWriter<'_> {
    fn drop(&mut self) {
        if !self.closed {
            debug!("writer dropped without close, discarding changes");
        }
        self.db.writer_active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(writer: &mut TransitDbWriter<'_>) {
        let a = writer.add_or_update_stop(Stop::new("a", 4.0, 50.0).unwrap());
        let b = writer.add_or_update_stop(Stop::new("b", 4.1, 50.0).unwrap());
        let t = writer.add_or_update_trip(Trip::new("t").unwrap());
        writer
            .add_or_update_connection(Connection::new("c", a, b, 100, 200, t).unwrap())
            .unwrap();
    }

    #[test]
    fn close_publishes_snapshot() {
        let db = TransitDb::new();
        let before = db.latest();
        let mut writer = db.writer().unwrap();
        fill(&mut writer);
        assert!(db.latest().connections.is_empty());
        let published = writer.close();

        assert_eq!(published.connections.len(), 1);
        assert_eq!(db.latest().stops.len(), 2);
        // Snapshots handed out earlier are unaffected.
        assert!(before.connections.is_empty());
    }

    #[test]
    fn window_layout_comes_from_config() {
        let config = PlannerConfig {
            window_size_secs: 300,
            window_count: 12,
            ..PlannerConfig::default()
        };
        let db = TransitDb::from_snapshot(TransitSnapshot::from_config(&config).unwrap());
        let mut writer = db.writer().unwrap();
        fill(&mut writer);
        let published = writer.close();
        assert_eq!(published.connections.window_size(), 300);
        assert_eq!(published.connections.window_count(), 12);

        let broken = PlannerConfig {
            window_count: 0,
            ..PlannerConfig::default()
        };
        assert!(matches!(
            TransitSnapshot::from_config(&broken),
            Err(StoreError::InvalidWindows { size: 60, count: 0 })
        ));
    }

    #[test]
    fn only_one_writer_at_a_time() {
        let db = TransitDb::new();
        let writer = db.writer().unwrap();
        assert!(matches!(db.writer(), Err(StoreError::WriterActive)));
        drop(writer);
        assert!(db.writer().is_ok());
    }

    #[test]
    fn dropped_writer_discards_changes() {
        let db = TransitDb::new();
        {
            let mut writer = db.writer().unwrap();
            fill(&mut writer);
        }
        assert!(db.latest().stops.is_empty());
        assert!(db.writer().is_ok());
    }

    #[test]
    fn dangling_connection_is_rejected() {
        let db = TransitDb::new();
        let mut writer = db.writer().unwrap();
        let c = Connection::new("c", StopId(0), StopId(1), 0, 10, TripId(0)).unwrap();
        assert!(matches!(
            writer.add_or_update_connection(c),
            Err(StoreError::DanglingReference(_))
        ));
    }

    #[test]
    fn save_and_load_through_file() {
        let db = TransitDb::new();
        let mut writer = db.writer().unwrap();
        fill(&mut writer);
        let snapshot = writer.close();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transit.bin");
        snapshot.save(&path).unwrap();
        let loaded = TransitSnapshot::load(&path).unwrap();

        assert_eq!(loaded.connections.records(), snapshot.connections.records());
        assert_eq!(loaded.stops.get(StopId(1)), snapshot.stops.get(StopId(1)));
        assert_eq!(loaded.trips.len(), 1);
        assert!(!dir.path().join("transit.bin.tmp").exists());
    }

    #[test]
    fn snapshot_rejects_unknown_version() {
        let mut buf = vec![0u8];
        TransitSnapshot::default().write_to(&mut buf).unwrap();
        let mut r = &buf[..];
        assert!(matches!(
            TransitSnapshot::read_from(&mut r),
            Err(StoreError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn snapshots_are_shareable_across_threads() {
        let db = Arc::new(TransitDb::new());
        let mut writer = db.writer().unwrap();
        fill(&mut writer);
        writer.close();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || db.latest().connections.len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
    }
}
