//! Trip store.

use std::collections::HashMap;

use crate::domain::{Trip, TripId};

use super::error::{RecordKind, StoreError};

/// Add-or-update store of trips.
#[derive(Debug, Clone, Default)]
pub struct TripsDb {
    trips: Vec<Trip>,
    global_ids: HashMap<String, TripId>,
}

impl TripsDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trip, or replaces the attributes of the stored one.
    pub fn add_or_update(&mut self, trip: Trip) -> TripId {
        if let Some(&id) = self.global_ids.get(&trip.global_id) {
            self.trips[id.index()] = trip;
            return id;
        }
        let id = TripId(self.trips.len() as u32);
        self.global_ids.insert(trip.global_id.clone(), id);
        self.trips.push(trip);
        id
    }

    pub fn get(&self, id: TripId) -> Option<&Trip> {
        self.trips.get(id.index())
    }

    pub fn get_by_global_id(&self, global_id: &str) -> Option<(TripId, &Trip)> {
        let id = *self.global_ids.get(global_id)?;
        self.get(id).map(|trip| (id, trip))
    }

    pub fn try_get_by_global_id(&self, global_id: &str) -> Result<(TripId, &Trip), StoreError> {
        self.get_by_global_id(global_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: RecordKind::Trip,
                global_id: global_id.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (TripId, &Trip)> {
        self.trips
            .iter()
            .enumerate()
            .map(|(i, t)| (TripId(i as u32), t))
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}
