//! Stop store with a spatial index.
//!
//! Stops are kept in an arena addressed by `StopId`. An R-tree over their
//! coordinates answers "which stops lie within `r` metres of here", which
//! the walking transfer generator and first/last-mile expansion rely on.
//!
//! Range queries filter in two stages: a degree-space bounding box in the
//! tree, then exact haversine distances on the survivors.

use std::collections::HashMap;
use std::fmt;

use geo::{HaversineDistance, Point};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::domain::{Stop, StopId};

use super::error::{RecordKind, StoreError};

/// Metres per degree of latitude (and of longitude at the equator).
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Spatial lookup of stops.
pub trait StopsIndex {
    /// Returns the stops within `radius_m` metres of `center`, nearest first,
    /// with their distances in metres.
    fn stops_within(&self, center: Point, radius_m: f64) -> Vec<(StopId, f64)>;

    /// Returns the stop with the given id.
    fn stop(&self, id: StopId) -> Option<&Stop>;
}

#[derive(Debug, Clone, PartialEq)]
struct StopNode {
    id: StopId,
    point: [f64; 2],
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Add-or-update store of stops.
#[derive(Clone, Default)]
pub struct StopsDb {
    stops: Vec<Stop>,
    global_ids: HashMap<String, StopId>,
    tree: RTree<StopNode>,
}

impl fmt::Debug for StopsDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopsDb")
            .field("stops", &self.stops.len())
            .finish_non_exhaustive()
    }
}

impl StopsDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stop, or replaces the stored one with the same global id.
    pub fn add_or_update(&mut self, stop: Stop) -> StopId {
        let point = [stop.longitude, stop.latitude];
        if let Some(&id) = self.global_ids.get(&stop.global_id) {
            let old = &self.stops[id.index()];
            let old_point = [old.longitude, old.latitude];
            if old_point != point {
                self.tree.remove(&StopNode {
                    id,
                    point: old_point,
                });
                self.tree.insert(StopNode { id, point });
            }
            self.stops[id.index()] = stop;
            return id;
        }

        let id = StopId(self.stops.len() as u32);
        self.global_ids.insert(stop.global_id.clone(), id);
        self.stops.push(stop);
        self.tree.insert(StopNode { id, point });
        id
    }

    pub fn get(&self, id: StopId) -> Option<&Stop> {
        self.stops.get(id.index())
    }

    /// Returns the stop with the given global id, if stored.
    pub fn get_by_global_id(&self, global_id: &str) -> Option<(StopId, &Stop)> {
        let id = *self.global_ids.get(global_id)?;
        self.get(id).map(|stop| (id, stop))
    }

    /// Like [`get_by_global_id`](Self::get_by_global_id) but surfaces absence as an error.
    pub fn try_get_by_global_id(&self, global_id: &str) -> Result<(StopId, &Stop), StoreError> {
        self.get_by_global_id(global_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: RecordKind::Stop,
                global_id: global_id.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (StopId, &Stop)> {
        self.stops
            .iter()
            .enumerate()
            .map(|(i, s)| (StopId(i as u32), s))
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

impl StopsIndex for StopsDb {
    fn stops_within(&self, center: Point, radius_m: f64) -> Vec<(StopId, f64)> {
        if radius_m < 0.0 || !radius_m.is_finite() {
            return Vec::new();
        }
        let lat_span = radius_m / METRES_PER_DEGREE;
        // Longitude degrees shrink towards the poles; clamp to avoid blowing up.
        let cos_lat = center.y().to_radians().cos().max(0.01);
        let lon_span = lat_span / cos_lat;
        let envelope = AABB::from_corners(
            [center.x() - lon_span, center.y() - lat_span],
            [center.x() + lon_span, center.y() + lat_span],
        );

        let mut found: Vec<(StopId, f64)> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter_map(|node| {
                let distance = center.haversine_distance(&Point::new(node.point[0], node.point[1]));
                (distance <= radius_m).then_some((node.id, distance))
            })
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found
    }

    fn stop(&self, id: StopId) -> Option<&Stop> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brussels() -> StopsDb {
        let mut db = StopsDb::new();
        db.add_or_update(Stop::new("central", 4.3571, 50.8455).unwrap());
        db.add_or_update(Stop::new("midi", 4.3360, 50.8355).unwrap());
        db.add_or_update(Stop::new("nord", 4.3602, 50.8604).unwrap());
        db.add_or_update(Stop::new("ghent", 3.7106, 51.0359).unwrap());
        db
    }

    #[test]
    fn add_or_update_keeps_ids_stable() {
        let mut db = brussels();
        let (id, _) = db.get_by_global_id("midi").unwrap();
        let moved = Stop::new("midi", 4.3365, 50.8360)
            .unwrap()
            .with_attribute("name", "Bruxelles-Midi");
        assert_eq!(db.add_or_update(moved), id);
        assert_eq!(db.len(), 4);
        assert_eq!(db.get(id).unwrap().attributes["name"], "Bruxelles-Midi");
        assert_eq!(db.tree.size(), 4);
    }

    #[test]
    fn missing_stop_is_not_found() {
        let db = brussels();
        assert!(matches!(
            db.try_get_by_global_id("antwerp"),
            Err(StoreError::NotFound {
                kind: RecordKind::Stop,
                ..
            })
        ));
    }

    #[test]
    fn stops_within_radius_sorted_by_distance() {
        let db = brussels();
        let central = db.get(StopId(0)).unwrap().point();

        let near = db.stops_within(central, 2_000.0);
        let ids: Vec<StopId> = near.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![StopId(0), StopId(2), StopId(1)]);
        assert_eq!(near[0].1, 0.0);
        assert!(near.windows(2).all(|w| w[0].1 <= w[1].1));

        assert_eq!(db.stops_within(central, 100.0).len(), 1);
        assert_eq!(db.stops_within(central, 60_000.0).len(), 4);
    }

    #[test]
    fn moved_stop_is_found_at_new_location() {
        let mut db = brussels();
        db.add_or_update(Stop::new("ghent", 4.3580, 50.8460).unwrap());
        let central = db.get(StopId(0)).unwrap().point();
        let near: Vec<StopId> = db
            .stops_within(central, 500.0)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(near, vec![StopId(0), StopId(3)]);
    }
}
