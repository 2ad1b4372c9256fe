//! Stop and trip records.

use std::collections::BTreeMap;

use geo::Point;

use super::DomainError;

/// Free-form key/value attributes (names, headsigns, ...).
pub type Attributes = BTreeMap<String, String>;

/// A location where vehicles call.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub global_id: String,
    pub longitude: f64,
    pub latitude: f64,
    pub attributes: Attributes,
}

impl Stop {
    /// Constructs a stop, validating its coordinate.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_planner::domain::Stop;
    ///
    /// let stop = Stop::new("stop0", 4.35, 50.85).unwrap();
    /// assert_eq!(stop.global_id, "stop0");
    /// assert!(Stop::new("bad", 190.0, 0.0).is_err());
    /// ```
    pub fn new(
        global_id: impl Into<String>,
        longitude: f64,
        latitude: f64,
    ) -> Result<Self, DomainError> {
        let global_id = global_id.into();
        if global_id.is_empty() {
            return Err(DomainError::EmptyGlobalId);
        }
        if !(-180.0..=180.0).contains(&longitude) || !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::InvalidCoordinate {
                longitude,
                latitude,
            });
        }
        Ok(Self {
            global_id,
            longitude,
            latitude,
            attributes: Attributes::new(),
        })
    }

    /// Returns the stop with an extra attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the location as a `geo` point (x = longitude, y = latitude).
    pub fn point(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }
}

/// A scheduled run of one vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub global_id: String,
    pub attributes: Attributes,
}

impl Trip {
    /// Constructs a trip.
    pub fn new(global_id: impl Into<String>) -> Result<Self, DomainError> {
        let global_id = global_id.into();
        if global_id.is_empty() {
            return Err(DomainError::EmptyGlobalId);
        }
        Ok(Self {
            global_id,
            attributes: Attributes::new(),
        })
    }

    /// Returns the trip with an extra attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
