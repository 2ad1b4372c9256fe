//! Domain error types.
//!
//! These errors represent validation failures of individual records
//! before they reach a store. They are distinct from store and query errors.

/// Domain-level errors for record validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Longitude outside [-180, 180] or latitude outside [-90, 90]
    #[error("invalid coordinate: longitude {longitude}, latitude {latitude}")]
    InvalidCoordinate { longitude: f64, latitude: f64 },

    /// Travel time does not fit the store's record layout
    #[error("travel time of {0} seconds exceeds the supported maximum")]
    TravelTimeTooLong(u64),

    /// Arrival before departure
    #[error("connection {0} arrives before it departs")]
    NegativeTravelTime(String),

    /// A global id must not be empty
    #[error("global id must not be empty")]
    EmptyGlobalId,
}
