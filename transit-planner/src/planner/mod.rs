//! Connection-scan journey planner.
//!
//! Three scans answer queries over a time-indexed connection store:
//!
//! - earliest arrival ([`EarliestArrivalScan`]): forward, one best journey per stop
//! - latest departure ([`LatestDepartureScan`]): backward, one best journey per stop
//! - profile ([`ProfileScan`]): backward, every Pareto-optimal journey
//!
//! [`Planner`] validates a [`JourneyRequest`] and runs the scans against one
//! snapshot. For profile queries it first builds an isochrone with each of
//! the single-criterion scans and hands them to the profile scan as an
//! [`IsochroneFilter`], so only connections that can lie on a journey in
//! the window are scanned.

mod config;
mod eas;
mod error;
mod filter;
mod las;
mod pcs;
mod profile;
mod query;
mod scan;

pub use config::PlannerConfig;
pub use eas::EarliestArrivalScan;
pub use error::PlanError;
pub use filter::{ConnectionFilter, FilterChain, IsochroneFilter};
pub use las::LatestDepartureScan;
pub use pcs::{ProfileResult, ProfileScan};
pub use profile::{JourneyFilter, MaxVehiclesFilter, Profile};
pub use query::{JourneyRequest, Planner};
pub use scan::{Isochrone, ScanResult, ScanState};
