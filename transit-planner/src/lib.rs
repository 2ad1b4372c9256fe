//! Public-transport journey planning with the Connection Scan Algorithm.
//!
//! Timetables are stored as time-indexed connections in a copy-on-write
//! [`store::TransitDb`]. Queries run against one immutable snapshot and
//! answer "earliest arrival", "latest departure" and "all Pareto-optimal
//! journeys" between stop sets over a time window.

pub mod domain;
pub mod journey;
pub mod planner;
pub mod store;
pub mod transfers;

#[cfg(test)]
mod testing;
