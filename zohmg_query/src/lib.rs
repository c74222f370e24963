//! The read path of the cube.
//!
//! A query names a base dimension and its values, a unit, a time range and optional filters
//! ([`params`]). The [`planner`] picks the smallest projection that can answer it and builds
//! one key range per base value, and the [`executor`] scans those ranges and merges the rows
//! into a time series. [`QueryService`] ties the steps together behind a raw query string.

pub mod error;
pub mod executor;
pub mod params;
pub mod planner;
pub mod response;
pub mod service;

pub use error::{Error, Result};
pub use executor::{QueryResult, ScanMergeExecutor};
pub use params::{Filters, Query, QueryParams};
pub use planner::{
    BaseScan, QueryPlan, ScanRange, build_scan_range, find_suitable_projection, plan,
};
pub use response::{ErrorResponse, render_error, render_result};
pub use service::{QueryService, Response};
