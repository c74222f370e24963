//! The dataset schema and row-key layout shared by the zohmg write and query paths.
//!
//! A [`Schema`] is loaded once and never changes for the lifetime of a process. It names the
//! dimensions and units of a dataset and the [`Projection`]s that get pre-aggregated. The
//! [`row_key`] module defines how a single cuboid of a projection is laid out in the sorted
//! key-value store.

pub mod row_key;
pub mod schema;

pub use row_key::{Assignment, DecodedKey};
pub use schema::{
    Error, MAX_PROJECTION_DIMENSIONS, Projection, Result, Schema, SchemaDefinition, WILDCARD,
};
