//! The write path of the cube: fact events in, aggregated rows out.
//!
//! Every event is exploded into one cell per cuboid of every projection ([`mapper`]), cells
//! sharing a key are summed ([`combiner`]), and the non-zero sums are written to the store as
//! `unit:<name>` cells of their row keys ([`rollup`]).

pub mod combiner;
pub mod event;
pub mod mapper;
pub mod rollup;

pub use combiner::{PartialSums, Reduced, RowWrite, reduce};
pub use event::{FactEvent, read_events};
pub use mapper::{CellKey, CuboidCell, cuboids, explode};
pub use rollup::{DEFAULT_BATCH_SIZE, Rollup, RollupStats, WriteMode};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read events: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid event on line {line}: {source}")]
    Event {
        line: usize,
        #[source]
        source: event::EventError,
    },

    #[error("failed to build row key: {0}")]
    RowKey(#[from] zohmg_schema::row_key::Error),

    #[error("store write failed: {0}")]
    Store(#[from] zohmg_store::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
