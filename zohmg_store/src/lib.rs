//! The boundary between the cube engine and the sorted key-value store holding the cube
//!
//! The store is reached through a synchronous scan protocol: open a scanner over a key range,
//! pull rows one at a time until the end of the scan, close the scanner. [`RowStore`] captures
//! that protocol plus the two cell writes the rollup needs. [`Scanner`] wraps an open scanner so
//! it is closed on every exit path.

use std::{collections::BTreeMap, fmt::Display};

use tracing::warn;

pub mod mem;

pub use mem::MemStore;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("scanner {0} is not open")]
    ScannerNotFound(ScannerId),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to access store snapshot {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid store snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Identifies an open scanner on a [`RowStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScannerId(u64);

impl ScannerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for ScannerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row returned by a scan: its key and the requested cells that it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub cells: BTreeMap<String, i64>,
}

impl Row {
    pub fn cell(&self, column: &str) -> Option<i64> {
        self.cells.get(column).copied()
    }
}

/// A sorted key-value store reachable through a synchronous scan protocol
///
/// Implementations must return the rows of a scan in ascending key order, and must signal the
/// end of a scan with `Ok(None)` rather than an error.
pub trait RowStore: std::fmt::Debug + Send + Sync {
    /// Open a scan over `[start_key, stop_key)` of `table`
    ///
    /// Only rows holding at least one of `columns` are returned, and only those cells. An empty
    /// `columns` slice selects every column.
    fn open_scan(
        &self,
        table: &str,
        columns: &[String],
        start_key: &str,
        stop_key: &str,
    ) -> Result<ScannerId>;

    /// Advance an open scan, `None` marks the end of the scan
    fn next_row(&self, scanner: ScannerId) -> Result<Option<Row>>;

    /// Release the server side state of a scan
    fn close_scan(&self, scanner: ScannerId) -> Result<()>;

    /// Set a cell, replacing what was stored
    fn put_cell(&self, table: &str, row_key: &str, column: &str, value: i64) -> Result<()>;

    /// Add `delta` to a cell, treating a missing cell as zero, and return the new value
    fn increment_cell(&self, table: &str, row_key: &str, column: &str, delta: i64)
    -> Result<i64>;
}

/// An open scan that is closed when dropped
///
/// Iterating yields the rows of the scan. The first error ends the iteration.
pub struct Scanner<'a, S: RowStore + ?Sized> {
    store: &'a S,
    id: ScannerId,
    exhausted: bool,
    closed: bool,
}

impl<'a, S: RowStore + ?Sized> Scanner<'a, S> {
    pub fn open(
        store: &'a S,
        table: &str,
        columns: &[String],
        start_key: &str,
        stop_key: &str,
    ) -> Result<Self> {
        let id = store.open_scan(table, columns, start_key, stop_key)?;
        Ok(Self {
            store,
            id,
            exhausted: false,
            closed: false,
        })
    }

    pub fn id(&self) -> ScannerId {
        self.id
    }

    /// Close the scan now and report whether the store released it
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.store.close_scan(self.id)
    }
}

impl<S: RowStore + ?Sized> Iterator for Scanner<'_, S> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.store.next_row(self.id) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

impl<S: RowStore + ?Sized> Drop for Scanner<'_, S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(error) = self.store.close_scan(self.id) {
            warn!(scanner = %self.id, %error, "failed to close scanner");
        }
    }
}

impl<S: RowStore + ?Sized> std::fmt::Debug for Scanner<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("id", &self.id)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
