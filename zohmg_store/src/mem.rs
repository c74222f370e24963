//! An in-memory, sorted [`RowStore`]
//!
//! Rows live in one `BTreeMap` per table so scans come back in key order. The whole store can
//! be written to and read back from a JSON snapshot file, which lets the command line tools
//! keep a cube between runs.

use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    path::Path,
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result, Row, RowStore, ScannerId};

type Cells = BTreeMap<String, i64>;
type Table = BTreeMap<String, Cells>;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Tables {
    tables: BTreeMap<String, Table>,
}

#[derive(Debug)]
struct ScanState {
    table: String,
    columns: Vec<String>,
    /// Lower bound of the rows not yet returned
    cursor: Bound<String>,
    stop_key: String,
    exhausted: bool,
}

#[derive(Debug, Default)]
struct Scanners {
    next_id: u64,
    open: HashMap<ScannerId, ScanState>,
}

#[derive(Debug, Default)]
pub struct MemStore {
    tables: RwLock<Tables>,
    scanners: Mutex<Scanners>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tables: Tables = serde_json::from_str(&contents)?;
        debug!(?path, tables = tables.tables.len(), "loaded store snapshot");
        Ok(Self {
            tables: RwLock::new(tables),
            scanners: Mutex::default(),
        })
    }

    /// Load the snapshot at `path`, or start empty if there is none yet
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_snapshot_file(path)
        } else {
            debug!(?path, "no store snapshot, starting empty");
            Ok(Self::new())
        }
    }

    pub fn snapshot_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string(&*self.tables.read())?;
        std::fs::write(path, contents).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of scanners opened and not yet closed
    pub fn open_scanners(&self) -> usize {
        self.scanners.lock().open.len()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .tables
            .get(table)
            .map(BTreeMap::len)
            .unwrap_or_default()
    }

    pub fn cell(&self, table: &str, row_key: &str, column: &str) -> Option<i64> {
        self.tables
            .read()
            .tables
            .get(table)
            .and_then(|t| t.get(row_key))
            .and_then(|cells| cells.get(column))
            .copied()
    }

    /// Every row of `table`, in key order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .tables
            .get(table)
            .map(|t| {
                t.iter()
                    .map(|(key, cells)| Row {
                        key: key.clone(),
                        cells: cells.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl RowStore for MemStore {
    fn open_scan(
        &self,
        table: &str,
        columns: &[String],
        start_key: &str,
        stop_key: &str,
    ) -> Result<ScannerId> {
        let mut scanners = self.scanners.lock();
        let id = ScannerId::new(scanners.next_id);
        scanners.next_id += 1;
        scanners.open.insert(
            id,
            ScanState {
                table: table.to_string(),
                columns: columns.to_vec(),
                cursor: Bound::Included(start_key.to_string()),
                stop_key: stop_key.to_string(),
                exhausted: start_key >= stop_key,
            },
        );
        debug!(scanner = %id, table, start_key, stop_key, "opened scanner");
        Ok(id)
    }

    fn next_row(&self, scanner: ScannerId) -> Result<Option<Row>> {
        let mut scanners = self.scanners.lock();
        let state = scanners
            .open
            .get_mut(&scanner)
            .ok_or(Error::ScannerNotFound(scanner))?;
        if state.exhausted {
            return Ok(None);
        }

        let tables = self.tables.read();
        let Some(table) = tables.tables.get(&state.table) else {
            state.exhausted = true;
            return Ok(None);
        };

        let range = (
            state.cursor.clone(),
            Bound::Excluded(state.stop_key.clone()),
        );
        let columns = &state.columns;
        let found = table.range::<String, _>(range).find_map(|(key, cells)| {
            let selected = select_columns(cells, columns);
            (!selected.is_empty()).then(|| Row {
                key: key.clone(),
                cells: selected,
            })
        });

        match found {
            Some(row) => {
                state.cursor = Bound::Excluded(row.key.clone());
                Ok(Some(row))
            }
            None => {
                state.exhausted = true;
                Ok(None)
            }
        }
    }

    fn close_scan(&self, scanner: ScannerId) -> Result<()> {
        self.scanners
            .lock()
            .open
            .remove(&scanner)
            .map(|_| debug!(scanner = %scanner, "closed scanner"))
            .ok_or(Error::ScannerNotFound(scanner))
    }

    fn put_cell(&self, table: &str, row_key: &str, column: &str, value: i64) -> Result<()> {
        self.tables
            .write()
            .tables
            .entry(table.to_string())
            .or_default()
            .entry(row_key.to_string())
            .or_default()
            .insert(column.to_string(), value);
        Ok(())
    }

    fn increment_cell(
        &self,
        table: &str,
        row_key: &str,
        column: &str,
        delta: i64,
    ) -> Result<i64> {
        let mut tables = self.tables.write();
        let rows = tables.tables.entry(table.to_string()).or_default();
        let cells = rows.entry(row_key.to_string()).or_default();
        let value = cells
            .get(column)
            .copied()
            .unwrap_or_default()
            .wrapping_add(delta);

        // the cube is sparse, a cell that sums to zero is not stored
        if value == 0 {
            cells.remove(column);
            if cells.is_empty() {
                rows.remove(row_key);
            }
        } else {
            cells.insert(column.to_string(), value);
        }
        Ok(value)
    }
}

fn select_columns(cells: &Cells, columns: &[String]) -> Cells {
    if columns.is_empty() {
        return cells.clone();
    }
    cells
        .iter()
        .filter(|(column, _)| columns.contains(column))
        .map(|(column, value)| (column.clone(), *value))
        .collect()
}
