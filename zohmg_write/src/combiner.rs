//! Summation of cuboid cells
//!
//! [`PartialSums`] is the combiner: it can run over any partition of the mapped cells, in any
//! order and any number of times, and merging the partials gives the same sums as one pass
//! over everything. [`reduce`] takes the final sums and turns them into row writes.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{CellKey, CuboidCell, Result};

/// Sums of cells sharing a [`CellKey`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialSums {
    sums: BTreeMap<CellKey, i64>,
}

impl PartialSums {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn combine(cells: impl IntoIterator<Item = CuboidCell>) -> Self {
        let mut sums = Self::new();
        for cell in cells {
            sums.add(cell);
        }
        sums
    }

    pub fn add(&mut self, cell: CuboidCell) {
        self.add_value(cell.key, cell.value);
    }

    // Wrapping addition stays associative and commutative on overflow.
    fn add_value(&mut self, key: CellKey, value: i64) {
        let sum = self.sums.entry(key).or_default();
        *sum = sum.wrapping_add(value);
    }

    pub fn merge(mut self, other: Self) -> Self {
        if self.sums.len() < other.sums.len() {
            return other.merge(self);
        }
        for (key, value) in other.sums {
            self.add_value(key, value);
        }
        self
    }

    pub fn get(&self, key: &CellKey) -> Option<i64> {
        self.sums.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, i64)> + '_ {
        self.sums.iter().map(|(k, v)| (k, *v))
    }
}

/// One cell to store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RowWrite {
    pub row_key: String,
    pub column: String,
    pub value: i64,
}

/// The output of [`reduce`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduced {
    /// Sorted by row key, then column
    pub writes: Vec<RowWrite>,
    /// Keys whose contributions summed to zero and are left out of the cube
    pub zero_sums_skipped: usize,
}

/// Merge partial sums and encode every non-zero sum as a row write
///
/// Every row key is encoded before anything is returned, so a key that cannot be encoded fails
/// the whole batch.
pub fn reduce(partials: impl IntoIterator<Item = PartialSums>) -> Result<Reduced> {
    let merged = partials
        .into_iter()
        .fold(PartialSums::new(), PartialSums::merge);

    let mut reduced = Reduced::default();
    for (key, value) in merged.sums {
        if value == 0 {
            reduced.zero_sums_skipped += 1;
            continue;
        }
        reduced.writes.push(RowWrite {
            row_key: key.row_key()?,
            column: key.column(),
            value,
        });
    }
    reduced.writes.sort();

    debug!(
        writes = reduced.writes.len(),
        zero_sums_skipped = reduced.zero_sums_skipped,
        "reduced partial sums"
    );
    Ok(reduced)
}
