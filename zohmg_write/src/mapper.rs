//! Explodes fact events into cuboid cells
//!
//! For a projection of `n` dimensions an event lands in `2^n` cuboids: every combination of
//! keeping a dimension's concrete value or replacing it with the [`WILDCARD`]. A query for
//! "all countries" then reads a single pre-summed row instead of adding up every country.

use std::collections::BTreeMap;

use zohmg_schema::{
    Assignment, Projection, Schema, WILDCARD,
    row_key::{self, encode, unit_column},
};

use crate::FactEvent;

/// Identifies one summed cell of the cube
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub timestamp: String,
    pub projection: Projection,
    pub assignment: Assignment,
    pub unit: String,
}

impl CellKey {
    pub fn row_key(&self) -> Result<String, row_key::Error> {
        encode(&self.projection, &self.assignment, &self.timestamp)
    }

    pub fn column(&self) -> String {
        unit_column(&self.unit)
    }
}

/// A single contribution of an event to a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuboidCell {
    pub key: CellKey,
    pub value: i64,
}

/// Every cell `event` contributes to, across all projections and units of `schema`
pub fn explode(schema: &Schema, event: &FactEvent) -> Vec<CuboidCell> {
    let units: Vec<(&str, i64)> = event
        .measurements
        .iter()
        .filter(|(unit, _)| schema.has_unit(unit))
        .map(|(unit, value)| (unit.as_str(), *value))
        .collect();
    if units.is_empty() {
        return vec![];
    }

    let mut cells = vec![];
    for projection in schema.projections() {
        for assignment in cuboids(projection, &event.dimensions) {
            for (unit, value) in &units {
                cells.push(CuboidCell {
                    key: CellKey {
                        timestamp: event.timestamp.clone(),
                        projection: projection.clone(),
                        assignment: assignment.clone(),
                        unit: unit.to_string(),
                    },
                    value: *value,
                });
            }
        }
    }
    cells
}

/// The assignments of `projection` an event with dimension `values` falls into
///
/// Bit `i` of the mask keeps the concrete value of the projection's `i`th dimension. A
/// dimension the event does not carry (or carries as the wildcard itself) only takes the
/// wildcard branch.
pub fn cuboids(projection: &Projection, values: &BTreeMap<String, String>) -> Vec<Assignment> {
    let concrete: Vec<Option<&String>> = projection
        .dimensions()
        .map(|d| values.get(d).filter(|v| v.as_str() != WILDCARD))
        .collect();
    let missing_mask = concrete
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_none())
        .fold(0u32, |mask, (i, _)| mask | (1 << i));

    (0u32..1 << projection.len())
        .filter(|mask| mask & missing_mask == 0)
        .map(|mask| {
            projection
                .dimensions()
                .zip(&concrete)
                .enumerate()
                .map(|(i, (dimension, value))| {
                    let value = match value {
                        Some(v) if mask & (1 << i) != 0 => (*v).clone(),
                        _ => WILDCARD.to_string(),
                    };
                    (dimension.to_string(), value)
                })
                .collect()
        })
        .collect()
}
