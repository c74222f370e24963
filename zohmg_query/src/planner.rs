//! Picks the projection that answers a query and the key ranges to scan in it

use std::sync::Arc;

use zohmg_schema::{
    Projection, Schema, WILDCARD,
    row_key::{KeyPrefix, unit_column},
};

use crate::{Error, Filters, Query, Result};

/// The cheapest projection holding `base_dimension` and every filter dimension
///
/// Fewer dimensions means fewer rows per prefix. Ties go to the projection with the base
/// dimension furthest left, then to the one declared first.
pub fn find_suitable_projection<'a>(
    projections: &'a [Projection],
    base_dimension: &str,
    filter_dimensions: &[&str],
) -> Option<&'a Projection> {
    projections
        .iter()
        .enumerate()
        .filter_map(|(index, projection)| {
            let base_position = projection.position(base_dimension)?;
            projection
                .covers(filter_dimensions.iter().copied())
                .then_some((projection.len(), base_position, index, projection))
        })
        .min_by_key(|&(len, base_position, index, _)| (len, base_position, index))
        .map(|(.., projection)| projection)
}

/// A `[start, stop)` range of row keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRange {
    pub start: String,
    pub stop: String,
    /// The range covers every timestamp of its prefix, because a multi-valued filter stopped
    /// the prefix short
    pub widened: bool,
}

/// The key range holding the rows of one base value
///
/// Every projection dimension is pinned in the prefix: the base dimension to `base_value`, a
/// filtered dimension to its only value, an unfiltered one to the wildcard. A dimension with
/// several filter values cannot be pinned, so the prefix ends at its name and the range spans
/// everything below it. Rows in such a range still need the executor's filtering.
pub fn build_scan_range(
    projection: &Projection,
    base_dimension: &str,
    base_value: &str,
    filters: &Filters,
    t0: &str,
    t1: &str,
) -> Result<ScanRange> {
    let mut prefix = KeyPrefix::new();
    for dimension in projection.dimensions() {
        if dimension == base_dimension {
            prefix.push(dimension, base_value)?;
            continue;
        }
        match filters.get(dimension) {
            None => prefix.push(dimension, WILDCARD)?,
            Some(values) if values.len() == 1 => {
                if let Some(value) = values.first() {
                    prefix.push(dimension, value)?;
                }
            }
            Some(_) => {
                prefix.push_dimension(dimension);
                return Ok(ScanRange {
                    start: prefix.as_str().to_string(),
                    stop: prefix.prefix_stop(),
                    widened: true,
                });
            }
        }
    }
    Ok(ScanRange {
        start: prefix.range_start(t0),
        stop: prefix.range_stop(t1),
        widened: false,
    })
}

/// The scan of one base value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseScan {
    pub base_value: String,
    pub range: ScanRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub table: Arc<str>,
    pub projection: Projection,
    /// The unit column the scans are restricted to
    pub column: String,
    /// One scan per base value, in base value order
    pub scans: Vec<BaseScan>,
}

pub fn plan(schema: &Schema, query: &Query) -> Result<QueryPlan> {
    let filter_dimensions: Vec<&str> = query.filters.dimensions().collect();
    let projection = find_suitable_projection(
        schema.projections(),
        &query.base_dimension,
        &filter_dimensions,
    )
    .ok_or_else(|| {
        Error::NoSuitableProjection(
            std::iter::once(query.base_dimension.as_str())
                .chain(filter_dimensions.iter().copied())
                .map(str::to_string)
                .collect(),
        )
    })?;

    let scans = query
        .base_values
        .iter()
        .map(|base_value| {
            Ok(BaseScan {
                base_value: base_value.clone(),
                range: build_scan_range(
                    projection,
                    &query.base_dimension,
                    base_value,
                    &query.filters,
                    &query.t0,
                    &query.t1,
                )?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryPlan {
        table: schema.table_name(),
        projection: projection.clone(),
        column: unit_column(&query.unit),
        scans,
    })
}
