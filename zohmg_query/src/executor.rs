//! Runs a [`QueryPlan`] against a store and merges the scanned rows into a time series

use std::collections::BTreeMap;

use tracing::debug;
use zohmg_schema::row_key::{DecodedKey, decode, encode};
use zohmg_store::{Row, RowStore, Scanner};

use crate::{BaseScan, Query, QueryPlan, Result};

/// Sums per timestamp and base value
///
/// Built by folding rows into it, each step consuming the accumulator and returning the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult(BTreeMap<String, BTreeMap<String, i64>>);

impl QueryResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, timestamp: &str, base_value: &str, value: i64) -> Self {
        let sum = self
            .0
            .entry(timestamp.to_string())
            .or_default()
            .entry(base_value.to_string())
            .or_default();
        *sum = sum.wrapping_add(value);
        self
    }

    pub fn merge(self, other: Self) -> Self {
        other
            .0
            .into_iter()
            .flat_map(|(timestamp, values)| {
                values
                    .into_iter()
                    .map(move |(base_value, value)| (timestamp.clone(), base_value, value))
            })
            .fold(self, |acc, (timestamp, base_value, value)| {
                acc.add(&timestamp, &base_value, value)
            })
    }

    /// Drop zero sums and the timestamps left without any
    pub fn without_zeros(mut self) -> Self {
        for values in self.0.values_mut() {
            values.retain(|_, value| *value != 0);
        }
        self.0.retain(|_, values| !values.is_empty());
        self
    }

    pub fn get(&self, timestamp: &str, base_value: &str) -> Option<i64> {
        self.0.get(timestamp)?.get(base_value).copied()
    }

    /// Number of timestamp buckets
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Buckets in timestamp order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, i64>)> + '_ {
        self.0.iter().map(|(ts, values)| (ts.as_str(), values))
    }
}

/// Scans the ranges of a plan one base value after the other and merges the rows
#[derive(Debug)]
pub struct ScanMergeExecutor<'a, S: RowStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RowStore + ?Sized> ScanMergeExecutor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Any error aborts the whole query, no partial result is returned
    pub fn execute(&self, query: &Query, plan: &QueryPlan) -> Result<QueryResult> {
        let result = plan
            .scans
            .iter()
            .try_fold(QueryResult::new(), |acc, scan| {
                self.scan(acc, query, plan, scan)
            })?;
        Ok(result.without_zeros())
    }

    fn scan(
        &self,
        acc: QueryResult,
        query: &Query,
        plan: &QueryPlan,
        scan: &BaseScan,
    ) -> Result<QueryResult> {
        let mut scanner = Scanner::open(
            self.store,
            &plan.table,
            std::slice::from_ref(&plan.column),
            &scan.range.start,
            &scan.range.stop,
        )?;
        debug!(
            scanner = %scanner.id(),
            base_value = %scan.base_value,
            start = %scan.range.start,
            stop = %scan.range.stop,
            widened = scan.range.widened,
            "scanning"
        );

        scanner.try_fold(acc, |acc, row| {
            accumulate(acc, query, plan, &scan.base_value, &row?)
        })
    }
}

fn accumulate(
    acc: QueryResult,
    query: &Query,
    plan: &QueryPlan,
    base_value: &str,
    row: &Row,
) -> Result<QueryResult> {
    let DecodedKey {
        timestamp,
        mut assignment,
    } = decode(&row.key)?;

    // rows of other projections can share a widened prefix
    if encode(&plan.projection, &assignment, &timestamp).as_deref() != Ok(row.key.as_str()) {
        return Ok(acc);
    }
    if assignment.remove(&query.base_dimension).as_deref() != Some(base_value) {
        return Ok(acc);
    }
    if !assignment
        .iter()
        .all(|(dimension, value)| query.filters.matches(dimension, value))
    {
        return Ok(acc);
    }
    if !query.covers_timestamp(&timestamp) {
        return Ok(acc);
    }

    Ok(match row.cell(&plan.column) {
        Some(value) => acc.add(&timestamp, base_value, value),
        None => acc,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use zohmg_schema::{Schema, row_key};
    use zohmg_store::MemStore;

    use super::*;
    use crate::{Error, plan};

    const TABLE: &str = "pageviews";

    fn schema() -> Schema {
        Schema::from_json_str(
            r#"{
                "dataset": "pageviews",
                "dimensions": ["country", "device"],
                "units": ["hits"],
                "projections": [["country"], ["country", "device"]]
            }"#,
        )
        .unwrap()
    }

    fn run(store: &MemStore, query: &str) -> Result<QueryResult> {
        let schema = schema();
        let query = Query::from_query_string(query, &schema)?;
        let plan = plan(&schema, &query)?;
        ScanMergeExecutor::new(store).execute(&query, &plan)
    }

    fn put(store: &MemStore, key: &str, value: i64) {
        store.put_cell(TABLE, key, "unit:hits", value).unwrap();
    }

    #[test]
    fn fold_into_result() {
        let result = QueryResult::new()
            .add("20090601", "SE", 2)
            .add("20090601", "SE", 3)
            .add("20090602", "DE", 1);
        assert_eq!(result.get("20090601", "SE"), Some(5));
        assert_eq!(result.len(), 2);

        let merged = QueryResult::new()
            .add("20090602", "DE", -1)
            .merge(result)
            .without_zeros();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("20090602", "DE"), None);
    }

    #[test]
    fn sums_within_time_range() {
        let store = MemStore::new();
        put(&store, "country-SE-20090531", 100);
        put(&store, "country-SE-20090601", 1);
        put(&store, "country-SE-20090615", 2);
        put(&store, "country-SE-20090631", 3);
        put(&store, "country-SE-20090701", 100);
        put(&store, "country-DE-20090615", 100);

        let result = run(&store, "t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE").unwrap();
        let buckets: Vec<(&str, i64)> = result
            .iter()
            .map(|(ts, values)| (ts, values["SE"]))
            .collect();
        assert_eq!(
            buckets,
            vec![("20090601", 1), ("20090615", 2), ("20090631", 3)]
        );
        assert_eq!(store.open_scanners(), 0);
    }

    #[test]
    fn widened_scan_filters_rows() {
        let store = MemStore::new();
        for (key, value) in [
            ("country-SE-device-all-20090615", 10),
            ("country-SE-device-mobile-20090615", 4),
            ("country-SE-device-tablet-20090615", 5),
            ("country-SE-device-desktop-20090615", 1),
            ("country-SE-device-mobile-20090715", 7),
            ("country-DE-device-mobile-20090615", 100),
        ] {
            put(&store, key, value);
        }

        let result = run(
            &store,
            "t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d1=device&d1v=mobile,tablet",
        )
        .unwrap();
        assert_eq!(result, QueryResult::new().add("20090615", "SE", 9));
    }

    #[test]
    fn malformed_key_aborts_the_query() {
        let store = MemStore::new();
        put(&store, "country-SE-20090601", 1);
        put(&store, "country-SE-device-20090602", 1);

        // the multi-valued device filter widens the scan over the corrupt row
        let err = run(
            &store,
            "t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d1=device&d1v=a,b",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::RowKey(row_key::Error::MalformedKey { .. })
        ));
        assert_eq!(store.open_scanners(), 0);
    }

    #[test]
    fn zero_buckets_are_dropped() {
        let store = MemStore::new();
        put(&store, "country-SE-20090601", 0);
        put(&store, "country-SE-20090602", 4);
        let result = run(&store, "t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE").unwrap();
        assert_eq!(result, QueryResult::new().add("20090602", "SE", 4));
    }
}
