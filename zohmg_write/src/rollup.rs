//! Drives events through the mapper, combiner and reducer and into the store

use std::{fmt::Display, num::NonZeroUsize, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use zohmg_schema::Schema;
use zohmg_store::RowStore;

use crate::{FactEvent, PartialSums, Result, explode, reduce};

/// Events mapped and combined together before their partial sums are handed on
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(10_000).unwrap();

/// How a reduced sum lands in the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Replace the stored value, so re-running a rollup over the same input is idempotent
    #[default]
    Put,
    /// Add to the stored value, for rolling up new input into an existing cube
    Increment,
}

#[derive(Debug, Error)]
#[error("unknown write mode '{0}', expected 'put' or 'increment'")]
pub struct UnknownWriteMode(String);

impl FromStr for WriteMode {
    type Err = UnknownWriteMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "put" => Ok(Self::Put),
            "increment" => Ok(Self::Increment),
            _ => Err(UnknownWriteMode(s.to_string())),
        }
    }
}

impl Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put => write!(f, "put"),
            Self::Increment => write!(f, "increment"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RollupStats {
    pub events: usize,
    pub cells: usize,
    pub rows_written: usize,
    pub zero_rows_skipped: usize,
}

/// A rollup job over one schema and store
///
/// Input is cut into batch units of `batch_size` events. Each unit is mapped and combined on
/// its own, the partial sums of all units are merged by the reducer, and only then is anything
/// written. Any error fails the job before the first write.
#[derive(Debug)]
pub struct Rollup<'a, S: RowStore + ?Sized> {
    schema: &'a Schema,
    store: &'a S,
    batch_size: NonZeroUsize,
    write_mode: WriteMode,
}

impl<'a, S: RowStore + ?Sized> Rollup<'a, S> {
    pub fn new(schema: &'a Schema, store: &'a S) -> Self {
        Self {
            schema,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            write_mode: WriteMode::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn run<I>(&self, events: I) -> Result<RollupStats>
    where
        I: IntoIterator<Item = Result<FactEvent>>,
    {
        let mut stats = RollupStats::default();
        let mut partials = vec![];
        let mut batch = Vec::with_capacity(self.batch_size.get());

        for event in events {
            batch.push(event?);
            if batch.len() == self.batch_size.get() {
                partials.push(self.combine_batch(&batch, &mut stats));
                batch.clear();
            }
        }
        if !batch.is_empty() {
            partials.push(self.combine_batch(&batch, &mut stats));
        }

        let reduced = reduce(partials)?;
        stats.zero_rows_skipped = reduced.zero_sums_skipped;

        let table = self.schema.table_name();
        for write in &reduced.writes {
            match self.write_mode {
                WriteMode::Put => {
                    self.store
                        .put_cell(&table, &write.row_key, &write.column, write.value)?;
                }
                WriteMode::Increment => {
                    self.store
                        .increment_cell(&table, &write.row_key, &write.column, write.value)?;
                }
            }
            stats.rows_written += 1;
        }

        info!(
            table = %table,
            write_mode = %self.write_mode,
            events = stats.events,
            cells = stats.cells,
            rows_written = stats.rows_written,
            zero_rows_skipped = stats.zero_rows_skipped,
            "rollup complete"
        );
        Ok(stats)
    }

    fn combine_batch(&self, batch: &[FactEvent], stats: &mut RollupStats) -> PartialSums {
        let mut sums = PartialSums::new();
        for event in batch {
            for cell in explode(self.schema, event) {
                stats.cells += 1;
                sums.add(cell);
            }
        }
        stats.events += batch.len();
        debug!(events = batch.len(), keys = sums.len(), "combined batch");
        sums
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use zohmg_schema::row_key;
    use zohmg_store::MemStore;

    use super::*;
    use crate::{Error, read_events};

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

    fn events() -> Vec<Result<FactEvent>> {
        vec![
            Ok(FactEvent::new("20090615")
                .with_dimension("country", "SE")
                .with_dimension("device", "mobile")
                .with_measurement("hits", 3)),
            Ok(FactEvent::new("20090615")
                .with_dimension("country", "SE")
                .with_dimension("device", "desktop")
                .with_measurement("hits", 2)),
        ]
    }

    #[test_log::test]
    fn rollup_into_store() {
        let schema = schema();
        let store = MemStore::new();
        let stats = Rollup::new(&schema, &store).run(events()).unwrap();

        assert_eq!(
            stats,
            RollupStats {
                events: 2,
                cells: 12,
                rows_written: 8,
                zero_rows_skipped: 0,
            }
        );
        assert_eq!(store.cell(TABLE, "country-all-20090615", "unit:hits"), Some(5));
        assert_eq!(
            store.cell(TABLE, "country-SE-device-mobile-20090615", "unit:hits"),
            Some(3)
        );
        assert_eq!(
            store.cell(TABLE, "country-all-device-all-20090615", "unit:hits"),
            Some(5)
        );
        assert_eq!(store.row_count(TABLE), 8);
    }

    #[test]
    fn batch_size_does_not_change_the_cube() {
        let schema = schema();
        let whole = MemStore::new();
        Rollup::new(&schema, &whole).run(events()).unwrap();

        let batched = MemStore::new();
        let stats = Rollup::new(&schema, &batched)
            .with_batch_size(NonZeroUsize::MIN)
            .run(events())
            .unwrap();
        assert_eq!(stats.events, 2);
        assert_eq!(whole.rows(TABLE), batched.rows(TABLE));
    }

    #[test]
    fn write_modes() {
        let schema = schema();

        let store = MemStore::new();
        let rollup = Rollup::new(&schema, &store);
        rollup.run(events()).unwrap();
        rollup.run(events()).unwrap();
        assert_eq!(store.cell(TABLE, "country-all-20090615", "unit:hits"), Some(5));

        let store = MemStore::new();
        let rollup = Rollup::new(&schema, &store).with_write_mode(WriteMode::Increment);
        rollup.run(events()).unwrap();
        rollup.run(events()).unwrap();
        assert_eq!(store.cell(TABLE, "country-all-20090615", "unit:hits"), Some(10));
    }

    #[test]
    fn zero_sums_leave_no_rows() {
        let schema = schema();
        let store = MemStore::new();
        let input = "\
{\"timestamp\": \"20090615\", \"dimensions\": {\"country\": \"SE\"}, \"measurements\": {\"hits\": 2}}
{\"timestamp\": \"20090615\", \"dimensions\": {\"country\": \"SE\"}, \"measurements\": {\"hits\": -2}}
";
        let stats = Rollup::new(&schema, &store)
            .run(read_events(input.as_bytes()))
            .unwrap();
        assert_eq!(stats.rows_written, 0);
        // both projections: country=SE and country=all, device only ever all
        assert_eq!(stats.zero_rows_skipped, 4);
        assert_eq!(store.row_count(TABLE), 0);
    }

    #[test]
    fn errors_fail_the_job_before_writing() {
        let schema = schema();
        let store = MemStore::new();

        let mut input = events();
        input.push(Ok(FactEvent::new("20090615")
            .with_dimension("country", "x-SE")
            .with_measurement("hits", 1)));
        let err = Rollup::new(&schema, &store).run(input).unwrap_err();
        assert!(matches!(
            err,
            Error::RowKey(row_key::Error::InvalidKeyValue { .. })
        ));
        assert_eq!(store.row_count(TABLE), 0);

        let input = "{\"timestamp\": \"20090615\"}\nnot json\n";
        let err = Rollup::new(&schema, &store)
            .run(read_events(input.as_bytes()))
            .unwrap_err();
        assert!(matches!(err, Error::Event { line: 2, .. }));
        assert_eq!(store.row_count(TABLE), 0);
    }

    #[test]
    fn write_mode_names() {
        assert_eq!("put".parse::<WriteMode>().unwrap(), WriteMode::Put);
        assert_eq!("Increment".parse::<WriteMode>().unwrap(), WriteMode::Increment);
        assert_eq!(WriteMode::Increment.to_string(), "increment");
        assert_eq!(
            "add".parse::<WriteMode>().unwrap_err().to_string(),
            "unknown write mode 'add', expected 'put' or 'increment'"
        );
    }
}
