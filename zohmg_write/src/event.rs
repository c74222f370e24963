//! Fact events as they arrive on the write path, one JSON object per line:
//!
//! ```json
//! {"timestamp": "20090615", "dimensions": {"country": "SE"}, "measurements": {"hits": 3}}
//! ```

use std::{collections::BTreeMap, io::BufRead};

use serde::{Deserialize, Serialize};
use zohmg_schema::row_key::is_valid_timestamp;

use crate::{Error, Result};

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp '{0}': expected at least 8 decimal digits")]
    InvalidTimestamp(String),
}

/// One timestamped observation
///
/// Dimensions and units the schema does not declare are carried along and ignored by the
/// mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactEvent {
    pub timestamp: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default)]
    pub measurements: BTreeMap<String, i64>,
}

impl FactEvent {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            dimensions: BTreeMap::new(),
            measurements: BTreeMap::new(),
        }
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(name.into(), value.into());
        self
    }

    pub fn with_measurement(mut self, unit: impl Into<String>, value: i64) -> Self {
        self.measurements.insert(unit.into(), value);
        self
    }

    pub fn from_json_line(line: &str) -> Result<Self, EventError> {
        let event: Self = serde_json::from_str(line)?;
        if !is_valid_timestamp(&event.timestamp) {
            return Err(EventError::InvalidTimestamp(event.timestamp));
        }
        Ok(event)
    }
}

/// Parse JSON-lines events from `reader`, skipping blank lines
///
/// Errors carry the 1-based line number they occurred on.
pub fn read_events<R: BufRead>(reader: R) -> impl Iterator<Item = Result<FactEvent>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Err(e) => Some(Err(Error::Read(e))),
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(
                FactEvent::from_json_line(&line).map_err(|source| Error::Event {
                    line: index + 1,
                    source,
                }),
            ),
        })
}
