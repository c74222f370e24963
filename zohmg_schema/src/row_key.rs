//! Row keys and columns of the aggregated cube rows
//!
//! A row key interleaves the dimension names and values of one cuboid, in the order of the
//! owning projection, and ends with the timestamp:
//!
//! ```text
//! country-SE-device-all-20090615
//! ```
//!
//! Timestamps are zero-padded decimal strings, so rows of one prefix sort by time. Each unit
//! lives in its own column, `unit:<name>`.

use std::collections::BTreeMap;

use crate::Projection;

pub const SEPARATOR: char = '-';

/// Appended to the upper bound of a scan; sorts after every timestamp digit
pub const STOP_SENTINEL: char = '~';

/// Column family that holds the measurement sums
pub const UNIT_FAMILY: &str = "unit";

/// One value (or the wildcard) per dimension of a projection
pub type Assignment = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("malformed row key '{key}': {reason}")]
    MalformedKey { key: String, reason: &'static str },

    #[error(
        "value '{value}' for dimension '{dimension}' is not a valid key value: \
         only printable ASCII without '-' and '~' is allowed"
    )]
    InvalidKeyValue { dimension: String, value: String },

    #[error("timestamp '{0}' contains the key separator '-'")]
    InvalidTimestamp(String),

    #[error("assignment has no value for projection dimension '{0}'")]
    MissingDimension(String),
}

/// A row key split back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    pub timestamp: String,
    pub assignment: Assignment,
}

/// Incrementally builds the leading part of a row key
///
/// Used on the write path to produce complete keys and on the query path to produce the
/// prefixes that bound a range scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `dimension-value-` pair
    pub fn push(&mut self, dimension: &str, value: &str) -> Result<(), Error> {
        if !is_valid_value(value) {
            return Err(Error::InvalidKeyValue {
                dimension: dimension.to_string(),
                value: value.to_string(),
            });
        }
        self.push_dimension(dimension);
        self.0.push_str(value);
        self.0.push(SEPARATOR);
        Ok(())
    }

    /// Append a bare `dimension-`, leaving its value open
    pub fn push_dimension(&mut self, dimension: &str) {
        self.0.push_str(dimension);
        self.0.push(SEPARATOR);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Complete the key with its timestamp
    pub fn finish(mut self, timestamp: &str) -> Result<String, Error> {
        if timestamp.contains(SEPARATOR) {
            return Err(Error::InvalidTimestamp(timestamp.to_string()));
        }
        self.0.push_str(timestamp);
        Ok(self.0)
    }

    /// Inclusive lower bound for the rows of this prefix from `t0` on
    pub fn range_start(&self, t0: &str) -> String {
        format!("{}{t0}", self.0)
    }

    /// Exclusive upper bound that still includes every row stamped `t1`
    pub fn range_stop(&self, t1: &str) -> String {
        format!("{}{t1}{STOP_SENTINEL}", self.0)
    }

    /// Exclusive upper bound covering every row that starts with this prefix
    pub fn prefix_stop(&self) -> String {
        format!("{}{STOP_SENTINEL}", self.0)
    }
}

/// Encode one cuboid of `projection` into its row key
pub fn encode(
    projection: &Projection,
    assignment: &Assignment,
    timestamp: &str,
) -> Result<String, Error> {
    let mut key = KeyPrefix::new();
    for dimension in projection.dimensions() {
        let value = assignment
            .get(dimension)
            .ok_or_else(|| Error::MissingDimension(dimension.to_string()))?;
        key.push(dimension, value)?;
    }
    key.finish(timestamp)
}

/// Split a row key into its timestamp and dimension assignment
pub fn decode(key: &str) -> Result<DecodedKey, Error> {
    let malformed = |reason| Error::MalformedKey {
        key: key.to_string(),
        reason,
    };

    let mut tokens: Vec<&str> = key.split(SEPARATOR).collect();
    let timestamp = tokens
        .pop()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("missing timestamp"))?;
    if tokens.len() % 2 != 0 {
        return Err(malformed("odd number of dimension/value tokens"));
    }

    let assignment: Assignment = tokens
        .chunks_exact(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect();
    if assignment.len() * 2 != tokens.len() {
        return Err(malformed("repeated dimension"));
    }

    Ok(DecodedKey {
        timestamp: timestamp.to_string(),
        assignment,
    })
}

/// The column holding the sums of `unit`
pub fn unit_column(unit: &str) -> String {
    format!("{UNIT_FAMILY}:{unit}")
}

/// The unit name of a `unit:<name>` column
pub fn unit_of_column(column: &str) -> Option<&str> {
    column
        .strip_prefix(UNIT_FAMILY)
        .and_then(|rest| rest.strip_prefix(':'))
}

/// Timestamps are decimal, at least `YYYYMMDD`
/// Can `value` stand in a row key?
///
/// Values must be printable ASCII that sorts below [`STOP_SENTINEL`], or a range stopping at
/// the sentinel would miss them. The [`SEPARATOR`] is excluded as well.
pub fn is_valid_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| (b' '..STOP_SENTINEL as u8).contains(&b) && b != SEPARATOR as u8)
}

pub fn is_valid_timestamp(timestamp: &str) -> bool {
    timestamp.len() >= 8 && timestamp.bytes().all(|b| b.is_ascii_digit())
}
