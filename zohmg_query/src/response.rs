//! Rendering of query results and errors
//!
//! A result is a compact JSON array with one single-key object per timestamp bucket:
//!
//! ```text
//! [{"20090601":{"DE":4,"SE":7}},{"20090602":{"SE":1}}]
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Error, QueryResult, Result};

/// The body sent back for a failed query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error_msg: String,
    pub status_code: u16,
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        Self {
            error_msg: error.to_string(),
            status_code: error.status_code().as_u16(),
        }
    }
}

pub fn render_result(result: &QueryResult, callback: Option<&str>) -> Result<String> {
    let buckets: Vec<BTreeMap<&str, &BTreeMap<String, i64>>> = result
        .iter()
        .map(|(timestamp, values)| BTreeMap::from([(timestamp, values)]))
        .collect();
    Ok(wrap(serde_json::to_string(&buckets)?, callback))
}

pub fn render_error(error: &Error, callback: Option<&str>) -> Result<String> {
    Ok(wrap(
        serde_json::to_string(&ErrorResponse::from(error))?,
        callback,
    ))
}

fn wrap(json: String, callback: Option<&str>) -> String {
    match callback {
        Some(callback) => format!("{callback}({json})"),
        None => json,
    }
}
