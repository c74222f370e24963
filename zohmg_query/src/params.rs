//! Query parameters and the validated [`Query`] built from them
//!
//! The parameters arrive as a URL query string:
//!
//! ```text
//! t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE,DE&d1=device&d1v=mobile&jsonp=cb
//! ```
//!
//! `d0` is the base dimension the result is broken down by, `d0v` its values. Up to four more
//! dimensions `d1..d4` can be filtered on with the value lists `d1v..d4v`.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

use regex::Regex;
use serde::Deserialize;
use zohmg_schema::{Schema, WILDCARD, row_key};

use crate::{Error, Result};

static CALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$")
        .expect("callback regex is valid")
});

/// Raw query parameters, as decoded from the query string
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryParams {
    pub t0: Option<String>,
    pub t1: Option<String>,
    pub unit: Option<String>,
    pub d0: Option<String>,
    pub d0v: Option<String>,
    pub d1: Option<String>,
    pub d1v: Option<String>,
    pub d2: Option<String>,
    pub d2v: Option<String>,
    pub d3: Option<String>,
    pub d3v: Option<String>,
    pub d4: Option<String>,
    pub d4v: Option<String>,
    pub jsonp: Option<String>,
}

impl QueryParams {
    pub fn from_query_string(query: &str) -> Result<Self> {
        serde_urlencoded::from_str(query).map_err(Into::into)
    }

    /// The JSONP callback to wrap the response in, if one was asked for
    pub fn callback(&self) -> Result<Option<&str>> {
        match self.jsonp.as_deref() {
            None | Some("") => Ok(None),
            Some(name) if CALLBACK.is_match(name) => Ok(Some(name)),
            Some(name) => Err(Error::InvalidCallback(name.to_string())),
        }
    }

    fn filter_params(&self) -> [(Option<&str>, Option<&str>); 4] {
        [
            (self.d1.as_deref(), self.d1v.as_deref()),
            (self.d2.as_deref(), self.d2v.as_deref()),
            (self.d3.as_deref(), self.d3v.as_deref()),
            (self.d4.as_deref(), self.d4v.as_deref()),
        ]
    }
}

/// The values each filtered dimension may take
///
/// A dimension without an entry is not filtered on. In the cube that means it must hold the
/// wildcard: a row holding a concrete value for it is a finer breakdown of a wildcard row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, BTreeSet<String>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `dimension` to `values`, an empty set is ignored
    pub fn insert(&mut self, dimension: impl Into<String>, values: BTreeSet<String>) {
        if !values.is_empty() {
            self.0.insert(dimension.into(), values);
        }
    }

    pub fn get(&self, dimension: &str) -> Option<&BTreeSet<String>> {
        self.0.get(dimension)
    }

    pub fn contains(&self, dimension: &str) -> bool {
        self.0.contains_key(dimension)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// May a row hold `value` for `dimension`?
    pub fn matches(&self, dimension: &str, value: &str) -> bool {
        match self.0.get(dimension) {
            Some(values) => values.contains(value),
            None => value == WILDCARD,
        }
    }
}

/// A validated query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub t0: String,
    pub t1: String,
    pub base_dimension: String,
    pub base_values: BTreeSet<String>,
    pub unit: String,
    pub filters: Filters,
}

impl Query {
    pub fn from_query_string(query: &str, schema: &Schema) -> Result<Self> {
        Self::from_params(&QueryParams::from_query_string(query)?, schema)
    }

    pub fn from_params(params: &QueryParams, schema: &Schema) -> Result<Self> {
        let mut missing = vec![];
        let t0 = required(&params.t0, "t0", &mut missing);
        let t1 = required(&params.t1, "t1", &mut missing);
        let d0 = required(&params.d0, "d0", &mut missing);
        // an empty d0v is a request for the wildcard row, so only absence counts
        let d0v = params.d0v.as_deref();
        if d0v.is_none() {
            missing.push("d0v");
        }
        let unit = required(&params.unit, "unit", &mut missing);
        let (Some(t0), Some(t1), Some(d0), Some(d0v), Some(unit)) = (t0, t1, d0, d0v, unit) else {
            return Err(Error::MissingArguments(missing));
        };

        for t in [t0, t1] {
            if !row_key::is_valid_timestamp(t) {
                return Err(Error::InvalidTimestamp(t.to_string()));
            }
        }
        if t0 > t1 && !t0.starts_with(t1) {
            return Err(Error::ReversedTimeRange {
                t0: t0.to_string(),
                t1: t1.to_string(),
            });
        }

        if !schema.has_dimension(d0) {
            return Err(Error::UnknownDimension(d0.to_string()));
        }
        if !schema.has_unit(unit) {
            return Err(Error::UnknownUnit(unit.to_string()));
        }
        let base_values = parse_values(d0, d0v)?
            .unwrap_or_else(|| BTreeSet::from([WILDCARD.to_string()]));

        let mut filters = Filters::new();
        let mut filtered = BTreeSet::new();
        for (index, (dimension, values)) in params.filter_params().into_iter().enumerate() {
            let dimension = dimension.filter(|d| !d.is_empty());
            let values = values.filter(|v| !v.is_empty());
            let dimension = match (dimension, values) {
                (None, None) => continue,
                (None, Some(_)) => return Err(Error::FilterValuesWithoutDimension(index + 1)),
                (Some(dimension), _) => dimension,
            };
            if !schema.has_dimension(dimension) {
                return Err(Error::UnknownDimension(dimension.to_string()));
            }
            if dimension == d0 {
                return Err(Error::FilterOnBaseDimension(dimension.to_string()));
            }
            if !filtered.insert(dimension) {
                return Err(Error::DuplicateFilter(dimension.to_string()));
            }
            if let Some(values) = values.map(|v| parse_values(dimension, v)).transpose()?.flatten() {
                filters.insert(dimension, values);
            }
        }

        Ok(Self {
            t0: t0.to_string(),
            t1: t1.to_string(),
            base_dimension: d0.to_string(),
            base_values,
            unit: unit.to_string(),
            filters,
        })
    }

    /// Is a row stamped `timestamp` inside `[t0, t1]`?
    ///
    /// A `t1` coarser than the row timestamps covers every finer timestamp it is a prefix of,
    /// so `t1=20090631` takes in `20090631235959`.
    pub fn covers_timestamp(&self, timestamp: &str) -> bool {
        timestamp >= self.t0.as_str()
            && (timestamp <= self.t1.as_str() || timestamp.starts_with(&self.t1))
    }
}

fn required<'a>(
    value: &'a Option<String>,
    name: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<&'a str> {
    let value = value.as_deref().filter(|v| !v.is_empty());
    if value.is_none() {
        missing.push(name);
    }
    value
}

/// Split a comma separated value list
///
/// `None` stands for "no restriction": an empty list, `*` or the wildcard itself.
fn parse_values(dimension: &str, raw: &str) -> Result<Option<BTreeSet<String>>> {
    let values: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    if matches!(values.as_slice(), [] | ["*"] | [WILDCARD]) {
        return Ok(None);
    }
    if let Some(bad) = values.iter().find(|v| !row_key::is_valid_value(v)) {
        return Err(Error::InvalidValue {
            dimension: dimension.to_string(),
            value: bad.to_string(),
        });
    }
    Ok(Some(values.into_iter().map(str::to_string).collect()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn schema() -> Schema {
        Schema::from_json_str(
            r#"{
                "dataset": "pageviews",
                "dimensions": ["country", "device", "browser"],
                "units": ["hits", "bytes"],
                "projections": [["country"], ["country", "device"]]
            }"#,
        )
        .unwrap()
    }

    fn values(v: &[&str]) -> BTreeSet<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn parse(query: &str) -> Result<Query> {
        Query::from_query_string(query, &schema())
    }

    #[test]
    fn parse_full_query() {
        let query = parse(
            "t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE,DE&d1=device&d1v=mobile,tablet",
        )
        .unwrap();
        let mut filters = Filters::new();
        filters.insert("device", values(&["mobile", "tablet"]));
        assert_eq!(
            query,
            Query {
                t0: "20090601".to_string(),
                t1: "20090631".to_string(),
                base_dimension: "country".to_string(),
                base_values: values(&["DE", "SE"]),
                unit: "hits".to_string(),
                filters,
            }
        );
    }

    #[test]
    fn empty_base_values_select_the_wildcard_row() {
        for d0v in ["", "*", "all", " , "] {
            let query =
                parse(&format!("t0=20090601&t1=20090631&unit=hits&d0=country&d0v={d0v}")).unwrap();
            assert_eq!(query.base_values, values(&["all"]), "{d0v:?}");
        }
    }

    #[test]
    fn wildcard_filters_are_no_filters() {
        for d1v in ["", "*", "all"] {
            let query = parse(&format!(
                "t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d1=device&d1v={d1v}"
            ))
            .unwrap();
            assert!(query.filters.is_empty(), "{d1v:?}");
        }
        let query =
            parse("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d1=device").unwrap();
        assert!(query.filters.is_empty());
    }

    #[test]
    fn missing_arguments_are_listed() {
        let err = parse("t0=20090601&d0=country&unit=").unwrap_err();
        assert_eq!(err.to_string(), "missing arguments: t1, d0v, unit");

        let err = parse("").unwrap_err();
        assert!(matches!(
            err,
            Error::MissingArguments(m) if m == vec!["t0", "t1", "d0", "d0v", "unit"]
        ));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let cases = [
            ("t0=2009-06-01&t1=20090631&unit=hits&d0=country&d0v=SE", "invalid timestamp '2009-06-01': expected at least 8 decimal digits"),
            ("t0=20090701&t1=20090631&unit=hits&d0=country&d0v=SE", "t0 '20090701' is after t1 '20090631'"),
            ("t0=20090601&t1=20090631&unit=clicks&d0=country&d0v=SE", "unknown unit 'clicks'"),
            ("t0=20090601&t1=20090631&unit=hits&d0=os&d0v=linux", "unknown dimension 'os'"),
            ("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d1=os&d1v=linux", "unknown dimension 'os'"),
            ("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d1=country&d1v=DE", "dimension 'country' is the base dimension and cannot also be filtered on"),
            ("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d1=device&d2=device", "dimension 'device' is filtered on more than once"),
            ("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d3v=mobile", "d3v is given without d3"),
            ("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=S-E", "invalid value 'S-E' for dimension 'country'"),
            ("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=%C3%96land", "invalid value 'Öland' for dimension 'country'"),
            ("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE&d1=device&d1v=mobile,~x", "invalid value '~x' for dimension 'device'"),
        ];
        for (query, message) in cases {
            let err = parse(query).unwrap_err();
            assert_eq!(err.to_string(), message, "{query}");
            assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn reversed_range_within_one_day_is_fine() {
        let query = parse("t0=20090615120000&t1=20090615&unit=hits&d0=country&d0v=SE").unwrap();
        assert!(query.covers_timestamp("20090615120000"));
        assert!(query.covers_timestamp("20090615235959"));
        assert!(!query.covers_timestamp("20090615"));
    }

    #[test]
    fn time_range_bounds() {
        let query = parse("t0=20090601&t1=20090631&unit=hits&d0=country&d0v=SE").unwrap();
        assert!(query.covers_timestamp("20090601"));
        assert!(query.covers_timestamp("20090631"));
        assert!(query.covers_timestamp("20090631235959"));
        assert!(!query.covers_timestamp("20090531"));
        assert!(!query.covers_timestamp("20090701"));
    }

    #[test]
    fn filter_matching() {
        let mut filters = Filters::new();
        filters.insert("device", values(&["mobile"]));
        filters.insert("browser", BTreeSet::new());
        assert_eq!(filters.len(), 1);
        assert!(filters.matches("device", "mobile"));
        assert!(!filters.matches("device", "all"));
        assert!(filters.matches("browser", "all"));
        assert!(!filters.matches("browser", "firefox"));
    }

    #[test]
    fn jsonp_callback() {
        let params = |jsonp: &str| QueryParams {
            jsonp: Some(jsonp.to_string()),
            ..Default::default()
        };
        assert_eq!(params("cb").callback().unwrap(), Some("cb"));
        assert_eq!(params("jQuery.cb_1").callback().unwrap(), Some("jQuery.cb_1"));
        assert_eq!(params("").callback().unwrap(), None);
        assert!(matches!(
            params("alert(1)").callback(),
            Err(Error::InvalidCallback(_))
        ));
        assert_eq!(QueryParams::default().callback().unwrap(), None);
    }
}
