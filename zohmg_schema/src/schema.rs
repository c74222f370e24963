use std::{
    collections::BTreeSet,
    fmt::Display,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use indexmap::IndexSet;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The value that stands in for "every value" of a dimension in a cuboid
pub const WILDCARD: &str = "all";

/// Upper bound on the number of dimensions in a single projection
///
/// Every event explodes into `2^n` cells per unit for a projection of `n` dimensions.
pub const MAX_PROJECTION_DIMENSIONS: usize = 16;

static DATASET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*[A-Za-z0-9]$").expect("dataset name regex is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid dataset name '{0}': must match [A-Za-z0-9][A-Za-z0-9_-]*[A-Za-z0-9]")]
    InvalidDatasetName(String),

    #[error("invalid dimension name '{0}': must be non-empty and alphanumeric")]
    InvalidDimensionName(String),

    #[error("invalid unit name '{0}': must be non-empty and alphanumeric")]
    InvalidUnitName(String),

    #[error("schema declares no dimensions")]
    NoDimensions,

    #[error("schema declares no units")]
    NoUnits,

    #[error("schema declares no projections")]
    NoProjections,

    #[error("projection must name at least one dimension")]
    EmptyProjection,

    #[error("projection [{}] names dimension '{}' more than once", projection, dimension)]
    RepeatedDimension {
        projection: String,
        dimension: String,
    },

    #[error(
        "projection [{}] has {} dimensions, the limit is {}",
        projection,
        count,
        MAX_PROJECTION_DIMENSIONS
    )]
    TooManyDimensions { projection: String, count: usize },

    #[error("projection [{}] references undeclared dimension '{}'", projection, dimension)]
    UndeclaredDimension {
        projection: String,
        dimension: String,
    },

    #[error("projection [{0}] is declared more than once")]
    DuplicateProjection(String),

    #[error("failed to read schema file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An ordered list of dimensions that is pre-aggregated as one cube
///
/// Order matters: it is the order in which dimensions appear in a row key, so the leftmost
/// dimension of a projection gives the cheapest prefix scans. Two projections holding the same
/// dimensions in a different order are different projections.
#[derive(Debug, Clone)]
pub struct Projection {
    dimensions: Arc<IndexSet<String>>,
}

impl Projection {
    /// Build a projection from its dimension names, in row key order
    ///
    /// Fails if the list is empty, repeats a dimension, or exceeds
    /// [`MAX_PROJECTION_DIMENSIONS`]. Whether the dimensions are declared is checked by
    /// [`Schema::new`].
    pub fn try_new<I, S>(dimensions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = dimensions.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::EmptyProjection);
        }
        let mut set = IndexSet::with_capacity(names.len());
        for name in &names {
            if !set.insert(name.clone()) {
                return Err(Error::RepeatedDimension {
                    projection: names.join(","),
                    dimension: name.clone(),
                });
            }
        }
        if set.len() > MAX_PROJECTION_DIMENSIONS {
            return Err(Error::TooManyDimensions {
                projection: names.join(","),
                count: set.len(),
            });
        }
        Ok(Self {
            dimensions: Arc::new(set),
        })
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> + '_ {
        self.dimensions.iter().map(String::as_str)
    }

    pub fn dimension_at(&self, index: usize) -> Option<&str> {
        self.dimensions.get_index(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn contains(&self, dimension: &str) -> bool {
        self.dimensions.contains(dimension)
    }

    /// The position of `dimension` within the row key, if the projection holds it
    pub fn position(&self, dimension: &str) -> Option<usize> {
        self.dimensions.get_index_of(dimension)
    }

    /// Does this projection hold every one of the `wanted` dimensions?
    pub fn covers<'a>(&self, wanted: impl IntoIterator<Item = &'a str>) -> bool {
        wanted.into_iter().all(|d| self.contains(d))
    }
}

// `IndexSet` equality ignores order, projections must not.
impl PartialEq for Projection {
    fn eq(&self, other: &Self) -> bool {
        self.dimensions.iter().eq(other.dimensions.iter())
    }
}

impl Eq for Projection {}

impl Hash for Projection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.dimensions.len());
        for d in self.dimensions.iter() {
            d.hash(state);
        }
    }
}

impl PartialOrd for Projection {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Projection {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dimensions.iter().cmp(other.dimensions.iter())
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dims = self.dimensions();
        if let Some(first) = dims.next() {
            write!(f, "{first}")?;
        }
        for d in dims {
            write!(f, ",{d}")?;
        }
        Ok(())
    }
}

/// The schema document as it is written on disk, before validation
///
/// ```json
/// {
///   "dataset": "pageviews",
///   "dimensions": ["country", "device"],
///   "units": ["hits"],
///   "projections": [["country"], ["country", "device"]]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub dataset: String,
    pub dimensions: Vec<String>,
    pub units: Vec<String>,
    pub projections: Vec<Vec<String>>,
}

/// A validated, immutable description of a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    dataset: Arc<str>,
    dimensions: BTreeSet<String>,
    units: BTreeSet<String>,
    projections: Vec<Projection>,
}

impl Schema {
    /// Validate a [`SchemaDefinition`]
    ///
    /// Validation stops at the first violation found.
    pub fn new(definition: SchemaDefinition) -> Result<Self> {
        let SchemaDefinition {
            dataset,
            dimensions,
            units,
            projections: projection_defs,
        } = definition;

        if !DATASET_NAME.is_match(&dataset) {
            return Err(Error::InvalidDatasetName(dataset));
        }

        if dimensions.is_empty() {
            return Err(Error::NoDimensions);
        }
        if let Some(bad) = dimensions.iter().find(|d| !is_valid_name(d)) {
            return Err(Error::InvalidDimensionName(bad.clone()));
        }
        let dimensions: BTreeSet<String> = dimensions.into_iter().collect();

        if units.is_empty() {
            return Err(Error::NoUnits);
        }
        if let Some(bad) = units.iter().find(|u| !is_valid_name(u)) {
            return Err(Error::InvalidUnitName(bad.clone()));
        }
        let units: BTreeSet<String> = units.into_iter().collect();

        if projection_defs.is_empty() {
            return Err(Error::NoProjections);
        }
        let mut projections: Vec<Projection> = Vec::with_capacity(projection_defs.len());
        for def in projection_defs {
            let projection = Projection::try_new(def)?;
            if let Some(undeclared) = projection.dimensions().find(|d| !dimensions.contains(*d)) {
                return Err(Error::UndeclaredDimension {
                    projection: projection.to_string(),
                    dimension: undeclared.to_string(),
                });
            }
            if projections.contains(&projection) {
                return Err(Error::DuplicateProjection(projection.to_string()));
            }
            projections.push(projection);
        }

        Ok(Self {
            dataset: dataset.into(),
            dimensions,
            units,
            projections,
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Self::new(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// The store table holding this dataset's cube rows
    pub fn table_name(&self) -> Arc<str> {
        Arc::clone(&self.dataset)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> + '_ {
        self.dimensions.iter().map(String::as_str)
    }

    pub fn units(&self) -> impl Iterator<Item = &str> + '_ {
        self.units.iter().map(String::as_str)
    }

    /// The projections in the order they were declared
    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    pub fn has_dimension(&self, dimension: &str) -> bool {
        self.dimensions.contains(dimension)
    }

    pub fn has_unit(&self, unit: &str) -> bool {
        self.units.contains(unit)
    }

    pub fn to_definition(&self) -> SchemaDefinition {
        SchemaDefinition {
            dataset: self.dataset.to_string(),
            dimensions: self.dimensions.iter().cloned().collect(),
            units: self.units.iter().cloned().collect(),
            projections: self
                .projections
                .iter()
                .map(|p| p.dimensions().map(str::to_string).collect())
                .collect(),
        }
    }
}

impl TryFrom<SchemaDefinition> for Schema {
    type Error = Error;

    fn try_from(definition: SchemaDefinition) -> Result<Self> {
        Self::new(definition)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric())
}
