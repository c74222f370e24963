use http::StatusCode;
use thiserror::Error;
use zohmg_schema::row_key;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid query string: {0}")]
    QueryString(#[from] serde_urlencoded::de::Error),

    #[error("missing arguments: {}", .0.join(", "))]
    MissingArguments(Vec<&'static str>),

    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("invalid timestamp '{0}': expected at least 8 decimal digits")]
    InvalidTimestamp(String),

    #[error("t0 '{t0}' is after t1 '{t1}'")]
    ReversedTimeRange { t0: String, t1: String },

    #[error("invalid value '{value}' for dimension '{dimension}'")]
    InvalidValue { dimension: String, value: String },

    #[error("dimension '{0}' is the base dimension and cannot also be filtered on")]
    FilterOnBaseDimension(String),

    #[error("dimension '{0}' is filtered on more than once")]
    DuplicateFilter(String),

    #[error("d{0}v is given without d{0}")]
    FilterValuesWithoutDimension(usize),

    #[error("invalid JSONP callback '{0}'")]
    InvalidCallback(String),

    #[error("no projection holds the dimensions [{}]", .0.join(", "))]
    NoSuitableProjection(Vec<String>),

    #[error("row key error: {0}")]
    RowKey(#[from] row_key::Error),

    #[error("store error: {0}")]
    Store(#[from] zohmg_store::Error),

    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// The HTTP status a client sees for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::QueryString(_)
            | Self::MissingArguments(_)
            | Self::UnknownDimension(_)
            | Self::UnknownUnit(_)
            | Self::InvalidTimestamp(_)
            | Self::ReversedTimeRange { .. }
            | Self::InvalidValue { .. }
            | Self::FilterOnBaseDimension(_)
            | Self::DuplicateFilter(_)
            | Self::FilterValuesWithoutDimension(_)
            | Self::InvalidCallback(_)
            | Self::NoSuitableProjection(_) => StatusCode::BAD_REQUEST,
            Self::RowKey(row_key::Error::MalformedKey { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RowKey(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
