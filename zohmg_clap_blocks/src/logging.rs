//! Logging related configs.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt::writer::BoxMakeWriter};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install the global tracing subscriber: {0}")]
    Install(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Log message format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable, single line.
    #[default]
    Full,

    /// Human-readable, multi line.
    Pretty,

    /// Machine-parseable, one JSON object per line.
    Json,
}

/// Where log messages go.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogDestination {
    #[default]
    Stdout,
    Stderr,
}

/// CLI config for logging.
#[derive(Debug, Clone, Default, clap::Parser)]
pub struct LoggingConfig {
    /// Logs: filter directive
    ///
    /// Configures log severity level filter, by target.
    ///
    /// Simplest options: error, warn, info, debug, trace
    ///
    /// Levels for different modules can be specified. For example
    /// `debug,zohmg_store=info` specifies debug logging for all modules
    /// except for the store, which will only display info level logging.
    ///
    /// Overridden by `-v`.
    #[clap(long = "log-filter", env = "LOG_FILTER", action)]
    pub log_filter: Option<String>,

    /// Logs: filter short-hand
    ///
    /// Convenient way to set log severity level filter.
    /// Overrides `--log-filter`.
    ///
    /// -v   'info'
    ///
    /// -vv  'debug'
    ///
    /// -vvv 'trace'
    #[clap(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        verbatim_doc_comment
    )]
    pub log_verbose_count: u8,

    /// Logs: destination
    #[clap(
        value_enum,
        long = "log-destination",
        env = "LOG_DESTINATION",
        default_value = "stdout",
        action
    )]
    pub log_destination: LogDestination,

    /// Logs: message format
    #[clap(
        value_enum,
        long = "log-format",
        env = "LOG_FORMAT",
        default_value = "full",
        action
    )]
    pub log_format: LogFormat,
}

impl LoggingConfig {
    pub const DEFAULT_LOG_FILTER: &'static str = "info";

    /// The filter directive in effect, `-v` wins over `--log-filter`
    pub fn filter_directive(&self) -> &str {
        match self.log_verbose_count {
            0 => self
                .log_filter
                .as_deref()
                .unwrap_or(Self::DEFAULT_LOG_FILTER),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn install_global_subscriber(&self) -> Result<(), Error> {
        let filter = EnvFilter::try_new(self.filter_directive())?;
        let writer = match self.log_destination {
            LogDestination::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogDestination::Stderr => BoxMakeWriter::new(std::io::stderr),
        };
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer);
        match self.log_format {
            LogFormat::Full => builder.try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Json => builder.json().try_init(),
        }
        .map_err(Error::Install)
    }
}
