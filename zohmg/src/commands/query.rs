//! Answer a query string from the cube.

use std::sync::Arc;

use tracing::debug;
use zohmg_clap_blocks::{schema::SchemaConfig, store::StoreConfig};
use zohmg_query::{QueryService, Response};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Schema(#[from] zohmg_schema::Error),

    #[error(transparent)]
    Store(#[from] zohmg_store::Error),

    #[error("query returned status {0}")]
    Status(u16),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    schema_config: SchemaConfig,

    #[clap(flatten)]
    store_config: StoreConfig,

    /// URL-style query string, for example
    /// `t0=20260101&t1=20260131&unit=hits&d0=country&d0v=DE,SE`
    #[clap(action)]
    query: String,
}

pub(crate) fn command(config: Config) -> Result<()> {
    let response = run(&config)?;
    println!("{}", response.body);
    if response.status.is_success() {
        Ok(())
    } else {
        Err(Error::Status(response.status.as_u16()))
    }
}

fn run(config: &Config) -> Result<Response> {
    debug!(?config, "query");
    let schema = config.schema_config.load()?;
    let store = config.store_config.open()?;
    let service = QueryService::new(Arc::new(schema), Arc::new(store));
    Ok(service.query(&config.query))
}
