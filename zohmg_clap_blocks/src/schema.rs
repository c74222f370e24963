//! Schema file configs.

use std::path::PathBuf;

use tracing::debug;
use zohmg_schema::Schema;

/// CLI config for locating the dataset schema
#[derive(Debug, Clone, PartialEq, Eq, clap::Parser)]
pub struct SchemaConfig {
    /// Path to the JSON schema of the dataset: its name, dimensions, units and projections.
    #[clap(long = "schema", env = "ZOHMG_SCHEMA", action)]
    pub schema_path: PathBuf,
}

impl SchemaConfig {
    /// Read and validate the schema file
    pub fn load(&self) -> Result<Schema, zohmg_schema::Error> {
        let schema = Schema::from_json_file(&self.schema_path)?;
        debug!(
            path = ?self.schema_path,
            dataset = schema.dataset(),
            projections = schema.projections().len(),
            "loaded schema"
        );
        Ok(schema)
    }
}
