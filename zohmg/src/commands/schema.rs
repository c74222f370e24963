//! Validate and describe a schema file.

use zohmg_clap_blocks::schema::SchemaConfig;
use zohmg_schema::Schema;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Schema(#[from] zohmg_schema::Error),

    #[error("failed to serialize schema: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    schema_config: SchemaConfig,

    /// Print the validated schema as JSON instead of a summary
    #[clap(long = "json", action)]
    json: bool,
}

pub(crate) fn command(config: Config) -> Result<()> {
    let schema = config.schema_config.load()?;
    if config.json {
        println!("{}", serde_json::to_string_pretty(&schema.to_definition())?);
    } else {
        print!("{}", summary(&schema));
    }
    Ok(())
}

fn summary(schema: &Schema) -> String {
    let mut out = format!("dataset: {}\n", schema.dataset());
    out.push_str(&format!(
        "dimensions: {}\n",
        schema.dimensions().collect::<Vec<_>>().join(", ")
    ));
    out.push_str(&format!(
        "units: {}\n",
        schema.units().collect::<Vec<_>>().join(", ")
    ));
    out.push_str("projections:\n");
    for projection in schema.projections() {
        out.push_str(&format!("  [{projection}]\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn summary_lists_everything() {
        let schema = Schema::from_json_str(
            r#"{
                "dataset": "pageviews",
                "dimensions": ["device", "country"],
                "units": ["hits", "bytes"],
                "projections": [["country"], ["country", "device"]]
            }"#,
        )
        .unwrap();

        assert_eq!(
            summary(&schema),
            "dataset: pageviews\n\
             dimensions: country, device\n\
             units: bytes, hits\n\
             projections:\n  \
             [country]\n  \
             [country,device]\n"
        );
    }
}
