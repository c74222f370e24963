//! Roll up fact events into the cube.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use tracing::debug;
use zohmg_clap_blocks::{rollup::RollupConfig, schema::SchemaConfig, store::StoreConfig};
use zohmg_schema::Schema;
use zohmg_store::MemStore;
use zohmg_write::{Rollup, RollupStats, read_events};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Schema(#[from] zohmg_schema::Error),

    #[error(transparent)]
    Store(#[from] zohmg_store::Error),

    #[error("rollup failed: {0}")]
    Rollup(#[from] zohmg_write::Error),

    #[error("error opening {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize rollup stats: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    schema_config: SchemaConfig,

    #[clap(flatten)]
    store_config: StoreConfig,

    #[clap(flatten)]
    rollup_config: RollupConfig,

    /// File of JSON-lines events to import, stdin if not given
    #[clap(short = 'f', long = "file", action)]
    file_path: Option<PathBuf>,
}

pub(crate) fn command(config: Config) -> Result<()> {
    let stats = run(&config)?;
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

fn run(config: &Config) -> Result<RollupStats> {
    debug!(?config, "import");
    let schema = config.schema_config.load()?;
    let store = config.store_config.open()?;

    let stats = match &config.file_path {
        Some(path) => {
            let file = File::open(path).map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?;
            import(&config.rollup_config, &schema, &store, BufReader::new(file))?
        }
        None => import(&config.rollup_config, &schema, &store, std::io::stdin().lock())?,
    };

    // a failed rollup leaves the snapshot untouched
    config.store_config.persist(&store)?;
    Ok(stats)
}

fn import<R: BufRead>(
    rollup_config: &RollupConfig,
    schema: &Schema,
    store: &MemStore,
    reader: R,
) -> Result<RollupStats> {
    let rollup = rollup_config.configure(Rollup::new(schema, store));
    Ok(rollup.run(read_events(reader))?)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    use super::*;

    const SCHEMA: &str = r#"{
        "dataset": "pageviews",
        "dimensions": ["country", "device"],
        "units": ["hits"],
        "projections": [["country"], ["country", "device"]]
    }"#;

    const EVENTS: &str = r#"
{"timestamp": "20260101", "dimensions": {"country": "SE", "device": "mobile"}, "measurements": {"hits": 2}}
{"timestamp": "20260101", "dimensions": {"country": "SE", "device": "desktop"}, "measurements": {"hits": 3}}
"#;

    fn config(dir: &Path, extra: &[&str]) -> Config {
        let schema = dir.join("schema.json");
        let events = dir.join("events.jsonl");
        std::fs::write(&schema, SCHEMA).unwrap();
        std::fs::write(&events, EVENTS).unwrap();

        let mut args = vec![
            "import".to_string(),
            "--schema".to_string(),
            schema.display().to_string(),
            "--store-path".to_string(),
            dir.join("cube.json").display().to_string(),
            "-f".to_string(),
            events.display().to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        Config::try_parse_from(args).unwrap()
    }

    #[test_log::test]
    fn import_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &[]);

        let stats = run(&config).unwrap();
        assert_eq!(stats.events, 2);

        let store = MemStore::from_snapshot_file(dir.path().join("cube.json")).unwrap();
        assert_eq!(
            store.cell("pageviews", "country-SE-20260101", "unit:hits"),
            Some(5)
        );
        assert_eq!(
            store.cell("pageviews", "country-SE-device-mobile-20260101", "unit:hits"),
            Some(2)
        );
    }

    #[test]
    fn write_mode_decides_reimport() {
        let dir = tempfile::tempdir().unwrap();

        let put = config(dir.path(), &[]);
        run(&put).unwrap();
        run(&put).unwrap();
        let store = MemStore::from_snapshot_file(dir.path().join("cube.json")).unwrap();
        assert_eq!(
            store.cell("pageviews", "country-all-device-all-20260101", "unit:hits"),
            Some(5)
        );

        let increment = config(dir.path(), &["--write-mode", "increment"]);
        run(&increment).unwrap();
        let store = MemStore::from_snapshot_file(dir.path().join("cube.json")).unwrap();
        assert_eq!(
            store.cell("pageviews", "country-all-device-all-20260101", "unit:hits"),
            Some(10)
        );
    }

    #[test]
    fn bad_event_leaves_no_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &[]);
        std::fs::write(
            config.file_path.as_ref().unwrap(),
            "{\"timestamp\": \"2026\", \"measurements\": {\"hits\": 1}}\n",
        )
        .unwrap();

        let error = run(&config).unwrap_err();
        assert!(
            matches!(error, Error::Rollup(zohmg_write::Error::Event { line: 1, .. })),
            "{error}"
        );
        assert!(!dir.path().join("cube.json").exists());
    }

    #[test]
    fn missing_events_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), &[]);
        config.file_path = Some(dir.path().join("missing.jsonl"));
        assert!(matches!(run(&config), Err(Error::Open { .. })));
    }
}
