//! Store configs.

use std::path::PathBuf;

use tracing::info;
use zohmg_store::MemStore;

/// CLI config for the cube store
#[derive(Debug, Clone, PartialEq, Eq, clap::Parser)]
pub struct StoreConfig {
    /// Path of the store snapshot file.
    ///
    /// The snapshot is created on the first import and updated by every import after it.
    #[clap(long = "store-path", env = "ZOHMG_STORE_PATH", action)]
    pub store_path: PathBuf,
}

impl StoreConfig {
    /// Open the store, empty if no snapshot exists yet
    pub fn open(&self) -> Result<MemStore, zohmg_store::Error> {
        MemStore::open_or_create(&self.store_path)
    }

    /// Write the store back to its snapshot file
    pub fn persist(&self, store: &MemStore) -> Result<(), zohmg_store::Error> {
        store.snapshot_to_file(&self.store_path)?;
        info!(path = ?self.store_path, "wrote store snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use zohmg_store::RowStore;

    use super::*;

    #[test]
    fn open_persist_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.json");
        let config =
            StoreConfig::try_parse_from(["my_binary", "--store-path", path.to_str().unwrap()])
                .unwrap();

        let store = config.open().unwrap();
        assert_eq!(store.row_count("pageviews"), 0);
        store
            .put_cell("pageviews", "20260101-country-DE", "unit:hits", 3)
            .unwrap();
        config.persist(&store).unwrap();

        let reopened = config.open().unwrap();
        assert_eq!(
            reopened.cell("pageviews", "20260101-country-DE", "unit:hits"),
            Some(3)
        );
    }

    #[test]
    fn corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.json");
        std::fs::write(&path, "not json").unwrap();
        let config = StoreConfig { store_path: path };
        assert!(matches!(
            config.open(),
            Err(zohmg_store::Error::Snapshot(_))
        ));
    }
}
