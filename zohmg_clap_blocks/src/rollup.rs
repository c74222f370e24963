//! Rollup job configs.

use std::num::NonZeroUsize;

use zohmg_store::RowStore;
use zohmg_write::{DEFAULT_BATCH_SIZE, Rollup, WriteMode};

/// CLI config for the rollup job
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::Parser)]
pub struct RollupConfig {
    /// Number of events mapped and combined together before their partial sums are reduced.
    ///
    /// Larger batches combine more cells in memory and write fewer partial sums.
    #[clap(
        long = "batch-size",
        env = "ZOHMG_BATCH_SIZE",
        default_value_t = DEFAULT_BATCH_SIZE,
        action
    )]
    pub batch_size: NonZeroUsize,

    /// How reduced sums are written to the store.
    ///
    /// `put` replaces stored values, so importing the same events twice is harmless.
    /// `increment` adds to stored values, for importing new events into an existing cube.
    #[clap(
        long = "write-mode",
        env = "ZOHMG_WRITE_MODE",
        default_value_t = WriteMode::Put,
        action
    )]
    pub write_mode: WriteMode,
}

impl RollupConfig {
    /// Apply this config to a rollup job
    pub fn configure<'a, S: RowStore + ?Sized>(&self, rollup: Rollup<'a, S>) -> Rollup<'a, S> {
        rollup
            .with_batch_size(self.batch_size)
            .with_write_mode(self.write_mode)
    }
}
