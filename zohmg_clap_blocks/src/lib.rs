//! Building blocks for [`clap`]-driven configs.
//!
//! They can easily be re-used using `#[clap(flatten)]`.

pub mod logging;
pub mod rollup;
pub mod schema;
pub mod store;
