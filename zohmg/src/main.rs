//! Entrypoint of the zohmg binary

use dotenvy::dotenv;
use zohmg_clap_blocks::logging::LoggingConfig;

mod commands {
    pub(crate) mod import;
    pub(crate) mod query;
    pub(crate) mod schema;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "zohmg",
    version,
    about = "Pre-aggregated dimensional rollups over fact events",
    long_about = r#"Pre-aggregated dimensional rollups over fact events

Examples:
    # Check a schema file
    zohmg schema --schema pageviews.json

    # Roll up a file of JSON events into the cube
    zohmg import --schema pageviews.json --store-path cube.json -f events.jsonl

    # Query the cube
    zohmg query --schema pageviews.json --store-path cube.json \
        't0=20260101&t1=20260131&unit=hits&d0=country&d0v=DE,SE'

    # Import with debug logging
    LOG_FILTER=debug zohmg import --schema pageviews.json --store-path cube.json -f events.jsonl
"#
)]
struct Config {
    #[clap(flatten)]
    logging_config: LoggingConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Validate a schema file and print what it declares
    Schema(commands::schema::Config),

    /// Roll up JSON-lines fact events into the cube
    Import(commands::import::Config),

    /// Answer a query string from the cube
    Query(commands::query::Config),
}

fn main() {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    if let Err(e) = config.logging_config.install_global_subscriber() {
        eprintln!("Initializing logs failed: {e}");
        std::process::exit(ReturnCode::Failure as _);
    }

    match config.command {
        None => println!("command required, -h/--help for help"),
        Some(Command::Schema(config)) => {
            if let Err(e) = commands::schema::command(config) {
                eprintln!("Schema command failed: {e}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
        Some(Command::Import(config)) => {
            if let Err(e) = commands::import::command(config) {
                eprintln!("Import command failed: {e}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
        Some(Command::Query(config)) => {
            if let Err(e) = commands::query::command(config) {
                eprintln!("Query command failed: {e}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }
    }
}

/// Source the .env file before initialising the Config struct, so that its
/// variables act as defaults for the `env` fallbacks of the CLI flags.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            // a missing .env is fine, flag defaults apply
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}
