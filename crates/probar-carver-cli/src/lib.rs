//! Carver CLI Library
//!
//! Command-line interface for `probar-carver`: loads a serialized capture
//! log, runs one generation pass and writes the `.java` file.

#![warn(missing_docs)]

mod commands;
mod error;
pub mod handlers;

pub use commands::{Cli, Commands, GenerateArgs, InspectArgs, ModeArg};
pub use error::{CliError, CliResult};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber.
///
/// `-v` flags override `RUST_LOG`; without them `RUST_LOG` applies and
/// defaults to `warn` (`error` in quiet mode).
pub fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    // a subscriber may already be installed (tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Commands::Generate(args) => handlers::execute_generate(args, cli.quiet).map(|_| ()),
        Commands::Inspect(args) => handlers::execute_inspect(args, cli.quiet),
    }
}
