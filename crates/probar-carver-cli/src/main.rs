//! Carver CLI: turn capture logs into JUnit tests
//!
//! ## Usage
//!
//! ```bash
//! carver generate log.json --target com.example.Person    # Final test
//! carver generate log.json -c carver.yaml -m postprocessing
//! carver generate log.json --failures run.txt             # Wrap failing records
//! carver inspect log.json                                 # Dump the log tables
//! ```

use clap::Parser;
use console::style;
use probar_carver_cli::{init_tracing, run, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", style("Error:").red().bold());
            ExitCode::FAILURE
        }
    }
}
