//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use probar_carver::GenerationMode;
use std::path::PathBuf;

/// Carver: turn capture logs into JUnit tests
#[derive(Parser, Debug)]
#[command(name = "carver")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a JUnit test from a capture log
    Generate(GenerateArgs),

    /// Print the record and info tables of a capture log
    Inspect(InspectArgs),
}

/// Output protocol phase
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeArg {
    /// Final test; records listed in --failures are wrapped
    #[default]
    Final,
    /// Scaffolded test reporting every failing statement
    Postprocessing,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Final => Self::Final,
            ModeArg::Postprocessing => Self::PostProcessing,
        }
    }
}

/// Arguments for the generate command
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Capture log (JSON)
    pub log: PathBuf,

    /// Carver configuration (.yaml, .yml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Type table (.yaml, .yml or .json)
    #[arg(short, long)]
    pub types: Option<PathBuf>,

    /// Class to carve (repeatable, adds to the configured targets)
    #[arg(long = "target")]
    pub targets: Vec<String>,

    /// Package of the generated test
    #[arg(long)]
    pub package: Option<String>,

    /// Name of the generated test class
    #[arg(long)]
    pub class_name: Option<String>,

    /// Stop after this many statements
    #[arg(long)]
    pub max_statements: Option<usize>,

    /// Generation phase
    #[arg(short, long, value_enum, default_value = "final")]
    pub mode: ModeArg,

    /// Output of a scaffolded run, scanned for failing records
    #[arg(long)]
    pub failures: Option<PathBuf>,

    /// Source root to write the test into
    #[arg(short, long, default_value = "target/carver")]
    pub output: PathBuf,

    /// Print the source instead of writing a file
    #[arg(long)]
    pub stdout: bool,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Capture log (JSON)
    pub log: PathBuf,

    /// Only check the log and report problems
    #[arg(long)]
    pub validate: bool,
}
