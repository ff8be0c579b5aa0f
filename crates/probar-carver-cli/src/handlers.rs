//! Command handlers

use crate::commands::{GenerateArgs, InspectArgs, ModeArg};
use crate::error::{CliError, CliResult};
use console::style;
use probar_carver::{
    CaptureLog, Carver, CarverConfig, FailureReport, GeneratedTest, TypeTable,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Load a capture log from its JSON file.
pub fn load_log(path: &Path) -> CliResult<CaptureLog> {
    let text = fs::read_to_string(path)?;
    Ok(CaptureLog::from_json(&text)?)
}

/// Configuration from the optional file, with command-line overrides applied.
pub fn build_config(args: &GenerateArgs) -> CliResult<CarverConfig> {
    let mut config = match &args.config {
        Some(path) if !path.exists() => {
            return Err(CliError::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => CarverConfig::from_path(path)?,
        None => CarverConfig::default(),
    };
    config.target_classes.extend(args.targets.iter().cloned());
    if let Some(package) = &args.package {
        config.package.clone_from(package);
    }
    if let Some(class_name) = &args.class_name {
        config.class_name.clone_from(class_name);
    }
    if args.max_statements.is_some() {
        config.max_statements = args.max_statements;
    }
    config.validate()?;
    Ok(config)
}

/// Run the generate command and return the generated test.
pub fn execute_generate(args: &GenerateArgs, quiet: bool) -> CliResult<GeneratedTest> {
    if args.failures.is_some() && args.mode == ModeArg::Postprocessing {
        return Err(CliError::invalid_argument(
            "--failures only applies to --mode final",
        ));
    }

    let config = build_config(args)?;
    if config.target_classes.is_empty() {
        warn!("no target classes configured, the test will be empty");
    }
    let mut types = match &args.types {
        Some(path) => TypeTable::from_path(path)?,
        None => TypeTable::new(),
    };
    types.strict |= config.strict_types;

    let log = load_log(&args.log)?;
    log.validate()?;
    info!(records = log.len(), objects = log.oid_infos().len(), "capture log loaded");

    let carver = Carver::new(config, types);
    let test = match args.mode {
        ModeArg::Postprocessing => carver.generate_for_postprocessing(&log)?,
        ModeArg::Final => {
            let failed = match &args.failures {
                Some(path) => FailureReport::parse(&fs::read_to_string(path)?)?.failed_records,
                None => BTreeSet::new(),
            };
            carver.generate_final(&log, failed)?
        }
    };

    if args.stdout {
        print!("{}", test.source);
    } else {
        let path = test.write_to(&args.output)?;
        if !quiet {
            println!(
                "{} {} ({} statements)",
                style("✓").green(),
                path.display(),
                test.statements
            );
        }
    }
    Ok(test)
}

/// Run the inspect command.
pub fn execute_inspect(args: &InspectArgs, quiet: bool) -> CliResult<()> {
    let log = load_log(&args.log)?;
    if args.validate {
        log.validate()?;
        if !quiet {
            println!(
                "{} {} records, {} objects",
                style("✓").green(),
                log.len(),
                log.oid_infos().len()
            );
        }
        return Ok(());
    }
    print!("{log}");
    Ok(())
}
