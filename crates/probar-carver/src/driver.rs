//! Generation driver.
//!
//! Runs one generation pass over a capture log:
//!
//! ```text
//! clone log ─► before() ─► synthesize(target, record)* ─► after() ─► code()
//! ```
//!
//! The two-phase protocol first generates a scaffolded test where every
//! statement reports failures as `CAPTURED_EXCEPTION <record>` lines, then
//! regenerates the final test with only those records wrapped.

use crate::capture::{CaptureLog, Oid, PseudoMethod};
use crate::config::CarverConfig;
use crate::context::GenerationContext;
use crate::emit::{CodeGenerator, GenerationMode, HelperKind, JUnitGenerator};
use crate::error::{CarverError, Result};
use crate::java::CompilationUnit;
use crate::synth::Resolver;
use crate::types::{TypeInfo, TypeTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One generated test class.
#[derive(Debug, Clone)]
pub struct GeneratedTest {
    /// Syntax tree of the class
    pub unit: CompilationUnit,
    /// Rendered Java source
    pub source: String,
    /// Protocol phase it was generated for
    pub mode: GenerationMode,
    /// Number of statements emitted
    pub statements: usize,
    /// Helper members appended to the class
    pub helpers: BTreeSet<HelperKind>,
    /// Last record turned into a statement
    pub last_processed_record: Option<usize>,
}

impl GeneratedTest {
    /// Simple name of the generated class.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.unit.class.name
    }

    /// Source path relative to a source root (`com/example/PersonTest.java`).
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        if let Some(package) = self.unit.package.as_deref().filter(|p| !p.is_empty()) {
            path.extend(package.split('.'));
        }
        path.push(format!("{}.java", self.class_name()));
        path
    }

    /// Write the source below `root`, creating package directories.
    pub fn write_to(&self, root: &Path) -> Result<PathBuf> {
        let path = root.join(self.relative_path());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &self.source)?;
        Ok(path)
    }
}

/// Records reported as failing by a scaffolded test run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Record numbers whose statement threw
    pub failed_records: BTreeSet<usize>,
}

impl FailureReport {
    /// Line prefix written by the collector.
    pub const MARKER: &'static str = "CAPTURED_EXCEPTION";

    /// Collect all `CAPTURED_EXCEPTION <n>` lines from test output.
    pub fn parse(output: &str) -> Result<Self> {
        let pattern = format!(r"(?m)^\s*{}\s+(\d+)\s*$", Self::MARKER);
        let re = regex::Regex::new(&pattern)
            .map_err(|e| CarverError::config(format!("invalid failure pattern: {e}")))?;
        let failed_records = re
            .captures_iter(output)
            .filter_map(|c| c.get(1))
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        Ok(Self { failed_records })
    }

    /// Line the collector prints for `record`.
    #[must_use]
    pub fn line(record: usize) -> String {
        format!("{} {record}", Self::MARKER)
    }

    /// Whether no record failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failed_records.is_empty()
    }
}

/// Turns capture logs into JUnit tests.
#[derive(Debug, Clone)]
pub struct Carver<T = TypeTable> {
    config: CarverConfig,
    types: T,
}

impl<T: TypeInfo> Carver<T> {
    /// Create a carver answering type questions through `types`.
    #[must_use]
    pub const fn new(config: CarverConfig, types: T) -> Self {
        Self { config, types }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CarverConfig {
        &self.config
    }

    /// Type oracle.
    #[must_use]
    pub const fn types(&self) -> &T {
        &self.types
    }

    /// Generate a test for `mode` (no known failures in final mode).
    pub fn generate(&self, log: &CaptureLog, mode: GenerationMode) -> Result<GeneratedTest> {
        let ctx = match mode {
            GenerationMode::PostProcessing => GenerationContext::postprocessing(),
            GenerationMode::Final => GenerationContext::final_pass([]),
        };
        self.generate_with(log, ctx)
    }

    /// Phase 1: every statement reports failures to the collector.
    pub fn generate_for_postprocessing(&self, log: &CaptureLog) -> Result<GeneratedTest> {
        self.generate(log, GenerationMode::PostProcessing)
    }

    /// Phase 2: only `failed_records` are wrapped, in an empty catch.
    pub fn generate_final(
        &self,
        log: &CaptureLog,
        failed_records: impl IntoIterator<Item = usize>,
    ) -> Result<GeneratedTest> {
        self.generate_with(log, GenerationContext::final_pass(failed_records))
    }

    /// Generate with a prepared context.
    pub fn generate_with(
        &self,
        log: &CaptureLog,
        mut ctx: GenerationContext,
    ) -> Result<GeneratedTest> {
        let mut gen = JUnitGenerator::new(self.config.junit_settings(), &self.types);
        self.carve(log, &mut gen, &mut ctx)?;
        let unit = gen.code()?;
        Ok(GeneratedTest {
            source: unit.render(),
            unit,
            mode: ctx.mode,
            statements: ctx.statements,
            helpers: ctx.helpers,
            last_processed_record: ctx.last_processed_record,
        })
    }

    /// Drive `gen` through one full pass over a private copy of `log`.
    pub fn carve<G>(&self, log: &CaptureLog, gen: &mut G, ctx: &mut GenerationContext) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        let targets = log.target_oids(&self.config.target_classes);
        info!(
            targets = targets.len(),
            records = log.len(),
            mode = ?ctx.mode,
            "carving capture log"
        );

        gen.before(ctx)?;
        if targets.is_empty() {
            info!(classes = ?self.config.target_classes, "no target objects in log");
        } else {
            let mut resolver = Resolver::new(log.clone(), &self.types)
                .with_max_statements(self.config.max_statements);
            replay_targets(&mut resolver, log, &targets, gen, ctx)?;
            debug!(declared = resolver.tracker().len(), "replay finished");
        }
        gen.after(ctx)
    }
}

fn replay_targets<G>(
    resolver: &mut Resolver<'_>,
    log: &CaptureLog,
    targets: &[Oid],
    gen: &mut G,
    ctx: &mut GenerationContext,
) -> Result<()>
where
    G: CodeGenerator + ?Sized,
{
    let wanted: HashSet<Oid> = targets.iter().copied().collect();
    let mut index = targets
        .iter()
        .filter_map(|oid| log.progress(*oid).record())
        .min()
        .unwrap_or(0);

    while index < log.len() {
        if resolver.limit_reached(ctx) {
            info!(statements = ctx.statements, "statement limit reached");
            break;
        }
        let record = log.record(index)?;
        let hit = if wanted.contains(&record.oid) {
            Some(record.oid)
        } else {
            record.ret.oid().filter(|oid| wanted.contains(oid))
        };
        match hit {
            Some(oid) if record.kind != PseudoMethod::EndCapture => {
                resolver.synthesize(oid, index, gen, ctx)?;
                index = log.find_end_of_span(index)? + 1;
            }
            _ => index += 1,
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::capture::{Literal, Observed};
    use crate::emit::IntentRecorder;
    use crate::intent::Intent;

    fn person_log() -> CaptureLog {
        let mut log = CaptureLog::new();
        let person = Observed::instance(1, "Person");
        log.log_call(1, &person, "<init>", "()V", &[]);
        log.log_end(1, Oid(1), None);
        log.log_call(
            2,
            &person,
            "setAge",
            "(I)V",
            &[Some(Observed::plain(2, Literal::Int(42)))],
        );
        log.log_end(2, Oid(1), None);
        log
    }

    fn carver() -> Carver {
        Carver::new(
            CarverConfig::new()
                .with_class_name("PersonTest")
                .with_target("Person"),
            TypeTable::new(),
        )
    }

    mod failure_report_tests {
        use super::*;

        #[test]
        fn test_parse_collector_lines() {
            let output = "JUnit version 4.13\nCAPTURED_EXCEPTION 4\n.E\n  CAPTURED_EXCEPTION 12 \nCAPTURED_EXCEPTION x\n";
            let report = FailureReport::parse(output).unwrap();
            assert_eq!(report.failed_records, BTreeSet::from([4, 12]));
        }

        #[test]
        fn test_parse_empty() {
            assert!(FailureReport::parse("OK (1 test)").unwrap().is_empty());
        }

        #[test]
        fn test_line_round_trip() {
            let report = FailureReport::parse(&FailureReport::line(7)).unwrap();
            assert!(report.failed_records.contains(&7));
        }
    }

    mod generation_tests {
        use super::*;

        #[test]
        fn test_final_without_failures() {
            let test = carver().generate(&person_log(), GenerationMode::Final).unwrap();
            assert!(test.source.contains("Person var0 = new Person();"));
            assert!(test.source.contains("Integer var1 = 42;"));
            assert!(test.source.contains("var0.setAge((int) var1);"));
            assert!(!test.source.contains("try {"));
            assert_eq!(test.statements, 3);
            assert_eq!(test.last_processed_record, Some(4));
        }

        #[test]
        fn test_two_phase_protocol() {
            let carver = carver();
            let log = person_log();
            let scaffold = carver.generate_for_postprocessing(&log).unwrap();
            assert!(scaffold.source.contains("captureException(4);"));
            assert!(scaffold.source.contains("captureException(0);"));

            let report = FailureReport::parse("CAPTURED_EXCEPTION 4\n").unwrap();
            let final_test = carver.generate_final(&log, report.failed_records).unwrap();
            assert!(!final_test.source.contains("captureException"));
            assert_eq!(final_test.source.matches("try {").count(), 1);
            assert!(final_test.source.contains("Person var0 = new Person();"));
        }

        #[test]
        fn test_generation_leaves_log_untouched() {
            let log = person_log();
            let before = log.clone();
            carver().generate(&log, GenerationMode::Final).unwrap();
            assert_eq!(log, before);
        }

        #[test]
        fn test_no_targets_is_well_formed() {
            let carver = Carver::new(
                CarverConfig::new().with_target("Unrelated"),
                TypeTable::new(),
            );
            let test = carver.generate(&person_log(), GenerationMode::Final).unwrap();
            assert_eq!(test.statements, 0);
            assert!(test.source.contains("public class CarvedTest {"));
            assert!(test.source.contains("public void test() throws Exception {\n    }"));
        }

        #[test]
        fn test_carve_with_recorder() {
            let mut gen = IntentRecorder::new();
            let mut ctx = GenerationContext::default();
            carver().carve(&person_log(), &mut gen, &mut ctx).unwrap();
            let intents = gen.code().unwrap();
            assert!(matches!(intents[0], Intent::Construct { .. }));
            assert!(matches!(intents[1], Intent::Literal { .. }));
            assert!(matches!(intents[2], Intent::Call { .. }));
        }
    }

    mod output_tests {
        use super::*;

        #[test]
        fn test_relative_path_follows_package() {
            let carver = Carver::new(
                CarverConfig::new()
                    .with_package("com.example")
                    .with_class_name("PersonTest")
                    .with_target("Person"),
                TypeTable::new(),
            );
            let test = carver.generate(&person_log(), GenerationMode::Final).unwrap();
            assert_eq!(
                test.relative_path(),
                PathBuf::from("com").join("example").join("PersonTest.java")
            );
        }

        #[test]
        fn test_write_to_creates_directories() {
            let dir = tempfile::tempdir().unwrap();
            let test = carver().generate(&person_log(), GenerationMode::Final).unwrap();
            let path = test.write_to(dir.path()).unwrap();
            assert_eq!(path, dir.path().join("PersonTest.java"));
            assert_eq!(std::fs::read_to_string(path).unwrap(), test.source);
        }
    }
}
