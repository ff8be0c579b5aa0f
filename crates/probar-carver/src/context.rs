//! Per-run generation state.
//!
//! Threaded by `&mut` through the resolver and the emitter instead of living
//! in process-wide collectors.

use crate::emit::{GenerationMode, HelperKind};
use std::collections::BTreeSet;

/// State shared by the resolver and the emitter during one generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    /// Which output protocol phase is being generated
    pub mode: GenerationMode,
    /// Records whose original call threw (known from a previous pass)
    pub failed_records: BTreeSet<usize>,
    /// Last record handed to the emitter
    pub last_processed_record: Option<usize>,
    /// Helper members the generated class needs
    pub helpers: BTreeSet<HelperKind>,
    /// Number of statement intents emitted so far
    pub statements: usize,
}

impl GenerationContext {
    /// Context for the scaffolded first pass.
    #[must_use]
    pub fn postprocessing() -> Self {
        Self {
            mode: GenerationMode::PostProcessing,
            ..Self::default()
        }
    }

    /// Context for the final pass with the records known to fail.
    #[must_use]
    pub fn final_pass(failed_records: impl IntoIterator<Item = usize>) -> Self {
        Self {
            mode: GenerationMode::Final,
            failed_records: failed_records.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Whether the statement for `record` goes into a try/catch.
    #[must_use]
    pub fn is_wrapped(&self, record: usize) -> bool {
        match self.mode {
            GenerationMode::PostProcessing => true,
            GenerationMode::Final => self.failed_records.contains(&record),
        }
    }

    /// Note that `record` was just emitted.
    pub fn mark_processed(&mut self, record: usize) {
        self.last_processed_record = Some(record);
        self.statements += 1;
    }

    /// Request a helper member.
    pub fn require(&mut self, helper: HelperKind) {
        self.helpers.insert(helper);
    }
}
