//! Code emission.
//!
//! A [`CodeGenerator`] receives resolved [`Intent`]s in emission order and
//! builds the output. Its lifecycle is
//! `before() -> emit()* -> after() -> code()`, and `clear()` makes it
//! reusable for another run.

mod junit;

pub use junit::{JUnitGenerator, JUnitSettings};

use crate::context::GenerationContext;
use crate::error::Result;
use crate::intent::Intent;
use serde::{Deserialize, Serialize};

/// Output protocol phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Every statement reports failures to the collector
    PostProcessing,
    /// Only known-failing statements are wrapped, in an empty catch
    #[default]
    Final,
}

/// Members appended to the generated class on demand, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HelperKind {
    /// `XSTREAM` constant for unobserved objects
    Deserializer,
    /// `setField(..)` via reflection
    SetField,
    /// `getField(..)` via reflection
    GetField,
    /// `callMethod(..)` via reflection
    CallMethod,
    /// `newInstance(..)` via reflection
    NewInstance,
}

/// Target-language backend fed by the resolver.
pub trait CodeGenerator {
    /// What [`CodeGenerator::code`] produces.
    type Output;

    /// Start a new unit.
    fn before(&mut self, ctx: &GenerationContext) -> Result<()>;

    /// Append one statement intent.
    fn emit(&mut self, intent: &Intent, ctx: &mut GenerationContext) -> Result<()>;

    /// Finish the unit, appending the helpers requested in `ctx`.
    fn after(&mut self, ctx: &GenerationContext) -> Result<()>;

    /// The finished output.
    fn code(&self) -> Result<Self::Output>;

    /// Drop all state.
    fn clear(&mut self);
}

/// Generator that only records intents.
#[derive(Debug, Clone, Default)]
pub struct IntentRecorder {
    intents: Vec<Intent>,
    started: bool,
    finished: bool,
}

impl IntentRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intents recorded so far.
    #[must_use]
    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }
}

impl CodeGenerator for IntentRecorder {
    type Output = Vec<Intent>;

    fn before(&mut self, _ctx: &GenerationContext) -> Result<()> {
        self.intents.clear();
        self.started = true;
        self.finished = false;
        Ok(())
    }

    fn emit(&mut self, intent: &Intent, ctx: &mut GenerationContext) -> Result<()> {
        if !self.started || self.finished {
            return Err(crate::CarverError::invalid_state(
                "emit() outside before()/after()",
            ));
        }
        ctx.mark_processed(intent.record());
        self.intents.push(intent.clone());
        Ok(())
    }

    fn after(&mut self, _ctx: &GenerationContext) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn code(&self) -> Result<Self::Output> {
        Ok(self.intents.clone())
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}
