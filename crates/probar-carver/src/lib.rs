//! Probar Carver: replay captured object interactions as JUnit tests
//!
//! Instrumentation records every constructor call, method call and field
//! access on a set of target classes into a [`CaptureLog`]. The carver walks
//! that log and reconstructs a compilable statement sequence that reproduces
//! the observed object histories.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      CARVER Pipeline                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ CaptureLog │    │ Resolver   │    │ JUnit      │            │
//! │   │ (records,  │───►│ (intents,  │───►│ Generator  │───► .java  │
//! │   │  progress) │    │  tracker)  │    │ (TypeInfo) │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use probar_carver::prelude::*;
//!
//! let mut log = CaptureLog::new();
//! let person = Observed::instance(1, "Person");
//! log.log_call(1, &person, "<init>", "()V", &[]);
//! log.log_end(1, Oid(1), None);
//!
//! let carver = Carver::new(CarverConfig::new().with_target("Person"), TypeTable::new());
//! let test = carver.generate(&log, GenerationMode::Final)?;
//! assert!(test.source.contains("Person var0 = new Person();"));
//! # Ok::<(), CarverError>(())
//! ```

#![warn(missing_docs)]

pub mod capture;
pub mod config;
mod context;
pub mod driver;
pub mod emit;
mod error;
pub mod identity;
pub mod intent;
pub mod java;
pub mod synth;
pub mod types;

pub use capture::{CaptureLog, JavaType, Observed, Oid, Progress};
pub use config::CarverConfig;
pub use context::GenerationContext;
pub use driver::{Carver, FailureReport, GeneratedTest};
pub use emit::{CodeGenerator, GenerationMode, HelperKind, IntentRecorder, JUnitGenerator};
pub use error::{CarverError, Result};
pub use synth::Resolver;
pub use types::{TypeInfo, TypeTable};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::capture::*;
    pub use super::config::*;
    pub use super::context::*;
    pub use super::driver::*;
    pub use super::emit::*;
    pub use super::error::*;
    pub use super::identity::*;
    pub use super::intent::*;
    pub use super::synth::*;
    pub use super::types::*;
}
