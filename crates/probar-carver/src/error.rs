//! Error types for `probar-carver`.
//!
//! A capture log is produced by instrumentation and is assumed to be
//! internally consistent. Every error below is therefore fatal for the
//! generation pass that raised it: nothing is silently recovered.

use crate::capture::Oid;
use thiserror::Error;

/// Result type alias for carver operations.
pub type Result<T> = std::result::Result<T, CarverError>;

/// Errors that can occur while replaying a capture log into test code.
#[derive(Debug, Error)]
pub enum CarverError {
    /// The log violates the writer contract (column mismatch, bad slot, ...).
    #[error("Malformed capture log at record {record}: {message}")]
    MalformedLog {
        /// Offending record number
        record: usize,
        /// What is wrong with it
        message: String,
    },

    /// A call span was opened but never closed.
    #[error("No END_CAPTURE record for oid {oid} / capture {capture_id} (span starts at record {record})")]
    MissingSpanEnd {
        /// First record of the span
        record: usize,
        /// Receiver of the span
        oid: Oid,
        /// Capture id of the span
        capture_id: i32,
    },

    /// An OID is referenced that the info table has never seen.
    #[error("Record {record} references oid {oid} which was never created in the log")]
    UnknownOid {
        /// Referencing record
        record: usize,
        /// Unknown object id
        oid: Oid,
    },

    /// The identity tracker was asked to declare an object twice.
    #[error("Object {oid} is already declared as '{variable}'")]
    AlreadyDeclared {
        /// Object id
        oid: Oid,
        /// Existing variable name
        variable: String,
    },

    /// A statement needs a variable for an object that was never declared.
    #[error("Object {oid} is used before it was declared")]
    Undeclared {
        /// Object id
        oid: Oid,
    },

    /// A type name could not be resolved by the type oracle.
    #[error("Cannot resolve type '{name}'")]
    UnresolvedType {
        /// Type name as found in the log
        name: String,
    },

    /// A `PLAIN_INIT` record carries something other than one literal.
    #[error("Unsupported plain value at record {record}: {found}")]
    UnsupportedLiteral {
        /// Offending record number
        record: usize,
        /// Description of the slot found
        found: String,
    },

    /// A JVM type or method descriptor could not be parsed.
    #[error("Invalid descriptor '{descriptor}': {reason}")]
    InvalidDescriptor {
        /// The descriptor
        descriptor: String,
        /// Why it is invalid
        reason: String,
    },

    /// Generator used out of order (e.g. statement emitted before `before()`).
    #[error("Invalid generator state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Wraps any failure with the record that was being replayed.
    #[error("Failed to replay record {record}: {source}")]
    Replay {
        /// Record being replayed when the failure happened
        record: usize,
        /// Underlying error
        #[source]
        source: Box<CarverError>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CarverError {
    /// Create a malformed-log error
    #[must_use]
    pub fn malformed(record: usize, message: impl Into<String>) -> Self {
        Self::MalformedLog {
            record,
            message: message.into(),
        }
    }

    /// Create an invalid-state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Attach the record being replayed, unless a record is already attached.
    #[must_use]
    pub fn at_record(self, record: usize) -> Self {
        match self {
            Self::Replay { .. }
            | Self::MalformedLog { .. }
            | Self::MissingSpanEnd { .. }
            | Self::UnknownOid { .. }
            | Self::UnsupportedLiteral { .. } => self,
            other => Self::Replay {
                record,
                source: Box::new(other),
            },
        }
    }

    /// Record number this error refers to, if any.
    #[must_use]
    pub const fn record(&self) -> Option<usize> {
        match self {
            Self::MalformedLog { record, .. }
            | Self::MissingSpanEnd { record, .. }
            | Self::UnknownOid { record, .. }
            | Self::UnsupportedLiteral { record, .. }
            | Self::Replay { record, .. } => Some(*record),
            _ => None,
        }
    }
}
