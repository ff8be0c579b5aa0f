//! Wire vocabulary shared between instrumentation and the carver.
//!
//! The reserved method names and the void sentinel are the exact strings the
//! instrumentation writes; they must not change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by all reserved pseudo-method names.
const TAG_PREFIX: &str = "org.evosuite.testcarver.capture.CaptureLog";

/// Constructor of an observed class.
pub const OBSERVED_INIT: &str = "<init>";
/// Literal producing init (`String`, boxed primitives, `Class`).
pub const PLAIN_INIT: &str = "org.evosuite.testcarver.capture.CaptureLog.PLAIN";
/// Object materialized through out-of-band deserialization.
pub const NOT_OBSERVED_INIT: &str = "org.evosuite.testcarver.capture.CaptureLog.XINIT";
/// Collection rebuilt from its elements.
pub const COLLECTION_INIT: &str = "org.evosuite.testcarver.capture.CaptureLog.COLLECTION";
/// Map rebuilt from its key/value pairs.
pub const MAP_INIT: &str = "org.evosuite.testcarver.capture.CaptureLog.MAP";
/// Array rebuilt from its elements.
pub const ARRAY_INIT: &str = "org.evosuite.testcarver.capture.CaptureLog.ARRAY";
/// Closes the span of records belonging to one logical call.
pub const END_CAPTURE_PSEUDO_METHOD: &str =
    "org.evosuite.testcarver.capture.CaptureLog.END_CAPTURE";
/// Instance field write.
pub const PUTFIELD: &str = "PUTFIELD";
/// Static field write.
pub const PUTSTATIC: &str = "PUTSTATIC";
/// Instance field read.
pub const GETFIELD: &str = "GETFIELD";
/// Static field read.
pub const GETSTATIC: &str = "GETSTATIC";
/// Return slot sentinel for calls that produced nothing worth tracking.
pub const RETURN_TYPE_VOID: &str = "org.evosuite.testcarver.capture.CaptureLog.RETURN_VOID";
/// Capture id used for internally created records (plain and unobserved inits).
pub const PSEUDO_CAPTURE_ID: i32 = i32::MAX;
/// Descriptor written for pseudo records.
pub const EMPTY_DESC: &str = "()V";

/// Runtime object identity as reported by instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(pub i32);

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Oid {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Classification of a record's method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoMethod {
    /// `<init>` of a tracked class
    ObservedInit,
    /// Literal declaration
    PlainInit,
    /// Deserialized object
    NotObservedInit,
    /// Collection with elements
    CollectionInit,
    /// Map with entries
    MapInit,
    /// Array with elements
    ArrayInit,
    /// Instance field write
    PutField,
    /// Static field write
    PutStatic,
    /// Instance field read
    GetField,
    /// Static field read
    GetStatic,
    /// End of a capture span
    EndCapture,
    /// Any ordinary method call
    Call,
}

impl PseudoMethod {
    /// Classify a method name as written into the log.
    #[must_use]
    pub fn classify(name: &str) -> Self {
        match name {
            OBSERVED_INIT => Self::ObservedInit,
            PUTFIELD => Self::PutField,
            PUTSTATIC => Self::PutStatic,
            GETFIELD => Self::GetField,
            GETSTATIC => Self::GetStatic,
            _ if name.starts_with(TAG_PREFIX) => match name {
                PLAIN_INIT => Self::PlainInit,
                NOT_OBSERVED_INIT => Self::NotObservedInit,
                COLLECTION_INIT => Self::CollectionInit,
                MAP_INIT => Self::MapInit,
                ARRAY_INIT => Self::ArrayInit,
                END_CAPTURE_PSEUDO_METHOD => Self::EndCapture,
                _ => Self::Call,
            },
            _ => Self::Call,
        }
    }

    /// Whether this is a field write (`PUTFIELD`/`PUTSTATIC`).
    #[must_use]
    pub const fn is_field_write(self) -> bool {
        matches!(self, Self::PutField | Self::PutStatic)
    }

    /// Whether this is a field read (`GETFIELD`/`GETSTATIC`).
    #[must_use]
    pub const fn is_field_read(self) -> bool {
        matches!(self, Self::GetField | Self::GetStatic)
    }

    /// Whether the access is qualified by a type name rather than a variable.
    #[must_use]
    pub const fn is_static_field(self) -> bool {
        matches!(self, Self::PutStatic | Self::GetStatic)
    }
}

/// A literal value carried by a `PLAIN_INIT` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    /// `java.lang.Byte`
    Byte(i8),
    /// `java.lang.Short`
    Short(i16),
    /// `java.lang.Integer`
    Int(i32),
    /// `java.lang.Long`
    Long(i64),
    /// `java.lang.Float`
    Float(f32),
    /// `java.lang.Double`
    Double(f64),
    /// `java.lang.Boolean`
    Bool(bool),
    /// `java.lang.Character`
    Char(char),
    /// `java.lang.String`
    Str(String),
    /// `java.lang.Class`, holding the binary name of the class
    Class(String),
}

impl Literal {
    /// Simple name of the boxed type, as registered in the info table.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Byte(_) => "Byte",
            Self::Short(_) => "Short",
            Self::Int(_) => "Integer",
            Self::Long(_) => "Long",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::Bool(_) => "Boolean",
            Self::Char(_) => "Character",
            Self::Str(_) => "String",
            Self::Class(_) => "Class",
        }
    }
}

/// One argument slot of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    /// `null` argument
    Null,
    /// Reference to another tracked object
    Oid(Oid),
    /// Literal payload (only in `PLAIN_INIT` / `NOT_OBSERVED_INIT` records)
    Value(Literal),
}

impl Arg {
    /// The referenced OID, if this slot is a reference.
    #[must_use]
    pub const fn oid(&self) -> Option<Oid> {
        match self {
            Self::Oid(oid) => Some(*oid),
            _ => None,
        }
    }
}

impl From<Oid> for Arg {
    fn from(oid: Oid) -> Self {
        Self::Oid(oid)
    }
}

/// Return slot of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ReturnRepr", into = "ReturnRepr")]
pub enum ReturnValue {
    /// `RETURN_TYPE_VOID` sentinel
    #[default]
    Void,
    /// The call produced this object
    Oid(Oid),
}

impl ReturnValue {
    /// The returned OID, if any.
    #[must_use]
    pub const fn oid(self) -> Option<Oid> {
        match self {
            Self::Void => None,
            Self::Oid(oid) => Some(oid),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ReturnRepr {
    Oid(i32),
    Sentinel(String),
}

impl TryFrom<ReturnRepr> for ReturnValue {
    type Error = String;

    fn try_from(repr: ReturnRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ReturnRepr::Oid(oid) => Ok(Self::Oid(Oid(oid))),
            ReturnRepr::Sentinel(s) if s == RETURN_TYPE_VOID => Ok(Self::Void),
            ReturnRepr::Sentinel(s) => Err(format!("unknown return sentinel '{s}'")),
        }
    }
}

impl From<ReturnValue> for ReturnRepr {
    fn from(value: ReturnValue) -> Self {
        match value {
            ReturnValue::Void => Self::Sentinel(RETURN_TYPE_VOID.to_string()),
            ReturnValue::Oid(oid) => Self::Oid(oid.0),
        }
    }
}

impl fmt::Display for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str(RETURN_TYPE_VOID),
            Self::Oid(oid) => write!(f, "{oid}"),
        }
    }
}
