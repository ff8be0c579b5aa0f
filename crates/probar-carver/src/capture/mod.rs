//! Capture log data model.
//!
//! - [`value`]: reserved names, OIDs and argument slots
//! - [`descriptor`]: JVM descriptor parsing
//! - [`log`]: the column-oriented trace and its info table

pub mod descriptor;
pub mod log;
pub mod value;

pub use descriptor::{JavaType, MethodDescriptor};
pub use log::{CaptureLog, ObservedKind, Observed, OidInfo, Progress, Record};
pub use value::{
    Arg, Literal, Oid, PseudoMethod, ReturnValue, ARRAY_INIT, COLLECTION_INIT, EMPTY_DESC,
    END_CAPTURE_PSEUDO_METHOD, GETFIELD, GETSTATIC, MAP_INIT, NOT_OBSERVED_INIT, OBSERVED_INIT,
    PLAIN_INIT, PSEUDO_CAPTURE_ID, PUTFIELD, PUTSTATIC, RETURN_TYPE_VOID,
};
