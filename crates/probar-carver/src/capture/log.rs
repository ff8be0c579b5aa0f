//! The capture log: an append-only, column-oriented trace of interactions.
//!
//! ## Layout
//!
//! ```text
//! LOG       REC_NO | OID | CID | METHOD | PARAMS | RETURN | STATIC | DESC
//! META INF  OID | PROGRESS | CLASS
//! ```
//!
//! Every logical call occupies a span of records sharing `(oid, capture id)`
//! and is closed by exactly one `END_CAPTURE_PSEUDO_METHOD` record with the
//! same key. The info table remembers, per OID, its class at first sight and
//! how far code generation has progressed through its history.

use super::value::{
    Arg, Literal, Oid, PseudoMethod, ReturnValue, ARRAY_INIT, COLLECTION_INIT, EMPTY_DESC,
    END_CAPTURE_PSEUDO_METHOD, GETFIELD, GETSTATIC, MAP_INIT, NOT_OBSERVED_INIT, OBSERVED_INIT,
    PLAIN_INIT, PSEUDO_CAPTURE_ID, PUTFIELD, PUTSTATIC,
};
use crate::error::{CarverError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// How far generation has progressed through one object's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    /// The object has no entry in the info table.
    NotYetCreated,
    /// Nothing generated yet; history starts at this (included) record.
    CreatedAt(usize),
    /// History is covered up to and including this record.
    LastMutatedAt(usize),
}

impl Progress {
    /// First record that still has to be replayed for this object.
    #[must_use]
    pub const fn resume_point(self) -> Option<usize> {
        match self {
            Self::NotYetCreated => None,
            Self::CreatedAt(record) => Some(record),
            Self::LastMutatedAt(record) => Some(record + 1),
        }
    }

    /// The record this progress value points at.
    #[must_use]
    pub const fn record(self) -> Option<usize> {
        match self {
            Self::NotYetCreated => None,
            Self::CreatedAt(record) | Self::LastMutatedAt(record) => Some(record),
        }
    }
}

/// One entry of the OID info table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidInfo {
    /// The object
    pub oid: Oid,
    /// Class name at first sight (class carriers carry the class they stand for)
    pub class_name: String,
    /// Replay progress
    pub progress: Progress,
}

/// Borrowed view of one record.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Record number
    pub index: usize,
    /// Receiver (or class carrier, or accessed object)
    pub oid: Oid,
    /// Capture id grouping the span
    pub capture_id: i32,
    /// Raw method name
    pub method: &'a str,
    /// Classified method name
    pub kind: PseudoMethod,
    /// Raw descriptor
    pub desc: &'a str,
    /// Argument slots
    pub args: &'a [Arg],
    /// Return slot
    pub ret: ReturnValue,
    /// Static invocation
    pub is_static: bool,
}

impl Record<'_> {
    /// Whether the record concerns `oid` as receiver or as produced value.
    #[must_use]
    pub fn touches(&self, oid: Oid) -> bool {
        self.oid == oid || self.ret.oid() == Some(oid)
    }
}

/// Something the instrumented program handed to a logged call.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    /// Identity of the runtime object
    pub oid: Oid,
    /// Runtime class name
    pub class_name: String,
    /// What kind of object it is
    pub kind: ObservedKind,
}

/// Category of an observed object, deciding how its first sight is logged.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedKind {
    /// Instance of an instrumented class
    Instance,
    /// `java.lang.Class` object standing in for a static receiver
    ClassCarrier,
    /// String, boxed primitive
    Plain(Literal),
    /// Instance of an uninstrumented class, with its serialized form
    Opaque {
        /// Serialized payload, `None` if serialization failed
        payload: Option<String>,
    },
    /// Array, logged with its current elements every time it is passed
    Array {
        /// Elements in index order
        elements: Vec<Option<Observed>>,
    },
    /// `java.util.Collection`, logged like an array
    Collection {
        /// Elements in iteration order
        elements: Vec<Option<Observed>>,
    },
    /// `java.util.Map`, logged like an array
    Map {
        /// Key/value pairs in iteration order
        entries: Vec<(Option<Observed>, Option<Observed>)>,
    },
}

impl Observed {
    /// Instance of an instrumented class.
    #[must_use]
    pub fn instance(oid: impl Into<Oid>, class_name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            class_name: class_name.into(),
            kind: ObservedKind::Instance,
        }
    }

    /// Class object used as receiver of static calls.
    #[must_use]
    pub fn class_carrier(oid: impl Into<Oid>, class_name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            class_name: class_name.into(),
            kind: ObservedKind::ClassCarrier,
        }
    }

    /// Plain value; registered under the literal's simple type name.
    #[must_use]
    pub fn plain(oid: impl Into<Oid>, value: Literal) -> Self {
        Self {
            oid: oid.into(),
            class_name: value.type_name().to_string(),
            kind: ObservedKind::Plain(value),
        }
    }

    /// Object of an uninstrumented class with its serialized form.
    #[must_use]
    pub fn opaque(
        oid: impl Into<Oid>,
        class_name: impl Into<String>,
        payload: Option<String>,
    ) -> Self {
        Self {
            oid: oid.into(),
            class_name: class_name.into(),
            kind: ObservedKind::Opaque { payload },
        }
    }

    /// Array with its elements; `class_name` is the runtime name (`[I`).
    #[must_use]
    pub fn array(
        oid: impl Into<Oid>,
        class_name: impl Into<String>,
        elements: Vec<Option<Observed>>,
    ) -> Self {
        Self {
            oid: oid.into(),
            class_name: class_name.into(),
            kind: ObservedKind::Array { elements },
        }
    }

    /// Collection with its elements.
    #[must_use]
    pub fn collection(
        oid: impl Into<Oid>,
        class_name: impl Into<String>,
        elements: Vec<Option<Observed>>,
    ) -> Self {
        Self {
            oid: oid.into(),
            class_name: class_name.into(),
            kind: ObservedKind::Collection { elements },
        }
    }

    /// Map with its entries.
    #[must_use]
    pub fn map(
        oid: impl Into<Oid>,
        class_name: impl Into<String>,
        entries: Vec<(Option<Observed>, Option<Observed>)>,
    ) -> Self {
        Self {
            oid: oid.into(),
            class_name: class_name.into(),
            kind: ObservedKind::Map { entries },
        }
    }

    const fn is_plain_or_class(&self) -> bool {
        matches!(
            self.kind,
            ObservedKind::Plain(_) | ObservedKind::ClassCarrier
        )
    }
}

/// Append-only event trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CaptureLogData")]
pub struct CaptureLog {
    object_ids: Vec<Oid>,
    capture_ids: Vec<i32>,
    method_names: Vec<String>,
    params: Vec<Vec<Arg>>,
    return_values: Vec<ReturnValue>,
    is_static_call_list: Vec<bool>,
    desc_list: Vec<String>,
    oid_infos: Vec<OidInfo>,
    names_of_accessed_fields: HashMap<i32, String>,
    #[serde(skip)]
    oid_index: HashMap<Oid, usize>,
}

#[derive(Deserialize)]
struct CaptureLogData {
    object_ids: Vec<Oid>,
    capture_ids: Vec<i32>,
    method_names: Vec<String>,
    params: Vec<Vec<Arg>>,
    return_values: Vec<ReturnValue>,
    is_static_call_list: Vec<bool>,
    desc_list: Vec<String>,
    oid_infos: Vec<OidInfo>,
    #[serde(default)]
    names_of_accessed_fields: HashMap<i32, String>,
}

impl TryFrom<CaptureLogData> for CaptureLog {
    type Error = CarverError;

    fn try_from(data: CaptureLogData) -> Result<Self> {
        let mut log = Self {
            object_ids: data.object_ids,
            capture_ids: data.capture_ids,
            method_names: data.method_names,
            params: data.params,
            return_values: data.return_values,
            is_static_call_list: data.is_static_call_list,
            desc_list: data.desc_list,
            oid_infos: data.oid_infos,
            names_of_accessed_fields: data.names_of_accessed_fields,
            oid_index: HashMap::new(),
        };
        log.rebuild_index()?;
        log.check_columns()?;
        Ok(log)
    }
}

impl CaptureLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a log from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the log to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.object_ids.len()
    }

    /// Whether the log holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_ids.is_empty()
    }

    /// Drop all records and the info table.
    pub fn clear(&mut self) {
        self.object_ids.clear();
        self.capture_ids.clear();
        self.method_names.clear();
        self.params.clear();
        self.return_values.clear();
        self.is_static_call_list.clear();
        self.desc_list.clear();
        self.oid_infos.clear();
        self.oid_index.clear();
        self.names_of_accessed_fields.clear();
    }

    /// View record `index`.
    pub fn record(&self, index: usize) -> Result<Record<'_>> {
        if index >= self.len() {
            return Err(CarverError::malformed(
                index,
                format!("record out of range (log has {} records)", self.len()),
            ));
        }
        let method = self.method_names[index].as_str();
        Ok(Record {
            index,
            oid: self.object_ids[index],
            capture_id: self.capture_ids[index],
            method,
            kind: PseudoMethod::classify(method),
            desc: &self.desc_list[index],
            args: &self.params[index],
            ret: self.return_values[index],
            is_static: self.is_static_call_list[index],
        })
    }

    /// Iterate over all records in order.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.record(i).ok())
    }

    /// OID info table in first-sight order.
    #[must_use]
    pub fn oid_infos(&self) -> &[OidInfo] {
        &self.oid_infos
    }

    /// Info table entry for `oid`.
    #[must_use]
    pub fn info(&self, oid: Oid) -> Option<&OidInfo> {
        self.oid_index.get(&oid).map(|&i| &self.oid_infos[i])
    }

    /// Class name of `oid` at first sight.
    #[must_use]
    pub fn type_name(&self, oid: Oid) -> Option<&str> {
        self.info(oid).map(|info| info.class_name.as_str())
    }

    /// Replay progress of `oid`.
    #[must_use]
    pub fn progress(&self, oid: Oid) -> Progress {
        self.info(oid)
            .map_or(Progress::NotYetCreated, |info| info.progress)
    }

    /// Mark `oid` as covered through `record`. Never moves backwards.
    pub fn advance_progress(&mut self, oid: Oid, record: usize) {
        if let Some(&i) = self.oid_index.get(&oid) {
            let info = &mut self.oid_infos[i];
            let ahead = info.progress.record().map_or(true, |current| record > current);
            if ahead {
                info.progress = Progress::LastMutatedAt(record);
            }
        }
    }

    /// Name of the field touched by the field-access span `capture_id`.
    #[must_use]
    pub fn accessed_field(&self, capture_id: i32) -> Option<&str> {
        self.names_of_accessed_fields
            .get(&capture_id)
            .map(String::as_str)
    }

    /// OIDs whose class is one of `classes`, in creation order.
    #[must_use]
    pub fn target_oids<S: AsRef<str>>(&self, classes: &[S]) -> Vec<Oid> {
        self.oid_infos
            .iter()
            .filter(|info| classes.iter().any(|c| c.as_ref() == info.class_name))
            .map(|info| info.oid)
            .collect()
    }

    /// Record closing the span that starts at `record`.
    ///
    /// Inner records with the same `(oid, capture id)` key open nested spans
    /// which are skipped. An end record is its own span end.
    pub fn find_end_of_span(&self, record: usize) -> Result<usize> {
        let start = self.record(record)?;
        if start.kind == PseudoMethod::EndCapture {
            return Ok(record);
        }
        let mut depth = 0usize;
        for r in record..self.len() {
            if self.object_ids[r] != start.oid || self.capture_ids[r] != start.capture_id {
                continue;
            }
            if self.method_names[r] == END_CAPTURE_PSEUDO_METHOD {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(r);
                }
            } else {
                depth += 1;
            }
        }
        Err(CarverError::MissingSpanEnd {
            record,
            oid: start.oid,
            capture_id: start.capture_id,
        })
    }

    /// Check the structural invariants of the log.
    ///
    /// Columns must agree in length, every span must be closed, plain inits
    /// must carry exactly one literal and every referenced OID must be known.
    pub fn validate(&self) -> Result<()> {
        self.check_columns()?;
        for record in self.records() {
            if record.kind == PseudoMethod::EndCapture {
                continue;
            }
            self.find_end_of_span(record.index)?;
            if record.kind == PseudoMethod::PlainInit
                && !matches!(record.args, [Arg::Value(_)])
            {
                return Err(CarverError::malformed(
                    record.index,
                    "PLAIN_INIT must carry exactly one literal",
                ));
            }
            for oid in record.args.iter().filter_map(Arg::oid) {
                if self.info(oid).is_none() {
                    return Err(CarverError::UnknownOid {
                        record: record.index,
                        oid,
                    });
                }
            }
        }
        Ok(())
    }

    //--- writer API ---------------------------------------------------------

    /// Log a method or constructor call on `receiver`.
    ///
    /// Arguments seen for the first time get their own `PLAIN_INIT` or
    /// `NOT_OBSERVED_INIT` span in front of the call record. Containers are
    /// logged again on every call, after their elements. An instance
    /// receiving a call before any constructor was seen gets an empty
    /// `NOT_OBSERVED_INIT` span.
    pub fn log_call(
        &mut self,
        capture_id: i32,
        receiver: &Observed,
        method: &str,
        desc: &str,
        args: &[Option<Observed>],
    ) {
        let replace = method == OBSERVED_INIT;
        if receiver.kind == ObservedKind::ClassCarrier {
            self.register(receiver, replace);
            self.push_plain(receiver.oid, Literal::Class(receiver.class_name.clone()));
        } else if replace {
            self.register(receiver, true);
        } else {
            self.introduce(receiver);
        }

        let slots = args.iter().map(|arg| self.link_arg(arg.as_ref())).collect();
        self.push(
            receiver.oid,
            capture_id,
            method,
            desc,
            slots,
            receiver.kind == ObservedKind::ClassCarrier,
        );
    }

    /// Log a field write; the written value becomes the single argument.
    pub fn log_field_write(
        &mut self,
        capture_id: i32,
        receiver: &Observed,
        field: &str,
        desc: &str,
        value: Option<&Observed>,
    ) {
        let method = if receiver.kind == ObservedKind::ClassCarrier {
            PUTSTATIC
        } else {
            PUTFIELD
        };
        self.names_of_accessed_fields
            .insert(capture_id, field.to_string());
        self.log_call(capture_id, receiver, method, desc, &[value.cloned()]);
    }

    /// Log a field read; the value read is reported through [`Self::log_end`].
    pub fn log_field_read(&mut self, capture_id: i32, receiver: &Observed, field: &str, desc: &str) {
        let method = if receiver.kind == ObservedKind::ClassCarrier {
            GETSTATIC
        } else {
            GETFIELD
        };
        self.names_of_accessed_fields
            .insert(capture_id, field.to_string());
        self.log_call(capture_id, receiver, method, desc, &[]);
    }

    /// Close the span of `(receiver, capture_id)`.
    ///
    /// A returned object that was never seen before (and is not a plain
    /// value) is linked to the call record and registered as created there.
    pub fn log_end(&mut self, capture_id: i32, receiver: Oid, returned: Option<&Observed>) {
        if let Some(value) = returned {
            if !value.is_plain_or_class() && !self.oid_index.contains_key(&value.oid) {
                if let Some(call) = self.find_open_call(capture_id, receiver) {
                    self.return_values[call] = ReturnValue::Oid(value.oid);
                    self.insert_info(value.oid, value.class_name.clone(), Progress::CreatedAt(call));
                }
            }
        }
        self.push(
            receiver,
            capture_id,
            END_CAPTURE_PSEUDO_METHOD,
            EMPTY_DESC,
            Vec::new(),
            false,
        );
    }

    fn find_open_call(&self, capture_id: i32, receiver: Oid) -> Option<usize> {
        let mut nested = 0usize;
        for r in (0..self.len()).rev() {
            if self.capture_ids[r] != capture_id || self.object_ids[r] != receiver {
                continue;
            }
            if self.method_names[r] == END_CAPTURE_PSEUDO_METHOD {
                nested += 1;
            } else if nested == 0 {
                return Some(r);
            } else {
                nested -= 1;
            }
        }
        None
    }

    fn link_arg(&mut self, arg: Option<&Observed>) -> Arg {
        let Some(value) = arg else {
            return Arg::Null;
        };
        self.introduce(value);
        Arg::Oid(value.oid)
    }

    /// Log whatever later records need to refer to `value`: nothing for an
    /// object already in the info table, unless it is a container.
    fn introduce(&mut self, value: &Observed) {
        match &value.kind {
            ObservedKind::Array { elements } => {
                let slots = elements.iter().map(|e| self.link_arg(e.as_ref())).collect();
                self.push_container(value, ARRAY_INIT, slots);
            }
            ObservedKind::Collection { elements } => {
                let slots = elements.iter().map(|e| self.link_arg(e.as_ref())).collect();
                self.push_container(value, COLLECTION_INIT, slots);
            }
            ObservedKind::Map { entries } => {
                let slots = entries
                    .iter()
                    .flat_map(|(key, item)| [key, item])
                    .map(|e| self.link_arg(e.as_ref()))
                    .collect();
                self.push_container(value, MAP_INIT, slots);
            }
            _ if self.oid_index.contains_key(&value.oid) => {}
            kind => {
                self.register(value, false);
                match kind {
                    ObservedKind::Plain(literal) => self.push_plain(value.oid, literal.clone()),
                    ObservedKind::ClassCarrier => {
                        self.push_plain(value.oid, Literal::Class(value.class_name.clone()));
                    }
                    ObservedKind::Opaque { payload } => {
                        let slot = payload
                            .clone()
                            .map_or(Arg::Null, |p| Arg::Value(Literal::Str(p)));
                        self.push_pseudo(value.oid, NOT_OBSERVED_INIT, slot);
                    }
                    // an unseen instance was constructed before capture started
                    ObservedKind::Instance => {
                        debug!(oid = %value.oid, class = %value.class_name, "instance without constructor");
                        self.push_pseudo(value.oid, NOT_OBSERVED_INIT, Arg::Null);
                    }
                    _ => {}
                }
            }
        }
    }

    fn push_container(&mut self, container: &Observed, method: &str, slots: Vec<Arg>) {
        // registered after its elements, so creation points at this record
        self.register(container, false);
        self.push(container.oid, PSEUDO_CAPTURE_ID, method, EMPTY_DESC, slots, false);
        self.log_end(PSEUDO_CAPTURE_ID, container.oid, None);
    }

    fn push_plain(&mut self, oid: Oid, literal: Literal) {
        self.push_pseudo(oid, PLAIN_INIT, Arg::Value(literal));
    }

    fn push_pseudo(&mut self, oid: Oid, method: &str, slot: Arg) {
        self.push(oid, PSEUDO_CAPTURE_ID, method, EMPTY_DESC, vec![slot], false);
        self.log_end(PSEUDO_CAPTURE_ID, oid, None);
    }

    fn push(
        &mut self,
        oid: Oid,
        capture_id: i32,
        method: &str,
        desc: &str,
        args: Vec<Arg>,
        is_static: bool,
    ) {
        self.object_ids.push(oid);
        self.capture_ids.push(capture_id);
        self.method_names.push(method.to_string());
        self.desc_list.push(desc.to_string());
        self.params.push(args);
        self.return_values.push(ReturnValue::Void);
        self.is_static_call_list.push(is_static);
    }

    /// Register first sight of `observed`; returns whether the table changed.
    fn register(&mut self, observed: &Observed, replace: bool) -> bool {
        let next = self.len();
        if let Some(&i) = self.oid_index.get(&observed.oid) {
            if replace {
                self.oid_infos[i].progress = Progress::CreatedAt(next);
                return true;
            }
            return false;
        }
        self.insert_info(
            observed.oid,
            observed.class_name.clone(),
            Progress::CreatedAt(next),
        );
        true
    }

    fn insert_info(&mut self, oid: Oid, class_name: String, progress: Progress) {
        self.oid_index.insert(oid, self.oid_infos.len());
        self.oid_infos.push(OidInfo {
            oid,
            class_name,
            progress,
        });
    }

    fn rebuild_index(&mut self) -> Result<()> {
        self.oid_index.clear();
        for (i, info) in self.oid_infos.iter().enumerate() {
            if self.oid_index.insert(info.oid, i).is_some() {
                return Err(CarverError::malformed(
                    info.progress.record().unwrap_or(0),
                    format!("oid {} appears twice in the info table", info.oid),
                ));
            }
        }
        Ok(())
    }

    fn check_columns(&self) -> Result<()> {
        let n = self.object_ids.len();
        let lengths = [
            self.capture_ids.len(),
            self.method_names.len(),
            self.params.len(),
            self.return_values.len(),
            self.is_static_call_list.len(),
            self.desc_list.len(),
        ];
        if let Some(bad) = lengths.iter().find(|&&len| len != n) {
            return Err(CarverError::malformed(
                n.min(*bad),
                format!("column length mismatch ({bad} vs {n} records)"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for CaptureLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DELIM: &str = "\t|\t";
        const RULE: &str = "-------------------------------------------------------------------";

        writeln!(f, "LOG:")?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "RECNO{DELIM}OID{DELIM}CID{DELIM}METHOD{DELIM}PARAMS{DELIM}RETURN{DELIM}IS STATIC{DELIM}DESC{DELIM}ACCESSED FIELDS"
        )?;
        writeln!(f, "{RULE}")?;
        for r in self.records() {
            let params: Vec<String> = r
                .args
                .iter()
                .map(|a| match a {
                    Arg::Null => "null".to_string(),
                    Arg::Oid(oid) => oid.to_string(),
                    Arg::Value(v) => format!("{v:?}"),
                })
                .collect();
            writeln!(
                f,
                "{}{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}[{}]{DELIM}{}{DELIM}{}{DELIM}{}{DELIM}{}",
                r.index,
                r.oid,
                r.capture_id,
                r.method,
                params.join(", "),
                r.ret,
                r.is_static,
                r.desc,
                self.accessed_field(r.capture_id).unwrap_or("null"),
            )?;
        }
        writeln!(f)?;
        writeln!(f, "META INF:")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "OID{DELIM}PROGRESS{DELIM}OID CLASS")?;
        writeln!(f, "{RULE}")?;
        for info in &self.oid_infos {
            writeln!(
                f,
                "{}{DELIM}{:?}{DELIM}{}",
                info.oid, info.progress, info.class_name
            )?;
        }
        Ok(())
    }
}
