//! Statement intents.
//!
//! The resolver decides *what* has to happen (declare this literal, call
//! that method) and hands the decision over as an [`Intent`] whose OIDs are
//! already mapped to variables. Turning an intent into target-language
//! syntax is the emitter's job.

use crate::capture::{JavaType, Literal};

/// A variable holding a tracked object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    /// Variable name
    pub name: String,
    /// Declared static type
    pub ty: JavaType,
}

impl VarRef {
    /// Create a variable reference.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: JavaType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An operand: `null` or a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgRef {
    /// `null`
    Null,
    /// Declared variable
    Var(VarRef),
}

impl ArgRef {
    /// Variable name, if not `null`.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Null => None,
            Self::Var(var) => Some(&var.name),
        }
    }
}

/// Receiver of a call or field access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// Instance receiver
    Var(VarRef),
    /// Static access qualified by a class (binary name)
    Static(String),
}

/// One resolved statement to emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// `T v = <literal>;`
    Literal {
        /// Originating record
        record: usize,
        /// Declared variable
        target: VarRef,
        /// Value
        value: Literal,
    },
    /// Object restored from its serialized form.
    Deserialize {
        /// Originating record
        record: usize,
        /// Variable receiving the object
        target: VarRef,
        /// Serialized payload (`None` if the object could not be serialized)
        payload: Option<String>,
        /// `false` when an existing variable is reassigned
        declare: bool,
    },
    /// `T v = new T(args);` or, for an inner class, `T v = outer.new T(args);`
    Construct {
        /// Originating record
        record: usize,
        /// Declared variable
        target: VarRef,
        /// Constructor descriptor
        desc: String,
        /// Enclosing instance of a non-static inner class
        outer: Option<VarRef>,
        /// Arguments, without the enclosing instance
        args: Vec<ArgRef>,
    },
    /// `[R r =] recv.m(args);`
    Call {
        /// Originating record
        record: usize,
        /// Receiver
        receiver: Receiver,
        /// Declaring class used for visibility checks (binary name)
        owner: String,
        /// Method name
        method: String,
        /// Method descriptor
        desc: String,
        /// Arguments
        args: Vec<ArgRef>,
        /// Variable declared for the returned object
        result: Option<VarRef>,
    },
    /// `F v = recv.f;`
    FieldRead {
        /// Originating record
        record: usize,
        /// Receiver
        receiver: Receiver,
        /// Declaring class (binary name)
        owner: String,
        /// Field name
        field: String,
        /// Field descriptor
        desc: String,
        /// Declared variable
        target: VarRef,
    },
    /// `recv.f = value;`
    FieldWrite {
        /// Originating record
        record: usize,
        /// Receiver
        receiver: Receiver,
        /// Declaring class (binary name)
        owner: String,
        /// Field name
        field: String,
        /// Field descriptor
        desc: String,
        /// Written value
        value: ArgRef,
    },
    /// `T[] v = new T[n]; v[i] = e;`
    ArrayInit {
        /// Originating record
        record: usize,
        /// Array variable
        target: VarRef,
        /// Elements in index order
        elements: Vec<ArgRef>,
        /// `false` when an existing array is refilled
        declare: bool,
    },
    /// `C v = new C(); v.add(e);`
    CollectionInit {
        /// Originating record
        record: usize,
        /// Collection variable (its type is the class instantiated)
        target: VarRef,
        /// Elements in insertion order
        elements: Vec<ArgRef>,
        /// `false` when an existing collection is cleared and refilled
        declare: bool,
    },
    /// `M v = new M(); v.put(k, e);`
    MapInit {
        /// Originating record
        record: usize,
        /// Map variable (its type is the class instantiated)
        target: VarRef,
        /// Key/value pairs in insertion order
        entries: Vec<(ArgRef, ArgRef)>,
        /// `false` when an existing map is cleared and refilled
        declare: bool,
    },
}

impl Intent {
    /// Record the intent was derived from.
    #[must_use]
    pub const fn record(&self) -> usize {
        match self {
            Self::Literal { record, .. }
            | Self::Deserialize { record, .. }
            | Self::Construct { record, .. }
            | Self::Call { record, .. }
            | Self::FieldRead { record, .. }
            | Self::FieldWrite { record, .. }
            | Self::ArrayInit { record, .. }
            | Self::CollectionInit { record, .. }
            | Self::MapInit { record, .. } => *record,
        }
    }

    /// Variable this intent declares, if any.
    #[must_use]
    pub fn declares(&self) -> Option<&VarRef> {
        match self {
            Self::Literal { target, .. }
            | Self::Construct { target, .. }
            | Self::FieldRead { target, .. } => Some(target),
            Self::Deserialize {
                target, declare, ..
            }
            | Self::ArrayInit {
                target, declare, ..
            }
            | Self::CollectionInit {
                target, declare, ..
            }
            | Self::MapInit {
                target, declare, ..
            } => declare.then_some(target),
            Self::Call { result, .. } => result.as_ref(),
            Self::FieldWrite { .. } => None,
        }
    }

    /// Variables read by this intent, in operand order.
    #[must_use]
    pub fn uses(&self) -> Vec<&str> {
        fn receiver(r: &Receiver) -> Option<&str> {
            match r {
                Receiver::Var(var) => Some(&var.name),
                Receiver::Static(_) => None,
            }
        }

        // a refilled container reads its own variable first
        fn existing<'a>(target: &'a VarRef, declare: bool) -> Option<&'a str> {
            (!declare).then_some(target.name.as_str())
        }

        match self {
            Self::Literal { .. } => Vec::new(),
            Self::Deserialize {
                target, declare, ..
            } => existing(target, *declare).into_iter().collect(),
            Self::Construct { outer, args, .. } => outer
                .iter()
                .map(|var| var.name.as_str())
                .chain(args.iter().filter_map(ArgRef::name))
                .collect(),
            Self::Call {
                receiver: r, args, ..
            } => receiver(r)
                .into_iter()
                .chain(args.iter().filter_map(ArgRef::name))
                .collect(),
            Self::FieldRead { receiver: r, .. } => receiver(r).into_iter().collect(),
            Self::FieldWrite {
                receiver: r, value, ..
            } => receiver(r).into_iter().chain(value.name()).collect(),
            Self::ArrayInit {
                target,
                elements,
                declare,
                ..
            }
            | Self::CollectionInit {
                target,
                elements,
                declare,
                ..
            } => existing(target, *declare)
                .into_iter()
                .chain(elements.iter().filter_map(ArgRef::name))
                .collect(),
            Self::MapInit {
                target,
                entries,
                declare,
                ..
            } => existing(target, *declare)
                .into_iter()
                .chain(
                    entries
                        .iter()
                        .flat_map(|(k, v)| [k.name(), v.name()])
                        .flatten(),
                )
                .collect(),
        }
    }
}
