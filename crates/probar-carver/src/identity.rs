//! Object-identity tracking.
//!
//! Maps OIDs to the variables that hold them in generated code. Names are
//! handed out as `var0, var1, ...` in the order objects are first needed by
//! the resolver, which is emission order rather than creation order.

use crate::capture::{JavaType, Oid};
use crate::error::{CarverError, Result};
use std::collections::HashMap;

/// A declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Variable name
    pub name: String,
    /// Most specific static type known for the object
    pub ty: JavaType,
}

/// OID to variable bookkeeping for one generation run.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    bindings: HashMap<Oid, Binding>,
    counter: usize,
}

impl Tracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a fresh variable for `oid`.
    ///
    /// # Errors
    ///
    /// Returns [`CarverError::AlreadyDeclared`] if `oid` already has one.
    pub fn declare(&mut self, oid: Oid, ty: JavaType) -> Result<String> {
        if let Some(existing) = self.bindings.get(&oid) {
            return Err(CarverError::AlreadyDeclared {
                oid,
                variable: existing.name.clone(),
            });
        }
        let name = format!("var{}", self.counter);
        self.counter += 1;
        self.bindings.insert(
            oid,
            Binding {
                name: name.clone(),
                ty,
            },
        );
        Ok(name)
    }

    /// Whether `oid` has a variable.
    #[must_use]
    pub fn is_declared(&self, oid: Oid) -> bool {
        self.bindings.contains_key(&oid)
    }

    /// Variable name of `oid`.
    #[must_use]
    pub fn variable_of(&self, oid: Oid) -> Option<&str> {
        self.bindings.get(&oid).map(|b| b.name.as_str())
    }

    /// Static type of `oid`.
    #[must_use]
    pub fn type_of(&self, oid: Oid) -> Option<&JavaType> {
        self.bindings.get(&oid).map(|b| &b.ty)
    }

    /// Binding of `oid`, failing if it was never declared.
    pub fn require(&self, oid: Oid) -> Result<&Binding> {
        self.bindings
            .get(&oid)
            .ok_or(CarverError::Undeclared { oid })
    }

    /// Number of declared variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing was declared yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Forget all variables and restart numbering at `var0`.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.counter = 0;
    }
}
