//! Type knowledge needed by the emitter.
//!
//! Generated code must decide between plain syntax and reflection helpers,
//! and whether an argument needs a cast. Without a running JVM those
//! questions go to a [`TypeInfo`] oracle. [`TypeTable`] is a static symbol
//! table that can be loaded from YAML or JSON.
//!
//! In permissive mode (the default) unknown classes are treated as public,
//! constructible and living in the package given by their qualified name.
//! In strict mode every reference type outside `java.*`/`javax.*` must be
//! listed, otherwise [`CarverError::UnresolvedType`] is raised.

use crate::capture::{JavaType, OBSERVED_INIT};
use crate::config::load_structured;
use crate::error::{CarverError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// What kind of member a [`MemberRef`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Constructor (`<init>`)
    Constructor,
    /// Method
    Method,
    /// Field
    Field,
}

/// A constructor, method or field of a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Declaring class (binary name)
    pub class: String,
    /// Member kind
    pub kind: MemberKind,
    /// Member name (`<init>` for constructors)
    pub name: String,
    /// Descriptor
    pub desc: String,
}

impl MemberRef {
    /// Constructor of `class` with descriptor `desc`.
    #[must_use]
    pub fn constructor(class: &str, desc: &str) -> Self {
        Self {
            class: class.to_string(),
            kind: MemberKind::Constructor,
            name: OBSERVED_INIT.to_string(),
            desc: desc.to_string(),
        }
    }

    /// Method `name` of `class`.
    #[must_use]
    pub fn method(class: &str, name: &str, desc: &str) -> Self {
        Self {
            class: class.to_string(),
            kind: MemberKind::Method,
            name: name.to_string(),
            desc: desc.to_string(),
        }
    }

    /// Field `name` of `class`.
    #[must_use]
    pub fn field(class: &str, name: &str, desc: &str) -> Self {
        Self {
            class: class.to_string(),
            kind: MemberKind::Field,
            name: name.to_string(),
            desc: desc.to_string(),
        }
    }
}

/// Standard collection used when a recorded collection class cannot be
/// instantiated directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionFamily {
    /// `java.util.Set`
    Set,
    /// `java.util.List`
    List,
    /// `java.util.Queue`
    Queue,
}

impl CollectionFamily {
    /// Default implementation class of the family.
    #[must_use]
    pub const fn fallback_class(self) -> &'static str {
        match self {
            Self::Set => "java.util.HashSet",
            Self::List => "java.util.ArrayList",
            Self::Queue => "java.util.ArrayDeque",
        }
    }
}

/// Capability queries about the program under test.
pub trait TypeInfo {
    /// Resolve a type name as found in the log.
    fn resolve(&self, name: &str) -> Result<JavaType>;

    /// Whether `member` is declared `public`.
    fn is_public(&self, member: &MemberRef) -> Result<bool>;

    /// Package of `class` (empty for the default package).
    fn package_of(&self, class: &str) -> Result<String>;

    /// Whether `class` lives in `package`.
    fn same_package(&self, class: &str, package: &str) -> Result<bool> {
        Ok(self.package_of(class)? == package)
    }

    /// Whether a value of static type `source` can be assigned to `target`
    /// without a cast.
    fn is_assignable(&self, target: &JavaType, source: &JavaType) -> bool;

    /// Whether `class` can be instantiated with a public no-arg constructor.
    fn is_constructible(&self, class: &str) -> bool;

    /// Whether `class` is a non-static inner class, whose constructors take
    /// the enclosing instance as their first argument.
    fn is_inner_instance(&self, _class: &str) -> Result<bool> {
        Ok(false)
    }

    /// Collection family of `class`, used to pick a fallback implementation.
    fn collection_family(&self, class: &str) -> Option<CollectionFamily> {
        let ty = JavaType::object(class);
        let families = [
            ("java.util.Set", CollectionFamily::Set),
            ("java.util.List", CollectionFamily::List),
            ("java.util.Queue", CollectionFamily::Queue),
        ];
        if let Some((_, family)) = families
            .iter()
            .find(|(iface, _)| self.is_assignable(&JavaType::object(*iface), &ty))
        {
            return Some(*family);
        }
        let simple = class.rsplit(['.', '$']).next().unwrap_or(class);
        if simple.ends_with("Set") {
            Some(CollectionFamily::Set)
        } else if simple.ends_with("List") {
            Some(CollectionFamily::List)
        } else if simple.ends_with("Queue") || simple.ends_with("Deque") {
            Some(CollectionFamily::Queue)
        } else {
            None
        }
    }
}

/// Known facts about one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    /// Class is declared `public`
    #[serde(default = "default_true")]
    pub public: bool,
    /// Package override; derived from the qualified name when absent
    #[serde(default)]
    pub package: Option<String>,
    /// Direct supertypes (classes and interfaces)
    #[serde(default)]
    pub supertypes: Vec<String>,
    /// Has a public no-arg constructor
    #[serde(default = "default_true")]
    pub default_constructor: bool,
    /// Members that are not public, as `name` or `name(desc)`
    #[serde(default)]
    pub non_public: Vec<String>,
    /// Non-static inner class
    #[serde(default)]
    pub inner_instance: bool,
}

impl Default for ClassEntry {
    fn default() -> Self {
        Self {
            public: true,
            package: None,
            supertypes: Vec::new(),
            default_constructor: true,
            non_public: Vec::new(),
            inner_instance: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Static symbol table implementing [`TypeInfo`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTable {
    /// Reject unknown classes instead of assuming defaults
    #[serde(default)]
    pub strict: bool,
    /// Known classes by binary name
    #[serde(default)]
    pub classes: BTreeMap<String, ClassEntry>,
}

impl TypeTable {
    /// Empty permissive table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty strict table.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict: true,
            classes: BTreeMap::new(),
        }
    }

    /// Add or replace a class entry.
    #[must_use]
    pub fn with_class(mut self, name: impl Into<String>, entry: ClassEntry) -> Self {
        self.classes.insert(name.into(), entry);
        self
    }

    /// Load a table from a `.yaml`/`.yml`/`.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        load_structured(path.as_ref())
    }

    /// Parse a table from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    fn entry(&self, class: &str) -> Result<Option<&ClassEntry>> {
        let class = canonical_name(class);
        match self.classes.get(class.as_str()) {
            Some(entry) => Ok(Some(entry)),
            None if self.strict && !is_platform_class(&class) => {
                Err(CarverError::UnresolvedType { name: class })
            }
            None => Ok(None),
        }
    }

    fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        let mut pending = vec![canonical_name(sub)];
        let mut seen = Vec::new();
        while let Some(current) = pending.pop() {
            if current == sup {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            if let Some(entry) = self.classes.get(current.as_str()) {
                pending.extend(entry.supertypes.iter().map(|s| canonical_name(s)));
            }
            seen.push(current);
        }
        false
    }
}

impl TypeInfo for TypeTable {
    fn resolve(&self, name: &str) -> Result<JavaType> {
        let ty = JavaType::from_type_name(name)?;
        let mut element = &ty;
        while let JavaType::Array(inner) = element {
            element = inner;
        }
        if let JavaType::Object(class) = element {
            self.entry(class)?;
        }
        Ok(ty)
    }

    fn is_public(&self, member: &MemberRef) -> Result<bool> {
        let Some(entry) = self.entry(&member.class)? else {
            return Ok(true);
        };
        let qualified = format!("{}{}", member.name, member.desc);
        Ok(!entry
            .non_public
            .iter()
            .any(|m| *m == member.name || *m == qualified))
    }

    fn package_of(&self, class: &str) -> Result<String> {
        if let Some(package) = self.entry(class)?.and_then(|e| e.package.clone()) {
            return Ok(package);
        }
        Ok(class
            .rsplit_once('.')
            .map(|(package, _)| package.to_string())
            .unwrap_or_default())
    }

    fn is_assignable(&self, target: &JavaType, source: &JavaType) -> bool {
        match (target, source) {
            (JavaType::Object(t), JavaType::Object(s)) => {
                let (t, s) = (canonical_name(t), canonical_name(s));
                t == s || t == "java.lang.Object" || self.is_subclass(&s, &t)
            }
            (JavaType::Object(t), JavaType::Array(_)) => {
                matches!(
                    canonical_name(t).as_str(),
                    "java.lang.Object" | "java.lang.Cloneable" | "java.io.Serializable"
                )
            }
            (JavaType::Array(t), JavaType::Array(s)) => {
                if t.is_primitive() || s.is_primitive() {
                    t == s
                } else {
                    self.is_assignable(t, s)
                }
            }
            // unboxing
            (t, JavaType::Object(s)) if t.is_primitive() => {
                t.boxed_name() == Some(canonical_name(s).as_str())
            }
            // boxing
            (JavaType::Object(t), s) if s.is_primitive() => {
                let t = canonical_name(t);
                s.boxed_name() == Some(t.as_str()) || t == "java.lang.Object"
            }
            (t, s) => t == s,
        }
    }

    fn is_constructible(&self, class: &str) -> bool {
        match self.entry(class) {
            Ok(Some(entry)) => entry.public && entry.default_constructor,
            Ok(None) => true,
            Err(_) => false,
        }
    }

    fn is_inner_instance(&self, class: &str) -> Result<bool> {
        Ok(self.entry(class)?.is_some_and(|entry| entry.inner_instance))
    }
}

/// Simple `java.lang` names as they appear for plain values in the log.
const JAVA_LANG_SIMPLE: &[&str] = &[
    "Boolean",
    "Byte",
    "Character",
    "Class",
    "Double",
    "Float",
    "Integer",
    "Long",
    "Object",
    "Short",
    "String",
];

/// Qualify bare `java.lang` simple names (`String` becomes `java.lang.String`).
#[must_use]
pub fn canonical_name(name: &str) -> String {
    if JAVA_LANG_SIMPLE.contains(&name) {
        format!("java.lang.{name}")
    } else {
        name.to_string()
    }
}

/// Canonical form of a type for equality checks.
#[must_use]
pub fn canonical_type(ty: &JavaType) -> JavaType {
    match ty {
        JavaType::Object(name) => JavaType::Object(canonical_name(name)),
        JavaType::Array(inner) => JavaType::Array(Box::new(canonical_type(inner))),
        other => other.clone(),
    }
}

fn is_platform_class(name: &str) -> bool {
    name.starts_with("java.") || name.starts_with("javax.")
}

/// Per-member memo of [`TypeInfo::is_public`].
#[derive(Debug, Clone, Default)]
pub struct VisibilityCache {
    entries: HashMap<MemberRef, bool>,
}

impl VisibilityCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `member` is public, asking `types` only on first use.
    pub fn is_public(&mut self, types: &dyn TypeInfo, member: &MemberRef) -> Result<bool> {
        if let Some(&public) = self.entries.get(member) {
            return Ok(public);
        }
        let public = types.is_public(member)?;
        self.entries.insert(member.clone(), public);
        Ok(public)
    }

    /// Number of cached members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all cached answers.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
