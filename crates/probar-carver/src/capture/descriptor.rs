//! JVM descriptor parsing.
//!
//! Records carry the raw descriptor of the call or field they describe,
//! e.g. `(Ljava/lang/String;I)V` or `[J`.

use crate::error::{CarverError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Java type as named in descriptors and in the OID info table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JavaType {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `void` (return position only)
    Void,
    /// Reference type, binary name with dots (`java.util.Map$Entry`)
    Object(String),
    /// Array of the element type
    Array(Box<JavaType>),
}

impl JavaType {
    /// Reference type from a binary or simple name.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::Object(name.into())
    }

    /// Parse a single field descriptor (`I`, `Ljava/lang/String;`, `[[D`).
    pub fn parse_descriptor(descriptor: &str) -> Result<Self> {
        let mut cursor = Cursor::new(descriptor);
        let ty = cursor.next_type()?;
        if !cursor.is_done() {
            return Err(invalid(descriptor, "trailing characters"));
        }
        Ok(ty)
    }

    /// Parse a type name as written in the info table.
    ///
    /// Accepts primitive keywords, `Class.getName()` style array names
    /// (`[Ljava.lang.String;`), source style arrays (`int[]`) and plain class
    /// names.
    pub fn from_type_name(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(CarverError::UnresolvedType {
                name: name.to_string(),
            });
        }
        if name.starts_with('[') {
            return Self::parse_descriptor(&name.replace('.', "/"));
        }
        if let Some(element) = name.strip_suffix("[]") {
            return Ok(Self::Array(Box::new(Self::from_type_name(element)?)));
        }
        Ok(match name {
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "char" => Self::Char,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "void" => Self::Void,
            other => Self::Object(other.replace('/', ".")),
        })
    }

    /// Whether this is a primitive (including `void`).
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        !matches!(self, Self::Object(_) | Self::Array(_))
    }

    /// The wrapper class for a primitive, fully qualified.
    #[must_use]
    pub const fn boxed_name(&self) -> Option<&'static str> {
        match self {
            Self::Boolean => Some("java.lang.Boolean"),
            Self::Byte => Some("java.lang.Byte"),
            Self::Char => Some("java.lang.Character"),
            Self::Short => Some("java.lang.Short"),
            Self::Int => Some("java.lang.Integer"),
            Self::Long => Some("java.lang.Long"),
            Self::Float => Some("java.lang.Float"),
            Self::Double => Some("java.lang.Double"),
            _ => None,
        }
    }

    /// Primitive keyword, if primitive.
    #[must_use]
    pub const fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::Boolean => Some("boolean"),
            Self::Byte => Some("byte"),
            Self::Char => Some("char"),
            Self::Short => Some("short"),
            Self::Int => Some("int"),
            Self::Long => Some("long"),
            Self::Float => Some("float"),
            Self::Double => Some("double"),
            Self::Void => Some("void"),
            _ => None,
        }
    }

    /// Name as it must appear in Java source (`int[]`, `java.util.Map.Entry`).
    #[must_use]
    pub fn source_name(&self) -> String {
        match self {
            Self::Object(name) => name.replace('$', "."),
            Self::Array(element) => format!("{}[]", element.source_name()),
            primitive => primitive.keyword().unwrap_or("void").to_string(),
        }
    }

    /// Name used by `Class.forName`, i.e. the binary name (`[I` for arrays).
    #[must_use]
    pub fn binary_name(&self) -> String {
        match self {
            Self::Object(name) => name.clone(),
            Self::Array(_) => self.descriptor().replace('/', "."),
            primitive => primitive.keyword().unwrap_or("void").to_string(),
        }
    }

    /// Descriptor form of this type.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            Self::Boolean => "Z".to_string(),
            Self::Byte => "B".to_string(),
            Self::Char => "C".to_string(),
            Self::Short => "S".to_string(),
            Self::Int => "I".to_string(),
            Self::Long => "J".to_string(),
            Self::Float => "F".to_string(),
            Self::Double => "D".to_string(),
            Self::Void => "V".to_string(),
            Self::Object(name) => format!("L{};", name.replace('.', "/")),
            Self::Array(element) => format!("[{}", element.descriptor()),
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source_name())
    }
}

/// Parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Formal parameter types
    pub params: Vec<JavaType>,
    /// Return type
    pub ret: JavaType,
}

impl MethodDescriptor {
    /// Parse `(params)ret`.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut cursor = Cursor::new(descriptor);
        if !cursor.eat('(') {
            return Err(invalid(descriptor, "method descriptor must start with '('"));
        }
        let mut params = Vec::new();
        while !cursor.eat(')') {
            if cursor.is_done() {
                return Err(invalid(descriptor, "unterminated parameter list"));
            }
            let param = cursor.next_type()?;
            if param == JavaType::Void {
                return Err(invalid(descriptor, "void is not a parameter type"));
            }
            params.push(param);
        }
        let ret = cursor.next_type()?;
        if !cursor.is_done() {
            return Err(invalid(descriptor, "trailing characters"));
        }
        Ok(Self { params, ret })
    }
}

fn invalid(descriptor: &str, reason: &str) -> CarverError {
    CarverError::InvalidDescriptor {
        descriptor: descriptor.to_string(),
        reason: reason.to_string(),
    }
}

struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn next_type(&mut self) -> Result<JavaType> {
        let Some(c) = self.peek() else {
            return Err(invalid(self.source, "unexpected end"));
        };
        self.pos += c.len_utf8();
        Ok(match c {
            'Z' => JavaType::Boolean,
            'B' => JavaType::Byte,
            'C' => JavaType::Char,
            'S' => JavaType::Short,
            'I' => JavaType::Int,
            'J' => JavaType::Long,
            'F' => JavaType::Float,
            'D' => JavaType::Double,
            'V' => JavaType::Void,
            '[' => {
                let element = self.next_type()?;
                if element == JavaType::Void {
                    return Err(invalid(self.source, "array of void"));
                }
                JavaType::Array(Box::new(element))
            }
            'L' => {
                let rest = &self.source[self.pos..];
                let end = rest
                    .find(';')
                    .ok_or_else(|| invalid(self.source, "unterminated class name"))?;
                if end == 0 {
                    return Err(invalid(self.source, "empty class name"));
                }
                let name = rest[..end].replace('/', ".");
                self.pos += end + 1;
                JavaType::Object(name)
            }
            other => {
                return Err(invalid(
                    self.source,
                    &format!("unexpected character '{other}'"),
                ))
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_method_descriptor() {
        let desc = MethodDescriptor::parse("(Ljava/lang/String;I[J)V").unwrap();
        assert_eq!(
            desc.params,
            vec![
                JavaType::object("java.lang.String"),
                JavaType::Int,
                JavaType::Array(Box::new(JavaType::Long)),
            ]
        );
        assert_eq!(desc.ret, JavaType::Void);
    }

    #[test]
    fn parse_empty_method_descriptor() {
        let desc = MethodDescriptor::parse("()V").unwrap();
        assert!(desc.params.is_empty());
    }

    #[test]
    fn reject_bad_descriptors() {
        assert!(MethodDescriptor::parse("V").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("(Ljava/lang/String)V").is_err());
        assert!(MethodDescriptor::parse("(V)V").is_err());
        assert!(JavaType::parse_descriptor("Q").is_err());
        assert!(JavaType::parse_descriptor("II").is_err());
    }

    #[test]
    fn type_names_from_info_table() {
        assert_eq!(JavaType::from_type_name("int").unwrap(), JavaType::Int);
        assert_eq!(
            JavaType::from_type_name("[Ljava.lang.String;").unwrap(),
            JavaType::Array(Box::new(JavaType::object("java.lang.String")))
        );
        assert_eq!(
            JavaType::from_type_name("double[][]").unwrap().source_name(),
            "double[][]"
        );
        assert!(JavaType::from_type_name("").is_err());
    }

    #[test]
    fn source_and_binary_names() {
        let inner = JavaType::object("com.example.Outer$Inner");
        assert_eq!(inner.source_name(), "com.example.Outer.Inner");
        assert_eq!(inner.binary_name(), "com.example.Outer$Inner");
        let arr = JavaType::Array(Box::new(JavaType::object("a.B")));
        assert_eq!(arr.binary_name(), "[La.B;");
        assert_eq!(arr.descriptor(), "[La/B;");
    }

    #[test]
    fn boxing() {
        assert_eq!(JavaType::Int.boxed_name(), Some("java.lang.Integer"));
        assert_eq!(JavaType::object("x.Y").boxed_name(), None);
        assert!(JavaType::Char.is_primitive());
    }
}
