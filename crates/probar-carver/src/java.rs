//! Java syntax tree and printer.
//!
//! Only the constructs generated tests need are representable. Printing is
//! deterministic: the same tree always yields the same source text.

use std::fmt::Write as _;

/// A `.java` file with one top-level class.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    /// Package (`None` or empty for the default package)
    pub package: Option<String>,
    /// Imported types, in insertion order without duplicates
    pub imports: Vec<String>,
    /// The class
    pub class: ClassDecl,
}

impl CompilationUnit {
    /// Unit with one empty public class.
    #[must_use]
    pub fn new(package: Option<String>, class_name: impl Into<String>) -> Self {
        Self {
            package,
            imports: Vec::new(),
            class: ClassDecl {
                modifiers: vec![Modifier::Public],
                name: class_name.into(),
                fields: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    /// Add an import unless present.
    pub fn import(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.imports.contains(&name) {
            self.imports.push(name);
        }
    }

    /// Render as Java source.
    #[must_use]
    pub fn render(&self) -> String {
        let mut p = Printer::default();
        p.unit(self);
        p.out
    }
}

/// Class declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// Modifiers
    pub modifiers: Vec<Modifier>,
    /// Simple name
    pub name: String,
    /// Fields
    pub fields: Vec<FieldDecl>,
    /// Methods
    pub methods: Vec<MethodDecl>,
}

/// Field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Modifiers
    pub modifiers: Vec<Modifier>,
    /// Type as written in source
    pub ty: String,
    /// Field name
    pub name: String,
    /// Initializer
    pub init: Option<Expr>,
}

/// Method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    /// Annotations without `@`
    pub annotations: Vec<String>,
    /// Modifiers
    pub modifiers: Vec<Modifier>,
    /// Return type as written in source
    pub ret: String,
    /// Method name
    pub name: String,
    /// `(type, name)` parameters
    pub params: Vec<(String, String)>,
    /// Thrown exception types
    pub throws: Vec<String>,
    /// Body
    pub body: Vec<Stmt>,
}

/// Declaration modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// `public`
    Public,
    /// `private`
    Private,
    /// `static`
    Static,
    /// `final`
    Final,
}

impl Modifier {
    /// Keyword text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Static => "static",
            Self::Final => "final",
        }
    }
}

/// Statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `T name = init;` or `T name;`
    Declare {
        /// Type as written in source
        ty: String,
        /// Variable name
        name: String,
        /// Initializer
        init: Option<Expr>,
    },
    /// `target = value;`
    Assign {
        /// Assigned location
        target: Expr,
        /// New value
        value: Expr,
    },
    /// `expr;`
    Expr(Expr),
    /// `try { body } catch (T var) { handler }`
    Try {
        /// Protected statements
        body: Vec<Stmt>,
        /// Caught type
        catch_ty: String,
        /// Catch variable
        catch_var: String,
        /// Handler statements
        handler: Vec<Stmt>,
    },
    /// `return expr;`
    Return(Option<Expr>),
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// `int` literal (also used for `byte`/`short` constants)
    Int(i64),
    /// `long` literal, printed with `L`
    Long(i64),
    /// `float` literal, printed with `f`
    Float(f32),
    /// `double` literal, printed with `d`
    Double(f64),
    /// Character literal
    Char(char),
    /// String literal
    Str(String),
    /// `T.class`
    ClassLit(String),
    /// Simple or qualified name
    Name(String),
    /// `target.name`
    Field {
        /// Qualifier
        target: Box<Expr>,
        /// Field name
        name: String,
    },
    /// `[target.]name(args)`
    Call {
        /// Qualifier
        target: Option<Box<Expr>>,
        /// Method name
        name: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `new T(args)`
    New {
        /// Instantiated type
        ty: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `outer.new T(args)` for a non-static inner class
    InnerNew {
        /// Enclosing instance
        outer: Box<Expr>,
        /// Simple name of the inner class
        ty: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `new T[len]` where `elem` may itself be an array type
    NewArray {
        /// Element type as written in source
        elem: String,
        /// Length of the outermost dimension
        len: usize,
    },
    /// `new T[] {items}`
    ArrayLit {
        /// Element type as written in source
        elem: String,
        /// Items
        items: Vec<Expr>,
    },
    /// `target[index]`
    Index {
        /// Array
        target: Box<Expr>,
        /// Index
        index: usize,
    },
    /// `(T) expr`
    Cast {
        /// Target type as written in source
        ty: String,
        /// Operand
        expr: Box<Expr>,
    },
}

impl Expr {
    /// Name expression.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// String literal.
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// `self.name`.
    #[must_use]
    pub fn dot(self, name: impl Into<String>) -> Self {
        Self::Field {
            target: Box::new(self),
            name: name.into(),
        }
    }

    /// `self.name(args)`.
    #[must_use]
    pub fn call(self, name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call {
            target: Some(Box::new(self)),
            name: name.into(),
            args,
        }
    }

    /// Unqualified `name(args)`.
    #[must_use]
    pub fn invoke(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call {
            target: None,
            name: name.into(),
            args,
        }
    }

    /// `(ty) self`.
    #[must_use]
    pub fn cast(self, ty: impl Into<String>) -> Self {
        Self::Cast {
            ty: ty.into(),
            expr: Box::new(self),
        }
    }
}

impl Stmt {
    /// `ty name = init;`
    #[must_use]
    pub fn declare(ty: impl Into<String>, name: impl Into<String>, init: Expr) -> Self {
        Self::Declare {
            ty: ty.into(),
            name: name.into(),
            init: Some(init),
        }
    }

    /// `target = value;`
    #[must_use]
    pub const fn assign(target: Expr, value: Expr) -> Self {
        Self::Assign { target, value }
    }

    /// `expr;`
    #[must_use]
    pub const fn expr(expr: Expr) -> Self {
        Self::Expr(expr)
    }
}

/// Escape a string for use inside a Java string literal.
#[must_use]
pub fn escape_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        escape_char_into(&mut out, c, '"');
    }
    out
}

fn escape_char_into(out: &mut String, c: char, quote: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\u{8}' => out.push_str("\\b"),
        '\u{c}' => out.push_str("\\f"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if c.is_control() => {
            let _ = write!(out, "\\u{:04x}", u32::from(c));
        }
        c if u32::from(c) > 0xFFFF => {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
        c => out.push(c),
    }
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn unit(&mut self, unit: &CompilationUnit) {
        if let Some(package) = unit.package.as_deref().filter(|p| !p.is_empty()) {
            self.line(&format!("package {package};"));
            self.out.push('\n');
        }
        for import in &unit.imports {
            self.line(&format!("import {import};"));
        }
        if !unit.imports.is_empty() {
            self.out.push('\n');
        }
        self.class(&unit.class);
    }

    fn class(&mut self, class: &ClassDecl) {
        self.line(&format!("{}class {} {{", modifiers(&class.modifiers), class.name));
        self.depth += 1;
        for field in &class.fields {
            let init = field
                .init
                .as_ref()
                .map(|e| format!(" = {}", expr(e)))
                .unwrap_or_default();
            self.line(&format!(
                "{}{} {}{init};",
                modifiers(&field.modifiers),
                field.ty,
                field.name
            ));
        }
        for (i, method) in class.methods.iter().enumerate() {
            if i > 0 || !class.fields.is_empty() {
                self.out.push('\n');
            }
            self.method(method);
        }
        self.depth -= 1;
        self.line("}");
    }

    fn method(&mut self, method: &MethodDecl) {
        for annotation in &method.annotations {
            self.line(&format!("@{annotation}"));
        }
        let params = method
            .params
            .iter()
            .map(|(ty, name)| format!("{ty} {name}"))
            .collect::<Vec<_>>()
            .join(", ");
        let throws = if method.throws.is_empty() {
            String::new()
        } else {
            format!(" throws {}", method.throws.join(", "))
        };
        self.line(&format!(
            "{}{} {}({params}){throws} {{",
            modifiers(&method.modifiers),
            method.ret,
            method.name
        ));
        self.block(&method.body);
        self.line("}");
    }

    fn block(&mut self, stmts: &[Stmt]) {
        self.depth += 1;
        for s in stmts {
            self.stmt(s);
        }
        self.depth -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declare { ty, name, init } => match init {
                Some(init) => self.line(&format!("{ty} {name} = {};", expr(init))),
                None => self.line(&format!("{ty} {name};")),
            },
            Stmt::Assign { target, value } => {
                self.line(&format!("{} = {};", expr(target), expr(value)));
            }
            Stmt::Expr(e) => self.line(&format!("{};", expr(e))),
            Stmt::Try {
                body,
                catch_ty,
                catch_var,
                handler,
            } => {
                self.line("try {");
                self.block(body);
                self.line(&format!("}} catch ({catch_ty} {catch_var}) {{"));
                self.block(handler);
                self.line("}");
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(e)) => self.line(&format!("return {};", expr(e))),
        }
    }
}

fn modifiers(mods: &[Modifier]) -> String {
    mods.iter().map(|m| format!("{} ", m.as_str())).collect()
}

fn join(items: &[Expr]) -> String {
    items.iter().map(expr).collect::<Vec<_>>().join(", ")
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Null => "null".to_string(),
        Expr::Bool(b) => b.to_string(),
        Expr::Int(v) => v.to_string(),
        Expr::Long(v) => format!("{v}L"),
        Expr::Float(v) => {
            if v.is_nan() {
                "Float.NaN".to_string()
            } else if v.is_infinite() {
                let sign = if *v > 0.0 { "POSITIVE" } else { "NEGATIVE" };
                format!("Float.{sign}_INFINITY")
            } else {
                format!("{v:?}f")
            }
        }
        Expr::Double(v) => {
            if v.is_nan() {
                "Double.NaN".to_string()
            } else if v.is_infinite() {
                let sign = if *v > 0.0 { "POSITIVE" } else { "NEGATIVE" };
                format!("Double.{sign}_INFINITY")
            } else {
                format!("{v:?}d")
            }
        }
        Expr::Char(c) => {
            let mut out = String::from("'");
            escape_char_into(&mut out, *c, '\'');
            out.push('\'');
            out
        }
        Expr::Str(s) => format!("\"{}\"", escape_str(s)),
        Expr::ClassLit(ty) => format!("{ty}.class"),
        Expr::Name(name) => name.clone(),
        Expr::Field { target, name } => format!("{}.{name}", expr(target)),
        Expr::Call { target, name, args } => match target {
            Some(t) => format!("{}.{name}({})", expr(t), join(args)),
            None => format!("{name}({})", join(args)),
        },
        Expr::New { ty, args } => format!("new {ty}({})", join(args)),
        Expr::InnerNew { outer, ty, args } => {
            format!("{}.new {ty}({})", expr(outer), join(args))
        }
        Expr::NewArray { elem, len } => match elem.find('[') {
            Some(dims) => format!("new {}[{len}]{}", &elem[..dims], &elem[dims..]),
            None => format!("new {elem}[{len}]"),
        },
        Expr::ArrayLit { elem, items } => {
            if items.is_empty() {
                format!("new {elem}[] {{}}")
            } else {
                format!("new {elem}[] {{{}}}", join(items))
            }
        }
        Expr::Index { target, index } => format!("{}[{index}]", expr(target)),
        Expr::Cast { ty, expr: inner } => format!("({ty}) {}", expr(inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_unit_shape() {
        let mut unit = CompilationUnit::new(Some("com.example".to_string()), "PersonTest");
        unit.import("org.junit.Test");
        unit.import("org.junit.Test");
        unit.class.methods.push(MethodDecl {
            annotations: vec!["Test".to_string()],
            modifiers: vec![Modifier::Public],
            ret: "void".to_string(),
            name: "test0".to_string(),
            params: Vec::new(),
            throws: vec!["Exception".to_string()],
            body: vec![Stmt::declare(
                "Person",
                "var0",
                Expr::New {
                    ty: "Person".to_string(),
                    args: Vec::new(),
                },
            )],
        });
        let expected = "\
package com.example;

import org.junit.Test;

public class PersonTest {
    @Test
    public void test0() throws Exception {
        Person var0 = new Person();
    }
}
";
        assert_eq!(unit.render(), expected);
    }

    #[test]
    fn render_try_catch() {
        let mut unit = CompilationUnit::new(None, "T");
        unit.class.methods.push(MethodDecl {
            annotations: Vec::new(),
            modifiers: Vec::new(),
            ret: "void".to_string(),
            name: "m".to_string(),
            params: vec![("String".to_string(), "s".to_string())],
            throws: Vec::new(),
            body: vec![Stmt::Try {
                body: vec![Stmt::expr(Expr::name("var0").call("run", Vec::new()))],
                catch_ty: "Throwable".to_string(),
                catch_var: "t".to_string(),
                handler: Vec::new(),
            }],
        });
        let out = unit.render();
        assert!(out.contains("void m(String s) {\n"));
        assert!(out.contains("        try {\n            var0.run();\n        } catch (Throwable t) {\n        }\n"));
    }

    mod literal_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_numeric_suffixes() {
            assert_eq!(expr(&Expr::Long(5)), "5L");
            assert_eq!(expr(&Expr::Double(1.0)), "1.0d");
            assert_eq!(expr(&Expr::Float(2.5)), "2.5f");
            assert_eq!(expr(&Expr::Int(-3)), "-3");
            assert_eq!(expr(&Expr::Double(f64::NAN)), "Double.NaN");
            assert_eq!(expr(&Expr::Float(f32::NEG_INFINITY)), "Float.NEGATIVE_INFINITY");
        }

        #[test]
        fn test_string_escapes() {
            assert_eq!(expr(&Expr::str("a\"b\\c\n")), r#""a\"b\\c\n""#);
            assert_eq!(expr(&Expr::str("\u{1}")), r#""\u0001""#);
            assert_eq!(expr(&Expr::str("it's")), r#""it's""#);
        }

        #[test]
        fn test_char_escapes() {
            assert_eq!(expr(&Expr::Char('\'')), r"'\''");
            assert_eq!(expr(&Expr::Char('"')), "'\"'");
            assert_eq!(expr(&Expr::Char('x')), "'x'");
        }
    }

    #[test]
    fn render_arrays_and_casts() {
        assert_eq!(
            expr(&Expr::NewArray {
                elem: "int[]".to_string(),
                len: 3
            }),
            "new int[3][]"
        );
        assert_eq!(
            expr(&Expr::ArrayLit {
                elem: "Object".to_string(),
                items: vec![Expr::name("var1"), Expr::Null]
            }),
            "new Object[] {var1, null}"
        );
        assert_eq!(
            expr(&Expr::ArrayLit {
                elem: "Class".to_string(),
                items: Vec::new()
            }),
            "new Class[] {}"
        );
        assert_eq!(expr(&Expr::name("var1").cast("int")), "(int) var1");
        assert_eq!(
            expr(&Expr::InnerNew {
                outer: Box::new(Expr::name("var0")),
                ty: "Pet".to_string(),
                args: vec![Expr::name("var1")],
            }),
            "var0.new Pet(var1)"
        );
        assert_eq!(
            expr(&Expr::invoke("getField", vec![Expr::str("A")]).cast("Person")),
            "(Person) getField(\"A\")"
        );
    }
}
