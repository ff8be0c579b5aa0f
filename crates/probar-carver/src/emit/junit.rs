//! JUnit test emitter.
//!
//! Lowers intents into a single `@Test` method. Members that are not public
//! and live in another package than the generated test are reached through
//! reflection helpers which are appended once, at the end.

use super::{CodeGenerator, GenerationMode, HelperKind};
use crate::capture::{JavaType, Literal, MethodDescriptor};
use crate::context::GenerationContext;
use crate::error::{CarverError, Result};
use crate::intent::{ArgRef, Intent, Receiver, VarRef};
use crate::java::{CompilationUnit, Expr, FieldDecl, MethodDecl, Modifier, Stmt};
use crate::types::{canonical_type, MemberRef, TypeInfo, VisibilityCache};
use tracing::trace;

/// Output shape of the generated test class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JUnitSettings {
    /// Package of the generated class (empty for the default package)
    pub package: String,
    /// Simple name of the generated class
    pub class_name: String,
    /// Name of the test method
    pub test_method: String,
    /// Class receiving `captureException(record)` in the scaffolded pass
    pub collector_class: String,
    /// Serializer class backing the `XSTREAM` constant
    pub deserializer_class: String,
}

impl Default for JUnitSettings {
    fn default() -> Self {
        Self {
            package: String::new(),
            class_name: "CarvedTest".to_string(),
            test_method: "test".to_string(),
            collector_class: "org.evosuite.testcarver.codegen.PostProcessor".to_string(),
            deserializer_class: "com.thoughtworks.xstream.XStream".to_string(),
        }
    }
}

/// Name of the deserializer constant in generated code.
const DESERIALIZER_FIELD: &str = "XSTREAM";

/// Lowered form of one intent.
struct Lowered {
    /// Variable declared by the statements (`type`, `name`, static type)
    decl: Option<(String, String, JavaType)>,
    stmts: Vec<Stmt>,
    wrappable: bool,
}

/// [`CodeGenerator`] producing a JUnit 4 test class.
pub struct JUnitGenerator<'t> {
    settings: JUnitSettings,
    types: &'t dyn TypeInfo,
    visibility: VisibilityCache,
    unit: Option<CompilationUnit>,
    body: Vec<Stmt>,
    finished: bool,
}

impl std::fmt::Debug for JUnitGenerator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JUnitGenerator")
            .field("settings", &self.settings)
            .field("statements", &self.body.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<'t> JUnitGenerator<'t> {
    /// Create a generator answering type questions through `types`.
    #[must_use]
    pub fn new(settings: JUnitSettings, types: &'t dyn TypeInfo) -> Self {
        Self {
            settings,
            types,
            visibility: VisibilityCache::new(),
            unit: None,
            body: Vec::new(),
            finished: false,
        }
    }

    /// Output settings.
    #[must_use]
    pub const fn settings(&self) -> &JUnitSettings {
        &self.settings
    }

    /// Rendered Java source of the finished unit.
    pub fn source(&self) -> Result<String> {
        Ok(self.code()?.render())
    }

    fn needs_reflection(&mut self, member: &MemberRef) -> Result<bool> {
        if self.visibility.is_public(self.types, member)? {
            return Ok(false);
        }
        let reflective = !self
            .types
            .same_package(&member.class, &self.settings.package)?;
        if reflective {
            trace!(
                class = %member.class,
                member = %member.name,
                "non-public member, using reflection"
            );
        }
        Ok(reflective)
    }

    fn lower(&mut self, intent: &Intent, ctx: &mut GenerationContext) -> Result<Lowered> {
        Ok(match intent {
            Intent::Literal { target, value, .. } => Lowered {
                decl: Some(declaration(target)),
                stmts: vec![assign_var(&target.name, literal(value)?)],
                wrappable: false,
            },
            Intent::Deserialize {
                target,
                payload,
                declare,
                ..
            } => {
                let value = match payload {
                    Some(xml) => {
                        ctx.require(HelperKind::Deserializer);
                        let call = Expr::name(DESERIALIZER_FIELD)
                            .call("fromXML", vec![Expr::str(xml.as_str())]);
                        if canonical_type(&target.ty) == JavaType::object("java.lang.Object") {
                            call
                        } else {
                            call.cast(type_src(&target.ty))
                        }
                    }
                    None => Expr::Null,
                };
                Lowered {
                    decl: declare.then(|| declaration(target)),
                    stmts: vec![assign_var(&target.name, value)],
                    wrappable: true,
                }
            }
            Intent::Construct {
                target,
                desc,
                outer,
                args,
                ..
            } => {
                let owner = target.ty.binary_name();
                let params = MethodDescriptor::parse(desc)?.params;
                let value = if self.needs_reflection(&MemberRef::constructor(&owner, desc))? {
                    ctx.require(HelperKind::NewInstance);
                    // reflective constructors take the enclosing instance explicitly
                    let all: Vec<ArgRef> = outer
                        .iter()
                        .cloned()
                        .map(ArgRef::Var)
                        .chain(args.iter().cloned())
                        .collect();
                    Expr::invoke(
                        "newInstance",
                        vec![
                            Expr::str(owner),
                            object_array(&all),
                            class_array(&params),
                        ],
                    )
                    .cast(type_src(&target.ty))
                } else if let Some(outer) = outer {
                    Expr::InnerNew {
                        outer: Box::new(Expr::name(outer.name.as_str())),
                        ty: inner_name(&owner).to_string(),
                        args: self.cast_args(args, params.get(1..).unwrap_or(&[])),
                    }
                } else {
                    Expr::New {
                        ty: type_src(&target.ty),
                        args: self.cast_args(args, &params),
                    }
                };
                Lowered {
                    decl: Some(declaration(target)),
                    stmts: vec![assign_var(&target.name, value)],
                    wrappable: true,
                }
            }
            Intent::Call {
                receiver,
                owner,
                method,
                desc,
                args,
                result,
                ..
            } => {
                let params = MethodDescriptor::parse(desc)?.params;
                let value = if self.needs_reflection(&MemberRef::method(owner, method, desc))? {
                    ctx.require(HelperKind::CallMethod);
                    let call = Expr::invoke(
                        "callMethod",
                        vec![
                            Expr::str(owner.as_str()),
                            Expr::str(method.as_str()),
                            reflective_receiver(receiver),
                            object_array(args),
                            class_array(&params),
                        ],
                    );
                    match result {
                        Some(var) => call.cast(type_src(&var.ty)),
                        None => call,
                    }
                } else {
                    receiver_expr(receiver).call(method.as_str(), self.cast_args(args, &params))
                };
                match result {
                    Some(var) => Lowered {
                        decl: Some(declaration(var)),
                        stmts: vec![assign_var(&var.name, value)],
                        wrappable: true,
                    },
                    None => Lowered {
                        decl: None,
                        stmts: vec![Stmt::expr(value)],
                        wrappable: true,
                    },
                }
            }
            Intent::FieldRead {
                receiver,
                owner,
                field,
                desc,
                target,
                ..
            } => {
                let value = if self.needs_reflection(&MemberRef::field(owner, field, desc))? {
                    ctx.require(HelperKind::GetField);
                    Expr::invoke(
                        "getField",
                        vec![
                            Expr::str(owner.as_str()),
                            Expr::str(field.as_str()),
                            reflective_receiver(receiver),
                        ],
                    )
                    .cast(type_src(&target.ty))
                } else {
                    receiver_expr(receiver).dot(field.as_str())
                };
                Lowered {
                    decl: Some(declaration(target)),
                    stmts: vec![assign_var(&target.name, value)],
                    wrappable: true,
                }
            }
            Intent::FieldWrite {
                receiver,
                owner,
                field,
                desc,
                value,
                ..
            } => {
                let field_ty = JavaType::parse_descriptor(desc)?;
                let stmt = if self.needs_reflection(&MemberRef::field(owner, field, desc))? {
                    ctx.require(HelperKind::SetField);
                    Stmt::expr(Expr::invoke(
                        "setField",
                        vec![
                            Expr::str(owner.as_str()),
                            Expr::str(field.as_str()),
                            reflective_receiver(receiver),
                            arg_expr(value),
                        ],
                    ))
                } else {
                    let rhs = match value {
                        ArgRef::Var(var)
                            if !field_ty.is_primitive()
                                && !self.types.is_assignable(&field_ty, &var.ty) =>
                        {
                            Expr::name(var.name.as_str()).cast(type_src(&field_ty))
                        }
                        other => arg_expr(other),
                    };
                    Stmt::assign(receiver_expr(receiver).dot(field.as_str()), rhs)
                };
                Lowered {
                    decl: None,
                    stmts: vec![stmt],
                    wrappable: true,
                }
            }
            Intent::ArrayInit {
                target,
                elements,
                declare,
                ..
            } => {
                let JavaType::Array(elem) = &target.ty else {
                    return Err(CarverError::UnresolvedType {
                        name: target.ty.binary_name(),
                    });
                };
                let mut stmts = Vec::with_capacity(elements.len() + 1);
                if *declare {
                    stmts.push(assign_var(
                        &target.name,
                        Expr::NewArray {
                            elem: type_src(elem),
                            len: elements.len(),
                        },
                    ));
                }
                for (index, element) in elements.iter().enumerate() {
                    if matches!(element, ArgRef::Null) && elem.is_primitive() {
                        continue;
                    }
                    stmts.push(Stmt::assign(
                        Expr::Index {
                            target: Box::new(Expr::name(target.name.as_str())),
                            index,
                        },
                        arg_expr(element),
                    ));
                }
                Lowered {
                    decl: declare.then(|| declaration(target)),
                    stmts,
                    wrappable: true,
                }
            }
            Intent::CollectionInit {
                target,
                elements,
                declare,
                ..
            } => {
                let mut stmts = vec![instantiate_or_clear(target, *declare)];
                stmts.extend(elements.iter().map(|e| {
                    Stmt::expr(Expr::name(target.name.as_str()).call("add", vec![arg_expr(e)]))
                }));
                Lowered {
                    decl: declare.then(|| declaration(target)),
                    stmts,
                    wrappable: true,
                }
            }
            Intent::MapInit {
                target,
                entries,
                declare,
                ..
            } => {
                let mut stmts = vec![instantiate_or_clear(target, *declare)];
                stmts.extend(entries.iter().map(|(k, v)| {
                    Stmt::expr(
                        Expr::name(target.name.as_str()).call("put", vec![arg_expr(k), arg_expr(v)]),
                    )
                }));
                Lowered {
                    decl: declare.then(|| declaration(target)),
                    stmts,
                    wrappable: true,
                }
            }
        })
    }

    /// Arguments with a cast wherever the variable's type differs from the
    /// formal parameter and is assignable to it, so overload resolution
    /// picks the recorded member.
    fn cast_args(&self, args: &[ArgRef], params: &[JavaType]) -> Vec<Expr> {
        args.iter()
            .enumerate()
            .map(|(i, arg)| match (arg, params.get(i)) {
                (ArgRef::Var(var), Some(param))
                    if canonical_type(param) != canonical_type(&var.ty)
                        && self.types.is_assignable(param, &var.ty) =>
                {
                    Expr::name(var.name.as_str()).cast(type_src(param))
                }
                (other, _) => arg_expr(other),
            })
            .collect()
    }

    fn handler(&self, ctx: &GenerationContext, record: usize) -> Vec<Stmt> {
        match ctx.mode {
            GenerationMode::PostProcessing => vec![
                Stmt::expr(Expr::name(self.settings.collector_class.as_str()).call(
                    "captureException",
                    vec![Expr::Int(i64::try_from(record).unwrap_or(i64::MAX))],
                )),
                Stmt::expr(Expr::name("t").call("printStackTrace", Vec::new())),
            ],
            GenerationMode::Final => Vec::new(),
        }
    }

    fn deserializer_simple_name(&self) -> &str {
        self.settings
            .deserializer_class
            .rsplit('.')
            .next()
            .unwrap_or(&self.settings.deserializer_class)
    }
}

impl CodeGenerator for JUnitGenerator<'_> {
    type Output = CompilationUnit;

    fn before(&mut self, _ctx: &GenerationContext) -> Result<()> {
        let package = Some(self.settings.package.clone()).filter(|p| !p.is_empty());
        let mut unit = CompilationUnit::new(package, self.settings.class_name.as_str());
        unit.import("org.junit.Test");
        self.unit = Some(unit);
        self.body.clear();
        self.finished = false;
        Ok(())
    }

    fn emit(&mut self, intent: &Intent, ctx: &mut GenerationContext) -> Result<()> {
        if self.unit.is_none() || self.finished {
            return Err(CarverError::invalid_state(
                "emit() called outside before()/after()",
            ));
        }
        let record = intent.record();
        let lowered = self.lower(intent, ctx)?;
        ctx.mark_processed(record);

        if lowered.wrappable && ctx.is_wrapped(record) {
            if let Some((ty, name, static_ty)) = lowered.decl {
                self.body.push(Stmt::declare(ty, name, default_value(&static_ty)));
            }
            let handler = self.handler(ctx, record);
            self.body.push(Stmt::Try {
                body: lowered.stmts,
                catch_ty: "Throwable".to_string(),
                catch_var: "t".to_string(),
                handler,
            });
            return Ok(());
        }

        let mut stmts = lowered.stmts.into_iter();
        if let Some((ty, name, _)) = lowered.decl {
            match stmts.next() {
                Some(Stmt::Assign {
                    target: Expr::Name(assigned),
                    value,
                }) if assigned == name => self.body.push(Stmt::declare(ty, name, value)),
                first => {
                    self.body.push(Stmt::Declare {
                        ty,
                        name,
                        init: None,
                    });
                    self.body.extend(first);
                }
            }
        }
        self.body.extend(stmts);
        Ok(())
    }

    fn after(&mut self, ctx: &GenerationContext) -> Result<()> {
        let body = std::mem::take(&mut self.body);
        let test_method = self.settings.test_method.clone();
        let deserializer = self.deserializer_simple_name().to_string();
        let deserializer_class = self.settings.deserializer_class.clone();
        let unit = self
            .unit
            .as_mut()
            .ok_or_else(|| CarverError::invalid_state("after() called before before()"))?;
        if self.finished {
            return Err(CarverError::invalid_state("after() called twice"));
        }

        unit.class.methods.push(MethodDecl {
            annotations: vec!["Test".to_string()],
            modifiers: vec![Modifier::Public],
            ret: "void".to_string(),
            name: test_method,
            params: Vec::new(),
            throws: vec!["Exception".to_string()],
            body,
        });

        for helper in &ctx.helpers {
            match helper {
                HelperKind::Deserializer => {
                    unit.import(deserializer_class.as_str());
                    unit.class.fields.push(FieldDecl {
                        modifiers: vec![Modifier::Private, Modifier::Static, Modifier::Final],
                        ty: deserializer.clone(),
                        name: DESERIALIZER_FIELD.to_string(),
                        init: Some(Expr::New {
                            ty: deserializer.clone(),
                            args: Vec::new(),
                        }),
                    });
                }
                HelperKind::SetField => {
                    unit.import("java.lang.reflect.Field");
                    unit.class.methods.push(set_field_method());
                }
                HelperKind::GetField => {
                    unit.import("java.lang.reflect.Field");
                    unit.class.methods.push(get_field_method());
                }
                HelperKind::CallMethod => {
                    unit.import("java.lang.reflect.Method");
                    unit.class.methods.push(call_method_method());
                }
                HelperKind::NewInstance => {
                    unit.import("java.lang.reflect.Constructor");
                    unit.class.methods.push(new_instance_method());
                }
            }
        }
        self.finished = true;
        Ok(())
    }

    fn code(&self) -> Result<CompilationUnit> {
        match &self.unit {
            Some(unit) if self.finished => Ok(unit.clone()),
            _ => Err(CarverError::invalid_state("code() requested before after()")),
        }
    }

    fn clear(&mut self) {
        self.visibility.clear();
        self.unit = None;
        self.body.clear();
        self.finished = false;
    }
}

/// Type as written in generated source. `java.lang` types use simple names.
pub(crate) fn type_src(ty: &JavaType) -> String {
    match canonical_type(ty) {
        JavaType::Object(name) => match name.strip_prefix("java.lang.") {
            Some(simple) if !simple.contains('.') => simple.replace('$', "."),
            _ => name.replace('$', "."),
        },
        JavaType::Array(elem) => format!("{}[]", type_src(&elem)),
        primitive => primitive.source_name(),
    }
}

fn declaration(var: &VarRef) -> (String, String, JavaType) {
    (type_src(&var.ty), var.name.clone(), var.ty.clone())
}

fn assign_var(name: &str, value: Expr) -> Stmt {
    Stmt::assign(Expr::name(name), value)
}

/// `v = new T();` for a fresh container, `v.clear();` for one being refilled.
fn instantiate_or_clear(target: &VarRef, declare: bool) -> Stmt {
    if declare {
        assign_var(
            &target.name,
            Expr::New {
                ty: type_src(&target.ty),
                args: Vec::new(),
            },
        )
    } else {
        Stmt::expr(Expr::name(target.name.as_str()).call("clear", Vec::new()))
    }
}

/// Simple name of a nested class as written after `outer.new`.
fn inner_name(binary: &str) -> &str {
    binary.rsplit(['$', '.']).next().unwrap_or(binary)
}

fn literal(value: &Literal) -> Result<Expr> {
    Ok(match value {
        Literal::Byte(v) => Expr::Int(i64::from(*v)),
        Literal::Short(v) => Expr::Int(i64::from(*v)),
        Literal::Int(v) => Expr::Int(i64::from(*v)),
        Literal::Long(v) => Expr::Long(*v),
        Literal::Float(v) => Expr::Float(*v),
        Literal::Double(v) => Expr::Double(*v),
        Literal::Bool(v) => Expr::Bool(*v),
        Literal::Char(v) => Expr::Char(*v),
        Literal::Str(v) => Expr::str(v.as_str()),
        Literal::Class(name) => Expr::ClassLit(type_src(&JavaType::from_type_name(name)?)),
    })
}

fn default_value(ty: &JavaType) -> Expr {
    match ty {
        JavaType::Boolean => Expr::Bool(false),
        JavaType::Char => Expr::Char('\0'),
        JavaType::Long => Expr::Long(0),
        JavaType::Float => Expr::Float(0.0),
        JavaType::Double => Expr::Double(0.0),
        JavaType::Byte | JavaType::Short | JavaType::Int => Expr::Int(0),
        _ => Expr::Null,
    }
}

fn arg_expr(arg: &ArgRef) -> Expr {
    match arg {
        ArgRef::Null => Expr::Null,
        ArgRef::Var(var) => Expr::name(var.name.as_str()),
    }
}

fn receiver_expr(receiver: &Receiver) -> Expr {
    match receiver {
        Receiver::Var(var) => Expr::name(var.name.as_str()),
        Receiver::Static(class) => Expr::name(type_src(&JavaType::object(class.as_str()))),
    }
}

fn reflective_receiver(receiver: &Receiver) -> Expr {
    match receiver {
        Receiver::Var(var) => Expr::name(var.name.as_str()),
        Receiver::Static(_) => Expr::Null,
    }
}

fn object_array(args: &[ArgRef]) -> Expr {
    Expr::ArrayLit {
        elem: "Object".to_string(),
        items: args.iter().map(arg_expr).collect(),
    }
}

fn class_array(params: &[JavaType]) -> Expr {
    Expr::ArrayLit {
        elem: "Class".to_string(),
        items: params
            .iter()
            .map(|p| match p.boxed_name() {
                Some(boxed) => Expr::name(boxed.trim_start_matches("java.lang.")).dot("TYPE"),
                None => Expr::ClassLit(type_src(p)),
            })
            .collect(),
    }
}

//--- reflection helpers ------------------------------------------------------

fn helper(ret: &str, name: &str, params: &[(&str, &str)], body: Vec<Stmt>) -> MethodDecl {
    MethodDecl {
        annotations: Vec::new(),
        modifiers: vec![Modifier::Private, Modifier::Static],
        ret: ret.to_string(),
        name: name.to_string(),
        params: params
            .iter()
            .map(|(ty, n)| ((*ty).to_string(), (*n).to_string()))
            .collect(),
        throws: vec!["Exception".to_string()],
        body,
    }
}

fn load_class() -> Stmt {
    Stmt::declare(
        "Class<?>",
        "clazz",
        Expr::name("Class").call("forName", vec![Expr::name("clazzName")]),
    )
}

fn accessible(name: &str) -> Stmt {
    Stmt::expr(Expr::name(name).call("setAccessible", vec![Expr::Bool(true)]))
}

fn declared_field() -> Stmt {
    Stmt::declare(
        "Field",
        "f",
        Expr::name("clazz").call("getDeclaredField", vec![Expr::name("fieldName")]),
    )
}

fn set_field_method() -> MethodDecl {
    helper(
        "void",
        "setField",
        &[
            ("String", "clazzName"),
            ("String", "fieldName"),
            ("Object", "receiver"),
            ("Object", "value"),
        ],
        vec![
            load_class(),
            declared_field(),
            accessible("f"),
            Stmt::expr(
                Expr::name("f").call("set", vec![Expr::name("receiver"), Expr::name("value")]),
            ),
        ],
    )
}

fn get_field_method() -> MethodDecl {
    helper(
        "Object",
        "getField",
        &[
            ("String", "clazzName"),
            ("String", "fieldName"),
            ("Object", "receiver"),
        ],
        vec![
            load_class(),
            declared_field(),
            accessible("f"),
            Stmt::Return(Some(
                Expr::name("f").call("get", vec![Expr::name("receiver")]),
            )),
        ],
    )
}

fn call_method_method() -> MethodDecl {
    helper(
        "Object",
        "callMethod",
        &[
            ("String", "clazzName"),
            ("String", "methodName"),
            ("Object", "receiver"),
            ("Object[]", "args"),
            ("Class<?>[]", "paramTypes"),
        ],
        vec![
            load_class(),
            Stmt::declare(
                "Method",
                "m",
                Expr::name("clazz").call(
                    "getDeclaredMethod",
                    vec![Expr::name("methodName"), Expr::name("paramTypes")],
                ),
            ),
            accessible("m"),
            Stmt::Return(Some(
                Expr::name("m").call("invoke", vec![Expr::name("receiver"), Expr::name("args")]),
            )),
        ],
    )
}

fn new_instance_method() -> MethodDecl {
    helper(
        "Object",
        "newInstance",
        &[
            ("String", "clazzName"),
            ("Object[]", "args"),
            ("Class<?>[]", "paramTypes"),
        ],
        vec![
            load_class(),
            Stmt::declare(
                "Constructor<?>",
                "c",
                Expr::name("clazz").call("getDeclaredConstructor", vec![Expr::name("paramTypes")]),
            ),
            accessible("c"),
            Stmt::Return(Some(
                Expr::name("c").call("newInstance", vec![Expr::name("args")]),
            )),
        ],
    )
}
