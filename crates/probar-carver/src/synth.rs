//! Dependency resolver / statement synthesizer.
//!
//! [`Resolver::synthesize`] walks the working copy of a capture log and turns
//! every record concerning one object into an [`Intent`]. Objects the record
//! depends on (arguments, written values, container elements) are
//! synthesized first, recursively, so the emitted sequence never refers to a
//! variable before its declaration.
//!
//! Each object's [`Progress`] is advanced as records are consumed, which
//! makes repeated visits idempotent: a record contributes at most once per
//! generation run.

use crate::capture::{
    Arg, CaptureLog, JavaType, Literal, MethodDescriptor, Oid, Progress, PseudoMethod, Record,
    ReturnValue,
};
use crate::context::GenerationContext;
use crate::emit::CodeGenerator;
use crate::error::{CarverError, Result};
use crate::identity::Tracker;
use crate::intent::{ArgRef, Intent, Receiver, VarRef};
use crate::types::{canonical_name, TypeInfo};
use tracing::{debug, trace};

/// Collection instantiated when the recorded class cannot be.
const FALLBACK_LIST: &str = "java.util.ArrayList";
/// Map instantiated when the recorded class cannot be.
const FALLBACK_MAP: &str = "java.util.HashMap";

/// Owned copy of a record, so the log can be updated while it is replayed.
#[derive(Debug, Clone)]
struct Step {
    index: usize,
    oid: Oid,
    capture_id: i32,
    kind: PseudoMethod,
    method: String,
    desc: String,
    args: Vec<Arg>,
    ret: ReturnValue,
    is_static: bool,
}

impl From<Record<'_>> for Step {
    fn from(rec: Record<'_>) -> Self {
        Self {
            index: rec.index,
            oid: rec.oid,
            capture_id: rec.capture_id,
            kind: rec.kind,
            method: rec.method.to_string(),
            desc: rec.desc.to_string(),
            args: rec.args.to_vec(),
            ret: rec.ret,
            is_static: rec.is_static,
        }
    }
}

/// Replays object histories from a capture log into a [`CodeGenerator`].
pub struct Resolver<'t> {
    log: CaptureLog,
    types: &'t dyn TypeInfo,
    tracker: Tracker,
    max_statements: Option<usize>,
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("records", &self.log.len())
            .field("declared", &self.tracker.len())
            .field("max_statements", &self.max_statements)
            .finish_non_exhaustive()
    }
}

impl<'t> Resolver<'t> {
    /// Resolver over `log`, which becomes its private working copy.
    #[must_use]
    pub fn new(log: CaptureLog, types: &'t dyn TypeInfo) -> Self {
        Self {
            log,
            types,
            tracker: Tracker::new(),
            max_statements: None,
        }
    }

    /// Stop generating once `limit` statements were emitted.
    #[must_use]
    pub const fn with_max_statements(mut self, limit: Option<usize>) -> Self {
        self.max_statements = limit;
        self
    }

    /// The working log, including progress made so far.
    #[must_use]
    pub const fn log(&self) -> &CaptureLog {
        &self.log
    }

    /// Variables declared so far.
    #[must_use]
    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Forget all declarations.
    pub fn clear(&mut self) {
        self.tracker.clear();
    }

    /// Whether the statement limit has been hit.
    #[must_use]
    pub fn limit_reached(&self, ctx: &GenerationContext) -> bool {
        self.max_statements
            .is_some_and(|limit| ctx.statements >= limit)
    }

    /// Emit the history of `target` from its resume point through `end`.
    ///
    /// Each matched record is replayed together with its whole call span;
    /// records nested inside that span are never matched on their own.
    pub fn synthesize<G>(
        &mut self,
        target: Oid,
        end: usize,
        gen: &mut G,
        ctx: &mut GenerationContext,
    ) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        let Some(start) = self.log.progress(target).resume_point() else {
            return Err(CarverError::UnknownOid {
                record: end,
                oid: target,
            });
        };
        let Some(last) = self.log.len().checked_sub(1) else {
            return Ok(());
        };
        let end = end.min(last);

        let mut index = start;
        while index <= end {
            if self.limit_reached(ctx) {
                debug!(limit = ?self.max_statements, "statement limit reached");
                return Ok(());
            }
            let record = self.log.record(index)?;
            if record.kind == PseudoMethod::EndCapture || !record.touches(target) {
                index += 1;
                continue;
            }
            let step = Step::from(record);
            debug!(record = index, oid = %target, method = %step.method, "analysing record");

            self.replay(target, &step, gen, ctx)
                .map_err(|e| e.at_record(index))?;

            let span_end = self.log.find_end_of_span(index)?;
            self.log.advance_progress(target, span_end);
            index = span_end + 1;
        }
        Ok(())
    }

    fn replay<G>(
        &mut self,
        target: Oid,
        step: &Step,
        gen: &mut G,
        ctx: &mut GenerationContext,
    ) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        // the target is produced by someone else's call: build the caller first
        if step.oid != target && !step.is_static {
            self.require_known(step.oid, step.index)?;
            if let Some(before) = step.index.checked_sub(1) {
                debug!(oid = %step.oid, up_to = before, "resolving receiver");
                self.synthesize(step.oid, before, gen, ctx)?;
            }
        }

        match step.kind {
            PseudoMethod::PlainInit => self.plain_init(target, step, gen, ctx),
            PseudoMethod::NotObservedInit => self.unobserved_init(target, step, gen, ctx),
            PseudoMethod::PutField | PseudoMethod::PutStatic => {
                self.field_write(target, step, gen, ctx)
            }
            PseudoMethod::GetField | PseudoMethod::GetStatic => {
                self.field_read(step, gen, ctx)
            }
            PseudoMethod::ArrayInit
            | PseudoMethod::CollectionInit
            | PseudoMethod::MapInit => self.container_init(target, step, gen, ctx),
            PseudoMethod::ObservedInit | PseudoMethod::Call => self.call(target, step, gen, ctx),
            PseudoMethod::EndCapture => Ok(()),
        }
    }

    fn plain_init<G>(
        &mut self,
        target: Oid,
        step: &Step,
        gen: &mut G,
        ctx: &mut GenerationContext,
    ) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        if self.tracker.is_declared(target) {
            trace!(record = step.index, oid = %target, "literal already declared");
            return Ok(());
        }
        let [Arg::Value(value)] = step.args.as_slice() else {
            return Err(CarverError::UnsupportedLiteral {
                record: step.index,
                found: format!("{:?}", step.args),
            });
        };
        let ty = JavaType::object(value.type_name());
        let name = self.tracker.declare(target, ty.clone())?;
        gen.emit(
            &Intent::Literal {
                record: step.index,
                target: VarRef::new(name, ty),
                value: value.clone(),
            },
            ctx,
        )
    }

    fn unobserved_init<G>(
        &mut self,
        target: Oid,
        step: &Step,
        gen: &mut G,
        ctx: &mut GenerationContext,
    ) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        let payload = match step.args.as_slice() {
            [Arg::Value(Literal::Str(xml))] => Some(xml.clone()),
            [] | [Arg::Null] => None,
            other => {
                return Err(CarverError::malformed(
                    step.index,
                    format!("unobserved init expects one serialized payload, found {other:?}"),
                ))
            }
        };
        let (var, declare) = if self.tracker.is_declared(target) {
            (self.var_ref(target)?, false)
        } else {
            let ty = self.type_of(target)?;
            let name = self.tracker.declare(target, ty.clone())?;
            (VarRef::new(name, ty), true)
        };
        gen.emit(
            &Intent::Deserialize {
                record: step.index,
                target: var,
                payload,
                declare,
            },
            ctx,
        )
    }

    fn field_write<G>(
        &mut self,
        target: Oid,
        step: &Step,
        gen: &mut G,
        ctx: &mut GenerationContext,
    ) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        let value = match step.args.as_slice() {
            [Arg::Null] => None,
            [Arg::Oid(oid)] => Some(*oid),
            other => {
                return Err(CarverError::malformed(
                    step.index,
                    format!("field write expects one value slot, found {other:?}"),
                ))
            }
        };
        if let Some(value) = value.filter(|v| *v != target) {
            self.dependency(value, step.index, gen, ctx)?;
        }
        if self.limit_reached(ctx) {
            return Ok(());
        }

        let value_ref = match value {
            Some(oid) => ArgRef::Var(self.var_ref(oid)?),
            None => ArgRef::Null,
        };
        let intent = Intent::FieldWrite {
            record: step.index,
            receiver: self.receiver(step)?,
            owner: self.owner(step.oid)?,
            field: self.field_name(step)?,
            desc: step.desc.clone(),
            value: value_ref,
        };
        gen.emit(&intent, ctx)?;

        self.mark_span(step, std::iter::once(step.oid).chain(value))
    }

    fn field_read<G>(&mut self, step: &Step, gen: &mut G, ctx: &mut GenerationContext) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        let read = step.ret.oid();
        if let Some(oid) = read.filter(|oid| !self.tracker.is_declared(*oid)) {
            let ty = JavaType::parse_descriptor(&step.desc)?;
            let receiver = self.receiver(step)?;
            let owner = self.owner(step.oid)?;
            let field = self.field_name(step)?;
            let name = self.tracker.declare(oid, ty.clone())?;
            gen.emit(
                &Intent::FieldRead {
                    record: step.index,
                    receiver,
                    owner,
                    field,
                    desc: step.desc.clone(),
                    target: VarRef::new(name, ty),
                },
                ctx,
            )?;
        }

        self.mark_span(step, std::iter::once(step.oid).chain(read))
    }

    fn call<G>(
        &mut self,
        target: Oid,
        step: &Step,
        gen: &mut G,
        ctx: &mut GenerationContext,
    ) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        let constructs = step.kind == PseudoMethod::ObservedInit && step.oid == target;

        for arg in &step.args {
            match arg {
                Arg::Oid(oid) if *oid != target => {
                    self.dependency(*oid, step.index, gen, ctx)?;
                }
                Arg::Value(_) => {
                    return Err(CarverError::malformed(
                        step.index,
                        "literal slot outside a plain or unobserved init",
                    ))
                }
                _ => {}
            }
        }
        if self.limit_reached(ctx) {
            return Ok(());
        }

        let args = step
            .args
            .iter()
            .map(|arg| match arg {
                // an object cannot be handed to its own constructor yet
                Arg::Oid(oid) if *oid == target && !self.tracker.is_declared(target) => {
                    Ok(ArgRef::Null)
                }
                Arg::Oid(oid) => self.var_ref(*oid).map(ArgRef::Var),
                _ => Ok(ArgRef::Null),
            })
            .collect::<Result<Vec<_>>>()?;

        let intent = if constructs {
            let class = self.class_name(target, step.index)?;
            let (outer, args) = if self.types.is_inner_instance(&class)? {
                let mut args = args.into_iter();
                let Some(ArgRef::Var(outer)) = args.next() else {
                    return Err(CarverError::malformed(
                        step.index,
                        format!("inner class {class} constructed without an enclosing instance"),
                    ));
                };
                (Some(outer), args.collect())
            } else {
                (None, args)
            };
            let ty = self.types.resolve(&class)?;
            let name = self.tracker.declare(target, ty.clone())?;
            Intent::Construct {
                record: step.index,
                target: VarRef::new(name, ty),
                desc: step.desc.clone(),
                outer,
                args,
            }
        } else {
            let receiver = self.receiver(step)?;
            let owner = self.owner(step.oid)?;
            let result = match step.ret.oid() {
                Some(oid) if !self.tracker.is_declared(oid) => {
                    let ty = match MethodDescriptor::parse(&step.desc)?.ret {
                        JavaType::Void => self.type_of(oid)?,
                        ty => ty,
                    };
                    let name = self.tracker.declare(oid, ty.clone())?;
                    Some(VarRef::new(name, ty))
                }
                _ => None,
            };
            Intent::Call {
                record: step.index,
                receiver,
                owner,
                method: step.method.clone(),
                desc: step.desc.clone(),
                args,
                result,
            }
        };
        gen.emit(&intent, ctx)?;

        // a call counts as a mutation of everything it touches
        let touched = std::iter::once(step.oid)
            .chain(step.args.iter().filter_map(Arg::oid))
            .chain(step.ret.oid());
        self.mark_span(step, touched)
    }

    fn container_init<G>(
        &mut self,
        target: Oid,
        step: &Step,
        gen: &mut G,
        ctx: &mut GenerationContext,
    ) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        let mut elements = Vec::with_capacity(step.args.len());
        for arg in &step.args {
            match arg {
                Arg::Null => elements.push(None),
                Arg::Oid(oid) if *oid == target => {
                    return Err(CarverError::malformed(
                        step.index,
                        "container holds itself",
                    ))
                }
                Arg::Oid(oid) => {
                    self.dependency(*oid, step.index, gen, ctx)?;
                    elements.push(Some(*oid));
                }
                Arg::Value(_) => {
                    return Err(CarverError::malformed(
                        step.index,
                        "literal slot inside a container init",
                    ))
                }
            }
        }
        if self.limit_reached(ctx) {
            return Ok(());
        }
        let elements = elements
            .into_iter()
            .map(|e| match e {
                Some(oid) => self.var_ref(oid).map(ArgRef::Var),
                None => Ok(ArgRef::Null),
            })
            .collect::<Result<Vec<_>>>()?;

        let class = self.class_name(target, step.index)?;
        let intent = match step.kind {
            PseudoMethod::ArrayInit => {
                let (target, declare) = self.bind_container(target, &class)?;
                Intent::ArrayInit {
                    record: step.index,
                    target,
                    elements,
                    declare,
                }
            }
            PseudoMethod::MapInit => {
                if elements.len() % 2 != 0 {
                    return Err(CarverError::malformed(
                        step.index,
                        "map init needs key/value pairs",
                    ));
                }
                let class = if self.types.is_constructible(&class) {
                    class
                } else {
                    FALLBACK_MAP.to_string()
                };
                let (target, declare) = self.bind_container(target, &class)?;
                let mut entries = Vec::with_capacity(elements.len() / 2);
                let mut items = elements.into_iter();
                while let (Some(key), Some(value)) = (items.next(), items.next()) {
                    entries.push((key, value));
                }
                Intent::MapInit {
                    record: step.index,
                    target,
                    entries,
                    declare,
                }
            }
            _ => {
                let class = if self.types.is_constructible(&class) {
                    class
                } else {
                    self.types
                        .collection_family(&class)
                        .map_or(FALLBACK_LIST, |family| family.fallback_class())
                        .to_string()
                };
                let (target, declare) = self.bind_container(target, &class)?;
                Intent::CollectionInit {
                    record: step.index,
                    target,
                    elements,
                    declare,
                }
            }
        };
        gen.emit(&intent, ctx)?;

        self.mark_span(step, step.args.iter().filter_map(Arg::oid))
    }

    /// Variable for a container record. A container logged again after its
    /// first sight keeps the variable it was declared with.
    fn bind_container(&mut self, target: Oid, class: &str) -> Result<(VarRef, bool)> {
        if self.tracker.is_declared(target) {
            trace!(oid = %target, "refilling declared container");
            return Ok((self.var_ref(target)?, false));
        }
        let ty = self.types.resolve(class)?;
        let name = self.tracker.declare(target, ty.clone())?;
        Ok((VarRef::new(name, ty), true))
    }

    /// Mark `oids` as covered through the whole span of `step`.
    fn mark_span(&mut self, step: &Step, oids: impl IntoIterator<Item = Oid>) -> Result<()> {
        let end = self.log.find_end_of_span(step.index)?;
        for oid in oids {
            self.log.advance_progress(oid, end);
        }
        Ok(())
    }

    /// Synthesize `oid` up to `record` so it can be used there.
    fn dependency<G>(
        &mut self,
        oid: Oid,
        record: usize,
        gen: &mut G,
        ctx: &mut GenerationContext,
    ) -> Result<()>
    where
        G: CodeGenerator + ?Sized,
    {
        self.require_known(oid, record)?;
        debug!(oid = %oid, up_to = record, "resolving dependency");
        self.synthesize(oid, record, gen, ctx)
    }

    fn require_known(&self, oid: Oid, record: usize) -> Result<()> {
        match self.log.progress(oid) {
            Progress::NotYetCreated => Err(CarverError::UnknownOid { record, oid }),
            _ => Ok(()),
        }
    }

    fn class_name(&self, oid: Oid, record: usize) -> Result<String> {
        self.log
            .type_name(oid)
            .map(str::to_string)
            .ok_or(CarverError::UnknownOid { record, oid })
    }

    fn type_of(&self, oid: Oid) -> Result<JavaType> {
        let name = self
            .log
            .type_name(oid)
            .ok_or(CarverError::Undeclared { oid })?;
        self.types.resolve(name)
    }

    fn owner(&self, oid: Oid) -> Result<String> {
        let name = self
            .log
            .type_name(oid)
            .ok_or(CarverError::Undeclared { oid })?;
        Ok(canonical_name(name))
    }

    fn var_ref(&self, oid: Oid) -> Result<VarRef> {
        let binding = self.tracker.require(oid)?;
        Ok(VarRef::new(binding.name.clone(), binding.ty.clone()))
    }

    fn receiver(&self, step: &Step) -> Result<Receiver> {
        if step.is_static || step.kind.is_static_field() {
            Ok(Receiver::Static(self.owner(step.oid)?))
        } else {
            self.var_ref(step.oid).map(Receiver::Var)
        }
    }

    fn field_name(&self, step: &Step) -> Result<String> {
        self.log
            .accessed_field(step.capture_id)
            .map(str::to_string)
            .ok_or_else(|| {
                CarverError::malformed(step.index, "field access without a field name")
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::capture::Observed;
    use crate::emit::IntentRecorder;
    use crate::types::TypeTable;

    fn run(log: &CaptureLog, target: i32, end: usize) -> (Vec<Intent>, Resolver<'static>) {
        static TYPES: std::sync::OnceLock<TypeTable> = std::sync::OnceLock::new();
        let types = TYPES.get_or_init(TypeTable::new);
        let mut resolver = Resolver::new(log.clone(), types);
        let mut gen = IntentRecorder::new();
        let mut ctx = GenerationContext::default();
        gen.before(&ctx).unwrap();
        resolver
            .synthesize(Oid(target), end, &mut gen, &mut ctx)
            .unwrap();
        gen.after(&ctx).unwrap();
        (gen.code().unwrap(), resolver)
    }

    fn person_with_name() -> CaptureLog {
        let mut log = CaptureLog::new();
        let person = Observed::instance(1, "Person");
        log.log_call(1, &person, "<init>", "()V", &[]);
        log.log_end(1, Oid(1), None);
        log.log_call(
            2,
            &person,
            "setName",
            "(Ljava/lang/String;)V",
            &[Some(Observed::plain(2, Literal::Str("Ben".to_string())))],
        );
        log.log_end(2, Oid(1), None);
        log
    }

    mod dispatch_tests {
        use super::*;

        #[test]
        fn test_constructor_declares_target() {
            let log = person_with_name();
            let (intents, resolver) = run(&log, 1, 1);
            assert_eq!(intents.len(), 1);
            assert!(matches!(
                &intents[0],
                Intent::Construct { target, .. } if target.name == "var0"
            ));
            assert_eq!(resolver.tracker().variable_of(Oid(1)), Some("var0"));
        }

        #[test]
        fn test_argument_resolved_before_call() {
            let log = person_with_name();
            let (intents, _) = run(&log, 1, log.len() - 1);
            let records: Vec<_> = intents.iter().map(Intent::record).collect();
            // <init>, PLAIN "Ben", setName
            assert_eq!(records, vec![0, 2, 4]);
            match &intents[2] {
                Intent::Call { method, args, .. } => {
                    assert_eq!(method, "setName");
                    assert_eq!(args[0].name(), Some("var1"));
                }
                other => panic!("expected call, got {other:?}"),
            }
        }

        #[test]
        fn test_field_write_pulls_value() {
            let mut log = CaptureLog::new();
            let person = Observed::instance(1, "Person");
            let address = Observed::instance(2, "Address");
            log.log_call(1, &person, "<init>", "()V", &[]);
            log.log_end(1, Oid(1), None);
            log.log_call(2, &address, "<init>", "()V", &[]);
            log.log_end(2, Oid(2), None);
            log.log_field_write(3, &person, "home", "LAddress;", Some(&address));
            log.log_end(3, Oid(1), None);

            let (intents, _) = run(&log, 1, log.len() - 1);
            assert_eq!(intents.len(), 3);
            assert!(matches!(&intents[1], Intent::Construct { target, .. } if target.name == "var1"));
            match &intents[2] {
                Intent::FieldWrite { field, value, .. } => {
                    assert_eq!(field, "home");
                    assert_eq!(value.name(), Some("var1"));
                }
                other => panic!("expected field write, got {other:?}"),
            }
        }

        #[test]
        fn test_static_call_uses_class_receiver() {
            let mut log = CaptureLog::new();
            let math = Observed::class_carrier(10, "com.example.Util");
            log.log_call(
                1,
                &math,
                "reset",
                "()V",
                &[],
            );
            log.log_end(1, Oid(10), None);
            let (intents, _) = run(&log, 10, log.len() - 1);
            // Class literal for the carrier, then the static call
            assert_eq!(intents.len(), 2);
            match &intents[1] {
                Intent::Call { receiver, .. } => {
                    assert_eq!(receiver, &Receiver::Static("com.example.Util".to_string()));
                }
                other => panic!("expected call, got {other:?}"),
            }
        }

        #[test]
        fn test_factory_return_synthesizes_caller() {
            let mut log = CaptureLog::new();
            let factory = Observed::instance(1, "Factory");
            log.log_call(1, &factory, "<init>", "()V", &[]);
            log.log_end(1, Oid(1), None);
            log.log_call(2, &factory, "make", "()LWidget;", &[]);
            log.log_end(2, Oid(1), Some(&Observed::instance(7, "Widget")));

            let (intents, resolver) = run(&log, 7, log.len() - 1);
            assert_eq!(intents.len(), 2);
            match &intents[1] {
                Intent::Call { result, .. } => {
                    let result = result.as_ref().unwrap();
                    assert_eq!(result.name, "var1");
                    assert_eq!(result.ty, JavaType::object("Widget"));
                }
                other => panic!("expected call, got {other:?}"),
            }
            assert_eq!(resolver.log().progress(Oid(1)), Progress::LastMutatedAt(3));
        }

        #[test]
        fn test_unobserved_init_deserializes() {
            let mut log = CaptureLog::new();
            let person = Observed::instance(1, "Person");
            log.log_call(1, &person, "<init>", "()V", &[]);
            log.log_end(1, Oid(1), None);
            log.log_call(
                2,
                &person,
                "setBirthday",
                "(Ljava/util/Date;)V",
                &[Some(Observed::opaque(3, "java.util.Date", Some("<date/>".to_string())))],
            );
            log.log_end(2, Oid(1), None);
            let (intents, _) = run(&log, 1, log.len() - 1);
            assert!(matches!(
                &intents[1],
                Intent::Deserialize { payload: Some(p), declare: true, .. } if p == "<date/>"
            ));
        }
    }

    mod container_tests {
        use super::*;

        #[test]
        fn test_container_passed_twice_is_refilled() {
            let mut log = CaptureLog::new();
            let person = Observed::instance(1, "Person");
            log.log_call(1, &person, "<init>", "()V", &[]);
            log.log_end(1, Oid(1), None);
            let scores = Observed::array(5, "[I", vec![Some(Observed::plain(6, Literal::Int(1)))]);
            log.log_call(2, &person, "setA", "([I)V", &[Some(scores.clone())]);
            log.log_end(2, Oid(1), None);
            log.log_call(3, &person, "setB", "([I)V", &[Some(scores)]);
            log.log_end(3, Oid(1), None);

            let (intents, resolver) = run(&log, 1, log.len() - 1);
            let records: Vec<_> = intents.iter().map(Intent::record).collect();
            // <init>, PLAIN 1, ARRAY, setA, ARRAY again, setB
            assert_eq!(records, vec![0, 2, 4, 6, 8, 10]);
            assert!(matches!(
                &intents[2],
                Intent::ArrayInit { target, declare: true, .. } if target.name == "var2"
            ));
            assert!(matches!(
                &intents[4],
                Intent::ArrayInit { target, declare: false, elements, .. }
                    if target.name == "var2" && elements[0].name() == Some("var1")
            ));
            assert_eq!(intents[4].uses(), vec!["var2", "var1"]);
            assert_eq!(resolver.tracker().len(), 3);
        }

        #[test]
        fn test_unconstructible_collection_falls_back() {
            let mut log = CaptureLog::new();
            let person = Observed::instance(1, "Person");
            log.log_call(1, &person, "<init>", "()V", &[]);
            log.log_end(1, Oid(1), None);
            let view = Observed::collection(
                5,
                "java.util.Collections$UnmodifiableSet",
                vec![Some(Observed::plain(6, Literal::Str("x".to_string())))],
            );
            log.log_call(2, &person, "setTags", "(Ljava/util/Set;)V", &[Some(view)]);
            log.log_end(2, Oid(1), None);

            let types = TypeTable::new().with_class(
                "java.util.Collections$UnmodifiableSet",
                crate::types::ClassEntry {
                    public: false,
                    ..crate::types::ClassEntry::default()
                },
            );
            let mut resolver = Resolver::new(log.clone(), &types);
            let mut gen = IntentRecorder::new();
            let mut ctx = GenerationContext::default();
            gen.before(&ctx).unwrap();
            resolver
                .synthesize(Oid(1), log.len() - 1, &mut gen, &mut ctx)
                .unwrap();
            assert!(gen.intents().iter().any(|i| matches!(
                i,
                Intent::CollectionInit { target, declare: true, .. }
                    if target.ty == JavaType::object("java.util.HashSet")
            )));
        }
    }

    mod inner_class_tests {
        use super::*;
        use crate::types::ClassEntry;

        fn pet_types() -> TypeTable {
            TypeTable::new().with_class(
                "Person$Pet",
                ClassEntry {
                    inner_instance: true,
                    ..ClassEntry::default()
                },
            )
        }

        fn adopt(enclosing: Option<Observed>) -> CaptureLog {
            let mut log = CaptureLog::new();
            let person = Observed::instance(1, "Person");
            let pet = Observed::instance(2, "Person$Pet");
            log.log_call(1, &person, "<init>", "()V", &[]);
            log.log_end(1, Oid(1), None);
            log.log_call(
                2,
                &pet,
                "<init>",
                "(LPerson;Ljava/lang/String;)V",
                &[enclosing, Some(Observed::plain(3, Literal::Str("Rex".to_string())))],
            );
            log.log_end(2, Oid(2), None);
            log.log_call(3, &person, "adopt", "(LPerson$Pet;)V", &[Some(pet)]);
            log.log_end(3, Oid(1), None);
            log
        }

        #[test]
        fn test_enclosing_instance_is_split_off() {
            let log = adopt(Some(Observed::instance(1, "Person")));
            let types = pet_types();
            let mut resolver = Resolver::new(log.clone(), &types);
            let mut gen = IntentRecorder::new();
            let mut ctx = GenerationContext::default();
            gen.before(&ctx).unwrap();
            resolver
                .synthesize(Oid(1), log.len() - 1, &mut gen, &mut ctx)
                .unwrap();
            let construct = gen
                .intents()
                .iter()
                .find(|i| matches!(i, Intent::Construct { target, .. } if target.name == "var2"))
                .unwrap();
            match construct {
                Intent::Construct { outer, args, .. } => {
                    assert_eq!(outer.as_ref().map(|v| v.name.as_str()), Some("var0"));
                    assert_eq!(args.len(), 1);
                    assert_eq!(args[0].name(), Some("var1"));
                }
                other => panic!("expected construct, got {other:?}"),
            }
        }

        #[test]
        fn test_missing_enclosing_instance_is_malformed() {
            let log = adopt(None);
            let types = pet_types();
            let mut resolver = Resolver::new(log.clone(), &types);
            let mut gen = IntentRecorder::new();
            let mut ctx = GenerationContext::default();
            gen.before(&ctx).unwrap();
            let err = resolver
                .synthesize(Oid(1), log.len() - 1, &mut gen, &mut ctx)
                .unwrap_err();
            assert!(matches!(err, CarverError::MalformedLog { record: 4, .. }));
        }
    }

    mod progress_tests {
        use super::*;

        #[test]
        fn test_revisit_is_idempotent() {
            let log = person_with_name();
            let types = TypeTable::new();
            let mut resolver = Resolver::new(log.clone(), &types);
            let mut gen = IntentRecorder::new();
            let mut ctx = GenerationContext::default();
            gen.before(&ctx).unwrap();
            resolver.synthesize(Oid(1), 1, &mut gen, &mut ctx).unwrap();
            resolver.synthesize(Oid(1), 1, &mut gen, &mut ctx).unwrap();
            resolver
                .synthesize(Oid(1), log.len() - 1, &mut gen, &mut ctx)
                .unwrap();
            resolver
                .synthesize(Oid(1), log.len() - 1, &mut gen, &mut ctx)
                .unwrap();
            assert_eq!(gen.intents().len(), 3);
            assert_eq!(ctx.statements, 3);
        }

        #[test]
        fn test_statement_limit_stops_cleanly() {
            let log = person_with_name();
            let types = TypeTable::new();
            let mut resolver = Resolver::new(log.clone(), &types).with_max_statements(Some(2));
            let mut gen = IntentRecorder::new();
            let mut ctx = GenerationContext::default();
            gen.before(&ctx).unwrap();
            resolver
                .synthesize(Oid(1), log.len() - 1, &mut gen, &mut ctx)
                .unwrap();
            assert_eq!(gen.intents().len(), 2);
            assert!(resolver.limit_reached(&ctx));
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_unknown_target() {
            let log = person_with_name();
            let types = TypeTable::new();
            let mut resolver = Resolver::new(log, &types);
            let mut gen = IntentRecorder::new();
            let mut ctx = GenerationContext::default();
            gen.before(&ctx).unwrap();
            let err = resolver
                .synthesize(Oid(99), 3, &mut gen, &mut ctx)
                .unwrap_err();
            assert!(matches!(err, CarverError::UnknownOid { oid: Oid(99), .. }));
        }

        #[test]
        fn test_strict_types_name_the_record() {
            let log = person_with_name();
            let types = TypeTable::strict();
            let mut resolver = Resolver::new(log, &types);
            let mut gen = IntentRecorder::new();
            let mut ctx = GenerationContext::default();
            gen.before(&ctx).unwrap();
            let err = resolver.synthesize(Oid(1), 1, &mut gen, &mut ctx).unwrap_err();
            assert_eq!(err.record(), Some(0));
            assert!(err.to_string().contains("Person"));
        }
    }
}
