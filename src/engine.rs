//! JavaScript engine instance
//!
//! The `Engine` owns everything a running program touches: the heap arenas,
//! the internal-class pool, the identifier table, the value stack, the
//! context stack and the intrinsic objects. Nothing is process-global, so
//! independent engines can coexist on one thread.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::builtins;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::gc::{Arena, Heap, Trace, Tracer};
use crate::runtime::function::FunctionKind;
use crate::runtime::identifier::{Identifier, IdentifierTable, WellKnownNames};
use crate::runtime::internal_class::{ClassId, InternalClassPool};
use crate::runtime::object::{Object, ObjectKind};
use crate::runtime::property::{PropertyAttributes, PropertyKey};
use crate::runtime::string::StringLiterals;
use crate::value::{ObjectRef, StringRef, SymbolRef, Value};
use crate::vm::context::{ContextRef, ExecutionContext};
use crate::vm::stack::Stack;

#[cfg(feature = "jit")]
use crate::jit::JitState;

/// Objects the runtime refers to directly
#[derive(Debug, Clone, Copy)]
pub struct Intrinsics {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub error_prototype: ObjectRef,
    pub type_error_prototype: ObjectRef,
    pub reference_error_prototype: ObjectRef,
    pub range_error_prototype: ObjectRef,
    pub symbol_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub global_object: ObjectRef,
    /// Shared accessor poisoning strict `callee`/`caller`
    pub thrower: ObjectRef,
}

impl Intrinsics {
    /// Allocate the bare intrinsic objects; `builtins::install` fills them in
    fn alloc(objects: &mut Arena<Object>, empty: ClassId, empty_string: StringRef) -> Self {
        let mut alloc = |proto: Option<ObjectRef>, kind: ObjectKind| {
            ObjectRef(objects.alloc(Object::new(empty, proto, kind)))
        };
        let object_prototype = alloc(None, ObjectKind::Ordinary);
        let function_prototype = alloc(
            Some(object_prototype),
            ObjectKind::Function(FunctionKind::Builtin {
                func: builtins::function::function_prototype,
                constructor: false,
            }),
        );
        let array_prototype = alloc(Some(object_prototype), ObjectKind::Array);
        let error_prototype = alloc(Some(object_prototype), ObjectKind::Error);
        let type_error_prototype = alloc(Some(error_prototype), ObjectKind::Error);
        let reference_error_prototype = alloc(Some(error_prototype), ObjectKind::Error);
        let range_error_prototype = alloc(Some(error_prototype), ObjectKind::Error);
        let symbol_prototype = alloc(Some(object_prototype), ObjectKind::Ordinary);
        let boolean_prototype = alloc(Some(object_prototype), ObjectKind::BooleanWrapper(false));
        let number_prototype = alloc(Some(object_prototype), ObjectKind::NumberWrapper(0.0));
        let string_prototype = alloc(Some(object_prototype), ObjectKind::StringWrapper(empty_string));
        let global_object = alloc(Some(object_prototype), ObjectKind::Ordinary);
        let thrower = alloc(Some(function_prototype), ObjectKind::Function(FunctionKind::Thrower));
        Intrinsics {
            object_prototype,
            function_prototype,
            array_prototype,
            error_prototype,
            type_error_prototype,
            reference_error_prototype,
            range_error_prototype,
            symbol_prototype,
            boolean_prototype,
            number_prototype,
            string_prototype,
            global_object,
            thrower,
        }
    }

    fn objects(&self) -> [ObjectRef; 13] {
        [
            self.object_prototype,
            self.function_prototype,
            self.array_prototype,
            self.error_prototype,
            self.type_error_prototype,
            self.reference_error_prototype,
            self.range_error_prototype,
            self.symbol_prototype,
            self.boolean_prototype,
            self.number_prototype,
            self.string_prototype,
            self.global_object,
            self.thrower,
        ]
    }
}

/// A JavaScript engine instance
pub struct Engine {
    pub(crate) heap: Heap,
    pub(crate) classes: InternalClassPool,
    pub(crate) identifiers: IdentifierTable,
    pub(crate) names: WellKnownNames,
    pub(crate) literals: StringLiterals,
    /// `Symbol.for` registry
    pub(crate) symbol_registry: FxHashMap<Identifier, SymbolRef>,
    pub(crate) stack: Stack,
    /// Active contexts, innermost last; the global context is at the bottom
    pub(crate) context_stack: Vec<ContextRef>,
    pub(crate) global_context: ContextRef,
    pub(crate) intrinsics: Intrinsics,
    /// Value of the most recent uncaught throw
    pub(crate) exception: Option<Value>,
    /// Arrays being joined, to cut cycles short
    pub(crate) join_stack: Vec<ObjectRef>,
    pub(crate) persistent: Arena<Value>,
    /// Nested `call`/`construct` invocations, built-ins included
    pub(crate) call_depth: usize,
    pub(crate) config: EngineConfig,
    #[cfg(feature = "jit")]
    pub(crate) jit: JitState,
}

impl Engine {
    /// Create an engine with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut heap = Heap::new();
        let classes = InternalClassPool::new();
        let mut identifiers = IdentifierTable::new();
        let names = WellKnownNames::intern(&mut identifiers);
        let literals = StringLiterals::alloc(&mut heap.strings);
        let intrinsics = Intrinsics::alloc(&mut heap.objects, classes.empty(), literals.empty);
        let global_context = ContextRef(
            heap.contexts
                .alloc(ExecutionContext::global(intrinsics.global_object)),
        );

        let mut engine = Engine {
            heap,
            classes,
            identifiers,
            names,
            literals,
            symbol_registry: FxHashMap::default(),
            stack: Stack::new(config.stack_size),
            context_stack: vec![global_context],
            global_context,
            intrinsics,
            exception: None,
            join_stack: Vec::new(),
            persistent: Arena::new(),
            call_depth: 0,
            #[cfg(feature = "jit")]
            jit: JitState::new(&config.jit),
            config,
        };
        builtins::install(&mut engine);
        debug!(
            objects = engine.heap.objects.len(),
            classes = engine.classes.len(),
            "engine initialized"
        );
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Intern an identifier in this engine's table
    pub fn intern(&mut self, name: &str) -> Identifier {
        self.identifiers.intern(name)
    }

    pub fn identifier_name(&self, id: Identifier) -> &str {
        self.identifiers.name(id)
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn global_context(&self) -> ContextRef {
        self.global_context
    }

    pub fn global_object(&self) -> ObjectRef {
        self.intrinsics.global_object
    }

    pub fn classes(&self) -> &InternalClassPool {
        &self.classes
    }

    /// Throw `value`
    ///
    /// The value becomes the current context's `result` and the engine's
    /// pending exception, and travels up as `Error::Exception`.
    pub fn throw<T>(&mut self, value: Value) -> Result<T> {
        debug!(value = ?value, depth = self.context_stack.len(), "throw");
        self.exception = Some(value);
        let ctx = self.current_context();
        self.context_mut(ctx).result = value;
        Err(Error::Exception(value))
    }

    pub fn throw_type_error<T>(&mut self, message: &str) -> Result<T> {
        let proto = self.intrinsics.type_error_prototype;
        let error = self.new_error(proto, message);
        self.throw(Value::Object(error))
    }

    pub fn throw_reference_error<T>(&mut self, message: &str) -> Result<T> {
        let proto = self.intrinsics.reference_error_prototype;
        let error = self.new_error(proto, message);
        self.throw(Value::Object(error))
    }

    pub fn throw_range_error<T>(&mut self, message: &str) -> Result<T> {
        let proto = self.intrinsics.range_error_prototype;
        let error = self.new_error(proto, message);
        self.throw(Value::Object(error))
    }

    /// Allocate an error object with an own `message`
    pub fn new_error(&mut self, prototype: ObjectRef, message: &str) -> ObjectRef {
        let error = self.alloc_object(Some(prototype), ObjectKind::Error);
        if !message.is_empty() {
            let message = Value::String(self.new_string(message));
            let key = PropertyKey::Name(self.names.message);
            self.define_data_property(error, key, message, PropertyAttributes::HIDDEN);
        }
        error
    }

    /// Pending exception, cleared
    pub fn take_exception(&mut self) -> Option<Value> {
        self.exception.take()
    }

    pub fn pending_exception(&self) -> Option<Value> {
        self.exception
    }

    pub fn is_type_error(&self, value: Value) -> bool {
        self.inherits_from(value, self.intrinsics.type_error_prototype)
    }

    pub fn is_reference_error(&self, value: Value) -> bool {
        self.inherits_from(value, self.intrinsics.reference_error_prototype)
    }

    pub fn is_range_error(&self, value: Value) -> bool {
        self.inherits_from(value, self.intrinsics.range_error_prototype)
    }

    fn inherits_from(&self, value: Value, proto: ObjectRef) -> bool {
        let Some(o) = value.as_object() else {
            return false;
        };
        let mut current = self.object(o).prototype;
        while let Some(p) = current {
            if p == proto {
                return true;
            }
            current = self.object(p).prototype;
        }
        false
    }

    /// Report every root to the collector
    pub(crate) fn trace_roots(&self, tracer: &mut Tracer) {
        for &ctx in &self.context_stack {
            tracer.mark_context(ctx);
        }
        tracer.mark_context(self.global_context);
        for o in self.intrinsics.objects() {
            tracer.mark_object(o);
        }
        for &o in &self.join_stack {
            tracer.mark_object(o);
        }
        self.literals.trace(tracer);
        for &symbol in self.symbol_registry.values() {
            tracer.mark_symbol(symbol);
        }
        self.classes.trace(tracer);
        for (_, value) in self.persistent.iter() {
            tracer.mark_value(*value);
        }
        self.exception.trace(tracer);
        self.stack.values().trace(tracer);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::function::CompiledFunction;
    use crate::runtime::property::PropertyDescriptor;

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new();
        assert_eq!(engine.context_depth(), 1);
        assert!(engine.pending_exception().is_none());
        assert_eq!(engine.current_context(), engine.global_context());
    }

    #[test]
    fn test_independent_engines() {
        let mut a = Engine::new();
        let mut b = Engine::new();
        let only_a = a.intern("onlyInA");
        b.intern("somethingElse");
        assert_eq!(a.identifier_name(only_a), "onlyInA");
        let x = a.property_key("x");
        let o = a.new_plain_object();
        a.put(o, x, Value::Integer(1), false).unwrap();
        assert!(b.classes().len() < a.classes().len());
    }

    #[test]
    fn test_throw_records_exception() {
        let mut engine = Engine::new();
        let r: Result<()> = engine.throw_type_error("boom");
        let err = r.unwrap_err();
        let thrown = err.thrown_value().unwrap();
        assert!(engine.is_type_error(thrown));
        assert!(!engine.is_range_error(thrown));
        let global = engine.global_context();
        assert_eq!(engine.context(global).result(), thrown);
        assert_eq!(engine.take_exception(), Some(thrown));
        assert_eq!(engine.take_exception(), None);
    }

    #[test]
    fn test_scenario_missing_argument() {
        let mut engine = Engine::new();
        let code = CompiledFunction::builder(&mut engine, "f")
            .formals(&["a", "b"])
            .uses_arguments()
            .host(|engine, ctx| {
                let b = engine.intern("b");
                assert_eq!(engine.get_name(ctx, b)?, Value::Undefined);

                let arguments = engine.intern("arguments");
                let args = engine.get_name(ctx, arguments)?.as_object().unwrap();
                let length = engine.property_key("length");
                assert_eq!(engine.get(args, length)?, Value::Integer(1));
                assert_eq!(engine.get(args, PropertyKey::Index(1))?, Value::Undefined);
                assert_eq!(engine.get(args, PropertyKey::Index(0))?, Value::Integer(10));
                Ok(Value::Boolean(true))
            });
        let global = engine.global_context();
        let f = engine.new_script_function(code, global);
        let r = engine.call(f, Value::Undefined, &[Value::Integer(10)]).unwrap();
        assert_eq!(r, Value::Boolean(true));
    }

    #[test]
    fn test_scenario_reassigned_prototype() {
        let mut engine = Engine::new();
        let code = CompiledFunction::builder(&mut engine, "F").build();
        let global = engine.global_context();
        let f = engine.new_script_function(code, global);
        let prototype = engine.property_key("prototype");
        let original = engine.get(f, prototype).unwrap().as_object().unwrap();

        let p = engine.new_plain_object();
        engine.put(f, prototype, Value::Object(p), false).unwrap();
        let instance = engine.construct(f, &[]).unwrap().as_object().unwrap();
        assert_eq!(engine.get_prototype(instance), Some(p));
        assert_ne!(engine.get_prototype(instance), Some(original));
    }

    #[test]
    fn test_prototype_reassigned_during_construction() {
        let mut engine = Engine::new();
        let code = CompiledFunction::builder(&mut engine, "F").host(|engine, ctx| {
            let f = engine.context(ctx).function().unwrap();
            let q = engine.new_plain_object();
            let prototype = engine.property_key("prototype");
            engine.put(f, prototype, Value::Object(q), false)?;
            Ok(Value::Object(q))
        });
        let global = engine.global_context();
        let f = engine.new_script_function(code, global);
        // the body returned an object, which wins
        let q = engine.construct(f, &[]).unwrap().as_object().unwrap();

        let code = CompiledFunction::builder(&mut engine, "G").host(|engine, ctx| {
            let g = engine.context(ctx).function().unwrap();
            let q = engine.new_plain_object();
            let prototype = engine.property_key("prototype");
            engine.put(g, prototype, Value::Object(q), false)?;
            Ok(Value::Undefined)
        });
        let g = engine.new_script_function(code, global);
        let instance = engine.construct(g, &[]).unwrap().as_object().unwrap();
        let prototype = engine.property_key("prototype");
        let latest = engine.get(g, prototype).unwrap().as_object();
        assert_eq!(engine.get_prototype(instance), latest);
        assert_ne!(Some(q), latest);
    }

    #[test]
    fn test_scenario_symbols() {
        let mut engine = Engine::new();
        let a = engine.new_symbol(Some("x"));
        let b = engine.new_symbol(Some("x"));
        assert!(!engine.strict_equals(Value::Symbol(a), Value::Symbol(b)));

        let r1 = engine.symbol_for("x");
        let r2 = engine.symbol_for("x");
        assert!(engine.strict_equals(Value::Symbol(r1), Value::Symbol(r2)));
        let key = engine.key_for(r1).unwrap();
        assert_eq!(engine.string(key), "x");
        assert!(engine.key_for(a).is_none());
    }

    #[test]
    fn test_shape_sharing() {
        let mut engine = Engine::new();
        let names = ["a", "b", "c", "d"];
        let mut objects = Vec::new();
        for _ in 0..3 {
            let o = engine.new_plain_object();
            for (i, name) in names.iter().enumerate() {
                let key = engine.property_key(name);
                engine.put(o, key, Value::Integer(i as i32), false).unwrap();
            }
            objects.push(o);
        }
        let class = engine.object(objects[0]).class();
        assert!(objects.iter().all(|&o| engine.object(o).class() == class));
    }

    #[test]
    fn test_sealed_frozen_fixpoints() {
        let mut engine = Engine::new();
        let o = engine.new_plain_object();
        for name in ["a", "b"] {
            let key = engine.property_key(name);
            engine.put(o, key, Value::Null, false).unwrap();
        }
        let class = engine.object(o).class();
        let sealed = engine.classes.sealed(class);
        assert_eq!(engine.classes.sealed(sealed), sealed);
        let frozen = engine.classes.frozen(class);
        assert_eq!(engine.classes.frozen(frozen), frozen);
    }

    #[test]
    fn test_int32_conversions() {
        for d in [0.0, 1.0, -1.0, 2147483647.0, -2147483648.0, 123456.0, -98765.0] {
            assert_eq!(Value::to_int32(d), d as i32);
        }
        for d in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(Value::to_int32(d), 0);
            assert_eq!(Value::to_uint32(d), 0);
        }
        let two32 = 4294967296.0;
        for d in [0.0, 2.0, -1.0, 3e9, -3e9, 123456789.0] {
            for k in [-2.0, -1.0, 1.0, 3.0] {
                assert_eq!(Value::to_uint32(d), Value::to_uint32(d + k * two32), "{d} {k}");
            }
        }
        // fractions truncate toward zero before the modulo
        assert_eq!(Value::to_uint32(123456789.25 - two32), 123456790);
        assert_eq!(Value::to_uint32(123456789.25), 123456789);
    }

    #[test]
    fn test_alias_with_exact_arity() {
        let mut engine = Engine::new();
        let code = CompiledFunction::builder(&mut engine, "f")
            .formals(&["a", "b"])
            .uses_arguments()
            .host(|engine, ctx| {
                let arguments = engine.intern("arguments");
                let args = engine.get_name(ctx, arguments)?.as_object().unwrap();
                let b = engine.intern("b");
                engine.set_name(ctx, b, Value::Integer(7))?;
                assert_eq!(engine.get(args, PropertyKey::Index(1))?, Value::Integer(7));
                engine.put(args, PropertyKey::Index(1), Value::Integer(8), false)?;
                engine.get_name(ctx, b)
            });
        let global = engine.global_context();
        let f = engine.new_script_function(code, global);
        let r = engine
            .call(f, Value::Undefined, &[Value::Integer(1), Value::Integer(2)])
            .unwrap();
        assert_eq!(r, Value::Integer(8));
    }

    #[test]
    fn test_strict_poisoning_with_zero_arguments() {
        let mut engine = Engine::new();
        let code = CompiledFunction::builder(&mut engine, "f")
            .strict()
            .uses_arguments()
            .host(|engine, ctx| {
                let arguments = engine.intern("arguments");
                let args = engine.get_name(ctx, arguments)?;
                let callee = engine.property_key("callee");
                engine.get_value(args, callee)
            });
        let global = engine.global_context();
        let f = engine.new_script_function(code, global);
        let err = engine.call(f, Value::Undefined, &[]).unwrap_err();
        assert!(engine.is_type_error(err.thrown_value().unwrap()));
    }

    #[test]
    fn test_same_value_integer_double() {
        let engine = Engine::new();
        assert!(engine.same_value(Value::from_int32(0), Value::from_double(0.0)));
        assert_eq!(
            engine.same_value(Value::from_int32(0), Value::from_double(-0.0)),
            engine.same_value(Value::from_double(-0.0), Value::from_int32(0))
        );
    }

    #[test]
    fn test_garbage_collection() {
        let mut engine = Engine::new();
        let kept = engine.new_plain_object();
        let handle = engine.persist(Value::Object(kept));
        let key = engine.property_key("child");
        let child = engine.new_plain_object();
        engine.put(kept, key, Value::Object(child), false).unwrap();
        for _ in 0..10 {
            engine.new_plain_object();
        }
        let stats = engine.collect_garbage();
        assert!(stats.freed_objects >= 10);
        assert_eq!(engine.get(kept, key).unwrap(), Value::Object(child));

        engine.release(handle);
        let stats = engine.collect_garbage();
        assert!(stats.freed_objects >= 2);
    }

    #[test]
    fn test_collection_keeps_closure_scopes() {
        let mut engine = Engine::new();
        let inner = CompiledFunction::builder(&mut engine, "inner").host(|engine, ctx| {
            let secret = engine.intern("secret");
            engine.get_name(ctx, secret)
        });
        let outer = CompiledFunction::builder(&mut engine, "outer")
            .locals(&["secret"])
            .needs_activation()
            .host(move |engine, ctx| {
                let s = Value::String(engine.new_string("kept"));
                engine.set_local(ctx, 0, s);
                Ok(Value::Object(engine.new_script_function(inner.clone(), ctx)))
            });
        let global = engine.global_context();
        let outer = engine.new_script_function(outer, global);
        let closure = engine.call(outer, Value::Undefined, &[]).unwrap();
        let handle = engine.persist(closure);
        engine.collect_garbage();
        let closure = engine.persistent_value(handle).unwrap().as_object().unwrap();
        let r = engine.call(closure, Value::Undefined, &[]).unwrap();
        assert_eq!(engine.to_rust_string(r).unwrap(), "kept");
    }

    #[test]
    fn test_define_property_descriptor_on_global() {
        let mut engine = Engine::new();
        let global = engine.global_object();
        let key = engine.property_key("constant");
        let desc = PropertyDescriptor::data(Value::Integer(1), PropertyAttributes::FROZEN);
        assert!(engine.define_own_property(global, key, desc, false).unwrap());
        engine.put(global, key, Value::Integer(2), false).unwrap();
        assert_eq!(engine.get(global, key).unwrap(), Value::Integer(1));
        assert!(engine.put(global, key, Value::Integer(2), true).is_err());
        engine.take_exception();
    }
}
