//! JavaScript function types
//!
//! This module implements the different function types:
//! - Script functions (a compiled unit closed over a captured scope)
//! - Built-in functions (native Rust functions)
//! - The per-index accessors backing mapped arguments objects
//! - The shared thrower used to poison strict `callee`/`caller`
//! - Bound functions

use std::fmt;
use std::rc::Rc;

use crate::engine::Engine;
use crate::error::Result;
use crate::gc::{Trace, Tracer};
use crate::runtime::identifier::Identifier;
use crate::runtime::object::ObjectKind;
use crate::runtime::property::{PropertyAttributes, PropertyKey};
use crate::value::{ObjectRef, Value};
use crate::vm::context::ContextRef;

/// Native function signature
///
/// Native functions take the engine, the this value, and arguments.
pub type BuiltinFn = fn(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value>;

/// Body of a compiled function run inside its call context
pub type HostFn = Rc<dyn Fn(&mut Engine, ContextRef) -> Result<Value>>;

/// Executable part of a compiled function
#[derive(Clone)]
pub enum FunctionBody {
    /// Returns `undefined`
    Empty,
    /// Host closure standing in for the compiled code
    Host(HostFn),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Empty => write!(f, "Empty"),
            FunctionBody::Host(_) => write!(f, "Host(..)"),
        }
    }
}

/// A compiled function unit as handed over by the compiler
///
/// Treated as already validated: formal and variable names, the activation
/// and arguments flags and strictness are taken as given.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: Option<Identifier>,
    pub formals: Vec<Identifier>,
    pub locals: Vec<Identifier>,
    /// Scope is captured by closures: contexts get heap storage
    pub needs_activation: bool,
    /// Body reads `arguments`
    pub uses_arguments: bool,
    pub strict: bool,
    /// Named function expression: the name resolves to the function itself
    pub is_named_expression: bool,
    pub body: FunctionBody,
}

impl CompiledFunction {
    /// Start building a unit, interning names in `engine`
    pub fn builder<'e>(engine: &'e mut Engine, name: &str) -> CompiledFunctionBuilder<'e> {
        let name = (!name.is_empty()).then(|| engine.intern(name));
        CompiledFunctionBuilder {
            engine,
            unit: CompiledFunction {
                name,
                formals: Vec::new(),
                locals: Vec::new(),
                needs_activation: false,
                uses_arguments: false,
                strict: false,
                is_named_expression: false,
                body: FunctionBody::Empty,
            },
        }
    }

    #[inline]
    pub fn formal_count(&self) -> usize {
        self.formals.len()
    }

    /// Whether a call with `argc` arguments needs heap-owned storage
    pub fn needs_full_activation(&self, argc: usize) -> bool {
        self.needs_activation || self.uses_arguments || argc < self.formals.len()
    }
}

/// Builder for `CompiledFunction`
pub struct CompiledFunctionBuilder<'e> {
    engine: &'e mut Engine,
    unit: CompiledFunction,
}

impl CompiledFunctionBuilder<'_> {
    pub fn formals(mut self, names: &[&str]) -> Self {
        self.unit.formals = names.iter().map(|n| self.engine.intern(n)).collect();
        self
    }

    pub fn locals(mut self, names: &[&str]) -> Self {
        self.unit.locals = names.iter().map(|n| self.engine.intern(n)).collect();
        self
    }

    pub fn needs_activation(mut self) -> Self {
        self.unit.needs_activation = true;
        self
    }

    pub fn uses_arguments(mut self) -> Self {
        self.unit.uses_arguments = true;
        self
    }

    pub fn strict(mut self) -> Self {
        self.unit.strict = true;
        self
    }

    pub fn named_expression(mut self) -> Self {
        self.unit.is_named_expression = true;
        self
    }

    /// Finish with a host body
    pub fn host(
        mut self,
        body: impl Fn(&mut Engine, ContextRef) -> Result<Value> + 'static,
    ) -> Rc<CompiledFunction> {
        self.unit.body = FunctionBody::Host(Rc::new(body));
        Rc::new(self.unit)
    }

    /// Finish with an empty body
    pub fn build(self) -> Rc<CompiledFunction> {
        Rc::new(self.unit)
    }
}

/// What a function object runs when called
#[derive(Debug, Clone)]
pub enum FunctionKind {
    Script {
        code: Rc<CompiledFunction>,
        scope: ContextRef,
    },
    Builtin {
        func: BuiltinFn,
        constructor: bool,
    },
    /// Reads argument `index` of `context` (mapped arguments)
    ArgumentGetter { context: ContextRef, index: u32 },
    /// Writes argument `index` of `context` (mapped arguments)
    ArgumentSetter { context: ContextRef, index: u32 },
    /// Always throws TypeError
    Thrower,
    Bound {
        target: ObjectRef,
        this: Value,
        args: Rc<[Value]>,
    },
}

impl Trace for FunctionKind {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            FunctionKind::Script { scope, .. } => tracer.mark_context(*scope),
            FunctionKind::ArgumentGetter { context, .. }
            | FunctionKind::ArgumentSetter { context, .. } => tracer.mark_context(*context),
            FunctionKind::Bound { target, this, args } => {
                tracer.mark_object(*target);
                tracer.mark_value(*this);
                args.trace(tracer);
            }
            FunctionKind::Builtin { .. } | FunctionKind::Thrower => {}
        }
    }
}

impl Engine {
    pub(crate) fn alloc_function(&mut self, kind: FunctionKind) -> ObjectRef {
        let proto = self.intrinsics.function_prototype;
        self.alloc_object(Some(proto), ObjectKind::Function(kind))
    }

    /// Create a script function closed over `scope`
    ///
    /// Installs `length` and a fresh `prototype` whose `constructor` points
    /// back. The scope must keep its storage after its call returns, which
    /// holds for global, with and catch scopes and for calls that needed a
    /// full activation.
    pub fn new_script_function(&mut self, code: Rc<CompiledFunction>, scope: ContextRef) -> ObjectRef {
        assert!(
            self.context(scope).is_capturable(),
            "closure over a scope without an activation record"
        );
        let length = code.formal_count() as i32;
        let name = code.name;
        let f = self.alloc_function(FunctionKind::Script { code, scope });

        let names = self.names;
        self.define_data_property(f, names.length.into(), Value::Integer(length), PropertyAttributes::FROZEN);
        if let Some(name) = name {
            let text = self.identifiers.name_rc(name);
            let s = self.new_string(&text);
            self.define_data_property(f, names.name.into(), Value::String(s), PropertyAttributes::FROZEN);
        }
        let proto = self.new_plain_object();
        self.define_data_property(proto, names.constructor.into(), Value::Object(f), PropertyAttributes::HIDDEN);
        self.define_data_property(
            f,
            names.prototype.into(),
            Value::Object(proto),
            PropertyAttributes::data(true, false, false),
        );
        f
    }

    /// Create a built-in function
    pub fn new_builtin_function(&mut self, name: &str, arity: u32, func: BuiltinFn) -> ObjectRef {
        self.builtin(name, arity, func, false)
    }

    /// Create a built-in constructor whose `prototype` is `prototype`
    pub fn new_builtin_constructor(
        &mut self,
        name: &str,
        arity: u32,
        func: BuiltinFn,
        prototype: ObjectRef,
    ) -> ObjectRef {
        let f = self.builtin(name, arity, func, true);
        let names = self.names;
        self.define_data_property(f, names.prototype.into(), Value::Object(prototype), PropertyAttributes::FROZEN);
        self.define_data_property(prototype, names.constructor.into(), Value::Object(f), PropertyAttributes::HIDDEN);
        f
    }

    fn builtin(&mut self, name: &str, arity: u32, func: BuiltinFn, constructor: bool) -> ObjectRef {
        let f = self.alloc_function(FunctionKind::Builtin { func, constructor });
        let names = self.names;
        self.define_data_property(f, names.length.into(), Value::from_u32(arity), PropertyAttributes::FROZEN);
        let s = self.new_string(name);
        self.define_data_property(f, names.name.into(), Value::String(s), PropertyAttributes::FROZEN);
        f
    }

    /// Create a bound function (`Function.prototype.bind`)
    pub fn bind_function(&mut self, target: ObjectRef, this: Value, args: &[Value]) -> ObjectRef {
        let f = self.alloc_function(FunctionKind::Bound {
            target,
            this,
            args: Rc::from(args),
        });
        let target_length = match self.get_own_property(target, self.names.length.into()) {
            Some((slot, _)) => slot.value().and_then(|v| v.as_number()).unwrap_or(0.0),
            None => 0.0,
        };
        let length = (target_length - args.len() as f64).max(0.0);
        self.define_data_property(
            f,
            self.names.length.into(),
            Value::from_f64_normalized(length),
            PropertyAttributes::FROZEN,
        );
        f
    }

    pub fn is_callable(&self, value: Value) -> bool {
        self.function_kind(value).is_some()
    }

    pub fn is_constructor(&self, value: Value) -> bool {
        match self.function_kind(value) {
            Some(FunctionKind::Script { .. }) => true,
            Some(FunctionKind::Builtin { constructor, .. }) => *constructor,
            Some(FunctionKind::Bound { target, .. }) => self.is_constructor(Value::Object(*target)),
            _ => false,
        }
    }

    /// `instanceof`: is `F.prototype` on the prototype chain of `value`
    pub fn has_instance(&mut self, function: Value, value: Value) -> Result<bool> {
        let mut f = match function.as_object() {
            Some(f) if self.is_callable(function) => f,
            _ => return self.throw_type_error("Right-hand side of 'instanceof' is not callable"),
        };
        while let Some(FunctionKind::Bound { target, .. }) = self.function_kind(Value::Object(f)) {
            f = *target;
        }
        let Some(o) = value.as_object() else {
            return Ok(false);
        };
        let proto = self.get(f, PropertyKey::Name(self.names.prototype))?;
        let Some(proto) = proto.as_object() else {
            return self.throw_type_error("Function has non-object prototype in instanceof check");
        };
        let mut current = self.object(o).prototype;
        while let Some(p) = current {
            if p == proto {
                return Ok(true);
            }
            current = self.object(p).prototype;
        }
        Ok(false)
    }

    /// The `name` own property of a function, empty when absent
    pub fn function_name(&self, f: ObjectRef) -> String {
        match self.get_own_property(f, self.names.name.into()) {
            Some((slot, _)) => match slot.value() {
                Some(Value::String(s)) => self.string(s).to_string(),
                _ => String::new(),
            },
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_function_properties() {
        let mut engine = Engine::new();
        let code = CompiledFunction::builder(&mut engine, "f").formals(&["a", "b"]).build();
        let global = engine.global_context();
        let f = engine.new_script_function(code, global);

        let length = engine.property_key("length");
        assert_eq!(engine.get(f, length).unwrap(), Value::Integer(2));
        let (_, attrs) = engine.get_own_property(f, length).unwrap();
        assert!(!attrs.is_writable() && !attrs.is_enumerable() && !attrs.is_configurable());

        let prototype = engine.property_key("prototype");
        let proto = engine.get(f, prototype).unwrap().as_object().unwrap();
        let constructor = engine.property_key("constructor");
        assert_eq!(engine.get(proto, constructor).unwrap(), Value::Object(f));
        assert_eq!(engine.function_name(f), "f");
        assert!(engine.is_constructor(Value::Object(f)));
    }

    #[test]
    fn test_builtin_function() {
        let mut engine = Engine::new();
        let f = engine.new_builtin_function("answer", 0, |_, _, _| Ok(Value::Integer(42)));
        assert!(engine.is_callable(Value::Object(f)));
        assert!(!engine.is_constructor(Value::Object(f)));
        assert_eq!(engine.call(f, Value::Undefined, &[]).unwrap(), Value::Integer(42));
        assert!(!engine.is_callable(Value::Integer(1)));
    }

    #[test]
    fn test_has_instance() {
        let mut engine = Engine::new();
        let code = CompiledFunction::builder(&mut engine, "F").build();
        let global = engine.global_context();
        let f = engine.new_script_function(code, global);
        let instance = engine.construct(f, &[]).unwrap();
        assert!(engine.has_instance(Value::Object(f), instance).unwrap());
        let plain = engine.new_plain_object();
        assert!(!engine.has_instance(Value::Object(f), Value::Object(plain)).unwrap());
        assert!(!engine.has_instance(Value::Object(f), Value::Integer(1)).unwrap());
        assert!(engine.has_instance(Value::Integer(1), instance).is_err());
    }

    #[test]
    fn test_bound_function() {
        let mut engine = Engine::new();
        let f = engine.new_builtin_function("args", 3, |_, _, args| {
            Ok(Value::from_u32(args.len() as u32))
        });
        let bound = engine.bind_function(f, Value::Null, &[Value::Integer(1)]);
        let length = engine.property_key("length");
        assert_eq!(engine.get(bound, length).unwrap(), Value::Integer(2));
        let r = engine.call(bound, Value::Undefined, &[Value::Integer(2)]).unwrap();
        assert_eq!(r, Value::Integer(2));
    }

    #[test]
    #[should_panic(expected = "closure over a scope without an activation record")]
    fn test_closure_needs_activation() {
        let mut engine = Engine::new();
        let inner = CompiledFunction::builder(&mut engine, "inner").build();
        let outer = CompiledFunction::builder(&mut engine, "outer").host(move |engine, ctx| {
            let f = engine.new_script_function(inner.clone(), ctx);
            Ok(Value::Object(f))
        });
        let global = engine.global_context();
        let f = engine.new_script_function(outer, global);
        let _ = engine.call(f, Value::Undefined, &[]);
    }
}
