//! Call protocol
//!
//! Entering a script function builds a context whose parent is the scope the
//! function closed over, binds arguments and zeroes locals, runs the body and
//! leaves again. Constructor calls add one step before leaving: the new
//! object's prototype is re-resolved from the callee's `prototype` property.
//!
//! Built-in functions run without a context of their own.

use std::rc::Rc;

use tracing::trace;

use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::function::{CompiledFunction, FunctionBody, FunctionKind};
use crate::runtime::object::ObjectKind;
use crate::runtime::property::PropertyKey;
use crate::value::{ObjectRef, Value};
use crate::vm::context::{ContextKind, ContextRef, ContextState, ExecutionContext, Storage};

impl Engine {
    /// `[[Call]]`
    pub fn call(&mut self, f: ObjectRef, this: Value, args: &[Value]) -> Result<Value> {
        let kind = match &self.object(f).kind {
            ObjectKind::Function(kind) => kind.clone(),
            _ => {
                let msg = format!("{} is not a function", self.describe_callee(f));
                return self.throw_type_error(&msg);
            }
        };
        self.enter_call()?;
        let result = self.dispatch_call(f, kind, this, args);
        self.call_depth -= 1;
        result
    }

    /// `[[Call]]` on any value; non-callables raise TypeError
    pub fn call_value(&mut self, f: Value, this: Value, args: &[Value]) -> Result<Value> {
        match f {
            Value::Object(o) if self.is_callable(f) => self.call(o, this, args),
            _ => {
                let msg = format!("{} is not a function", self.type_of(f));
                self.throw_type_error(&msg)
            }
        }
    }

    /// `[[Construct]]`
    pub fn construct(&mut self, f: ObjectRef, args: &[Value]) -> Result<Value> {
        if !self.is_constructor(Value::Object(f)) {
            let msg = format!("{} is not a constructor", self.describe_callee(f));
            return self.throw_type_error(&msg);
        }
        let Some(kind) = self.function_kind(Value::Object(f)).cloned() else {
            return self.throw_type_error("not a constructor");
        };
        self.enter_call()?;
        let result = self.dispatch_construct(f, kind, args);
        self.call_depth -= 1;
        result
    }

    /// `new` on any value; non-constructors raise TypeError
    pub fn construct_value(&mut self, f: Value, args: &[Value]) -> Result<Value> {
        match f {
            Value::Object(o) => self.construct(o, args),
            _ => {
                let msg = format!("{} is not a constructor", self.type_of(f));
                self.throw_type_error(&msg)
            }
        }
    }

    fn enter_call(&mut self) -> Result<()> {
        if self.call_depth >= self.config.max_call_depth {
            return self.throw_range_error("Maximum call stack size exceeded");
        }
        self.call_depth += 1;
        Ok(())
    }

    fn dispatch_call(
        &mut self,
        f: ObjectRef,
        kind: FunctionKind,
        this: Value,
        args: &[Value],
    ) -> Result<Value> {
        match kind {
            FunctionKind::Script { code, .. } => {
                let ctx = self.init_call_context(f, this, args)?;
                let result = self.run_body(ctx, &code);
                self.leave_call_context(ctx);
                result
            }
            FunctionKind::Builtin { func, .. } => func(self, this, args),
            FunctionKind::ArgumentGetter { context, index } => Ok(self.argument(context, index as usize)),
            FunctionKind::ArgumentSetter { context, index } => {
                let value = args.first().copied().unwrap_or(Value::Undefined);
                self.set_argument(context, index as usize, value);
                Ok(Value::Undefined)
            }
            FunctionKind::Thrower => self.throw_type_error(
                "'caller', 'callee' and 'arguments' properties may not be accessed in strict mode",
            ),
            FunctionKind::Bound {
                target,
                this,
                args: bound,
            } => {
                let all: Vec<Value> = bound.iter().chain(args).copied().collect();
                self.call(target, this, &all)
            }
        }
    }

    fn dispatch_construct(&mut self, f: ObjectRef, kind: FunctionKind, args: &[Value]) -> Result<Value> {
        match kind {
            FunctionKind::Script { code, .. } => {
                let ctx = self.init_constructor_context(f, args)?;
                let result = match self.run_body(ctx, &code) {
                    Ok(returned) if returned.is_object() => Ok(returned),
                    Ok(_) => self.wire_up_prototype(ctx),
                    Err(e) => Err(e),
                };
                self.leave_call_context(ctx);
                result
            }
            FunctionKind::Builtin { func, .. } => {
                let result = func(self, Value::Undefined, args)?;
                if !result.is_object() {
                    return self.throw_type_error("constructor did not return an object");
                }
                Ok(result)
            }
            FunctionKind::Bound {
                target, args: bound, ..
            } => {
                let all: Vec<Value> = bound.iter().chain(args).copied().collect();
                self.construct(target, &all)
            }
            _ => self.throw_type_error("not a constructor"),
        }
    }

    fn run_body(&mut self, ctx: ContextRef, code: &CompiledFunction) -> Result<Value> {
        let value = match &code.body {
            FunctionBody::Empty => Value::Undefined,
            FunctionBody::Host(body) => {
                let body = Rc::clone(body);
                body(self, ctx)?
            }
        };
        self.context_mut(ctx).result = value;
        Ok(value)
    }

    /// Enter a script function
    ///
    /// Calls that need a full activation copy their arguments into owned
    /// storage padded to the formal count; others bind the caller's values
    /// in place on the engine stack. Locals start out `undefined`.
    pub fn init_call_context(&mut self, f: ObjectRef, this: Value, args: &[Value]) -> Result<ContextRef> {
        let Some(FunctionKind::Script { code, scope }) = self.function_kind(Value::Object(f)) else {
            panic!("init_call_context on a function without compiled code");
        };
        let (code, scope) = (Rc::clone(code), *scope);
        assert!(
            self.heap.contexts.contains(scope.0),
            "captured scope of a live function was freed"
        );

        let this_object = if code.strict {
            this
        } else {
            match this {
                Value::Undefined | Value::Null => Value::Object(self.intrinsics.global_object),
                Value::Object(_) => this,
                _ => Value::Object(self.to_object(this)?),
            }
        };

        let argc = args.len();
        let formals = code.formal_count();
        let stack_base = self.stack.len();
        let full = code.needs_full_activation(argc);

        let (arguments, locals) = if full {
            let mut owned = args.to_vec();
            owned.resize(formals.max(argc), Value::Undefined);
            (
                Storage::Owned(owned),
                Storage::Owned(vec![Value::Undefined; code.locals.len()]),
            )
        } else {
            let frame = self
                .stack
                .push_slice(args)
                .and_then(|_| self.stack.push_frame(code.locals.len()));
            let Ok(locals_base) = frame else {
                self.stack.truncate(stack_base);
                return self.throw_range_error("Maximum call stack size exceeded");
            };
            (
                Storage::Stack {
                    base: stack_base,
                    len: argc,
                },
                Storage::Stack {
                    base: locals_base,
                    len: code.locals.len(),
                },
            )
        };

        let context = ExecutionContext::call(scope, f, code, this_object, arguments, argc, locals, stack_base);
        let ctx = self.alloc_context(context);
        self.context_mut(ctx).state = ContextState::Active;
        self.context_stack.push(ctx);
        trace!(context = ?ctx, argc, full, "enter call context");
        Ok(ctx)
    }

    /// Enter a script function as a constructor
    ///
    /// `this` is a fresh object inheriting from the callee's `prototype`, or
    /// from `Object.prototype` when that is not an object.
    pub fn init_constructor_context(&mut self, f: ObjectRef, args: &[Value]) -> Result<ContextRef> {
        let proto = self.instance_prototype(f)?;
        let this = self.new_object(Some(proto));
        let ctx = self.init_call_context(f, Value::Object(this), args)?;
        self.context_mut(ctx).kind = ContextKind::Constructor;
        Ok(ctx)
    }

    /// Final constructor step: `result` becomes `this`, whose prototype is
    /// re-read from the callee's `prototype` property
    pub fn wire_up_prototype(&mut self, ctx: ContextRef) -> Result<Value> {
        let (this, function) = {
            let context = self.context_mut(ctx);
            assert_eq!(context.state, ContextState::Active, "wire-up outside an active constructor");
            assert_eq!(context.kind, ContextKind::Constructor, "wire-up on a plain call");
            context.state = ContextState::WiringPrototype;
            (context.this_object, context.function)
        };
        debug_assert!(this.is_object(), "constructor context without an object receiver");
        let instance = match this {
            Value::Object(o) => {
                let proto = match function {
                    Some(f) => self.instance_prototype(f)?,
                    None => self.intrinsics.object_prototype,
                };
                self.set_prototype(o, Some(proto));
                o
            }
            _ => {
                let proto = self.intrinsics.object_prototype;
                self.new_object(Some(proto))
            }
        };
        self.context_mut(ctx).result = Value::Object(instance);
        Ok(Value::Object(instance))
    }

    fn instance_prototype(&mut self, f: ObjectRef) -> Result<ObjectRef> {
        let key = PropertyKey::Name(self.names.prototype);
        Ok(match self.get(f, key)? {
            Value::Object(p) => p,
            _ => self.intrinsics.object_prototype,
        })
    }

    /// Leave a call context
    ///
    /// Scopes still pushed above it (an exception escaped a `with` or `catch`
    /// body) are unwound first. Stack storage is released; contexts whose
    /// storage was promoted keep their arena slot for whoever still holds them.
    pub fn leave_call_context(&mut self, ctx: ContextRef) {
        {
            let context = self.context_mut(ctx);
            assert!(
                matches!(context.state, ContextState::Active | ContextState::WiringPrototype),
                "leaving a context in state {:?}",
                context.state
            );
            context.state = ContextState::Leaving;
        }
        assert!(self.context_stack.contains(&ctx), "leaving a context that is not on the stack");
        while let Some(top) = self.context_stack.pop() {
            if top == ctx {
                break;
            }
            trace!(context = ?top, "unwinding scope");
            self.context_mut(top).state = ContextState::Destroyed;
        }

        let context = self.context_mut(ctx);
        context.state = ContextState::Destroyed;
        let stack_base = context.stack_base;
        let keep = context.arguments.is_owned() && context.locals.is_owned();
        self.stack.truncate(stack_base);
        if !keep {
            self.heap.contexts.free(ctx.0);
        }
        trace!(context = ?ctx, keep, "leave call context");
    }

    fn describe_callee(&self, f: ObjectRef) -> String {
        let name = self.function_name(f);
        if name.is_empty() {
            self.object(f).kind.class_name().to_string()
        } else {
            name
        }
    }
}
