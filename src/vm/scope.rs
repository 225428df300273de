//! Name resolution
//!
//! Identifiers resolve by walking the context chain outward from the current
//! context. A call context answers from its locals, formals, activation
//! object, `arguments` and, for a named function expression, its own name;
//! `with` scopes answer from their object, `catch` scopes from the caught
//! exception, and the global context from the global object.

use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::identifier::Identifier;
use crate::runtime::operators::BinaryOp;
use crate::runtime::property::{PropertyAttributes, PropertyKey};
use crate::value::{ObjectRef, Value};
use crate::vm::context::{ContextKind, ContextRef, ContextState, ExecutionContext};

/// Where a resolved name lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Argument(ContextRef, usize),
    Local(ContextRef, usize),
    /// The exception of a catch scope
    Catch(ContextRef),
    /// Property of an activation, `with` or global object
    Property { object: ObjectRef, with: bool },
    /// `arguments` of a call context, materialized on read
    ArgumentsObject(ContextRef),
    /// Name of a named function expression
    FunctionSelf(ObjectRef),
}

impl Engine {
    /// Resolve `name` starting at `ctx`
    pub fn resolve_name(&self, ctx: ContextRef, name: Identifier) -> Option<Binding> {
        let key = PropertyKey::Name(name);
        let mut current = Some(ctx);
        while let Some(c) = current {
            let context = self.context(c);
            let found = match context.kind {
                ContextKind::Global => {
                    let global = self.intrinsics.global_object;
                    self.has_property(global, key).then_some(Binding::Property {
                        object: global,
                        with: false,
                    })
                }
                ContextKind::With => context
                    .with_object
                    .filter(|&o| self.has_property(o, key))
                    .map(|object| Binding::Property { object, with: true }),
                ContextKind::Catch => (context.exception_name == Some(name)).then_some(Binding::Catch(c)),
                ContextKind::Call | ContextKind::Constructor => self.resolve_in_call(c, context, name),
            };
            if found.is_some() {
                return found;
            }
            current = context.parent;
        }
        None
    }

    fn resolve_in_call(&self, c: ContextRef, context: &ExecutionContext, name: Identifier) -> Option<Binding> {
        let code = context.code.as_ref()?;
        if let Some(i) = code.locals.iter().position(|&n| n == name) {
            return Some(Binding::Local(c, i));
        }
        // a repeated formal binds to its last occurrence
        if let Some(i) = code.formals.iter().rposition(|&n| n == name) {
            return Some(Binding::Argument(c, i));
        }
        if let Some(object) = context.activation {
            if self.has_own_property(object, PropertyKey::Name(name)) {
                return Some(Binding::Property { object, with: false });
            }
        }
        if name == self.names.arguments {
            return Some(Binding::ArgumentsObject(c));
        }
        if code.is_named_expression && code.name == Some(name) {
            return context.function.map(Binding::FunctionSelf);
        }
        None
    }

    fn read_binding(&mut self, binding: Binding, name: Identifier) -> Result<Value> {
        match binding {
            Binding::Argument(c, i) => Ok(self.argument(c, i)),
            Binding::Local(c, i) => Ok(self.local(c, i)),
            Binding::Catch(c) => Ok(self.context(c).exception_value),
            Binding::Property { object, .. } => self.get(object, PropertyKey::Name(name)),
            Binding::ArgumentsObject(c) => Ok(self.arguments_object(c).map_or(Value::Undefined, Value::Object)),
            Binding::FunctionSelf(f) => Ok(Value::Object(f)),
        }
    }

    fn write_binding(&mut self, ctx: ContextRef, binding: Binding, name: Identifier, value: Value) -> Result<()> {
        let strict = self.context(ctx).strict;
        match binding {
            Binding::Argument(c, i) => {
                self.set_argument(c, i, value);
            }
            Binding::Local(c, i) => {
                self.set_local(c, i, value);
            }
            Binding::Catch(c) => self.context_mut(c).exception_value = value,
            Binding::Property { object, .. } => self.put(object, PropertyKey::Name(name), value, strict)?,
            Binding::ArgumentsObject(c) => {
                // shadows the lazily created object from now on
                let activation = self.ensure_activation(c);
                self.define_data_property(activation, PropertyKey::Name(name), value, PropertyAttributes::DEFAULT);
            }
            Binding::FunctionSelf(_) => {
                if strict {
                    return self.throw_type_error("Assignment to constant variable.");
                }
            }
        }
        Ok(())
    }

    fn throw_unresolved<T>(&mut self, name: Identifier) -> Result<T> {
        let msg = format!("{} is not defined", self.identifiers.name(name));
        self.throw_reference_error(&msg)
    }

    /// Read a variable; unresolved names raise ReferenceError
    pub fn get_name(&mut self, ctx: ContextRef, name: Identifier) -> Result<Value> {
        if name == self.names.this {
            return Ok(self.this_binding(ctx));
        }
        match self.resolve_name(ctx, name) {
            Some(binding) => self.read_binding(binding, name),
            None => self.throw_unresolved(name),
        }
    }

    /// Read a variable for `typeof`: unresolved names read `undefined`
    pub fn get_name_no_throw(&mut self, ctx: ContextRef, name: Identifier) -> Result<Value> {
        if name == self.names.this {
            return Ok(self.this_binding(ctx));
        }
        match self.resolve_name(ctx, name) {
            Some(binding) => self.read_binding(binding, name),
            None => Ok(Value::Undefined),
        }
    }

    /// Read a variable about to be called: `(value, this)`
    ///
    /// `this` is the `with` object the name was found on, otherwise
    /// `undefined`.
    pub fn get_name_and_base(&mut self, ctx: ContextRef, name: Identifier) -> Result<(Value, Value)> {
        match self.resolve_name(ctx, name) {
            Some(binding) => {
                let base = match binding {
                    Binding::Property { object, with: true } => Value::Object(object),
                    _ => Value::Undefined,
                };
                Ok((self.read_binding(binding, name)?, base))
            }
            None if name == self.names.this => Ok((self.this_binding(ctx), Value::Undefined)),
            None => self.throw_unresolved(name),
        }
    }

    /// Assign a variable
    ///
    /// An unresolved name becomes a global property, except in strict code
    /// where it raises ReferenceError.
    pub fn set_name(&mut self, ctx: ContextRef, name: Identifier, value: Value) -> Result<()> {
        match self.resolve_name(ctx, name) {
            Some(binding) => self.write_binding(ctx, binding, name, value),
            None if self.context(ctx).strict || name == self.names.this => self.throw_unresolved(name),
            None => {
                let global = self.intrinsics.global_object;
                self.put(global, PropertyKey::Name(name), value, false)
            }
        }
    }

    /// `delete name`
    pub fn delete_name(&mut self, ctx: ContextRef, name: Identifier) -> Result<bool> {
        match self.resolve_name(ctx, name) {
            Some(Binding::Property { object, .. }) => self.delete(object, PropertyKey::Name(name), false),
            Some(_) => Ok(false),
            None => Ok(true),
        }
    }

    /// Compound assignment `name op= rhs`, returning the stored value
    pub fn inplace_bin_op(&mut self, ctx: ContextRef, name: Identifier, op: BinaryOp, rhs: Value) -> Result<Value> {
        match self.resolve_name(ctx, name) {
            Some(Binding::Property { object, .. }) => {
                let strict = self.context(ctx).strict;
                self.inplace_bin_op_property(object, PropertyKey::Name(name), op, rhs, strict)
            }
            Some(binding) => {
                let lhs = self.read_binding(binding, name)?;
                let result = self.binary_op(op, lhs, rhs)?;
                self.write_binding(ctx, binding, name, result)?;
                Ok(result)
            }
            None => self.throw_unresolved(name),
        }
    }

    /// Read-modify-write of one property: a getter and a setter each run once
    pub fn inplace_bin_op_property(
        &mut self,
        object: ObjectRef,
        key: PropertyKey,
        op: BinaryOp,
        rhs: Value,
        strict: bool,
    ) -> Result<Value> {
        let lhs = self.get(object, key)?;
        let result = self.binary_op(op, lhs, rhs)?;
        self.put(object, key, result, strict)?;
        Ok(result)
    }

    /// `var name`: create a binding on the variable object unless one exists
    ///
    /// Bindings made by `eval` code are `deletable`.
    pub fn declare_var(&mut self, ctx: ContextRef, name: Identifier, deletable: bool) {
        if let Some(Binding::Argument(c, _) | Binding::Local(c, _)) = self.resolve_name(ctx, name) {
            if self.variable_context(ctx) == Some(c) {
                return;
            }
        }
        let target = self.variable_object(ctx);
        let key = PropertyKey::Name(name);
        if !self.has_own_property(target, key) {
            let attrs = PropertyAttributes::data(true, true, deletable);
            self.define_data_property(target, key, Value::Undefined, attrs);
        }
    }

    fn variable_context(&self, ctx: ContextRef) -> Option<ContextRef> {
        let mut current = Some(ctx);
        while let Some(c) = current {
            let context = self.context(c);
            match context.kind {
                ContextKind::Call | ContextKind::Constructor => return Some(c),
                ContextKind::Global => return None,
                ContextKind::With | ContextKind::Catch => current = context.parent,
            }
        }
        None
    }

    /// Enter `with (object)`; returns the new innermost scope
    pub fn push_with_scope(&mut self, ctx: ContextRef, object: ObjectRef) -> ContextRef {
        self.retain_chain(ctx);
        let strict = self.context(ctx).strict;
        let scope = self.alloc_context(ExecutionContext::with_scope(ctx, object, strict));
        self.context_stack.push(scope);
        scope
    }

    /// Enter a `catch (name)` block; returns the new innermost scope
    pub fn push_catch_scope(&mut self, ctx: ContextRef, name: Identifier, value: Value) -> ContextRef {
        self.retain_chain(ctx);
        let strict = self.context(ctx).strict;
        let scope = self.alloc_context(ExecutionContext::catch_scope(ctx, name, value, strict));
        self.context_stack.push(scope);
        scope
    }

    /// Leave a `with` or `catch` scope; returns its parent
    pub fn pop_scope(&mut self, scope: ContextRef) -> ContextRef {
        let context = self.context_mut(scope);
        assert!(
            matches!(context.kind, ContextKind::With | ContextKind::Catch),
            "pop_scope on a {:?} context",
            context.kind
        );
        context.state = ContextState::Destroyed;
        let parent = context.parent;
        let top = self.context_stack.pop();
        assert_eq!(top, Some(scope), "scope popped out of order");
        parent.unwrap_or(self.global_context)
    }

    /// Scopes may be captured by closures, so every call context they sit
    /// in must keep its slots past the call
    fn retain_chain(&mut self, ctx: ContextRef) {
        let mut current = Some(ctx);
        while let Some(c) = current {
            if self.context(c).is_function_context() {
                self.promote_context_storage(c);
            }
            current = self.context(c).parent;
        }
    }
}
