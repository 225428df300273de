//! Execution contexts
//!
//! One context per activation: the global scope, a call, a constructor
//! call, or a `with`/`catch` scope. Contexts live in the heap's context arena
//! and link outward through `parent`, which is the lexical scope the callee
//! closed over rather than the caller.
//!
//! Argument and local storage is either a window of the engine value stack
//! (released when the call leaves) or an owned vector that outlives the call.
//! Owned storage is used whenever something may observe the slots after the
//! call returns: closures, the `arguments` object, or `with`/`catch` scopes.

use std::fmt;
use std::rc::Rc;

use crate::engine::Engine;
use crate::gc::{Trace, Tracer};
use crate::runtime::function::CompiledFunction;
use crate::runtime::identifier::Identifier;
use crate::value::{ObjectRef, Value};
use crate::vm::stack::Stack;

/// Handle to an execution context in the engine's context arena
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextRef(pub(crate) u32);

impl ContextRef {
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextRef({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Global,
    Call,
    Constructor,
    With,
    Catch,
}

/// Lifecycle of a context
///
/// `Uninitialized -> Active -> (WiringPrototype) -> Leaving -> Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Active,
    WiringPrototype,
    Leaving,
    Destroyed,
}

/// Where a context keeps its argument or local slots
#[derive(Debug, Clone)]
pub enum Storage {
    /// `len` slots of the engine stack starting at `base`
    Stack { base: usize, len: usize },
    /// Heap-owned slots that survive the call
    Owned(Vec<Value>),
}

pub type ArgumentStorage = Storage;
pub type LocalStorage = Storage;

impl Storage {
    pub fn len(&self) -> usize {
        match self {
            Storage::Stack { len, .. } => *len,
            Storage::Owned(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Storage::Owned(_))
    }

    fn get(&self, stack: &Stack, index: usize) -> Value {
        match self {
            Storage::Stack { base, len } if index < *len => stack.get(base + index),
            Storage::Owned(v) => v.get(index).copied().unwrap_or(Value::Undefined),
            Storage::Stack { .. } => Value::Undefined,
        }
    }

    fn set(&mut self, stack: &mut Stack, index: usize, value: Value) -> bool {
        match self {
            Storage::Stack { base, len } if index < *len => {
                stack.set(*base + index, value);
                true
            }
            Storage::Owned(v) => match v.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            Storage::Stack { .. } => false,
        }
    }

    fn promote(&mut self, stack: &Stack) {
        if let Storage::Stack { base, len } = *self {
            *self = Storage::Owned(stack.slice(base, len).to_vec());
        }
    }
}

/// One activation record
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub(crate) kind: ContextKind,
    pub(crate) state: ContextState,
    pub(crate) parent: Option<ContextRef>,
    /// Running function (calls only)
    pub(crate) function: Option<ObjectRef>,
    pub(crate) code: Option<Rc<CompiledFunction>>,
    pub(crate) this_object: Value,
    pub(crate) strict: bool,
    pub(crate) arguments: ArgumentStorage,
    /// Actual argument count; `arguments` may be padded past it
    pub(crate) argument_count: usize,
    pub(crate) locals: LocalStorage,
    /// Holds declared and dynamically created variables
    pub(crate) activation: Option<ObjectRef>,
    pub(crate) arguments_object: Option<ObjectRef>,
    pub(crate) with_object: Option<ObjectRef>,
    pub(crate) exception_name: Option<Identifier>,
    pub(crate) exception_value: Value,
    pub(crate) result: Value,
    /// Engine stack height at entry, restored on leave
    pub(crate) stack_base: usize,
}

impl ExecutionContext {
    fn blank(kind: ContextKind, parent: Option<ContextRef>, strict: bool) -> Self {
        ExecutionContext {
            kind,
            state: ContextState::Uninitialized,
            parent,
            function: None,
            code: None,
            this_object: Value::Undefined,
            strict,
            arguments: Storage::Owned(Vec::new()),
            argument_count: 0,
            locals: Storage::Owned(Vec::new()),
            activation: None,
            arguments_object: None,
            with_object: None,
            exception_name: None,
            exception_value: Value::Undefined,
            result: Value::Undefined,
            stack_base: 0,
        }
    }

    /// The outermost context; `this` and the variable object are the global object
    pub(crate) fn global(global_object: ObjectRef) -> Self {
        let mut ctx = Self::blank(ContextKind::Global, None, false);
        ctx.state = ContextState::Active;
        ctx.this_object = Value::Object(global_object);
        ctx.activation = Some(global_object);
        ctx
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn call(
        parent: ContextRef,
        function: ObjectRef,
        code: Rc<CompiledFunction>,
        this_object: Value,
        arguments: ArgumentStorage,
        argument_count: usize,
        locals: LocalStorage,
        stack_base: usize,
    ) -> Self {
        let mut ctx = Self::blank(ContextKind::Call, Some(parent), code.strict);
        ctx.function = Some(function);
        ctx.code = Some(code);
        ctx.this_object = this_object;
        ctx.arguments = arguments;
        ctx.argument_count = argument_count;
        ctx.locals = locals;
        ctx.stack_base = stack_base;
        ctx
    }

    pub(crate) fn with_scope(parent: ContextRef, object: ObjectRef, strict: bool) -> Self {
        let mut ctx = Self::blank(ContextKind::With, Some(parent), strict);
        ctx.with_object = Some(object);
        ctx.state = ContextState::Active;
        ctx
    }

    pub(crate) fn catch_scope(parent: ContextRef, name: Identifier, value: Value, strict: bool) -> Self {
        let mut ctx = Self::blank(ContextKind::Catch, Some(parent), strict);
        ctx.exception_name = Some(name);
        ctx.exception_value = value;
        ctx.state = ContextState::Active;
        ctx
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn parent(&self) -> Option<ContextRef> {
        self.parent
    }

    pub fn function(&self) -> Option<ObjectRef> {
        self.function
    }

    pub fn this_object(&self) -> Value {
        self.this_object
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn argument_count(&self) -> usize {
        self.argument_count
    }

    pub fn result(&self) -> Value {
        self.result
    }

    pub fn activation(&self) -> Option<ObjectRef> {
        self.activation
    }

    /// Call or constructor context
    pub fn is_function_context(&self) -> bool {
        matches!(self.kind, ContextKind::Call | ContextKind::Constructor)
    }

    /// Whether closures may capture this context as their scope
    pub fn is_capturable(&self) -> bool {
        match self.kind {
            ContextKind::Global | ContextKind::With | ContextKind::Catch => true,
            ContextKind::Call | ContextKind::Constructor => {
                self.arguments.is_owned() && self.locals.is_owned()
            }
        }
    }
}

impl Trace for ExecutionContext {
    fn trace(&self, tracer: &mut Tracer) {
        self.parent.trace(tracer);
        self.function.trace(tracer);
        tracer.mark_value(self.this_object);
        self.activation.trace(tracer);
        self.arguments_object.trace(tracer);
        self.with_object.trace(tracer);
        tracer.mark_value(self.exception_value);
        tracer.mark_value(self.result);
        // stack windows are reached through the engine stack root
        if let Storage::Owned(values) = &self.arguments {
            values.trace(tracer);
        }
        if let Storage::Owned(values) = &self.locals {
            values.trace(tracer);
        }
    }
}

impl Engine {
    #[inline]
    pub fn context(&self, ctx: ContextRef) -> &ExecutionContext {
        &self.heap.contexts[ctx.0]
    }

    #[inline]
    pub(crate) fn context_mut(&mut self, ctx: ContextRef) -> &mut ExecutionContext {
        &mut self.heap.contexts[ctx.0]
    }

    pub(crate) fn alloc_context(&mut self, context: ExecutionContext) -> ContextRef {
        ContextRef(self.heap.contexts.alloc(context))
    }

    /// Innermost active context
    pub fn current_context(&self) -> ContextRef {
        self.context_stack.last().copied().unwrap_or(self.global_context)
    }

    /// Depth of the active context stack, the global context included
    pub fn context_depth(&self) -> usize {
        self.context_stack.len()
    }

    /// Argument `index`; `undefined` past the bound slots
    pub fn argument(&self, ctx: ContextRef, index: usize) -> Value {
        self.context(ctx).arguments.get(&self.stack, index)
    }

    pub fn set_argument(&mut self, ctx: ContextRef, index: usize, value: Value) -> bool {
        let context = &mut self.heap.contexts[ctx.0];
        context.arguments.set(&mut self.stack, index, value)
    }

    pub fn local(&self, ctx: ContextRef, index: usize) -> Value {
        self.context(ctx).locals.get(&self.stack, index)
    }

    pub fn set_local(&mut self, ctx: ContextRef, index: usize, value: Value) -> bool {
        let context = &mut self.heap.contexts[ctx.0];
        context.locals.set(&mut self.stack, index, value)
    }

    /// `this` as seen from `ctx`: the nearest call's receiver or the global object
    pub fn this_binding(&self, ctx: ContextRef) -> Value {
        let mut current = Some(ctx);
        while let Some(c) = current {
            let context = self.context(c);
            match context.kind {
                ContextKind::Call | ContextKind::Constructor | ContextKind::Global => {
                    return context.this_object;
                }
                ContextKind::With | ContextKind::Catch => current = context.parent,
            }
        }
        Value::Object(self.intrinsics.global_object)
    }

    /// Move stack-backed slots into owned storage
    ///
    /// The context then survives its call: its arena slot is kept at leave
    /// and closures or argument accessors may keep reading it.
    pub fn promote_context_storage(&mut self, ctx: ContextRef) {
        let context = &mut self.heap.contexts[ctx.0];
        context.arguments.promote(&self.stack);
        context.locals.promote(&self.stack);
    }

    /// The `arguments` object of a call context, created on first use
    pub fn arguments_object(&mut self, ctx: ContextRef) -> Option<ObjectRef> {
        let context = self.context(ctx);
        if !context.is_function_context() {
            return None;
        }
        if let Some(o) = context.arguments_object {
            return Some(o);
        }
        self.promote_context_storage(ctx);
        let o = self.new_arguments_object(ctx);
        self.context_mut(ctx).arguments_object = Some(o);
        Some(o)
    }

    /// Variable object of the nearest call context, or the global object
    pub(crate) fn variable_object(&mut self, ctx: ContextRef) -> ObjectRef {
        let mut current = Some(ctx);
        while let Some(c) = current {
            let context = self.context(c);
            match context.kind {
                ContextKind::Call | ContextKind::Constructor => return self.ensure_activation(c),
                ContextKind::Global => return self.intrinsics.global_object,
                ContextKind::With | ContextKind::Catch => current = context.parent,
            }
        }
        self.intrinsics.global_object
    }

    /// The activation object of a call context, created without a prototype
    pub(crate) fn ensure_activation(&mut self, ctx: ContextRef) -> ObjectRef {
        if let Some(o) = self.context(ctx).activation {
            return o;
        }
        let o = self.new_object(None);
        self.context_mut(ctx).activation = Some(o);
        o
    }
}
