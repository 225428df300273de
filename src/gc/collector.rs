//! Mark-sweep garbage collector
//!
//! The GC works in two phases:
//! 1. Mark: starting from the engine roots, every heap value reports its
//!    outgoing references to a `Tracer`; reached slots get their mark bit
//! 2. Sweep: every unmarked slot in every arena is freed
//!
//! Handles are arena indices, so nothing moves and no reference needs
//! updating after a cycle.

use tracing::debug;

use crate::engine::Engine;
use crate::value::{ObjectRef, StringRef, SymbolRef, Value};
use crate::vm::context::ContextRef;

/// Collects references reported during the mark phase
#[derive(Debug, Default)]
pub struct Tracer {
    objects: Vec<ObjectRef>,
    contexts: Vec<ContextRef>,
    strings: Vec<StringRef>,
    symbols: Vec<SymbolRef>,
}

impl Tracer {
    pub fn new() -> Self {
        Tracer::default()
    }

    /// Report a value; primitives without a heap payload are ignored
    #[inline]
    pub fn mark_value(&mut self, value: Value) {
        match value {
            Value::Object(o) => self.objects.push(o),
            Value::String(s) => self.strings.push(s),
            Value::Symbol(s) => self.symbols.push(s),
            Value::Undefined
            | Value::Null
            | Value::Boolean(_)
            | Value::Integer(_)
            | Value::Double(_) => {}
        }
    }

    #[inline]
    pub fn mark_object(&mut self, object: ObjectRef) {
        self.objects.push(object);
    }

    #[inline]
    pub fn mark_context(&mut self, context: ContextRef) {
        self.contexts.push(context);
    }

    #[inline]
    pub fn mark_string(&mut self, string: StringRef) {
        self.strings.push(string);
    }

    #[inline]
    pub fn mark_symbol(&mut self, symbol: SymbolRef) {
        self.symbols.push(symbol);
    }
}

/// Implemented by every heap type: report each outgoing reference
pub trait Trace {
    fn trace(&self, tracer: &mut Tracer);
}

impl Trace for Value {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_value(*self);
    }
}

impl<T: Trace> Trace for Option<T> {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(v) = self {
            v.trace(tracer);
        }
    }
}

impl<T: Trace> Trace for [T] {
    fn trace(&self, tracer: &mut Tracer) {
        for v in self {
            v.trace(tracer);
        }
    }
}

impl Trace for ObjectRef {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_object(*self);
    }
}

impl Trace for ContextRef {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_context(*self);
    }
}

/// Statistics of one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub freed_objects: usize,
    pub freed_strings: usize,
    pub freed_symbols: usize,
    pub freed_contexts: usize,
    /// Heap values alive after the sweep
    pub live: usize,
}

impl GcStats {
    pub fn freed(&self) -> usize {
        self.freed_objects + self.freed_strings + self.freed_symbols + self.freed_contexts
    }
}

/// Run a full collection over the engine heap
pub fn collect(engine: &mut Engine) -> GcStats {
    let mut tracer = Tracer::new();
    engine.trace_roots(&mut tracer);
    mark(engine, &mut tracer);

    let heap = &mut engine.heap;
    let stats = GcStats {
        freed_objects: heap.objects.sweep(),
        freed_strings: heap.strings.sweep(),
        freed_symbols: heap.symbols.sweep(),
        freed_contexts: heap.contexts.sweep(),
        live: heap.live_count(),
    };
    debug!(
        freed = stats.freed(),
        live = stats.live,
        "garbage collection finished"
    );
    stats
}

/// Drain the grey lists until every reachable value is marked
fn mark(engine: &mut Engine, tracer: &mut Tracer) {
    let heap = &mut engine.heap;
    loop {
        if let Some(o) = tracer.objects.pop() {
            if heap.objects.mark(o.0) {
                heap.objects[o.0].trace(tracer);
            }
        } else if let Some(c) = tracer.contexts.pop() {
            if heap.contexts.mark(c.0) {
                heap.contexts[c.0].trace(tracer);
            }
        } else if let Some(s) = tracer.strings.pop() {
            heap.strings.mark(s.0);
        } else if let Some(s) = tracer.symbols.pop() {
            heap.symbols.mark(s.0);
        } else {
            break;
        }
    }
}
