//! Garbage collector module
//!
//! Heap values live in per-kind arenas and are referenced by index handles.
//! Collection is mark-sweep: the engine reports its roots (active and global
//! contexts, intrinsics, the symbol registry, persistent handles, the value
//! stack) and every heap type implements `Trace` to report its children.
//!
//! Collection only runs when the embedder calls `Engine::collect_garbage`,
//! so values held in Rust locals between such calls stay valid.

mod allocator;
mod collector;

pub use allocator::{Arena, Heap};
pub use collector::{GcStats, Trace, Tracer};

use crate::engine::Engine;
use crate::value::Value;

/// Handle to a value kept alive across collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Persistent(u32);

impl Engine {
    /// Run a full garbage collection
    pub fn collect_garbage(&mut self) -> GcStats {
        collector::collect(self)
    }

    /// Root a value until `release` is called
    pub fn persist(&mut self, value: Value) -> Persistent {
        Persistent(self.persistent.alloc(value))
    }

    /// Read a persistent value
    pub fn persistent_value(&self, handle: Persistent) -> Option<Value> {
        self.persistent.get(handle.0).copied()
    }

    /// Drop a persistent root
    pub fn release(&mut self, handle: Persistent) -> Option<Value> {
        self.persistent.free(handle.0)
    }
}
