//! Native code path for unary operators
//!
//! `Engine::compile_unary_ops` turns a body of unary statements into x86-64
//! code, maps it executable, registers its unwind info and appends it to
//! the perf map. `Engine::invalidate` undoes the registration and frees
//! the code. Entering generated code is left to the embedder.

pub mod assembler;
pub mod codegen;
pub mod helpers;
pub mod ir;
pub mod memory;
pub mod perf_map;
pub mod unop;
pub mod unwind;

#[cfg(test)]
mod sim;

use std::ops::Range;

use tracing::debug;

use crate::config::JitConfig;
use crate::engine::Engine;
use crate::error::{JitError, Result};
use crate::gc::Arena;
use crate::value::RawValue;

pub use codegen::{FrameLayout, compile_body};
pub use ir::{IrType, Temp, TempKind, UnaryOp, UnaryStmt};
pub use memory::ExecutableMemory;
pub use perf_map::PerfMap;
pub use unwind::{FunctionTable, JitCodeRegistry, NoopRegistry, UnwindInfo};

/// Signature of generated code
pub type JitEntry = unsafe extern "C" fn(*mut Engine, *mut RawValue) -> u32;

/// Handle to a compiled body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JitHandle(u32);

/// A compiled, registered body
#[derive(Debug)]
pub struct JitFunction {
    name: String,
    memory: ExecutableMemory,
    frame: FrameLayout,
}

impl JitFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code_range(&self) -> Range<usize> {
        self.memory.range()
    }

    pub fn code(&self) -> &[u8] {
        self.memory.bytes()
    }

    /// Frame words the caller must pass
    pub fn frame_words(&self) -> u32 {
        self.frame.words()
    }

    /// Entry point of the code
    ///
    /// # Safety
    /// The caller must pass the engine that compiled the code and a frame
    /// of at least `frame_words()` values, and must not call it after the
    /// body was invalidated.
    pub unsafe fn entry(&self) -> JitEntry {
        unsafe { std::mem::transmute::<*const u8, JitEntry>(self.memory.as_ptr()) }
    }
}

/// Per-engine native code state
pub struct JitState {
    enabled: bool,
    registry: Box<dyn JitCodeRegistry>,
    perf_map: PerfMap,
    functions: Arena<JitFunction>,
}

impl JitState {
    pub fn new(config: &JitConfig) -> Self {
        let perf_map = if config.enabled {
            PerfMap::open(&config.perf_map)
        } else {
            PerfMap::disabled()
        };
        JitState {
            enabled: config.enabled,
            registry: Box::new(FunctionTable::new(config.native_unwind)),
            perf_map,
            functions: Arena::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Drop for JitState {
    fn drop(&mut self) {
        // unregister while the code is still mapped
        let handles: Vec<u32> = self.functions.iter().map(|(index, _)| index).collect();
        for index in handles {
            if let Some(function) = self.functions.free(index) {
                let _ = self.registry.unregister(function.code_range());
            }
        }
    }
}

impl Engine {
    /// Compile a body of unary statements
    pub fn compile_unary_ops(&mut self, name: &str, body: &[UnaryStmt]) -> Result<JitHandle> {
        if !self.jit.enabled {
            return Err(JitError::Disabled.into());
        }
        if body.is_empty() {
            return Err(JitError::EmptyCode(name.to_string()).into());
        }
        let compiled = compile_body(body)?;
        let memory = ExecutableMemory::new(&compiled.code.bytes)?;
        let range = memory.range();
        let info = UnwindInfo::new(&range, &codegen::SAVED_REGISTERS);
        self.jit.registry.register(range.clone(), name, info)?;
        self.jit.perf_map.record(&range, name);
        debug!(
            name,
            start = range.start,
            len = range.len(),
            statements = body.len(),
            "compiled unary body"
        );
        let index = self.jit.functions.alloc(JitFunction {
            name: name.to_string(),
            memory,
            frame: compiled.frame,
        });
        Ok(JitHandle(index))
    }

    /// Unregister and free a compiled body
    pub fn invalidate(&mut self, handle: JitHandle) -> Result<()> {
        let range = self
            .jit
            .functions
            .get(handle.0)
            .map(JitFunction::code_range)
            .ok_or(JitError::UnknownHandle(handle.0))?;
        // the code stays mapped until the registry has let go of it
        self.jit.registry.unregister(range.clone())?;
        if let Some(function) = self.jit.functions.free(handle.0) {
            debug!(name = %function.name, start = range.start, "invalidated unary body");
        }
        Ok(())
    }

    pub fn jit_function(&self, handle: JitHandle) -> Option<&JitFunction> {
        self.jit.functions.get(handle.0)
    }

    /// Name of the generated function containing `address`
    pub fn jit_code_name(&self, address: usize) -> Option<&str> {
        self.jit.registry.name(address)
    }

    /// Replace the code registry; only allowed while nothing is compiled
    pub fn set_jit_registry(&mut self, registry: Box<dyn JitCodeRegistry>) -> Result<()> {
        if !self.jit.is_empty() {
            return Err(JitError::Registry("cannot swap the registry while code is registered".to_string()).into());
        }
        self.jit.registry = registry;
        Ok(())
    }

    pub fn jit_enabled(&self) -> bool {
        self.jit.enabled
    }
}
