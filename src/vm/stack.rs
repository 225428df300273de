//! Engine value stack
//!
//! Arguments and locals of calls that do not need a full activation live
//! here instead of in a heap allocation. A call pushes its frame on entry
//! and truncates back to its base on exit, so frames nest strictly.

use crate::value::Value;

/// The stack has no room for the requested slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackOverflow;

/// Value stack with a fixed capacity
#[derive(Debug)]
pub struct Stack {
    /// Stack storage
    values: Vec<Value>,
    /// Maximum number of slots
    capacity: usize,
}

impl Stack {
    /// Create a new stack with the given capacity
    pub fn new(capacity: usize) -> Self {
        Stack {
            values: Vec::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Push a slice of values
    pub fn push_slice(&mut self, values: &[Value]) -> Result<(), StackOverflow> {
        if self.values.len() + values.len() > self.capacity {
            return Err(StackOverflow);
        }
        self.values.extend_from_slice(values);
        Ok(())
    }

    /// Get the current stack depth
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop everything above `len`
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Push a frame of `slots` undefined values, returning its base
    pub fn push_frame(&mut self, slots: usize) -> Result<usize, StackOverflow> {
        let base = self.values.len();
        if base + slots > self.capacity {
            return Err(StackOverflow);
        }
        self.values.resize(base + slots, Value::Undefined);
        Ok(base)
    }

    /// Read an absolute slot
    #[inline]
    pub fn get(&self, index: usize) -> Value {
        self.values[index]
    }

    /// Write an absolute slot
    #[inline]
    pub fn set(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    /// A frame's values
    #[inline]
    pub fn slice(&self, base: usize, len: usize) -> &[Value] {
        &self.values[base..base + len]
    }

    /// Every live value, for root tracing
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
