//! Virtual machine module
//!
//! Execution contexts, the call protocol, name resolution and the value
//! stack that backs arguments and locals of lightweight calls.

pub mod call;
pub mod context;
pub mod scope;
pub mod stack;

pub use context::{ContextKind, ContextRef, ContextState, ExecutionContext, Storage};
pub use scope::Binding;
pub use stack::{Stack, StackOverflow};
