//! Error types
//!
//! Script-level exceptions travel as `Error::Exception` carrying the thrown
//! value. The engine also records the value so the embedder can retrieve it
//! with `Engine::take_exception` after an uncaught throw.

use thiserror::Error;

use crate::value::Value;

/// Errors returned by engine operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A value was thrown by script code or by the runtime
    #[error("uncaught exception: {0:?}")]
    Exception(Value),

    /// Native code generation failed
    #[error("jit error: {0}")]
    Jit(#[from] JitError),
}

impl Error {
    /// The thrown value, if this is a script exception
    pub fn thrown_value(&self) -> Option<Value> {
        match self {
            Error::Exception(v) => Some(*v),
            Error::Jit(_) => None,
        }
    }
}

/// Failures of the native code path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JitError {
    #[error("native code generation is disabled")]
    Disabled,

    #[error("native code generation is not supported on this target")]
    Unsupported,

    #[error("no code was generated for `{0}`")]
    EmptyCode(String),

    #[error("failed to map executable memory: {0}")]
    Map(String),

    #[error("failed to change memory protection: {0}")]
    Protect(String),

    #[error("unknown jit handle {0}")]
    UnknownHandle(u32),

    #[error("malformed unary body: {0}")]
    InvalidIr(String),

    #[error("code registry: {0}")]
    Registry(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
