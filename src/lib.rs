//! V4VM - the core of a small ECMAScript virtual machine
//!
//! The crate implements the parts of a JavaScript engine that sit below the
//! bytecode interpreter: the tagged value representation and its coercions,
//! hidden-class ("internal class") shape transitions, the object, function,
//! arguments and symbol model, the execution-context stack with its call
//! protocol, and an optional native-code path for unary operators together
//! with unwind-table and perf-map registration.
//!
//! # Features
//! - Sum-type `Value` with a NaN-boxed `RawValue` form for native code
//! - Memoized internal-class transitions stored in an arena
//! - Engine-scoped identifier, class and symbol tables (no global state)
//! - Explicit `Result` propagation of script exceptions
//! - Mark-sweep garbage collection over arena handles
//!
//! # Example
//! ```ignore
//! use v4vm::{CompiledFunction, Engine, Value};
//!
//! let mut engine = Engine::new();
//! let add = CompiledFunction::builder(&mut engine, "add")
//!     .formals(&["a", "b"])
//!     .host(|engine, ctx| {
//!         let a = engine.argument(ctx, 0);
//!         let b = engine.argument(ctx, 1);
//!         engine.add(a, b)
//!     });
//! let global = engine.global_context();
//! let f = engine.new_script_function(add, global);
//! let r = engine.call(f, Value::Undefined, &[Value::Integer(1), Value::Integer(2)]);
//! assert_eq!(r.unwrap(), Value::Integer(3));
//! ```

// Core modules
pub mod config;
pub mod engine;
pub mod error;
pub mod value;

// Managed heap
pub mod gc;

// Execution contexts and the call protocol
pub mod vm;

// Built-in objects
pub mod builtins;

// Object model and runtime helpers
pub mod runtime;

// Native code generation
#[cfg(feature = "jit")]
pub mod jit;

// Utilities
pub mod util;

// Re-export main types
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use runtime::function::CompiledFunction;
pub use value::Value;
