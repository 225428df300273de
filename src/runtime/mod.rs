//! Runtime support
//!
//! This module contains the core runtime types for JavaScript execution:
//! - Identifier interning and property keys/attributes
//! - Internal classes (shape transitions)
//! - Object representation and the property algorithms
//! - Array, function, arguments and symbol objects
//! - Strings, coercions and operator helpers

pub mod arguments;
pub mod array;
pub mod conversion;
pub mod function;
pub mod identifier;
pub mod internal_class;
pub mod object;
pub mod operators;
pub mod property;
pub mod string;
pub mod symbol;

pub use conversion::Hint;
pub use function::{BuiltinFn, CompiledFunction, FunctionBody, FunctionKind};
pub use identifier::{Identifier, IdentifierTable};
pub use internal_class::{ClassId, InternalClass, InternalClassPool, TransitionKey};
pub use object::{Object, ObjectKind};
pub use operators::BinaryOp;
pub use property::{PropertyAttributes, PropertyDescriptor, PropertyKey, PropertySlot};
