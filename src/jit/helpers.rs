//! Runtime entry points called from generated code
//!
//! Every helper has the same C signature:
//! `(engine, result, operand) -> status`, where the operand and result are
//! boxed `RawValue` words and a non-zero status means an exception is
//! pending on the engine.

use crate::engine::Engine;
use crate::error::Result;
use crate::value::{RawValue, Value};

pub type HelperFn = unsafe extern "C" fn(*mut Engine, *mut RawValue, *const RawValue) -> u32;

/// Status returned when the operation completed
pub const STATUS_OK: u32 = 0;
/// Status returned when the operation threw
pub const STATUS_EXCEPTION: u32 = 1;

/// The generic unary operations a fast path can fall back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeHelper {
    UPlus,
    UMinus,
    UNot,
    Complement,
    Increment,
    Decrement,
}

impl RuntimeHelper {
    pub const ALL: [RuntimeHelper; 6] = [
        RuntimeHelper::UPlus,
        RuntimeHelper::UMinus,
        RuntimeHelper::UNot,
        RuntimeHelper::Complement,
        RuntimeHelper::Increment,
        RuntimeHelper::Decrement,
    ];

    /// Symbolic name, as shown in disassembly and logs
    pub const fn name(self) -> &'static str {
        match self {
            RuntimeHelper::UPlus => "Runtime::uPlus",
            RuntimeHelper::UMinus => "Runtime::uMinus",
            RuntimeHelper::UNot => "Runtime::uNot",
            RuntimeHelper::Complement => "Runtime::complement",
            RuntimeHelper::Increment => "Runtime::increment",
            RuntimeHelper::Decrement => "Runtime::decrement",
        }
    }

    pub fn entry(self) -> HelperFn {
        match self {
            RuntimeHelper::UPlus => helper_u_plus,
            RuntimeHelper::UMinus => helper_u_minus,
            RuntimeHelper::UNot => helper_u_not,
            RuntimeHelper::Complement => helper_complement,
            RuntimeHelper::Increment => helper_increment,
            RuntimeHelper::Decrement => helper_decrement,
        }
    }

    #[inline]
    pub fn address(self) -> u64 {
        self.entry() as usize as u64
    }

    /// The helper whose entry point is `address`
    pub fn from_address(address: u64) -> Option<RuntimeHelper> {
        Self::ALL.into_iter().find(|h| h.address() == address)
    }

    /// Run the operation directly on the engine
    pub fn apply(self, engine: &mut Engine, value: Value) -> Result<Value> {
        match self {
            RuntimeHelper::UPlus => engine.u_plus(value),
            RuntimeHelper::UMinus => engine.u_minus(value),
            RuntimeHelper::UNot => engine.u_not(value),
            RuntimeHelper::Complement => engine.complement(value),
            RuntimeHelper::Increment => engine.increment(value),
            RuntimeHelper::Decrement => engine.decrement(value),
        }
    }
}

/// Shared body of the trampolines
///
/// # Safety
/// `engine` must be the engine that owns the running code, and `result` and
/// `operand` must point at valid frame words.
#[inline]
unsafe fn invoke(
    helper: RuntimeHelper,
    engine: *mut Engine,
    result: *mut RawValue,
    operand: *const RawValue,
) -> u32 {
    let (engine, result, operand) = unsafe { (&mut *engine, &mut *result, *operand) };
    match helper.apply(engine, operand.decode()) {
        Ok(v) => {
            *result = RawValue::encode(v);
            STATUS_OK
        }
        Err(_) => {
            *result = RawValue::UNDEFINED;
            STATUS_EXCEPTION
        }
    }
}

macro_rules! trampolines {
    ($($name:ident => $helper:ident),* $(,)?) => {
        $(
            unsafe extern "C" fn $name(
                engine: *mut Engine,
                result: *mut RawValue,
                operand: *const RawValue,
            ) -> u32 {
                unsafe { invoke(RuntimeHelper::$helper, engine, result, operand) }
            }
        )*
    };
}

trampolines! {
    helper_u_plus => UPlus,
    helper_u_minus => UMinus,
    helper_u_not => UNot,
    helper_complement => Complement,
    helper_increment => Increment,
    helper_decrement => Decrement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_are_distinct() {
        for a in RuntimeHelper::ALL {
            assert_eq!(RuntimeHelper::from_address(a.address()), Some(a));
        }
        assert_eq!(RuntimeHelper::from_address(0), None);
    }

    #[test]
    fn test_trampoline_round_trip() {
        let mut engine = Engine::new();
        let operand = RawValue::encode(Value::Integer(0));
        let mut result = RawValue::UNDEFINED;
        let entry = RuntimeHelper::UMinus.entry();
        let status = unsafe { entry(&mut engine, &mut result, &operand) };
        assert_eq!(status, STATUS_OK);
        assert!(matches!(result.decode(), Value::Double(d) if d == 0.0 && d.is_sign_negative()));
    }

    #[test]
    fn test_trampoline_reports_exception() {
        let mut engine = Engine::new();
        let symbol = engine.new_symbol(None);
        let operand = RawValue::encode(Value::Symbol(symbol));
        let mut result = RawValue::NULL;
        let entry = RuntimeHelper::UMinus.entry();
        let status = unsafe { entry(&mut engine, &mut result, &operand) };
        assert_eq!(status, STATUS_EXCEPTION);
        assert_eq!(result, RawValue::UNDEFINED);
        assert!(engine.pending_exception().is_some());
    }
}
