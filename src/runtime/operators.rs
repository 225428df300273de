//! Runtime operator helpers
//!
//! The generic slow paths behind the unary and binary operators. Native code
//! calls the unary ones through `jit::helpers` whenever it cannot inline a
//! fast path, so these are the reference semantics for every operand type.

use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::conversion::Hint;
use crate::value::Value;

/// Binary operators usable with `inplace_bin_op`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
}

impl Engine {
    /// Unary `+`
    pub fn u_plus(&mut self, value: Value) -> Result<Value> {
        if let Some(v) = value.try_integer_conversion() {
            return Ok(v);
        }
        Ok(Value::Double(self.to_number(value)?))
    }

    /// Unary `-`
    ///
    /// Integers negate in place except 0 (which must become -0) and
    /// `i32::MIN` (which overflows); both go through the double path.
    pub fn u_minus(&mut self, value: Value) -> Result<Value> {
        if let Value::Integer(i) = value {
            if i != 0 && i != i32::MIN {
                return Ok(Value::Integer(-i));
            }
        }
        Ok(Value::Double(-self.to_number(value)?))
    }

    /// Logical `!`
    pub fn u_not(&mut self, value: Value) -> Result<Value> {
        Ok(Value::Boolean(!self.to_boolean(value)))
    }

    /// Bitwise `~`
    pub fn complement(&mut self, value: Value) -> Result<Value> {
        let n = self.to_int32(value)?;
        Ok(Value::Integer(!n))
    }

    /// `++` on an already loaded value
    pub fn increment(&mut self, value: Value) -> Result<Value> {
        if let Value::Integer(i) = value {
            if let Some(r) = i.checked_add(1) {
                return Ok(Value::Integer(r));
            }
        }
        Ok(Value::Double(self.to_number(value)? + 1.0))
    }

    /// `--` on an already loaded value
    pub fn decrement(&mut self, value: Value) -> Result<Value> {
        if let Value::Integer(i) = value {
            if let Some(r) = i.checked_sub(1) {
                return Ok(Value::Integer(r));
            }
        }
        Ok(Value::Double(self.to_number(value)? - 1.0))
    }

    /// Binary `+`: string concatenation when either primitive is a string
    pub fn add(&mut self, a: Value, b: Value) -> Result<Value> {
        if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
            if let Some(r) = x.checked_add(y) {
                return Ok(Value::Integer(r));
            }
        }
        let pa = self.to_primitive(a, Hint::Default)?;
        let pb = self.to_primitive(b, Hint::Default)?;
        if pa.is_string() || pb.is_string() {
            let sa = self.to_string(pa)?;
            let sb = self.to_string(pb)?;
            return Ok(Value::String(self.concat(sa, sb)));
        }
        let x = self.to_number(pa)?;
        let y = self.to_number(pb)?;
        Ok(Value::from_f64_normalized(x + y))
    }

    pub fn sub(&mut self, a: Value, b: Value) -> Result<Value> {
        if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
            if let Some(r) = x.checked_sub(y) {
                return Ok(Value::Integer(r));
            }
        }
        let (x, y) = self.numbers(a, b)?;
        Ok(Value::from_f64_normalized(x - y))
    }

    pub fn mul(&mut self, a: Value, b: Value) -> Result<Value> {
        let (x, y) = self.numbers(a, b)?;
        Ok(Value::from_f64_normalized(x * y))
    }

    pub fn div(&mut self, a: Value, b: Value) -> Result<Value> {
        let (x, y) = self.numbers(a, b)?;
        Ok(Value::from_f64_normalized(x / y))
    }

    /// `%`: result takes the sign of the dividend
    pub fn rem(&mut self, a: Value, b: Value) -> Result<Value> {
        let (x, y) = self.numbers(a, b)?;
        Ok(Value::from_f64_normalized(x % y))
    }

    pub fn shl(&mut self, a: Value, b: Value) -> Result<Value> {
        let x = self.to_int32(a)?;
        let y = self.to_uint32(b)?;
        Ok(Value::Integer(x.wrapping_shl(y & 31)))
    }

    pub fn shr(&mut self, a: Value, b: Value) -> Result<Value> {
        let x = self.to_int32(a)?;
        let y = self.to_uint32(b)?;
        Ok(Value::Integer(x >> (y & 31)))
    }

    pub fn ushr(&mut self, a: Value, b: Value) -> Result<Value> {
        let x = self.to_uint32(a)?;
        let y = self.to_uint32(b)?;
        Ok(Value::from_u32(x >> (y & 31)))
    }

    pub fn bit_and(&mut self, a: Value, b: Value) -> Result<Value> {
        let x = self.to_int32(a)?;
        let y = self.to_int32(b)?;
        Ok(Value::Integer(x & y))
    }

    pub fn bit_or(&mut self, a: Value, b: Value) -> Result<Value> {
        let x = self.to_int32(a)?;
        let y = self.to_int32(b)?;
        Ok(Value::Integer(x | y))
    }

    pub fn bit_xor(&mut self, a: Value, b: Value) -> Result<Value> {
        let x = self.to_int32(a)?;
        let y = self.to_int32(b)?;
        Ok(Value::Integer(x ^ y))
    }

    /// Apply a binary operator
    pub fn binary_op(&mut self, op: BinaryOp, a: Value, b: Value) -> Result<Value> {
        match op {
            BinaryOp::Add => self.add(a, b),
            BinaryOp::Sub => self.sub(a, b),
            BinaryOp::Mul => self.mul(a, b),
            BinaryOp::Div => self.div(a, b),
            BinaryOp::Rem => self.rem(a, b),
            BinaryOp::Shl => self.shl(a, b),
            BinaryOp::Shr => self.shr(a, b),
            BinaryOp::UShr => self.ushr(a, b),
            BinaryOp::BitAnd => self.bit_and(a, b),
            BinaryOp::BitOr => self.bit_or(a, b),
            BinaryOp::BitXor => self.bit_xor(a, b),
        }
    }

    fn numbers(&mut self, a: Value, b: Value) -> Result<(f64, f64)> {
        let x = self.to_number(a)?;
        let y = self.to_number(b)?;
        Ok((x, y))
    }
}
