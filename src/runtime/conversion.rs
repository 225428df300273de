//! ECMAScript type conversions and comparisons
//!
//! Conversions that may run script code (`valueOf`/`toString`) return
//! `Result` and propagate the thrown exception unchanged.

use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::property::PropertyKey;
use crate::util::dtoa::{number_to_string, parse_array_index, string_to_number};
use crate::value::{StringRef, Value};

/// Preferred type for ToPrimitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

impl Engine {
    /// ToPrimitive
    ///
    /// Objects try `valueOf` then `toString` (reversed for the string hint);
    /// the first primitive result wins, otherwise TypeError.
    pub fn to_primitive(&mut self, value: Value, hint: Hint) -> Result<Value> {
        let Value::Object(o) = value else {
            return Ok(value);
        };
        let names = self.names;
        let order = match hint {
            Hint::String => [names.to_string, names.value_of],
            Hint::Default | Hint::Number => [names.value_of, names.to_string],
        };
        for name in order {
            let method = self.get(o, PropertyKey::Name(name))?;
            if let Some(f) = method.as_object().filter(|_| self.is_callable(method)) {
                let result = self.call(f, value, &[])?;
                if result.is_primitive() {
                    return Ok(result);
                }
            }
        }
        self.throw_type_error("Cannot convert object to primitive value")
    }

    /// ToBoolean
    pub fn to_boolean(&self, value: Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => b,
            Value::Integer(i) => i != 0,
            Value::Double(d) => !(d == 0.0 || d.is_nan()),
            Value::String(s) => !self.string(s).is_empty(),
            Value::Object(_) | Value::Symbol(_) => true,
        }
    }

    /// ToNumber
    pub fn to_number(&mut self, value: Value) -> Result<f64> {
        match value {
            Value::Undefined => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Boolean(b) => Ok(b as i32 as f64),
            Value::Integer(i) => Ok(i as f64),
            Value::Double(d) => Ok(d),
            Value::String(s) => Ok(string_to_number(self.string(s))),
            Value::Symbol(_) => self.throw_type_error("Cannot convert a Symbol value to a number"),
            Value::Object(_) => {
                let prim = self.to_primitive(value, Hint::Number)?;
                self.to_number(prim)
            }
        }
    }

    /// ToNumber, keeping integers in the integer encoding
    pub fn to_numeric_value(&mut self, value: Value) -> Result<Value> {
        if let Some(v) = value.try_integer_conversion() {
            return Ok(v);
        }
        match value {
            Value::Double(_) => Ok(value),
            _ => Ok(Value::Double(self.to_number(value)?)),
        }
    }

    /// ToInt32 with the convertible-to-int fast path
    pub fn to_int32(&mut self, value: Value) -> Result<i32> {
        if let Some(i) = value.int_payload() {
            return Ok(i);
        }
        Ok(Value::to_int32(self.to_number(value)?))
    }

    /// ToUint32 with the convertible-to-int fast path
    pub fn to_uint32(&mut self, value: Value) -> Result<u32> {
        if let Some(i) = value.int_payload() {
            return Ok(i as u32);
        }
        Ok(Value::to_uint32(self.to_number(value)?))
    }

    /// ToInteger
    pub fn to_integer(&mut self, value: Value) -> Result<f64> {
        if let Value::Integer(i) = value {
            return Ok(i as f64);
        }
        Ok(Value::to_integer(self.to_number(value)?))
    }

    /// ToString, as a heap string
    ///
    /// Objects are converted with the string hint and the primitive is
    /// converted once more; an object there is a broken contract.
    pub fn to_string(&mut self, value: Value) -> Result<StringRef> {
        let lit = self.literals;
        match value {
            Value::Undefined => Ok(lit.undefined),
            Value::Null => Ok(lit.null),
            Value::Boolean(true) => Ok(lit.true_),
            Value::Boolean(false) => Ok(lit.false_),
            Value::Integer(0) => Ok(lit.zero),
            Value::Integer(i) => Ok(self.new_string(&i.to_string())),
            Value::Double(d) => Ok(self.number_string(d)),
            Value::String(s) => Ok(s),
            Value::Symbol(_) => self.throw_type_error("Cannot convert a Symbol value to a string"),
            Value::Object(_) => {
                let prim = self.to_primitive(value, Hint::String)?;
                if prim.is_object() {
                    return self.throw_type_error("Cannot convert object to primitive value");
                }
                self.to_string(prim)
            }
        }
    }

    fn number_string(&mut self, d: f64) -> StringRef {
        let lit = self.literals;
        if d.is_nan() {
            lit.nan
        } else if d == f64::INFINITY {
            lit.infinity
        } else if d == f64::NEG_INFINITY {
            lit.neg_infinity
        } else if d == 0.0 {
            lit.zero
        } else {
            self.new_string(&number_to_string(d))
        }
    }

    /// ToString, as an owned Rust string
    pub fn to_rust_string(&mut self, value: Value) -> Result<String> {
        let s = self.to_string(value)?;
        Ok(self.string(s).to_string())
    }

    /// ToPropertyKey: symbols stay symbols, canonical indices become `Index`
    pub fn to_property_key(&mut self, value: Value) -> Result<PropertyKey> {
        match value {
            Value::Symbol(s) => Ok(PropertyKey::Symbol(s)),
            Value::Integer(i) if i >= 0 => Ok(PropertyKey::Index(i as u32)),
            Value::Double(d) if d >= 0.0 && d < u32::MAX as f64 && d.fract() == 0.0 => {
                Ok(PropertyKey::Index(d as u32))
            }
            _ => {
                let prim = self.to_primitive(value, Hint::String)?;
                if let Value::Symbol(s) = prim {
                    return Ok(PropertyKey::Symbol(s));
                }
                let s = self.to_string(prim)?;
                match parse_array_index(self.string(s)) {
                    Some(i) => Ok(PropertyKey::Index(i)),
                    None => {
                        let text = self.string(s).to_string();
                        Ok(PropertyKey::Name(self.intern(&text)))
                    }
                }
            }
        }
    }

    /// SameValue, with one deliberate deviation
    ///
    /// An `Integer` and a `Double` holding the same mathematical value are
    /// equal, and that includes `Integer(0)` against `Double(-0.0)`. Two
    /// doubles compare by bits, so `+0`/`-0` differ there and NaN equals NaN.
    pub fn same_value(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Integer(x), Value::Double(y)) | (Value::Double(y), Value::Integer(x)) => {
                x as f64 == y
            }
            (Value::Double(x), Value::Double(y)) => {
                x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
            }
            (Value::String(x), Value::String(y)) => self.string_equals(x, y),
            _ => a == b,
        }
    }

    /// Strict equality (`===`)
    pub fn strict_equals(&self, a: Value, b: Value) -> bool {
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a, b) {
                (Value::String(x), Value::String(y)) => self.string_equals(x, y),
                _ => a == b,
            },
        }
    }

    /// Loose equality (`==`)
    pub fn loose_equals(&mut self, a: Value, b: Value) -> Result<bool> {
        if a.value_type() == b.value_type() || (a.is_number() && b.is_number()) {
            return Ok(self.strict_equals(a, b));
        }
        match (a, b) {
            (x, y) if x.is_nullish() && y.is_nullish() => Ok(true),
            (x, y) if x.is_nullish() || y.is_nullish() => Ok(false),
            (Value::String(_), n) if n.is_number() => {
                let x = self.to_number(a)?;
                Ok(Some(x) == n.as_number())
            }
            (n, Value::String(_)) if n.is_number() => {
                let y = self.to_number(b)?;
                Ok(n.as_number() == Some(y))
            }
            (Value::Boolean(x), _) => self.loose_equals(Value::Integer(x as i32), b),
            (_, Value::Boolean(y)) => self.loose_equals(a, Value::Integer(y as i32)),
            (Value::Object(_), y) if !y.is_object() => {
                let prim = self.to_primitive(a, Hint::Default)?;
                self.loose_equals(prim, b)
            }
            (x, Value::Object(_)) if !x.is_object() => {
                let prim = self.to_primitive(b, Hint::Default)?;
                self.loose_equals(a, prim)
            }
            _ => Ok(false),
        }
    }

    /// `typeof`
    pub fn type_of(&self, value: Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) if self.is_callable(value) => "function",
            Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::property::PropertyAttributes;

    #[test]
    fn test_same_value_integer_double() {
        let engine = Engine::new();
        assert!(engine.same_value(Value::from_int32(0), Value::from_double(0.0)));
        // pinned: the mixed-encoding rule also equates -0
        assert!(engine.same_value(Value::from_int32(0), Value::from_double(-0.0)));
        assert!(engine.same_value(Value::from_double(-0.0), Value::from_int32(0)));
        assert!(!engine.same_value(Value::from_double(0.0), Value::from_double(-0.0)));
        assert!(engine.same_value(Value::from_double(f64::NAN), Value::from_double(f64::NAN)));
        assert!(engine.same_value(Value::from_int32(3), Value::from_double(3.0)));
        assert!(!engine.same_value(Value::from_int32(3), Value::from_double(3.5)));
    }

    #[test]
    fn test_same_value_strings() {
        let mut engine = Engine::new();
        let a = engine.new_string("abc");
        let b = engine.new_string("abc");
        assert!(engine.same_value(Value::String(a), Value::String(b)));
        let c = engine.new_string("abd");
        assert!(!engine.same_value(Value::String(a), Value::String(c)));
    }

    #[test]
    fn test_to_string_literals() {
        let mut engine = Engine::new();
        let cases = [
            (Value::Undefined, "undefined"),
            (Value::Null, "null"),
            (Value::Boolean(true), "true"),
            (Value::Integer(-12), "-12"),
            (Value::Double(0.5), "0.5"),
            (Value::Double(-0.0), "0"),
            (Value::Double(f64::NAN), "NaN"),
            (Value::Double(f64::NEG_INFINITY), "-Infinity"),
            (Value::Double(1e21), "1e+21"),
        ];
        for (v, expected) in cases {
            assert_eq!(engine.to_rust_string(v).unwrap(), expected);
        }
    }

    #[test]
    fn test_to_number() {
        let mut engine = Engine::new();
        assert!(engine.to_number(Value::Undefined).unwrap().is_nan());
        assert_eq!(engine.to_number(Value::Null).unwrap(), 0.0);
        assert_eq!(engine.to_number(Value::Boolean(true)).unwrap(), 1.0);
        let s = engine.new_string(" 0x10 ");
        assert_eq!(engine.to_number(Value::String(s)).unwrap(), 16.0);
        let sym = engine.new_symbol(None);
        assert!(engine.to_number(Value::Symbol(sym)).is_err());
    }

    #[test]
    fn test_to_int32_values() {
        let mut engine = Engine::new();
        assert_eq!(engine.to_int32(Value::Boolean(true)).unwrap(), 1);
        assert_eq!(engine.to_int32(Value::Undefined).unwrap(), 0);
        assert_eq!(engine.to_int32(Value::Double(4294967295.0)).unwrap(), -1);
        assert_eq!(engine.to_uint32(Value::Integer(-1)).unwrap(), u32::MAX);
        let s = engine.new_string("3.9");
        assert_eq!(engine.to_int32(Value::String(s)).unwrap(), 3);
    }

    #[test]
    fn test_to_primitive_calls_value_of() {
        let mut engine = Engine::new();
        let o = engine.new_plain_object();
        let f = engine.new_builtin_function("valueOf", 0, |_, _, _| Ok(Value::Integer(7)));
        let value_of = engine.property_key("valueOf");
        engine.define_data_property(o, value_of, Value::Object(f), PropertyAttributes::HIDDEN);
        assert_eq!(engine.to_number(Value::Object(o)).unwrap(), 7.0);
        // string hint prefers toString from Object.prototype
        assert_eq!(engine.to_rust_string(Value::Object(o)).unwrap(), "[object Object]");
    }

    #[test]
    fn test_to_primitive_failure() {
        let mut engine = Engine::new();
        let o = engine.new_object(None);
        let err = engine.to_primitive(Value::Object(o), Hint::Default).unwrap_err();
        assert!(engine.is_type_error(err.thrown_value().unwrap()));
    }

    #[test]
    fn test_to_primitive_propagates_throw() {
        let mut engine = Engine::new();
        let o = engine.new_plain_object();
        let f = engine.new_builtin_function("valueOf", 0, |engine, _, _| {
            engine.throw(Value::Integer(13))
        });
        let value_of = engine.property_key("valueOf");
        engine.define_data_property(o, value_of, Value::Object(f), PropertyAttributes::HIDDEN);
        let err = engine.to_number(Value::Object(o)).unwrap_err();
        assert_eq!(err.thrown_value(), Some(Value::Integer(13)));
        assert_eq!(engine.take_exception(), Some(Value::Integer(13)));
    }

    #[test]
    fn test_to_property_key() {
        let mut engine = Engine::new();
        assert_eq!(engine.to_property_key(Value::Integer(3)).unwrap(), PropertyKey::Index(3));
        let s = engine.new_string("7");
        assert_eq!(engine.to_property_key(Value::String(s)).unwrap(), PropertyKey::Index(7));
        let s = engine.new_string("07");
        let key = engine.to_property_key(Value::String(s)).unwrap();
        assert!(matches!(key, PropertyKey::Name(_)));
        let k = engine.to_property_key(Value::Integer(-1)).unwrap();
        assert_eq!(engine.key_display(k), "-1");
    }

    #[test]
    fn test_equality() {
        let mut engine = Engine::new();
        assert!(engine.strict_equals(Value::Integer(1), Value::Double(1.0)));
        assert!(!engine.strict_equals(Value::Double(f64::NAN), Value::Double(f64::NAN)));
        assert!(engine.loose_equals(Value::Null, Value::Undefined).unwrap());
        let s = engine.new_string("1");
        assert!(engine.loose_equals(Value::String(s), Value::Integer(1)).unwrap());
        assert!(engine.loose_equals(Value::Boolean(true), Value::Integer(1)).unwrap());
        assert!(!engine.loose_equals(Value::Null, Value::Integer(0)).unwrap());
    }

    #[test]
    fn test_type_of() {
        let mut engine = Engine::new();
        assert_eq!(engine.type_of(Value::Null), "object");
        let f = engine.new_builtin_function("f", 0, |_, _, _| Ok(Value::Undefined));
        assert_eq!(engine.type_of(Value::Object(f)), "function");
        let sym = engine.new_symbol(None);
        assert_eq!(engine.type_of(Value::Symbol(sym)), "symbol");
    }
}
