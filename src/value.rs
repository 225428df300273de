//! JavaScript value representation
//!
//! `Value` is an explicit sum type matched exhaustively at every consumption
//! site. Heap variants hold arena handles owned by the engine's managed heap;
//! a handle stays valid while its referent is reachable from a root.
//!
//! # NaN-boxed encoding (`RawValue`)
//! Native code and the runtime helpers it calls exchange values as a single
//! 64-bit word:
//! - a double is stored as its IEEE-754 bit pattern (NaNs are canonicalized
//!   to `0x7FF8_0000_0000_0000`)
//! - every other variant lives in the negative quiet-NaN space: bits 51..63
//!   are set, bits 48..50 carry the tag and bits 0..31 the payload

use std::fmt;

/// Handle to a heap object
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub(crate) u32);

/// Handle to a heap string
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringRef(pub(crate) u32);

/// Handle to a symbol
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolRef(pub(crate) u32);

macro_rules! handle_debug {
    ($($ty:ident => $prefix:literal),*) => {
        $(
            impl $ty {
                /// Arena index of the referent
                #[inline]
                pub const fn index(self) -> u32 {
                    self.0
                }
            }

            impl fmt::Debug for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!($prefix, "#{}"), self.0)
                }
            }
        )*
    };
}

handle_debug!(ObjectRef => "Object", StringRef => "String", SymbolRef => "Symbol");

/// Value discriminant, used for type dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Undefined,
    Null,
    Boolean,
    Integer,
    Double,
    String,
    Object,
    Symbol,
}

/// A JavaScript value
///
/// `PartialEq` is representational: `Integer(1)` and `Double(1.0)` differ
/// and a NaN double is unequal to itself. Use `Engine::same_value`,
/// `strict_equals` or `loose_equals` for language-level comparison.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Integer(i32),
    Double(f64),
    String(StringRef),
    Object(ObjectRef),
    Symbol(SymbolRef),
}

const TWO_POW_32: f64 = 4_294_967_296.0;
const TWO_POW_31: f64 = 2_147_483_648.0;

impl Value {
    /// Create an undefined value
    #[inline]
    pub const fn undefined() -> Self {
        Value::Undefined
    }

    /// Create a null value
    #[inline]
    pub const fn null() -> Self {
        Value::Null
    }

    #[inline]
    pub const fn from_bool(b: bool) -> Self {
        Value::Boolean(b)
    }

    #[inline]
    pub const fn from_int32(i: i32) -> Self {
        Value::Integer(i)
    }

    /// Create a double value, keeping the double encoding even for integral values
    #[inline]
    pub const fn from_double(d: f64) -> Self {
        Value::Double(d)
    }

    /// Integer when the value fits in `i32`, double otherwise
    #[inline]
    pub fn from_u32(u: u32) -> Self {
        match i32::try_from(u) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Double(u as f64),
        }
    }

    /// Integral doubles in `i32` range become `Integer`; `-0` stays a double
    pub fn from_f64_normalized(d: f64) -> Self {
        let i = d as i32;
        if i as f64 == d && !(d == 0.0 && d.is_sign_negative()) {
            Value::Integer(i)
        } else {
            Value::Double(d)
        }
    }

    // Type checks

    #[inline]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Value::Undefined => ValueType::Undefined,
            Value::Null => ValueType::Null,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Object(_) => ValueType::Object,
            Value::Symbol(_) => ValueType::Symbol,
        }
    }

    #[inline]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check for `undefined` or `null`
    #[inline]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[inline]
    pub const fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    #[inline]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    #[inline]
    pub const fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    #[inline]
    pub const fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Double(_))
    }

    #[inline]
    pub const fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    pub const fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    pub const fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    #[inline]
    pub const fn is_primitive(&self) -> bool {
        !self.is_object()
    }

    /// Fast-path predicate: the payload already is the ToInt32 result
    ///
    /// True for integers, booleans and null. Undefined is excluded because
    /// ToNumber(undefined) is NaN.
    #[inline]
    pub const fn is_convertible_to_int(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Boolean(_) | Value::Null)
    }

    /// The int payload of a convertible value
    #[inline]
    pub const fn int_payload(&self) -> Option<i32> {
        match *self {
            Value::Integer(i) => Some(i),
            Value::Boolean(b) => Some(b as i32),
            Value::Null => Some(0),
            _ => None,
        }
    }

    // Accessors (no coercion)

    /// Numeric value of a number, `None` for every other variant
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Value::Integer(i) => Some(i as f64),
            Value::Double(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_object(&self) -> Option<ObjectRef> {
        match *self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_string(&self) -> Option<StringRef> {
        match *self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_symbol(&self) -> Option<SymbolRef> {
        match *self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Retag int-convertible values as `Integer` and integral doubles in range
    ///
    /// Returns `None` when the value has no integer form (used by unary plus
    /// before falling back to ToNumber).
    pub fn try_integer_conversion(&self) -> Option<Value> {
        match *self {
            Value::Integer(_) => Some(*self),
            Value::Boolean(b) => Some(Value::Integer(b as i32)),
            Value::Null => Some(Value::Integer(0)),
            _ => None,
        }
    }

    // Static conversions on doubles

    /// ToInt32 on a double
    ///
    /// In-range values truncate directly; everything else is reduced modulo
    /// 2^32 with sign correction. NaN and the infinities map to 0.
    pub fn to_int32(d: f64) -> i32 {
        if d >= -TWO_POW_31 && d < TWO_POW_31 {
            // NaN fails both comparisons
            return d as i32;
        }
        Self::to_uint32_slow(d) as i32
    }

    /// ToUint32 on a double
    pub fn to_uint32(d: f64) -> u32 {
        if d >= 0.0 && d < TWO_POW_32 {
            return d as u32;
        }
        Self::to_uint32_slow(d)
    }

    fn to_uint32_slow(d: f64) -> u32 {
        if !d.is_finite() {
            return 0;
        }
        // trunc(d) is integral, so the euclidean remainder is exact
        d.trunc().rem_euclid(TWO_POW_32) as u32
    }

    /// ToUint16 on a double (modulo 2^16)
    pub fn to_uint16(d: f64) -> u16 {
        if d >= 0.0 && d < 65536.0 {
            return d as u16;
        }
        if !d.is_finite() {
            return 0;
        }
        d.trunc().rem_euclid(65536.0) as u16
    }

    /// ToInteger on a double
    ///
    /// NaN becomes +0, the infinities pass through, finite values truncate
    /// toward zero keeping the sign bit (so `-0.5` gives `-0`).
    pub fn to_integer(d: f64) -> f64 {
        if d.is_nan() {
            return 0.0;
        }
        if d.is_infinite() {
            return d;
        }
        (d.abs().floor()).copysign(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<StringRef> for Value {
    fn from(s: StringRef) -> Self {
        Value::String(s)
    }
}

impl From<SymbolRef> for Value {
    fn from(s: SymbolRef) -> Self {
        Value::Symbol(s)
    }
}

/// NaN-boxed value word exchanged with native code
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RawValue(pub u64);

impl RawValue {
    const BOX_BASE: u64 = 0xFFF8_0000_0000_0000;
    const TAG_SHIFT: u32 = 48;
    const TAG_MASK: u64 = 0x7;
    const PAYLOAD_MASK: u64 = 0xFFFF_FFFF;

    pub const TAG_UNDEFINED: u64 = 1;
    pub const TAG_NULL: u64 = 2;
    pub const TAG_BOOLEAN: u64 = 3;
    pub const TAG_INTEGER: u64 = 4;
    pub const TAG_STRING: u64 = 5;
    pub const TAG_OBJECT: u64 = 6;
    pub const TAG_SYMBOL: u64 = 7;

    /// Canonical quiet NaN
    pub const NAN: RawValue = RawValue(0x7FF8_0000_0000_0000);
    pub const UNDEFINED: RawValue = RawValue::boxed(Self::TAG_UNDEFINED, 0);
    pub const NULL: RawValue = RawValue::boxed(Self::TAG_NULL, 0);
    pub const FALSE: RawValue = RawValue::boxed(Self::TAG_BOOLEAN, 0);
    pub const TRUE: RawValue = RawValue::boxed(Self::TAG_BOOLEAN, 1);

    /// Upper 32 bits shared by every boxed value of `tag`
    #[inline]
    pub const fn tag_bits(tag: u64) -> u64 {
        Self::BOX_BASE | (tag << Self::TAG_SHIFT)
    }

    #[inline]
    pub const fn boxed(tag: u64, payload: u32) -> Self {
        RawValue(Self::tag_bits(tag) | payload as u64)
    }

    #[inline]
    pub const fn is_double(self) -> bool {
        // Tag 0 in the boxed space is never produced because NaNs are canonical
        (self.0 & Self::BOX_BASE) != Self::BOX_BASE || self.tag() == 0
    }

    #[inline]
    pub const fn tag(self) -> u64 {
        (self.0 >> Self::TAG_SHIFT) & Self::TAG_MASK
    }

    #[inline]
    pub const fn payload(self) -> u32 {
        (self.0 & Self::PAYLOAD_MASK) as u32
    }

    /// Encode a value
    pub fn encode(value: Value) -> Self {
        match value {
            Value::Undefined => Self::UNDEFINED,
            Value::Null => Self::NULL,
            Value::Boolean(b) => Self::boxed(Self::TAG_BOOLEAN, b as u32),
            Value::Integer(i) => Self::boxed(Self::TAG_INTEGER, i as u32),
            Value::Double(d) if d.is_nan() => Self::NAN,
            Value::Double(d) => RawValue(d.to_bits()),
            Value::String(s) => Self::boxed(Self::TAG_STRING, s.0),
            Value::Object(o) => Self::boxed(Self::TAG_OBJECT, o.0),
            Value::Symbol(s) => Self::boxed(Self::TAG_SYMBOL, s.0),
        }
    }

    /// Decode back into a value
    pub fn decode(self) -> Value {
        if self.is_double() {
            return Value::Double(f64::from_bits(self.0));
        }
        let payload = self.payload();
        match self.tag() {
            Self::TAG_UNDEFINED => Value::Undefined,
            Self::TAG_NULL => Value::Null,
            Self::TAG_BOOLEAN => Value::Boolean(payload != 0),
            Self::TAG_INTEGER => Value::Integer(payload as i32),
            Self::TAG_STRING => Value::String(StringRef(payload)),
            Self::TAG_OBJECT => Value::Object(ObjectRef(payload)),
            Self::TAG_SYMBOL => Value::Symbol(SymbolRef(payload)),
            _ => unreachable!("invalid raw value tag"),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        RawValue::encode(value)
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawValue(0x{:016x} = {:?})", self.0, self.decode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_int32_in_range() {
        for d in [0.0, 1.0, -1.0, 2147483647.0, -2147483648.0, 123456.0, -98765.0] {
            assert_eq!(Value::to_int32(d), d as i32);
        }
        assert_eq!(Value::to_int32(3.9), 3);
        assert_eq!(Value::to_int32(-3.9), -3);
    }

    #[test]
    fn test_to_int32_non_finite() {
        assert_eq!(Value::to_int32(f64::NAN), 0);
        assert_eq!(Value::to_int32(f64::INFINITY), 0);
        assert_eq!(Value::to_int32(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn test_to_int32_wraps() {
        assert_eq!(Value::to_int32(2147483648.0), -2147483648);
        assert_eq!(Value::to_int32(4294967295.0), -1);
        assert_eq!(Value::to_int32(4294967296.0), 0);
        assert_eq!(Value::to_int32(-2147483649.0), 2147483647);
        assert_eq!(Value::to_int32(1e20), 1661992960);
    }

    #[test]
    fn test_to_uint32_modulo_law() {
        for d in [0.0, 7.0, -1.0, 123456789.0, -4000000000.0, 3e9] {
            for k in -3i32..=3 {
                let shifted = d + (k as f64) * TWO_POW_32;
                assert_eq!(Value::to_uint32(d), Value::to_uint32(shifted), "d={d} k={k}");
            }
        }
        assert_eq!(Value::to_uint32(-1.0), 4294967295);
        assert_eq!(Value::to_uint32(f64::NAN), 0);
    }

    #[test]
    fn test_to_uint32_truncates_toward_zero() {
        assert_eq!(Value::to_uint32(1.5), 1);
        assert_eq!(Value::to_uint32(-1.5), 4294967295);
        // the shift changes sign, so truncation lands on a different integer
        assert_eq!(Value::to_uint32(1.5 - 3.0 * TWO_POW_32), 2);
        assert_eq!(Value::to_uint32(1.5 + 3.0 * TWO_POW_32), 1);
        assert_eq!(Value::to_int32(-2147483648.75), -2147483648);
    }

    #[test]
    fn test_to_uint16() {
        assert_eq!(Value::to_uint16(65536.0), 0);
        assert_eq!(Value::to_uint16(65537.0), 1);
        assert_eq!(Value::to_uint16(-1.0), 65535);
        assert_eq!(Value::to_uint16(f64::INFINITY), 0);
    }

    #[test]
    fn test_to_integer() {
        assert!(Value::to_integer(f64::NAN).is_sign_positive());
        assert_eq!(Value::to_integer(f64::NAN), 0.0);
        assert_eq!(Value::to_integer(f64::INFINITY), f64::INFINITY);
        assert_eq!(Value::to_integer(f64::NEG_INFINITY), f64::NEG_INFINITY);
        assert_eq!(Value::to_integer(-3.7), -3.0);
        let neg_zero = Value::to_integer(-0.5);
        assert_eq!(neg_zero, 0.0);
        assert!(neg_zero.is_sign_negative());
    }

    #[test]
    fn test_normalization() {
        assert_eq!(Value::from_f64_normalized(5.0), Value::Integer(5));
        assert_eq!(Value::from_f64_normalized(5.5), Value::Double(5.5));
        assert!(matches!(Value::from_f64_normalized(-0.0), Value::Double(d) if d.is_sign_negative()));
        assert_eq!(Value::from_f64_normalized(3e9), Value::Double(3e9));
        assert_eq!(Value::from_u32(u32::MAX), Value::Double(4294967295.0));
        assert_eq!(Value::from_u32(7), Value::Integer(7));
    }

    #[test]
    fn test_convertible_to_int() {
        assert!(Value::Integer(3).is_convertible_to_int());
        assert!(Value::Boolean(true).is_convertible_to_int());
        assert!(Value::Null.is_convertible_to_int());
        assert!(!Value::Undefined.is_convertible_to_int());
        assert!(!Value::Double(1.0).is_convertible_to_int());
        assert_eq!(Value::Boolean(true).try_integer_conversion(), Some(Value::Integer(1)));
        assert_eq!(Value::Double(2.0).try_integer_conversion(), None);
    }

    #[test]
    fn test_raw_value_encoding() {
        let values = [
            Value::Undefined,
            Value::Null,
            Value::Boolean(true),
            Value::Integer(-42),
            Value::Integer(i32::MIN),
            Value::Double(1.25),
            Value::Double(-0.0),
            Value::Double(f64::INFINITY),
            Value::Object(ObjectRef(17)),
            Value::String(StringRef(3)),
            Value::Symbol(SymbolRef(9)),
        ];
        for v in values {
            assert_eq!(RawValue::encode(v).decode(), v);
        }
        let nan = RawValue::encode(Value::Double(-f64::NAN));
        assert_eq!(nan, RawValue::NAN);
        assert!(matches!(nan.decode(), Value::Double(d) if d.is_nan()));
    }

    #[test]
    fn test_raw_integer_payload_is_low_word() {
        let raw = RawValue::encode(Value::Integer(-5));
        assert_eq!(raw.payload() as i32, -5);
        assert_eq!(raw.0 >> 32, RawValue::tag_bits(RawValue::TAG_INTEGER) >> 32);
        assert_eq!(RawValue::TRUE.payload(), 1);
    }
}
