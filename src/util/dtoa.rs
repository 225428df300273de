//! Number <-> string conversion
//!
//! `number_to_string` is Number::toString(10): shortest round-trip digits
//! from `ryu_js`. `string_to_number` is the StringToNumber grammar, with the
//! decimal part delegated to `fast_float`.

use super::trim_js;

/// Format a number the way ToString does
pub fn number_to_string(d: f64) -> String {
    if d == 0.0 {
        // both zeros print as "0"
        return "0".to_string();
    }
    let i = d as i32;
    if i as f64 == d {
        return i.to_string();
    }
    let mut buffer = ryu_js::Buffer::new();
    buffer.format(d).to_string()
}

/// Parse a string the way ToNumber does; malformed input gives NaN
pub fn string_to_number(s: &str) -> f64 {
    let s = trim_js(s);
    if s.is_empty() {
        return 0.0;
    }
    if let Some(v) = parse_radix_literal(s) {
        return v;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if !is_decimal_literal(s) {
        return f64::NAN;
    }
    fast_float::parse::<f64, _>(s).unwrap_or(f64::NAN)
}

/// `0x`, `0o` and `0b` literals (unsigned, no fraction)
fn parse_radix_literal(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'0' {
        return None;
    }
    let radix = match bytes[1] {
        b'x' | b'X' => 16,
        b'o' | b'O' => 8,
        b'b' | b'B' => 2,
        _ => return None,
    };
    let digits = &s[2..];
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => value = value * radix as f64 + d as f64,
            None => return Some(f64::NAN),
        }
    }
    Some(value)
}

/// StrDecimalLiteral without the Infinity forms
fn is_decimal_literal(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };
    let mut digits = 0;
    let mut dots = 0;
    for c in mantissa.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    if digits == 0 || dots > 1 {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.bytes().all(|b| b.is_ascii_digit())
        }
    }
}

/// Canonical array index: `"0"` or digits without a leading zero, below 2^32 - 1
pub fn parse_array_index(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 || (bytes.len() > 1 && bytes[0] == b'0') {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value: u64 = s.parse().ok()?;
    if value < u32::MAX as u64 {
        Some(value as u32)
    } else {
        None
    }
}
