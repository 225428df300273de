//! Array constructor and Array.prototype
//!
//! The prototype methods are generic: they work on any object through its
//! `length` and index properties, arrays just keep `length` up to date by
//! themselves.

use crate::builtins::object::object_proto_to_string;
use crate::builtins::{arg, define_global, define_method};
use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::property::{PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::value::{ObjectRef, Value};

/// Largest valid array index plus one
const MAX_LENGTH: f64 = 4_294_967_295.0;

pub(crate) fn install(engine: &mut Engine) {
    let proto = engine.intrinsics.array_prototype;
    engine.init_array_length(proto, 0);

    define_method(engine, proto, "toString", 0, array_proto_to_string);
    define_method(engine, proto, "join", 1, array_proto_join);
    define_method(engine, proto, "push", 1, array_proto_push);
    define_method(engine, proto, "pop", 0, array_proto_pop);
    define_method(engine, proto, "shift", 0, array_proto_shift);
    define_method(engine, proto, "unshift", 1, array_proto_unshift);
    define_method(engine, proto, "reverse", 0, array_proto_reverse);
    define_method(engine, proto, "concat", 1, array_proto_concat);
    define_method(engine, proto, "slice", 2, array_proto_slice);
    define_method(engine, proto, "indexOf", 1, array_proto_index_of);
    define_method(engine, proto, "lastIndexOf", 1, array_proto_last_index_of);
    define_method(engine, proto, "forEach", 1, array_proto_for_each);
    define_method(engine, proto, "map", 1, array_proto_map);
    define_method(engine, proto, "filter", 1, array_proto_filter);
    define_method(engine, proto, "every", 1, array_proto_every);
    define_method(engine, proto, "some", 1, array_proto_some);
    define_method(engine, proto, "reduce", 1, array_proto_reduce);

    let ctor = engine.new_builtin_constructor("Array", 1, array_constructor, proto);
    define_method(engine, ctor, "isArray", 1, array_is_array);
    define_global(engine, "Array", Value::Object(ctor));
}

/// `Array(...)` and `new Array(...)` behave the same
fn array_constructor(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    if let [length] = args {
        if length.is_number() {
            let length = engine.to_array_length(*length)?;
            let a = engine.new_array(&[]);
            let key = PropertyKey::Name(engine.names.length);
            engine.put(a, key, Value::from_u32(length), true)?;
            return Ok(Value::Object(a));
        }
    }
    Ok(Value::Object(engine.new_array(args)))
}

fn array_is_array(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(engine.is_array(arg(args, 0))))
}

// Generic element access

fn length_of(engine: &mut Engine, o: ObjectRef) -> Result<u32> {
    let key = PropertyKey::Name(engine.names.length);
    let v = engine.get(o, key)?;
    engine.to_uint32(v)
}

fn set_length(engine: &mut Engine, o: ObjectRef, length: f64) -> Result<()> {
    let key = PropertyKey::Name(engine.names.length);
    engine.put(o, key, Value::from_f64_normalized(length), true)
}

/// Key for an element position that may lie past the index range
fn element_key(engine: &mut Engine, position: f64) -> PropertyKey {
    if position < MAX_LENGTH {
        PropertyKey::Index(position as u32)
    } else {
        engine.property_key(&position.to_string())
    }
}

/// The element at `index`, `None` for a hole
fn element(engine: &mut Engine, o: ObjectRef, index: u32) -> Result<Option<Value>> {
    let key = PropertyKey::Index(index);
    if !engine.has_property(o, key) {
        return Ok(None);
    }
    engine.get(o, key).map(Some)
}

/// Move element `from` to `to`, deleting `to` when `from` is a hole
fn move_element(engine: &mut Engine, o: ObjectRef, from: u32, to: PropertyKey) -> Result<()> {
    match element(engine, o, from)? {
        Some(v) => engine.put(o, to, v, true),
        None => engine.delete(o, to, true).map(|_| ()),
    }
}

/// Relative start/end argument clamped to `0..=length`
fn relative_index(engine: &mut Engine, value: Value, length: u32) -> Result<u32> {
    let relative = engine.to_integer(value)?;
    let length = length as f64;
    let index = if relative < 0.0 {
        (length + relative).max(0.0)
    } else {
        relative.min(length)
    };
    Ok(index as u32)
}

fn callback(engine: &mut Engine, args: &[Value], method: &str) -> Result<Value> {
    let f = arg(args, 0);
    if !engine.is_callable(f) {
        let msg = format!("Array.prototype.{method}: {} is not a function", engine.type_of(f));
        return engine.throw_type_error(&msg);
    }
    Ok(f)
}

fn array_proto_to_string(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let key = engine.property_key("join");
    let join = engine.get(o, key)?;
    if engine.is_callable(join) {
        return engine.call_value(join, Value::Object(o), &[]);
    }
    object_proto_to_string(engine, Value::Object(o), &[])
}

fn array_proto_join(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        v => engine.to_rust_string(v)?,
    };
    // a cycle joins as the empty string
    if length == 0 || engine.join_stack.contains(&o) {
        return Ok(Value::String(engine.literals.empty));
    }
    engine.join_stack.push(o);
    let joined = join_elements(engine, o, length, &separator);
    engine.join_stack.pop();
    let text = joined?;
    Ok(Value::String(engine.new_string(&text)))
}

fn join_elements(engine: &mut Engine, o: ObjectRef, length: u32, separator: &str) -> Result<String> {
    let mut out = String::new();
    for k in 0..length {
        if k > 0 {
            out.push_str(separator);
        }
        let v = engine.get(o, PropertyKey::Index(k))?;
        if !v.is_nullish() {
            out.push_str(&engine.to_rust_string(v)?);
        }
    }
    Ok(out)
}

fn array_proto_push(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let mut n = length_of(engine, o)? as f64;
    for v in args {
        let key = element_key(engine, n);
        engine.put(o, key, *v, true)?;
        n += 1.0;
    }
    set_length(engine, o, n)?;
    Ok(Value::from_f64_normalized(n))
}

fn array_proto_pop(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    if length == 0 {
        set_length(engine, o, 0.0)?;
        return Ok(Value::Undefined);
    }
    let last = PropertyKey::Index(length - 1);
    let v = engine.get(o, last)?;
    engine.delete(o, last, true)?;
    set_length(engine, o, (length - 1) as f64)?;
    Ok(v)
}

fn array_proto_shift(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    if length == 0 {
        set_length(engine, o, 0.0)?;
        return Ok(Value::Undefined);
    }
    let first = engine.get(o, PropertyKey::Index(0))?;
    for k in 1..length {
        move_element(engine, o, k, PropertyKey::Index(k - 1))?;
    }
    engine.delete(o, PropertyKey::Index(length - 1), true)?;
    set_length(engine, o, (length - 1) as f64)?;
    Ok(first)
}

fn array_proto_unshift(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    let count = args.len() as f64;
    for k in (0..length).rev() {
        let to = element_key(engine, k as f64 + count);
        move_element(engine, o, k, to)?;
    }
    for (j, v) in args.iter().enumerate() {
        engine.put(o, PropertyKey::Index(j as u32), *v, true)?;
    }
    let n = length as f64 + count;
    set_length(engine, o, n)?;
    Ok(Value::from_f64_normalized(n))
}

fn array_proto_reverse(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    let middle = length / 2;
    for lower in 0..middle {
        let upper = length - lower - 1;
        let lower_value = element(engine, o, lower)?;
        let upper_value = element(engine, o, upper)?;
        for (index, value) in [(lower, upper_value), (upper, lower_value)] {
            let key = PropertyKey::Index(index);
            match value {
                Some(v) => engine.put(o, key, v, true)?,
                None => {
                    engine.delete(o, key, true)?;
                }
            }
        }
    }
    Ok(Value::Object(o))
}

fn array_proto_concat(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let result = engine.new_array(&[]);
    let mut n = 0.0;
    for item in std::iter::once(Value::Object(o)).chain(args.iter().copied()) {
        match item {
            Value::Object(source) if engine.is_array(item) => {
                let length = length_of(engine, source)?;
                for k in 0..length {
                    if let Some(v) = element(engine, source, k)? {
                        let key = element_key(engine, n);
                        engine.put(result, key, v, true)?;
                    }
                    n += 1.0;
                }
            }
            _ => {
                let key = element_key(engine, n);
                engine.put(result, key, item, true)?;
                n += 1.0;
            }
        }
    }
    set_length(engine, result, n)?;
    Ok(Value::Object(result))
}

fn array_proto_slice(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    let start = relative_index(engine, arg(args, 0), length)?;
    let end = match arg(args, 1) {
        Value::Undefined => length,
        v => relative_index(engine, v, length)?,
    };
    let result = engine.new_array(&[]);
    let mut n = 0;
    for k in start..end {
        if let Some(v) = element(engine, o, k)? {
            engine.put(result, PropertyKey::Index(n), v, true)?;
        }
        n += 1;
    }
    set_length(engine, result, n as f64)?;
    Ok(Value::Object(result))
}

fn array_proto_index_of(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    if length == 0 {
        return Ok(Value::Integer(-1));
    }
    let target = arg(args, 0);
    let from = match args.get(1) {
        None => 0,
        Some(&v) => {
            let n = engine.to_integer(v)?;
            if n >= length as f64 {
                return Ok(Value::Integer(-1));
            }
            if n < 0.0 { (length as f64 + n).max(0.0) as u32 } else { n as u32 }
        }
    };
    for k in from..length {
        if let Some(v) = element(engine, o, k)? {
            if engine.strict_equals(v, target) {
                return Ok(Value::from_u32(k));
            }
        }
    }
    Ok(Value::Integer(-1))
}

fn array_proto_last_index_of(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    if length == 0 {
        return Ok(Value::Integer(-1));
    }
    let target = arg(args, 0);
    let from = match args.get(1) {
        None => length as f64 - 1.0,
        Some(&v) => {
            let n = engine.to_integer(v)?;
            if n >= 0.0 { n.min(length as f64 - 1.0) } else { length as f64 + n }
        }
    };
    if from < 0.0 {
        return Ok(Value::Integer(-1));
    }
    for k in (0..=from as u32).rev() {
        if let Some(v) = element(engine, o, k)? {
            if engine.strict_equals(v, target) {
                return Ok(Value::from_u32(k));
            }
        }
    }
    Ok(Value::Integer(-1))
}

/// Shared loop of the callback methods: `visit` sees each present element
/// with the callback's result and returns `false` to stop early
fn each_element(
    engine: &mut Engine,
    this: Value,
    args: &[Value],
    method: &str,
    mut visit: impl FnMut(&mut Engine, u32, Value, Value) -> Result<bool>,
) -> Result<ObjectRef> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    let f = callback(engine, args, method)?;
    let this_arg = arg(args, 1);
    for k in 0..length {
        let Some(v) = element(engine, o, k)? else {
            continue;
        };
        let r = engine.call_value(f, this_arg, &[v, Value::from_u32(k), Value::Object(o)])?;
        if !visit(engine, k, v, r)? {
            break;
        }
    }
    Ok(o)
}

fn array_proto_for_each(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    each_element(engine, this, args, "forEach", |_, _, _, _| Ok(true))?;
    Ok(Value::Undefined)
}

fn array_proto_map(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let result = engine.new_array(&[]);
    let o = each_element(engine, this, args, "map", |engine, k, _, mapped| {
        let desc = PropertyDescriptor::data(mapped, PropertyAttributes::DEFAULT);
        engine.define_own_property(result, PropertyKey::Index(k), desc, true)
    })?;
    let length = length_of(engine, o)?;
    set_length(engine, result, length as f64)?;
    Ok(Value::Object(result))
}

fn array_proto_filter(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let mut kept = Vec::new();
    each_element(engine, this, args, "filter", |engine, _, v, selected| {
        if engine.to_boolean(selected) {
            kept.push(v);
        }
        Ok(true)
    })?;
    Ok(Value::Object(engine.new_array(&kept)))
}

fn array_proto_every(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let mut all = true;
    each_element(engine, this, args, "every", |engine, _, _, r| {
        all = engine.to_boolean(r);
        Ok(all)
    })?;
    Ok(Value::Boolean(all))
}

fn array_proto_some(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let mut any = false;
    each_element(engine, this, args, "some", |engine, _, _, r| {
        any = engine.to_boolean(r);
        Ok(!any)
    })?;
    Ok(Value::Boolean(any))
}

fn array_proto_reduce(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(this)?;
    let length = length_of(engine, o)?;
    let f = callback(engine, args, "reduce")?;
    let mut k = 0;
    let mut accumulator = match args.get(1) {
        Some(&initial) => initial,
        None => loop {
            if k >= length {
                return engine.throw_type_error("Reduce of empty array with no initial value");
            }
            k += 1;
            if let Some(v) = element(engine, o, k - 1)? {
                break v;
            }
        },
    };
    for k in k..length {
        if let Some(v) = element(engine, o, k)? {
            accumulator = engine.call_value(
                f,
                Value::Undefined,
                &[accumulator, v, Value::from_u32(k), Value::Object(o)],
            )?;
        }
    }
    Ok(accumulator)
}
