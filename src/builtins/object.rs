//! Object constructor and Object.prototype

use crate::builtins::{arg, define_global, define_method};
use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::property::{PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::value::{ObjectRef, Value};

pub(crate) fn install(engine: &mut Engine) {
    let proto = engine.intrinsics.object_prototype;
    define_method(engine, proto, "toString", 0, object_proto_to_string);
    define_method(engine, proto, "valueOf", 0, object_proto_value_of);
    define_method(engine, proto, "hasOwnProperty", 1, object_proto_has_own_property);
    define_method(engine, proto, "isPrototypeOf", 1, object_proto_is_prototype_of);

    let ctor = engine.new_builtin_constructor("Object", 1, object_constructor, proto);
    define_method(engine, ctor, "defineProperty", 3, object_define_property);
    define_method(engine, ctor, "getOwnPropertyDescriptor", 2, object_get_own_property_descriptor);
    define_method(engine, ctor, "getPrototypeOf", 1, object_get_prototype_of);
    define_method(engine, ctor, "create", 1, object_create);
    define_method(engine, ctor, "keys", 1, object_keys);
    define_method(engine, ctor, "preventExtensions", 1, object_prevent_extensions);
    define_method(engine, ctor, "isExtensible", 1, object_is_extensible);
    define_method(engine, ctor, "seal", 1, object_seal);
    define_method(engine, ctor, "freeze", 1, object_freeze);
    define_method(engine, ctor, "isSealed", 1, object_is_sealed);
    define_method(engine, ctor, "isFrozen", 1, object_is_frozen);
    define_global(engine, "Object", Value::Object(ctor));
}

fn object_constructor(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        Value::Undefined | Value::Null => Ok(Value::Object(engine.new_plain_object())),
        v => Ok(Value::Object(engine.to_object(v)?)),
    }
}

pub(crate) fn object_proto_to_string(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let tag = match this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        _ => {
            let o = engine.to_object(this)?;
            engine.object(o).kind().class_name()
        }
    };
    let s = engine.new_string(&format!("[object {tag}]"));
    Ok(Value::String(s))
}

fn object_proto_value_of(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Object(engine.to_object(this)?))
}

fn object_proto_has_own_property(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let key = engine.to_property_key(arg(args, 0))?;
    let o = engine.to_object(this)?;
    Ok(Value::Boolean(engine.has_own_property(o, key)))
}

fn object_proto_is_prototype_of(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let Some(mut current) = arg(args, 0).as_object() else {
        return Ok(Value::Boolean(false));
    };
    let o = engine.to_object(this)?;
    while let Some(p) = engine.get_prototype(current) {
        if p == o {
            return Ok(Value::Boolean(true));
        }
        current = p;
    }
    Ok(Value::Boolean(false))
}

/// The object argument of an `Object.*` function
fn object_arg(engine: &mut Engine, args: &[Value], function: &str) -> Result<ObjectRef> {
    match arg(args, 0) {
        Value::Object(o) => Ok(o),
        _ => {
            let msg = format!("Object.{function} called on non-object");
            engine.throw_type_error(&msg)
        }
    }
}

/// ToPropertyDescriptor
pub(crate) fn to_property_descriptor(engine: &mut Engine, value: Value) -> Result<PropertyDescriptor> {
    let Some(o) = value.as_object() else {
        return engine.throw_type_error("Property description must be an object");
    };
    let names = engine.names;
    let mut desc = PropertyDescriptor::default();

    let flag = |engine: &mut Engine, key: PropertyKey| -> Result<Option<bool>> {
        if !engine.has_property(o, key) {
            return Ok(None);
        }
        let v = engine.get(o, key)?;
        Ok(Some(engine.to_boolean(v)))
    };
    desc.enumerable = flag(engine, names.enumerable.into())?;
    desc.configurable = flag(engine, names.configurable.into())?;
    desc.writable = flag(engine, names.writable.into())?;

    if engine.has_property(o, names.value.into()) {
        desc.value = Some(engine.get(o, names.value.into())?);
    }
    for (key, is_getter) in [(names.get, true), (names.set, false)] {
        if !engine.has_property(o, key.into()) {
            continue;
        }
        let f = engine.get(o, key.into())?;
        let accessor = match f {
            Value::Undefined => None,
            Value::Object(f) if engine.is_callable(Value::Object(f)) => Some(f),
            _ => {
                let which = if is_getter { "Getter" } else { "Setter" };
                let msg = format!("{which} must be a function");
                return engine.throw_type_error(&msg);
            }
        };
        if is_getter {
            desc.get = Some(accessor);
        } else {
            desc.set = Some(accessor);
        }
    }

    if desc.is_accessor() && (desc.value.is_some() || desc.writable.is_some()) {
        return engine.throw_type_error(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
        );
    }
    Ok(desc)
}

/// FromPropertyDescriptor
fn from_property_descriptor(engine: &mut Engine, desc: PropertyDescriptor) -> ObjectRef {
    let o = engine.new_plain_object();
    let names = engine.names;
    let attrs = PropertyAttributes::DEFAULT;
    if desc.is_accessor() {
        let getter = desc.get.flatten().map_or(Value::Undefined, Value::Object);
        let setter = desc.set.flatten().map_or(Value::Undefined, Value::Object);
        engine.define_data_property(o, names.get.into(), getter, attrs);
        engine.define_data_property(o, names.set.into(), setter, attrs);
    } else {
        let value = desc.value.unwrap_or(Value::Undefined);
        engine.define_data_property(o, names.value.into(), value, attrs);
        let writable = Value::Boolean(desc.writable.unwrap_or(false));
        engine.define_data_property(o, names.writable.into(), writable, attrs);
    }
    let enumerable = Value::Boolean(desc.enumerable.unwrap_or(false));
    engine.define_data_property(o, names.enumerable.into(), enumerable, attrs);
    let configurable = Value::Boolean(desc.configurable.unwrap_or(false));
    engine.define_data_property(o, names.configurable.into(), configurable, attrs);
    o
}

fn object_define_property(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let o = object_arg(engine, args, "defineProperty")?;
    let key = engine.to_property_key(arg(args, 1))?;
    let desc = to_property_descriptor(engine, arg(args, 2))?;
    engine.define_own_property(o, key, desc, true)?;
    Ok(Value::Object(o))
}

fn object_get_own_property_descriptor(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(arg(args, 0))?;
    let key = engine.to_property_key(arg(args, 1))?;
    match engine.get_own_property(o, key) {
        Some((slot, attrs)) => {
            let desc = PropertyDescriptor::from_slot(slot, attrs);
            Ok(Value::Object(from_property_descriptor(engine, desc)))
        }
        None => Ok(Value::Undefined),
    }
}

fn object_get_prototype_of(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let o = object_arg(engine, args, "getPrototypeOf")?;
    Ok(engine.get_prototype(o).map_or(Value::Null, Value::Object))
}

fn object_create(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let proto = match arg(args, 0) {
        Value::Object(p) => Some(p),
        Value::Null => None,
        _ => return engine.throw_type_error("Object prototype may only be an Object or null"),
    };
    Ok(Value::Object(engine.new_object(proto)))
}

/// `Object.keys`
fn object_keys(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let o = engine.to_object(arg(args, 0))?;
    let keys: Vec<Value> = engine
        .own_enumerable_keys(o)
        .into_iter()
        .map(|key| engine.key_to_value(key))
        .collect();
    Ok(Value::Object(engine.new_array(&keys)))
}

fn object_prevent_extensions(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let v = arg(args, 0);
    if let Value::Object(o) = v {
        engine.prevent_extensions(o);
    }
    Ok(v)
}

fn object_is_extensible(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(arg(args, 0).as_object().is_some_and(|o| engine.is_extensible(o))))
}

fn object_seal(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let v = arg(args, 0);
    if let Value::Object(o) = v {
        engine.seal(o);
    }
    Ok(v)
}

fn object_freeze(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let v = arg(args, 0);
    if let Value::Object(o) = v {
        engine.freeze(o);
    }
    Ok(v)
}

fn object_is_sealed(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    // primitives count as sealed
    Ok(Value::Boolean(arg(args, 0).as_object().is_none_or(|o| engine.is_sealed(o))))
}

fn object_is_frozen(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(arg(args, 0).as_object().is_none_or(|o| engine.is_frozen(o))))
}
