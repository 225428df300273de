//! Boolean, Number and String
//!
//! The three globals are conversion functions; wrapper objects only come
//! from ToObject. Their prototypes unwrap either a primitive or a wrapper.

use crate::builtins::{arg, define_global, define_method};
use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::function::BuiltinFn;
use crate::runtime::object::ObjectKind;
use crate::runtime::property::PropertyAttributes;
use crate::value::{ObjectRef, Value};

pub(crate) fn install(engine: &mut Engine) {
    let intrinsics = engine.intrinsics;

    let proto = intrinsics.boolean_prototype;
    define_method(engine, proto, "toString", 0, boolean_proto_to_string);
    define_method(engine, proto, "valueOf", 0, boolean_proto_value_of);
    publish(engine, "Boolean", boolean_function, proto);

    let proto = intrinsics.number_prototype;
    define_method(engine, proto, "toString", 0, number_proto_to_string);
    define_method(engine, proto, "valueOf", 0, number_proto_value_of);
    publish(engine, "Number", number_function, proto);

    let proto = intrinsics.string_prototype;
    define_method(engine, proto, "toString", 0, string_proto_value_of);
    define_method(engine, proto, "valueOf", 0, string_proto_value_of);
    publish(engine, "String", string_function, proto);
}

fn publish(engine: &mut Engine, name: &str, func: BuiltinFn, proto: ObjectRef) {
    let f = engine.new_builtin_function(name, 1, func);
    let names = engine.names;
    engine.define_data_property(f, names.prototype.into(), Value::Object(proto), PropertyAttributes::FROZEN);
    engine.define_data_property(proto, names.constructor.into(), Value::Object(f), PropertyAttributes::HIDDEN);
    define_global(engine, name, Value::Object(f));
}

fn boolean_function(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(engine.to_boolean(arg(args, 0))))
}

fn number_function(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::Integer(0)),
        Some(&v) if v.is_number() => Ok(v),
        Some(&v) => Ok(Value::from_f64_normalized(engine.to_number(v)?)),
    }
}

fn string_function(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::String(engine.literals.empty)),
        // the one place a symbol converts to a string
        Some(&Value::Symbol(s)) => {
            let text = engine.symbol_descriptive_string(s);
            Ok(Value::String(engine.new_string(&text)))
        }
        Some(&v) => Ok(Value::String(engine.to_string(v)?)),
    }
}

fn type_mismatch<T>(engine: &mut Engine, method: &str) -> Result<T> {
    let msg = format!("{method} requires that 'this' be of the matching primitive type");
    engine.throw_type_error(&msg)
}

fn this_boolean(engine: &mut Engine, this: Value, method: &str) -> Result<bool> {
    match this {
        Value::Boolean(b) => Ok(b),
        Value::Object(o) => match engine.object(o).kind {
            ObjectKind::BooleanWrapper(b) => Ok(b),
            _ => type_mismatch(engine, method),
        },
        _ => type_mismatch(engine, method),
    }
}

fn this_number(engine: &mut Engine, this: Value, method: &str) -> Result<Value> {
    match this {
        Value::Integer(_) | Value::Double(_) => Ok(this),
        Value::Object(o) => match engine.object(o).kind {
            ObjectKind::NumberWrapper(d) => Ok(Value::from_f64_normalized(d)),
            _ => type_mismatch(engine, method),
        },
        _ => type_mismatch(engine, method),
    }
}

fn boolean_proto_to_string(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let b = this_boolean(engine, this, "Boolean.prototype.toString")?;
    Ok(Value::String(engine.to_string(Value::Boolean(b))?))
}

fn boolean_proto_value_of(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(this_boolean(engine, this, "Boolean.prototype.valueOf")?))
}

fn number_proto_to_string(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let n = this_number(engine, this, "Number.prototype.toString")?;
    match arg(args, 0) {
        Value::Undefined => {}
        radix => {
            if engine.to_integer(radix)? != 10.0 {
                return engine.throw_range_error("toString() radix other than 10 is not supported");
            }
        }
    }
    Ok(Value::String(engine.to_string(n)?))
}

fn number_proto_value_of(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    this_number(engine, this, "Number.prototype.valueOf")
}

fn string_proto_value_of(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    match this {
        Value::String(_) => Ok(this),
        Value::Object(o) => match engine.object(o).kind {
            ObjectKind::StringWrapper(s) => Ok(Value::String(s)),
            _ => type_mismatch(engine, "String.prototype.valueOf"),
        },
        _ => type_mismatch(engine, "String.prototype.valueOf"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_fn(engine: &mut Engine, name: &str) -> ObjectRef {
        let global = engine.global_object();
        let key = engine.property_key(name);
        engine.get(global, key).unwrap().as_object().unwrap()
    }

    #[test]
    fn test_conversion_functions() {
        let mut engine = Engine::new();
        let boolean = global_fn(&mut engine, "Boolean");
        let number = global_fn(&mut engine, "Number");
        let string = global_fn(&mut engine, "String");

        let empty = Value::String(engine.literals.empty);
        assert_eq!(engine.call(boolean, Value::Undefined, &[empty]).unwrap(), Value::Boolean(false));
        let o = Value::Object(engine.new_plain_object());
        assert_eq!(engine.call(boolean, Value::Undefined, &[o]).unwrap(), Value::Boolean(true));

        let s = Value::String(engine.new_string("  42 "));
        assert_eq!(engine.call(number, Value::Undefined, &[s]).unwrap(), Value::Integer(42));
        assert_eq!(engine.call(number, Value::Undefined, &[]).unwrap(), Value::Integer(0));

        let r = engine.call(string, Value::Undefined, &[Value::Double(1.5)]).unwrap();
        assert_eq!(engine.to_rust_string(r).unwrap(), "1.5");
        let sym = Value::Symbol(engine.new_symbol(Some("s")));
        let r = engine.call(string, Value::Undefined, &[sym]).unwrap();
        assert_eq!(engine.to_rust_string(r).unwrap(), "Symbol(s)");
    }

    #[test]
    fn test_wrappers_unwrap() {
        let mut engine = Engine::new();
        let wrapper = engine.to_object(Value::Integer(7)).unwrap();
        let r = number_proto_value_of(&mut engine, Value::Object(wrapper), &[]).unwrap();
        assert_eq!(r, Value::Integer(7));

        let wrapper = engine.to_object(Value::Boolean(true)).unwrap();
        let r = boolean_proto_to_string(&mut engine, Value::Object(wrapper), &[]).unwrap();
        assert_eq!(engine.to_rust_string(r).unwrap(), "true");

        let s = Value::String(engine.new_string("abc"));
        let wrapper = engine.to_object(s).unwrap();
        let r = string_proto_value_of(&mut engine, Value::Object(wrapper), &[]).unwrap();
        assert_eq!(engine.to_rust_string(r).unwrap(), "abc");
    }

    #[test]
    fn test_wrong_receiver() {
        let mut engine = Engine::new();
        let err = number_proto_value_of(&mut engine, Value::Boolean(true), &[]).unwrap_err();
        assert!(engine.is_type_error(err.thrown_value().unwrap()));
        let o = Value::Object(engine.new_plain_object());
        assert!(string_proto_value_of(&mut engine, o, &[]).is_err());
    }

    #[test]
    fn test_number_to_string_radix() {
        let mut engine = Engine::new();
        let r = number_proto_to_string(&mut engine, Value::Integer(255), &[Value::Integer(10)]).unwrap();
        assert_eq!(engine.to_rust_string(r).unwrap(), "255");
        let err = number_proto_to_string(&mut engine, Value::Integer(255), &[Value::Integer(16)]).unwrap_err();
        assert!(engine.is_range_error(err.thrown_value().unwrap()));
    }
}
