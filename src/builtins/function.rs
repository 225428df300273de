//! Function constructor and Function.prototype

use crate::builtins::{arg, define_global, define_method};
use crate::engine::Engine;
use crate::error::Result;
use crate::value::{ObjectRef, Value};

/// Behavior of `Function.prototype` itself: accepts anything, returns undefined
pub(crate) fn function_prototype(_engine: &mut Engine, _this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Undefined)
}

pub(crate) fn install(engine: &mut Engine) {
    let proto = engine.intrinsics.function_prototype;
    define_method(engine, proto, "toString", 0, function_proto_to_string);
    define_method(engine, proto, "call", 1, function_proto_call);
    define_method(engine, proto, "apply", 2, function_proto_apply);
    define_method(engine, proto, "bind", 1, function_proto_bind);

    let ctor = engine.new_builtin_constructor("Function", 1, function_constructor, proto);
    define_global(engine, "Function", Value::Object(ctor));
}

fn function_constructor(engine: &mut Engine, _this: Value, _args: &[Value]) -> Result<Value> {
    engine.throw_type_error("Function constructor: dynamic function compilation is not supported")
}

/// The callable `this` of a Function.prototype method
fn this_function(engine: &mut Engine, this: Value, method: &str) -> Result<ObjectRef> {
    match this {
        Value::Object(f) if engine.is_callable(this) => Ok(f),
        _ => {
            let msg = format!("Function.prototype.{method} called on a non-function");
            engine.throw_type_error(&msg)
        }
    }
}

fn function_proto_to_string(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let f = this_function(engine, this, "toString")?;
    let text = format!("function {}() {{ [native code] }}", engine.function_name(f));
    Ok(Value::String(engine.new_string(&text)))
}

fn function_proto_call(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let f = this_function(engine, this, "call")?;
    let rest = args.get(1..).unwrap_or(&[]);
    engine.call(f, arg(args, 0), rest)
}

fn function_proto_apply(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let f = this_function(engine, this, "apply")?;
    let list = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(o) => {
            let length = engine.get(o, engine.names.length.into())?;
            let length = engine.to_uint32(length)?;
            let mut list = Vec::with_capacity(length as usize);
            for i in 0..length {
                list.push(engine.get(o, i.into())?);
            }
            list
        }
        _ => return engine.throw_type_error("CreateListFromArrayLike called on non-object"),
    };
    engine.call(f, arg(args, 0), &list)
}

fn function_proto_bind(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
    let target = this_function(engine, this, "bind")?;
    let rest = args.get(1..).unwrap_or(&[]);
    Ok(Value::Object(engine.bind_function(target, arg(args, 0), rest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::property::{PropertyAttributes, PropertyKey};

    fn method(engine: &mut Engine, name: &str) -> ObjectRef {
        let proto = engine.intrinsics.function_prototype;
        let key = engine.property_key(name);
        engine.get(proto, key).unwrap().as_object().unwrap()
    }

    fn sum(engine: &mut Engine, this: Value, args: &[Value]) -> Result<Value> {
        let mut total = if this.is_number() { engine.to_number(this)? } else { 0.0 };
        for v in args {
            total += engine.to_number(*v)?;
        }
        Ok(Value::from_f64_normalized(total))
    }

    #[test]
    fn test_function_prototype_is_callable() {
        let mut engine = Engine::new();
        let proto = engine.intrinsics.function_prototype;
        assert!(engine.is_callable(Value::Object(proto)));
        let r = engine.call(proto, Value::Undefined, &[Value::Integer(1)]).unwrap();
        assert_eq!(r, Value::Undefined);
        // not a constructor
        assert!(!engine.is_constructor(Value::Object(proto)));
    }

    #[test]
    fn test_call_and_apply() {
        let mut engine = Engine::new();
        let f = engine.new_builtin_function("sum", 2, sum);
        let call = method(&mut engine, "call");
        let r = engine
            .call(call, Value::Object(f), &[Value::Integer(10), Value::Integer(1), Value::Integer(2)])
            .unwrap();
        assert_eq!(r, Value::Integer(13));

        let apply = method(&mut engine, "apply");
        let list = engine.new_plain_object();
        engine.define_data_property(list, PropertyKey::Index(0), Value::Integer(4), PropertyAttributes::DEFAULT);
        let length = engine.property_key("length");
        engine.define_data_property(list, length, Value::Integer(1), PropertyAttributes::DEFAULT);
        let r = engine
            .call(apply, Value::Object(f), &[Value::Undefined, Value::Object(list)])
            .unwrap();
        assert_eq!(r, Value::Integer(4));
    }

    #[test]
    fn test_bind() {
        let mut engine = Engine::new();
        let f = engine.new_builtin_function("sum", 3, sum);
        let bind = method(&mut engine, "bind");
        let bound = engine
            .call(bind, Value::Object(f), &[Value::Integer(100), Value::Integer(1)])
            .unwrap()
            .as_object()
            .unwrap();
        let length = engine.property_key("length");
        assert_eq!(engine.get(bound, length).unwrap(), Value::Integer(2));
        let r = engine.call(bound, Value::Undefined, &[Value::Integer(2)]).unwrap();
        assert_eq!(r, Value::Integer(103));
    }

    #[test]
    fn test_to_string_and_non_callable_this() {
        let mut engine = Engine::new();
        let f = engine.new_builtin_function("answer", 0, |_, _, _| Ok(Value::Integer(42)));
        let to_string = method(&mut engine, "toString");
        let r = engine.call(to_string, Value::Object(f), &[]).unwrap();
        assert_eq!(engine.to_rust_string(r).unwrap(), "function answer() { [native code] }");

        let o = engine.new_plain_object();
        let err = engine.call(to_string, Value::Object(o), &[]).unwrap_err();
        assert!(engine.is_type_error(err.thrown_value().unwrap()));
    }

    #[test]
    fn test_function_constructor_unsupported() {
        let mut engine = Engine::new();
        let global = engine.global_object();
        let key = engine.property_key("Function");
        let ctor = engine.get(global, key).unwrap().as_object().unwrap();
        let err = engine.construct(ctor, &[]).unwrap_err();
        assert!(engine.is_type_error(err.thrown_value().unwrap()));
    }
}
