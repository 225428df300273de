//! Error constructors
//!
//! `Error` plus the three native error types the runtime itself raises.

use crate::builtins::{arg, define_global, define_method};
use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::function::BuiltinFn;
use crate::runtime::property::PropertyAttributes;
use crate::value::{ObjectRef, Value};

pub(crate) fn install(engine: &mut Engine) {
    let intrinsics = engine.intrinsics;
    let kinds: [(&str, ObjectRef, BuiltinFn); 4] = [
        ("Error", intrinsics.error_prototype, error_constructor),
        ("TypeError", intrinsics.type_error_prototype, type_error_constructor),
        ("ReferenceError", intrinsics.reference_error_prototype, reference_error_constructor),
        ("RangeError", intrinsics.range_error_prototype, range_error_constructor),
    ];
    for (name, proto, func) in kinds {
        let names = engine.names;
        let s = Value::String(engine.new_string(name));
        engine.define_data_property(proto, names.name.into(), s, PropertyAttributes::HIDDEN);
        let empty = Value::String(engine.literals.empty);
        engine.define_data_property(proto, names.message.into(), empty, PropertyAttributes::HIDDEN);
        let ctor = engine.new_builtin_constructor(name, 1, func, proto);
        define_global(engine, name, Value::Object(ctor));
    }
    define_method(engine, intrinsics.error_prototype, "toString", 0, error_proto_to_string);
}

fn make_error(engine: &mut Engine, proto: ObjectRef, args: &[Value]) -> Result<Value> {
    let message = match arg(args, 0) {
        Value::Undefined => String::new(),
        v => engine.to_rust_string(v)?,
    };
    Ok(Value::Object(engine.new_error(proto, &message)))
}

fn error_constructor(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let proto = engine.intrinsics.error_prototype;
    make_error(engine, proto, args)
}

fn type_error_constructor(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let proto = engine.intrinsics.type_error_prototype;
    make_error(engine, proto, args)
}

fn reference_error_constructor(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let proto = engine.intrinsics.reference_error_prototype;
    make_error(engine, proto, args)
}

fn range_error_constructor(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let proto = engine.intrinsics.range_error_prototype;
    make_error(engine, proto, args)
}

/// `Error.prototype.toString`
fn error_proto_to_string(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let Some(o) = this.as_object() else {
        return engine.throw_type_error("Error.prototype.toString called on non-object");
    };
    let names = engine.names;
    let name = match engine.get(o, names.name.into())? {
        Value::Undefined => "Error".to_string(),
        v => engine.to_rust_string(v)?,
    };
    let message = match engine.get(o, names.message.into())? {
        Value::Undefined => String::new(),
        v => engine.to_rust_string(v)?,
    };
    let text = match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{name}: {message}"),
    };
    Ok(Value::String(engine.new_string(&text)))
}
