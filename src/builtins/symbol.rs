//! Symbol function and Symbol.prototype

use crate::builtins::{arg, define_global, define_method};
use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::object::ObjectKind;
use crate::runtime::property::PropertyAttributes;
use crate::value::{SymbolRef, Value};

pub(crate) fn install(engine: &mut Engine) {
    let proto = engine.intrinsics.symbol_prototype;
    define_method(engine, proto, "toString", 0, symbol_proto_to_string);
    define_method(engine, proto, "valueOf", 0, symbol_proto_value_of);

    // callable, but `new Symbol()` is a TypeError
    let symbol = engine.new_builtin_function("Symbol", 0, symbol_function);
    let names = engine.names;
    engine.define_data_property(symbol, names.prototype.into(), Value::Object(proto), PropertyAttributes::FROZEN);
    engine.define_data_property(proto, names.constructor.into(), Value::Object(symbol), PropertyAttributes::HIDDEN);
    define_method(engine, symbol, "for", 1, symbol_for);
    define_method(engine, symbol, "keyFor", 1, symbol_key_for);
    define_global(engine, "Symbol", Value::Object(symbol));
}

fn symbol_function(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let description = match arg(args, 0) {
        Value::Undefined => None,
        v => Some(engine.to_rust_string(v)?),
    };
    Ok(Value::Symbol(engine.new_symbol(description.as_deref())))
}

fn symbol_for(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let key = engine.to_rust_string(arg(args, 0))?;
    Ok(Value::Symbol(engine.symbol_for(&key)))
}

fn symbol_key_for(engine: &mut Engine, _this: Value, args: &[Value]) -> Result<Value> {
    let Value::Symbol(symbol) = arg(args, 0) else {
        let msg = format!("{} is not a symbol", engine.type_of(arg(args, 0)));
        return engine.throw_type_error(&msg);
    };
    Ok(engine.key_for(symbol).map_or(Value::Undefined, Value::String))
}

/// thisSymbolValue
fn this_symbol(engine: &mut Engine, this: Value, method: &str) -> Result<SymbolRef> {
    match this {
        Value::Symbol(s) => return Ok(s),
        Value::Object(o) => {
            if let ObjectKind::SymbolWrapper(s) = engine.object(o).kind {
                return Ok(s);
            }
        }
        _ => {}
    }
    let msg = format!("Symbol.prototype.{method} requires that 'this' be a Symbol");
    engine.throw_type_error(&msg)
}

fn symbol_proto_to_string(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    let symbol = this_symbol(engine, this, "toString")?;
    let text = engine.symbol_descriptive_string(symbol);
    Ok(Value::String(engine.new_string(&text)))
}

fn symbol_proto_value_of(engine: &mut Engine, this: Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Symbol(this_symbol(engine, this, "valueOf")?))
}
