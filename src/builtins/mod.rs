//! JavaScript built-in objects
//!
//! The intrinsic prototypes are allocated bare by the engine; `install`
//! gives them their methods and publishes the constructors on the global
//! object. Only what the object model itself relies on is provided.

pub mod array;
pub mod error;
pub mod function;
pub mod object;
pub mod primitive;
pub mod symbol;

use crate::engine::Engine;
use crate::runtime::function::BuiltinFn;
use crate::runtime::property::{PropertyAttributes, PropertyKey};
use crate::value::{ObjectRef, Value};

/// Wire every built-in into a freshly created engine
pub(crate) fn install(engine: &mut Engine) {
    object::install(engine);
    function::install(engine);
    array::install(engine);
    error::install(engine);
    symbol::install(engine);
    primitive::install(engine);
    install_global_values(engine);
}

fn install_global_values(engine: &mut Engine) {
    let global = engine.global_object();
    let names = engine.names;
    let frozen = PropertyAttributes::FROZEN;
    engine.define_data_property(global, names.undefined.into(), Value::Undefined, frozen);
    engine.define_data_property(global, names.nan.into(), Value::Double(f64::NAN), frozen);
    engine.define_data_property(global, names.infinity.into(), Value::Double(f64::INFINITY), frozen);
}

/// Install a method as a hidden data property
pub(crate) fn define_method(engine: &mut Engine, target: ObjectRef, name: &str, arity: u32, func: BuiltinFn) {
    let f = engine.new_builtin_function(name, arity, func);
    let key = engine.property_key(name);
    engine.define_data_property(target, key, Value::Object(f), PropertyAttributes::HIDDEN);
}

/// Publish a value on the global object
pub(crate) fn define_global(engine: &mut Engine, name: &str, value: Value) {
    let global = engine.global_object();
    let key = engine.property_key(name);
    engine.define_data_property(global, key, value, PropertyAttributes::HIDDEN);
}

/// Argument `index`, `undefined` when missing
#[inline]
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).copied().unwrap_or(Value::Undefined)
}

/// Read `key` of an object built by a built-in, skipping accessors
pub(crate) fn own_data(engine: &Engine, o: ObjectRef, key: PropertyKey) -> Option<Value> {
    engine.get_own_property(o, key).and_then(|(slot, _)| slot.value())
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::value::Value;

    #[test]
    fn test_global_values() {
        let mut engine = Engine::new();
        let global = engine.global_context();
        let undefined = engine.intern("undefined");
        assert_eq!(engine.get_name(global, undefined).unwrap(), Value::Undefined);
        let nan = engine.intern("NaN");
        assert!(matches!(engine.get_name(global, nan).unwrap(), Value::Double(d) if d.is_nan()));
        // read-only in sloppy mode: silently ignored
        engine.set_name(global, undefined, Value::Integer(1)).unwrap();
        assert_eq!(engine.get_name(global, undefined).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_constructors_published() {
        let mut engine = Engine::new();
        let global = engine.global_context();
        for name in ["Object", "Function", "Array", "Error", "TypeError", "ReferenceError", "RangeError", "Symbol"] {
            let id = engine.intern(name);
            let f = engine.get_name(global, id).unwrap();
            assert!(engine.is_callable(f), "{name}");
        }
    }
}
