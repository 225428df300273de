//! Array objects
//!
//! Elements are ordinary index-keyed properties, so arrays share internal
//! classes with each other like any object. `length` is an own data
//! property that stays one past the highest index: writing at or past the
//! end grows it, and shrinking it deletes the elements it cuts off.

use crate::engine::Engine;
use crate::error::Result;
use crate::runtime::object::ObjectKind;
use crate::runtime::property::{PropertyAttributes, PropertyDescriptor, PropertyKey, PropertySlot};
use crate::value::{ObjectRef, Value};

/// Attributes of an array's own `length`
const LENGTH_ATTRIBUTES: PropertyAttributes = PropertyAttributes::data(true, false, false);

impl Engine {
    /// Allocate an array holding `values`
    pub fn new_array(&mut self, values: &[Value]) -> ObjectRef {
        let proto = self.intrinsics.array_prototype;
        let a = self.alloc_object(Some(proto), ObjectKind::Array);
        self.init_array_length(a, values.len() as u32);
        for (i, v) in values.iter().enumerate() {
            self.define_data_property(a, PropertyKey::Index(i as u32), *v, PropertyAttributes::DEFAULT);
        }
        a
    }

    /// Give a fresh array object its `length`
    pub(crate) fn init_array_length(&mut self, a: ObjectRef, length: u32) {
        let key = PropertyKey::Name(self.names.length);
        self.define_data_property(a, key, Value::from_u32(length), LENGTH_ATTRIBUTES);
    }

    pub fn is_array(&self, value: Value) -> bool {
        value
            .as_object()
            .is_some_and(|o| matches!(self.object(o).kind, ObjectKind::Array))
    }

    /// `length` of an array object
    pub fn array_length(&self, a: ObjectRef) -> u32 {
        let key = PropertyKey::Name(self.names.length);
        match self.get_own_property(a, key) {
            Some((PropertySlot::Data(v), _)) => v.as_number().map_or(0, Value::to_uint32),
            _ => 0,
        }
    }

    fn array_length_writable(&self, a: ObjectRef) -> bool {
        let key = PropertyKey::Name(self.names.length);
        self.get_own_property(a, key).is_some_and(|(_, attrs)| attrs.is_writable())
    }

    fn write_array_length(&mut self, a: ObjectRef, length: u32) {
        let key = PropertyKey::Name(self.names.length);
        self.write_slot(a, key, PropertySlot::Data(Value::from_u32(length)));
    }

    /// ToUint32 that must round-trip, RangeError otherwise
    pub(crate) fn to_array_length(&mut self, value: Value) -> Result<u32> {
        let length = self.to_uint32(value)?;
        if length as f64 != self.to_number(value)? {
            return self.throw_range_error("Invalid array length");
        }
        Ok(length)
    }

    /// `[[Put]]` on an array
    pub(crate) fn put_array(&mut self, a: ObjectRef, key: PropertyKey, value: Value, strict: bool) -> Result<()> {
        match key {
            PropertyKey::Name(name) if name == self.names.length => {
                if !self.array_length_writable(a) {
                    return self.reject_put(key, strict);
                }
                let desc = PropertyDescriptor::default().with_value(value);
                self.define_array_property(a, key, desc, strict).map(|_| ())
            }
            PropertyKey::Index(index) => {
                let length = self.array_length(a);
                if index >= length && !self.array_length_writable(a) {
                    return self.reject_put(key, strict);
                }
                self.put_ordinary(a, key, value, strict)?;
                // a setter further up the chain adds nothing
                if index >= length && self.has_own_property(a, key) {
                    self.write_array_length(a, index + 1);
                }
                Ok(())
            }
            _ => self.put_ordinary(a, key, value, strict),
        }
    }

    /// `[[DefineOwnProperty]]` on an array (ES5 15.4.5.1)
    pub(crate) fn define_array_property(
        &mut self,
        a: ObjectRef,
        key: PropertyKey,
        desc: PropertyDescriptor,
        strict: bool,
    ) -> Result<bool> {
        match key {
            PropertyKey::Name(name) if name == self.names.length => {
                let Some(value) = desc.value else {
                    return self.define_own_property_ordinary(a, key, desc, strict);
                };
                let length = self.to_array_length(value)?;
                self.set_array_length(a, desc.with_value(Value::from_u32(length)), length, strict)
            }
            PropertyKey::Index(index) => {
                let length = self.array_length(a);
                if index >= length && !self.array_length_writable(a) {
                    return self.reject_define(key, strict);
                }
                if !self.define_own_property_ordinary(a, key, desc, false)? {
                    return self.reject_define(key, strict);
                }
                if index >= length {
                    self.write_array_length(a, index + 1);
                }
                Ok(true)
            }
            _ => self.define_own_property_ordinary(a, key, desc, strict),
        }
    }

    fn set_array_length(
        &mut self,
        a: ObjectRef,
        desc: PropertyDescriptor,
        length: u32,
        strict: bool,
    ) -> Result<bool> {
        let key = PropertyKey::Name(self.names.length);
        let old = self.array_length(a);
        if length >= old {
            return self.define_own_property_ordinary(a, key, desc, strict);
        }
        if !self.array_length_writable(a) {
            return self.reject_define(key, strict);
        }

        // stay writable while elements are deleted
        let keep_writable = desc.writable != Some(false);
        let mut first = desc;
        first.writable = Some(true);
        if !self.define_own_property_ordinary(a, key, first, strict)? {
            return Ok(false);
        }

        // own_keys lists indices ascending, so pop from the end
        let mut doomed: Vec<u32> = self
            .own_keys(a)
            .into_iter()
            .filter_map(|k| k.as_index())
            .filter(|&i| i >= length)
            .collect();
        while let Some(index) = doomed.pop() {
            if !self.delete(a, PropertyKey::Index(index), false)? {
                let mut stuck = PropertyDescriptor::default().with_value(Value::from_u32(index + 1));
                if !keep_writable {
                    stuck = stuck.with_writable(false);
                }
                self.define_own_property_ordinary(a, key, stuck, false)?;
                return self.reject_define(key, strict);
            }
        }

        if !keep_writable {
            let lock = PropertyDescriptor::default().with_writable(false);
            self.define_own_property_ordinary(a, key, lock, false)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::runtime::property::{PropertyAttributes, PropertyDescriptor, PropertyKey};
    use crate::value::Value;

    fn length(engine: &mut Engine) -> PropertyKey {
        engine.property_key("length")
    }

    #[test]
    fn test_new_array() {
        let mut engine = Engine::new();
        let a = engine.new_array(&[Value::Integer(1), Value::Null]);
        assert!(engine.is_array(Value::Object(a)));
        assert_eq!(engine.array_length(a), 2);
        let len = length(&mut engine);
        assert_eq!(engine.get(a, len).unwrap(), Value::Integer(2));
        let (_, attrs) = engine.get_own_property(a, len).unwrap();
        assert!(attrs.is_writable() && !attrs.is_enumerable() && !attrs.is_configurable());
        assert_eq!(engine.get(a, PropertyKey::Index(1)).unwrap(), Value::Null);

        let plain = engine.new_plain_object();
        assert!(!engine.is_array(Value::Object(plain)));
    }

    #[test]
    fn test_arrays_share_classes() {
        let mut engine = Engine::new();
        let a = engine.new_array(&[Value::Integer(1)]);
        let b = engine.new_array(&[Value::Integer(2)]);
        assert_eq!(engine.object(a).class(), engine.object(b).class());
    }

    #[test]
    fn test_index_put_grows_length() {
        let mut engine = Engine::new();
        let a = engine.new_array(&[]);
        engine.put(a, PropertyKey::Index(4), Value::Integer(9), false).unwrap();
        assert_eq!(engine.array_length(a), 5);
        // holes stay holes
        assert!(!engine.has_own_property(a, PropertyKey::Index(0)));
        engine.put(a, PropertyKey::Index(2), Value::Integer(1), false).unwrap();
        assert_eq!(engine.array_length(a), 5);
    }

    #[test]
    fn test_shrinking_length_deletes() {
        let mut engine = Engine::new();
        let values: Vec<Value> = (0..5).map(Value::Integer).collect();
        let a = engine.new_array(&values);
        let len = length(&mut engine);
        engine.put(a, len, Value::Integer(2), false).unwrap();
        assert_eq!(engine.array_length(a), 2);
        assert!(engine.has_own_property(a, PropertyKey::Index(1)));
        assert!(!engine.has_own_property(a, PropertyKey::Index(2)));
        assert!(!engine.has_own_property(a, PropertyKey::Index(4)));

        engine.put(a, len, Value::Integer(6), false).unwrap();
        assert_eq!(engine.array_length(a), 6);
        assert_eq!(engine.get(a, PropertyKey::Index(4)).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_invalid_length() {
        let mut engine = Engine::new();
        let a = engine.new_array(&[]);
        let len = length(&mut engine);
        let err = engine.put(a, len, Value::Double(1.5), false).unwrap_err();
        assert!(engine.is_range_error(err.thrown_value().unwrap()));
        let err = engine.put(a, len, Value::Integer(-1), false).unwrap_err();
        assert!(engine.is_range_error(err.thrown_value().unwrap()));
        assert_eq!(engine.array_length(a), 0);
    }

    #[test]
    fn test_non_configurable_element_stops_shrink() {
        let mut engine = Engine::new();
        let values: Vec<Value> = (0..4).map(Value::Integer).collect();
        let a = engine.new_array(&values);
        let pinned = PropertyDescriptor::default().with_configurable(false);
        assert!(engine.define_own_property(a, PropertyKey::Index(1), pinned, false).unwrap());

        let len = length(&mut engine);
        let shrink = PropertyDescriptor::default().with_value(Value::Integer(0));
        assert!(!engine.define_own_property(a, len, shrink, false).unwrap());
        assert_eq!(engine.array_length(a), 2);
        assert!(engine.has_own_property(a, PropertyKey::Index(1)));
        assert!(!engine.has_own_property(a, PropertyKey::Index(2)));
        assert!(engine.define_own_property(a, len, shrink, true).is_err());
    }

    #[test]
    fn test_read_only_length() {
        let mut engine = Engine::new();
        let a = engine.new_array(&[Value::Integer(1), Value::Integer(2)]);
        let len = length(&mut engine);
        let lock = PropertyDescriptor::default()
            .with_value(Value::Integer(1))
            .with_writable(false);
        assert!(engine.define_own_property(a, len, lock, false).unwrap());
        assert_eq!(engine.array_length(a), 1);
        let (_, attrs) = engine.get_own_property(a, len).unwrap();
        assert!(!attrs.is_writable());

        // no growth past a frozen length
        engine.put(a, PropertyKey::Index(5), Value::Null, false).unwrap();
        assert!(!engine.has_own_property(a, PropertyKey::Index(5)));
        assert!(engine.put(a, PropertyKey::Index(5), Value::Null, true).is_err());
        let desc = PropertyDescriptor::data(Value::Null, PropertyAttributes::DEFAULT);
        assert!(!engine.define_own_property(a, PropertyKey::Index(1), desc, false).unwrap());
    }

    #[test]
    fn test_frozen_array() {
        let mut engine = Engine::new();
        let a = engine.new_array(&[Value::Integer(1)]);
        engine.freeze(a);
        engine.put(a, PropertyKey::Index(0), Value::Integer(2), false).unwrap();
        assert_eq!(engine.get(a, PropertyKey::Index(0)).unwrap(), Value::Integer(1));
        engine.put(a, PropertyKey::Index(1), Value::Integer(2), false).unwrap();
        assert_eq!(engine.array_length(a), 1);
        assert!(engine.is_frozen(a));
    }
}
