//! JavaScript object model
//!
//! An object stores its property values in `slots`, indexed through its
//! internal class. The class maps keys to slot numbers and attributes, so
//! objects built the same way share the lookup structure.

use crate::engine::Engine;
use crate::error::Result;
use crate::gc::{Trace, Tracer};
use crate::runtime::arguments::ArgumentsData;
use crate::runtime::function::FunctionKind;
use crate::runtime::internal_class::ClassId;
use crate::runtime::property::{PropertyAttributes, PropertyDescriptor, PropertyKey, PropertySlot};
use crate::util::dtoa::parse_array_index;
use crate::value::{ObjectRef, StringRef, SymbolRef, Value};

/// What an object is, beyond its properties
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Ordinary,
    /// `length` tracks the highest index
    Array,
    Function(FunctionKind),
    Arguments(ArgumentsData),
    Error,
    BooleanWrapper(bool),
    NumberWrapper(f64),
    StringWrapper(StringRef),
    SymbolWrapper(SymbolRef),
}

impl ObjectKind {
    /// `[[Class]]` as reported by `Object.prototype.toString`
    pub fn class_name(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Arguments(_) => "Arguments",
            ObjectKind::Error => "Error",
            ObjectKind::BooleanWrapper(_) => "Boolean",
            ObjectKind::NumberWrapper(_) => "Number",
            ObjectKind::StringWrapper(_) => "String",
            ObjectKind::SymbolWrapper(_) => "Symbol",
        }
    }
}

/// A heap object
#[derive(Debug, Clone)]
pub struct Object {
    pub(crate) class: ClassId,
    pub(crate) prototype: Option<ObjectRef>,
    pub(crate) slots: Vec<PropertySlot>,
    pub(crate) extensible: bool,
    pub(crate) kind: ObjectKind,
}

impl Object {
    pub fn new(class: ClassId, prototype: Option<ObjectRef>, kind: ObjectKind) -> Self {
        Object {
            class,
            prototype,
            slots: Vec::new(),
            extensible: true,
            kind,
        }
    }

    #[inline]
    pub fn class(&self) -> ClassId {
        self.class
    }

    #[inline]
    pub fn prototype(&self) -> Option<ObjectRef> {
        self.prototype
    }

    #[inline]
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    #[inline]
    pub fn is_extensible(&self) -> bool {
        self.extensible
    }
}

impl Trace for Object {
    fn trace(&self, tracer: &mut Tracer) {
        self.prototype.trace(tracer);
        for slot in &self.slots {
            match *slot {
                PropertySlot::Data(v) => tracer.mark_value(v),
                PropertySlot::Accessor { getter, setter } => {
                    getter.trace(tracer);
                    setter.trace(tracer);
                }
            }
        }
        match &self.kind {
            ObjectKind::Function(f) => f.trace(tracer),
            ObjectKind::Arguments(a) => a.trace(tracer),
            ObjectKind::StringWrapper(s) => tracer.mark_string(*s),
            ObjectKind::SymbolWrapper(s) => tracer.mark_symbol(*s),
            ObjectKind::Ordinary
            | ObjectKind::Array
            | ObjectKind::Error
            | ObjectKind::BooleanWrapper(_)
            | ObjectKind::NumberWrapper(_) => {}
        }
    }
}

impl Engine {
    /// Allocate an ordinary object
    pub fn new_object(&mut self, prototype: Option<ObjectRef>) -> ObjectRef {
        self.alloc_object(prototype, ObjectKind::Ordinary)
    }

    /// Allocate an ordinary object inheriting from `Object.prototype`
    pub fn new_plain_object(&mut self) -> ObjectRef {
        let proto = self.intrinsics.object_prototype;
        self.new_object(Some(proto))
    }

    pub(crate) fn alloc_object(&mut self, prototype: Option<ObjectRef>, kind: ObjectKind) -> ObjectRef {
        let empty = self.classes.empty();
        ObjectRef(self.heap.objects.alloc(Object::new(empty, prototype, kind)))
    }

    #[inline]
    pub fn object(&self, o: ObjectRef) -> &Object {
        &self.heap.objects[o.0]
    }

    #[inline]
    pub(crate) fn object_mut(&mut self, o: ObjectRef) -> &mut Object {
        &mut self.heap.objects[o.0]
    }

    /// Property key for a name: canonical indices become `Index`
    pub fn property_key(&mut self, name: &str) -> PropertyKey {
        match parse_array_index(name) {
            Some(i) => PropertyKey::Index(i),
            None => PropertyKey::Name(self.identifiers.intern(name)),
        }
    }

    /// Human-readable form of a key for error messages
    pub fn key_display(&self, key: PropertyKey) -> String {
        match key {
            PropertyKey::Name(id) => self.identifiers.name(id).to_string(),
            PropertyKey::Index(i) => i.to_string(),
            PropertyKey::Symbol(s) => self.symbol_descriptive_string(s),
        }
    }

    /// Key as a JS value (used by `Object.keys`)
    pub fn key_to_value(&mut self, key: PropertyKey) -> Value {
        match key {
            PropertyKey::Name(id) => {
                let name = self.identifiers.name_rc(id);
                Value::String(self.new_string(&name))
            }
            PropertyKey::Index(i) => Value::String(self.new_string(&i.to_string())),
            PropertyKey::Symbol(s) => Value::Symbol(s),
        }
    }

    pub fn get_own_property(
        &self,
        o: ObjectRef,
        key: PropertyKey,
    ) -> Option<(PropertySlot, PropertyAttributes)> {
        let object = self.object(o);
        let class = self.classes.get(object.class);
        let slot = class.find(key)?;
        Some((object.slots[slot as usize], class.attributes(slot)))
    }

    /// Find a property on `o` or its prototype chain
    pub fn find_property(
        &self,
        o: ObjectRef,
        key: PropertyKey,
    ) -> Option<(ObjectRef, PropertySlot, PropertyAttributes)> {
        let mut current = Some(o);
        while let Some(obj) = current {
            if let Some((slot, attrs)) = self.get_own_property(obj, key) {
                return Some((obj, slot, attrs));
            }
            current = self.object(obj).prototype;
        }
        None
    }

    pub fn has_own_property(&self, o: ObjectRef, key: PropertyKey) -> bool {
        self.get_own_property(o, key).is_some()
    }

    pub fn has_property(&self, o: ObjectRef, key: PropertyKey) -> bool {
        self.find_property(o, key).is_some()
    }

    /// `[[Get]]`
    pub fn get(&mut self, o: ObjectRef, key: PropertyKey) -> Result<Value> {
        self.get_with_receiver(o, key, Value::Object(o))
    }

    pub(crate) fn get_with_receiver(
        &mut self,
        o: ObjectRef,
        key: PropertyKey,
        receiver: Value,
    ) -> Result<Value> {
        match self.find_property(o, key) {
            None => Ok(Value::Undefined),
            Some((_, PropertySlot::Data(v), _)) => Ok(v),
            Some((_, PropertySlot::Accessor { getter, .. }, _)) => match getter {
                Some(g) => self.call(g, receiver, &[]),
                None => Ok(Value::Undefined),
            },
        }
    }

    /// `[[Get]]` on any value; primitives go through their prototype
    pub fn get_value(&mut self, value: Value, key: PropertyKey) -> Result<Value> {
        let proto = match value {
            Value::Object(o) => return self.get(o, key),
            Value::Undefined | Value::Null => {
                let msg = format!(
                    "Cannot read property '{}' of {}",
                    self.key_display(key),
                    if value.is_null() { "null" } else { "undefined" }
                );
                return self.throw_type_error(&msg);
            }
            Value::String(s) => {
                if key == PropertyKey::Name(self.names.length) {
                    return Ok(Value::from_u32(self.string_length(s) as u32));
                }
                self.intrinsics.string_prototype
            }
            Value::Boolean(_) => self.intrinsics.boolean_prototype,
            Value::Integer(_) | Value::Double(_) => self.intrinsics.number_prototype,
            Value::Symbol(_) => self.intrinsics.symbol_prototype,
        };
        self.get_with_receiver(proto, key, value)
    }

    /// `[[Put]]`: assignment with setters and the writability and extensibility checks
    ///
    /// A rejected assignment is silent unless `strict`, then TypeError.
    pub fn put(&mut self, o: ObjectRef, key: PropertyKey, value: Value, strict: bool) -> Result<()> {
        if matches!(self.object(o).kind, ObjectKind::Array) {
            return self.put_array(o, key, value, strict);
        }
        self.put_ordinary(o, key, value, strict)
    }

    pub(crate) fn put_ordinary(&mut self, o: ObjectRef, key: PropertyKey, value: Value, strict: bool) -> Result<()> {
        if let Some((slot, attrs)) = self.get_own_property(o, key) {
            match slot {
                PropertySlot::Data(_) if attrs.is_writable() => {
                    self.write_slot(o, key, PropertySlot::Data(value));
                    return Ok(());
                }
                PropertySlot::Data(_) => return self.reject_put(key, strict),
                PropertySlot::Accessor { setter, .. } => {
                    return self.call_setter(setter, o, key, value, strict);
                }
            }
        }

        let proto = self.object(o).prototype;
        if let Some((_, slot, attrs)) = proto.and_then(|p| self.find_property(p, key)) {
            match slot {
                PropertySlot::Accessor { setter, .. } => {
                    return self.call_setter(setter, o, key, value, strict);
                }
                PropertySlot::Data(_) if !attrs.is_writable() => {
                    return self.reject_put(key, strict);
                }
                PropertySlot::Data(_) => {}
            }
        }

        if !self.object(o).extensible {
            return self.reject_put(key, strict);
        }
        self.add_property(o, key, PropertySlot::Data(value), PropertyAttributes::DEFAULT);
        Ok(())
    }

    fn call_setter(
        &mut self,
        setter: Option<ObjectRef>,
        receiver: ObjectRef,
        key: PropertyKey,
        value: Value,
        strict: bool,
    ) -> Result<()> {
        match setter {
            Some(s) => self.call(s, Value::Object(receiver), &[value]).map(|_| ()),
            None => self.reject_put(key, strict),
        }
    }

    pub(crate) fn reject_put(&mut self, key: PropertyKey, strict: bool) -> Result<()> {
        if strict {
            let msg = format!("Cannot assign to read only property '{}'", self.key_display(key));
            return self.throw_type_error(&msg);
        }
        Ok(())
    }

    /// Add a new own property, transitioning the object's class
    pub(crate) fn add_property(
        &mut self,
        o: ObjectRef,
        key: PropertyKey,
        slot: PropertySlot,
        attrs: PropertyAttributes,
    ) {
        let class = self.object(o).class;
        let next = self.classes.add_member(class, key, attrs);
        let object = self.object_mut(o);
        object.class = next;
        object.slots.push(slot);
    }

    /// Overwrite the storage of an existing own property
    pub(crate) fn write_slot(&mut self, o: ObjectRef, key: PropertyKey, slot: PropertySlot) {
        let class = self.object(o).class;
        if let Some(index) = self.classes.find(class, key) {
            self.object_mut(o).slots[index as usize] = slot;
        }
    }

    /// Create or replace an own data property without any checks
    ///
    /// Used while wiring built-ins and engine-created objects.
    pub fn define_data_property(
        &mut self,
        o: ObjectRef,
        key: PropertyKey,
        value: Value,
        attrs: PropertyAttributes,
    ) {
        self.force_property(o, key, PropertySlot::Data(value), attrs);
    }

    /// Create or replace an own accessor property without any checks
    pub fn define_accessor_property(
        &mut self,
        o: ObjectRef,
        key: PropertyKey,
        getter: Option<ObjectRef>,
        setter: Option<ObjectRef>,
        attrs: PropertyAttributes,
    ) {
        let attrs = attrs.with(PropertyAttributes::ACCESSOR);
        self.force_property(o, key, PropertySlot::Accessor { getter, setter }, attrs);
    }

    fn force_property(
        &mut self,
        o: ObjectRef,
        key: PropertyKey,
        slot: PropertySlot,
        attrs: PropertyAttributes,
    ) {
        let class = self.object(o).class;
        match self.classes.find(class, key) {
            Some(index) => {
                let next = self.classes.change_member(class, key, attrs);
                let object = self.object_mut(o);
                object.class = next;
                object.slots[index as usize] = slot;
            }
            None => self.add_property(o, key, slot, attrs),
        }
    }

    /// `[[Delete]]`; a non-configurable property fails, with TypeError when `strict`
    pub fn delete(&mut self, o: ObjectRef, key: PropertyKey, strict: bool) -> Result<bool> {
        let Some((_, attrs)) = self.get_own_property(o, key) else {
            return Ok(true);
        };
        if !attrs.is_configurable() {
            if strict {
                let msg = format!("Cannot delete property '{}'", self.key_display(key));
                return self.throw_type_error(&msg);
            }
            return Ok(false);
        }
        let object = &mut self.heap.objects[o.0];
        self.classes.remove_member(object, key);
        Ok(true)
    }

    /// `[[DefineOwnProperty]]`
    ///
    /// Arrays guard `length` and indices, arguments objects intercept mapped
    /// indices; everything else runs the generic algorithm.
    pub fn define_own_property(
        &mut self,
        o: ObjectRef,
        key: PropertyKey,
        desc: PropertyDescriptor,
        strict: bool,
    ) -> Result<bool> {
        match (&self.object(o).kind, key) {
            (ObjectKind::Array, _) => return self.define_array_property(o, key, desc, strict),
            (ObjectKind::Arguments(_), PropertyKey::Index(index)) => {
                if let Some(setter) = self.mapped_argument_setter(o, index) {
                    return self.define_mapped_argument(o, index, setter, desc, strict);
                }
            }
            _ => {}
        }
        self.define_own_property_ordinary(o, key, desc, strict)
    }

    /// ES5 8.12.9
    pub(crate) fn define_own_property_ordinary(
        &mut self,
        o: ObjectRef,
        key: PropertyKey,
        desc: PropertyDescriptor,
        strict: bool,
    ) -> Result<bool> {
        let Some((current, attrs)) = self.get_own_property(o, key) else {
            if !self.object(o).extensible {
                return self.reject_define(key, strict);
            }
            self.add_property(o, key, desc.to_slot(), desc.to_attributes());
            return Ok(true);
        };

        if self.descriptor_is_subset(&desc, current, attrs) {
            return Ok(true);
        }

        let configurable = attrs.is_configurable();
        if !configurable {
            if desc.configurable == Some(true) {
                return self.reject_define(key, strict);
            }
            if desc.enumerable.is_some_and(|e| e != attrs.is_enumerable()) {
                return self.reject_define(key, strict);
            }
        }

        let current_is_data = matches!(current, PropertySlot::Data(_));
        if !desc.is_generic() {
            if current_is_data != desc.is_data() {
                if !configurable {
                    return self.reject_define(key, strict);
                }
            } else if let PropertySlot::Data(value) = current {
                if !configurable && !attrs.is_writable() {
                    if desc.writable == Some(true) {
                        return self.reject_define(key, strict);
                    }
                    if let Some(v) = desc.value {
                        if !self.same_value(v, value) {
                            return self.reject_define(key, strict);
                        }
                    }
                }
            } else if let PropertySlot::Accessor { getter, setter } = current {
                if !configurable
                    && (desc.get.is_some_and(|g| g != getter) || desc.set.is_some_and(|s| s != setter))
                {
                    return self.reject_define(key, strict);
                }
            }
        }

        let enumerable = desc.enumerable.unwrap_or(attrs.is_enumerable());
        let configurable = desc.configurable.unwrap_or(configurable);
        let (slot, new_attrs) = if desc.is_generic() {
            let bits = PropertyAttributes::ENUMERABLE | PropertyAttributes::CONFIGURABLE;
            let mut next = attrs.without(bits);
            if enumerable {
                next = next.with(PropertyAttributes::ENUMERABLE);
            }
            if configurable {
                next = next.with(PropertyAttributes::CONFIGURABLE);
            }
            (current, next)
        } else if desc.is_accessor() {
            let (old_get, old_set) = match current {
                PropertySlot::Accessor { getter, setter } => (getter, setter),
                PropertySlot::Data(_) => (None, None),
            };
            let slot = PropertySlot::Accessor {
                getter: desc.get.unwrap_or(old_get),
                setter: desc.set.unwrap_or(old_set),
            };
            (slot, PropertyAttributes::accessor(enumerable, configurable))
        } else {
            let (old_value, old_writable) = match current {
                PropertySlot::Data(v) => (v, attrs.is_writable()),
                PropertySlot::Accessor { .. } => (Value::Undefined, false),
            };
            let slot = PropertySlot::Data(desc.value.unwrap_or(old_value));
            let writable = desc.writable.unwrap_or(old_writable);
            (slot, PropertyAttributes::data(writable, enumerable, configurable))
        };

        self.force_property(o, key, slot, new_attrs);
        Ok(true)
    }

    /// True when every field present in `desc` already matches the property
    fn descriptor_is_subset(
        &self,
        desc: &PropertyDescriptor,
        current: PropertySlot,
        attrs: PropertyAttributes,
    ) -> bool {
        if desc.enumerable.is_some_and(|e| e != attrs.is_enumerable())
            || desc.configurable.is_some_and(|c| c != attrs.is_configurable())
        {
            return false;
        }
        match current {
            PropertySlot::Data(v) => {
                desc.get.is_none()
                    && desc.set.is_none()
                    && desc.writable.is_none_or(|w| w == attrs.is_writable())
                    && desc.value.is_none_or(|d| self.same_value(d, v))
            }
            PropertySlot::Accessor { getter, setter } => {
                desc.value.is_none()
                    && desc.writable.is_none()
                    && desc.get.is_none_or(|g| g == getter)
                    && desc.set.is_none_or(|s| s == setter)
            }
        }
    }

    pub(crate) fn reject_define(&mut self, key: PropertyKey, strict: bool) -> Result<bool> {
        if strict {
            let msg = format!("Cannot redefine property: {}", self.key_display(key));
            return self.throw_type_error(&msg);
        }
        Ok(false)
    }

    /// Own keys: indices ascending, then names and symbols in creation order
    pub fn own_keys(&self, o: ObjectRef) -> Vec<PropertyKey> {
        let class = self.classes.get(self.object(o).class);
        let mut indices: Vec<u32> = class.keys().iter().filter_map(|k| k.as_index()).collect();
        indices.sort_unstable();
        let mut keys: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::Index).collect();
        keys.extend(class.keys().iter().filter(|k| matches!(k, PropertyKey::Name(_))));
        keys.extend(class.keys().iter().filter(|k| k.is_symbol()));
        keys
    }

    /// Own enumerable string-keyed properties, as `Object.keys` sees them
    pub fn own_enumerable_keys(&self, o: ObjectRef) -> Vec<PropertyKey> {
        self.own_keys(o)
            .into_iter()
            .filter(|k| !k.is_symbol())
            .filter(|k| {
                self.get_own_property(o, *k)
                    .is_some_and(|(_, attrs)| attrs.is_enumerable())
            })
            .collect()
    }

    pub fn get_prototype(&self, o: ObjectRef) -> Option<ObjectRef> {
        self.object(o).prototype
    }

    pub fn set_prototype(&mut self, o: ObjectRef, prototype: Option<ObjectRef>) {
        self.object_mut(o).prototype = prototype;
    }

    pub fn is_extensible(&self, o: ObjectRef) -> bool {
        self.object(o).extensible
    }

    pub fn prevent_extensions(&mut self, o: ObjectRef) {
        self.object_mut(o).extensible = false;
    }

    /// `Object.seal`: shared sealed class plus non-extensible
    pub fn seal(&mut self, o: ObjectRef) {
        let class = self.object(o).class;
        let sealed = self.classes.sealed(class);
        let object = self.object_mut(o);
        object.class = sealed;
        object.extensible = false;
    }

    /// `Object.freeze`: shared frozen class plus non-extensible
    pub fn freeze(&mut self, o: ObjectRef) {
        let class = self.object(o).class;
        let frozen = self.classes.frozen(class);
        let object = self.object_mut(o);
        object.class = frozen;
        object.extensible = false;
    }

    pub fn is_sealed(&self, o: ObjectRef) -> bool {
        let object = self.object(o);
        !object.extensible && self.classes.is_sealed(object.class)
    }

    pub fn is_frozen(&self, o: ObjectRef) -> bool {
        let object = self.object(o);
        !object.extensible && self.classes.is_frozen(object.class)
    }

    /// ToObject
    pub fn to_object(&mut self, value: Value) -> Result<ObjectRef> {
        let (proto, kind) = match value {
            Value::Object(o) => return Ok(o),
            Value::Undefined | Value::Null => {
                return self.throw_type_error("Cannot convert undefined or null to object");
            }
            Value::Boolean(b) => (self.intrinsics.boolean_prototype, ObjectKind::BooleanWrapper(b)),
            Value::Integer(i) => (self.intrinsics.number_prototype, ObjectKind::NumberWrapper(i as f64)),
            Value::Double(d) => (self.intrinsics.number_prototype, ObjectKind::NumberWrapper(d)),
            Value::String(s) => (self.intrinsics.string_prototype, ObjectKind::StringWrapper(s)),
            Value::Symbol(s) => (self.intrinsics.symbol_prototype, ObjectKind::SymbolWrapper(s)),
        };
        let o = self.alloc_object(Some(proto), kind);
        if let Value::String(s) = value {
            let length = Value::from_u32(self.string_length(s) as u32);
            let key = PropertyKey::Name(self.names.length);
            self.define_data_property(o, key, length, PropertyAttributes::FROZEN);
        }
        Ok(o)
    }

    /// Object and kind of a function object, `None` for anything else
    pub fn function_kind(&self, value: Value) -> Option<&FunctionKind> {
        match &self.object(value.as_object()?).kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }
}
