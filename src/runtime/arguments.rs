//! Arguments objects
//!
//! Strict calls get a snapshot of the actual arguments and poisoned
//! `callee`/`caller`. Non-strict calls map the first `min(formals, argc)`
//! indices to accessor pairs that read and write the context's argument
//! slots, so the named parameter and `arguments[i]` alias each other.

use crate::engine::Engine;
use crate::error::Result;
use crate::gc::{Trace, Tracer};
use crate::runtime::function::FunctionKind;
use crate::runtime::object::ObjectKind;
use crate::runtime::property::{PropertyAttributes, PropertyDescriptor, PropertyKey, PropertySlot};
use crate::value::{ObjectRef, Value};
use crate::vm::context::ContextRef;

/// Payload of an arguments object
#[derive(Debug, Clone, Copy)]
pub struct ArgumentsData {
    pub(crate) context: ContextRef,
    pub(crate) strict: bool,
}

impl ArgumentsData {
    pub fn context(&self) -> ContextRef {
        self.context
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl Trace for ArgumentsData {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_context(self.context);
    }
}

impl Engine {
    /// Materialize the arguments object of a call context
    pub fn new_arguments_object(&mut self, ctx: ContextRef) -> ObjectRef {
        let (argc, formals, strict, function) = {
            let c = self.context(ctx);
            let formals = c.code.as_ref().map_or(0, |code| code.formal_count());
            (c.argument_count, formals, c.strict, c.function)
        };
        let proto = self.intrinsics.object_prototype;
        let o = self.alloc_object(Some(proto), ObjectKind::Arguments(ArgumentsData { context: ctx, strict }));
        let names = self.names;
        self.define_data_property(
            o,
            names.length.into(),
            Value::from_u32(argc as u32),
            PropertyAttributes::HIDDEN,
        );

        if strict {
            for i in 0..argc {
                let v = self.argument(ctx, i);
                self.define_data_property(o, PropertyKey::Index(i as u32), v, PropertyAttributes::DEFAULT);
            }
            let thrower = Some(self.intrinsics.thrower);
            let poisoned = PropertyAttributes::accessor(false, false);
            self.define_accessor_property(o, names.callee.into(), thrower, thrower, poisoned);
            self.define_accessor_property(o, names.caller.into(), thrower, thrower, poisoned);
            return o;
        }

        let mapped = formals.min(argc);
        if mapped > 0 {
            // the accessors outlive the call, so the slots must too
            self.promote_context_storage(ctx);
        }
        for i in 0..mapped {
            let index = i as u32;
            let getter = self.alloc_function(FunctionKind::ArgumentGetter { context: ctx, index });
            let setter = self.alloc_function(FunctionKind::ArgumentSetter { context: ctx, index });
            self.define_accessor_property(
                o,
                PropertyKey::Index(index),
                Some(getter),
                Some(setter),
                PropertyAttributes::accessor(true, true),
            );
        }
        for i in mapped..argc {
            let v = self.argument(ctx, i);
            self.define_data_property(o, PropertyKey::Index(i as u32), v, PropertyAttributes::DEFAULT);
        }
        if let Some(f) = function {
            self.define_data_property(o, names.callee.into(), Value::Object(f), PropertyAttributes::HIDDEN);
        }
        o
    }

    /// Setter of a still-mapped index, `None` once the mapping is gone
    pub(crate) fn mapped_argument_setter(&self, o: ObjectRef, index: u32) -> Option<ObjectRef> {
        let (slot, _) = self.get_own_property(o, PropertyKey::Index(index))?;
        let PropertySlot::Accessor {
            getter: Some(getter),
            setter,
        } = slot
        else {
            return None;
        };
        match self.function_kind(Value::Object(getter)) {
            Some(FunctionKind::ArgumentGetter { .. }) => setter,
            _ => None,
        }
    }

    /// `[[DefineOwnProperty]]` on a mapped index
    ///
    /// The accessor is swapped for a data snapshot and the generic algorithm
    /// runs non-strictly. A rejected define puts the mapping back untouched.
    /// Otherwise a defined value is pushed back through the setter and the
    /// mapping restored unless `writable: false` was given or the property
    /// became an accessor.
    pub(crate) fn define_mapped_argument(
        &mut self,
        o: ObjectRef,
        index: u32,
        setter: ObjectRef,
        desc: PropertyDescriptor,
        strict: bool,
    ) -> Result<bool> {
        let key = PropertyKey::Index(index);
        let Some((map, attrs)) = self.get_own_property(o, key) else {
            return self.define_own_property_ordinary(o, key, desc, strict);
        };
        let snapshot = match self.object(o).kind {
            ObjectKind::Arguments(data) => self.argument(data.context, index as usize),
            _ => Value::Undefined,
        };
        let data_attrs = PropertyAttributes::data(true, attrs.is_enumerable(), attrs.is_configurable());
        self.define_data_property(o, key, snapshot, data_attrs);

        if !self.define_own_property_ordinary(o, key, desc, false)? {
            // rejected: the mapping stays as it was
            self.force_slot(o, key, map, attrs);
            if strict {
                let msg = format!("Cannot redefine property: {index}");
                return self.throw_type_error(&msg);
            }
            return Ok(false);
        }

        if !desc.is_accessor() {
            if let Some(v) = desc.value {
                self.call(setter, Value::Object(o), &[v])?;
            }
            if desc.writable != Some(false) {
                if let Some((_, now)) = self.get_own_property(o, key) {
                    let restored = PropertyAttributes::accessor(now.is_enumerable(), now.is_configurable());
                    self.force_slot(o, key, map, restored);
                }
            }
        }

        Ok(true)
    }

    fn force_slot(&mut self, o: ObjectRef, key: PropertyKey, slot: PropertySlot, attrs: PropertyAttributes) {
        match slot {
            PropertySlot::Data(v) => self.define_data_property(o, key, v, attrs),
            PropertySlot::Accessor { getter, setter } => {
                self.define_accessor_property(o, key, getter, setter, attrs)
            }
        }
    }
}
