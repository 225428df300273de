//! Internal classes (hidden classes)
//!
//! An internal class describes the shape of a family of objects: the ordered
//! property keys, the slot each key lives in and the attributes of each
//! property. Classes are immutable once created. Every mutation goes through
//! a transition that is memoized in the pool, so two objects that went
//! through the same add/change/remove history from the empty class share the
//! same `ClassId`.
//!
//! Classes live in an arena owned by the engine; transitions are a hash map
//! from `(base, TransitionKey)` to the successor. Nothing is ever freed, the
//! transition table keeps every class reachable.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::gc::Tracer;
use crate::runtime::object::Object;
use crate::runtime::property::{PropertyAttributes, PropertyKey};

/// Handle to an internal class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

impl ClassId {
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Key of a memoized transition
///
/// `Remove` keeps removals from colliding with additions of the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKey {
    Add(PropertyKey, PropertyAttributes),
    Change(PropertyKey, PropertyAttributes),
    Remove(PropertyKey),
}

/// Shape of a family of objects
#[derive(Debug, Clone, Default)]
pub struct InternalClass {
    keys: Vec<PropertyKey>,
    attributes: Vec<PropertyAttributes>,
    index: FxHashMap<PropertyKey, u32>,
    sealed: Option<ClassId>,
    frozen: Option<ClassId>,
}

impl InternalClass {
    /// Number of properties (and slots)
    #[inline]
    pub fn size(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn find(&self, key: PropertyKey) -> Option<u32> {
        self.index.get(&key).copied()
    }

    #[inline]
    pub fn key(&self, slot: u32) -> PropertyKey {
        self.keys[slot as usize]
    }

    #[inline]
    pub fn attributes(&self, slot: u32) -> PropertyAttributes {
        self.attributes[slot as usize]
    }

    /// Keys in slot order
    pub fn keys(&self) -> &[PropertyKey] {
        &self.keys
    }

    fn with_added(&self, key: PropertyKey, attrs: PropertyAttributes) -> InternalClass {
        let mut next = InternalClass {
            keys: self.keys.clone(),
            attributes: self.attributes.clone(),
            index: self.index.clone(),
            sealed: None,
            frozen: None,
        };
        next.index.insert(key, next.keys.len() as u32);
        next.keys.push(key);
        next.attributes.push(attrs);
        next
    }
}

/// Arena of internal classes plus the transition table
#[derive(Debug)]
pub struct InternalClassPool {
    classes: Vec<InternalClass>,
    transitions: FxHashMap<(ClassId, TransitionKey), ClassId>,
    empty: ClassId,
}

impl Default for InternalClassPool {
    fn default() -> Self {
        InternalClassPool::new()
    }
}

impl InternalClassPool {
    pub fn new() -> Self {
        InternalClassPool {
            classes: vec![InternalClass::default()],
            transitions: FxHashMap::default(),
            empty: ClassId(0),
        }
    }

    /// The canonical empty class
    #[inline]
    pub fn empty(&self) -> ClassId {
        self.empty
    }

    #[inline]
    pub fn get(&self, id: ClassId) -> &InternalClass {
        &self.classes[id.0 as usize]
    }

    /// Number of classes created so far
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    #[inline]
    pub fn find(&self, id: ClassId, key: PropertyKey) -> Option<u32> {
        self.get(id).find(key)
    }

    fn push(&mut self, class: InternalClass) -> ClassId {
        let Ok(index) = u32::try_from(self.classes.len()) else {
            panic!("internal class handle space exhausted");
        };
        trace!(class = index, size = class.size(), "new internal class");
        self.classes.push(class);
        ClassId(index)
    }

    /// Class resulting from adding `key` with `attrs`; the property takes slot `size`
    pub fn add_member(
        &mut self,
        id: ClassId,
        key: PropertyKey,
        attrs: PropertyAttributes,
    ) -> ClassId {
        let transition = (id, TransitionKey::Add(key, attrs));
        if let Some(&next) = self.transitions.get(&transition) {
            return next;
        }
        debug_assert!(self.find(id, key).is_none(), "key already present");
        let class = self.get(id).with_added(key, attrs);
        let next = self.push(class);
        self.transitions.insert(transition, next);
        next
    }

    /// Class resulting from changing the attributes of an existing property
    pub fn change_member(
        &mut self,
        id: ClassId,
        key: PropertyKey,
        attrs: PropertyAttributes,
    ) -> ClassId {
        let Some(slot) = self.find(id, key) else {
            panic!("change_member on a missing property");
        };
        if self.get(id).attributes(slot) == attrs {
            return id;
        }
        let transition = (id, TransitionKey::Change(key, attrs));
        if let Some(&next) = self.transitions.get(&transition) {
            return next;
        }
        let mut class = self.get(id).clone();
        class.attributes[slot as usize] = attrs;
        class.sealed = None;
        class.frozen = None;
        let next = self.push(class);
        self.transitions.insert(transition, next);
        next
    }

    /// Remove `key` from `object`, updating its class and its slot storage
    ///
    /// Uses the memoized removal when there is one, otherwise rebuilds the
    /// chain from the empty class by replaying every other property.
    pub fn remove_member(&mut self, object: &mut Object, key: PropertyKey) {
        let base = object.class;
        let Some(slot) = self.find(base, key) else {
            return;
        };
        object.slots.remove(slot as usize);

        let transition = (base, TransitionKey::Remove(key));
        if let Some(&next) = self.transitions.get(&transition) {
            object.class = next;
            return;
        }

        debug!(size = self.get(base).size(), "rebuilding internal class after removal");
        let mut next = self.empty;
        let size = self.get(base).size() as u32;
        for i in 0..size {
            if i == slot {
                continue;
            }
            let class = self.get(base);
            let (k, attrs) = (class.key(i), class.attributes(i));
            next = self.add_member(next, k, attrs);
        }
        self.transitions.insert(transition, next);
        object.class = next;
    }

    /// Class with every property made non-configurable
    ///
    /// Cached on `id`; the result is its own sealed class.
    pub fn sealed(&mut self, id: ClassId) -> ClassId {
        if let Some(sealed) = self.get(id).sealed {
            return sealed;
        }
        let result = self.rebuild(id, PropertyAttributes::sealed);
        self.classes[id.0 as usize].sealed = Some(result);
        self.classes[result.0 as usize].sealed = Some(result);
        result
    }

    /// Class with every property made non-configurable and read-only
    ///
    /// Cached on `id`; the result is its own frozen (and sealed) class.
    pub fn frozen(&mut self, id: ClassId) -> ClassId {
        if let Some(frozen) = self.get(id).frozen {
            return frozen;
        }
        let result = self.rebuild(id, |attrs| {
            if attrs.is_accessor() {
                attrs.sealed()
            } else {
                attrs.frozen()
            }
        });
        self.classes[id.0 as usize].frozen = Some(result);
        let derived = &mut self.classes[result.0 as usize];
        derived.frozen = Some(result);
        derived.sealed = Some(result);
        result
    }

    fn rebuild(&mut self, id: ClassId, map: impl Fn(PropertyAttributes) -> PropertyAttributes) -> ClassId {
        let mut next = self.empty;
        for i in 0..self.get(id).size() as u32 {
            let class = self.get(id);
            let (key, attrs) = (class.key(i), map(class.attributes(i)));
            next = self.add_member(next, key, attrs);
        }
        next
    }

    /// True when no property is configurable
    pub fn is_sealed(&self, id: ClassId) -> bool {
        self.get(id).attributes.iter().all(|a| !a.is_configurable())
    }

    /// True when no property is configurable and no data property is writable
    pub fn is_frozen(&self, id: ClassId) -> bool {
        self.get(id)
            .attributes
            .iter()
            .all(|a| !a.is_configurable() && (a.is_accessor() || !a.is_writable()))
    }

    /// Report symbol keys so registered symbols used as keys stay alive
    pub(crate) fn trace(&self, tracer: &mut Tracer) {
        for class in &self.classes {
            for key in &class.keys {
                if let PropertyKey::Symbol(s) = key {
                    tracer.mark_symbol(*s);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::identifier::IdentifierTable;
    use crate::runtime::object::{Object, ObjectKind};
    use crate::value::Value;
    use crate::runtime::property::PropertySlot;

    fn keys(names: &[&str]) -> Vec<PropertyKey> {
        let mut table = IdentifierTable::new();
        names.iter().map(|n| PropertyKey::Name(table.intern(n))).collect()
    }

    #[test]
    fn test_shape_sharing() {
        let mut pool = InternalClassPool::new();
        let k = keys(&["a", "b", "c"]);
        let build = |pool: &mut InternalClassPool| {
            let mut c = pool.empty();
            for key in &k {
                c = pool.add_member(c, *key, PropertyAttributes::DEFAULT);
            }
            c
        };
        let first = build(&mut pool);
        let count = pool.len();
        let second = build(&mut pool);
        assert_eq!(first, second);
        assert_eq!(pool.len(), count);
        assert_eq!(pool.find(first, k[2]), Some(2));
        assert_eq!(pool.find(first, PropertyKey::Index(7)), None);
    }

    #[test]
    fn test_attributes_distinguish_transitions() {
        let mut pool = InternalClassPool::new();
        let k = keys(&["x"]);
        let e = pool.empty();
        let a = pool.add_member(e, k[0], PropertyAttributes::DEFAULT);
        let b = pool.add_member(e, k[0], PropertyAttributes::HIDDEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_change_member() {
        let mut pool = InternalClassPool::new();
        let k = keys(&["x", "y"]);
        let mut c = pool.empty();
        c = pool.add_member(c, k[0], PropertyAttributes::DEFAULT);
        c = pool.add_member(c, k[1], PropertyAttributes::DEFAULT);
        assert_eq!(pool.change_member(c, k[1], PropertyAttributes::DEFAULT), c);
        let changed = pool.change_member(c, k[1], PropertyAttributes::FROZEN);
        assert_ne!(changed, c);
        assert_eq!(pool.find(changed, k[1]), Some(1));
        assert_eq!(pool.get(changed).attributes(1), PropertyAttributes::FROZEN);
        assert_eq!(pool.change_member(c, k[1], PropertyAttributes::FROZEN), changed);
    }

    #[test]
    fn test_remove_member_rebuilds_then_memoizes() {
        let mut pool = InternalClassPool::new();
        let k = keys(&["a", "b", "c"]);
        let mut c = pool.empty();
        for key in &k {
            c = pool.add_member(c, *key, PropertyAttributes::DEFAULT);
        }
        let mut object = Object::new(c, None, ObjectKind::Ordinary);
        object.slots = vec![
            PropertySlot::Data(Value::Integer(1)),
            PropertySlot::Data(Value::Integer(2)),
            PropertySlot::Data(Value::Integer(3)),
        ];
        pool.remove_member(&mut object, k[1]);

        // same shape as adding a then c from scratch
        let mut expected = pool.empty();
        expected = pool.add_member(expected, k[0], PropertyAttributes::DEFAULT);
        expected = pool.add_member(expected, k[2], PropertyAttributes::DEFAULT);
        assert_eq!(object.class, expected);
        assert_eq!(object.slots[1], PropertySlot::Data(Value::Integer(3)));

        let mut other = Object::new(c, None, ObjectKind::Ordinary);
        other.slots = vec![PropertySlot::Data(Value::Undefined); 3];
        let before = pool.len();
        pool.remove_member(&mut other, k[1]);
        assert_eq!(other.class, expected);
        assert_eq!(pool.len(), before);
    }

    #[test]
    fn test_sealed_frozen_fixpoints() {
        let mut pool = InternalClassPool::new();
        let k = keys(&["a", "b"]);
        let mut c = pool.empty();
        for key in &k {
            c = pool.add_member(c, *key, PropertyAttributes::DEFAULT);
        }
        let sealed = pool.sealed(c);
        assert_eq!(pool.sealed(sealed), sealed);
        assert_eq!(pool.sealed(c), sealed);
        assert!(pool.is_sealed(sealed));
        assert!(!pool.is_frozen(sealed));

        let frozen = pool.frozen(c);
        assert_eq!(pool.frozen(frozen), frozen);
        assert!(pool.is_frozen(frozen));
        assert_eq!(pool.find(frozen, k[1]), Some(1));

        let empty = pool.empty();
        assert_eq!(pool.sealed(empty), empty);
    }
}
