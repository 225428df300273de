//! Property keys, attributes and descriptors

use crate::runtime::identifier::Identifier;
use crate::value::{ObjectRef, SymbolRef, Value};

/// Key of an own property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    Name(Identifier),
    /// Canonical array index (`"0"` .. `"4294967294"`)
    Index(u32),
    Symbol(SymbolRef),
}

impl PropertyKey {
    #[inline]
    pub const fn as_index(self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(i),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_symbol(self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }
}

impl From<Identifier> for PropertyKey {
    fn from(id: Identifier) -> Self {
        PropertyKey::Name(id)
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        PropertyKey::Index(index)
    }
}

impl From<SymbolRef> for PropertyKey {
    fn from(symbol: SymbolRef) -> Self {
        PropertyKey::Symbol(symbol)
    }
}

/// Packed property attributes
///
/// The bit layout is part of internal-class transition keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyAttributes(u8);

impl PropertyAttributes {
    pub const WRITABLE: u8 = 1 << 0;
    pub const ENUMERABLE: u8 = 1 << 1;
    pub const CONFIGURABLE: u8 = 1 << 2;
    pub const ACCESSOR: u8 = 1 << 3;

    /// Writable, enumerable, configurable data property
    pub const DEFAULT: PropertyAttributes =
        PropertyAttributes(Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE);

    /// Writable, configurable, not enumerable (built-in methods)
    pub const HIDDEN: PropertyAttributes =
        PropertyAttributes(Self::WRITABLE | Self::CONFIGURABLE);

    /// Nothing set: read-only, hidden, permanent data property
    pub const FROZEN: PropertyAttributes = PropertyAttributes(0);

    #[inline]
    pub const fn data(writable: bool, enumerable: bool, configurable: bool) -> Self {
        let mut bits = 0;
        if writable {
            bits |= Self::WRITABLE;
        }
        if enumerable {
            bits |= Self::ENUMERABLE;
        }
        if configurable {
            bits |= Self::CONFIGURABLE;
        }
        PropertyAttributes(bits)
    }

    #[inline]
    pub const fn accessor(enumerable: bool, configurable: bool) -> Self {
        let data = Self::data(false, enumerable, configurable);
        PropertyAttributes(data.0 | Self::ACCESSOR)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_writable(self) -> bool {
        self.0 & Self::WRITABLE != 0
    }

    #[inline]
    pub const fn is_enumerable(self) -> bool {
        self.0 & Self::ENUMERABLE != 0
    }

    #[inline]
    pub const fn is_configurable(self) -> bool {
        self.0 & Self::CONFIGURABLE != 0
    }

    #[inline]
    pub const fn is_accessor(self) -> bool {
        self.0 & Self::ACCESSOR != 0
    }

    #[inline]
    pub const fn is_data(self) -> bool {
        !self.is_accessor()
    }

    #[inline]
    pub const fn without(self, bits: u8) -> Self {
        PropertyAttributes(self.0 & !bits)
    }

    #[inline]
    pub const fn with(self, bits: u8) -> Self {
        PropertyAttributes(self.0 | bits)
    }

    /// Attributes used by `sealed()`: configurability stripped
    #[inline]
    pub const fn sealed(self) -> Self {
        self.without(Self::CONFIGURABLE)
    }

    /// Attributes used by `frozen()`: configurability and writability stripped
    #[inline]
    pub const fn frozen(self) -> Self {
        self.without(Self::CONFIGURABLE | Self::WRITABLE)
    }
}

impl std::fmt::Debug for PropertyAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            flag(self.is_accessor(), 'a'),
            flag(self.is_writable(), 'w'),
            flag(self.is_enumerable(), 'e'),
            flag(self.is_configurable(), 'c'),
        )
    }
}

/// Per-object storage cell of one property
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertySlot {
    Data(Value),
    Accessor {
        getter: Option<ObjectRef>,
        setter: Option<ObjectRef>,
    },
}

impl PropertySlot {
    #[inline]
    pub fn value(&self) -> Option<Value> {
        match *self {
            PropertySlot::Data(v) => Some(v),
            PropertySlot::Accessor { .. } => None,
        }
    }
}

/// ES5 property descriptor; absent fields are `None`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    /// `Some(None)` is an explicit `get: undefined`
    pub get: Option<Option<ObjectRef>>,
    pub set: Option<Option<ObjectRef>>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// Fully populated data descriptor
    pub fn data(value: Value, attributes: PropertyAttributes) -> Self {
        PropertyDescriptor {
            value: Some(value),
            writable: Some(attributes.is_writable()),
            enumerable: Some(attributes.is_enumerable()),
            configurable: Some(attributes.is_configurable()),
            ..Default::default()
        }
    }

    /// Fully populated accessor descriptor
    pub fn accessor(
        getter: Option<ObjectRef>,
        setter: Option<ObjectRef>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        PropertyDescriptor {
            get: Some(getter),
            set: Some(setter),
            enumerable: Some(enumerable),
            configurable: Some(configurable),
            ..Default::default()
        }
    }

    /// Descriptor describing an existing property
    pub fn from_slot(slot: PropertySlot, attributes: PropertyAttributes) -> Self {
        match slot {
            PropertySlot::Data(v) => Self::data(v, attributes),
            PropertySlot::Accessor { getter, setter } => Self::accessor(
                getter,
                setter,
                attributes.is_enumerable(),
                attributes.is_configurable(),
            ),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    pub fn with_enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    pub fn with_configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }

    #[inline]
    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    #[inline]
    pub fn is_generic(&self) -> bool {
        !self.is_accessor() && !self.is_data()
    }

    /// Attributes for a new property, absent fields defaulting to false
    pub fn to_attributes(&self) -> PropertyAttributes {
        if self.is_accessor() {
            PropertyAttributes::accessor(
                self.enumerable.unwrap_or(false),
                self.configurable.unwrap_or(false),
            )
        } else {
            PropertyAttributes::data(
                self.writable.unwrap_or(false),
                self.enumerable.unwrap_or(false),
                self.configurable.unwrap_or(false),
            )
        }
    }

    /// Slot for a new property, absent fields defaulting to undefined
    pub fn to_slot(&self) -> PropertySlot {
        if self.is_accessor() {
            PropertySlot::Accessor {
                getter: self.get.flatten(),
                setter: self.set.flatten(),
            }
        } else {
            PropertySlot::Data(self.value.unwrap_or(Value::Undefined))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_bits() {
        let attrs = PropertyAttributes::data(true, false, true);
        assert!(attrs.is_writable());
        assert!(!attrs.is_enumerable());
        assert!(attrs.is_configurable());
        assert!(attrs.is_data());
        assert_eq!(attrs.bits(), 0b101);
        assert_eq!(format!("{:?}", attrs), "-w-c");
    }

    #[test]
    fn test_sealed_and_frozen_attributes() {
        let attrs = PropertyAttributes::DEFAULT;
        assert!(!attrs.sealed().is_configurable());
        assert!(attrs.sealed().is_writable());
        assert!(!attrs.frozen().is_writable());
        assert!(attrs.frozen().is_enumerable());
    }

    #[test]
    fn test_descriptor_kinds() {
        let generic = PropertyDescriptor::default().with_enumerable(true);
        assert!(generic.is_generic());
        let data = PropertyDescriptor::default().with_value(Value::Integer(1));
        assert!(data.is_data());
        assert_eq!(data.to_attributes(), PropertyAttributes::FROZEN);
        let accessor = PropertyDescriptor::accessor(None, None, true, false);
        assert!(accessor.is_accessor());
        assert!(accessor.to_attributes().is_accessor());
        assert_eq!(
            accessor.to_slot(),
            PropertySlot::Accessor {
                getter: None,
                setter: None
            }
        );
    }
}
