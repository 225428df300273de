//! Interned identifiers
//!
//! Property names are interned once per engine so that internal-class
//! lookups and transition keys compare a `u32` instead of string content.

use std::rc::Rc;

use rustc_hash::FxHashMap;

/// An interned name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(u32);

impl Identifier {
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Engine-scoped identifier table
#[derive(Debug, Default)]
pub struct IdentifierTable {
    names: Vec<Rc<str>>,
    map: FxHashMap<Rc<str>, Identifier>,
}

impl IdentifierTable {
    pub fn new() -> Self {
        IdentifierTable::default()
    }

    /// Intern a name, returning the existing identifier when already known
    pub fn intern(&mut self, name: &str) -> Identifier {
        if let Some(&id) = self.map.get(name) {
            return id;
        }
        let id = Identifier(u32::try_from(self.names.len()).expect("identifier table exhausted"));
        let name: Rc<str> = Rc::from(name);
        self.names.push(name.clone());
        self.map.insert(name, id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<Identifier> {
        self.map.get(name).copied()
    }

    pub fn name(&self, id: Identifier) -> &str {
        &self.names[id.0 as usize]
    }

    /// Shared handle to the name (cheap to clone)
    pub fn name_rc(&self, id: Identifier) -> Rc<str> {
        self.names[id.0 as usize].clone()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

macro_rules! well_known_names {
    ($($field:ident => $text:literal),* $(,)?) => {
        /// Identifiers the runtime refers to directly, interned at engine start
        #[derive(Debug, Clone, Copy)]
        pub struct WellKnownNames {
            $(pub $field: Identifier,)*
        }

        impl WellKnownNames {
            pub fn intern(table: &mut IdentifierTable) -> Self {
                WellKnownNames {
                    $($field: table.intern($text),)*
                }
            }
        }
    };
}

well_known_names! {
    length => "length",
    prototype => "prototype",
    constructor => "constructor",
    callee => "callee",
    caller => "caller",
    arguments => "arguments",
    this => "this",
    to_string => "toString",
    value_of => "valueOf",
    message => "message",
    name => "name",
    value => "value",
    get => "get",
    set => "set",
    writable => "writable",
    enumerable => "enumerable",
    configurable => "configurable",
    undefined => "undefined",
    nan => "NaN",
    infinity => "Infinity",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut table = IdentifierTable::new();
        let a = table.intern("foo");
        let b = table.intern("bar");
        assert_ne!(a, b);
        assert_eq!(table.intern("foo"), a);
        assert_eq!(table.name(b), "bar");
        assert_eq!(table.lookup("foo"), Some(a));
        assert_eq!(table.lookup("baz"), None);
    }

    #[test]
    fn test_well_known_names() {
        let mut table = IdentifierTable::new();
        let names = WellKnownNames::intern(&mut table);
        assert_eq!(table.name(names.prototype), "prototype");
        assert_eq!(table.lookup("callee"), Some(names.callee));
    }

    #[test]
    fn test_tables_are_independent() {
        let mut first = IdentifierTable::new();
        let mut second = IdentifierTable::new();
        first.intern("only-here");
        let id = second.intern("x");
        assert_eq!(second.len(), 1);
        assert_eq!(first.lookup("x"), None);
        assert_eq!(second.name(id), "x");
    }
}
