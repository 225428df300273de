//! Symbols
//!
//! A symbol is an atom compared by identity. `Symbol.for` goes through the
//! engine's registry, keyed by the interned description, so the same key
//! always yields the same symbol.

use std::rc::Rc;

use crate::engine::Engine;
use crate::value::{StringRef, SymbolRef};

/// A heap symbol
#[derive(Debug, Clone)]
pub struct Symbol {
    description: Option<Rc<str>>,
    registered: bool,
}

impl Symbol {
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Created through `Symbol.for`
    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

impl Engine {
    /// Create a fresh, unregistered symbol
    pub fn new_symbol(&mut self, description: Option<&str>) -> SymbolRef {
        SymbolRef(self.heap.symbols.alloc(Symbol {
            description: description.map(Rc::from),
            registered: false,
        }))
    }

    /// `Symbol.for(key)`: the registry symbol for `key`, created on first use
    pub fn symbol_for(&mut self, key: &str) -> SymbolRef {
        let id = self.identifiers.intern(key);
        if let Some(&symbol) = self.symbol_registry.get(&id) {
            return symbol;
        }
        let symbol = SymbolRef(self.heap.symbols.alloc(Symbol {
            description: Some(self.identifiers.name_rc(id)),
            registered: true,
        }));
        self.symbol_registry.insert(id, symbol);
        symbol
    }

    /// `Symbol.keyFor(symbol)`: the registry key, `None` for unregistered symbols
    pub fn key_for(&mut self, symbol: SymbolRef) -> Option<StringRef> {
        let sym = &self.heap.symbols[symbol.0];
        if !sym.registered {
            return None;
        }
        let key = sym.description.clone().unwrap_or_else(|| Rc::from(""));
        Some(self.new_string(&key))
    }

    pub fn symbol(&self, symbol: SymbolRef) -> &Symbol {
        &self.heap.symbols[symbol.0]
    }

    /// `Symbol(desc)` as used by `Symbol.prototype.toString`
    pub fn symbol_descriptive_string(&self, symbol: SymbolRef) -> String {
        format!("Symbol({})", self.symbol(symbol).description().unwrap_or(""))
    }
}
