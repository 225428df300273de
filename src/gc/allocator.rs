//! Slot arenas backing the managed heap
//!
//! Every heap kind (objects, strings, symbols, contexts) lives in its own
//! `Arena`. A handle is the slot index; freed slots go onto a free list and
//! are reused by later allocations. Each slot carries the mark bit used by
//! the collector.

use std::ops::{Index, IndexMut};

use crate::runtime::object::Object;
use crate::runtime::string::JsString;
use crate::runtime::symbol::Symbol;
use crate::vm::context::ExecutionContext;

/// One arena slot
#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    marked: bool,
}

/// Growable slot arena with a free list
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena::new()
    }
}

impl<T> Arena<T> {
    pub const fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store a value, reusing a freed slot when one is available
    pub fn alloc(&mut self, value: T) -> u32 {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.marked = false;
            return index;
        }
        let index = u32::try_from(self.slots.len()).expect("heap arena exhausted");
        self.slots.push(Slot {
            value: Some(value),
            marked: false,
        });
        index
    }

    /// Release a slot immediately (used for contexts that never escaped)
    pub fn free(&mut self, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let value = slot.value.take()?;
        slot.marked = false;
        self.free.push(index);
        self.live -= 1;
        Some(value)
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize)?.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.value.as_mut()
    }

    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Number of live values
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Set the mark bit; returns true if the slot was not marked before
    pub fn mark(&mut self, index: u32) -> bool {
        match self.slots.get_mut(index as usize) {
            Some(slot) if slot.value.is_some() && !slot.marked => {
                slot.marked = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_marked(&self, index: u32) -> bool {
        self.slots
            .get(index as usize)
            .is_some_and(|slot| slot.marked)
    }

    /// Free every unmarked live slot and clear the marks of the survivors
    ///
    /// Returns the number of freed values.
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                slot.value = None;
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }

    /// Iterate over live values with their handles
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_ref().map(|v| (i as u32, v)))
    }
}

impl<T> Index<u32> for Arena<T> {
    type Output = T;

    fn index(&self, index: u32) -> &T {
        match self.get(index) {
            Some(v) => v,
            None => panic!("dangling heap handle {index}"),
        }
    }
}

impl<T> IndexMut<u32> for Arena<T> {
    fn index_mut(&mut self, index: u32) -> &mut T {
        match self.get_mut(index) {
            Some(v) => v,
            None => panic!("dangling heap handle {index}"),
        }
    }
}

/// The managed heap: one arena per heap kind
#[derive(Debug, Default)]
pub struct Heap {
    pub objects: Arena<Object>,
    pub strings: Arena<JsString>,
    pub symbols: Arena<Symbol>,
    pub contexts: Arena<ExecutionContext>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    /// Total number of live heap values
    pub fn live_count(&self) -> usize {
        self.objects.len() + self.strings.len() + self.symbols.len() + self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_index() {
        let mut arena = Arena::new();
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_eq!(arena[a], "a");
        assert_eq!(arena[b], "b");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_free_list_reuse() {
        let mut arena = Arena::new();
        let a = arena.alloc(1);
        let _b = arena.alloc(2);
        assert_eq!(arena.free(a), Some(1));
        assert!(!arena.contains(a));
        let c = arena.alloc(3);
        assert_eq!(c, a);
        assert_eq!(arena[c], 3);
        assert_eq!(arena.free(99), None);
    }

    #[test]
    fn test_mark_and_sweep() {
        let mut arena = Arena::new();
        let keep = arena.alloc(1);
        let drop = arena.alloc(2);
        assert!(arena.mark(keep));
        assert!(!arena.mark(keep));
        assert_eq!(arena.sweep(), 1);
        assert!(arena.contains(keep));
        assert!(!arena.contains(drop));
        assert!(!arena.is_marked(keep));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    #[should_panic(expected = "dangling heap handle")]
    fn test_dangling_index_panics() {
        let mut arena = Arena::new();
        let a = arena.alloc(1);
        arena.free(a);
        let _ = arena[a];
    }
}
