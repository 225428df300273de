//! Heap strings
//!
//! String content is immutable UTF-8. Equality is by content; the handle
//! only says where the bytes live.

use std::rc::Rc;

use crate::engine::Engine;
use crate::gc::{Arena, Tracer};
use crate::util::utf16_len;
use crate::value::StringRef;

/// A heap-allocated string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsString {
    text: Rc<str>,
}

impl JsString {
    pub fn new(text: impl Into<Rc<str>>) -> Self {
        JsString { text: text.into() }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// JS length in UTF-16 code units
    pub fn length(&self) -> usize {
        utf16_len(&self.text)
    }

    pub fn shared(&self) -> Rc<str> {
        self.text.clone()
    }
}

macro_rules! string_literals {
    ($($field:ident => $text:literal),* $(,)?) => {
        /// Strings allocated once per engine and kept alive for its lifetime
        #[derive(Debug, Clone, Copy)]
        pub struct StringLiterals {
            $(pub $field: StringRef,)*
        }

        impl StringLiterals {
            pub(crate) fn alloc(strings: &mut Arena<JsString>) -> Self {
                StringLiterals {
                    $($field: StringRef(strings.alloc(JsString::new($text))),)*
                }
            }

            pub(crate) fn trace(&self, tracer: &mut Tracer) {
                $(tracer.mark_string(self.$field);)*
            }
        }
    };
}

string_literals! {
    empty => "",
    undefined => "undefined",
    null => "null",
    true_ => "true",
    false_ => "false",
    nan => "NaN",
    infinity => "Infinity",
    neg_infinity => "-Infinity",
    zero => "0",
}

impl Engine {
    /// Allocate a string
    pub fn new_string(&mut self, text: &str) -> StringRef {
        if text.is_empty() {
            return self.literals.empty;
        }
        StringRef(self.heap.strings.alloc(JsString::new(text)))
    }

    /// Content of a string
    #[inline]
    pub fn string(&self, s: StringRef) -> &str {
        self.heap.strings[s.0].as_str()
    }

    /// Content equality of two strings
    pub fn string_equals(&self, a: StringRef, b: StringRef) -> bool {
        a == b || self.string(a) == self.string(b)
    }

    /// Concatenate two strings into a new one
    pub fn concat(&mut self, a: StringRef, b: StringRef) -> StringRef {
        if self.string(a).is_empty() {
            return b;
        }
        if self.string(b).is_empty() {
            return a;
        }
        let mut text = String::with_capacity(self.string(a).len() + self.string(b).len());
        text.push_str(self.string(a));
        text.push_str(self.string(b));
        self.new_string(&text)
    }

    /// JS length of a string in UTF-16 code units
    pub fn string_length(&self, s: StringRef) -> usize {
        self.heap.strings[s.0].length()
    }
}
