//! Interned string identifier.
//!
//! Dotted lookups (`a.b.c`) and synthetic names are common enough in this
//! pass that paying for a `String` allocation per occurrence would be
//! wasteful; `Name` gives O(1) equality and cheap `Copy` passing.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;

/// Interned identifier: an index into a `StringInterner`'s table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    pub const EMPTY: Name = Name(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::EMPTY
    }
}

struct Inner {
    map: FxHashMap<String, u32>,
    strings: Vec<String>,
}

/// Process-wide (really: driver-run-wide) string interner.
///
/// A single `StringInterner` is owned by the `DriverContext` and shared by
/// reference with every `Scope`, `Type`, and `Microstatement` constructed
/// during that run.
pub struct StringInterner {
    inner: RwLock<Inner>,
}

impl StringInterner {
    pub fn new() -> Self {
        let interner = StringInterner {
            inner: RwLock::new(Inner {
                map: FxHashMap::default(),
                strings: Vec::new(),
            }),
        };
        let empty = interner.intern("");
        debug_assert_eq!(empty, Name::EMPTY);
        interner
    }

    pub fn intern(&self, s: &str) -> Name {
        if let Some(&idx) = self.inner.read().map.get(s) {
            return Name(idx);
        }
        let mut inner = self.inner.write();
        if let Some(&idx) = inner.map.get(s) {
            return Name(idx);
        }
        let idx = inner.strings.len() as u32;
        inner.strings.push(s.to_string());
        inner.map.insert(s.to_string(), idx);
        Name(idx)
    }

    pub fn resolve(&self, name: Name) -> String {
        self.inner.read().strings[name.0 as usize].clone()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let interner = StringInterner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "foo");
    }

    #[test]
    fn distinct_strings_get_distinct_names() {
        let interner = StringInterner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_string_is_pre_interned() {
        let interner = StringInterner::new();
        assert_eq!(interner.intern(""), Name::EMPTY);
    }
}
