//! Backing stores for sections.
//!
//! A [`Store`] is a flat key/value container. Nesting is expressed in the keys
//! themselves: `options.epsilon.epsilon_x` is the parameter `epsilon_x` of the
//! section `epsilon` inside the section `options`. A section holds an
//! [`Entry::Section`] marker under its own key, so an empty section still
//! exists and a key is never ambiguous between the two kinds.
//!
//! Enumeration order is insertion order. Replacing the entry of an existing
//! key keeps its position.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Separator between the segments of a flat key.
pub const SEPARATOR: char = '.';

/// What a flat key holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A leaf value. Never a [`Value::Map`] or [`Value::Section`].
    Parameter(Value),
    /// Marker for a (possibly empty) sub-section.
    Section,
}

impl Entry {
    pub fn kind(&self) -> &'static str {
        match self {
            Entry::Parameter(_) => "parameter",
            Entry::Section => "section",
        }
    }
}

/// Minimal key/value protocol a section can be backed by.
pub trait Store {
    fn get(&self, key: &str) -> Option<Entry>;

    /// Insert or replace the entry for `key`.
    fn insert(&mut self, key: &str, entry: Entry);

    fn remove(&mut self, key: &str) -> Option<Entry>;

    /// Every key, in insertion order.
    fn keys(&self) -> Vec<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Direct children of `prefix` (the empty prefix is the root), in order.
    fn children(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter_map(|key| child_name(prefix, &key).map(str::to_string))
            .collect()
    }

    /// Remove `prefix` itself and everything below it.
    fn remove_tree(&mut self, prefix: &str) {
        let doomed: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|key| is_within(prefix, key))
            .collect();
        for key in doomed {
            self.remove(&key);
        }
    }
}

/// Join a section prefix and a key.
pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}{SEPARATOR}{key}")
    }
}

/// The child segment if `key` lies directly below `prefix`.
fn child_name<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let rest = if prefix.is_empty() {
        key
    } else {
        key.strip_prefix(prefix)?.strip_prefix(SEPARATOR)?
    };
    (!rest.is_empty() && !rest.contains(SEPARATOR)).then_some(rest)
}

/// True if `key` is `prefix` or lies anywhere below it.
fn is_within(prefix: &str, key: &str) -> bool {
    key == prefix
        || key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
}

/// The default in-memory store: hashed point access, ordered enumeration.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Vec<Option<(String, Entry)>>,
    index: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        self.index.clear();
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some((key, _)) = slot {
                self.index.insert(key.clone(), i);
            }
        }
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<Entry> {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_ref().map(|(_, entry)| entry.clone())
    }

    fn insert(&mut self, key: &str, entry: Entry) {
        match self.index.get(key) {
            Some(&slot) => self.slots[slot] = Some((key.to_string(), entry)),
            None => {
                self.index.insert(key.to_string(), self.slots.len());
                self.slots.push(Some((key.to_string(), entry)));
            }
        }
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let slot = self.index.remove(key)?;
        let removed = self.slots[slot].take().map(|(_, entry)| entry);
        if self.slots.len() > 32 && self.index.len() < self.slots.len() / 2 {
            self.compact();
        }
        removed
    }

    fn keys(&self) -> Vec<String> {
        self.slots
            .iter()
            .flatten()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// A store shared with the caller: every section operation is visible through
/// the caller's handle and the other way round.
impl<S: Store> Store for Rc<RefCell<S>> {
    fn get(&self, key: &str) -> Option<Entry> {
        self.borrow().get(key)
    }

    fn insert(&mut self, key: &str, entry: Entry) {
        self.borrow_mut().insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        self.borrow_mut().remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.borrow().keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(i: i64) -> Entry {
        Entry::Parameter(Value::Int(i))
    }

    #[test]
    fn children_are_direct_and_ordered() {
        let mut store = MemoryStore::new();
        store.insert("b", param(1));
        store.insert("opts", Entry::Section);
        store.insert("opts.x", param(2));
        store.insert("opts.sub", Entry::Section);
        store.insert("opts.sub.y", param(3));
        store.insert("a", param(4));
        assert_eq!(store.children(""), ["b", "opts", "a"]);
        assert_eq!(store.children("opts"), ["x", "sub"]);
        assert_eq!(store.children("opts.sub"), ["y"]);
        assert!(store.children("b").is_empty());
    }

    #[test]
    fn prefix_must_end_at_a_separator() {
        let mut store = MemoryStore::new();
        store.insert("opt", Entry::Section);
        store.insert("opt.a", param(1));
        store.insert("options", Entry::Section);
        store.insert("options.b", param(2));
        assert_eq!(store.children("opt"), ["a"]);
        store.remove_tree("opt");
        assert_eq!(store.keys(), ["options", "options.b"]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut store = MemoryStore::new();
        store.insert("a", param(1));
        store.insert("b", param(2));
        store.insert("a", param(10));
        assert_eq!(store.keys(), ["a", "b"]);
        assert_eq!(store.get("a"), Some(param(10)));
    }

    #[test]
    fn removal_survives_compaction() {
        let mut store = MemoryStore::new();
        for i in 0..100 {
            store.insert(&format!("k{i}"), param(i));
        }
        for i in 0..90 {
            assert_eq!(store.remove(&format!("k{i}")), Some(param(i)));
        }
        assert_eq!(store.len(), 10);
        assert_eq!(store.get("k95"), Some(param(95)));
        assert_eq!(store.keys().first().map(String::as_str), Some("k90"));
        store.insert("k0", param(0));
        assert_eq!(store.keys().last().map(String::as_str), Some("k0"));
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a.b", "c"), "a.b.c");
    }
}
