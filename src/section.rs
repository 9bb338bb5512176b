//! Hierarchical sections.
//!
//! A [`Section`] is a cheap handle: a shared tree plus the dotted prefix of the
//! node it designates. Cloning a handle never copies data, and every handle
//! onto the same tree sees every mutation immediately. The tree owns the
//! backing [`Store`], the macro flag and, for configurations, the defaults
//! overlay (see [`Config`](crate::Config)).
//!
//! Keys are bare identifiers. A key is either a parameter or a sub-section,
//! never both; switching kinds requires [`remove`](Section::remove) first.
//!
//! ```
//! use sectional::{map, Section, Value};
//!
//! let section = Section::from_map(map! {
//!     "x" => 1,
//!     "sub" => map! { "y" => 2 },
//! }).unwrap();
//! assert!(section.has_parameter("x"));
//! assert!(section.has_section("sub"));
//! assert_eq!(section.get_section("sub").unwrap().get("y").unwrap(), Value::Int(2));
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::ReferenceScope;
use crate::error::{EvalError, SectionalError};
use crate::expr::Expr;
use crate::macros;
use crate::store::{self, Entry, MemoryStore, Store};
use crate::value::{Map, Value};

/// Shared state behind every handle onto one section tree.
pub(crate) struct Tree {
    pub(crate) store: RefCell<Box<dyn Store>>,
    pub(crate) macros: Cell<bool>,
    /// Root of the defaults overlay, if any.
    pub(crate) defaults: RefCell<Option<Rc<Tree>>>,
    /// For a defaults tree: the tree `ROOT` resolves to.
    pub(crate) reference: RefCell<Weak<Tree>>,
}

impl Tree {
    pub(crate) fn new(store: Box<dyn Store>, macros: bool) -> Rc<Tree> {
        Rc::new(Tree {
            store: RefCell::new(store),
            macros: Cell::new(macros),
            defaults: RefCell::new(None),
            reference: RefCell::new(Weak::new()),
        })
    }
}

/// Handle onto one node of a section tree.
#[derive(Clone)]
pub struct Section {
    pub(crate) tree: Rc<Tree>,
    pub(crate) prefix: String,
}

/// Keys must be identifiers: a letter or `_`, then letters, digits or `_`.
pub fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

pub(crate) fn validate_key(key: &str) -> Result<(), SectionalError> {
    if is_identifier(key) {
        Ok(())
    } else {
        Err(SectionalError::InvalidKey(key.to_string()))
    }
}

fn conflict(key: String, existing: &'static str, requested: &'static str) -> SectionalError {
    SectionalError::KeyConflict {
        key,
        existing,
        requested,
    }
}

impl Section {
    /// An empty section with macros enabled.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    /// A section over `store`. Existing entries in the store are visible at once.
    pub fn with_store(store: impl Store + 'static) -> Self {
        Self::from_tree(Tree::new(Box::new(store), true))
    }

    /// Build a section from an ordered mapping; nested maps become sub-sections.
    pub fn from_map(map: Map) -> Result<Self, SectionalError> {
        let section = Self::new();
        section.extend(map)?;
        Ok(section)
    }

    pub(crate) fn from_tree(tree: Rc<Tree>) -> Self {
        Section {
            tree,
            prefix: String::new(),
        }
    }

    /// Whether expression values are evaluated on read.
    pub fn macros(&self) -> bool {
        self.tree.macros.get()
    }

    /// Enable or disable macro evaluation for the whole tree.
    pub fn set_macros(&self, enabled: bool) {
        self.tree.macros.set(enabled);
    }

    /// Dotted path of this section from the root; empty for the root.
    pub fn path(&self) -> &str {
        &self.prefix
    }

    /// Handle onto the root of this tree.
    pub fn root(&self) -> Section {
        Section::from_tree(self.tree.clone())
    }

    pub fn is_root(&self) -> bool {
        self.prefix.is_empty()
    }

    /// The section `ROOT` is bound to when a macro stored here is evaluated.
    pub(crate) fn macro_root(&self) -> Section {
        let referenced = self.tree.reference.borrow().upgrade();
        Section::from_tree(referenced.unwrap_or_else(|| self.tree.clone()))
    }

    pub(crate) fn qualified(&self, key: &str) -> String {
        store::join(&self.prefix, key)
    }

    fn child(&self, key: &str) -> Section {
        Section {
            tree: self.tree.clone(),
            prefix: self.qualified(key),
        }
    }

    fn not_found(&self, key: &str) -> SectionalError {
        SectionalError::KeyNotFound(self.qualified(key))
    }

    /// The entry stored for `key` in this tree, ignoring the overlay.
    pub(crate) fn entry(&self, key: &str) -> Option<Entry> {
        self.tree.store.borrow().get(&self.qualified(key))
    }

    /// The node at the same path in the defaults overlay.
    pub(crate) fn overlay(&self) -> Option<Section> {
        let defaults = self.tree.defaults.borrow().clone()?;
        Some(Section {
            tree: defaults,
            prefix: self.prefix.clone(),
        })
    }

    /// The entry for `key` in the defaults overlay.
    pub(crate) fn default_entry(&self, key: &str) -> Option<Entry> {
        self.overlay()?.entry(key)
    }

    /// Keys stored in this tree, in insertion order, ignoring the overlay.
    pub(crate) fn own_keys(&self) -> Vec<String> {
        self.tree.store.borrow().children(&self.prefix)
    }

    /// Evaluate `expr` with this section as `SECTION`.
    pub(crate) fn evaluate(&self, expr: &Expr) -> Result<Value, EvalError> {
        macros::evaluate(expr, &self.macro_root(), self)
    }

    // --- reads ---

    /// Value of `key`. Sub-sections come back as [`Value::Section`] handles
    /// and expressions are evaluated when macros are enabled. A key missing
    /// here falls back to the defaults overlay.
    pub fn get(&self, key: &str) -> Result<Value, SectionalError> {
        validate_key(key)?;
        match self.entry(key) {
            Some(Entry::Section) => Ok(Value::Section(self.child(key))),
            Some(Entry::Parameter(Value::Expr(expr))) if self.macros() => {
                Ok(self.evaluate(&expr)?)
            }
            Some(Entry::Parameter(value)) => Ok(value),
            None => self.get_default(key),
        }
    }

    fn get_default(&self, key: &str) -> Result<Value, SectionalError> {
        let overlay = self.overlay().ok_or_else(|| self.not_found(key))?;
        match overlay.entry(key) {
            Some(Entry::Section) => Ok(Value::Section(self.get_or_create_section(key)?)),
            Some(Entry::Parameter(Value::Expr(expr))) if self.macros() => {
                let _scope = ReferenceScope::enter(&overlay, self);
                Ok(macros::evaluate(&expr, &overlay.macro_root(), self)?)
            }
            Some(Entry::Parameter(value)) => Ok(value),
            None => Err(self.not_found(key)),
        }
    }

    /// Like [`get`](Self::get) but never evaluates expressions.
    pub fn get_raw(&self, key: &str) -> Result<Value, SectionalError> {
        validate_key(key)?;
        match self.entry(key).or_else(|| self.default_entry(key)) {
            Some(Entry::Section) => Ok(Value::Section(self.get_or_create_section(key)?)),
            Some(Entry::Parameter(value)) => Ok(value),
            None => Err(self.not_found(key)),
        }
    }

    /// The sub-section `key`.
    pub fn get_section(&self, key: &str) -> Result<Section, SectionalError> {
        match self.get_raw(key)? {
            Value::Section(section) => Ok(section),
            _ => Err(SectionalError::NotASection(self.qualified(key))),
        }
    }

    /// The sub-section `key`, created empty if missing.
    pub fn get_or_create_section(&self, key: &str) -> Result<Section, SectionalError> {
        validate_key(key)?;
        match self.entry(key) {
            Some(Entry::Section) => {}
            Some(Entry::Parameter(_)) => {
                return Err(conflict(self.qualified(key), "parameter", "section"));
            }
            None => self
                .tree
                .store
                .borrow_mut()
                .insert(&self.qualified(key), Entry::Section),
        }
        Ok(self.child(key))
    }

    /// Used by expressions: `ROOT['key']`, `SECTION.key`.
    pub(crate) fn lookup(&self, key: &str) -> Result<Value, EvalError> {
        self.get(key).map_err(|err| match err {
            SectionalError::Eval(e) => e,
            _ => EvalError::MissingKey(self.qualified(key)),
        })
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entry(key).is_some() || self.default_entry(key).is_some()
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        match self.entry(key) {
            Some(entry) => matches!(entry, Entry::Parameter(_)),
            None => matches!(self.default_entry(key), Some(Entry::Parameter(_))),
        }
    }

    pub fn has_section(&self, key: &str) -> bool {
        match self.entry(key) {
            Some(entry) => matches!(entry, Entry::Section),
            None => matches!(self.default_entry(key), Some(Entry::Section)),
        }
    }

    /// Keys in insertion order, followed by keys only present in the overlay.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = self.own_keys();
        if let Some(overlay) = self.overlay() {
            for key in overlay.own_keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Every key with its [`get`](Self::get) value.
    pub fn items(&self) -> Result<Vec<(String, Value)>, SectionalError> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(&key)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Parameters only, evaluated.
    pub fn parameters(&self) -> Result<Vec<(String, Value)>, SectionalError> {
        self.keys()
            .into_iter()
            .filter(|key| self.has_parameter(key))
            .map(|key| {
                let value = self.get(&key)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Sub-sections only.
    pub fn sections(&self) -> Result<Vec<(String, Section)>, SectionalError> {
        self.keys()
            .into_iter()
            .filter(|key| self.has_section(key))
            .map(|key| {
                let section = self.get_or_create_section(&key)?;
                Ok((key, section))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- writes ---

    /// Set `key`. A [`Value::Map`] (or another section) replaces the
    /// sub-section `key` with a copy of its content; anything else is stored
    /// as a parameter. Changing the kind of an existing key fails.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), SectionalError> {
        validate_key(key)?;
        match value.into() {
            Value::Map(map) => self.replace_section(key, map),
            Value::Section(section) => {
                let content = section.as_dict(false, false)?;
                self.replace_section(key, content)
            }
            value => {
                if let Some(Entry::Section) = self.entry(key) {
                    return Err(conflict(self.qualified(key), "section", "parameter"));
                }
                self.tree
                    .store
                    .borrow_mut()
                    .insert(&self.qualified(key), Entry::Parameter(value));
                Ok(())
            }
        }
    }

    fn replace_section(&self, key: &str, content: Map) -> Result<(), SectionalError> {
        let child = match self.entry(key) {
            Some(Entry::Parameter(_)) => {
                return Err(conflict(self.qualified(key), "parameter", "section"));
            }
            Some(Entry::Section) => {
                let child = self.child(key);
                child.clear();
                child
            }
            None => self.get_or_create_section(key)?,
        };
        child.extend(content)
    }

    fn extend(&self, content: Map) -> Result<(), SectionalError> {
        for (key, value) in content {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Delete `key` (and everything below it). A key only present in the
    /// overlay is deleted from the overlay.
    pub fn remove(&self, key: &str) -> Result<(), SectionalError> {
        validate_key(key)?;
        let full = self.qualified(key);
        if self.entry(key).is_some() {
            self.tree.store.borrow_mut().remove_tree(&full);
            return Ok(());
        }
        match self.overlay() {
            Some(overlay) if overlay.entry(key).is_some() => {
                overlay.tree.store.borrow_mut().remove_tree(&full);
                Ok(())
            }
            _ => Err(self.not_found(key)),
        }
    }

    /// Delete every key stored here. The overlay is left alone.
    pub fn clear(&self) {
        let keys = self.own_keys();
        let mut store = self.tree.store.borrow_mut();
        for key in keys {
            store.remove_tree(&store::join(&self.prefix, &key));
        }
    }

    /// Merge `map` into this section: nested maps update existing sub-sections
    /// recursively, everything else replaces what is there, whatever its kind.
    pub fn update(&self, map: Map) -> Result<(), SectionalError> {
        for (key, value) in map {
            validate_key(&key)?;
            match (self.entry(&key), value) {
                (Some(Entry::Section), Value::Map(nested)) => self.child(&key).update(nested)?,
                (Some(entry), value) => {
                    let is_section = matches!(entry, Entry::Section);
                    // kinds differ
                    if is_section == value.is_parameter() {
                        self.tree
                            .store
                            .borrow_mut()
                            .remove_tree(&self.qualified(&key));
                    }
                    self.set(&key, value)?;
                }
                (None, value) => self.set(&key, value)?,
            }
        }
        Ok(())
    }

    /// Write `value` for `key` into the defaults overlay, creating the
    /// overlay's sub-sections on the way. Returns `false` (writing nothing)
    /// when this tree has no overlay.
    pub(crate) fn set_default(&self, key: &str, value: Value) -> Result<bool, SectionalError> {
        let Some(overlay) = self.overlay() else {
            return Ok(false);
        };
        let mut node = overlay.root();
        if !self.prefix.is_empty() {
            for segment in self.prefix.split(store::SEPARATOR) {
                node = node.get_or_create_section(segment)?;
            }
        }
        node.set(key, value)?;
        Ok(true)
    }

    // --- conversion ---

    /// Plain ordered mapping of this section. With `include_defaults`, keys
    /// only present in the overlay are included; with `evaluate`, expressions
    /// are replaced by their values.
    pub fn as_dict(&self, include_defaults: bool, evaluate: bool) -> Result<Map, SectionalError> {
        let keys = if include_defaults {
            self.keys()
        } else {
            self.own_keys()
        };
        let mut map = Map::new();
        for key in keys {
            if self.has_section(&key) {
                let child = self.get_or_create_section(&key)?;
                map.insert(key, child.as_dict(include_defaults, evaluate)?);
            } else {
                let value = if evaluate {
                    self.get(&key)?
                } else {
                    self.get_raw(&key)?
                };
                map.insert(key, value);
            }
        }
        Ok(map)
    }

    /// Indented text rendering: `key = <repr>` lines, `[name]` headers for
    /// sub-sections with their content four spaces deeper. Expressions are
    /// written as source. The overlay is not included.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.write_dump(0, &mut out);
        out
    }

    fn write_dump(&self, depth: usize, out: &mut String) {
        let indent = " ".repeat(depth * 4);
        for key in self.own_keys() {
            match self.entry(&key) {
                Some(Entry::Section) => {
                    out.push_str(&format!("{indent}[{key}]\n"));
                    self.child(&key).write_dump(depth + 1, out);
                }
                Some(Entry::Parameter(value)) => {
                    out.push_str(&format!("{indent}{key} = {}\n", value.repr()));
                }
                None => {}
            }
        }
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}

/// Two handles are equal when they designate the same node of the same tree.
impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree) && self.prefix == other.prefix
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Section({:?})", self.prefix)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{PROPERTY_DUMP, property_map};
    use crate::macros::{root, section};
    use crate::map;

    #[test]
    fn dump_matches_reference_layout() {
        let section = Section::from_map(property_map()).unwrap();
        assert_eq!(section.dump(), PROPERTY_DUMP);
    }

    #[test]
    fn as_dict_roundtrips_the_input() {
        let section = Section::from_map(property_map()).unwrap();
        assert_eq!(section.as_dict(false, false).unwrap(), property_map());
    }

    #[test]
    fn kinds_switch_only_through_remove() {
        let section = Section::from_map(property_map()).unwrap();
        assert!(section.has_section("options"));

        let err = section.set("options", 1).unwrap_err();
        assert!(matches!(err, SectionalError::KeyConflict { .. }));

        section.remove("options").unwrap();
        section.set("options", 1).unwrap();
        assert!(!section.has_section("options"));
        assert!(section.has_parameter("options"));

        let err = section.set("options", map! { "a" => 1 }).unwrap_err();
        assert!(matches!(err, SectionalError::KeyConflict { .. }));

        section.remove("options").unwrap();
        section.set("options", map! { "a" => 1 }).unwrap();
        assert!(section.has_section("options"));
        assert!(!section.has_parameter("options"));
    }

    #[test]
    fn removing_a_section_removes_its_descendants() {
        let section = Section::from_map(property_map()).unwrap();
        section.remove("options").unwrap();
        section.set("options", map! {}).unwrap();
        let options = section.get_section("options").unwrap();
        assert!(options.is_empty());
        assert!(!options.has_key("epsilon"));
    }

    #[test]
    fn setting_a_map_replaces_the_sub_section() {
        let section = Section::from_map(map! { "sub" => map! { "a" => 1, "b" => 2 } }).unwrap();
        section.set("sub", map! { "c" => 3 }).unwrap();
        let sub = section.get_section("sub").unwrap();
        assert_eq!(sub.keys(), ["c"]);
    }

    #[test]
    fn update_merges_recursively() {
        let section = Section::from_map(map! {
            "sub" => map! { "a" => 1, "b" => 2 },
            "flag" => map! { "x" => 1 },
        })
        .unwrap();
        section
            .update(map! { "sub" => map! { "b" => 20, "c" => 30 }, "flag" => true })
            .unwrap();
        let sub = section.get_section("sub").unwrap();
        assert_eq!(sub.keys(), ["a", "b", "c"]);
        assert_eq!(sub.get("b").unwrap(), Value::Int(20));
        assert!(section.has_parameter("flag"));
    }

    #[test]
    fn keys_must_be_identifiers() {
        let section = Section::new();
        for bad in ["", "a.b", "1a", "a-b", "a b"] {
            assert!(matches!(section.set(bad, 1), Err(SectionalError::InvalidKey(_))), "{bad}");
        }
        assert!(section.set("_ok1", 1).is_ok());
    }

    #[test]
    fn insertion_order_is_kept() {
        let section = Section::from_map(property_map()).unwrap();
        let options = section.get_section("options").unwrap();
        assert_eq!(options.keys(), ["i_alpha", "f_beta", "b_gamma", "epsilon", "s_delta"]);
        let params: Vec<String> = options.parameters().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(params, ["i_alpha", "f_beta", "b_gamma", "s_delta"]);
        let sections: Vec<String> = options.sections().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(sections, ["epsilon"]);
    }

    #[test]
    fn path_and_handles() {
        let section = Section::from_map(property_map()).unwrap();
        let epsilon = section
            .get_section("options")
            .unwrap()
            .get_section("epsilon")
            .unwrap();
        assert_eq!(epsilon.path(), "options.epsilon");
        assert_eq!(epsilon.root(), section);
        assert_eq!(
            section.get("options").unwrap(),
            Value::Section(section.get_section("options").unwrap())
        );
    }

    #[test]
    fn missing_key_reports_full_path() {
        let section = Section::from_map(property_map()).unwrap();
        let options = section.get_section("options").unwrap();
        match options.get("nope") {
            Err(SectionalError::KeyNotFound(path)) => assert_eq!(path, "options.nope"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            section.get_section("x_value"),
            Err(SectionalError::NotASection(_))
        ));
    }

    #[test]
    fn expressions_evaluate_on_read() {
        let section = Section::from_map(map! {
            "a" => 3,
            "sub" => map! { "b" => 4, "c" => root().item("a") * section().item("b") },
        })
        .unwrap();
        let sub = section.get_section("sub").unwrap();
        assert_eq!(sub.get("c").unwrap(), Value::Int(12));
        assert!(sub.get_raw("c").unwrap().is_expr());

        section.set("a", 10).unwrap();
        assert_eq!(sub.get("c").unwrap(), Value::Int(40));

        section.set_macros(false);
        assert!(sub.get("c").unwrap().is_expr());
    }

    #[test]
    fn dump_writes_expressions_as_source() {
        let section = Section::new();
        section.set("a", 1).unwrap();
        section.set("b", root().item("a") + 1).unwrap();
        assert_eq!(section.dump(), "a = 1\nb = ROOT['a'] + 1\n");
        let evaluated = section.as_dict(false, true).unwrap();
        assert_eq!(evaluated.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn copying_a_section_value_snapshots_it() {
        let section = Section::from_map(property_map()).unwrap();
        let misc = section.get_section("miscellanea").unwrap();
        section.set("copy", misc.clone()).unwrap();
        misc.set("a", 100).unwrap();
        let copy = section.get_section("copy").unwrap();
        assert_eq!(copy.get("a").unwrap(), Value::Int(1));
    }

    #[test]
    fn clear_empties_only_this_node() {
        let section = Section::from_map(property_map()).unwrap();
        section.get_section("options").unwrap().clear();
        assert!(section.get_section("options").unwrap().is_empty());
        assert!(section.has_parameter("x_value"));
    }

    #[test]
    fn shared_store_is_a_live_view() {
        let store = Rc::new(RefCell::new(MemoryStore::new()));
        let section = Section::with_store(store.clone());
        section.set("sub", map! { "a" => 1 }).unwrap();
        assert_eq!(
            store.borrow().get("sub.a"),
            Some(Entry::Parameter(Value::Int(1)))
        );
        store
            .borrow_mut()
            .insert("sub.b", Entry::Parameter(Value::Int(2)));
        let sub = section.get_section("sub").unwrap();
        assert_eq!(sub.get("b").unwrap(), Value::Int(2));
    }

    #[test]
    fn contains_and_len_through_expressions() {
        let section = Section::from_map(map! {
            "sub" => map! { "a" => 1, "b" => 2 },
            "has_a" => root().item("sub").contains("a"),
            "n" => root().item("sub").len(),
        })
        .unwrap();
        assert_eq!(section.get("has_a").unwrap(), Value::Bool(true));
        assert_eq!(section.get("n").unwrap(), Value::Int(2));
    }
}
