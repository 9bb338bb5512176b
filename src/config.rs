//! Configurations: sections with a defaults overlay.
//!
//! A [`Config`] is a root [`Section`] whose tree may carry a
//! [`DefaultsSection`]. Reading a key that is missing from the configuration
//! falls back to the same path in the defaults tree. Defaults are evaluated on
//! every read and never copied into the configuration, so a default written as
//! a macro keeps tracking the values it refers to.
//!
//! Inside the defaults tree, `ROOT` means "the configuration the default is
//! being read for", not the defaults tree itself. That binding is the
//! defaults tree's *reference*, switched for the duration of a read by
//! [`DefaultsSection::referencing`]. One defaults tree can thus serve several
//! configurations:
//!
//! ```
//! use sectional::{macros::root, map, Config, DefaultsSection, Value};
//!
//! let defaults = DefaultsSection::from_map(map! { "double" => root().item("a") * 2 }).unwrap();
//! let one = Config::with_defaults(defaults.clone());
//! let two = Config::with_defaults(defaults);
//! one.set("a", 1).unwrap();
//! two.set("a", 5).unwrap();
//! assert_eq!(one.get("double").unwrap(), Value::Int(2));
//! assert_eq!(two.get("double").unwrap(), Value::Int(10));
//! ```

use std::ops::Deref;
use std::rc::{Rc, Weak};

use crate::error::SectionalError;
use crate::section::{Section, Tree};
use crate::value::Map;

/// A root section with macros enabled and an optional defaults overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    section: Section,
}

impl Config {
    /// An empty configuration with an empty defaults overlay.
    pub fn new() -> Self {
        Self::with_defaults(DefaultsSection::new())
    }

    /// An empty configuration without an overlay. Validation then writes
    /// filled defaults straight into the configuration.
    pub fn without_defaults() -> Self {
        Config {
            section: Section::new(),
        }
    }

    /// An empty configuration reading its defaults from `defaults`, which may
    /// be shared with other configurations.
    pub fn with_defaults(defaults: DefaultsSection) -> Self {
        let config = Self::without_defaults();
        config.attach(&defaults);
        config
    }

    pub fn from_map(map: Map) -> Result<Self, SectionalError> {
        let config = Self::new();
        config.update(map)?;
        Ok(config)
    }

    fn attach(&self, defaults: &DefaultsSection) {
        defaults
            .section
            .tree
            .reference
            .replace(Rc::downgrade(&self.section.tree));
        self.section
            .tree
            .defaults
            .replace(Some(defaults.section.tree.clone()));
    }

    /// The defaults overlay, if this configuration has one.
    pub fn defaults(&self) -> Option<DefaultsSection> {
        let tree = self.section.tree.defaults.borrow().clone()?;
        Some(DefaultsSection {
            section: Section::from_tree(tree),
        })
    }

    /// Merge `map` into the defaults overlay, creating the overlay if needed.
    pub fn set_defaults(&self, map: Map) -> Result<(), SectionalError> {
        let defaults = match self.defaults() {
            Some(defaults) => defaults,
            None => {
                let defaults = DefaultsSection::new();
                self.attach(&defaults);
                defaults
            }
        };
        defaults.update(map)
    }

    pub fn as_section(&self) -> &Section {
        &self.section
    }

    pub fn into_section(self) -> Section {
        self.section
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Config {
    type Target = Section;

    fn deref(&self) -> &Section {
        &self.section
    }
}

/// The tree of default values behind one or more configurations.
#[derive(Clone, Debug, PartialEq)]
pub struct DefaultsSection {
    section: Section,
}

impl DefaultsSection {
    pub fn new() -> Self {
        DefaultsSection {
            section: Section::new(),
        }
    }

    pub fn from_map(map: Map) -> Result<Self, SectionalError> {
        let defaults = Self::new();
        defaults.update(map)?;
        Ok(defaults)
    }

    /// Rebind `ROOT` inside this tree to the root of `section` until the
    /// returned guard is dropped. Scopes must not be interleaved for
    /// different sections on the same tree.
    pub fn referencing(&self, section: &Section) -> ReferenceScope {
        ReferenceScope::enter(&self.section, section)
    }

    /// The root `ROOT` currently resolves to, if it is not this tree itself.
    pub fn reference(&self) -> Option<Section> {
        let tree = self.section.tree.reference.borrow().upgrade()?;
        Some(Section::from_tree(tree))
    }
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for DefaultsSection {
    type Target = Section;

    fn deref(&self) -> &Section {
        &self.section
    }
}

/// Guard returned by [`DefaultsSection::referencing`]; restores the previous
/// reference when dropped, including during unwinding.
#[must_use = "the reference is restored as soon as the scope is dropped"]
pub struct ReferenceScope {
    tree: Rc<Tree>,
    previous: Weak<Tree>,
}

impl ReferenceScope {
    pub(crate) fn enter(defaults: &Section, target: &Section) -> Self {
        let previous = defaults
            .tree
            .reference
            .replace(Rc::downgrade(&target.tree));
        ReferenceScope {
            tree: defaults.tree.clone(),
            previous,
        }
    }
}

impl Drop for ReferenceScope {
    fn drop(&mut self) {
        self.tree.reference.replace(std::mem::take(&mut self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::macros::{root, section};
    use crate::map;
    use crate::value::Value;

    fn sum_defaults() -> Config {
        let config = Config::from_map(map! { "a" => 1, "b" => 2 }).unwrap();
        config
            .set_defaults(map! { "c" => root().item("a") + root().item("b") })
            .unwrap();
        config
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = sum_defaults();
        assert_eq!(config.get("c").unwrap(), Value::Int(3));
        assert!(config.has_parameter("c"));
        assert_eq!(config.keys(), ["a", "b", "c"]);
    }

    #[test]
    fn defaults_are_not_cached() {
        let config = sum_defaults();
        assert_eq!(config.get("c").unwrap(), Value::Int(3));
        config.set("a", 10).unwrap();
        assert_eq!(config.get("c").unwrap(), Value::Int(12));
        assert!(config.entry("c").is_none());
    }

    #[test]
    fn primary_values_shadow_defaults() {
        let config = sum_defaults();
        config.set("c", 0).unwrap();
        assert_eq!(config.get("c").unwrap(), Value::Int(0));
        config.remove("c").unwrap();
        assert_eq!(config.get("c").unwrap(), Value::Int(3));
    }

    #[test]
    fn remove_of_overlay_only_key_clears_the_default() {
        let config = sum_defaults();
        config.remove("c").unwrap();
        assert!(!config.has_key("c"));
        assert!(matches!(config.get("c"), Err(SectionalError::KeyNotFound(_))));
    }

    #[test]
    fn section_in_defaults_is_the_requesting_section() {
        let config = Config::from_map(map! { "sub" => map! { "x" => 1 } }).unwrap();
        config
            .set_defaults(map! { "sub" => map! { "y" => section().item("x") + 1 } })
            .unwrap();
        let sub = config.get_section("sub").unwrap();
        assert_eq!(sub.get("y").unwrap(), Value::Int(2));
    }

    #[test]
    fn defaults_only_sub_section_is_materialized_on_read() {
        let config = Config::new();
        config
            .set_defaults(map! { "net" => map! { "port" => 8080 } })
            .unwrap();
        assert!(config.has_section("net"));
        let net = config.get_section("net").unwrap();
        assert_eq!(net.get("port").unwrap(), Value::Int(8080));
        assert!(config.entry("net").is_some());
        assert!(net.entry("port").is_none());
    }

    #[test]
    fn shared_defaults_follow_the_reader() {
        let defaults = DefaultsSection::from_map(map! {
            "double" => root().item("a") * 2,
        })
        .unwrap();
        let one = Config::with_defaults(defaults.clone());
        let two = Config::with_defaults(defaults.clone());
        one.set("a", 1).unwrap();
        two.set("a", 5).unwrap();
        assert_eq!(one.get("double").unwrap(), Value::Int(2));
        assert_eq!(two.get("double").unwrap(), Value::Int(10));
        assert_eq!(one.get("double").unwrap(), Value::Int(2));
    }

    #[test]
    fn referencing_restores_the_previous_root() {
        let config = sum_defaults();
        let other = Config::from_map(map! { "a" => 100, "b" => 200 }).unwrap();
        let defaults = config.defaults().unwrap();
        assert_eq!(defaults.reference(), Some(config.root()));
        {
            let _scope = defaults.referencing(&other);
            assert_eq!(defaults.reference(), Some(other.root()));
            assert_eq!(defaults.get("c").unwrap(), Value::Int(300));
        }
        assert_eq!(defaults.reference(), Some(config.root()));
    }

    #[test]
    fn referencing_is_restored_after_a_failed_read() {
        let config = Config::new();
        config
            .set_defaults(map! { "bad" => root().item("missing") })
            .unwrap();
        let err = config.get("bad").unwrap_err();
        assert!(matches!(
            err,
            SectionalError::Eval(EvalError::MissingKey(_))
        ));
        let defaults = config.defaults().unwrap();
        assert_eq!(defaults.reference(), Some(config.root()));
    }

    #[test]
    fn without_defaults_has_no_overlay() {
        let config = Config::without_defaults();
        assert!(config.defaults().is_none());
        config.set_defaults(map! { "x" => 1 }).unwrap();
        assert_eq!(config.get("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn as_dict_can_include_defaults() {
        let config = sum_defaults();
        let plain = config.as_dict(false, true).unwrap();
        assert_eq!(plain.keys().collect::<Vec<_>>(), ["a", "b"]);
        let full = config.as_dict(true, true).unwrap();
        assert_eq!(full.get("c"), Some(&Value::Int(3)));
        let raw = config.as_dict(true, false).unwrap();
        assert!(raw.get("c").is_some_and(Value::is_expr));
    }
}
