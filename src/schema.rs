//! Schemas: trees of validators mirroring the configuration they check.
//!
//! [`SchemaSection::validate`] walks a schema and a live [`Section`] side by
//! side. Every declared option is validated and written back (coerced or
//! defaulted), every declared sub-section is recursed into (created if
//! missing), and every key the schema does not declare goes through the
//! node's [`Unexpected`] policy. The section is mutated in place; the
//! returned [`Validation`] holds only what failed.
//!
//! A default filled during validation goes to the defaults overlay when the
//! configuration has one (and the schema node has `use_defaults` on). A
//! deferred default is stored there as the expression itself, so reading the
//! option later recomputes it from the current configuration.
//!
//! ```
//! use sectional::{map, Config, SchemaSection, Validator, Value};
//!
//! let mut schema = SchemaSection::new();
//! schema.add_option("retries", Validator::new("Int", map! { "min" => 0, "default" => 3 }).unwrap()).unwrap();
//!
//! let config = Config::new();
//! let validation = schema.validate(&config, false).unwrap();
//! assert!(validation.is_empty());
//! assert_eq!(config.get("retries").unwrap(), Value::Int(3));
//! ```

use std::fmt;

use tracing::{debug, trace};

use crate::codec::text;
use crate::error::SectionalError;
use crate::expr::{Expr, Node};
use crate::option::ConfigOption;
use crate::section::{validate_key, Section};
use crate::store::Entry;
use crate::validation::{OptionValidationError, Validation};
use crate::validator::Validator;
use crate::value::{Map, Value};

/// Reserved key carrying a node's unexpected-key policy in the text form.
pub const UNEXPECTED_KEY: &str = "__unexpected__";

/// What to do with keys present in a section but not declared in its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unexpected {
    /// Record an `UnexpectedOption`/`UnexpectedSection` error.
    #[default]
    Complain,
    /// Leave the key alone.
    Ignore,
    /// Delete the key from the section.
    Remove,
}

impl Unexpected {
    pub fn name(self) -> &'static str {
        match self {
            Unexpected::Complain => "Complain",
            Unexpected::Ignore => "Ignore",
            Unexpected::Remove => "Remove",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Complain" => Some(Unexpected::Complain),
            "Ignore" => Some(Unexpected::Ignore),
            "Remove" => Some(Unexpected::Remove),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaEntry {
    Option(Validator),
    Section(SchemaSection),
}

/// Where the value of a declared option was found.
enum Origin {
    Primary(Value),
    Overlay(Value),
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSection {
    entries: Vec<(String, SchemaEntry)>,
    unexpected: Unexpected,
    use_defaults: bool,
}

impl SchemaSection {
    pub fn new() -> Self {
        SchemaSection {
            entries: Vec::new(),
            unexpected: Unexpected::Complain,
            use_defaults: true,
        }
    }

    fn put(&mut self, key: &str, entry: SchemaEntry) -> Result<(), SectionalError> {
        validate_key(key)?;
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((key.to_string(), entry)),
        }
        Ok(())
    }

    /// Declare option `key`, replacing any previous declaration.
    pub fn add_option(&mut self, key: &str, validator: Validator) -> Result<(), SectionalError> {
        self.put(key, SchemaEntry::Option(validator))
    }

    /// Declare sub-section `key`, replacing any previous declaration.
    pub fn add_section(&mut self, key: &str, schema: SchemaSection) -> Result<(), SectionalError> {
        self.put(key, SchemaEntry::Section(schema))
    }

    pub fn get(&self, key: &str) -> Option<&SchemaEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn option(&self, key: &str) -> Option<&Validator> {
        match self.get(key)? {
            SchemaEntry::Option(v) => Some(v),
            SchemaEntry::Section(_) => None,
        }
    }

    pub fn section(&self, key: &str) -> Option<&SchemaSection> {
        match self.get(key)? {
            SchemaEntry::Section(s) => Some(s),
            SchemaEntry::Option(_) => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn unexpected(&self) -> Unexpected {
        self.unexpected
    }

    /// Policy for undeclared keys of this node only; sub-sections keep their own.
    pub fn set_unexpected(&mut self, policy: Unexpected) {
        self.unexpected = policy;
    }

    pub fn use_defaults(&self) -> bool {
        self.use_defaults
    }

    /// Whether filled defaults go to the defaults overlay (when there is one).
    pub fn set_use_defaults(&mut self, enabled: bool) {
        self.use_defaults = enabled;
    }

    // --- validation ---

    /// Validate `section` in place. With `raise_on_error` the first failure is
    /// returned as [`SectionalError::Validation`] and the walk stops, keeping
    /// whatever was already written. Otherwise every failure is collected into
    /// the returned tree. Evaluation errors always abort.
    pub fn validate(
        &self,
        section: &Section,
        raise_on_error: bool,
    ) -> Result<Validation, SectionalError> {
        let mut validation = Validation::new();
        for (key, entry) in &self.entries {
            match entry {
                SchemaEntry::Option(validator) => {
                    let outcome = self.validate_option(section, key, validator);
                    collect(&mut validation, key, outcome, raise_on_error)?;
                }
                SchemaEntry::Section(schema) => {
                    if section.has_parameter(key) {
                        let error = OptionValidationError::UnexpectedOption {
                            path: section.qualified(key),
                            value: section.get_raw(key)?.repr(),
                        };
                        collect(&mut validation, key, Err(error.into()), raise_on_error)?;
                        continue;
                    }
                    let child = section.get_or_create_section(key)?;
                    let sub = schema.validate(&child, raise_on_error)?;
                    validation.attach(key, sub);
                }
            }
        }
        for key in section.own_keys() {
            if self.get(&key).is_none() {
                let outcome = self.handle_unexpected(section, &key);
                collect(&mut validation, &key, outcome, raise_on_error)?;
            }
        }
        Ok(validation)
    }

    fn validate_option(
        &self,
        section: &Section,
        key: &str,
        validator: &Validator,
    ) -> Result<(), SectionalError> {
        let path = section.qualified(key);
        let origin = match section.entry(key) {
            Some(Entry::Parameter(raw)) => Origin::Primary(raw),
            Some(Entry::Section) => {
                return Err(OptionValidationError::UnexpectedSection { path }.into());
            }
            None => match section.default_entry(key) {
                Some(Entry::Parameter(raw)) => Origin::Overlay(raw),
                Some(Entry::Section) => {
                    return Err(OptionValidationError::UnexpectedSection { path }.into());
                }
                None => Origin::Missing,
            },
        };

        let read = match origin {
            Origin::Missing => None,
            _ => Some(section.get(key)?),
        };
        let mut option = match &read {
            Some(value) => ConfigOption::new(path.as_str(), value.clone()),
            None => ConfigOption::undefined(path.as_str()),
        };
        validator.validate_option(&mut option, Some(section))?;
        trace!(option = %path, validator = %validator.kind(), "validated");

        match origin {
            // a stored macro stays a macro
            Origin::Primary(raw) if !raw.is_expr() => section.set(key, option.value)?,
            // an overlay expression is kept only while it reads back as validated
            Origin::Overlay(raw) if !raw.is_expr() || read.as_ref() != Some(&option.value) => {
                section.set_default(key, option.value)?;
            }
            Origin::Missing if option.defined => self.store_default(section, key, validator, option)?,
            _ => {}
        }
        Ok(())
    }

    fn store_default(
        &self,
        section: &Section,
        key: &str,
        validator: &Validator,
        option: ConfigOption,
    ) -> Result<(), SectionalError> {
        if self.use_defaults && section.overlay().is_some() {
            // park the expression only if reading it back yields the validated value
            let value = match validator.default() {
                Some(Value::Expr(expr)) if section.evaluate(expr)? == option.value => {
                    Value::Expr(expr.clone())
                }
                _ => option.value,
            };
            section.set_default(key, value)?;
            debug!(option = %option.name, "default stored in the defaults overlay");
        } else {
            section.set(key, option.value)?;
            debug!(option = %option.name, "default written to the configuration");
        }
        Ok(())
    }

    fn handle_unexpected(&self, section: &Section, key: &str) -> Result<(), SectionalError> {
        match self.unexpected {
            Unexpected::Ignore => Ok(()),
            Unexpected::Remove => {
                section.remove(key)?;
                debug!(key = %section.qualified(key), "unexpected key removed");
                Ok(())
            }
            Unexpected::Complain => {
                let path = section.qualified(key);
                let error = match section.entry(key) {
                    Some(Entry::Section) => OptionValidationError::UnexpectedSection { path },
                    _ => OptionValidationError::UnexpectedOption {
                        path,
                        value: section.get_raw(key)?.repr(),
                    },
                };
                Err(error.into())
            }
        }
    }

    // --- text form ---

    /// Plain mapping form: every validator becomes a call expression such as
    /// `Int(min=1)`, sub-schemas become nested maps and a non-default policy
    /// is stored under [`UNEXPECTED_KEY`].
    pub fn to_map(&self) -> Map {
        let mut map = Map::new();
        if self.unexpected != Unexpected::Complain {
            map.insert(UNEXPECTED_KEY, Expr::name(self.unexpected.name()).call(Vec::new()));
        }
        for (key, entry) in &self.entries {
            match entry {
                SchemaEntry::Option(validator) => {
                    let kwargs = validator
                        .args()
                        .iter()
                        .map(|(name, value)| (name.to_string(), Expr::from(value.clone())))
                        .collect();
                    map.insert(
                        key.as_str(),
                        Expr::name(validator.kind()).call_with(Vec::new(), kwargs),
                    );
                }
                SchemaEntry::Section(schema) => {
                    map.insert(key.as_str(), schema.to_map());
                }
            }
        }
        map
    }

    /// Inverse of [`to_map`](Self::to_map).
    pub fn from_map(map: Map) -> Result<Self, SectionalError> {
        let mut schema = SchemaSection::new();
        for (key, value) in map {
            match value {
                Value::Map(nested) => schema.add_section(&key, Self::from_map(nested)?)?,
                value => {
                    let (kind, args) = validator_call(&value)?;
                    if key == UNEXPECTED_KEY {
                        schema.unexpected = Unexpected::from_name(&kind)
                            .ok_or(SectionalError::UnknownValidator(kind))?;
                    } else {
                        schema.add_option(&key, Validator::new(&kind, args)?)?;
                    }
                }
            }
        }
        Ok(schema)
    }

    /// Indented text form, the layout of [`Section::dump`].
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.write_dump(0, &mut out);
        out
    }

    fn write_dump(&self, depth: usize, out: &mut String) {
        let indent = " ".repeat(depth * 4);
        if self.unexpected != Unexpected::Complain {
            out.push_str(&format!("{indent}{UNEXPECTED_KEY} = {}()\n", self.unexpected.name()));
        }
        for (key, entry) in &self.entries {
            match entry {
                SchemaEntry::Option(validator) => {
                    out.push_str(&format!("{indent}{key} = {}\n", validator.repr()));
                }
                SchemaEntry::Section(schema) => {
                    out.push_str(&format!("{indent}[{key}]\n"));
                    schema.write_dump(depth + 1, out);
                }
            }
        }
    }

    /// Read the text form written by [`dump`](Self::dump).
    pub fn from_text(source: &str) -> Result<Self, SectionalError> {
        Self::from_map(text::parse(source)?)
    }
}

impl Default for SchemaSection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

/// Record a validation failure for `key`, or pass the error on.
fn collect(
    validation: &mut Validation,
    key: &str,
    outcome: Result<(), SectionalError>,
    raise_on_error: bool,
) -> Result<(), SectionalError> {
    match outcome {
        Err(SectionalError::Validation(error)) if !raise_on_error => {
            validation.record(key, error);
            Ok(())
        }
        other => other,
    }
}

/// Split `Kind(arg=...)` into the kind and its keyword arguments. Constant
/// arguments become plain values; anything else stays deferred.
fn validator_call(value: &Value) -> Result<(String, Map), SectionalError> {
    let not_a_validator = || SectionalError::UnknownValidator(value.repr());
    let expr = value.as_expr().ok_or_else(not_a_validator)?;
    let Node::Call {
        callee,
        args,
        kwargs,
    } = expr.node()
    else {
        return Err(not_a_validator());
    };
    let Node::Name { name, .. } = callee.node() else {
        return Err(not_a_validator());
    };
    if !args.is_empty() {
        return Err(SectionalError::InvalidArgument {
            validator: name.clone(),
            arg: "*".into(),
            reason: "validators take keyword arguments only".into(),
        });
    }
    let args = kwargs
        .iter()
        .map(|(arg, expr)| {
            let value = match expr.node() {
                Node::Const(value) => value.clone(),
                _ => Value::Expr(expr.clone()),
            };
            (arg.clone(), value)
        })
        .collect();
    Ok((name.clone(), args))
}
