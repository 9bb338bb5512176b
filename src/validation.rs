//! Validation findings.
//!
//! [`OptionValidationError`] is the closed set of things that can be wrong
//! with one option. A validation run collects them into a [`Validation`]
//! tree shaped like the schema, holding only the paths that failed.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// A single validation failure. Every variant carries the dotted path of the
/// option and renders a message with the offending values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionValidationError {
    #[error("{path}: required option is missing")]
    MissingRequiredOption { path: String },

    #[error("{path}: invalid value {value}: expected {expected}")]
    InvalidType {
        path: String,
        value: String,
        expected: String,
    },

    #[error("{path}: value {value} is lower than min {min}")]
    MinValue {
        path: String,
        value: String,
        min: String,
    },

    #[error("{path}: value {value} is greater than max {max}")]
    MaxValue {
        path: String,
        value: String,
        max: String,
    },

    #[error("{path}: value {value} is not one of {choices}")]
    InvalidChoice {
        path: String,
        value: String,
        choices: String,
    },

    #[error("{path}: value {value} has length {len}, lower than min_len {min_len}")]
    MinLength {
        path: String,
        value: String,
        len: usize,
        min_len: String,
    },

    #[error("{path}: value {value} has length {len}, greater than max_len {max_len}")]
    MaxLength {
        path: String,
        value: String,
        len: usize,
        max_len: String,
    },

    #[error("{path}: unexpected section")]
    UnexpectedSection { path: String },

    #[error("{path}: unexpected option with value {value}")]
    UnexpectedOption { path: String, value: String },
}

impl OptionValidationError {
    /// Dotted path of the offending option or section.
    pub fn path(&self) -> &str {
        match self {
            OptionValidationError::MissingRequiredOption { path }
            | OptionValidationError::InvalidType { path, .. }
            | OptionValidationError::MinValue { path, .. }
            | OptionValidationError::MaxValue { path, .. }
            | OptionValidationError::InvalidChoice { path, .. }
            | OptionValidationError::MinLength { path, .. }
            | OptionValidationError::MaxLength { path, .. }
            | OptionValidationError::UnexpectedSection { path }
            | OptionValidationError::UnexpectedOption { path, .. } => path,
        }
    }

    /// Short name of the error kind, used by the serializers.
    pub fn kind(&self) -> &'static str {
        match self {
            OptionValidationError::MissingRequiredOption { .. } => "MissingRequiredOptionError",
            OptionValidationError::InvalidType { .. } => "InvalidTypeError",
            OptionValidationError::MinValue { .. } => "MinValueError",
            OptionValidationError::MaxValue { .. } => "MaxValueError",
            OptionValidationError::InvalidChoice { .. } => "InvalidChoiceError",
            OptionValidationError::MinLength { .. } => "MinLengthError",
            OptionValidationError::MaxLength { .. } => "MaxLengthError",
            OptionValidationError::UnexpectedSection { .. } => "UnexpectedSectionError",
            OptionValidationError::UnexpectedOption { .. } => "UnexpectedOptionError",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationEntry {
    Error(OptionValidationError),
    Section(Validation),
}

/// Sparse tree of validation errors. Empty sub-trees are never attached, so
/// a tree is non-empty exactly when it or a descendant holds an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    entries: Vec<(String, ValidationEntry)>,
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of direct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&ValidationEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    /// Error recorded directly at `key`.
    pub fn error(&self, key: &str) -> Option<&OptionValidationError> {
        match self.get(key)? {
            ValidationEntry::Error(e) => Some(e),
            ValidationEntry::Section(_) => None,
        }
    }

    /// Sub-tree recorded at `key`.
    pub fn section(&self, key: &str) -> Option<&Validation> {
        match self.get(key)? {
            ValidationEntry::Section(v) => Some(v),
            ValidationEntry::Error(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValidationEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub(crate) fn record(&mut self, key: &str, error: OptionValidationError) {
        self.entries
            .push((key.to_string(), ValidationEntry::Error(error)));
    }

    /// Attach `sub` under `key` unless it is empty.
    pub(crate) fn attach(&mut self, key: &str, sub: Validation) {
        if !sub.is_empty() {
            self.entries
                .push((key.to_string(), ValidationEntry::Section(sub)));
        }
    }

    /// Every error in the tree, depth first.
    pub fn errors(&self) -> Vec<&OptionValidationError> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a OptionValidationError>) {
        for (_, entry) in &self.entries {
            match entry {
                ValidationEntry::Error(e) => out.push(e),
                ValidationEntry::Section(sub) => sub.collect(out),
            }
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors().into_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}: {error}", error.kind())?;
        }
        Ok(())
    }
}

/// Serializes as nested maps of `key -> "Kind: message"`.
impl Serialize for Validation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            match entry {
                ValidationEntry::Error(e) => {
                    map.serialize_entry(key, &format!("{}: {e}", e.kind()))?
                }
                ValidationEntry::Section(sub) => map.serialize_entry(key, sub)?,
            }
        }
        map.end()
    }
}
