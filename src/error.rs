use std::path::PathBuf;

use thiserror::Error;

use crate::validation::{OptionValidationError, Validation};

/// Failure while evaluating a deferred expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    NameLookup(String),

    #[error("unsupported operand types for {op}: '{left}' and '{right}'")]
    UnsupportedOperand {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("bad operand type for {op}: '{operand}'")]
    UnsupportedUnary {
        op: &'static str,
        operand: &'static str,
    },

    #[error("division by zero")]
    ZeroDivision,

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("key '{0}' not found")]
    MissingKey(String),

    #[error("'{0}' object is not callable")]
    NotCallable(&'static str),

    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    #[error("evaluation exceeded depth {0} (self-referencing macro?)")]
    RecursionLimit(usize),

    #[error("{function}(): {reason}")]
    Call { function: String, reason: String },
}

/// Every fallible operation of the crate returns this error.
#[derive(Debug, Error)]
pub enum SectionalError {
    #[error("Invalid key '{0}': keys must be identifiers")]
    InvalidKey(String),

    #[error("Cannot replace {existing} '{key}' with a {requested}: delete it first")]
    KeyConflict {
        key: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("'{0}' is a parameter, not a section")]
    NotASection(String),

    #[error("Evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("Unknown validator '{0}'")]
    UnknownValidator(String),

    #[error("{validator}: unexpected argument(s) {}", .names.join(", "))]
    UnexpectedArguments {
        validator: String,
        names: Vec<String>,
    },

    #[error("{validator}: invalid argument '{arg}': {reason}")]
    InvalidArgument {
        validator: String,
        arg: String,
        reason: String,
    },

    #[error(transparent)]
    Validation(#[from] OptionValidationError),

    #[error("Invalid configuration:\n{0}")]
    InvalidConfig(Validation),

    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Cannot serialize value of type '{type_name}' at '{key}'")]
    UnsupportedValue { key: String, type_name: &'static str },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to encode: {0}")]
    Encode(String),

    #[error("Unknown codec '{0}'")]
    UnknownCodec(String),

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("App name is required: call .app_name() on the loader")]
    AppNameRequired,

    #[error("No persist path configured: call .persist_path() on the loader")]
    NoPersistPath,

    #[error("No schema configured: call .schema() or .schema_file() on the loader")]
    NoSchema,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_conflict_formats() {
        let err = SectionalError::KeyConflict {
            key: "options".into(),
            existing: "section",
            requested: "parameter",
        };
        let msg = err.to_string();
        assert!(msg.contains("options"));
        assert!(msg.contains("delete it first"));
    }

    #[test]
    fn unexpected_arguments_lists_names() {
        let err = SectionalError::UnexpectedArguments {
            validator: "Int".into(),
            names: vec!["mni".into(), "defualt".into()],
        };
        assert_eq!(err.to_string(), "Int: unexpected argument(s) mni, defualt");
    }

    #[test]
    fn eval_error_converts() {
        let err: SectionalError = EvalError::NameLookup("ROOT".into()).into();
        assert!(err.to_string().contains("'ROOT' is not defined"));
    }

    #[test]
    fn app_name_required_formats() {
        let err = SectionalError::AppNameRequired;
        assert!(err.to_string().contains("app_name"));
    }
}
