//! Single validation rules.
//!
//! A [`Check`] looks at one [`ConfigOption`] and either accepts it, rewrites
//! it (filling a default, coercing an int into a float) or rejects it with an
//! [`OptionValidationError`]. Check arguments may be expressions; they are
//! evaluated against the section being validated. Without a section (while a
//! validator checks its own arguments) a check with a deferred argument
//! passes, and a deferred option value is never checked at all.

use std::cmp::Ordering;
use std::fmt;

use crate::error::SectionalError;
use crate::expr::eval::{compare_values, values_equal};
use crate::option::ConfigOption;
use crate::section::Section;
use crate::validation::OptionValidationError;
use crate::value::{Value, ValueType};

pub trait Check: fmt::Debug {
    fn check(&self, option: &mut ConfigOption, section: Option<&Section>)
    -> Result<(), SectionalError>;
}

/// Value of a check argument, or `None` when it is deferred and there is no
/// section to evaluate it against.
fn resolve(arg: &Value, section: Option<&Section>) -> Result<Option<Value>, SectionalError> {
    match (arg, section) {
        (Value::Expr(expr), Some(section)) => Ok(Some(section.evaluate(expr)?)),
        (Value::Expr(_), None) => Ok(None),
        (value, _) => Ok(Some(value.clone())),
    }
}

/// The option value if there is something concrete to check.
fn subject(option: &ConfigOption) -> Option<&Value> {
    (option.defined && !option.value.is_expr()).then_some(&option.value)
}

/// Fills an undefined option from `default`; without a default the option is required.
#[derive(Debug, Clone)]
pub struct CheckDefault {
    pub default: Option<Value>,
}

impl Check for CheckDefault {
    fn check(
        &self,
        option: &mut ConfigOption,
        section: Option<&Section>,
    ) -> Result<(), SectionalError> {
        if option.defined {
            return Ok(());
        }
        let Some(default) = &self.default else {
            return Err(OptionValidationError::MissingRequiredOption {
                path: option.name.clone(),
            }
            .into());
        };
        if let Some(value) = resolve(default, section)? {
            option.value = value;
            option.defined = true;
        }
        Ok(())
    }
}

/// Accepts `primary`, and `secondary` types converted to `primary`.
#[derive(Debug, Clone)]
pub struct CheckType {
    pub primary: ValueType,
    pub secondary: &'static [ValueType],
}

impl CheckType {
    pub fn new(primary: ValueType) -> Self {
        CheckType {
            primary,
            secondary: &[],
        }
    }
}

fn coerce(value: &Value, target: ValueType) -> Option<Value> {
    match (value, target) {
        (Value::Int(i), ValueType::Float) => Some(Value::Float(*i as f64)),
        (Value::Tuple(items), ValueType::List) => Some(Value::List(items.clone())),
        (Value::List(items), ValueType::Tuple) => Some(Value::Tuple(items.clone())),
        _ => None,
    }
}

impl Check for CheckType {
    fn check(&self, option: &mut ConfigOption, _: Option<&Section>) -> Result<(), SectionalError> {
        let Some(value) = subject(option) else {
            return Ok(());
        };
        let actual = value.value_type();
        if actual == self.primary {
            return Ok(());
        }
        if self.secondary.contains(&actual) {
            if let Some(converted) = coerce(value, self.primary) {
                option.value = converted;
                return Ok(());
            }
        }
        Err(OptionValidationError::InvalidType {
            path: option.name.clone(),
            value: value.repr(),
            expected: self.primary.name().to_string(),
        }
        .into())
    }
}

/// The value must equal one of `choices` (a sequence, possibly deferred).
#[derive(Debug, Clone)]
pub struct CheckChoice {
    pub choices: Value,
}

impl Check for CheckChoice {
    fn check(
        &self,
        option: &mut ConfigOption,
        section: Option<&Section>,
    ) -> Result<(), SectionalError> {
        let Some(value) = subject(option) else {
            return Ok(());
        };
        let Some(choices) = resolve(&self.choices, section)? else {
            return Ok(());
        };
        let allowed = choices
            .as_seq()
            .is_some_and(|items| items.iter().any(|c| values_equal(c, value)));
        if allowed {
            Ok(())
        } else {
            Err(OptionValidationError::InvalidChoice {
                path: option.name.clone(),
                value: value.repr(),
                choices: choices.repr(),
            }
            .into())
        }
    }
}

/// Lower bound.
#[derive(Debug, Clone)]
pub struct CheckMin {
    pub min: Value,
}

impl Check for CheckMin {
    fn check(
        &self,
        option: &mut ConfigOption,
        section: Option<&Section>,
    ) -> Result<(), SectionalError> {
        let Some(value) = subject(option) else {
            return Ok(());
        };
        let Some(min) = resolve(&self.min, section)? else {
            return Ok(());
        };
        if compare_values(value, &min) == Some(Ordering::Less) {
            return Err(OptionValidationError::MinValue {
                path: option.name.clone(),
                value: value.repr(),
                min: min.repr(),
            }
            .into());
        }
        Ok(())
    }
}

/// Upper bound.
#[derive(Debug, Clone)]
pub struct CheckMax {
    pub max: Value,
}

impl Check for CheckMax {
    fn check(
        &self,
        option: &mut ConfigOption,
        section: Option<&Section>,
    ) -> Result<(), SectionalError> {
        let Some(value) = subject(option) else {
            return Ok(());
        };
        let Some(max) = resolve(&self.max, section)? else {
            return Ok(());
        };
        if compare_values(value, &max) == Some(Ordering::Greater) {
            return Err(OptionValidationError::MaxValue {
                path: option.name.clone(),
                value: value.repr(),
                max: max.repr(),
            }
            .into());
        }
        Ok(())
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Str(s) => Some(s.chars().count()),
        Value::List(items) | Value::Tuple(items) => Some(items.len()),
        Value::Map(map) => Some(map.len()),
        _ => None,
    }
}

fn length_bound(bound: &Value, arg: &str) -> Result<usize, SectionalError> {
    bound
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| SectionalError::InvalidArgument {
            validator: "length check".into(),
            arg: arg.into(),
            reason: format!("expected a non-negative int, got {}", bound.repr()),
        })
}

/// Minimum length of a string or sequence.
#[derive(Debug, Clone)]
pub struct CheckMinLen {
    pub min_len: Value,
}

impl Check for CheckMinLen {
    fn check(
        &self,
        option: &mut ConfigOption,
        section: Option<&Section>,
    ) -> Result<(), SectionalError> {
        let Some(value) = subject(option) else {
            return Ok(());
        };
        let Some(bound) = resolve(&self.min_len, section)? else {
            return Ok(());
        };
        let min_len = length_bound(&bound, "min_len")?;
        match length_of(value) {
            Some(len) if len < min_len => Err(OptionValidationError::MinLength {
                path: option.name.clone(),
                value: value.repr(),
                len,
                min_len: bound.repr(),
            }
            .into()),
            _ => Ok(()),
        }
    }
}

/// Maximum length of a string or sequence.
#[derive(Debug, Clone)]
pub struct CheckMaxLen {
    pub max_len: Value,
}

impl Check for CheckMaxLen {
    fn check(
        &self,
        option: &mut ConfigOption,
        section: Option<&Section>,
    ) -> Result<(), SectionalError> {
        let Some(value) = subject(option) else {
            return Ok(());
        };
        let Some(bound) = resolve(&self.max_len, section)? else {
            return Ok(());
        };
        let max_len = length_bound(&bound, "max_len")?;
        match length_of(value) {
            Some(len) if len > max_len => Err(OptionValidationError::MaxLength {
                path: option.name.clone(),
                value: value.repr(),
                len,
                max_len: bound.repr(),
            }
            .into()),
            _ => Ok(()),
        }
    }
}
