//! Validators: named pipelines of checks built from keyword arguments.
//!
//! ```
//! use sectional::{map, Validator, Value};
//!
//! let port = Validator::new("Int", map! { "min" => 1, "max" => 65535, "default" => 8080 }).unwrap();
//! assert_eq!(port.repr(), "Int(min=1, max=65535, default=8080)");
//! assert_eq!(port.validate(443).unwrap(), Value::Int(443));
//! assert!(port.validate(0).is_err());
//! ```
//!
//! Kinds are looked up in a static table ([`kinds`]). Sequence kinds
//! (`IntList`, `StrTuple`, ...) build a second validator for their items
//! from the `item_`-prefixed arguments, so `IntList(min_len=1, item_max=10)`
//! bounds the list length and every element.

use std::fmt;
use std::rc::Rc;

use crate::check::{
    Check, CheckChoice, CheckDefault, CheckMax, CheckMaxLen, CheckMin, CheckMinLen, CheckType,
};
use crate::error::SectionalError;
use crate::option::ConfigOption;
use crate::section::Section;
use crate::value::{Map, Value, ValueType};

const ITEM_PREFIX: &str = "item_";

/// Hands keyword arguments out to check factories and remembers what is left.
struct ArgBinder<'a> {
    validator: &'a str,
    args: Map,
}

impl<'a> ArgBinder<'a> {
    fn new(validator: &'a str, args: Map) -> Self {
        ArgBinder { validator, args }
    }

    fn take(&mut self, name: &str) -> Option<Value> {
        self.args.remove(name)
    }

    /// Remove every `prefix`ed argument, returned with the prefix stripped.
    fn take_prefixed(&mut self, prefix: &str) -> Map {
        let names: Vec<String> = self
            .args
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(str::to_string)
            .collect();
        let mut out = Map::new();
        for name in names {
            if let Some(value) = self.args.remove(&name) {
                out.insert(&name[prefix.len()..], value);
            }
        }
        out
    }

    fn invalid(&self, arg: &str, reason: impl Into<String>) -> SectionalError {
        SectionalError::InvalidArgument {
            validator: self.validator.to_string(),
            arg: arg.to_string(),
            reason: reason.into(),
        }
    }

    /// A `choices` argument must be a sequence (or deferred).
    fn take_choices(&mut self) -> Result<Option<Value>, SectionalError> {
        match self.take("choices") {
            Some(v @ (Value::List(_) | Value::Tuple(_) | Value::Expr(_))) => Ok(Some(v)),
            Some(other) => Err(self.invalid(
                "choices",
                format!("expected a sequence, got {}", other.type_name()),
            )),
            None => Ok(None),
        }
    }

    /// A length bound must be a non-negative int (or deferred).
    fn take_length(&mut self, name: &str) -> Result<Option<Value>, SectionalError> {
        match self.take(name) {
            Some(Value::Int(n)) if n < 0 => Err(self.invalid(name, "must not be negative")),
            Some(v @ (Value::Int(_) | Value::Expr(_))) => Ok(Some(v)),
            Some(other) => Err(self.invalid(
                name,
                format!("expected an int, got {}", other.type_name()),
            )),
            None => Ok(None),
        }
    }

    fn finish(self) -> Result<(), SectionalError> {
        if self.args.is_empty() {
            return Ok(());
        }
        Err(SectionalError::UnexpectedArguments {
            validator: self.validator.to_string(),
            names: self.args.keys().map(str::to_string).collect(),
        })
    }
}

/// What a factory hands back to [`Validator::new`].
struct Pipeline {
    checks: Vec<Rc<dyn Check>>,
    item: Option<Box<Validator>>,
    /// Arguments fed back through the pipeline once it is built.
    probes: Vec<(&'static str, Value)>,
}

impl Pipeline {
    fn new() -> Self {
        Pipeline {
            checks: Vec::new(),
            item: None,
            probes: Vec::new(),
        }
    }

    fn push(&mut self, check: impl Check + 'static) {
        self.checks.push(Rc::new(check));
    }

    fn probe(&mut self, arg: &'static str, value: &Value) {
        if !value.is_expr() {
            self.probes.push((arg, value.clone()));
        }
    }
}

type Factory = fn(&mut ArgBinder<'_>) -> Result<Pipeline, SectionalError>;

static REGISTRY: &[(&str, Factory)] = &[
    ("Any", any),
    ("Int", int),
    ("Float", float),
    ("Str", string),
    ("Bool", boolean),
    ("IntList", int_list),
    ("FloatList", float_list),
    ("StrList", str_list),
    ("BoolList", bool_list),
    ("IntTuple", int_tuple),
    ("FloatTuple", float_tuple),
    ("StrTuple", str_tuple),
    ("BoolTuple", bool_tuple),
];

/// Names of every registered validator kind.
pub fn kinds() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(name, _)| *name)
}

fn lookup(kind: &str) -> Option<(&'static str, Factory)> {
    REGISTRY
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(name, factory)| (*name, *factory))
}

/// `None` as a default means "no default": the option is required.
fn default_check(binder: &mut ArgBinder<'_>, pipeline: &mut Pipeline) {
    let default = binder.take("default").filter(|v| *v != Value::Null);
    if let Some(value) = &default {
        pipeline.probe("default", value);
    }
    pipeline.push(CheckDefault { default });
}

fn choice_check(binder: &mut ArgBinder<'_>, pipeline: &mut Pipeline) -> Result<(), SectionalError> {
    if let Some(choices) = binder.take_choices()? {
        if let Some(items) = choices.as_seq() {
            for item in items {
                pipeline.probe("choices", item);
            }
        }
        pipeline.push(CheckChoice { choices });
    }
    Ok(())
}

fn bound_checks(binder: &mut ArgBinder<'_>, pipeline: &mut Pipeline) {
    if let Some(min) = binder.take("min") {
        pipeline.probe("min", &min);
        pipeline.push(CheckMin { min });
    }
    if let Some(max) = binder.take("max") {
        pipeline.probe("max", &max);
        pipeline.push(CheckMax { max });
    }
}

fn length_checks(binder: &mut ArgBinder<'_>, pipeline: &mut Pipeline) -> Result<(), SectionalError> {
    if let Some(min_len) = binder.take_length("min_len")? {
        pipeline.push(CheckMinLen { min_len });
    }
    if let Some(max_len) = binder.take_length("max_len")? {
        pipeline.push(CheckMaxLen { max_len });
    }
    Ok(())
}

fn any(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    let mut pipeline = Pipeline::new();
    default_check(binder, &mut pipeline);
    Ok(pipeline)
}

fn numeric(binder: &mut ArgBinder<'_>, check: CheckType) -> Result<Pipeline, SectionalError> {
    let mut pipeline = Pipeline::new();
    default_check(binder, &mut pipeline);
    pipeline.push(check);
    choice_check(binder, &mut pipeline)?;
    bound_checks(binder, &mut pipeline);
    Ok(pipeline)
}

fn int(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    numeric(binder, CheckType::new(ValueType::Int))
}

fn float(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    numeric(
        binder,
        CheckType {
            primary: ValueType::Float,
            secondary: &[ValueType::Int],
        },
    )
}

fn string(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    let mut pipeline = Pipeline::new();
    default_check(binder, &mut pipeline);
    pipeline.push(CheckType::new(ValueType::Str));
    choice_check(binder, &mut pipeline)?;
    length_checks(binder, &mut pipeline)?;
    Ok(pipeline)
}

fn boolean(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    let mut pipeline = Pipeline::new();
    default_check(binder, &mut pipeline);
    pipeline.push(CheckType::new(ValueType::Bool));
    choice_check(binder, &mut pipeline)?;
    Ok(pipeline)
}

fn sequence(
    binder: &mut ArgBinder<'_>,
    container: ValueType,
    item_kind: &str,
) -> Result<Pipeline, SectionalError> {
    let item_args = binder.take_prefixed(ITEM_PREFIX);
    let mut pipeline = Pipeline::new();
    pipeline.item = Some(Box::new(Validator::new(item_kind, item_args)?));
    default_check(binder, &mut pipeline);
    pipeline.push(CheckType::new(container));
    length_checks(binder, &mut pipeline)?;
    Ok(pipeline)
}

fn int_list(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    sequence(binder, ValueType::List, "Int")
}

fn float_list(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    sequence(binder, ValueType::List, "Float")
}

fn str_list(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    sequence(binder, ValueType::List, "Str")
}

fn bool_list(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    sequence(binder, ValueType::List, "Bool")
}

fn int_tuple(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    sequence(binder, ValueType::Tuple, "Int")
}

fn float_tuple(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    sequence(binder, ValueType::Tuple, "Float")
}

fn str_tuple(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    sequence(binder, ValueType::Tuple, "Str")
}

fn bool_tuple(binder: &mut ArgBinder<'_>) -> Result<Pipeline, SectionalError> {
    sequence(binder, ValueType::Tuple, "Bool")
}

/// A schema leaf: an ordered list of checks plus the arguments it was built from.
#[derive(Clone)]
pub struct Validator {
    kind: &'static str,
    args: Map,
    checks: Vec<Rc<dyn Check>>,
    item: Option<Box<Validator>>,
}

impl Validator {
    /// Build the validator `kind` from keyword arguments. Fails on unknown
    /// kinds, leftover arguments, and concrete arguments the pipeline itself
    /// rejects (a default below `min`, a choice of the wrong type, ...).
    pub fn new(kind: &str, args: Map) -> Result<Self, SectionalError> {
        let (kind, factory) =
            lookup(kind).ok_or_else(|| SectionalError::UnknownValidator(kind.to_string()))?;
        let mut binder = ArgBinder::new(kind, args.clone());
        let pipeline = factory(&mut binder)?;
        binder.finish()?;

        let validator = Validator {
            kind,
            args,
            checks: pipeline.checks,
            item: pipeline.item,
        };
        for (arg, value) in pipeline.probes {
            let mut option = ConfigOption::new(arg, value);
            validator
                .validate_option(&mut option, None)
                .map_err(|err| SectionalError::InvalidArgument {
                    validator: kind.to_string(),
                    arg: arg.to_string(),
                    reason: err.to_string(),
                })?;
        }
        Ok(validator)
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The arguments this validator was built from, in their original order.
    pub fn args(&self) -> &Map {
        &self.args
    }

    /// The `default` argument as written, possibly an expression.
    pub fn default(&self) -> Option<&Value> {
        self.args.get("default").filter(|v| **v != Value::Null)
    }

    /// Validator applied to every element of a sequence kind.
    pub fn item(&self) -> Option<&Validator> {
        self.item.as_deref()
    }

    /// Run every check in order, stopping at the first failure. Sequence
    /// values are then checked element by element and rebuilt with their
    /// original container type.
    pub fn validate_option(
        &self,
        option: &mut ConfigOption,
        section: Option<&Section>,
    ) -> Result<(), SectionalError> {
        for check in &self.checks {
            check.check(option, section)?;
        }
        let Some(item) = &self.item else {
            return Ok(());
        };
        if !option.defined {
            return Ok(());
        }
        let (items, tuple) = match &option.value {
            Value::List(items) => (items, false),
            Value::Tuple(items) => (items, true),
            _ => return Ok(()),
        };
        let mut checked = Vec::with_capacity(items.len());
        for (index, value) in items.iter().enumerate() {
            let mut element = option.item(index, value.clone());
            item.validate_option(&mut element, section)?;
            checked.push(element.value);
        }
        option.value = if tuple {
            Value::Tuple(checked)
        } else {
            Value::List(checked)
        };
        Ok(())
    }

    /// Validate a standalone value, outside of any section.
    pub fn validate(&self, value: impl Into<Value>) -> Result<Value, SectionalError> {
        let mut option = ConfigOption::new("value", value);
        self.validate_option(&mut option, None)?;
        Ok(option.value)
    }

    /// Source form, e.g. `Int(min=1, default=3)`.
    pub fn repr(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|(name, value)| format!("{name}={}", value.repr()))
            .collect();
        format!("{}({})", self.kind, args.join(", "))
    }
}

impl PartialEq for Validator {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.args == other.args
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}
