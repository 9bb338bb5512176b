use crate::value::Value;

/// One option under validation: its dotted path, its current value and
/// whether it was present at all. Checks may rewrite both `value` and
/// `defined` (filling a default, coercing a type).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    pub name: String,
    pub value: Value,
    pub defined: bool,
}

impl ConfigOption {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        ConfigOption {
            name: name.into(),
            value: value.into(),
            defined: true,
        }
    }

    pub fn undefined(name: impl Into<String>) -> Self {
        ConfigOption {
            name: name.into(),
            value: Value::Null,
            defined: false,
        }
    }

    /// Same option with another value, for per-item sequence checks.
    pub(crate) fn item(&self, index: usize, value: Value) -> Self {
        ConfigOption {
            name: format!("{}[{index}]", self.name),
            value,
            defined: true,
        }
    }
}
