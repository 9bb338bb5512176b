//! Tool operations: listing, key lookup, validation reports, and result types.
//!
//! Provides the logic behind `show`, `get` and `validate`, and the
//! [`ToolResult`] enum that callers use to display results.

use std::fmt;

use crate::error::SectionalError;
use crate::schema::SchemaSection;
use crate::section::Section;
use crate::store;
use crate::validation::Validation;
use crate::value::{Map, Value};

/// Result of a tool operation. Returned to the caller for display.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// All resolved key-value pairs, flattened to dotted keys.
    Listing { entries: Vec<(String, String)> },
    /// A key's resolved value.
    KeyValue { key: String, value: String },
    /// Validation found nothing to report.
    Valid,
    /// Every validation failure.
    Invalid(Validation),
    /// Confirmation that a value was persisted.
    ValueSet { key: String, value: String },
    /// Confirmation that a value was removed.
    ValueUnset { key: String },
}

impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolResult::Listing { entries } => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                Ok(())
            }
            ToolResult::KeyValue { key, value } => write!(f, "{key} = {value}"),
            ToolResult::Valid => write!(f, "Configuration is valid"),
            ToolResult::Invalid(validation) => {
                writeln!(f, "Configuration is invalid:")?;
                write!(f, "{validation}")
            }
            ToolResult::ValueSet { key, value } => write!(f, "Set {key} = {value}"),
            ToolResult::ValueUnset { key } => write!(f, "Unset {key}"),
        }
    }
}

/// List every resolved value, defaults included, as flattened dotted keys.
pub fn list_values(section: &Section) -> Result<ToolResult, SectionalError> {
    let map = section.as_dict(true, true)?;
    let mut entries = Vec::new();
    flatten_into(&map, "", &mut entries);
    Ok(ToolResult::Listing { entries })
}

fn flatten_into(map: &Map, prefix: &str, entries: &mut Vec<(String, String)>) {
    for (key, value) in map.iter() {
        let path = store::join(prefix, key);
        match value {
            Value::Map(nested) => flatten_into(nested, &path, entries),
            value => entries.push((path, value.repr())),
        }
    }
}

/// Get a resolved value by dotted key (e.g. `"database.url"`). A key naming
/// a sub-section shows its text dump.
pub fn get_value(section: &Section, key: &str) -> Result<ToolResult, SectionalError> {
    let value = lookup(section, key)?;
    let value = match value {
        Value::Section(sub) => sub.dump().trim_end().to_string(),
        value => value.repr(),
    };
    Ok(ToolResult::KeyValue {
        key: key.into(),
        value,
    })
}

/// Navigate `section` by dotted key path, evaluating the leaf.
pub fn lookup(section: &Section, dotted_key: &str) -> Result<Value, SectionalError> {
    let (path, leaf) = match dotted_key.rsplit_once('.') {
        Some((p, l)) => (Some(p), l),
        None => (None, dotted_key),
    };

    let mut current = section.clone();
    if let Some(path) = path {
        for segment in path.split('.') {
            if !current.has_section(segment) {
                return Err(SectionalError::KeyNotFound(dotted_key.into()));
            }
            current = current.get_section(segment)?;
        }
    }

    if !current.has_key(leaf) {
        return Err(SectionalError::KeyNotFound(dotted_key.into()));
    }
    current.get(leaf)
}

/// Validate without raising and report the outcome.
pub fn validate(schema: &SchemaSection, section: &Section) -> Result<ToolResult, SectionalError> {
    let validation = schema.validate(section, false)?;
    if validation.is_empty() {
        Ok(ToolResult::Valid)
    } else {
        Ok(ToolResult::Invalid(validation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fixtures::test::sample_schema;
    use crate::macros::root;
    use crate::map;

    fn sample() -> Config {
        let config = Config::from_map(map! {
            "name" => "api",
            "port" => 9000,
            "limits" => map! { "low" => 5, "high" => root().item("limits").item("low") * 3 },
        })
        .unwrap();
        config.set_defaults(map! { "mode" => "fast" }).unwrap();
        config
    }

    #[test]
    fn listing_flattens_and_includes_defaults() {
        let config = sample();
        match list_values(&config).unwrap() {
            ToolResult::Listing { entries } => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["name", "port", "limits.low", "limits.high", "mode"]);
                assert_eq!(entries[0].1, "'api'");
                assert_eq!(entries[3].1, "15");
            }
            other => panic!("Expected Listing, got {other:?}"),
        }
    }

    #[test]
    fn get_nested_key_evaluates() {
        let config = sample();
        assert_eq!(
            get_value(&config, "limits.high").unwrap(),
            ToolResult::KeyValue {
                key: "limits.high".into(),
                value: "15".into()
            }
        );
    }

    #[test]
    fn get_section_shows_dump() {
        let config = sample();
        match get_value(&config, "limits").unwrap() {
            ToolResult::KeyValue { value, .. } => {
                assert_eq!(value, "low = 5\nhigh = ROOT['limits']['low'] * 3");
            }
            other => panic!("Expected KeyValue, got {other:?}"),
        }
    }

    #[test]
    fn get_missing_keys() {
        let config = sample();
        for key in ["nope", "limits.nope", "port.x", "nope.low"] {
            assert!(
                matches!(get_value(&config, key), Err(SectionalError::KeyNotFound(_))),
                "{key}"
            );
        }
    }

    #[test]
    fn validate_reports() {
        let config = sample();
        assert_eq!(validate(&sample_schema(), &config).unwrap(), ToolResult::Valid);

        let bad = Config::from_map(map! { "port" => 0 }).unwrap();
        match validate(&sample_schema(), &bad).unwrap() {
            ToolResult::Invalid(validation) => {
                assert!(validation.error("name").is_some());
                assert!(validation.error("port").is_some());
            }
            other => panic!("Expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn listing_display_format() {
        let result = ToolResult::Listing {
            entries: vec![
                ("host".into(), "'localhost'".into()),
                ("port".into(), "8080".into()),
            ],
        };
        assert_eq!(format!("{result}"), "host = 'localhost'\nport = 8080");
        assert_eq!(format!("{}", ToolResult::ValueUnset { key: "a.b".into() }), "Unset a.b");
    }
}
