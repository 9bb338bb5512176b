//! Single-key edits of TOML config files that keep comments and formatting.
//!
//! Uses `toml_edit`. Missing files start out empty and missing parent
//! directories are created.

use std::path::Path;

use toml_edit::{DocumentMut, Item, Table};

use crate::codec::toml::encode_value;
use crate::error::SectionalError;
use crate::expr::{Expr, Node};
use crate::ops::ToolResult;
use crate::section::validate_key;
use crate::value::Value;

/// Split a dotted key into its parent segments and leaf, checking each one.
fn segments(key: &str) -> Result<(Vec<&str>, &str), SectionalError> {
    let mut parts: Vec<&str> = key.split('.').collect();
    for part in &parts {
        validate_key(part).map_err(|_| SectionalError::InvalidKey(key.to_string()))?;
    }
    let leaf = parts.pop().ok_or_else(|| SectionalError::InvalidKey(key.to_string()))?;
    Ok((parts, leaf))
}

fn parse_document(content: &str, key: &str) -> Result<DocumentMut, SectionalError> {
    content
        .parse()
        .map_err(|e: toml_edit::TomlError| SectionalError::InvalidValue {
            key: key.into(),
            reason: e.to_string(),
        })
}

/// Pure function: patch a TOML document string, setting `key` to `raw_value`.
///
/// Intermediate tables are created as needed. Returns the modified document.
pub fn set_in_document(
    content: Option<&str>,
    key: &str,
    raw_value: &str,
) -> Result<String, SectionalError> {
    let mut doc = parse_document(content.unwrap_or_default(), key)?;
    let (parents, leaf) = segments(key)?;
    let value = encode_value(&parse_raw_value(raw_value), key)?;

    let mut current: &mut Item = doc.as_item_mut();
    for segment in parents {
        if current.get(segment).is_none() {
            current[segment] = Item::Table(Table::new());
        }
        current = &mut current[segment];
        if !current.is_table_like() {
            return Err(SectionalError::KeyConflict {
                key: key.into(),
                existing: "parameter",
                requested: "section",
            });
        }
    }
    if matches!(current.get(leaf), Some(Item::Table(_))) {
        return Err(SectionalError::KeyConflict {
            key: key.into(),
            existing: "section",
            requested: "parameter",
        });
    }
    current[leaf] = Item::Value(value);

    Ok(doc.to_string())
}

/// Pure function: remove `key` from a TOML document string.
pub fn unset_in_document(content: &str, key: &str) -> Result<String, SectionalError> {
    let mut doc = parse_document(content, key)?;
    let (parents, leaf) = segments(key)?;
    let not_found = || SectionalError::KeyNotFound(key.into());

    let mut current: &mut Item = doc.as_item_mut();
    for segment in parents {
        current = current.get_mut(segment).ok_or_else(not_found)?;
    }
    current
        .as_table_like_mut()
        .and_then(|table| table.remove(leaf))
        .ok_or_else(not_found)?;

    Ok(doc.to_string())
}

fn read_existing(file_path: &Path) -> Result<Option<String>, SectionalError> {
    match std::fs::read_to_string(file_path) {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SectionalError::IoError {
            path: file_path.to_path_buf(),
            source: e,
        }),
    }
}

fn write(file_path: &Path, content: &str) -> Result<(), SectionalError> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SectionalError::IoError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(file_path, content).map_err(|e| SectionalError::IoError {
        path: file_path.to_path_buf(),
        source: e,
    })
}

/// I/O wrapper: reads the file (if it exists), patches it, writes it back.
pub fn persist_value(
    file_path: &Path,
    key: &str,
    value: &str,
) -> Result<ToolResult, SectionalError> {
    let content = read_existing(file_path)?;
    let new_content = set_in_document(content.as_deref(), key, value)?;
    write(file_path, &new_content)?;

    Ok(ToolResult::ValueSet {
        key: key.into(),
        value: value.into(),
    })
}

/// I/O wrapper: removes `key` from the file. A missing file has no keys.
pub fn unset_value(file_path: &Path, key: &str) -> Result<ToolResult, SectionalError> {
    let content = read_existing(file_path)?.ok_or_else(|| SectionalError::KeyNotFound(key.into()))?;
    let new_content = unset_in_document(&content, key)?;
    write(file_path, &new_content)?;

    Ok(ToolResult::ValueUnset { key: key.into() })
}

/// Literal source (`3`, `1.5`, `'x'`, `[1, 2]`, `True`) becomes that value,
/// as do `true`/`false` in any case. Anything else is kept as a string.
fn parse_raw_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    match Expr::parse(s) {
        Ok(expr) => match expr.node() {
            Node::Const(value) if !matches!(value, Value::Null) => value.clone(),
            _ => Value::from(s),
        },
        Err(_) => Value::from(s),
    }
}
