//! TOML. Reading goes through `toml`, writing through `toml_edit` so that
//! expression and tuple markers come out as inline tables and stay in place.
//!
//! TOML has no null, so `None` values cannot be written. Within one table,
//! parameters are always written before sub-sections.

use toml_edit::{Array, DocumentMut, InlineTable, Item, Table};

use crate::codec::json::parse_expr;
use crate::codec::{Codec, EXPR_KEY, TUPLE_KEY};
use crate::error::SectionalError;
use crate::store;
use crate::value::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct TomlCodec;

impl Codec for TomlCodec {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["toml"]
    }

    fn to_string(&self, map: &Map) -> Result<String, SectionalError> {
        let table = encode_table(map, "")?;
        Ok(DocumentMut::from(table).to_string())
    }

    fn from_string(&self, source: &str) -> Result<Map, SectionalError> {
        let table: toml::Table = toml::from_str(source).map_err(|e| SectionalError::Parse {
            line: e
                .span()
                .map(|span| line_of(source, span.start))
                .unwrap_or(1),
            reason: e.message().to_string(),
        })?;
        decode_table(table, "")
    }
}

/// 1-based line of byte `offset`.
fn line_of(source: &str, offset: usize) -> usize {
    source
        .get(..offset)
        .map_or(1, |head| head.matches('\n').count() + 1)
}

fn encode_table(map: &Map, prefix: &str) -> Result<Table, SectionalError> {
    let mut table = Table::new();
    for (key, value) in map.iter() {
        let path = store::join(prefix, key);
        let item = match value {
            Value::Map(nested) => Item::Table(encode_table(nested, &path)?),
            value => Item::Value(encode_value(value, &path)?),
        };
        table.insert(key, item);
    }
    Ok(table)
}

fn marker(key: &str, value: toml_edit::Value) -> toml_edit::Value {
    let mut table = InlineTable::new();
    table.insert(key, value);
    toml_edit::Value::InlineTable(table)
}

pub(crate) fn encode_value(value: &Value, path: &str) -> Result<toml_edit::Value, SectionalError> {
    Ok(match value {
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => (*i).into(),
        Value::Float(f) => (*f).into(),
        Value::Str(s) => s.as_str().into(),
        Value::List(items) => toml_edit::Value::Array(encode_items(items, path)?),
        Value::Tuple(items) => marker(TUPLE_KEY, toml_edit::Value::Array(encode_items(items, path)?)),
        Value::Map(map) => {
            let mut inline = InlineTable::new();
            for (key, value) in map.iter() {
                inline.insert(key, encode_value(value, &store::join(path, key))?);
            }
            toml_edit::Value::InlineTable(inline)
        }
        Value::Expr(expr) => marker(EXPR_KEY, expr.unparse().into()),
        Value::Null | Value::Section(_) | Value::Function(_) => {
            return Err(SectionalError::UnsupportedValue {
                key: path.to_string(),
                type_name: value.type_name(),
            });
        }
    })
}

fn encode_items(items: &[Value], path: &str) -> Result<Array, SectionalError> {
    items.iter().map(|item| encode_value(item, path)).collect()
}

fn decode_table(table: toml::Table, prefix: &str) -> Result<Map, SectionalError> {
    let mut map = Map::new();
    for (key, value) in table {
        let path = store::join(prefix, &key);
        let value = decode(value, &path)?;
        map.insert(key, value);
    }
    Ok(map)
}

fn decode(value: toml::Value, path: &str) -> Result<Value, SectionalError> {
    Ok(match value {
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Integer(i) => Value::Int(i),
        toml::Value::Float(f) => Value::Float(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::List(decode_items(items, path)?),
        toml::Value::Table(mut table) if table.len() == 1 => {
            if let Some(toml::Value::String(source)) = table.get(EXPR_KEY) {
                Value::Expr(parse_expr(source, path)?)
            } else if let Some(toml::Value::Array(items)) = table.remove(TUPLE_KEY) {
                Value::Tuple(decode_items(items, path)?)
            } else {
                Value::Map(decode_table(table, path)?)
            }
        }
        toml::Value::Table(table) => Value::Map(decode_table(table, path)?),
    })
}

fn decode_items(items: Vec<toml::Value>, path: &str) -> Result<Vec<Value>, SectionalError> {
    items.into_iter().map(|item| decode(item, path)).collect()
}
