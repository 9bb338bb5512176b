//! JSON through `serde_json`.
//!
//! Tuples are written as `{"__tuple__": [...]}` and expressions as
//! `{"__expr__": "<source>"}`; both are recognised on the way back in.

use serde_json::Value as Json;

use crate::codec::{Codec, EXPR_KEY, TUPLE_KEY};
use crate::error::SectionalError;
use crate::expr::Expr;
use crate::store;
use crate::value::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn to_string(&self, map: &Map) -> Result<String, SectionalError> {
        let json = encode_map(map, "")?;
        let mut text = serde_json::to_string_pretty(&json)
            .map_err(|e| SectionalError::Encode(e.to_string()))?;
        text.push('\n');
        Ok(text)
    }

    fn from_string(&self, source: &str) -> Result<Map, SectionalError> {
        let json: Json = serde_json::from_str(source).map_err(|e| SectionalError::Parse {
            line: e.line(),
            reason: e.to_string(),
        })?;
        match json {
            Json::Object(object) => decode_object(object, ""),
            _ => Err(SectionalError::Parse {
                line: 1,
                reason: "expected an object at the top level".into(),
            }),
        }
    }
}

fn single(key: &str, value: Json) -> Json {
    let mut object = serde_json::Map::new();
    object.insert(key.to_string(), value);
    Json::Object(object)
}

fn encode_map(map: &Map, prefix: &str) -> Result<Json, SectionalError> {
    let mut object = serde_json::Map::new();
    for (key, value) in map.iter() {
        let path = store::join(prefix, key);
        object.insert(key.to_string(), encode(value, &path)?);
    }
    Ok(Json::Object(object))
}

fn encode(value: &Value, path: &str) -> Result<Json, SectionalError> {
    let unsupported = || SectionalError::UnsupportedValue {
        key: path.to_string(),
        type_name: value.type_name(),
    };
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(unsupported)?,
        Value::Str(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(encode_items(items, path)?),
        Value::Tuple(items) => single(TUPLE_KEY, Json::Array(encode_items(items, path)?)),
        Value::Map(map) => encode_map(map, path)?,
        Value::Expr(expr) => single(EXPR_KEY, Json::String(expr.unparse())),
        Value::Section(_) | Value::Function(_) => return Err(unsupported()),
    })
}

fn encode_items(items: &[Value], path: &str) -> Result<Vec<Json>, SectionalError> {
    items.iter().map(|item| encode(item, path)).collect()
}

fn decode_object(object: serde_json::Map<String, Json>, prefix: &str) -> Result<Map, SectionalError> {
    let mut map = Map::new();
    for (key, value) in object {
        let path = store::join(prefix, &key);
        let value = decode(value, &path)?;
        map.insert(key, value);
    }
    Ok(map)
}

fn decode(json: Json, path: &str) -> Result<Value, SectionalError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s),
        Json::Array(items) => Value::List(decode_items(items, path)?),
        Json::Object(mut object) if object.len() == 1 => {
            if let Some(Json::String(source)) = object.get(EXPR_KEY) {
                Value::Expr(parse_expr(source, path)?)
            } else if let Some(Json::Array(items)) = object.remove(TUPLE_KEY) {
                Value::Tuple(decode_items(items, path)?)
            } else {
                Value::Map(decode_object(object, path)?)
            }
        }
        Json::Object(object) => Value::Map(decode_object(object, path)?),
    })
}

fn decode_items(items: Vec<Json>, path: &str) -> Result<Vec<Value>, SectionalError> {
    items.into_iter().map(|item| decode(item, path)).collect()
}

/// Read back an `__expr__` source string.
pub(crate) fn parse_expr(source: &str, path: &str) -> Result<Expr, SectionalError> {
    Expr::parse(source).map_err(|e| SectionalError::InvalidValue {
        key: path.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::property_map;
    use crate::macros::root;
    use crate::map;

    #[test]
    fn roundtrips_the_property_map() {
        let codec = JsonCodec;
        let text = codec.to_string(&property_map()).unwrap();
        assert_eq!(codec.from_string(&text).unwrap(), property_map());
    }

    #[test]
    fn tuples_and_expressions_are_tagged() {
        let codec = JsonCodec;
        let map = map! { "t" => Value::tuple([1, 2]), "e" => root().item("t") };
        let text = codec.to_string(&map).unwrap();
        let json: Json = serde_json::from_str(&text).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"t": {"__tuple__": [1, 2]}, "e": {"__expr__": "ROOT['t']"}})
        );
        assert_eq!(codec.from_string(&text).unwrap(), map);
    }

    #[test]
    fn key_order_is_kept() {
        let codec = JsonCodec;
        let map = codec.from_string(r#"{"z": 1, "a": 2, "m": {"y": 1, "b": 2}}"#).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), ["z", "a", "m"]);
    }

    #[test]
    fn non_finite_floats_are_unsupported() {
        let err = JsonCodec.to_string(&map! { "x" => f64::NAN }).unwrap_err();
        assert!(matches!(err, SectionalError::UnsupportedValue { .. }));
    }

    #[test]
    fn bad_input() {
        assert!(matches!(
            JsonCodec.from_string("{\n  \"a\": \n}"),
            Err(SectionalError::Parse { line: 3, .. })
        ));
        assert!(matches!(JsonCodec.from_string("[1]"), Err(SectionalError::Parse { .. })));
        assert!(matches!(
            JsonCodec.from_string(r#"{"a": {"__expr__": "1 +"}}"#),
            Err(SectionalError::InvalidValue { .. })
        ));
    }
}
