//! The indented text dialect.
//!
//! This is the layout [`Section::dump`](crate::Section::dump) writes:
//!
//! ```text
//! # comment
//! retries = 3
//! timeout = 2 * ROOT['retries'] + 1
//! [server]
//!     host = 'localhost'
//! ```
//!
//! Values are expression source. Constants become plain values, anything
//! else is kept as a deferred expression. `[name]` opens a sub-section whose
//! body is indented four spaces deeper than the header.

use crate::codec::Codec;
use crate::error::SectionalError;
use crate::expr::{Expr, Node};
use crate::section::is_identifier;
use crate::store;
use crate::value::{Map, Value};

pub const NAME: &str = "text";
const INDENT: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["cfg", "sct", "ini"]
    }

    fn to_string(&self, map: &Map) -> Result<String, SectionalError> {
        render(map)
    }

    fn from_string(&self, source: &str) -> Result<Map, SectionalError> {
        parse(source)
    }
}

/// Render `map` in the text dialect.
pub fn render(map: &Map) -> Result<String, SectionalError> {
    let mut out = String::new();
    write_map(map, "", 0, &mut out)?;
    Ok(out)
}

fn write_map(map: &Map, prefix: &str, depth: usize, out: &mut String) -> Result<(), SectionalError> {
    let indent = " ".repeat(depth * INDENT);
    for (key, value) in map.iter() {
        let path = store::join(prefix, key);
        match value {
            Value::Map(nested) => {
                out.push_str(&format!("{indent}[{key}]\n"));
                write_map(nested, &path, depth + 1, out)?;
            }
            value => {
                check_literal(value, &path)?;
                out.push_str(&format!("{indent}{key} = {}\n", value.repr()));
            }
        }
    }
    Ok(())
}

/// Only values the parser can read back may be written.
fn check_literal(value: &Value, path: &str) -> Result<(), SectionalError> {
    match value {
        Value::List(items) | Value::Tuple(items) => {
            items.iter().try_for_each(|item| check_literal(item, path))
        }
        Value::Map(_) | Value::Section(_) | Value::Function(_) => {
            Err(SectionalError::UnsupportedValue {
                key: path.to_string(),
                type_name: value.type_name(),
            })
        }
        _ => Ok(()),
    }
}

struct Frame {
    key: String,
    map: Map,
}

fn error(line: usize, reason: impl Into<String>) -> SectionalError {
    SectionalError::Parse {
        line,
        reason: reason.into(),
    }
}

/// Fold the innermost open section into its parent.
fn close(stack: &mut Vec<Frame>) {
    if stack.len() > 1 {
        if let (Some(frame), Some(parent)) = (stack.pop(), stack.last_mut()) {
            parent.map.insert(frame.key, frame.map);
        }
    }
}

/// Parse the text dialect into a plain mapping.
pub fn parse(source: &str) -> Result<Map, SectionalError> {
    let mut stack = vec![Frame {
        key: String::new(),
        map: Map::new(),
    }];
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let content = raw.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let body = raw.trim_start_matches(' ');
        if body.starts_with('\t') {
            return Err(error(line, "tabs are not allowed in indentation"));
        }
        let indent = raw.len() - body.len();
        if indent % INDENT != 0 {
            return Err(error(line, format!("indentation must be a multiple of {INDENT} spaces")));
        }
        let depth = indent / INDENT;
        if depth >= stack.len() {
            return Err(error(line, "unexpected indentation"));
        }
        while stack.len() > depth + 1 {
            close(&mut stack);
        }

        let Some(top) = stack.last_mut() else {
            return Err(error(line, "unbalanced sections"));
        };
        if let Some(header) = content.strip_prefix('[') {
            let name = header
                .strip_suffix(']')
                .ok_or_else(|| error(line, "unterminated section header"))?
                .trim();
            check_key(&top.map, name, line)?;
            stack.push(Frame {
                key: name.to_string(),
                map: Map::new(),
            });
        } else {
            let (key, source) = content
                .split_once('=')
                .ok_or_else(|| error(line, "expected 'key = value' or '[section]'"))?;
            let key = key.trim();
            check_key(&top.map, key, line)?;
            let value = parse_value(source.trim(), line)?;
            top.map.insert(key, value);
        }
    }
    while stack.len() > 1 {
        close(&mut stack);
    }
    Ok(stack.pop().map(|frame| frame.map).unwrap_or_default())
}

fn check_key(map: &Map, key: &str, line: usize) -> Result<(), SectionalError> {
    if !is_identifier(key) {
        return Err(error(line, format!("invalid key '{key}'")));
    }
    if map.contains_key(key) {
        return Err(error(line, format!("duplicate key '{key}'")));
    }
    Ok(())
}

fn parse_value(source: &str, line: usize) -> Result<Value, SectionalError> {
    let expr = Expr::parse(source).map_err(|e| error(line, e.to_string()))?;
    Ok(match expr.node() {
        Node::Const(value) => value.clone(),
        _ => Value::Expr(expr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{PROPERTY_DUMP, SAMPLE_CONFIG, property_map};
    use crate::macros::{root, section};
    use crate::map;
    use crate::section::Section;

    #[test]
    fn reads_the_dump_layout() {
        assert_eq!(parse(PROPERTY_DUMP).unwrap(), property_map());
    }

    #[test]
    fn render_matches_section_dump() {
        let rendered = render(&property_map()).unwrap();
        assert_eq!(rendered, PROPERTY_DUMP);
        let section = Section::from_map(property_map()).unwrap();
        assert_eq!(section.dump(), rendered);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let map = parse(SAMPLE_CONFIG).unwrap();
        assert_eq!(
            map,
            map! {
                "name" => "api",
                "port" => 9000,
                "limits" => map! { "low" => 5, "stray" => true },
            }
        );
    }

    #[test]
    fn expressions_stay_deferred() {
        let map = parse("a = 1\nb = ROOT['a'] * 2\n[s]\n    c = SECTION['x'] + 1\n").unwrap();
        assert_eq!(map.get("b"), Some(&Value::Expr(root().item("a") * 2)));
        let s = map.get("s").and_then(Value::as_map).unwrap();
        assert_eq!(s.get("c"), Some(&Value::Expr(section().item("x") + 1)));
    }

    #[test]
    fn literals() {
        let map = parse("t = (1, 'a')\nl = [1.5, None]\nn = -3\ns = \"it's\"\n").unwrap();
        assert_eq!(map.get("t"), Some(&Value::tuple([Value::Int(1), Value::from("a")])));
        assert_eq!(map.get("l"), Some(&Value::List(vec![Value::Float(1.5), Value::Null])));
        assert_eq!(map.get("n"), Some(&Value::Int(-3)));
        assert_eq!(map.get("s"), Some(&Value::from("it's")));
    }

    #[test]
    fn extreme_integers_survive() {
        let map = map! { "lo" => i64::MIN, "hi" => i64::MAX };
        assert_eq!(parse(&render(&map).unwrap()).unwrap(), map);
    }

    #[test]
    fn empty_sections_survive() {
        let map = map! { "a" => map! {}, "b" => 1 };
        let text = render(&map).unwrap();
        assert_eq!(text, "[a]\nb = 1\n");
        assert_eq!(parse(&text).unwrap(), map);
    }

    #[test]
    fn errors_carry_line_numbers() {
        let cases = [
            ("a = 1\n  b = 2\n", 2),
            ("a = 1\n    b = 2\n", 2),
            ("a = 1\na = 2\n", 2),
            ("# x\n\n1a = 2\n", 3),
            ("[sub\n", 1),
            ("a 1\n", 1),
            ("a = (1 +\n", 1),
            ("\ta = 1\n", 1),
        ];
        for (source, expected) in cases {
            match parse(source) {
                Err(SectionalError::Parse { line, .. }) => assert_eq!(line, expected, "{source:?}"),
                other => panic!("{source:?}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn unsupported_values_are_rejected() {
        let map = map! { "sub" => map! { "s" => Section::new() } };
        match render(&map) {
            Err(SectionalError::UnsupportedValue { key, type_name }) => {
                assert_eq!(key, "sub.s");
                assert_eq!(type_name, "section");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(render(&map! { "l" => vec![Value::Map(Map::new())] }).is_err());
    }
}
