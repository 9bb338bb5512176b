//! The value domain shared by sections, expressions and validators.
//!
//! [`Value`] covers everything a parameter can hold (scalars, sequences,
//! deferred expressions) plus the handles that only show up while an
//! expression is being evaluated (live sections and native functions).
//! [`Map`] is the plain ordered mapping that sections are built from and
//! dumped to, and the interchange format of every codec.

use std::fmt;
use std::rc::Rc;

use crate::error::EvalError;
use crate::expr::Expr;
use crate::section::Section;

/// A configuration value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Fixed-size sequence. Kept apart from `List` so validators can tell them apart.
    Tuple(Vec<Value>),
    Map(Map),
    /// A deferred expression, evaluated when read through a macro-enabled section.
    Expr(Expr),
    Section(Section),
    Function(Function),
}

/// Coarse runtime type of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Map,
    Expr,
    Section,
    Function,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Null => "NoneType",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Str => "str",
            ValueType::List => "list",
            ValueType::Tuple => "tuple",
            ValueType::Map => "dict",
            ValueType::Expr => "expression",
            ValueType::Section => "section",
            ValueType::Function => "function",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn tuple<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Value {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::List(_) => ValueType::List,
            Value::Tuple(_) => ValueType::Tuple,
            Value::Map(_) => ValueType::Map,
            Value::Expr(_) => ValueType::Expr,
            Value::Section(_) => ValueType::Section,
            Value::Function(_) => ValueType::Function,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    pub fn is_expr(&self) -> bool {
        matches!(self, Value::Expr(_))
    }

    /// True for values that can be stored as a parameter (i.e. not a mapping or section).
    pub fn is_parameter(&self) -> bool {
        !matches!(self, Value::Map(_) | Value::Section(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a list or tuple.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Value::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Value::Expr(e) => Some(e),
            _ => None,
        }
    }

    /// Python-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(v) | Value::Tuple(v) => !v.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Section(s) => !s.is_empty(),
            Value::Expr(_) | Value::Function(_) => true,
        }
    }

    /// Source-like rendering: strings quoted, `True`/`False`/`None`, expressions unparsed.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    /// Like [`repr`](Self::repr), except strings are rendered bare.
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    fn write_repr(&self, out: &mut String) {
        match self {
            Value::Null => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(f) => out.push_str(&float_repr(*f)),
            Value::Str(s) => out.push_str(&quote_str(s)),
            Value::List(items) => {
                out.push('[');
                write_items(items, out);
                out.push(']');
            }
            Value::Tuple(items) => {
                out.push('(');
                write_items(items, out);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Map(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&quote_str(key));
                    out.push_str(": ");
                    value.write_repr(out);
                }
                out.push('}');
            }
            Value::Expr(expr) => out.push_str(&expr.unparse()),
            Value::Section(section) => {
                out.push_str(&format!("<section '{}'>", section.path()));
            }
            Value::Function(func) => out.push_str(&format!("<function {}>", func.name())),
        }
    }
}

fn write_items(items: &[Value], out: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out);
    }
}

/// Render a float the way the expression grammar reads it back: always with a
/// fractional part or an exponent, exponents signed and at least two digits.
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let raw = format!("{f:e}");
        let (mantissa, exponent) = raw.split_once('e').unwrap_or((&raw, "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(d) => ('-', d),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }
    if f == f.trunc() {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Quote a string with single quotes unless it contains one and no double quote.
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}

impl From<Expr> for Value {
    fn from(v: Expr) -> Self {
        Value::Expr(v)
    }
}

impl From<Section> for Value {
    fn from(v: Section) -> Self {
        Value::Section(v)
    }
}

impl From<Function> for Value {
    fn from(v: Function) -> Self {
        Value::Function(v)
    }
}

// --- Map ---

/// Plain ordered mapping from string keys to values.
///
/// Insertion order is preserved; replacing an existing key keeps its position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    entries: Vec<(String, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.position(key).map(move |i| &mut self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Insert or replace. Returns the previous value for `key`, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Build a [`Map`] from `key => value` pairs. Values go through `Value::from`.
///
/// ```
/// use sectional::map;
/// let m = map! { "x" => 1, "sub" => map! { "y" => "z" } };
/// assert_eq!(m.len(), 2);
/// ```
#[macro_export]
macro_rules! map {
    () => { $crate::Map::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut m = $crate::Map::new();
        $( m.insert($key, $crate::Value::from($value)); )+
        m
    }};
}

// --- Function ---

type NativeFn = dyn Fn(&[Value], &Map) -> Result<Value, EvalError>;

/// A native function callable from expressions. Equality is identity.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    call: Rc<NativeFn>,
}

impl Function {
    pub fn new(
        name: &str,
        call: impl Fn(&[Value], &Map) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            call: Rc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value], kwargs: &Map) -> Result<Value, EvalError> {
        (self.call)(args, kwargs)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_scalars() {
        assert_eq!(Value::Null.repr(), "None");
        assert_eq!(Value::Bool(true).repr(), "True");
        assert_eq!(Value::Int(-3).repr(), "-3");
        assert_eq!(Value::from("delta.dat").repr(), "'delta.dat'");
        assert_eq!(Value::from("delta.dat").to_str(), "delta.dat");
    }

    #[test]
    fn float_repr_keeps_fraction() {
        assert_eq!(float_repr(10.1), "10.1");
        assert_eq!(float_repr(-0.123), "-0.123");
        assert_eq!(float_repr(2.0), "2.0");
        assert_eq!(float_repr(1e20), "1e+20");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
    }

    #[test]
    fn quote_prefers_single_quotes() {
        assert_eq!(quote_str("a"), "'a'");
        assert_eq!(quote_str("it's"), "\"it's\"");
        assert_eq!(quote_str("'\""), "'\\'\"'");
    }

    #[test]
    fn sequences_repr() {
        assert_eq!(Value::from(vec![1, 2]).repr(), "[1, 2]");
        assert_eq!(Value::tuple([1]).repr(), "(1,)");
        assert_eq!(Value::tuple(Vec::<Value>::new()).repr(), "()");
        assert_eq!(Value::from(map! { "a" => 1 }).repr(), "{'a': 1}");
    }

    #[test]
    fn map_preserves_insertion_order_on_replace() {
        let mut m = map! { "a" => 1, "b" => 2, "c" => 3 };
        m.insert("b", 20);
        assert_eq!(m.keys().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(m.get("b"), Some(&Value::Int(20)));
        m.remove("a");
        assert_eq!(m.keys().collect::<Vec<_>>(), ["b", "c"]);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
    }

    #[test]
    fn function_equality_is_identity() {
        let f = Function::new("f", |_, _| Ok(Value::Null));
        let g = Function::new("f", |_, _| Ok(Value::Null));
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }
}
