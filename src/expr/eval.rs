//! Evaluation of expression trees.
//!
//! Operators follow Python semantics on the [`Value`] domain: integers and
//! floats mix freely (booleans count as integers), `//` and `%` floor toward
//! negative infinity, `/` always yields a float, `and`/`or` short-circuit and
//! return one of their operands.

use std::cmp::Ordering;

use super::{BinaryOp, Expr, Node, UnaryOp};
use crate::error::EvalError;
use crate::value::{Map, Value};

/// Deepest expression tree [`Expr::evaluate`] walks.
pub(crate) const MAX_DEPTH: usize = 512;

impl Expr {
    /// Evaluate against `env`. Names captured locally by a node take precedence
    /// over bindings in `env`.
    pub fn evaluate(&self, env: &Map) -> Result<Value, EvalError> {
        self.evaluate_at(env, 0)
    }

    fn evaluate_at(&self, env: &Map, depth: usize) -> Result<Value, EvalError> {
        if depth >= MAX_DEPTH {
            return Err(EvalError::RecursionLimit(MAX_DEPTH));
        }
        let depth = depth + 1;
        match self.node() {
            Node::Const(value) => Ok(value.clone()),
            Node::Name { name, env: local } => local
                .as_ref()
                .and_then(|local| local.get(name))
                .or_else(|| env.get(name))
                .cloned()
                .ok_or_else(|| EvalError::NameLookup(name.clone())),
            Node::Property(inner) => {
                let target = inner.evaluate_at(env, depth)?;
                call_value(&target, &[], &Map::new())
            }
            Node::Call {
                callee,
                args,
                kwargs,
            } => {
                let target = callee.evaluate_at(env, depth)?;
                let args = args
                    .iter()
                    .map(|a| a.evaluate_at(env, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut named = Map::new();
                for (name, arg) in kwargs {
                    named.insert(name.clone(), arg.evaluate_at(env, depth)?);
                }
                call_value(&target, &args, &named)
            }
            Node::Unary(op, operand) => apply_unary(*op, operand.evaluate_at(env, depth)?),
            Node::Binary(BinaryOp::And, left, right) => {
                let l = left.evaluate_at(env, depth)?;
                if l.is_truthy() { right.evaluate_at(env, depth) } else { Ok(l) }
            }
            Node::Binary(BinaryOp::Or, left, right) => {
                let l = left.evaluate_at(env, depth)?;
                if l.is_truthy() { Ok(l) } else { right.evaluate_at(env, depth) }
            }
            Node::Binary(op, left, right) => {
                apply_binary(*op, left.evaluate_at(env, depth)?, right.evaluate_at(env, depth)?)
            }
        }
    }
}

fn call_value(target: &Value, args: &[Value], kwargs: &Map) -> Result<Value, EvalError> {
    match target {
        Value::Function(f) => f.call(args, kwargs),
        other => Err(EvalError::NotCallable(other.type_name())),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(v: &Value) -> Option<Num> {
        match v {
            Value::Bool(b) => Some(Num::Int(*b as i64)),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(i) => i == 0,
            Num::Float(f) => f == 0.0,
        }
    }
}

fn unsupported(op: BinaryOp, l: &Value, r: &Value) -> EvalError {
    EvalError::UnsupportedOperand {
        op: op.symbol(),
        left: l.type_name(),
        right: r.type_name(),
    }
}

fn floor_div_int(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError::ZeroDivision);
    }
    let q = a.checked_div(b).ok_or(EvalError::Overflow("//"))?;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn mod_int(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError::ZeroDivision);
    }
    let r = a.checked_rem(b).ok_or(EvalError::Overflow("%"))?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn mod_float(a: f64, b: f64) -> Result<f64, EvalError> {
    if b == 0.0 {
        return Err(EvalError::ZeroDivision);
    }
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

/// Number of copies for `seq * times`, refusing results that cannot be allocated.
fn repeat_count(len: usize, times: i64) -> Result<usize, EvalError> {
    if len == 0 || times <= 0 {
        return Ok(0);
    }
    let overflow = || EvalError::Overflow("*");
    let count = usize::try_from(times).map_err(|_| overflow())?;
    len.checked_mul(count)
        .filter(|total| isize::try_from(*total).is_ok())
        .ok_or_else(overflow)?;
    Ok(count)
}

fn repeat(items: &[Value], times: i64) -> Result<Vec<Value>, EvalError> {
    let count = repeat_count(items.len(), times)?;
    let mut out = Vec::new();
    out.try_reserve_exact(items.len() * count)
        .map_err(|_| EvalError::Overflow("*"))?;
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    Ok(out)
}

fn repeat_str(s: &str, times: i64) -> Result<String, EvalError> {
    let count = repeat_count(s.len(), times)?;
    let mut out = String::new();
    out.try_reserve_exact(s.len() * count)
        .map_err(|_| EvalError::Overflow("*"))?;
    for _ in 0..count {
        out.push_str(s);
    }
    Ok(out)
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let (Some(a), Some(b)) = (Num::of(l), Num::of(r)) else {
        return Err(unsupported(op, l, r));
    };
    let overflow = || EvalError::Overflow(op.symbol());
    match (op, a, b) {
        (BinaryOp::Add, Num::Int(x), Num::Int(y)) => {
            x.checked_add(y).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => {
            x.checked_sub(y).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => {
            x.checked_mul(y).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Add, a, b) => Ok(Value::Float(a.as_f64() + b.as_f64())),
        (BinaryOp::Sub, a, b) => Ok(Value::Float(a.as_f64() - b.as_f64())),
        (BinaryOp::Mul, a, b) => Ok(Value::Float(a.as_f64() * b.as_f64())),
        (BinaryOp::Div, a, b) => {
            if b.is_zero() {
                Err(EvalError::ZeroDivision)
            } else {
                Ok(Value::Float(a.as_f64() / b.as_f64()))
            }
        }
        (BinaryOp::FloorDiv, Num::Int(x), Num::Int(y)) => floor_div_int(x, y).map(Value::Int),
        (BinaryOp::FloorDiv, a, b) => {
            if b.is_zero() {
                Err(EvalError::ZeroDivision)
            } else {
                Ok(Value::Float((a.as_f64() / b.as_f64()).floor()))
            }
        }
        (BinaryOp::Mod, Num::Int(x), Num::Int(y)) => mod_int(x, y).map(Value::Int),
        (BinaryOp::Mod, a, b) => mod_float(a.as_f64(), b.as_f64()).map(Value::Float),
        (BinaryOp::DivMod, _, _) => {
            let q = arithmetic(BinaryOp::FloorDiv, l, r)?;
            let m = arithmetic(BinaryOp::Mod, l, r)?;
            Ok(Value::Tuple(vec![q, m]))
        }
        (BinaryOp::Pow, Num::Int(x), Num::Int(y)) if y >= 0 => {
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Pow, a, b) => {
            if a.is_zero() && b.as_f64() < 0.0 {
                Err(EvalError::ZeroDivision)
            } else {
                Ok(Value::Float(a.as_f64().powf(b.as_f64())))
            }
        }
        _ => Err(unsupported(op, l, r)),
    }
}

/// Equality with numeric cross-type comparison (`1 == 1.0`).
pub(crate) fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => match (Num::of(l), Num::of(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
            (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
            _ => l == r,
        },
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`. `None` when the operands are not comparable.
pub(crate) fn compare_values(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
            for (x, y) in a.iter().zip(b) {
                if !values_equal(x, y) {
                    return compare_values(x, y);
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => match (Num::of(l), Num::of(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Some(a.cmp(&b)),
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
            _ => None,
        },
    }
}

fn index_into(items_len: usize, index: i64) -> Result<usize, EvalError> {
    let len = items_len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(EvalError::IndexOutOfRange {
            index,
            len: items_len,
        })
    }
}

fn contains(item: &Value, container: &Value) -> Result<bool, EvalError> {
    match (item, container) {
        (Value::Str(needle), Value::Str(hay)) => Ok(hay.contains(needle.as_str())),
        (_, Value::List(items)) | (_, Value::Tuple(items)) => {
            Ok(items.iter().any(|x| values_equal(x, item)))
        }
        (Value::Str(key), Value::Map(map)) => Ok(map.contains_key(key)),
        (Value::Str(key), Value::Section(section)) => Ok(section.has_key(key)),
        _ => Err(unsupported(BinaryOp::Contains, item, container)),
    }
}

pub(crate) fn apply_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => match (&l, &r) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => Ok(Value::List([a.as_slice(), b.as_slice()].concat())),
            (Value::Tuple(a), Value::Tuple(b)) => Ok(Value::Tuple([a.as_slice(), b.as_slice()].concat())),
            _ => arithmetic(op, &l, &r),
        },
        BinaryOp::Mul => match (&l, &r) {
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                repeat_str(s, *n).map(Value::Str)
            }
            (Value::List(v), Value::Int(n)) | (Value::Int(n), Value::List(v)) => {
                repeat(v, *n).map(Value::List)
            }
            (Value::Tuple(v), Value::Int(n)) | (Value::Int(n), Value::Tuple(v)) => {
                repeat(v, *n).map(Value::Tuple)
            }
            _ => arithmetic(op, &l, &r),
        },
        BinaryOp::Sub
        | BinaryOp::Div
        | BinaryOp::FloorDiv
        | BinaryOp::Mod
        | BinaryOp::DivMod
        | BinaryOp::Pow => arithmetic(op, &l, &r),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare_values(&l, &r).ok_or_else(|| unsupported(op, &l, &r))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::And => Ok(if l.is_truthy() { r } else { l }),
        BinaryOp::Or => Ok(if l.is_truthy() { l } else { r }),
        BinaryOp::Contains => contains(&l, &r).map(Value::Bool),
        BinaryOp::Getattr => match (&l, &r) {
            (Value::Section(section), Value::Str(name)) => section.lookup(name),
            (Value::Map(map), Value::Str(name)) => map
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::MissingKey(name.clone())),
            _ => Err(unsupported(op, &l, &r)),
        },
        BinaryOp::Getitem => match (&l, &r) {
            (Value::List(items), Value::Int(i)) | (Value::Tuple(items), Value::Int(i)) => {
                Ok(items[index_into(items.len(), *i)?].clone())
            }
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Value::Str(chars[index_into(chars.len(), *i)?].to_string()))
            }
            (Value::Map(map), Value::Str(key)) => map
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::MissingKey(key.clone())),
            (Value::Section(section), Value::Str(key)) => section.lookup(key),
            _ => Err(unsupported(op, &l, &r)),
        },
    }
}

pub(crate) fn apply_unary(op: UnaryOp, v: Value) -> Result<Value, EvalError> {
    let bad = |v: &Value| EvalError::UnsupportedUnary {
        op: op.symbol(),
        operand: v.type_name(),
    };
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
        UnaryOp::Str => Ok(Value::Str(v.to_str())),
        UnaryOp::Repr => Ok(Value::Str(v.repr())),
        UnaryOp::Len => match &v {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) | Value::Tuple(items) => Ok(Value::Int(items.len() as i64)),
            Value::Map(map) => Ok(Value::Int(map.len() as i64)),
            Value::Section(section) => Ok(Value::Int(section.len() as i64)),
            other => Err(bad(other)),
        },
        UnaryOp::Pos | UnaryOp::Neg | UnaryOp::Abs => match Num::of(&v) {
            Some(Num::Int(i)) => {
                let result = match op {
                    UnaryOp::Pos => Some(i),
                    UnaryOp::Neg => i.checked_neg(),
                    _ => i.checked_abs(),
                };
                result.map(Value::Int).ok_or(EvalError::Overflow(op.symbol()))
            }
            Some(Num::Float(f)) => Ok(Value::Float(match op {
                UnaryOp::Pos => f,
                UnaryOp::Neg => -f,
                _ => f.abs(),
            })),
            None => Err(bad(&v)),
        },
    }
}
