//! Deferred expressions.
//!
//! An [`Expr`] is an immutable tree built with ordinary Rust operators and a
//! few named methods for the operators Rust cannot overload (`**`, `//`,
//! comparisons, `and`/`or`, `in`, attribute and item access):
//!
//! ```
//! use sectional::{Expr, Map, Value};
//!
//! let retries = Expr::name("retries");
//! let timeout = 2 * retries.clone() + 1;
//! assert_eq!(timeout.unparse(), "2 * retries + 1");
//!
//! let mut env = Map::new();
//! env.insert("retries", 3);
//! assert_eq!(timeout.evaluate(&env).unwrap(), Value::Int(7));
//! ```
//!
//! Every builder returns a new node; nodes are never mutated, so sharing a
//! subtree between expressions is free. Evaluation happens against an
//! environment supplied by the caller ([`evaluate`](Expr::evaluate)), and
//! [`unparse`](Expr::unparse) renders the tree with the minimum number of
//! parentheses. Text is turned back into a tree only by [`parse`], which
//! exists for the codecs.

pub(crate) mod eval;
pub mod parse;
mod unparse;

use std::fmt;
use std::ops;
use std::rc::Rc;

use crate::value::{Map, Value};

pub use parse::ParseError;

/// An immutable deferred expression.
#[derive(Clone, PartialEq)]
pub struct Expr(Rc<Node>);

/// The node kinds an [`Expr`] is made of.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Const(Value),
    /// Name lookup. A locally captured environment wins over the caller's.
    Name { name: String, env: Option<Map> },
    /// Evaluates the wrapped expression, then calls the result with no arguments.
    Property(Expr),
    Call {
        callee: Expr,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Unary(UnaryOp, Expr),
    Binary(BinaryOp, Expr, Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Abs,
    Pos,
    Neg,
    Not,
    Len,
    Str,
    Repr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    DivMod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// `left in right`
    Contains,
    Getattr,
    Getitem,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Abs => "abs",
            UnaryOp::Pos => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
            UnaryOp::Len => "len",
            UnaryOp::Str => "str",
            UnaryOp::Repr => "repr",
        }
    }
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::DivMod => "divmod",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Contains => "in",
            BinaryOp::Getattr => ".",
            BinaryOp::Getitem => "[]",
        }
    }
}

impl Expr {
    fn new(node: Node) -> Self {
        Expr(Rc::new(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::new(Node::Const(value.into()))
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(Node::Name {
            name: name.into(),
            env: None,
        })
    }

    /// A name whose lookup consults `env` before the caller's environment.
    pub fn name_with_env(name: impl Into<String>, env: Map) -> Self {
        Self::new(Node::Name {
            name: name.into(),
            env: Some(env),
        })
    }

    /// Wrap `inner` so that its value is invoked with no arguments at every evaluation.
    pub fn property(inner: Expr) -> Self {
        Self::new(Node::Property(inner))
    }

    pub fn unary(op: UnaryOp, operand: impl Into<Expr>) -> Self {
        Self::new(Node::Unary(op, operand.into()))
    }

    pub fn binary(op: BinaryOp, left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::new(Node::Binary(op, left.into(), right.into()))
    }

    /// `self(args...)`
    pub fn call(&self, args: Vec<Expr>) -> Self {
        self.call_with(args, Vec::new())
    }

    /// `self(args..., name=value...)`
    pub fn call_with(&self, args: Vec<Expr>, kwargs: Vec<(String, Expr)>) -> Self {
        Self::new(Node::Call {
            callee: self.clone(),
            args,
            kwargs,
        })
    }

    pub fn floor_div(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::FloorDiv, self.clone(), other)
    }

    pub fn divmod(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::DivMod, self.clone(), other)
    }

    pub fn pow(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Pow, self.clone(), other)
    }

    pub fn equals(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Eq, self.clone(), other)
    }

    pub fn not_equals(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Ne, self.clone(), other)
    }

    pub fn lt(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Lt, self.clone(), other)
    }

    pub fn le(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Le, self.clone(), other)
    }

    pub fn gt(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Gt, self.clone(), other)
    }

    pub fn ge(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Ge, self.clone(), other)
    }

    pub fn and(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::And, self.clone(), other)
    }

    pub fn or(&self, other: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Or, self.clone(), other)
    }

    /// `item in self`
    pub fn contains(&self, item: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Contains, item, self.clone())
    }

    /// `self in container`
    pub fn is_in(&self, container: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Contains, self.clone(), container)
    }

    /// `self.name`
    pub fn attr(&self, name: &str) -> Self {
        Self::binary(BinaryOp::Getattr, self.clone(), Expr::constant(name))
    }

    /// `self[key]`
    pub fn item(&self, key: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Getitem, self.clone(), key)
    }

    pub fn abs(&self) -> Self {
        Self::unary(UnaryOp::Abs, self.clone())
    }

    pub fn pos(&self) -> Self {
        Self::unary(UnaryOp::Pos, self.clone())
    }

    pub fn len(&self) -> Self {
        Self::unary(UnaryOp::Len, self.clone())
    }

    pub fn to_str(&self) -> Self {
        Self::unary(UnaryOp::Str, self.clone())
    }

    pub fn repr(&self) -> Self {
        Self::unary(UnaryOp::Repr, self.clone())
    }

    /// Parse source text produced by [`unparse`](Self::unparse) (or written by hand).
    pub fn parse(source: &str) -> Result<Expr, ParseError> {
        parse::parse(source)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self.unparse())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unparse())
    }
}

// --- conversions ---

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

/// A `Value::Expr` unwraps to its expression; anything else becomes a constant.
impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        match v {
            Value::Expr(e) => e,
            other => Expr::constant(other),
        }
    }
}

macro_rules! const_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(v: $t) -> Self {
                    Expr::constant(v)
                }
            }
        )*
    };
}

const_from!(bool, i64, i32, f64, &str, String);

// --- operator overloading ---

macro_rules! binary_ops {
    ($($trait:ident $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<R: Into<Expr>> ops::$trait<R> for Expr {
                type Output = Expr;
                fn $method(self, rhs: R) -> Expr {
                    Expr::binary(BinaryOp::$op, self, rhs)
                }
            }

            impl<R: Into<Expr>> ops::$trait<R> for &Expr {
                type Output = Expr;
                fn $method(self, rhs: R) -> Expr {
                    Expr::binary(BinaryOp::$op, self.clone(), rhs)
                }
            }

            // a single integer type keeps bare literals like `2 * x` inferable
            binary_ops!(@reflected $trait $method $op; bool, i64, f64, &str, String);
        )*
    };
    (@reflected $trait:ident $method:ident $op:ident; $($t:ty),*) => {
        $(
            impl ops::$trait<Expr> for $t {
                type Output = Expr;
                fn $method(self, rhs: Expr) -> Expr {
                    Expr::binary(BinaryOp::$op, self, rhs)
                }
            }
        )*
    };
}

binary_ops!(
    Add add => Add,
    Sub sub => Sub,
    Mul mul => Mul,
    Div div => Div,
    Rem rem => Mod,
);

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

impl ops::Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self.clone())
    }
}

impl ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::unary(UnaryOp::Not, self)
    }
}

impl ops::Not for &Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::unary(UnaryOp::Not, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_build_new_nodes() {
        let x = Expr::name("x");
        let sum = &x + 1;
        assert!(matches!(sum.node(), Node::Binary(BinaryOp::Add, _, _)));
        // the operand is untouched
        assert!(matches!(x.node(), Node::Name { .. }));
    }

    #[test]
    fn reflected_operators_put_primitive_on_the_left() {
        let e = 2 * Expr::name("x");
        match e.node() {
            Node::Binary(BinaryOp::Mul, l, r) => {
                assert_eq!(l, &Expr::constant(2));
                assert_eq!(r, &Expr::name("x"));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn bare_literals_on_the_left_infer() {
        let x = Expr::name("x");
        let e = 10 - 2 * x.clone() % 3 + 1.5 / x;
        assert_eq!(e.unparse(), "10 - 2 * x % 3 + 1.5 / x");
        let mut env = Map::new();
        env.insert("x", 2);
        assert_eq!(e.evaluate(&env).unwrap(), Value::Float(9.75));
    }

    #[test]
    fn equality_is_structural() {
        let a = Expr::name("a").pow(2) - Expr::name("b");
        let b = Expr::name("a").pow(2) - Expr::name("b");
        assert_eq!(a, b);
        assert_ne!(a, Expr::name("a").pow(3) - Expr::name("b"));
    }

    #[test]
    fn contains_orders_item_first() {
        let e = Expr::name("xs").contains(3);
        assert_eq!(e, Expr::constant(3).is_in(Expr::name("xs")));
    }

    #[test]
    fn value_expr_converts_without_wrapping() {
        let e = Expr::name("a");
        assert_eq!(Expr::from(Value::Expr(e.clone())), e);
        assert_eq!(Expr::from(Value::Int(1)), Expr::constant(1));
    }
}
