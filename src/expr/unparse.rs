//! Rendering expression trees back to source text.
//!
//! Each node kind has a priority and an associativity. A binary operand is
//! parenthesized only when its priority is lower than its parent's, or equal
//! and on the side the parent does not associate towards. Comparisons do not
//! associate at all, so an equal-priority operand on either side gets parens.

use super::{BinaryOp, Expr, Node, UnaryOp};
use crate::value::Value;

const PRIORITY_OR: u8 = 1;
const PRIORITY_AND: u8 = 2;
const PRIORITY_NOT: u8 = 3;
const PRIORITY_COMPARE: u8 = 4;
const PRIORITY_ADD: u8 = 9;
const PRIORITY_MUL: u8 = 10;
const PRIORITY_SIGN: u8 = 11;
const PRIORITY_POW: u8 = 12;
const PRIORITY_ACCESS: u8 = 18;
const PRIORITY_ATOM: u8 = u8::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
    None,
}

impl BinaryOp {
    pub(crate) fn priority(self) -> u8 {
        match self {
            BinaryOp::Or => PRIORITY_OR,
            BinaryOp::And => PRIORITY_AND,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Contains => PRIORITY_COMPARE,
            BinaryOp::Add | BinaryOp::Sub => PRIORITY_ADD,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => PRIORITY_MUL,
            BinaryOp::Pow => PRIORITY_POW,
            BinaryOp::Getattr | BinaryOp::Getitem => PRIORITY_ACCESS,
            BinaryOp::DivMod => PRIORITY_ATOM,
        }
    }

    fn assoc(self) -> Assoc {
        match self.priority() {
            PRIORITY_COMPARE => Assoc::None,
            PRIORITY_POW => Assoc::Right,
            _ => Assoc::Left,
        }
    }
}

impl UnaryOp {
    pub(crate) fn priority(self) -> u8 {
        match self {
            UnaryOp::Not => PRIORITY_NOT,
            UnaryOp::Pos | UnaryOp::Neg => PRIORITY_SIGN,
            UnaryOp::Abs | UnaryOp::Len | UnaryOp::Str | UnaryOp::Repr => PRIORITY_ATOM,
        }
    }
}

impl Node {
    fn priority(&self) -> u8 {
        match self {
            // a negative literal reads like a unary minus
            Node::Const(Value::Int(i)) if *i < 0 => PRIORITY_SIGN,
            Node::Const(Value::Float(f)) if f.is_sign_negative() => PRIORITY_SIGN,
            Node::Const(_) | Node::Name { .. } | Node::Property(_) => PRIORITY_ATOM,
            Node::Call { .. } => PRIORITY_ACCESS,
            Node::Unary(op, _) => op.priority(),
            Node::Binary(op, _, _) => op.priority(),
        }
    }
}

impl Expr {
    /// Render as source text with minimal parenthesization.
    pub fn unparse(&self) -> String {
        let mut out = String::new();
        write_expr(self, &mut out);
        out
    }
}

fn write_expr(expr: &Expr, out: &mut String) {
    match expr.node() {
        Node::Const(value) => out.push_str(&value.repr()),
        Node::Name { name, .. } => out.push_str(name),
        Node::Property(inner) => write_expr(inner, out),
        Node::Call {
            callee,
            args,
            kwargs,
        } => {
            write_operand(callee, PRIORITY_ACCESS, false, out);
            out.push('(');
            let mut first = true;
            for arg in args {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write_expr(arg, out);
            }
            for (name, arg) in kwargs {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                out.push_str(name);
                out.push('=');
                write_expr(arg, out);
            }
            out.push(')');
        }
        Node::Unary(op, operand) => match op {
            UnaryOp::Abs | UnaryOp::Len | UnaryOp::Str | UnaryOp::Repr => {
                out.push_str(op.symbol());
                out.push('(');
                write_expr(operand, out);
                out.push(')');
            }
            UnaryOp::Not => {
                out.push_str("not ");
                write_operand(operand, op.priority(), false, out);
            }
            UnaryOp::Pos | UnaryOp::Neg => {
                out.push_str(op.symbol());
                write_operand(operand, op.priority(), false, out);
            }
        },
        Node::Binary(op, left, right) => match op {
            BinaryOp::DivMod => {
                out.push_str("divmod(");
                write_expr(left, out);
                out.push_str(", ");
                write_expr(right, out);
                out.push(')');
            }
            BinaryOp::Getattr => {
                let numeric = matches!(left.node(), Node::Const(Value::Int(_) | Value::Float(_)));
                if numeric {
                    out.push('(');
                    write_expr(left, out);
                    out.push(')');
                } else {
                    write_operand(left, PRIORITY_ACCESS, false, out);
                }
                out.push('.');
                match right.node() {
                    Node::Const(Value::Str(name)) => out.push_str(name),
                    _ => write_expr(right, out),
                }
            }
            BinaryOp::Getitem => {
                write_operand(left, PRIORITY_ACCESS, false, out);
                out.push('[');
                write_expr(right, out);
                out.push(']');
            }
            _ => {
                let priority = op.priority();
                let assoc = op.assoc();
                write_operand(left, priority, assoc != Assoc::Left, out);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                write_operand(right, priority, assoc != Assoc::Right, out);
            }
        },
    }
}

/// Write `operand`, wrapped in parentheses if it binds looser than `parent`
/// (or equally loosely, when `paren_on_tie` is set).
fn write_operand(operand: &Expr, parent: u8, paren_on_tie: bool, out: &mut String) {
    let priority = operand.node().priority();
    if priority < parent || (priority == parent && paren_on_tie) {
        out.push('(');
        write_expr(operand, out);
        out.push(')');
    } else {
        write_expr(operand, out);
    }
}
