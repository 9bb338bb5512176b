//! Parser for the textual form of expressions.
//!
//! Accepts exactly what [`Expr::unparse`] produces plus free spacing: literals
//! (`None`, `True`, `False`, integers, floats, quoted strings, constant list
//! and tuple displays), names, calls with positional and keyword arguments,
//! attribute and item access, and the operators of [`BinaryOp`] and
//! [`UnaryOp`] with the same priorities `unparse` uses. `abs(x)`, `len(x)`,
//! `str(x)`, `repr(x)` and `divmod(a, b)` map back to their dedicated nodes,
//! and `SECTION` maps to the current-section macro.
//!
//! Only the codecs use this; the core never parses text.

use thiserror::Error;

use super::{BinaryOp, Expr, Node, UnaryOp};
use crate::macros;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason} (at offset {offset})")]
pub struct ParseError {
    pub offset: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Magnitude only; a leading `-` is a separate token.
    Int(u64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
}

const OPERATORS: &[&str] = &[
    "**", "//", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "<", ">", "(", ")", "[", "]",
    ",", ".", "=",
];

fn error(offset: usize, reason: impl Into<String>) -> ParseError {
    ParseError {
        offset,
        reason: reason.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        if c.is_ascii_digit()
            || (c == '.' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()))
        {
            let (token, end) = lex_number(source, i)?;
            tokens.push((start, token));
            i = end;
        } else if c == '\'' || c == '"' {
            let (text, end) = lex_string(source, i)?;
            tokens.push((start, Token::Str(text)));
            i = end;
        } else if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push((start, Token::Ident(source[start..i].to_string())));
        } else if let Some(op) = OPERATORS.iter().find(|op| source[i..].starts_with(**op)) {
            tokens.push((start, Token::Op(op)));
            i += op.len();
        } else {
            let ch = source[i..].chars().next().unwrap_or(c);
            return Err(error(i, format!("unexpected character {ch:?}")));
        }
    }
    Ok(tokens)
}

fn lex_number(source: &str, start: usize) -> Result<(Token, usize), ParseError> {
    let bytes = source.as_bytes();
    let mut i = start;
    let mut is_float = false;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        is_float = true;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text = &source[start..i];
    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|e| error(start, format!("invalid float {text:?}: {e}")))?
    } else {
        text.parse::<u64>()
            .map(Token::Int)
            .map_err(|e| error(start, format!("invalid integer {text:?}: {e}")))?
    };
    Ok((token, i))
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize), ParseError> {
    let mut chars = source[start..].char_indices();
    let (_, quote) = chars
        .next()
        .ok_or_else(|| error(start, "unterminated string"))?;
    let mut out = String::new();
    while let Some((offset, c)) = chars.next() {
        if c == quote {
            return Ok((out, start + offset + c.len_utf8()));
        }
        if c == '\\' {
            let (_, escaped) = chars
                .next()
                .ok_or_else(|| error(start + offset, "unterminated escape"))?;
            out.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            });
        } else {
            out.push(c);
        }
    }
    Err(error(start, "unterminated string"))
}

/// Parse `source` into an expression tree.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    let expr = parser.expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(error(parser.offset(), format!("unexpected {token:?}"))),
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Token::Op(o)) if *o == op)
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn expect_op(&mut self, op: &str) -> Result<(), ParseError> {
        if self.at_op(op) {
            self.pos += 1;
            Ok(())
        } else {
            Err(error(self.offset(), format!("expected '{op}'")))
        }
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and_expr()?;
        while self.at_keyword("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.not_expr()?;
        while self.at_keyword("and") {
            self.pos += 1;
            let right = self.not_expr()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.at_keyword("not") {
            self.pos += 1;
            let operand = self.not_expr()?;
            return Ok(Expr::unary(UnaryOp::Not, operand));
        }
        self.comparison()
    }

    fn compare_op(&self) -> Option<BinaryOp> {
        match self.peek()? {
            Token::Op("==") => Some(BinaryOp::Eq),
            Token::Op("!=") => Some(BinaryOp::Ne),
            Token::Op("<") => Some(BinaryOp::Lt),
            Token::Op("<=") => Some(BinaryOp::Le),
            Token::Op(">") => Some(BinaryOp::Gt),
            Token::Op(">=") => Some(BinaryOp::Ge),
            Token::Ident(w) if w == "in" => Some(BinaryOp::Contains),
            _ => None,
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.arith()?;
        let Some(op) = self.compare_op() else {
            return Ok(left);
        };
        self.pos += 1;
        let right = self.arith()?;
        if self.compare_op().is_some() {
            return Err(error(
                self.offset(),
                "chained comparisons are not supported; use parentheses",
            ));
        }
        Ok(Expr::binary(op, left, right))
    }

    fn arith(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = if self.at_op("+") {
                BinaryOp::Add
            } else if self.at_op("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => BinaryOp::Mul,
                Some(Token::Op("/")) => BinaryOp::Div,
                Some(Token::Op("//")) => BinaryOp::FloorDiv,
                Some(Token::Op("%")) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::binary(op, left, right);
        }
    }

    /// `-9223372036854775808` as a whole operand, the one negative literal
    /// whose magnitude does not fit an `i64`.
    fn at_min_int(&self) -> bool {
        let token = |k: usize| self.tokens.get(self.pos + k).map(|(_, t)| t);
        matches!(token(1), Some(Token::Int(m)) if *m == i64::MIN.unsigned_abs())
            && !matches!(token(2), Some(Token::Op("**" | "(" | "[" | ".")))
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.at_op("-") && self.at_min_int() {
            self.pos += 2;
            return Ok(Expr::constant(i64::MIN));
        }
        if self.at_op("-") {
            self.pos += 1;
            let operand = self.unary()?;
            // fold negative literals so `-0.5` stays a constant
            return Ok(match operand.node() {
                Node::Const(Value::Int(i)) if *i > 0 => Expr::constant(-*i),
                Node::Const(Value::Float(f)) if !f.is_sign_negative() => Expr::constant(-*f),
                _ => Expr::unary(UnaryOp::Neg, operand),
            });
        }
        if self.at_op("+") {
            self.pos += 1;
            let operand = self.unary()?;
            return Ok(Expr::unary(UnaryOp::Pos, operand));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.postfix()?;
        if self.at_op("**") {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        loop {
            if self.at_op("(") {
                self.pos += 1;
                expr = self.call(expr)?;
            } else if self.at_op("[") {
                self.pos += 1;
                let key = self.expression()?;
                self.expect_op("]")?;
                expr = Expr::binary(BinaryOp::Getitem, expr, key);
            } else if self.at_op(".") {
                self.pos += 1;
                let offset = self.offset();
                match self.advance() {
                    Some(Token::Ident(name)) => expr = expr.attr(&name),
                    _ => return Err(error(offset, "expected attribute name")),
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.at_op(")") {
            let keyword = match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
                (Some((_, Token::Ident(name))), Some((_, Token::Op("=")))) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.pos += 2;
                kwargs.push((name, self.expression()?));
            } else if kwargs.is_empty() {
                args.push(self.expression()?);
            } else {
                return Err(error(
                    self.offset(),
                    "positional argument follows keyword argument",
                ));
            }
            if !self.at_op(",") {
                break;
            }
            self.pos += 1;
        }
        self.expect_op(")")?;
        Ok(builtin_call(callee, args, kwargs))
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Int(i)) => i64::try_from(i)
                .map(Expr::constant)
                .map_err(|_| error(offset, format!("integer {i} out of range"))),
            Some(Token::Float(f)) => Ok(Expr::constant(f)),
            Some(Token::Str(s)) => Ok(Expr::constant(s)),
            Some(Token::Ident(word)) => Ok(match word.as_str() {
                "None" => Expr::constant(Value::Null),
                "True" => Expr::constant(true),
                "False" => Expr::constant(false),
                "inf" => Expr::constant(f64::INFINITY),
                "nan" => Expr::constant(f64::NAN),
                macros::SECTION_NAME => macros::section(),
                "and" | "or" | "not" | "in" => {
                    return Err(error(offset, format!("unexpected keyword '{word}'")));
                }
                _ => Expr::name(word),
            }),
            Some(Token::Op("(")) => self.parenthesized(offset),
            Some(Token::Op("[")) => {
                let items = self.sequence("]")?;
                Ok(Expr::constant(Value::List(constant_items(items, offset)?)))
            }
            Some(token) => Err(error(offset, format!("unexpected {token:?}"))),
            None => Err(error(offset, "unexpected end of expression")),
        }
    }

    fn parenthesized(&mut self, offset: usize) -> Result<Expr, ParseError> {
        if self.at_op(")") {
            self.pos += 1;
            return Ok(Expr::constant(Value::Tuple(Vec::new())));
        }
        let first = self.expression()?;
        if self.at_op(")") {
            self.pos += 1;
            return Ok(first);
        }
        self.expect_op(",")?;
        let mut items = vec![first];
        items.extend(self.sequence(")")?);
        Ok(Expr::constant(Value::Tuple(constant_items(items, offset)?)))
    }

    /// Comma-separated expressions up to and including `close`; a trailing comma is allowed.
    fn sequence(&mut self, close: &str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.at_op(close) {
            items.push(self.expression()?);
            if !self.at_op(",") {
                break;
            }
            self.pos += 1;
        }
        self.expect_op(close)?;
        Ok(items)
    }
}

fn constant_items(items: Vec<Expr>, offset: usize) -> Result<Vec<Value>, ParseError> {
    items
        .into_iter()
        .map(|item| match item.node() {
            Node::Const(value) => Ok(value.clone()),
            _ => Err(error(offset, "list and tuple displays must be constant")),
        })
        .collect()
}

fn builtin_call(callee: Expr, mut args: Vec<Expr>, kwargs: Vec<(String, Expr)>) -> Expr {
    if let Node::Name { name, env: None } = callee.node()
        && kwargs.is_empty()
    {
        let unary = match name.as_str() {
            "abs" => Some(UnaryOp::Abs),
            "len" => Some(UnaryOp::Len),
            "str" => Some(UnaryOp::Str),
            "repr" => Some(UnaryOp::Repr),
            _ => None,
        };
        if let Some(op) = unary
            && args.len() == 1
        {
            return Expr::unary(op, args.remove(0));
        }
        if name == "divmod" && args.len() == 2 {
            let right = args.remove(1);
            return Expr::binary(BinaryOp::DivMod, args.remove(0), right);
        }
    }
    callee.call_with(args, kwargs)
}
