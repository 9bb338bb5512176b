//! The `ROOT` and `SECTION` macros.
//!
//! Deferred values refer to the configuration they live in through two names:
//! `ROOT` is bound to the root section (or, for a defaults tree, the section it
//! currently references) and `SECTION` resolves to the section whose parameter
//! is being read. `SECTION` is a property over a privately bound resolver, so
//! it is looked up afresh on every evaluation and a caller binding of the same
//! name cannot shadow it.
//!
//! ```
//! use sectional::{macros, Config, Value};
//!
//! let config = Config::new();
//! config.set("a", 2).unwrap();
//! config.set("b", macros::root().item("a") * 10).unwrap();
//! assert_eq!(config.get("b").unwrap(), Value::Int(20));
//! ```

use std::cell::RefCell;

use tracing::trace;

use crate::error::EvalError;
use crate::expr::Expr;
use crate::section::Section;
use crate::value::{Function, Map, Value};

pub const ROOT_NAME: &str = "ROOT";
pub const SECTION_NAME: &str = "SECTION";

/// Nested evaluations allowed before a macro is assumed to reference itself.
pub const MAX_DEPTH: usize = 64;

thread_local! {
    static STACK: RefCell<Vec<Section>> = const { RefCell::new(Vec::new()) };
    static SECTION_MACRO: Expr = {
        let resolver = Function::new(SECTION_NAME, |_, _| current_section());
        let mut env = Map::new();
        env.insert(SECTION_NAME, resolver);
        Expr::property(Expr::name_with_env(SECTION_NAME, env))
    };
}

/// The `ROOT` macro.
pub fn root() -> Expr {
    Expr::name(ROOT_NAME)
}

/// The `SECTION` macro.
pub fn section() -> Expr {
    SECTION_MACRO.with(Expr::clone)
}

fn current_section() -> Result<Value, EvalError> {
    STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .cloned()
            .map(Value::Section)
            .ok_or_else(|| EvalError::Call {
                function: SECTION_NAME.into(),
                reason: "no section is being evaluated".into(),
            })
    })
}

/// Marks `section` as the current one until dropped.
struct Frame;

impl Frame {
    fn push(section: &Section) -> Result<Frame, EvalError> {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() >= MAX_DEPTH {
                return Err(EvalError::RecursionLimit(MAX_DEPTH));
            }
            stack.push(section.clone());
            Ok(Frame)
        })
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Evaluate `expr` with `ROOT` bound to `root` and `SECTION` resolving to `current`.
pub(crate) fn evaluate(expr: &Expr, root: &Section, current: &Section) -> Result<Value, EvalError> {
    let _frame = Frame::push(current)?;
    trace!(section = %current.path(), expr = %expr, "evaluating macro");
    let mut env = Map::new();
    env.insert(ROOT_NAME, root.clone());
    expr.evaluate(&env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::map;

    #[test]
    fn section_macro_is_structurally_stable() {
        assert_eq!(section(), section());
        assert_eq!(section().unparse(), "SECTION");
        assert_eq!(root().item("x").unparse(), "ROOT['x']");
    }

    #[test]
    fn section_resolves_to_the_enclosing_section() {
        let config = Config::from_map(map! {
            "a" => 1,
            "sub" => map! { "a" => 10, "twice" => section().item("a") * 2 },
        })
        .unwrap();
        let sub = config.get_section("sub").unwrap();
        assert_eq!(sub.get("twice").unwrap(), Value::Int(20));
    }

    #[test]
    fn caller_cannot_shadow_section() {
        let config = Config::from_map(map! { "x" => 5 }).unwrap();
        let mut env = Map::new();
        env.insert(SECTION_NAME, 0);
        let _frame = Frame::push(&config).unwrap();
        let value = section().item("x").evaluate(&env).unwrap();
        assert_eq!(value, Value::Int(5));
    }

    #[test]
    fn section_outside_evaluation_fails() {
        let err = section().evaluate(&Map::new()).unwrap_err();
        assert!(matches!(err, EvalError::Call { .. }));
    }

    #[test]
    fn self_reference_hits_the_depth_limit() {
        let config = Config::new();
        config.set("a", root().item("a") + 1).unwrap();
        let err = config.get("a").unwrap_err();
        assert!(err.to_string().contains("depth"), "{err}");
        // the stack unwinds completely
        STACK.with(|stack| assert!(stack.borrow().is_empty()));
    }
}
