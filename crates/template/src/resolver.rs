// SPDX-License-Identifier: MIT

//! The `#{expr}` substitution state machine (§4.2), grounded in the
//! reference implementation's character-at-a-time `Resolver`: `##`
//! escapes to a literal `#`, and a single-quoted string inside `#{...}`
//! may itself contain `}` without closing the expression.
//!
//! Unlike the reference implementation (which re-feeds a resolved
//! expression's *characters* through a fresh resolver, since Python
//! strings are iterables of characters), this version resolves an
//! expression to a `Value` and, only when that value is itself a string,
//! recursively resolves placeholders inside it. This preserves
//! "templates that reference other templates" while staying total over
//! non-string values.

use crate::error::TemplateError;
use crate::expr;
use stevedore_core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Plain,
    Sharp,
    SharpN,
    Expr,
    ExprQuote,
}

/// Resolves every `#{expr}` placeholder in `input` against `lookup`,
/// returning the substituted text.
pub fn resolve(input: &str, lookup: &impl Fn(&str) -> Option<Value>) -> Result<String, TemplateError> {
    let mut out = String::new();
    let mut state = State::Plain;
    let mut expr_buf = String::new();

    for c in input.chars() {
        state = match state {
            State::Plain => {
                if c == '#' {
                    State::Sharp
                } else {
                    out.push(c);
                    State::Plain
                }
            }
            State::Sharp => {
                if c == '{' {
                    expr_buf.clear();
                    State::Expr
                } else if c == '#' {
                    out.push('#');
                    State::SharpN
                } else {
                    out.push('#');
                    out.push(c);
                    State::Plain
                }
            }
            State::SharpN => {
                if c != '#' {
                    out.push(c);
                    State::Plain
                } else {
                    out.push(c);
                    State::SharpN
                }
            }
            State::Expr => {
                if c == '}' {
                    let parsed = expr::parse(&expr_buf)?;
                    let value = expr::eval(&parsed, lookup)?;
                    out.push_str(&resolve_value(&value, lookup)?);
                    State::Plain
                } else {
                    expr_buf.push(c);
                    if c == '\'' {
                        State::ExprQuote
                    } else {
                        State::Expr
                    }
                }
            }
            State::ExprQuote => {
                expr_buf.push(c);
                if c == '\'' {
                    State::Expr
                } else {
                    State::ExprQuote
                }
            }
        };
    }

    match state {
        State::Plain => Ok(out),
        _ => Err(TemplateError::UnterminatedExpr),
    }
}

fn resolve_value(value: &Value, lookup: &impl Fn(&str) -> Option<Value>) -> Result<String, TemplateError> {
    match value {
        Value::Str(s) => resolve(s, lookup),
        Value::Number(n) => Ok(format_number(*n)),
        Value::List(items) => {
            let parts: Result<Vec<String>, TemplateError> = items
                .iter()
                .map(|v| resolve_value(v, lookup))
                .collect();
            Ok(format!("[{}]", parts?.join(", ")))
        }
        Value::Map(map) => {
            let parts: Result<Vec<String>, TemplateError> = map
                .iter()
                .map(|(k, v)| resolve_value(v, lookup).map(|text| format!("{k}: {text}")))
                .collect();
            Ok(format!("{{{}}}", parts?.join(", ")))
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
