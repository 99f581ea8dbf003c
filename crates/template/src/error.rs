// SPDX-License-Identifier: MIT

//! Errors from parsing and evaluating `#{expr}` placeholders (§4.2).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TemplateError {
    #[error("unterminated '#{{' expression")]
    UnterminatedExpr,

    #[error("empty expression")]
    EmptyExpr,

    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("'{0}' is not a list, cannot index with [{1}]")]
    NotIndexable(String, usize),

    #[error("list index {1} out of range for '{0}'")]
    IndexOutOfRange(String, usize),

    #[error("'{0}' is not a map, cannot look up key '{1}'")]
    NotAMap(String, String),

    #[error("invalid expression syntax: {0}")]
    Syntax(String),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
