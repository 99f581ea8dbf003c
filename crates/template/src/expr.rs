// SPDX-License-Identifier: MIT

//! A small total expression language evaluated inside `#{...}`
//! placeholders: a path of dotted field accesses and bracketed indices
//! over the property bag, or a bare quoted string literal. No side
//! effects, no recursion into other expressions — the only way an
//! expression reaches outside its own text is through free variables
//! resolved from the property bag it's evaluated against.

use crate::error::TemplateError;
use stevedore_core::Value;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal string, e.g. `'plain text'`.
    Literal(String),
    /// A variable path, e.g. `name`, `image.tag`, `hosts[0]`.
    Path(String, Vec<Segment>),
}

/// Parses the text between `#{` and `}`.
pub fn parse(input: &str) -> Result<Expr, TemplateError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TemplateError::EmptyExpr);
    }
    if is_quoted(trimmed) {
        return Ok(Expr::Literal(unquote(trimmed)));
    }

    let mut chars = trimmed.char_indices().peekable();
    let (_, first) = chars
        .peek()
        .copied()
        .ok_or_else(|| TemplateError::Syntax(trimmed.to_string()))?;
    if !is_ident_start(first) {
        return Err(TemplateError::Syntax(trimmed.to_string()));
    }

    let root_start = 0;
    let mut root_end = trimmed.len();
    for (i, c) in trimmed.char_indices() {
        if c == '.' || c == '[' {
            root_end = i;
            break;
        }
    }
    let root = trimmed[root_start..root_end].to_string();
    if root.is_empty() || !root.chars().all(is_ident_char) {
        return Err(TemplateError::Syntax(trimmed.to_string()));
    }

    let mut segments = Vec::new();
    let rest = &trimmed[root_end..];
    let mut pos = 0usize;
    let bytes = rest.as_bytes();
    while pos < bytes.len() {
        match bytes[pos] {
            b'.' => {
                let start = pos + 1;
                let mut end = start;
                while end < bytes.len() && is_ident_char(bytes[end] as char) {
                    end += 1;
                }
                if end == start {
                    return Err(TemplateError::Syntax(trimmed.to_string()));
                }
                segments.push(Segment::Field(rest[start..end].to_string()));
                pos = end;
            }
            b'[' => {
                let start = pos + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != b']' {
                    end += 1;
                }
                if end == bytes.len() {
                    return Err(TemplateError::Syntax(trimmed.to_string()));
                }
                let idx: usize = rest[start..end]
                    .parse()
                    .map_err(|_| TemplateError::Syntax(trimmed.to_string()))?;
                segments.push(Segment::Index(idx));
                pos = end + 1;
            }
            _ => return Err(TemplateError::Syntax(trimmed.to_string())),
        }
    }

    Ok(Expr::Path(root, segments))
}

/// Evaluates a parsed expression against a variable lookup closure.
pub fn eval(expr: &Expr, lookup: impl Fn(&str) -> Option<Value>) -> Result<Value, TemplateError> {
    match expr {
        Expr::Literal(s) => Ok(Value::Str(s.clone())),
        Expr::Path(root, segments) => {
            let mut current = lookup(root).ok_or_else(|| TemplateError::UnknownProperty(root.clone()))?;
            for segment in segments {
                current = match (segment, &current) {
                    (Segment::Field(key), Value::Map(m)) => m
                        .get(key)
                        .cloned()
                        .ok_or_else(|| TemplateError::UnknownProperty(key.clone()))?,
                    (Segment::Field(key), other) => {
                        return Err(TemplateError::NotAMap(describe(other), key.clone()))
                    }
                    (Segment::Index(i), Value::List(items)) => items
                        .get(*i)
                        .cloned()
                        .ok_or_else(|| TemplateError::IndexOutOfRange(root.clone(), *i))?,
                    (Segment::Index(i), other) => {
                        return Err(TemplateError::NotIndexable(describe(other), *i))
                    }
                };
            }
            Ok(current)
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::Str(s) => s.clone(),
        Value::List(_) => "<list>".to_string(),
        Value::Map(_) => "<map>".to_string(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'')
}

fn unquote(s: &str) -> String {
    s[1..s.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_core::Value;

    #[test]
    fn parses_bare_identifier() {
        assert_eq!(parse("name").unwrap(), Expr::Path("name".into(), vec![]));
    }

    #[test]
    fn parses_dotted_and_indexed_path() {
        let expr = parse("image.tags[0]").unwrap();
        assert_eq!(
            expr,
            Expr::Path(
                "image".into(),
                vec![Segment::Field("tags".into()), Segment::Index(0)]
            )
        );
    }

    #[test]
    fn parses_string_literal() {
        assert_eq!(parse("'literal'").unwrap(), Expr::Literal("literal".into()));
    }

    #[test]
    fn evaluates_nested_path() {
        let mut image = indexmap::IndexMap::new();
        image.insert("tag".to_string(), Value::from("latest"));
        let mut vars = indexmap::IndexMap::new();
        vars.insert("image".to_string(), Value::Map(image));

        let expr = parse("image.tag").unwrap();
        let value = eval(&expr, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(value, Value::from("latest"));
    }

    #[test]
    fn unknown_property_errors() {
        let expr = parse("missing").unwrap();
        let err = eval(&expr, |_| None).unwrap_err();
        assert_eq!(err, TemplateError::UnknownProperty("missing".into()));
    }
}
