// SPDX-License-Identifier: MIT

//! Renders a `Value` back to the textual syntax (§4.3, §6 "canonical
//! form"): map keys sorted lexicographically and pretty-indented, one
//! trailing newline, strings double-quoted with the same escapes the
//! reader accepts.

use indexmap::IndexMap;
use stevedore_core::Value;
use std::fmt::Write as _;

const INDENT: &str = "  ";

/// Writes `value` compactly, in its given key order (no sorting, no
/// indentation, no trailing newline). Used for values that round-trip
/// through memory rather than through a persisted resource.
pub fn write(value: &Value) -> String {
    let mut out = String::new();
    write_compact(&mut out, value, false);
    out
}

/// Writes `value` in canonical form: every map's keys sorted, indented,
/// one trailing newline appended (§4.8, §6). This is the form persisted
/// to a platform's state resource.
pub fn write_canonical(value: &Value) -> String {
    write_canonical_with(value, &|_path| true)
}

/// As `write_canonical`, but `should_sort` decides, for each map the
/// writer descends into, whether that map's own entries are sorted or
/// kept in their given order. `should_sort` is called with the sequence
/// of keys leading to the map (empty for the root). Lets a caller keep a
/// name-keyed registry's insertion order meaningful — e.g. the order
/// platforms were registered in — while everything else still sorts for
/// determinism.
pub fn write_canonical_with(value: &Value, should_sort: &dyn Fn(&[String]) -> bool) -> String {
    let mut out = String::new();
    let mut path = Vec::new();
    write_pretty(&mut out, value, &mut path, should_sort, 0);
    out.push('\n');
    out
}

fn write_compact(out: &mut String, value: &Value, sorted: bool) {
    match value {
        Value::Number(n) => {
            let _ = write!(out, "{}", format_number(*n));
        }
        Value::Str(s) => write_string(out, s),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_compact(out, item, sorted);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (k, v)) in ordered_entries(map, sorted).enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, k);
                out.push_str(": ");
                write_compact(out, v, sorted);
            }
            out.push('}');
        }
    }
}

fn write_pretty(
    out: &mut String,
    value: &Value,
    path: &mut Vec<String>,
    should_sort: &dyn Fn(&[String]) -> bool,
    depth: usize,
) {
    match value {
        Value::Number(n) => {
            let _ = write!(out, "{}", format_number(*n));
        }
        Value::Str(s) => write_string(out, s),
        Value::List(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[\n");
            let last = items.len() - 1;
            for (i, item) in items.iter().enumerate() {
                push_indent(out, depth + 1);
                write_pretty(out, item, path, should_sort, depth + 1);
                if i != last {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(out, depth);
            out.push(']');
        }
        Value::Map(map) => {
            if map.is_empty() {
                out.push_str("{}");
                return;
            }
            let sorted = should_sort(path);
            let entries: Vec<_> = ordered_entries(map, sorted).collect();
            let last = entries.len() - 1;
            out.push_str("{\n");
            for (i, (k, v)) in entries.into_iter().enumerate() {
                push_indent(out, depth + 1);
                write_string(out, k);
                out.push_str(": ");
                path.push(k.clone());
                write_pretty(out, v, path, should_sort, depth + 1);
                path.pop();
                if i != last {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(out, depth);
            out.push('}');
        }
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn ordered_entries<'a>(
    map: &'a IndexMap<String, Value>,
    sorted: bool,
) -> Box<dyn Iterator<Item = (&'a String, &'a Value)> + 'a> {
    if sorted {
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        Box::new(entries.into_iter())
    } else {
        Box::new(map.iter())
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
