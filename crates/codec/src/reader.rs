// SPDX-License-Identifier: MIT

//! A character-at-a-time reader for the structured-value textual syntax,
//! grounded in the reference implementation's `JSONObject` family
//! (`JSONNumber`, `JSONString`, `JSONList`, `JSONDictionary`): each
//! container reads just enough of the stream to produce its next child,
//! rather than tokenizing the whole input up front.

use crate::error::CodecError;
use indexmap::IndexMap;
use stevedore_core::Value;

pub struct Reader<'a> {
    chars: std::str::CharIndices<'a>,
    peeked: Option<(usize, char)>,
    len: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices(),
            peeked: None,
            len: input.len(),
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        if let Some(p) = self.peeked.take() {
            return Some(p);
        }
        self.chars.next()
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    fn offset(&mut self) -> usize {
        self.peek().map(|(i, _)| i).unwrap_or(self.len)
    }

    /// Skips whitespace, returns the next non-whitespace character without
    /// consuming it. `None` at end of input.
    fn skip_ws(&mut self) -> Option<(usize, char)> {
        loop {
            match self.peek() {
                Some((_, c)) if c.is_whitespace() => {
                    self.bump();
                }
                other => return other,
            }
        }
    }

    /// Reads exactly one value, starting from the current position.
    pub fn read_value(&mut self) -> Result<Value, CodecError> {
        let (offset, first) = match self.skip_ws() {
            Some(p) => p,
            None => return Err(CodecError::EmptyItem(self.offset())),
        };
        self.bump();
        self.read_value_from(offset, first)
    }

    fn read_value_from(&mut self, offset: usize, first: char) -> Result<Value, CodecError> {
        match first {
            '\'' | '"' => self.read_string(first).map(Value::Str),
            '[' => self.read_list(),
            '{' => self.read_map(),
            c if c == '-' || c == '+' || c.is_ascii_digit() => self.read_number(offset, first),
            c => Err(CodecError::IllegalInitialCharacter(offset, c)),
        }
    }

    fn read_string(&mut self, delim: char) -> Result<String, CodecError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(CodecError::UnterminatedString(self.offset())),
                Some((_, c)) if c == delim => return Ok(out),
                Some((off, '\\')) => match self.bump() {
                    None => return Err(CodecError::UnterminatedString(off)),
                    Some((_, escaped)) => out.push(unescape(escaped)),
                },
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn read_number(&mut self, start: usize, first: char) -> Result<Value, CodecError> {
        let mut text = String::new();
        text.push(first);
        loop {
            match self.peek() {
                Some((_, c)) if is_number_char(c) => {
                    text.push(c);
                    self.bump();
                }
                _ => break,
            }
        }
        text.parse::<f64>()
            .map(Value::Number)
            .map_err(|_| CodecError::IllegalNumber(start, text))
    }

    /// After reading an item, expects either the close character (end of
    /// container) or a `,` followed by another item. Returns `true` if
    /// another item follows.
    fn read_item_separator(&mut self, close: char) -> Result<bool, CodecError> {
        match self.skip_ws() {
            None => Err(CodecError::MissingSeparator(self.offset())),
            Some((_, c)) if c == close => {
                self.bump();
                Ok(false)
            }
            Some((_, ',')) => {
                self.bump();
                Ok(true)
            }
            Some((off, _)) => Err(CodecError::MissingSeparator(off)),
        }
    }

    fn read_list(&mut self) -> Result<Value, CodecError> {
        let mut items = Vec::new();
        match self.skip_ws() {
            Some((_, ']')) => {
                self.bump();
                return Ok(Value::List(items));
            }
            None => return Err(CodecError::UnterminatedString(self.offset())),
            _ => {}
        }
        loop {
            items.push(self.read_value()?);
            if !self.read_item_separator(']')? {
                break;
            }
        }
        Ok(Value::List(items))
    }

    fn read_map(&mut self) -> Result<Value, CodecError> {
        let mut map = IndexMap::new();
        match self.skip_ws() {
            Some((_, '}')) => {
                self.bump();
                return Ok(Value::Map(map));
            }
            None => return Err(CodecError::UnterminatedString(self.offset())),
            _ => {}
        }
        loop {
            let (koff, kc) = self.skip_ws().ok_or(CodecError::UnterminatedString(self.offset()))?;
            if kc != '\'' && kc != '"' {
                return Err(CodecError::IllegalInitialCharacter(koff, kc));
            }
            self.bump();
            let key = self.read_string(kc)?;

            match self.skip_ws() {
                Some((_, ':')) => {
                    self.bump();
                }
                Some((off, _)) => return Err(CodecError::MissingSeparator(off)),
                None => return Err(CodecError::MissingSeparator(self.offset())),
            }

            let value = self.read_value()?;
            map.insert(key, value);

            if !self.read_item_separator('}')? {
                break;
            }
        }
        Ok(Value::Map(map))
    }
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-'
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

/// Reads exactly one value from `input`, rejecting trailing non-whitespace.
pub fn read(input: &str) -> Result<Value, CodecError> {
    let mut reader = Reader::new(input);
    let value = reader.read_value()?;
    match reader.skip_ws() {
        None => Ok(value),
        Some((off, _)) => Err(CodecError::TrailingData(off)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn reads_number() {
        assert_eq!(read("42").unwrap(), Value::Number(42.0));
        assert_eq!(read("-3.5").unwrap(), Value::Number(-3.5));
    }

    #[test]
    fn reads_string_with_escapes() {
        assert_eq!(
            read(r#""a\nb""#).unwrap(),
            Value::Str("a\nb".to_string())
        );
    }

    #[test]
    fn reads_nested_list_and_map() {
        let v = read(r#"{"a": [1, 2, "x"], "b": {}}"#).unwrap();
        let m = v.as_map().unwrap();
        assert_eq!(
            m.get("a").unwrap().as_list().unwrap().len(),
            3
        );
        assert_eq!(m.get("b").unwrap(), &Value::empty_map());
    }

    #[test]
    fn empty_list_and_map() {
        assert_eq!(read("[]").unwrap(), Value::List(vec![]));
        assert_eq!(read("{}").unwrap(), Value::empty_map());
    }

    #[parameterized(
        unterminated = { "\"abc", CodecError::UnterminatedString(4) },
        missing_sep = { "[1 2]", CodecError::MissingSeparator(3) },
        illegal_initial = { "xyz", CodecError::IllegalInitialCharacter(0, 'x') },
    )]
    fn rejects_malformed_input(input: &str, expected: CodecError) {
        assert_eq!(read(input).unwrap_err(), expected);
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(matches!(read("1 2"), Err(CodecError::TrailingData(_))));
    }
}
