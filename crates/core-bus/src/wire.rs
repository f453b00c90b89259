//! Deterministic signal wire codec.
//!
//! Queue entries are comma-separated literal values: `nil`, `true`/`false`,
//! decimal numbers, strings quoted with `"`, `\n`, `\\` and `\t` escaped,
//! and tables as `{[k]=v, }`. The serialiser is the single producer of this
//! grammar; the parser must accept everything the serialiser emits.

use crate::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of record")]
    UnexpectedEnd,
    #[error("unexpected byte {byte:#04x} at offset {at}")]
    Unexpected { byte: u8, at: usize },
    #[error("bad escape at offset {at}")]
    BadEscape { at: usize },
    #[error("malformed number at offset {at}")]
    BadNumber { at: usize },
}

/// Serialise one signal record: the values joined by `", "`.
pub fn serialize_record(values: &[Value]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(b", ");
        }
        serialize_value(value, &mut out);
    }
    out
}

fn serialize_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Nil => out.extend_from_slice(b"nil"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Int(i) => out.extend_from_slice(i.to_string().as_bytes()),
        // {:?} round-trips f64 and keeps the trailing ".0" that separates
        // floats from integers in the grammar.
        Value::Num(n) => out.extend_from_slice(format!("{n:?}").as_bytes()),
        Value::Str(bytes) => {
            out.push(b'"');
            for &b in bytes {
                match b {
                    b'"' => out.extend_from_slice(b"\\\""),
                    b'\n' => out.extend_from_slice(b"\\n"),
                    b'\\' => out.extend_from_slice(b"\\\\"),
                    b'\t' => out.extend_from_slice(b"\\t"),
                    _ => out.push(b),
                }
            }
            out.push(b'"');
        }
        Value::Table(pairs) => {
            out.push(b'{');
            for (k, v) in pairs {
                out.push(b'[');
                serialize_value(k, out);
                out.extend_from_slice(b"]=");
                serialize_value(v, out);
                out.extend_from_slice(b", ");
            }
            out.push(b'}');
        }
    }
}

/// Parse a record back into its value tuple.
pub fn parse_record(record: &[u8]) -> Result<Vec<Value>, WireError> {
    let mut parser = Parser { input: record, pos: 0 };
    let mut values = Vec::new();
    parser.skip_ws();
    if parser.at_end() {
        return Ok(values);
    }
    loop {
        values.push(parser.value()?);
        parser.skip_ws();
        if parser.at_end() {
            return Ok(values);
        }
        parser.expect(b',')?;
        parser.skip_ws();
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8, WireError> {
        let b = self.peek().ok_or(WireError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: u8) -> Result<(), WireError> {
        let at = self.pos;
        let got = self.bump()?;
        if got != want {
            return Err(WireError::Unexpected { byte: got, at });
        }
        Ok(())
    }

    fn eat_keyword(&mut self, word: &[u8]) -> bool {
        if self.input[self.pos..].starts_with(word) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Result<Value, WireError> {
        let at = self.pos;
        match self.peek().ok_or(WireError::UnexpectedEnd)? {
            b'n' if self.eat_keyword(b"nil") => Ok(Value::Nil),
            b't' if self.eat_keyword(b"true") => Ok(Value::Bool(true)),
            b'f' if self.eat_keyword(b"false") => Ok(Value::Bool(false)),
            b'"' => self.string(),
            b'{' => self.table(),
            b'-' | b'0'..=b'9' | b'i' | b'n' | b'N' => self.number(),
            byte => Err(WireError::Unexpected { byte, at }),
        }
    }

    fn string(&mut self) -> Result<Value, WireError> {
        self.expect(b'"')?;
        let mut bytes = Vec::new();
        loop {
            let at = self.pos;
            match self.bump()? {
                b'"' => return Ok(Value::Str(bytes)),
                b'\\' => match self.bump()? {
                    b'"' => bytes.push(b'"'),
                    b'n' => bytes.push(b'\n'),
                    b'\\' => bytes.push(b'\\'),
                    b't' => bytes.push(b'\t'),
                    _ => return Err(WireError::BadEscape { at }),
                },
                b => bytes.push(b),
            }
        }
    }

    fn number(&mut self) -> Result<Value, WireError> {
        let start = self.pos;
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }
        if self.eat_keyword(b"inf") {
            let n = if negative { f64::NEG_INFINITY } else { f64::INFINITY };
            return Ok(Value::Num(n));
        }
        if self.eat_keyword(b"NaN") || self.eat_keyword(b"nan") {
            return Ok(Value::Num(f64::NAN));
        }
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' | b'e' | b'E' => {
                    is_float = true;
                    self.pos += 1;
                }
                b'+' | b'-' if is_float => self.pos += 1,
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| WireError::BadNumber { at: start })?;
        if is_float {
            text.parse::<f64>()
                .map(Value::Num)
                .map_err(|_| WireError::BadNumber { at: start })
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| WireError::BadNumber { at: start })
        }
    }

    fn table(&mut self) -> Result<Value, WireError> {
        self.expect(b'{')?;
        let mut pairs = Vec::new();
        loop {
            self.skip_ws();
            match self.peek().ok_or(WireError::UnexpectedEnd)? {
                b'}' => {
                    self.pos += 1;
                    return Ok(Value::Table(pairs));
                }
                b'[' => {
                    self.pos += 1;
                    let key = self.value()?;
                    self.expect(b']')?;
                    self.expect(b'=')?;
                    let value = self.value()?;
                    pairs.push((key, value));
                    self.skip_ws();
                    if self.peek() == Some(b',') {
                        self.pos += 1;
                    }
                }
                byte => return Err(WireError::Unexpected { byte, at: self.pos }),
            }
        }
    }
}
