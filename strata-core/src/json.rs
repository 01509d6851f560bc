//! Dependency-free JSON value codec
//!
//! This module provides the parser, serializer, and builder used to frame
//! every StrataDB wire message. The protocol deliberately avoids any
//! third-party serialization library: the value model is small, the grammar
//! is fixed, and keeping the codec in-tree means the wire format is fully
//! under our control.
//!
//! # Value Model
//!
//! [`Value`] is a tagged variant over the JSON grammar. Two details matter
//! for the protocol:
//!
//! - Numbers are split into `Int(i64)` and `Float(f64)`. A number without a
//!   fraction or exponent parses as `Int` when it fits, otherwise `Float`;
//!   a number with either always parses as `Float`.
//! - Objects preserve insertion order and apply last-write-wins on duplicate
//!   keys, so serialized output is deterministic.
//!
//! # Round-Trip Law
//!
//! For every representable value `v`, `parse(&serialize(&v)) == v`. The
//! serializer always emits a decimal point or exponent for `Float` so the
//! Int/Float distinction survives the round trip.
//!
//! # Errors
//!
//! [`parse`] fails with a [`ParseError`] carrying a matchable
//! [`ParseErrorKind`] and the byte offset of the offending input.

use std::fmt;
use thiserror::Error;

/// A JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {
    /// String content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content. Floats with no fractional part also qualify, since
    /// the server is free to emit `5` or `5.0` for the same timestamp.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            // `i64::MAX as f64` rounds up to 2^63, so the exclusive bound
            // keeps the conversion exact instead of saturating.
            Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// Numeric content widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Member lookup; `None` for non-objects and missing keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }
}

/// An insertion-ordered JSON object.
///
/// Backed by a `Vec` of entries rather than a hash map: wire objects are
/// small, order must be preserved for deterministic output, and duplicate
/// keys apply last-write-wins without disturbing the original position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member. If the key already exists its value is replaced in
    /// place, keeping the first occurrence's position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What went wrong while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A token that does not fit the grammar at this point.
    UnexpectedToken,
    /// Input ended inside a string literal.
    UnterminatedString,
    /// A backslash escape that is not one of the recognized forms.
    InvalidEscape,
    /// A number with missing digits or one that cannot be represented.
    InvalidNumber,
    /// Valid JSON followed by non-whitespace input.
    TrailingGarbage,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnterminatedString => "unterminated string",
            ParseErrorKind::InvalidEscape => "invalid escape sequence",
            ParseErrorKind::InvalidNumber => "invalid number",
            ParseErrorKind::TrailingGarbage => "trailing garbage after value",
        };
        f.write_str(s)
    }
}

/// Parse failure with the byte offset of the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at position {pos}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub pos: usize,
}

/// Parse a complete JSON document.
///
/// The entire input must be consumed; anything other than whitespace after
/// the value is a [`ParseErrorKind::TrailingGarbage`] failure.
pub fn parse(input: &str) -> Result<Value, ParseError> {
    let mut parser = Parser::new(input);
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < parser.bytes.len() {
        return Err(parser.error(ParseErrorKind::TrailingGarbage));
    }
    Ok(value)
}

/// Serialize a value to compact JSON text.
///
/// Output is always valid input to [`parse`]. Non-finite floats are not
/// representable in JSON and are emitted as `null`.
pub fn serialize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            pos: self.pos,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => self.parse_string().map(Value::String),
            Some(b't') => self.parse_literal("true", Value::Bool(true)),
            Some(b'f') => self.parse_literal("false", Value::Bool(false)),
            Some(b'n') => self.parse_literal("null", Value::Null),
            Some(b'-') | Some(b'0'..=b'9') => self.parse_number(),
            _ => Err(self.error(ParseErrorKind::UnexpectedToken)),
        }
    }

    fn parse_literal(&mut self, literal: &str, value: Value) -> Result<Value, ParseError> {
        if self.input[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Ok(value)
        } else {
            Err(self.error(ParseErrorKind::UnexpectedToken))
        }
    }

    fn parse_object(&mut self) -> Result<Value, ParseError> {
        self.pos += 1; // consume '{'
        let mut object = Object::new();

        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Object(object));
        }

        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(self.error(ParseErrorKind::UnexpectedToken));
            }
            let key = self.parse_string()?;

            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return Err(self.error(ParseErrorKind::UnexpectedToken));
            }
            self.pos += 1;

            self.skip_whitespace();
            let value = self.parse_value()?;
            object.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(object));
                }
                Some(b',') => self.pos += 1,
                _ => return Err(self.error(ParseErrorKind::UnexpectedToken)),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Value, ParseError> {
        self.pos += 1; // consume '['
        let mut items = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }

        loop {
            self.skip_whitespace();
            items.push(self.parse_value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(b',') => self.pos += 1,
                _ => return Err(self.error(ParseErrorKind::UnexpectedToken)),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        self.pos += 1; // consume opening quote
        let mut out = String::new();
        let mut segment_start = self.pos;

        loop {
            match self.peek() {
                None => return Err(self.error(ParseErrorKind::UnterminatedString)),
                Some(b'"') => {
                    out.push_str(&self.input[segment_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    out.push_str(&self.input[segment_start..self.pos]);
                    self.pos += 1;
                    let escaped = match self.peek() {
                        None => return Err(self.error(ParseErrorKind::UnterminatedString)),
                        Some(b) => b,
                    };
                    self.pos += 1;
                    match escaped {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{0008}'),
                        b'f' => out.push('\u{000C}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => out.push(self.parse_unicode_escape()?),
                        _ => {
                            self.pos -= 1;
                            return Err(self.error(ParseErrorKind::InvalidEscape));
                        }
                    }
                    segment_start = self.pos;
                }
                Some(_) => {
                    // Raw UTF-8 passes through untouched; copied per segment.
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, ParseError> {
        // `get` also rejects a multi-byte character straddling the four hex
        // positions, which direct slicing would turn into a panic.
        let hex = match self.input.get(self.pos..self.pos + 4) {
            Some(hex) => hex,
            None => return Err(self.error(ParseErrorKind::InvalidEscape)),
        };
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| self.error(ParseErrorKind::InvalidEscape))?;
        self.pos += 4;
        // No surrogate-pair combining; lone surrogates cannot exist in a
        // Rust string and become the replacement character.
        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }

    fn parse_number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;

        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        if !self.consume_digits() {
            return Err(ParseError {
                kind: ParseErrorKind::InvalidNumber,
                pos: start,
            });
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            if !self.consume_digits() {
                return Err(ParseError {
                    kind: ParseErrorKind::InvalidNumber,
                    pos: start,
                });
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if !self.consume_digits() {
                return Err(ParseError {
                    kind: ParseErrorKind::InvalidNumber,
                    pos: start,
                });
            }
        }

        let text = &self.input[start..self.pos];
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Int(n));
            }
            // Out of i64 range; fall back to floating point.
        }
        text.parse::<f64>().map(Value::Float).map_err(|_| ParseError {
            kind: ParseErrorKind::InvalidNumber,
            pos: start,
        })
    }

    fn consume_digits(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos > start
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(n) => {
            out.push_str(&n.to_string());
        }
        Value::Float(f) => write_float(out, *f),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(object) => {
            out.push('{');
            for (i, (key, value)) in object.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, value);
            }
            out.push('}');
        }
    }
}

fn write_float(out: &mut String, f: f64) {
    if !f.is_finite() {
        out.push_str("null");
        return;
    }
    // Debug formatting is the shortest round-trippable form and always
    // carries a '.' or exponent, so Float stays Float on re-parse.
    out.push_str(&format!("{:?}", f));
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Incremental builder for a JSON object.
///
/// Fields appear in the output in call order. Values nest through the
/// [`Value`] conversions, so objects and arrays can be composed:
///
/// ```rust
/// use strata_core::json::JsonBuilder;
///
/// let text = JsonBuilder::new()
///     .add("col", "tracks")
///     .add("ts", 1700000000123i64)
///     .build();
/// assert_eq!(text, r#"{"col":"tracks","ts":1700000000123}"#);
/// ```
#[derive(Debug, Default)]
pub struct JsonBuilder {
    fields: Object,
}

impl JsonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, preserving call order. Re-adding a key overwrites the
    /// earlier value in place.
    pub fn add(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key, value.into());
        self
    }

    /// Render the object as JSON text.
    pub fn build(self) -> String {
        serialize(&Value::Object(self.fields))
    }

    /// The accumulated object as a [`Value`], for nesting inside another
    /// builder or array.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Render a sequence of values as a JSON array.
pub fn to_json_array<I>(items: I) -> String
where
    I: IntoIterator<Item = Value>,
{
    serialize(&Value::Array(items.into_iter().collect()))
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}
