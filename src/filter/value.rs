//! Comparison values and their lexical classification.

use std::fmt::{Display, Formatter, Result as FmtResult};

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").unwrap());
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?[0-9]+(\.[0-9]+([eE][+-]?[0-9]+)?|[eE][+-]?[0-9]+)$").unwrap()
});

/// The right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Constant list, only meaningful with `in`.
    List(Vec<Value>),
}

impl Value {
    /// Classify an unquoted word: booleans and numbers keep their type,
    /// anything else becomes a string.
    pub fn from_bare_word(word: &str) -> Value {
        if word.eq_ignore_ascii_case("true") {
            return Value::Boolean(true);
        }
        if word.eq_ignore_ascii_case("false") {
            return Value::Boolean(false);
        }
        if INTEGER.is_match(word) {
            if let Ok(i) = word.parse::<i64>() {
                return Value::Integer(i);
            }
        }
        if FLOAT.is_match(word) {
            if let Ok(f) = word.parse::<f64>() {
                return Value::Float(f);
            }
        }
        Value::String(word.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
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

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Double-quote `s`. Quotes, backslashes and control characters are escaped
/// with the sequences shared by SCIM (JSON) and CEL string literals.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::String(s) => write!(f, "{}", quote(s)),
            Value::Integer(i) => write!(f, "{i}"),
            // Debug keeps the fractional part, so `2.0` does not come back as an integer.
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}
