//! Loosely typed values read out of text sources.

use serde::Serialize;
use std::fmt;

/// A text value coerced to the most specific type it parses as.
///
/// Coercion order is integer, then float, then the literals `yes`/`no`,
/// and finally the raw text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntryValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl EntryValue {
    pub fn coerce(raw: &str) -> Self {
        if let Ok(number) = raw.parse::<i64>() {
            return EntryValue::Integer(number);
        }
        if let Ok(number) = raw.parse::<f64>() {
            return EntryValue::Float(number);
        }
        match raw {
            "yes" => EntryValue::Bool(true),
            "no" => EntryValue::Bool(false),
            _ => EntryValue::Text(raw.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EntryValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EntryValue::Integer(v) => Some(*v as f64),
            EntryValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EntryValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntryValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for EntryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryValue::Integer(v) => write!(f, "{}", v),
            EntryValue::Float(v) => write!(f, "{}", v),
            EntryValue::Bool(true) => write!(f, "yes"),
            EntryValue::Bool(false) => write!(f, "no"),
            EntryValue::Text(v) => write!(f, "{}", v),
        }
    }
}
