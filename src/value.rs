//! Dynamic values shared by parameters, row cells, and payload maps.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical text form for timestamps travelling through SQL text.
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A dynamic value for query bindings and result cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Permissive i64 coercion: numeric strings parse, bools are 1/0,
    /// everything unparseable is 0.
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Float(n) => *n as i64,
            Value::Bool(b) => i64::from(*b),
            Value::String(s) => s.parse().unwrap_or(0),
            Value::Bytes(b) => String::from_utf8_lossy(b).parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// Permissive i32 coercion (see [`Value::as_i64`]).
    pub fn as_i32(&self) -> i32 {
        self.as_i64() as i32
    }

    /// Permissive f64 coercion.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Int(n) => *n as f64,
            Value::Float(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::String(s) => s.parse().unwrap_or(0.0),
            Value::Bytes(b) => String::from_utf8_lossy(b).parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Boolean coercion. The only truthy string literals are `true` and `1`;
    /// numbers are truthy when non-zero.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => s == "true" || s == "1",
            _ => false,
        }
    }

    /// Stringify anything. Null becomes the empty string.
    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Timestamp(t) => t.format(DATETIME_FORMAT).to_string(),
        }
    }

    /// Datetime coercion: text goes through the fixed-width parser,
    /// numbers are epoch milliseconds, native timestamps pass through.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(t) => Some(*t),
            Value::String(s) => parse_datetime(s),
            Value::Bytes(b) => parse_datetime(&String::from_utf8_lossy(b)),
            Value::Int(ms) => from_epoch_millis(*ms),
            Value::Float(ms) => from_epoch_millis(*ms as i64),
            _ => None,
        }
    }

    /// True when the value carries nothing: Null, or a stringified form
    /// equal to the empty string.
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Null) || matches!(self, Value::String(s) if s.is_empty())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Fixed-width datetime parsing.
///
/// Strips a fractional suffix at the first `.` (else a timezone suffix at
/// the first `+`), folds `T` into a space, then dispatches on length:
/// 10 chars parse as a date, 13 as date+hour, 16 as date+hour+minute, and
/// anything else as a full `%Y-%m-%d %H:%M:%S`.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let mut s = text;
    if let Some(i) = s.find('.').filter(|i| *i > 0) {
        s = &s[..i];
    } else if let Some(i) = s.find('+').filter(|i| *i > 0) {
        s = &s[..i];
    }
    let s = s.replace('T', " ");
    match s.len() {
        10 => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        13 => NaiveDateTime::parse_from_str(&format!("{s}:00"), "%Y-%m-%d %H:%M").ok(),
        16 => NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M").ok(),
        _ => NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok(),
    }
}

fn from_epoch_millis(ms: i64) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
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

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// An insertion-ordered field map with case-insensitive lookup.
///
/// Constraint sources, DML payloads, and primary-key maps all go through
/// this type so composed SQL is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace under case-insensitive matching. A replacement
    /// keeps the entry's position and its stored key spelling.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let lower = key.to_lowercase();
        match self.index.get(&lower) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(lower, self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Chainable insert for map-literal construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index
            .get(&key.to_lowercase())
            .map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for ValueMap
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
