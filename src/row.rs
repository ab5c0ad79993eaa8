//! Case-insensitive result records.
//!
//! Drivers capitalize column names however they like; a [`Row`] keeps the
//! values in arrival order with a lowercase key index so callers never
//! have to match the database's casing. Typed getters coerce permissively
//! and fall back to zero values, in line with [`Value`]'s coercions.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::error::SqlectResult;
use crate::value::Value;

/// One result record: column values in arrival order plus a lowercase
/// key index maintained by [`Row::put`] and [`Row::remove`].
#[derive(Debug, Clone, Default)]
pub struct Row {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self, key: &str) -> Option<usize> {
        self.index.get(&key.to_lowercase()).copied()
    }

    /// Insert or replace. A case-insensitive match keeps the stored key
    /// spelling and position; otherwise the key is stored as given.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.resolve(&key) {
            Some(i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.to_lowercase(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Remove under case-insensitive matching. Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) {
        if let Some(i) = self.resolve(key) {
            self.entries.remove(i);
            self.index.remove(&key.to_lowercase());
            for (j, (k, _)) in self.entries.iter().enumerate().skip(i) {
                self.index.insert(k.to_lowercase(), j);
            }
        }
    }

    /// Raw value lookup, case-insensitive.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.resolve(key).map(|i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(&key.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Column names in arrival order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_i32(&self, key: &str) -> i32 {
        self.get(key).map_or(0, Value::as_i32)
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        self.get(key).map_or(0, Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::as_bool)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key).map_or_else(String::new, Value::as_string)
    }

    /// Timestamp lookup: absent, null, or unparseable values yield `None`.
    /// Text goes through the fixed-width parser; integers and floats are
    /// epoch milliseconds.
    pub fn get_time(&self, key: &str) -> Option<NaiveDateTime> {
        self.get(key).and_then(Value::as_datetime)
    }

    /// Decode this record into a target shape. See [`crate::decode`] for
    /// the coercion rules.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> SqlectResult<T> {
        crate::decode::decode(self)
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.put(k, v);
        }
        row
    }
}
