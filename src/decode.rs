//! Bulk decode of a [`Row`] into an arbitrary serde target.
//!
//! Field names resolve through the row's case-insensitive index, so the
//! target's spelling never has to match the database's. Source cells
//! coerce the same way the typed getters do: boolean targets accept ints
//! and the `1`/`true` literal set, numeric targets parse numeric strings,
//! and date/time-shaped cells (epoch millis, byte-string text, native
//! timestamps) surface in `%Y-%m-%dT%H:%M:%S` form so chrono targets
//! deserialize. Empty-string cells are treated as unset and skipped.

use serde::de::value::{Error as DeError, MapDeserializer};
use serde::de::{DeserializeOwned, Deserializer, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::{SqlectError, SqlectResult};
use crate::row::Row;
use crate::value::Value;

/// RFC 3339-style form handed to string-shaped targets for timestamps.
const DECODE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Decode a row into `T`. See the module docs for the coercion rules.
pub fn decode<T: DeserializeOwned>(row: &Row) -> SqlectResult<T> {
    T::deserialize(RowDeserializer { row }).map_err(|e| SqlectError::Decode(e.to_string()))
}

/// Mapping from a row into a typed shape.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> SqlectResult<Self>;
}

impl<T: DeserializeOwned> FromRow for T {
    fn from_row(row: &Row) -> SqlectResult<Self> {
        decode(row)
    }
}

struct RowDeserializer<'a> {
    row: &'a Row,
}

impl<'a> RowDeserializer<'a> {
    fn entries(
        &self,
        fields: &'static [&'static str],
    ) -> impl Iterator<Item = (&'static str, Cell)> + 'a {
        let row = self.row;
        fields.iter().filter_map(move |&field| {
            let value = row.get(field)?;
            if skip(value) {
                return None;
            }
            Some((field, Cell(value.clone())))
        })
    }
}

// An empty string means "not set", not an explicit blank.
fn skip(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

impl<'de> Deserializer<'de> for RowDeserializer<'_> {
    type Error = DeError;

    // Struct targets drive the lookup: each declared field resolves
    // through the row's case-insensitive index.
    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(MapDeserializer::new(self.entries(fields)))
    }

    // Map targets take every column under its stored spelling.
    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let entries: Vec<(String, Cell)> = self
            .row
            .iter()
            .filter(|(_, v)| !skip(v))
            .map(|(k, v)| (k.to_string(), Cell(v.clone())))
            .collect();
        visitor.visit_map(MapDeserializer::new(entries.into_iter()))
    }

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct enum identifier ignored_any
    }
}

/// One source cell wrapped for permissive deserialization.
struct Cell(Value);

impl<'de> IntoDeserializer<'de, DeError> for Cell {
    type Deserializer = Cell;

    fn into_deserializer(self) -> Cell {
        self
    }
}

impl Cell {
    fn string_form(&self) -> String {
        match &self.0 {
            // Date/time-shaped cells surface in the canonical T-form:
            // epoch millis, native timestamps, and byte-string text that
            // parses as a datetime. Plain strings pass through untouched.
            Value::Timestamp(t) => t.format(DECODE_DATETIME_FORMAT).to_string(),
            Value::Bytes(b) => {
                let text = String::from_utf8_lossy(b).into_owned();
                match crate::value::parse_datetime(&text) {
                    Some(t) => t.format(DECODE_DATETIME_FORMAT).to_string(),
                    None => text,
                }
            }
            Value::Int(n) => match self.0.as_datetime() {
                Some(t) if looks_like_epoch_millis(*n) => {
                    t.format(DECODE_DATETIME_FORMAT).to_string()
                }
                _ => n.to_string(),
            },
            other => other.as_string(),
        }
    }
}

// Plain ints stay ints for numeric targets; only values plausibly in the
// millisecond range (year 2001 onward) read as datetimes for string-shaped
// targets.
fn looks_like_epoch_millis(n: i64) -> bool {
    n >= 1_000_000_000_000
}

impl<'de> Deserializer<'de> for Cell {
    type Error = DeError;

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_bool(self.0.as_bool())
    }

    fn deserialize_i8<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i8(self.0.as_i64() as i8)
    }

    fn deserialize_i16<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i16(self.0.as_i64() as i16)
    }

    fn deserialize_i32<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i32(self.0.as_i32())
    }

    fn deserialize_i64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_i64(self.0.as_i64())
    }

    fn deserialize_u8<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u8(self.0.as_i64() as u8)
    }

    fn deserialize_u16<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u16(self.0.as_i64() as u16)
    }

    fn deserialize_u32<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u32(self.0.as_i64() as u32)
    }

    fn deserialize_u64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_u64(self.0.as_i64() as u64)
    }

    fn deserialize_f32<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_f32(self.0.as_f64() as f32)
    }

    fn deserialize_f64<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_f64(self.0.as_f64())
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.string_form())
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(self.string_form())
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.0.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(n) => visitor.visit_i64(n),
            Value::Float(n) => visitor.visit_f64(n),
            _ => visitor.visit_string(self.string_form()),
        }
    }

    forward_to_deserialize_any! {
        i128 u128 char bytes byte_buf unit unit_struct newtype_struct seq
        tuple tuple_struct map struct enum identifier ignored_any
    }
}
