//! Dynamically-typed cell values.
//!
//! A relational result set carries heterogeneous values per row. Each
//! cell is decoded into a [`CellValue`] by the data source executor and
//! serialized back out as a plain JSON scalar, which is what the
//! dashboard front end expects.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer};

/// A single value in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL `NULL`.
    Null,
    /// A boolean column.
    Bool(bool),
    /// Any integer column that fits in 64 signed bits.
    Int(i64),
    /// A floating point column.
    Float(f64),
    /// An exact numeric (`NUMERIC` / `DECIMAL`) column.
    Decimal(Decimal),
    /// Character data, and the fallback for types without a native mapping.
    Text(String),
    /// A point in time, normalized to UTC.
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    /// Whether this cell is SQL `NULL`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Interpret the cell as text.
    ///
    /// Text cells are borrowed; every other non-null value is rendered
    /// with its [`Display`](fmt::Display) form. `NULL` has no text form.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(Cow::Borrowed(s.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    /// Return the timestamp if this cell holds one.
    pub const fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            // Graph panels need numbers, so decimals go out as f64 when
            // they fit and as their exact string otherwise.
            Self::Decimal(d) => match d.to_f64() {
                Some(x) => serializer.serialize_f64(x),
                None => serializer.serialize_str(&d.to_string()),
            },
            Self::Text(s) => serializer.serialize_str(s),
            Self::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Decimal> for CellValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn text_form_of_scalars() {
        assert_eq!(CellValue::from("east").as_text().unwrap(), "east");
        assert_eq!(CellValue::Int(42).as_text().unwrap(), "42");
        assert_eq!(CellValue::Bool(true).as_text().unwrap(), "true");
        assert_eq!(CellValue::Decimal(Decimal::new(1050, 2)).as_text().unwrap(), "10.50");
        assert!(CellValue::Null.as_text().is_none());
    }

    #[test]
    fn serializes_as_plain_json_scalars() {
        let ts = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        let row = vec![
            CellValue::Null,
            CellValue::Int(7),
            CellValue::from("west"),
            CellValue::Decimal(Decimal::new(25, 1)),
            CellValue::Timestamp(ts),
        ];
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!([null, 7, "west", 2.5, "2020-09-13T12:26:40+00:00"])
        );
    }

    #[test]
    fn option_maps_none_to_null() {
        let none: Option<i64> = None;
        assert!(CellValue::from(none).is_null());
        assert_eq!(CellValue::from(Some(3_i64)), CellValue::Int(3));
    }
}
