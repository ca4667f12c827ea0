//! Value representations for reconciled rows.
//!
//! Rows arrive from two heterogeneous type systems (a ScyllaDB source and
//! a PostgreSQL target); [`RowValue`] is the common denominator they are
//! canonicalized into before comparison or statement generation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;
use uuid::Uuid;

/// A row as supplied by either side of the reconciliation: a mapping from
/// field name to value. `BTreeMap` keeps field iteration deterministic, so
/// generated statements and reports are stable across runs.
pub type Row = BTreeMap<String, RowValue>;

/// A dynamically-typed field value drawn from the closed set both sides
/// can produce.
///
/// Comparison and SQL formatting match exhaustively over this enum, so no
/// value type can be silently mishandled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValue {
    /// Null value
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Fixed-precision decimal
    Decimal(Decimal),

    /// String value
    String(String),

    /// Date/time with timezone, canonicalized to UTC
    Timestamp(DateTime<Utc>),

    /// Elapsed-time value
    Duration(Duration),

    /// UUID value
    Uuid(Uuid),

    /// Opaque byte sequence
    Bytes(Vec<u8>),

    /// Ordered collection of values
    Array(Vec<RowValue>),

    /// Nested field mapping
    Object(BTreeMap<String, RowValue>),
}

impl RowValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of this value's type, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::Duration(_) => "duration",
            Self::Uuid(_) => "uuid",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Canonical string form, used for key indexing.
    ///
    /// The same logical key value arriving in different native
    /// representations must produce the same string: UUIDs render
    /// lowercase-hyphenated, timestamps RFC 3339 in UTC, decimals with
    /// trailing zeros stripped, bytes as lowercase hex.
    pub fn canonical_string(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Decimal(d) => d.normalize().to_string(),
            Self::String(s) => s.clone(),
            Self::Timestamp(ts) => ts.to_rfc3339(),
            Self::Duration(d) => format!("{}ns", d.as_nanos()),
            Self::Uuid(u) => u.to_string(),
            Self::Bytes(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2);
                for byte in bytes {
                    let _ = write!(hex, "{byte:02x}");
                }
                hex
            }
            Self::Array(items) => {
                let parts: Vec<String> = items.iter().map(RowValue::canonical_string).collect();
                format!("[{}]", parts.join(","))
            }
            Self::Object(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.canonical_string()))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get this value as a decimal.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a timestamp.
    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// Try to get this value as a duration.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to get this value as a UUID.
    pub fn as_uuid(&self) -> Option<&Uuid> {
        match self {
            Self::Uuid(u) => Some(u),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get this value as an array.
    pub fn as_array(&self) -> Option<&Vec<RowValue>> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to get this value as an object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, RowValue>> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl From<bool> for RowValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for RowValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<i64> for RowValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for RowValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for RowValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for RowValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RowValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for RowValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Duration> for RowValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl From<Uuid> for RowValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<Vec<u8>> for RowValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<RowValue>> for RowValue {
    fn from(value: Vec<RowValue>) -> Self {
        Self::Array(value)
    }
}
