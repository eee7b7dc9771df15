//! Field kinds and typed field values.
//!
//! Every field of a [`ResourceModel`](super::ResourceModel) declares a
//! [`FieldKind`]. Record values are carried as [`Value`]s and are converted to
//! and from their textual wire form using the kind as a guide.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The declared type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// `true` / `false`.
    Boolean,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Float,
    /// Arbitrary precision decimal.
    Decimal,
    /// Free text.
    String,
    /// Calendar date (`YYYY-MM-DD`).
    Date,
    /// Date and time with UTC offset (RFC 3339).
    #[serde(alias = "date_time")]
    DateTime,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Boolean => write!(f, "boolean"),
            FieldKind::Integer => write!(f, "integer"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Decimal => write!(f, "decimal"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Date => write!(f, "date"),
            FieldKind::DateTime => write!(f, "datetime"),
        }
    }
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boolean" => Ok(FieldKind::Boolean),
            "integer" => Ok(FieldKind::Integer),
            "float" => Ok(FieldKind::Float),
            "decimal" => Ok(FieldKind::Decimal),
            "string" | "text" => Ok(FieldKind::String),
            "date" => Ok(FieldKind::Date),
            "datetime" | "date_time" => Ok(FieldKind::DateTime),
            _ => Err(format!("unknown field kind: {}", s)),
        }
    }
}

impl FieldKind {
    /// Returns true for kinds with a meaningful ordering.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, FieldKind::Boolean)
    }

    /// Parses the textual wire form of a value of this kind.
    ///
    /// Surrounding whitespace is significant only for strings.
    pub fn parse_text(&self, text: &str) -> Result<Value, String> {
        let trimmed = text.trim();
        match self {
            FieldKind::String => Ok(Value::String(text.to_string())),
            FieldKind::Boolean => match trimmed {
                "true" | "1" => Ok(Value::Boolean(true)),
                "false" | "0" => Ok(Value::Boolean(false)),
                _ => Err(format!("'{}' is not a boolean", trimmed)),
            },
            FieldKind::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| format!("'{}' is not an integer: {}", trimmed, e)),
            FieldKind::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| format!("'{}' is not a float: {}", trimmed, e)),
            FieldKind::Decimal => Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map(Value::Decimal)
                .map_err(|e| format!("'{}' is not a decimal: {}", trimmed, e)),
            FieldKind::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| format!("'{}' is not a date: {}", trimmed, e)),
            FieldKind::DateTime => DateTime::parse_from_rfc3339(trimmed)
                .map(Value::DateTime)
                .map_err(|e| format!("'{}' is not a datetime: {}", trimmed, e)),
        }
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Decimal value.
    Decimal(Decimal),
    /// String value.
    String(String),
    /// Date value.
    Date(NaiveDate),
    /// Date and time value.
    DateTime(DateTime<FixedOffset>),
}

impl Value {
    /// Returns true if this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the kind of this value, or `None` for null.
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(FieldKind::Boolean),
            Value::Integer(_) => Some(FieldKind::Integer),
            Value::Float(_) => Some(FieldKind::Float),
            Value::Decimal(_) => Some(FieldKind::Decimal),
            Value::String(_) => Some(FieldKind::String),
            Value::Date(_) => Some(FieldKind::Date),
            Value::DateTime(_) => Some(FieldKind::DateTime),
        }
    }

    /// Returns true if this value may be stored in a field of `kind`.
    ///
    /// Null fits every kind and integers widen to float and decimal.
    pub fn fits(&self, kind: FieldKind) -> bool {
        match (self, kind) {
            (Value::Null, _) => true,
            (Value::Integer(_), FieldKind::Float | FieldKind::Decimal) => true,
            (value, kind) => value.kind() == Some(kind),
        }
    }

    /// Converts this value to the representation of `kind`, widening integers.
    ///
    /// Returns `None` if the value does not fit.
    pub fn coerce(self, kind: FieldKind) -> Option<Value> {
        match (self, kind) {
            (Value::Integer(i), FieldKind::Float) => Some(Value::Float(i as f64)),
            (Value::Integer(i), FieldKind::Decimal) => Some(Value::Decimal(Decimal::from(i))),
            (value, kind) if value.fits(kind) => Some(value),
            _ => None,
        }
    }

    /// Returns the textual wire form of the value.
    ///
    /// Null renders as an empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.to_rfc3339(),
        }
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
