//! Property value types for Tablekeep
//!
//! This module defines:
//! - EdmType: the eight property type tags a table entity can carry
//! - TypedValue: the archived `{ "type": ..., "value": ... }` pair, value still raw JSON
//! - PropertyValue: the native typed value handed to a store
//!
//! ## Archive conventions
//!
//! - Tags are written `Edm.`-prefixed (`Edm.Int32`); bare tags (`Int32`) are accepted
//! - A missing or unrecognized tag means `Edm.String`
//! - Binary values are base64 strings
//! - Int64 values are written as strings (they exceed the JSON safe integer range)
//! - DateTime values are RFC 3339 strings

use crate::error::{ConversionError, ConversionResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

/// Property type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EdmType {
    /// UTF-8 string (the default for untagged values)
    #[default]
    String,
    /// 128-bit GUID
    Guid,
    /// UTC timestamp
    DateTime,
    /// Raw bytes, base64 in the archive
    Binary,
    /// Boolean
    Boolean,
    /// 64-bit float
    Double,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
}

impl EdmType {
    /// Parse a type tag, falling back to `String` for missing or unknown tags
    pub fn parse(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return EdmType::String;
        };
        match tag.strip_prefix("Edm.").unwrap_or(tag) {
            "Guid" => EdmType::Guid,
            "DateTime" => EdmType::DateTime,
            "Binary" => EdmType::Binary,
            "Boolean" => EdmType::Boolean,
            "Double" => EdmType::Double,
            "Int32" => EdmType::Int32,
            "Int64" => EdmType::Int64,
            _ => EdmType::String,
        }
    }

    /// The canonical `Edm.`-prefixed tag
    pub fn as_str(&self) -> &'static str {
        match self {
            EdmType::String => "Edm.String",
            EdmType::Guid => "Edm.Guid",
            EdmType::DateTime => "Edm.DateTime",
            EdmType::Binary => "Edm.Binary",
            EdmType::Boolean => "Edm.Boolean",
            EdmType::Double => "Edm.Double",
            EdmType::Int32 => "Edm.Int32",
            EdmType::Int64 => "Edm.Int64",
        }
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An archived property value
///
/// The value is kept as raw JSON until [`TypedValue::to_property`] maps it
/// onto the native constructor selected by the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    /// Raw type tag as found in the archive
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    /// Raw JSON value
    #[serde(default)]
    pub value: JsonValue,
}

impl TypedValue {
    /// Create a typed value with a canonical tag
    pub fn new(edm_type: EdmType, value: impl Into<JsonValue>) -> Self {
        Self {
            type_tag: Some(edm_type.as_str().to_string()),
            value: value.into(),
        }
    }

    /// Create a string-typed value
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(EdmType::String, JsonValue::String(value.into()))
    }

    /// The resolved type tag
    pub fn edm_type(&self) -> EdmType {
        EdmType::parse(self.type_tag.as_deref())
    }

    /// The raw value as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Convert to the native value the tag selects
    ///
    /// Binary values are base64-decoded here.
    pub fn to_property(&self) -> ConversionResult<PropertyValue> {
        let expected = self.edm_type();
        let value = &self.value;
        match expected {
            EdmType::String => match value {
                JsonValue::String(s) => Ok(PropertyValue::String(s.clone())),
                JsonValue::Null => Err(ConversionError::invalid(expected, "value is null")),
                other => Ok(PropertyValue::String(other.to_string())),
            },
            EdmType::Guid => {
                let s = expect_str(expected, value)?;
                Uuid::parse_str(s)
                    .map(PropertyValue::Guid)
                    .map_err(|e| ConversionError::invalid(expected, e.to_string()))
            }
            EdmType::DateTime => {
                let s = expect_str(expected, value)?;
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| PropertyValue::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|e| ConversionError::invalid(expected, e.to_string()))
            }
            EdmType::Binary => {
                let s = expect_str(expected, value)?;
                BASE64
                    .decode(s)
                    .map(PropertyValue::Binary)
                    .map_err(|e| ConversionError::invalid(expected, e.to_string()))
            }
            EdmType::Boolean => match value {
                JsonValue::Bool(b) => Ok(PropertyValue::Boolean(*b)),
                JsonValue::String(s) if s.eq_ignore_ascii_case("true") => {
                    Ok(PropertyValue::Boolean(true))
                }
                JsonValue::String(s) if s.eq_ignore_ascii_case("false") => {
                    Ok(PropertyValue::Boolean(false))
                }
                other => Err(ConversionError::invalid(
                    expected,
                    format!("expected a boolean, got {}", other),
                )),
            },
            EdmType::Double => match value {
                JsonValue::Number(n) => n
                    .as_f64()
                    .map(PropertyValue::Double)
                    .ok_or_else(|| ConversionError::invalid(expected, n.to_string())),
                JsonValue::String(s) => parse_double(s)
                    .map(PropertyValue::Double)
                    .ok_or_else(|| ConversionError::invalid(expected, format!("'{}'", s))),
                other => Err(ConversionError::invalid(
                    expected,
                    format!("expected a number, got {}", other),
                )),
            },
            EdmType::Int32 => {
                let n = integer(expected, value)?;
                i32::try_from(n)
                    .map(PropertyValue::Int32)
                    .map_err(|_| ConversionError::invalid(expected, format!("{} out of range", n)))
            }
            EdmType::Int64 => integer(expected, value).map(PropertyValue::Int64),
        }
    }
}

fn expect_str(expected: EdmType, value: &JsonValue) -> ConversionResult<&str> {
    value.as_str().ok_or_else(|| {
        ConversionError::invalid(expected, format!("expected a string, got {}", value))
    })
}

fn integer(expected: EdmType, value: &JsonValue) -> ConversionResult<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| ConversionError::invalid(expected, format!("{} is not an integer", n))),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| ConversionError::invalid(expected, format!("'{}': {}", s, e))),
        other => Err(ConversionError::invalid(
            expected,
            format!("expected an integer, got {}", other),
        )),
    }
}

fn parse_double(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" | "INF" => Some(f64::INFINITY),
        "-Infinity" | "-INF" => Some(f64::NEG_INFINITY),
        other => other.trim().parse::<f64>().ok(),
    }
}

/// Native typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// UTF-8 string
    String(String),
    /// GUID
    Guid(Uuid),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// Raw bytes
    Binary(Vec<u8>),
    /// Boolean
    Boolean(bool),
    /// 64-bit float
    Double(f64),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
}

impl PropertyValue {
    /// Type tag of this value
    pub fn edm_type(&self) -> EdmType {
        match self {
            PropertyValue::String(_) => EdmType::String,
            PropertyValue::Guid(_) => EdmType::Guid,
            PropertyValue::DateTime(_) => EdmType::DateTime,
            PropertyValue::Binary(_) => EdmType::Binary,
            PropertyValue::Boolean(_) => EdmType::Boolean,
            PropertyValue::Double(_) => EdmType::Double,
            PropertyValue::Int32(_) => EdmType::Int32,
            PropertyValue::Int64(_) => EdmType::Int64,
        }
    }

    /// The string payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Encode in archive form
    pub fn to_typed(&self) -> TypedValue {
        let value = match self {
            PropertyValue::String(s) => JsonValue::String(s.clone()),
            PropertyValue::Guid(g) => JsonValue::String(g.to_string()),
            PropertyValue::DateTime(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            PropertyValue::Binary(bytes) => JsonValue::String(BASE64.encode(bytes)),
            PropertyValue::Boolean(b) => JsonValue::Bool(*b),
            PropertyValue::Double(d) => match serde_json::Number::from_f64(*d) {
                Some(n) => JsonValue::Number(n),
                None if d.is_nan() => JsonValue::String("NaN".to_string()),
                None if d.is_sign_positive() => JsonValue::String("Infinity".to_string()),
                None => JsonValue::String("-Infinity".to_string()),
            },
            PropertyValue::Int32(n) => JsonValue::from(*n),
            PropertyValue::Int64(n) => JsonValue::String(n.to_string()),
        };
        TypedValue::new(self.edm_type(), value)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        PropertyValue::Int32(n)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Int64(n)
    }
}

impl From<f64> for PropertyValue {
    fn from(d: f64) -> Self {
        PropertyValue::Double(d)
    }
}
