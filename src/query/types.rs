//! Typed query parameter values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A value bound to a named query parameter.
///
/// On the wire this is a plain JSON scalar: integers, booleans, strings or
/// `null`. Anything else (floats, arrays, objects) fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Int64(i64),
    Str(String),
}

impl TypedValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// Engine type name used when the parameter is submitted.
    ///
    /// Null parameters are declared as `STRING`.
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedValue::Int64(_) => "INT64",
            TypedValue::Bool(_) => "BOOL",
            TypedValue::Str(_) | TypedValue::Null => "STRING",
        }
    }

    /// Convert to a display string.
    pub fn to_display_string(&self) -> String {
        match self {
            TypedValue::Null => "NULL".to_string(),
            TypedValue::Bool(v) => v.to_string(),
            TypedValue::Int64(v) => v.to_string(),
            TypedValue::Str(v) => v.clone(),
        }
    }
}

impl From<i64> for TypedValue {
    fn from(v: i64) -> Self {
        TypedValue::Int64(v)
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        TypedValue::Int64(i64::from(v))
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Bool(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::Str(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::Str(v)
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(TypedValue::Null, Into::into)
    }
}

/// Classify an untyped JSON value as a bindable parameter.
///
/// Numbers become `Int64` (fractions are truncated, out-of-range values
/// saturate), booleans become `Bool`, `null` becomes `Null` and everything
/// else is bound as its string form. This never fails.
pub fn bind(value: &Value) -> TypedValue {
    match value {
        Value::Null => TypedValue::Null,
        Value::Bool(b) => TypedValue::Bool(*b),
        Value::Number(n) => {
            let int = n
                .as_i64()
                .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
                .unwrap_or_else(|| n.as_f64().map_or(0, |f| f as i64));
            TypedValue::Int64(int)
        }
        Value::String(s) => TypedValue::Str(s.clone()),
        other => TypedValue::Str(other.to_string()),
    }
}

/// Engine-side parameter type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterType {
    #[serde(rename = "type")]
    pub type_name: &'static str,
}

/// Engine-side parameter value; scalars travel as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterValue {
    pub value: Option<String>,
}

/// A named parameter in the shape the analytical engine's REST API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub parameter_value: ParameterValue,
}

impl QueryParameter {
    /// Render a bound value under `name`.
    pub fn new(name: impl Into<String>, value: &TypedValue) -> Self {
        Self {
            name: name.into(),
            parameter_type: ParameterType {
                type_name: value.type_name(),
            },
            parameter_value: ParameterValue {
                value: (!value.is_null()).then(|| value.to_display_string()),
            },
        }
    }
}
