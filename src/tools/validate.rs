//! Argument validation against a tool's declared parameter types.

use crate::error::ToolError;
use crate::tools::{ParamType, ToolSchema};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// A validated, fully-typed argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl ArgValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Integer(_) => ParamType::Integer,
            Self::Float(_) => ParamType::Float,
            Self::String(_) => ParamType::String,
            Self::Boolean(_) => ParamType::Boolean,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// Validated arguments in the tool's declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Vec<(String, ArgValue)>,
}

impl ToolArgs {
    pub fn from_pairs(values: Vec<(String, ArgValue)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        match self.require(name)? {
            ArgValue::String(s) => Ok(s),
            other => Err(mismatch(name, ParamType::String, other)),
        }
    }

    pub fn i64(&self, name: &str) -> Result<i64, ToolError> {
        match self.require(name)? {
            ArgValue::Integer(v) => Ok(*v),
            other => Err(mismatch(name, ParamType::Integer, other)),
        }
    }

    /// Integers widen to floats here.
    pub fn f64(&self, name: &str) -> Result<f64, ToolError> {
        match self.require(name)? {
            ArgValue::Float(v) => Ok(*v),
            ArgValue::Integer(v) => Ok(*v as f64),
            other => Err(mismatch(name, ParamType::Float, other)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, ToolError> {
        match self.require(name)? {
            ArgValue::Boolean(v) => Ok(*v),
            other => Err(mismatch(name, ParamType::Boolean, other)),
        }
    }

    fn require(&self, name: &str) -> Result<&ArgValue, ToolError> {
        self.get(name)
            .ok_or_else(|| ToolError::MissingArgument(name.to_string()))
    }
}

fn mismatch(name: &str, expected: ParamType, got: &ArgValue) -> ToolError {
    ToolError::TypeMismatch {
        name: name.to_string(),
        expected,
        got: got.param_type().to_string(),
    }
}

impl Serialize for ToolArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check raw call arguments against `schema` and coerce each one to its
/// declared type.
///
/// Every declared parameter is required. Arguments the schema does not
/// declare are rejected. The input map is only read.
pub fn validate_arguments(
    arguments: &Map<String, Value>,
    schema: &ToolSchema,
) -> Result<ToolArgs, ToolError> {
    let mut values = Vec::with_capacity(schema.parameters().len());

    for (name, expected) in schema.parameters() {
        let raw = arguments
            .get(name)
            .ok_or_else(|| ToolError::MissingArgument(name.clone()))?;
        let value = coerce(raw, *expected).ok_or_else(|| ToolError::TypeMismatch {
            name: name.clone(),
            expected: *expected,
            got: raw.to_string(),
        })?;
        values.push((name.clone(), value));
    }

    if let Some(extra) = arguments
        .keys()
        .find(|key| schema.param_type(key).is_none())
    {
        return Err(ToolError::UnknownArgument(extra.clone()));
    }

    Ok(ToolArgs { values })
}

/// One-shot coercion. Only unambiguous lexical forms convert: `"42"` is an
/// integer, `"true"` a boolean; `"yes"`, `1` as a boolean, or `null` are not.
fn coerce(raw: &Value, expected: ParamType) -> Option<ArgValue> {
    match expected {
        ParamType::Integer => match raw {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .map(ArgValue::Integer),

        ParamType::Float => match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
        .map(ArgValue::Float),

        ParamType::Boolean => match raw {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
        .map(ArgValue::Boolean),

        ParamType::String => match raw {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
        .map(ArgValue::String),
    }
}
