//! Request parameters and response headers
//!
//! Both sides of an exchange use the same name/value/kind triple, so a
//! snapshot can render them uniformly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a parameter travels in the request (or `HttpHeader` for response headers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    Cookie,
    GetOrPost,
    UrlSegment,
    HttpHeader,
    RequestBody,
    QueryString,
    QueryStringWithoutEncode,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cookie => "Cookie",
            Self::GetOrPost => "GetOrPost",
            Self::UrlSegment => "UrlSegment",
            Self::HttpHeader => "HttpHeader",
            Self::RequestBody => "RequestBody",
            Self::QueryString => "QueryString",
            Self::QueryStringWithoutEncode => "QueryStringWithoutEncode",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loosely-typed parameter payload
///
/// Serialized untagged: the JSON value kind picks the variant when a
/// snapshot is read back. Arrays and objects land in `Structured`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Structured(serde_json::Value),
}

impl ParameterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used when the value has to go on the wire
    pub fn to_wire_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
            Self::Structured(v) => v.to_string(),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for ParameterValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for ParameterValue {
    // NaN and infinities have no JSON form
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Self::Number)
            .unwrap_or(Self::Null)
    }
}

impl From<serde_json::Value> for ParameterValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            structured => Self::Structured(structured),
        }
    }
}

/// A name/value/kind triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    pub name: String,
    pub value: ParameterValue,
    #[serde(rename = "Type")]
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
        kind: ParameterKind,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind,
        }
    }

    pub fn header(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self::new(name, value, ParameterKind::HttpHeader)
    }
}
