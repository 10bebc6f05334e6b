//! Property Values
//!
//! A property is either a plain JSON value or a content handle. Delta
//! computation and statement building switch on the variant: content-valued
//! properties never appear in an `update` delta, they contribute their own
//! statements through the handle.

use crate::models::ContentHandle;
use serde_json::Value;

/// Value stored under one fully qualified property name
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Single or multi-valued (`Value::Array`) plain value
    Scalar(Value),
    /// Binary content and its format metadata
    Content(ContentHandle),
}

impl PropertyValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            PropertyValue::Scalar(value) => Some(value),
            PropertyValue::Content(_) => None,
        }
    }

    pub fn as_content(&self) -> Option<&ContentHandle> {
        match self {
            PropertyValue::Content(handle) => Some(handle),
            PropertyValue::Scalar(_) => None,
        }
    }

    pub fn as_content_mut(&mut self) -> Option<&mut ContentHandle> {
        match self {
            PropertyValue::Content(handle) => Some(handle),
            PropertyValue::Scalar(_) => None,
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, PropertyValue::Content(_))
    }

    pub fn is_multi_value(&self) -> bool {
        matches!(self, PropertyValue::Scalar(Value::Array(_)))
    }

    /// String view of a scalar string value
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        PropertyValue::Scalar(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Scalar(Value::String(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Scalar(Value::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Scalar(Value::Bool(value))
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::Scalar(Value::Array(values.into_iter().map(Value::String).collect()))
    }
}

impl From<ContentHandle> for PropertyValue {
    fn from(handle: ContentHandle) -> Self {
        PropertyValue::Content(handle)
    }
}
