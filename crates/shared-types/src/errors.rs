//! Error types shared by the scatter engine crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base error type for all scatter engine operations
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum ScatterError {
    // Shape errors, checked at the attribute store boundary
    #[error("Shape mismatch on channel {channel}: expected {expected} but got {actual}")]
    ShapeMismatch {
        channel: String,
        expected: String,
        actual: String,
    },

    #[error("Unsupported channel: {name}")]
    UnsupportedChannel { name: String },

    // Style / configuration errors
    #[error("Invalid color: {value}")]
    InvalidColor { value: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
        field: Option<String>,
    },

    #[error("Unknown model property: {key}")]
    UnknownProperty { key: String },

    // GPU errors
    #[error("GPU error: {message}")]
    Gpu { message: String },
}

/// Result type alias for scatter engine operations
pub type ScatterResult<T> = Result<T, ScatterError>;

impl ScatterError {
    pub fn shape_mismatch(
        channel: impl ToString,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        ScatterError::ShapeMismatch {
            channel: channel.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, field: Option<&str>) -> Self {
        ScatterError::InvalidConfig {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// Convert to a JSON string for the host
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"Gpu","details":{"message":"Failed to serialize error"}}"#.to_string()
        })
    }
}

impl From<serde_json::Error> for ScatterError {
    fn from(err: serde_json::Error) -> Self {
        ScatterError::InvalidConfig {
            message: err.to_string(),
            field: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = ScatterError::shape_mismatch("size", "1000 values", "999 values");

        let json = error.to_json();
        assert!(json.contains("ShapeMismatch"));
        assert!(json.contains("999 values"));
    }

    #[test]
    fn test_error_display() {
        let error = ScatterError::UnsupportedChannel {
            name: "skew".to_string(),
        };
        assert_eq!(error.to_string(), "Unsupported channel: skew");
    }

    #[test]
    fn test_error_conversion() {
        let parse_err = serde_json::from_str::<f32>("not a number").unwrap_err();
        let err: ScatterError = parse_err.into();

        match err {
            ScatterError::InvalidConfig { field, .. } => assert!(field.is_none()),
            _ => panic!("Wrong error variant"),
        }
    }
}
