//! Error types for radfuse-core.

use thiserror::Error;

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Missing batch field: {field}")]
    MissingField { field: &'static str },

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Distributed error: {0}")]
    Distributed(String),
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::ConfigError(err.to_string())
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::MissingField { field: "cls_labels" };
        assert!(err.to_string().contains("cls_labels"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = CoreError::ShapeMismatch {
            context: "vqa targets",
            expected: "[4, 100]".to_string(),
            actual: "[4, 50]".to_string(),
        };
        assert!(err.to_string().contains("[4, 100]"));
        assert!(err.to_string().contains("[4, 50]"));
    }
}
