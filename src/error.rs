use thiserror::Error;

/// Result type for progressive SAC operations
pub type Result<T> = std::result::Result<T, SacError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum SacError {
    /// Invalid dimensions for operations
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Not enough stored transitions to serve a batch
    #[error("Insufficient data: need {required} transitions, have {available}")]
    InsufficientData {
        required: usize,
        available: usize,
    },

    /// Empty buffer or container
    #[error("Empty buffer: {0}")]
    EmptyBuffer(String),

    /// IO errors (checkpoint and config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary checkpoint encoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// TOML configuration parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON report errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Helper functions for common error patterns
impl SacError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        SacError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        SacError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SacError::dimension_mismatch("4", "3");
        assert_eq!(err.to_string(), "Dimension mismatch: expected 4, got 3");

        let err = SacError::InsufficientData { required: 64, available: 10 };
        assert!(err.to_string().contains("64"));
    }

    #[test]
    fn test_io_error_is_surfaced() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.bin");
        let err: SacError = io.into();
        assert!(matches!(err, SacError::Io(_)));
        assert!(err.to_string().contains("missing.bin"));
    }
}
