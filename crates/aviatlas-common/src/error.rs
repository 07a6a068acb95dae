//! Error types for AviAtlas

use thiserror::Error;

/// Result type alias for AviAtlas operations
pub type Result<T> = std::result::Result<T, AviatlasError>;

/// Main error type for AviAtlas
#[derive(Error, Debug)]
pub enum AviatlasError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AviatlasError {
    /// True for failures reading the taxonomy source itself.
    ///
    /// These abort a run before a summary can be produced.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Csv(_) | Self::MissingColumns(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message() {
        let err = AviatlasError::MissingColumns(vec!["ORDER".to_string(), "FAMILY".to_string()]);
        assert_eq!(err.to_string(), "Missing required columns: ORDER, FAMILY");
        assert!(err.is_source_failure());
    }

    #[test]
    fn test_config_is_not_source_failure() {
        let err = AviatlasError::Config("batch size must be positive".to_string());
        assert!(!err.is_source_failure());
    }
}
