//! Error types for pixelfx.
//!
//! Uses thiserror for structured errors. Configuration problems are caught
//! synchronously before any worker is scheduled; numeric degeneracies are
//! handled inside the algorithms and never surface here. Cancellation is a
//! [`RunStatus`](crate::execution::RunStatus), not an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for pixelfx.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Unable to allocate {bytes} bytes of pixel storage")]
    Allocation { bytes: usize },

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors detected while checking buffers and parameters.
///
/// When a filter rejects its configuration the destination receives an
/// unmodified copy of the source, so these errors are always recoverable.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigurationError {
    #[error("Dimension mismatch: expected {expected:?}, got {got:?}")]
    DimensionMismatch { expected: (u32, u32), got: (u32, u32) },

    #[error("Bit depth mismatch: expected {expected}-bit, got {got}-bit")]
    DepthMismatch { expected: u8, got: u8 },

    #[error("Alpha channel mismatch between source and destination")]
    AlphaMismatch,

    #[error("Pixel data has {got} bytes, layout requires {expected}")]
    BufferSize { expected: usize, got: usize },

    #[error("Unsupported bit depth: {0}")]
    UnsupportedDepth(u8),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Missing parameter '{name}'")]
    MissingParameter { name: String },

    #[error("Parameter '{name}' has the wrong type: expected {expected}, got {got}")]
    ParameterType {
        name: String,
        expected: String,
        got: String,
    },

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Filter '{id}' version {version} is newer than the supported version {supported}")]
    UnsupportedVersion {
        id: String,
        version: u32,
        supported: u32,
    },

    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    #[error("Unknown variant {value} for '{name}'")]
    UnknownVariant { name: String, value: i64 },
}

// ============================================================================
// Error Utilities
// ============================================================================

impl ConfigurationError {
    /// Shorthand for an out-of-range or otherwise rejected parameter.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error concerns buffer layout rather than parameters.
    ///
    /// Layout errors leave the destination untouched because it cannot hold
    /// a copy of the source.
    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            ConfigurationError::DimensionMismatch { .. }
                | ConfigurationError::DepthMismatch { .. }
                | ConfigurationError::AlphaMismatch
                | ConfigurationError::BufferSize { .. }
                | ConfigurationError::UnsupportedDepth(_)
        )
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ConfigurationError::DimensionMismatch { expected, .. } => Some(format!(
                "Allocate the destination as {}x{}",
                expected.0, expected.1
            )),
            ConfigurationError::DepthMismatch { expected, .. } => {
                Some(format!("Use a {}-bit destination buffer", expected))
            }
            ConfigurationError::InvalidParameter { name, reason } => {
                Some(format!("Adjust '{}': {}", name, reason))
            }
            ConfigurationError::MissingParameter { name } => {
                Some(format!("Add '{}' to the filter action", name))
            }
            ConfigurationError::UnknownFilter(_) => {
                Some("Run `pixelfx list` to see available filters".to_string())
            }
            _ => None,
        }
    }
}

impl FilterError {
    /// Whether the error was raised by configuration checks.
    pub fn is_configuration(&self) -> bool {
        matches!(self, FilterError::Configuration(_))
    }
}

/// Result type alias for pixelfx operations.
pub type FilterResult<T> = Result<T, FilterError>;

/// Result type alias for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_converts_into_filter_error() {
        let err: FilterError = ConfigurationError::invalid("level", "must be positive").into();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("level"));
    }

    #[test]
    fn test_layout_classification() {
        assert!(ConfigurationError::AlphaMismatch.is_layout());
        assert!(!ConfigurationError::UnknownFilter("x".into()).is_layout());
    }

    #[test]
    fn test_suggested_fix() {
        let err = ConfigurationError::DimensionMismatch {
            expected: (10, 20),
            got: (5, 5),
        };
        assert_eq!(err.suggested_fix().as_deref(), Some("Allocate the destination as 10x20"));
    }
}
