//! Error types for asset handlers.

use thiserror::Error;

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors that can occur while loading or saving assets.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Invalid {resource_type} asset: {message}")]
    InvalidShape {
        resource_type: String,
        message: String,
    },

    #[error("Handler not found: {0}")]
    HandlerNotFound(String),

    #[error("Document error: {0}")]
    Document(#[from] tenant_document::DocumentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AssetError {
    pub fn invalid(resource_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidShape {
            resource_type: resource_type.into(),
            message: message.into(),
        }
    }
}
