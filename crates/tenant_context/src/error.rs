//! Error types for the orchestrator.

use std::path::PathBuf;
use thiserror::Error;

use tenant_assets::AssetError;
use tenant_document::DocumentError;

/// Result type alias for context operations.
pub type ContextResult<T> = Result<T, ContextError>;

/// A handler that failed during dump.
#[derive(Error, Debug)]
#[error("{resource_type}: {source}")]
pub struct HandlerFailure {
    pub resource_type: String,
    #[source]
    pub source: AssetError,
}

/// Errors that can occur while loading or dumping a configuration.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("{0}")]
    Document(#[from] DocumentError),

    #[error("Failed to load {resource_type}: {source}")]
    Load {
        resource_type: String,
        #[source]
        source: AssetError,
    },

    #[error("Dump failed for {}", format_failures(.failures))]
    DumpFailed {
        succeeded: Vec<String>,
        failures: Vec<HandlerFailure>,
    },

    #[error("Name lookup failed: {0}")]
    Lookup(String),

    #[error("Invalid configuration {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ContextError {
    /// Wrap a handler load error, keeping structural document errors as such.
    pub fn load(resource_type: impl Into<String>, source: AssetError) -> Self {
        match source {
            AssetError::Document(err) => Self::Document(err),
            source => Self::Load {
                resource_type: resource_type.into(),
                source,
            },
        }
    }

    /// Resource types whose dump failed, if this is a dump failure.
    pub fn failed_resource_types(&self) -> Vec<&str> {
        match self {
            Self::DumpFailed { failures, .. } => {
                failures.iter().map(|f| f.resource_type.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[HandlerFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
