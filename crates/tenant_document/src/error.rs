//! Error types for document loading.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur while resolving and templating a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Include file not found: {path} (included from {included_from})")]
    IncludeNotFound { path: PathBuf, included_from: PathBuf },

    #[error("Circular include detected: {}", format_chain(.chain))]
    CircularInclude { chain: Vec<PathBuf> },

    #[error("Unresolved keyword: {name} in {file}")]
    UnresolvedKeyword { name: String, file: PathBuf },

    #[error("Invalid document {path}: {message}")]
    InvalidDocument { path: PathBuf, message: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_include_message() {
        let err = DocumentError::CircularInclude {
            chain: vec![
                PathBuf::from("/cfg/a.yaml"),
                PathBuf::from("/cfg/b.yaml"),
                PathBuf::from("/cfg/a.yaml"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Circular include detected: /cfg/a.yaml -> /cfg/b.yaml -> /cfg/a.yaml"
        );
    }
}
