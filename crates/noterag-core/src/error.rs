//! Error taxonomy.
//!
//! Fallible functions across the workspace return `anyhow::Result`. The
//! variants here are attached to those errors when a caller needs to tell
//! them apart (the HTTP layer maps [`RagError::BackendUnavailable`] to 503,
//! for example) and are recovered with [`anyhow::Error::downcast_ref`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Vector store, embedding provider, or LLM provider cannot be reached,
    /// timed out, or reported itself unhealthy.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Required configuration or credential is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single file could not be turned into text.
    #[error("failed to extract {path}: {reason}")]
    Extraction { path: String, reason: String },

    /// An embedding does not have the process-wide dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl RagError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        RagError::BackendUnavailable(message.into())
    }
}

/// True when `err` (or anything in its context chain) is a
/// [`RagError::BackendUnavailable`].
pub fn is_backend_unavailable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<RagError>(),
            Some(RagError::BackendUnavailable(_))
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn detects_unavailable_through_context() {
        let err: anyhow::Result<()> = Err(RagError::unavailable("chroma down").into());
        let err = err.context("indexing failed").unwrap_err();
        assert!(is_backend_unavailable(&err));
    }

    #[test]
    fn other_errors_are_not_unavailable() {
        let err = anyhow::Error::from(RagError::Configuration("missing key".into()));
        assert!(!is_backend_unavailable(&err));
        assert!(!is_backend_unavailable(&anyhow::anyhow!("boom")));
    }
}
