//! Document source capability.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentRecord, FileStats};

/// Produces normalized documents from some collection of files.
///
/// Nothing is persisted by a source: every call re-derives its output from
/// the underlying storage.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Every readable, non-empty document. Files that fail to extract are
    /// logged and skipped rather than failing the whole listing.
    async fn list_all(&self) -> Result<Vec<DocumentRecord>>;

    /// File counts and sizes, without extracting any content.
    async fn stats(&self) -> Result<FileStats>;

    /// Make sure the source location exists. Defaults to a no-op.
    async fn ensure_root(&self) -> Result<()> {
        Ok(())
    }
}
