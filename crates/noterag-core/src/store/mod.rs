//! Vector store abstraction for noterag.
//!
//! The [`VectorStore`] trait defines every storage operation the indexing
//! and query pipeline needs, enabling pluggable backends (Chroma,
//! PostgreSQL + pgvector, SQLite, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must translate backend-native responses into [`RankedResult`]s ordered
//! by ascending cosine distance.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkRecord, RankedResult};

/// Default number of records written per backend round-trip.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Abstract vector storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`initialize`](VectorStore::initialize) | Connect and create schema/collection (idempotent) |
/// | [`upsert`](VectorStore::upsert) | Insert-or-replace chunks by id, in batches |
/// | [`search`](VectorStore::search) | Nearest chunks to a query vector |
/// | [`count`](VectorStore::count) | Number of stored chunks |
/// | [`clear`](VectorStore::clear) | Remove every chunk |
/// | [`delete_document`](VectorStore::delete_document) | Remove one document's chunks |
/// | [`health_check`](VectorStore::health_check) | Cheap reachability probe |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend label for logs and stats (e.g. `"sqlite"`).
    fn backend_name(&self) -> &str;

    /// Establish the connection and create schema, indexes, or collection
    /// if absent. Calling it again is a no-op. An unreachable backend
    /// yields [`RagError::BackendUnavailable`](crate::RagError::BackendUnavailable).
    async fn initialize(&self) -> Result<()>;

    /// Insert or replace `chunks` keyed by id. Returns the number written.
    async fn upsert(&self, chunks: &[ChunkRecord]) -> Result<usize>;

    /// At most `k` results, nearest first. An empty store yields an empty
    /// vector, not an error.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedResult>>;

    async fn count(&self) -> Result<usize>;

    /// Destructively remove every chunk.
    async fn clear(&self) -> Result<()>;

    /// Remove all chunks whose metadata names `document_id`.
    ///
    /// Returns `Ok(None)` when the backend cannot delete by metadata
    /// filter; callers then fall back to a full reindex.
    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        let _ = document_id;
        Ok(None)
    }

    /// Never errors: any failure is reported as `false`.
    async fn health_check(&self) -> bool;
}
