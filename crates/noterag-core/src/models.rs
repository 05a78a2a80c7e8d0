//! Core data models used throughout noterag.
//!
//! These types represent the documents, chunks, and search hits that flow
//! through the indexing and query pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ingested file, re-derived from the filesystem on every scan.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Path-derived id, see [`crate::ids::document_id`].
    pub id: String,
    /// File stem (base name without extension).
    pub title: String,
    /// Extracted text, trimmed and never empty.
    pub content: String,
    pub last_modified: DateTime<Utc>,
    pub source_path: String,
    /// Lower-cased extension including the leading dot, e.g. `".md"`.
    pub file_type: String,
    pub size_bytes: u64,
}

/// Metadata denormalized onto every chunk so retrieval needs no join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub title: String,
    pub section_name: String,
    pub notebook_name: String,
    pub chunk_index: usize,
    /// RFC 3339 timestamp of the parent file's modification time.
    pub last_modified: String,
    pub file_path: String,
    pub file_type: String,
}

/// A chunk that has been split and labelled but not embedded yet.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl PendingChunk {
    pub fn with_embedding(self, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: self.id,
            content: self.content,
            embedding,
            metadata: self.metadata,
        }
    }
}

/// One retrievable unit as persisted by a vector store.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// `{document_id}_chunk_{index}`.
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A normalized search hit. Every backend translates its native response
/// into this shape.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance (`1 - cos`), in `[0, 2]`; smaller is closer.
    pub distance: f32,
}

/// Aggregate statistics over the files a document source can see.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileStats {
    pub file_count: usize,
    pub total_bytes: u64,
    /// Count per lower-cased extension.
    pub type_counts: BTreeMap<String, usize>,
    pub most_recent_modification: Option<DateTime<Utc>>,
}
