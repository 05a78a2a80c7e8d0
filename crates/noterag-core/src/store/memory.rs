//! In-memory [`VectorStore`] implementation for tests and throwaway runs.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`. Search is brute-force
//! cosine distance over every stored vector.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{ChunkRecord, RankedResult};

use super::VectorStore;

/// In-memory store keyed by chunk id.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ChunkRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ChunkRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up one stored record by chunk id.
    pub fn get(&self, id: &str) -> Option<ChunkRecord> {
        self.read().get(id).cloned()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, chunks: &[ChunkRecord]) -> Result<usize> {
        let mut records = self.write();
        for chunk in chunks {
            records.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(chunks.len())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedResult>> {
        let records = self.read();
        let mut results: Vec<RankedResult> = records
            .values()
            .map(|r| RankedResult {
                id: r.id.clone(),
                content: r.content.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(query, &r.embedding),
            })
            .collect();
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read().len())
    }

    async fn clear(&self) -> Result<()> {
        self.write().clear();
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        let mut records = self.write();
        let before = records.len();
        records.retain(|_, r| r.metadata.document_id != document_id);
        Ok(Some(before - records.len()))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn record(id: &str, doc: &str, content: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            content: content.to_string(),
            embedding,
            metadata: ChunkMetadata {
                document_id: doc.to_string(),
                title: doc.to_string(),
                section_name: ".md".to_string(),
                notebook_name: "Local Notes".to_string(),
                chunk_index: 0,
                last_modified: "2024-01-01T00:00:00+00:00".to_string(),
                file_path: format!("{}.md", doc),
                file_type: ".md".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_empty_store_search() {
        let store = InMemoryStore::new();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_same_id_overwrites() {
        let store = InMemoryStore::new();
        store
            .upsert(&[record("d_chunk_0", "d", "old", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(&[record("d_chunk_0", "d", "new", vec![0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("d_chunk_0").unwrap().content, "new");
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let store = InMemoryStore::new();
        store
            .upsert(&[
                record("far", "a", "far", vec![-1.0, 0.0]),
                record("near", "a", "near", vec![1.0, 0.1]),
                record("mid", "b", "mid", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "near");
        assert_eq!(results[1].id, "mid");
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_delete_document_and_clear() {
        let store = InMemoryStore::new();
        store
            .upsert(&[
                record("a_chunk_0", "a", "x", vec![1.0]),
                record("a_chunk_1", "a", "y", vec![1.0]),
                record("b_chunk_0", "b", "z", vec![1.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.delete_document("a").await.unwrap(), Some(2));
        assert_eq!(store.count().await.unwrap(), 1);
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
