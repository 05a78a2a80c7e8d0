//! Chroma [`VectorStore`] implementation over the REST API (v1).
//!
//! Embeddings are computed by noterag and sent explicitly with every upsert
//! and query, so the collection never runs its own embedding function. The
//! collection is created with `hnsw:space = cosine`, which makes Chroma's
//! distances the same `1 - cos` every other backend reports.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | health | `GET /api/v1/heartbeat` |
//! | initialize | `POST /api/v1/collections` (`get_or_create`) |
//! | upsert | `POST /api/v1/collections/{id}/upsert` |
//! | search | `POST /api/v1/collections/{id}/query` |
//! | count | `GET /api/v1/collections/{id}/count` |
//! | delete by document | `POST /api/v1/collections/{id}/get`, then `/delete` |
//! | clear | `DELETE /api/v1/collections/{name}`, then re-create |

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use noterag_core::models::{ChunkMetadata, ChunkRecord, RankedResult};
use noterag_core::store::VectorStore;

use crate::config::ChromaStoreConfig;
use crate::http::{client_with_timeout, send_json, JsonRequest};

/// Chroma calls are retried once; anything longer belongs to the caller.
const CHROMA_RETRIES: u32 = 1;

pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    model_name: String,
    dims: usize,
    batch_size: usize,
    collection_id: RwLock<Option<String>>,
}

impl ChromaStore {
    pub fn new(
        config: &ChromaStoreConfig,
        model_name: &str,
        dims: usize,
        batch_size: usize,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            client: client_with_timeout(timeout_secs)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            model_name: model_name.to_string(),
            dims,
            batch_size: batch_size.max(1),
            collection_id: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn call(&self, request: JsonRequest<'_>) -> Result<serde_json::Value> {
        send_json(&self.client, &request, CHROMA_RETRIES).await
    }

    async fn get_or_create_collection(&self) -> Result<String> {
        let body = serde_json::json!({
            "name": self.collection,
            "get_or_create": true,
            "metadata": {
                "hnsw:space": "cosine",
                "description": "OneNote document vector store",
                "embedding_model": self.model_name,
                "embedding_dims": self.dims,
                "created_at": chrono::Utc::now().to_rfc3339(),
            },
        });
        let json = self
            .call(JsonRequest::post("Chroma", self.url("/collections"), &body))
            .await?;
        json.get("id")
            .and_then(|id| id.as_str())
            .map(|id| id.to_string())
            .ok_or_else(|| anyhow!("Invalid Chroma response: collection has no id"))
    }

    async fn collection_id(&self) -> Result<String> {
        if let Some(id) = self.collection_id.read().await.as_ref() {
            return Ok(id.clone());
        }
        let id = self.get_or_create_collection().await?;
        *self.collection_id.write().await = Some(id.clone());
        Ok(id)
    }

    fn collection_url(&self, id: &str, action: &str) -> String {
        self.url(&format!("/collections/{}/{}", id, action))
    }
}

/// Flatten Chroma's per-query nested arrays (`[[...]]`) to the first query.
fn first_row<'a>(json: &'a serde_json::Value, key: &str) -> &'a [serde_json::Value] {
    json.get(key)
        .and_then(|v| v.as_array())
        .and_then(|outer| outer.first())
        .and_then(|inner| inner.as_array())
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

fn parse_query_response(json: &serde_json::Value) -> Result<Vec<RankedResult>> {
    let ids = first_row(json, "ids");
    let documents = first_row(json, "documents");
    let metadatas = first_row(json, "metadatas");
    let distances = first_row(json, "distances");

    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let metadata: ChunkMetadata = serde_json::from_value(
                metadatas.get(i).cloned().unwrap_or(serde_json::Value::Null),
            )
            .context("invalid chunk metadata in Chroma response")?;
            let distance = distances
                .get(i)
                .and_then(|d| d.as_f64())
                .ok_or_else(|| anyhow!("Invalid Chroma response: missing distance for {}", id))?
                as f32;
            Ok(RankedResult {
                id: id.as_str().unwrap_or_default().to_string(),
                content: documents
                    .get(i)
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string(),
                metadata,
                distance: distance.clamp(0.0, 2.0),
            })
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn backend_name(&self) -> &str {
        "chroma"
    }

    async fn initialize(&self) -> Result<()> {
        let id = self
            .get_or_create_collection()
            .await
            .with_context(|| format!("failed to open Chroma collection {}", self.collection))?;
        tracing::info!(collection = %self.collection, id = %id, "Chroma collection ready");
        *self.collection_id.write().await = Some(id);
        Ok(())
    }

    async fn upsert(&self, chunks: &[ChunkRecord]) -> Result<usize> {
        let id = self.collection_id().await?;
        let mut written = 0;
        for batch in chunks.chunks(self.batch_size) {
            let metadatas = batch
                .iter()
                .map(|c| serde_json::to_value(&c.metadata))
                .collect::<Result<Vec<_>, _>>()?;
            let body = serde_json::json!({
                "ids": batch.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
                "embeddings": batch.iter().map(|c| &c.embedding).collect::<Vec<_>>(),
                "documents": batch.iter().map(|c| c.content.as_str()).collect::<Vec<_>>(),
                "metadatas": metadatas,
            });
            self.call(JsonRequest::post(
                "Chroma",
                self.collection_url(&id, "upsert"),
                &body,
            ))
            .await?;
            written += batch.len();
        }
        Ok(written)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedResult>> {
        // Older Chroma versions reject n_results above the collection size.
        let available = self.count().await?;
        if available == 0 || k == 0 {
            return Ok(Vec::new());
        }
        let id = self.collection_id().await?;
        let body = serde_json::json!({
            "query_embeddings": [query],
            "n_results": k.min(available),
            "include": ["documents", "metadatas", "distances"],
        });
        let json = self
            .call(JsonRequest::post("Chroma", self.collection_url(&id, "query"), &body))
            .await?;
        let mut results = parse_query_response(&json)?;
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let id = self.collection_id().await?;
        let json = self
            .call(JsonRequest::get("Chroma", self.collection_url(&id, "count")))
            .await?;
        json.as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| anyhow!("Invalid Chroma response: count is not a number"))
    }

    async fn clear(&self) -> Result<()> {
        self.call(JsonRequest::delete(
            "Chroma",
            self.url(&format!("/collections/{}", self.collection)),
        ))
        .await?;
        let id = self.get_or_create_collection().await?;
        *self.collection_id.write().await = Some(id);
        tracing::info!(collection = %self.collection, "Chroma collection re-created");
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        let id = self.collection_id().await?;
        let filter = serde_json::json!({
            "where": { "document_id": document_id },
            "include": [],
        });
        let found = self
            .call(JsonRequest::post("Chroma", self.collection_url(&id, "get"), &filter))
            .await?;
        let ids: Vec<String> = found
            .get("ids")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        if ids.is_empty() {
            return Ok(Some(0));
        }

        let body = serde_json::json!({ "ids": ids });
        self.call(JsonRequest::post("Chroma", self.collection_url(&id, "delete"), &body))
            .await?;
        Ok(Some(ids.len()))
    }

    async fn health_check(&self) -> bool {
        let request = JsonRequest::get("Chroma", self.url("/heartbeat"));
        match send_json(&self.client, &request, 0).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Chroma health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_response() {
        let json = serde_json::json!({
            "ids": [["doc_chunk_1", "doc_chunk_0"]],
            "documents": [["second", "first"]],
            "metadatas": [[
                {
                    "document_id": "doc", "title": "Plan", "section_name": ".md",
                    "notebook_name": "Local Notes", "chunk_index": 1,
                    "last_modified": "2024-01-01T00:00:00+00:00",
                    "file_path": "/n/Plan.md", "file_type": ".md"
                },
                {
                    "document_id": "doc", "title": "Plan", "section_name": ".md",
                    "notebook_name": "Local Notes", "chunk_index": 0,
                    "last_modified": "2024-01-01T00:00:00+00:00",
                    "file_path": "/n/Plan.md", "file_type": ".md"
                }
            ]],
            "distances": [[0.12, 0.4]]
        });
        let results = parse_query_response(&json).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "doc_chunk_1");
        assert_eq!(results[0].content, "second");
        assert_eq!(results[0].metadata.chunk_index, 1);
        assert!((results[0].distance - 0.12).abs() < 1e-6);
    }

    #[test]
    fn test_parse_empty_query_response() {
        let json = serde_json::json!({ "ids": [[]], "documents": [[]], "metadatas": [[]], "distances": [[]] });
        assert!(parse_query_response(&json).unwrap().is_empty());
        assert!(parse_query_response(&serde_json::json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_missing_distance_is_an_error() {
        let json = serde_json::json!({
            "ids": [["doc_chunk_0"]],
            "documents": [["first"]],
            "metadatas": [[{
                "document_id": "doc", "title": "Plan", "section_name": ".md",
                "notebook_name": "Local Notes", "chunk_index": 0,
                "last_modified": "2024-01-01T00:00:00+00:00",
                "file_path": "/n/Plan.md", "file_type": ".md"
            }]]
        });
        let err = parse_query_response(&json).unwrap_err();
        assert!(err.to_string().contains("missing distance"));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let config = ChromaStoreConfig {
            url: "http://127.0.0.1:1".to_string(),
            ..ChromaStoreConfig::default()
        };
        let store = ChromaStore::new(&config, "local-hash", 8, 50, 2).unwrap();
        assert!(!store.health_check().await);
    }
}
