//! Embedding provider implementations and selection.
//!
//! - **`local`**: [`HashEmbedder`] from `noterag-core`; deterministic, offline.
//! - **`openai`**: [`OpenAiEmbedder`], `POST {url}/embeddings`.
//! - **`ollama`**: [`OllamaEmbedder`], `POST {url}/api/embed`.
//!
//! Remote providers send texts in batches of `embedding.batch_size`, retry
//! transient failures (see [`crate::http`]), re-normalize every returned
//! vector, and reject vectors whose length is not `embedding.dims`.
//!
//! ```rust
//! # use noterag::config::EmbeddingConfig;
//! # use noterag::embedding::create_embedder;
//! # use noterag_core::embedding::Embedder;
//! let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
//! assert_eq!(embedder.model_name(), "local-hash");
//! assert_eq!(embedder.dims(), 1536);
//! ```

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

use noterag_core::embedding::{normalize, Embedder, HashEmbedder};
use noterag_core::RagError;

use crate::config::{EmbeddingConfig, OPENAI_API_KEY_ENV};
use crate::http::{client_with_timeout, send_json, JsonRequest};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Instantiate the embedder named by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "local" => Ok(Arc::new(HashEmbedder::new(config.dims))),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => Err(RagError::Configuration(format!("unknown embedding provider: {}", other)).into()),
    }
}

/// Normalize each vector and check it has `expected` dimensions.
fn finish_vectors(mut vectors: Vec<Vec<f32>>, expected: usize, inputs: usize) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != inputs {
        return Err(anyhow!(
            "embedding response has {} vectors for {} inputs",
            vectors.len(),
            inputs
        ));
    }
    for v in vectors.iter_mut() {
        if v.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: v.len(),
            }
            .into());
        }
        normalize(v);
    }
    Ok(vectors)
}

fn json_floats(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

// ============ OpenAI ============

/// Embeddings from the OpenAI API (or any compatible endpoint).
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            RagError::Configuration("embedding.model required for OpenAI provider".to_string())
        })?;
        let api_key = std::env::var(OPENAI_API_KEY_ENV).map_err(|_| {
            RagError::Configuration(format!("{} environment variable not set", OPENAI_API_KEY_ENV))
        })?;

        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            model,
            dims: config.dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, texts: &[String]) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        // Only the v3 models accept a target dimension.
        if self.model.starts_with("text-embedding-3") {
            body["dimensions"] = serde_json::json!(self.dims);
        }
        body
    }
}

/// Extract `data[].embedding` in input order.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let vec = item
            .get("embedding")
            .and_then(json_floats)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = self.request_body(batch);
            let request = JsonRequest::post("OpenAI", format!("{}/embeddings", self.url), &body)
                .bearer(&self.api_key);
            let json = send_json(&self.client, &request, self.max_retries).await?;
            let vectors = parse_openai_response(&json)?;
            out.extend(finish_vectors(vectors, self.dims, batch.len())?);
        }
        Ok(out)
    }
}

// ============ Ollama ============

/// Embeddings from a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            RagError::Configuration("embedding.model required for Ollama provider".to_string())
        })?;

        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()),
            model,
            dims: config.dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| json_floats(e).ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array")))
        .collect()
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let request = JsonRequest::post("Ollama", format!("{}/api/embed", self.url), &body);
            let json = send_json(&self.client, &request, self.max_retries).await?;
            out.extend(finish_vectors(parse_ollama_response(&json)?, self.dims, batch.len())?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 2.0] },
                { "index": 0, "embedding": [3.0, 0.0] }
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![3.0, 0.0], vec![0.0, 2.0]]);
    }

    #[test]
    fn test_parse_openai_response_missing_data() {
        assert!(parse_openai_response(&serde_json::json!({"error": "x"})).is_err());
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] });
        assert_eq!(parse_ollama_response(&json).unwrap().len(), 2);
        assert!(parse_ollama_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_finish_vectors_normalizes() {
        let out = finish_vectors(vec![vec![3.0, 4.0]], 2, 1).unwrap();
        assert!((out[0][0] - 0.6).abs() < 1e-6);
        assert!((out[0][1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_finish_vectors_rejects_wrong_dims() {
        let err = finish_vectors(vec![vec![1.0, 0.0, 0.0]], 2, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_finish_vectors_rejects_wrong_count() {
        assert!(finish_vectors(vec![vec![1.0]], 1, 2).is_err());
    }

    #[tokio::test]
    async fn test_local_provider_is_deterministic() {
        let config = EmbeddingConfig {
            dims: 64,
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        let a = embedder.embed_one("weekly review").await.unwrap();
        let b = embedder.embed_one("weekly review").await.unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[test]
    fn test_ollama_requires_model() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(OllamaEmbedder::new(&config).is_err());
    }
}
