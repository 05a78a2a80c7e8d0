//! The RAG orchestrator.
//!
//! [`RagEngine`] wires a document source, an embedder, a vector store, and
//! a completion provider together and runs the two workflows:
//!
//! ```text
//! index:  source.list_all ─▶ build_chunks ─▶ embed (per batch) ─▶ store.upsert
//! ask:    embed(question) ─▶ store.search(k) ─▶ prompt ─▶ llm.complete ─▶ confidence
//! ```
//!
//! # Lifecycle
//!
//! The engine starts [`EngineState::Uninitialized`]. The first operation
//! that needs the store moves it to `Initializing`, checks store health,
//! creates the schema or collection, and makes sure the document root
//! exists. Success leaves it `Ready` for the life of the process; any
//! failure puts it back to `Uninitialized` so the next call retries.
//!
//! Concurrent `ask` calls are safe. Concurrent `index_all` calls are not
//! coordinated; they upsert the same ids and the last writer wins.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use noterag_core::chunk::build_chunks;
use noterag_core::embedding::Embedder;
use noterag_core::llm::CompletionProvider;
use noterag_core::models::{PendingChunk, RankedResult};
use noterag_core::scoring::{confidence_from_distance, overall_confidence, preview};
use noterag_core::source::DocumentSource;
use noterag_core::store::VectorStore;
use noterag_core::RagError;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::llm::create_completion;
use crate::source::FsDocumentSource;
use crate::store::create_store;

/// Separator placed between retrieved chunks in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Answer returned when retrieval finds nothing; the LLM is not called.
pub const NO_RESULTS_ANSWER: &str = "Sorry, I could not find anything relevant in your notes. \
Make sure your note files have been added to the notes folder and indexed.";

/// Answer returned when the LLM produced no text.
pub const EMPTY_COMPLETION_ANSWER: &str = "Sorry, I was unable to generate an answer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Tunables the engine needs, separated from [`Config`] so tests can build
/// an engine without a configuration file.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub max_chars: usize,
    pub notebook_name: String,
    /// Pending chunks embedded and upserted together.
    pub batch_size: usize,
    pub top_k: usize,
    pub preview_chars: usize,
    pub health_timeout: Duration,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_chars: config.chunking.max_chars,
            notebook_name: config.source.notebook_name.clone(),
            batch_size: config.store.batch_size.max(1),
            top_k: config.retrieval.top_k,
            preview_chars: config.retrieval.preview_chars,
            health_timeout: Duration::from_secs(config.retrieval.health_timeout_secs),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::minimal())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
    pub upserted: usize,
    pub failed_batches: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub id: String,
    pub title: String,
    pub notebook_name: String,
    pub section_name: String,
    pub confidence: f32,
    /// Preview of the chunk text.
    pub content: String,
    pub file_path: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    pub total_notes: usize,
    pub total_chunks: usize,
    pub total_bytes: u64,
    pub file_types: BTreeMap<String, usize>,
    /// Most recent file modification, RFC 3339.
    pub last_modified: Option<String>,
    pub store_healthy: bool,
    pub store_backend: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub store: bool,
    pub llm: bool,
    pub files: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The store removed the document's chunks directly.
    Deleted { chunks: usize },
    /// The store cannot filter-delete, so everything was re-indexed.
    Reindexed(IndexReport),
}

pub struct RagEngine {
    source: Arc<dyn DocumentSource>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn CompletionProvider>,
    options: EngineOptions,
    state: Mutex<EngineState>,
}

impl RagEngine {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn CompletionProvider>,
        options: EngineOptions,
    ) -> Self {
        Self {
            source,
            embedder,
            store,
            llm,
            options,
            state: Mutex::new(EngineState::Uninitialized),
        }
    }

    /// Build every collaborator from configuration. No backend is
    /// contacted until the first operation.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let source = Arc::new(FsDocumentSource::new(&config.source)?);
        let embedder = create_embedder(&config.embedding)?;
        let store = create_store(config, embedder.model_name()).await?;
        let llm = create_completion(&config.llm)?;
        tracing::info!(
            store = store.backend_name(),
            embedder = embedder.model_name(),
            dims = embedder.dims(),
            llm = llm.name(),
            "engine constructed"
        );
        Ok(Self::new(
            source,
            embedder,
            store,
            llm,
            EngineOptions::from_config(config),
        ))
    }

    pub async fn state(&self) -> EngineState {
        *self.state.lock().await
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Bring the engine to `Ready`. A no-op once ready.
    pub async fn initialize(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state == EngineState::Ready {
            return Ok(());
        }

        *state = EngineState::Initializing;
        match self.bring_up().await {
            Ok(()) => {
                *state = EngineState::Ready;
                tracing::info!(store = self.store.backend_name(), "engine ready");
                Ok(())
            }
            Err(e) => {
                *state = EngineState::Uninitialized;
                tracing::error!(error = %e, "engine initialization failed");
                Err(e)
            }
        }
    }

    async fn bring_up(&self) -> Result<()> {
        if !self.store.health_check().await {
            return Err(RagError::unavailable(format!(
                "{} vector store is not reachable",
                self.store.backend_name()
            ))
            .into());
        }
        self.store
            .initialize()
            .await
            .context("vector store initialization failed")?;
        self.source.ensure_root().await?;
        Ok(())
    }

    /// Re-scan every document and upsert all of its chunks.
    ///
    /// Batches fail independently: a failed embed or upsert is logged and
    /// counted in [`IndexReport::failed_batches`] while later batches
    /// continue. Only when every batch fails is the last error returned.
    pub async fn index_all(&self) -> Result<IndexReport> {
        self.initialize().await?;
        let started = Instant::now();

        let documents = self.source.list_all().await?;
        let pending: Vec<PendingChunk> = documents
            .iter()
            .flat_map(|doc| build_chunks(doc, self.options.max_chars, &self.options.notebook_name))
            .collect();

        let mut report = IndexReport {
            documents: documents.len(),
            chunks: pending.len(),
            ..IndexReport::default()
        };

        if pending.is_empty() {
            tracing::warn!("no documents with content found, nothing to index");
            report.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        let total_batches = pending.len().div_ceil(self.options.batch_size);
        let mut last_err = None;

        for (i, batch) in pending.chunks(self.options.batch_size).enumerate() {
            match self.index_batch(batch).await {
                Ok(written) => {
                    report.upserted += written;
                    tracing::info!(batch = i + 1, of = total_batches, written, "indexed batch");
                }
                Err(e) => {
                    report.failed_batches += 1;
                    tracing::warn!(batch = i + 1, of = total_batches, error = %e, "indexing batch failed");
                    last_err = Some(e);
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.failed_batches == total_batches {
            if let Some(e) = last_err {
                return Err(e.context(format!("all {} indexing batches failed", total_batches)));
            }
        }

        tracing::info!(
            documents = report.documents,
            chunks = report.chunks,
            upserted = report.upserted,
            failed_batches = report.failed_batches,
            duration_ms = report.duration_ms,
            "indexing complete"
        );
        Ok(report)
    }

    async fn index_batch(&self, batch: &[PendingChunk]) -> Result<usize> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            bail!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            );
        }
        let records: Vec<_> = batch
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| chunk.with_embedding(vector))
            .collect();
        self.store.upsert(&records).await
    }

    /// Answer `question` from the indexed notes.
    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let question = question.trim();
        if question.is_empty() {
            bail!("question must not be empty");
        }
        self.initialize().await?;

        let query = self.embedder.embed_one(question).await?;
        let hits = self.store.search(&query, self.options.top_k).await?;
        tracing::info!(hits = hits.len(), "retrieved context");

        if hits.is_empty() {
            return Ok(AskResponse {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
            });
        }

        let system_prompt = build_system_prompt(&hits);
        let user_prompt = build_user_prompt(question);
        let completion = self.llm.complete(&system_prompt, &user_prompt).await?;
        let answer = if completion.trim().is_empty() {
            EMPTY_COMPLETION_ANSWER.to_string()
        } else {
            completion
        };

        let sources: Vec<SourceRef> = hits
            .iter()
            .map(|hit| self.source_ref(hit))
            .collect();
        let confidences: Vec<f32> = sources.iter().map(|s| s.confidence).collect();

        Ok(AskResponse {
            answer,
            confidence: overall_confidence(&confidences),
            sources,
        })
    }

    fn source_ref(&self, hit: &RankedResult) -> SourceRef {
        SourceRef {
            id: hit.id.clone(),
            title: hit.metadata.title.clone(),
            notebook_name: hit.metadata.notebook_name.clone(),
            section_name: hit.metadata.section_name.clone(),
            confidence: confidence_from_distance(hit.distance),
            content: preview(&hit.content, self.options.preview_chars),
            file_path: hit.metadata.file_path.clone(),
            file_type: hit.metadata.file_type.clone(),
        }
    }

    /// File and chunk statistics. Never fails: any error yields a zeroed
    /// report with `store_healthy = false`.
    pub async fn stats(&self) -> StatsReport {
        match self.try_stats().await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "failed to gather stats");
                StatsReport {
                    store_backend: self.store.backend_name().to_string(),
                    ..StatsReport::default()
                }
            }
        }
    }

    async fn try_stats(&self) -> Result<StatsReport> {
        self.initialize().await?;
        let total_chunks = self.store.count().await?;
        let files = self.source.stats().await?;
        let store_healthy = self.store.health_check().await;
        Ok(StatsReport {
            total_notes: files.file_count,
            total_chunks,
            total_bytes: files.total_bytes,
            file_types: files.type_counts,
            last_modified: files.most_recent_modification.map(|t| t.to_rfc3339()),
            store_healthy,
            store_backend: self.store.backend_name().to_string(),
        })
    }

    /// Probe store, LLM, and files concurrently, each bounded by the
    /// health timeout. Never fails.
    pub async fn health(&self) -> HealthReport {
        let timeout = self.options.health_timeout;

        let store = self.store.clone();
        let store_probe = tokio::spawn(async move {
            tokio::time::timeout(timeout, store.health_check())
                .await
                .unwrap_or(false)
        });
        let llm = self.llm.clone();
        let llm_probe = tokio::spawn(async move {
            tokio::time::timeout(timeout, llm.check_availability())
                .await
                .unwrap_or(false)
        });
        let source = self.source.clone();
        let files_probe = tokio::spawn(async move {
            matches!(tokio::time::timeout(timeout, source.stats()).await, Ok(Ok(_)))
        });

        let (store, llm, files) = tokio::join!(store_probe, llm_probe, files_probe);
        match (store, llm, files) {
            (Ok(store), Ok(llm), Ok(files)) => {
                let status = if store && llm && files {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                };
                HealthReport {
                    status,
                    store,
                    llm,
                    files,
                }
            }
            (store, llm, files) => {
                tracing::error!("health probe task failed");
                HealthReport {
                    status: HealthStatus::Unhealthy,
                    store: store.unwrap_or(false),
                    llm: llm.unwrap_or(false),
                    files: files.unwrap_or(false),
                }
            }
        }
    }

    /// Remove every chunk from the store.
    pub async fn clear_index(&self) -> Result<()> {
        self.initialize().await?;
        self.store.clear().await?;
        tracing::info!(store = self.store.backend_name(), "index cleared");
        Ok(())
    }

    /// Remove one document's chunks, falling back to a full re-index when
    /// the store cannot delete by document id.
    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteOutcome> {
        self.initialize().await?;
        match self.store.delete_document(document_id).await? {
            Some(chunks) => {
                tracing::info!(document_id, chunks, "deleted document chunks");
                Ok(DeleteOutcome::Deleted { chunks })
            }
            None => {
                tracing::info!(document_id, "store cannot delete by document, re-indexing");
                Ok(DeleteOutcome::Reindexed(self.index_all().await?))
            }
        }
    }
}

pub fn build_system_prompt(hits: &[RankedResult]) -> String {
    let context = hits
        .iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);
    format!(
        "You are a OneNote assistant that helps the user find and analyze information in their own notes.\n\
         \n\
         Follow these rules:\n\
         1. Answer only from the note content provided below.\n\
         2. If the notes do not contain enough information, say so honestly.\n\
         3. Quote or cite the specific notes you rely on where possible.\n\
         4. Keep the answer accurate and relevant to the question.\n\
         5. Reply in the same language as the question.\n\
         \n\
         Note content:\n\
         {}",
        context
    )
}

pub fn build_user_prompt(question: &str) -> String {
    format!(
        "Based on the note content above, answer the following question:\n\
         \n\
         {}\n\
         \n\
         Give a detailed and useful answer, citing specific note content where possible.",
        question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use noterag_core::models::ChunkMetadata;

    fn hit(content: &str) -> RankedResult {
        RankedResult {
            id: "x_chunk_0".to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata {
                document_id: "x".to_string(),
                title: "x".to_string(),
                section_name: ".txt".to_string(),
                notebook_name: "Local Notes".to_string(),
                chunk_index: 0,
                last_modified: String::new(),
                file_path: "x.txt".to_string(),
                file_type: ".txt".to_string(),
            },
            distance: 0.1,
        }
    }

    #[test]
    fn test_system_prompt_joins_context() {
        let prompt = build_system_prompt(&[hit("first chunk"), hit("second chunk")]);
        assert!(prompt.contains("first chunk\n\n---\n\nsecond chunk"));
        assert!(prompt.contains("same language as the question"));
    }

    #[test]
    fn test_user_prompt_contains_question() {
        assert!(build_user_prompt("When is the review?").contains("When is the review?"));
    }

    #[test]
    fn test_health_status_serializes_lowercase() {
        let report = HealthReport {
            status: HealthStatus::Degraded,
            store: true,
            llm: false,
            files: true,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
    }

    #[test]
    fn test_delete_outcome_serialization() {
        let json = serde_json::to_value(DeleteOutcome::Deleted { chunks: 3 }).unwrap();
        assert_eq!(json["mode"], "deleted");
        assert_eq!(json["chunks"], 3);
    }
}
