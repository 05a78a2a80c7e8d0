//! # noterag core
//!
//! Runtime-agnostic logic shared by the noterag service: data models,
//! the paragraph/sentence chunker, path-derived document ids, the
//! deterministic local embedder, confidence scoring, and the capability
//! traits (document source, embedder, vector store, completion provider)
//! the orchestrator is wired from.
//!
//! This crate has no tokio, sqlx, HTTP, or filesystem dependencies.
//! Concrete backends live in the `noterag` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod ids;
pub mod llm;
pub mod models;
pub mod scoring;
pub mod source;
pub mod store;

pub use error::{is_backend_unavailable, RagError};
