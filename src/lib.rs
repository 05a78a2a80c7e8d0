//! # noterag
//!
//! Question answering over a folder of exported OneNote notes.
//!
//! Files (`.docx`, `.html`, `.md`, `.txt`, `.pdf`) are extracted to text,
//! split into paragraph-aligned chunks, embedded, and stored in a vector
//! store. A question is embedded the same way, the closest chunks are
//! handed to an LLM as context, and the answer comes back with its sources
//! and a confidence score.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ Notes folder│──▶│ Chunk + Embed│──▶│ Vector store         │
//! │ docx/html/… │   │              │   │ SQLite/Postgres/Chroma│
//! └─────────────┘   └──────────────┘   └──────────┬───────────┘
//!                                                 │
//!                        ┌────────────────────────┤
//!                        ▼                        ▼
//!                   ┌──────────┐            ┌──────────┐
//!                   │   CLI    │            │   HTTP   │
//!                   │(noterag) │            │  (axum)  │
//!                   └──────────┘            └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`extract`] | Text extraction per file type |
//! | [`source`] | Filesystem document source |
//! | [`embedding`] | Embedding providers (local, OpenAI, Ollama) |
//! | [`llm`] | Completion providers |
//! | [`http`] | Shared HTTP client and retry policy |
//! | [`db`] | SQLite and PostgreSQL connection pools |
//! | [`sqlite_store`], [`postgres_store`], [`chroma_store`] | Vector store backends |
//! | [`store`] | Backend selection |
//! | [`rag`] | The orchestrator |
//! | [`server`] | HTTP API |
//!
//! Runtime-agnostic models, the chunker, and the capability traits live in
//! the `noterag-core` crate.

pub mod chroma_store;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod llm;
pub mod postgres_store;
pub mod rag;
pub mod server;
pub mod source;
pub mod sqlite_store;
pub mod store;
