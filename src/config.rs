//! TOML configuration for noterag.
//!
//! Every section has defaults, so an empty file is a valid configuration
//! that indexes `./data/notes` into an embedded SQLite store with the local
//! hash embedder. Secrets never live in the file: the OpenAI key is read
//! from `OPENAI_API_KEY` and the Postgres password from
//! `NOTERAG_POSTGRES_PASSWORD`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use noterag_core::chunk::DEFAULT_MAX_CHARS;
use noterag_core::embedding::DEFAULT_DIMS;
use noterag_core::scoring::DEFAULT_PREVIEW_CHARS;
use noterag_core::store::DEFAULT_BATCH_SIZE;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const POSTGRES_PASSWORD_ENV: &str = "NOTERAG_POSTGRES_PASSWORD";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

// ============ [source] ============

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_root")]
    pub root: PathBuf,
    /// Lower-case extensions including the dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
    /// Label copied into every chunk's metadata.
    #[serde(default = "default_notebook_name")]
    pub notebook_name: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: default_source_root(),
            extensions: default_extensions(),
            exclude_globs: default_exclude_globs(),
            notebook_name: default_notebook_name(),
        }
    }
}

fn default_source_root() -> PathBuf {
    PathBuf::from("./data/notes")
}
fn default_extensions() -> Vec<String> {
    [".docx", ".pdf", ".txt", ".html", ".md"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_exclude_globs() -> Vec<String> {
    vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()]
}
fn default_notebook_name() -> String {
    "Local Notes".to_string()
}

// ============ [chunking] ============

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

// ============ [embedding] ============

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local`, `openai`, or `ollama`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Texts per provider request.
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (Ollama host, or an OpenAI-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            batch_size: default_embed_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_dims() -> usize {
    DEFAULT_DIMS
}
fn default_embed_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

// ============ [store] ============

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `sqlite`, `postgres`, `chroma`, or `memory`.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Records per upsert round-trip, and pending chunks per index batch.
    #[serde(default = "default_store_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub sqlite: SqliteStoreConfig,
    #[serde(default)]
    pub postgres: PostgresStoreConfig,
    #[serde(default)]
    pub chroma: ChromaStoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            batch_size: default_store_batch_size(),
            timeout_secs: default_timeout_secs(),
            sqlite: SqliteStoreConfig::default(),
            postgres: PostgresStoreConfig::default(),
            chroma: ChromaStoreConfig::default(),
        }
    }
}

fn default_store_backend() -> String {
    "sqlite".to_string()
}
fn default_store_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqliteStoreConfig {
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./data/noterag.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostgresStoreConfig {
    /// Write (primary) host.
    #[serde(default = "default_pg_host")]
    pub host: String,
    /// Read replica host; the write host is used when unset.
    #[serde(default)]
    pub read_host: Option<String>,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default = "default_pg_database")]
    pub database: String,
    #[serde(default = "default_pg_user")]
    pub user: String,
    #[serde(default = "default_pg_table")]
    pub table: String,
    #[serde(default = "default_pg_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_pg_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_pg_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresStoreConfig {
    fn default() -> Self {
        Self {
            host: default_pg_host(),
            read_host: None,
            port: default_pg_port(),
            database: default_pg_database(),
            user: default_pg_user(),
            table: default_pg_table(),
            max_connections: default_pg_max_connections(),
            min_connections: default_pg_min_connections(),
            acquire_timeout_secs: default_pg_acquire_timeout(),
        }
    }
}

fn default_pg_host() -> String {
    "localhost".to_string()
}
fn default_pg_port() -> u16 {
    5432
}
fn default_pg_database() -> String {
    "noterag".to_string()
}
fn default_pg_user() -> String {
    "postgres".to_string()
}
fn default_pg_table() -> String {
    "onenote_documents".to_string()
}
fn default_pg_max_connections() -> u32 {
    20
}
fn default_pg_min_connections() -> u32 {
    2
}
fn default_pg_acquire_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChromaStoreConfig {
    #[serde(default = "default_chroma_url")]
    pub url: String,
    #[serde(default = "default_chroma_collection")]
    pub collection: String,
}

impl Default for ChromaStoreConfig {
    fn default() -> Self {
        Self {
            url: default_chroma_url(),
            collection: default_chroma_collection(),
        }
    }
}

fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_chroma_collection() -> String {
    "onenote_documents".to_string()
}

// ============ [llm] ============

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `openai` or `disabled`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_max_tokens() -> u32 {
    1000
}
fn default_llm_temperature() -> f32 {
    0.7
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_llm_retries() -> u32 {
    2
}

// ============ [retrieval] ============

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Upper bound on each health probe.
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            preview_chars: default_preview_chars(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_preview_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}
fn default_health_timeout() -> u64 {
    5
}

// ============ [server] ============

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}

impl Config {
    /// All-defaults configuration, used by tests and when no file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Reject configurations that cannot work, before any backend is touched.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.store.batch_size == 0 {
        anyhow::bail!("store.batch_size must be > 0");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }

    match config.store.backend.as_str() {
        "sqlite" | "postgres" | "chroma" | "memory" => {}
        other => anyhow::bail!(
            "Unknown store backend: '{}'. Must be sqlite, postgres, chroma, or memory.",
            other
        ),
    }

    if !is_sql_identifier(&config.store.postgres.table) {
        anyhow::bail!(
            "store.postgres.table must be a plain SQL identifier, got '{}'",
            config.store.postgres.table
        );
    }

    match config.llm.provider.as_str() {
        "openai" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai or disabled.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    for ext in &config.source.extensions {
        if !ext.starts_with('.') {
            anyhow::bail!("source.extensions entries must start with '.', got '{}'", ext);
        }
    }

    Ok(())
}

fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
