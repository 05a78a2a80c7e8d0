//! Vector store selection.

use anyhow::Result;
use std::sync::Arc;

use noterag_core::store::memory::InMemoryStore;
use noterag_core::store::VectorStore;
use noterag_core::RagError;

use crate::chroma_store::ChromaStore;
use crate::config::Config;
use crate::postgres_store::PostgresStore;
use crate::sqlite_store::SqliteStore;

/// Build the backend named by `store.backend`.
///
/// Nothing is created or migrated here; that happens in
/// [`VectorStore::initialize`]. Only the SQLite backend touches disk, to
/// open its database file.
pub async fn create_store(config: &Config, model_name: &str) -> Result<Arc<dyn VectorStore>> {
    let store = &config.store;
    let dims = config.embedding.dims;
    match store.backend.as_str() {
        "sqlite" => Ok(Arc::new(
            SqliteStore::open(&store.sqlite.path, store.batch_size).await?,
        )),
        "postgres" => Ok(Arc::new(PostgresStore::new(
            &store.postgres,
            dims,
            store.batch_size,
        )?)),
        "chroma" => Ok(Arc::new(ChromaStore::new(
            &store.chroma,
            model_name,
            dims,
            store.batch_size,
            store.timeout_secs,
        )?)),
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        other => Err(RagError::Configuration(format!("unknown store backend: {}", other)).into()),
    }
}
