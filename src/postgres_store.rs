//! PostgreSQL + pgvector [`VectorStore`] implementation.
//!
//! Writes go through one pool and reads through another so a read replica
//! can serve queries. Vectors travel as pgvector text literals
//! (`[0.1,0.2,...]`) cast with `::vector`, so no client-side pgvector type
//! is needed.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE {table} (
//!     id VARCHAR(255) PRIMARY KEY,
//!     content TEXT NOT NULL,
//!     embedding vector(D),
//!     metadata JSONB NOT NULL,
//!     created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
//!     updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
//! );
//! -- hnsw (vector_cosine_ops) on embedding, GIN on metadata
//! ```
//!
//! HNSW needs no training data, so the index stays accurate even though it
//! is created on the empty table at init time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use noterag_core::models::{ChunkMetadata, ChunkRecord, RankedResult};
use noterag_core::store::VectorStore;
use noterag_core::RagError;

use crate::config::PostgresStoreConfig;
use crate::db;

pub struct PostgresStore {
    write_pool: PgPool,
    read_pool: PgPool,
    table: String,
    dims: usize,
    batch_size: usize,
}

impl PostgresStore {
    /// Build the pools. No connection is made until [`VectorStore::initialize`].
    ///
    /// `config.table` must already be validated as a plain identifier since
    /// it is interpolated into SQL.
    pub fn new(config: &PostgresStoreConfig, dims: usize, batch_size: usize) -> Result<Self> {
        let write_pool = db::postgres_pool(config, &config.host)?;
        let read_pool = match &config.read_host {
            Some(host) if host != &config.host => db::postgres_pool(config, host)?,
            _ => write_pool.clone(),
        };
        Ok(Self {
            write_pool,
            read_pool,
            table: config.table.clone(),
            dims,
            batch_size: batch_size.max(1),
        })
    }

    fn check_dims(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: embedding.len(),
            }
            .into());
        }
        Ok(())
    }
}

/// DDL for the cosine nearest-neighbour index on `table`.
fn embedding_index_sql(table: &str) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {table}_embedding_idx ON {table} USING hnsw (embedding vector_cosine_ops)"
    )
}

/// Render a vector as a pgvector text literal.
pub fn vector_literal(v: &[f32]) -> String {
    let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(","))
}

async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[async_trait]
impl VectorStore for PostgresStore {
    fn backend_name(&self) -> &str {
        "postgres"
    }

    async fn initialize(&self) -> Result<()> {
        ping(&self.write_pool)
            .await
            .map_err(|e| RagError::unavailable(format!("PostgreSQL write pool: {}", e)))?;
        ping(&self.read_pool)
            .await
            .map_err(|e| RagError::unavailable(format!("PostgreSQL read pool: {}", e)))?;

        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.write_pool)
            .await
            .context("failed to create pgvector extension")?;

        let table = &self.table;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id VARCHAR(255) PRIMARY KEY,
                content TEXT NOT NULL,
                embedding vector({dims}),
                metadata JSONB NOT NULL,
                created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            dims = self.dims
        ))
        .execute(&self.write_pool)
        .await?;

        sqlx::query(&embedding_index_sql(table))
            .execute(&self.write_pool)
            .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_metadata_idx ON {table} USING gin (metadata)"
        ))
        .execute(&self.write_pool)
        .await?;

        tracing::info!(table = %self.table, dims = self.dims, "PostgreSQL vector table ready");
        Ok(())
    }

    async fn upsert(&self, chunks: &[ChunkRecord]) -> Result<usize> {
        let sql = format!(
            r#"
            INSERT INTO {} (id, content, embedding, metadata)
            VALUES ($1, $2, $3::vector, $4::jsonb)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                embedding = EXCLUDED.embedding,
                metadata = EXCLUDED.metadata,
                updated_at = CURRENT_TIMESTAMP
            "#,
            self.table
        );

        let mut written = 0;
        for batch in chunks.chunks(self.batch_size) {
            let mut tx = self.write_pool.begin().await?;
            for chunk in batch {
                self.check_dims(&chunk.embedding)?;
                sqlx::query(&sql)
                    .bind(&chunk.id)
                    .bind(&chunk.content)
                    .bind(vector_literal(&chunk.embedding))
                    .bind(serde_json::to_string(&chunk.metadata)?)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            written += batch.len();
        }
        Ok(written)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedResult>> {
        self.check_dims(query)?;
        let rows = sqlx::query(&format!(
            r#"
            SELECT id, content, metadata::text AS metadata,
                   (embedding <=> $1::vector)::float8 AS distance
            FROM {}
            WHERE embedding IS NOT NULL
            ORDER BY embedding <=> $1::vector
            LIMIT $2
            "#,
            self.table
        ))
        .bind(vector_literal(query))
        .bind(k as i64)
        .fetch_all(&self.read_pool)
        .await?;

        rows.iter()
            .map(|row| {
                let metadata_json: String = row.get("metadata");
                let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                    .context("invalid chunk metadata in store")?;
                let distance: f64 = row.get("distance");
                Ok(RankedResult {
                    id: row.get("id"),
                    content: row.get("content"),
                    metadata,
                    distance: (distance as f32).clamp(0.0, 2.0),
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.read_pool)
            .await?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {}", self.table))
            .execute(&self.write_pool)
            .await?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE metadata->>'document_id' = $1",
            self.table
        ))
        .bind(document_id)
        .execute(&self.write_pool)
        .await?;
        Ok(Some(result.rows_affected() as usize))
    }

    async fn health_check(&self) -> bool {
        match ping(&self.read_pool).await {
            Ok(()) => ping(&self.write_pool).await.is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "PostgreSQL health check failed");
                false
            }
        }
    }
}
