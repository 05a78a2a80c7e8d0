//! Embedded SQLite [`VectorStore`] implementation.
//!
//! One table keyed by chunk id holds the text, the embedding as a
//! little-endian f32 BLOB, and the chunk metadata as JSON. SQLite has no
//! vector index, so search scores every row in Rust; that is fine for a
//! personal notebook but not for millions of chunks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use noterag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use noterag_core::models::{ChunkMetadata, ChunkRecord, RankedResult};
use noterag_core::store::VectorStore;
use noterag_core::RagError;

use crate::db;

pub struct SqliteStore {
    pool: SqlitePool,
    batch_size: usize,
}

impl SqliteStore {
    /// Open the database file, creating it and its directory if needed.
    pub async fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let pool = db::connect_sqlite(path).await.map_err(|e| {
            RagError::unavailable(format!("cannot open SQLite database {}: {}", path.display(), e))
        })?;
        Ok(Self::new(pool, batch_size))
    }

    pub fn new(pool: SqlitePool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_result(row: &sqlx::sqlite::SqliteRow, query: &[f32]) -> Result<RankedResult> {
    let blob: Vec<u8> = row.get("embedding");
    let metadata_json: String = row.get("metadata");
    let metadata: ChunkMetadata =
        serde_json::from_str(&metadata_json).context("invalid chunk metadata in store")?;
    Ok(RankedResult {
        id: row.get("id"),
        content: row.get("content"),
        metadata,
        distance: cosine_distance(query, &blob_to_vec(&blob)),
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS note_chunks (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_note_chunks_document_id ON note_chunks(json_extract(metadata, '$.document_id'))",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert(&self, chunks: &[ChunkRecord]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut written = 0;

        for batch in chunks.chunks(self.batch_size) {
            let mut tx = self.pool.begin().await?;
            for chunk in batch {
                let metadata = serde_json::to_string(&chunk.metadata)?;
                sqlx::query(
                    r#"
                    INSERT INTO note_chunks (id, content, embedding, metadata, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO UPDATE SET
                        content = excluded.content,
                        embedding = excluded.embedding,
                        metadata = excluded.metadata,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(&chunk.id)
                .bind(&chunk.content)
                .bind(vec_to_blob(&chunk.embedding))
                .bind(metadata)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            written += batch.len();
        }

        Ok(written)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RankedResult>> {
        let rows = sqlx::query("SELECT id, content, embedding, metadata FROM note_chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut results = rows
            .iter()
            .map(|row| row_to_result(row, query))
            .collect::<Result<Vec<_>>>()?;

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM note_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM note_chunks")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        let result =
            sqlx::query("DELETE FROM note_chunks WHERE json_extract(metadata, '$.document_id') = ?")
                .bind(document_id)
                .execute(&self.pool)
                .await?;
        Ok(Some(result.rows_affected() as usize))
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
