//! SQLite-backed [`DocumentStore`].
//!
//! Every batch is written in one transaction: a row in `batches` plus one
//! row per document in `batch_documents`, keyed by position so the batch
//! loads back in its original order. A failed or dropped write rolls back
//! and leaves nothing behind. Each row carries the SHA-256 of its content,
//! checked again when the batch is loaded.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use confluence_harness_core::models::Document;
use confluence_harness_core::store::{DataRef, DocumentStore};

use crate::db;
use crate::migrate;

const BACKEND: &str = "sqlite";

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `path`, creating it and its schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn store_documents(&self, docs: &[Document]) -> Result<DataRef> {
        let batch_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO batches (id, created_at, document_count) VALUES (?, ?, ?)")
            .bind(&batch_id)
            .bind(Utc::now().timestamp())
            .bind(docs.len() as i64)
            .execute(&mut *tx)
            .await?;

        for (position, doc) in docs.iter().enumerate() {
            let metadata_json = serde_json::to_string(&doc.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO batch_documents (batch_id, position, document_id, title, source,
                                             url, content, metadata_json, updated_at, content_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&batch_id)
            .bind(position as i64)
            .bind(&doc.id)
            .bind(&doc.title)
            .bind(&doc.source)
            .bind(&doc.url)
            .bind(&doc.content)
            .bind(&metadata_json)
            .bind(doc.updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .bind(content_hash(&doc.content))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(DataRef::new(BACKEND, batch_id, docs.len()))
    }

    async fn load_documents(&self, data_ref: &DataRef) -> Result<Option<Vec<Document>>> {
        if data_ref.backend != BACKEND {
            return Ok(None);
        }

        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM batches WHERE id = ?")
            .bind(&data_ref.key)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Ok(None);
        }

        let rows = sqlx::query(
            r#"
            SELECT document_id, title, source, url, content, metadata_json, updated_at,
                   content_hash
            FROM batch_documents
            WHERE batch_id = ?
            ORDER BY position
            "#,
        )
        .bind(&data_ref.key)
        .fetch_all(&self.pool)
        .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("document_id");
            let metadata_json: String = row.get("metadata_json");
            let updated_at: String = row.get("updated_at");
            let content: String = row.get("content");
            let stored_hash: String = row.get("content_hash");
            if content_hash(&content) != stored_hash {
                bail!(
                    "Content hash mismatch for document {} in batch {}",
                    id,
                    data_ref.key
                );
            }
            let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
                .with_context(|| format!("Corrupt metadata for document {}", id))?;
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .with_context(|| format!("Corrupt timestamp for document {}", id))?
                .with_timezone(&Utc);

            docs.push(Document {
                id,
                content,
                title: row.get("title"),
                source: row.get("source"),
                url: row.get("url"),
                metadata,
                updated_at,
            });
        }

        Ok(Some(docs))
    }
}
