use anyhow::Result;
use sqlx::SqlitePool;

/// Create the batch tables. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            id TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL,
            document_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batch_documents (
            batch_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            document_id TEXT NOT NULL,
            title TEXT NOT NULL,
            source TEXT NOT NULL,
            url TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            PRIMARY KEY (batch_id, position),
            FOREIGN KEY (batch_id) REFERENCES batches(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_batch_documents_document_id ON batch_documents(document_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
