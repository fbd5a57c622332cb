use anyhow::Result;
use sqlx::PgPool;

/// Create the schema if it does not exist yet.
///
/// `dims` fixes the width of the `vector` columns; it must match the
/// embedding model in use.
pub async fn run_migrations(pool: &PgPool, dims: usize) -> Result<()> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stores (
            id BIGSERIAL PRIMARY KEY,
            type TEXT NOT NULL,
            repo TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id BIGSERIAL PRIMARY KEY,
            store_id BIGINT NOT NULL REFERENCES stores(id),
            path TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding vector({dims}),
            tags JSONB NOT NULL DEFAULT '[]',
            fingerprint TEXT NOT NULL,
            modified_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE(store_id, path)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id BIGSERIAL PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL,
            embedding vector({dims}),
            tags JSONB NOT NULL DEFAULT '[]',
            fingerprint TEXT NOT NULL,
            modified_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_fingerprint ON documents(fingerprint)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_memories_fingerprint ON memories(fingerprint)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
