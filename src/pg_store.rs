//! Postgres-backed repositories.
//!
//! Every query is bounded by the configured timeout. Each upsert is one
//! `INSERT ... ON CONFLICT DO UPDATE ... RETURNING` statement inside its
//! own transaction. `created_at` is only ever set by the insert branch, and the
//! storage-assigned timestamps are copied back onto the item.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::time::Duration;

use kbsync_core::embedding::validate_embedding;
use kbsync_core::models::{Document, DocumentStore, Memory, StoreId};
use kbsync_core::store::{DocumentRepository, MemoryRepository, StoreRepository};
use kbsync_core::SyncError;

use crate::config::DbConfig;

async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| anyhow!("{} timed out after {}s", what, limit.as_secs()))?
}

fn store_from_row(row: &PgRow) -> Result<DocumentStore> {
    let id: i64 = row.try_get("id")?;
    let store_type: String = row.try_get("type")?;
    let repo: String = row.try_get("repo")?;
    Ok(DocumentStore::from_parts(StoreId(id), &store_type, &repo)?)
}

pub struct PgStoreRepository {
    pool: PgPool,
    lookup_timeout: Duration,
}

impl PgStoreRepository {
    pub fn new(pool: PgPool, config: &DbConfig) -> Self {
        Self {
            pool,
            lookup_timeout: Duration::from_secs(config.lookup_timeout_secs),
        }
    }
}

#[async_trait]
impl StoreRepository for PgStoreRepository {
    async fn get_store(&self, id: StoreId) -> Result<DocumentStore> {
        let row = bounded(self.lookup_timeout, "store lookup", async {
            let row = sqlx::query("SELECT id, type, repo FROM stores WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, anyhow::Error>(row)
        })
        .await?;

        match row {
            Some(row) => store_from_row(&row),
            None => Err(SyncError::StoreNotFound(id).into()),
        }
    }

    async fn create_store(&self, store: &DocumentStore) -> Result<DocumentStore> {
        let id: i64 = bounded(self.lookup_timeout, "store create", async {
            let id: i64 = sqlx::query_scalar("INSERT INTO stores (type, repo) VALUES ($1, $2) RETURNING id")
                .bind(store.store_type())
                .bind(store.repo())
                .fetch_one(&self.pool)
                .await?;
            Ok::<_, anyhow::Error>(id)
        })
        .await?;
        Ok(store.with_id(StoreId(id)))
    }

    async fn list_stores(&self) -> Result<Vec<DocumentStore>> {
        let rows = bounded(self.lookup_timeout, "store list", async {
            let rows = sqlx::query("SELECT id, type, repo FROM stores ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, anyhow::Error>(rows)
        })
        .await?;
        rows.iter().map(store_from_row).collect()
    }
}

pub struct PgDocumentRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool, config: &DbConfig) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn upsert_document(&self, document: &mut Document) -> Result<()> {
        let doc = &*document;
        let (created_at, updated_at) = bounded(self.timeout, "document upsert", async {
            let mut tx = self.pool.begin().await?;
            let row = sqlx::query(
                r#"
                INSERT INTO documents (store_id, path, content, embedding, tags,
                                       fingerprint, modified_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
                ON CONFLICT (store_id, path) DO UPDATE SET
                    content = EXCLUDED.content,
                    embedding = EXCLUDED.embedding,
                    tags = EXCLUDED.tags,
                    fingerprint = EXCLUDED.fingerprint,
                    modified_at = EXCLUDED.modified_at,
                    updated_at = GREATEST(documents.updated_at, NOW())
                RETURNING created_at, updated_at
                "#,
            )
            .bind(doc.store_id.0)
            .bind(&doc.path)
            .bind(&doc.content)
            .bind(doc.embedding.clone().map(Vector::from))
            .bind(Json(&doc.tags))
            .bind(&doc.fingerprint)
            .bind(doc.modified_at)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, anyhow::Error>((
                row.try_get::<DateTime<Utc>, _>("created_at")?,
                row.try_get::<DateTime<Utc>, _>("updated_at")?,
            ))
        })
        .await?;

        document.created_at = Some(created_at);
        document.updated_at = Some(updated_at);
        Ok(())
    }

    async fn find_existing_fingerprints(&self, fingerprints: &[String]) -> Result<Vec<String>> {
        if fingerprints.is_empty() {
            return Ok(Vec::new());
        }
        bounded(self.timeout, "fingerprint lookup", async {
            let found: Vec<String> = sqlx::query_scalar(
                "SELECT DISTINCT fingerprint FROM documents WHERE fingerprint = ANY($1)",
            )
            .bind(fingerprints)
            .fetch_all(&self.pool)
            .await?;
            Ok::<_, anyhow::Error>(found)
        })
        .await
    }
}

pub struct PgMemoryRepository {
    pool: PgPool,
    timeout: Duration,
    dims: usize,
}

impl PgMemoryRepository {
    /// `dims` is the required embedding width; it must match the
    /// `memories.embedding` column.
    pub fn new(pool: PgPool, config: &DbConfig, dims: usize) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(config.timeout_secs),
            dims,
        }
    }
}

#[async_trait]
impl MemoryRepository for PgMemoryRepository {
    async fn upsert_memory(&self, memory: &mut Memory) -> Result<()> {
        if let Some(embedding) = &memory.embedding {
            validate_embedding(embedding, self.dims)?;
        }

        let mem = &*memory;
        let (created_at, updated_at) = bounded(self.timeout, "memory upsert", async {
            let mut tx = self.pool.begin().await?;
            let row = sqlx::query(
                r#"
                INSERT INTO memories (path, content, embedding, tags,
                                      fingerprint, modified_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
                ON CONFLICT (path) DO UPDATE SET
                    content = EXCLUDED.content,
                    embedding = EXCLUDED.embedding,
                    tags = EXCLUDED.tags,
                    fingerprint = EXCLUDED.fingerprint,
                    modified_at = EXCLUDED.modified_at,
                    updated_at = GREATEST(memories.updated_at, NOW())
                RETURNING created_at, updated_at
                "#,
            )
            .bind(&mem.path)
            .bind(&mem.content)
            .bind(mem.embedding.clone().map(Vector::from))
            .bind(Json(&mem.tags))
            .bind(&mem.fingerprint)
            .bind(mem.modified_at)
            .fetch_one(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok::<_, anyhow::Error>((
                row.try_get::<DateTime<Utc>, _>("created_at")?,
                row.try_get::<DateTime<Utc>, _>("updated_at")?,
            ))
        })
        .await?;

        memory.created_at = Some(created_at);
        memory.updated_at = Some(updated_at);
        Ok(())
    }

    async fn find_existing_fingerprints(&self, fingerprints: &[String]) -> Result<Vec<String>> {
        if fingerprints.is_empty() {
            return Ok(Vec::new());
        }
        bounded(self.timeout, "fingerprint lookup", async {
            let found: Vec<String> = sqlx::query_scalar(
                "SELECT DISTINCT fingerprint FROM memories WHERE fingerprint = ANY($1)",
            )
            .bind(fingerprints)
            .fetch_all(&self.pool)
            .await?;
            Ok::<_, anyhow::Error>(found)
        })
        .await
    }

    async fn list_memories(&self) -> Result<Vec<Memory>> {
        let rows = bounded(self.timeout, "memory list", async {
            let rows = sqlx::query(
                r#"
                SELECT path, content, embedding, tags, fingerprint,
                       modified_at, created_at, updated_at
                FROM memories
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&self.pool)
            .await?;
            Ok::<_, anyhow::Error>(rows)
        })
        .await?;

        rows.iter()
            .map(|row| {
                let embedding: Option<Vector> = row.try_get("embedding")?;
                let tags: Json<Vec<String>> = row.try_get("tags")?;
                Ok(Memory {
                    path: row.try_get("path")?,
                    content: row.try_get("content")?,
                    fingerprint: row.try_get("fingerprint")?,
                    tags: tags.0,
                    embedding: embedding.map(|v| v.to_vec()),
                    modified_at: row.try_get("modified_at")?,
                    created_at: Some(row.try_get("created_at")?),
                    updated_at: Some(row.try_get("updated_at")?),
                })
            })
            .collect()
    }
}
