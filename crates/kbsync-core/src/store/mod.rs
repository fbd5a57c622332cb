//! Persisted-store abstraction.
//!
//! The repository traits define every storage operation the sync pipeline
//! and CLI need, so the Postgres backend and the in-memory test backend are
//! interchangeable.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get_store`](StoreRepository::get_store) | Look up a store by id |
//! | [`create_store`](StoreRepository::create_store) | Register a store, returning its assigned id |
//! | [`upsert_document`](DocumentRepository::upsert_document) | Create-or-update by `(store_id, path)` |
//! | [`upsert_memory`](MemoryRepository::upsert_memory) | Validate, then create-or-update by `path` |
//! | `find_existing_fingerprints` | Which candidate fingerprints are already stored |
//! | [`list_memories`](MemoryRepository::list_memories) | All memories, newest first |
//!
//! Upserts are all-or-nothing per item and never change `created_at` once
//! set. After a successful upsert the item's `created_at`/`updated_at` hold
//! the values assigned by storage.

pub mod in_memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, DocumentStore, Memory, StoreId};

pub use in_memory::{InMemoryDocumentRepository, InMemoryMemoryRepository, InMemoryStoreRepository};

#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Fails with [`SyncError::StoreNotFound`](crate::SyncError::StoreNotFound)
    /// when no store has this id.
    async fn get_store(&self, id: StoreId) -> Result<DocumentStore>;

    /// Persist `store` and return it with the assigned id. The id carried by
    /// `store` is ignored.
    async fn create_store(&self, store: &DocumentStore) -> Result<DocumentStore>;

    /// All stores ordered by id.
    async fn list_stores(&self) -> Result<Vec<DocumentStore>>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn upsert_document(&self, document: &mut Document) -> Result<()>;

    /// Subset of `fingerprints` already present on any stored document.
    ///
    /// Matching is by fingerprint value alone, regardless of store or path.
    async fn find_existing_fingerprints(&self, fingerprints: &[String]) -> Result<Vec<String>>;
}

#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Rejects an embedding of the wrong dimensionality or with a non-finite
    /// component before anything is written.
    async fn upsert_memory(&self, memory: &mut Memory) -> Result<()>;

    async fn find_existing_fingerprints(&self, fingerprints: &[String]) -> Result<Vec<String>>;

    async fn list_memories(&self) -> Result<Vec<Memory>>;
}
