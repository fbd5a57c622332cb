//! In-memory repositories for testing.
//!
//! Uses `BTreeMap` behind `std::sync::RwLock`. Timestamps come from the
//! wall clock and `updated_at` never moves backwards for a key.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::{validate_embedding, DEFAULT_EMBEDDING_DIMS};
use crate::error::SyncError;
use crate::models::{Document, DocumentStore, Memory, StoreId};

use super::{DocumentRepository, MemoryRepository, StoreRepository};

fn stamp(previous: Option<(DateTime<Utc>, DateTime<Utc>)>) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    match previous {
        Some((created, updated)) => (created, now.max(updated)),
        None => (now, now),
    }
}

fn existing(stored: impl Iterator<Item = String>, fingerprints: &[String]) -> Vec<String> {
    let stored: HashSet<String> = stored.collect();
    fingerprints
        .iter()
        .filter(|fp| stored.contains(*fp))
        .cloned()
        .collect()
}

#[derive(Default)]
pub struct InMemoryStoreRepository {
    stores: RwLock<BTreeMap<StoreId, DocumentStore>>,
}

impl InMemoryStoreRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreRepository for InMemoryStoreRepository {
    async fn get_store(&self, id: StoreId) -> Result<DocumentStore> {
        let stores = self.stores.read().unwrap();
        Ok(stores
            .get(&id)
            .cloned()
            .ok_or(SyncError::StoreNotFound(id))?)
    }

    async fn create_store(&self, store: &DocumentStore) -> Result<DocumentStore> {
        let mut stores = self.stores.write().unwrap();
        let next = stores.keys().next_back().map(|id| id.0 + 1).unwrap_or(1);
        let created = store.with_id(StoreId(next));
        stores.insert(created.id(), created.clone());
        Ok(created)
    }

    async fn list_stores(&self) -> Result<Vec<DocumentStore>> {
        Ok(self.stores.read().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: RwLock<BTreeMap<(StoreId, String), Document>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored copy of a document, if any.
    pub fn get(&self, store_id: StoreId, path: &str) -> Option<Document> {
        self.documents
            .read()
            .unwrap()
            .get(&(store_id, path.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn upsert_document(&self, document: &mut Document) -> Result<()> {
        let mut documents = self.documents.write().unwrap();
        let key = (document.store_id, document.path.clone());
        let previous = documents.get(&key).and_then(|d| d.created_at.zip(d.updated_at));
        let (created_at, updated_at) = stamp(previous);
        document.created_at = Some(created_at);
        document.updated_at = Some(updated_at);
        documents.insert(key, document.clone());
        Ok(())
    }

    async fn find_existing_fingerprints(&self, fingerprints: &[String]) -> Result<Vec<String>> {
        let documents = self.documents.read().unwrap();
        Ok(existing(
            documents.values().map(|d| d.fingerprint.clone()),
            fingerprints,
        ))
    }
}

pub struct InMemoryMemoryRepository {
    memories: RwLock<BTreeMap<String, Memory>>,
    dims: usize,
}

impl Default for InMemoryMemoryRepository {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMS)
    }
}

impl InMemoryMemoryRepository {
    /// Repository accepting embeddings of exactly `dims` components.
    pub fn new(dims: usize) -> Self {
        Self {
            memories: RwLock::new(BTreeMap::new()),
            dims,
        }
    }

    pub fn get(&self, path: &str) -> Option<Memory> {
        self.memories.read().unwrap().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.memories.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemoryRepository for InMemoryMemoryRepository {
    async fn upsert_memory(&self, memory: &mut Memory) -> Result<()> {
        if let Some(embedding) = &memory.embedding {
            validate_embedding(embedding, self.dims)?;
        }
        let mut memories = self.memories.write().unwrap();
        let previous = memories
            .get(&memory.path)
            .and_then(|m| m.created_at.zip(m.updated_at));
        let (created_at, updated_at) = stamp(previous);
        memory.created_at = Some(created_at);
        memory.updated_at = Some(updated_at);
        memories.insert(memory.path.clone(), memory.clone());
        Ok(())
    }

    async fn find_existing_fingerprints(&self, fingerprints: &[String]) -> Result<Vec<String>> {
        let memories = self.memories.read().unwrap();
        Ok(existing(
            memories.values().map(|m| m.fingerprint.clone()),
            fingerprints,
        ))
    }

    async fn list_memories(&self) -> Result<Vec<Memory>> {
        let mut memories: Vec<Memory> = self.memories.read().unwrap().values().cloned().collect();
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(memories)
    }
}
