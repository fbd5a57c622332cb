//! Remote content sources.
//!
//! A [`ContentSource`] lists the entries of a remote store and fetches one
//! entry at a time. The [`SourceRegistry`] maps a store's type tag to the
//! constructor of its source, so the orchestrator never switches on store
//! types itself.

pub mod in_memory;
pub mod memories;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::models::{DocumentStore, Entry};

pub use in_memory::InMemorySource;
pub use memories::{MemoryLayout, MemorySource};

/// Content and modification time of one fetched entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub content: String,
    pub modified_at: DateTime<Utc>,
}

/// Listing and fetching over a remote store.
///
/// Listing failures are fatal for a sync run. Fetch failures only drop the
/// affected entry.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Every entry in the source, as relative paths.
    async fn list_entries(&self) -> Result<Vec<Entry>>;

    /// Content and modification time for one listed path.
    async fn fetch_one(&self, path: &str) -> Result<FetchedContent>;
}

#[async_trait]
impl<S: ContentSource + ?Sized> ContentSource for Box<S> {
    async fn list_entries(&self) -> Result<Vec<Entry>> {
        (**self).list_entries().await
    }

    async fn fetch_one(&self, path: &str) -> Result<FetchedContent> {
        (**self).fetch_one(path).await
    }
}

/// Builds the content source for a store.
pub type SourceConstructor =
    Box<dyn Fn(&DocumentStore) -> Result<Box<dyn ContentSource>> + Send + Sync>;

/// Lookup table from store type tag to source constructor.
///
/// ```rust
/// use kbsync_core::models::{DocumentStore, StoreId};
/// use kbsync_core::source::{InMemorySource, SourceRegistry};
/// use kbsync_core::SyncError;
///
/// let mut registry = SourceRegistry::new();
/// registry.register("github", |_store| Ok(Box::new(InMemorySource::new())));
///
/// let store = DocumentStore::github(StoreId(1), "octo/notes");
/// assert!(registry.create(&store).is_ok());
///
/// let empty = SourceRegistry::new();
/// let err = empty.create(&store).err().unwrap();
/// assert!(matches!(err.downcast_ref::<SyncError>(), Some(SyncError::UnsupportedStoreType(_))));
/// ```
#[derive(Default)]
pub struct SourceRegistry {
    constructors: BTreeMap<String, SourceConstructor>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for `store_type`.
    pub fn register<F>(&mut self, store_type: &str, constructor: F)
    where
        F: Fn(&DocumentStore) -> Result<Box<dyn ContentSource>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(store_type.to_string(), Box::new(constructor));
    }

    /// Construct the source for `store`.
    ///
    /// Fails with [`SyncError::UnsupportedStoreType`] when nothing is
    /// registered for the store's type.
    pub fn create(&self, store: &DocumentStore) -> Result<Box<dyn ContentSource>> {
        let constructor = self
            .constructors
            .get(store.store_type())
            .ok_or_else(|| SyncError::UnsupportedStoreType(store.store_type().to_string()))?;
        constructor(store)
    }
}
