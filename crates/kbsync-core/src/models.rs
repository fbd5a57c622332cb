//! Core data models used throughout kbsync.
//!
//! These types represent the stores, documents, memories and transient
//! listing entries that flow through the sync pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::fingerprint::fingerprint;
use crate::tags::extract_tags;

/// Type tag persisted for GitHub-backed stores.
pub const STORE_TYPE_GITHUB: &str = "github";

/// Numeric store identifier, assigned by the persisted store on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(pub i64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A repository coordinate in `owner/repo` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinate {
    pub owner: String,
    pub name: String,
}

impl RepoCoordinate {
    /// Parse `owner/repo`. Anything other than exactly two non-empty
    /// segments is rejected.
    pub fn parse(repo: &str) -> Result<Self, SyncError> {
        let parts: Vec<&str> = repo.split('/').collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(SyncError::InvalidCoordinate(repo.to_string())),
        }
    }
}

impl fmt::Display for RepoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A document store backed by a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubStore {
    pub id: StoreId,
    /// Repository in `owner/repo` form.
    pub repo: String,
}

/// A registered document store.
///
/// The variant decides which content source is constructed for a sync
/// run (see [`SourceRegistry`](crate::source::SourceRegistry)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStore {
    GitHub(GitHubStore),
}

impl DocumentStore {
    /// Rebuild a store from its persisted columns.
    ///
    /// Unknown type tags are a configuration error, never retried.
    pub fn from_parts(id: StoreId, store_type: &str, repo: &str) -> Result<Self, SyncError> {
        match store_type {
            STORE_TYPE_GITHUB => Ok(DocumentStore::GitHub(GitHubStore {
                id,
                repo: repo.to_string(),
            })),
            other => Err(SyncError::UnsupportedStoreType(other.to_string())),
        }
    }

    pub fn github(id: StoreId, repo: impl Into<String>) -> Self {
        DocumentStore::GitHub(GitHubStore {
            id,
            repo: repo.into(),
        })
    }

    pub fn id(&self) -> StoreId {
        match self {
            DocumentStore::GitHub(s) => s.id,
        }
    }

    pub fn store_type(&self) -> &'static str {
        match self {
            DocumentStore::GitHub(_) => STORE_TYPE_GITHUB,
        }
    }

    /// Type-specific configuration, for display and persistence.
    pub fn repo(&self) -> &str {
        match self {
            DocumentStore::GitHub(s) => &s.repo,
        }
    }

    /// Same store with a different id (used after insertion).
    pub fn with_id(&self, id: StoreId) -> Self {
        match self {
            DocumentStore::GitHub(s) => DocumentStore::GitHub(GitHubStore {
                id,
                repo: s.repo.clone(),
            }),
        }
    }
}

/// A `(path, modification time)` pair produced while listing a source.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub modified_at: DateTime<Utc>,
}

/// A markdown document belonging to a store. Identity is `(store_id, path)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub store_id: StoreId,
    pub path: String,
    pub content: String,
    pub fingerprint: String,
    pub tags: Vec<String>,
    pub embedding: Option<Vec<f32>>,
    pub modified_at: DateTime<Utc>,
    /// Set from storage after the first successful upsert.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Build a freshly fetched document, computing its fingerprint and tags.
    pub fn new(
        store_id: StoreId,
        path: impl Into<String>,
        content: impl Into<String>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        Self {
            store_id,
            path: path.into(),
            fingerprint: fingerprint(&content),
            tags: extract_tags(&content).into_iter().collect(),
            content,
            embedding: None,
            modified_at,
            created_at: None,
            updated_at: None,
        }
    }
}

/// A memory note. Identity is `path` alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    pub path: String,
    pub content: String,
    pub fingerprint: String,
    pub tags: Vec<String>,
    pub embedding: Option<Vec<f32>>,
    pub modified_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Memory {
    /// Build a freshly fetched memory. Tags are not extracted for memories.
    pub fn new(path: impl Into<String>, content: impl Into<String>, modified_at: DateTime<Utc>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            fingerprint: fingerprint(&content),
            content,
            tags: Vec::new(),
            embedding: None,
            modified_at,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Common view over the items the sync pipeline reconciles.
pub trait SyncItem: Send {
    fn path(&self) -> &str;
    fn content(&self) -> &str;
    fn fingerprint(&self) -> &str;
    fn set_embedding(&mut self, embedding: Vec<f32>);
}

impl SyncItem for Document {
    fn path(&self) -> &str {
        &self.path
    }
    fn content(&self) -> &str {
        &self.content
    }
    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }
}

impl SyncItem for Memory {
    fn path(&self) -> &str {
        &self.path
    }
    fn content(&self) -> &str {
        &self.content
    }
    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_parse() {
        let c = RepoCoordinate::parse("octo/notes").unwrap();
        assert_eq!(c.owner, "octo");
        assert_eq!(c.name, "notes");
        assert_eq!(c.to_string(), "octo/notes");
    }

    #[test]
    fn test_coordinate_rejects_malformed() {
        for bad in ["", "octo", "octo/notes/extra", "/notes", "octo/"] {
            assert_eq!(
                RepoCoordinate::parse(bad),
                Err(SyncError::InvalidCoordinate(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_store_from_parts() {
        let store = DocumentStore::from_parts(StoreId(7), "github", "octo/notes").unwrap();
        assert_eq!(store.id(), StoreId(7));
        assert_eq!(store.store_type(), STORE_TYPE_GITHUB);
        assert_eq!(store.repo(), "octo/notes");
        assert_eq!(store.with_id(StoreId(9)).id(), StoreId(9));
    }

    #[test]
    fn test_store_unknown_type() {
        let err = DocumentStore::from_parts(StoreId(1), "gitlab", "octo/notes").unwrap_err();
        assert_eq!(err, SyncError::UnsupportedStoreType("gitlab".to_string()));
    }

    #[test]
    fn test_document_new_derives_fingerprint_and_tags() {
        let doc = Document::new(StoreId(1), "a.md", "hello #x", Utc::now());
        assert_eq!(doc.fingerprint, fingerprint("hello #x"));
        assert_eq!(doc.tags, vec!["x".to_string()]);
        assert!(doc.embedding.is_none());
        assert!(doc.created_at.is_none());
    }

    #[test]
    fn test_memory_new_has_no_tags() {
        let mem = Memory::new("ideas/today", "remember #this", Utc::now());
        assert!(mem.tags.is_empty());
        assert_eq!(mem.fingerprint, fingerprint("remember #this"));
    }
}
