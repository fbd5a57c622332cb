//! In-memory [`ContentSource`] for tests and embedding callers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ContentSource, FetchedContent};
use crate::models::Entry;

/// A content source backed by a map of path → content.
///
/// Paths can be marked unreadable to simulate per-file fetch failures, and
/// listing can be made to fail to simulate an unreachable remote.
#[derive(Default)]
pub struct InMemorySource {
    files: RwLock<BTreeMap<String, FetchedContent>>,
    unreadable: RwLock<BTreeSet<String>>,
    listing_error: RwLock<Option<String>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file, stamped with the current time.
    pub fn insert(&self, path: &str, content: &str) {
        self.insert_at(path, content, Utc::now());
    }

    pub fn insert_at(&self, path: &str, content: &str, modified_at: DateTime<Utc>) {
        self.files.write().unwrap().insert(
            path.to_string(),
            FetchedContent {
                content: content.to_string(),
                modified_at,
            },
        );
    }

    /// Keep `path` listed but make every fetch of it fail.
    pub fn mark_unreadable(&self, path: &str) {
        self.unreadable.write().unwrap().insert(path.to_string());
    }

    /// Make [`list_entries`](ContentSource::list_entries) fail with `message`.
    pub fn fail_listing(&self, message: &str) {
        *self.listing_error.write().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl ContentSource for InMemorySource {
    async fn list_entries(&self) -> Result<Vec<Entry>> {
        if let Some(message) = self.listing_error.read().unwrap().as_ref() {
            bail!("{}", message);
        }
        Ok(self
            .files
            .read()
            .unwrap()
            .iter()
            .map(|(path, file)| Entry {
                path: path.clone(),
                modified_at: file.modified_at,
            })
            .collect())
    }

    async fn fetch_one(&self, path: &str) -> Result<FetchedContent> {
        if self.unreadable.read().unwrap().contains(path) {
            bail!("error reading file: {}", path);
        }
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("file not found: {}", path))
    }
}
