//! Memory-note view over a content source.
//!
//! Memory notes live under a dedicated subdirectory with a fixed
//! extension. The logical memory path `foo/bar` maps to the physical path
//! `<dir>/foo/bar.<ext>` and back.

use anyhow::Result;
use async_trait::async_trait;

use super::{ContentSource, FetchedContent};
use crate::models::Entry;

pub const DEFAULT_MEMORY_DIR: &str = ".memories";
pub const DEFAULT_MEMORY_EXTENSION: &str = "md";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLayout {
    dir: String,
    extension: String,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_DIR, DEFAULT_MEMORY_EXTENSION)
    }
}

impl MemoryLayout {
    pub fn new(dir: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into().trim_matches('/').to_string(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    fn prefix(&self) -> String {
        format!("{}/", self.dir)
    }

    fn suffix(&self) -> String {
        format!(".{}", self.extension)
    }

    /// Physical path for a logical memory path. Exact inverse of
    /// [`MemoryLayout::to_logical`].
    pub fn to_physical(&self, logical: &str) -> String {
        format!("{}{}{}", self.prefix(), logical, self.suffix())
    }

    /// Logical path for a physical path, or `None` when the path is outside
    /// the memory directory or has another extension.
    pub fn to_logical(&self, physical: &str) -> Option<String> {
        let logical = physical
            .strip_prefix(&self.prefix())?
            .strip_suffix(&self.suffix())?;
        if logical.is_empty() {
            None
        } else {
            Some(logical.to_string())
        }
    }
}

/// Restricts a source to memory notes and speaks logical paths.
pub struct MemorySource<S> {
    inner: S,
    layout: MemoryLayout,
}

impl<S: ContentSource> MemorySource<S> {
    pub fn new(inner: S, layout: MemoryLayout) -> Self {
        Self { inner, layout }
    }
}

#[async_trait]
impl<S: ContentSource> ContentSource for MemorySource<S> {
    async fn list_entries(&self) -> Result<Vec<Entry>> {
        let entries = self.inner.list_entries().await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                self.layout.to_logical(&entry.path).map(|path| Entry {
                    path,
                    modified_at: entry.modified_at,
                })
            })
            .collect())
    }

    async fn fetch_one(&self, path: &str) -> Result<FetchedContent> {
        self.inner.fetch_one(&self.layout.to_physical(path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;

    #[test]
    fn test_to_physical() {
        let layout = MemoryLayout::default();
        assert_eq!(layout.to_physical("foo/bar"), ".memories/foo/bar.md");
        assert_eq!(layout.to_physical("foo.md"), ".memories/foo.md.md");
    }

    #[test]
    fn test_paths_round_trip() {
        let layout = MemoryLayout::default();
        for physical in [
            ".memories/foo.md",
            ".memories/foo.md.md",
            ".memories/.memories/nested.md",
            ".memories/a/b/c.md",
        ] {
            let logical = layout.to_logical(physical).unwrap();
            assert_eq!(layout.to_physical(&logical), physical);
        }
    }

    #[test]
    fn test_to_logical() {
        let layout = MemoryLayout::default();
        assert_eq!(layout.to_logical(".memories/foo/bar.md"), Some("foo/bar".to_string()));
        assert_eq!(layout.to_logical("docs/foo.md"), None);
        assert_eq!(layout.to_logical(".memories/foo.txt"), None);
        assert_eq!(layout.to_logical(".memories/.md"), None);
    }

    #[test]
    fn test_layout_normalizes_input() {
        let layout = MemoryLayout::new("/notes/", ".txt");
        assert_eq!(layout.to_physical("a"), "notes/a.txt");
        assert_eq!(layout.to_logical("notes/a.txt"), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_memory_source_filters_and_maps() {
        let inner = InMemorySource::new();
        inner.insert(".memories/ideas/today.md", "remember");
        inner.insert(".memories/image.png", "not a note");
        inner.insert("README.md", "readme");

        let source = MemorySource::new(inner, MemoryLayout::default());
        let entries = source.list_entries().await.unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["ideas/today"]);

        let fetched = source.fetch_one("ideas/today").await.unwrap();
        assert_eq!(fetched.content, "remember");
    }

    #[tokio::test]
    async fn test_memory_source_fetches_the_listed_note() {
        let inner = InMemorySource::new();
        inner.insert(".memories/foo.md.md", "double ext");
        inner.insert(".memories/foo.md", "plain foo");
        inner.insert(".memories/.memories/nested.md", "nested");

        let source = MemorySource::new(inner, MemoryLayout::default());
        for entry in source.list_entries().await.unwrap() {
            let fetched = source.fetch_one(&entry.path).await.unwrap();
            let expected = match entry.path.as_str() {
                "foo.md" => "double ext",
                "foo" => "plain foo",
                ".memories/nested" => "nested",
                other => panic!("unexpected entry {}", other),
            };
            assert_eq!(fetched.content, expected);
        }
    }

    #[tokio::test]
    async fn test_memory_source_missing_dir_is_empty() {
        let inner = InMemorySource::new();
        inner.insert("docs/a.md", "a");
        let source = MemorySource::new(inner, MemoryLayout::default());
        assert!(source.list_entries().await.unwrap().is_empty());
    }
}
