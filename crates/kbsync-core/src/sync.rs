//! Sync reconciliation pipeline.
//!
//! A run moves through [`SyncPhase`]s:
//!
//! ```text
//! Idle → Listing → Fetching → Diffing → EmbeddingAndSaving → Done
//!           │
//!           └────────────▶ Failed
//! ```
//!
//! Store lookup, source construction, listing and the fingerprint diff are
//! fatal: their errors end the run. A failed fetch, embedding or upsert
//! only drops that item; the run still succeeds and the drop is counted in
//! the [`SyncReport`].
//!
//! The diff runs once over the whole fetched batch, before any embedding
//! decision. Matching is by fingerprint alone, so content copied unchanged
//! to a new path is treated as already stored and skipped entirely.

use std::collections::HashSet;
use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::models::{Document, Memory, StoreId, SyncItem};
use crate::source::{ContentSource, FetchedContent, SourceRegistry};
use crate::store::{DocumentRepository, MemoryRepository, StoreRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Listing,
    Fetching,
    Diffing,
    EmbeddingAndSaving,
    Done,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Listing => "listing",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Diffing => "diffing",
            SyncPhase::EmbeddingAndSaving => "embedding and saving",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Diff only: count what would be embedded, without embedding or
    /// writing anything.
    pub dry_run: bool,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries returned by the listing.
    pub listed: usize,
    /// Entries fetched successfully and considered for saving.
    pub processed: usize,
    /// Items whose fingerprint was already stored.
    pub unchanged: usize,
    /// Items that needed an embedding (new or modified).
    pub changed: usize,
    pub saved: usize,
    pub fetch_failures: usize,
    pub embed_failures: usize,
    pub save_failures: usize,
    pub dry_run: bool,
}

impl SyncReport {
    /// Items dropped at any per-item stage.
    pub fn skipped(&self) -> usize {
        self.fetch_failures + self.embed_failures + self.save_failures
    }
}

/// Tracks the current phase of one run.
struct Run {
    kind: &'static str,
    phase: SyncPhase,
}

impl Run {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            phase: SyncPhase::Idle,
        }
    }

    fn enter(&mut self, phase: SyncPhase) {
        debug!(kind = self.kind, from = %self.phase, to = %phase, "sync phase");
        self.phase = phase;
    }

    /// Mark the run failed, logging the phase it failed in.
    fn fail(&mut self, err: anyhow::Error) -> anyhow::Error {
        warn!(kind = self.kind, phase = %self.phase, error = %format!("{err:#}"), "sync failed");
        let phase = self.phase;
        self.phase = SyncPhase::Failed;
        err.context(format!("{} sync failed while {}", self.kind, phase))
    }
}

/// Storage seen by the shared reconcile loop.
#[async_trait]
trait ItemSink<T>: Send + Sync {
    async fn existing(&self, fingerprints: &[String]) -> Result<Vec<String>>;
    async fn save(&self, item: &mut T) -> Result<()>;
}

struct DocumentSink<'a>(&'a dyn DocumentRepository);

#[async_trait]
impl ItemSink<Document> for DocumentSink<'_> {
    async fn existing(&self, fingerprints: &[String]) -> Result<Vec<String>> {
        self.0.find_existing_fingerprints(fingerprints).await
    }
    async fn save(&self, item: &mut Document) -> Result<()> {
        self.0.upsert_document(item).await
    }
}

struct MemorySink<'a>(&'a dyn MemoryRepository);

#[async_trait]
impl ItemSink<Memory> for MemorySink<'_> {
    async fn existing(&self, fingerprints: &[String]) -> Result<Vec<String>> {
        self.0.find_existing_fingerprints(fingerprints).await
    }
    async fn save(&self, item: &mut Memory) -> Result<()> {
        self.0.upsert_memory(item).await
    }
}

/// Fingerprints among `items` that are already stored.
///
/// An empty batch returns an empty set without querying storage.
async fn resolve_unchanged<T: SyncItem + Sync>(
    sink: &dyn ItemSink<T>,
    items: &[T],
) -> Result<HashSet<String>> {
    let candidates: Vec<String> = items
        .iter()
        .map(|i| i.fingerprint().to_string())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    if candidates.is_empty() {
        return Ok(HashSet::new());
    }

    let found = sink.existing(&candidates).await?;
    let candidates: HashSet<String> = candidates.into_iter().collect();
    Ok(found
        .into_iter()
        .filter(|fp| candidates.contains(fp))
        .collect())
}

/// List and fetch every entry, dropping the ones that fail to fetch.
async fn fetch_all<T>(
    run: &mut Run,
    source: &dyn ContentSource,
    report: &mut SyncReport,
    build: impl Fn(String, FetchedContent) -> T,
) -> Result<Vec<T>> {
    run.enter(SyncPhase::Listing);
    let entries = source
        .list_entries()
        .await
        .with_context(|| format!("failed to list {} entries", run.kind))
        .map_err(|e| run.fail(e))?;
    report.listed = entries.len();
    info!(kind = run.kind, count = entries.len(), "listed entries");

    run.enter(SyncPhase::Fetching);
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        match source.fetch_one(&entry.path).await {
            Ok(fetched) => items.push(build(entry.path, fetched)),
            Err(e) => {
                warn!(kind = run.kind, path = %entry.path, error = %format!("{e:#}"), "failed to fetch, skipping");
                report.fetch_failures += 1;
            }
        }
    }
    report.processed = items.len();
    Ok(items)
}

/// Diff the batch, then embed and save the changed items.
async fn reconcile<T: SyncItem + Sync>(
    run: &mut Run,
    items: Vec<T>,
    sink: &dyn ItemSink<T>,
    embedder: &dyn Embedder,
    options: SyncOptions,
    report: &mut SyncReport,
) -> Result<()> {
    run.enter(SyncPhase::Diffing);
    let unchanged = resolve_unchanged(sink, &items)
        .await
        .with_context(|| format!("failed to find unchanged {} items", run.kind))
        .map_err(|e| run.fail(e))?;

    run.enter(SyncPhase::EmbeddingAndSaving);
    for mut item in items {
        if unchanged.contains(item.fingerprint()) {
            debug!(kind = run.kind, path = item.path(), "unchanged");
            report.unchanged += 1;
            continue;
        }
        report.changed += 1;

        if options.dry_run {
            info!(kind = run.kind, path = item.path(), "would embed and save");
            continue;
        }

        let embedding = match embedder.embed(item.content()).await {
            Ok(v) => v,
            Err(e) => {
                warn!(kind = run.kind, path = item.path(), error = %format!("{e:#}"), "failed to create embedding, skipping");
                report.embed_failures += 1;
                continue;
            }
        };
        item.set_embedding(embedding);

        if let Err(e) = sink.save(&mut item).await {
            warn!(kind = run.kind, path = item.path(), error = %format!("{e:#}"), "failed to save, skipping");
            report.save_failures += 1;
            continue;
        }
        report.saved += 1;
    }

    run.enter(SyncPhase::Done);
    info!(
        kind = run.kind,
        processed = report.processed,
        saved = report.saved,
        unchanged = report.unchanged,
        skipped = report.skipped(),
        "sync completed"
    );
    Ok(())
}

/// Reconciles one document store against the persisted documents.
pub struct DocumentSync<'a> {
    stores: &'a dyn StoreRepository,
    documents: &'a dyn DocumentRepository,
    sources: &'a SourceRegistry,
    embedder: &'a dyn Embedder,
}

impl<'a> DocumentSync<'a> {
    pub fn new(
        stores: &'a dyn StoreRepository,
        documents: &'a dyn DocumentRepository,
        sources: &'a SourceRegistry,
        embedder: &'a dyn Embedder,
    ) -> Self {
        Self {
            stores,
            documents,
            sources,
            embedder,
        }
    }

    /// Run the document flow for `store_id`.
    ///
    /// The content source is created for this run only and dropped, along
    /// with any local snapshot it holds, before returning.
    pub async fn run(&self, store_id: StoreId, options: SyncOptions) -> Result<SyncReport> {
        let mut run = Run::new("document");
        let mut report = SyncReport {
            dry_run: options.dry_run,
            ..Default::default()
        };

        let store = self
            .stores
            .get_store(store_id)
            .await
            .map_err(|e| run.fail(e))?;
        let source = self.sources.create(&store).map_err(|e| run.fail(e))?;
        info!(store = %store.id(), store_type = store.store_type(), repo = store.repo(), "syncing store");

        let documents = fetch_all(&mut run, source.as_ref(), &mut report, |path, fetched| {
            Document::new(store.id(), path, fetched.content, fetched.modified_at)
        })
        .await?;

        reconcile(
            &mut run,
            documents,
            &DocumentSink(self.documents),
            self.embedder,
            options,
            &mut report,
        )
        .await?;
        Ok(report)
    }
}

/// Reconciles the memory-note source against the persisted memories.
pub struct MemorySync<'a> {
    memories: &'a dyn MemoryRepository,
    source: &'a dyn ContentSource,
    embedder: &'a dyn Embedder,
}

impl<'a> MemorySync<'a> {
    /// `source` must already speak logical memory paths (see
    /// [`MemorySource`](crate::source::MemorySource)).
    pub fn new(
        memories: &'a dyn MemoryRepository,
        source: &'a dyn ContentSource,
        embedder: &'a dyn Embedder,
    ) -> Self {
        Self {
            memories,
            source,
            embedder,
        }
    }

    pub async fn run(&self, options: SyncOptions) -> Result<SyncReport> {
        let mut run = Run::new("memory");
        let mut report = SyncReport {
            dry_run: options.dry_run,
            ..Default::default()
        };

        let memories = fetch_all(&mut run, self.source, &mut report, |path, fetched| {
            Memory::new(path, fetched.content, fetched.modified_at)
        })
        .await?;

        reconcile(
            &mut run,
            memories,
            &MemorySink(self.memories),
            self.embedder,
            options,
            &mut report,
        )
        .await?;
        Ok(report)
    }
}
