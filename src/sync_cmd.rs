//! `kbsync sync` commands.
//!
//! Builds the Postgres repositories, the source registry and the embedder
//! for one run, hands them to the core orchestrator, and prints the
//! summary. Dry runs use a [`DisabledEmbedder`] since nothing is embedded.

use anyhow::{bail, Result};

use kbsync_core::embedding::Embedder;
use kbsync_core::models::StoreId;
use kbsync_core::sync::{DocumentSync, MemorySync, SyncOptions, SyncReport};

use crate::config::Config;
use crate::db;
use crate::embedding::{DisabledEmbedder, OpenAIEmbedder};
use crate::pg_store::{PgDocumentRepository, PgMemoryRepository, PgStoreRepository};
use crate::sources;

fn build_embedder(config: &Config, dry_run: bool) -> Result<Box<dyn Embedder>> {
    if dry_run {
        return Ok(Box::new(DisabledEmbedder));
    }
    let embedder = OpenAIEmbedder::new(&config.embedding)?;
    check_embedder_dims(&embedder, config.embedding.dims)?;
    Ok(Box::new(embedder))
}

/// The embedder must produce vectors as wide as the `embedding` columns.
fn check_embedder_dims(embedder: &dyn Embedder, column_dims: usize) -> Result<()> {
    if embedder.dims() != column_dims {
        bail!(
            "embedding model {} produces {}-dimensional vectors, but the database stores {}",
            embedder.model_name(),
            embedder.dims(),
            column_dims
        );
    }
    Ok(())
}

pub async fn run_document_sync(config: &Config, store_id: i64, dry_run: bool) -> Result<()> {
    let embedder = build_embedder(config, dry_run)?;
    let pool = db::connect(&config.db).await?;

    let stores = PgStoreRepository::new(pool.clone(), &config.db);
    let documents = PgDocumentRepository::new(pool.clone(), &config.db);
    let registry = sources::default_registry(&config.github);

    let result = DocumentSync::new(&stores, &documents, &registry, embedder.as_ref())
        .run(StoreId(store_id), SyncOptions { dry_run })
        .await;
    pool.close().await;

    let report = result?;
    for line in summary_lines(&format!("document store {}", store_id), &report) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn run_memory_sync(config: &Config, dry_run: bool) -> Result<()> {
    let embedder = build_embedder(config, dry_run)?;
    let source = sources::memory_source(config)?;
    let pool = db::connect(&config.db).await?;

    let memories = PgMemoryRepository::new(pool.clone(), &config.db, config.embedding.dims);

    let result = MemorySync::new(&memories, &source, embedder.as_ref())
        .run(SyncOptions { dry_run })
        .await;
    pool.close().await;

    let report = result?;
    for line in summary_lines(&format!("memories {}", config.memory.repo), &report) {
        println!("{}", line);
    }
    Ok(())
}

fn summary_lines(label: &str, report: &SyncReport) -> Vec<String> {
    if report.dry_run {
        return vec![
            format!("sync {} (dry-run)", label),
            format!("  entries listed: {}", report.listed),
            format!("  fetched: {} items", report.processed),
            format!("  unchanged: {}", report.unchanged),
            format!("  would embed: {}", report.changed),
        ];
    }

    let mut lines = vec![
        format!("sync {}", label),
        format!("  fetched: {} items", report.processed),
        format!("  unchanged: {}", report.unchanged),
        format!("  saved: {}", report.saved),
    ];
    if report.skipped() > 0 {
        lines.push(format!(
            "  skipped: {} (fetch {}, embed {}, save {})",
            report.skipped(),
            report.fetch_failures,
            report.embed_failures,
            report.save_failures
        ));
    }
    lines.push("ok".to_string());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lines() {
        let report = SyncReport {
            listed: 10,
            processed: 9,
            unchanged: 4,
            changed: 5,
            saved: 4,
            fetch_failures: 1,
            embed_failures: 1,
            ..Default::default()
        };
        let lines = summary_lines("document store 3", &report);
        assert_eq!(lines[0], "sync document store 3");
        assert!(lines.contains(&"  saved: 4".to_string()));
        assert!(lines.contains(&"  skipped: 2 (fetch 1, embed 1, save 0)".to_string()));
        assert_eq!(lines.last().unwrap(), "ok");
    }

    #[test]
    fn test_summary_lines_clean_run_omits_skipped() {
        let report = SyncReport {
            processed: 2,
            saved: 2,
            changed: 2,
            ..Default::default()
        };
        let lines = summary_lines("memories octo/mem", &report);
        assert!(!lines.iter().any(|l| l.contains("skipped")));
    }

    #[test]
    fn test_summary_lines_dry_run() {
        let report = SyncReport {
            listed: 3,
            processed: 3,
            unchanged: 1,
            changed: 2,
            dry_run: true,
            ..Default::default()
        };
        let lines = summary_lines("document store 1", &report);
        assert_eq!(lines[0], "sync document store 1 (dry-run)");
        assert!(lines.contains(&"  would embed: 2".to_string()));
    }

    #[test]
    fn test_dry_run_needs_no_api_key() {
        let config = Config::default();
        let embedder = build_embedder(&config, true).unwrap();
        assert_eq!(embedder.model_name(), "disabled");
        assert!(build_embedder(&config, false).is_err());
    }

    #[test]
    fn test_embedder_width_must_match_columns() {
        let mut config = Config::default();
        config.embedding.api_key = Some("sk-test".to_string());
        let embedder = build_embedder(&config, false).unwrap();
        assert_eq!(embedder.dims(), config.embedding.dims);

        let err = check_embedder_dims(&DisabledEmbedder, 1536).unwrap_err();
        assert_eq!(
            err.to_string(),
            "embedding model disabled produces 0-dimensional vectors, but the database stores 1536"
        );
    }
}
