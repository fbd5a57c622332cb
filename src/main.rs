//! # kbsync CLI
//!
//! The `kbsync` binary syncs markdown notes from GitHub repositories into
//! Postgres, embedding only what changed since the last run.
//!
//! ## Usage
//!
//! ```bash
//! kbsync [--config ./kbsync.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbsync init` | Create the pgvector extension and the tables |
//! | `kbsync store create <owner/repo>` | Register a GitHub document store |
//! | `kbsync store list` | List registered stores |
//! | `kbsync sync document <store-id>` | Sync one document store |
//! | `kbsync sync memory` | Sync the memory notes repository |
//! | `kbsync memory list` | List stored memories, newest first |
//! | `kbsync version` | Print the version |
//!
//! Configuration is read from the environment (`DB_*`, `MEMORY_REPO`,
//! `GITHUB_TOKEN`, `OPENAI_API_KEY`), optionally layered over a TOML file.
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kbsync::config::Config;
use kbsync::{db, memory_cmd, migrate, store_cmd, sync_cmd};

#[derive(Parser)]
#[command(
    name = "kbsync",
    about = "Sync markdown knowledge bases from GitHub into Postgres with embeddings",
    version
)]
struct Cli {
    /// Optional TOML configuration file. Environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the `vector` extension and the stores, documents and
    /// memories tables. Safe to run repeatedly.
    Init,

    /// Reconcile remote content with the database.
    Sync {
        #[command(subcommand)]
        target: SyncTarget,
    },

    /// Manage document stores.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Inspect stored memories.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Print the version.
    Version,
}

#[derive(Subcommand)]
enum SyncTarget {
    /// Sync the documents of one store.
    Document {
        /// Numeric store id, as printed by `store create`.
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        store_id: i64,

        /// Diff only: report what would be embedded without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Sync the memory notes repository (`MEMORY_REPO`).
    Memory {
        /// Diff only: report what would be embedded without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Register a GitHub repository as a document store.
    Create {
        /// Repository in `owner/repo` form.
        repo: String,
    },
    /// List registered stores.
    List,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// List memories, newest first.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Commands that don't require config
    if let Commands::Version = cli.command {
        println!("kbsync {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let cfg = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db).await?;
            let result = migrate::run_migrations(&pool, cfg.embedding.dims).await;
            pool.close().await;
            result?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { target } => match target {
            SyncTarget::Document { store_id, dry_run } => {
                sync_cmd::run_document_sync(&cfg, store_id, dry_run).await?;
            }
            SyncTarget::Memory { dry_run } => {
                sync_cmd::run_memory_sync(&cfg, dry_run).await?;
            }
        },
        Commands::Store { action } => match action {
            StoreAction::Create { repo } => {
                store_cmd::run_store_create(&cfg, &repo).await?;
            }
            StoreAction::List => {
                store_cmd::run_store_list(&cfg).await?;
            }
        },
        Commands::Memory { action } => match action {
            MemoryAction::List => {
                memory_cmd::run_memory_list(&cfg).await?;
            }
        },
        Commands::Version => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
