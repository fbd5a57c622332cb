//! # kbsync
//!
//! Personal knowledge-base sync: markdown notes in GitHub repositories
//! become tagged, embedded rows in Postgres.
//!
//! The backend-independent pipeline (models, fingerprints, tags, the diff
//! and the orchestrator) lives in [`kbsync_core`]. This crate supplies the
//! concrete collaborators and the CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌────────────┐
//! │   GitHub     │──▶│  kbsync-core sync    │──▶│  Postgres  │
//! │  zipball     │   │ diff ▸ embed ▸ upsert│   │  pgvector  │
//! └──────────────┘   └──────────┬───────────┘   └────────────┘
//!                               │
//!                         ┌─────▼─────┐
//!                         │  OpenAI   │
//!                         └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`db`] | Postgres connection pool |
//! | [`migrate`] | Schema creation |
//! | [`pg_store`] | Postgres repositories |
//! | [`snapshot`] | Zipball extraction, listing and reading |
//! | [`connector_github`] | GitHub content source |
//! | [`sources`] | Source registry wiring |
//! | [`embedding`] | OpenAI embedder |
//! | [`sync_cmd`] | `sync document` / `sync memory` |
//! | [`store_cmd`] | `store create` / `store list` |
//! | [`memory_cmd`] | `memory list` |

pub mod config;
pub mod connector_github;
pub mod db;
pub mod embedding;
pub mod memory_cmd;
pub mod migrate;
pub mod pg_store;
pub mod snapshot;
pub mod sources;
pub mod store_cmd;
pub mod sync_cmd;
