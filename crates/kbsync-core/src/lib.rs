//! # kbsync core
//!
//! Backend-independent logic for kbsync: data models, content
//! fingerprinting, tag extraction, the content-source, repository and
//! embedder traits, and the sync reconciliation pipeline that ties them
//! together.
//!
//! This crate contains no sqlx, reqwest, or filesystem I/O. Concrete
//! backends (Postgres, GitHub snapshots, OpenAI) live in the `kbsync`
//! app crate and plug in through the traits defined here.
//!
//! ## Pipeline
//!
//! ```text
//! list entries ─▶ fetch ─▶ fingerprint + tags ─▶ diff ─▶ embed ─▶ upsert
//!   (source)     (source)      (pure)           (repo)  (embedder) (repo)
//! ```

pub mod embedding;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod source;
pub mod store;
pub mod sync;
pub mod tags;

pub use error::SyncError;
