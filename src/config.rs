//! Configuration loading.
//!
//! Settings come from an optional TOML file (`--config`), then environment
//! variables override individual keys:
//!
//! | Variable | Key | Default |
//! |----------|-----|---------|
//! | `DB_USER` | `db.user` | required |
//! | `DB_PASSWORD` | `db.password` | required |
//! | `DB_NAME` | `db.name` | required |
//! | `DB_HOST` | `db.host` | required |
//! | `DB_PORT` | `db.port` | `5432` |
//! | `MEMORY_REPO` | `memory.repo` | required |
//! | `GITHUB_TOKEN` | `github.token` | none |
//! | `OPENAI_API_KEY` | `embedding.api_key` | none |
//! | `OPENAI_EMBEDDING_MODEL` | `embedding.model` | `text-embedding-ada-002` |
//!
//! The two credentials are only checked when the GitHub source or the
//! OpenAI embedder is constructed, so commands like `store list` work
//! without them.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use kbsync_core::embedding::{DEFAULT_EMBEDDING_DIMS, DEFAULT_MAX_INPUT_CHARS};
use kbsync_core::source::memories::{DEFAULT_MEMORY_DIR, DEFAULT_MEMORY_EXTENSION};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Bound on connecting and on each upsert transaction.
    #[serde(default = "default_db_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            name: String::new(),
            host: String::new(),
            port: default_db_port(),
            max_connections: default_max_connections(),
            timeout_secs: default_db_timeout_secs(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

fn default_db_port() -> u16 {
    5432
}
fn default_max_connections() -> u32 {
    5
}
fn default_db_timeout_secs() -> u64 {
    10
}
fn default_lookup_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// `owner/repo` of the memory notes repository.
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_memory_dir")]
    pub dir: String,
    #[serde(default = "default_memory_extension")]
    pub extension: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            dir: default_memory_dir(),
            extension: default_memory_extension(),
        }
    }
}

fn default_memory_dir() -> String {
    DEFAULT_MEMORY_DIR.to_string()
}
fn default_memory_extension() -> String {
    DEFAULT_MEMORY_EXTENSION.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Largest repository archive accepted, in bytes.
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: default_github_api_base(),
            download_timeout_secs: default_download_timeout_secs(),
            max_archive_bytes: default_max_archive_bytes(),
        }
    }
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_download_timeout_secs() -> u64 {
    120
}
fn default_max_archive_bytes() -> u64 {
    1024 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            dims: default_dims(),
            api_base: default_api_base(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

fn default_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    DEFAULT_EMBEDDING_DIMS
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

impl Config {
    /// Load from the optional TOML file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let file = match path {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            ),
            None => None,
        };
        Self::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from TOML text and an environment lookup, then validate.
    pub fn from_sources<F>(toml_text: Option<&str>, env: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = match toml_text {
            Some(text) => toml::from_str(text).context("Failed to parse config file")?,
            None => Config::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.is_empty());

        if let Some(v) = var("DB_USER") {
            self.db.user = v;
        }
        if let Some(v) = var("DB_PASSWORD") {
            self.db.password = v;
        }
        if let Some(v) = var("DB_NAME") {
            self.db.name = v;
        }
        if let Some(v) = var("DB_HOST") {
            self.db.host = v;
        }
        if let Some(v) = var("DB_PORT") {
            self.db.port = v
                .parse()
                .with_context(|| format!("DB_PORT must be a port number, got '{}'", v))?;
        }
        if let Some(v) = var("MEMORY_REPO") {
            self.memory.repo = v;
        }
        if let Some(v) = var("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.embedding.api_key = Some(v);
        }
        if let Some(v) = var("OPENAI_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("DB_USER", &self.db.user),
            ("DB_PASSWORD", &self.db.password),
            ("DB_NAME", &self.db.name),
            ("DB_HOST", &self.db.host),
            ("MEMORY_REPO", &self.memory.repo),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing).into());
        }

        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.max_input_chars == 0 {
            bail!("embedding.max_input_chars must be > 0");
        }
        if self.db.max_connections == 0 {
            bail!("db.max_connections must be > 0");
        }
        Ok(())
    }
}
