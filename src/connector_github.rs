//! GitHub repository content source.
//!
//! On first use the whole repository is downloaded as one zipball and
//! extracted into a [`Snapshot`]; every later listing and fetch in the run
//! reads that snapshot. One request per run, regardless of file count.
//!
//! The token and the `owner/repo` coordinate are checked when the source
//! is constructed. A failed download or extraction fails the listing, and
//! with it the whole run. Archives larger than `github.max_archive_bytes`
//! are refused.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use kbsync_core::models::{Entry, RepoCoordinate};
use kbsync_core::source::{ContentSource, FetchedContent};

use crate::config::GitHubConfig;
use crate::snapshot::Snapshot;

pub struct GitHubSource {
    client: reqwest::Client,
    coordinate: RepoCoordinate,
    token: String,
    api_base: String,
    max_archive_bytes: u64,
    snapshot: OnceCell<Snapshot>,
}

impl GitHubSource {
    pub fn new(repo: &str, config: &GitHubConfig) -> Result<Self> {
        let coordinate = RepoCoordinate::parse(repo)?;
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("GITHUB_TOKEN environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .user_agent(concat!("kbsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            coordinate,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_archive_bytes: config.max_archive_bytes,
            snapshot: OnceCell::new(),
        })
    }

    pub fn zipball_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/zipball",
            self.api_base, self.coordinate.owner, self.coordinate.name
        )
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let url = self.zipball_url();
        info!(repo = %self.coordinate, "downloading repository archive");

        let mut response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .with_context(|| format!("Failed to download archive for {}", self.coordinate))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "GitHub archive download for {} failed: {} {}",
                self.coordinate,
                status,
                body
            );
        }

        let too_large = || {
            anyhow!(
                "repository archive for {} exceeds {} bytes",
                self.coordinate,
                self.max_archive_bytes
            )
        };
        if response.content_length().unwrap_or(0) > self.max_archive_bytes {
            return Err(too_large());
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read archive for {}", self.coordinate))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_archive_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    /// The snapshot for this source, materialized on first call.
    async fn snapshot(&self) -> Result<&Snapshot> {
        self.snapshot
            .get_or_try_init(|| async {
                let bytes = self.download().await?;
                let size = bytes.len();
                let snapshot =
                    tokio::task::spawn_blocking(move || Snapshot::from_zipball(&bytes)).await??;
                info!(repo = %self.coordinate, bytes = size, "repository snapshot ready");
                Ok::<_, anyhow::Error>(snapshot)
            })
            .await
    }
}

#[async_trait]
impl ContentSource for GitHubSource {
    async fn list_entries(&self) -> Result<Vec<Entry>> {
        self.snapshot().await?.list()
    }

    async fn fetch_one(&self, path: &str) -> Result<FetchedContent> {
        self.snapshot().await?.read(path)
    }
}
