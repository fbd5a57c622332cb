use anyhow::Result;

use kbsync_core::models::STORE_TYPE_GITHUB;
use kbsync_core::source::{ContentSource, MemoryLayout, MemorySource, SourceRegistry};

use crate::config::{Config, GitHubConfig};
use crate::connector_github::GitHubSource;

/// Registry with a constructor for every supported store type.
pub fn default_registry(github: &GitHubConfig) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    let github = github.clone();
    registry.register(STORE_TYPE_GITHUB, move |store| {
        let source: Box<dyn ContentSource> = Box::new(GitHubSource::new(store.repo(), &github)?);
        Ok(source)
    });
    registry
}

/// The memory notes source configured by `MEMORY_REPO`.
pub fn memory_source(config: &Config) -> Result<MemorySource<GitHubSource>> {
    let source = GitHubSource::new(&config.memory.repo, &config.github)?;
    let layout = MemoryLayout::new(config.memory.dir.as_str(), config.memory.extension.as_str());
    Ok(MemorySource::new(source, layout))
}
