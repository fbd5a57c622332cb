//! `kbsync memory list`.

use anyhow::Result;

use kbsync_core::models::Memory;
use kbsync_core::store::MemoryRepository;

use crate::config::Config;
use crate::db;
use crate::pg_store::PgMemoryRepository;

pub async fn run_memory_list(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    let memories = PgMemoryRepository::new(pool.clone(), &config.db, config.embedding.dims);
    let listed = memories.list_memories().await;
    pool.close().await;

    for line in memory_lines(&listed?) {
        println!("{}", line);
    }
    Ok(())
}

fn memory_lines(memories: &[Memory]) -> Vec<String> {
    if memories.is_empty() {
        return vec!["No memories found".to_string()];
    }
    memories
        .iter()
        .map(|m| {
            let created = m
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let tags = if m.tags.is_empty() {
                String::new()
            } else {
                format!("  [{}]", m.tags.join(", "))
            };
            format!("{}  {}{}", created, m.path, tags)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_memory_lines() {
        let mut m = Memory::new("people/alice", "likes tea", Utc::now());
        m.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 15, 0).unwrap());
        m.tags = vec!["pref".to_string()];
        assert_eq!(memory_lines(&[m]), vec!["2024-05-01 09:15  people/alice  [pref]"]);
    }

    #[test]
    fn test_memory_lines_empty() {
        assert_eq!(memory_lines(&[]), vec!["No memories found"]);
    }
}
