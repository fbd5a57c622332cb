//! `kbsync store` commands.

use anyhow::Result;

use kbsync_core::models::{DocumentStore, RepoCoordinate, StoreId};
use kbsync_core::store::StoreRepository;

use crate::config::Config;
use crate::db;
use crate::pg_store::PgStoreRepository;

/// Register a GitHub store and print its assigned id.
pub async fn run_store_create(config: &Config, repo: &str) -> Result<()> {
    let coordinate = RepoCoordinate::parse(repo)?;
    let pool = db::connect(&config.db).await?;
    let stores = PgStoreRepository::new(pool.clone(), &config.db);

    let created = stores
        .create_store(&DocumentStore::github(StoreId(0), coordinate.to_string()))
        .await;
    pool.close().await;

    let created = created?;
    println!("Created document store with ID: {}", created.id());
    Ok(())
}

pub async fn run_store_list(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    let stores = PgStoreRepository::new(pool.clone(), &config.db);
    let listed = stores.list_stores().await;
    pool.close().await;

    for line in store_table(&listed?) {
        println!("{}", line);
    }
    Ok(())
}

fn store_table(stores: &[DocumentStore]) -> Vec<String> {
    if stores.is_empty() {
        return vec!["No document stores found".to_string()];
    }
    let mut lines = vec![format!("{:<6} {:<10} {}", "ID", "TYPE", "REPOSITORY")];
    for store in stores {
        lines.push(format!(
            "{:<6} {:<10} {}",
            store.id().0,
            store.store_type(),
            store.repo()
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_table() {
        let stores = vec![
            DocumentStore::github(StoreId(1), "octo/notes"),
            DocumentStore::github(StoreId(12), "octo/wiki"),
        ];
        let lines = store_table(&stores);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert_eq!(lines[1], "1      github     octo/notes");
        assert_eq!(lines[2], "12     github     octo/wiki");
    }

    #[test]
    fn test_store_table_empty() {
        assert_eq!(store_table(&[]), vec!["No document stores found".to_string()]);
    }
}
