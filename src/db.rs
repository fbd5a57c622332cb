use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DbConfig;

pub async fn connect(config: &DbConfig) -> Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.timeout_secs))
        .connect_with(options)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to database '{}' at {}:{}",
                config.name, config.host, config.port
            )
        })?;

    Ok(pool)
}
