//! Repository for the singleton `configs` row.

use sqlx::PgPool;

use crate::models::configs::Configs;

const COLUMNS: &str = "\
    id, storage_host, storage_port, storage_username, storage_password, \
    broker_host, broker_port, broker_username, broker_password, broker_vhost, \
    created_at, updated_at";

pub struct ConfigsRepo;

impl ConfigsRepo {
    /// Load the stored settings, falling back to [`Configs::defaults`] when
    /// the table is empty.
    pub async fn load(pool: &PgPool) -> Result<Configs, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM configs ORDER BY created_at LIMIT 1");
        let stored = sqlx::query_as::<_, Configs>(&query)
            .fetch_optional(pool)
            .await?;

        Ok(stored.unwrap_or_else(|| {
            tracing::info!("No configs row stored, using defaults");
            Configs::defaults()
        }))
    }
}
