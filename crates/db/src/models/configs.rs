//! Operator-maintained connection settings (singleton `configs` row).

use radiant_core::types::Timestamp;
use sqlx::FromRow;

/// Id of the singleton row.
pub const DEFAULT_CONFIGS_ID: &str = "default";

/// Broker and DICOM storage connection settings.
#[derive(Debug, Clone, FromRow)]
pub struct Configs {
    pub id: String,
    pub storage_host: String,
    pub storage_port: i32,
    pub storage_username: String,
    pub storage_password: String,
    pub broker_host: String,
    pub broker_port: i32,
    pub broker_username: String,
    pub broker_password: String,
    pub broker_vhost: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Configs {
    /// Settings used when no row has been stored yet.
    pub fn defaults() -> Self {
        let now = chrono::Utc::now();
        Self {
            id: DEFAULT_CONFIGS_ID.to_string(),
            storage_host: "http://localhost".into(),
            storage_port: 8000,
            storage_username: "orthanc".into(),
            storage_password: "orthanc".into(),
            broker_host: "localhost".into(),
            broker_port: 5672,
            broker_username: "user".into(),
            broker_password: "password".into(),
            broker_vhost: "/".into(),
            created_at: now,
            updated_at: now,
        }
    }
}
