use std::str::FromStr;
use std::time::Duration;

use radiant_broker::BrokerConfig;
use radiant_core::study_status::TransitionPolicy;
use radiant_db::models::configs::Configs;

use crate::auth::jwt::JwtConfig;

/// Where study records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local; everything is lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Which message channel the publisher talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBackend {
    Amqp,
    /// In-process exchange; nothing leaves the server.
    Memory,
}

impl FromStr for BrokerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amqp" => Ok(BrokerBackend::Amqp),
            "memory" => Ok(BrokerBackend::Memory),
            other => Err(format!("unknown broker backend '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. Broker host and credentials are not here; they come from
/// the `configs` table at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for post-shutdown cleanup in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub store_backend: StoreBackend,
    /// Required when `store_backend` is `Postgres`.
    pub database_url: Option<String>,
    pub broker_backend: BrokerBackend,
    pub broker_exchange: String,
    pub broker_connect_timeout_secs: u64,
    /// How worker-reported transitions are checked.
    pub transition_policy: TransitionPolicy,
    /// Shared secret the worker must send as `x-worker-token`. Unset means
    /// the ingest endpoint is open.
    pub worker_token: Option<String>,
    /// JWT token configuration.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `HOST`                        | `0.0.0.0`               |
    /// | `PORT`                        | `3000`                  |
    /// | `CORS_ORIGINS`                | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                    |
    /// | `STORE_BACKEND`               | `postgres`              |
    /// | `DATABASE_URL`                | --                      |
    /// | `BROKER_BACKEND`              | `amqp`                  |
    /// | `BROKER_EXCHANGE`             | `studies_ex`            |
    /// | `BROKER_CONNECT_TIMEOUT_SECS` | `10`                    |
    /// | `STUDY_TRANSITION_POLICY`     | `permissive`            |
    /// | `WORKER_TOKEN`                | --                      |
    ///
    /// # Panics
    ///
    /// Panics on malformed values, or if `DATABASE_URL` is missing while
    /// the PostgreSQL store is selected.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let store_backend: StoreBackend = std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .parse()
            .unwrap_or_else(|e| panic!("STORE_BACKEND: {e}"));

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Postgres {
            assert!(
                database_url.is_some(),
                "DATABASE_URL must be set when STORE_BACKEND=postgres"
            );
        }

        let broker_backend: BrokerBackend = std::env::var("BROKER_BACKEND")
            .unwrap_or_else(|_| "amqp".into())
            .parse()
            .unwrap_or_else(|e| panic!("BROKER_BACKEND: {e}"));

        let broker_exchange = std::env::var("BROKER_EXCHANGE")
            .unwrap_or_else(|_| radiant_broker::DEFAULT_EXCHANGE.into());

        let broker_connect_timeout_secs: u64 = std::env::var("BROKER_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("BROKER_CONNECT_TIMEOUT_SECS must be a valid u64");

        let transition_policy: TransitionPolicy = std::env::var("STUDY_TRANSITION_POLICY")
            .unwrap_or_else(|_| "permissive".into())
            .parse()
            .unwrap_or_else(|e| panic!("STUDY_TRANSITION_POLICY: {e}"));

        let worker_token = std::env::var("WORKER_TOKEN").ok().filter(|s| !s.is_empty());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            store_backend,
            database_url,
            broker_backend,
            broker_exchange,
            broker_connect_timeout_secs,
            transition_policy,
            worker_token,
            jwt,
        }
    }
}

impl ServerConfig {
    /// Combine the stored broker settings with the exchange and timeout
    /// from the environment.
    pub fn broker_config(&self, configs: &Configs) -> Result<BrokerConfig, String> {
        let port = u16::try_from(configs.broker_port)
            .map_err(|_| format!("invalid broker port {}", configs.broker_port))?;

        Ok(BrokerConfig {
            host: configs.broker_host.clone(),
            port,
            username: configs.broker_username.clone(),
            password: configs.broker_password.clone(),
            vhost: configs.broker_vhost.clone(),
            exchange: self.broker_exchange.clone(),
            connect_timeout: Duration::from_secs(self.broker_connect_timeout_secs),
        })
    }
}
