//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Directory uploaded product images are stored under.
    pub asset_root: PathBuf,
    /// Public URL prefix that maps onto `asset_root`.
    pub asset_base_url: String,
    pub nats_url: Option<String>,
    pub session_ttl_hours: i64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("asset_root", &self.asset_root)
            .field("asset_base_url", &self.asset_base_url)
            .field("nats_url", &self.nats_url.as_ref().map(|_| "[redacted]"))
            .field("session_ttl_hours", &self.session_ttl_hours)
            .finish()
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Builds the configuration from an env-var lookup function so parsing can
    /// be tested without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let or_default = |var: &str, default: &str| lookup(var).unwrap_or_else(|_| default.to_string());

        let database_url = lookup("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".into()))?;
        let bind_addr = parse_value("BIND_ADDR", &or_default("BIND_ADDR", "0.0.0.0:8083"))?;
        let log_level = or_default("LOG_LEVEL", "info");
        let db_max_connections = parse_value("DB_MAX_CONNECTIONS", &or_default("DB_MAX_CONNECTIONS", "10"))?;
        let db_acquire_timeout_secs = parse_value("DB_ACQUIRE_TIMEOUT_SECS", &or_default("DB_ACQUIRE_TIMEOUT_SECS", "10"))?;
        let asset_root = PathBuf::from(or_default("ASSET_ROOT", "./uploads"));
        let asset_base_url = or_default("ASSET_BASE_URL", "/uploads").trim_end_matches('/').to_string();
        let nats_url = lookup("NATS_URL").ok().filter(|v| !v.trim().is_empty());
        let session_ttl_hours: i64 = parse_value("SESSION_TTL_HOURS", &or_default("SESSION_TTL_HOURS", "168"))?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: "SESSION_TTL_HOURS".into(),
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            database_url,
            bind_addr,
            log_level,
            db_max_connections,
            db_acquire_timeout_secs,
            asset_root,
            asset_base_url,
            nats_url,
            session_ttl_hours,
        })
    }
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}
