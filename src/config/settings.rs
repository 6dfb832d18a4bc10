//! Process settings from the environment (after `dotenvy::dotenv()`).

use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    /// When set the PostgreSQL store is used, otherwise the in-memory store.
    pub database_url: Option<String>,
    /// models.json, or a directory containing it.
    pub config_path: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub body_limit: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Load(format!("DB_MAX_CONNECTIONS: invalid number '{}'", v)))?,
            None => 5,
        };
        let body_limit = match get("BODY_LIMIT_BYTES") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Load(format!("BODY_LIMIT_BYTES: invalid number '{}'", v)))?,
            None => DEFAULT_BODY_LIMIT,
        };
        Ok(Settings {
            database_url: get("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            config_path: get("CONFIG_PATH").unwrap_or_else(|| "models.json".into()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            max_connections,
            body_limit,
        })
    }
}
