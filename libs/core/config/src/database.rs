use crate::{env_parse, env_required, ConfigError, FromEnv};

/// PostgreSQL connection settings
///
/// Only the URL is required. Pool sizing defaults are kept small because the
/// redemption worker runs a fixed number of pipelines at a time.
#[derive(Clone, Debug)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            min_connections: 2,
            connect_timeout_secs: 8,
        }
    }
}

impl FromEnv for PostgresConfig {
    /// Reads:
    /// - `DATABASE_URL` (required)
    /// - `DB_MAX_CONNECTIONS` (default: 20)
    /// - `DB_MIN_CONNECTIONS` (default: 2)
    /// - `DB_CONNECT_TIMEOUT_SECS` (default: 8)
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::new(env_required("DATABASE_URL")?);

        Ok(Self {
            max_connections: env_parse("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_parse("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout_secs: env_parse(
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            )?,
            ..defaults
        })
    }
}
