use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Database name that selects a private in-memory store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the record store.
///
/// SQLite only uses `name` (a file path, or `:memory:`). Host, user,
/// password and port are carried for transports that need them.
#[derive(Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub name: String,
    pub port: u16,
    /// Maximum number of pooled connections
    pub pool_size: usize,
    /// How long `acquire` waits for a free connection
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn is_in_memory(&self) -> bool {
        self.name == IN_MEMORY_DATABASE
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("port", &self.port)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// keeps stdout free for command output
    Stderr,
    File { path: String },
}

impl StoreConfig {
    /// Load configuration from logstore.toml and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&StoreConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        // 1. /etc/logstore/logstore.toml (production)
        // 2. config/logstore.toml (local development)
        for path in ["/etc/logstore/logstore", "config/logstore"] {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Nested keys use a double underscore: LOGSTORE_DATABASE__POOL_SIZE
        builder = builder.add_source(
            config::Environment::with_prefix("LOGSTORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: StoreConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_db_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply the plain `DB_*` variables on top of everything else.
    pub fn apply_db_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = name;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.database.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid DB_PORT: {}", port))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.name.trim().is_empty() {
            anyhow::bail!("database.name must not be empty");
        }
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be at least 1");
        }
        if self.database.acquire_timeout_ms == 0 {
            anyhow::bail!("database.acquire_timeout_ms must be greater than 0");
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                user: String::new(),
                password: String::new(),
                name: "logstore.db".to_string(),
                port: 3306,
                pool_size: 5,
                acquire_timeout_ms: 5_000,
            },
            logging: LoggingConfig {
                level: "info,store=debug,ingest=info".to_string(),
                format: LogFormat::Pretty,
                output: LogOutput::Stderr,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.database.acquire_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_db_env_overrides() {
        let mut config = StoreConfig::default();
        config
            .apply_db_env(env(&[
                ("DB_HOST", "db.internal"),
                ("DB_USER", "logs"),
                ("DB_PASSWORD", "s3cret"),
                ("DB_NAME", ":memory:"),
                ("DB_PORT", "3307"),
            ]))
            .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.user, "logs");
        assert_eq!(config.database.password, "s3cret");
        assert!(config.database.is_in_memory());
        assert_eq!(config.database.port, 3307);
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut config = StoreConfig::default();
        assert!(config.apply_db_env(env(&[("DB_PORT", "abc")])).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let mut config = StoreConfig::default();
        config.database.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut config = StoreConfig::default();
        config.database.name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = StoreConfig::default();
        config.database.password = "hunter2".to_string();
        let rendered = format!("{:?}", config.database);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
