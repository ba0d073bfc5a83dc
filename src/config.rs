use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::store::retry::RetryConfig;

/// Main configuration structure for caseflow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaseflowConfig {
    /// Remote table backend settings
    pub table: TableConfig,
    /// Retry tuning for remote reads/writes
    pub retry: RetrySettings,
    /// Snapshot cache settings
    pub cache: CacheConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Optional path to a TOML catalog overriding the built-in items
    pub catalog_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableConfig {
    /// Base URL of the values API
    pub base_url: String,
    /// Table (worksheet) identifier
    pub table_id: String,
    /// Bearer token (can be set via env var)
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    /// Attempts per remote operation before giving up
    pub max_attempts: u32,
    /// Delay before the first re-attempt; grows linearly per attempt
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// How long a table snapshot stays fresh
    pub snapshot_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level when RUST_LOG is unset
    pub log_level: String,
}

impl Default for CaseflowConfig {
    fn default() -> Self {
        Self {
            table: TableConfig {
                base_url: "http://localhost:8080".to_string(),
                table_id: "assessment-cases".to_string(),
                token: None, // Read from env var or caseflow.toml
            },
            retry: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 1000,
            },
            cache: CacheConfig {
                snapshot_ttl_seconds: 5,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
            },
            catalog_path: None,
        }
    }
}

impl CaseflowConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration file (caseflow.toml)
    /// 3. Environment variables (prefixed with CASEFLOW_)
    pub fn load() -> Result<Self> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&CaseflowConfig::default())?);

        if Path::new("caseflow.toml").exists() {
            builder = builder.add_source(File::with_name("caseflow"));
        }

        builder = builder.add_source(
            Environment::with_prefix("CASEFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut caseflow_config: CaseflowConfig = config.try_deserialize()?;

        // The token usually arrives through the environment rather than a
        // file that might get committed.
        if caseflow_config.table.token.is_none() {
            if let Ok(token) = std::env::var("CASEFLOW_TABLE_TOKEN") {
                caseflow_config.table.token = Some(token);
            }
        }

        Ok(caseflow_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        }
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.snapshot_ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CaseflowConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry_config().max_attempts, 3);
        assert_eq!(config.snapshot_ttl(), Duration::from_secs(5));
        assert!(config.table.token.is_none());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = CaseflowConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caseflow.toml");
        config.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: CaseflowConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.table.base_url, config.table.base_url);
        assert_eq!(parsed.cache.snapshot_ttl_seconds, 5);
    }

    #[test]
    fn zero_attempts_clamps_to_one() {
        let mut config = CaseflowConfig::default();
        config.retry.max_attempts = 0;
        assert_eq!(config.retry_config().max_attempts, 1);
    }
}
