use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::migration::TargetInfo;
use crate::names::Tag;

/// Main configuration structure for the migration master
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationMasterConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Default target controller for simulations
    pub target: TargetConfig,
    /// Watcher settings
    pub watcher: WatcherConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    pub controller_uuid: String,
    pub addrs: Vec<String>,
    pub ca_cert: String,
    pub auth_user: String,
    /// Target password (can be set via env var)
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatcherConfig {
    /// How long a new watcher waits for its feed's initial event
    pub initial_event_timeout_ms: u64,
}

impl Default for MigrationMasterConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            target: TargetConfig {
                controller_uuid: "deadbeef-0bad-400d-8000-4b1d0d06f00d".to_string(),
                addrs: vec!["127.0.0.1:17070".to_string()],
                ca_cert: "test-ca-cert".to_string(),
                auth_user: "admin".to_string(),
                password: None, // Will be read from env var
            },
            watcher: WatcherConfig {
                initial_event_timeout_ms: 5000,
            },
        }
    }
}

impl TargetConfig {
    pub fn to_target_info(&self) -> Result<TargetInfo> {
        let info = TargetInfo {
            controller_tag: Tag::controller(&self.controller_uuid)?,
            addrs: self.addrs.clone(),
            ca_cert: self.ca_cert.clone(),
            auth_tag: Tag::user(&self.auth_user)?,
            password: self.password.clone().unwrap_or_default(),
        };
        info.validate()?;
        Ok(info)
    }
}

impl MigrationMasterConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (migration-master.toml)
    /// 3. Environment variables (prefixed with MIGRATION_MASTER_)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&MigrationMasterConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("migration-master.toml").exists() {
            builder = builder.add_source(File::with_name("migration-master"));
        }

        builder = builder.add_source(
            Environment::with_prefix("MIGRATION_MASTER")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("target.addrs")
                .try_parsing(true),
        );

        let mut loaded: MigrationMasterConfig = builder.build()?.try_deserialize()?;

        if loaded.target.password.is_none() {
            if let Ok(password) = std::env::var("MIGRATION_MASTER_TARGET_PASSWORD") {
                loaded.target.password = Some(password);
            }
        }

        Ok(loaded)
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
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<MigrationMasterConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = MigrationMasterConfig::load_env_file();
        MigrationMasterConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static MigrationMasterConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
