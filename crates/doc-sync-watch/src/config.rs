//! Configuration loading for the file mirror.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use doc_sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Contents of the JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Base URL of the document API
    #[serde(default)]
    pub server_url: Option<String>,

    /// Connection timeout in seconds
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    /// Whole-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl WatchConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults, which are written to `config_file`
    /// for reference.
    pub fn load(config_file: &Path) -> Result<Self> {
        if config_file.exists() {
            let content = std::fs::read_to_string(config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: WatchConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", config_file))?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            return Ok(config);
        }

        tracing::info!("No config file found at {:?}, using defaults", config_file);
        let config = WatchConfig::default();

        if let Some(dir) = config_file.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
        }
        let content = serde_json::to_string_pretty(&config)?;
        std::fs::write(config_file, content)
            .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
        tracing::info!("Created default config at {:?}", config_file);

        Ok(config)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
