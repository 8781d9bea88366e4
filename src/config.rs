use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::ethereum::{options::CallOptions, sync::DEFAULT_TIMEOUT_MS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rpc_url: String,
    /// Compiled artifact to load instead of the embedded Pong artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// Network id to use instead of asking the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default)]
    pub binding: BindingConfig,
}

/// Settings shared by every binding created from one factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Receipt wait budget in milliseconds; `<= 0` waits forever.
    pub synchronization_timeout_ms: i64,
    /// Resolve writes with receipt and decoded logs instead of the bare hash.
    pub extended_results: bool,
    /// Transaction options merged under every call.
    pub defaults: CallOptions,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            synchronization_timeout_ms: DEFAULT_TIMEOUT_MS,
            extended_results: false,
            defaults: CallOptions::default(),
        }
    }
}

impl BindingConfig {
    pub fn with_timeout_ms(mut self, synchronization_timeout_ms: i64) -> Self {
        self.synchronization_timeout_ms = synchronization_timeout_ms;
        self
    }

    pub fn with_extended_results(mut self, extended_results: bool) -> Self {
        self.extended_results = extended_results;
        self
    }

    pub fn with_defaults(mut self, defaults: CallOptions) -> Self {
        self.defaults = defaults;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            artifact: None,
            network: None,
            binding: BindingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    fn apply_env_vars(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `PONG_RPC_URL` and `PONG_FROM` overrides from `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(rpc_url) = lookup("PONG_RPC_URL") {
            tracing::info!("Using PONG_RPC_URL environment variable for the RPC endpoint");
            self.rpc_url = rpc_url;
        }

        if let Some(from) = lookup("PONG_FROM") {
            match crate::ethereum::utils::validate_address(&from) {
                Ok(address) => {
                    tracing::debug!("Default sender set from PONG_FROM: {}", address);
                    self.binding.defaults.from = Some(address);
                }
                Err(e) => tracing::warn!("Ignoring PONG_FROM: {}", e),
            }
        }
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("pong-pudding").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# Pong binding configuration

# JSON-RPC endpoint of the node (a local test network by default)
rpc_url = "http://localhost:8545"

# Compiled artifact; the embedded Pong artifact is used when omitted
# artifact = "artifacts/Pong.json"

# Pin the network id instead of asking the node
# network = "default"

[binding]
# How long to wait for a transaction receipt; 0 or less waits forever
synchronization_timeout_ms = 240000
# Resolve writes with { tx, receipt, logs } instead of the bare hash
extended_results = false

# Options merged into every call; per-call options win
[binding.defaults]
# from = "0x0000000000000000000000000000000000000000"
gas = 3000000

# Environment variables that can be used:
# PONG_RPC_URL - overrides rpc_url
# PONG_FROM - overrides binding.defaults.from
"#;
        sample_config.to_string()
    }
}
