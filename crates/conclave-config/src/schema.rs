//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Directory holding the default config file and logs.
pub const CONFIG_DIR_NAME: &str = ".conclave";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// `~/.conclave`, if a home directory exists.
    pub fn home_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME))
    }

    /// `~/.conclave/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        Self::home_dir().map(|dir| dir.join("config.toml"))
    }

    /// Look up a provider by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// The configured default provider, falling back to the only provider
    /// when exactly one is defined.
    pub fn default_provider(&self) -> Option<(&str, &ProviderConfig)> {
        match &self.runtime.default_provider {
            Some(name) => self
                .providers
                .get_key_value(name.as_str())
                .map(|(k, v)| (k.as_str(), v)),
            None if self.providers.len() == 1 => self
                .providers
                .iter()
                .next()
                .map(|(k, v)| (k.as_str(), v)),
            None => None,
        }
    }
}

/// Limits and defaults of the agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Ceiling on live non-terminal agents.
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    /// Default wait and hand-off timeout.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,

    /// Default poll interval of `wait_for_agent`.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Grace period before a subprocess is force-terminated.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
}

impl RuntimeConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: default_max_concurrent_agents(),
            default_timeout_seconds: default_timeout_seconds(),
            poll_interval_seconds: default_poll_interval_seconds(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
            default_provider: None,
        }
    }
}

fn default_max_concurrent_agents() -> usize {
    5
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}

/// How agents built from a provider are backed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Subprocess(SubprocessProviderConfig),
    Http(HttpProviderConfig),
}

impl ProviderConfig {
    /// Model served by this provider, if configured.
    pub fn model(&self) -> Option<&str> {
        match self {
            ProviderConfig::Subprocess(c) => c.model.as_deref(),
            ProviderConfig::Http(c) => c.model.as_deref(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ProviderConfig::Subprocess(_) => "subprocess",
            ProviderConfig::Http(_) => "http",
        }
    }
}

/// An agent CLI driven over stdin/stdout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubprocessProviderConfig {
    pub executable: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// An OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            model: None,
            max_tokens: None,
            temperature: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

fn default_request_timeout_seconds() -> u64 {
    120
}

/// Periodic liveness probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval_seconds() -> u64 {
    30
}

fn default_probe_timeout_seconds() -> u64 {
    10
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,

    /// Log directory. Defaults to `~/.conclave/logs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// File name prefix of the daily rolling log.
    #[serde(default = "default_file")]
    pub file: String,
}

impl LoggingConfig {
    /// Resolved log directory.
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        self.directory
            .clone()
            .or_else(|| Config::home_dir().map(|dir| dir.join("logs")))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            file: default_file(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file() -> String {
    "conclave.log".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
