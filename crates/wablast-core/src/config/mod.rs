mod defaults;


use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BlastError;
use defaults::*;

/// Top-level wablast configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub blast: BlastConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlastConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Root for logs, staged media, and the settings file.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BlastConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl BlastConfig {
    /// Expanded data directory.
    pub fn data_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(shellexpand(&self.data_dir))
    }
}

/// HTTP API consumed by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for API authentication. Empty = no auth (for local-only use).
    #[serde(default)]
    pub api_key: String,
    /// Request body cap, sized for media uploads.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

/// SQLite storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// WhatsApp bridge connection.
///
/// The bridge runs the WhatsApp Web session and pushes lifecycle events
/// to `POST /api/whatsapp/events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// Bearer token sent to the bridge. Empty = none.
    #[serde(default)]
    pub bridge_token: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            bridge_token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// How a batch is fanned out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// All attempts start together (default).
    #[default]
    Parallel,
    /// One attempt at a time, pausing `messageDelay` seconds in between.
    Sequential,
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub mode: DispatchMode,
    /// Upper bound for one send attempt.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    /// Parallel mode only. 0 = unbounded.
    #[serde(default)]
    pub max_concurrency: usize,
    /// Run at most one batch at a time against the shared session.
    #[serde(default = "default_true")]
    pub serialize_batches: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            send_timeout_secs: default_send_timeout_secs(),
            max_concurrency: 0,
            serialize_batches: true,
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, BlastError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| BlastError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| BlastError::Config(format!("failed to parse config: {}", e)))?;

    if config.whatsapp.bridge_url.trim().is_empty() {
        return Err(BlastError::Config("whatsapp.bridge_url must not be empty".into()));
    }
    if config.dispatch.send_timeout_secs == 0 {
        return Err(BlastError::Config(
            "dispatch.send_timeout_secs must be at least 1".into(),
        ));
    }

    Ok(config)
}
