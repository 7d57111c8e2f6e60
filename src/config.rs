//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `GLYCOTRACK_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reading store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Load the sample food catalog into an empty database
    #[serde(default = "default_true")]
    pub seed_foods: bool,
}

fn default_db_path() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("glycotrack")
                .join("glycotrack.db")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./glycotrack_data/glycotrack.db".to_string())
}

fn default_true() -> bool {
    true
}

impl StoreConfig {
    /// Database path with a leading `~/` expanded
    pub fn resolved_db_path(&self) -> PathBuf {
        match (self.db_path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.db_path),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            seed_foods: true,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Forecaster and classifier endpoints
///
/// With no `classifier_url` the built-in rule classifier is used. With no
/// `forecaster_url` forecasting reports the model as unavailable.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub forecaster_url: Option<String>,

    pub classifier_url: Option<String>,

    #[serde(default = "default_model_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_model_timeout() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            forecaster_url: None,
            classifier_url: None,
            request_timeout_ms: default_model_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Chat assistant configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_llm_url")]
    pub llm_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Exchanges replayed to the model on each message
    #[serde(default = "default_history_exchanges")]
    pub history_exchanges: usize,

    pub guide_path: Option<String>,

    /// Per-request timeout for the LLM runtime
    #[serde(default = "default_chat_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_history_exchanges() -> usize {
    8
}

fn default_chat_timeout() -> u64 {
    60_000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            llm_url: default_llm_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            history_exchanges: default_history_exchanges(),
            guide_path: None,
            request_timeout_ms: default_chat_timeout(),
            enabled: true,
        }
    }
}

/// Daily metrics recompute schedule
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

fn default_interval_hours() -> u64 {
    24
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: default_interval_hours(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::search_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Candidate config files, in lookup order
    pub fn search_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("glycotrack").join("config.toml")),
            Some(PathBuf::from("/etc/glycotrack/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        // Store
        if let Some(path) = var("GLYCOTRACK_DB_PATH") {
            self.store.db_path = path;
        }

        // API
        if let Some(host) = var("GLYCOTRACK_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("GLYCOTRACK_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }

        // Models
        if let Some(url) = var("GLYCOTRACK_FORECASTER_URL") {
            self.models.forecaster_url = Some(url);
        }
        if let Some(url) = var("GLYCOTRACK_CLASSIFIER_URL") {
            self.models.classifier_url = Some(url);
        }

        // Chat
        if let Some(url) = var("GLYCOTRACK_LLM_URL") {
            self.chat.llm_url = url;
        }
        if let Some(model) = var("GLYCOTRACK_LLM_MODEL") {
            self.chat.model = model;
        }
        if let Some(path) = var("GLYCOTRACK_GUIDE_PATH") {
            self.chat.guide_path = Some(path);
        }

        // Scheduler
        if let Some(enabled) = var("GLYCOTRACK_SCHEDULER_ENABLED").and_then(|v| v.parse().ok()) {
            self.scheduler.enabled = enabled;
        }

        // Logging
        if let Some(level) = var("GLYCOTRACK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("GLYCOTRACK_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# glycotrack Configuration
#
# Environment variables override these settings:
# - GLYCOTRACK_DB_PATH
# - GLYCOTRACK_API_HOST
# - GLYCOTRACK_API_PORT
# - GLYCOTRACK_FORECASTER_URL
# - GLYCOTRACK_CLASSIFIER_URL
# - GLYCOTRACK_LLM_URL
# - GLYCOTRACK_LLM_MODEL
# - GLYCOTRACK_GUIDE_PATH
# - GLYCOTRACK_SCHEDULER_ENABLED
# - GLYCOTRACK_LOG_LEVEL
# - GLYCOTRACK_LOG_FORMAT

[store]
# SQLite database file
db_path = "~/.local/share/glycotrack/glycotrack.db"

# Load the sample food catalog when the catalog is empty
seed_foods = true

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8000

# Allowed CORS origins; an empty list or "*" allows any origin
cors_origins = ["http://localhost:8000", "http://127.0.0.1:8000"]

# Request timeout in seconds; must cover a slow chat answer
request_timeout_secs = 120

[models]
# Forecasting model server. Forecasts return 503 when unset.
# forecaster_url = "http://localhost:8501"

# Cluster model server. The built-in rule classifier is used when unset.
# classifier_url = "http://localhost:8502"

# Per-request timeout (ms)
request_timeout_ms = 10000

# Retries for transient failures (connection errors, 5xx, 429)
max_retries = 3

[chat]
# Enable the chat assistant
enabled = true

# LLM runtime (Ollama API)
llm_url = "http://localhost:11434"
model = "llama3.2:3b"
temperature = 0.3

# Exchanges replayed to the model on each message
history_exchanges = 8

# Optional plain-text reference guide used as context
# guide_path = "/var/lib/glycotrack/guide.txt"

# Per-request timeout for the LLM (ms)
request_timeout_ms = 60000

[scheduler]
# Recompute the previous day's metrics for every patient
enabled = true
interval_hours = 24

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/glycotrack/glycotrack.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_template_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.chat.history_exchanges, 8);
        assert!(config.models.forecaster_url.is_none());
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.interval_hours, 24);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::parse(
            r#"
[models]
forecaster_url = "http://models:8501"

[scheduler]
enabled = false
"#,
        )
        .unwrap();

        assert_eq!(config.models.forecaster_url.as_deref(), Some("http://models:8501"));
        assert_eq!(config.models.max_retries, 3);
        assert!(!config.scheduler.enabled);
        assert_eq!(config.scheduler.interval_hours, 24);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.store.seed_foods);
    }

    #[test]
    fn test_db_path_expansion() {
        let store = StoreConfig {
            db_path: "/tmp/g.db".to_string(),
            seed_foods: false,
        };
        assert_eq!(store.resolved_db_path(), PathBuf::from("/tmp/g.db"));

        let store = StoreConfig {
            db_path: "~/g.db".to_string(),
            seed_foods: false,
        };
        if let Some(home) = dirs::home_dir() {
            assert_eq!(store.resolved_db_path(), home.join("g.db"));
        }
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        let mut file = std::fs::File::create(&bad).unwrap();
        writeln!(file, "[api]\nport = \"not a number\"").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::Parse { .. })));
    }
}
