//! Server configuration loading from file and environment variables.

use agrivoice_advisor::gemini::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};
use agrivoice_advisor::translate::DEFAULT_TRANSLATE_ENDPOINT;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Path tried when neither the command line nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "agrivoice.toml";

/// Whisper model sizes that `WHISPER_MODEL` may name instead of a path.
const WHISPER_MODEL_SIZES: [&str; 5] = ["tiny", "base", "small", "medium", "large"];

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Artifact directories and their retention.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Request limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Speech recognition engine.
    #[serde(default)]
    pub stt: SttConfig,

    /// Speech synthesis engine.
    #[serde(default)]
    pub tts: TtsConfig,

    /// Advice language model.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Translation service.
    #[serde(default)]
    pub translation: TranslationConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "agrivoice_pipeline=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    #[serde(default = "default_responses_dir")]
    pub responses_dir: PathBuf,

    /// Age after which an artifact is swept.
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,

    /// Period of the background sweep. 0 disables it; `/cleanup` still works.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted recording, in bytes.
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_whisper_binary")]
    pub binary_path: PathBuf,

    /// ggml model file passed to whisper.cpp.
    #[serde(default = "default_whisper_model")]
    pub model_path: PathBuf,

    #[serde(default = "default_stt_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_gtts_binary")]
    pub binary_path: PathBuf,

    #[serde(default = "default_tts_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Gemini settings. `api_key` is never printed.
#[derive(Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_llm_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_translation_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_responses_dir() -> PathBuf {
    PathBuf::from("responses")
}

fn default_retention_seconds() -> u64 {
    3600
}

fn default_cleanup_interval_seconds() -> u64 {
    3600
}

fn default_max_audio_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_whisper_binary() -> PathBuf {
    PathBuf::from("whisper-cli")
}

fn default_whisper_model() -> PathBuf {
    PathBuf::from("models/ggml-base.bin")
}

fn default_stt_timeout_seconds() -> u64 {
    120
}

fn default_gtts_binary() -> PathBuf {
    PathBuf::from("gtts-cli")
}

fn default_tts_timeout_seconds() -> u64 {
    60
}

fn default_llm_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_llm_timeout_seconds() -> u64 {
    30
}

fn default_translation_endpoint() -> String {
    DEFAULT_TRANSLATE_ENDPOINT.to_string()
}

fn default_translation_timeout_seconds() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            responses_dir: default_responses_dir(),
            retention_seconds: default_retention_seconds(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

impl StorageConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_audio_bytes: default_max_audio_bytes(),
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            binary_path: default_whisper_binary(),
            model_path: default_whisper_model(),
            timeout_seconds: default_stt_timeout_seconds(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            binary_path: default_gtts_binary(),
            timeout_seconds: default_tts_timeout_seconds(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: String::new(),
            timeout_seconds: default_llm_timeout_seconds(),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "[REDACTED]"
        };
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &key)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_translation_endpoint(),
            timeout_seconds: default_translation_timeout_seconds(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `AGRIVOICE_HOST`, `AGRIVOICE_PORT` override `server.*`
/// - `AGRIVOICE_LOG_LEVEL`, `AGRIVOICE_LOG_JSON` override `logging.*`
/// - `AGRIVOICE_UPLOADS_DIR`, `AGRIVOICE_RESPONSES_DIR` override the artifact directories
/// - `CLEANUP_INTERVAL` overrides `storage.cleanup_interval_seconds`
/// - `MAX_AUDIO_SIZE` overrides `limits.max_audio_bytes`
/// - `WHISPER_BINARY`, `WHISPER_MODEL` override `stt.*` (a bare size such as
///   `small` expands to `models/ggml-small.bin`)
/// - `GTTS_BINARY` overrides `tts.binary_path`
/// - `GEMINI_API_KEY`, `GEMINI_MODEL` override `llm.*`
/// - `TRANSLATE_ENDPOINT` overrides `translation.endpoint`
///
/// Loading runs before logging is set up, so nothing is logged here; the
/// returned [`ConfigOrigin`] tells the caller whether the file was used.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<(Config, ConfigOrigin), ConfigError> {
    let (mut config, origin) = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => (toml::from_str(&contents)?, ConfigOrigin::File),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Config::default(), ConfigOrigin::Defaults)
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => (Config::default(), ConfigOrigin::Defaults),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok((config, origin))
}

/// Where the base configuration came from, before env overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    /// No file was given or it does not exist.
    Defaults,
}

/// Applies overrides from `lookup`, skipping values that fail to parse.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(parsed) = lookup("AGRIVOICE_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = lookup("AGRIVOICE_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(level) = lookup("AGRIVOICE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("AGRIVOICE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(dir) = lookup("AGRIVOICE_UPLOADS_DIR") {
        config.storage.uploads_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup("AGRIVOICE_RESPONSES_DIR") {
        config.storage.responses_dir = PathBuf::from(dir);
    }
    if let Some(parsed) = lookup("CLEANUP_INTERVAL").and_then(|v| v.parse().ok()) {
        config.storage.cleanup_interval_seconds = parsed;
    }
    if let Some(parsed) = lookup("MAX_AUDIO_SIZE").and_then(|v| v.parse().ok()) {
        config.limits.max_audio_bytes = parsed;
    }
    if let Some(binary) = lookup("WHISPER_BINARY") {
        config.stt.binary_path = PathBuf::from(binary);
    }
    if let Some(model) = lookup("WHISPER_MODEL") {
        config.stt.model_path = whisper_model_path(&model);
    }
    if let Some(binary) = lookup("GTTS_BINARY") {
        config.tts.binary_path = PathBuf::from(binary);
    }
    if let Some(key) = lookup("GEMINI_API_KEY") {
        config.llm.api_key = key;
    }
    if let Some(model) = lookup("GEMINI_MODEL") {
        config.llm.model = model;
    }
    if let Some(endpoint) = lookup("TRANSLATE_ENDPOINT") {
        config.translation.endpoint = endpoint;
    }
}

fn whisper_model_path(value: &str) -> PathBuf {
    let trimmed = value.trim();
    if WHISPER_MODEL_SIZES.contains(&trimmed) {
        PathBuf::from(format!("models/ggml-{}.bin", trimmed))
    } else {
        PathBuf::from(trimmed)
    }
}
