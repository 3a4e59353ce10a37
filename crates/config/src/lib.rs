//! Configuration loading, validation, and management for Neutro.
//!
//! Loads configuration from `~/.neutro/config.toml` with environment
//! variable overrides. Validates all settings at startup. The completion
//! credential is only ever read from the file or the environment.

pub mod persona;

pub use persona::{PersonaConfig, PersonaKind};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.neutro/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bearer credential for the completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default completion provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Base URL override for the default provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Upper bound on a single completion call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How many stored turns are sent with each request (and kept)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// `HTTP-Referer` header sent to the endpoint
    #[serde(default = "default_referer")]
    pub referer: String,

    /// Default `X-Title` header sent to the endpoint
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Persona used when a request names none
    #[serde(default = "default_persona")]
    pub default_persona: String,

    /// Persona presets keyed by name; merged over the built-ins
    #[serde(default)]
    pub personas: HashMap<String, PersonaConfig>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Financial ledger source
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "google/gemini-2.0-pro-exp-02-05:free".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_history_limit() -> usize {
    10
}
fn default_referer() -> String {
    "http://localhost:3000".into()
}
fn default_app_title() -> String {
    "Neutro".into()
}
fn default_persona() -> String {
    "finance".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("history_limit", &self.history_limit)
            .field("referer", &self.referer)
            .field("app_title", &self.app_title)
            .field("default_persona", &self.default_persona)
            .field("personas", &self.personas.keys().collect::<Vec<_>>())
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("ledger", &self.ledger)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Directory served for every path not matched by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,

    /// CORS origins; empty means same-origin only
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            static_dir: None,
            allowed_origins: vec![],
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Which session persistence backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Sessions are never saved
    None,
    /// Saved in process memory
    #[default]
    Memory,
    /// Appended to a JSONL file
    File,
    /// Saved in a local SQLite database
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// File or database path; defaults under the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Resolved path for file-backed stores.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let file = match self.backend {
            StoreBackend::Sqlite => "sessions.db",
            _ => "sessions.jsonl",
        };
        AppConfig::config_dir().join(file)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON file with profiles, transactions and savings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.neutro/config.toml).
    ///
    /// Environment variables:
    /// - `NEUTRO_API_KEY`, then `OPENROUTER_API_KEY` (when the file sets no key)
    /// - `NEUTRO_MODEL`, `NEUTRO_BASE_URL`, `NEUTRO_PORT` (always win)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("NEUTRO_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .filter(|k| !k.trim().is_empty());
        }

        if let Some(model) = lookup("NEUTRO_MODEL") {
            self.default_model = model;
        }

        if let Some(url) = lookup("NEUTRO_BASE_URL") {
            self.base_url = Some(url);
        }

        if let Some(port) = lookup("NEUTRO_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".neutro")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "history_limit must be at least 1".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be at least 1".into(),
            ));
        }

        if self.persona(&self.default_persona).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "default_persona '{}' is not defined",
                self.default_persona
            )));
        }

        for (name, persona) in &self.personas {
            if persona.fallback_message.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "persona '{name}' has an empty fallback_message"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The credential, or a configuration error when none is set.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or_else(|| {
            ConfigError::MissingCredential(
                "set api_key in config.toml or NEUTRO_API_KEY / OPENROUTER_API_KEY".into(),
            )
        })
    }

    /// Resolve a persona by name: configured entries first, then built-ins.
    pub fn persona(&self, name: &str) -> Option<PersonaConfig> {
        if let Some(persona) = self.personas.get(name) {
            return Some(persona.clone());
        }
        match name {
            "finance" => Some(PersonaConfig::finance()),
            "tutor" => Some(PersonaConfig::tutor()),
            _ => None,
        }
    }

    /// Every resolvable persona name, sorted.
    pub fn persona_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.personas.keys().cloned().collect();
        for builtin in ["finance", "tutor"] {
            if !self.personas.contains_key(builtin) {
                names.push(builtin.into());
            }
        }
        names.sort();
        names
    }

    /// Model for a persona, honouring its override.
    pub fn model_for(&self, persona: &PersonaConfig) -> String {
        persona
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            base_url: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            history_limit: default_history_limit(),
            referer: default_referer(),
            app_title: default_app_title(),
            default_persona: default_persona(),
            personas: HashMap::new(),
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            ledger: LedgerConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing API credential: {0}")]
    MissingCredential(String),
}

impl From<ConfigError> for neutro_core::Error {
    fn from(err: ConfigError) -> Self {
        neutro_core::Error::Config {
            message: err.to_string(),
        }
    }
}
