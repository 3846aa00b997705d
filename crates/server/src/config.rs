use std::path::{Path, PathBuf};
use std::time::Duration;

use orchestrator::files::PAGECRAFT_DIR;
use orchestrator::services::openrouter::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use orchestrator::GeneratorSettings;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use utoipa::ToSchema;

pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:.pagecraft/pagecraft.db";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Project-level configuration stored in .pagecraft/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PagecraftConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct GeneratorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: None,
            max_tokens: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GeneratorConfig {
    /// Build client settings, reading the API key from the configured variable.
    pub fn settings(&self) -> GeneratorSettings {
        let api_key = std::env::var(&self.api_key_env).unwrap_or_default();
        self.settings_with_key(api_key)
    }

    pub fn settings_with_key(&self, api_key: impl Into<String>) -> GeneratorSettings {
        let defaults = GeneratorSettings::default();
        GeneratorSettings {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: api_key.into(),
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            timeout: Duration::from_secs(self.timeout_secs),
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::File,
            database_url: default_database_url(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

impl PagecraftConfig {
    pub fn path(project_path: &Path) -> PathBuf {
        project_path.join(PAGECRAFT_DIR).join(CONFIG_FILE)
    }

    /// Read config from project directory
    pub async fn read(project_path: &Path) -> Self {
        let config_path = Self::path(project_path);

        if !config_path.exists() {
            debug!(path = %config_path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(&config_path).await {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %config_path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %config_path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    /// Write config to project directory
    pub async fn write(&self, project_path: &Path) -> std::io::Result<()> {
        let config_dir = project_path.join(PAGECRAFT_DIR);
        let config_path = config_dir.join(CONFIG_FILE);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).await?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&config_path, content).await?;
        debug!(path = %config_path.display(), "Config saved successfully");

        Ok(())
    }

    /// Database URL with relative sqlite paths anchored at the project directory.
    pub fn database_url(&self, project_path: &Path) -> String {
        let url = &self.persistence.database_url;
        if url.contains(":memory:") {
            return url.clone();
        }
        match url.strip_prefix("sqlite:") {
            Some(file) if !file.starts_with('/') && !file.starts_with("//") => {
                format!("sqlite:{}", project_path.join(file).display())
            }
            _ => url.clone(),
        }
    }
}
