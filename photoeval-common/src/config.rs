//! Bootstrap configuration loading and data folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables (`PHOTOEVAL_*`)
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults are
//! used. A TOML file that exists but cannot be parsed is a configuration error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_BIND: &str = "PHOTOEVAL_BIND";
pub const ENV_DATA_FOLDER: &str = "PHOTOEVAL_DATA_FOLDER";
pub const ENV_DATABASE: &str = "PHOTOEVAL_DATABASE";
pub const ENV_STATIC_DIR: &str = "PHOTOEVAL_STATIC_DIR";
pub const ENV_OLLAMA_URL: &str = "PHOTOEVAL_OLLAMA_URL";
pub const ENV_MODEL: &str = "PHOTOEVAL_MODEL";
pub const ENV_OLLAMA_API: &str = "PHOTOEVAL_OLLAMA_API";
pub const ENV_TIMEOUT_SECS: &str = "PHOTOEVAL_TIMEOUT_SECS";
pub const ENV_MAX_CONCURRENT: &str = "PHOTOEVAL_MAX_CONCURRENT";

/// Database file name created inside the data folder
pub const DATABASE_FILE_NAME: &str = "photos.db";

/// Which model endpoint form to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelApi {
    /// `POST /api/chat` with a `messages` array
    #[default]
    Chat,
    /// `POST /api/generate` with a single `prompt`
    Generate,
}

impl FromStr for ModelApi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(ModelApi::Chat),
            "generate" => Ok(ModelApi::Generate),
            other => Err(Error::Config(format!(
                "Unknown model API '{}' (expected 'chat' or 'generate')",
                other
            ))),
        }
    }
}

/// Model endpoint settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL of the model server, without trailing path
    pub base_url: String,
    /// Model name passed in every request
    pub model: String,
    /// Endpoint form
    pub api: ModelApi,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Longest image edge sent to the model, in pixels
    pub max_image_dim: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma3:4b".to_string(),
            api: ModelApi::Chat,
            timeout_secs: 60,
            max_image_dim: 800,
        }
    }
}

impl OllamaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batch evaluation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Upper bound on concurrent model calls within one batch
    pub max_concurrent: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of the TOML config file
///
/// Every field is optional; anything omitted falls back to environment or
/// compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_address: Option<String>,
    pub data_folder: Option<PathBuf>,
    pub database_file: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub ollama: OllamaConfig,
    pub evaluation: EvaluationConfig,
    pub logging: LoggingConfig,
}

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub data_folder: Option<PathBuf>,
    pub database_file: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub ollama_url: Option<String>,
    pub model: Option<String>,
    pub api: Option<ModelApi>,
    pub timeout_secs: Option<u64>,
    pub max_concurrent: Option<usize>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub data_folder: PathBuf,
    pub database_file: PathBuf,
    pub static_dir: PathBuf,
    pub ollama: OllamaConfig,
    pub evaluation: EvaluationConfig,
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default())
    }
}

impl ServiceConfig {
    /// Resolve configuration from TOML file, environment and CLI overrides
    ///
    /// `config_path` of `None` means the platform default location.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match config_path
            .map(Path::to_path_buf)
            .or_else(default_config_path)
        {
            Some(path) => load_toml_config(&path)?.unwrap_or_default(),
            None => {
                warn!("Could not determine config directory, using defaults");
                TomlConfig::default()
            }
        };

        let mut config = Self::from_toml(toml_config);
        config.apply_env()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from TOML contents plus compiled defaults
    pub fn from_toml(toml_config: TomlConfig) -> Self {
        let data_folder = toml_config
            .data_folder
            .unwrap_or_else(default_data_folder);
        let database_file = toml_config
            .database_file
            .unwrap_or_else(|| data_folder.join(DATABASE_FILE_NAME));

        Self {
            bind_address: toml_config
                .bind_address
                .unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            data_folder,
            database_file,
            static_dir: toml_config
                .static_dir
                .unwrap_or_else(|| PathBuf::from("static")),
            ollama: toml_config.ollama,
            evaluation: toml_config.evaluation,
            logging: toml_config.logging,
        }
    }

    /// Apply `PHOTOEVAL_*` environment variables on top of current values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(bind) = env_value(ENV_BIND) {
            self.bind_address = bind;
        }

        // The database file follows the data folder unless set on its own
        let database_follows_folder =
            self.database_file == self.data_folder.join(DATABASE_FILE_NAME);
        if let Some(folder) = env_value(ENV_DATA_FOLDER) {
            self.data_folder = PathBuf::from(folder);
            if database_follows_folder {
                self.database_file = self.data_folder.join(DATABASE_FILE_NAME);
            }
        }
        if let Some(db) = env_value(ENV_DATABASE) {
            self.database_file = PathBuf::from(db);
        }
        if let Some(dir) = env_value(ENV_STATIC_DIR) {
            self.static_dir = PathBuf::from(dir);
        }
        if let Some(url) = env_value(ENV_OLLAMA_URL) {
            self.ollama.base_url = url;
        }
        if let Some(model) = env_value(ENV_MODEL) {
            self.ollama.model = model;
        }
        if let Some(api) = env_value(ENV_OLLAMA_API) {
            self.ollama.api = api.parse()?;
        }
        if let Some(secs) = env_value(ENV_TIMEOUT_SECS) {
            self.ollama.timeout_secs = parse_env(ENV_TIMEOUT_SECS, &secs)?;
        }
        if let Some(n) = env_value(ENV_MAX_CONCURRENT) {
            self.evaluation.max_concurrent = parse_env(ENV_MAX_CONCURRENT, &n)?;
        }
        Ok(())
    }

    /// Apply command-line overrides on top of current values
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind) = overrides.bind_address {
            self.bind_address = bind;
        }
        if let Some(folder) = overrides.data_folder {
            if self.database_file == self.data_folder.join(DATABASE_FILE_NAME) {
                self.database_file = folder.join(DATABASE_FILE_NAME);
            }
            self.data_folder = folder;
        }
        if let Some(db) = overrides.database_file {
            self.database_file = db;
        }
        if let Some(dir) = overrides.static_dir {
            self.static_dir = dir;
        }
        if let Some(url) = overrides.ollama_url {
            self.ollama.base_url = url;
        }
        if let Some(model) = overrides.model {
            self.ollama.model = model;
        }
        if let Some(api) = overrides.api {
            self.ollama.api = api;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.ollama.timeout_secs = secs;
        }
        if let Some(n) = overrides.max_concurrent {
            self.evaluation.max_concurrent = n;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.evaluation.max_concurrent == 0 {
            return Err(Error::Config(
                "evaluation.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.ollama.timeout_secs == 0 {
            return Err(Error::Config(
                "ollama.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.ollama.max_image_dim == 0 {
            return Err(Error::Config(
                "ollama.max_image_dim must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read and parse a TOML config file
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(Some(config))
}

/// Platform config file location: `<config dir>/photoeval/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("photoeval").join("config.toml"))
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("photoeval"))
        .unwrap_or_else(|| PathBuf::from("./photoeval_data"))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: '{}' ({})", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_api_parse() {
        assert_eq!("chat".parse::<ModelApi>().unwrap(), ModelApi::Chat);
        assert_eq!(" Generate ".parse::<ModelApi>().unwrap(), ModelApi::Generate);
        assert!("completions".parse::<ModelApi>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.ollama.api, ModelApi::Chat);
        assert_eq!(config.ollama.max_image_dim, 800);
        assert_eq!(config.evaluation.max_concurrent, 4);
        assert_eq!(config.logging.level, "info");
        assert!(config.database_file.ends_with(DATABASE_FILE_NAME));
    }

    #[test]
    fn test_database_file_follows_data_folder_override() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(ConfigOverrides {
            data_folder: Some(PathBuf::from("/srv/photos")),
            ..Default::default()
        });
        assert_eq!(config.database_file, PathBuf::from("/srv/photos/photos.db"));
    }

    #[test]
    fn test_explicit_database_file_not_moved() {
        let mut config = ServiceConfig::from_toml(TomlConfig {
            database_file: Some(PathBuf::from("/tmp/custom.db")),
            ..Default::default()
        });
        config.apply_overrides(ConfigOverrides {
            data_folder: Some(PathBuf::from("/srv/photos")),
            ..Default::default()
        });
        assert_eq!(config.database_file, PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = ServiceConfig::default();
        config.evaluation.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
