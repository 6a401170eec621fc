//! Configuration management for the VoucherVision client.
//!
//! Configuration is loaded from a TOML file in the platform config directory
//! with defaults for every field, so an absent file is a valid setup as long as
//! a credential arrives some other way (CLI flag or `VV_API_KEY`).

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote service settings
    pub server: ServerConfig,

    /// Concurrency and discovery settings
    pub processing: ProcessingConfig,

    /// Engines, prompt and model sent with every image
    pub request: RequestDefaults,

    /// Credential settings
    pub auth: AuthConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/org.vouchervision.vouchervision/config.toml
    /// - Linux: ~/.config/vouchervision/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\vouchervision\config\config.toml
    ///
    /// Falls back to ~/.vouchervision/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "vouchervision", "vouchervision")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home)
                    .join(".vouchervision")
                    .join("config.toml")
            })
    }

    /// Get the resolved output directory (with ~ expansion).
    pub fn output_dir(&self) -> PathBuf {
        let path_str = self.output.dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Full path of the CSV report.
    pub fn csv_path(&self) -> PathBuf {
        self.output_dir().join(&self.output.csv_file_name)
    }

    /// Resolve the configured credential, expanding `${VAR}` references.
    ///
    /// Returns `None` when the credential is empty or references an unset
    /// variable.
    pub fn credential(&self) -> Option<String> {
        resolve_env_var(&self.auth.credential).filter(|c| !c.trim().is_empty())
    }

    /// LLM model override, if one is configured.
    pub fn llm_model(&self) -> Option<&str> {
        Some(self.request.llm_model.as_str()).filter(|m| !m.trim().is_empty())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
