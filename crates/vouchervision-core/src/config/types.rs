//! Sub-configuration structs with defaults matching the public VoucherVision service.

use crate::auth::AuthMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Public VoucherVision endpoint used when no server is configured.
pub const DEFAULT_SERVER_URL: &str = "https://vouchervision-go-738307415303.us-central1.run.app";

/// Remote service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the VoucherVision service (no trailing endpoint path)
    pub url: String,

    /// Per-image request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            // LLM extraction with several OCR engines routinely takes minutes
            timeout_ms: 300_000,
        }
    }
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of images in flight at once
    pub max_workers: usize,

    /// Image extensions picked up in directory mode
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            supported_formats: ["jpg", "jpeg", "png", "tif", "tiff", "webp", "gif", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Defaults for what the server is asked to do with each image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    /// OCR engines, in priority order
    pub engines: Vec<String>,

    /// Prompt template name (e.g. "SLTPvM_default.yaml")
    pub prompt: String,

    /// LLM model override; empty means the server default
    pub llm_model: String,

    /// Skip the LLM stage and return OCR text only
    pub ocr_only: bool,

    /// Download URL images locally and upload them to `/process`
    /// instead of asking the server to fetch them via `/process-url`
    pub upload_remote_images: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            engines: vec!["gemini-1.5-pro".to_string(), "gemini-2.0-flash".to_string()],
            prompt: "SLTPvM_default.yaml".to_string(),
            llm_model: String::new(),
            ocr_only: false,
            upload_remote_images: false,
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token or API key. `${VAR}` is expanded from the environment.
    pub credential: String,

    /// How the credential is sent: auto-detected, bearer, or api_key
    pub mode: AuthMode,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credential: "${VV_API_KEY}".to_string(),
            mode: AuthMode::Auto,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for the CSV and per-image JSON files
    pub dir: PathBuf,

    /// Write the aggregated CSV report
    pub save_to_csv: bool,

    /// Write one JSON file per successful image
    pub save_json: bool,

    /// File name of the CSV report inside `dir`
    pub csv_file_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
            save_to_csv: true,
            save_json: true,
            csv_file_name: "results.csv".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
