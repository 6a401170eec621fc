//! CLI enum types for the process command: report format, auth mode.

use clap::ValueEnum;
use vouchervision_core::{AuthMode, OutputFormat as CoreOutputFormat};

/// Supported report export formats.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum ReportFormat {
    /// Single JSON array
    #[default]
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl From<ReportFormat> for CoreOutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Json => CoreOutputFormat::Json,
            ReportFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// How the credential is sent to the server.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum AuthModeArg {
    /// Bearer for long dotted tokens, X-API-Key otherwise
    Auto,
    /// Always `Authorization: Bearer`
    Bearer,
    /// Always `X-API-Key`
    ApiKey,
}

impl From<AuthModeArg> for AuthMode {
    fn from(mode: AuthModeArg) -> Self {
        match mode {
            AuthModeArg::Auto => AuthMode::Auto,
            AuthModeArg::Bearer => AuthMode::Bearer,
            AuthModeArg::ApiKey => AuthMode::ApiKey,
        }
    }
}
