//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.max_workers must be > 0".into(),
            ));
        }
        if self.server.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "server.timeout_ms must be > 0".into(),
            ));
        }
        match url::Url::parse(&self.server.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ConfigError::ValidationError(format!(
                    "server.url must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
            Err(e) => {
                return Err(ConfigError::ValidationError(format!(
                    "server.url '{}' is not a valid URL: {e}",
                    self.server.url
                )));
            }
        }
        if self.request.engines.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "request.engines must name at least one engine".into(),
            ));
        }
        if self.request.prompt.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "request.prompt must not be empty".into(),
            ));
        }
        if self.output.csv_file_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "output.csv_file_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}
