//! Outbound request construction for the `/process` and `/process-url` endpoints.
//!
//! Local files go out as multipart uploads with the file streamed from disk;
//! URLs go out as a JSON body and the server fetches the image itself. Every
//! request carries the engine list, the prompt name, optional overrides, and
//! the auth headers chosen by the configured [`AuthStrategy`].

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::auth::AuthStrategy;
use crate::config::Config;
use crate::error::{ItemError, ItemResult, Result, VoucherError};
use crate::source::{SourceKind, WorkItem};

/// Endpoint for multipart uploads.
pub const PROCESS_PATH: &str = "/process";
/// Endpoint for server-side image fetching.
pub const PROCESS_URL_PATH: &str = "/process-url";

/// Batch-wide request settings. Immutable once a batch starts.
#[derive(Clone)]
pub struct RequestConfig {
    /// Base URL of the service, without a trailing slash
    pub server_url: String,
    /// OCR engines, first occurrence wins on duplicates
    pub engines: Vec<String>,
    /// Prompt template name
    pub prompt: String,
    pub llm_model: Option<String>,
    pub ocr_only: bool,
    /// Bearer token or API key
    pub auth_credential: String,
    /// Download URL items and upload them instead of using `/process-url`
    pub upload_remote_images: bool,
}

impl RequestConfig {
    /// Build request settings with normalized server URL and engine list.
    pub fn new(
        server_url: &str,
        engines: &[String],
        prompt: &str,
        auth_credential: impl Into<String>,
    ) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(engines.len());
        for engine in engines.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            if !normalized.iter().any(|seen| seen == engine) {
                normalized.push(engine.to_string());
            }
        }

        Self {
            server_url: server_url.trim().trim_end_matches('/').to_string(),
            engines: normalized,
            prompt: prompt.trim().to_string(),
            llm_model: None,
            ocr_only: false,
            auth_credential: auth_credential.into(),
            upload_remote_images: false,
        }
    }

    /// Request settings from the loaded configuration and a resolved credential.
    pub fn from_config(config: &Config, auth_credential: impl Into<String>) -> Self {
        let mut request = Self::new(
            &config.server.url,
            &config.request.engines,
            &config.request.prompt,
            auth_credential,
        );
        request.llm_model = config.llm_model().map(String::from);
        request.ocr_only = config.request.ocr_only;
        request.upload_remote_images = config.request.upload_remote_images;
        request
    }

    /// Batch-level checks, run before anything is dispatched.
    pub fn validate(&self) -> Result<()> {
        if self.auth_credential.trim().is_empty() {
            return Err(VoucherError::MissingCredential);
        }
        if self.engines.is_empty() {
            return Err(VoucherError::InvalidInput(
                "at least one OCR engine is required".to_string(),
            ));
        }
        if self.prompt.is_empty() {
            return Err(VoucherError::InvalidInput(
                "a prompt name is required".to_string(),
            ));
        }
        if url::Url::parse(&self.server_url).is_err() {
            return Err(VoucherError::InvalidInput(format!(
                "server URL '{}' is not a valid URL",
                self.server_url
            )));
        }
        Ok(())
    }

    /// Full URL of an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("server_url", &self.server_url)
            .field("engines", &self.engines)
            .field("prompt", &self.prompt)
            .field("llm_model", &self.llm_model)
            .field("ocr_only", &self.ocr_only)
            .field("auth_credential", &"<redacted>")
            .field("upload_remote_images", &self.upload_remote_images)
            .finish()
    }
}

/// JSON body for `/process-url`.
#[derive(Serialize)]
struct ProcessUrlBody<'a> {
    image_url: &'a str,
    engines: &'a [String],
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    llm_model: Option<&'a str>,
    #[serde(skip_serializing_if = "is_false")]
    ocr_only: bool,
}

/// Builds one HTTP request per work item.
pub struct RequestBuilder {
    client: reqwest::Client,
    config: Arc<RequestConfig>,
    auth: Arc<dyn AuthStrategy>,
    timeout_ms: u64,
}

impl RequestBuilder {
    pub fn new(
        client: reqwest::Client,
        config: Arc<RequestConfig>,
        auth: Arc<dyn AuthStrategy>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            client,
            config,
            auth,
            timeout_ms,
        }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Build the request for one work item, ready to `send()`.
    ///
    /// Opening a local file (or downloading a remote image in upload mode)
    /// happens here, so an unreadable file fails this item only.
    pub async fn build(&self, item: &WorkItem) -> ItemResult<reqwest::RequestBuilder> {
        let request = match item.source_kind {
            SourceKind::LocalFile => self.local_file(item).await?,
            SourceKind::Url if self.config.upload_remote_images => {
                self.remote_upload(item).await?
            }
            SourceKind::Url => self.image_url(item),
        };
        Ok(self
            .auth
            .headers(&self.config.auth_credential)
            .apply(request))
    }

    async fn local_file(&self, item: &WorkItem) -> ItemResult<reqwest::RequestBuilder> {
        let path = Path::new(&item.location);
        let unreadable = |e: std::io::Error| ItemError::FileUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let file = tokio::fs::File::open(path).await.map_err(unreadable)?;
        let metadata = file.metadata().await.map_err(unreadable)?;
        if !metadata.is_file() {
            return Err(ItemError::FileUnreadable {
                path: path.to_path_buf(),
                message: "not a regular file".to_string(),
            });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| item.display_name.clone());
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, metadata.len())
            .file_name(file_name)
            .mime_str(&guess_mime(path))
            .map_err(|e| ItemError::Network(e.to_string()))?;

        tracing::debug!(
            "Uploading {} ({} bytes) to {}",
            item.display_name,
            metadata.len(),
            PROCESS_PATH
        );
        Ok(self.multipart(part))
    }

    /// Fetch a remote image client-side and upload it like a local file.
    async fn remote_upload(&self, item: &WorkItem) -> ItemResult<reqwest::RequestBuilder> {
        tracing::debug!("Downloading {} for upload", item.location);
        let resp = self
            .client
            .get(&item.location)
            .send()
            .await
            .map_err(|e| ItemError::from_transport(&e, self.timeout_ms))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ItemError::Remote {
                status: status.as_u16(),
                message: format!("image download from {} failed", item.location),
            });
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ItemError::from_transport(&e, self.timeout_ms))?;

        let part = Part::bytes(bytes.to_vec())
            .file_name(item.display_name.clone())
            .mime_str(&guess_mime(Path::new(&item.display_name)))
            .map_err(|e| ItemError::Network(e.to_string()))?;
        Ok(self.multipart(part))
    }

    fn multipart(&self, file: Part) -> reqwest::RequestBuilder {
        let mut form = Form::new().part("file", file);
        for engine in &self.config.engines {
            form = form.text("engines", engine.clone());
        }
        form = form.text("prompt", self.config.prompt.clone());
        if let Some(model) = &self.config.llm_model {
            form = form.text("llm_model", model.clone());
        }
        if self.config.ocr_only {
            form = form.text("ocr_only", "true");
        }

        self.client
            .post(self.config.endpoint(PROCESS_PATH))
            .multipart(form)
    }

    fn image_url(&self, item: &WorkItem) -> reqwest::RequestBuilder {
        let body = ProcessUrlBody {
            image_url: &item.location,
            engines: &self.config.engines,
            prompt: &self.config.prompt,
            llm_model: self.config.llm_model.as_deref(),
            ocr_only: self.config.ocr_only,
        };
        tracing::debug!("Submitting {} to {}", item.location, PROCESS_URL_PATH);
        // .json() sets Content-Type: application/json
        self.client
            .post(self.config.endpoint(PROCESS_URL_PATH))
            .json(&body)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// MIME type from the file extension; specimen images default to JPEG.
fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "image/jpeg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthMode, HeuristicAuth};

    fn request_config() -> RequestConfig {
        RequestConfig::new(
            "http://127.0.0.1:9/",
            &["gemini-1.5-pro".to_string(), "gemini-2.0-flash".to_string()],
            "SLTPvM_default.yaml",
            "test-key",
        )
    }

    fn builder(config: RequestConfig) -> RequestBuilder {
        RequestBuilder::new(
            reqwest::Client::new(),
            Arc::new(config),
            Arc::new(HeuristicAuth),
            1000,
        )
    }

    fn url_item(url: &str) -> WorkItem {
        WorkItem {
            index: 0,
            source_kind: SourceKind::Url,
            location: url.to_string(),
            display_name: "img.jpg".to_string(),
        }
    }

    #[test]
    fn test_new_normalizes_url_and_engines() {
        let config = RequestConfig::new(
            " https://example.org/ ",
            &[
                "a".to_string(),
                " ".to_string(),
                "b".to_string(),
                "a".to_string(),
            ],
            "prompt.yaml",
            "key",
        );
        assert_eq!(config.server_url, "https://example.org");
        assert_eq!(config.engines, vec!["a", "b"]);
        assert_eq!(config.endpoint(PROCESS_PATH), "https://example.org/process");
    }

    #[test]
    fn test_validate_requires_credential() {
        let mut config = request_config();
        config.auth_credential = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(VoucherError::MissingCredential)
        ));
    }

    #[test]
    fn test_validate_requires_engines() {
        let config = RequestConfig::new("http://localhost", &[], "p.yaml", "key");
        assert!(matches!(
            config.validate(),
            Err(VoucherError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let debug = format!("{:?}", request_config());
        assert!(!debug.contains("test-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_from_config_applies_overrides() {
        let mut config = Config::default();
        config.request.llm_model = "gemini-2.5-pro".to_string();
        config.request.ocr_only = true;
        let request = RequestConfig::from_config(&config, "key");
        assert_eq!(request.llm_model.as_deref(), Some("gemini-2.5-pro"));
        assert!(request.ocr_only);
        assert_eq!(request.prompt, "SLTPvM_default.yaml");
    }

    #[tokio::test]
    async fn test_url_item_targets_process_url_with_json() {
        let builder = builder(request_config());
        let request = builder
            .build(&url_item("https://example.org/img.jpg"))
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.url().as_str(), "http://127.0.0.1:9/process-url");
        assert_eq!(request.headers()["content-type"], "application/json");
        assert_eq!(request.headers()["x-api-key"], "test-key");

        let body: serde_json::Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["image_url"], "https://example.org/img.jpg");
        assert_eq!(
            body["engines"],
            serde_json::json!(["gemini-1.5-pro", "gemini-2.0-flash"])
        );
        assert_eq!(body["prompt"], "SLTPvM_default.yaml");
        assert!(body.get("llm_model").is_none());
        assert!(body.get("ocr_only").is_none());
    }

    #[tokio::test]
    async fn test_url_item_includes_optional_fields_when_set() {
        let mut config = request_config();
        config.llm_model = Some("gemini-2.5-pro".to_string());
        config.ocr_only = true;
        let request = builder(config)
            .build(&url_item("https://example.org/img.jpg"))
            .await
            .unwrap()
            .build()
            .unwrap();

        let body: serde_json::Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["llm_model"], "gemini-2.5-pro");
        assert_eq!(body["ocr_only"], true);
    }

    #[tokio::test]
    async fn test_local_file_targets_process_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specimen.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();
        let item = WorkItem {
            index: 0,
            source_kind: SourceKind::LocalFile,
            location: path.to_string_lossy().into_owned(),
            display_name: "specimen.jpg".to_string(),
        };

        let request = builder(request_config())
            .build(&item)
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://127.0.0.1:9/process");
        let content_type = request.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_missing_local_file_is_unreadable() {
        let item = WorkItem {
            index: 0,
            source_kind: SourceKind::LocalFile,
            location: "/nonexistent/ghost.jpg".to_string(),
            display_name: "ghost.jpg".to_string(),
        };
        let err = builder(request_config()).build(&item).await.unwrap_err();
        assert!(matches!(err, ItemError::FileUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_explicit_bearer_mode() {
        let builder = RequestBuilder::new(
            reqwest::Client::new(),
            Arc::new(request_config()),
            AuthMode::Bearer.strategy(),
            1000,
        );
        let request = builder
            .build(&url_item("https://example.org/img.jpg"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer test-key");
        assert!(request.headers().get("x-api-key").is_none());
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("a.png")), "image/png");
        assert_eq!(guess_mime(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("noext")), "image/jpeg");
    }
}
