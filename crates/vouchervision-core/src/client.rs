//! The batch orchestrator: enumerate, dispatch, aggregate, persist.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthStrategy;
use crate::config::Config;
use crate::error::{OutputError, Result, VoucherError};
use crate::output::save_payloads;
use crate::pool::{PoolOptions, WorkerPool};
use crate::report::{BatchReport, Outcome};
use crate::request::{RequestBuilder, RequestConfig};
use crate::source::{SourceEnumerator, SourceSpec, WorkItem};

/// Result of [`VoucherVision::process_vouchers`]: the report plus what was
/// written to disk. Write failures never discard the report.
#[derive(Debug)]
pub struct BatchRun {
    pub report: BatchReport,
    /// Path of the CSV report, when one was written
    pub csv_path: Option<PathBuf>,
    /// Per-image JSON files written
    pub json_files: Vec<PathBuf>,
    /// Persistence errors, in the order they happened
    pub write_errors: Vec<OutputError>,
}

/// VoucherVision batch client.
///
/// All batch-fatal validation (credential, engines, server URL) happens in
/// [`VoucherVision::new`], before any request is sent.
pub struct VoucherVision {
    config: Config,
    request: Arc<RequestConfig>,
    enumerator: SourceEnumerator,
    pool: WorkerPool,
}

impl VoucherVision {
    /// Create a client from configuration.
    ///
    /// `credential` overrides the configured one (e.g. from a CLI flag); when
    /// neither is set this fails with [`VoucherError::MissingCredential`].
    pub fn new(config: Config, credential: Option<String>) -> Result<Self> {
        let credential = credential
            .filter(|c| !c.trim().is_empty())
            .or_else(|| config.credential())
            .ok_or(VoucherError::MissingCredential)?;
        let request = RequestConfig::from_config(&config, credential);
        let auth = config.auth.mode.strategy();
        Self::with_strategy(config, request, auth)
    }

    /// Create a client with explicit request settings and auth strategy.
    pub fn with_strategy(
        config: Config,
        request: RequestConfig,
        auth: Arc<dyn AuthStrategy>,
    ) -> Result<Self> {
        config.validate()?;
        request.validate()?;

        let timeout_ms = config.server.timeout_ms;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(concat!("vouchervision/", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::debug!(
            "Client for {} using {} auth, engines {:?}, prompt {}",
            request.server_url,
            auth.name(),
            request.engines,
            request.prompt
        );

        let request = Arc::new(request);
        let builder = RequestBuilder::new(http, request.clone(), auth, timeout_ms);
        let pool = WorkerPool::new(
            builder,
            PoolOptions {
                max_workers: config.processing.max_workers,
                timeout_ms,
            },
        );

        Ok(Self {
            enumerator: SourceEnumerator::new(&config.processing),
            config,
            request,
            pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn request_config(&self) -> &RequestConfig {
        &self.request
    }

    /// Enumerate a source specification without sending anything.
    pub fn enumerate(&self, source: &SourceSpec) -> Result<Vec<WorkItem>> {
        self.enumerator.enumerate(source)
    }

    /// Process already-enumerated items and return the ordered report.
    pub async fn process_items<F>(&self, items: &[WorkItem], on_complete: F) -> BatchReport
    where
        F: Fn(&WorkItem, &Outcome) + Send + Sync + 'static,
    {
        let pairs = self.pool.run(items, on_complete).await;
        let report = BatchReport::aggregate(pairs, items);

        let summary = report.summary();
        if summary.failed > 0 {
            tracing::warn!("Batch finished: {summary}");
        } else {
            tracing::info!("Batch finished: {summary}");
        }
        report
    }

    /// Enumerate and process a source specification.
    ///
    /// Invalid input fails before any request is sent; per-image failures are
    /// part of the returned report.
    pub async fn process<F>(&self, source: &SourceSpec, on_complete: F) -> Result<BatchReport>
    where
        F: Fn(&WorkItem, &Outcome) + Send + Sync + 'static,
    {
        let items = self.enumerate(source)?;
        tracing::info!("Found {} image(s) to process", items.len());
        Ok(self.process_items(&items, on_complete).await)
    }

    /// Write the report to the configured output directory.
    pub fn persist(&self, report: BatchReport) -> BatchRun {
        let mut run = BatchRun {
            report,
            csv_path: None,
            json_files: Vec::new(),
            write_errors: Vec::new(),
        };
        if run.report.is_empty() {
            return run;
        }

        if self.config.output.save_json {
            let (written, errors) = save_payloads(&run.report, &self.config.output_dir());
            run.json_files = written;
            run.write_errors.extend(errors);
        }

        if self.config.output.save_to_csv {
            let path = self.config.csv_path();
            match run.report.to_csv(&path) {
                Ok(()) => run.csv_path = Some(path),
                Err(e) => {
                    tracing::error!("{e}");
                    run.write_errors.push(e);
                }
            }
        }

        run
    }

    /// Enumerate, process and persist in one call.
    pub async fn process_vouchers<F>(&self, source: &SourceSpec, on_complete: F) -> Result<BatchRun>
    where
        F: Fn(&WorkItem, &Outcome) + Send + Sync + 'static,
    {
        let report = self.process(source, on_complete).await?;
        Ok(self.persist(report))
    }
}

/// Process a batch with the given configuration and credential.
///
/// Convenience wrapper around [`VoucherVision::new`] and
/// [`VoucherVision::process_vouchers`].
pub async fn process_vouchers(
    config: Config,
    source: &SourceSpec,
    credential: Option<String>,
) -> Result<BatchRun> {
    let client = VoucherVision::new(config, credential)?;
    client.process_vouchers(source, |_, _| {}).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMode;
    use crate::report::FailureKind;
    use crate::test_support::MockServer;

    fn config_for(server_url: &str, output_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.server.url = server_url.to_string();
        config.server.timeout_ms = 5000;
        config.auth.credential = String::new();
        config.output.dir = output_dir.to_path_buf();
        config
    }

    fn write_image(dir: &std::path::Path, name: &str) {
        std::fs::write(dir.join(name), b"\xFF\xD8\xFF fake jpeg").unwrap();
    }

    #[test]
    fn test_missing_credential_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for("http://127.0.0.1:9", dir.path());
        let err = VoucherVision::new(config.clone(), None).err().unwrap();
        assert!(matches!(err, VoucherError::MissingCredential));

        let err = VoucherVision::new(config, Some("  ".to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, VoucherError::MissingCredential));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for("http://127.0.0.1:9", dir.path());
        config.processing.max_workers = 0;
        let err = VoucherVision::new(config, Some("key".to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, VoucherError::Config(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_conflicting_sources_fail_before_any_request() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.jpg");
        let client = VoucherVision::new(
            config_for(&server.url, dir.path()),
            Some("key".to_string()),
        )
        .unwrap();

        let source = SourceSpec {
            directory: Some(dir.path().to_path_buf()),
            file_list: Some(vec![dir.path().join("a.jpg").to_string_lossy().into_owned()]),
            ..SourceSpec::default()
        };
        let err = client.process_vouchers(&source, |_, _| {}).await.unwrap_err();
        assert!(matches!(err, VoucherError::InvalidInput(_)));
        assert_eq!(server.requests(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_directory_batch_end_to_end() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_image(images.path(), "b.jpg");
        write_image(images.path(), "a.jpg");
        write_image(images.path(), "fail_c.jpg");
        std::fs::write(images.path().join("notes.txt"), "ignored").unwrap();

        let mut config = config_for(&server.url, output.path());
        config.request.llm_model = "gemini-2.5-pro".to_string();
        config.request.ocr_only = true;

        let run = process_vouchers(
            config,
            &SourceSpec::directory(images.path()),
            Some("short-api-key".to_string()),
        )
        .await
        .unwrap();

        let names: Vec<&str> = run
            .report
            .iter()
            .map(|(item, _)| item.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "fail_c.jpg"]);
        assert_eq!(run.report.summary().failed, 1);
        assert!(run.write_errors.is_empty());

        let payload = run.report.entries()[0].1.payload().unwrap();
        assert_eq!(payload["endpoint"], "/process");
        assert_eq!(payload["filename"], "a.jpg");
        assert!(payload["file_size"].as_u64().unwrap() > 0);
        assert_eq!(
            payload["engines"],
            serde_json::json!(["gemini-1.5-pro", "gemini-2.0-flash"])
        );
        assert_eq!(payload["fields"]["prompt"], "SLTPvM_default.yaml");
        assert_eq!(payload["fields"]["llm_model"], "gemini-2.5-pro");
        assert_eq!(payload["fields"]["ocr_only"], "true");
        assert_eq!(payload["auth"]["x_api_key"], "short-api-key");
        assert!(payload["auth"]["authorization"].is_null());

        let csv_path = run.csv_path.unwrap();
        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(reader.records().count(), 3);
        assert_eq!(run.json_files.len(), 2);
        assert!(output.path().join("a.json").exists());
        assert!(!output.path().join("fail_c.json").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_url_batch_uses_bearer_for_long_token() {
        let server = MockServer::start().await;
        let output = tempfile::tempdir().unwrap();
        let token = format!("eyJhbGciOiJSUzI1NiJ9.{}", "x".repeat(120));

        let client = VoucherVision::new(config_for(&server.url, output.path()), Some(token.clone()))
            .unwrap();
        let report = client
            .process(
                &SourceSpec::image(format!("{}/images/specimen.jpg", server.url)),
                |_, _| {},
            )
            .await
            .unwrap();

        let payload = report.entries()[0].1.payload().unwrap();
        assert_eq!(payload["endpoint"], "/process-url");
        assert_eq!(payload["auth"]["authorization"], format!("Bearer {token}"));
        assert!(payload["auth"]["x_api_key"].is_null());
        assert_eq!(payload["body"]["prompt"], "SLTPvM_default.yaml");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upload_remote_images_downloads_then_uploads() {
        let server = MockServer::start().await;
        let output = tempfile::tempdir().unwrap();
        let mut config = config_for(&server.url, output.path());
        config.request.upload_remote_images = true;
        config.auth.mode = AuthMode::ApiKey;

        let client = VoucherVision::new(config, Some("key".to_string())).unwrap();
        let source = SourceSpec::file_list([
            format!("{}/images/remote.jpg", server.url),
            format!("{}/images/missing.jpg", server.url),
        ]);
        let report = client.process(&source, |_, _| {}).await.unwrap();

        let payload = report.entries()[0].1.payload().unwrap();
        assert_eq!(payload["endpoint"], "/process");
        assert_eq!(payload["filename"], "remote.jpg");
        assert_eq!(payload["file_size"], b"remote image bytes".len());

        match &report.entries()[1].1 {
            Outcome::Failure {
                kind, http_status, ..
            } => {
                assert_eq!(*kind, FailureKind::Remote);
                assert_eq!(*http_status, Some(404));
            }
            other => panic!("Expected download failure, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreadable_listed_file_is_per_item_failure() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_image(images.path(), "ok.jpg");

        let client = VoucherVision::new(
            config_for(&server.url, output.path()),
            Some("key".to_string()),
        )
        .unwrap();
        let source = SourceSpec::file_list([
            images.path().join("gone.jpg").to_string_lossy().into_owned(),
            images.path().join("ok.jpg").to_string_lossy().into_owned(),
        ]);
        let report = client.process(&source, |_, _| {}).await.unwrap();

        match &report.entries()[0].1 {
            Outcome::Failure { kind, .. } => assert_eq!(*kind, FailureKind::FileUnreadable),
            other => panic!("Expected unreadable file, got {other:?}"),
        }
        assert!(report.entries()[1].1.is_success());
        assert_eq!(server.requests(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_csv_write_failure_keeps_report() {
        let server = MockServer::start().await;
        let images = tempfile::tempdir().unwrap();
        write_image(images.path(), "a.jpg");
        let blocker = images.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut config = config_for(&server.url, &blocker.join("out"));
        config.output.save_json = false;
        let client = VoucherVision::new(config, Some("key".to_string())).unwrap();
        let run = client
            .process_vouchers(&SourceSpec::directory(images.path()), |_, _| {})
            .await
            .unwrap();

        assert_eq!(run.report.len(), 1);
        assert!(run.report.entries()[0].1.is_success());
        assert!(run.csv_path.is_none());
        assert_eq!(run.write_errors.len(), 1);
    }
}
