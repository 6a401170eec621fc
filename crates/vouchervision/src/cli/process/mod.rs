//! The `vouchervision process` command for sending images to the server.

mod batch;
mod setup;
pub mod types;

pub use types::{AuthModeArg, ReportFormat};

use clap::Args;
use std::path::PathBuf;
use vouchervision_core::Config;

use batch::run_batch;
use setup::{setup_client, source_spec};

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Single image path or http(s) URL
    #[arg(long)]
    pub image: Option<String>,

    /// Directory of images (not searched recursively)
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Text file with one image path or URL per line
    #[arg(long)]
    pub file_list: Option<PathBuf>,

    /// VoucherVision server URL
    #[arg(long)]
    pub server: Option<String>,

    /// Directory for the CSV report and per-image JSON files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Prompt template name (e.g. SLTPvM_default.yaml)
    #[arg(long)]
    pub prompt: Option<String>,

    /// OCR engines, repeatable or comma separated
    #[arg(long, value_delimiter = ',')]
    pub engines: Vec<String>,

    /// LLM model override (server default when omitted)
    #[arg(long)]
    pub llm_model: Option<String>,

    /// Run OCR only, skip LLM extraction
    #[arg(long)]
    pub ocr_only: bool,

    /// Maximum number of requests in flight
    #[arg(short = 'j', long)]
    pub max_workers: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Don't write the CSV report
    #[arg(long)]
    pub no_csv: bool,

    /// Don't write per-image JSON files
    #[arg(long)]
    pub no_json: bool,

    /// Bearer token or API key
    #[arg(long, env = "VV_API_KEY", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// How the credential is sent
    #[arg(long, value_enum)]
    pub auth_mode: Option<AuthModeArg>,

    /// Download URL images locally and upload them instead of passing the URL
    #[arg(long)]
    pub upload_remote_images: bool,

    /// Write the full report (successes and failures) to this file, or `-` for stdout
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "json")]
    pub report_format: ReportFormat,

    /// Write the locations of failed images to this file, one per line (usable as --file-list)
    #[arg(long)]
    pub failed_list: Option<PathBuf>,
}

/// Manual Default impl for constructing ProcessArgs outside of clap.
///
/// Values match the clap annotations above.
impl Default for ProcessArgs {
    fn default() -> Self {
        Self {
            image: None,
            directory: None,
            file_list: None,
            server: None,
            output_dir: None,
            prompt: None,
            engines: Vec::new(),
            llm_model: None,
            ocr_only: false,
            max_workers: None,
            timeout_ms: None,
            no_csv: false,
            no_json: false,
            auth_token: None,
            auth_mode: None,
            upload_remote_images: false,
            report: None,
            report_format: ReportFormat::Json,
            failed_list: None,
        }
    }
}

/// Execute the process command.
///
/// Fails only for batch-fatal problems (bad config, bad source, no
/// credential). Failed images are reported and still exit successfully.
pub async fn execute(args: ProcessArgs, config: Config) -> anyhow::Result<()> {
    let source = source_spec(&args)?;
    let client = setup_client(config, &args)?;

    let items = client.enumerate(&source)?;
    if items.is_empty() {
        tracing::warn!("No supported image files found");
        return Ok(());
    }
    tracing::info!("Found {} image(s) to process", items.len());

    run_batch(&client, &args, items).await
}
