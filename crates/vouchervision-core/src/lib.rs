//! VoucherVision Core - batch client for the VoucherVision transcription service.
//!
//! Takes herbarium specimen images (a single file or URL, a directory, or a
//! list of paths and URLs), sends each one to a remote VoucherVision server
//! with a bounded number of requests in flight, and collects the results into
//! an ordered report that can be written as CSV and per-image JSON.
//!
//! # Architecture
//!
//! ```text
//! SourceSpec → Enumerate → WorkerPool (RequestBuilder → HTTP → Response) → BatchReport → CSV/JSON
//! ```
//!
//! One image failing never fails the batch; only invalid input or a missing
//! credential does, and both are caught before any request is sent.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vouchervision_core::{Config, SourceSpec, VoucherVision};
//!
//! #[tokio::main]
//! async fn main() -> vouchervision_core::Result<()> {
//!     let config = Config::load()?;
//!     let client = VoucherVision::new(config, None)?;
//!
//!     let run = client
//!         .process_vouchers(&SourceSpec::directory("./specimens"), |_, _| {})
//!         .await?;
//!     println!("{}", run.report.summary());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod pool;
pub mod report;
pub mod request;
pub mod response;
pub mod source;

#[cfg(test)]
mod test_support;

pub use auth::{AuthMode, AuthStrategy, CredentialKind, HeaderSet};
pub use client::{process_vouchers, BatchRun, VoucherVision};
pub use config::Config;
pub use error::{ConfigError, ItemError, OutputError, Result, VoucherError};
pub use output::{write_report, OutputFormat, OutputWriter};
pub use pool::{PoolOptions, WorkerPool};
pub use report::{BatchReport, BatchSummary, FailureKind, Outcome};
pub use request::{RequestBuilder, RequestConfig};
pub use source::{SourceEnumerator, SourceKind, SourceSpec, WorkItem};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_client_new_with_defaults() {
        let mut config = Config::default();
        config.auth.credential = "test-key".to_string();
        let client = VoucherVision::new(config, None).unwrap();
        assert_eq!(client.config().processing.max_workers, 4);
        assert_eq!(client.request_config().engines.len(), 2);
    }
}
