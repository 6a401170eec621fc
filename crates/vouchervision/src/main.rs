//! VoucherVision CLI - batch client for the VoucherVision specimen transcription service.
//!
//! Sends herbarium specimen images to a VoucherVision server, a bounded number
//! at a time, and writes the transcriptions as CSV plus one JSON file per image.
//!
//! # Usage
//!
//! ```bash
//! # Process a single image or URL
//! vouchervision process --image specimen.jpg
//!
//! # Process a directory
//! vouchervision process --directory ./specimens --output-dir ./results
//!
//! # Process a list of paths and URLs
//! vouchervision process --file-list images.txt --max-workers 8
//!
//! # View configuration
//! vouchervision config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// VoucherVision - batch client for herbarium specimen transcription.
#[derive(Parser, Debug)]
#[command(name = "vouchervision")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Send images to the VoucherVision server and collect the results
    Process(cli::process::ProcessArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match vouchervision_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `vouchervision config path`."
            );
            vouchervision_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("VoucherVision v{}", vouchervision_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
