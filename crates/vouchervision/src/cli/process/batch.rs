//! Batch run: progress bar, persistence, report export, summary.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use vouchervision_core::output::write_atomic;
use vouchervision_core::{
    write_report, BatchReport, BatchRun, OutputWriter, VoucherVision, WorkItem,
};

use super::types::ReportFormat;
use super::ProcessArgs;

/// Process the enumerated items with a progress bar, then persist and summarize.
pub async fn run_batch(
    client: &VoucherVision,
    args: &ProcessArgs,
    items: Vec<WorkItem>,
) -> anyhow::Result<()> {
    let progress = create_progress_bar(items.len() as u64);
    let start_time = Instant::now();

    let pb = progress.clone();
    let report = client
        .process_items(&items, move |item, outcome| {
            if let Some(message) = outcome.error_message() {
                pb.println(format!("  failed: {} - {message}", item.display_name));
            }
            pb.set_message(item.display_name.clone());
            pb.inc(1);
        })
        .await;

    progress.finish_and_clear();
    let elapsed = start_time.elapsed();

    let run = client.persist(report);

    if let Some(path) = &args.report {
        if let Err(e) = export_report(&run.report, path, args.report_format) {
            tracing::error!("Failed to write report: {e}");
        }
    }
    if let Some(path) = &args.failed_list {
        if let Err(e) = write_failed_list(&run.report, path) {
            tracing::error!("{e}");
        }
    }

    print_summary(&run, elapsed);
    Ok(())
}

/// Write the full report as JSON/JSONL to a file, or to stdout for `-`.
fn export_report(report: &BatchReport, path: &Path, format: ReportFormat) -> anyhow::Result<()> {
    if path == Path::new("-") {
        let stdout = std::io::stdout();
        let mut writer = OutputWriter::new(stdout.lock(), format.into(), true);
        writer.write_all(&report.records())?;
        writer.flush()?;
    } else {
        write_report(report, path, format.into())?;
    }
    Ok(())
}

/// Write failed locations, one per line, in a form `--file-list` accepts.
fn write_failed_list(report: &BatchReport, path: &Path) -> anyhow::Result<usize> {
    let failed = report.failed_items();
    if failed.is_empty() {
        return Ok(0);
    }

    write_atomic(path, |file| {
        writeln!(file, "# {} failed image(s)", failed.len())?;
        for item in &failed {
            writeln!(file, "{}", item.location)?;
        }
        Ok(())
    })?;
    tracing::info!(
        "{} failed image(s) listed in {}; rerun with --file-list to retry",
        failed.len(),
        path.display()
    );
    Ok(failed.len())
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    )
    .map(|style| style.progress_chars("##-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after the batch finishes.
fn print_summary(run: &BatchRun, elapsed: Duration) {
    let summary = run.report.summary();
    let rate = if elapsed.as_secs_f64() > 0.0 {
        summary.total as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", summary.total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
    if let Some(path) = &run.csv_path {
        eprintln!("    CSV:          {}", path.display());
    }
    if !run.json_files.is_empty() {
        eprintln!("    JSON files:   {:>8}", run.json_files.len());
    }
    if !run.write_errors.is_empty() {
        eprintln!("    Write errors: {:>8}", run.write_errors.len());
    }
}
