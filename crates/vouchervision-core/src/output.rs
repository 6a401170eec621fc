//! Persistence of finished reports: JSON/JSONL export and per-image JSON files.
//!
//! All files are written through [`write_atomic`], which writes a temporary
//! sibling and renames it over the destination.

use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::OutputError;
use crate::report::{BatchReport, Outcome};
use crate::source::WorkItem;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON array
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// One report entry as exported to JSON.
#[derive(Debug, Serialize)]
pub struct ReportRecord<'a> {
    #[serde(flatten)]
    pub item: &'a WorkItem,
    pub outcome: &'a Outcome,
}

impl BatchReport {
    /// Report entries as serializable records, in report order.
    pub fn records(&self) -> Vec<ReportRecord<'_>> {
        self.iter()
            .map(|(item, outcome)| ReportRecord { item, outcome })
            .collect()
    }
}

/// A writer that serializes items to JSON or JSONL format.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// Create a new output writer.
    ///
    /// `pretty` only affects the JSON format; JSONL is always one object per line.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Write a single item.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty && self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    /// Write multiple items: a JSON array, or one line per item for JSONL.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, items)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, items).map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
                self.items_written += items.len();
            }
            OutputFormat::JsonLines => {
                for item in items {
                    self.write(item)?;
                }
            }
        }
        Ok(())
    }

    /// Get the number of items written.
    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Write a file via a temporary sibling and an atomic rename.
///
/// Missing parent directories are created. The temporary file is removed if
/// writing fails.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| OutputError::write(path, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let tmp_path = parent.join(format!(".{file_name}.partial"));

    let result = File::create(&tmp_path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    });

    match result.and_then(|()| std::fs::rename(&tmp_path, path)) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(OutputError::write(path, e))
        }
    }
}

/// Export the whole report to a JSON or JSONL file.
pub fn write_report(
    report: &BatchReport,
    path: &Path,
    format: OutputFormat,
) -> Result<(), OutputError> {
    let records = report.records();
    write_atomic(path, |file| {
        let mut writer = OutputWriter::new(file, format, true);
        writer.write_all(&records)?;
        writer.flush()
    })?;
    tracing::info!("Report written to {}", path.display());
    Ok(())
}

/// Write each successful payload to `<dir>/<name>.json`.
///
/// File names come from the display name's stem; when two items share a stem
/// (`a.jpg` and `a.png`), the full display name is used instead. Returns the
/// paths written and the errors hit; one failed file does not stop the rest.
pub fn save_payloads(report: &BatchReport, dir: &Path) -> (Vec<PathBuf>, Vec<OutputError>) {
    let mut stem_counts: HashMap<&str, usize> = HashMap::new();
    for (item, _) in report.successes() {
        *stem_counts.entry(item.display_stem()).or_default() += 1;
    }

    let mut written = Vec::new();
    let mut errors = Vec::new();
    for (item, payload) in report.successes() {
        let stem = if stem_counts.get(item.display_stem()).copied().unwrap_or(0) > 1 {
            item.display_name.replace('.', "_")
        } else {
            item.display_stem().to_string()
        };
        let path = dir.join(format!("{stem}.json"));

        let result = write_atomic(&path, |file| {
            let mut writer = OutputWriter::new(file, OutputFormat::Json, true);
            writer.write(payload)?;
            writer.flush()
        });
        match result {
            Ok(()) => written.push(path),
            Err(e) => {
                tracing::warn!("Failed to save result for {}: {e}", item.display_name);
                errors.push(e);
            }
        }
    }

    tracing::debug!("Saved {} result file(s) to {}", written.len(), dir.display());
    (written, errors)
}
