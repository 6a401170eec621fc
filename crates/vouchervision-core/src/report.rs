//! Per-item outcomes and the ordered batch report.
//!
//! Workers finish in any order; the report is always rebuilt in enumeration
//! order before it is handed to callers or written to CSV.

use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::error::{ItemError, OutputError};
use crate::output::write_atomic;
use crate::source::WorkItem;

/// Columns present in every CSV, ahead of the extraction columns.
const FIXED_COLUMNS: [&str; 5] = [
    "display_name",
    "source",
    "status",
    "http_status",
    "error_message",
];

/// Column holding payloads that are not JSON objects.
const RAW_PAYLOAD_COLUMN: &str = "response";

/// Coarse class of a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    FileUnreadable,
    Network,
    Timeout,
    MalformedResponse,
    Remote,
    /// The worker died before reporting (panic) or no outcome was recorded
    Internal,
}

/// Result of processing one work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        payload: Value,
    },
    Failure {
        kind: FailureKind,
        http_status: Option<u16>,
        message: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Outcome::Success { payload } => Some(payload),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { message, .. } => Some(message),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind: FailureKind::Internal,
            http_status: None,
            message: message.into(),
        }
    }
}

impl From<ItemError> for Outcome {
    fn from(error: ItemError) -> Self {
        let kind = match &error {
            ItemError::FileUnreadable { .. } => FailureKind::FileUnreadable,
            ItemError::Network(_) => FailureKind::Network,
            ItemError::Timeout { .. } => FailureKind::Timeout,
            ItemError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            ItemError::Remote { .. } => FailureKind::Remote,
        };
        Outcome::Failure {
            kind,
            http_status: error.http_status(),
            message: error.to_string(),
        }
    }
}

/// Success and failure counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} image(s): {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )
    }
}

/// Identity of a work item for reordering.
type ItemKey = (usize, String, String);

fn item_key(item: &WorkItem) -> ItemKey {
    (
        item.index,
        item.display_name.clone(),
        item.location.clone(),
    )
}

/// All outcomes of one batch, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    entries: Vec<(WorkItem, Outcome)>,
}

impl BatchReport {
    /// Restore enumeration order from completion-ordered pairs.
    ///
    /// Every item of `original_order` gets exactly one entry; an item with no
    /// recorded outcome is reported as an internal failure rather than dropped.
    pub fn aggregate(pairs: Vec<(WorkItem, Outcome)>, original_order: &[WorkItem]) -> Self {
        let mut outcomes: HashMap<ItemKey, Outcome> = HashMap::with_capacity(pairs.len());
        for (item, outcome) in pairs {
            let key = item_key(&item);
            if outcomes.contains_key(&key) {
                tracing::warn!("Duplicate outcome for {}, keeping the first", item.display_name);
                continue;
            }
            outcomes.insert(key, outcome);
        }

        let entries: Vec<(WorkItem, Outcome)> = original_order
            .iter()
            .map(|item| {
                let outcome = outcomes.remove(&item_key(item)).unwrap_or_else(|| {
                    tracing::error!("No outcome recorded for {}", item.display_name);
                    Outcome::internal("No outcome recorded for this item")
                });
                (item.clone(), outcome)
            })
            .collect();

        if !outcomes.is_empty() {
            tracing::warn!(
                "Dropped {} outcome(s) for items outside the batch",
                outcomes.len()
            );
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkItem, &Outcome)> {
        self.entries.iter().map(|(item, outcome)| (item, outcome))
    }

    pub fn entries(&self) -> &[(WorkItem, Outcome)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(WorkItem, Outcome)> {
        self.entries
    }

    /// Successful items with their payloads.
    pub fn successes(&self) -> impl Iterator<Item = (&WorkItem, &Value)> {
        self.iter()
            .filter_map(|(item, outcome)| outcome.payload().map(|p| (item, p)))
    }

    /// Failed items with their outcomes.
    pub fn failures(&self) -> impl Iterator<Item = (&WorkItem, &Outcome)> {
        self.iter().filter(|(_, outcome)| !outcome.is_success())
    }

    /// Failed items, re-indexed from zero, ready to be submitted as a new batch.
    pub fn failed_items(&self) -> Vec<WorkItem> {
        self.failures()
            .enumerate()
            .map(|(index, (item, _))| WorkItem {
                index,
                ..item.clone()
            })
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.successes().count();
        BatchSummary {
            total: self.len(),
            succeeded,
            failed: self.len() - succeeded,
        }
    }

    /// Extraction columns: union of top-level payload keys over all
    /// successes, in first-seen order.
    pub fn extraction_columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for (_, payload) in self.successes() {
            let keys: Vec<String> = match payload {
                Value::Object(map) => map.keys().map(|k| column_name(k)).collect(),
                _ => vec![RAW_PAYLOAD_COLUMN.to_string()],
            };
            for key in keys {
                if seen.insert(key.clone()) {
                    columns.push(key);
                }
            }
        }
        columns
    }

    /// Write the report as CSV, one row per item in report order.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let columns = self.extraction_columns();
        let mut csv = csv::Writer::from_writer(writer);

        let header: Vec<&str> = FIXED_COLUMNS
            .iter()
            .copied()
            .chain(columns.iter().map(String::as_str))
            .collect();
        csv.write_record(&header)?;

        for (item, outcome) in self.iter() {
            let mut row: Vec<String> = Vec::with_capacity(header.len());
            row.push(item.display_name.clone());
            row.push(item.location.clone());
            match outcome {
                Outcome::Success { payload } => {
                    row.extend(["success".to_string(), "200".to_string(), String::new()]);
                    let cells = payload_cells(payload);
                    row.extend(
                        columns
                            .iter()
                            .map(|c| cells.get(c.as_str()).cloned().unwrap_or_default()),
                    );
                }
                Outcome::Failure {
                    http_status,
                    message,
                    ..
                } => {
                    row.push("failure".to_string());
                    row.push(http_status.map(|s| s.to_string()).unwrap_or_default());
                    row.push(message.clone());
                    row.extend(std::iter::repeat(String::new()).take(columns.len()));
                }
            }
            csv.write_record(&row)?;
        }

        csv.flush()?;
        Ok(())
    }

    /// Write the report to a CSV file.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// an interrupted run never leaves a half-written report. On failure the
    /// in-memory report is unaffected.
    pub fn to_csv(&self, path: &Path) -> Result<(), OutputError> {
        write_atomic(path, |writer| {
            self.write_csv(writer).map_err(std::io::Error::other)
        })?;
        tracing::info!("CSV report written to {}", path.display());
        Ok(())
    }
}

/// CSV column for a payload key; keys clashing with fixed columns are prefixed.
fn column_name(key: &str) -> String {
    if FIXED_COLUMNS.contains(&key) {
        format!("{RAW_PAYLOAD_COLUMN}.{key}")
    } else {
        key.to_string()
    }
}

fn payload_cells(payload: &Value) -> HashMap<String, String> {
    match payload {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (column_name(k), cell(v)))
            .collect(),
        other => HashMap::from([(RAW_PAYLOAD_COLUMN.to_string(), cell(other))]),
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
