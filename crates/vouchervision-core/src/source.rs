//! Source enumeration: turning a request specification into an ordered work list.
//!
//! Exactly one of three source modes is accepted: a single image (local path
//! or URL), a directory, or an explicit file list. Enumeration is pure; nothing
//! is opened or uploaded here beyond listing a directory.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;
use crate::error::{Result, VoucherError};

/// Where a work item's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    LocalFile,
    Url,
}

/// One image to submit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Position in the enumeration order
    pub index: usize,
    pub source_kind: SourceKind,
    /// Filesystem path or URL
    pub location: String,
    /// Unique, non-empty name used in logs, the CSV and JSON file names
    pub display_name: String,
}

impl WorkItem {
    /// The local path, for `LocalFile` items.
    pub fn local_path(&self) -> Option<&Path> {
        match self.source_kind {
            SourceKind::LocalFile => Some(Path::new(&self.location)),
            SourceKind::Url => None,
        }
    }

    pub fn is_url(&self) -> bool {
        self.source_kind == SourceKind::Url
    }

    /// Display name without its extension, used for per-image output files.
    pub fn display_stem(&self) -> &str {
        Path::new(&self.display_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.display_name)
    }
}

/// The caller's description of what to process. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSpec {
    /// A single local path or http(s) URL
    pub image: Option<String>,
    /// A directory whose image files are processed (non-recursive)
    pub directory: Option<PathBuf>,
    /// Explicit list of local paths and/or URLs, processed in the given order
    pub file_list: Option<Vec<String>>,
}

impl SourceSpec {
    pub fn image(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Self::default()
        }
    }

    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn file_list<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_list: Some(entries.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Read a file list from a text file: one path or URL per line, blank
    /// lines and `#` comments ignored.
    pub fn file_list_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VoucherError::InvalidInput(format!("Cannot read file list {}: {e}", path.display()))
        })?;
        let entries: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();
        Ok(Self::file_list(entries))
    }

    fn modes_set(&self) -> Vec<&'static str> {
        let mut modes = Vec::new();
        if self.image.is_some() {
            modes.push("image");
        }
        if self.directory.is_some() {
            modes.push("directory");
        }
        if self.file_list.is_some() {
            modes.push("file_list");
        }
        modes
    }
}

/// Check whether a location string is an http(s) URL.
pub fn is_url(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Enumerates image sources into work items.
pub struct SourceEnumerator {
    supported_formats: Vec<String>,
}

impl SourceEnumerator {
    /// Create a new enumerator using the configured image extensions.
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            supported_formats: config
                .supported_formats
                .iter()
                .map(|f| f.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Enumerate a source specification into an ordered list of work items.
    pub fn enumerate(&self, spec: &SourceSpec) -> Result<Vec<WorkItem>> {
        let modes = spec.modes_set();
        if modes.len() != 1 {
            let detail = if modes.is_empty() {
                "none was given".to_string()
            } else {
                format!("got {}", modes.join(" and "))
            };
            return Err(VoucherError::InvalidInput(format!(
                "exactly one of image, directory or file_list must be specified; {detail}"
            )));
        }

        let locations = if let Some(image) = &spec.image {
            vec![self.single(image)?]
        } else if let Some(dir) = &spec.directory {
            self.list_directory(dir)?
        } else if let Some(list) = &spec.file_list {
            if list.is_empty() {
                return Err(VoucherError::InvalidInput("file_list is empty".to_string()));
            }
            list.iter().map(|entry| entry.trim().to_string()).collect()
        } else {
            Vec::new()
        };

        let mut names = NameRegistry::default();
        let items: Vec<WorkItem> = locations
            .into_iter()
            .enumerate()
            .map(|(index, location)| {
                let source_kind = if is_url(&location) {
                    SourceKind::Url
                } else {
                    SourceKind::LocalFile
                };
                let display_name = names.claim(&base_name(&location, source_kind));
                WorkItem {
                    index,
                    source_kind,
                    location,
                    display_name,
                }
            })
            .collect();

        tracing::debug!("Enumerated {} work item(s)", items.len());
        Ok(items)
    }

    fn single(&self, image: &str) -> Result<String> {
        let image = image.trim();
        if image.is_empty() {
            return Err(VoucherError::InvalidInput("image is empty".to_string()));
        }
        if is_url(image) {
            return Ok(image.to_string());
        }
        let path = Path::new(image);
        if !path.exists() {
            return Err(VoucherError::InvalidInput(format!(
                "image path does not exist: {}",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(VoucherError::InvalidInput(format!(
                "image path is not a file: {}",
                path.display()
            )));
        }
        Ok(image.to_string())
    }

    /// List supported image files directly inside `dir`, sorted by file name.
    ///
    /// Subdirectories are not descended into.
    fn list_directory(&self, dir: &Path) -> Result<Vec<String>> {
        if !dir.exists() {
            return Err(VoucherError::InvalidInput(format!(
                "directory does not exist: {}",
                dir.display()
            )));
        }
        if !dir.is_dir() {
            return Err(VoucherError::InvalidInput(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && self.is_supported(p))
            .collect();

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if files.is_empty() {
            tracing::warn!("No supported image files found in {}", dir.display());
        }
        Ok(files
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect())
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.supported_formats.iter().any(|fmt| *fmt == ext_lower)
            })
            .unwrap_or(false)
    }
}

/// File name portion of a path or URL.
fn base_name(location: &str, kind: SourceKind) -> String {
    let name = match kind {
        SourceKind::Url => url::Url::parse(location).ok().and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(String::from))
        }),
        SourceKind::LocalFile => Path::new(location)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
    };
    name.filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "image".to_string())
}

/// Hands out unique display names, suffixing `_1`, `_2`, ... to the stem on collision.
#[derive(Default)]
struct NameRegistry {
    taken: HashSet<String>,
}

impl NameRegistry {
    fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }
        let path = Path::new(name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut n = 1usize;
        loop {
            let candidate = format!("{stem}_{n}{ext}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
