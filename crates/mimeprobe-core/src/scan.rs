//! Parallel detection over a directory tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::ProbeConfig;
use crate::detection::Detection;
use crate::error::{ProbeError, ProbeResult};
use crate::registry::SignatureRegistry;

/// Detection outcome for one file.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<Detection>,
    /// Why the file could not be read, when it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of [`scan`].
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Entries sorted by path.
    pub entries: Vec<ScanEntry>,
    pub files_scanned: usize,
    pub duration_ms: u64,
}

impl ScanReport {
    /// Number of files whose content type could not be determined or read.
    pub fn unknown_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.detection.as_ref().is_none_or(Detection::is_unknown))
            .count()
    }
}

fn normalize_rel_path(entry_path: &Path, root: &Path) -> String {
    let rel_path = entry_path.strip_prefix(root).unwrap_or(entry_path);
    let path_str = rel_path.to_string_lossy().replace('\\', "/");
    match path_str.strip_prefix("./") {
        Some(stripped) => stripped.to_string(),
        None => path_str,
    }
}

fn is_excluded(rel_path: &str, patterns: &[glob::Pattern]) -> bool {
    !rel_path.is_empty() && patterns.iter().any(|p| p.matches(rel_path))
}

fn detect_one(registry: &SignatureRegistry, path: PathBuf) -> ScanEntry {
    match registry.detect_path(&path) {
        Ok(detection) => ScanEntry {
            path,
            detection: Some(detection),
            error: None,
        },
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
            ScanEntry {
                path,
                detection: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Detect every file under `path` in parallel.
///
/// `.gitignore` rules are honoured and `config.exclude` globs (relative to
/// `path`) prune matching directories and skip matching files. A plain file
/// path is detected on its own. Exceeding `config.limits.max_files` stops
/// the walk with [`ProbeError::TooManyFiles`].
pub fn scan(path: &Path, config: &ProbeConfig, registry: &SignatureRegistry) -> ProbeResult<ScanReport> {
    use ignore::WalkBuilder;

    let start = Instant::now();

    if path.is_file() {
        let entry = detect_one(registry, path.to_path_buf());
        return Ok(ScanReport {
            entries: vec![entry],
            files_scanned: 1,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    let exclude_patterns = Arc::new(config.exclude_patterns());
    let root_path = path.to_path_buf();
    let max_files = config.limits.max_files;

    // Atomic so every worker sees the limit trip immediately.
    let files_seen = AtomicUsize::new(0);
    let limit_exceeded = AtomicBool::new(false);

    let mut entries: Vec<ScanEntry> = WalkBuilder::new(&root_path)
        .hidden(false)
        .git_ignore(true)
        .filter_entry({
            let exclude_patterns = Arc::clone(&exclude_patterns);
            let root_path = root_path.clone();
            move |entry| {
                let rel_path = normalize_rel_path(entry.path(), &root_path);
                !is_excluded(&rel_path, exclude_patterns.as_slice())
            }
        })
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .par_bridge()
        .filter_map(|file_path| {
            if limit_exceeded.load(Ordering::SeqCst) {
                return None;
            }
            let count = files_seen.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = max_files
                && count >= limit
            {
                limit_exceeded.store(true, Ordering::SeqCst);
                return None;
            }
            Some(detect_one(registry, file_path))
        })
        .collect();

    if limit_exceeded.load(Ordering::Relaxed)
        && let Some(limit) = max_files
    {
        return Err(ProbeError::TooManyFiles {
            count: files_seen.load(Ordering::Relaxed),
            limit,
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    let files_scanned = entries.len();
    tracing::debug!(root = %root_path.display(), files = files_scanned, "scan finished");
    Ok(ScanReport {
        entries,
        files_scanned,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}
