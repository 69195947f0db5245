//! Emptying the target device before a fill.

use eyre::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of clearing a directory.
#[derive(Debug, Default, Clone)]
pub struct ClearReport {
    pub removed: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl ClearReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Remove every entry directly under `dir`. Directories are removed
/// recursively; symlinks are removed without following them. An entry that
/// cannot be removed is logged and recorded, and clearing continues.
///
/// Only failing to list `dir` itself is an error.
pub fn clear_destination(dir: &Path) -> Result<ClearReport> {
    let mut report = ClearReport::default();
    let mut listed = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))?;
    for entry in entries {
        match entry {
            Ok(entry) => listed.push(entry.path()),
            Err(err) => {
                log::error!("failed to read entry in {}: {err}", dir.display());
                report.failures.push((dir.to_path_buf(), err.to_string()));
            }
        }
    }

    remove_entries(listed, &mut report);
    Ok(report)
}

fn remove_entries(paths: Vec<PathBuf>, report: &mut ClearReport) {
    for path in paths {
        match remove_entry(&path) {
            Ok(()) => report.removed += 1,
            Err(err) => {
                log::error!("failed to delete {}: {err}", path.display());
                report.failures.push((path, err.to_string()));
            }
        }
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
