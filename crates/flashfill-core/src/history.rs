//! Append-only record of source paths copied in previous runs.
//!
//! The file holds one absolute path per line with no header. It is read once at
//! startup and only ever appended to; it is never rewritten or compacted.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::{Context, Result};

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the set of previously copied paths.
    ///
    /// A missing file yields an empty set. An unreadable file also yields an
    /// empty set, with a warning.
    pub fn load(&self) -> HashSet<PathBuf> {
        if !self.path.exists() {
            return HashSet::new();
        }
        match self.read_entries() {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!(
                    "could not read history file {} ({err:#}); starting with an empty history",
                    self.path.display()
                );
                HashSet::new()
            }
        }
    }

    fn read_entries(&self) -> Result<HashSet<PathBuf>> {
        let file = File::open(&self.path)
            .with_context(|| format!("open history file {}", self.path.display()))?;
        let mut entries = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.context("read history line")?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            entries.insert(PathBuf::from(trimmed));
        }
        Ok(entries)
    }

    /// Append newly copied paths, one per line. Nothing is written for an empty slice.
    pub fn append(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create history directory {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open history file {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        for path in paths {
            // A lossy rendering would never match on reload.
            let Some(line) = path.to_str() else {
                log::warn!("not recording non-UTF-8 path {} in history", path.display());
                continue;
            };
            writeln!(writer, "{line}").context("write history entry")?;
        }
        writer.flush().context("flush history file")?;
        Ok(())
    }
}
