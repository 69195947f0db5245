//! Content and metadata copy into a claimed destination file.

use eyre::{Context, Result};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const COPY_BUFFER: usize = 1024 * 1024;

/// Removes a destination file on drop unless [`DestinationGuard::keep`] is called.
/// Covers partial copies and copies rejected at commit.
pub struct DestinationGuard {
    path: PathBuf,
    kept: bool,
}

impl DestinationGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path, kept: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the file in place.
    pub fn keep(mut self) -> PathBuf {
        self.kept = true;
        std::mem::take(&mut self.path)
    }

    /// Remove the file now and report whether that worked.
    pub fn discard(mut self) -> io::Result<()> {
        self.kept = true;
        fs::remove_file(&self.path)
    }
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        if !self.kept {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// What metadata was actually carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataPreserved {
    pub times: bool,
    pub permissions: bool,
}

/// Stream `src` into the already-open `dst_file`, then copy timestamps and
/// permissions. Returns the number of content bytes written.
pub fn copy_into(src: &Path, dst_file: File, dst: &Path) -> Result<u64> {
    let src_file = File::open(src).with_context(|| format!("open {}", src.display()))?;
    let mut reader = BufReader::with_capacity(COPY_BUFFER, src_file);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER, dst_file);
    let bytes = io::copy(&mut reader, &mut writer)
        .with_context(|| format!("copy {} to {}", src.display(), dst.display()))?;
    writer
        .flush()
        .with_context(|| format!("flush {}", dst.display()))?;
    drop(writer);

    let preserved = preserve_metadata(src, dst)?;
    if !preserved.times {
        log::debug!("Could not preserve timestamps for {}", dst.display());
    }
    if !preserved.permissions {
        log::debug!("Could not preserve permissions for {}", dst.display());
    }
    Ok(bytes)
}

/// Copy access/modification times and permission bits from `src` to `dst`.
/// Only failing to read the source metadata is an error; the rest is best effort.
pub fn preserve_metadata(src: &Path, dst: &Path) -> Result<MetadataPreserved> {
    let md = fs::metadata(src).with_context(|| format!("metadata {}", src.display()))?;

    let mut preserved = MetadataPreserved {
        times: false,
        permissions: false,
    };

    if fs::set_permissions(dst, md.permissions()).is_ok() {
        preserved.permissions = true;
    }

    let mtime = FileTime::from_last_modification_time(&md);
    let atime = FileTime::from_last_access_time(&md);
    if filetime::set_file_times(dst, atime, mtime).is_ok() {
        preserved.times = true;
    }

    Ok(preserved)
}
