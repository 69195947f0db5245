//! Post-run audit of what actually landed on the device.

use eyre::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use crate::capacity::GIB;

/// Difference between recorded and real usage that warrants a warning.
pub const DISCREPANCY_THRESHOLD: u64 = GIB;

/// Sum of regular file sizes under `dir`. Symlinks are not followed and
/// entries that cannot be read are skipped with a warning.
pub fn calculate_real_usage(dir: &Path) -> Result<u64> {
    if !dir.is_dir() {
        return Err(std::io::Error::from(std::io::ErrorKind::NotFound))
            .with_context(|| format!("usage root {} is not a directory", dir.display()));
    }

    let mut total = 0u64;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping unreadable entry under {}: {err}", dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(md) => total = total.saturating_add(md.len()),
            Err(err) => log::warn!("cannot stat {}: {err}", entry.path().display()),
        }
    }
    Ok(total)
}

/// Absolute difference between `recorded` and `real` when it exceeds
/// [`DISCREPANCY_THRESHOLD`].
pub fn check_discrepancy(recorded: u64, real: u64) -> Option<u64> {
    let diff = recorded.abs_diff(real);
    (diff > DISCREPANCY_THRESHOLD).then_some(diff)
}
