//! Collision-safe destination names.
//!
//! A taken name `song.mp3` becomes `song_1.mp3`, `song_2.mp3`, and so on.
//! Workers claim names with an exclusive create, so two workers can never
//! end up writing the same destination file.

use std::ffi::{OsStr, OsString};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Upper bound on suffixes tried before giving up on a name.
const MAX_SUFFIX: u32 = 100_000;

/// Name for the `counter`-th collision of `file_name` (0 is the name itself).
pub fn suffixed_name(file_name: &OsStr, counter: u32) -> OsString {
    if counter == 0 {
        return file_name.to_os_string();
    }
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name);
    let mut name = stem.to_os_string();
    name.push(format!("_{counter}"));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// First name not present in `dir`. Only performs existence checks, so two
/// calls without an intervening create return the same name.
pub fn suggest_unique_name(dir: &Path, file_name: &OsStr) -> OsString {
    let mut counter = 0u32;
    loop {
        let candidate = suffixed_name(file_name, counter);
        let taken = dir.join(&candidate).symlink_metadata().is_ok();
        if !taken || counter >= MAX_SUFFIX {
            return candidate;
        }
        counter += 1;
    }
}

/// Create a new, empty destination file under `dir`, retrying with the next
/// suffix whenever the name is already taken.
pub fn claim_destination(dir: &Path, file_name: &OsStr) -> io::Result<(PathBuf, File)> {
    for counter in 0..=MAX_SUFFIX {
        let candidate = dir.join(suffixed_name(file_name, counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no free name for {} after {MAX_SUFFIX} attempts",
            Path::new(file_name).display()
        ),
    ))
}
