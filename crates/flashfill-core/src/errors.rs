//! Error categorization for fill runs.
//!
//! Errors fall into two groups:
//! - Startup: the run cannot begin at all (missing paths, wrong device, bad configuration)
//! - Item: a single candidate failed; it is skipped and the run carries on

use std::io;
use std::path::{Path, PathBuf};

use crate::capacity::GIB;

/// Category of a fill error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The process reports the error and exits before any work is done.
    Startup,
    /// Logged with the offending path; the item is abandoned.
    Item,
}

/// Fatal conditions detected before the copy engine starts.
#[derive(Debug)]
pub enum StartupError {
    DeviceMissing(PathBuf),
    LibraryMissing(PathBuf),
    CapacityMismatch {
        expected_gb: u64,
        allowed_deviation: f64,
        actual_bytes: u64,
    },
    CapacityQuery {
        path: PathBuf,
        message: String,
    },
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl StartupError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Startup
    }

    pub fn capacity_query(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::CapacityQuery {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceMissing(path) => {
                write!(f, "target device {} does not exist", path.display())
            }
            Self::LibraryMissing(path) => {
                write!(f, "media library {} not found", path.display())
            }
            Self::CapacityMismatch {
                expected_gb,
                allowed_deviation,
                actual_bytes,
            } => {
                let actual_gb = *actual_bytes as f64 / GIB as f64;
                let deviation = if *expected_gb == 0 {
                    100.0
                } else {
                    (actual_gb - *expected_gb as f64).abs() / *expected_gb as f64 * 100.0
                };
                write!(
                    f,
                    "unexpected device size: expected {}GB ±{:.1}%, found {:.2}GB (deviation {:.2}%)",
                    expected_gb,
                    allowed_deviation * 100.0,
                    actual_gb,
                    deviation
                )
            }
            Self::CapacityQuery { path, message } => {
                write!(f, "failed to query capacity of {}: {}", path.display(), message)
            }
            Self::InvalidConfig { key, value, reason } => {
                write!(f, "invalid value {value:?} for {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for StartupError {}

/// Step of the claim-check-copy-commit cycle at which an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    Stat,
    Reserve,
    Claim,
    Copy,
    Commit,
}

impl ItemStage {
    fn label(self) -> &'static str {
        match self {
            Self::Stat => "stat",
            Self::Reserve => "space check",
            Self::Claim => "name claim",
            Self::Copy => "copy",
            Self::Commit => "commit",
        }
    }
}

/// A per-item failure. Never escalated past the worker that hit it.
#[derive(Debug)]
pub struct ItemError {
    pub path: PathBuf,
    pub stage: ItemStage,
    pub message: String,
}

impl ItemError {
    pub fn new(stage: ItemStage, path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            stage,
            message: message.into(),
        }
    }

    pub fn from_io(stage: ItemStage, path: &Path, err: &io::Error) -> Self {
        let reads_source = matches!(stage, ItemStage::Stat | ItemStage::Copy);
        let message = if err.kind() == io::ErrorKind::NotFound && reads_source {
            format!("source vanished ({err})")
        } else {
            err.to_string()
        };
        Self::new(stage, path, message)
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Item
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} failed: {}",
            self.path.display(),
            self.stage.label(),
            self.message
        )
    }
}

impl std::error::Error for ItemError {}

/// Result type for per-item operations.
pub type ItemResult<T> = std::result::Result<T, ItemError>;
