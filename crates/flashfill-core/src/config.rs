use directories::BaseDirs;
use eyre::Result;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::StartupError;

pub const DEVICE_KEY: &str = "FLASH_DRIVE";
pub const LIBRARY_KEY: &str = "MUSIC_LIBRARY";
pub const HISTORY_KEY: &str = "HISTORY_FILE";
pub const DEVIATION_KEY: &str = "ALLOWED_CAPACITY_DEVIATION";
pub const EXPECTED_SIZE_KEY: &str = "EXPECTED_SIZE_GB";
pub const RESERVE_KEY: &str = "RESERVE_SIZE";
pub const THREADS_KEY: &str = "THREAD_COUNT";

const DEFAULT_DEVICE: &str = "/mnt/CD";
const DEFAULT_LIBRARY: &str = "/mnt/hdd/FILES/Music";
const HISTORY_FILE_NAME: &str = ".flash_music_history";
const DEFAULT_DEVIATION: f64 = 0.02;
const DEFAULT_EXPECTED_SIZE_GB: u64 = 36;
const DEFAULT_RESERVE: u64 = 100 * 1024 * 1024;
const DEFAULT_THREADS: usize = 3;

/// Extensions (lowercase, without the dot) a library file must carry to be eligible.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "mp4"];

/// Immutable run configuration. Built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct FillConfig {
    pub device_path: PathBuf,
    pub library_path: PathBuf,
    pub history_path: PathBuf,
    pub allowed_deviation: f64,
    pub expected_size_gb: u64,
    pub reserve_bytes: u64,
    pub workers: usize,
    pub extensions: Vec<String>,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE),
            library_path: PathBuf::from(DEFAULT_LIBRARY),
            history_path: default_history_path(),
            allowed_deviation: DEFAULT_DEVIATION,
            expected_size_gb: DEFAULT_EXPECTED_SIZE_GB,
            reserve_bytes: DEFAULT_RESERVE,
            workers: DEFAULT_THREADS,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FillConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key/value lookup.
    /// Missing keys fall back to defaults; malformed values are startup errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let allowed_deviation = match get(DEVIATION_KEY) {
            Some(raw) => parse_value::<f64>(DEVIATION_KEY, &raw)?,
            None => defaults.allowed_deviation,
        };
        if !(0.0..1.0).contains(&allowed_deviation) {
            return Err(invalid(
                DEVIATION_KEY,
                allowed_deviation.to_string(),
                "must be a fraction in [0, 1)",
            ));
        }

        let workers = match get(THREADS_KEY) {
            Some(raw) => parse_value::<usize>(THREADS_KEY, &raw)?,
            None => defaults.workers,
        };
        if workers == 0 {
            return Err(invalid(THREADS_KEY, "0".into(), "at least one worker is required"));
        }

        Ok(Self {
            device_path: get(DEVICE_KEY).map(PathBuf::from).unwrap_or(defaults.device_path),
            library_path: get(LIBRARY_KEY)
                .map(PathBuf::from)
                .unwrap_or(defaults.library_path),
            history_path: get(HISTORY_KEY)
                .map(|raw| expand_home(&raw))
                .unwrap_or(defaults.history_path),
            allowed_deviation,
            expected_size_gb: match get(EXPECTED_SIZE_KEY) {
                Some(raw) => parse_value(EXPECTED_SIZE_KEY, &raw)?,
                None => defaults.expected_size_gb,
            },
            reserve_bytes: match get(RESERVE_KEY) {
                Some(raw) => parse_value(RESERVE_KEY, &raw)?,
                None => defaults.reserve_bytes,
            },
            workers,
            extensions: defaults.extensions,
        })
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| invalid(key, raw.to_string(), &err.to_string()))
}

fn invalid(key: &'static str, value: String, reason: &str) -> eyre::Report {
    StartupError::InvalidConfig {
        key,
        value,
        reason: reason.to_string(),
    }
    .into()
}

/// Resolve the default history location.
/// Priority: platform home directory -> current directory
pub fn default_history_path() -> PathBuf {
    match BaseDirs::new() {
        Some(base) => base.home_dir().join(HISTORY_FILE_NAME),
        None => PathBuf::from(HISTORY_FILE_NAME),
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    Path::new(raw).to_path_buf()
}
