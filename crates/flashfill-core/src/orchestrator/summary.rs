use serde::Serialize;

/// Summary of a completed fill run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FillSummary {
    pub device_total: u64,
    pub device_free: u64,
    pub target_size: u64,
    pub reserve_bytes: u64,
    pub cleared_entries: usize,
    pub clear_failures: usize,
    pub library_files: usize,
    pub candidates: usize,
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub real_used: u64,
    pub fill_percent: f64,
    pub skipped_budget: u64,
    pub skipped_space: u64,
    pub failed: u64,
    pub orphans_removed: u64,
    pub orphans_kept: u64,
    pub history_added: usize,
    pub history_unique: usize,
    pub history_reset: bool,
    /// Set when recorded and real usage differ by more than a GiB.
    pub discrepancy: Option<u64>,
    pub elapsed_ms: u128,
    pub errors: Vec<String>,
}

impl FillSummary {
    pub fn nothing_copied(&self) -> bool {
        self.files_copied == 0
    }
}

/// Real usage as a percentage of the device's total size.
pub fn fill_percent(real_used: u64, device_total: u64) -> f64 {
    if device_total == 0 {
        return 0.0;
    }
    real_used as f64 / device_total as f64 * 100.0
}
