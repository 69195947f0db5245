use std::collections::HashSet;
use std::path::PathBuf;

use rand::seq::SliceRandom;

/// Shuffled work list for one run.
#[derive(Debug, Clone)]
pub struct Selection {
    pub candidates: Vec<PathBuf>,
    /// Every library file was already in history, so the exclusion was dropped.
    pub history_reset: bool,
    /// Library files found by the scan, before history exclusion.
    pub library_files: usize,
}

/// Subtracts history from the library and randomizes what is left.
pub struct CandidateSelector<'a> {
    history: &'a HashSet<PathBuf>,
}

impl<'a> CandidateSelector<'a> {
    pub fn new(history: &'a HashSet<PathBuf>) -> Self {
        Self { history }
    }

    /// Build the work list. When history covers the whole library the full
    /// library is used instead, so the device is not left under-filled.
    pub fn select(&self, all: Vec<PathBuf>) -> Selection {
        let library_files = all.len();

        let mut candidates: Vec<PathBuf> = all
            .iter()
            .filter(|path| !self.history.contains(*path))
            .cloned()
            .collect();

        let history_reset = candidates.is_empty() && !all.is_empty();
        if history_reset {
            log::info!("all {library_files} library files are in history; resetting history for this run");
            candidates = all;
        }

        candidates.shuffle(&mut rand::rng());

        Selection {
            candidates,
            history_reset,
            library_files,
        }
    }
}
