//! Top-level fill run: verify, clear, select, copy, record, audit.

use std::time::Instant;

use eyre::{Context, Result};

use crate::capacity::{CapacityOracle, SpaceProbe};
use crate::cleanup::clear_destination;
use crate::config::FillConfig;
use crate::engine::CopyEngine;
use crate::enumeration::{ExtensionFilter, LibraryScanner};
use crate::errors::StartupError;
use crate::history::HistoryStore;
use crate::progress::ProgressReporter;
use crate::selector::CandidateSelector;
use crate::usage::{calculate_real_usage, check_discrepancy};

mod options;
mod summary;

pub use options::FillOptions;
pub use summary::{fill_percent, FillSummary};

pub struct FillOrchestrator<'a> {
    config: &'a FillConfig,
    probe: &'a dyn SpaceProbe,
}

impl<'a> FillOrchestrator<'a> {
    pub fn new(config: &'a FillConfig, probe: &'a dyn SpaceProbe) -> Self {
        Self { config, probe }
    }

    pub fn run(&self, options: &FillOptions) -> Result<FillSummary> {
        let start = Instant::now();
        let config = self.config;

        if !config.device_path.is_dir() {
            return Err(StartupError::DeviceMissing(config.device_path.clone()).into());
        }
        if !config.library_path.is_dir() {
            return Err(StartupError::LibraryMissing(config.library_path.clone()).into());
        }

        let budget =
            CapacityOracle::new(config, self.probe).budget(options.skip_capacity_check)?;
        log::info!(
            "device {} reports {} bytes; filling up to {} bytes (reserve {})",
            config.device_path.display(),
            budget.device_total,
            budget.target_size,
            budget.reserve_bytes
        );

        let mut summary = FillSummary {
            device_total: budget.device_total,
            target_size: budget.target_size,
            reserve_bytes: budget.reserve_bytes,
            ..FillSummary::default()
        };

        if options.clear_destination {
            let cleared = clear_destination(&config.device_path)?;
            if !cleared.is_clean() {
                log::warn!(
                    "{} entries could not be removed from {}",
                    cleared.failures.len(),
                    config.device_path.display()
                );
            }
            summary.cleared_entries = cleared.removed;
            summary.clear_failures = cleared.failures.len();
        }

        let history = HistoryStore::new(&config.history_path);
        let previous = history.load();
        let scanner = LibraryScanner::new(ExtensionFilter::new(&config.extensions));
        let library = scanner.scan(&config.library_path)?;
        let selection = CandidateSelector::new(&previous).select(library);
        summary.library_files = selection.library_files;
        summary.history_reset = selection.history_reset;

        let reporter = if options.show_progress {
            ProgressReporter::stderr()
        } else {
            ProgressReporter::hidden()
        };
        let engine = CopyEngine::new(&config.device_path, budget, config.workers, self.probe);
        let report = engine.run(selection.candidates, &reporter)?;

        history
            .append(&report.totals.copied_paths)
            .with_context(|| format!("update history file {}", history.path().display()))?;

        let prior_unique = if selection.history_reset {
            0
        } else {
            previous.len()
        };
        summary.candidates = report.candidates;
        summary.files_copied = report.totals.files_copied;
        summary.bytes_copied = report.totals.bytes_copied;
        summary.skipped_budget = report.skipped_budget;
        summary.skipped_space = report.skipped_space;
        summary.failed = report.failed;
        summary.orphans_removed = report.orphans_removed;
        summary.orphans_kept = report.orphans_kept;
        summary.history_added = report.totals.copied_paths.len();
        summary.history_unique = prior_unique + summary.history_added;
        summary.errors = report.errors;

        summary.real_used = calculate_real_usage(&config.device_path)?;
        summary.device_free = match self.probe.space(&config.device_path) {
            Ok(space) => space.free,
            Err(err) => {
                log::warn!("could not read free space after the run: {err}");
                0
            }
        };
        summary.fill_percent = fill_percent(summary.real_used, summary.device_total);
        summary.discrepancy = check_discrepancy(summary.bytes_copied, summary.real_used);
        summary.elapsed_ms = start.elapsed().as_millis();

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::tests::FixedProbe;
    use std::fs;
    use std::path::Path;

    fn config_for(root: &Path) -> Result<FillConfig> {
        let device = root.join("dev");
        let library = root.join("lib");
        fs::create_dir_all(&device)?;
        fs::create_dir_all(&library)?;
        Ok(FillConfig {
            device_path: device,
            library_path: library,
            history_path: root.join("history"),
            reserve_bytes: 0,
            workers: 2,
            ..FillConfig::default()
        })
    }

    fn quiet() -> FillOptions {
        FillOptions {
            skip_capacity_check: true,
            show_progress: false,
            ..FillOptions::default()
        }
    }

    #[test]
    fn missing_device_is_a_startup_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut cfg = config_for(temp.path())?;
        cfg.device_path = temp.path().join("absent");
        let probe = FixedProbe::new(1_000, 1_000);
        let err = FillOrchestrator::new(&cfg, &probe)
            .run(&quiet())
            .expect_err("device is missing");
        assert!(matches!(
            err.downcast_ref::<StartupError>(),
            Some(StartupError::DeviceMissing(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_library_is_a_startup_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut cfg = config_for(temp.path())?;
        cfg.library_path = temp.path().join("absent");
        let probe = FixedProbe::new(1_000, 1_000);
        let err = FillOrchestrator::new(&cfg, &probe)
            .run(&quiet())
            .expect_err("library is missing");
        assert!(matches!(
            err.downcast_ref::<StartupError>(),
            Some(StartupError::LibraryMissing(_))
        ));
        Ok(())
    }

    #[test]
    fn capacity_mismatch_leaves_device_untouched() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let cfg = config_for(temp.path())?;
        fs::write(cfg.device_path.join("existing.mp3"), b"keep")?;
        fs::write(cfg.library_path.join("a.mp3"), b"a")?;
        let probe = FixedProbe::new(1_000, 1_000);
        let options = FillOptions {
            skip_capacity_check: false,
            ..quiet()
        };
        let err = FillOrchestrator::new(&cfg, &probe)
            .run(&options)
            .expect_err("1000 bytes is not 36GB");
        assert!(matches!(
            err.downcast_ref::<StartupError>(),
            Some(StartupError::CapacityMismatch { .. })
        ));
        assert!(cfg.device_path.join("existing.mp3").exists());
        assert!(!cfg.history_path.exists());
        Ok(())
    }

    #[test]
    fn clears_device_then_fills_and_records() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let cfg = config_for(temp.path())?;
        fs::write(cfg.device_path.join("stale.mp3"), vec![0u8; 64])?;
        for i in 0..5 {
            fs::write(cfg.library_path.join(format!("{i}.mp3")), vec![1u8; 20])?;
        }
        fs::write(cfg.library_path.join("cover.jpg"), vec![1u8; 20])?;

        let probe = FixedProbe::new(1_000, 1_000);
        let summary = FillOrchestrator::new(&cfg, &probe).run(&quiet())?;

        assert_eq!(summary.cleared_entries, 1);
        assert_eq!(summary.library_files, 5);
        assert_eq!(summary.files_copied, 5);
        assert_eq!(summary.bytes_copied, 100);
        assert_eq!(summary.real_used, 100);
        assert_eq!(summary.history_added, 5);
        assert_eq!(summary.history_unique, 5);
        assert!(!cfg.device_path.join("stale.mp3").exists());
        assert_eq!(HistoryStore::new(&cfg.history_path).load().len(), 5);
        assert!((summary.fill_percent - 10.0).abs() < 1e-9);
        assert_eq!(summary.discrepancy, None);
        Ok(())
    }

    #[test]
    fn keep_existing_leaves_prior_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let cfg = config_for(temp.path())?;
        fs::write(cfg.device_path.join("prior.mp3"), vec![0u8; 10])?;
        fs::write(cfg.library_path.join("prior.mp3"), vec![1u8; 10])?;

        let probe = FixedProbe::new(1_000, 1_000);
        let options = FillOptions {
            clear_destination: false,
            ..quiet()
        };
        let summary = FillOrchestrator::new(&cfg, &probe).run(&options)?;

        assert_eq!(summary.files_copied, 1);
        assert!(cfg.device_path.join("prior.mp3").exists());
        assert!(cfg.device_path.join("prior_1.mp3").exists());
        assert_eq!(summary.real_used, 20);
        Ok(())
    }
}
