//! Bounded concurrent copy engine.
//!
//! A fixed pool of worker threads drains one shared queue. For each claimed
//! item a worker runs a check / copy / commit cycle:
//!
//! 1. stat the source, then ask the ledger for room (budget and live device
//!    free space are checked under the ledger lock)
//! 2. claim a collision-free destination name with an exclusive create
//! 3. copy content and metadata without holding any lock
//! 4. re-read the copied size and commit it under the ledger lock
//!
//! A copy that no longer fits at commit time is deleted again. Per-item
//! failures are logged and counted; they never stop the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::Receiver;
use eyre::{bail, Result};
use parking_lot::Mutex;
use serde::Serialize;

use crate::capacity::{CapacityBudget, SpaceProbe};
use crate::copy::{copy_into, DestinationGuard};
use crate::errors::{ItemError, ItemResult, ItemStage};
use crate::ledger::{FillLedger, LedgerTotals, Reservation};
use crate::naming::claim_destination;
use crate::progress::{ProgressReporter, ProgressTrace};

/// How one work item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Copied { bytes: u64 },
    BudgetExhausted,
    InsufficientSpace,
    /// Copied, but a concurrent commit used the room first; the file was removed.
    OrphanRemoved,
    /// As above, but removing the file failed.
    OrphanKept,
}

/// Result of draining the queue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineReport {
    pub candidates: usize,
    pub totals: LedgerTotals,
    pub skipped_budget: u64,
    pub skipped_space: u64,
    pub failed: u64,
    pub orphans_removed: u64,
    pub orphans_kept: u64,
    pub errors: Vec<String>,
    pub progress: ProgressTrace,
}

#[derive(Default)]
struct WorkerTally {
    skipped_budget: AtomicU64,
    skipped_space: AtomicU64,
    failed: AtomicU64,
    orphans_removed: AtomicU64,
    orphans_kept: AtomicU64,
    errors: Mutex<Vec<String>>,
}

impl WorkerTally {
    fn record(&self, outcome: ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Copied { .. } => return,
            ItemOutcome::BudgetExhausted => &self.skipped_budget,
            ItemOutcome::InsufficientSpace => &self.skipped_space,
            ItemOutcome::OrphanRemoved => &self.orphans_removed,
            ItemOutcome::OrphanKept => &self.orphans_kept,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, err: &ItemError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.errors.lock().push(err.to_string());
    }
}

pub struct CopyEngine<'a> {
    destination: &'a Path,
    budget: CapacityBudget,
    workers: usize,
    probe: &'a dyn SpaceProbe,
}

impl<'a> CopyEngine<'a> {
    pub fn new(
        destination: &'a Path,
        budget: CapacityBudget,
        workers: usize,
        probe: &'a dyn SpaceProbe,
    ) -> Self {
        Self {
            destination,
            budget,
            workers: workers.max(1),
            probe,
        }
    }

    /// Copy items until the queue is empty. Returns after every worker and
    /// the reporter have been joined.
    pub fn run(&self, items: Vec<PathBuf>, reporter: &ProgressReporter) -> Result<EngineReport> {
        let candidates = items.len();
        let (tx, rx) = crossbeam_channel::unbounded::<PathBuf>();
        for item in items {
            // The receiver is alive, so an unbounded send cannot fail.
            let _ = tx.send(item);
        }
        drop(tx);

        let ledger = FillLedger::new(&self.budget);
        let tally = WorkerTally::default();

        let progress = thread::scope(|scope| -> Result<ProgressTrace> {
            let mut handles = Vec::with_capacity(self.workers);
            for idx in 0..self.workers {
                let rx = rx.clone();
                let ledger = &ledger;
                let tally = &tally;
                // Registered before the reporter starts so it cannot see an empty pool.
                let guard = ledger.enter_worker();
                let spawned = thread::Builder::new()
                    .name(format!("fill-worker-{idx}"))
                    .spawn_scoped(scope, move || {
                        let _guard = guard;
                        self.worker_loop(idx, rx, ledger, tally);
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => log::error!("failed to spawn worker {idx}: {err}"),
                }
            }

            if handles.is_empty() {
                bail!("no copy worker could be started");
            }

            let observer = scope.spawn(|| reporter.run(&ledger));

            for handle in handles.drain(..) {
                if handle.join().is_err() {
                    log::error!("copy worker panicked");
                }
            }
            Ok(observer.join().unwrap_or_default())
        })?;

        Ok(EngineReport {
            candidates,
            totals: ledger.into_totals(),
            skipped_budget: tally.skipped_budget.into_inner(),
            skipped_space: tally.skipped_space.into_inner(),
            failed: tally.failed.into_inner(),
            orphans_removed: tally.orphans_removed.into_inner(),
            orphans_kept: tally.orphans_kept.into_inner(),
            errors: tally.errors.into_inner(),
            progress,
        })
    }

    fn worker_loop(&self, idx: usize, rx: Receiver<PathBuf>, ledger: &FillLedger, tally: &WorkerTally) {
        while let Ok(source) = rx.try_recv() {
            match self.process(&source, ledger) {
                Ok(outcome) => tally.record(outcome),
                Err(err) => {
                    log::error!("[w{idx}] {err}");
                    tally.record_failure(&err);
                }
            }
        }
    }

    fn process(&self, source: &Path, ledger: &FillLedger) -> ItemResult<ItemOutcome> {
        let size = fs::metadata(source)
            .map_err(|err| ItemError::from_io(ItemStage::Stat, source, &err))?
            .len();

        let reservation = ledger
            .try_reserve(size, || {
                self.probe.space(self.destination).map(|space| space.free)
            })
            .map_err(|err| ItemError::from_io(ItemStage::Reserve, source, &err))?;
        match reservation {
            Reservation::Granted => {}
            Reservation::BudgetExhausted => return Ok(ItemOutcome::BudgetExhausted),
            Reservation::InsufficientSpace { available } => {
                log::debug!(
                    "{} ({size} bytes) does not fit in {available} free bytes",
                    source.display()
                );
                return Ok(ItemOutcome::InsufficientSpace);
            }
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| ItemError::new(ItemStage::Claim, source, "source has no file name"))?;
        let (dest, file) = claim_destination(self.destination, file_name)
            .map_err(|err| ItemError::from_io(ItemStage::Claim, source, &err))?;
        let guard = DestinationGuard::new(dest);

        copy_into(source, file, guard.path())
            .map_err(|err| ItemError::new(ItemStage::Copy, source, format!("{err:#}")))?;

        let copied_size = fs::metadata(guard.path())
            .map_err(|err| ItemError::from_io(ItemStage::Commit, source, &err))?
            .len();

        if ledger.commit(source.to_path_buf(), copied_size) {
            let dest = guard.keep();
            log::debug!("copied {} -> {}", source.display(), dest.display());
            return Ok(ItemOutcome::Copied { bytes: copied_size });
        }

        let orphan = guard.path().to_path_buf();
        match guard.discard() {
            Ok(()) => {
                log::debug!("budget exceeded at commit; removed {}", orphan.display());
                Ok(ItemOutcome::OrphanRemoved)
            }
            Err(err) => {
                log::warn!("failed to remove over-budget copy {}: {err}", orphan.display());
                Ok(ItemOutcome::OrphanKept)
            }
        }
    }
}
