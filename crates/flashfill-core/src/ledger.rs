//! Shared running total for a fill run.
//!
//! All mutation goes through [`FillLedger::try_reserve`] and
//! [`FillLedger::commit`], each of which runs under a single lock. Observers
//! read consistent snapshots and can block until the ledger changes.

use std::path::PathBuf;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::capacity::CapacityBudget;

/// Point-in-time view of the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub bytes_copied: u64,
    pub files_copied: u64,
    pub target_size: u64,
    pub active_workers: usize,
}

impl LedgerSnapshot {
    /// Fraction of the target filled, clamped to `[0, 1]`.
    pub fn fill_ratio(&self) -> f64 {
        if self.target_size == 0 {
            return 0.0;
        }
        (self.bytes_copied as f64 / self.target_size as f64).min(1.0)
    }

    pub fn finished(&self) -> bool {
        self.active_workers == 0
    }
}

/// Outcome of the pre-copy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The item may be copied.
    Granted,
    /// The logical budget is spent or cannot hold the item.
    BudgetExhausted,
    /// The device itself does not have room for the item.
    InsufficientSpace { available: u64 },
}

#[derive(Debug, Default)]
struct LedgerState {
    bytes_copied: u64,
    files_copied: u64,
    copied_paths: Vec<PathBuf>,
    active_workers: usize,
}

/// Running total shared by the copy workers and the progress observer.
#[derive(Debug)]
pub struct FillLedger {
    target_size: u64,
    reserve_bytes: u64,
    state: Mutex<LedgerState>,
    changed: Condvar,
}

/// Final contents of the ledger once every worker has exited.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerTotals {
    pub bytes_copied: u64,
    pub files_copied: u64,
    pub copied_paths: Vec<PathBuf>,
}

impl FillLedger {
    pub fn new(budget: &CapacityBudget) -> Self {
        Self {
            target_size: budget.target_size,
            reserve_bytes: budget.reserve_bytes,
            state: Mutex::new(LedgerState::default()),
            changed: Condvar::new(),
        }
    }

    pub fn target_size(&self) -> u64 {
        self.target_size
    }

    /// Decide whether an item of `size` bytes may be copied.
    ///
    /// `device_free` is called while the lock is held, so the free-space
    /// reading and the budget check form one critical section. A failed
    /// free-space query is reported as the caller's error.
    pub fn try_reserve<F, E>(&self, size: u64, device_free: F) -> Result<Reservation, E>
    where
        F: FnOnce() -> Result<u64, E>,
    {
        let state = self.state.lock();
        if state.bytes_copied >= self.target_size
            || state.bytes_copied.saturating_add(size) > self.target_size
        {
            return Ok(Reservation::BudgetExhausted);
        }

        let available = device_free()?.saturating_sub(self.reserve_bytes);
        if size > available {
            return Ok(Reservation::InsufficientSpace { available });
        }
        Ok(Reservation::Granted)
    }

    /// Record a finished copy if it still fits the budget. Returns `false`
    /// when a concurrent commit used the room first.
    pub fn commit(&self, source: PathBuf, copied_size: u64) -> bool {
        let mut state = self.state.lock();
        if state.bytes_copied.saturating_add(copied_size) > self.target_size {
            return false;
        }
        state.bytes_copied += copied_size;
        state.files_copied += 1;
        state.copied_paths.push(source);
        drop(state);
        self.changed.notify_all();
        true
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.lock();
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &LedgerState) -> LedgerSnapshot {
        LedgerSnapshot {
            bytes_copied: state.bytes_copied,
            files_copied: state.files_copied,
            target_size: self.target_size,
            active_workers: state.active_workers,
        }
    }

    /// Block until the ledger changes or `timeout` elapses, then snapshot.
    /// Returns immediately once all workers have exited.
    pub fn wait_for_change(&self, timeout: Duration) -> LedgerSnapshot {
        let mut state = self.state.lock();
        if state.active_workers > 0 {
            let _ = self.changed.wait_for(&mut state, timeout);
        }
        self.snapshot_of(&state)
    }

    /// Register a running worker. The returned guard unregisters it on drop,
    /// including when the worker unwinds.
    pub fn enter_worker(&self) -> WorkerGuard<'_> {
        self.state.lock().active_workers += 1;
        WorkerGuard { ledger: self }
    }

    fn exit_worker(&self) {
        let mut state = self.state.lock();
        state.active_workers = state.active_workers.saturating_sub(1);
        drop(state);
        self.changed.notify_all();
    }

    pub fn into_totals(self) -> LedgerTotals {
        let state = self.state.into_inner();
        LedgerTotals {
            bytes_copied: state.bytes_copied,
            files_copied: state.files_copied,
            copied_paths: state.copied_paths,
        }
    }
}

pub struct WorkerGuard<'a> {
    ledger: &'a FillLedger,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        self.ledger.exit_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn ledger(target: u64, reserve: u64) -> FillLedger {
        FillLedger::new(&CapacityBudget {
            device_total: target + reserve,
            reserve_bytes: reserve,
            target_size: target,
        })
    }

    fn plenty() -> Result<u64, Infallible> {
        Ok(u64::MAX)
    }

    #[test]
    fn reserve_granted_within_budget_and_space() {
        let ledger = ledger(100, 0);
        assert_eq!(ledger.try_reserve(60, plenty), Ok(Reservation::Granted));
    }

    #[test]
    fn reserve_refused_once_budget_spent() {
        let ledger = ledger(100, 0);
        assert!(ledger.commit(PathBuf::from("/a"), 100));
        assert_eq!(ledger.try_reserve(0, plenty), Ok(Reservation::BudgetExhausted));
    }

    #[test]
    fn reserve_refused_when_item_exceeds_remaining_budget() {
        let ledger = ledger(100, 0);
        assert!(ledger.commit(PathBuf::from("/a"), 70));
        assert_eq!(ledger.try_reserve(31, plenty), Ok(Reservation::BudgetExhausted));
        assert_eq!(ledger.try_reserve(30, plenty), Ok(Reservation::Granted));
    }

    #[test]
    fn reserve_checks_live_free_space_minus_reserve() {
        let ledger = ledger(1_000, 50);
        let free = || Ok::<u64, Infallible>(100);
        assert_eq!(
            ledger.try_reserve(51, free),
            Ok(Reservation::InsufficientSpace { available: 50 })
        );
        assert_eq!(ledger.try_reserve(50, free), Ok(Reservation::Granted));
    }

    #[test]
    fn free_space_not_queried_when_budget_spent() {
        let ledger = ledger(10, 0);
        assert!(ledger.commit(PathBuf::from("/a"), 10));
        let result: Result<Reservation, &str> = ledger.try_reserve(1, || Err("should not be called"));
        assert_eq!(result, Ok(Reservation::BudgetExhausted));
    }

    #[test]
    fn free_space_error_is_propagated() {
        let ledger = ledger(10, 0);
        let result: Result<Reservation, &str> = ledger.try_reserve(1, || Err("statvfs failed"));
        assert_eq!(result, Err("statvfs failed"));
    }

    #[test]
    fn commit_rejects_overshoot() {
        let ledger = ledger(100, 0);
        assert!(ledger.commit(PathBuf::from("/a"), 60));
        assert!(!ledger.commit(PathBuf::from("/b"), 41));
        assert!(ledger.commit(PathBuf::from("/c"), 40));

        let totals = ledger.into_totals();
        assert_eq!(totals.bytes_copied, 100);
        assert_eq!(totals.files_copied, 2);
        assert_eq!(totals.copied_paths, vec![PathBuf::from("/a"), PathBuf::from("/c")]);
    }

    #[test]
    fn concurrent_commits_never_exceed_target() {
        let ledger = ledger(1_000, 0);
        std::thread::scope(|scope| {
            for worker in 0..8u64 {
                let ledger = &ledger;
                scope.spawn(move || {
                    for i in 0..200u64 {
                        let size = (worker * 7 + i * 13) % 23 + 1;
                        ledger.commit(PathBuf::from(format!("/{worker}/{i}")), size);
                        assert!(ledger.snapshot().bytes_copied <= 1_000);
                    }
                });
            }
        });
        let totals = ledger.into_totals();
        assert!(totals.bytes_copied <= 1_000);
        assert_eq!(totals.files_copied as usize, totals.copied_paths.len());
    }

    #[test]
    fn worker_guard_tracks_active_count() {
        let ledger = ledger(10, 0);
        let a = ledger.enter_worker();
        let b = ledger.enter_worker();
        assert_eq!(ledger.snapshot().active_workers, 2);
        drop(a);
        assert!(!ledger.snapshot().finished());
        drop(b);
        assert!(ledger.snapshot().finished());
        // Returns without waiting when nobody is running.
        assert!(ledger.wait_for_change(Duration::from_secs(60)).finished());
    }

    #[test]
    fn fill_ratio_is_clamped() {
        let snap = LedgerSnapshot {
            bytes_copied: 150,
            files_copied: 1,
            target_size: 100,
            active_workers: 0,
        };
        assert_eq!(snap.fill_ratio(), 1.0);
        let empty_target = LedgerSnapshot {
            target_size: 0,
            ..snap
        };
        assert_eq!(empty_target.fill_ratio(), 0.0);
    }
}
