//! Live fill gauge.
//!
//! The reporter only reads the ledger. It wakes on every commit or worker
//! exit (bounded by a short tick), renders, and stops after all workers have
//! left, with one final render of the end state.

use std::time::Duration;

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::ledger::{FillLedger, LedgerSnapshot};

const DEFAULT_TICK: Duration = Duration::from_millis(100);
const GAUGE_TEMPLATE: &str = "Progress: |{bar:50}| {percent:>3}% ({msg})";

/// What the reporter saw while observing a run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProgressTrace {
    pub renders: u64,
    pub peak_bytes: u64,
    pub last_bytes: u64,
    pub last_files: u64,
}

impl ProgressTrace {
    fn observe(&mut self, snap: &LedgerSnapshot) {
        self.renders += 1;
        self.peak_bytes = self.peak_bytes.max(snap.bytes_copied);
        self.last_bytes = snap.bytes_copied;
        self.last_files = snap.files_copied;
    }
}

pub struct ProgressReporter {
    bar: ProgressBar,
    tick: Duration,
}

impl ProgressReporter {
    /// Gauge drawn on stderr.
    pub fn stderr() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Reporter that tracks the run without drawing anything.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    pub fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::with_template(GAUGE_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█-");
        bar.set_style(style);
        Self {
            bar,
            tick: DEFAULT_TICK,
        }
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Observe `ledger` until every worker has exited.
    pub fn run(&self, ledger: &FillLedger) -> ProgressTrace {
        let mut trace = ProgressTrace::default();
        loop {
            let snap = ledger.wait_for_change(self.tick);
            self.render(&snap);
            trace.observe(&snap);
            if snap.finished() {
                break;
            }
        }

        let last = ledger.snapshot();
        self.render(&last);
        trace.observe(&last);
        self.bar.finish();
        trace
    }

    fn render(&self, snap: &LedgerSnapshot) {
        self.bar.set_length(snap.target_size.max(1));
        self.bar.set_position(snap.bytes_copied.min(snap.target_size));
        self.bar.set_message(gauge_message(snap));
    }
}

/// Counts shown next to the bar.
pub fn gauge_message(snap: &LedgerSnapshot) -> String {
    format!(
        "{} files, {}/{}",
        snap.files_copied,
        HumanBytes(snap.bytes_copied),
        HumanBytes(snap.target_size)
    )
}
