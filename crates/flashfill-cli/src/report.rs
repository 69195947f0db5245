use eyre::{Context, Result};
use flashfill_core::FillSummary;

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes == 0 {
        return "0 B".to_owned();
    }
    let mut value = bytes as f64;
    let mut unit = 0usize;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

fn format_elapsed(elapsed_ms: u128) -> String {
    let secs = elapsed_ms / 1000;
    format!("{} min {} s", secs / 60, secs % 60)
}

/// Human-readable summary lines.
pub(crate) fn render_text(summary: &FillSummary, verbose: bool) -> Vec<String> {
    if summary.nothing_copied() {
        let mut lines = vec!["No files were copied.".to_owned()];
        if verbose {
            lines.push(format!(
                "• Candidates: {} | over budget: {} | no space: {} | failed: {}",
                summary.candidates, summary.skipped_budget, summary.skipped_space, summary.failed
            ));
        }
        return lines;
    }

    let rule = "=".repeat(50);
    let mut lines = vec![
        rule.clone(),
        "Fill complete:".to_owned(),
        format!("• Device size: {}", format_bytes(summary.device_total)),
        format!("• Files copied: {}", summary.files_copied),
        format!("• Total file size: {}", format_bytes(summary.bytes_copied)),
        format!("• Space actually used: {}", format_bytes(summary.real_used)),
        format!("• Free: {}", format_bytes(summary.device_free)),
        format!("• Fill level: {:.1}%", summary.fill_percent),
        format!("• Added to history: {} entries", summary.history_added),
        format!("• Unique files in history: {}", summary.history_unique),
        format!("• Elapsed: {}", format_elapsed(summary.elapsed_ms)),
    ];

    if summary.history_reset {
        lines.push("• History was reset: every library file had been used".to_owned());
    }
    if summary.failed > 0 {
        lines.push(format!("• Failed items: {}", summary.failed));
    }
    if verbose {
        lines.push(format!(
            "• Library files: {} | candidates: {} | over budget: {} | no space: {} | orphans removed: {}",
            summary.library_files,
            summary.candidates,
            summary.skipped_budget,
            summary.skipped_space,
            summary.orphans_removed
        ));
        if summary.cleared_entries > 0 || summary.clear_failures > 0 {
            lines.push(format!(
                "• Cleared {} entries ({} could not be removed)",
                summary.cleared_entries, summary.clear_failures
            ));
        }
    }
    if let Some(diff) = summary.discrepancy {
        lines.push(String::new());
        lines.push(format!(
            "WARNING: total file size and space actually used differ by {}",
            format_bytes(diff)
        ));
        lines.push("This can be caused by filesystem allocation overhead.".to_owned());
    }
    lines.push(rule);
    lines
}

pub(crate) fn print_summary(summary: &FillSummary, json: bool, verbose: bool) -> Result<()> {
    if json {
        let encoded =
            serde_json::to_string_pretty(summary).context("encode summary as JSON")?;
        println!("{encoded}");
        return Ok(());
    }
    for line in render_text(summary, verbose) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(36 * 1024 * 1024 * 1024), "36.00 GiB");
    }

    #[test]
    fn empty_run_reports_nothing_copied() {
        let lines = render_text(&FillSummary::default(), false);
        assert_eq!(lines, vec!["No files were copied.".to_owned()]);
    }

    #[test]
    fn summary_lists_totals_and_discrepancy() {
        let summary = FillSummary {
            device_total: 4096,
            files_copied: 3,
            bytes_copied: 2048,
            real_used: 2048,
            fill_percent: 50.0,
            history_added: 3,
            history_unique: 7,
            elapsed_ms: 125_000,
            discrepancy: Some(2 * 1024 * 1024 * 1024),
            ..FillSummary::default()
        };
        let text = render_text(&summary, false).join("\n");
        assert!(text.contains("• Files copied: 3"), "{text}");
        assert!(text.contains("• Fill level: 50.0%"), "{text}");
        assert!(text.contains("• Unique files in history: 7"), "{text}");
        assert!(text.contains("• Elapsed: 2 min 5 s"), "{text}");
        assert!(text.contains("differ by 2.00 GiB"), "{text}");
    }
}
