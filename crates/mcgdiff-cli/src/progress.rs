use indicatif::{ProgressBar, ProgressStyle};
use mcgdiff_core::ProgressReporter;
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Scan phase: spinner (unknown total upfront)
/// - Each compiler run: progress bar over its plan entries
///
/// Console output from the compiler would tear a bar, so callers pass
/// `enabled = false` when disassembly goes to the terminal.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
    enabled: bool,
}

impl CliReporter {
    pub fn new(enabled: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            enabled,
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self) {
        if !self.enabled {
            return;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message("Scanning for assemblies...");
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_progress(&self, items_found: usize, _current_path: &str) {
        self.with_bar(|pb| pb.set_message(format!("Scanning... {} assemblies found", items_found)));
    }

    fn on_scan_complete(&self, total_items: usize, duration_secs: f64) {
        self.finish_bar();
        if self.enabled {
            eprintln!(
                "  \x1b[32m✓\x1b[0m Scan complete: {} assemblies in {:.2}s",
                total_items, duration_secs
            );
        }
    }

    fn on_run_start(&self, tag: &str, total_items: usize) {
        if !self.enabled {
            return;
        }
        let pb = ProgressBar::new(total_items as u64);
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} assemblies ({{eta}} remaining)",
            tag
        );
        if let Ok(style) = ProgressStyle::with_template(&template) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_run_progress(&self, items_done: usize, _total_items: usize) {
        self.with_bar(|pb| pb.set_position(items_done as u64));
    }

    fn on_run_complete(&self, tag: &str, errors: usize, duration_secs: f64) {
        self.finish_bar();
        if !self.enabled {
            return;
        }
        if errors == 0 {
            eprintln!(
                "  \x1b[32m✓\x1b[0m {} complete in {:.2}s",
                tag, duration_secs
            );
        } else {
            eprintln!(
                "  \x1b[31m✗\x1b[0m {} complete in {:.2}s with {} errors",
                tag, duration_secs, errors
            );
        }
    }
}
