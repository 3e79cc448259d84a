/// Trait for reporting scan and execution progress.
///
/// The CLI implements it with indicatif; tests use `SilentReporter`.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _items_found: usize, _current_path: &str) {}
    fn on_scan_complete(&self, _total_items: usize, _duration_secs: f64) {}
    fn on_run_start(&self, _tag: &str, _total_items: usize) {}
    fn on_run_progress(&self, _items_done: usize, _total_items: usize) {}
    fn on_run_complete(&self, _tag: &str, _errors: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
