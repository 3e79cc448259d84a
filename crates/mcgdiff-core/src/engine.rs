use crate::analyze::{self, AnalyzeRequest};
use crate::executor::{RunExecutor, RunSummary};
use crate::plan::{self, ToolRole, ToolRun};
use crate::progress::ProgressReporter;
use crate::worklist::{ScanOutcome, ScanRoot, WorklistScanner};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct DiffEngine {
    runs: Vec<ToolRun>,
    scanner: WorklistScanner,
    executor: RunExecutor,
    analysis_tool: Option<PathBuf>,
    recursive_analysis: bool,
}

#[derive(Debug)]
pub struct DiffResult {
    pub scan_duration: Duration,
    pub exec_duration: Duration,
    pub work_items: usize,
    pub skipped_roots: Vec<PathBuf>,
    pub rejected: usize,
    pub runs: Vec<RunSummary>,
    /// Exit code of the analysis tool, when it ran.
    pub analysis_exit: Option<i32>,
}

impl DiffResult {
    pub fn error_count(&self) -> usize {
        self.runs.iter().map(|r| r.errors).sum()
    }
}

impl DiffEngine {
    /// `runs` must come from `plan::resolve_runs`.
    pub fn new(runs: Vec<ToolRun>, scanner: WorklistScanner, executor: RunExecutor) -> Self {
        Self {
            runs,
            scanner,
            executor,
            analysis_tool: None,
            recursive_analysis: false,
        }
    }

    pub fn with_analysis(mut self, tool: PathBuf, recursive: bool) -> Self {
        self.analysis_tool = Some(tool);
        self.recursive_analysis = recursive;
        self
    }

    pub fn runs(&self) -> &[ToolRun] {
        &self.runs
    }

    pub fn scan(&self, roots: &[ScanRoot], reporter: &dyn ProgressReporter) -> ScanOutcome {
        self.scanner.scan(roots, reporter)
    }

    /// Scan, plan, execute, then optionally analyze:
    /// 1. Scan the roots into a worklist (classification in parallel)
    /// 2. Pair every run with every work item
    /// 3. Run the compilers, base first
    /// 4. Hand both output trees to the analysis tool
    pub fn run(
        &self,
        roots: &[ScanRoot],
        platform_paths: &[String],
        reporter: &dyn ProgressReporter,
    ) -> DiffResult {
        // Phase 1: Scan
        info!("Building worklist...");
        let scan_start = Instant::now();
        let outcome = self.scan(roots, reporter);
        let scan_duration = scan_start.elapsed();
        debug!(
            "Scan completed in {:.2}s: {} items, {} rejected, {} roots skipped",
            scan_duration.as_secs_f64(),
            outcome.items.len(),
            outcome.rejected,
            outcome.skipped_roots.len(),
        );

        // Phase 2: Plan
        let output_plan = plan::plan(&outcome.items, &self.runs, platform_paths);
        debug!("Planned {} compiler invocations", output_plan.entries.len());

        // Phase 3: Execute
        info!("Generating disassembly...");
        let exec_start = Instant::now();
        let summaries = self.executor.execute(&output_plan, reporter);
        let exec_duration = exec_start.elapsed();

        // Phase 4: Analyze
        let analysis_exit = self.analysis_tool.as_ref().and_then(|tool| self.analyze(tool));

        DiffResult {
            scan_duration,
            exec_duration,
            work_items: outcome.items.len(),
            skipped_roots: outcome.skipped_roots,
            rejected: outcome.rejected,
            runs: summaries,
            analysis_exit,
        }
    }

    fn analyze(&self, tool: &Path) -> Option<i32> {
        let tagged = |role: ToolRole| {
            self.runs
                .iter()
                .find(|r| r.role == role)
                .and_then(ToolRun::tagged_root)
        };

        let (Some(base), Some(diff)) = (tagged(ToolRole::Base), tagged(ToolRole::Diff)) else {
            warn!("Analysis needs both --base and --diff output under --output, skipping");
            return None;
        };

        let request = AnalyzeRequest {
            tool: tool.to_path_buf(),
            base,
            diff,
            recursive: self.recursive_analysis,
        };
        match analyze::run_analysis(&request) {
            Ok(code) => Some(code),
            Err(err) => {
                error!("Error running analysis tool {}: {}", tool.display(), err);
                None
            }
        }
    }
}
