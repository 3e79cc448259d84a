use crate::plan::{Destination, OutputPlan, PlanEntry, ToolRole, ToolRun};
use crate::progress::ProgressReporter;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const PLATFORM_PATHS_SWITCH: &str = "/Platform_Assemblies_Paths";

/// Environment that turns on diffable disassembly in the compiler.
const DISASM_ENVIRONMENT: &[(&str, &str)] = &[
    ("COMPlus_NgenDisasm", "*"),
    ("COMPlus_NgenUnwindDump", "*"),
    ("COMPlus_NgenEHDump", "*"),
    ("COMPlus_JitDiffableDasm", "1"),
];
const GC_INFO_ENVIRONMENT: (&str, &str) = ("COMPlus_NgenGCDump", "*");

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorOptions {
    pub gc_info: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub role: ToolRole,
    pub tag: String,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub duration: Duration,
}

pub struct RunExecutor {
    options: ExecutorOptions,
}

impl RunExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    /// Run every entry of the plan, base before diff. Failures are counted
    /// per run; nothing already written is rolled back.
    pub fn execute(&self, plan: &OutputPlan, reporter: &dyn ProgressReporter) -> Vec<RunSummary> {
        plan.runs
            .iter()
            .enumerate()
            .map(|(index, run)| self.execute_run(plan, index, run, reporter))
            .collect()
    }

    fn execute_run(
        &self,
        plan: &OutputPlan,
        index: usize,
        run: &ToolRun,
        reporter: &dyn ProgressReporter,
    ) -> RunSummary {
        let start = Instant::now();
        let entries: Vec<&PlanEntry> = plan.entries_for(index).collect();
        reporter.on_run_start(&run.tag, entries.len());

        let mut summary = RunSummary {
            role: run.role,
            tag: run.tag.clone(),
            processed: 0,
            skipped: 0,
            errors: 0,
            duration: Duration::ZERO,
        };

        for (done, entry) in entries.iter().enumerate() {
            if !entry.input.exists() {
                warn!("Skipping. Assembly not found: {}", entry.input.display());
                summary.skipped += 1;
                reporter.on_run_progress(done + 1, entries.len());
                continue;
            }

            match self.run_one(run, entry, &plan.platform_paths) {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    error!(
                        "Error running {} on {}: {}",
                        run.executable_path.display(),
                        entry.input.display(),
                        status
                    );
                    summary.errors += 1;
                }
                Err(err) => {
                    error!(
                        "Error running {} on {}: {}",
                        run.executable_path.display(),
                        entry.input.display(),
                        err
                    );
                    summary.errors += 1;
                }
            }
            summary.processed += 1;
            reporter.on_run_progress(done + 1, entries.len());
        }

        summary.duration = start.elapsed();
        reporter.on_run_complete(&run.tag, summary.errors, summary.duration.as_secs_f64());
        summary
    }

    fn run_one(
        &self,
        run: &ToolRun,
        entry: &PlanEntry,
        platform_paths: &[String],
    ) -> io::Result<ExitStatus> {
        let mut command = self.command(&run.executable_path, &entry.input, platform_paths);

        match &entry.destination {
            Destination::File(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let output = File::create(path)?;
                command
                    .stdout(Stdio::from(output.try_clone()?))
                    .stderr(Stdio::from(output));
            }
            Destination::Console => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }

        command.status()
    }

    fn command(&self, executable: &Path, input: &Path, platform_paths: &[String]) -> Command {
        let mut command = Command::new(executable);

        if !platform_paths.is_empty() {
            command
                .arg(PLATFORM_PATHS_SWITCH)
                .arg(platform_paths.join(" "));
        }
        command.arg(input).stdin(Stdio::null());

        command.envs(DISASM_ENVIRONMENT.iter().copied());
        if self.options.gc_info {
            command.env(GC_INFO_ENVIRONMENT.0, GC_INFO_ENVIRONMENT.1);
        }

        if self.options.verbose {
            debug!("Running: {:?}", command);
        }
        command
    }
}
