use crate::error::Error;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::info;

/// One invocation of the external disassembly-diff tool.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub tool: PathBuf,
    pub base: PathBuf,
    pub diff: PathBuf,
    pub recursive: bool,
}

impl AnalyzeRequest {
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.tool);
        command
            .arg("--base")
            .arg(&self.base)
            .arg("--diff")
            .arg(&self.diff);
        if self.recursive {
            command.arg("--recursive");
        }
        command
    }
}

/// Run the analysis tool with inherited stdio and return its exit code.
pub fn run_analysis(request: &AnalyzeRequest) -> Result<i32, Error> {
    info!(
        "Analyzing {} against {}",
        request.diff.display(),
        request.base.display()
    );
    let status = request
        .command()
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    // A signal-terminated tool has no code.
    Ok(status.code().unwrap_or(-1))
}
