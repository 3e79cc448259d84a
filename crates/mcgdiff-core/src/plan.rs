use crate::error::Error;
use crate::worklist::WorkItem;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DASM_EXTENSION: &str = "dasm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolRole {
    Base,
    Diff,
}

impl ToolRole {
    pub fn default_tag(self) -> &'static str {
        match self {
            ToolRole::Base => "base",
            ToolRole::Diff => "diff",
        }
    }
}

impl fmt::Display for ToolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_tag())
    }
}

/// A compiler run as requested on the command line, before validation.
#[derive(Debug, Clone)]
pub struct ToolRunRequest {
    pub role: ToolRole,
    pub executable: PathBuf,
    pub tag: Option<String>,
    pub output_root: Option<PathBuf>,
}

/// A validated compiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    pub role: ToolRole,
    pub executable_path: PathBuf,
    pub tag: String,
    /// `None` forwards the compiler output to the console.
    pub output_root: Option<PathBuf>,
}

impl ToolRun {
    /// The directory this run writes under, if it writes files at all.
    pub fn tagged_root(&self) -> Option<PathBuf> {
        self.output_root.as_ref().map(|root| root.join(&self.tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    File(PathBuf),
    Console,
}

#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Index into `OutputPlan::runs`.
    pub run: usize,
    pub input: PathBuf,
    pub destination: Destination,
}

#[derive(Debug, Clone, Default)]
pub struct OutputPlan {
    pub runs: Vec<ToolRun>,
    /// Grouped by run, then in worklist order.
    pub entries: Vec<PlanEntry>,
    /// Platform assembly search paths, forwarded to the compiler untouched.
    pub platform_paths: Vec<String>,
}

impl OutputPlan {
    pub fn entries_for(&self, run: usize) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(move |e| e.run == run)
    }
}

/// Nothing to scan is a configuration error, raised before any scanning.
pub fn ensure_inputs(has_file_list: bool, paths: &[PathBuf]) -> Result<(), Error> {
    if !has_file_list && paths.is_empty() {
        return Err(Error::NoInput);
    }
    Ok(())
}

/// Validate the requested runs and assign their tags.
///
/// One run may carry an explicit tag. With both base and diff the default
/// tags are used and an explicit tag is rejected, since both runs would
/// land in the same subtree.
pub fn resolve_runs(requests: Vec<ToolRunRequest>) -> Result<Vec<ToolRun>, Error> {
    if requests.is_empty() || requests.len() > 2 {
        return Err(Error::RunCount(requests.len()));
    }
    if requests.len() == 2 && requests[0].role == requests[1].role {
        return Err(Error::DuplicateRole(requests[0].role));
    }

    let single = requests.len() == 1;
    let mut runs: Vec<ToolRun> = Vec::with_capacity(requests.len());

    for request in requests {
        let tag = match request.tag {
            Some(tag) if single => tag,
            Some(tag) => return Err(Error::TagConflict(tag)),
            None => request.role.default_tag().to_string(),
        };

        let executable_path = resolve_executable(request.role, &request.executable)?;

        if let Some(other) = runs
            .iter()
            .find(|r| r.tag == tag && r.output_root == request.output_root)
        {
            return Err(Error::TagConflict(other.tag.clone()));
        }

        runs.push(ToolRun {
            role: request.role,
            executable_path,
            tag,
            output_root: request.output_root,
        });
    }

    // Base always runs first.
    runs.sort_by_key(|r| r.role != ToolRole::Base);
    Ok(runs)
}

fn resolve_executable(role: ToolRole, executable: &Path) -> Result<PathBuf, Error> {
    let not_found = || Error::ToolNotFound {
        role,
        path: executable.to_path_buf(),
    };
    if !executable.is_file() {
        return Err(not_found());
    }
    std::path::absolute(executable).map_err(|_| not_found())
}

/// `output_root / tag / relative_output_path / name.dasm`, or the console.
pub fn destination(run: &ToolRun, item: &WorkItem) -> Destination {
    match run.tagged_root() {
        Some(root) => {
            let file_name = Path::new(&item.name).with_extension(DASM_EXTENSION);
            Destination::File(root.join(&item.relative_output_path).join(file_name))
        }
        None => Destination::Console,
    }
}

/// Pair every run with every item. Pure; nothing touches the filesystem.
pub fn plan(items: &[WorkItem], runs: &[ToolRun], platform_paths: &[String]) -> OutputPlan {
    let entries = runs
        .iter()
        .enumerate()
        .flat_map(|(index, run)| {
            items.iter().map(move |item| PlanEntry {
                run: index,
                input: item.input_path(),
                destination: destination(run, item),
            })
        })
        .collect();

    OutputPlan {
        runs: runs.to_vec(),
        entries,
        platform_paths: platform_paths.to_vec(),
    }
}
