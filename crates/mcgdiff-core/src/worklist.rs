use crate::classifier::{self, Probe};
use crate::config::AppConfig;
use crate::error::Error;
use crate::progress::ProgressReporter;
use glob::Pattern;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// One discovered compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// File name including extension, exactly as on disk.
    pub name: OsString,
    /// Absolute directory holding the file.
    pub source_directory: PathBuf,
    /// Source directory relative to the scan root that found the item.
    /// Empty for items directly under the root and for single-file roots.
    pub relative_output_path: PathBuf,
}

impl WorkItem {
    pub fn input_path(&self) -> PathBuf {
        self.source_directory.join(&self.name)
    }
}

/// One user-specified input: a file, or a directory to scan.
#[derive(Debug, Clone)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub is_directory: bool,
    pub recursive: bool,
}

impl ScanRoot {
    pub fn new(path: impl Into<PathBuf>, recursive: bool) -> Self {
        let path = path.into();
        let is_directory = path.is_dir();
        Self {
            path,
            is_directory,
            recursive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub extensions: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub threads: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScanOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            exclude_patterns: config.exclude_patterns.clone(),
            threads: config.scan_threads,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub items: Vec<WorkItem>,
    /// Roots that did not exist (or vanished) and were skipped.
    pub skipped_roots: Vec<PathBuf>,
    /// Candidates that failed classification.
    pub rejected: usize,
}

pub struct WorklistScanner {
    extensions: Vec<String>,
    exclude_patterns: Vec<Pattern>,
    pool: ThreadPool,
}

impl WorklistScanner {
    pub fn new(options: ScanOptions) -> Result<Self, Error> {
        let exclude_patterns = options
            .exclude_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        let pool = ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .thread_name(|i| format!("classify-{}", i))
            .build()?;

        Ok(Self {
            extensions: options
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            exclude_patterns,
            pool,
        })
    }

    /// Scan every root in order. Bad roots are warned about and skipped.
    pub fn scan(&self, roots: &[ScanRoot], reporter: &dyn ProgressReporter) -> ScanOutcome {
        reporter.on_scan_start();
        let start = Instant::now();
        let mut outcome = ScanOutcome::default();

        for root in roots {
            if root.is_directory {
                self.scan_directory(root, reporter, &mut outcome);
            } else if root.path.exists() {
                match single_file_item(&root.path) {
                    Some(item) => {
                        reporter.on_scan_progress(outcome.items.len() + 1, &root.path.to_string_lossy());
                        outcome.items.push(item);
                    }
                    None => {
                        warn!("Can't resolve assembly {}, skipping", root.path.display());
                        outcome.skipped_roots.push(root.path.clone());
                    }
                }
            } else {
                warn!("Can't find assembly {}, skipping", root.path.display());
                outcome.skipped_roots.push(root.path.clone());
            }
        }

        reporter.on_scan_complete(outcome.items.len(), start.elapsed().as_secs_f64());
        outcome
    }

    /// Extension and exclusion check on the file name only, no I/O.
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        let extension_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false);

        extension_matches && !self.exclude_patterns.iter().any(|p| p.matches(&name))
    }

    fn scan_directory(
        &self,
        root: &ScanRoot,
        reporter: &dyn ProgressReporter,
        outcome: &mut ScanOutcome,
    ) {
        let root_dir = match fs::canonicalize(&root.path) {
            Ok(dir) => dir,
            Err(err) => {
                warn!("Can't read directory {}: {}, skipping", root.path.display(), err);
                outcome.skipped_roots.push(root.path.clone());
                return;
            }
        };
        info!("Processing directory: {}", root_dir.display());

        let max_depth = if root.recursive { usize::MAX } else { 1 };
        let mut candidates: Vec<PathBuf> = Vec::new();

        // A directory's own files come before its subdirectories.
        for entry in WalkDir::new(&root_dir).max_depth(max_depth).sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        }) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error walking {}: {}", root_dir.display(), err);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_candidate(entry.path()) {
                candidates.push(entry.into_path());
            }
        }

        // Indexed collect keeps the walk order.
        let probes: Vec<(PathBuf, Probe)> = self.pool.install(|| {
            candidates
                .into_par_iter()
                .map(|path| {
                    debug!("Scanning: {}", path.display());
                    let probe = classifier::probe(&path);
                    (path, probe)
                })
                .collect()
        });

        for (path, probe) in probes {
            match probe {
                Probe::Missing => {
                    warn!("Can't find {}, skipping", path.display());
                    continue;
                }
                Probe::NotAssembly(reason) => {
                    debug!("Not an assembly {}: {}", path.display(), reason);
                    outcome.rejected += 1;
                    continue;
                }
                Probe::Assembly | Probe::Busy => {}
            }

            if let Some(item) = directory_item(&root_dir, &path) {
                reporter.on_scan_progress(outcome.items.len() + 1, &path.to_string_lossy());
                outcome.items.push(item);
            }
        }
    }
}

fn single_file_item(path: &Path) -> Option<WorkItem> {
    let full = fs::canonicalize(path).ok()?;
    Some(WorkItem {
        name: full.file_name()?.to_os_string(),
        source_directory: full.parent()?.to_path_buf(),
        relative_output_path: PathBuf::new(),
    })
}

fn directory_item(root_dir: &Path, path: &Path) -> Option<WorkItem> {
    let source_directory = path.parent()?;
    let relative_output_path = source_directory
        .strip_prefix(root_dir)
        .map(Path::to_path_buf)
        .unwrap_or_default();

    Some(WorkItem {
        name: path.file_name()?.to_os_string(),
        source_directory: source_directory.to_path_buf(),
        relative_output_path,
    })
}

/// Read a newline-delimited list of paths. Lines naming nothing are skipped.
pub fn read_file_list(path: &Path) -> Result<Vec<PathBuf>, Error> {
    let file_list_error = |source| Error::FileList {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(file_list_error)?;

    let mut paths = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(file_list_error)?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let entry = PathBuf::from(line);
        if !entry.exists() {
            warn!("Can't find {} skipping...", entry.display());
            continue;
        }
        paths.push(entry);
    }

    Ok(paths)
}

/// File-list entries first, then the positional paths, all with one
/// recursion setting. Duplicates are kept.
pub fn build_roots(
    file_list: Option<&Path>,
    paths: &[PathBuf],
    recursive: bool,
) -> Result<Vec<ScanRoot>, Error> {
    let mut roots = Vec::new();
    if let Some(list) = file_list {
        roots.extend(
            read_file_list(list)?
                .into_iter()
                .map(|p| ScanRoot::new(p, recursive)),
        );
    }
    roots.extend(paths.iter().map(|p| ScanRoot::new(p.clone(), recursive)));
    Ok(roots)
}
