use crate::plan::ToolRole;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Can't find --{role} tool: {}", path.display())]
    ToolNotFound { role: ToolRole, path: PathBuf },

    #[error("Multiple compilers with the same tag '{0}': specify --diff OR --base separately with --tag (one compiler for one tag)")]
    TagConflict(String),

    #[error("More than one {0} compiler specified")]
    DuplicateRole(ToolRole),

    #[error("Expected one or two compilers, got {0}: specify --base and/or --diff")]
    RunCount(usize),

    #[error("No input: specify --file <arg> or list input assemblies")]
    NoInput,

    #[error("Error reading input file {}: {source}", path.display())]
    FileList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// True for errors raised while validating input, before any work starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ToolNotFound { .. }
                | Error::TagConflict(_)
                | Error::DuplicateRole(_)
                | Error::RunCount(_)
                | Error::NoInput
                | Error::FileList { .. }
        )
    }
}
