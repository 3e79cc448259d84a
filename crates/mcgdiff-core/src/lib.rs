pub mod analyze;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod plan;
pub mod progress;
pub mod tools;
pub mod worklist;

pub use config::AppConfig;
pub use engine::{DiffEngine, DiffResult};
pub use error::Error;
pub use executor::{ExecutorOptions, RunExecutor, RunSummary};
pub use plan::{Destination, OutputPlan, ToolRole, ToolRun, ToolRunRequest};
pub use progress::{ProgressReporter, SilentReporter};
pub use worklist::{ScanOptions, ScanRoot, WorkItem, WorklistScanner};
