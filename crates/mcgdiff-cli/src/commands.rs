use clap::{Args, Parser, Subcommand};
use mcgdiff_core::tools::{resolve_tool, ToolResolver};
use mcgdiff_core::{ToolRole, ToolRunRequest};
use std::path::PathBuf;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "mcgdiff")]
#[command(about = "Generate diffable disassembly with base and diff compilers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        match &self.command {
            Some(Commands::Dasm(args)) => args.tools.verbose,
            Some(Commands::Corediff(args)) => args.tools.verbose,
            _ => false,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Disassemble assemblies, or directories of assemblies, with --base and/or --diff
    Dasm(DasmArgs),
    /// Disassemble the core library, framework assemblies and test tree of a runtime
    Corediff(CorediffArgs),
    /// List compilers in the tool registry
    ListTools,
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct ToolArgs {
    /// The base compiler exe, or its tag in the tool registry
    #[arg(short, long)]
    pub base: Option<String>,
    /// The diff compiler exe, or its tag in the tool registry
    #[arg(short, long)]
    pub diff: Option<String>,
    /// The output path. Without it disassembly goes to the console
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Name of root in output directory. Allows for many sets of output
    #[arg(short, long)]
    pub tag: Option<String>,
    /// Add GC info to the disasm output
    #[arg(long)]
    pub gcinfo: bool,
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
    /// Analysis tool to run over the base and diff output when both are generated
    #[arg(long, value_name = "TOOL")]
    pub analyze: Option<PathBuf>,
}

impl ToolArgs {
    /// Base before diff; names not found on disk are looked up in the registry.
    pub fn requests(&self, resolver: &dyn ToolResolver) -> Vec<ToolRunRequest> {
        [(ToolRole::Base, &self.base), (ToolRole::Diff, &self.diff)]
            .into_iter()
            .filter_map(|(role, tool)| {
                tool.as_deref().map(|name| ToolRunRequest {
                    role,
                    executable: resolve_tool(name, resolver),
                    tag: self.tag.clone(),
                    output_root: self.output.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Args)]
pub struct DasmArgs {
    #[command(flatten)]
    pub tools: ToolArgs,
    /// Name of file to take list of assemblies from. Both a file and assembly list can be used
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Scan directories recursively
    #[arg(short, long)]
    pub recursive: bool,
    /// Path to platform assemblies
    #[arg(short, long)]
    pub platform: Vec<String>,
    /// Classification threads (0 uses the configured value)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
    /// The list of assemblies or directories to scan for assemblies
    #[arg(value_name = "ASSEMBLY")]
    pub assemblies: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CorediffArgs {
    #[command(flatten)]
    pub tools: ToolArgs,
    /// Path to test CORE_ROOT
    #[arg(long = "core_root")]
    pub core_root: PathBuf,
    /// Path to test tree
    #[arg(long = "test_root")]
    pub test_root: Option<PathBuf>,
    /// Disasm the core library only
    #[arg(short, long = "mscorlibonly")]
    pub mscorlib_only: bool,
    /// Disasm frameworks only
    #[arg(short, long = "frameworksonly")]
    pub frameworks_only: bool,
}

impl CorediffArgs {
    pub fn do_frameworks(&self) -> bool {
        !self.mscorlib_only
    }

    pub fn do_test_tree(&self) -> bool {
        !self.mscorlib_only && !self.frameworks_only
    }
}
