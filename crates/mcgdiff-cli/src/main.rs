mod commands;
mod logging;
mod progress;

use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, CorediffArgs, DasmArgs, ToolArgs};
use dotenv::dotenv;
use mcgdiff_core::plan::{self, ToolRun};
use mcgdiff_core::tools::RegistryResolver;
use mcgdiff_core::worklist::{self, ScanRoot};
use mcgdiff_core::{
    AppConfig, DiffEngine, DiffResult, ExecutorOptions, RunExecutor, RunSummary, ScanOptions,
    WorklistScanner,
};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let guard = logging::init_logger(args.verbose());

    let config = match mcgdiff_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            drop(guard);
            process::exit(1);
        }
    };

    let code = match args.command {
        Some(Commands::Dasm(args)) => exit_code(run_dasm(&config, &args)),
        Some(Commands::Corediff(args)) => exit_code(run_corediff(&config, &args)),
        Some(Commands::ListTools) => {
            list_tools(&config);
            0
        }
        Some(Commands::PrintConfig) => match toml::to_string_pretty(&config) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(err) => {
                error!("Error printing configuration: {}", err);
                1
            }
        },
        None => {
            let _ = Cli::command().print_long_help();
            0
        }
    };

    // process::exit skips destructors; flush the file log first.
    drop(guard);
    process::exit(code);
}

/// The total error count is the exit status; anything raised before work
/// starts exits with 1.
fn exit_code(result: anyhow::Result<usize>) -> i32 {
    match result {
        Ok(errors) => errors.min(255) as i32,
        Err(err) => {
            error!("Error: {:#}", err);
            1
        }
    }
}

fn run_dasm(config: &AppConfig, args: &DasmArgs) -> anyhow::Result<usize> {
    let runs = resolve_runs(config, &args.tools)?;
    plan::ensure_inputs(args.file.is_some(), &args.assemblies)?;
    let roots = worklist::build_roots(args.file.as_deref(), &args.assemblies, args.recursive)?;

    let mut options = ScanOptions::from(config);
    if args.jobs > 0 {
        options.threads = args.jobs;
    }

    let engine = build_engine(runs, options, &args.tools, args.recursive)?;
    Ok(execute(&engine, &roots, &args.platform))
}

fn run_corediff(config: &AppConfig, args: &CorediffArgs) -> anyhow::Result<usize> {
    if args.tools.output.is_none() {
        bail!("Specify --output <path>");
    }
    if args.do_test_tree() && args.test_root.is_none() {
        bail!("Specify --test_root <path>");
    }
    let runs = resolve_runs(config, &args.tools)?;
    let roots = corediff_roots(config, args);

    let mut scope = vec![config.core_assembly.clone()];
    if args.do_frameworks() {
        scope.push("framework assemblies".to_string());
    }
    if let (true, Some(test_root)) = (args.do_test_tree(), &args.test_root) {
        scope.push(test_root.display().to_string());
    }
    info!("Beginning diff of {}!", scope.join(", "));

    let platform = vec![args.core_root.display().to_string()];
    let engine = build_engine(runs, ScanOptions::from(config), &args.tools, args.do_test_tree())?;
    Ok(execute(&engine, &roots, &platform))
}

/// Core library, then framework assemblies, then the test directories.
fn corediff_roots(config: &AppConfig, args: &CorediffArgs) -> Vec<ScanRoot> {
    let mut roots = vec![ScanRoot::new(args.core_root.join(&config.core_assembly), false)];

    if args.do_frameworks() {
        for assembly in config
            .framework_assemblies
            .iter()
            .filter(|a| **a != config.core_assembly)
        {
            let path = args.core_root.join(assembly);
            if !path.is_file() {
                warn!("Can't find framework assembly {}", path.display());
                continue;
            }
            roots.push(ScanRoot::new(path, false));
        }
    }

    if let (true, Some(test_root)) = (args.do_test_tree(), &args.test_root) {
        for dir in &config.test_directories {
            let path = test_root.join(dir);
            if !path.is_dir() {
                warn!("Can't find test directory {}", path.display());
                continue;
            }
            roots.push(ScanRoot::new(path, true));
        }
    }

    roots
}

fn resolve_runs(config: &AppConfig, tools: &ToolArgs) -> anyhow::Result<Vec<ToolRun>> {
    let registry = RegistryResolver::from_config(config);
    let runs = plan::resolve_runs(tools.requests(&registry))?;
    Ok(runs)
}

fn build_engine(
    runs: Vec<ToolRun>,
    options: ScanOptions,
    tools: &ToolArgs,
    recursive: bool,
) -> anyhow::Result<DiffEngine> {
    let scanner = WorklistScanner::new(options).context("Error creating scanner")?;
    let executor = RunExecutor::new(ExecutorOptions {
        gc_info: tools.gcinfo,
        verbose: tools.verbose,
    });

    let engine = DiffEngine::new(runs, scanner, executor);
    Ok(match &tools.analyze {
        Some(tool) => engine.with_analysis(tool.clone(), recursive),
        None => engine,
    })
}

fn execute(engine: &DiffEngine, roots: &[ScanRoot], platform: &[String]) -> usize {
    let file_output = engine.runs().iter().all(|r| r.output_root.is_some());
    let reporter = CliReporter::new(file_output);
    let result = engine.run(roots, platform, &reporter);
    print_summary(&result);
    result.error_count()
}

fn print_summary(result: &DiffResult) {
    info!(
        "Scan: {}, Compile: {}",
        format!("{:.2}s", result.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.exec_duration.as_secs_f64()).green(),
    );
    info!(
        "{} assemblies, {} rejected candidates, {} inputs skipped",
        format!("{}", result.work_items).cyan(),
        format!("{}", result.rejected).cyan(),
        format!("{}", result.skipped_roots.len()).yellow(),
    );

    for run in &result.runs {
        if run.errors > 0 {
            error!("{}", run_line(run).red());
        } else {
            info!("{}", run_line(run));
        }
    }

    if let Some(code) = result.analysis_exit {
        info!("Analysis finished with exit code {}", code);
    }
}

/// Per-run totals; skipped counts inputs that vanished before compiling.
fn run_line(run: &RunSummary) -> String {
    format!(
        "{} set: {} compiled, {} skipped, {} errors in {:.2}s",
        run.tag,
        run.processed,
        run.skipped,
        run.errors,
        run.duration.as_secs_f64()
    )
}

fn list_tools(config: &AppConfig) {
    let registry = RegistryResolver::from_config(config);
    if registry.is_empty() {
        println!("No tools registered (add a [tools] table to Config.toml).");
        return;
    }

    println!("Available tools:");
    for (tag, path) in registry.iter() {
        let status = if path.is_file() {
            "".normal()
        } else {
            " (missing)".red()
        };
        println!("    {:<16} {}{}", tag, path.display(), status);
    }
}
