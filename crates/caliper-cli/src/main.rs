//! Caliper - command benchmarking CLI
//!
//! Without a subcommand, `caliper` benchmarks a shell command on the host:
//!
//! ```text
//! caliper --runs 10 --command "cargo build --release"
//! ```
//!
//! ## Commands
//!
//! - `matrix custom`: explicit `CPU:MEM` pairs
//! - `matrix sweep-cpu`: vary CPUs at a fixed RAM
//! - `matrix sweep-ram`: vary RAM at a fixed CPU count
//! - `matrix all`: every CPU x RAM combination

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use caliper_core::{
    default_name, listen_for_shutdown, print_console, save_csv, save_json, save_markdown,
    BenchmarkConfig, BenchmarkRunner, CancellationToken, HostShell,
};
use caliper_matrix::chart::charts_for;
use caliper_matrix::{
    grid, parse_configs, parse_int_list, print_summary, resolve_artifact, save_summary,
    sweep_cpu, sweep_ram, DockerCli, MatrixConfig, MatrixKind, MatrixOrchestrator,
};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "caliper")]
#[command(author = "Attune")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Benchmark shell commands, optionally across CPU/RAM limits", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    bench: BenchArgs,

    #[command(subcommand)]
    subcommand: Option<Commands>,
}

#[derive(clap::Args, Debug)]
struct BenchArgs {
    /// Number of measured runs
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    runs: Option<u64>,

    /// Shell command to benchmark
    #[arg(short, long)]
    command: Option<String>,

    /// Directory for the JSON/CSV/Markdown reports
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Report name (default: benchmark_<timestamp>)
    #[arg(long)]
    name: Option<String>,

    /// Skip the warm-up run
    #[arg(long)]
    no_warmup: bool,

    /// Stream command output live
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Benchmark across CPU/RAM configurations in isolated containers
    Matrix {
        #[command(subcommand)]
        kind: MatrixCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MatrixCommand {
    /// Explicit configurations, e.g. --configs "2:8,4:16"
    Custom {
        /// Comma-separated CPU:MEM pairs (MEM in GB)
        #[arg(long)]
        configs: String,

        #[command(flatten)]
        common: MatrixArgs,
    },

    /// Vary CPU count at a fixed RAM
    SweepCpu {
        /// Comma-separated CPU counts
        #[arg(long)]
        cpus: String,

        /// Fixed RAM in GB
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        ram: u32,

        #[command(flatten)]
        common: MatrixArgs,
    },

    /// Vary RAM at a fixed CPU count
    SweepRam {
        /// Comma-separated RAM sizes in GB
        #[arg(long)]
        rams: String,

        /// Fixed CPU count
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        cpu: u32,

        #[command(flatten)]
        common: MatrixArgs,
    },

    /// Every combination of the given CPU counts and RAM sizes
    All {
        /// Comma-separated CPU counts
        #[arg(long)]
        cpus: String,

        /// Comma-separated RAM sizes in GB
        #[arg(long)]
        rams: String,

        #[command(flatten)]
        common: MatrixArgs,
    },
}

#[derive(clap::Args, Debug)]
struct MatrixArgs {
    /// Container image (must provide git and bash)
    #[arg(long)]
    image: String,

    /// Git repository to clone into each container
    #[arg(long)]
    repo: String,

    /// Command to benchmark inside the cloned repository
    #[arg(short, long)]
    command: String,

    /// Measured runs per configuration
    #[arg(short = 'n', long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    runs: u64,

    /// Directory for per-configuration results and summaries
    #[arg(long, default_value = "./matrix-results")]
    output_dir: PathBuf,

    /// Matrix name (default: <kind>_<timestamp>)
    #[arg(long)]
    name: Option<String>,

    /// Skip the warm-up run in every configuration
    #[arg(long)]
    no_warmup: bool,

    /// Stream benchmark output live
    #[arg(long)]
    debug: bool,

    /// Pre-built Linux caliper binary to stage into containers
    #[arg(long, env = "CALIPER_ARTIFACT")]
    artifact: Option<PathBuf>,

    /// Container runtime client binary
    #[arg(long, env = "CALIPER_DOCKER", default_value = "docker")]
    docker: String,
}

impl MatrixCommand {
    fn common(&self) -> &MatrixArgs {
        match self {
            MatrixCommand::Custom { common, .. }
            | MatrixCommand::SweepCpu { common, .. }
            | MatrixCommand::SweepRam { common, .. }
            | MatrixCommand::All { common, .. } => common,
        }
    }
}

/// Build the immutable matrix config, validating every list up front.
fn matrix_config(command: &MatrixCommand) -> Result<MatrixConfig> {
    let common = command.common();
    let (kind, configs) = match command {
        MatrixCommand::Custom { configs, .. } => (MatrixKind::Custom, parse_configs(configs)?),
        MatrixCommand::SweepCpu { cpus, ram, .. } => {
            (MatrixKind::SweepCpu, sweep_cpu(&parse_int_list(cpus)?, *ram))
        }
        MatrixCommand::SweepRam { rams, cpu, .. } => {
            (MatrixKind::SweepRam, sweep_ram(&parse_int_list(rams)?, *cpu))
        }
        MatrixCommand::All { cpus, rams, .. } => {
            let cpu_list = parse_int_list(cpus)?;
            let ram_list = parse_int_list(rams)?;
            (MatrixKind::All, grid(&cpu_list, &ram_list))
        }
    };

    let mut config = MatrixConfig::new(
        kind,
        common.image.clone(),
        common.repo.clone(),
        common.command.clone(),
        configs,
    );
    config.runs = common.runs as usize;
    config.output_dir = common.output_dir.clone();
    if let Some(name) = &common.name {
        config.name = name.clone();
    }
    config.skip_warmup = common.no_warmup;
    config.debug = common.debug;

    match command {
        MatrixCommand::SweepCpu { cpus, ram, .. } => {
            config.fixed_ram = Some(*ram);
            config.cpu_list = parse_int_list(cpus)?;
        }
        MatrixCommand::SweepRam { rams, cpu, .. } => {
            config.fixed_cpu = Some(*cpu);
            config.ram_list = parse_int_list(rams)?;
        }
        MatrixCommand::All { cpus, rams, .. } => {
            config.cpu_list = parse_int_list(cpus)?;
            config.ram_list = parse_int_list(rams)?;
        }
        MatrixCommand::Custom { .. } => {}
    }

    config.validate()?;
    Ok(config)
}

/// Build the single-benchmark config. `None` means nothing was asked for.
fn bench_config(args: &BenchArgs) -> Result<Option<BenchmarkConfig>> {
    let (runs, command) = match (args.runs, &args.command) {
        (None, None) => return Ok(None),
        (Some(runs), Some(command)) => (runs, command),
        (None, Some(_)) => bail!("--runs is required"),
        (Some(_), None) => bail!("--command is required"),
    };

    let mut config = BenchmarkConfig::new(command.clone(), runs as usize);
    config.name = args.name.clone().unwrap_or_else(|| default_name("benchmark"));
    config.output_dir = args.output_dir.clone();
    config.skip_warmup = args.no_warmup;
    config.debug = args.debug;
    Ok(Some(config))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let debug = cli.bench.debug
        || matches!(&cli.subcommand, Some(Commands::Matrix { kind }) if kind.common().debug);
    let level = if cli.verbose || debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    caliper_core::init_tracing(cli.json, level);

    let cancel = CancellationToken::new();
    let _listener = listen_for_shutdown(cancel.clone());

    match &cli.subcommand {
        Some(Commands::Matrix { kind }) => cmd_matrix(kind, cancel).await,
        None => match bench_config(&cli.bench)? {
            Some(config) => cmd_bench(config, cancel).await,
            None => {
                Cli::command().print_help()?;
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}

async fn cmd_bench(config: BenchmarkConfig, cancel: CancellationToken) -> Result<ExitCode> {
    println!("Caliper Benchmark");
    println!("=================");
    println!("Command: {}", config.command);
    println!("Runs:    {}", config.runs);
    println!("Warm-up: {}", if config.skip_warmup { "disabled" } else { "enabled" });
    println!("Name:    {}\n", config.name);

    let shell = HostShell::new();
    let outcome = BenchmarkRunner::new(&shell)
        .with_cancellation(cancel)
        .run(&config)
        .await
        .context("benchmark aborted")?;

    print_console(&outcome);
    save_reports(&outcome);

    if outcome.success_rate < 100.0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Report write failures are warnings; the measurements already happened.
fn save_reports(outcome: &caliper_core::BenchmarkOutcome) {
    let dir = &outcome.config.output_dir;
    if let Err(err) = std::fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %err, "cannot create output directory");
        println!("\nWarning: could not create {}: {}", dir.display(), err);
        return;
    }

    let name = &outcome.config.name;
    let writers: [(&str, fn(&caliper_core::BenchmarkOutcome, &std::path::Path) -> Result<()>); 3] = [
        ("json", save_json),
        ("csv", save_csv),
        ("md", save_markdown),
    ];

    println!("\nReports:");
    for (ext, write) in writers {
        let path = dir.join(format!("{}.{}", name, ext));
        match write(outcome, &path) {
            Ok(()) => println!("  {}", path.display()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to write report");
                println!("  Warning: failed to write {}: {:#}", path.display(), err);
            }
        }
    }
}

async fn cmd_matrix(command: &MatrixCommand, cancel: CancellationToken) -> Result<ExitCode> {
    let config = matrix_config(command)?;
    let common = command.common();

    let artifact = resolve_artifact(common.artifact.as_deref())
        .await
        .context("cannot locate a Linux caliper binary for the containers")?;
    info!(artifact = %artifact.display(), "using artifact");

    let runtime = Arc::new(DockerCli::with_binary(common.docker.clone()));
    let result = MatrixOrchestrator::new(runtime, artifact)
        .with_cancellation(cancel)
        .run(&config)
        .await
        .context("matrix run failed")?;

    print_summary(&result);
    for chart in charts_for(&result) {
        println!();
        print!("{}", chart);
    }

    match save_summary(&result, &config.output_dir) {
        Ok(paths) => {
            println!("\nSummary reports:");
            for path in paths {
                println!("  {}", path.display());
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to write matrix summary");
            println!("\nWarning: failed to write summary reports: {:#}", err);
        }
    }

    if result.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bench_args() {
        let cli = parse(&["caliper", "-n", "5", "-c", "make", "--no-warmup", "--name", "x"]);
        let config = bench_config(&cli.bench).unwrap().unwrap();
        assert_eq!(config.runs, 5);
        assert_eq!(config.command, "make");
        assert!(config.skip_warmup);
        assert_eq!(config.name, "x");
        assert_eq!(config.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_no_args_means_help() {
        let cli = parse(&["caliper"]);
        assert!(bench_config(&cli.bench).unwrap().is_none());
    }

    #[test]
    fn test_command_without_runs_is_error() {
        let cli = parse(&["caliper", "-c", "make"]);
        assert!(bench_config(&cli.bench).is_err());
    }

    #[test]
    fn test_zero_runs_rejected_by_parser() {
        assert!(Cli::try_parse_from(["caliper", "-n", "0", "-c", "make"]).is_err());
    }

    #[test]
    fn test_matrix_all_builds_grid() {
        let cli = parse(&[
            "caliper", "matrix", "all", "--cpus", "2,4", "--rams", "8,16", "--image",
            "rust:latest", "--repo", "https://github.com/org/widget.git", "-c", "make",
        ]);
        let Some(Commands::Matrix { kind }) = &cli.subcommand else {
            panic!("expected matrix command");
        };
        let config = matrix_config(kind).unwrap();
        assert_eq!(config.kind, MatrixKind::All);
        assert_eq!(config.runs, 10);
        assert_eq!(config.output_dir, PathBuf::from("./matrix-results"));
        assert_eq!(config.configs.len(), 4);
        assert_eq!(config.cpu_list, vec![2, 4]);
        assert_eq!(config.ram_list, vec![8, 16]);
        assert!(config.name.starts_with("all_"));
    }

    #[test]
    fn test_matrix_sweep_cpu_records_fixed_ram() {
        let cli = parse(&[
            "caliper", "matrix", "sweep-cpu", "--cpus", "1,2", "--ram", "8", "--image", "img",
            "--repo", "r", "-c", "make", "-n", "3",
        ]);
        let Some(Commands::Matrix { kind }) = &cli.subcommand else {
            panic!("expected matrix command");
        };
        let config = matrix_config(kind).unwrap();
        assert_eq!(config.fixed_ram, Some(8));
        assert_eq!(config.runs, 3);
        assert!(config.configs.iter().all(|c| c.memory_gb == 8));
    }

    #[test]
    fn test_matrix_custom_rejects_malformed_configs() {
        let cli = parse(&[
            "caliper", "matrix", "custom", "--configs", "2:8:1", "--image", "img", "--repo", "r",
            "-c", "make",
        ]);
        let Some(Commands::Matrix { kind }) = &cli.subcommand else {
            panic!("expected matrix command");
        };
        assert!(matrix_config(kind).is_err());
    }

    #[test]
    fn test_matrix_requires_image() {
        assert!(Cli::try_parse_from([
            "caliper", "matrix", "custom", "--configs", "2:8", "--repo", "r", "-c", "make",
        ])
        .is_err());
    }
}
