//! CLI argument parsing definitions

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use stampede_config::ScalingKind;
use stampede_core::Scenario;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Distributed load testing orchestrator", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// How workers are launched: in-process, process, kubernetes
    #[arg(long, value_name = "KIND", global = true)]
    pub scaling: Option<ScalingKind>,

    /// Append a JSON line per finished run to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub profile_log: Option<PathBuf>,

    /// Run as worker process (internal use)
    #[arg(long, hide = true)]
    pub worker: bool,

    /// Worker ID (used with --worker)
    #[arg(long, value_name = "ID", hide = true)]
    pub worker_id: Option<String>,

    /// Master address to connect to (used with --worker)
    #[arg(long, value_name = "HOST:PORT", hide = true)]
    pub master: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
pub struct WorkloadArgs {
    /// Registered workload to run
    #[arg(long, value_name = "NAME")]
    pub workload_name: String,

    /// Number of workers to launch
    #[arg(long, value_name = "N")]
    pub worker_count: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the workload once on every worker
    Batch {
        #[command(flatten)]
        target: WorkloadArgs,
    },

    /// Run a fixed number of executions per workload unit
    Request {
        #[command(flatten)]
        target: WorkloadArgs,

        /// Concurrent workload units per worker
        #[arg(long, value_name = "N")]
        workload_per_worker: u32,

        /// Executions run by each workload unit
        #[arg(long, value_name = "N")]
        execute_per_workload: u32,
    },

    /// Grow the number of workload units per worker over time
    Rampup {
        #[command(flatten)]
        target: WorkloadArgs,

        /// Upper bound on workload units per worker
        #[arg(long, value_name = "N")]
        max_workload_per_worker: u32,

        /// Units added per wave
        #[arg(long, value_name = "N")]
        workload_spawn_count: u32,

        /// Seconds between waves
        #[arg(long, value_name = "SECONDS")]
        workload_spawn_second: u32,
    },

    /// Run a scenario given as an argument vector
    /// (example: stampede exec request -workloadName noop -workerCount 2 ...)
    Exec {
        #[arg(
            value_name = "ARGS",
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        args: Vec<String>,
    },

    /// List the registered workloads
    Workloads,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

impl Commands {
    /// The scenario a run command describes; `None` for other commands
    pub fn scenario(&self) -> Option<Result<Scenario>> {
        let scenario = match self {
            Commands::Batch { target } => Scenario::batch(&target.workload_name, target.worker_count),
            Commands::Request {
                target,
                workload_per_worker,
                execute_per_workload,
            } => Scenario::request(
                &target.workload_name,
                target.worker_count,
                *workload_per_worker,
                *execute_per_workload,
            ),
            Commands::Rampup {
                target,
                max_workload_per_worker,
                workload_spawn_count,
                workload_spawn_second,
            } => Scenario::rampup(
                &target.workload_name,
                target.worker_count,
                *max_workload_per_worker,
                *workload_spawn_count,
                *workload_spawn_second,
            ),
            Commands::Exec { args } => Scenario::from_args(args.as_slice()),
            Commands::Workloads | Commands::Config { .. } => return None,
        };
        Some(scenario.map_err(anyhow::Error::from))
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration in use
    Show {
        /// Path to configuration file (optional, uses default loading logic)
        #[arg(long, value_name = "PATH")]
        config_file: Option<PathBuf>,

        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}
