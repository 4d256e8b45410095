use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use stampede_config::{ConfigLoader, ScalingKind, StampedeConfig};
use stampede_core::{ExecuteStatus, LogLevel, Scenario, WorkerId};
use stampede_execution::provider::process::MASTER_ADDRESS_ENV;
use stampede_execution::{
    builtin_registry, from_config, ExecutionCoordinator, JsonLinesProfiler, WorkerRuntime,
};
use stampede_logging::{init_master_tracing, init_simple_tracing, init_worker_tracing, LogCapture};

mod cli;
use cli::{Cli, Commands, ConfigCommands};

/// Where the configuration in use came from
#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    File(PathBuf),
    MissingFile(PathBuf),
    Environment,
}

impl ConfigSource {
    /// Configuration is loaded before tracing exists, so this is logged later
    fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from: {:?}", path),
            ConfigSource::MissingFile(path) => {
                warn!("Configuration file not found: {:?}. Using defaults.", path)
            }
            ConfigSource::Environment => {
                debug!("No configuration file specified. Loaded from environment or defaults.")
            }
        }
    }
}

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<(StampedeConfig, ConfigSource)> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) if path.exists() => {
            let config = loader
                .from_file(path)
                .context(format!("Failed to load configuration from {:?}", path))?;
            Ok((config, ConfigSource::File(path.clone())))
        }
        Some(path) => {
            let config = loader
                .from_env()
                .context("Failed to load configuration from environment")?;
            Ok((config, ConfigSource::MissingFile(path.clone())))
        }
        None => {
            let config = loader
                .from_env()
                .context("Failed to load configuration from environment")?;
            Ok((config, ConfigSource::Environment))
        }
    }
}

/// Run as worker: connect to the master, serve one run, exit
async fn run_worker_process(cli: &Cli) -> Result<()> {
    let master = cli
        .master
        .clone()
        .or_else(|| std::env::var(MASTER_ADDRESS_ENV).ok())
        .with_context(|| format!("Worker mode needs --master or {}", MASTER_ADDRESS_ENV))?;
    let worker_id = match &cli.worker_id {
        Some(id) => id.parse::<WorkerId>().context("Invalid --worker-id")?,
        None => WorkerId::new(),
    };

    // Worker output goes to stderr and, through the forwarder, to the master
    let (log_tx, log_rx) = mpsc::unbounded_channel();
    init_worker_tracing(cli.log_level.as_deref().unwrap_or("info"), Some(log_tx))?;
    info!(%worker_id, master = %master, "Starting worker process");

    let registry = Arc::new(builtin_registry().context("Failed to register built-in workloads")?);
    WorkerRuntime::new(worker_id, registry)
        .run(&master, Some(log_rx))
        .await
        .with_context(|| format!("Worker {} failed", worker_id))
}

/// Run one scenario as master and print its report
async fn run_master(
    config: StampedeConfig,
    source: &ConfigSource,
    scenario: Scenario,
    log_level: &str,
    profile_log: Option<&Path>,
) -> Result<ExecuteStatus> {
    let capture = LogCapture::new();
    init_master_tracing(log_level, capture.clone())?;
    source.log();

    let registry = Arc::new(builtin_registry().context("Failed to register built-in workloads")?);
    let provider = from_config(&config, Arc::clone(&registry));
    let mut coordinator = ExecutionCoordinator::new(&config, provider, capture);

    // Workers built from this binary know exactly these workloads
    let same_binary = match config.master.scaling {
        ScalingKind::InProcess => true,
        ScalingKind::Process => config.process.executable.is_none(),
        ScalingKind::Kubernetes => false,
    };
    coordinator = if same_binary {
        coordinator.with_registry(registry)
    } else {
        coordinator.with_master_hooks(registry)
    };
    if let Some(path) = profile_log {
        coordinator = coordinator.with_profiler(Arc::new(JsonLinesProfiler::new(path)));
    }
    let coordinator = Arc::new(coordinator);

    let interrupt = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping the run");
                coordinator.stop();
            }
        })
    };

    let outcome = coordinator.execute(scenario).await;
    interrupt.abort();
    let outcome = outcome.context("Run rejected")?;
    coordinator.wait_for_profiles().await;

    match &outcome.report {
        Some(report) => println!("{}", report),
        None => println!("No execution results were reported"),
    }
    if !outcome.failures.is_empty() {
        eprintln!("{} error(s) were logged during the run", outcome.failures.len());
    }
    if let Some(e) = &outcome.fail_error {
        eprintln!("Run aborted: {}", e);
    }

    info!(execute_id = %outcome.execute_id, status = %outcome.status, "Run complete");
    Ok(outcome.status)
}

fn handle_workloads() -> Result<()> {
    let registry = builtin_registry().context("Failed to register built-in workloads")?;
    for name in registry.names() {
        println!("{}", name);
    }
    Ok(())
}

/// Handle configuration validation
fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    ConfigLoader::new()
        .from_file(config_file)
        .context("Configuration validation failed")?;
    println!("Configuration file is valid");
    Ok(())
}

/// Handle configuration generation
fn handle_config_generate(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, StampedeConfig::generate_sample())
        .context("Failed to write configuration file")?;

    println!("Configuration generated at: {:?}", output);
    println!(
        "Validate with: stampede config validate --config-file {:?}",
        output
    );
    Ok(())
}

/// Render the configuration in use as YAML or JSON
fn render_config(config: &StampedeConfig, format: &str) -> Result<String> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::to_string(config).context("Failed to serialize to YAML"),
        "json" => serde_json::to_string_pretty(config).context("Failed to serialize to JSON"),
        _ => Err(anyhow::anyhow!(
            "Unknown output format: {}. Valid formats: yaml, json",
            format
        )),
    }
}

fn handle_config_show(config_file: Option<&PathBuf>, format: &str) -> Result<()> {
    let (config, source) = load_config(config_file)?;
    source.log();
    println!("{}", render_config(&config, format)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle worker mode first (before any logging setup to avoid conflicts)
    if cli.worker {
        return run_worker_process(&cli).await;
    }

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        let mut cmd = Cli::command();
        cmd.print_help().context("Failed to print help")?;
        println!();
        return Ok(());
    };

    let scenario = match command.scenario() {
        Some(scenario) => scenario?,
        None => {
            init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
            return match command {
                Commands::Workloads => handle_workloads(),
                Commands::Config { config_cmd } => match config_cmd {
                    ConfigCommands::Validate { config_file } => handle_config_validate(config_file),
                    ConfigCommands::Generate { output, force } => {
                        handle_config_generate(output, *force)
                    }
                    ConfigCommands::Show {
                        config_file,
                        format,
                    } => handle_config_show(config_file.as_ref().or(cli.config.as_ref()), format),
                },
                _ => Ok(()),
            };
        }
    };

    let (mut config, source) = load_config(cli.config.as_ref())?;
    if let Some(scaling) = cli.scaling {
        config.master.scaling = scaling;
    }
    let log_level = match &cli.log_level {
        Some(level) => {
            // Filter directives are passed through; plain levels also reach workers
            if let Ok(parsed) = level.parse::<LogLevel>() {
                config.logging.level = parsed;
            }
            level.clone()
        }
        None => config.logging.level.to_string(),
    };

    let status = run_master(
        config,
        &source,
        scenario,
        &log_level,
        cli.profile_log.as_deref(),
    )
    .await?;
    if status == ExecuteStatus::Error {
        return Err(anyhow::anyhow!("Run ended in {}", status));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stampede.yaml");

        handle_config_generate(&path, false).unwrap();
        handle_config_validate(&path).unwrap();

        // Existing files are kept unless forced
        assert!(handle_config_generate(&path, false).is_err());
        handle_config_generate(&path, true).unwrap();
    }

    #[test]
    fn test_validate_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "execution:\n  timeout: 0\n").unwrap();

        assert!(handle_config_validate(&path).is_err());
        assert!(handle_config_validate(&dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_load_config_reports_its_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stampede.yaml");
        handle_config_generate(&path, false).unwrap();

        let (_, source) = load_config(Some(&path)).unwrap();
        assert_eq!(source, ConfigSource::File(path));

        let missing = dir.path().join("missing.yaml");
        let (_, source) = load_config(Some(&missing)).unwrap();
        assert_eq!(source, ConfigSource::MissingFile(missing));
    }

    #[test]
    fn test_render_config_formats() {
        let config = StampedeConfig::default();

        let yaml = render_config(&config, "YAML").unwrap();
        assert!(yaml.contains("master:"));

        let json: serde_json::Value =
            serde_json::from_str(&render_config(&config, "json").unwrap()).unwrap();
        assert!(json.get("execution").is_some());

        assert!(render_config(&config, "toml").is_err());
    }
}
