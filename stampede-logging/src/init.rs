use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::capture::{CaptureLayer, LogCapture};
use crate::forward::{ForwardLayer, ForwardedLog};

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize the master's subscriber: console output plus the capture
/// pipeline the coordinator reads failures from
pub fn init_master_tracing(log_level: &str, capture: LogCapture) -> Result<()> {
    let console_layer = tracing_subscriber::fmt::layer().with_target(false);

    if tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(console_layer)
        .with(CaptureLayer::new(capture))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize a worker's subscriber.
///
/// Worker processes write to stderr; the master drains it line by line.
/// When a forwarder is given, events are also sent to the master over IPC.
pub fn init_worker_tracing(
    log_level: &str,
    forwarder: Option<UnboundedSender<ForwardedLog>>,
) -> Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);
    let forward_layer = forwarder.map(|tx| ForwardLayer::new(tx).exclude_target("stampede_ipc"));

    if tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(stderr_layer)
        .with(forward_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    tracing::debug!("Worker tracing initialized");
    Ok(())
}
