use clap::ValueEnum;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Terminal,
    Json,
}

/// Filter from `--log-level` when given, else `RUST_LOG`, else info.
pub fn log_filter(level: Option<&str>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

pub fn tracing_set(format: LogFormat, level: Option<&str>) -> anyhow::Result<()> {
    let json = (format == LogFormat::Json).then(|| fmt::layer().json().with_target(false));
    let terminal = (format == LogFormat::Terminal).then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(log_filter(level))
        .with(json)
        .with(terminal)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to setup logging: {}", e))
}
