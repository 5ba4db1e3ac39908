use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `{data_dir}/parla/logs`
pub fn log_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("parla").join("logs"))
}

/// Initialize file logging.
///
/// The terminal belongs to the UI, so everything goes to `parla.log` files
/// rotated daily (5 kept). The filter defaults to `info` and can be changed
/// with `RUST_LOG`. Keep the returned guard alive until exit or buffered
/// lines are lost.
pub fn init() -> Result<WorkerGuard> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("parla")
        .filename_suffix("log")
        .max_log_files(5)
        .build(&dir)?;
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    // reqwest and hyper are chatty at debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()?;

    tracing::info!(log_dir = %dir.display(), "Logger initialized");
    Ok(guard)
}
