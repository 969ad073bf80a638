//! Global tracing subscriber setup.

use anyhow::{Context as _, Result, anyhow};
use partnergate_config::{LogConfig, LogFormat};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer as _,
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

/// Install the global subscriber described by `log`.
///
/// `RUST_LOG` takes precedence over `log.level`. When `log.file` is set, events
/// go through a non-blocking appender; keep the returned guard alive until exit
/// so buffered lines are flushed.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid, the log file path has
/// no file name, or a global subscriber is already installed.
pub fn init(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .with_context(|| format!("invalid log level directive: {}", log.level))?;

    let (writer, guard) = match &log.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("log file has no file name: {}", path.display()))?;
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let layer = match log.format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_ansi(log.file.is_none())
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}
