//! Logging setup for the dmrelay binary
//!
//! Console output goes to stderr so stdout stays free for command output.
//! `RUST_LOG` takes precedence over the configured level.

use anyhow::Context;
use dmrelay_common::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// Keeps the file writer alive and allows raising the level later
pub struct LoggingGuard {
    filter: reload::Handle<EnvFilter, Registry>,
    _file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Switch every target to debug output
    pub fn enable_debug(&self) {
        if let Err(e) = self.filter.modify(|filter| *filter = EnvFilter::new("debug")) {
            tracing::warn!(error = %e, "Failed to raise log level");
        }
    }
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig, verbose: bool) -> anyhow::Result<LoggingGuard> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };
    let (filter, handle) = reload::Layer::new(filter);

    let json = config.format.eq_ignore_ascii_case("json");
    let (text_layer, json_layer) = if json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(fmt::layer().with_target(true).with_writer(std::io::stderr)),
            None,
        )
    };

    let (file_layer, file_guard) = match config.file.as_deref() {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        filter: handle,
        _file_guard: file_guard,
    })
}

fn open_log_file(path: &Path) -> anyhow::Result<tracing_appender::rolling::RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    Ok(tracing_appender::rolling::never(dir, file_name))
}
