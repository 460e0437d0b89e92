use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{registry, EnvFilter};

const LOG_FILE_PREFIX: &str = "lecture-player.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
    /// Daily-rolled JSON logs go here when set.
    pub file_dir: Option<PathBuf>,
}

/// Console logs on stderr, plus JSON files when asked for. Keep the returned
/// guard alive until exit or buffered file output is lost.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&options.filter).map_err(|e| LoggingError::Filter {
            filter: options.filter.clone(),
            message: e.to_string(),
        })?,
    };

    let (file_layer, guard) = match &options.file_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = layer().with_ansi(false).json().with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = layer().with_target(false).with_writer(std::io::stderr);

    registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(guard)
}

