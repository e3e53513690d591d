//! Logging setup

use std::path::PathBuf;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name inside the log directory
pub const LOG_FILE: &str = "diary.log";

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// `debug`, `info` or `error`
    pub level: String,
    /// Also write a daily rolling file here
    pub log_dir: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            ansi: true,
        }
    }
}

/// Map a configured level name to a tracing level.
///
/// Case-insensitive; anything other than `debug` or `error` is `info`.
pub fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber: pretty stdout plus an optional rolling file
pub fn init(options: &LogOptions) -> anyhow::Result<()> {
    let file_layer = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE);
            Some(fmt::layer().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(options.ansi)
                .pretty(),
        )
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive(parse_level(&options.level).into()))
        .try_init()?;

    Ok(())
}
