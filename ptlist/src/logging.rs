use crate::config::{LogLevel, MergedConfig};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

static INIT_GUARD: OnceLock<()> = OnceLock::new();

/// Where logs go and how much of them
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_file: PathBuf,
    pub enable_file: bool,
    pub enable_console: bool,
    pub level: LogLevel,
    /// RUST_LOG directives used instead of `level`
    pub directives: Option<String>,
}

impl LoggingConfig {
    pub fn from_merged(config: &MergedConfig) -> Self {
        Self {
            log_file: config.log_file.clone(),
            enable_file: config.enable_logging,
            enable_console: config.enable_console_logging,
            level: config.log_level,
            directives: config.env_filter_directives.clone(),
        }
    }

    fn filter(&self) -> EnvFilter {
        self.directives
            .as_deref()
            .and_then(|d| EnvFilter::try_new(d).ok())
            .unwrap_or_else(|| {
                EnvFilter::default().add_directive(self.level.to_tracing_level_filter().into())
            })
    }
}

pub fn initialize_logging(config: &LoggingConfig) -> Result<()> {
    if !config.enable_file && !config.enable_console {
        return Ok(());
    }
    if INIT_GUARD.set(()).is_err() {
        // Already initialized elsewhere; do nothing and succeed
        return Ok(());
    }

    // Route `log` records from dependencies into tracing; ignore 'already set'
    let _ = tracing_log::LogTracer::init();

    let console_layer = config.enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(config.filter())
    });

    let file_layer = if config.enable_file {
        match open_log_file(&config.log_file) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(file)
                    .with_target(true)
                    .with_ansi(false)
                    .with_filter(config.filter()),
            ),
            Err(e) => {
                eprintln!(
                    "warning: cannot open log file {}: {}",
                    config.log_file.display(),
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let init_res = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();
    let _ = init_res; // ignore AlreadyInit errors silently

    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: LogLevel, directives: Option<&str>) -> LoggingConfig {
        LoggingConfig {
            log_file: PathBuf::from("ptlist.log"),
            enable_file: false,
            enable_console: false,
            level,
            directives: directives.map(str::to_string),
        }
    }

    #[test]
    fn level_or_directives_build_the_filter() {
        let filter = config(LogLevel::Debug, None).filter().to_string();
        assert!(filter.contains("debug"));

        let filter = config(LogLevel::Warn, Some("ptlist_dwarf=trace"))
            .filter()
            .to_string();
        assert!(filter.contains("ptlist_dwarf=trace"));
    }

    #[test]
    fn disabled_logging_installs_nothing() {
        assert!(initialize_logging(&config(LogLevel::Trace, None)).is_ok());
        assert!(INIT_GUARD.get().is_none());
    }
}
