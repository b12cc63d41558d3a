use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::list_printer::{DEFAULT_CONTENT_TYPE, DEFAULT_LIST_HEAD};
use crate::target::DEFAULT_MAX_STRING_LENGTH;

/// Log level enumeration for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(anyhow::anyhow!(
                "Invalid log level: {}. Valid options: error, warn, info, debug, trace",
                s
            )),
        }
    }
}

impl LogLevel {
    /// Convert to tracing level filter
    pub fn to_tracing_level_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }
}

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dwarf: DwarfConfig,
    #[serde(default)]
    pub ptlist: PtlistConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Default log file path (overridden by --log-file)
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Enable/disable file logging (overridden by --log/--no-log)
    #[serde(default)]
    pub enable_logging: bool,
    /// Mirror logs to stderr (overridden by --log-console/--no-log-console)
    #[serde(default)]
    pub enable_console_logging: bool,
    /// Log level filter (overridden by --log-level)
    #[serde(default)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DwarfConfig {
    /// Directories searched for `.gnu_debuglink` targets
    #[serde(default = "default_debug_search_paths")]
    pub search_paths: Vec<String>,
    /// Accept linked debug files whose CRC or build ID does not match
    #[serde(default)]
    pub allow_loose_debug_match: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PtlistConfig {
    /// Head variable used when -l is not given
    #[serde(default = "default_list_head")]
    pub default_list_head: String,
    /// Content type used when -n is not given
    #[serde(default = "default_content_type")]
    pub default_content_type: String,
    /// Longest C string shown for a `char *` field
    #[serde(default = "default_max_string_length")]
    pub max_string_length: usize,
}

// Default value functions
fn default_log_file() -> String {
    "ptlist.log".to_string()
}

fn default_debug_search_paths() -> Vec<String> {
    vec![
        "/usr/lib/debug".to_string(),
        "/usr/local/lib/debug".to_string(),
    ]
}

fn default_list_head() -> String {
    DEFAULT_LIST_HEAD.to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_max_string_length() -> usize {
    DEFAULT_MAX_STRING_LENGTH
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            enable_logging: false,
            enable_console_logging: false,
            log_level: LogLevel::default(),
        }
    }
}

impl Default for DwarfConfig {
    fn default() -> Self {
        Self {
            search_paths: default_debug_search_paths(),
            allow_loose_debug_match: false,
        }
    }
}

impl Default for PtlistConfig {
    fn default() -> Self {
        Self {
            default_list_head: default_list_head(),
            default_content_type: default_content_type(),
            max_string_length: default_max_string_length(),
        }
    }
}

impl Config {
    /// Load configuration from files with fallback search
    pub fn load() -> Result<Self> {
        for path in &Self::get_config_search_paths() {
            if path.exists() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(path);
            } else {
                debug!("Configuration file not found: {}", path.display());
            }
        }

        info!("No configuration file found, using default settings");
        Ok(Self::default())
    }

    /// Load configuration with explicit config file path (for --config flag)
    pub fn load_with_explicit_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Specified configuration file does not exist: {}",
                path.display()
            ));
        }
        Self::load_from_file(path)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read configuration file '{}': {}",
                path.display(),
                e
            )
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse TOML text; `origin` names the source in error messages
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Self::create_friendly_toml_error(origin, content, e))?;
        if config.ptlist.max_string_length == 0 {
            return Err(anyhow::anyhow!(
                "Invalid configuration in '{}': ptlist.max_string_length must be positive",
                origin
            ));
        }
        Ok(config)
    }

    /// Create a user-friendly error message for TOML parsing errors
    fn create_friendly_toml_error(
        file_path: &str,
        content: &str,
        error: toml::de::Error,
    ) -> anyhow::Error {
        let error_msg = format!("Configuration file parsing error in '{file_path}'");

        if let Some(span) = error.span() {
            let lines: Vec<&str> = content.lines().collect();
            let mut current_pos = 0;
            let mut line_num: usize = 1;
            let mut col_num: usize = 1;

            for line in &lines {
                let line_len = line.len() + 1; // +1 for newline
                if current_pos + line_len > span.start {
                    col_num = span.start - current_pos + 1;
                    break;
                }
                current_pos += line_len;
                line_num += 1;
            }

            let context_line = lines.get(line_num.saturating_sub(1)).unwrap_or(&"");

            anyhow::anyhow!(
                "{}\n\nError at line {}, column {}:\n{}\n\n{}\n{}^\n\nSuggestion: {}",
                error_msg,
                line_num,
                col_num,
                error.message(),
                context_line,
                " ".repeat(col_num.saturating_sub(1)),
                Self::get_error_suggestion(&error.to_string())
            )
        } else {
            anyhow::anyhow!(
                "{}\n\n{}\n\nSuggestion: {}",
                error_msg,
                error,
                Self::get_error_suggestion(&error.to_string())
            )
        }
    }

    /// Provide helpful suggestions based on common configuration errors
    fn get_error_suggestion(error_msg: &str) -> &'static str {
        if error_msg.contains("log_level") || error_msg.contains("unknown variant") {
            "Valid log levels are: 'error', 'warn', 'info', 'debug', 'trace'"
        } else if error_msg.contains("unknown field") {
            "Check the field name spelling and ensure it's in the correct section"
        } else if error_msg.contains("invalid type") {
            "Check the value type - strings should be in quotes, numbers should not"
        } else {
            "Please check the configuration file syntax ([general], [dwarf] and [ptlist] sections)"
        }
    }

    /// Get configuration file search paths in priority order
    fn get_config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // ~/.ptlist/config.toml (user-level config)
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".ptlist").join("config.toml"));
        }

        // ./ptlist.toml (project-level config)
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join("ptlist.toml"));
        }

        paths
    }
}
