use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::settings::LogLevel;

#[derive(Parser, Debug)]
#[command(name = "ptlist")]
#[command(about = "Print the nodes of t_list linked lists inside a running process")]
#[command(version)]
pub struct Args {
    /// Process ID to attach to
    #[arg(long, short = 'p', value_name = "PID")]
    pub pid: u32,

    /// Executable to read debug information from (default: /proc/<pid>/exe)
    #[arg(long, short = 't', value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Debug information file path (overrides auto-detection)
    /// Auto-detection searches:
    /// 1. Binary itself (.debug_info sections)
    /// 2. .gnu_debuglink section, in the binary's directory and the
    ///    configured search paths
    #[arg(long, short = 'd', value_name = "PATH")]
    pub debug_file: Option<PathBuf>,

    /// Stack frame whose variables are visible (default: innermost frame with debug info)
    #[arg(long, short = 'f', value_name = "INDEX")]
    pub frame: Option<usize>,

    /// Command to run instead of the interactive prompt (repeatable)
    #[arg(long = "command", short = 'c', value_name = "COMMAND")]
    pub commands: Vec<String>,

    /// Specify custom configuration file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path (default: ./ptlist.log)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Enable logging to file (overrides config file)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub log: bool,

    /// Disable logging completely (overrides config file)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_log: bool,

    /// Mirror logs to stderr (overrides config file)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub log_console: bool,

    /// Disable stderr logging (overrides config file)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_log_console: bool,

    /// Set log level (error, warn, info, debug, trace)
    /// Priority: 1. Command line args, 2. RUST_LOG env var, 3. Config file (default: warn)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedArgs {
    pub pid: u32,
    pub target_path: Option<PathBuf>,
    pub debug_file: Option<PathBuf>,
    pub frame: Option<usize>,
    pub commands: Vec<String>,
    pub config: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    /// `Some` when --log/--no-log was given
    pub enable_logging: Option<bool>,
    /// `Some` when --log-console/--no-log-console (or --no-log) was given
    pub enable_console_logging: Option<bool>,
    /// Level from --log-level, else from RUST_LOG
    pub log_level: Option<LogLevel>,
    /// RUST_LOG holds filter directives rather than a plain level
    pub env_filter_directives: Option<String>,
}

impl Args {
    /// Parse the process command line
    pub fn parse_args() -> Result<ParsedArgs> {
        Self::parse().into_parsed(std::env::var("RUST_LOG").ok())
    }

    /// Resolve flag pairs; `rust_log` is the value of RUST_LOG
    pub fn into_parsed(self, rust_log: Option<String>) -> Result<ParsedArgs> {
        let enable_logging = if self.no_log {
            Some(false)
        } else if self.log {
            Some(true)
        } else {
            None
        };

        let enable_console_logging = if self.no_log || self.no_log_console {
            Some(false)
        } else if self.log_console {
            Some(true)
        } else {
            None
        };

        // Priority: 1. Command line, 2. RUST_LOG env, 3. Config file (applied in merged.rs)
        let mut env_filter_directives = None;
        let log_level = match &self.log_level {
            Some(level) => Some(level.parse::<LogLevel>()?),
            None => match rust_log.filter(|v| !v.trim().is_empty()) {
                Some(value) => match value.parse::<LogLevel>() {
                    Ok(level) => Some(level),
                    Err(_) => {
                        env_filter_directives = Some(value);
                        None
                    }
                },
                None => None,
            },
        };

        Ok(ParsedArgs {
            pid: self.pid,
            target_path: self.target,
            debug_file: self.debug_file,
            frame: self.frame,
            commands: self.commands,
            config: self.config,
            log_file: self.log_file,
            enable_logging,
            enable_console_logging,
            log_level,
            env_filter_directives,
        })
    }
}

impl ParsedArgs {
    /// Validate command line arguments for consistency and completeness
    pub fn validate(&self) -> Result<()> {
        if !is_pid_running(self.pid) {
            return Err(anyhow::anyhow!(
                "Process with PID {} is not running. Use 'ps -p {}' to verify the process exists",
                self.pid,
                self.pid
            ));
        }

        if let Some(target) = &self.target_path {
            if !target.is_file() {
                anyhow::bail!("Target file does not exist: {}", target.display());
            }
        }

        if let Some(debug_file) = &self.debug_file {
            if !debug_file.exists() {
                anyhow::bail!("Debug file does not exist: {}", debug_file.display());
            }
        }

        Ok(())
    }
}

/// Check if a process with given PID is currently running
fn is_pid_running(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str], rust_log: Option<&str>) -> ParsedArgs {
        let mut full = vec!["ptlist"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full)
            .unwrap()
            .into_parsed(rust_log.map(str::to_string))
            .unwrap()
    }

    #[test]
    fn pid_is_required() {
        assert!(Args::try_parse_from(["ptlist"]).is_err());
    }

    #[test]
    fn commands_repeat_in_order() {
        let args = parse(&["-p", "42", "-c", "ptlist", "-c", "ptlist -l other"], None);
        assert_eq!(args.pid, 42);
        assert_eq!(args.commands, vec!["ptlist", "ptlist -l other"]);
        assert_eq!(args.enable_logging, None);
        assert_eq!(args.log_level, None);
    }

    #[test]
    fn no_log_wins_over_console() {
        let args = parse(&["-p", "1", "--no-log", "--log-console"], None);
        assert_eq!(args.enable_logging, Some(false));
        assert_eq!(args.enable_console_logging, Some(false));
    }

    #[test]
    fn log_level_precedence() {
        let args = parse(&["-p", "1", "--log-level", "debug"], Some("trace"));
        assert_eq!(args.log_level, Some(LogLevel::Debug));

        let args = parse(&["-p", "1"], Some("info"));
        assert_eq!(args.log_level, Some(LogLevel::Info));

        let args = parse(&["-p", "1"], Some("ptlist_dwarf=trace"));
        assert_eq!(args.log_level, None);
        assert_eq!(
            args.env_filter_directives.as_deref(),
            Some("ptlist_dwarf=trace")
        );

        let bad = Args::try_parse_from(["ptlist", "-p", "1", "--log-level", "loud"])
            .unwrap()
            .into_parsed(None);
        assert!(bad.is_err());
    }
}
