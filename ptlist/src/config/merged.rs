use std::path::PathBuf;

use crate::config::settings::LogLevel;
use crate::config::{Config, ParsedArgs};
use crate::list_printer::PtlistDefaults;
use crate::target::TargetOptions;
use ptlist_dwarf::LoadOptions;

/// Final merged configuration that combines command line arguments and config file settings
/// Command line arguments take priority over config file settings
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub pid: u32,
    pub target_path: Option<PathBuf>,
    pub debug_file: Option<PathBuf>,
    pub frame: Option<usize>,
    pub commands: Vec<String>,

    // Logging
    pub log_file: PathBuf,
    pub enable_logging: bool,
    pub enable_console_logging: bool,
    pub log_level: LogLevel,
    pub env_filter_directives: Option<String>,

    // DWARF configuration
    pub dwarf_search_paths: Vec<String>,
    pub allow_loose_debug_match: bool,

    // ptlist command
    pub default_list_head: String,
    pub default_content_type: String,
    pub max_string_length: usize,
}

impl MergedConfig {
    /// Create merged configuration from parsed arguments and config file
    pub fn new(args: ParsedArgs, config: Config) -> Self {
        let log_file = args
            .log_file
            .unwrap_or_else(|| PathBuf::from(&config.general.log_file));

        // An explicit level (flag or RUST_LOG) asks for logs even when the
        // config file leaves logging off; --no-log still wins.
        let wants_logs = args.log_level.is_some() || args.env_filter_directives.is_some();
        let enable_logging = args
            .enable_logging
            .unwrap_or(config.general.enable_logging || wants_logs);
        let enable_console_logging = args
            .enable_console_logging
            .unwrap_or(config.general.enable_console_logging);
        let log_level = args.log_level.unwrap_or(config.general.log_level);

        Self {
            pid: args.pid,
            target_path: args.target_path,
            debug_file: args.debug_file,
            frame: args.frame,
            commands: args.commands,
            log_file,
            enable_logging,
            enable_console_logging,
            log_level,
            env_filter_directives: args.env_filter_directives,
            dwarf_search_paths: config.dwarf.search_paths,
            allow_loose_debug_match: config.dwarf.allow_loose_debug_match,
            default_list_head: config.ptlist.default_list_head,
            default_content_type: config.ptlist.default_content_type,
            max_string_length: config.ptlist.max_string_length,
        }
    }

    /// Create merged configuration, loading the file named by --config or
    /// the first one found on the search path
    pub fn new_with_explicit_config(args: ParsedArgs) -> anyhow::Result<Self> {
        let config = match &args.config {
            Some(path) => Config::load_with_explicit_path(path)?,
            None => Config::load()?,
        };
        Ok(Self::new(args, config))
    }

    /// Extract DWARF loading options for ptlist-dwarf
    pub fn get_dwarf_config(&self) -> LoadOptions {
        LoadOptions {
            debug_file: self.debug_file.clone(),
            search_paths: self.dwarf_search_paths.clone(),
            allow_loose_debug_match: self.allow_loose_debug_match,
        }
    }

    /// Extract how to attach to the target
    pub fn get_target_options(&self) -> TargetOptions {
        TargetOptions {
            pid: self.pid,
            target_path: self.target_path.clone(),
            frame: self.frame,
            load: self.get_dwarf_config(),
            max_string_length: self.max_string_length,
        }
    }

    /// Names `ptlist` uses when -l/-n are not given
    pub fn get_ptlist_defaults(&self) -> PtlistDefaults {
        PtlistDefaults {
            list_head: self.default_list_head.clone(),
            content_type: self.default_content_type.clone(),
        }
    }
}
