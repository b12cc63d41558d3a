//! Command-line options of `ptlist`

use super::PtlistError;
use clap::Parser;

pub const DEFAULT_LIST_HEAD: &str = "head";
pub const DEFAULT_CONTENT_TYPE: &str = "t_content";

/// Names used when an option is not given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtlistDefaults {
    pub list_head: String,
    pub content_type: String,
}

impl Default for PtlistDefaults {
    fn default() -> Self {
        Self {
            list_head: DEFAULT_LIST_HEAD.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ptlist", no_binary_name = true, disable_version_flag = true)]
#[command(about = "Print the content of every node of a t_list")]
struct RawOptions {
    /// Variable holding the first node (default: head)
    #[arg(short = 'l', long = "list-head", value_name = "NAME")]
    list_head: Option<String>,

    /// Type the content pointers point to (default: t_content)
    #[arg(short = 'n', long = "name", value_name = "TYPE")]
    name: Option<String>,

    /// Ignored
    #[arg(hide = true)]
    rest: Vec<String>,
}

/// Options of one `ptlist` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtlistOptions {
    pub list_head: String,
    pub content_type: String,
}

/// What a command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Run(PtlistOptions),
    /// `-h`/`--help`, with the rendered help text
    Help(String),
}

impl PtlistOptions {
    /// Parse the arguments following the command name.
    ///
    /// Words are split shell-style, so quoted names may contain spaces.
    pub fn parse(args: &str, defaults: &PtlistDefaults) -> Result<ParsedCommand, PtlistError> {
        let words = shlex::split(args)
            .ok_or_else(|| PtlistError::Options("No closing quotation".to_string()))?;
        let raw = match RawOptions::try_parse_from(words) {
            Ok(raw) => raw,
            Err(e) if e.kind() == clap::error::ErrorKind::DisplayHelp => {
                return Ok(ParsedCommand::Help(e.render().to_string()));
            }
            Err(e) => {
                let rendered = e.render().to_string();
                let message = rendered.strip_prefix("error: ").unwrap_or(&rendered);
                return Err(PtlistError::Options(message.trim_end().to_string()));
            }
        };
        if !raw.rest.is_empty() {
            tracing::debug!("Ignoring extra arguments: {:?}", raw.rest);
        }
        Ok(ParsedCommand::Run(PtlistOptions {
            list_head: raw.list_head.unwrap_or_else(|| defaults.list_head.clone()),
            content_type: raw.name.unwrap_or_else(|| defaults.content_type.clone()),
        }))
    }
}
