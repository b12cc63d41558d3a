//! The `ptlist` command
//!
//! Resolves the list head variable and the content type, derives the content
//! field list once, then walks the list and appends one line per node:
//!
//! ```text
//! (ptlist) ptlist -l head -n t_content
//! [id:1][name:a]
//! [id:2][name:b]
//! ```

mod fields;
mod formatter;
mod options;
mod walker;

pub use fields::content_fields;
pub use formatter::{field_value, format_node, FieldKind};
pub use options::{
    ParsedCommand, PtlistDefaults, PtlistOptions, DEFAULT_CONTENT_TYPE, DEFAULT_LIST_HEAD,
};
pub use walker::walk;

use crate::host::{CommandHandler, CommandReturn, ReturnStatus};
use crate::target::DebugContext;
use crate::value::ValueObject;
use thiserror::Error;
use tracing::info;

/// Errors ending a `ptlist` invocation without output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PtlistError {
    #[error("t_list head \"{name}\" is not valid")]
    HeadNotFound { name: String },

    #[error("content type \"{name}\" is not valid")]
    ContentTypeNotFound { name: String },

    #[error("{0}")]
    Options(String),
}

/// Handler registered as the `ptlist` command
#[derive(Debug, Clone, Default)]
pub struct ListPrinter {
    defaults: PtlistDefaults,
}

impl ListPrinter {
    pub fn new(defaults: PtlistDefaults) -> Self {
        Self { defaults }
    }

    /// Walk the list described by `options`, returning one line per node
    pub fn run(
        &self,
        ctx: &dyn DebugContext,
        options: &PtlistOptions,
    ) -> Result<Vec<String>, PtlistError> {
        let head = ctx
            .find_variable(&options.list_head)
            .ok_or_else(|| PtlistError::HeadNotFound {
                name: options.list_head.clone(),
            })?;
        let content_ptr = ctx
            .find_first_type(&options.content_type)
            .ok_or_else(|| PtlistError::ContentTypeNotFound {
                name: options.content_type.clone(),
            })?
            .pointer_to();

        let fields = content_fields(ctx, &content_ptr);
        info!(
            "ptlist: head '{}' at 0x{:x}, content '{}' with fields {:?}",
            head.name, head.address, options.content_type, fields
        );
        let head = ValueObject::from_variable(ctx, head);
        Ok(walk(head, &content_ptr, &fields))
    }
}

impl CommandHandler for ListPrinter {
    fn name(&self) -> &str {
        "ptlist"
    }

    fn help(&self) -> &str {
        "Print the content of every node of a t_list: ptlist [-l <head>] [-n <type>]"
    }

    fn execute(&self, args: &str, ctx: &dyn DebugContext, result: &mut CommandReturn) {
        let outcome = PtlistOptions::parse(args, &self.defaults).and_then(|parsed| match parsed {
            ParsedCommand::Help(text) => Ok(vec![text.trim_end().to_string()]),
            ParsedCommand::Run(options) => self.run(ctx, &options),
        });
        match outcome {
            Ok(lines) => {
                for line in lines {
                    result.append_message(line);
                }
                result.set_status(ReturnStatus::SuccessFinishResult);
            }
            Err(e) => result.set_error(e.to_string()),
        }
    }
}
