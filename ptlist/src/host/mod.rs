//! Command hosting: handler registry, dispatch and result reporting

mod interpreter;
mod result;

pub use interpreter::CommandInterpreter;
pub use result::{CommandReturn, ReturnStatus};

use crate::list_printer::{ListPrinter, PtlistDefaults};
use crate::target::DebugContext;

/// A named command the interpreter can dispatch to
pub trait CommandHandler {
    fn name(&self) -> &str;

    /// One-line description shown by `help`
    fn help(&self) -> &str;

    /// Run with everything after the command name
    fn execute(&self, args: &str, ctx: &dyn DebugContext, result: &mut CommandReturn);
}

/// Register the `ptlist` command
pub fn register_ptlist(interpreter: &mut CommandInterpreter, defaults: PtlistDefaults) {
    interpreter.register(Box::new(ListPrinter::new(defaults)));
    tracing::info!("The \"ptlist\" command has been installed");
}
