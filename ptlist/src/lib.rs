//! ptlist
//!
//! The `ptlist` command walks a `t_list` linked list inside a stopped process
//! and prints every node's content as `[field:value]` tokens. The crate also
//! carries the small debugger shell hosting the command: a command
//! interpreter, the live-process symbol provider, configuration and logging.

pub mod config;
pub mod host;
pub mod list_printer;
pub mod logging;
pub mod target;
pub mod value;

pub use host::{register_ptlist, CommandHandler, CommandInterpreter, CommandReturn, ReturnStatus};
pub use list_printer::{ListPrinter, PtlistError, PtlistOptions};
pub use target::{DebugContext, LiveTarget, VariableRecord};
pub use value::ValueObject;
