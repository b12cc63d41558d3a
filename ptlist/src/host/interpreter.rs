use super::{CommandHandler, CommandReturn, ReturnStatus};
use crate::target::DebugContext;
use std::collections::BTreeMap;
use tracing::debug;

/// Dispatches command lines to registered handlers
#[derive(Default)]
pub struct CommandInterpreter {
    commands: BTreeMap<String, Box<dyn CommandHandler>>,
}

impl std::fmt::Debug for CommandInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandInterpreter")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its name, replacing any previous one
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        let name = handler.name().to_string();
        if self.commands.insert(name.clone(), handler).is_some() {
            debug!("Replaced command '{}'", name);
        } else {
            debug!("Registered command '{}'", name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Run one command line
    pub fn handle_command(&self, line: &str, ctx: &dyn DebugContext) -> CommandReturn {
        let mut result = CommandReturn::new();
        let line = line.trim();
        if line.is_empty() {
            return result;
        }
        let (name, args) = match line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim_start()),
            None => (line, ""),
        };
        debug!("Command '{}' args {:?}", name, args);

        if name == "help" {
            self.help(args, &mut result);
            return result;
        }
        match self.commands.get(name) {
            Some(handler) => handler.execute(args, ctx, &mut result),
            None => result.set_error(format!("'{name}' is not a valid command.")),
        }
        result
    }

    fn help(&self, args: &str, result: &mut CommandReturn) {
        let topic = args.split_whitespace().next();
        match topic {
            Some(name) => match self.commands.get(name) {
                Some(handler) => result.append_message(handler.help()),
                None => {
                    result.set_error(format!("'{name}' is not a valid command."));
                    return;
                }
            },
            None => {
                result.append_message("Commands:");
                for (name, handler) in &self.commands {
                    result.append_message(format!("  {name:<10} {}", handler.help()));
                }
                result.append_message(format!("  {:<10} {}", "help", "Show help for commands"));
                result.append_message(format!("  {:<10} {}", "quit", "Detach and exit"));
            }
        }
        result.set_status(ReturnStatus::SuccessFinishResult);
    }
}
