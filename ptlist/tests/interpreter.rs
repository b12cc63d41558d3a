//! Command dispatch, built-in help and error reporting

mod common;

use common::{init, FakeTarget};
use ptlist::host::CommandHandler;
use ptlist::list_printer::PtlistDefaults;
use ptlist::{register_ptlist, CommandInterpreter, CommandReturn, DebugContext, ReturnStatus};

struct Echo;

impl CommandHandler for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn help(&self) -> &str {
        "Print the arguments"
    }

    fn execute(&self, args: &str, _ctx: &dyn DebugContext, result: &mut CommandReturn) {
        result.append_message(args);
        result.set_status(ReturnStatus::SuccessFinishResult);
    }
}

fn interpreter() -> CommandInterpreter {
    init();
    let mut interpreter = CommandInterpreter::new();
    register_ptlist(&mut interpreter, PtlistDefaults::default());
    interpreter.register(Box::new(Echo));
    interpreter
}

#[test]
fn unknown_command_is_reported() {
    let result = interpreter().handle_command("frobnicate now", &FakeTarget::new());
    assert_eq!(result.status(), ReturnStatus::Failed);
    assert_eq!(result.error(), Some("'frobnicate' is not a valid command."));
}

#[test]
fn empty_line_is_a_no_op() {
    let result = interpreter().handle_command("   ", &FakeTarget::new());
    assert_eq!(result.status(), ReturnStatus::SuccessFinishNoResult);
    assert!(result.output().is_empty());
}

#[test]
fn arguments_follow_the_command_name() {
    let result = interpreter().handle_command("  echo   a  b ", &FakeTarget::new());
    assert_eq!(result.output(), "a  b\n");
}

#[test]
fn help_lists_registered_commands() {
    let interpreter = interpreter();
    assert!(interpreter.contains("ptlist"));
    assert_eq!(
        interpreter.command_names().collect::<Vec<_>>(),
        vec!["echo", "ptlist"]
    );

    let result = interpreter.handle_command("help", &FakeTarget::new());
    assert_eq!(result.status(), ReturnStatus::SuccessFinishResult);
    assert!(result.output().contains("ptlist"));
    assert!(result.output().contains("echo"));

    let result = interpreter.handle_command("help echo", &FakeTarget::new());
    assert_eq!(result.lines(), vec!["Print the arguments"]);

    let result = interpreter.handle_command("help nothing", &FakeTarget::new());
    assert_eq!(result.error(), Some("'nothing' is not a valid command."));
}
