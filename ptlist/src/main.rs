use anyhow::{Context, Result};
use ptlist::config::{Args, MergedConfig};
use ptlist::logging::{self, LoggingConfig};
use ptlist::{register_ptlist, CommandInterpreter, CommandReturn, DebugContext, LiveTarget};
use std::io::{BufRead, Write};
use std::process::ExitCode;
use tracing::{error, info};

const PROMPT: &str = "(ptlist) ";

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every command succeeded
fn run() -> Result<bool> {
    let parsed_args = Args::parse_args()?;
    let config = MergedConfig::new_with_explicit_config(parsed_args.clone())?;
    logging::initialize_logging(&LoggingConfig::from_merged(&config))?;
    parsed_args.validate()?;

    info!("Attaching to process {}", config.pid);
    let target = LiveTarget::attach(&config.get_target_options())?;
    info!("Session ready: {:?}", target);
    describe_session(&target);

    let mut interpreter = CommandInterpreter::new();
    register_ptlist(&mut interpreter, config.get_ptlist_defaults());

    if !config.commands.is_empty() {
        let mut all_ok = true;
        for command in &config.commands {
            let result = interpreter.handle_command(command, &target);
            all_ok &= report(&result)?;
        }
        return Ok(all_ok);
    }

    interactive(&interpreter, &target)?;
    Ok(true)
}

fn describe_session(target: &LiveTarget) {
    let analyzer = target.analyzer();
    info!(
        "Symbols for {} read from {}",
        analyzer.binary_path().display(),
        analyzer.debug_path().display()
    );
    let Some(frame) = target.selected_frame() else {
        return;
    };
    if let Some(function) = &frame.function {
        info!(
            "Frame #{} in {}, locals: [{}]",
            frame.index,
            function.name,
            analyzer.local_names(function, frame.lookup_pc).join(", ")
        );
    }
}

/// Read commands from stdin until `quit`, `exit` or end of input
fn interactive(interpreter: &CommandInterpreter, target: &dyn DebugContext) -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{PROMPT}")?;
            stdout.flush()?;
        }
        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read command")?;
        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" || trimmed == "q" {
            break;
        }
        let result = interpreter.handle_command(trimmed, target);
        report(&result)?;
    }
    Ok(())
}

/// Print a command's output and error; returns whether it succeeded
fn report(result: &CommandReturn) -> Result<bool> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(result.output().as_bytes())?;
    stdout.flush()?;
    if let Some(message) = result.error() {
        eprintln!("error: {message}");
    }
    Ok(result.succeeded())
}
