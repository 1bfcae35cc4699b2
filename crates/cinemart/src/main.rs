#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use cinemart::cli::app::{Cli, Command, RuntimeArgs};
use cinemart::cli::commands;
use cinemart::config::RuntimePaths;
use cinemart::models::ReportEnvelopeCommandFailure;
use clap::Parser;
use clap::error::ErrorKind;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_CONFIG_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    let command_name = command_name(&cli.command);
    println!("cinemart: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            println!("cinemart: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("cinemart: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
    match cli.command {
        Command::Load(args) => commands::load::run(&args, &runtime_paths),
        Command::Report(args) => commands::report::run(&args, &runtime_paths),
        Command::Query(args) => commands::query::run(&args, &runtime_paths),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    let invalid_configuration = error
        .downcast_ref::<ReportEnvelopeCommandFailure>()
        .and_then(|failure| failure.envelope().error.as_ref())
        .is_some_and(|detail| detail.code == "invalid_configuration");
    if invalid_configuration {
        EXIT_CONFIG_FAILURE
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Load(_) => "load",
        Command::Report(_) => "report",
        Command::Query(_) => "query",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    cinemart::config::resolve_runtime_paths(&home_dir, &cwd, args.out_dir.as_deref())
}
