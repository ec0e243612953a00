#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use shelfscope::cli::app::{Cli, Command, RuntimeArgs};
use shelfscope::cli::commands::{self, CommandContext};
use shelfscope::config::{PathOverrides, RuntimePaths};
use shelfscope::models::QueryEnvelopeCommandFailure;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_QUERY_FAILURE: i32 = 2;
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
    eprintln!("shelfscope: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            eprintln!("shelfscope: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("shelfscope: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
    let context = CommandContext::new(runtime_paths, &cli.runtime)?;
    match cli.command {
        Command::Dashboard(args) => commands::dashboard::run(&args, &context),
        Command::Brands(args) => commands::brands::run(&args, &context),
        Command::Packs(args) => commands::packs::run(&args, &context),
        Command::Query(args) => commands::query::run(&args, &context),
        Command::Session(args) => commands::session::run(&args, &context),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<QueryEnvelopeCommandFailure>().is_some() {
        EXIT_QUERY_FAILURE
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
        Command::Dashboard(_) => "dashboard",
        Command::Brands(_) => "brands",
        Command::Packs(_) => "packs",
        Command::Query(_) => "query",
        Command::Session(_) => "session",
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

    shelfscope::config::resolve_runtime_paths(
        &home_dir,
        &cwd,
        PathOverrides {
            catalog: args.catalog.as_deref(),
            packs_dir: args.packs_dir.as_deref(),
        },
    )
}
