use std::io::BufRead;

use anyhow::{Context, Result};
use clap::Args;

use super::CommandContext;
use super::dashboard::render_pass;
use crate::cli::app::FilterArgs;
use crate::filter::FilterSelection;
use crate::packs::PackLoader;

const SESSION_HELP: &str = "\
commands:
  brand [A, B, ...]   filter to brands (comma separated); no argument clears
  discount N          minimum discount percent, 0-90
  rating X            minimum rating, 0.0-5.0
  clear               reset every filter
  packs [A, B, ...]   choose insight packs; no argument shows the first pack
  show                render again with the current filters
  stats               print query cache counters
  help                this text
  quit                leave the session";

#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
}

/// One line of session input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Brands(Vec<String>),
    MinDiscount(u32),
    MinRating(f64),
    Clear,
    Packs(Vec<String>),
    Show,
    Stats,
    Help,
    Quit,
}

impl SessionCommand {
    /// `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "brand" | "brands" => Self::Brands(
                rest.split(',')
                    .map(str::trim)
                    .filter(|brand| !brand.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "discount" => Self::MinDiscount(
                rest.parse()
                    .map_err(|_| format!("expected a whole percent, got `{rest}`"))?,
            ),
            "rating" => Self::MinRating(
                rest.parse()
                    .map_err(|_| format!("expected a rating such as 4.2, got `{rest}`"))?,
            ),
            "clear" => Self::Clear,
            "packs" | "pack" => Self::Packs(
                rest.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            "show" => Self::Show,
            "stats" => Self::Stats,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command `{other}`; try `help`")),
        };
        Ok(Some(command))
    }
}

pub fn run(args: &SessionArgs, context: &CommandContext) -> Result<()> {
    let selection = args.filters.selection()?;
    let cache = context.open_cache("session")?;
    let mut selection = args
        .filters
        .apply_default_brands(selection, "session", &cache, context)?;
    let loader = PackLoader::default();
    let mut packs: Vec<String> = Vec::new();

    let render = |selection: &FilterSelection, packs: &[String]| {
        let purged = cache.purge_expired();
        if purged > 0 {
            eprintln!("session: purged {purged} expired cache entries");
        }
        if let Err(error) = render_pass(&cache, &loader, context, selection, Some(packs)) {
            eprintln!("session: render failed");
            eprintln!("{error:#}");
        }
    };

    render(&selection, &packs);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read session input")?;
        let command = match SessionCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("error: {message}");
                continue;
            }
        };

        let applied = match command {
            SessionCommand::Brands(brands) => selection.set_brands(brands),
            SessionCommand::MinDiscount(value) => selection.set_min_discount(value),
            SessionCommand::MinRating(value) => selection.set_min_rating(value),
            SessionCommand::Clear => {
                selection.clear();
                Ok(())
            }
            SessionCommand::Packs(labels) => {
                packs = labels;
                Ok(())
            }
            SessionCommand::Show => Ok(()),
            SessionCommand::Stats => {
                let stats = cache.stats();
                println!(
                    "cache: hits={} misses={} gateway_errors={} entries={} ttl_secs={}",
                    stats.hits,
                    stats.misses,
                    stats.gateway_errors,
                    stats.entries,
                    cache.ttl().as_secs()
                );
                continue;
            }
            SessionCommand::Help => {
                println!("{SESSION_HELP}");
                continue;
            }
            SessionCommand::Quit => break,
        };

        match applied {
            Ok(()) => render(&selection, &packs),
            Err(error) => println!("error: {error}"),
        }
    }
    Ok(())
}
