use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use super::{CommandContext, print_envelope, to_json_value};
use crate::models::QueryEnvelope;
use crate::packs::{PackLoad, PackLoader, discover_packs, pack_json_schema, select_packs};
use crate::render::render_pack;

#[derive(Debug, Clone, Args)]
pub struct PacksArgs {
    #[command(subcommand)]
    pub command: PacksCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum PacksCommand {
    /// List pack files in the packs directory.
    List,
    /// Render packs by label; the first pack when none is named.
    Show {
        #[arg(value_name = "LABEL")]
        labels: Vec<String>,
    },
    /// Print the JSON schema a pack file is read against.
    Schema,
}

pub fn run(args: &PacksArgs, context: &CommandContext) -> Result<()> {
    match &args.command {
        PacksCommand::List => run_list(context),
        PacksCommand::Show { labels } => run_show(labels, context),
        PacksCommand::Schema => run_schema(context),
    }
}

fn run_list(context: &CommandContext) -> Result<()> {
    let packs = discover_packs(&context.paths.packs_dir)?;
    eprintln!(
        "packs: dir={} count={}",
        context.paths.packs_dir.display(),
        packs.len()
    );

    if context.json {
        let envelope = QueryEnvelope::ok("packs list", json!({ "packs": to_json_value(&packs)? }))
            .with_meta("packs_dir", json!(context.paths.packs_dir.display().to_string()));
        return print_envelope(&envelope);
    }

    if packs.is_empty() {
        println!(
            "No packs found. Generate some into {}",
            context.paths.packs_dir.display()
        );
    }
    for pack in &packs {
        println!("{}  {}", pack.label, pack.path.display());
    }
    Ok(())
}

fn run_show(labels: &[String], context: &CommandContext) -> Result<()> {
    let available = discover_packs(&context.paths.packs_dir)?;
    let selection = select_packs(&available, labels);
    let loader = PackLoader::default();
    let loads = selection
        .chosen
        .iter()
        .map(|pack| (pack, loader.load(&pack.path)))
        .collect::<Vec<_>>();

    if context.json {
        let mut views = Vec::with_capacity(loads.len());
        for (index, (pack, load)) in loads.iter().enumerate() {
            let reason = match load {
                PackLoad::Unreadable { reason } => Some(reason.clone()),
                PackLoad::Ready(_) => None,
            };
            views.push(json!({
                "label": pack.label,
                "column": selection.column_of(index),
                "blank": load.is_blank(),
                "reason": reason,
                "pack": to_json_value(&*load.pack())?,
            }));
        }
        let mut envelope = QueryEnvelope::ok("packs show", json!({ "packs": views }))
            .with_meta("columns", json!(selection.columns));
        for label in &selection.unknown_labels {
            envelope = envelope.with_warning("unknown_pack", format!("unknown pack `{label}`"));
        }
        return print_envelope(&envelope);
    }

    if available.is_empty() {
        println!(
            "No packs found. Generate some into {}",
            context.paths.packs_dir.display()
        );
        return Ok(());
    }
    for label in &selection.unknown_labels {
        println!("warning: unknown pack `{label}`");
    }
    for (index, (pack, load)) in loads.iter().enumerate() {
        print!(
            "{}",
            render_pack(&pack.label, selection.column_of(index), load)
        );
    }
    Ok(())
}

fn run_schema(context: &CommandContext) -> Result<()> {
    let schema = pack_json_schema();
    if context.json {
        return print_envelope(&QueryEnvelope::ok("packs schema", schema));
    }
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
