use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use cfgmig_merge::{
    normalize, MergeEngine, MergePolicy, UniqueKeyRegistry, DSRC_ETYPE_COLLECTIONS,
    G2_CONFIG_SECTION,
};
use cfgmig_proposal::{merge_config_documents, MigrateConfig, ProposalBuilder, ProposalPlan, Roots};
use cfgmig_store::{load_json, write_json};
use colored::Colorize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => MigrateConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => MigrateConfig::default(),
    };
    let registry = match &cli.registry_file {
        Some(path) => load_registry(path)?,
        None => config.effective_registry(),
    };
    let engine = MergeEngine::new(registry);
    if engine.registry().is_empty() {
        warn!("unique-key registry is empty; lists are deduplicated by value only");
    } else {
        debug!(collections = engine.registry().len(), "unique-key registry loaded");
    }

    match cli.command {
        Command::AddDsrcEtype(args) => cmd_add_dsrc_etype(&engine, args),
        Command::JsonAddKeys(args) => {
            cmd_json_merge(&engine, MergePolicy::AddMissingKeys, "json-add-keys", args)
        }
        Command::JsonAddListElements(args) => {
            cmd_json_merge(&engine, MergePolicy::AddListElements, "json-add-list-elements", args)
        }
        Command::JsonPrettyPrint(args) => cmd_json_pretty_print(args),
        Command::JsonDifference(args) => cmd_json_difference(&engine, args),
        Command::MigrateG2config(args) => cmd_migrate_g2config(&engine, args),
        Command::MigrateSenzingDir(args) => cmd_migrate_senzing_dir(engine, config.proposal, args),
    }
}

fn load_registry(path: &Path) -> anyhow::Result<UniqueKeyRegistry> {
    let value = load_json(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("invalid registry file {}", path.display()))
}

/// Default output stem of `add-dsrc-etype`; earlier releases spelled it this way.
const ADD_DSRC_ETYPE_STEM: &str = "migrate-add-dscr-etype";

/// `<stem>-<unix-seconds>.json` in the working directory.
fn default_output(stem: &str) -> PathBuf {
    PathBuf::from(format!("{stem}-{}.json", chrono::Utc::now().timestamp()))
}

fn require_file(flag: &str, path: &Path) -> anyhow::Result<()> {
    if !path.is_file() {
        bail!("{flag} {} does not exist", path.display());
    }
    Ok(())
}

fn write_output(command: &str, path: &Path, value: &Value) -> anyhow::Result<()> {
    write_json(path, value).with_context(|| format!("writing {}", path.display()))?;
    info!(command, output = %path.display(), "done");
    println!("{} {} wrote {}", "✓".green().bold(), command, path.display().to_string().bold());
    Ok(())
}

fn cmd_add_dsrc_etype(engine: &MergeEngine, args: G2configArgs) -> anyhow::Result<()> {
    require_file("--existing-g2config-file", &args.existing_g2config_file)?;
    require_file("--template-g2config-file", &args.template_g2config_file)?;
    let output = args.output_file.unwrap_or_else(|| default_output(ADD_DSRC_ETYPE_STEM));

    let existing = load_json(&args.existing_g2config_file)?;
    let template = load_json(&args.template_g2config_file)?;
    let result = engine.graft(&existing, &template, G2_CONFIG_SECTION, &DSRC_ETYPE_COLLECTIONS)?;
    write_output("add-dsrc-etype", &output, &result)
}

fn cmd_json_merge(
    engine: &MergeEngine,
    policy: MergePolicy,
    command: &str,
    args: JsonMergeArgs,
) -> anyhow::Result<()> {
    require_file("--existing-file", &args.existing_file)?;
    require_file("--template-file", &args.template_file)?;
    let output = args
        .output_file
        .unwrap_or_else(|| default_output(&format!("migrate-{command}")));

    let existing = load_json(&args.existing_file)?;
    let template = load_json(&args.template_file)?;
    let result = engine.merge(policy, &existing, &template)?;
    write_output(command, &output, &result)
}

fn cmd_json_pretty_print(args: PrettyPrintArgs) -> anyhow::Result<()> {
    require_file("--input-file", &args.input_file)?;
    let output = args.output_file.unwrap_or_else(|| default_output("migrate-json-pretty-print"));

    let input = load_json(&args.input_file)?;
    write_output("json-pretty-print", &output, &normalize(&input))
}

fn cmd_json_difference(engine: &MergeEngine, args: DifferenceArgs) -> anyhow::Result<()> {
    require_file("--minuend", &args.minuend)?;
    require_file("--subtrahend", &args.subtrahend)?;
    let output = args.output_file.unwrap_or_else(|| default_output("migrate-json-difference"));

    let minuend = load_json(&args.minuend)?;
    let subtrahend = load_json(&args.subtrahend)?;
    let result = engine.difference(&minuend, &subtrahend)?;
    write_output("json-difference", &output, &result)
}

fn cmd_migrate_g2config(engine: &MergeEngine, args: MigrateG2configArgs) -> anyhow::Result<()> {
    let files = args.files;
    require_file("--existing-g2config-file", &files.existing_g2config_file)?;
    require_file("--template-g2config-file", &files.template_g2config_file)?;
    let output = files.output_file.unwrap_or_else(|| default_output("migrate-g2config"));

    let result = merge_config_documents(
        engine,
        &files.existing_g2config_file,
        &files.template_g2config_file,
        args.g2config_blacklist.as_deref(),
    )?;
    write_output("migrate-g2config", &output, &result)
}

fn cmd_migrate_senzing_dir(
    engine: MergeEngine,
    plan: ProposalPlan,
    args: MigrateSenzingDirArgs,
) -> anyhow::Result<()> {
    if !args.old_senzing_dir.is_dir() {
        bail!("--old-senzing-dir {} does not exist", args.old_senzing_dir.display());
    }
    if !args.new_senzing_dir.is_dir() {
        bail!("--new-senzing-dir {} does not exist", args.new_senzing_dir.display());
    }
    let proposed = match args.proposed_senzing_dir {
        Some(dir) => dir,
        None => std::env::current_dir()
            .context("resolving working directory")?
            .join(format!("senzing-proposal-{}", chrono::Utc::now().timestamp())),
    };

    let builder = ProposalBuilder::new(
        plan,
        engine,
        Roots::new(args.old_senzing_dir, args.new_senzing_dir, proposed),
    )
    .with_config_blacklist(args.g2config_blacklist)
    .with_show_diffs(args.show_diffs);

    let report = builder.build()?;
    let proposed = &builder.roots().proposed;

    println!(
        "{} Proposal written to {}",
        "✓".green().bold(),
        proposed.display().to_string().bold()
    );
    if report.is_empty() {
        println!("  {}", "Nothing to propose".yellow());
    }
    println!("  Copied: {}", report.copied.len().to_string().green());
    println!("  Generated: {}", report.generated.len().to_string().green());
    if !report.blacklisted.is_empty() {
        println!("  Blacklisted: {}", report.blacklisted.len().to_string().yellow());
    }
    for path in &report.dangling {
        println!("  {} {}", "dangling symlink".yellow(), path.display());
    }
    for skip in &report.skipped {
        println!("  {} {} {}", "skipped".yellow(), skip.step, skip.old.display());
    }
    Ok(())
}
