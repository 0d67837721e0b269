use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cfgmig",
    about = "Migrate a configuration and its installation tree to a new template",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML file with registry overrides and a proposal plan
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON file that replaces the unique-key registry entirely
    #[arg(long, global = true)]
    pub registry_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Put the template's CFG_DSRC and CFG_ETYPE into an existing g2config.json
    #[command(alias = "add-dscr-etype")]
    AddDsrcEtype(G2configArgs),
    /// Add keys missing from an existing JSON file
    JsonAddKeys(JsonMergeArgs),
    /// Add template list elements to an existing JSON file
    JsonAddListElements(JsonMergeArgs),
    /// Sort lists and pretty print a JSON file
    JsonPrettyPrint(PrettyPrintArgs),
    /// Subtract two JSON files: minuend - subtrahend = difference
    JsonDifference(DifferenceArgs),
    /// Merge an existing g2config.json with a new template
    MigrateG2config(MigrateG2configArgs),
    /// Build a proposal directory of changes to layer onto a new installation
    MigrateSenzingDir(MigrateSenzingDirArgs),
}

#[derive(Args)]
pub struct G2configArgs {
    #[arg(long)]
    pub existing_g2config_file: PathBuf,
    #[arg(long)]
    pub template_g2config_file: PathBuf,
    #[arg(long)]
    pub output_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct JsonMergeArgs {
    #[arg(long)]
    pub existing_file: PathBuf,
    #[arg(long)]
    pub template_file: PathBuf,
    #[arg(long)]
    pub output_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct PrettyPrintArgs {
    #[arg(long)]
    pub input_file: PathBuf,
    #[arg(long)]
    pub output_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct DifferenceArgs {
    #[arg(long)]
    pub minuend: PathBuf,
    #[arg(long)]
    pub subtrahend: PathBuf,
    #[arg(long)]
    pub output_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct MigrateG2configArgs {
    #[command(flatten)]
    pub files: G2configArgs,
    /// Values that are never migrated
    #[arg(long)]
    pub g2config_blacklist: Option<PathBuf>,
}

#[derive(Args)]
pub struct MigrateSenzingDirArgs {
    #[arg(long)]
    pub old_senzing_dir: PathBuf,
    #[arg(long)]
    pub new_senzing_dir: PathBuf,
    /// Values that are never migrated into g2config.json
    #[arg(long)]
    pub g2config_blacklist: Option<PathBuf>,
    #[arg(long)]
    pub proposed_senzing_dir: Option<PathBuf>,
    /// Log a unified diff of each changed text file
    #[arg(long)]
    pub show_diffs: bool,
}
