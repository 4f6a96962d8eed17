use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The mctruth developers",
    version,
    about = "mctruth - Inspect the Monte-Carlo truth of simulated runs and realign legacy track references to their kinematics trees.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to process file sets in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Regroup the track references of a run by track index and write them in the per-track layout.
    Realign(RealignArgs),
    /// Show the particles and track references of one event.
    Inspect(InspectArgs),
}

/// Arguments for the `realign` subcommand.
#[derive(Args, Debug)]
pub struct RealignArgs {
    /// Directory holding `run.toml` and the event tables of the run.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub input: PathBuf,

    /// Path of the per-track reference table to write.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only process these events (comma separated). Defaults to the whole run.
    #[arg(short, long, value_name = "LIST", value_delimiter = ',')]
    pub events: Vec<usize>,

    /// Override how a group-count mismatch is handled ('report' or 'fail').
    #[arg(long, value_name = "POLICY")]
    pub integrity_policy: Option<String>,

    /// Do not log a warning for every out-of-range reference label.
    #[arg(long)]
    pub no_label_warnings: bool,

    /// Process file sets one after the other on the calling thread.
    #[arg(long)]
    pub sequential: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S realign.integrity-policy=fail
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Directory holding `run.toml` and the event tables of the run.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub input: PathBuf,

    /// Event number to load.
    #[arg(short, long, default_value_t = 0, value_name = "INT")]
    pub event: usize,

    /// Show the particle and the track references of this track.
    #[arg(short, long, value_name = "INT")]
    pub track: Option<usize>,

    /// Find the first track at or after this index that left track references.
    #[arg(long, value_name = "INT", conflicts_with = "track")]
    pub next_from: Option<usize>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
