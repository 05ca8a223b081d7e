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
    author,
    version,
    about = "msmpipe - Build Markov state models from molecular dynamics trajectories: C-alpha distance features, TICA, k-means and MSM estimation with VAMP-2 scoring.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: featurize, reduce, cluster, estimate and score an MSM.
    Build(BuildArgs),
    /// Summarize a saved MSM (timescales, populations) and optionally export it.
    Inspect(InspectArgs),
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to a pipeline configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Inputs and outputs ---
    /// Directory that relative structure and trajectory paths are resolved against.
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory the artifacts are written to.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Reference structure (.gro or .pdb) used to select the C-alpha atoms.
    #[arg(short, long, value_name = "PATH")]
    pub structure: Option<PathBuf>,

    /// Trajectory file (.gro, .pdb or .xtc). Repeat for several trajectories; replaces the
    /// list from the config file.
    #[arg(short, long = "trajectory", value_name = "PATH")]
    pub trajectories: Vec<PathBuf>,

    // --- Run flags ---
    /// Do not write any artifacts.
    #[arg(long)]
    pub no_save: bool,

    /// Keep a random half of the trajectories.
    #[arg(long)]
    pub bootstrap: bool,

    /// Use only the first trajectory for a quick test run.
    #[arg(long)]
    pub quick: bool,

    /// Score the feature set with VAMP-2 on random trajectory splits.
    #[arg(long)]
    pub score_features: bool,

    /// Skip cross-validated scoring of the final model.
    #[arg(long)]
    pub no_score_model: bool,

    /// Seed for bootstrap sampling, k-means seeding and score splits.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S tica.lag=50
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to a saved model (msm.toml).
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,

    /// Number of timescales and states to list.
    #[arg(long, default_value_t = 5, value_name = "N")]
    pub top: usize,

    /// Write the stationary distribution of the active states to a CSV file.
    #[arg(long, value_name = "PATH")]
    pub export_csv: Option<PathBuf>,
}
