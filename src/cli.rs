use clap::{Parser, Subcommand};
use clap_complete::Shell;
use reconciler::Event;
use std::path::PathBuf;

use crate::config::PROVIDER_CONFIG_VAR;

#[derive(Parser)]
#[command(name = "multiverse")]
#[command(version)]
#[command(about = "Reconcile resources through external executor programs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one lifecycle event against a resource record
    Run(RunArgs),

    /// Read many resource records in parallel and store the results
    Refresh(RefreshArgs),

    /// Print the canonical JSON of a configuration file
    Decode {
        /// JSON, YAML or TOML file
        file: PathBuf,
    },

    /// Compare two configuration files, ignoring computed (@) fields
    Diff {
        /// Previous configuration
        old: PathBuf,

        /// Proposed configuration
        new: PathBuf,
    },

    /// List the resource types this provider exposes
    Types,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ProviderArgs {
    /// Provider defaults (JSON, YAML or TOML)
    #[arg(short, long, env = PROVIDER_CONFIG_VAR)]
    pub provider: Option<PathBuf>,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Lifecycle event: create, read, update, delete or exists
    pub event: Event,

    /// Resource record (JSON)
    #[arg(short, long)]
    pub state: PathBuf,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Write the updated record here instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show the effective parameters without running the executor
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct RefreshArgs {
    /// Resource records (JSON), updated in place
    #[arg(required = true)]
    pub states: Vec<PathBuf>,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Report what changed without writing the records back
    #[arg(long)]
    pub dry_run: bool,

    /// Print a JSON summary instead of a listing
    #[arg(long)]
    pub json: bool,
}
