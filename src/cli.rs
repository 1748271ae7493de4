use std::path::PathBuf;

use clap::Parser;

/// Merge-queue controller core: continuously decides and executes the next
/// merge/trigger action for each configured branch.
#[derive(Parser, Debug)]
#[command(name = "tide", version, about)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Verbose logging for the decision engine and collaborator calls.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Force dry-run even if the config file says otherwise. Safety-only:
    /// never turns dry-run off when the config requests it.
    #[arg(long)]
    pub dry_run: bool,

    /// Run exactly one iteration and exit instead of looping forever.
    /// Useful for scripted checks and integration tests.
    #[arg(long)]
    pub once: bool,

    /// Override the config file's `listen_addr` for the status endpoint.
    #[arg(long)]
    pub listen: Option<String>,
}
