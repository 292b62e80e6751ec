use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Requirement traceability from certification documents to code")]
pub struct Cli {
    /// Repository root (defaults to the enclosing git repository)
    #[clap(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Path to the config file
    #[clap(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

/// Requirement filters shared by `list` and `sync`
#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
    /// Regular expression the requirement ID must match
    #[clap(long)]
    pub id: Option<String>,

    /// Regular expression the title must match
    #[clap(long)]
    pub title: Option<String>,

    /// Regular expression the body must match
    #[clap(long)]
    pub body: Option<String>,

    /// YAML file mapping requirement IDs to changes; only those are selected
    #[clap(long)]
    pub changeset: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the graph and report every problem found
    Check,

    /// List requirements
    List {
        /// Only list this level (system, high, low, code)
        #[clap(long, short = 'l')]
        level: Option<String>,

        #[clap(flatten)]
        filter: FilterArgs,
    },

    /// List unreached requirements and requirements no code traces up to
    Dangling,

    /// Show the review changelists behind a low-level requirement
    Changelists {
        /// ID of the low-level requirement
        id: String,
    },

    /// Export the resolved graph as JSON
    Export {
        /// Output file (stdout if omitted)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Synchronize the task ledger with the requirements
    Sync {
        #[clap(flatten)]
        filter: FilterArgs,

        /// Ledger file (overrides the configured path)
        #[clap(long)]
        ledger: Option<PathBuf>,
    },
}
