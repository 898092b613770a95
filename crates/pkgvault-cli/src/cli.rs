use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pkgvault",
    about = "pkgvault — content-addressed blob store administration",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store root (overrides the config file)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML store configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the store layout, or check an existing one
    Init,
    /// Copy files into the store
    Add(AddArgs),
    /// Move files into the store (same filesystem only)
    Consume(AddArgs),
    /// Write a blob's content to stdout or a file
    Fetch(FetchArgs),
    /// Print the on-disk path of a blob
    Path(IdArgs),
    /// List every committed blob
    List,
    /// Rehash blobs and report mismatches
    Verify(VerifyArgs),
    /// Remove stale files from the staging directory
    Sweep(SweepArgs),
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct FetchArgs {
    pub id: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Ids to check; all blobs when omitted
    pub ids: Vec<String>,
}

#[derive(Args)]
pub struct SweepArgs {
    #[arg(long, default_value = "86400")]
    pub older_than_secs: u64,
}
