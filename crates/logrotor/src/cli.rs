//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logrotor")]
#[command(version, about = "Rotate, compress and prune log files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rotate every log that is due and save the state table
    Run(RunArgs),

    /// Show what a run would do without touching anything
    Check(RunArgs),

    /// Show the state table
    Status(StatusArgs),
}

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Config file (.toml, .yaml, .yml or .json). Searched for in the
    /// current directory, then /etc/logrotor, when omitted
    #[arg(short, long, env = "LOGROTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file, overriding the one named in the config
    #[arg(short, long, env = "LOGROTOR_STATE")]
    pub state: Option<PathBuf>,

    /// Rotate every file even if it is not due
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Clone)]
pub struct StatusArgs {
    /// State file to read
    #[arg(short, long, env = "LOGROTOR_STATE")]
    pub state: Option<PathBuf>,

    /// Config file used only to find the state file
    #[arg(short, long, env = "LOGROTOR_CONFIG")]
    pub config: Option<PathBuf>,
}
