//! # CLI Interface
//!
//! Defines the command-line argument structure for `tessera` using `clap`
//! derive. Supports three subcommands: `run`, `init` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tessera offering replay host.
///
/// Deploys a token ledger, runs presale and crowdsale contracts against it
/// and replays a scripted sequence of calls, printing one receipt per call.
#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    about = "Tessera offering replay host",
    version,
    propagate_version = true
)]
pub struct TesseraCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `tessera` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario file.
    Run(RunArgs),
    /// Write a template scenario to start from.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the scenario file (JSON).
    #[arg(env = "TESSERA_SCENARIO")]
    pub scenario: PathBuf,

    /// Log format: `pretty` or `json`.
    #[arg(long, env = "TESSERA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Print receipts and the final state as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Exit with an error if any call's outcome differs from its `expect`.
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write the template.
    #[arg(default_value = "scenario.json")]
    pub path: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}
