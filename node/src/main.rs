// Copyright (c) 2026 Tessera Contributors. MIT License.
// See LICENSE for details.

//! # Tessera Replay Host
//!
//! Entry point for the `tessera` binary. Parses CLI arguments, initializes
//! logging and metrics, and replays an offering scenario.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — replay a scenario and print receipts
//! - `init`    — write a template scenario
//! - `version` — print build version information

mod cli;
mod host;
mod logging;
mod metrics;
mod scenario;

use anyhow::{bail, Context, Result};
use clap::Parser;

use cli::{Commands, TesseraCli};
use host::Host;
use logging::LogFormat;
use metrics::OfferingMetrics;
use scenario::Scenario;

fn main() -> Result<()> {
    let cli = TesseraCli::parse();

    match cli.command {
        Commands::Run(args) => run_scenario(args),
        Commands::Init(args) => init_scenario(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads a scenario, replays it and prints the receipts and final state.
fn run_scenario(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    )
    .context("failed to install log subscriber")?;

    let scenario = Scenario::load(&args.scenario)?;
    tracing::info!(
        scenario = %args.scenario.display(),
        calls = scenario.calls.len(),
        "replaying scenario"
    );

    let metrics = OfferingMetrics::new().context("failed to create metrics registry")?;
    let mut host = Host::new(&scenario, metrics).context("failed to deploy ledger")?;
    let receipts = host.run(&scenario.calls);
    let summary = host.summary();

    if args.json {
        let out = serde_json::json!({ "receipts": receipts, "summary": summary });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("failed to render receipts")?
        );
    } else {
        for receipt in &receipts {
            println!("{receipt}");
        }
        println!();
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to render summary")?
        );
    }

    if args.metrics {
        let text = host.metrics().encode().context("failed to encode metrics")?;
        print!("{text}");
    }

    let rejected = receipts.iter().filter(|r| r.outcome().is_err()).count();
    let unexpected = receipts.iter().filter(|r| !r.as_expected).count();
    tracing::info!(
        calls = receipts.len(),
        rejected,
        unexpected,
        finished_at = %host.now(),
        "replay finished"
    );

    if args.strict && unexpected > 0 {
        bail!("{unexpected} call(s) did not match their expected outcome");
    }
    Ok(())
}

/// Writes the template scenario.
fn init_scenario(args: cli::InitArgs) -> Result<()> {
    logging::init_logging(logging::QUIET_FILTER, LogFormat::Pretty)
        .context("failed to install log subscriber")?;

    let path = &args.path;
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let body = serde_json::to_string_pretty(&scenario::template())
        .context("failed to render template")?;
    std::fs::write(path, body + "\n")
        .with_context(|| format!("failed to write scenario to {}", path.display()))?;

    tracing::info!(path = %path.display(), "template scenario written");
    println!("Scenario written to {}", path.display());
    println!("Replay it with: tessera run {}", path.display());
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("tessera {}", env!("CARGO_PKG_VERSION"));
    println!("decimals {}", tessera_protocol::config::DECIMALS);
}
