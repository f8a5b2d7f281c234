//! Offline replay: runs the holder analysis over a saved explorer dump.
//!
//! Accepts either a full `tokentx` response (`{"status","message","result"}`)
//! or a bare JSON array of transfer records. No network access.
//!
//! Usage:
//!   cargo run --bin replay -- <ledger.json> [--config tenx.toml] [--contract 0x..] [--out DIR] [--buyers]
//!
//! Analysis and report settings come from the same config as the main
//! binary; `--out` and `--buyers` override the report section.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

use tenx_scan::config::{config_arg, Config};
use tenx_scan::ledger::explorer::parse_dump;
use tenx_scan::ledger::Ledger;
use tenx_scan::pipeline::{analyze_ledger, report_analysis};

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(input) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("usage: replay <ledger.json> [--config FILE] [--contract 0x..] [--out DIR] [--buyers]");
    };

    let (mut config, source) = Config::resolve(config_arg(&args).as_deref())?;
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    if let Some(path) = &source {
        info!(path = %path.display(), "loaded config");
    }

    if let Some(out) = flag_value(&args, "--out") {
        config.report.output_dir = PathBuf::from(out);
    }
    if args.iter().any(|a| a == "--buyers") {
        config.report.write_buyers = true;
    }

    let body = std::fs::read_to_string(input).with_context(|| format!("reading {}", input))?;
    let records = parse_dump(&body).with_context(|| format!("parsing {}", input))?;

    let contract = match flag_value(&args, "--contract") {
        Some(c) => c,
        None => match records.first() {
            Some(r) => r.contract_address.clone(),
            None => bail!("{} holds no transfers and no --contract was given", input),
        },
    };

    info!(input = %input, contract = %contract, records = records.len(), "replaying ledger");
    let ledger = Ledger::from_records(&contract, records)?;
    let analysis = analyze_ledger(&ledger, &config.analysis);
    report_analysis(&analysis, &config, Utc::now().date_naive())?;

    info!(
        status = %analysis.status,
        buyers = analysis.early_buyers.len(),
        holders = analysis.holders.len(),
        "replay complete"
    );
    Ok(())
}
