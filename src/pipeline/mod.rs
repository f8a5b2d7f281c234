//! Per-contract analysis and the multi-contract run loop.
//!
//! `analyze_ledger` is the pure core: ledger in, holders out, no I/O.
//! `run` wraps it with the explorer fetch and the CSV reporter, processing
//! contracts one at a time. A failure on one contract is logged and the run
//! moves on to the next.

use crate::buyers::{identify_early_buyers, EarlyBuyer};
use crate::config::{AnalysisConfig, Config};
use crate::holders::{default_target_multiple, find_ten_x_holders, TenXHolder};
use crate::ledger::{ExplorerClient, Ledger};
use crate::price::build_price_series;
use crate::report;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

/// Where a contract's analysis ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    NoTransfers,
    NoPriceData,
    NoEarlyBuyers,
    Analyzed,
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisStatus::NoTransfers => write!(f, "no_transfers"),
            AnalysisStatus::NoPriceData => write!(f, "no_price_data"),
            AnalysisStatus::NoEarlyBuyers => write!(f, "no_early_buyers"),
            AnalysisStatus::Analyzed => write!(f, "analyzed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContractAnalysis {
    pub contract: String,
    pub symbol: String,
    pub status: AnalysisStatus,
    pub transfers: usize,
    pub priced_blocks: usize,
    pub early_buyers: Vec<EarlyBuyer>,
    pub holders: Vec<TenXHolder>,
}

impl ContractAnalysis {
    fn short_circuit(ledger: &Ledger, status: AnalysisStatus, priced_blocks: usize) -> Self {
        Self {
            contract: ledger.contract.clone(),
            symbol: ledger.symbol.clone(),
            status,
            transfers: ledger.len(),
            priced_blocks,
            early_buyers: Vec::new(),
            holders: Vec::new(),
        }
    }
}

/// Totals across a multi-contract run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub contracts: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub holders: usize,
}

/// Convert the configured multiple to a `Decimal`, falling back to 10x.
pub fn target_multiple(settings: &AnalysisConfig) -> Decimal {
    Decimal::from_str(&settings.target_multiple.to_string())
        .ok()
        .filter(|m| *m > Decimal::ZERO)
        .unwrap_or_else(default_target_multiple)
}

/// Run price model, buyer detection and holding analysis over one ledger.
///
/// Empty ledgers, empty price series and empty buyer sets end the analysis
/// early with an empty holder list; none of them is an error.
pub fn analyze_ledger(ledger: &Ledger, settings: &AnalysisConfig) -> ContractAnalysis {
    if ledger.is_empty() {
        warn!(contract = %ledger.contract, "no transactions found, skipping");
        return ContractAnalysis::short_circuit(ledger, AnalysisStatus::NoTransfers, 0);
    }

    let prices = build_price_series(&ledger.events, &ledger.contract);
    let Some((peak_block, peak_price)) = prices.peak() else {
        warn!(contract = %ledger.contract, "could not generate price data, skipping");
        return ContractAnalysis::short_circuit(ledger, AnalysisStatus::NoPriceData, 0);
    };
    info!(
        contract = %ledger.contract,
        blocks = prices.len(),
        peak_block,
        peak_price = %peak_price,
        "generated price data"
    );

    info!(
        contract = %ledger.contract,
        symbol = %ledger.symbol,
        max_buyers = settings.max_buyers,
        "identifying early buyers"
    );
    let early_buyers = identify_early_buyers(&ledger.events, &prices, settings.max_buyers);
    info!(contract = %ledger.contract, buyers = early_buyers.len(), "found unique early buyers");
    if early_buyers.is_empty() {
        warn!(contract = %ledger.contract, "no early buyers identified, skipping");
        return ContractAnalysis::short_circuit(ledger, AnalysisStatus::NoEarlyBuyers, prices.len());
    }

    let multiple = target_multiple(settings);
    let holders = find_ten_x_holders(&early_buyers, &ledger.events, &prices, multiple);
    info!(
        contract = %ledger.contract,
        symbol = %ledger.symbol,
        holders = holders.len(),
        target_multiple = %multiple,
        "holding analysis complete"
    );

    ContractAnalysis {
        contract: ledger.contract.clone(),
        symbol: ledger.symbol.clone(),
        status: AnalysisStatus::Analyzed,
        transfers: ledger.len(),
        priced_blocks: prices.len(),
        early_buyers,
        holders,
    }
}

/// Log the summary and persist results for one analyzed contract.
pub fn report_analysis(analysis: &ContractAnalysis, config: &Config, date: NaiveDate) -> anyhow::Result<()> {
    report::log_summary(&analysis.contract, &analysis.holders, config.report.top_n);

    let dir = &config.report.output_dir;
    report::save_holders(&analysis.holders, &analysis.contract, dir, date)
        .with_context(|| format!("saving holders for {}", analysis.contract))?;
    if config.report.write_buyers {
        report::save_early_buyers(&analysis.early_buyers, &analysis.contract, dir, date)
            .with_context(|| format!("saving early buyers for {}", analysis.contract))?;
    }
    Ok(())
}

async fn process_contract(
    client: &ExplorerClient,
    contract: &str,
    config: &Config,
    date: NaiveDate,
) -> anyhow::Result<ContractAnalysis> {
    let ledger = client
        .fetch_ledger(contract)
        .await
        .with_context(|| format!("fetching transfers for {}", contract))?;
    let analysis = analyze_ledger(&ledger, &config.analysis);
    report_analysis(&analysis, config, date)?;
    Ok(analysis)
}

/// Analyze every configured contract in order.
pub async fn run(config: &Config) -> anyhow::Result<RunSummary> {
    let contracts = &config.analysis.contracts;
    let mut summary = RunSummary {
        contracts: contracts.len(),
        ..RunSummary::default()
    };
    if contracts.is_empty() {
        warn!("no contracts configured (set analysis.contracts or TENX_CONTRACTS)");
        return Ok(summary);
    }
    if !config.has_api_key() {
        warn!("no explorer API key configured (set EXPLORER_API_KEY); requests may be throttled");
    }

    let client = ExplorerClient::new(&config.explorer);
    let delay = Duration::from_millis(config.run.contract_delay_ms);
    let date = Utc::now().date_naive();

    for (i, contract) in contracts.iter().enumerate() {
        info!(contract = %contract, index = i + 1, total = contracts.len(), "starting analysis");

        match process_contract(&client, contract, config, date).await {
            Ok(analysis) => {
                summary.analyzed += 1;
                summary.holders += analysis.holders.len();
                info!(
                    contract = %contract,
                    status = %analysis.status,
                    transfers = analysis.transfers,
                    priced_blocks = analysis.priced_blocks,
                    holders = analysis.holders.len(),
                    "contract done"
                );
            }
            Err(e) => {
                summary.failed += 1;
                error!(contract = %contract, error = %format!("{:#}", e), "contract analysis failed");
            }
        }

        if i + 1 < contracts.len() {
            tokio::time::sleep(delay).await;
        }
    }

    info!(
        contracts = summary.contracts,
        analyzed = summary.analyzed,
        failed = summary.failed,
        holders = summary.holders,
        "analysis complete"
    );
    Ok(summary)
}
