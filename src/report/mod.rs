//! Result reporting: console summary and CSV persistence.
//!
//! Files are keyed by the first eight characters of the contract address and
//! the run date, e.g. `10x_holders_0xc06340_20250101.csv`. Rows keep the
//! holder field order so downstream tooling can read them without a schema.

use crate::buyers::EarlyBuyer;
use crate::holders::TenXHolder;
use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to create output directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct HolderRow<'a> {
    wallet: &'a str,
    entry_price: String,
    peak_price: String,
    multiple: String,
    entry_time: String,
    peak_time: String,
    current_balance: String,
}

impl<'a> From<&'a TenXHolder> for HolderRow<'a> {
    fn from(h: &'a TenXHolder) -> Self {
        Self {
            wallet: &h.wallet,
            entry_price: h.entry_price.normalize().to_string(),
            peak_price: h.peak_price.normalize().to_string(),
            multiple: h.multiple.normalize().to_string(),
            entry_time: format_timestamp(h.entry_timestamp),
            peak_time: format_timestamp(h.peak_timestamp),
            current_balance: h.current_balance.normalize().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct BuyerRow<'a> {
    wallet: &'a str,
    amount: String,
    entry_price: String,
    entry_block: u64,
    entry_time: String,
    tx_hash: &'a str,
}

impl<'a> From<&'a EarlyBuyer> for BuyerRow<'a> {
    fn from(b: &'a EarlyBuyer) -> Self {
        Self {
            wallet: &b.wallet,
            amount: b.amount.normalize().to_string(),
            entry_price: b.entry_price.normalize().to_string(),
            entry_block: b.entry_block,
            entry_time: format_timestamp(b.entry_timestamp),
            tx_hash: &b.tx_hash,
        }
    }
}

/// Unix seconds as `YYYY-MM-DD HH:MM:SS` (UTC). Out-of-range values fall
/// back to the raw number.
pub fn format_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn contract_prefix(contract: &str) -> String {
    contract.chars().take(8).collect()
}

pub fn holders_filename(contract: &str, date: NaiveDate) -> String {
    format!(
        "10x_holders_{}_{}.csv",
        contract_prefix(contract),
        date.format("%Y%m%d")
    )
}

pub fn buyers_filename(contract: &str, date: NaiveDate) -> String {
    format!(
        "early_buyers_{}_{}.csv",
        contract_prefix(contract),
        date.format("%Y%m%d")
    )
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut w = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

/// Write qualifying holders to CSV. Nothing is written for an empty result.
pub fn save_holders(
    holders: &[TenXHolder],
    contract: &str,
    output_dir: &Path,
    date: NaiveDate,
) -> Result<Option<PathBuf>, ReportError> {
    if holders.is_empty() {
        warn!(contract = %contract, "no holders to save");
        return Ok(None);
    }
    let path = output_dir.join(holders_filename(contract, date));
    write_rows(&path, holders.iter().map(HolderRow::from))?;
    info!(path = %path.display(), rows = holders.len(), "holders saved");
    Ok(Some(path))
}

/// Write the early-buyer set to CSV. Nothing is written for an empty set.
pub fn save_early_buyers(
    buyers: &[EarlyBuyer],
    contract: &str,
    output_dir: &Path,
    date: NaiveDate,
) -> Result<Option<PathBuf>, ReportError> {
    if buyers.is_empty() {
        return Ok(None);
    }
    let path = output_dir.join(buyers_filename(contract, date));
    write_rows(&path, buyers.iter().map(BuyerRow::from))?;
    info!(path = %path.display(), rows = buyers.len(), "early buyers saved");
    Ok(Some(path))
}

/// Log the first `top_n` holders.
pub fn log_summary(contract: &str, holders: &[TenXHolder], top_n: usize) {
    if holders.is_empty() {
        warn!(contract = %contract, "no wallets held through the target multiple");
        return;
    }

    info!(contract = %contract, holders = holders.len(), "wallets that held through the target multiple");
    for (i, h) in holders.iter().take(top_n).enumerate() {
        info!(
            rank = i + 1,
            wallet = %h.wallet,
            entry_price = %h.entry_price.round_dp(6),
            peak_price = %h.peak_price.round_dp(6),
            multiple = %h.multiple.round_dp(1),
            entry_time = %format_timestamp(h.entry_timestamp),
            peak_time = %format_timestamp(h.peak_timestamp),
            balance = %h.current_balance.round_dp(4),
            "holder"
        );
    }
    if holders.len() > top_n {
        info!(more = holders.len() - top_n, "additional holders not shown");
    }
}
