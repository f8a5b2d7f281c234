//! Early-buyer detection.
//!
//! Walks the ledger in causal order and records the first acquisition of
//! each wallet until `max_buyers` wallets have been found. Transfers that
//! touch the token contract itself are accounting artifacts (mint, burn,
//! tax swaps) and never identify a buyer.

use crate::ledger::{self, TransferEvent};
use crate::price::PriceSeries;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_MAX_BUYERS: usize = 500;

/// A wallet's first priced acquisition. Frozen once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EarlyBuyer {
    pub wallet: String,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub entry_block: u64,
    pub entry_timestamp: i64,
    pub tx_hash: String,
}

/// Select up to `max_buyers` distinct early buyers, in ledger order.
///
/// A receipt in a block with no synthetic price does not count; the wallet
/// can still be picked up by a later receipt in a priced block. Scanning
/// stops as soon as the cap is reached.
pub fn identify_early_buyers(
    events: &[TransferEvent],
    prices: &PriceSeries,
    max_buyers: usize,
) -> Vec<EarlyBuyer> {
    let mut buyers: Vec<EarlyBuyer> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unpriced = 0usize;

    for event in ledger::causal_order(events) {
        if buyers.len() >= max_buyers {
            break;
        }
        if event.to == event.contract_address || event.from == event.contract_address {
            continue;
        }
        if event.amount.is_zero() {
            continue;
        }
        if seen.contains(event.to.as_str()) {
            continue;
        }

        let Some(entry_price) = prices.get(event.block_number) else {
            unpriced += 1;
            continue;
        };

        seen.insert(event.to.as_str());
        buyers.push(EarlyBuyer {
            wallet: event.to.clone(),
            amount: event.amount,
            entry_price,
            entry_block: event.block_number,
            entry_timestamp: event.timestamp,
            tx_hash: event.tx_hash.clone(),
        });
    }

    debug!(
        buyers = buyers.len(),
        max_buyers = max_buyers,
        unpriced_skips = unpriced,
        "early buyers identified"
    );

    buyers
}
