//! "Held through 10x" analysis.
//!
//! Replays the ledger with running balances. An early buyer qualifies the
//! first time it is seen *sending* tokens in a block whose synthetic price is
//! at least `target_multiple` times its entry price while still keeping a
//! positive balance afterwards, i.e. it moved some tokens after the run-up
//! but did not fully exit.
//!
//! Only outgoing transfers trigger the check. A buyer that never moves
//! tokens again after the run-up is never flagged, even though it held.

use crate::buyers::EarlyBuyer;
use crate::ledger::{self, TransferEvent};
use crate::price::PriceSeries;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Multiple over entry price that counts as a 10x.
pub fn default_target_multiple() -> Decimal {
    Decimal::from(10)
}

/// First observation of an early buyer holding through the target multiple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenXHolder {
    pub wallet: String,
    pub entry_price: Decimal,
    pub peak_price: Decimal,
    pub multiple: Decimal,
    pub entry_timestamp: i64,
    pub peak_timestamp: i64,
    pub current_balance: Decimal,
}

/// Signed running balances. Incomplete ledgers can drive a wallet negative;
/// that is kept as-is rather than clamped.
#[derive(Debug, Default)]
struct Balances<'a> {
    by_wallet: HashMap<&'a str, Decimal>,
}

impl<'a> Balances<'a> {
    fn apply(&mut self, event: &'a TransferEvent) {
        if event.amount <= Decimal::ZERO {
            return;
        }
        let to = self.by_wallet.entry(event.to.as_str()).or_default();
        *to = to.saturating_add(event.amount);
        let from = self.by_wallet.entry(event.from.as_str()).or_default();
        *from = from.saturating_sub(event.amount);
    }

    fn get(&self, wallet: &str) -> Decimal {
        self.by_wallet.get(wallet).copied().unwrap_or_default()
    }
}

/// Find early buyers that held through `target_multiple`, in the order they
/// first qualified. Each wallet appears at most once.
pub fn find_ten_x_holders(
    early_buyers: &[EarlyBuyer],
    events: &[TransferEvent],
    prices: &PriceSeries,
    target_multiple: Decimal,
) -> Vec<TenXHolder> {
    let by_wallet: HashMap<&str, &EarlyBuyer> = early_buyers
        .iter()
        .map(|b| (b.wallet.as_str(), b))
        .collect();

    let mut balances = Balances::default();
    let mut qualified: HashSet<&str> = HashSet::new();
    let mut holders: Vec<TenXHolder> = Vec::new();

    for event in ledger::causal_order(events) {
        balances.apply(event);

        let Some(price) = prices.get(event.block_number) else {
            continue;
        };
        if event.from == event.to {
            continue;
        }
        let Some(buyer) = by_wallet.get(event.from.as_str()) else {
            continue;
        };
        if qualified.contains(buyer.wallet.as_str()) {
            continue;
        }
        let Some(threshold) = buyer.entry_price.checked_mul(target_multiple) else {
            continue;
        };
        if price < threshold {
            continue;
        }

        let balance = balances.get(&event.from);
        if balance <= Decimal::ZERO {
            continue;
        }

        let multiple = price
            .checked_div(buyer.entry_price)
            .unwrap_or(Decimal::MAX);

        debug!(
            wallet = %buyer.wallet,
            entry_price = %buyer.entry_price,
            price = %price,
            multiple = %multiple.round_dp(2),
            balance = %balance,
            block = event.block_number,
            "held through target multiple"
        );

        qualified.insert(buyer.wallet.as_str());
        holders.push(TenXHolder {
            wallet: buyer.wallet.clone(),
            entry_price: buyer.entry_price,
            peak_price: price,
            multiple,
            entry_timestamp: buyer.entry_timestamp,
            peak_timestamp: event.timestamp,
            current_balance: balance,
        });
    }

    holders
}
