//! Synthetic per-block price model.
//!
//! There is no pool to quote against, so price is inferred from flow at the
//! token contract itself: tokens sent *to* the contract count as buy
//! pressure, tokens sent *from* it as sell pressure. Each block nudges a
//! running price multiplicatively by 1% per unit of net pressure, floored at
//! the seed. Blocks in the first third of the history get an extra 1%
//! "early momentum" bump after they are sampled.
//!
//! This is a heuristic, not a market price. The update is stateful and
//! order-dependent, so blocks are always walked in ascending order no matter
//! how the ledger was handed in.

use crate::ledger::TransferEvent;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

/// Starting price and floor: 0.000001.
pub fn seed_price() -> Decimal {
    Decimal::new(1, 6)
}

/// Price change per unit of net pressure: 0.01.
fn pressure_step() -> Decimal {
    Decimal::new(1, 2)
}

/// Early-momentum multiplier: 1.01.
fn momentum_factor() -> Decimal {
    Decimal::new(101, 2)
}

/// Block number → synthetic price, sampled after the block's own pressure.
///
/// Blocks with no transfers have no entry; callers treat a miss as
/// "unknown price" and skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceSeries {
    prices: BTreeMap<u64, Decimal>,
}

impl PriceSeries {
    pub fn get(&self, block_number: u64) -> Option<Decimal> {
        self.prices.get(&block_number).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Iterate in ascending block order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, Decimal)> + '_ {
        self.prices.iter().map(|(b, p)| (*b, *p))
    }

    /// Highest price anywhere in the series.
    pub fn peak(&self) -> Option<(u64, Decimal)> {
        self.iter().max_by(|a, b| a.1.cmp(&b.1))
    }
}

impl FromIterator<(u64, Decimal)> for PriceSeries {
    fn from_iter<I: IntoIterator<Item = (u64, Decimal)>>(iter: I) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}

/// Buy/sell volume at the contract within a single block.
#[derive(Debug, Clone, Copy, Default)]
struct BlockFlow {
    buy: Decimal,
    sell: Decimal,
}

impl BlockFlow {
    fn net(&self) -> Decimal {
        self.buy.saturating_sub(self.sell)
    }
}

/// Build the synthetic price series for `contract` from its ledger.
///
/// Arithmetic is `Decimal` throughout; products are rounded to 28 fractional
/// digits and saturate at `Decimal::MAX` instead of overflowing.
pub fn build_price_series(events: &[TransferEvent], contract: &str) -> PriceSeries {
    let contract = contract.to_lowercase();

    let mut flows: BTreeMap<u64, BlockFlow> = BTreeMap::new();
    for event in events {
        let flow = flows.entry(event.block_number).or_default();
        if event.to == contract {
            flow.buy = flow.buy.saturating_add(event.amount);
        } else if event.from == contract {
            flow.sell = flow.sell.saturating_add(event.amount);
        }
    }

    let seed = seed_price();
    let momentum_blocks = flows.len() / 3;
    let mut current = seed;
    let mut prices = BTreeMap::new();

    for (i, (block, flow)) in flows.iter().enumerate() {
        let net = flow.net();
        if !net.is_zero() {
            let factor = Decimal::ONE.saturating_add(net.saturating_mul(pressure_step()));
            current = current.saturating_mul(factor).max(seed);
        }

        prices.insert(*block, current);

        if i < momentum_blocks {
            current = current.saturating_mul(momentum_factor());
        }
    }

    debug!(
        blocks = prices.len(),
        momentum_blocks = momentum_blocks,
        final_price = %current,
        "built synthetic price series"
    );

    PriceSeries { prices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fixtures::{transfer, TOKEN, ZERO};
    use std::collections::BTreeSet;
    use std::str::FromStr;

    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";
    const BOB: &str = "0x0000000000000000000000000000000000000b0b";

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn mixed_ledger() -> Vec<TransferEvent> {
        vec![
            transfer(100, 1, ZERO, ALICE, 1_000),
            transfer(100, 2, ALICE, TOKEN, 50),
            transfer(101, 3, TOKEN, BOB, 20),
            transfer(103, 4, ALICE, BOB, 5),
            transfer(104, 5, BOB, TOKEN, 7),
            transfer(104, 6, TOKEN, ALICE, 500),
            transfer(107, 7, ALICE, TOKEN, 3),
            transfer(109, 8, BOB, ALICE, 1),
        ]
    }

    #[test]
    fn test_empty_ledger_gives_empty_series() {
        let series = build_price_series(&[], TOKEN);
        assert!(series.is_empty());
        assert_eq!(series.peak(), None);
    }

    #[test]
    fn test_keys_match_blocks_and_respect_floor() {
        let events = mixed_ledger();
        let series = build_price_series(&events, TOKEN);

        let blocks: BTreeSet<u64> = events.iter().map(|e| e.block_number).collect();
        let keys: BTreeSet<u64> = series.iter().map(|(b, _)| b).collect();
        assert_eq!(keys, blocks);
        assert!(series.iter().all(|(_, p)| p >= seed_price()));
    }

    #[test]
    fn test_deterministic_and_order_independent() {
        let events = mixed_ledger();
        let first = build_price_series(&events, TOKEN);
        let second = build_price_series(&events, TOKEN);
        assert_eq!(first, second);

        let mut shuffled = events.clone();
        shuffled.reverse();
        shuffled.swap(1, 5);
        assert_eq!(build_price_series(&shuffled, TOKEN), first);
    }

    #[test]
    fn test_contract_address_is_case_insensitive() {
        let events = mixed_ledger();
        assert_eq!(
            build_price_series(&events, &TOKEN.to_uppercase().replace("0X", "0x")),
            build_price_series(&events, TOKEN)
        );
    }

    #[test]
    fn test_buy_pressure_raises_price() {
        // 10 tokens into the contract: 0.000001 * (1 + 10 * 0.01)
        let series = build_price_series(&[transfer(1, 1, ALICE, TOKEN, 10)], TOKEN);
        assert_eq!(series.get(1), Some(d("0.0000011")));
    }

    #[test]
    fn test_sell_pressure_floors_at_seed() {
        let series = build_price_series(&[transfer(1, 1, TOKEN, ALICE, 500)], TOKEN);
        assert_eq!(series.get(1), Some(seed_price()));
    }

    #[test]
    fn test_mint_to_wallet_keeps_seed_price() {
        let series = build_price_series(&[transfer(7, 1, ZERO, ALICE, 100)], TOKEN);
        assert_eq!(series.len(), 1);
        assert_eq!(series.get(7), Some(seed_price()));
    }

    #[test]
    fn test_early_momentum_applies_to_first_third() {
        // Six neutral blocks: positions 0 and 1 bump the price after sampling.
        let events: Vec<TransferEvent> = (0..6)
            .map(|i| transfer(10 + i, i as i64, ALICE, BOB, 1))
            .collect();
        let series = build_price_series(&events, TOKEN);

        assert_eq!(series.get(10), Some(d("0.000001")));
        assert_eq!(series.get(11), Some(d("0.00000101")));
        assert_eq!(series.get(12), Some(d("0.0000010201")));
        assert_eq!(series.get(15), Some(d("0.0000010201")));
    }

    #[test]
    fn test_momentum_boundary_uses_floor_division() {
        // Two blocks: 2 / 3 == 0, so no bump at all.
        let events = vec![transfer(1, 1, ALICE, BOB, 1), transfer(2, 2, ALICE, BOB, 1)];
        let series = build_price_series(&events, TOKEN);
        assert_eq!(series.get(2), Some(seed_price()));
    }

    #[test]
    fn test_price_is_sampled_after_pressure() {
        let events = vec![
            transfer(1, 1, ALICE, BOB, 1),
            transfer(2, 2, ALICE, BOB, 1),
            transfer(3, 3, ALICE, BOB, 1),
            transfer(4, 4, ALICE, TOKEN, 100),
        ];
        let series = build_price_series(&events, TOKEN);
        // block 1 bumps to 0.00000101, block 4 doubles it.
        assert_eq!(series.get(3), Some(d("0.00000101")));
        assert_eq!(series.get(4), Some(d("0.00000202")));
        assert_eq!(series.peak(), Some((4, d("0.00000202"))));
    }

    #[test]
    fn test_huge_pressure_saturates_instead_of_panicking() {
        let events: Vec<TransferEvent> = (0..20)
            .map(|i| transfer(i, i as i64, ALICE, TOKEN, u64::MAX / 2))
            .collect();
        let series = build_price_series(&events, TOKEN);
        assert_eq!(series.len(), 20);
        assert_eq!(series.get(19), Some(Decimal::MAX));
    }
}
