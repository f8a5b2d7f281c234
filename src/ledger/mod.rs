//! Token transfer ledger: the complete transfer history of one ERC-20
//! contract, as returned by a block-explorer `tokentx` query.
//!
//! Records arrive from the explorer with every numeric field encoded as a
//! string. They are validated once, here, and turned into [`TransferEvent`]s
//! carrying an exact decimal-adjusted amount. Everything downstream
//! (price model, buyer detector, holding analyzer) reads the ledger and never
//! touches the raw strings again.

pub mod explorer;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

pub use explorer::ExplorerClient;

/// Decimals assumed when the explorer omits `tokenDecimal`.
pub const DEFAULT_DECIMALS: u32 = 18;
/// Symbol assumed when the explorer omits `tokenSymbol`.
pub const DEFAULT_SYMBOL: &str = "TOKEN";
/// Largest scale a `Decimal` can carry.
pub const MAX_DECIMALS: u32 = 28;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("explorer API error: {message} ({detail})")]
    Api { message: String, detail: String },
    #[error("invalid {field} {value:?} in tx {tx_hash}")]
    InvalidField {
        field: &'static str,
        value: String,
        tx_hash: String,
    },
    #[error("token decimals {0} exceed the supported maximum of 28")]
    UnsupportedDecimals(u32),
    #[error("raw value {0} does not fit a decimal amount")]
    ValueOverflow(u128),
    #[error("block {block} alone fills the explorer result window")]
    WindowStalled { block: u64 },
}

/// One record of the explorer's `tokentx` result array, untouched.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransfer {
    pub block_number: String,
    #[serde(rename = "timeStamp")]
    pub timestamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub contract_address: String,
    #[serde(default)]
    pub token_decimal: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
}

/// A single validated token transfer. Addresses are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub block_number: u64,
    pub timestamp: i64,
    pub from: String,
    pub to: String,
    pub contract_address: String,
    pub raw_value: u128,
    /// `raw_value / 10^decimals`, exact.
    pub amount: Decimal,
    pub tx_hash: String,
}

/// The full transfer history of a token plus its metadata.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub contract: String,
    pub symbol: String,
    pub decimals: u32,
    pub events: Vec<TransferEvent>,
}

impl Ledger {
    /// Validate raw explorer records into a ledger.
    ///
    /// Decimals and symbol are constant per contract and taken from the first
    /// record (defaulting to 18 / `TOKEN` when absent). Any malformed record
    /// rejects the whole ledger: the analysis assumes a complete history.
    pub fn from_records(contract: &str, records: Vec<RawTransfer>) -> Result<Self, LedgerError> {
        let first = records.first();
        let decimals = match first.and_then(|r| r.token_decimal.as_deref()) {
            Some(d) if !d.is_empty() => parse_field("tokenDecimal", d, &first_hash(&records))?,
            _ => DEFAULT_DECIMALS,
        };
        let symbol = first
            .and_then(|r| r.token_symbol.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());

        let events = records
            .into_iter()
            .map(|r| TransferEvent::from_raw(r, decimals))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            contract: contract.to_lowercase(),
            symbol,
            decimals,
            events,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl TransferEvent {
    fn from_raw(raw: RawTransfer, decimals: u32) -> Result<Self, LedgerError> {
        let block_number = parse_field("blockNumber", &raw.block_number, &raw.hash)?;
        let timestamp = parse_field("timeStamp", &raw.timestamp, &raw.hash)?;
        let raw_value: u128 = parse_field("value", &raw.value, &raw.hash)?;
        let amount = adjusted_amount(raw_value, decimals)?;

        Ok(Self {
            block_number,
            timestamp,
            from: raw.from.to_lowercase(),
            to: raw.to.to_lowercase(),
            contract_address: raw.contract_address.to_lowercase(),
            raw_value,
            amount,
            tx_hash: raw.hash,
        })
    }

    /// Ordering key shared by every replay of the ledger.
    pub fn causal_key(&self) -> (u64, i64) {
        (self.block_number, self.timestamp)
    }
}

fn first_hash(records: &[RawTransfer]) -> String {
    records.first().map(|r| r.hash.clone()).unwrap_or_default()
}

pub(crate) fn parse_field<T: std::str::FromStr>(
    field: &'static str,
    value: &str,
    tx_hash: &str,
) -> Result<T, LedgerError> {
    value.trim().parse().map_err(|_| LedgerError::InvalidField {
        field,
        value: value.to_string(),
        tx_hash: tx_hash.to_string(),
    })
}

/// Convert a raw base-unit value to a token quantity without going through
/// floating point. The integer and fractional parts are built separately so
/// values wider than the 96-bit mantissa still convert when their whole-token
/// part fits.
pub fn adjusted_amount(raw: u128, decimals: u32) -> Result<Decimal, LedgerError> {
    if decimals > MAX_DECIMALS {
        return Err(LedgerError::UnsupportedDecimals(decimals));
    }
    let unit = 10u128.pow(decimals);
    let whole = i128::try_from(raw / unit).map_err(|_| LedgerError::ValueOverflow(raw))?;
    let fraction = (raw % unit) as i128;

    let whole = Decimal::try_from_i128_with_scale(whole, 0)
        .map_err(|_| LedgerError::ValueOverflow(raw))?;
    let fraction = Decimal::try_from_i128_with_scale(fraction, decimals)
        .map_err(|_| LedgerError::ValueOverflow(raw))?;

    whole
        .checked_add(fraction)
        .map(|d| d.normalize())
        .ok_or(LedgerError::ValueOverflow(raw))
}

/// Stable sort by `(block_number, timestamp)`; ties keep input order.
pub fn causal_order(events: &[TransferEvent]) -> Vec<&TransferEvent> {
    let mut ordered: Vec<&TransferEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.causal_key());
    ordered
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn raw(block: &str, ts: &str, value: &str) -> RawTransfer {
        RawTransfer {
            block_number: block.to_string(),
            timestamp: ts.to_string(),
            hash: "0xabc".to_string(),
            from: "0xAAAA".to_string(),
            to: "0xBBBB".to_string(),
            value: value.to_string(),
            contract_address: "0xToken".to_string(),
            token_decimal: Some("6".to_string()),
            token_symbol: Some("USDX".to_string()),
        }
    }

    #[test]
    fn test_adjusted_amount_exact() {
        assert_eq!(
            adjusted_amount(100 * 10u128.pow(18), 18).unwrap(),
            Decimal::from(100)
        );
        assert_eq!(
            adjusted_amount(1, 18).unwrap(),
            Decimal::from_str("0.000000000000000001").unwrap()
        );
        assert_eq!(
            adjusted_amount(1_234_567, 6).unwrap(),
            Decimal::from_str("1.234567").unwrap()
        );
        assert!(adjusted_amount(0, 18).unwrap().is_zero());
    }

    #[test]
    fn test_adjusted_amount_wide_raw_value() {
        // 10^30 base units is wider than the 96-bit mantissa, but 10^12 tokens fit.
        let amount = adjusted_amount(10u128.pow(30), 18).unwrap();
        assert_eq!(amount, Decimal::from(1_000_000_000_000u64));
    }

    #[test]
    fn test_adjusted_amount_rejects_bad_input() {
        assert!(matches!(
            adjusted_amount(1, 29),
            Err(LedgerError::UnsupportedDecimals(29))
        ));
        assert!(matches!(
            adjusted_amount(u128::MAX, 0),
            Err(LedgerError::ValueOverflow(_))
        ));
    }

    #[test]
    fn test_ledger_uses_first_record_metadata() {
        let ledger = Ledger::from_records(
            "0xTOKEN",
            vec![raw("10", "1700000000", "2500000"), raw("11", "1700000012", "1")],
        )
        .unwrap();

        assert_eq!(ledger.contract, "0xtoken");
        assert_eq!(ledger.decimals, 6);
        assert_eq!(ledger.symbol, "USDX");
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.events[0].amount, Decimal::from_str("2.5").unwrap());
        assert_eq!(ledger.events[0].from, "0xaaaa");
        assert_eq!(ledger.events[0].contract_address, "0xtoken");
    }

    #[test]
    fn test_ledger_defaults_missing_metadata() {
        let mut r = raw("10", "1700000000", "1000000000000000000");
        r.token_decimal = None;
        r.token_symbol = None;
        let ledger = Ledger::from_records("0xtoken", vec![r]).unwrap();

        assert_eq!(ledger.decimals, DEFAULT_DECIMALS);
        assert_eq!(ledger.symbol, DEFAULT_SYMBOL);
        assert_eq!(ledger.events[0].amount, Decimal::ONE);
    }

    #[test]
    fn test_ledger_rejects_malformed_record() {
        let err = Ledger::from_records(
            "0xtoken",
            vec![raw("10", "1700000000", "5"), raw("eleven", "1700000012", "5")],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidField { field: "blockNumber", .. }
        ));
    }

    #[test]
    fn test_empty_ledger() {
        let ledger = Ledger::from_records("0xtoken", Vec::new()).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.decimals, DEFAULT_DECIMALS);
    }

    #[test]
    fn test_causal_order_is_stable() {
        use crate::ledger::fixtures::transfer;
        let events = vec![
            transfer(5, 100, "0x1", "0xa", 1),
            transfer(3, 90, "0x1", "0xb", 1),
            transfer(5, 100, "0x1", "0xc", 1),
            transfer(5, 99, "0x1", "0xd", 1),
        ];
        let order: Vec<&str> = causal_order(&events).iter().map(|e| e.to.as_str()).collect();
        assert_eq!(order, vec!["0xb", "0xd", "0xa", "0xc"]);
    }
}
