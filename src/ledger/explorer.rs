//! BaseScan / Etherscan-compatible `tokentx` client.
//!
//! Pages through `module=account&action=tokentx` in ascending order until a
//! short page comes back. The explorer reports "no results" as an error
//! status, so that one message is mapped to an empty ledger.
//!
//! Explorers refuse any query deeper than `page * offset > result_window`
//! (10k on the Etherscan family). Longer histories are fetched as a series of
//! block-range windows: when a window fills up, the records of its last
//! block are dropped and the next window restarts at that block, so no
//! transfer is skipped or counted twice. Every other error status fails the
//! contract, since a partial ledger would silently skew balances.

use crate::config::ExplorerConfig;
use crate::ledger::{parse_field, Ledger, LedgerError, RawTransfer};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const NO_TRANSACTIONS: &str = "No transactions found";
const RESULT_WINDOW_TOO_LARGE: &str = "Result window is too large";

/// Explorer envelope. `result` is an array on success and a string on error.
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

/// One decoded page of the `tokentx` listing.
#[derive(Debug)]
pub enum Page {
    Records(Vec<RawTransfer>),
    /// The explorer has nothing (more) for this contract.
    Empty,
    /// The page lies past the explorer's result window.
    WindowExceeded,
}

pub struct ExplorerClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    page_size: u32,
    page_delay: Duration,
    result_window: u32,
}

impl ExplorerClient {
    pub fn new(config: &ExplorerConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            page_size: config.page_size.max(1),
            page_delay: Duration::from_millis(config.page_delay_ms),
            result_window: config.result_window.max(config.page_size),
        }
    }

    /// Fetch a single page (1-based) of the window starting at `start_block`.
    pub async fn fetch_page(
        &self,
        contract: &str,
        start_block: u64,
        page: u32,
    ) -> Result<Page, LedgerError> {
        let start_block = start_block.to_string();
        let page = page.to_string();
        let offset = self.page_size.to_string();
        let resp = self
            .http
            .get(&self.api_url)
            .query(&[
                ("module", "account"),
                ("action", "tokentx"),
                ("contractaddress", contract),
                ("startblock", start_block.as_str()),
                ("page", page.as_str()),
                ("offset", offset.as_str()),
                ("sort", "asc"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = resp.text().await?;
        parse_page(&body)
    }

    /// Fetch the complete transfer history of `contract`.
    pub async fn fetch_ledger(&self, contract: &str) -> Result<Ledger, LedgerError> {
        info!(contract = %contract, "fetching transfer history");

        let mut records: Vec<RawTransfer> = Vec::new();
        let mut start_block = 0u64;
        let mut page = 1u32;

        loop {
            let batch = match self.fetch_page(contract, start_block, page).await? {
                Page::Records(batch) => batch,
                Page::Empty => break,
                Page::WindowExceeded => {
                    start_block = rewind_window(&mut records, start_block)?;
                    page = 1;
                    info!(contract = %contract, start_block, "result window exceeded, restarting");
                    tokio::time::sleep(self.page_delay).await;
                    continue;
                }
            };
            let count = batch.len();
            records.extend(batch);
            debug!(
                contract = %contract,
                start_block = start_block,
                page = page,
                count = count,
                total = records.len(),
                "fetched page"
            );

            if is_last_page(count, self.page_size) {
                break;
            }
            if is_window_full(page, self.page_size, self.result_window) {
                start_block = rewind_window(&mut records, start_block)?;
                page = 1;
                debug!(contract = %contract, start_block, "window full, moving to next block range");
            } else {
                page += 1;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        info!(contract = %contract, transfers = records.len(), "transfer history loaded");
        Ledger::from_records(contract, records)
    }
}

/// Decode an explorer response body.
pub fn parse_page(body: &str) -> Result<Page, LedgerError> {
    let resp: ExplorerResponse = serde_json::from_str(body)?;

    if resp.status != "1" {
        if resp.message.starts_with(NO_TRANSACTIONS) {
            return Ok(Page::Empty);
        }
        let detail = match &resp.result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if detail.starts_with(RESULT_WINDOW_TOO_LARGE) {
            return Ok(Page::WindowExceeded);
        }
        return Err(LedgerError::Api {
            message: resp.message,
            detail,
        });
    }

    let records: Vec<RawTransfer> = serde_json::from_value(resp.result)?;
    if records.is_empty() {
        return Ok(Page::Empty);
    }
    Ok(Page::Records(records))
}

/// Parse a saved explorer dump: either a full response envelope or a bare
/// array of records.
pub fn parse_dump(body: &str) -> Result<Vec<RawTransfer>, LedgerError> {
    if body.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(body)?);
    }
    match parse_page(body)? {
        Page::Records(records) => Ok(records),
        Page::Empty => Ok(Vec::new()),
        Page::WindowExceeded => Err(LedgerError::Api {
            message: "NOTOK".to_string(),
            detail: RESULT_WINDOW_TOO_LARGE.to_string(),
        }),
    }
}

fn is_last_page(count: usize, page_size: u32) -> bool {
    count < page_size as usize
}

/// Whether the next page would reach past the result window.
fn is_window_full(page: u32, page_size: u32, result_window: u32) -> bool {
    (page as u64 + 1) * page_size as u64 > result_window as u64
}

/// Drop the records of the last fetched block and return it as the start of
/// the next window. The block may be split across the window boundary, so it
/// is fetched again in full.
fn rewind_window(records: &mut Vec<RawTransfer>, start_block: u64) -> Result<u64, LedgerError> {
    let last = match records.last() {
        Some(r) => parse_field::<u64>("blockNumber", &r.block_number, &r.hash)?,
        None => return Err(LedgerError::WindowStalled { block: start_block }),
    };
    // One block fills the whole window: restarting would loop forever.
    if last <= start_block {
        return Err(LedgerError::WindowStalled { block: last });
    }
    while records
        .last()
        .is_some_and(|r| r.block_number.trim().parse::<u64>().ok() == Some(last))
    {
        records.pop();
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(block: u64) -> serde_json::Value {
        json!({
            "blockNumber": block.to_string(),
            "timeStamp": "1717000000",
            "hash": "0xdeadbeef",
            "nonce": "1",
            "from": "0x0000000000000000000000000000000000000000",
            "contractAddress": "0xC0634090F2Fe6c6d75e61Be2b949464aBB498973",
            "to": "0x1111111111111111111111111111111111111111",
            "value": "100000000000000000000",
            "tokenName": "Sample",
            "tokenSymbol": "SMPL",
            "tokenDecimal": "18",
            "gas": "21000"
        })
    }

    #[test]
    fn test_parse_page_records() {
        let body = json!({
            "status": "1",
            "message": "OK",
            "result": [record(10), record(11)]
        })
        .to_string();

        match parse_page(&body).unwrap() {
            Page::Records(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[1].block_number, "11");
                assert_eq!(records[0].token_symbol.as_deref(), Some("SMPL"));
            }
            Page::Empty | Page::WindowExceeded => panic!("expected records"),
        }
    }

    #[test]
    fn test_parse_page_no_transactions() {
        let body = json!({
            "status": "0",
            "message": "No transactions found",
            "result": []
        })
        .to_string();
        assert!(matches!(parse_page(&body).unwrap(), Page::Empty));
    }

    #[test]
    fn test_parse_page_api_error() {
        let body = json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Invalid API Key"
        })
        .to_string();

        match parse_page(&body) {
            Err(LedgerError::Api { message, detail }) => {
                assert_eq!(message, "NOTOK");
                assert_eq!(detail, "Invalid API Key");
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_page_result_window() {
        let body = json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Result window is too large, PageNo x Offset size must be less than or equal to 10000"
        })
        .to_string();
        assert!(matches!(parse_page(&body).unwrap(), Page::WindowExceeded));
    }

    #[test]
    fn test_window_full_detection() {
        assert!(!is_window_full(1, 1000, 10_000));
        assert!(!is_window_full(9, 1000, 10_000));
        assert!(is_window_full(10, 1000, 10_000));
        assert!(is_window_full(1, 1000, 1000));
    }

    fn raw_blocks(blocks: &[u64]) -> Vec<RawTransfer> {
        let body = json!(blocks.iter().map(|b| record(*b)).collect::<Vec<_>>()).to_string();
        parse_dump(&body).unwrap()
    }

    #[test]
    fn test_rewind_window_refetches_last_block() {
        let mut records = raw_blocks(&[5, 6, 7, 7]);
        assert_eq!(rewind_window(&mut records, 0).unwrap(), 7);
        let blocks: Vec<&str> = records.iter().map(|r| r.block_number.as_str()).collect();
        assert_eq!(blocks, vec!["5", "6"]);

        // Next window starts at 7 and brings the whole block back once.
        records.extend(raw_blocks(&[7, 7, 7, 8]));
        assert_eq!(rewind_window(&mut records, 7).unwrap(), 8);
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_rewind_window_stalls_on_single_block() {
        let mut records = raw_blocks(&[3, 9, 9, 9]);
        assert!(matches!(
            rewind_window(&mut records, 9),
            Err(LedgerError::WindowStalled { block: 9 })
        ));
        assert!(matches!(
            rewind_window(&mut Vec::new(), 0),
            Err(LedgerError::WindowStalled { block: 0 })
        ));
    }

    #[test]
    fn test_parse_dump_accepts_bare_array() {
        let body = json!([record(1), record(2), record(3)]).to_string();
        assert_eq!(parse_dump(&body).unwrap().len(), 3);
    }

    #[test]
    fn test_last_page_detection() {
        assert!(is_last_page(0, 1000));
        assert!(is_last_page(999, 1000));
        assert!(!is_last_page(1000, 1000));
    }
}
