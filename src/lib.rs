//! Early-holder analysis for ERC-20 tokens.
//!
//! Finds wallets that were among a token's first buyers and were still
//! holding when its synthetic, flow-derived price reached 10x their entry.
//! Shared by the `tenx-scan` runner and the offline `replay` binary.

pub mod buyers;
pub mod config;
pub mod holders;
pub mod ledger;
pub mod pipeline;
pub mod price;
pub mod report;
