//! Chain observation types for the SwiftChain system.
//!
//! This module defines what a chain adapter reports about a submitted
//! transaction. The status poller turns these observations into transfer
//! status transitions.

use crate::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the chain currently says about a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedState {
	/// Known to the network but not yet in a block.
	Pending,
	/// Included in a block without a receipt status. Settles once enough
	/// confirmations pile up.
	Included,
	/// Mined with a successful receipt.
	Succeeded,
	/// Included in a block but execution reverted.
	Reverted,
}

/// Snapshot of a transaction as seen on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
	/// Transaction hash with 0x prefix.
	pub hash: String,
	/// Sender address.
	pub from: String,
	/// Recipient of the value. For token transfers this is the token recipient,
	/// not the token contract.
	pub to: String,
	/// Transferred amount in whole units of `currency`.
	pub amount: Decimal,
	/// Asset that was transferred.
	pub currency: Currency,
	/// Observed state.
	pub state: ObservedState,
	/// Number of blocks on top of (and including) the inclusion block.
	pub confirmations: u64,
	/// Inclusion block, if mined.
	pub block_number: Option<u64>,
	/// Gas used as a decimal string, if mined.
	pub gas_used: Option<String>,
	/// Gas price in wei as a decimal string.
	pub gas_price: Option<String>,
}
