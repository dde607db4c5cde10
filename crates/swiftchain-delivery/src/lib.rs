//! Wallet bridge and chain status module for the SwiftChain system.
//!
//! Two seams live here:
//! - [`WalletInterface`], the capabilities SwiftChain needs from a user's
//!   wallet (connect, switch network, read balances, send a transfer);
//! - [`ChainInterface`], read-only transaction lookups used by the status
//!   poller and the transaction endpoint.
//!
//! The JSON-RPC implementation talks to a real node; the simulated one keeps
//! an in-process chain so demos and tests run without a network.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swiftchain_types::{
	truncate_id, without_0x_prefix, ChainTransaction, ConfigSchema, Currency,
	ImplementationRegistry,
};
use thiserror::Error;

pub mod implementations {
	pub mod evm {
		pub mod rpc;
	}
	pub mod simulated;
}

/// Errors reported by a wallet.
#[derive(Debug, Error)]
pub enum WalletError {
	#[error("Wallet is not connected")]
	NotConnected,
	#[error("Wallet is on chain {actual}, expected {expected}")]
	WrongNetwork { expected: u64, actual: u64 },
	/// The user or provider declined. The message is the provider's own text.
	#[error("{0}")]
	Rejected(String),
	#[error("Insufficient {currency} balance: have {available}, need {required}")]
	InsufficientBalance {
		currency: Currency,
		available: Decimal,
		required: Decimal,
	},
	#[error("Wallet provider error: {0}")]
	Provider(String),
}

/// Errors reported by a chain status source.
#[derive(Debug, Error)]
pub enum ChainError {
	#[error("Transaction not found: {0}")]
	NotFound(String),
	#[error("Invalid transaction hash: {0}")]
	InvalidHash(String),
	#[error("Network error: {0}")]
	Network(String),
	#[error("RPC error {code}: {message}")]
	Rpc { code: i64, message: String },
	#[error("Decode error: {0}")]
	Decode(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Connection state reported by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatus {
	pub is_connected: bool,
	pub account: Option<String>,
	pub chain_id: Option<u64>,
	/// Whether `chain_id` is the chain SwiftChain transfers on.
	pub is_correct_network: bool,
}

/// Receipt returned together with a sent transaction, when the wallet waited
/// for inclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub block_number: u64,
	pub gas_used: String,
	pub gas_price: String,
	pub confirmations: u64,
	pub success: bool,
}

/// Result of [`WalletInterface::send_transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentTransaction {
	pub hash: String,
	pub receipt: Option<TransactionReceipt>,
}

/// Capabilities of the user's wallet.
#[async_trait]
pub trait WalletInterface: Send + Sync {
	/// Requests account access and returns the selected account.
	async fn connect(&self) -> Result<String, WalletError>;

	async fn switch_network(&self, chain_id: u64) -> Result<(), WalletError>;

	async fn status(&self) -> Result<WalletStatus, WalletError>;

	/// Balance of `address` in whole units of `currency`.
	async fn get_balance(&self, address: &str, currency: Currency) -> Result<Decimal, WalletError>;

	/// Sends `amount` of `currency` to `to` from the connected account.
	async fn send_transaction(
		&self,
		to: &str,
		amount: Decimal,
		currency: Currency,
	) -> Result<SentTransaction, WalletError>;
}

/// Read-only view of transactions on chain.
#[async_trait]
pub trait ChainInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Current snapshot of a transaction. Unknown hashes are `NotFound`.
	async fn get_transaction(&self, hash: &str) -> Result<ChainTransaction, ChainError>;
}

/// Builds a chain source from its `chain.implementations.<name>` table.
pub type ChainFactory = fn(&toml::Value) -> Result<Box<dyn ChainInterface>, ChainError>;

pub trait ChainRegistry: ImplementationRegistry<Factory = ChainFactory> {}

/// All chain implementations by configuration name.
pub fn get_all_implementations() -> Vec<(&'static str, ChainFactory)> {
	use implementations::{evm::rpc, simulated};

	vec![
		(rpc::Registry::NAME, rpc::Registry::factory()),
		(simulated::Registry::NAME, simulated::Registry::factory()),
	]
}

/// Checks the `0x` + 64 hex digits shape of a transaction hash.
pub fn is_valid_tx_hash(hash: &str) -> bool {
	let digits = without_0x_prefix(hash);
	hash.len() == digits.len() + 2
		&& digits.len() == 64
		&& digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Front door to the configured chain source.
#[derive(Clone)]
pub struct ChainService {
	chain: Arc<dyn ChainInterface>,
	chain_id: u64,
}

impl ChainService {
	pub fn new(chain: Arc<dyn ChainInterface>, chain_id: u64) -> Self {
		Self { chain, chain_id }
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	/// Looks up a transaction after checking the hash shape.
	pub async fn get_transaction(&self, hash: &str) -> Result<ChainTransaction, ChainError> {
		if !is_valid_tx_hash(hash) {
			return Err(ChainError::InvalidHash(hash.to_string()));
		}
		let tx = self.chain.get_transaction(hash).await?;
		tracing::trace!(
			tx_hash = %truncate_id(hash),
			state = ?tx.state,
			confirmations = tx.confirmations,
			"Fetched transaction"
		);
		Ok(tx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tx_hash_shape() {
		let good = format!("0x{}", "ab".repeat(32));
		assert!(is_valid_tx_hash(&good));
		assert!(!is_valid_tx_hash(&"ab".repeat(32)));
		assert!(!is_valid_tx_hash("0x1234"));
		assert!(!is_valid_tx_hash(&format!("0x{}", "zz".repeat(32))));
	}

	#[test]
	fn test_rejection_message_is_verbatim() {
		let err = WalletError::Rejected("User denied transaction signature.".into());
		assert_eq!(err.to_string(), "User denied transaction signature.");
	}

	#[test]
	fn test_registered_implementations() {
		let names: Vec<_> = get_all_implementations().into_iter().map(|(n, _)| n).collect();
		assert_eq!(names, vec!["rpc", "simulated"]);
	}
}
