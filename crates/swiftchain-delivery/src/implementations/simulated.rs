//! In-process chain and wallet for demos and tests.
//!
//! [`SimulatedNetwork`] keeps balances and submitted transfers. Every status
//! query mines `blocks_per_query` blocks, so a transfer gathers confirmations
//! at a steady pace while it is being polled. With `report_receipts` set the
//! network answers like a node serving receipts: an included transfer is
//! reported as succeeded or reverted straight away. [`SimulatedWallet`] plays
//! the browser wallet on top of it.

use crate::{
	ChainError, ChainFactory, ChainInterface, ChainRegistry, SentTransaction, TransactionReceipt,
	WalletError, WalletInterface, WalletStatus,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::sync::Arc;
use swiftchain_types::{
	ChainTransaction, ConfigSchema, Currency, Field, FieldType, ImplementationRegistry,
	ObservedState, Schema, ValidationError,
};
use tokio::sync::Mutex;

const DEFAULT_GAS_PRICE_WEI: u64 = 20_000_000_000;

#[derive(Debug, Clone)]
struct SimulatedTransfer {
	from: String,
	to: String,
	amount: Decimal,
	currency: Currency,
	included_in: Option<u64>,
	reverts: bool,
}

#[derive(Debug, Default)]
struct NetworkState {
	head: u64,
	nonce: u64,
	transfers: HashMap<String, SimulatedTransfer>,
	balances: HashMap<(String, Currency), Decimal>,
	revert_next: bool,
}

impl NetworkState {
	/// Mines `blocks` blocks; pending transfers land in the first one.
	fn mine(&mut self, blocks: u64) {
		if blocks == 0 {
			return;
		}
		let next = self.head + 1;
		for transfer in self.transfers.values_mut() {
			if transfer.included_in.is_none() {
				transfer.included_in = Some(next);
			}
		}
		self.head += blocks;
	}
}

/// Simulated chain with balances per (address, currency).
pub struct SimulatedNetwork {
	chain_id: u64,
	blocks_per_query: u64,
	report_receipts: bool,
	state: Mutex<NetworkState>,
}

impl SimulatedNetwork {
	pub fn new(chain_id: u64, blocks_per_query: u64) -> Self {
		Self {
			chain_id,
			blocks_per_query,
			report_receipts: false,
			state: Mutex::new(NetworkState {
				head: 1,
				..Default::default()
			}),
		}
	}

	/// Reports included transfers by receipt status instead of leaving
	/// finality to the confirmation count.
	pub fn with_receipt_status(mut self) -> Self {
		self.report_receipts = true;
		self
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	/// Credits `amount` to `address`.
	pub async fn fund(&self, address: &str, currency: Currency, amount: Decimal) {
		let mut state = self.state.lock().await;
		*state
			.balances
			.entry((address.to_lowercase(), currency))
			.or_default() += amount;
	}

	pub async fn balance(&self, address: &str, currency: Currency) -> Decimal {
		let state = self.state.lock().await;
		state
			.balances
			.get(&(address.to_lowercase(), currency))
			.copied()
			.unwrap_or_default()
	}

	/// The next submitted transfer will revert once included.
	pub async fn revert_next_transfer(&self) {
		self.state.lock().await.revert_next = true;
	}

	/// Mines blocks without a status query.
	pub async fn advance_blocks(&self, blocks: u64) {
		self.state.lock().await.mine(blocks);
	}

	/// Accepts a transfer into the mempool and returns its hash.
	///
	/// Balances move immediately; a reverting transfer is refunded on
	/// submission so only the receipt shows the failure.
	pub async fn submit(
		&self,
		from: &str,
		to: &str,
		amount: Decimal,
		currency: Currency,
	) -> Result<String, WalletError> {
		let mut state = self.state.lock().await;

		let from_key = (from.to_lowercase(), currency);
		let available = state.balances.get(&from_key).copied().unwrap_or_default();
		if available < amount {
			return Err(WalletError::InsufficientBalance {
				currency,
				available,
				required: amount,
			});
		}

		state.nonce += 1;
		let hash = transfer_hash(from, to, amount, currency, state.nonce);
		let reverts = std::mem::take(&mut state.revert_next);

		if !reverts {
			state.balances.insert(from_key, available - amount);
			*state
				.balances
				.entry((to.to_lowercase(), currency))
				.or_default() += amount;
		}

		state.transfers.insert(
			hash.clone(),
			SimulatedTransfer {
				from: from.to_string(),
				to: to.to_string(),
				amount,
				currency,
				included_in: None,
				reverts,
			},
		);

		tracing::debug!(tx_hash = %hash, %currency, %amount, "Simulated transfer submitted");
		Ok(hash)
	}
}

/// Keccak-256 over the transfer fields and a nonce, hex encoded with `0x`.
fn transfer_hash(from: &str, to: &str, amount: Decimal, currency: Currency, nonce: u64) -> String {
	let mut hasher = Keccak256::new();
	hasher.update(from.to_lowercase().as_bytes());
	hasher.update(to.to_lowercase().as_bytes());
	hasher.update(amount.normalize().to_string().as_bytes());
	hasher.update(currency.as_str().as_bytes());
	hasher.update(nonce.to_be_bytes());
	format!("0x{}", hex::encode(hasher.finalize()))
}

#[async_trait]
impl ChainInterface for SimulatedNetwork {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SimulatedNetworkSchema)
	}

	async fn get_transaction(&self, hash: &str) -> Result<ChainTransaction, ChainError> {
		let mut state = self.state.lock().await;
		let key = hash.to_lowercase();
		if !state.transfers.contains_key(&key) {
			return Err(ChainError::NotFound(hash.to_string()));
		}

		state.mine(self.blocks_per_query);
		let head = state.head;
		let transfer = state
			.transfers
			.get(&key)
			.ok_or_else(|| ChainError::NotFound(hash.to_string()))?;

		let (block_number, confirmations, observed) = match transfer.included_in {
			Some(block) => {
				let observed = if transfer.reverts {
					ObservedState::Reverted
				} else if self.report_receipts {
					ObservedState::Succeeded
				} else {
					ObservedState::Included
				};
				(Some(block), head.saturating_sub(block) + 1, observed)
			},
			None => (None, 0, ObservedState::Pending),
		};

		let gas_used = match transfer.currency {
			Currency::Eth => 21_000u64,
			Currency::Usdt => 65_000,
		};

		Ok(ChainTransaction {
			hash: key,
			from: transfer.from.clone(),
			to: transfer.to.clone(),
			amount: transfer.amount,
			currency: transfer.currency,
			state: observed,
			confirmations,
			block_number,
			gas_used: block_number.map(|_| gas_used.to_string()),
			gas_price: Some(DEFAULT_GAS_PRICE_WEI.to_string()),
		})
	}
}

pub struct SimulatedNetworkSchema;

impl ConfigSchema for SimulatedNetworkSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new(
					"blocks_per_query",
					FieldType::Integer {
						min: Some(0),
						max: Some(100),
					},
				),
				Field::new("report_receipts", FieldType::Boolean),
			],
		)
		.validate(config)
	}
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "simulated";
	type Factory = ChainFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn ChainInterface>, ChainError> {
			SimulatedNetworkSchema
				.validate(config)
				.map_err(|e| ChainError::Configuration(e.to_string()))?;

			let read = |key: &str, default: u64| {
				config
					.get(key)
					.and_then(|v| v.as_integer())
					.and_then(|v| u64::try_from(v).ok())
					.unwrap_or(default)
			};

			let mut network =
				SimulatedNetwork::new(read("chain_id", 11_155_111), read("blocks_per_query", 1));
			if config
				.get("report_receipts")
				.and_then(|v| v.as_bool())
				.unwrap_or(false)
			{
				network = network.with_receipt_status();
			}
			Ok(Box::new(network))
		}
	}
}

impl ChainRegistry for Registry {}

#[derive(Debug, Default)]
struct WalletState {
	connected: bool,
	chain_id: u64,
	reject_next: Option<String>,
	wait_for_receipt: bool,
}

/// Wallet holding one account on a [`SimulatedNetwork`].
pub struct SimulatedWallet {
	network: Arc<SimulatedNetwork>,
	account: String,
	state: Mutex<WalletState>,
}

impl SimulatedWallet {
	/// Creates a disconnected wallet whose provider starts on `initial_chain_id`.
	pub fn new(network: Arc<SimulatedNetwork>, account: impl Into<String>, initial_chain_id: u64) -> Self {
		Self {
			network,
			account: account.into(),
			state: Mutex::new(WalletState {
				chain_id: initial_chain_id,
				..Default::default()
			}),
		}
	}

	pub fn account(&self) -> &str {
		&self.account
	}

	/// Sends wait for the transfer to be mined and return its receipt.
	pub async fn wait_for_receipts(&self) {
		self.state.lock().await.wait_for_receipt = true;
	}

	/// The user declines the next signature request with `message`.
	pub async fn reject_next(&self, message: impl Into<String>) {
		self.state.lock().await.reject_next = Some(message.into());
	}
}

#[async_trait]
impl WalletInterface for SimulatedWallet {
	async fn connect(&self) -> Result<String, WalletError> {
		self.state.lock().await.connected = true;
		Ok(self.account.clone())
	}

	async fn switch_network(&self, chain_id: u64) -> Result<(), WalletError> {
		let mut state = self.state.lock().await;
		if !state.connected {
			return Err(WalletError::NotConnected);
		}
		state.chain_id = chain_id;
		Ok(())
	}

	async fn status(&self) -> Result<WalletStatus, WalletError> {
		let state = self.state.lock().await;
		Ok(WalletStatus {
			is_connected: state.connected,
			account: state.connected.then(|| self.account.clone()),
			chain_id: state.connected.then_some(state.chain_id),
			is_correct_network: state.connected && state.chain_id == self.network.chain_id(),
		})
	}

	async fn get_balance(&self, address: &str, currency: Currency) -> Result<Decimal, WalletError> {
		Ok(self.network.balance(address, currency).await)
	}

	async fn send_transaction(
		&self,
		to: &str,
		amount: Decimal,
		currency: Currency,
	) -> Result<SentTransaction, WalletError> {
		let wait_for_receipt = {
			let mut state = self.state.lock().await;
			if !state.connected {
				return Err(WalletError::NotConnected);
			}
			if state.chain_id != self.network.chain_id() {
				return Err(WalletError::WrongNetwork {
					expected: self.network.chain_id(),
					actual: state.chain_id,
				});
			}
			if let Some(message) = state.reject_next.take() {
				return Err(WalletError::Rejected(message));
			}
			state.wait_for_receipt
		};

		let hash = self.network.submit(&self.account, to, amount, currency).await?;
		if !wait_for_receipt {
			return Ok(SentTransaction {
				hash,
				receipt: None,
			});
		}

		let mined = self
			.network
			.get_transaction(&hash)
			.await
			.map_err(|e| WalletError::Provider(e.to_string()))?;
		let receipt = match (mined.block_number, mined.gas_used, mined.gas_price) {
			(Some(block_number), Some(gas_used), Some(gas_price)) => Some(TransactionReceipt {
				block_number,
				gas_used,
				gas_price,
				confirmations: mined.confirmations,
				success: mined.state != ObservedState::Reverted,
			}),
			_ => None,
		};
		Ok(SentTransaction { hash, receipt })
	}
}
