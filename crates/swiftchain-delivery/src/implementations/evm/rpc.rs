//! Ethereum JSON-RPC chain source built on an Alloy provider.
//!
//! Resolves a transaction by hash, then its receipt and the chain head to
//! count confirmations. ERC-20 `transfer` calls to the configured USDT
//! contract are decoded so the snapshot shows the token recipient and amount
//! instead of the contract call.

use crate::{ChainError, ChainFactory, ChainInterface, ChainRegistry};
use alloy_consensus::Transaction as _;
use alloy_primitives::{utils::format_units, Address, TxHash, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::future::IntoFuture;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use swiftchain_types::{
	is_valid_evm_address, truncate_id, ChainTransaction, ConfigSchema, Currency, Field,
	FieldType, ImplementationRegistry, ObservedState, Schema, ValidationError,
};

sol! {
	/// ERC-20 transfer, the only token call SwiftChain sends.
	function transfer(address to, uint256 amount) returns (bool);
}

/// Converts a raw on-chain integer into whole units of `currency`.
fn to_units(raw: U256, currency: Currency) -> Result<Decimal, ChainError> {
	let decimals = u8::try_from(currency.chain_decimals())
		.map_err(|_| ChainError::Decode(format!("Unsupported decimals for {}", currency)))?;
	let formatted = format_units(raw, decimals)
		.map_err(|e| ChainError::Decode(format!("Invalid {} amount {}: {}", currency, raw, e)))?;
	Decimal::from_str(&formatted)
		.map(|d| d.normalize())
		.map_err(|_| ChainError::Decode(format!("{} amount too large: {}", currency, formatted)))
}

/// Works out recipient, amount and currency of a transaction.
fn decode_transfer(
	to: Option<Address>,
	value: U256,
	input: &[u8],
	usdt_contract: Option<Address>,
) -> Result<(String, Decimal, Currency), ChainError> {
	let to = to.unwrap_or_default();

	if usdt_contract == Some(to) {
		let call = transferCall::abi_decode(input, true).map_err(|e| {
			ChainError::Decode(format!("Token contract call is not an ERC-20 transfer: {}", e))
		})?;
		return Ok((
			call.to.to_string(),
			to_units(call.amount, Currency::Usdt)?,
			Currency::Usdt,
		));
	}

	Ok((to.to_string(), to_units(value, Currency::Eth)?, Currency::Eth))
}

/// Chain source reading transactions from an Ethereum JSON-RPC node.
pub struct RpcChain {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
	usdt_contract: Option<Address>,
	timeout: Duration,
}

impl RpcChain {
	/// Creates a source for the node at `rpc_url`.
	///
	/// `usdt_contract` enables token transfer decoding. Every node call is
	/// bounded by `timeout`.
	pub fn new(rpc_url: &str, usdt_contract: Option<&str>, timeout: Duration) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::Configuration(format!("Invalid rpc_url {}: {}", rpc_url, e)))?;
		let usdt_contract = usdt_contract
			.map(|addr| {
				addr.parse::<Address>().map_err(|e| {
					ChainError::Configuration(format!("Invalid usdt_contract {}: {}", addr, e))
				})
			})
			.transpose()?;

		let provider = ProviderBuilder::new().on_http(url);

		Ok(Self {
			provider: Arc::new(provider) as Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
			usdt_contract,
			timeout,
		})
	}

	/// Runs one node call under the configured timeout.
	async fn call<T, E, F>(&self, method: &str, call: F) -> Result<T, ChainError>
	where
		F: IntoFuture<Output = Result<T, E>>,
		E: std::fmt::Display,
	{
		tracing::trace!(method, "JSON-RPC call");
		tokio::time::timeout(self.timeout, call)
			.await
			.map_err(|_| ChainError::Network(format!("{} timed out after {:?}", method, self.timeout)))?
			.map_err(|e| ChainError::Network(format!("{} failed: {}", method, e)))
	}
}

#[async_trait]
impl ChainInterface for RpcChain {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RpcChainSchema)
	}

	async fn get_transaction(&self, hash: &str) -> Result<ChainTransaction, ChainError> {
		let tx_hash: TxHash = hash
			.parse()
			.map_err(|_| ChainError::InvalidHash(hash.to_string()))?;

		let tx = self
			.call(
				"eth_getTransactionByHash",
				self.provider.get_transaction_by_hash(tx_hash),
			)
			.await?
			.ok_or_else(|| ChainError::NotFound(hash.to_string()))?;

		let (to, amount, currency) =
			decode_transfer(tx.to(), tx.value(), tx.input(), self.usdt_contract)?;

		let mut snapshot = ChainTransaction {
			hash: tx_hash.to_string(),
			from: tx.from.to_string(),
			to,
			amount,
			currency,
			state: ObservedState::Pending,
			confirmations: 0,
			block_number: None,
			gas_used: None,
			gas_price: tx.gas_price().map(|p| p.to_string()),
		};

		if tx.block_number.is_none() {
			return Ok(snapshot);
		}

		// Mined but the node may not serve the receipt yet
		let Some(receipt) = self
			.call(
				"eth_getTransactionReceipt",
				self.provider.get_transaction_receipt(tx_hash),
			)
			.await?
		else {
			return Ok(snapshot);
		};

		let head = self
			.call("eth_blockNumber", self.provider.get_block_number())
			.await?;
		let block = receipt.block_number.or(tx.block_number).unwrap_or(head);

		snapshot.block_number = Some(block);
		snapshot.confirmations = head.saturating_sub(block) + 1;
		snapshot.gas_used = Some(receipt.gas_used.to_string());
		snapshot.gas_price = Some(receipt.effective_gas_price.to_string());
		snapshot.state = if receipt.status() {
			ObservedState::Succeeded
		} else {
			ObservedState::Reverted
		};

		tracing::debug!(
			tx_hash = %truncate_id(hash),
			block,
			confirmations = snapshot.confirmations,
			state = ?snapshot.state,
			"Resolved transaction receipt"
		);

		Ok(snapshot)
	}
}

pub struct RpcChainSchema;

impl ConfigSchema for RpcChainSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("rpc_url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("must be an http(s) URL".to_string()),
				}
			})],
			vec![
				Field::new("usdt_contract", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(addr) if is_valid_evm_address(addr) => Ok(()),
						_ => Err("must be a 0x-prefixed 20-byte address".to_string()),
					}
				}),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
			],
		);
		schema.validate(config)
	}
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "rpc";
	type Factory = ChainFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn ChainInterface>, ChainError> {
			RpcChainSchema
				.validate(config)
				.map_err(|e| ChainError::Configuration(e.to_string()))?;

			let rpc_url = config
				.get("rpc_url")
				.and_then(|v| v.as_str())
				.ok_or_else(|| ChainError::Configuration("rpc_url is required".to_string()))?;
			let usdt_contract = config.get("usdt_contract").and_then(|v| v.as_str());
			let timeout = config
				.get("timeout_seconds")
				.and_then(|v| v.as_integer())
				.and_then(|v| u64::try_from(v).ok())
				.unwrap_or(15);

			Ok(Box::new(RpcChain::new(
				rpc_url,
				usdt_contract,
				Duration::from_secs(timeout),
			)?))
		}
	}
}

impl ChainRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{extract::State, routing::post, Json, Router};
	use rust_decimal_macros::dec;
	use serde_json::{json, Value};
	use std::collections::HashMap;

	const USDT: &str = "0x7169D38820dfd117C3FA1f22a697dBA58d90BA06";
	const ALICE: &str = "0x1111111111111111111111111111111111111111";
	const BOB: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

	fn address(s: &str) -> Address {
		s.parse().unwrap()
	}

	fn token_transfer(amount: u64) -> Vec<u8> {
		transferCall {
			to: address(BOB),
			amount: U256::from(amount),
		}
		.abi_encode()
	}

	#[test]
	fn test_decode_native_transfer() {
		let one_eth = U256::from(1_000_000_000_000_000_000u64);
		let (to, amount, currency) =
			decode_transfer(Some(address(BOB)), one_eth, &[], Some(address(USDT))).unwrap();
		assert!(to.eq_ignore_ascii_case(BOB));
		assert_eq!(amount, dec!(1));
		assert_eq!(currency, Currency::Eth);
	}

	#[test]
	fn test_decode_erc20_transfer() {
		let input = token_transfer(118_060_000);
		let (to, amount, currency) =
			decode_transfer(Some(address(USDT)), U256::ZERO, &input, Some(address(USDT))).unwrap();
		assert!(to.eq_ignore_ascii_case(BOB));
		assert_eq!(amount, dec!(118.06));
		assert_eq!(currency, Currency::Usdt);
	}

	#[test]
	fn test_decode_rejects_malformed_token_calls() {
		let usdt = Some(address(USDT));
		// approve(address,uint256) selector only
		let approve = [0x09, 0x5e, 0xa7, 0xb3];
		assert!(matches!(
			decode_transfer(usdt, U256::ZERO, &approve, usdt),
			Err(ChainError::Decode(_))
		));

		let mut truncated = token_transfer(118_060_000);
		truncated.truncate(40);
		assert!(matches!(
			decode_transfer(usdt, U256::ZERO, &truncated, usdt),
			Err(ChainError::Decode(_))
		));

		assert!(matches!(
			decode_transfer(usdt, U256::ZERO, &[], usdt),
			Err(ChainError::Decode(_))
		));
	}

	#[test]
	fn test_to_units_rejects_oversized_amounts() {
		assert_eq!(to_units(U256::from(1_500_000u64), Currency::Usdt).unwrap(), dec!(1.5));
		assert!(matches!(
			to_units(U256::MAX, Currency::Eth),
			Err(ChainError::Decode(_))
		));
	}

	#[test]
	fn test_factory_requires_rpc_url() {
		let config: toml::Value = toml::from_str("timeout_seconds = 5").unwrap();
		assert!((Registry::factory())(&config).is_err());

		let config: toml::Value =
			toml::from_str("rpc_url = \"https://rpc.sepolia.org\"").unwrap();
		assert!((Registry::factory())(&config).is_ok());
	}

	type Results = Arc<HashMap<String, Value>>;

	async fn handle(State(results): State<Results>, Json(request): Json<Value>) -> Json<Value> {
		let method = request["method"].as_str().unwrap_or_default();
		Json(json!({
			"jsonrpc": "2.0",
			"id": request["id"],
			"result": results.get(method).cloned().unwrap_or(Value::Null),
		}))
	}

	/// Serves canned JSON-RPC results by method name and returns the node URL.
	async fn mock_node(results: Vec<(&str, Value)>) -> String {
		let results: Results = Arc::new(
			results
				.into_iter()
				.map(|(method, result)| (method.to_string(), result))
				.collect(),
		);
		let app = Router::new().route("/", post(handle)).with_state(results);
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		format!("http://{}", addr)
	}

	fn hash() -> String {
		format!("0x{}", "ab".repeat(32))
	}

	fn block_hash() -> String {
		format!("0x{}", "cd".repeat(32))
	}

	fn usdt_transaction(mined: bool) -> Value {
		json!({
			"type": "0x2",
			"chainId": "0xaa36a7",
			"nonce": "0x7",
			"gas": "0x186a0",
			"maxFeePerGas": "0x77359400",
			"maxPriorityFeePerGas": "0x3b9aca00",
			"to": USDT,
			"value": "0x0",
			"accessList": [],
			"input": format!("0x{}", hex::encode(token_transfer(118_060_000))),
			"r": "0x1",
			"s": "0x1",
			"yParity": "0x0",
			"v": "0x0",
			"hash": hash(),
			"blockHash": if mined { Value::from(block_hash()) } else { Value::Null },
			"blockNumber": if mined { Value::from("0x64") } else { Value::Null },
			"transactionIndex": if mined { Value::from("0x0") } else { Value::Null },
			"from": ALICE,
		})
	}

	fn receipt(status: &str) -> Value {
		json!({
			"type": "0x2",
			"status": status,
			"cumulativeGasUsed": "0xfde8",
			"logs": [],
			"logsBloom": format!("0x{}", "00".repeat(256)),
			"transactionHash": hash(),
			"transactionIndex": "0x0",
			"blockHash": block_hash(),
			"blockNumber": "0x64",
			"gasUsed": "0xfde8",
			"effectiveGasPrice": "0x4a817c800",
			"from": ALICE,
			"to": USDT,
			"contractAddress": null,
		})
	}

	async fn chain(results: Vec<(&str, Value)>) -> RpcChain {
		let url = mock_node(results).await;
		RpcChain::new(&url, Some(USDT), Duration::from_secs(5)).unwrap()
	}

	#[tokio::test]
	async fn test_successful_receipt_is_reported_as_succeeded() {
		let node = chain(vec![
			("eth_getTransactionByHash", usdt_transaction(true)),
			("eth_getTransactionReceipt", receipt("0x1")),
			("eth_blockNumber", json!("0x6e")),
		])
		.await;

		let tx = node.get_transaction(&hash()).await.unwrap();
		assert_eq!(tx.hash, hash());
		assert_eq!(tx.from, ALICE);
		assert!(tx.to.eq_ignore_ascii_case(BOB));
		assert_eq!(tx.amount, dec!(118.06));
		assert_eq!(tx.currency, Currency::Usdt);
		assert_eq!(tx.state, ObservedState::Succeeded);
		assert_eq!(tx.block_number, Some(100));
		assert_eq!(tx.confirmations, 11);
		assert_eq!(tx.gas_used.as_deref(), Some("65000"));
		assert_eq!(tx.gas_price.as_deref(), Some("20000000000"));
	}

	#[tokio::test]
	async fn test_reverted_receipt() {
		let node = chain(vec![
			("eth_getTransactionByHash", usdt_transaction(true)),
			("eth_getTransactionReceipt", receipt("0x0")),
			("eth_blockNumber", json!("0x64")),
		])
		.await;

		let tx = node.get_transaction(&hash()).await.unwrap();
		assert_eq!(tx.state, ObservedState::Reverted);
		assert_eq!(tx.confirmations, 1);
	}

	#[tokio::test]
	async fn test_unmined_and_unknown_transactions() {
		let pending = chain(vec![("eth_getTransactionByHash", usdt_transaction(false))]).await;
		let tx = pending.get_transaction(&hash()).await.unwrap();
		assert_eq!(tx.state, ObservedState::Pending);
		assert_eq!(tx.confirmations, 0);
		assert_eq!(tx.block_number, None);

		let empty = chain(vec![]).await;
		assert!(matches!(
			empty.get_transaction(&hash()).await,
			Err(ChainError::NotFound(_))
		));
		assert!(matches!(
			empty.get_transaction("0x1234").await,
			Err(ChainError::InvalidHash(_))
		));
	}

	#[tokio::test]
	async fn test_mined_without_receipt_stays_pending() {
		let mined = chain(vec![("eth_getTransactionByHash", usdt_transaction(true))]).await;
		let tx = mined.get_transaction(&hash()).await.unwrap();
		assert_eq!(tx.state, ObservedState::Pending);
		assert_eq!(tx.block_number, None);
	}
}
