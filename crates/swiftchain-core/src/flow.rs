//! Step-by-step transfer orchestration.
//!
//! A transfer goes through four steps: entry, review, confirmation and status.
//! Everything a step produces lives in [`TransferContext`], which is threaded
//! through the flow and can be saved as a session so a client can resume it.
//! Going back to a step drops whatever the later steps produced, so a
//! resubmitted amount can never be sent with stale fee numbers.

use crate::conversion::{ConversionEngine, ConversionError};
use crate::history::{HistoryError, TransactionHistory};
use crate::monitoring::{PollHandle, StatusPoller};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swiftchain_delivery::{WalletError, WalletInterface};
use swiftchain_storage::{StorageError, StorageService};
use swiftchain_types::{
	is_valid_evm_address, truncate_id, ChainTransaction, ConversionResult, Currency,
	ObservedState, StorageKey, TransferRecord,
};
use thiserror::Error;

/// Errors surfaced to the user during a transfer.
#[derive(Debug, Error)]
pub enum FlowError {
	#[error("Invalid amount: {0}")]
	InvalidAmount(String),
	#[error("Invalid recipient address: {0}")]
	InvalidAddress(String),
	#[error("Exchange rate unavailable: {0}")]
	RateUnavailable(String),
	#[error("Unsupported currency: {0}")]
	UnsupportedCurrency(String),
	#[error("Insufficient {currency} balance. You have {available}, need {required}")]
	InsufficientBalance {
		currency: Currency,
		available: Decimal,
		required: Decimal,
	},
	#[error("Please connect your wallet first")]
	WalletNotConnected,
	#[error("Please switch to the correct network (chain {expected}, connected to {actual})")]
	WrongNetwork { expected: u64, actual: u64 },
	/// Decline reported by the wallet, message passed through verbatim.
	#[error("{0}")]
	TransactionRejected(String),
	#[error("Missing transfer data: {0}")]
	MissingContext(&'static str),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<ConversionError> for FlowError {
	fn from(err: ConversionError) -> Self {
		match err {
			ConversionError::InvalidAmount { .. } => FlowError::InvalidAmount(err.to_string()),
			ConversionError::RateUnavailable(msg) => FlowError::RateUnavailable(msg),
			ConversionError::UnsupportedCurrency(e) => FlowError::UnsupportedCurrency(e.0),
		}
	}
}

impl From<WalletError> for FlowError {
	fn from(err: WalletError) -> Self {
		match err {
			WalletError::NotConnected => FlowError::WalletNotConnected,
			WalletError::WrongNetwork { expected, actual } => {
				FlowError::WrongNetwork { expected, actual }
			},
			WalletError::InsufficientBalance {
				currency,
				available,
				required,
			} => FlowError::InsufficientBalance {
				currency,
				available,
				required,
			},
			WalletError::Rejected(msg) | WalletError::Provider(msg) => {
				FlowError::TransactionRejected(msg)
			},
		}
	}
}

impl From<StorageError> for FlowError {
	fn from(err: StorageError) -> Self {
		FlowError::Storage(err.to_string())
	}
}

impl From<HistoryError> for FlowError {
	fn from(err: HistoryError) -> Self {
		FlowError::Storage(err.to_string())
	}
}

/// Steps of a transfer, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
	Entry,
	Review,
	Confirm,
	Status,
}

/// State produced by the steps completed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferContext {
	pub amount: Option<Decimal>,
	pub receiver: Option<String>,
	pub currency: Option<Currency>,
	pub conversion: Option<ConversionResult>,
	pub reviewed: bool,
	pub record: Option<TransferRecord>,
}

impl TransferContext {
	/// The step the user is on.
	pub fn step(&self) -> FlowStep {
		if self.record.is_some() {
			FlowStep::Status
		} else if self.reviewed {
			FlowStep::Confirm
		} else if self.conversion.is_some() {
			FlowStep::Review
		} else {
			FlowStep::Entry
		}
	}
}

/// What the user confirms before sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
	pub receiver: String,
	pub conversion: ConversionResult,
}

/// One user's transfer, driven step by step from entry to status tracking.
///
/// Each step checks that the context holds what the previous steps produced.
/// A gap resets the flow to the entry step with [`FlowError::MissingContext`].
pub struct TransferFlow {
	conversion: Arc<ConversionEngine>,
	history: Arc<TransactionHistory>,
	chain_id: u64,
	confirmation_threshold: u64,
	context: TransferContext,
}

impl TransferFlow {
	/// Starts an empty flow.
	///
	/// Transfers go out on `chain_id`. A wallet receipt that comes back with
	/// the send is applied against `confirmation_threshold`.
	pub fn new(
		conversion: Arc<ConversionEngine>,
		history: Arc<TransactionHistory>,
		chain_id: u64,
		confirmation_threshold: u64,
	) -> Self {
		Self {
			conversion,
			history,
			chain_id,
			confirmation_threshold,
			context: TransferContext::default(),
		}
	}

	/// Everything collected so far. Serializable for session storage.
	pub fn context(&self) -> &TransferContext {
		&self.context
	}

	pub fn step(&self) -> FlowStep {
		self.context.step()
	}

	fn missing(&mut self, what: &'static str) -> FlowError {
		self.context = TransferContext::default();
		FlowError::MissingContext(what)
	}

	/// Step 1: validates the form and computes a fresh conversion.
	///
	/// Anything produced by earlier submissions is discarded first, even when
	/// validation fails.
	pub async fn submit_entry(
		&mut self,
		amount: Decimal,
		receiver: &str,
		currency: Currency,
	) -> Result<&ConversionResult, FlowError> {
		self.context = TransferContext {
			amount: Some(amount),
			receiver: Some(receiver.trim().to_string()),
			currency: Some(currency),
			..Default::default()
		};

		let min = self.conversion.fees().min_amount;
		if amount < min {
			return Err(FlowError::InvalidAmount(format!(
				"Amount must be at least {} INR",
				min
			)));
		}
		if !is_valid_evm_address(receiver.trim()) {
			return Err(FlowError::InvalidAddress(receiver.to_string()));
		}

		let result = self.conversion.convert(amount, currency).await?;
		Ok(self.context.conversion.insert(result))
	}

	/// Step 2: returns the summary to confirm.
	pub fn review(&mut self) -> Result<ReviewSummary, FlowError> {
		let (Some(receiver), Some(conversion)) =
			(self.context.receiver.clone(), self.context.conversion.clone())
		else {
			return Err(self.missing("no conversion to review"));
		};

		self.context.reviewed = true;
		Ok(ReviewSummary {
			receiver,
			conversion,
		})
	}

	/// Step 3: checks the wallet and sends the converted amount.
	///
	/// On failure the flow stays on the confirmation step so the user can fix
	/// the wallet and retry. On success a pending record is written to history.
	pub async fn confirm_and_send(
		&mut self,
		wallet: &dyn WalletInterface,
	) -> Result<&TransferRecord, FlowError> {
		// Already sent; never send twice
		if self.context.record.is_some() {
			return self
				.context
				.record
				.as_ref()
				.ok_or(FlowError::MissingContext("no transaction"));
		}
		if !self.context.reviewed {
			return Err(self.missing("transfer has not been reviewed"));
		}
		let (Some(receiver), Some(conversion)) =
			(self.context.receiver.clone(), self.context.conversion.clone())
		else {
			return Err(self.missing("no conversion to confirm"));
		};

		let amount = conversion.converted_amount;
		let currency = conversion.currency;
		if amount <= Decimal::ZERO {
			return Err(FlowError::InvalidAmount(
				"Amount does not cover the fees".to_string(),
			));
		}

		let status = wallet.status().await?;
		let Some(account) = status.account.filter(|_| status.is_connected) else {
			return Err(FlowError::WalletNotConnected);
		};
		match status.chain_id {
			Some(chain_id) if chain_id == self.chain_id => {},
			other => {
				return Err(FlowError::WrongNetwork {
					expected: self.chain_id,
					actual: other.unwrap_or_default(),
				})
			},
		}

		let available = wallet.get_balance(&account, currency).await?;
		if available < amount {
			return Err(FlowError::InsufficientBalance {
				currency,
				available,
				required: amount,
			});
		}

		let sent = wallet.send_transaction(&receiver, amount, currency).await?;
		tracing::info!(tx_hash = %truncate_id(&sent.hash), %amount, %currency, "Transfer sent");

		let mut record = TransferRecord::pending(&sent.hash, &account, &receiver, amount, currency);
		if let Some(receipt) = &sent.receipt {
			let observation = ChainTransaction {
				hash: sent.hash.clone(),
				from: account.clone(),
				to: receiver.clone(),
				amount,
				currency,
				state: if receipt.success {
					ObservedState::Succeeded
				} else {
					ObservedState::Reverted
				},
				confirmations: receipt.confirmations,
				block_number: Some(receipt.block_number),
				gas_used: Some(receipt.gas_used.clone()),
				gas_price: Some(receipt.gas_price.clone()),
			};
			record.apply_observation(&observation, self.confirmation_threshold);
		}

		self.history.record(&record).await?;
		Ok(self.context.record.insert(record))
	}

	/// Step 4: starts polling the sent transfer.
	pub async fn track(&mut self, poller: &StatusPoller) -> Result<PollHandle, FlowError> {
		match self.context.record.clone() {
			Some(record) => Ok(poller.start(record).await),
			None => Err(self.missing("no transaction to track")),
		}
	}

	/// Returns to `step`, dropping what later steps produced.
	///
	/// Form values entered in step 1 are kept so the form can be prefilled.
	pub fn back_to(&mut self, step: FlowStep) {
		if step < FlowStep::Status {
			self.context.record = None;
		}
		if step < FlowStep::Confirm {
			self.context.reviewed = false;
		}
		if step < FlowStep::Review {
			self.context.conversion = None;
		}
	}

	/// Clears the whole flow.
	pub fn reset(&mut self) {
		self.context = TransferContext::default();
	}

	/// Saves the context as session `session_id`.
	pub async fn persist(&self, storage: &StorageService, session_id: &str) -> Result<(), FlowError> {
		storage
			.store(StorageKey::Sessions, session_id, &self.context)
			.await?;
		Ok(())
	}

	/// Loads session `session_id`. Returns `false` and leaves the flow
	/// untouched when the session does not exist or has expired.
	pub async fn restore(&mut self, storage: &StorageService, session_id: &str) -> Result<bool, FlowError> {
		match storage
			.retrieve_optional::<TransferContext>(StorageKey::Sessions, session_id)
			.await?
		{
			Some(context) => {
				self.context = context;
				Ok(true)
			},
			None => Ok(false),
		}
	}

	/// Removes session `session_id`.
	pub async fn discard_session(storage: &StorageService, session_id: &str) -> Result<(), FlowError> {
		match storage.remove(StorageKey::Sessions, session_id).await {
			Ok(()) | Err(StorageError::NotFound) => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::conversion::tests::engine;
	use crate::history::tests::history;
	use crate::monitoring::{PollOutcome, PollerConfig};
	use rust_decimal_macros::dec;
	use swiftchain_delivery::implementations::simulated::{SimulatedNetwork, SimulatedWallet};
	use swiftchain_delivery::ChainService;
	use swiftchain_storage::implementations::memory::MemoryStorage;
	use swiftchain_types::TransferStatus;

	const SEPOLIA: u64 = 11_155_111;
	const ALICE: &str = "0x1111111111111111111111111111111111111111";
	const BOB: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

	struct Fixture {
		flow: TransferFlow,
		network: Arc<SimulatedNetwork>,
		wallet: SimulatedWallet,
		history: Arc<TransactionHistory>,
	}

	async fn fixture() -> Fixture {
		let network = Arc::new(SimulatedNetwork::new(SEPOLIA, 1));
		network.fund(ALICE, Currency::Usdt, dec!(500)).await;
		let wallet = SimulatedWallet::new(network.clone(), ALICE, SEPOLIA);
		let history = Arc::new(history());
		let flow = TransferFlow::new(Arc::new(engine()), history.clone(), SEPOLIA, 12);
		Fixture {
			flow,
			network,
			wallet,
			history,
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_happy_path_to_confirmation() {
		let Fixture {
			mut flow,
			network,
			wallet,
			history,
		} = fixture().await;
		wallet.connect().await.unwrap();

		let converted = flow
			.submit_entry(dec!(10000), BOB, Currency::Usdt)
			.await
			.unwrap()
			.converted_amount;
		assert_eq!(converted, dec!(118.06));
		assert_eq!(flow.step(), FlowStep::Review);

		let summary = flow.review().unwrap();
		assert_eq!(summary.receiver, BOB);
		assert_eq!(flow.step(), FlowStep::Confirm);

		let record = flow.confirm_and_send(&wallet).await.unwrap().clone();
		assert_eq!(record.status, TransferStatus::Pending);
		assert_eq!(record.amount, dec!(118.06));
		assert_eq!(record.from, ALICE);
		assert_eq!(flow.step(), FlowStep::Status);
		assert!(history.get(&record.id).await.unwrap().is_some());

		let poller = StatusPoller::new(
			ChainService::new(network.clone(), SEPOLIA),
			history.clone(),
			PollerConfig::default(),
		);
		let report = flow.track(&poller).await.unwrap().wait().await;
		assert_eq!(report.outcome, PollOutcome::Confirmed);
		assert_eq!(
			history.get(&record.id).await.unwrap().unwrap().status,
			TransferStatus::Confirmed
		);
		assert_eq!(network.balance(BOB, Currency::Usdt).await, dec!(118.06));
	}

	#[tokio::test]
	async fn test_successful_wallet_receipt_confirms_on_send() {
		let Fixture {
			mut flow,
			wallet,
			history,
			..
		} = fixture().await;
		wallet.connect().await.unwrap();
		wallet.wait_for_receipts().await;

		flow.submit_entry(dec!(10000), BOB, Currency::Usdt).await.unwrap();
		flow.review().unwrap();
		let record = flow.confirm_and_send(&wallet).await.unwrap().clone();

		assert_eq!(record.status, TransferStatus::Confirmed);
		assert_eq!(record.confirmations, 1);
		assert_eq!(record.gas_used.as_deref(), Some("65000"));
		assert_eq!(
			history.get(&record.id).await.unwrap().unwrap().status,
			TransferStatus::Confirmed
		);
	}

	#[tokio::test]
	async fn test_back_navigation_discards_stale_conversion() {
		let Fixture { mut flow, .. } = fixture().await;

		flow.submit_entry(dec!(10000), BOB, Currency::Usdt).await.unwrap();
		flow.review().unwrap();
		assert_eq!(flow.step(), FlowStep::Confirm);

		flow.back_to(FlowStep::Entry);
		assert_eq!(flow.step(), FlowStep::Entry);
		assert!(flow.context().conversion.is_none());
		assert_eq!(flow.context().amount, Some(dec!(10000)));

		let result = flow
			.submit_entry(dec!(5000), BOB, Currency::Usdt)
			.await
			.unwrap()
			.clone();
		assert_eq!(result.original_amount, dec!(5000));
		assert_eq!(result.fees.swift_chain_fee, dec!(50.00));
		assert_eq!(result.fees.total_fee, dec!(91.75));
		assert!(!flow.context().reviewed);
	}

	#[tokio::test]
	async fn test_resubmitting_entry_drops_forward_state() {
		let Fixture { mut flow, .. } = fixture().await;

		flow.submit_entry(dec!(10000), BOB, Currency::Usdt).await.unwrap();
		flow.review().unwrap();

		// Invalid resubmission still wipes the old conversion
		assert!(matches!(
			flow.submit_entry(dec!(0.009999), BOB, Currency::Usdt).await,
			Err(FlowError::InvalidAmount(_))
		));
		assert_eq!(flow.step(), FlowStep::Entry);
		assert!(flow.context().conversion.is_none());
	}

	#[tokio::test]
	async fn test_entry_validation() {
		let Fixture { mut flow, .. } = fixture().await;

		assert!(matches!(
			flow.submit_entry(dec!(100), "0x123", Currency::Usdt).await,
			Err(FlowError::InvalidAddress(_))
		));
		assert!(matches!(
			flow.submit_entry(dec!(0), BOB, Currency::Eth).await,
			Err(FlowError::InvalidAmount(_))
		));
		assert!(flow.submit_entry(dec!(0.01), BOB, Currency::Eth).await.is_ok());
	}

	#[tokio::test]
	async fn test_missing_context_resets_flow() {
		let Fixture {
			mut flow, wallet, ..
		} = fixture().await;

		assert!(matches!(flow.review(), Err(FlowError::MissingContext(_))));

		flow.submit_entry(dec!(10000), BOB, Currency::Usdt).await.unwrap();
		// Skipping review is not allowed
		assert!(matches!(
			flow.confirm_and_send(&wallet).await,
			Err(FlowError::MissingContext(_))
		));
		assert_eq!(flow.context(), &TransferContext::default());
	}

	#[tokio::test]
	async fn test_wallet_checks_keep_confirmation_step() {
		let Fixture {
			mut flow,
			network,
			..
		} = fixture().await;
		let wallet = SimulatedWallet::new(network.clone(), ALICE, 1);

		flow.submit_entry(dec!(10000), BOB, Currency::Usdt).await.unwrap();
		flow.review().unwrap();

		assert!(matches!(
			flow.confirm_and_send(&wallet).await,
			Err(FlowError::WalletNotConnected)
		));
		assert_eq!(flow.step(), FlowStep::Confirm);

		wallet.connect().await.unwrap();
		assert!(matches!(
			flow.confirm_and_send(&wallet).await,
			Err(FlowError::WrongNetwork {
				expected: SEPOLIA,
				actual: 1
			})
		));

		wallet.switch_network(SEPOLIA).await.unwrap();
		wallet
			.reject_next("MetaMask Tx Signature: User denied transaction signature.")
			.await;
		match flow.confirm_and_send(&wallet).await {
			Err(err @ FlowError::TransactionRejected(_)) => assert_eq!(
				err.to_string(),
				"MetaMask Tx Signature: User denied transaction signature."
			),
			other => panic!("expected rejection, got {other:?}"),
		}
		assert_eq!(flow.step(), FlowStep::Confirm);
		assert!(flow.confirm_and_send(&wallet).await.is_ok());
	}

	#[tokio::test]
	async fn test_insufficient_balance() {
		let Fixture {
			mut flow, wallet, ..
		} = fixture().await;
		wallet.connect().await.unwrap();

		flow.submit_entry(dec!(100000), BOB, Currency::Usdt).await.unwrap();
		flow.review().unwrap();

		match flow.confirm_and_send(&wallet).await {
			Err(FlowError::InsufficientBalance {
				currency,
				available,
				required,
			}) => {
				assert_eq!(currency, Currency::Usdt);
				assert_eq!(available, dec!(500));
				assert_eq!(required, dec!(1185.13));
			},
			other => panic!("expected insufficient balance, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_session_round_trip() {
		let Fixture { mut flow, .. } = fixture().await;
		let storage = StorageService::new(Box::new(MemoryStorage::new()));

		flow.submit_entry(dec!(10000), BOB, Currency::Usdt).await.unwrap();
		flow.review().unwrap();
		flow.persist(&storage, "session-1").await.unwrap();

		let saved = flow.context().clone();
		flow.reset();
		assert!(!flow.restore(&storage, "missing").await.unwrap());
		assert_eq!(flow.step(), FlowStep::Entry);

		assert!(flow.restore(&storage, "session-1").await.unwrap());
		assert_eq!(flow.context(), &saved);
		assert_eq!(flow.step(), FlowStep::Confirm);

		TransferFlow::discard_session(&storage, "session-1").await.unwrap();
		assert!(!flow.restore(&storage, "session-1").await.unwrap());
	}
}
