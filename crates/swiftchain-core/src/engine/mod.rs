//! Assembled SwiftChain services.
//!
//! The engine owns one instance of every service and is shared by the HTTP
//! handlers and the CLI commands.

use crate::comparison::FeeComparisonEngine;
use crate::conversion::ConversionEngine;
use crate::flow::TransferFlow;
use crate::history::{HistoryError, TransactionHistory};
use crate::monitoring::StatusPoller;
use std::sync::Arc;
use std::time::Duration;
use swiftchain_config::Config;
use swiftchain_delivery::{ChainError, ChainService};
use swiftchain_price::PriceFeedService;
use swiftchain_storage::StorageService;
use swiftchain_types::{truncate_id, TransferRecord};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors of a one-shot transaction lookup.
#[derive(Debug, Error)]
pub enum LookupError {
	#[error(transparent)]
	Chain(#[from] ChainError),
	#[error(transparent)]
	History(#[from] HistoryError),
}

/// Every SwiftChain service, built once from configuration.
///
/// Services sit behind `Arc`, so clones share them.
#[derive(Clone)]
pub struct SwiftChainEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) price: Arc<PriceFeedService>,
	pub(crate) conversion: Arc<ConversionEngine>,
	pub(crate) comparison: Arc<FeeComparisonEngine>,
	pub(crate) chain: ChainService,
	pub(crate) history: Arc<TransactionHistory>,
	pub(crate) poller: Arc<StatusPoller>,
}

impl SwiftChainEngine {
	/// Configuration the engine was built from.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Primary storage backend, also backing history and sessions.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Primary price feed.
	pub fn price(&self) -> &Arc<PriceFeedService> {
		&self.price
	}

	/// INR to crypto conversion with the configured fees.
	pub fn conversion(&self) -> &Arc<ConversionEngine> {
		&self.conversion
	}

	/// Bank versus SwiftChain cost comparison.
	pub fn comparison(&self) -> &Arc<FeeComparisonEngine> {
		&self.comparison
	}

	/// Transaction lookups on the configured chain.
	pub fn chain(&self) -> &ChainService {
		&self.chain
	}

	/// Local transaction history.
	pub fn history(&self) -> &Arc<TransactionHistory> {
		&self.history
	}

	/// Status poller shared by the CLI and API.
	pub fn poller(&self) -> &Arc<StatusPoller> {
		&self.poller
	}

	/// A fresh transfer flow bound to this engine's services.
	pub fn new_flow(&self) -> TransferFlow {
		TransferFlow::new(
			self.conversion.clone(),
			self.history.clone(),
			self.chain.chain_id(),
			self.config.monitoring.confirmation_threshold,
		)
	}

	/// Fetches the current state of a transaction once.
	///
	/// A transfer already in history is updated with the observation and
	/// recorded; unknown hashes produce a record built from the chain alone.
	pub async fn lookup_transaction(&self, hash: &str) -> Result<TransferRecord, LookupError> {
		let tx = self.chain.get_transaction(hash).await?;
		let threshold = self.config.monitoring.confirmation_threshold;

		let known = self
			.history
			.update_by_hash(hash, |record| record.apply_observation(&tx, threshold))
			.await?;

		Ok(known.unwrap_or_else(|| TransferRecord::from_chain(&tx, threshold)))
	}

	/// Periodically drops expired storage entries.
	pub fn spawn_storage_cleanup(&self) -> JoinHandle<()> {
		let storage = self.storage.clone();
		let every = Duration::from_secs(self.config.storage.cleanup_interval_seconds);

		tokio::spawn(async move {
			let mut interval = tokio::time::interval(every);
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		})
	}

	/// Polls `record` until it settles and logs the outcome.
	pub async fn watch(&self, record: TransferRecord) -> crate::monitoring::PollReport {
		let hash = record.hash.clone();
		let report = self.poller.start(record).await.wait().await;
		tracing::info!(
			tx_hash = %truncate_id(&hash),
			outcome = ?report.outcome,
			status = %report.record.status,
			confirmations = report.record.confirmations,
			"Watch finished"
		);
		report
	}
}
