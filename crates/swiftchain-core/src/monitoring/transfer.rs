//! Transfer status polling.
//!
//! Queries the chain at a fixed cadence until the transfer is confirmed or
//! failed, writing every observed change to the history store.

use crate::history::TransactionHistory;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swiftchain_config::MonitoringConfig;
use swiftchain_delivery::ChainService;
use swiftchain_types::{truncate_id, TransferRecord, TransferStatus};
use tokio::sync::{watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::instrument;

/// Cadence and limits of a poll.
#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
	pub interval: Duration,
	/// Polling gives up after this long and leaves the transfer pending.
	pub timeout: Duration,
	pub confirmation_threshold: u64,
}

impl Default for PollerConfig {
	fn default() -> Self {
		Self::from(&MonitoringConfig::default())
	}
}

impl From<&MonitoringConfig> for PollerConfig {
	fn from(config: &MonitoringConfig) -> Self {
		Self {
			interval: Duration::from_secs(config.poll_interval_seconds),
			timeout: Duration::from_secs(config.timeout_seconds),
			confirmation_threshold: config.confirmation_threshold,
		}
	}
}

/// How a poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
	Confirmed,
	Failed,
	/// The time budget ran out; the transfer is still pending.
	TimedOut,
	/// Cancelled through the handle or superseded by a newer poll.
	Cancelled,
}

/// Final state of a finished poll.
#[derive(Debug, Clone)]
pub struct PollReport {
	pub outcome: PollOutcome,
	pub record: TransferRecord,
}

struct ActivePoll {
	generation: u64,
	task: AbortHandle,
}

type Registry = Arc<Mutex<HashMap<String, ActivePoll>>>;

/// Starts and tracks status polls. At most one poll runs per hash.
pub struct StatusPoller {
	chain: ChainService,
	history: Arc<TransactionHistory>,
	config: PollerConfig,
	active: Registry,
	next_generation: AtomicU64,
}

impl StatusPoller {
	/// Creates a poller that reads from `chain` and writes every status change
	/// to `history`.
	pub fn new(chain: ChainService, history: Arc<TransactionHistory>, config: PollerConfig) -> Self {
		Self {
			chain,
			history,
			config,
			active: Arc::new(Mutex::new(HashMap::new())),
			next_generation: AtomicU64::new(1),
		}
	}

	/// Interval, time budget and threshold shared by every poll.
	pub fn config(&self) -> &PollerConfig {
		&self.config
	}

	/// Starts polling `record`, replacing any poll already running for its hash.
	///
	/// Terminal records are not polled; the returned handle finishes at once.
	pub async fn start(&self, record: TransferRecord) -> PollHandle {
		let hash = record.hash.clone();
		let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
		let (updates_tx, updates_rx) = watch::channel(record.clone());

		let mut active = self.active.lock().await;

		let chain = self.chain.clone();
		let history = self.history.clone();
		let config = self.config;
		let registry = self.active.clone();
		let task_hash = hash.clone();

		// The spawned task cannot deregister before the entry below is inserted
		// because it needs the registry lock we are holding.
		let task = tokio::spawn(async move {
			let outcome = poll_transfer(chain, history, config, record, updates_tx).await;

			let mut active = registry.lock().await;
			if active
				.get(&task_hash)
				.is_some_and(|poll| poll.generation == generation)
			{
				active.remove(&task_hash);
			}
			outcome
		});

		if let Some(previous) = active.insert(
			hash.clone(),
			ActivePoll {
				generation,
				task: task.abort_handle(),
			},
		) {
			previous.task.abort();
			tracing::debug!(tx_hash = %truncate_id(&hash), "Superseded running poll");
		}
		drop(active);

		PollHandle {
			hash,
			generation,
			updates: updates_rx,
			task,
			registry: self.active.clone(),
		}
	}

	/// Cancels the poll of `hash`, if one is running.
	pub async fn stop(&self, hash: &str) -> bool {
		match self.active.lock().await.remove(hash) {
			Some(poll) => {
				poll.task.abort();
				true
			},
			None => false,
		}
	}

	/// Whether a poll for `hash` is still registered.
	pub async fn is_polling(&self, hash: &str) -> bool {
		self.active.lock().await.contains_key(hash)
	}

	/// Number of polls currently running. Finished and cancelled polls are
	/// not counted.
	pub async fn active_count(&self) -> usize {
		self.active.lock().await.len()
	}
}

#[instrument(skip_all, fields(tx_hash = %truncate_id(&record.hash)))]
async fn poll_transfer(
	chain: ChainService,
	history: Arc<TransactionHistory>,
	config: PollerConfig,
	mut record: TransferRecord,
	updates: watch::Sender<TransferRecord>,
) -> PollOutcome {
	if let Some(outcome) = terminal_outcome(record.status) {
		return outcome;
	}

	let deadline = Instant::now() + config.timeout;

	loop {
		if Instant::now() >= deadline {
			tracing::warn!(
				confirmations = record.confirmations,
				"Status polling timed out after {}s, transfer still pending",
				config.timeout.as_secs()
			);
			return PollOutcome::TimedOut;
		}

		match tokio::time::timeout_at(deadline, chain.get_transaction(&record.hash)).await {
			Ok(Ok(tx)) => {
				if record.apply_observation(&tx, config.confirmation_threshold) {
					if let Err(e) = history.record(&record).await {
						tracing::warn!(error = %e, "Failed to record transfer update");
					}
					updates.send_replace(record.clone());

					if let Some(outcome) = terminal_outcome(record.status) {
						tracing::info!(
							status = %record.status,
							confirmations = record.confirmations,
							"Transfer settled"
						);
						return outcome;
					}
				}
			},
			Ok(Err(e)) => {
				tracing::debug!(error = %e, "Status query failed, retrying");
			},
			Err(_) => continue,
		}

		tokio::time::sleep(config.interval).await;
	}
}

fn terminal_outcome(status: TransferStatus) -> Option<PollOutcome> {
	match status {
		TransferStatus::Confirmed => Some(PollOutcome::Confirmed),
		TransferStatus::Failed => Some(PollOutcome::Failed),
		TransferStatus::Pending => None,
	}
}

/// Owner of one running poll.
///
/// Dropping the handle leaves the poll running; call [`cancel`](Self::cancel)
/// to stop it.
pub struct PollHandle {
	hash: String,
	generation: u64,
	updates: watch::Receiver<TransferRecord>,
	task: JoinHandle<PollOutcome>,
	registry: Registry,
}

impl PollHandle {
	pub fn hash(&self) -> &str {
		&self.hash
	}

	/// Latest known state of the transfer.
	pub fn current(&self) -> TransferRecord {
		self.updates.borrow().clone()
	}

	/// Receiver notified on every status change.
	pub fn subscribe(&self) -> watch::Receiver<TransferRecord> {
		self.updates.clone()
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Stops the poll. A newer poll for the same hash is left alone.
	pub async fn cancel(&self) {
		self.task.abort();
		let mut active = self.registry.lock().await;
		if active
			.get(&self.hash)
			.is_some_and(|poll| poll.generation == self.generation)
		{
			active.remove(&self.hash);
		}
	}

	/// Waits for the poll to end.
	pub async fn wait(self) -> PollReport {
		let outcome = match self.task.await {
			Ok(outcome) => outcome,
			Err(e) if e.is_cancelled() => PollOutcome::Cancelled,
			Err(e) => {
				tracing::error!(tx_hash = %truncate_id(&self.hash), error = %e, "Poll task panicked");
				PollOutcome::Cancelled
			},
		};
		let record = self.updates.borrow().clone();
		PollReport { outcome, record }
	}
}
