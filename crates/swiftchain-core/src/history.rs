//! Local transaction history.
//!
//! All records live in one JSON document under the transfers namespace. Writes
//! are serialized through a mutex so concurrent pollers never lose updates.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swiftchain_storage::{StorageError, StorageService};
use swiftchain_types::{StorageKey, TransferRecord, TransferStatus};
use thiserror::Error;
use tokio::sync::Mutex;

const RECORDS_ID: &str = "records";

const CSV_HEADER: &str =
	"hash,from,to,amount,currency,status,timestamp,gasUsed,gasPrice,confirmations,blockNumber";

#[derive(Debug, Error)]
pub enum HistoryError {
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Search and status filter for listing and export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
	/// Case-insensitive substring of hash, addresses, amount or currency.
	pub search: Option<String>,
	pub status: Option<TransferStatus>,
}

impl HistoryFilter {
	pub fn matches(&self, record: &TransferRecord) -> bool {
		if let Some(status) = self.status {
			if record.status != status {
				return false;
			}
		}

		match self.search.as_deref().map(str::trim) {
			None | Some("") => true,
			Some(term) => {
				let term = term.to_lowercase();
				[
					record.hash.to_lowercase(),
					record.from.to_lowercase(),
					record.to.to_lowercase(),
					record.amount.to_string(),
					record.currency.as_str().to_lowercase(),
				]
				.iter()
				.any(|field| field.contains(&term))
			},
		}
	}
}

/// Number of records per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
	pub total: usize,
	pub confirmed: usize,
	pub pending: usize,
	pub failed: usize,
}

pub struct TransactionHistory {
	storage: Arc<StorageService>,
	write_lock: Mutex<()>,
}

impl TransactionHistory {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			write_lock: Mutex::new(()),
		}
	}

	async fn load(&self) -> Result<Vec<TransferRecord>, HistoryError> {
		Ok(self
			.storage
			.retrieve_optional(StorageKey::Transfers, RECORDS_ID)
			.await?
			.unwrap_or_default())
	}

	/// Inserts or replaces the record with the same id.
	///
	/// Returns `false` without writing when the stored record is already
	/// terminal.
	pub async fn record(&self, record: &TransferRecord) -> Result<bool, HistoryError> {
		let _guard = self.write_lock.lock().await;
		let mut records = self.load().await?;

		match records.iter_mut().find(|r| r.id == record.id) {
			Some(existing) if existing.status.is_terminal() => {
				tracing::debug!(id = %record.id, status = %existing.status, "Ignoring update of settled transfer");
				return Ok(false);
			},
			Some(existing) => *existing = record.clone(),
			None => records.push(record.clone()),
		}

		self.storage
			.store(StorageKey::Transfers, RECORDS_ID, &records)
			.await?;
		Ok(true)
	}

	/// Read-modify-write of the record with transaction hash `hash`, under the
	/// same lock as [`record`](Self::record).
	///
	/// `change` reports whether it modified the record; only then is history
	/// written. Returns the record as it stands afterwards, or `None` when no
	/// record has this hash.
	pub async fn update_by_hash<F>(
		&self,
		hash: &str,
		change: F,
	) -> Result<Option<TransferRecord>, HistoryError>
	where
		F: FnOnce(&mut TransferRecord) -> bool,
	{
		let _guard = self.write_lock.lock().await;
		let mut records = self.load().await?;

		let Some(record) = records.iter_mut().find(|r| r.hash.eq_ignore_ascii_case(hash)) else {
			return Ok(None);
		};
		let changed = change(record);
		let current = record.clone();

		if changed {
			self.storage
				.store(StorageKey::Transfers, RECORDS_ID, &records)
				.await?;
		}
		Ok(Some(current))
	}

	pub async fn get(&self, id: &str) -> Result<Option<TransferRecord>, HistoryError> {
		Ok(self.load().await?.into_iter().find(|r| r.id == id))
	}

	/// All records, newest first.
	pub async fn list(&self) -> Result<Vec<TransferRecord>, HistoryError> {
		let mut records = self.load().await?;
		records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
		Ok(records)
	}

	pub async fn filter(&self, filter: &HistoryFilter) -> Result<Vec<TransferRecord>, HistoryError> {
		Ok(self
			.list()
			.await?
			.into_iter()
			.filter(|r| filter.matches(r))
			.collect())
	}

	pub async fn summary(&self) -> Result<HistorySummary, HistoryError> {
		let records = self.load().await?;
		let count = |status: TransferStatus| records.iter().filter(|r| r.status == status).count();
		Ok(HistorySummary {
			total: records.len(),
			confirmed: count(TransferStatus::Confirmed),
			pending: count(TransferStatus::Pending),
			failed: count(TransferStatus::Failed),
		})
	}

	/// Renders the filtered records as CSV, newest first.
	pub async fn export_csv(&self, filter: &HistoryFilter) -> Result<String, HistoryError> {
		let records = self.filter(filter).await?;
		let mut out = String::from(CSV_HEADER);
		out.push('\n');
		for r in &records {
			let row = [
				r.hash.clone(),
				r.from.clone(),
				r.to.clone(),
				r.amount.to_string(),
				r.currency.to_string(),
				r.status.to_string(),
				r.timestamp.to_rfc3339(),
				r.gas_used.clone().unwrap_or_default(),
				r.gas_price.clone().unwrap_or_default(),
				r.confirmations.to_string(),
				r.block_number.map(|b| b.to_string()).unwrap_or_default(),
			];
			let escaped: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
			out.push_str(&escaped.join(","));
			out.push('\n');
		}
		Ok(out)
	}
}

fn csv_field(value: &str) -> String {
	if value.contains([',', '"', '\n', '\r']) {
		format!("\"{}\"", value.replace('"', "\"\""))
	} else {
		value.to_string()
	}
}
