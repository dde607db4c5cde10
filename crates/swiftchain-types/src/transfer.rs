//! Transfer records and their status lifecycle.
//!
//! A record starts as `Pending` when the wallet submits the transaction and
//! moves to `Confirmed` or `Failed` exactly once. Terminal records are frozen.

use crate::{ChainTransaction, Currency, ObservedState};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a submitted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
	Pending,
	#[serde(alias = "completed")]
	Confirmed,
	Failed,
}

impl TransferStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			TransferStatus::Pending => "pending",
			TransferStatus::Confirmed => "confirmed",
			TransferStatus::Failed => "failed",
		}
	}

	/// Confirmed and failed transfers never change again.
	pub fn is_terminal(&self) -> bool {
		matches!(self, TransferStatus::Confirmed | TransferStatus::Failed)
	}
}

impl fmt::Display for TransferStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TransferStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"pending" => Ok(Self::Pending),
			"confirmed" | "completed" => Ok(Self::Confirmed),
			"failed" => Ok(Self::Failed),
			other => Err(format!("Unknown transfer status: {}", other)),
		}
	}
}

/// A transfer submitted through the wallet bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
	pub id: String,
	pub hash: String,
	pub from: String,
	pub to: String,
	pub amount: Decimal,
	pub currency: Currency,
	pub status: TransferStatus,
	pub timestamp: DateTime<Utc>,
	#[serde(default)]
	pub gas_used: Option<String>,
	#[serde(default)]
	pub gas_price: Option<String>,
	#[serde(default)]
	pub confirmations: u64,
	#[serde(default)]
	pub block_number: Option<u64>,
}

impl TransferRecord {
	/// Creates a pending record for a freshly submitted transaction.
	pub fn pending(
		hash: impl Into<String>,
		from: impl Into<String>,
		to: impl Into<String>,
		amount: Decimal,
		currency: Currency,
	) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			hash: hash.into(),
			from: from.into(),
			to: to.into(),
			amount,
			currency,
			status: TransferStatus::Pending,
			timestamp: Utc::now(),
			gas_used: None,
			gas_price: None,
			confirmations: 0,
			block_number: None,
		}
	}

	/// Builds a record from a chain snapshot alone.
	///
	/// The transaction hash doubles as the record id since nothing else is known
	/// about the transfer.
	pub fn from_chain(tx: &ChainTransaction, confirmation_threshold: u64) -> Self {
		let mut record = Self::pending(&tx.hash, &tx.from, &tx.to, tx.amount, tx.currency);
		record.id = tx.hash.clone();
		record.apply_observation(tx, confirmation_threshold);
		record
	}

	/// Applies a chain observation and returns whether anything changed.
	///
	/// `Pending -> Confirmed` when the confirmation count reaches
	/// `confirmation_threshold` or the source reports success,
	/// `Pending -> Failed` when the transaction reverted.
	/// Terminal records are left untouched.
	pub fn apply_observation(&mut self, tx: &ChainTransaction, confirmation_threshold: u64) -> bool {
		if self.status.is_terminal() {
			return false;
		}

		let before = self.clone();

		self.confirmations = tx.confirmations;
		if tx.block_number.is_some() {
			self.block_number = tx.block_number;
		}
		if tx.gas_used.is_some() {
			self.gas_used = tx.gas_used.clone();
		}
		if tx.gas_price.is_some() {
			self.gas_price = tx.gas_price.clone();
		}

		self.status = match tx.state {
			ObservedState::Reverted => TransferStatus::Failed,
			ObservedState::Succeeded => TransferStatus::Confirmed,
			ObservedState::Pending | ObservedState::Included
				if tx.confirmations >= confirmation_threshold =>
			{
				TransferStatus::Confirmed
			},
			ObservedState::Pending | ObservedState::Included => TransferStatus::Pending,
		};

		*self != before
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn observation(state: ObservedState, confirmations: u64) -> ChainTransaction {
		ChainTransaction {
			hash: "0xabc".to_string(),
			from: "0x1".to_string(),
			to: "0x2".to_string(),
			amount: dec!(1.5),
			currency: Currency::Eth,
			state,
			confirmations,
			block_number: Some(100),
			gas_used: Some("21000".to_string()),
			gas_price: Some("20000000000".to_string()),
		}
	}

	fn record() -> TransferRecord {
		TransferRecord::pending("0xabc", "0x1", "0x2", dec!(1.5), Currency::Eth)
	}

	#[test]
	fn test_threshold_confirms() {
		let mut r = record();
		assert!(r.apply_observation(&observation(ObservedState::Included, 11), 12));
		assert_eq!(r.status, TransferStatus::Pending);
		assert!(r.apply_observation(&observation(ObservedState::Included, 12), 12));
		assert_eq!(r.status, TransferStatus::Confirmed);
		assert_eq!(r.block_number, Some(100));
	}

	#[test]
	fn test_terminal_record_is_frozen() {
		let mut r = record();
		r.apply_observation(&observation(ObservedState::Reverted, 1), 12);
		assert_eq!(r.status, TransferStatus::Failed);

		let changed = r.apply_observation(&observation(ObservedState::Succeeded, 30), 12);
		assert!(!changed);
		assert_eq!(r.status, TransferStatus::Failed);
		assert_eq!(r.confirmations, 1);
	}

	#[test]
	fn test_explicit_success_confirms_below_threshold() {
		let mut r = record();
		r.apply_observation(&observation(ObservedState::Succeeded, 1), 12);
		assert_eq!(r.status, TransferStatus::Confirmed);
	}

	#[test]
	fn test_unchanged_observation_reports_no_change() {
		let mut r = record();
		assert!(r.apply_observation(&observation(ObservedState::Pending, 0), 12));
		assert!(!r.apply_observation(&observation(ObservedState::Pending, 0), 12));
	}

	#[test]
	fn test_completed_alias() {
		let status: TransferStatus = serde_json::from_str("\"completed\"").unwrap();
		assert_eq!(status, TransferStatus::Confirmed);
		assert_eq!("completed".parse::<TransferStatus>().unwrap(), TransferStatus::Confirmed);
	}
}
