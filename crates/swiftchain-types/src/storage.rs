//! Storage-related types for the SwiftChain system.

use std::str::FromStr;

/// Storage namespaces.
///
/// Each variant is a separate collection in the backing store; the file
/// backend maps it to a directory and can attach a TTL to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Transaction history of submitted transfers
	Transfers,
	/// In-progress transfer flow contexts
	Sessions,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Transfers => "transfers",
			StorageKey::Sessions => "sessions",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Transfers, Self::Sessions].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"transfers" => Ok(Self::Transfers),
			"sessions" => Ok(Self::Sessions),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
