//! Target currencies supported for INR conversion.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cryptocurrency a transfer can be denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
	/// Tether stablecoin (ERC-20 on the target network).
	Usdt,
	/// Native ether.
	Eth,
}

impl Currency {
	/// Returns the ticker symbol.
	pub fn as_str(&self) -> &'static str {
		match self {
			Currency::Usdt => "USDT",
			Currency::Eth => "ETH",
		}
	}

	/// Identifier used by the market data API for this asset.
	pub fn market_id(&self) -> &'static str {
		match self {
			Currency::Usdt => "tether",
			Currency::Eth => "ethereum",
		}
	}

	/// Decimal places used when presenting converted amounts.
	///
	/// Stablecoins are shown like fiat, ETH-like assets need six places.
	pub fn default_precision(&self) -> u32 {
		match self {
			Currency::Usdt => 2,
			Currency::Eth => 6,
		}
	}

	/// On-chain unit decimals of the asset.
	pub fn chain_decimals(&self) -> u32 {
		match self {
			Currency::Usdt => 6,
			Currency::Eth => 18,
		}
	}

	/// Returns an iterator over all supported currencies.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Usdt, Self::Eth].into_iter()
	}
}

impl fmt::Display for Currency {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a currency code is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported currency: {0}")]
pub struct UnsupportedCurrency(pub String);

impl FromStr for Currency {
	type Err = UnsupportedCurrency;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_uppercase().as_str() {
			"USDT" => Ok(Self::Usdt),
			"ETH" => Ok(Self::Eth),
			_ => Err(UnsupportedCurrency(s.to_string())),
		}
	}
}
