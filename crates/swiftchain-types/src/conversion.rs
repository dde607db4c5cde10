//! Conversion and fee comparison value objects.
//!
//! Every value here is derived from a request plus one rate snapshot and is
//! never mutated after creation. Amounts are kept as [`Decimal`] so fee
//! arithmetic stays exact.

use crate::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request to convert an INR amount into a target currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
	/// Amount in INR.
	pub amount: Decimal,
	/// Currency the recipient should receive.
	pub currency: Currency,
}

/// Fee components of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
	/// Platform fee in INR.
	pub swift_chain_fee: Decimal,
	/// Flat network fee estimate, denominated in the target currency.
	pub network_fee: Decimal,
	/// The network fee valued in INR at the conversion rate.
	pub network_fee_inr: Decimal,
	/// Sum of the platform fee and the INR-valued network fee.
	pub total_fee: Decimal,
}

/// Outcome of converting an INR amount at a given rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
	/// The INR amount that was submitted.
	pub original_amount: Decimal,
	/// Amount the recipient receives, in the target currency.
	pub converted_amount: Decimal,
	/// INR price of one unit of the target currency.
	pub exchange_rate: Decimal,
	/// Fee breakdown.
	pub fees: FeeBreakdown,
	/// INR left after fees.
	pub net_amount: Decimal,
	/// Target currency.
	pub currency: Currency,
	/// Unix timestamp of the rate snapshot used.
	pub timestamp: u64,
}

/// Bank transfer cost compared with a SwiftChain transfer of the same amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeComparison {
	/// INR amount being compared.
	pub amount: Decimal,
	/// Flat plus percentage cost of a traditional bank transfer.
	pub traditional_bank_cost: Decimal,
	/// Total fee of the equivalent SwiftChain transfer.
	pub swift_chain_cost: Decimal,
	/// Absolute savings in INR.
	pub savings: Decimal,
	/// Savings relative to the bank cost, in percent with two decimals.
	pub savings_percentage: Decimal,
	/// Typical settlement delay of a bank transfer. Informational only.
	pub traditional_delay_hours: u64,
	/// Currency used to price the SwiftChain side.
	pub currency: Currency,
}

/// INR quote for a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InrQuote {
	pub inr: Decimal,
}

/// Spot prices for the assets shown to users.
///
/// Keys are market identifiers (`tether`, `ethereum`, `bitcoin`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotRates {
	pub rates: BTreeMap<String, InrQuote>,
	/// Unix timestamp when the rates were fetched.
	pub timestamp: u64,
	/// Name of the price source that supplied the rates.
	pub source: String,
}

impl SpotRates {
	/// Looks up the INR price of a market identifier.
	pub fn inr_price(&self, market_id: &str) -> Option<Decimal> {
		self.rates.get(market_id).map(|q| q.inr)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_conversion_result_uses_camel_case() {
		let result = ConversionResult {
			original_amount: dec!(10000),
			converted_amount: dec!(118.06),
			exchange_rate: dec!(83.50),
			fees: FeeBreakdown {
				swift_chain_fee: dec!(100.00),
				network_fee: dec!(0.50),
				network_fee_inr: dec!(41.75),
				total_fee: dec!(141.75),
			},
			net_amount: dec!(9858.25),
			currency: Currency::Usdt,
			timestamp: 0,
		};

		let json = serde_json::to_value(&result).unwrap();
		assert_eq!(json["convertedAmount"], "118.06");
		assert_eq!(json["fees"]["swiftChainFee"], "100.00");
		assert_eq!(json["currency"], "USDT");
	}
}
