//! Bank transfer versus SwiftChain cost comparison.

use crate::conversion::{round_dp, ConversionEngine, ConversionError};
use rust_decimal::Decimal;
use std::sync::Arc;
use swiftchain_config::BankConfig;
use swiftchain_types::{ConversionResult, FeeComparison};

/// Prices a transfer both as a bank wire and through SwiftChain.
///
/// The SwiftChain side is a regular conversion into the bank config's
/// `default_currency`, so the comparison always reflects the current fee
/// schedule.
pub struct FeeComparisonEngine {
	conversion: Arc<ConversionEngine>,
	bank: BankConfig,
}

impl FeeComparisonEngine {
	/// Creates an engine with the bank fee model from `bank`.
	pub fn new(conversion: Arc<ConversionEngine>, bank: BankConfig) -> Self {
		Self { conversion, bank }
	}

	/// Compares at the live rate of the configured comparison currency.
	pub async fn compare(&self, amount: Decimal) -> Result<FeeComparison, ConversionError> {
		let conversion = self
			.conversion
			.convert(amount, self.bank.default_currency)
			.await?;
		Ok(self.build(amount, &conversion))
	}

	/// Compares at a known rate.
	pub fn compare_at(&self, amount: Decimal, rate: Decimal) -> Result<FeeComparison, ConversionError> {
		let conversion = self
			.conversion
			.convert_at(amount, self.bank.default_currency, rate)?;
		Ok(self.build(amount, &conversion))
	}

	/// Flat fee plus percentage, rounded to paise.
	pub fn traditional_bank_cost(&self, amount: Decimal) -> Decimal {
		round_dp(self.bank.flat_fee_inr + amount * self.bank.percentage_fee, 2)
	}

	fn build(&self, amount: Decimal, conversion: &ConversionResult) -> FeeComparison {
		let traditional_bank_cost = self.traditional_bank_cost(amount);
		let swift_chain_cost = conversion.fees.total_fee;
		let savings = traditional_bank_cost - swift_chain_cost;
		let savings_percentage = if traditional_bank_cost.is_zero() {
			Decimal::ZERO
		} else {
			round_dp(savings / traditional_bank_cost * Decimal::ONE_HUNDRED, 2)
		};

		FeeComparison {
			amount,
			traditional_bank_cost,
			swift_chain_cost,
			savings,
			savings_percentage,
			traditional_delay_hours: self.bank.delay_hours,
			currency: conversion.currency,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::conversion::tests::engine;
	use rust_decimal_macros::dec;
	use swiftchain_types::Currency;

	fn comparison(bank: BankConfig) -> FeeComparisonEngine {
		FeeComparisonEngine::new(Arc::new(engine()), bank)
	}

	#[tokio::test]
	async fn test_reference_comparison() {
		let result = comparison(BankConfig::default())
			.compare(dec!(10000))
			.await
			.unwrap();

		assert_eq!(result.traditional_bank_cost, dec!(800.00));
		assert_eq!(result.swift_chain_cost, dec!(141.75));
		assert_eq!(result.savings, dec!(658.25));
		assert_eq!(result.savings_percentage, dec!(82.28));
		assert_eq!(result.traditional_delay_hours, 72);
		assert_eq!(result.currency, Currency::Usdt);
	}

	#[test]
	fn test_free_bank_transfer_has_zero_percentage() {
		let engine = comparison(BankConfig {
			flat_fee_inr: Decimal::ZERO,
			percentage_fee: Decimal::ZERO,
			..Default::default()
		});
		let result = engine.compare_at(dec!(10000), dec!(83.50)).unwrap();
		assert_eq!(result.traditional_bank_cost, Decimal::ZERO);
		assert_eq!(result.savings, dec!(-141.75));
		assert_eq!(result.savings_percentage, Decimal::ZERO);
	}

	#[test]
	fn test_invalid_amount_is_rejected() {
		let engine = comparison(BankConfig::default());
		assert!(matches!(
			engine.compare_at(dec!(0), dec!(83.50)),
			Err(ConversionError::InvalidAmount { .. })
		));
	}
}
