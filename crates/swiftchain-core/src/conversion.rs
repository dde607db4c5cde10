//! INR to crypto conversion.
//!
//! The platform fee is a share of the INR amount. The network fee is a flat
//! estimate in the target currency, valued in INR at the same rate that is used
//! for the conversion. Both are rounded to paise before they are subtracted.

use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use swiftchain_config::FeesConfig;
use swiftchain_price::{PriceFeedError, PriceFeedService};
use swiftchain_types::{
	current_timestamp, ConversionResult, Currency, FeeBreakdown, UnsupportedCurrency,
};
use thiserror::Error;

/// Errors that can occur while converting an amount.
#[derive(Debug, Error)]
pub enum ConversionError {
	#[error("Amount {amount} INR is below the minimum of {min} INR")]
	InvalidAmount { amount: Decimal, min: Decimal },
	#[error("Exchange rate unavailable: {0}")]
	RateUnavailable(String),
	#[error(transparent)]
	UnsupportedCurrency(#[from] UnsupportedCurrency),
}

impl From<PriceFeedError> for ConversionError {
	fn from(err: PriceFeedError) -> Self {
		ConversionError::RateUnavailable(err.to_string())
	}
}

/// Rounds half away from zero, the way amounts are shown to users.
pub(crate) fn round_dp(value: Decimal, dp: u32) -> Decimal {
	value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts INR amounts using the primary price feed.
pub struct ConversionEngine {
	price: Arc<PriceFeedService>,
	fees: FeesConfig,
}

impl ConversionEngine {
	/// Creates an engine reading rates from `price` and charging `fees`.
	pub fn new(price: Arc<PriceFeedService>, fees: FeesConfig) -> Self {
		Self { price, fees }
	}

	/// Fee schedule applied to every conversion, including the minimum
	/// accepted INR amount.
	pub fn fees(&self) -> &FeesConfig {
		&self.fees
	}

	/// Fetches the live rate and converts `amount`.
	///
	/// The amount is checked before the price feed is contacted. Feed failures
	/// surface as `RateUnavailable` and are not retried.
	pub async fn convert(
		&self,
		amount: Decimal,
		currency: Currency,
	) -> Result<ConversionResult, ConversionError> {
		self.check_amount(amount)?;
		let rate = self.price.get_inr_price(currency).await?;
		let result = self.convert_at(amount, currency, rate)?;

		tracing::debug!(
			%amount,
			%currency,
			%rate,
			converted = %result.converted_amount,
			"Converted INR amount"
		);
		Ok(result)
	}

	/// Converts `amount` at a known `rate` (INR per unit of `currency`).
	pub fn convert_at(
		&self,
		amount: Decimal,
		currency: Currency,
		rate: Decimal,
	) -> Result<ConversionResult, ConversionError> {
		self.check_amount(amount)?;
		if rate <= Decimal::ZERO {
			return Err(ConversionError::RateUnavailable(format!(
				"Non-positive exchange rate {} for {}",
				rate, currency
			)));
		}

		let network = self.fees.network_fee(currency);
		let swift_chain_fee = round_dp(amount * self.fees.platform_fee_rate, 2);
		let network_fee_inr = round_dp(network.amount * rate, 2);
		let total_fee = swift_chain_fee + network_fee_inr;
		let net_amount = amount - total_fee;
		// Fees can exceed tiny amounts; the recipient then gets nothing rather
		// than a negative quantity.
		let converted_amount = round_dp(net_amount.max(Decimal::ZERO) / rate, network.precision);

		Ok(ConversionResult {
			original_amount: amount,
			converted_amount,
			exchange_rate: rate,
			fees: FeeBreakdown {
				swift_chain_fee,
				network_fee: network.amount,
				network_fee_inr,
				total_fee,
			},
			net_amount,
			currency,
			timestamp: current_timestamp(),
		})
	}

	fn check_amount(&self, amount: Decimal) -> Result<(), ConversionError> {
		if amount < self.fees.min_amount {
			return Err(ConversionError::InvalidAmount {
				amount,
				min: self.fees.min_amount,
			});
		}
		Ok(())
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use rust_decimal_macros::dec;
	use swiftchain_price::implementations::mock::{MockPriceFeed, MockPriceFeedConfig};

	pub(crate) fn engine_with(config: MockPriceFeedConfig) -> ConversionEngine {
		let feed = MockPriceFeed::new(config);
		ConversionEngine::new(
			Arc::new(PriceFeedService::single("mock", Arc::new(feed))),
			FeesConfig::default(),
		)
	}

	pub(crate) fn engine() -> ConversionEngine {
		engine_with(MockPriceFeedConfig::default())
	}

	#[tokio::test]
	async fn test_reference_scenario() {
		let result = engine().convert(dec!(10000), Currency::Usdt).await.unwrap();

		assert_eq!(result.exchange_rate, dec!(83.50));
		assert_eq!(result.fees.swift_chain_fee, dec!(100.00));
		assert_eq!(result.fees.network_fee, dec!(0.50));
		assert_eq!(result.fees.network_fee_inr, dec!(41.75));
		assert_eq!(result.fees.total_fee, dec!(141.75));
		assert_eq!(result.net_amount, dec!(9858.25));
		assert_eq!(result.converted_amount, dec!(118.06));
	}

	#[test]
	fn test_fee_invariants_hold() {
		let engine = engine();
		for (amount, currency, rate) in [
			(dec!(0.01), Currency::Usdt, dec!(83.50)),
			(dec!(1234.56), Currency::Usdt, dec!(84.07)),
			(dec!(50000), Currency::Eth, dec!(251234.12)),
			(dec!(999999.99), Currency::Eth, dec!(300000)),
		] {
			let r = engine.convert_at(amount, currency, rate).unwrap();
			assert_eq!(r.fees.total_fee, r.fees.swift_chain_fee + r.fees.network_fee_inr);
			assert_eq!(r.net_amount, r.original_amount - r.fees.total_fee);
			assert!(r.converted_amount >= Decimal::ZERO);
		}
	}

	#[test]
	fn test_minimum_amount_boundary() {
		let engine = engine();
		assert!(matches!(
			engine.convert_at(dec!(0.009999), Currency::Usdt, dec!(83.50)),
			Err(ConversionError::InvalidAmount { .. })
		));
		let result = engine.convert_at(dec!(0.01), Currency::Usdt, dec!(83.50)).unwrap();
		// 0.01 INR cannot cover the network fee
		assert!(result.net_amount < Decimal::ZERO);
		assert_eq!(result.converted_amount, Decimal::ZERO);
	}

	#[test]
	fn test_deterministic_for_fixed_rate() {
		let engine = engine();
		let mut first = engine.convert_at(dec!(2500), Currency::Eth, dec!(250000)).unwrap();
		let second = engine.convert_at(dec!(2500), Currency::Eth, dec!(250000)).unwrap();
		first.timestamp = second.timestamp;
		assert_eq!(first, second);
	}

	#[test]
	fn test_converted_amount_round_trips_within_precision() {
		let engine = engine();
		for (amount, currency, rate) in [
			(dec!(10000), Currency::Usdt, dec!(83.50)),
			(dec!(777.77), Currency::Usdt, dec!(83.13)),
			(dec!(250000), Currency::Eth, dec!(251234.12)),
		] {
			let r = engine.convert_at(amount, currency, rate).unwrap();
			let precision = currency.default_precision();
			// Half a unit in the last place, valued in INR
			let tolerance = Decimal::new(5, precision + 1) * rate;
			let diff = (r.converted_amount * r.exchange_rate - r.net_amount).abs();
			assert!(diff <= tolerance, "{} {} off by {}", amount, currency, diff);
		}
	}

	#[test]
	fn test_eth_uses_six_places() {
		let r = engine().convert_at(dec!(10000), Currency::Eth, dec!(250000)).unwrap();
		assert_eq!(r.fees.network_fee_inr, dec!(125.00));
		assert_eq!(r.net_amount, dec!(9775.00));
		assert_eq!(r.converted_amount, dec!(0.039100));
	}

	#[tokio::test]
	async fn test_rate_unavailable_is_propagated() {
		let engine = engine_with(MockPriceFeedConfig {
			unavailable: true,
			..Default::default()
		});
		assert!(matches!(
			engine.convert(dec!(100), Currency::Usdt).await,
			Err(ConversionError::RateUnavailable(_))
		));
		assert!(matches!(
			engine.convert_at(dec!(100), Currency::Usdt, Decimal::ZERO),
			Err(ConversionError::RateUnavailable(_))
		));
	}
}
