//! Price feed module for the SwiftChain service.
//!
//! Provides INR spot prices for the assets SwiftChain converts into. The
//! conversion engine only asks for one price at a time; the rates endpoint
//! shows the whole snapshot, including bitcoin for reference.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use swiftchain_types::{ConfigSchema, Currency, ImplementationRegistry, SpotRates};
use thiserror::Error;

pub mod implementations {
	pub mod coingecko;
	pub mod mock;
}

/// Market identifiers included in every rate snapshot.
pub const DISPLAY_MARKETS: [&str; 3] = ["tether", "ethereum", "bitcoin"];

/// Errors that can occur during price feed operations.
#[derive(Debug, Error)]
pub enum PriceFeedError {
	/// Transport failure talking to the price source.
	#[error("Network error: {0}")]
	Network(String),
	/// The source answered but had no usable price.
	#[error("Price data unavailable: {0}")]
	PriceUnavailable(String),
	#[error("Internal error: {0}")]
	Internal(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Source of INR spot prices.
#[async_trait]
pub trait PriceFeedInterface: Send + Sync {
	/// Schema of this implementation's `pricing.implementations.<name>` table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Name reported in [`SpotRates::source`].
	fn name(&self) -> &'static str;

	/// Fetches INR prices for [`DISPLAY_MARKETS`].
	async fn get_spot_rates(&self) -> Result<SpotRates, PriceFeedError>;

	/// INR price of one unit of `currency`.
	async fn get_inr_price(&self, currency: Currency) -> Result<Decimal, PriceFeedError> {
		let rates = self.get_spot_rates().await?;
		rates.inr_price(currency.market_id()).ok_or_else(|| {
			PriceFeedError::PriceUnavailable(format!("No INR price for {}", currency))
		})
	}
}

/// Builds a price feed from its configuration table.
pub type PriceFeedFactory =
	fn(&toml::Value) -> Result<Box<dyn PriceFeedInterface>, PriceFeedError>;

pub trait PriceFeedRegistry: ImplementationRegistry<Factory = PriceFeedFactory> {}

/// All price feed implementations by configuration name.
pub fn get_all_implementations() -> Vec<(&'static str, PriceFeedFactory)> {
	use implementations::{coingecko, mock};

	vec![
		(coingecko::Registry::NAME, coingecko::Registry::factory()),
		(mock::Registry::NAME, mock::Registry::factory()),
	]
}

/// Routes price queries to the configured primary implementation.
pub struct PriceFeedService {
	implementations: HashMap<String, Arc<dyn PriceFeedInterface>>,
	primary_implementation: String,
}

impl PriceFeedService {
	pub fn new(
		implementations: HashMap<String, Arc<dyn PriceFeedInterface>>,
		primary_implementation: String,
	) -> Result<Self, PriceFeedError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(PriceFeedError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	/// Wraps a single implementation as primary.
	pub fn single(name: impl Into<String>, implementation: Arc<dyn PriceFeedInterface>) -> Self {
		let name = name.into();
		Self {
			implementations: HashMap::from([(name.clone(), implementation)]),
			primary_implementation: name,
		}
	}

	fn primary(&self) -> Result<&Arc<dyn PriceFeedInterface>, PriceFeedError> {
		self.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				PriceFeedError::Internal(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})
	}

	pub async fn get_spot_rates(&self) -> Result<SpotRates, PriceFeedError> {
		self.primary()?.get_spot_rates().await
	}

	/// INR price of `currency`. Non-positive prices are reported as unavailable.
	pub async fn get_inr_price(&self, currency: Currency) -> Result<Decimal, PriceFeedError> {
		let price = self.primary()?.get_inr_price(currency).await?;
		if price <= Decimal::ZERO {
			return Err(PriceFeedError::PriceUnavailable(format!(
				"Non-positive INR price {} for {}",
				price, currency
			)));
		}
		Ok(price)
	}
}
