//! Mock price feed for development and tests.
//!
//! Serves fixed INR prices from configuration. `unavailable = true` makes every
//! query fail, which is how outage handling is exercised without a network.

use crate::{
	PriceFeedError, PriceFeedFactory, PriceFeedInterface, PriceFeedRegistry, DISPLAY_MARKETS,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use swiftchain_types::{
	current_timestamp, ConfigSchema, Field, FieldType, ImplementationRegistry, InrQuote, Schema,
	SpotRates, ValidationError,
};

/// Configuration for the mock price feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockPriceFeedConfig {
	/// INR price per market id (`tether`, `ethereum`, `bitcoin`).
	#[serde(default = "default_rates")]
	pub rates: BTreeMap<String, Decimal>,
	/// Fail every request.
	#[serde(default)]
	pub unavailable: bool,
}

fn default_rates() -> BTreeMap<String, Decimal> {
	BTreeMap::from([
		("tether".to_string(), Decimal::new(8350, 2)),
		("ethereum".to_string(), Decimal::from(250_000)),
		("bitcoin".to_string(), Decimal::from(5_500_000)),
	])
}

impl Default for MockPriceFeedConfig {
	fn default() -> Self {
		Self {
			rates: default_rates(),
			unavailable: false,
		}
	}
}

pub struct MockPriceFeedSchema;

impl ConfigSchema for MockPriceFeedSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"rates",
					FieldType::Map(Box::new(FieldType::Decimal {
						min: Some(Decimal::ZERO),
					})),
				),
				Field::new("unavailable", FieldType::Boolean),
			],
		);
		schema.validate(config)
	}
}

pub struct MockPriceFeed {
	config: MockPriceFeedConfig,
}

impl MockPriceFeed {
	pub fn new(config: MockPriceFeedConfig) -> Self {
		Self { config }
	}
}

#[async_trait]
impl PriceFeedInterface for MockPriceFeed {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockPriceFeedSchema)
	}

	fn name(&self) -> &'static str {
		"mock"
	}

	async fn get_spot_rates(&self) -> Result<SpotRates, PriceFeedError> {
		if self.config.unavailable {
			return Err(PriceFeedError::Network(
				"Mock price feed configured as unavailable".to_string(),
			));
		}

		let rates = DISPLAY_MARKETS
			.iter()
			.filter_map(|market| {
				self.config
					.rates
					.get(*market)
					.map(|inr| (market.to_string(), InrQuote { inr: *inr }))
			})
			.collect();

		Ok(SpotRates {
			rates,
			timestamp: current_timestamp(),
			source: self.name().to_string(),
		})
	}
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = PriceFeedFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn PriceFeedInterface>, PriceFeedError> {
			MockPriceFeedSchema
				.validate(config)
				.map_err(|e| PriceFeedError::Configuration(e.to_string()))?;

			let mock_config: MockPriceFeedConfig = config
				.clone()
				.try_into()
				.map_err(|e| PriceFeedError::Configuration(format!("Invalid mock config: {}", e)))?;

			Ok(Box::new(MockPriceFeed::new(mock_config)))
		}
	}
}

impl PriceFeedRegistry for Registry {}
