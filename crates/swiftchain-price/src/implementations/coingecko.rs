//! CoinGecko `simple/price` price feed.

use crate::{
	PriceFeedError, PriceFeedFactory, PriceFeedInterface, PriceFeedRegistry, DISPLAY_MARKETS,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;
use swiftchain_types::{
	current_timestamp, ConfigSchema, Field, FieldType, ImplementationRegistry, InrQuote, Schema,
	SpotRates, ValidationError,
};

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

pub struct CoinGeckoSchema;

impl ConfigSchema for CoinGeckoSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("base_url", FieldType::String).with_validator(|v| match v.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("must be an http(s) URL".to_string()),
				}),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
				Field::new("api_key", FieldType::String),
			],
		);
		schema.validate(config)
	}
}

pub struct CoinGeckoPriceFeed {
	client: reqwest::Client,
	base_url: String,
	api_key: Option<String>,
}

impl CoinGeckoPriceFeed {
	pub fn new(
		base_url: impl Into<String>,
		timeout: Duration,
		api_key: Option<String>,
	) -> Result<Self, PriceFeedError> {
		let client = reqwest::Client::builder()
			.user_agent("swiftchain")
			.timeout(timeout)
			.build()
			.map_err(|e| PriceFeedError::Configuration(e.to_string()))?;

		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			api_key,
		})
	}
}

/// Parses a JSON number without going through `f64` when possible.
fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
	let text = match value {
		serde_json::Value::Number(n) => n.to_string(),
		serde_json::Value::String(s) => s.clone(),
		_ => return None,
	};
	Decimal::from_str(&text)
		.or_else(|_| Decimal::from_scientific(&text))
		.ok()
}

/// Turns `{"tether": {"inr": 83.5}, ...}` into INR quotes.
///
/// Markets without a parsable INR price are dropped rather than failing the
/// whole snapshot.
fn parse_simple_price(
	body: &HashMap<String, HashMap<String, serde_json::Value>>,
) -> BTreeMap<String, InrQuote> {
	DISPLAY_MARKETS
		.iter()
		.filter_map(|market| {
			let inr = body.get(*market)?.get("inr").and_then(decimal_from_json)?;
			Some((market.to_string(), InrQuote { inr }))
		})
		.collect()
}

#[async_trait]
impl PriceFeedInterface for CoinGeckoPriceFeed {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CoinGeckoSchema)
	}

	fn name(&self) -> &'static str {
		"coingecko"
	}

	async fn get_spot_rates(&self) -> Result<SpotRates, PriceFeedError> {
		let url = format!("{}/simple/price", self.base_url);
		let mut request = self
			.client
			.get(&url)
			.query(&[("ids", DISPLAY_MARKETS.join(",")), ("vs_currencies", "inr".to_string())]);
		if let Some(key) = &self.api_key {
			request = request.header("x-cg-demo-api-key", key);
		}

		let response = request
			.send()
			.await
			.map_err(|e| PriceFeedError::Network(e.to_string()))?;

		if !response.status().is_success() {
			return Err(PriceFeedError::PriceUnavailable(format!(
				"CoinGecko returned HTTP {}",
				response.status()
			)));
		}

		let body: HashMap<String, HashMap<String, serde_json::Value>> = response
			.json()
			.await
			.map_err(|e| PriceFeedError::PriceUnavailable(format!("Malformed response: {}", e)))?;

		let rates = parse_simple_price(&body);
		if rates.is_empty() {
			return Err(PriceFeedError::PriceUnavailable(
				"CoinGecko response had no INR prices".to_string(),
			));
		}

		tracing::debug!(markets = rates.len(), "Fetched INR spot rates");

		Ok(SpotRates {
			rates,
			timestamp: current_timestamp(),
			source: self.name().to_string(),
		})
	}
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "coingecko";
	type Factory = PriceFeedFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn PriceFeedInterface>, PriceFeedError> {
			CoinGeckoSchema
				.validate(config)
				.map_err(|e| PriceFeedError::Configuration(e.to_string()))?;

			let base_url = config
				.get("base_url")
				.and_then(|v| v.as_str())
				.unwrap_or(DEFAULT_BASE_URL);
			let timeout = config
				.get("timeout_seconds")
				.and_then(|v| v.as_integer())
				.and_then(|v| u64::try_from(v).ok())
				.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
			let api_key = config
				.get("api_key")
				.and_then(|v| v.as_str())
				.filter(|k| !k.is_empty())
				.map(String::from);

			Ok(Box::new(CoinGeckoPriceFeed::new(
				base_url,
				Duration::from_secs(timeout),
				api_key,
			)?))
		}
	}
}

impl PriceFeedRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_parse_simple_price() {
		let body: HashMap<String, HashMap<String, serde_json::Value>> = serde_json::from_str(
			r#"{
				"tether": {"inr": 83.5},
				"ethereum": {"inr": 251234.12},
				"bitcoin": {"inr": 5.5e6},
				"dogecoin": {"inr": 7}
			}"#,
		)
		.unwrap();

		let rates = parse_simple_price(&body);
		assert_eq!(rates["tether"].inr, dec!(83.5));
		assert_eq!(rates["ethereum"].inr, dec!(251234.12));
		assert_eq!(rates["bitcoin"].inr, dec!(5500000));
		assert!(!rates.contains_key("dogecoin"));
	}

	#[test]
	fn test_parse_skips_missing_inr() {
		let body: HashMap<String, HashMap<String, serde_json::Value>> =
			serde_json::from_str(r#"{"tether": {"usd": 1.0}}"#).unwrap();
		assert!(parse_simple_price(&body).is_empty());
	}

	#[test]
	fn test_factory_validates_url() {
		let config: toml::Value = toml::from_str("base_url = \"ftp://prices\"").unwrap();
		assert!((Registry::factory())(&config).is_err());

		let config: toml::Value = toml::from_str("timeout_seconds = 5").unwrap();
		assert!((Registry::factory())(&config).is_ok());
	}
}
