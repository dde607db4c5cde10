//! Configuration module for the SwiftChain service.
//!
//! Configuration is read from TOML. Environment variables are substituted with
//! `${VAR}` or `${VAR:-default}` before parsing, and the result is validated
//! as a whole so that a bad deployment fails at startup rather than on the
//! first request.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["pricing.toml", "chain.toml"]` to include other config files
//! - Each top-level section must be unique across all files

mod loader;

pub use loader::ConfigLoader;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use swiftchain_types::Currency;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Only the message; the default Display repeats the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Root configuration of a SwiftChain deployment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this service instance.
	pub service: ServiceConfig,
	/// INR price sources.
	pub pricing: PricingConfig,
	/// Platform and network fee parameters.
	#[serde(default)]
	pub fees: FeesConfig,
	/// Traditional bank transfer cost model used for fee comparison.
	#[serde(default)]
	pub bank: BankConfig,
	/// Status poller cadence and finality threshold.
	#[serde(default)]
	pub monitoring: MonitoringConfig,
	/// Chain status sources.
	pub chain: ChainConfig,
	/// Storage backend for history and sessions.
	pub storage: StorageConfig,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	pub id: String,
}

/// Price source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	/// Which implementation answers rate queries.
	pub primary: String,
	/// Map of price implementation names to their raw TOML configuration.
	pub implementations: HashMap<String, toml::Value>,
}

/// Flat network fee estimate for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkFeeConfig {
	/// Fee in units of the currency itself.
	pub amount: Decimal,
	/// Decimal places of converted amounts in this currency.
	pub precision: u32,
}

impl NetworkFeeConfig {
	/// Built-in estimate for a currency.
	pub fn default_for(currency: Currency) -> Self {
		match currency {
			Currency::Usdt => Self {
				amount: Decimal::new(50, 2),
				precision: currency.default_precision(),
			},
			Currency::Eth => Self {
				amount: Decimal::new(5, 4),
				precision: currency.default_precision(),
			},
		}
	}
}

/// Fee parameters of the conversion engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeesConfig {
	/// Share of the INR amount kept as platform fee. Defaults to 0.01 (1%).
	#[serde(default = "default_platform_fee_rate")]
	pub platform_fee_rate: Decimal,
	/// Smallest accepted INR amount. Defaults to 0.01.
	#[serde(default = "default_min_amount")]
	pub min_amount: Decimal,
	/// Per-currency network fee overrides keyed by ticker (`USDT`, `ETH`).
	#[serde(default)]
	pub network: BTreeMap<String, NetworkFeeConfig>,
}

impl FeesConfig {
	/// Network fee settings of a currency, falling back to the built-in estimate.
	pub fn network_fee(&self, currency: Currency) -> NetworkFeeConfig {
		self.network
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(currency.as_str()))
			.map(|(_, fee)| fee.clone())
			.unwrap_or_else(|| NetworkFeeConfig::default_for(currency))
	}
}

impl Default for FeesConfig {
	fn default() -> Self {
		Self {
			platform_fee_rate: default_platform_fee_rate(),
			min_amount: default_min_amount(),
			network: BTreeMap::new(),
		}
	}
}

fn default_platform_fee_rate() -> Decimal {
	Decimal::new(1, 2)
}

fn default_min_amount() -> Decimal {
	Decimal::new(1, 2)
}

/// Cost model of a traditional international bank transfer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BankConfig {
	/// Flat fee in INR. Defaults to 500.
	#[serde(default = "default_bank_flat_fee")]
	pub flat_fee_inr: Decimal,
	/// Percentage of the amount, as a fraction. Defaults to 0.03.
	#[serde(default = "default_bank_percentage_fee")]
	pub percentage_fee: Decimal,
	/// Typical settlement delay. Defaults to 72 hours.
	#[serde(default = "default_bank_delay_hours")]
	pub delay_hours: u64,
	/// Currency used to price the SwiftChain side of the comparison.
	#[serde(default = "default_comparison_currency")]
	pub default_currency: Currency,
}

impl Default for BankConfig {
	fn default() -> Self {
		Self {
			flat_fee_inr: default_bank_flat_fee(),
			percentage_fee: default_bank_percentage_fee(),
			delay_hours: default_bank_delay_hours(),
			default_currency: default_comparison_currency(),
		}
	}
}

fn default_bank_flat_fee() -> Decimal {
	Decimal::from(500)
}

fn default_bank_percentage_fee() -> Decimal {
	Decimal::new(3, 2)
}

fn default_bank_delay_hours() -> u64 {
	72
}

fn default_comparison_currency() -> Currency {
	Currency::Usdt
}

/// Status poller settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
	/// Seconds between two status queries. Defaults to 3.
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
	/// Seconds after which polling stops with the transfer still pending.
	/// Defaults to 120.
	#[serde(default = "default_monitoring_timeout_seconds")]
	pub timeout_seconds: u64,
	/// Confirmations after which a transfer counts as confirmed. Defaults to 12.
	#[serde(default = "default_confirmation_threshold")]
	pub confirmation_threshold: u64,
}

impl Default for MonitoringConfig {
	fn default() -> Self {
		Self {
			poll_interval_seconds: default_poll_interval_seconds(),
			timeout_seconds: default_monitoring_timeout_seconds(),
			confirmation_threshold: default_confirmation_threshold(),
		}
	}
}

fn default_poll_interval_seconds() -> u64 {
	3
}

fn default_monitoring_timeout_seconds() -> u64 {
	120
}

fn default_confirmation_threshold() -> u64 {
	12
}

/// Chain status source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// Which implementation answers transaction lookups.
	pub primary: String,
	/// Chain id wallets must be connected to. Defaults to Sepolia.
	#[serde(default = "default_chain_id")]
	pub chain_id: u64,
	/// Map of chain implementation names to their raw TOML configuration.
	pub implementations: HashMap<String, toml::Value>,
}

fn default_chain_id() -> u64 {
	11_155_111
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	pub cleanup_interval_seconds: u64,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request body size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Exact origins allowed in addition to the rules below.
	#[serde(default)]
	pub allowed_origins: Vec<String>,
	#[serde(default = "default_cors_headers")]
	pub allowed_headers: Vec<String>,
	#[serde(default = "default_cors_methods")]
	pub allowed_methods: Vec<String>,
	/// Allow any `http://localhost:<port>` origin.
	#[serde(default = "default_true")]
	pub allow_localhost: bool,
	/// Host suffixes of preview deployments, e.g. `.vercel.app`.
	#[serde(default = "default_origin_suffixes")]
	pub allowed_origin_suffixes: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	5000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

fn default_cors_headers() -> Vec<String> {
	["Content-Type", "Authorization", "X-Requested-With"]
		.into_iter()
		.map(String::from)
		.collect()
}

fn default_cors_methods() -> Vec<String> {
	["GET", "POST", "PUT", "DELETE", "OPTIONS"]
		.into_iter()
		.map(String::from)
		.collect()
}

fn default_origin_suffixes() -> Vec<String> {
	vec![".vercel.app".to_string(), ".netlify.app".to_string()]
}

fn default_true() -> bool {
	true
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME` and supports defaults
/// with `${VAR_NAME:-default_value}`. Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut output = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)));
			},
		};

		output.push_str(&input[last..full_match.start()]);
		output.push_str(&value);
		last = full_match.end();
	}
	output.push_str(&input[last..]);

	Ok(output)
}

fn require_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Checks cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		require_primary("pricing", &self.pricing.primary, &self.pricing.implementations)?;
		require_primary("chain", &self.chain.primary, &self.chain.implementations)?;
		require_primary("storage", &self.storage.primary, &self.storage.implementations)?;

		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		self.validate_fees()?;

		if self.bank.flat_fee_inr.is_sign_negative() || self.bank.percentage_fee.is_sign_negative() {
			return Err(ConfigError::Validation(
				"Bank fees cannot be negative".into(),
			));
		}

		let monitoring = &self.monitoring;
		if monitoring.poll_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"poll_interval_seconds must be greater than 0".into(),
			));
		}
		if monitoring.timeout_seconds < monitoring.poll_interval_seconds {
			return Err(ConfigError::Validation(
				"Monitoring timeout_seconds must be at least poll_interval_seconds".into(),
			));
		}
		if monitoring.confirmation_threshold == 0 {
			return Err(ConfigError::Validation(
				"confirmation_threshold must be at least 1".into(),
			));
		}
		if monitoring.confirmation_threshold > 100 {
			return Err(ConfigError::Validation(
				"confirmation_threshold cannot exceed 100".into(),
			));
		}

		Ok(())
	}

	fn validate_fees(&self) -> Result<(), ConfigError> {
		let fees = &self.fees;
		if fees.platform_fee_rate.is_sign_negative() || fees.platform_fee_rate >= Decimal::ONE {
			return Err(ConfigError::Validation(format!(
				"platform_fee_rate must be in [0, 1), got {}",
				fees.platform_fee_rate
			)));
		}
		if fees.min_amount <= Decimal::ZERO {
			return Err(ConfigError::Validation(
				"min_amount must be greater than 0".into(),
			));
		}
		for (ticker, fee) in &fees.network {
			Currency::from_str(ticker).map_err(|e| ConfigError::Validation(e.to_string()))?;
			if fee.amount.is_sign_negative() {
				return Err(ConfigError::Validation(format!(
					"Network fee for {} cannot be negative",
					ticker
				)));
			}
			if fee.precision > 18 {
				return Err(ConfigError::Validation(format!(
					"Precision for {} cannot exceed 18",
					ticker
				)));
			}
		}
		Ok(())
	}
}

/// Parses a TOML string with env-var substitution and validation.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	const MINIMAL: &str = r#"
[service]
id = "swiftchain-test"

[pricing]
primary = "mock"
[pricing.implementations.mock]

[chain]
primary = "simulated"
[chain.implementations.simulated]

[storage]
primary = "memory"
cleanup_interval_seconds = 3600
[storage.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("SWIFTCHAIN_TEST_HOST", "localhost");
		std::env::set_var("SWIFTCHAIN_TEST_PORT", "8545");

		let input = "rpc_url = \"http://${SWIFTCHAIN_TEST_HOST}:${SWIFTCHAIN_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "rpc_url = \"http://localhost:8545\"");

		std::env::remove_var("SWIFTCHAIN_TEST_HOST");
		std::env::remove_var("SWIFTCHAIN_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${SWIFTCHAIN_MISSING_VAR:-fallback}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${SWIFTCHAIN_MISSING_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("SWIFTCHAIN_MISSING_VAR"));
	}

	#[test]
	fn test_defaults_are_applied() {
		let config: Config = MINIMAL.parse().unwrap();

		assert_eq!(config.fees.platform_fee_rate, dec!(0.01));
		assert_eq!(config.fees.min_amount, dec!(0.01));
		assert_eq!(config.fees.network_fee(Currency::Usdt).amount, dec!(0.50));
		assert_eq!(config.fees.network_fee(Currency::Eth).precision, 6);
		assert_eq!(config.bank.flat_fee_inr, dec!(500));
		assert_eq!(config.bank.delay_hours, 72);
		assert_eq!(config.monitoring.poll_interval_seconds, 3);
		assert_eq!(config.monitoring.timeout_seconds, 120);
		assert_eq!(config.monitoring.confirmation_threshold, 12);
		assert_eq!(config.chain.chain_id, 11_155_111);
		assert!(config.api.is_none());
	}

	#[test]
	fn test_network_fee_override() {
		let config_str = format!(
			"{}\n[fees]\nplatform_fee_rate = \"0.02\"\n[fees.network.ETH]\namount = \"0.001\"\nprecision = 8\n",
			MINIMAL
		);
		let config: Config = config_str.parse().unwrap();

		assert_eq!(config.fees.platform_fee_rate, dec!(0.02));
		let eth = config.fees.network_fee(Currency::Eth);
		assert_eq!(eth.amount, dec!(0.001));
		assert_eq!(eth.precision, 8);
		assert_eq!(config.fees.network_fee(Currency::Usdt).amount, dec!(0.50));
	}

	#[test]
	fn test_unknown_network_fee_currency_rejected() {
		let config_str = format!(
			"{}\n[fees.network.BTC]\namount = \"0.0001\"\nprecision = 8\n",
			MINIMAL
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("BTC"));
	}

	#[test]
	fn test_primary_must_exist() {
		let config_str = MINIMAL.replace("primary = \"mock\"", "primary = \"coingecko\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("Primary pricing 'coingecko'"));
	}

	#[test]
	fn test_timeout_shorter_than_interval_rejected() {
		let config_str = format!(
			"{}\n[monitoring]\npoll_interval_seconds = 10\ntimeout_seconds = 5\n",
			MINIMAL
		);
		assert!(Config::from_str(&config_str).is_err());
	}

	#[test]
	fn test_api_defaults() {
		let config_str = format!("{}\n[api]\nenabled = true\n[api.cors]\n", MINIMAL);
		let config: Config = config_str.parse().unwrap();
		let api = config.api.unwrap();
		assert_eq!(api.port, 5000);
		let cors = api.cors.unwrap();
		assert!(cors.allow_localhost);
		assert_eq!(cors.allowed_origin_suffixes, vec![".vercel.app", ".netlify.app"]);
	}
}
