//! Builder pattern for constructing the SwiftChain engine.
//!
//! Each pluggable component is created from its `implementations` table by a
//! factory looked up by name. Only the configured primary is required to load.

use crate::comparison::FeeComparisonEngine;
use crate::conversion::ConversionEngine;
use crate::engine::SwiftChainEngine;
use crate::history::TransactionHistory;
use crate::monitoring::{PollerConfig, StatusPoller};
use std::collections::HashMap;
use std::sync::Arc;
use swiftchain_config::Config;
use swiftchain_delivery::{ChainError, ChainInterface, ChainService};
use swiftchain_price::{PriceFeedError, PriceFeedInterface, PriceFeedService};
use swiftchain_storage::{StorageError, StorageInterface, StorageService};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions for every pluggable component, keyed by name.
pub struct SwiftChainFactories<SF, PF, CF> {
	pub storage_factories: HashMap<String, SF>,
	pub price_factories: HashMap<String, PF>,
	pub chain_factories: HashMap<String, CF>,
}

pub struct SwiftChainBuilder {
	config: Config,
	chain_override: Option<Arc<dyn ChainInterface>>,
}

impl SwiftChainBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			chain_override: None,
		}
	}

	/// Uses `chain` instead of building one from configuration.
	///
	/// Lets a simulated wallet and the status poller share one network.
	pub fn with_chain(mut self, chain: Arc<dyn ChainInterface>) -> Self {
		self.chain_override = Some(chain);
		self
	}

	pub async fn build<SF, PF, CF>(
		self,
		factories: SwiftChainFactories<SF, PF, CF>,
	) -> Result<SwiftChainEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		PF: Fn(&toml::Value) -> Result<Box<dyn PriceFeedInterface>, PriceFeedError>,
		CF: Fn(&toml::Value) -> Result<Box<dyn ChainInterface>, ChainError>,
	{
		let config = self.config;

		let mut storage_impls = load_all(
			"storage",
			&config.storage.primary,
			&config.storage.implementations,
			&factories.storage_factories,
		)?;
		let storage_backend = storage_impls
			.remove(&config.storage.primary)
			.ok_or_else(|| missing_primary("storage", &config.storage.primary))?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let price_impls: HashMap<String, Arc<dyn PriceFeedInterface>> = load_all(
			"pricing",
			&config.pricing.primary,
			&config.pricing.implementations,
			&factories.price_factories,
		)?
		.into_iter()
		.map(|(name, implementation)| (name, Arc::from(implementation)))
		.collect();
		let price = Arc::new(
			PriceFeedService::new(price_impls, config.pricing.primary.clone())
				.map_err(|e| BuilderError::Config(e.to_string()))?,
		);

		let chain_impl: Arc<dyn ChainInterface> = match self.chain_override {
			Some(chain) => {
				tracing::info!(component = "chain", implementation = "external", "Loaded");
				chain
			},
			None => {
				let mut chain_impls = load_all(
					"chain",
					&config.chain.primary,
					&config.chain.implementations,
					&factories.chain_factories,
				)?;
				Arc::from(
					chain_impls
						.remove(&config.chain.primary)
						.ok_or_else(|| missing_primary("chain", &config.chain.primary))?,
				)
			},
		};
		let chain = ChainService::new(chain_impl, config.chain.chain_id);

		let conversion = Arc::new(ConversionEngine::new(price.clone(), config.fees.clone()));
		let comparison = Arc::new(FeeComparisonEngine::new(
			conversion.clone(),
			config.bank.clone(),
		));
		let history = Arc::new(TransactionHistory::new(storage.clone()));
		let poller = Arc::new(StatusPoller::new(
			chain.clone(),
			history.clone(),
			PollerConfig::from(&config.monitoring),
		));

		Ok(SwiftChainEngine {
			config,
			storage,
			price,
			conversion,
			comparison,
			chain,
			history,
			poller,
		})
	}
}

fn missing_primary(component: &str, primary: &str) -> BuilderError {
	BuilderError::MissingComponent(format!(
		"Primary {} '{}' failed to load or has invalid configuration",
		component, primary
	))
}

/// Runs the factory of every configured implementation that has one.
fn load_all<T: ?Sized, E: std::fmt::Display, F>(
	component: &'static str,
	primary: &str,
	configs: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<HashMap<String, Box<T>>, BuilderError>
where
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let mut loaded = HashMap::new();
	for (name, config) in configs {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered, skipping");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				loaded.insert(name.clone(), implementation);
				let is_primary = primary == name;
				tracing::info!(component, implementation = %name, enabled = %is_primary, "Loaded");
			},
			Err(e) => {
				tracing::error!(
					component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	if loaded.is_empty() {
		return Err(BuilderError::Config(format!(
			"No valid {} implementations available",
			component
		)));
	}
	Ok(loaded)
}
