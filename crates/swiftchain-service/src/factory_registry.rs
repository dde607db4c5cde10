//! Factory registry for SwiftChain implementations.
//!
//! Collects every implementation the crates register and builds the engine
//! from the ones named in configuration.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use swiftchain_config::Config;
use swiftchain_core::{SwiftChainBuilder, SwiftChainEngine, SwiftChainFactories};
use swiftchain_delivery::{ChainFactory, ChainInterface};
use swiftchain_price::PriceFeedFactory;
use swiftchain_storage::StorageFactory;

/// All known implementation factories by name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub pricing: HashMap<String, PriceFeedFactory>,
	pub chain: HashMap<String, ChainFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			pricing: HashMap::new(),
			chain: HashMap::new(),
		}
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_pricing(&mut self, name: impl Into<String>, factory: PriceFeedFactory) {
		self.pricing.insert(name.into(), factory);
	}

	pub fn register_chain(&mut self, name: impl Into<String>, factory: ChainFactory) {
		self.chain.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Global registry, filled on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in swiftchain_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in swiftchain_price::get_all_implementations() {
			tracing::debug!("Registering pricing implementation: {}", name);
			registry.register_pricing(name, factory);
		}

		for (name, factory) in swiftchain_delivery::get_all_implementations() {
			tracing::debug!("Registering chain implementation: {}", name);
			registry.register_chain(name, factory);
		}

		registry
	})
}

/// Picks the factory of every configured implementation, failing on unknown names.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Builds the engine from configuration.
///
/// `chain` replaces the configured chain source when given.
pub async fn build_engine_from_config(
	config: Config,
	chain: Option<Arc<dyn ChainInterface>>,
) -> Result<SwiftChainEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let price_factories =
		build_factories!(registry, config.pricing.implementations, pricing, "pricing");
	let chain_factories = build_factories!(registry, config.chain.implementations, chain, "chain");

	let mut builder = SwiftChainBuilder::new(config);
	if let Some(chain) = chain {
		builder = builder.with_chain(chain);
	}

	let factories = SwiftChainFactories {
		storage_factories,
		price_factories,
		chain_factories,
	};

	Ok(builder.build(factories).await?)
}
