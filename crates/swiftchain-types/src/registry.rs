//! Registry trait for self-registering implementations.
//!
//! Price feeds, chain adapters and storage backends are chosen by name from
//! the configuration. Each implementation module exposes a `Registry` type
//! that ties that name to its factory.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// Key of the implementation in the TOML configuration, for example
	/// `"coingecko"` for `pricing.implementations.coingecko` or `"file"` for
	/// `storage.implementations.file`.
	const NAME: &'static str;

	/// Factory function type of the owning module (`PriceFeedFactory`,
	/// `StorageFactory`, `ChainFactory`).
	type Factory;

	/// Returns the factory that builds this implementation from its config table.
	fn factory() -> Self::Factory;
}
