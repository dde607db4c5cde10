//! Common types module for the SwiftChain system.
//!
//! This module defines the core data types shared by every SwiftChain crate:
//! currencies, conversion results, fee breakdowns, transfer records, API
//! request/response shapes and configuration validation helpers.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Conversion and fee comparison value objects.
pub mod conversion;
/// Supported target currencies.
pub mod currency;
/// Chain observation types reported by delivery implementations.
pub mod delivery;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// Transfer records and their status lifecycle.
pub mod transfer;
/// Utility functions for formatting and address handling.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use conversion::*;
pub use currency::*;
pub use delivery::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use transfer::*;
pub use utils::{current_timestamp, is_valid_evm_address, truncate_id, without_0x_prefix};
pub use validation::*;
