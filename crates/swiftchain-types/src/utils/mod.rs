//! Utility functions for formatting and address checks.

pub mod formatting;
pub mod helpers;

pub use formatting::{is_valid_evm_address, truncate_id, without_0x_prefix};
pub use helpers::current_timestamp;
