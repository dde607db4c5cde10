//! HTTP handlers of the SwiftChain API and their error mapping.

pub mod convert;
pub mod crypto;
pub mod health;

use swiftchain_core::{ConversionError, LookupError};
use swiftchain_delivery::ChainError;
use swiftchain_price::PriceFeedError;
use swiftchain_types::APIError;

/// Seconds a client should wait before retrying an upstream outage.
const RETRY_AFTER_SECONDS: u64 = 30;

fn unavailable(error_type: &str, message: impl Into<String>) -> APIError {
	APIError::ServiceUnavailable {
		error_type: error_type.to_string(),
		message: message.into(),
		retry_after: Some(RETRY_AFTER_SECONDS),
	}
}

pub(crate) fn price_error(err: PriceFeedError) -> APIError {
	match err {
		PriceFeedError::Configuration(msg) | PriceFeedError::Internal(msg) => APIError::internal(msg),
		other => unavailable("RATE_UNAVAILABLE", other.to_string()),
	}
}

pub(crate) fn conversion_error(err: ConversionError) -> APIError {
	match err {
		ConversionError::InvalidAmount { .. } => APIError::bad_request("INVALID_AMOUNT", err.to_string()),
		ConversionError::UnsupportedCurrency(_) => {
			APIError::bad_request("UNSUPPORTED_CURRENCY", err.to_string())
		},
		ConversionError::RateUnavailable(_) => unavailable("RATE_UNAVAILABLE", err.to_string()),
	}
}

pub(crate) fn lookup_error(err: LookupError) -> APIError {
	match err {
		LookupError::Chain(ChainError::InvalidHash(hash)) => APIError::bad_request(
			"INVALID_HASH",
			format!("Invalid transaction hash: {}", hash),
		),
		LookupError::Chain(ChainError::NotFound(hash)) => APIError::NotFound {
			error_type: "TRANSACTION_NOT_FOUND".to_string(),
			message: format!("Transaction not found: {}", hash),
		},
		LookupError::Chain(ChainError::Configuration(msg)) => APIError::internal(msg),
		LookupError::Chain(other) => unavailable("CHAIN_UNAVAILABLE", other.to_string()),
		LookupError::History(e) => APIError::internal(e.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_error_status_codes() {
		let err = conversion_error(ConversionError::InvalidAmount {
			amount: dec!(0.001),
			min: dec!(0.01),
		});
		assert_eq!(err.status_code(), 400);

		let err = conversion_error(ConversionError::RateUnavailable("down".into()));
		assert_eq!(err.status_code(), 503);
		assert_eq!(err.to_error_response().retry_after, Some(30));

		let err = lookup_error(LookupError::Chain(ChainError::NotFound("0xabc".into())));
		assert_eq!(err.status_code(), 404);

		let err = lookup_error(LookupError::Chain(ChainError::Rpc {
			code: -32000,
			message: "header not found".into(),
		}));
		assert_eq!(err.status_code(), 503);
	}
}
