//! API types for the SwiftChain HTTP API.
//!
//! This module defines the request and response types for the `/api`
//! endpoints consumed by the browser client, plus the structured error type
//! every handler returns.

use crate::{ConversionRequest, Currency, TransferRecord, UnsupportedCurrency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/convert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertRequestBody {
	/// INR amount. Accepts a JSON number or a decimal string.
	pub amount: Decimal,
	/// Target currency code, case-insensitive.
	pub currency: String,
}

impl TryFrom<ConvertRequestBody> for ConversionRequest {
	type Error = UnsupportedCurrency;

	fn try_from(body: ConvertRequestBody) -> Result<Self, Self::Error> {
		Ok(Self {
			amount: body.amount,
			currency: body.currency.parse()?,
		})
	}
}

/// Query of `GET /api/convert/fee-comparison`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeComparisonQuery {
	pub amount: Option<Decimal>,
}

/// Response of `GET /api/crypto/transaction/{hash}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
	pub transaction: TransferRecord,
}

/// Bank account that receives a withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
	pub account_number: String,
	pub ifsc_code: String,
	pub account_holder: String,
}

/// Body of `POST /api/crypto/withdraw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
	pub amount: Decimal,
	pub bank_details: BankDetails,
	#[serde(default)]
	pub currency: Option<Currency>,
}

/// Processing state of a simulated withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
	Processing,
}

/// Acknowledgement of a simulated bank withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalReceipt {
	pub withdrawal_id: String,
	pub amount: Decimal,
	pub status: WithdrawalStatus,
	/// Masked account number, only the last four digits are kept.
	pub account: String,
	pub estimated_completion: String,
	pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	pub message: String,
	pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request with validation errors (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Resource not found (404)
	NotFound { error_type: String, message: String },
	/// Upstream price or chain source unavailable (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn bad_request(error_type: impl Into<String>, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.into(),
			message: message.into(),
			details: None,
		}
	}

	pub fn internal(message: impl Into<String>) -> Self {
		APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message: message.into(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::ServiceUnavailable { .. } => 503,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
				retry_after: None,
			},
			APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: None,
			},
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
				retry_after: *retry_after,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::ServiceUnavailable { message, .. } => {
				write!(f, "Service Unavailable: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		(status, Json(self.to_error_response())).into_response()
	}
}
