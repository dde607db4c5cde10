//! Transaction lookup and simulated bank withdrawal.

use crate::apis::lookup_error;
use crate::server::AppState;
use axum::{
	extract::{rejection::JsonRejection, Path, State},
	Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use swiftchain_types::{
	truncate_id, APIError, BankDetails, TransactionResponse, WithdrawalReceipt, WithdrawalRequest,
	WithdrawalStatus,
};

/// Indian Financial System Code: four bank letters, a zero, six branch characters.
static IFSC_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[A-Z]{4}0[A-Z0-9]{6}$").expect("static IFSC pattern is valid"));

const ESTIMATED_COMPLETION: &str = "1-2 business days";

/// Handles GET /api/crypto/transaction/{hash}.
pub async fn get_transaction(
	Path(hash): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<TransactionResponse>, APIError> {
	match state.engine.lookup_transaction(&hash).await {
		Ok(transaction) => Ok(Json(TransactionResponse { transaction })),
		Err(e) => {
			tracing::warn!(tx_hash = %truncate_id(&hash), "Transaction lookup failed: {}", e);
			Err(lookup_error(e))
		},
	}
}

/// Handles POST /api/crypto/withdraw.
///
/// Nothing is settled; the receipt only acknowledges a valid request.
pub async fn withdraw(
	State(state): State<AppState>,
	body: Result<Json<WithdrawalRequest>, JsonRejection>,
) -> Result<Json<WithdrawalReceipt>, APIError> {
	let Json(request) =
		body.map_err(|e| APIError::bad_request("INVALID_REQUEST", e.body_text()))?;

	let min = state.engine.config().fees.min_amount;
	if request.amount < min {
		return Err(APIError::bad_request(
			"INVALID_AMOUNT",
			format!("Amount must be at least {}", min),
		));
	}
	validate_bank_details(&request.bank_details)?;

	let receipt = WithdrawalReceipt {
		withdrawal_id: format!("WD-{}", uuid::Uuid::new_v4().simple()),
		amount: request.amount,
		status: WithdrawalStatus::Processing,
		account: mask_account(&request.bank_details.account_number),
		estimated_completion: ESTIMATED_COMPLETION.to_string(),
		timestamp: chrono::Utc::now(),
	};

	tracing::info!(
		withdrawal_id = %receipt.withdrawal_id,
		amount = %receipt.amount,
		currency = ?request.currency,
		"Accepted withdrawal request"
	);
	Ok(Json(receipt))
}

fn validate_bank_details(details: &BankDetails) -> Result<(), APIError> {
	let number = details.account_number.trim();
	if !(9..=18).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
		return Err(APIError::bad_request(
			"INVALID_BANK_DETAILS",
			"Account number must be 9 to 18 digits",
		));
	}
	if !IFSC_PATTERN.is_match(details.ifsc_code.trim()) {
		return Err(APIError::bad_request(
			"INVALID_BANK_DETAILS",
			"Invalid IFSC code",
		));
	}
	if details.account_holder.trim().is_empty() {
		return Err(APIError::bad_request(
			"INVALID_BANK_DETAILS",
			"Account holder name is required",
		));
	}
	Ok(())
}

/// Keeps the last four digits.
fn mask_account(number: &str) -> String {
	let number = number.trim();
	let visible = number.len().saturating_sub(4);
	format!("{}{}", "*".repeat(visible), &number[visible..])
}
