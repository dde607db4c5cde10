//! Price and conversion endpoints.

use crate::apis::{conversion_error, price_error};
use crate::server::AppState;
use axum::{
	extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
	Json,
};
use rust_decimal::Decimal;
use swiftchain_types::{
	APIError, ConversionRequest, ConversionResult, ConvertRequestBody, FeeComparison,
	FeeComparisonQuery, SpotRates,
};

/// Amount compared when the query does not name one.
const DEFAULT_COMPARISON_AMOUNT: i64 = 10_000;

/// Handles GET /api/convert/rates.
pub async fn get_rates(State(state): State<AppState>) -> Result<Json<SpotRates>, APIError> {
	match state.engine.price().get_spot_rates().await {
		Ok(rates) => Ok(Json(rates)),
		Err(e) => {
			tracing::warn!("Rate request failed: {}", e);
			Err(price_error(e))
		},
	}
}

/// Handles POST /api/convert.
pub async fn convert(
	State(state): State<AppState>,
	body: Result<Json<ConvertRequestBody>, JsonRejection>,
) -> Result<Json<ConversionResult>, APIError> {
	let Json(body) =
		body.map_err(|e| APIError::bad_request("INVALID_REQUEST", e.body_text()))?;
	let request = ConversionRequest::try_from(body)
		.map_err(|e| APIError::bad_request("UNSUPPORTED_CURRENCY", e.to_string()))?;

	match state
		.engine
		.conversion()
		.convert(request.amount, request.currency)
		.await
	{
		Ok(result) => Ok(Json(result)),
		Err(e) => {
			tracing::warn!("Conversion failed: {}", e);
			Err(conversion_error(e))
		},
	}
}

/// Handles GET /api/convert/fee-comparison.
pub async fn fee_comparison(
	State(state): State<AppState>,
	query: Result<Query<FeeComparisonQuery>, QueryRejection>,
) -> Result<Json<FeeComparison>, APIError> {
	let Query(query) =
		query.map_err(|e| APIError::bad_request("INVALID_REQUEST", e.body_text()))?;
	let amount = query
		.amount
		.unwrap_or_else(|| Decimal::from(DEFAULT_COMPARISON_AMOUNT));

	match state.engine.comparison().compare(amount).await {
		Ok(comparison) => Ok(Json(comparison)),
		Err(e) => {
			tracing::warn!("Fee comparison failed: {}", e);
			Err(conversion_error(e))
		},
	}
}
