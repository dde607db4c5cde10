//! Liveness check.

use axum::Json;
use swiftchain_types::HealthResponse;

/// Handles GET /api/health.
pub async fn health() -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "OK".to_string(),
		message: "SwiftChain API is running".to_string(),
		timestamp: chrono::Utc::now(),
	})
}
