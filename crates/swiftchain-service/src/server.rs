//! HTTP server for the SwiftChain API.
//!
//! Routes live under `/api`. Anything else gets a JSON 404.

use crate::apis::{convert, crypto, health};
use axum::{
	extract::DefaultBodyLimit,
	http::{request::Parts, HeaderName, HeaderValue, Method, StatusCode},
	response::{IntoResponse, Json},
	routing::{get, post},
	Router,
};
use std::sync::Arc;
use std::time::Duration;
use swiftchain_config::{ApiConfig, CorsConfig};
use swiftchain_core::SwiftChainEngine;
use swiftchain_types::ErrorResponse;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<SwiftChainEngine>,
}

/// Builds the router with all routes and middleware.
pub fn router(engine: Arc<SwiftChainEngine>, api_config: &ApiConfig) -> Router {
	let api = Router::new()
		.route("/convert/rates", get(convert::get_rates))
		.route("/convert", post(convert::convert))
		.route("/convert/fee-comparison", get(convert::fee_comparison))
		.route("/crypto/transaction/{hash}", get(crypto::get_transaction))
		.route("/crypto/withdraw", post(crypto::withdraw))
		.route("/health", get(health::health));

	Router::new()
		.nest("/api", api)
		.fallback(handle_not_found)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(timeout_layer(api_config.timeout_seconds))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { engine })
}

/// Starts the HTTP server and runs until Ctrl+C.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<SwiftChainEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("SwiftChain API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!("Failed to listen for shutdown signal: {}", e);
			}
		})
		.await?;

	Ok(())
}

async fn handle_not_found() -> impl IntoResponse {
	(
		StatusCode::NOT_FOUND,
		Json(ErrorResponse {
			error: "Route not found".to_string(),
			message: "The requested endpoint does not exist".to_string(),
			details: None,
			retry_after: None,
		}),
	)
}

/// Requests running longer than `seconds` are answered with 408.
fn timeout_layer(seconds: u64) -> TimeoutLayer {
	TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(seconds))
}

fn cors_layer(config: Option<&CorsConfig>) -> CorsLayer {
	let Some(config) = config else {
		return CorsLayer::permissive();
	};

	let methods: Vec<Method> = config
		.allowed_methods
		.iter()
		.filter_map(|m| m.parse().ok())
		.collect();
	let headers: Vec<HeaderName> = config
		.allowed_headers
		.iter()
		.filter_map(|h| h.parse().ok())
		.collect();

	let rules = config.clone();
	CorsLayer::new()
		.allow_origin(AllowOrigin::predicate(
			move |origin: &HeaderValue, _: &Parts| {
				origin
					.to_str()
					.is_ok_and(|origin| origin_allowed(&rules, origin))
			},
		))
		.allow_methods(methods)
		.allow_headers(headers)
		.allow_credentials(true)
}

/// Whether a browser origin may call the API.
fn origin_allowed(config: &CorsConfig, origin: &str) -> bool {
	if config.allowed_origins.iter().any(|o| o == origin) {
		return true;
	}

	let Some(rest) = origin
		.strip_prefix("https://")
		.or_else(|| origin.strip_prefix("http://"))
	else {
		return false;
	};
	let host = rest.split(['/', ':']).next().unwrap_or_default();

	if config.allow_localhost && host == "localhost" {
		return true;
	}
	config
		.allowed_origin_suffixes
		.iter()
		.any(|suffix| host.ends_with(suffix.as_str()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory_registry::build_engine_from_config;
	use axum::body::Body;
	use axum::http::Request;
	use rust_decimal_macros::dec;
	use serde_json::Value;
	use swiftchain_config::Config;
	use swiftchain_delivery::implementations::simulated::SimulatedNetwork;
	use swiftchain_delivery::ChainInterface;
	use swiftchain_types::Currency;
	use tower::ServiceExt;

	const CONFIG: &str = r#"
[service]
id = "swiftchain-test"

[pricing]
primary = "mock"
[pricing.implementations.mock]

[chain]
primary = "simulated"
[chain.implementations.simulated]

[storage]
primary = "memory"
cleanup_interval_seconds = 60
[storage.implementations.memory]

[api]
enabled = true

[api.cors]
allowed_origins = ["https://swiftchain.example"]
"#;

	async fn app() -> (Router, Arc<SimulatedNetwork>) {
		let config: Config = CONFIG.parse().unwrap();
		let network = Arc::new(SimulatedNetwork::new(11_155_111, 1));
		let api_config = config.api.clone().unwrap();
		let chain: Arc<dyn ChainInterface> = network.clone();
		let engine = build_engine_from_config(config, Some(chain))
			.await
			.unwrap();
		(router(Arc::new(engine), &api_config), network)
	}

	async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
		let response = app.oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
	}

	fn get_request(uri: &str) -> Request<Body> {
		Request::builder().uri(uri).body(Body::empty()).unwrap()
	}

	fn post_json(uri: &str, body: &str) -> Request<Body> {
		Request::builder()
			.method("POST")
			.uri(uri)
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap()
	}

	#[tokio::test]
	async fn test_health() {
		let (app, _) = app().await;
		let (status, body) = send(app, get_request("/api/health")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "OK");
		assert_eq!(body["message"], "SwiftChain API is running");
	}

	#[tokio::test]
	async fn test_convert() {
		let (app, _) = app().await;
		let (status, body) = send(
			app,
			post_json("/api/convert", r#"{"amount": 10000, "currency": "usdt"}"#),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["convertedAmount"], "118.06");
		assert_eq!(body["fees"]["totalFee"], "141.75");
		assert_eq!(body["currency"], "USDT");
	}

	#[tokio::test]
	async fn test_convert_rejects_bad_input() {
		let (app, _) = app().await;
		let (status, body) = send(
			app.clone(),
			post_json("/api/convert", r#"{"amount": 100, "currency": "BTC"}"#),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "UNSUPPORTED_CURRENCY");

		let (status, body) = send(
			app.clone(),
			post_json("/api/convert", r#"{"amount": "0.009999", "currency": "ETH"}"#),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_AMOUNT");

		let (status, body) = send(app, post_json("/api/convert", "not json")).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");
	}

	#[tokio::test]
	async fn test_rates_and_fee_comparison() {
		let (app, _) = app().await;
		let (status, body) = send(app.clone(), get_request("/api/convert/rates")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["rates"]["tether"]["inr"], "83.50");

		let (status, body) = send(app.clone(), get_request("/api/convert/fee-comparison")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["traditionalBankCost"], "800.00");
		assert_eq!(body["savings"], "658.25");
		assert_eq!(body["savingsPercentage"], "82.28");

		let (status, body) = send(app, get_request("/api/convert/fee-comparison?amount=5000")).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["traditionalBankCost"], "650.00");
	}

	#[tokio::test]
	async fn test_transaction_lookup() {
		let (app, network) = app().await;
		let from = "0x1111111111111111111111111111111111111111";
		let to = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
		network.fund(from, Currency::Usdt, dec!(200)).await;
		let hash = network.submit(from, to, dec!(118.06), Currency::Usdt).await.unwrap();

		let (status, body) = send(
			app.clone(),
			get_request(&format!("/api/crypto/transaction/{}", hash)),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["transaction"]["hash"], hash.as_str());
		assert_eq!(body["transaction"]["status"], "pending");
		assert_eq!(body["transaction"]["confirmations"], 1);

		let (status, body) = send(app.clone(), get_request("/api/crypto/transaction/0x1234")).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_HASH");

		let unknown = format!("/api/crypto/transaction/0x{}", "ab".repeat(32));
		let (status, body) = send(app, get_request(&unknown)).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "TRANSACTION_NOT_FOUND");
	}

	#[tokio::test]
	async fn test_withdraw() {
		let (app, _) = app().await;
		let body = r#"{
			"amount": 5000,
			"bankDetails": {
				"accountNumber": "123456789012",
				"ifscCode": "HDFC0001234",
				"accountHolder": "A. Kumar"
			}
		}"#;
		let (status, receipt) = send(app.clone(), post_json("/api/crypto/withdraw", body)).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(receipt["status"], "processing");
		assert_eq!(receipt["account"], "********9012");
		assert!(receipt["withdrawalId"].as_str().unwrap().starts_with("WD-"));

		let bad = body.replace("HDFC0001234", "HDFC001234");
		let (status, err) = send(app, post_json("/api/crypto/withdraw", &bad)).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(err["error"], "INVALID_BANK_DETAILS");
	}

	#[tokio::test]
	async fn test_unknown_route() {
		let (app, _) = app().await;
		let (status, body) = send(app, get_request("/api/does-not-exist")).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "Route not found");
	}

	#[tokio::test(start_paused = true)]
	async fn test_slow_requests_time_out() {
		let app = Router::new()
			.route(
				"/slow",
				get(|| async {
					tokio::time::sleep(Duration::from_secs(30)).await;
					"done"
				}),
			)
			.route("/fast", get(|| async { "done" }))
			.layer(timeout_layer(5));

		let response = app.clone().oneshot(get_request("/slow")).await.unwrap();
		assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

		let response = app.oneshot(get_request("/fast")).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[test]
	fn test_origin_rules() {
		let config: CorsConfig =
			toml::from_str(r#"allowed_origins = ["https://swiftchain.example"]"#).unwrap();

		assert!(origin_allowed(&config, "https://swiftchain.example"));
		assert!(origin_allowed(&config, "http://localhost:3000"));
		assert!(origin_allowed(&config, "https://preview-42.vercel.app"));
		assert!(origin_allowed(&config, "https://swiftchain.netlify.app"));
		assert!(!origin_allowed(&config, "https://evil.example"));
		assert!(!origin_allowed(&config, "https://vercel.app.evil.example"));
		assert!(!origin_allowed(&config, "localhost:3000"));

		let strict = CorsConfig {
			allow_localhost: false,
			..config
		};
		assert!(!origin_allowed(&strict, "http://localhost:3000"));
	}
}
