#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime, macros};
// self
use oauth2_pipeline::{
	auth::{AccessToken, TokenState},
	client::ReqwestApiClient,
	clock::ManualClock,
	config::ClientConfig,
	error::{Error, TransientError, TransportError},
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	request::RequestOptions,
	reqwest::Client,
};

const START: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

fn config(server: &MockServer) -> ClientConfig {
	ClientConfig::new("client-live", "secret-live", "https://example.com/callback", "refresh-live")
		.with_user_agent("tap-outreach <ops@example.com>")
		.with_base_url(server.url("/api/v2/"))
		.with_token_url(server.url("/oauth/token"))
}

fn build_client(config: &ClientConfig, clock: &ManualClock) -> ReqwestApiClient {
	ReqwestApiClient::with_http_client(
		config,
		Arc::new(clock.clone()),
		test_reqwest_http_client(),
		ReqwestTransportErrorMapper,
	)
	.expect("Client should build from the mock server configuration.")
}

#[tokio::test]
async fn refresh_and_fetch_over_http() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"live-access\",\"token_type\":\"bearer\",\"expires_in\":7200}");
		})
		.await;
	let resource_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/prospects")
				.header("authorization", "Bearer live-access")
				.header("user-agent", "tap-outreach <ops@example.com>");
			then.status(200)
				.header("content-type", "application/vnd.api+json")
				.body("{\"data\":[{\"id\":1,\"type\":\"prospect\"}]}");
		})
		.await;
	let client = build_client(&config(&server), &clock);
	let body: serde_json::Value = client
		.get("/prospects", RequestOptions::default())
		.await
		.expect("Refresh and fetch should succeed against the mock server.");

	assert_eq!(body["data"][0]["type"], "prospect");

	token_mock.assert_async().await;
	resource_mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_exhaust_the_budget_over_http() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/sequences");
			then.status(503).body("maintenance");
		})
		.await;
	let token = AccessToken::new("seeded", START + Duration::hours(1));
	let client = build_client(&config(&server), &clock)
		.with_token_state(TokenState::with_token(token));
	let err = client
		.get::<serde_json::Value>("sequences", RequestOptions::default())
		.await
		.expect_err("Persistent 503 responses should surface.");

	assert!(matches!(err, Error::Transient(TransientError::Server { status: 503, .. })));
	assert_eq!(clock.total_slept(), Duration::seconds(1 + 3 + 9 + 27));

	mock.assert_calls_async(5).await;
}

#[tokio::test]
async fn refused_connections_are_retried_as_transport_errors() {
	let clock = ManualClock::new(START);
	let config = ClientConfig::new("client", "secret", "https://example.com/callback", "refresh")
		.with_base_url("http://127.0.0.1:9/api/v2/")
		.with_token_url("http://127.0.0.1:9/oauth/token");
	let token = AccessToken::new("seeded", START + Duration::hours(1));
	let err = build_client(&config, &clock)
		.with_token_state(TokenState::with_token(token))
		.get::<serde_json::Value>("prospects", RequestOptions::default())
		.await
		.expect_err("Unreachable hosts should surface after retries.");

	assert!(matches!(err, Error::Transport(TransportError::Network { .. } | TransportError::Timeout { .. })));
	assert_eq!(clock.sleeps().len(), 4);
}
