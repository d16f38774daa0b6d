//! Demonstrates the request pipeline against a local mock API: the first call refreshes the
//! access token and the quota headers on the response trigger a short proactive pause.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::OffsetDateTime;
// self
use oauth2_pipeline::{
	client::ReqwestApiClient, config::ClientConfig, request::RequestOptions,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":7200}");
		})
		.await;
	let reset = OffsetDateTime::now_utc().unix_timestamp() - 8;
	let prospects_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/prospects").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/vnd.api+json")
				.header("x-ratelimit-remaining", "5")
				.header("x-ratelimit-limit", "100")
				.header("x-ratelimit-reset", reset.to_string())
				.body("{\"data\":[{\"id\":1,\"type\":\"prospect\",\"attributes\":{\"firstName\":\"Ada\"}}]}");
		})
		.await;
	let config = ClientConfig::from_json_value(serde_json::json!({
		"user_agent": "oauth2-pipeline-demo <ops@example.com>",
		"client_id": "demo-client",
		"client_secret": "demo-secret",
		"redirect_uri": "https://example.com/callback",
		"refresh_token": "demo-refresh",
		"quota_limit": "0.9",
		"base_url": server.url("/api/v2/"),
		"token_url": server.url("/oauth/token")
	}))?;

	config.validate()?;

	let client = ReqwestApiClient::new(&config)?;
	let body: serde_json::Value =
		client.get("prospects", RequestOptions::default().with_query("page[size]", "1")).await?;

	println!("First prospect: {}.", body["data"][0]["attributes"]["firstName"]);

	token_mock.assert_async().await;
	prospects_mock.assert_async().await;

	Ok(())
}
