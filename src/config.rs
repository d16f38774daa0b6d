//! Client configuration surface and endpoint resolution.
//!
//! [`ClientConfig`] mirrors the option bag a host application hands to the client: OAuth
//! credentials, an optional user agent, an optional quota threshold, and optional endpoint
//! overrides. Loading it (files, environment) is the host's job; this module only decodes and
//! validates it.

// self
use crate::{
	_prelude::*, auth::Credentials, error::ConfigError, throttle::QuotaLimit,
};

/// Default resource API prefix.
pub const DEFAULT_BASE_URL: &str = "https://api.outreach.io/api/v2/";
/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.outreach.io/oauth/token";

/// Recognized client options.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
	/// Optional `User-Agent` header value.
	#[serde(default)]
	pub user_agent: Option<String>,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: String,
	/// Redirect URI registered for the client.
	pub redirect_uri: String,
	/// Long-lived refresh token.
	pub refresh_token: String,
	/// Optional fraction of the quota window that may be consumed before pausing.
	#[serde(default)]
	pub quota_limit: Option<QuotaLimit>,
	/// Override for [`DEFAULT_BASE_URL`].
	#[serde(default)]
	pub base_url: Option<String>,
	/// Override for [`DEFAULT_TOKEN_URL`].
	#[serde(default)]
	pub token_url: Option<String>,
}
impl ClientConfig {
	/// Creates a configuration with the required credentials and default endpoints.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Self {
		Self {
			user_agent: None,
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			redirect_uri: redirect_uri.into(),
			refresh_token: refresh_token.into(),
			quota_limit: None,
			base_url: None,
			token_url: None,
		}
	}

	/// Decodes a JSON configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(de).map_err(|source| ConfigError::Parse { source })
	}

	/// Decodes an already-parsed JSON configuration value.
	pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
		serde_path_to_error::deserialize(value).map_err(|source| ConfigError::Parse { source })
	}

	/// Sets the `User-Agent` header value.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// Enables the quota throttle.
	pub fn with_quota_limit(mut self, limit: QuotaLimit) -> Self {
		self.quota_limit = Some(limit);

		self
	}

	/// Overrides the resource base URL.
	pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = Some(url.into());

		self
	}

	/// Overrides the token endpoint URL.
	pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
		self.token_url = Some(url.into());

		self
	}

	/// Checks every field that [`ApiClient`](crate::client::ApiClient) will derive from this
	/// configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.credentials()?;
		self.endpoints()?;
		self.user_agent_header()?;

		Ok(())
	}

	/// Builds validated credentials.
	pub fn credentials(&self) -> Result<Credentials, ConfigError> {
		Credentials::new(
			self.client_id.as_str(),
			self.client_secret.as_str(),
			self.redirect_uri.as_str(),
			self.refresh_token.as_str(),
		)
	}

	/// Builds validated endpoints, applying overrides.
	pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
		Endpoints::parse(
			self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
			self.token_url.as_deref().unwrap_or(DEFAULT_TOKEN_URL),
		)
	}

	/// Validates the user agent as a header value.
	pub fn user_agent_header(&self) -> Result<Option<HeaderValue>, ConfigError> {
		self.user_agent
			.as_deref()
			.map(|value| {
				HeaderValue::from_str(value)
					.map_err(|source| ConfigError::InvalidHeader { header: "user-agent", source })
			})
			.transpose()
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("user_agent", &self.user_agent)
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_uri", &self.redirect_uri)
			.field("refresh_token", &"<redacted>")
			.field("quota_limit", &self.quota_limit)
			.field("base_url", &self.base_url)
			.field("token_url", &self.token_url)
			.finish()
	}
}

/// Resource base URL and token endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	/// Prefix joined with request paths.
	pub base: Url,
	/// Token endpoint used for refreshes.
	pub token: Url,
}
impl Endpoints {
	/// Validates and wraps the provided URLs.
	pub fn new(base: Url, token: Url) -> Result<Self, ConfigError> {
		if base.cannot_be_a_base()
			|| !base.path().ends_with('/')
			|| base.query().is_some()
			|| base.fragment().is_some()
		{
			return Err(ConfigError::InvalidBaseUrl { url: base.to_string() });
		}

		Ok(Self { base, token })
	}

	/// Parses and validates both URLs.
	pub fn parse(base: &str, token: &str) -> Result<Self, ConfigError> {
		let base =
			Url::parse(base).map_err(|source| ConfigError::InvalidUrl { field: "base_url", source })?;
		let token = Url::parse(token)
			.map_err(|source| ConfigError::InvalidUrl { field: "token_url", source })?;

		Self::new(base, token)
	}

	/// Appends `path` to the base URL; a leading `/` on the path is ignored.
	///
	/// The result always stays on the base host, even when the first segment contains a colon.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let raw = format!("{}{}", self.base, path.trim_start_matches('/'));

		Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { field: "path", source })
	}
}
