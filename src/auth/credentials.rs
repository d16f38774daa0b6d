//! Immutable OAuth client credentials used for the refresh-token grant.

// crates.io
use oauth2::{ClientId, ClientSecret, RedirectUrl, RefreshToken};
// self
use crate::{_prelude::*, error::ConfigError};

/// Grant type sent with every token exchange.
pub const REFRESH_GRANT_TYPE: &str = "refresh_token";

/// Client identity plus the long-lived refresh token exchanged for access tokens.
///
/// Values are fixed for the lifetime of the client. `Debug` output redacts both secrets.
#[derive(Clone)]
pub struct Credentials {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// OAuth client secret.
	pub client_secret: ClientSecret,
	/// Redirect URI registered for the client.
	pub redirect_uri: RedirectUrl,
	/// Long-lived refresh token.
	pub refresh_token: RefreshToken,
}
impl Credentials {
	/// Builds credentials, validating the redirect URI.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let redirect_uri = RedirectUrl::new(redirect_uri.into())
			.map_err(|source| ConfigError::InvalidUrl { field: "redirect_uri", source })?;

		Ok(Self {
			client_id: ClientId::new(client_id.into()),
			client_secret: ClientSecret::new(client_secret.into()),
			redirect_uri,
			refresh_token: RefreshToken::new(refresh_token.into()),
		})
	}

	/// Form fields posted to the token endpoint.
	pub fn refresh_form(&self) -> [(&'static str, &str); 5] {
		[
			("client_id", self.client_id.as_str()),
			("client_secret", self.client_secret.secret().as_str()),
			("redirect_uri", self.redirect_uri.as_str()),
			("refresh_token", self.refresh_token.secret().as_str()),
			("grant_type", REFRESH_GRANT_TYPE),
		]
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id.as_str())
			.field("client_secret", &"<redacted>")
			.field("redirect_uri", &self.redirect_uri.as_str())
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}
