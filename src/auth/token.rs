//! Access token records and the state cell owned by the token manager.

pub mod secret;

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret, error::ConfigError};

/// Safety margin subtracted from the provider-declared lifetime to absorb clock drift.
pub const EXPIRY_MARGIN: Duration = Duration::seconds(10);

/// Token endpoint response body.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Declared lifetime in seconds.
	pub expires_in: i64,
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Access token paired with the instant after which it must not be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
	secret: TokenSecret,
	expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token with an explicit expiry instant.
	pub fn new(secret: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { secret: TokenSecret::new(secret), expires_at }
	}

	/// Builds a token from a grant received at `refreshed_at`.
	///
	/// The expiry is `refreshed_at + expires_in - EXPIRY_MARGIN`.
	pub fn from_grant(grant: TokenGrant, refreshed_at: OffsetDateTime) -> Result<Self> {
		if grant.expires_in <= 0 {
			return Err(ConfigError::NonPositiveExpiresIn { expires_in: grant.expires_in }.into());
		}

		let lifetime = Duration::seconds(grant.expires_in);

		Ok(Self { secret: grant.access_token, expires_at: refreshed_at + lifetime - EXPIRY_MARGIN })
	}

	/// Bearer secret.
	pub fn secret(&self) -> &TokenSecret {
		&self.secret
	}

	/// Instant at which the token stops being usable.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Returns `true` while `instant` is strictly before the expiry.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}

/// Current token held by the manager, if any.
#[derive(Clone, Debug, Default)]
pub struct TokenState {
	current: Option<AccessToken>,
}
impl TokenState {
	/// Seeds the state with an existing token.
	pub fn with_token(token: AccessToken) -> Self {
		Self { current: Some(token) }
	}

	/// Returns the held token, if any.
	pub fn current(&self) -> Option<&AccessToken> {
		self.current.as_ref()
	}

	/// Returns the held token only when it is still valid at `instant`.
	pub fn valid_at(&self, instant: OffsetDateTime) -> Option<&AccessToken> {
		self.current.as_ref().filter(|token| token.is_valid_at(instant))
	}

	/// A refresh is due when no token is held or the held one has expired.
	pub fn needs_refresh(&self, instant: OffsetDateTime) -> bool {
		self.valid_at(instant).is_none()
	}

	pub(in crate::auth) fn replace(&mut self, token: AccessToken) {
		self.current = Some(token);
	}
}
