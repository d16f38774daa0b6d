//! Bearer credential presented on resource calls.

// crates.io
use serde::{Deserializer, de::Error as _};
// self
use crate::{_prelude::*, error::ConfigError};

/// Access token value.
///
/// Formatting never reveals the value, and [`authorization`](Self::authorization) is the only way
/// it reaches the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a token value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token value; never log it.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Builds the `Authorization: Bearer` header value, flagged sensitive so HTTP stacks keep it
	/// out of their own debug output.
	pub fn authorization(&self) -> Result<HeaderValue, ConfigError> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))
			.map_err(|source| ConfigError::InvalidHeader { header: "authorization", source })?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl<'de> Deserialize<'de> for TokenSecret {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;

		if value.trim().is_empty() {
			return Err(D::Error::custom("access token must not be empty"));
		}

		Ok(Self(value))
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
