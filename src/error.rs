//! Pipeline-level error types shared across the classifier, retry controller, and facade.

// self
use crate::{_prelude::*, classify::ErrorDocument};

/// Pipeline-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical pipeline error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retried with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Server rejected the payload as semantically invalid (HTTP 422).
	#[error("Request was rejected as invalid: {detail}.")]
	Validation {
		/// HTTP status code returned by the server.
		status: u16,
		/// Structured error document describing the rejected field.
		detail: ErrorDocument,
	},
	/// Any other client-side HTTP failure (4xx other than 422/429).
	#[error("Server returned HTTP {status}: {body}.")]
	Http {
		/// HTTP status code returned by the server.
		status: u16,
		/// Raw response body kept for diagnostics.
		body: String,
	},
	/// Access token could not be obtained, so the request cannot be authenticated.
	#[error("Access token refresh failed.")]
	Authentication {
		/// Classified failure raised by the token endpoint exchange.
		#[source]
		source: Box<Error>,
	},
	/// Successful response body could not be decoded.
	#[error("Response body (HTTP {status}) could not be decoded.")]
	Decode {
		/// HTTP status code of the decoded response.
		status: u16,
		/// Structured decoding failure with the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The caller cancelled the request before it completed.
	#[error("Request was cancelled.")]
	Cancelled,
}
impl Error {
	/// Wraps a token endpoint failure as an authentication error.
	pub fn authentication(source: Error) -> Self {
		Self::Authentication { source: Box::new(source) }
	}

	/// Returns `true` for failures the retry controller may attempt again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_))
	}

	/// Server-declared wait that must elapse before the next attempt, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Transient(TransientError::RateLimited { retry_after, .. }) => *retry_after,
			_ => None,
		}
	}

	/// HTTP status code carried by the failure, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Transient(TransientError::Server { status, .. }) => Some(*status),
			Self::Transient(TransientError::RateLimited { .. }) =>
				Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
			Self::Validation { status, .. }
			| Self::Http { status, .. }
			| Self::Decode { status, .. } => Some(*status),
			Self::Authentication { source } => source.status(),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the pipeline.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Configuration document could not be decoded.
	#[error("Configuration is invalid.")]
	Parse {
		/// Structured decoding failure naming the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Configuration field holding the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The base URL cannot be used as a prefix for request paths.
	#[error("The base URL must be hierarchical and end with `/`: {url}.")]
	InvalidBaseUrl {
		/// Offending base URL.
		url: String,
	},
	/// The quota threshold is not a fraction in `[0, 1]`.
	#[error("The quota limit must be within [0, 1], got {value}.")]
	QuotaLimitOutOfRange {
		/// Supplied threshold.
		value: f64,
	},
	/// The quota threshold was given as text that is not a number.
	#[error("The quota limit `{raw}` is not a number.")]
	QuotaLimitUnparsable {
		/// Supplied text.
		raw: String,
	},
	/// A header value (such as the user agent) contains invalid characters.
	#[error("The {header} header value is invalid.")]
	InvalidHeader {
		/// Header name.
		header: &'static str,
		/// Underlying header validation failure.
		#[source]
		source: oauth2::http::header::InvalidHeaderValue,
	},
	/// Token endpoint returned a non-positive lifetime.
	#[error("The expires_in value must be positive, got {expires_in}.")]
	NonPositiveExpiresIn {
		/// Lifetime declared by the token endpoint.
		expires_in: i64,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Server-side failure (HTTP 5xx).
	#[error("Server error (HTTP {status}): {body}.")]
	Server {
		/// HTTP status code returned by the server.
		status: u16,
		/// Raw response body kept for diagnostics.
		body: String,
	},
	/// Provider rate limit hit (HTTP 429).
	#[error("Rate limit exceeded; retry after {retry_after:?}.")]
	RateLimited {
		/// Server-declared wait before the next attempt.
		retry_after: Option<Duration>,
		/// Raw response body kept for diagnostics.
		body: String,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete in time.
	#[error("Request timed out while calling the API.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// Transport failed with a message-only error.
	#[error("HTTP client error occurred while calling the API: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}
