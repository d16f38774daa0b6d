//! Transport seam for the request pipeline.
//!
//! [`ApiHttpClient`] is the pipeline's only dependency on an HTTP stack. Implementations hand
//! out short-lived [`AsyncHttpClient`] handles that own whatever state they need, so request
//! futures stay `Send` while the pipeline awaits them inside its retry loop. Transport failures
//! are converted into pipeline errors by a [`TransportErrorMapper`], which decides whether a
//! failure is a retryable connection problem or a fatal configuration mistake.
//!
//! The session behind a client is released when the last clone of the owning `Arc` drops, so
//! callers never close it explicitly.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
#[cfg(feature = "reqwest")] use oauth2::{HttpRequest, HttpResponse};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Abstraction over HTTP transports capable of executing pipeline requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back many concurrent
/// calls, and the futures returned by their handles must be `Send` so the facade's futures can
/// hop executors.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle used for a single attempt.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle for the next attempt.
	fn handle(&self) -> Self::Handle;
}

/// Maps HTTP transport failures into pipeline [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a pipeline error.
	fn map_transport_error(&self, error: HttpClientError<E>) -> Error;
}

/// Mapper for arbitrary transports: request construction failures are fatal, every other
/// failure is treated as a retryable connection problem.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTransportErrorMapper;
impl<E> TransportErrorMapper<E> for DefaultTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(&self, error: HttpClientError<E>) -> Error {
		match error {
			HttpClientError::Reqwest(inner) => TransportError::Network { source: inner }.into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message }.into(),
			_ => TransportError::Other { message: "unrecognized transport failure".into() }.into(),
		}
	}
}

/// Mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, error: HttpClientError<ReqwestError>) -> Error {
		match error {
			HttpClientError::Reqwest(inner) => map_reqwest_error(*inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message }.into(),
			_ => TransportError::Other { message: "unrecognized transport failure".into() }.into(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn handle(&self) -> Self::Handle {
		ReqwestHandle(self.0.clone())
	}
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`ApiHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHandle(ReqwestClient);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	TransportError::from(err).into()
}

#[cfg(test)]
mod tests {
	// std
	use std::io;
	// self
	use super::*;

	#[test]
	fn default_mapper_separates_fatal_and_retryable_failures() {
		let mapper = DefaultTransportErrorMapper;
		let io = TransportErrorMapper::<io::Error>::map_transport_error(
			&mapper,
			HttpClientError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
		);
		let other = TransportErrorMapper::<io::Error>::map_transport_error(
			&mapper,
			HttpClientError::Other("dns lookup failed".into()),
		);
		let wrapped = TransportErrorMapper::<io::Error>::map_transport_error(
			&mapper,
			HttpClientError::Reqwest(Box::new(io::Error::other("refused"))),
		);

		assert!(matches!(io, Error::Transport(TransportError::Io(_))));
		assert!(matches!(other, Error::Transport(TransportError::Other { .. })));
		assert!(matches!(wrapped, Error::Transport(TransportError::Network { .. })));
		assert!(io.is_retryable() && other.is_retryable() && wrapped.is_retryable());
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn reqwest_builder_errors_are_configuration_failures() {
		let err = ReqwestClient::new()
			.get("not a url")
			.build()
			.expect_err("Relative URLs should fail to build.");
		let mapped = ReqwestTransportErrorMapper
			.map_transport_error(HttpClientError::Reqwest(Box::new(err)));

		assert!(matches!(mapped, Error::Config(ConfigError::HttpClientBuild { .. })));
		assert!(!mapped.is_retryable());
	}
}
