//! Request pipeline facade.
//!
//! [`ApiClient`] composes the pieces of the pipeline for every call:
//!
//! 1. the retry controller wraps the whole attempt, so each retry re-checks token validity;
//! 2. inside an attempt the [`TokenManager`] supplies a valid bearer, refreshing first when the held
//!    token expired (the refresh itself is another retried call against the token endpoint);
//! 3. the request is built with the bearer and user agent, dispatched through the injected
//!    transport, and classified;
//! 4. successful resource calls feed their headers to the quota throttle before the decoded body
//!    is returned.

// crates.io
use oauth2::{AsyncHttpClient, HttpResponse};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenEndpoint, TokenFuture, TokenGrant, TokenManager, TokenSecret, TokenState},
	classify::ClassifiedOutcome,
	clock::Clock,
	config::{ClientConfig, Endpoints},
	http::{ApiHttpClient, TransportErrorMapper},
	obs::{CallKind, CallSpan},
	request::{RequestContext, RequestOptions, Target},
	retry::{CancelToken, RetryPolicy},
	throttle::QuotaThrottle,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

/// Client specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Authenticated client for a token-protected REST API.
///
/// The client owns the transport for its whole lifetime; dropping the client releases the
/// transport session once no other `Arc` clone of it remains.
pub struct ApiClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	dispatcher: Dispatcher<C, M>,
	tokens: TokenManager,
	throttle: Option<QuotaThrottle>,
}
impl<C, M> ApiClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport, mapper, and clock.
	pub fn with_http_client(
		config: &ClientConfig,
		clock: Arc<dyn Clock>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let credentials = config.credentials()?;
		let endpoints = config.endpoints()?;
		let user_agent = config.user_agent_header()?;

		Ok(Self {
			dispatcher: Dispatcher {
				http_client: http_client.into(),
				error_mapper: mapper.into(),
				clock: clock.clone(),
				endpoints,
				user_agent,
				retry: RetryPolicy::default(),
				cancel: CancelToken::default(),
			},
			tokens: TokenManager::new(credentials, clock),
			throttle: config.quota_limit.map(QuotaThrottle::new),
		})
	}

	/// Overrides the retry policy shared by resource and token calls.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.dispatcher.retry = policy;

		self
	}

	/// Overrides the endpoints derived from the configuration.
	pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
		self.dispatcher.endpoints = endpoints;

		self
	}

	/// Attaches a cancellation token checked before every attempt and every wait.
	pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
		self.dispatcher.cancel = cancel;

		self
	}

	/// Seeds the token manager with a previously issued token.
	pub fn with_token_state(mut self, state: TokenState) -> Self {
		self.tokens = self.tokens.with_state(state);

		self
	}

	/// Token manager owning the access token.
	pub fn tokens(&self) -> &TokenManager {
		&self.tokens
	}

	/// Endpoints used to resolve paths and refresh tokens.
	pub fn endpoints(&self) -> &Endpoints {
		&self.dispatcher.endpoints
	}

	/// Retry policy in effect.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.dispatcher.retry
	}

	/// Cancellation token observed by every call.
	pub fn cancel_token(&self) -> &CancelToken {
		&self.dispatcher.cancel
	}

	/// Underlying transport.
	pub fn http_client(&self) -> &Arc<C> {
		&self.dispatcher.http_client
	}

	/// Issues a `GET` and decodes the JSON response.
	pub async fn get<T>(&self, target: impl Into<Target>, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call("get", RequestContext::new(Method::GET, target, options)).await
	}

	/// Issues a `POST` and decodes the JSON response.
	pub async fn post<T>(&self, target: impl Into<Target>, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call("post", RequestContext::new(Method::POST, target, options)).await
	}

	/// Issues a `PATCH` and decodes the JSON response.
	pub async fn update<T>(&self, target: impl Into<Target>, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call("update", RequestContext::new(Method::PATCH, target, options)).await
	}

	/// Issues a request with an arbitrary method and decodes the JSON response.
	pub async fn request<T>(
		&self,
		method: Method,
		target: impl Into<Target>,
		options: RequestOptions,
	) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call("request", RequestContext::new(method, target, options)).await
	}

	/// Issues a request and returns the raw successful response, headers included.
	pub async fn send(&self, context: RequestContext) -> Result<HttpResponse> {
		CallSpan::new(context.kind, "send").instrument(self.execute(&context)).await
	}

	async fn call<T>(&self, stage: &'static str, context: RequestContext) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let span = CallSpan::new(context.kind, stage);

		span.instrument(async {
			let response = self.execute(&context).await?;

			decode_json(&response)
		})
		.await
	}

	async fn execute(&self, context: &RequestContext) -> Result<HttpResponse> {
		let dispatcher = &self.dispatcher;
		let tokens = &self.tokens;
		let response = dispatcher
			.retry
			.execute(context.kind, dispatcher.clock.as_ref(), &dispatcher.cancel, move |_| async move {
				match context.kind {
					CallKind::Resource => {
						let token = tokens.ensure_valid_token(dispatcher).await?;

						dispatcher.send(context, Some(&token)).await
					},
					CallKind::TokenRefresh => dispatcher.send(context, None).await,
				}
			})
			.await?;

		if let (CallKind::Resource, Some(throttle)) = (context.kind, &self.throttle) {
			throttle.apply(response.headers(), dispatcher.clock.as_ref()).await;
		}

		Ok(response)
	}
}
#[cfg(all(feature = "reqwest", feature = "tokio"))]
impl ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client backed by its own reqwest transport and the system clock.
	pub fn new(config: &ClientConfig) -> Result<Self> {
		Self::with_http_client(
			config,
			Arc::new(crate::clock::SystemClock),
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Debug for ApiClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("endpoints", &self.dispatcher.endpoints)
			.field("retry", &self.dispatcher.retry)
			.field("throttle", &self.throttle)
			.field("tokens", &self.tokens)
			.finish()
	}
}

// Performs single attempts and serves as the token manager's refresh endpoint.
struct Dispatcher<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	clock: Arc<dyn Clock>,
	endpoints: Endpoints,
	user_agent: Option<HeaderValue>,
	retry: RetryPolicy,
	cancel: CancelToken,
}
impl<C, M> Dispatcher<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	async fn send(
		&self,
		context: &RequestContext,
		bearer: Option<&TokenSecret>,
	) -> Result<HttpResponse> {
		let request = context.build(&self.endpoints, bearer, self.user_agent.as_ref())?;
		let handle = self.http_client.handle();
		let response = handle
			.call(request)
			.await
			.map_err(|e| self.error_mapper.map_transport_error(e))?;

		ClassifiedOutcome::classify(response, self.clock.now()).into_result()
	}
}
impl<C, M> TokenEndpoint for Dispatcher<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange<'a>(&'a self, credentials: &'a Credentials) -> TokenFuture<'a> {
		Box::pin(async move {
			let context = RequestContext::token_refresh(
				self.endpoints.token.clone(),
				&credentials.refresh_form(),
			);
			let context = &context;
			let response = CallSpan::new(CallKind::TokenRefresh, "exchange")
				.instrument(self.retry.execute(
					CallKind::TokenRefresh,
					self.clock.as_ref(),
					&self.cancel,
					move |_| self.send(context, None),
				))
				.await?;

			decode_json::<TokenGrant>(&response)
		})
	}
}

/// Decodes a successful response body; an empty body decodes as JSON `null`.
fn decode_json<T>(response: &HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let status = response.status().as_u16();
	let body = response.body();
	let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"null" } else { body };
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|source| Error::Decode { status, source })
}
