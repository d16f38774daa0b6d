//! Access token lifecycle: validity checks, singleflight refresh, and expiry bookkeeping.
//!
//! [`TokenManager`] is the only owner of [`TokenState`]. Callers ask for a usable bearer via
//! [`TokenManager::ensure_valid_token`]; the manager holds an async mutex across the whole
//! check-then-refresh sequence so concurrent callers observing an expired token trigger exactly
//! one exchange and then share its result. The exchange itself is delegated to a
//! [`TokenEndpoint`], which the request pipeline implements by routing the refresh call through
//! the same classifier and retry controller as resource calls.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credentials, TokenGrant, TokenSecret, TokenState},
	clock::Clock,
	obs,
};

/// Boxed future returned by [`TokenEndpoint::exchange`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenGrant>> + 'a + Send>>;

/// Performs the refresh-token exchange against the provider.
pub trait TokenEndpoint
where
	Self: Send + Sync,
{
	/// Exchanges the refresh token in `credentials` for a new access token grant.
	fn exchange<'a>(&'a self, credentials: &'a Credentials) -> TokenFuture<'a>;
}

/// Owns the credentials and the current access token.
pub struct TokenManager {
	credentials: Credentials,
	clock: Arc<dyn Clock>,
	state: AsyncMutex<TokenState>,
	metrics: RefreshMetrics,
}
impl TokenManager {
	/// Creates a manager with no token; the first call to
	/// [`ensure_valid_token`](Self::ensure_valid_token) refreshes.
	pub fn new(credentials: Credentials, clock: Arc<dyn Clock>) -> Self {
		Self {
			credentials,
			clock,
			state: AsyncMutex::new(TokenState::default()),
			metrics: RefreshMetrics::default(),
		}
	}

	/// Seeds the manager with a previously issued token.
	pub fn with_state(mut self, state: TokenState) -> Self {
		self.state = AsyncMutex::new(state);

		self
	}

	/// Credentials used for refresh exchanges.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns a snapshot of the currently held token, valid or not.
	pub async fn current(&self) -> Option<AccessToken> {
		self.state.lock().await.current().cloned()
	}

	/// Returns a bearer that is valid at the current clock instant, refreshing first when the
	/// held token is missing or expired.
	///
	/// Refresh failures surface as [`Error::Authentication`]; a cancelled refresh surfaces as
	/// [`Error::Cancelled`].
	pub async fn ensure_valid_token(&self, endpoint: &dyn TokenEndpoint) -> Result<TokenSecret> {
		let mut state = self.state.lock().await;

		if let Some(token) = state.valid_at(self.clock.now()) {
			return Ok(token.secret().clone());
		}

		self.metrics.record_attempt();

		let refreshed = match endpoint.exchange(&self.credentials).await {
			Ok(grant) => AccessToken::from_grant(grant, self.clock.now()),
			Err(e) => Err(e),
		};

		match refreshed {
			Ok(token) => {
				obs::log_debug(&format_args!(
					"Access token refreshed; valid until {}.",
					token.expires_at()
				));

				let secret = token.secret().clone();

				state.replace(token);
				self.metrics.record_success();

				Ok(secret)
			},
			Err(Error::Cancelled) => Err(Error::Cancelled),
			Err(e) => {
				self.metrics.record_failure();

				Err(Error::authentication(e))
			},
		}
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("credentials", &self.credentials)
			.field("metrics", &self.metrics)
			.finish()
	}
}
