//! Retry controller with geometric backoff, server-declared waits, and cooperative cancellation.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	clock::Clock,
	obs::{self, CallKind, CallOutcome, WaitReason},
};

/// Randomization applied to backoff delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Jitter {
	/// Use the computed delay as-is.
	#[default]
	None,
	/// Pick a uniformly random delay between zero and the computed delay.
	Full,
}

/// Attempt budget and delay schedule shared by resource and token calls.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
	/// Total attempts, including the first one.
	pub max_attempts: u32,
	/// Delay before the second attempt.
	pub initial_delay: Duration,
	/// Ratio between successive delays.
	pub factor: u32,
	/// Upper bound applied after scaling.
	pub max_delay: Option<Duration>,
	/// Randomization applied after capping.
	pub jitter: Jitter,
}
impl RetryPolicy {
	/// Overrides the attempt budget; values below one are treated as one.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);

		self
	}

	/// Overrides the first backoff delay.
	pub fn with_initial_delay(mut self, delay: Duration) -> Self {
		self.initial_delay = delay;

		self
	}

	/// Overrides the growth ratio.
	pub fn with_factor(mut self, factor: u32) -> Self {
		self.factor = factor;

		self
	}

	/// Caps each backoff delay.
	pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
		self.max_delay = Some(max_delay);

		self
	}

	/// Sets the jitter mode.
	pub fn with_jitter(mut self, jitter: Jitter) -> Self {
		self.jitter = jitter;

		self
	}

	/// Backoff delay after the `failed_attempt`-th attempt (1-based) failed.
	pub fn delay_for(&self, failed_attempt: u32) -> Duration {
		let exponent = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
		let secs = self.initial_delay.as_seconds_f64() * f64::from(self.factor).powi(exponent);
		let mut delay = Duration::checked_seconds_f64(secs).unwrap_or(Duration::MAX);

		if let Some(max) = self.max_delay {
			delay = delay.min(max);
		}

		match self.jitter {
			Jitter::None => delay,
			Jitter::Full => {
				let upper = delay.as_seconds_f64().max(0.0);

				Duration::checked_seconds_f64(rand::rng().random_range(0.0..=upper)).unwrap_or(delay)
			},
		}
	}

	/// Runs `attempt` until it succeeds, fails fatally, or exhausts the budget.
	///
	/// `attempt` receives the 1-based attempt number. Retryable failures wait for the
	/// server-declared `retry-after` when present and for [`delay_for`](Self::delay_for)
	/// otherwise; either way the attempt counts against the budget. Once the budget is spent the
	/// last failure is returned unchanged. `cancel` is checked before every attempt and before
	/// every wait.
	pub async fn execute<T, F, Fut>(
		&self,
		kind: CallKind,
		clock: &dyn Clock,
		cancel: &CancelToken,
		mut attempt: F,
	) -> Result<T>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let max_attempts = self.max_attempts.max(1);
		let mut n = 1;

		loop {
			cancel.check()?;
			obs::record_call_outcome(kind, CallOutcome::Attempt);

			let err = match attempt(n).await {
				Ok(value) => {
					obs::record_call_outcome(kind, CallOutcome::Success);

					return Ok(value);
				},
				Err(e) => e,
			};

			if !err.is_retryable() || n >= max_attempts {
				obs::record_call_outcome(kind, CallOutcome::Failure);
				obs::log_failure(kind, n, &err);

				return Err(err);
			}

			obs::record_call_outcome(kind, CallOutcome::Retry);

			let (reason, wait) = match err.retry_after() {
				Some(wait) => (WaitReason::RetryAfter, wait),
				None => (WaitReason::Backoff, self.delay_for(n)),
			};

			cancel.check()?;
			obs::log_wait(
				reason,
				wait,
				&format_args!("{kind} attempt {n}/{max_attempts} failed: {err}"),
			);
			obs::record_wait(reason, wait);
			clock.sleep(wait).await;

			n += 1;
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			initial_delay: Duration::SECOND,
			factor: 3,
			max_delay: None,
			jitter: Jitter::None,
		}
	}
}

/// Shared flag that aborts a call at its next checkpoint.
///
/// Clones observe the same flag. Dropping the call's future interrupts an in-flight wait.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
	/// Creates a token that is not cancelled.
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	/// Returns `true` once [`cancel`](Self::cancel) has been called.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	/// Returns [`Error::Cancelled`] when cancellation was requested.
	pub fn check(&self) -> Result<()> {
		if self.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicU32;
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{clock::ManualClock, error::TransientError};

	fn clock() -> ManualClock {
		ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC))
	}

	fn server_error() -> Error {
		TransientError::Server { status: 503, body: "unavailable".into() }.into()
	}

	#[test]
	fn default_schedule_grows_by_three() {
		let policy = RetryPolicy::default();
		let delays = (1..=4).map(|n| policy.delay_for(n)).collect::<Vec<_>>();

		assert_eq!(
			delays,
			vec![
				Duration::seconds(1),
				Duration::seconds(3),
				Duration::seconds(9),
				Duration::seconds(27)
			]
		);
	}

	#[test]
	fn max_delay_and_jitter_bound_the_schedule() {
		let capped = RetryPolicy::default().with_max_delay(Duration::seconds(5));

		assert_eq!(capped.delay_for(4), Duration::seconds(5));

		let jittered = capped.with_jitter(Jitter::Full);

		for n in 1..=4 {
			let delay = jittered.delay_for(n);

			assert!(!delay.is_negative());
			assert!(delay <= Duration::seconds(5));
		}
	}

	#[tokio::test]
	async fn exhausts_budget_with_geometric_delays() {
		let clock = clock();
		let calls = &AtomicU32::new(0);
		let err = RetryPolicy::default()
			.execute(CallKind::Resource, &clock, &CancelToken::new(), |_| async move {
				calls.fetch_add(1, Ordering::SeqCst);

				Err::<(), _>(server_error())
			})
			.await
			.expect_err("Persistent server errors should surface.");

		assert_eq!(err.status(), Some(503));
		assert_eq!(calls.load(Ordering::SeqCst), 5);
		assert_eq!(
			clock.sleeps(),
			vec![
				Duration::seconds(1),
				Duration::seconds(3),
				Duration::seconds(9),
				Duration::seconds(27)
			]
		);
	}

	#[tokio::test]
	async fn retry_after_replaces_backoff_and_counts() {
		let clock = clock();
		let value = RetryPolicy::default()
			.execute(CallKind::Resource, &clock, &CancelToken::new(), |n| async move {
				match n {
					1 => Err(TransientError::RateLimited {
						retry_after: Some(Duration::seconds(30)),
						body: String::new(),
					}
					.into()),
					2 => Err(TransientError::RateLimited { retry_after: None, body: String::new() }
						.into()),
					_ => Ok(n),
				}
			})
			.await
			.expect("Third attempt should succeed.");

		assert_eq!(value, 3);
		assert_eq!(clock.sleeps(), vec![Duration::seconds(30), Duration::seconds(3)]);
	}

	#[tokio::test]
	async fn short_retry_after_is_honored_over_a_longer_backoff() {
		let clock = clock();
		let value = RetryPolicy::default()
			.execute(CallKind::Resource, &clock, &CancelToken::new(), |n| async move {
				match n {
					1 | 2 => Err(server_error()),
					3 => Err(TransientError::RateLimited {
						retry_after: Some(Duration::seconds(2)),
						body: String::new(),
					}
					.into()),
					_ => Ok(n),
				}
			})
			.await
			.expect("Fourth attempt should succeed.");

		assert_eq!(value, 4);
		assert_eq!(
			clock.sleeps(),
			vec![Duration::seconds(1), Duration::seconds(3), Duration::seconds(2)]
		);
	}

	#[tokio::test]
	async fn fatal_errors_are_not_retried() {
		let clock = clock();
		let calls = &AtomicU32::new(0);
		let err = RetryPolicy::default()
			.execute(CallKind::Resource, &clock, &CancelToken::new(), |_| async move {
				calls.fetch_add(1, Ordering::SeqCst);

				Err::<(), _>(Error::Http { status: 404, body: "missing".into() })
			})
			.await
			.expect_err("Fatal errors should surface.");

		assert!(matches!(err, Error::Http { status: 404, .. }));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(clock.sleeps().is_empty());
	}

	#[tokio::test]
	async fn cancellation_stops_before_the_next_wait() {
		let clock = clock();
		let cancel = CancelToken::new();
		let calls = AtomicU32::new(0);
		let err = RetryPolicy::default()
			.execute(CallKind::Resource, &clock, &cancel, |_| {
				calls.fetch_add(1, Ordering::SeqCst);
				cancel.cancel();

				async { Err::<(), _>(server_error()) }
			})
			.await
			.expect_err("Cancelled calls should surface.");

		assert!(matches!(err, Error::Cancelled));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(clock.sleeps().is_empty());
	}

	#[tokio::test]
	async fn cancelled_token_prevents_any_attempt() {
		let cancel = CancelToken::new();

		cancel.cancel();

		let result = RetryPolicy::default()
			.execute(CallKind::TokenRefresh, &clock(), &cancel, |_| async { Ok(()) })
			.await;

		assert!(matches!(result, Err(Error::Cancelled)));
	}
}
