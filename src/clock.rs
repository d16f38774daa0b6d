//! Time source and wait primitive used by every component that reads "now" or sleeps.
//!
//! The pipeline never calls the system clock or a runtime timer directly. Token expiry checks,
//! backoff delays, `retry-after` waits, and quota pauses all go through [`Clock`], so tests can
//! swap in [`ManualClock`] and assert on the exact sequence of waits without sleeping.

// self
use crate::_prelude::*;

/// Boxed future returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Supplies the current instant and suspends the caller for a duration.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;

	/// Suspends the calling task for `duration`; non-positive durations complete immediately.
	fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// Wall clock backed by the tokio timer.
#[cfg(feature = "tokio")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
#[cfg(feature = "tokio")]
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}

	fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
		let duration = to_std(duration);

		Box::pin(async move {
			if !duration.is_zero() {
				tokio::time::sleep(duration).await;
			}
		})
	}
}

/// Deterministic clock that advances only when told to (or when slept on).
///
/// Every call to [`Clock::sleep`] records the requested duration and moves the clock forward
/// by it, then completes immediately.
#[derive(Clone, Debug)]
pub struct ManualClock {
	now: Arc<Mutex<OffsetDateTime>>,
	sleeps: Arc<Mutex<Vec<Duration>>>,
}
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self { now: Arc::new(Mutex::new(start)), sleeps: Default::default() }
	}

	/// Moves the clock forward without recording a sleep.
	pub fn advance(&self, delta: Duration) {
		*self.now.lock() += delta;
	}

	/// Returns every sleep requested so far, in order.
	pub fn sleeps(&self) -> Vec<Duration> {
		self.sleeps.lock().clone()
	}

	/// Returns the sum of all recorded sleeps.
	pub fn total_slept(&self) -> Duration {
		self.sleeps.lock().iter().fold(Duration::ZERO, |acc, d| acc + *d)
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock()
	}

	fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
		let duration = if duration.is_negative() { Duration::ZERO } else { duration };

		self.sleeps.lock().push(duration);
		self.advance(duration);

		Box::pin(async {})
	}
}

/// Converts a signed duration into a std duration, clamping negatives to zero.
#[cfg(any(test, feature = "tokio"))]
fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or(std::time::Duration::ZERO)
}
