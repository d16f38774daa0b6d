//! Proactive quota throttle driven by `x-ratelimit-*` response headers.
//!
//! After a successful resource call the throttle compares the consumed share of the provider's
//! quota window against the configured [`QuotaLimit`]. When consumption exceeds the limit the
//! caller is suspended until the window resets (plus a drift margin), so the *next* call starts
//! with a fresh budget. The already-fetched payload is unaffected.

// self
use crate::{_prelude::*, clock::Clock, error::ConfigError, obs};

/// Remaining requests in the current window.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Total requests allowed per window.
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Window reset instant, in Unix epoch seconds.
pub const RESET_HEADER: &str = "x-ratelimit-reset";
/// Extra wait added past the advertised reset instant to absorb clock drift.
pub const RESET_DRIFT_MARGIN: Duration = Duration::seconds(10);

/// Fraction of the quota window that may be consumed before the throttle pauses.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
pub struct QuotaLimit(f64);
impl QuotaLimit {
	/// Validates that `value` is a finite fraction in `[0, 1]`.
	pub fn new(value: f64) -> Result<Self, ConfigError> {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(ConfigError::QuotaLimitOutOfRange { value });
		}

		Ok(Self(value))
	}

	/// Returns the configured fraction.
	pub fn get(self) -> f64 {
		self.0
	}
}
impl FromStr for QuotaLimit {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value = s
			.trim()
			.parse::<f64>()
			.map_err(|_| ConfigError::QuotaLimitUnparsable { raw: s.to_owned() })?;

		Self::new(value)
	}
}
impl<'de> Deserialize<'de> for QuotaLimit {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let limit = match QuotaLimitRepr::deserialize(deserializer)? {
			QuotaLimitRepr::Number(value) => Self::new(value),
			QuotaLimitRepr::Text(raw) => raw.parse(),
		};

		limit.map_err(serde::de::Error::custom)
	}
}

// Configuration sources may carry the threshold as either a JSON number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum QuotaLimitRepr {
	Number(f64),
	Text(String),
}

/// Quota counters read from one response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaSnapshot {
	/// Requests still available in the window.
	pub remaining: u64,
	/// Window size.
	pub limit: u64,
	/// Advertised reset instant, when present.
	pub reset_at: Option<OffsetDateTime>,
}
impl QuotaSnapshot {
	/// Reads the counters; returns `None` when either count is missing or malformed.
	pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
		let remaining = header_u64(headers, REMAINING_HEADER)?;
		let limit = header_u64(headers, LIMIT_HEADER)?;
		let reset_at = headers
			.get(RESET_HEADER)
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.trim().parse::<i64>().ok())
			.and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok());

		Some(Self { remaining, limit, reset_at })
	}

	/// Consumed share of the window, `1 - remaining / limit`; `None` for a zero limit.
	pub fn consumed(&self) -> Option<f64> {
		if self.limit == 0 {
			return None;
		}

		Some(1.0 - self.remaining as f64 / self.limit as f64)
	}
}

/// Pauses the caller when quota consumption crosses the configured limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuotaThrottle {
	limit: QuotaLimit,
}
impl QuotaThrottle {
	/// Creates a throttle for the provided threshold.
	pub fn new(limit: QuotaLimit) -> Self {
		Self { limit }
	}

	/// Configured threshold.
	pub fn limit(&self) -> QuotaLimit {
		self.limit
	}

	/// Computes the pause owed for `headers` at `now`, if any.
	pub fn pause_for(&self, headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
		let Some(snapshot) = QuotaSnapshot::from_headers(headers) else {
			obs::log_debug(&"Quota headers missing; skipping throttle.");

			return None;
		};
		let consumed = snapshot.consumed()?;

		if consumed <= self.limit.get() {
			return None;
		}

		let Some(reset_at) = snapshot.reset_at else {
			obs::log_debug(&format_args!(
				"Quota consumption {consumed:.2} exceeds limit but no reset header was sent."
			));

			return None;
		};
		let pause = reset_at + RESET_DRIFT_MARGIN - now;

		pause.is_positive().then_some(pause)
	}

	/// Suspends the caller until the quota window resets when consumption exceeds the limit.
	pub async fn apply(&self, headers: &HeaderMap, clock: &dyn Clock) {
		let Some(pause) = self.pause_for(headers, clock.now()) else {
			return;
		};

		obs::log_wait(
			obs::WaitReason::QuotaReset,
			pause,
			&format_args!("quota consumption exceeded {:.2}", self.limit.get()),
		);
		obs::record_wait(obs::WaitReason::QuotaReset, pause);
		clock.sleep(pause).await;
	}
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
	headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
