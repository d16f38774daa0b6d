//! Optional observability helpers for pipeline calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_pipeline.call` with the `call` (kind)
//!   and `stage` (call site) fields, plus `warn` events for every wait the pipeline performs.
//! - Enable `metrics` to increment the `oauth2_pipeline_call_total` counter for every
//!   attempt/success/retry/failure, labeled by `call` + `outcome`, and to record waits in the
//!   `oauth2_pipeline_wait_seconds` histogram labeled by `reason`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Call kinds issued by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Authenticated request against the resource API.
	Resource,
	/// Refresh-token exchange against the token endpoint.
	TokenRefresh,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Resource => "resource",
			CallKind::TokenRefresh => "token_refresh",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// A single transport attempt was started.
	Attempt,
	/// The call completed successfully.
	Success,
	/// A retryable failure was observed and another attempt is scheduled.
	Retry,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Retry => "retry",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Why the pipeline suspended the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitReason {
	/// Exponential backoff between attempts.
	Backoff,
	/// Server-declared `retry-after` after an HTTP 429.
	RetryAfter,
	/// Proactive pause until the provider's quota window resets.
	QuotaReset,
}
impl WaitReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			WaitReason::Backoff => "backoff",
			WaitReason::RetryAfter => "retry_after",
			WaitReason::QuotaReset => "quota_reset",
		}
	}
}
impl Display for WaitReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
