// self
use crate::{
	_prelude::*,
	obs::{CallKind, WaitReason},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used by pipeline calls.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call kind + stage.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_pipeline.call", call = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a warning before the pipeline suspends the caller.
pub fn log_wait(reason: WaitReason, duration: Duration, detail: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			reason = reason.as_str(),
			seconds = duration.as_seconds_f64(),
			"Sleeping for {:.2} seconds: {detail}.",
			duration.as_seconds_f64()
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (reason, duration, detail);
	}
}

/// Emits a warning when a call gives up on a failure.
pub fn log_failure(kind: CallKind, attempt: u32, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(call = kind.as_str(), attempt, error = %error, "Call failed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, attempt, error);
	}
}

/// Emits a debug event for diagnostics that do not change control flow.
pub fn log_debug(message: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!("{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = message;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn log_helpers_accept_display_values() {
		log_wait(WaitReason::Backoff, Duration::seconds(3), &"attempt 1 failed");
		log_failure(CallKind::Resource, 5, &Error::Cancelled);
		log_debug(&"quota headers missing");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = CallSpan::new(CallKind::TokenRefresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
