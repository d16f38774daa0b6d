// self
use crate::{
	_prelude::*,
	obs::{CallKind, CallOutcome, WaitReason},
};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_pipeline_call_total",
			"call" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how long the pipeline suspended a caller (when enabled).
pub fn record_wait(reason: WaitReason, duration: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("oauth2_pipeline_wait_seconds", "reason" => reason.as_str())
			.record(duration.as_seconds_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (reason, duration);
	}
}
