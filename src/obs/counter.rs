// self
use crate::obs::{CallKind, CallOutcome, RetryReason};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"menu_broker_call_total",
		"call" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records one extra upstream request and what triggered it.
pub fn record_retry(kind: CallKind, reason: RetryReason) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"menu_broker_retry_total",
		"call" => kind.as_str(),
		"reason" => reason.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, reason);
}

/// Records a terminal failure labeled with its error kind (for example `rate_limited_exhausted`).
pub fn record_failure(kind: CallKind, error: &'static str) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"menu_broker_failure_total",
		"call" => kind.as_str(),
		"error" => error
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, error);
}
