//! Observability for upstream menu calls.
//!
//! Spans: every login and menu fetch runs inside a `menu_broker.call` span with a `call` field
//! (`login`, `menu_fetch`) and a `stage` field naming the step of the access pipeline that opened
//! it ([`CallStage`]).
//!
//! Counters (feature `metrics`):
//! - `menu_broker_call_total{call,outcome}` counts attempts, successes, and failures.
//! - `menu_broker_retry_total{call,reason}` counts every extra upstream request the transport
//!   issues, labeled by what triggered it ([`RetryReason`]).
//! - `menu_broker_failure_total{call,error}` counts terminal failures by error kind.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Upstream endpoints the access layer talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// `POST /login`.
	Login,
	/// `GET /public/publicmenu/dates/{site}`.
	MenuFetch,
}
impl CallKind {
	/// Stable label used in span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Login => "login",
			Self::MenuFetch => "menu_fetch",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Pipeline step that opened a span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallStage {
	/// Rate-limited GET loop of the retrying transport.
	Fetch,
	/// Token refresh triggered by a 403.
	Reauthenticate,
}
impl CallStage {
	/// Stable label used in span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Fetch => "fetch",
			Self::Reauthenticate => "reauthenticate",
		}
	}
}

/// Outcome labels recorded once per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a call.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Stable label used in metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}

/// Why the transport sent another request for the same call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetryReason {
	/// 403: the token was stale and has been replaced.
	Forbidden,
	/// 429: the upstream asked us to slow down.
	Throttled,
	/// 5xx status.
	ServerError,
	/// Connect failure or timeout.
	Network,
}
impl RetryReason {
	/// Stable label used in log and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Forbidden => "forbidden",
			Self::Throttled => "throttled",
			Self::ServerError => "server_error",
			Self::Network => "network",
		}
	}
}
impl Display for RetryReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
