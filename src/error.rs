//! Crate-level error types shared by the authenticator, transport, and service layers.

// self
use crate::{_prelude::*, http::HttpClientError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Login call failed or returned no usable token.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Upstream GET failed after the retry policy gave up.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required configuration key is absent.
	#[error("Configuration key `{key}` is not set.")]
	MissingVar {
		/// Name of the missing key.
		key: &'static str,
	},
	/// A configuration key holds a value that cannot be used.
	#[error("Configuration key `{key}` has an invalid value `{value}`: {reason}.")]
	InvalidVar {
		/// Name of the offending key.
		key: &'static str,
		/// Raw value as read from the source.
		value: String,
		/// Why the value was refused.
		reason: String,
	},
	/// Upstream base URL cannot be parsed.
	#[error("Upstream base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Upstream base URL parsed but cannot carry path segments (e.g. `mailto:`).
	#[error("Upstream base URL `{url}` must be an http(s) URL.")]
	UnsupportedBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Token bucket parameters are out of range.
	#[error("Rate limit must be a positive, finite number of requests per second; got {rate}.")]
	InvalidRateLimit {
		/// Rejected fill rate.
		rate: f64,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Login failures raised by [`TokenAuthenticator`](crate::auth::TokenAuthenticator).
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// The login request never produced an HTTP response.
	#[error("Network error occurred while calling the login endpoint.")]
	Network(#[source] HttpClientError),
	/// Login endpoint answered with a non-success status.
	#[error("Login endpoint rejected the credentials with HTTP {status}.")]
	Rejected {
		/// HTTP status code returned by the login endpoint.
		status: u16,
	},
	/// Login endpoint returned a body that is not JSON.
	#[error("Login endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Login response parsed but carried no token.
	#[error("Login response does not contain a token.")]
	MissingToken,
}

impl AuthError {
	/// Returns a stable label suitable for log or metric fields.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Network(_) => "network_error",
			Self::Rejected { .. } => "rejected",
			Self::MalformedResponse { .. } => "malformed_response",
			Self::MissingToken => "missing_token",
		}
	}
}

/// Classification of terminal [`TransportError`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
	/// Upstream unreachable (connect failure, timeout, 5xx) after every attempt.
	NetworkError,
	/// Upstream kept answering 403 after a fresh token was obtained.
	AuthRejected,
	/// Upstream kept answering 429 until the attempt budget ran out.
	RateLimitedExhausted,
	/// Upstream answered with a body that is not usable JSON.
	MalformedResponse,
}
impl TransportErrorKind {
	/// Returns a stable label suitable for log or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NetworkError => "network_error",
			Self::AuthRejected => "auth_rejected",
			Self::RateLimitedExhausted => "rate_limited_exhausted",
			Self::MalformedResponse => "malformed_response",
		}
	}
}
impl Display for TransportErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Terminal failures of [`RetryingTransport::get`](crate::transport::RetryingTransport::get).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Every attempt failed before an HTTP response arrived.
	#[error("Upstream is unreachable after {attempts} attempt(s).")]
	Network {
		/// Attempts spent before giving up.
		attempts: u32,
		/// Failure reported by the final attempt.
		#[source]
		source: HttpClientError,
	},
	/// Every attempt ended with a server-side (5xx) status.
	#[error("Upstream kept failing with HTTP {status} after {attempts} attempt(s).")]
	ServerError {
		/// Attempts spent before giving up.
		attempts: u32,
		/// Status returned by the final attempt.
		status: u16,
	},
	/// Upstream rejected the request even after the token was refreshed.
	#[error("Upstream rejected the request with HTTP {status} even after refreshing the token.")]
	AuthRejected {
		/// Status returned by the final attempt.
		status: u16,
	},
	/// Upstream throttled every attempt.
	#[error("Upstream kept throttling after {attempts} attempt(s).")]
	RateLimitedExhausted {
		/// Attempts spent before giving up.
		attempts: u32,
		/// Last Retry-After hint supplied by upstream, if any.
		retry_after: Option<Duration>,
	},
	/// Upstream answered with an unusable body or an unexpected client-error status.
	#[error("Upstream returned a malformed response (HTTP {status}): {preview}")]
	MalformedResponse {
		/// HTTP status code of the response.
		status: u16,
		/// Truncated body snippet for diagnosis.
		preview: String,
		/// JSON parsing failure, when the body was not JSON.
		#[source]
		source: Option<serde_json::Error>,
	},
}
impl TransportError {
	/// Returns the coarse classification of this failure.
	pub fn kind(&self) -> TransportErrorKind {
		match self {
			Self::Network { .. } | Self::ServerError { .. } => TransportErrorKind::NetworkError,
			Self::AuthRejected { .. } => TransportErrorKind::AuthRejected,
			Self::RateLimitedExhausted { .. } => TransportErrorKind::RateLimitedExhausted,
			Self::MalformedResponse { .. } => TransportErrorKind::MalformedResponse,
		}
	}
}
