//! Transport primitives for upstream menu calls.
//!
//! The module exposes [`MenuHttpClient`] alongside the [`HttpRequest`] and [`HttpResponse`]
//! value types so callers can plug in any HTTP stack. The access layer only ever needs two
//! primitives from it: a GET carrying an `Authorization` header and a POST with a JSON body.
//! Implementations report the status, the parsed `Retry-After` hint, and the raw body; every
//! policy decision (re-auth, backoff, parsing) stays with
//! [`RetryingTransport`](crate::transport::RetryingTransport).

// crates.io
#[cfg(feature = "reqwest")] use reqwest::{
	header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Boxed future returned by [`MenuHttpClient::send`].
pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, HttpClientError>> + 'a + Send>>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Maximum number of characters kept by [`HttpResponse::body_preview`].
pub const BODY_PREVIEW_LIMIT: usize = 256;

/// Abstraction over HTTP transports capable of reaching the upstream menu API.
///
/// Implementations must be `Send + Sync + 'static` so one instance can be shared between the
/// authenticator and the retrying transport, and must honor [`HttpRequest::timeout`].
pub trait MenuHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes the request and resolves with whatever status the upstream produced.
	///
	/// Only failures that prevent an HTTP response (connect errors, timeouts, broken bodies)
	/// surface as [`HttpClientError`].
	fn send(&self, request: HttpRequest) -> HttpFuture<'_, HttpResponse>;
}

/// Appends `segments` to the path of `base`, ignoring a trailing slash on the base.
pub fn join_path<'a, I>(base: &Url, segments: I) -> Result<Url, ConfigError>
where
	I: IntoIterator<Item = &'a str>,
{
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|_| ConfigError::UnsupportedBaseUrl { url: base.to_string() })?
		.pop_if_empty()
		.extend(segments);

	Ok(url)
}

/// Network-level failure raised before an HTTP response is available.
#[derive(Debug, ThisError)]
pub enum HttpClientError {
	/// The request exceeded its timeout.
	#[error("Request timed out after {0:?}.")]
	Timeout(Duration),
	/// Connection, TLS, or body transfer failure.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific error.
		#[source]
		source: BoxError,
	},
}
impl HttpClientError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// HTTP verbs used against the upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// Menu reads.
	Get,
	/// Login.
	Post,
}

/// Outbound request description handed to a [`MenuHttpClient`].
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// Verb.
	pub method: HttpMethod,
	/// Fully resolved URL, query included.
	pub url: Url,
	/// Extra headers as (name, value) pairs.
	pub headers: Vec<(String, String)>,
	/// JSON body for POST requests.
	pub body: Option<Vec<u8>>,
	/// Upper bound for the whole exchange.
	pub timeout: Duration,
}
impl HttpRequest {
	/// Per-request timeout applied unless overridden.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

	/// Creates a GET request.
	pub fn get(url: Url) -> Self {
		Self {
			method: HttpMethod::Get,
			url,
			headers: Vec::new(),
			body: None,
			timeout: Self::DEFAULT_TIMEOUT,
		}
	}

	/// Creates a POST request carrying `body` as JSON.
	pub fn post_json(url: Url, body: &serde_json::Value) -> Self {
		Self {
			method: HttpMethod::Post,
			url,
			headers: Vec::new(),
			body: Some(body.to_string().into_bytes()),
			timeout: Self::DEFAULT_TIMEOUT,
		}
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Overrides the request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Returns the first value recorded for `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}

/// Upstream answer as seen by the access layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response with the given status and body and no retry hint.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, retry_after: None, body: body.into() }
	}

	/// Attaches a Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
		self.retry_after = Some(retry_after);

		self
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Lossy UTF-8 rendering of the body, truncated to [`BODY_PREVIEW_LIMIT`] characters.
	pub fn body_preview(&self) -> String {
		let text = String::from_utf8_lossy(&self.body);

		match text.char_indices().nth(BODY_PREVIEW_LIMIT) {
			Some((cut, _)) => format!("{}…", &text[..cut]),
			None => text.into_owned(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Use [`ReqwestHttpClient::try_new`] for a client that refuses redirects; the upstream answers
/// menu and login calls directly and a redirect usually means a misconfigured base URL.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client that does not follow redirects.
	pub fn try_new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl MenuHttpClient for ReqwestHttpClient {
	fn send(&self, request: HttpRequest) -> HttpFuture<'_, HttpResponse> {
		Box::pin(async move {
			let HttpRequest { method, url, headers, body, timeout } = request;
			let mut builder = match method {
				HttpMethod::Get => self.0.get(url),
				HttpMethod::Post => self.0.post(url),
			};

			for (name, value) in headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = body {
				builder = builder.header(CONTENT_TYPE, "application/json").body(body);
			}

			let response = builder
				.timeout(timeout)
				.send()
				.await
				.map_err(|err| map_reqwest_error(err, timeout))?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body =
				response.bytes().await.map_err(|err| map_reqwest_error(err, timeout))?.to_vec();

			Ok(HttpResponse { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError, timeout: Duration) -> HttpClientError {
	if err.is_timeout() { HttpClientError::Timeout(timeout) } else { HttpClientError::network(err) }
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;

	parse_retry_after_value(value.to_str().ok()?, OffsetDateTime::now_utc())
}

/// Interprets a `Retry-After` header value relative to `now`.
///
/// Accepts delta-seconds (`"120"`) or an HTTP-date; dates in the past yield `None`.
pub fn parse_retry_after_value(raw: &str, now: OffsetDateTime) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::from_secs(secs));
	}
	// HTTP-dates always end in `GMT`; normalize to a numeric offset before parsing.
	let numeric = raw.strip_suffix("GMT").map(|head| format!("{head}+0000"));

	if let Ok(moment) = OffsetDateTime::parse(numeric.as_deref().unwrap_or(raw), &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Duration::try_from(delta).ok();
		}
	}

	None
}
