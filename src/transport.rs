//! Authenticated, rate-limited GET with bounded retries.
//!
//! [`RetryingTransport::get`] separates the two upstream failure axes:
//!
//! - **403** means the token is stale. The transport logs in once, swaps the shared token, and
//!   retries; a second 403 is terminal ([`TransportError::AuthRejected`]).
//! - **429**, network failures, and 5xx mean the upstream is busy or unreachable. The transport
//!   sleeps for the `Retry-After` hint (429 only, capped at [`RetryPolicy::max_retry_after`]) or
//!   `base * 2^(attempt-1)`, plus uniform jitter in `[0, 1)` seconds, and retries until the
//!   attempt budget is spent.
//!
//! The re-authentication retry is granted on top of the attempt budget, so the very first call
//! of a process (which always goes out without a token) still enjoys the full retry schedule.
//! Every request, the login included, first takes a token from the shared [`RateLimiter`].

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{TokenAuthenticator, TokenCell},
	error::TransportError,
	http::{HttpRequest, HttpResponse, MenuHttpClient},
	limit::RateLimiter,
	obs::{self, CallKind, CallOutcome, CallSpan, CallStage, RetryReason},
};

/// Retry schedule knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
	/// Attempts spent on throttling/network/5xx failures before giving up.
	pub max_attempts: u32,
	/// Timeout applied to every individual request.
	pub request_timeout: Duration,
	/// First backoff step; doubled on each subsequent attempt.
	pub base_backoff: Duration,
	/// Upper bound (exclusive) of the uniform jitter added to each wait.
	pub max_jitter: Duration,
	/// Longest `Retry-After` hint honored; longer hints are clamped.
	///
	/// The single-flight leader sleeps while holding its key's guard, so this stays below the
	/// waiters' 10 second window.
	pub max_retry_after: Duration,
}
impl RetryPolicy {
	/// Exponential backoff before attempt `attempt + 1`: `base * 2^(attempt-1)`.
	pub fn backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(16);

		self.base_backoff.saturating_mul(1 << exponent)
	}

	/// Draws a jitter in `[0, max_jitter)`.
	pub fn jitter(&self) -> Duration {
		if self.max_jitter.is_zero() {
			return Duration::ZERO;
		}

		self.max_jitter.mul_f64(rand::random::<f64>())
	}

	/// Full wait before the next attempt, honoring an upstream hint (clamped) when present.
	pub fn wait_before_retry(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
		let base = match retry_after {
			Some(hint) => hint.min(self.max_retry_after),
			None => self.backoff(attempt),
		};

		base + self.jitter()
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			request_timeout: HttpRequest::DEFAULT_TIMEOUT,
			base_backoff: Duration::from_secs(1),
			max_jitter: Duration::from_secs(1),
			max_retry_after: Duration::from_secs(5),
		}
	}
}

/// Performs GETs through the rate limiter, refreshing the token on 403 and backing off on 429.
pub struct RetryingTransport<C>
where
	C: ?Sized + MenuHttpClient,
{
	http_client: Arc<C>,
	authenticator: TokenAuthenticator<C>,
	token: TokenCell,
	limiter: Arc<RateLimiter>,
	policy: RetryPolicy,
}
impl<C> RetryingTransport<C>
where
	C: ?Sized + MenuHttpClient,
{
	/// Creates a transport with the default [`RetryPolicy`] and an empty token.
	pub fn new(
		http_client: impl Into<Arc<C>>,
		authenticator: TokenAuthenticator<C>,
		limiter: Arc<RateLimiter>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			authenticator,
			token: TokenCell::default(),
			limiter,
			policy: RetryPolicy::default(),
		}
	}

	/// Overrides the retry schedule.
	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Active retry schedule.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Shared token slot.
	pub fn token(&self) -> &TokenCell {
		&self.token
	}

	/// Fetches `url` and parses the body as JSON.
	pub async fn get(&self, url: &Url) -> Result<Value> {
		const KIND: CallKind = CallKind::MenuFetch;

		let span = CallSpan::new(KIND, CallStage::Fetch);

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.get_with_retries(url)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(err) => {
				obs::record_call_outcome(KIND, CallOutcome::Failure);

				if let Error::Transport(err) = err {
					obs::record_failure(KIND, err.kind().as_str());
				}
			},
		}

		result
	}

	async fn get_with_retries(&self, url: &Url) -> Result<Value> {
		const KIND: CallKind = CallKind::MenuFetch;

		let max_attempts = self.policy.max_attempts.max(1);
		let mut attempt = 1;
		let mut refreshed = false;

		loop {
			self.limiter.acquire().await;

			let token = self.token.current();
			let mut request =
				HttpRequest::get(url.clone()).with_timeout(self.policy.request_timeout);

			if !token.is_empty() {
				request = request.with_header("authorization", token.expose());
			}

			let (retry_after, reason) = match self.http_client.send(request).await {
				Ok(response) if response.status == 403 => {
					if refreshed {
						tracing::error!("Upstream still answers 403 after a token refresh.");

						return Err(TransportError::AuthRejected { status: response.status }.into());
					}

					tracing::info!("Upstream rejected the token; logging in again.");
					obs::record_retry(KIND, RetryReason::Forbidden);

					self.limiter.acquire().await;

					let fresh = self.authenticator.authenticate().await?;

					self.token.replace(fresh);

					refreshed = true;

					continue;
				},
				Ok(response) if response.status == 429 => {
					if attempt >= max_attempts {
						tracing::warn!(
							attempts = attempt,
							"Upstream is still throttling; giving up."
						);

						return Err(TransportError::RateLimitedExhausted {
							attempts: attempt,
							retry_after: response.retry_after,
						}
						.into());
					}

					(response.retry_after, RetryReason::Throttled)
				},
				Ok(response) if response.status >= 500 => {
					if attempt >= max_attempts {
						return Err(TransportError::ServerError {
							attempts: attempt,
							status: response.status,
						}
						.into());
					}

					tracing::warn!(status = response.status, attempt, "Upstream server error.");

					(None, RetryReason::ServerError)
				},
				Ok(response) => return parse_body(response),
				Err(err) => {
					if attempt >= max_attempts {
						return Err(TransportError::Network { attempts: attempt, source: err }.into());
					}

					tracing::warn!(error = %err, attempt, "Upstream request failed.");

					(None, RetryReason::Network)
				},
			};
			let wait = self.policy.wait_before_retry(attempt, retry_after);

			tracing::debug!(?wait, ?retry_after, attempt, %reason, "Backing off before retrying.");
			obs::record_retry(KIND, reason);
			tokio::time::sleep(wait).await;

			attempt += 1;
		}
	}
}
impl<C> Debug for RetryingTransport<C>
where
	C: ?Sized + MenuHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RetryingTransport")
			.field("authenticator", &self.authenticator)
			.field("limiter", &self.limiter)
			.field("policy", &self.policy)
			.finish()
	}
}

fn parse_body(response: HttpResponse) -> Result<Value> {
	let malformed = |source| {
		let preview = response.body_preview();

		tracing::error!(status = response.status, %preview, "Upstream returned a malformed body.");

		TransportError::MalformedResponse { status: response.status, preview, source }
	};

	if !response.is_success() {
		return Err(malformed(None).into());
	}

	serde_json::from_slice(&response.body).map_err(|err| malformed(Some(err)).into())
}
