//! Upstream login and bearer token lifecycle.
//!
//! The upstream issues opaque tokens without an advertised lifetime. The access layer therefore
//! refreshes reactively: [`TokenCell`] starts empty, the first request goes out unauthenticated,
//! and any 403 triggers a single [`TokenAuthenticator::authenticate`] call whose result replaces
//! the shared token.

pub mod token;

pub use token::*;

// self
use crate::{
	_prelude::*,
	config::Credentials,
	error::{AuthError, ConfigError},
	http::{self, HttpRequest, MenuHttpClient},
	obs::{self, CallKind, CallOutcome, CallSpan, CallStage},
};

/// Process-wide slot holding the current bearer token.
#[derive(Debug, Default)]
pub struct TokenCell(RwLock<AuthToken>);
impl TokenCell {
	/// Returns a snapshot of the current token (empty before the first login).
	pub fn current(&self) -> AuthToken {
		self.0.read().clone()
	}

	/// Replaces the current token.
	pub fn replace(&self, token: AuthToken) {
		*self.0.write() = token;
	}
}

/// Performs the `POST {base}/login` exchange.
///
/// Every call is a fresh network round trip; nothing is cached here. Callers decide when a new
/// token is needed and where to keep it.
pub struct TokenAuthenticator<C>
where
	C: ?Sized + MenuHttpClient,
{
	http_client: Arc<C>,
	login_url: Url,
	credentials: Credentials,
	timeout: Duration,
}
impl<C> TokenAuthenticator<C>
where
	C: ?Sized + MenuHttpClient,
{
	/// Creates an authenticator posting `credentials` to `{base_url}/login`.
	pub fn new(
		base_url: &Url,
		credentials: Credentials,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			http_client: http_client.into(),
			login_url: http::join_path(base_url, ["login"])?,
			credentials,
			timeout: HttpRequest::DEFAULT_TIMEOUT,
		})
	}

	/// Overrides the login request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Resolved login endpoint.
	pub fn login_url(&self) -> &Url {
		&self.login_url
	}

	/// Logs in and returns the token issued by the upstream.
	pub async fn authenticate(&self) -> Result<AuthToken, AuthError> {
		const KIND: CallKind = CallKind::Login;

		let span = CallSpan::new(KIND, CallStage::Reauthenticate);

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let body = serde_json::json!({
					"tenant": self.credentials.tenant,
					"publicApiUserName": self.credentials.username,
					"password": self.credentials.password.expose(),
				});
				let request = HttpRequest::post_json(self.login_url.clone(), &body)
					.with_timeout(self.timeout);
				let response = self.http_client.send(request).await.map_err(AuthError::Network)?;

				if !response.is_success() {
					return Err(AuthError::Rejected { status: response.status });
				}

				let mut de = serde_json::Deserializer::from_slice(&response.body);
				let parsed: LoginResponse = serde_path_to_error::deserialize(&mut de)
					.map_err(|source| AuthError::MalformedResponse { source })?;

				parsed
					.token
					.filter(|token| !token.is_empty())
					.map(AuthToken::new)
					.ok_or(AuthError::MissingToken)
			})
			.await;

		match &result {
			Ok(_) => {
				tracing::info!("Obtained a new upstream token.");
				obs::record_call_outcome(KIND, CallOutcome::Success);
			},
			Err(err) => {
				tracing::error!(error = %err, label = err.label(), "Upstream login failed.");
				obs::record_call_outcome(KIND, CallOutcome::Failure);
				obs::record_failure(KIND, err.label());
			},
		}

		result
	}
}
impl<C> Debug for TokenAuthenticator<C>
where
	C: ?Sized + MenuHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenAuthenticator")
			.field("login_url", &self.login_url.as_str())
			.field("credentials", &self.credentials)
			.finish()
	}
}

#[derive(Deserialize)]
struct LoginResponse {
	#[serde(default)]
	token: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::{HttpClientError, HttpFuture, HttpMethod, HttpResponse};

	struct ScriptedLogin {
		response: HttpResponse,
		seen: Mutex<Vec<HttpRequest>>,
	}
	impl ScriptedLogin {
		fn answering(status: u16, body: &str) -> Self {
			Self { response: HttpResponse::new(status, body), seen: Default::default() }
		}
	}
	impl MenuHttpClient for ScriptedLogin {
		fn send(&self, request: HttpRequest) -> HttpFuture<'_, HttpResponse> {
			self.seen.lock().push(request);

			let response = self.response.clone();

			Box::pin(async move { Ok::<_, HttpClientError>(response) })
		}
	}

	fn authenticator(client: Arc<ScriptedLogin>) -> TokenAuthenticator<ScriptedLogin> {
		let base = Url::parse("https://menu.example.com/api/").expect("Fixture URL should parse.");

		TokenAuthenticator::new(&base, Credentials::new("tf", "kitchen", "hunter2"), client)
			.expect("Authenticator should accept an https base URL.")
	}

	#[tokio::test]
	async fn authenticate_posts_credentials_and_reads_token() {
		let client = Arc::new(ScriptedLogin::answering(200, r#"{"token":"fresh"}"#));
		let token = authenticator(client.clone())
			.authenticate()
			.await
			.expect("Login with a token field should succeed.");

		assert_eq!(token.expose(), "fresh");

		let seen = client.seen.lock();
		let request = seen.first().expect("Login should issue exactly one request.");
		let body: serde_json::Value = serde_json::from_slice(
			request.body.as_deref().expect("Login request should carry a JSON body."),
		)
		.expect("Login body should be valid JSON.");

		assert_eq!(seen.len(), 1);
		assert_eq!(request.method, HttpMethod::Post);
		assert_eq!(request.url.as_str(), "https://menu.example.com/api/login");
		assert_eq!(
			body,
			serde_json::json!({
				"tenant": "tf",
				"publicApiUserName": "kitchen",
				"password": "hunter2",
			})
		);
	}

	#[tokio::test]
	async fn authenticate_classifies_failures() {
		let missing = authenticator(Arc::new(ScriptedLogin::answering(200, r#"{"user":"x"}"#)))
			.authenticate()
			.await
			.expect_err("A response without token should fail.");

		assert!(matches!(missing, AuthError::MissingToken));
		assert_eq!(missing.label(), "missing_token");

		let malformed = authenticator(Arc::new(ScriptedLogin::answering(200, "<html>")))
			.authenticate()
			.await
			.expect_err("A non-JSON response should fail.");

		assert!(matches!(malformed, AuthError::MalformedResponse { .. }));

		let rejected = authenticator(Arc::new(ScriptedLogin::answering(401, "")))
			.authenticate()
			.await
			.expect_err("A non-success status should fail.");

		assert!(matches!(rejected, AuthError::Rejected { status: 401 }));
	}

	#[test]
	fn token_cell_starts_empty_and_replaces() {
		let cell = TokenCell::default();

		assert!(cell.current().is_empty());

		cell.replace(AuthToken::new("abc"));

		assert_eq!(cell.current().expose(), "abc");
	}
}
