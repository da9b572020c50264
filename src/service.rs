//! Menu service facade: the single entry point the routing layer calls.
//!
//! [`MenuService::fetch_menu`] derives the cache key, consults the single-flight cache, and on a
//! miss fetches the raw payload through the retrying transport, transforms it, and stores the
//! resulting view. Every upstream failure is absorbed here and logged; callers always receive a
//! displayable [`MenuView`].

// self
use crate::{
	_prelude::*,
	auth::TokenAuthenticator,
	cache::{FlightMetrics, FlightSettings, SingleFlightCache},
	config::MenuConfig,
	error::{TransportError, TransportErrorKind},
	http::{self, MenuHttpClient},
	limit::RateLimiter,
	menu::{self, Language, MenuKey, MenuTransformer, MenuView},
	transport::{RetryPolicy, RetryingTransport},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Service specialized for the crate's default reqwest transport.
pub type ReqwestMenuService = MenuService<ReqwestHttpClient>;

/// Serves daily menus for one upstream site/menu pair.
///
/// The service owns every piece of mutable client state (bearer token, rate bucket, cache
/// entries, and single-flight guards), each behind its own lock. Share it behind an [`Arc`].
pub struct MenuService<C>
where
	C: ?Sized + MenuHttpClient,
{
	transport: RetryingTransport<C>,
	cache: SingleFlightCache<MenuKey, MenuView>,
	menu_url: Url,
	site_name: String,
	menu_name: String,
	cache_ttl: Duration,
}
impl<C> MenuService<C>
where
	C: ?Sized + MenuHttpClient,
{
	/// Creates a service that sends every upstream request through `http_client`.
	pub fn with_http_client(config: &MenuConfig, http_client: impl Into<Arc<C>>) -> Result<Self> {
		let http_client = http_client.into();
		let limiter = Arc::new(RateLimiter::per_second(config.rate_limit)?);
		let authenticator = TokenAuthenticator::new(
			&config.base_url,
			config.credentials.clone(),
			http_client.clone(),
		)?;
		let menu_url = http::join_path(
			&config.base_url,
			["public", "publicmenu", "dates", config.site_name.as_str()],
		)?;

		tracing::debug!(%menu_url, rate_limit = config.rate_limit, "Menu service configured.");

		Ok(Self {
			transport: RetryingTransport::new(http_client, authenticator, limiter),
			cache: SingleFlightCache::new(),
			menu_url,
			site_name: config.site_name.clone(),
			menu_name: config.menu_name.clone(),
			cache_ttl: config.cache_ttl,
		})
	}

	/// Overrides the upstream retry schedule.
	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.transport = self.transport.with_policy(policy);

		self
	}

	/// Overrides how long concurrent callers wait for an in-flight fetch.
	pub fn with_flight_settings(mut self, settings: FlightSettings) -> Self {
		self.cache = SingleFlightCache::with_settings(settings);

		self
	}

	/// Cache lookup counters.
	pub fn flight_metrics(&self) -> &FlightMetrics {
		self.cache.metrics()
	}

	/// Drops expired cache entries; returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		self.cache.purge_expired()
	}

	/// Returns the menu for an ISO-8601 `date` in `language`.
	///
	/// Unknown languages fall back to English. An unparsable date yields today's
	/// "No menu available" view.
	pub async fn fetch_menu(&self, date: &str, language: &str) -> MenuView {
		let language = Language::from_code(language);

		match menu::parse_iso_date(date) {
			Ok(date) => self.fetch_menu_on(date, language).await,
			Err(err) => {
				tracing::warn!(date, error = %err, "Rejected a menu request with an invalid date.");

				MenuView::unavailable(today(), language)
			},
		}
	}

	/// Returns today's menu (UTC calendar date) in `language`.
	pub async fn fetch_today(&self, language: &str) -> MenuView {
		self.fetch_menu_on(today(), Language::from_code(language)).await
	}

	/// Returns the menu for `date` in an already normalized `language`.
	pub async fn fetch_menu_on(&self, date: Date, language: Language) -> MenuView {
		let key = MenuKey::new(self.site_name.as_str(), date, language);

		self.cache
			.get_or_compute(
				key,
				self.cache_ttl,
				|| self.load(date, language),
				|| MenuView::unavailable(date, language),
			)
			.await
			.into_value()
	}

	/// Upstream URL for `date`.
	pub fn menu_url_for(&self, date: Date) -> Url {
		let mut url = self.menu_url.clone();

		url.query_pairs_mut()
			.append_pair("dates", &date.to_string())
			.append_pair("menu", &self.menu_name);

		url
	}

	/// Fetches and transforms one menu; `None` is a negative result that must not be cached.
	async fn load(&self, date: Date, language: Language) -> Option<MenuView> {
		let url = self.menu_url_for(date);

		match self.transport.get(&url).await {
			Ok(raw) => {
				let view = MenuTransformer::transform(&raw, date, language);

				if view.is_unavailable() {
					tracing::info!(%date, %language, "Upstream has no menu for the requested day.");

					None
				} else {
					Some(view)
				}
			},
			Err(err) => {
				log_failure(&err, date);

				None
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl MenuService<ReqwestHttpClient> {
	/// Creates a service backed by a freshly built reqwest client.
	pub fn from_config(config: &MenuConfig) -> Result<Self> {
		Self::with_http_client(config, ReqwestHttpClient::try_new()?)
	}
}
impl<C> Debug for MenuService<C>
where
	C: ?Sized + MenuHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MenuService")
			.field("transport", &self.transport)
			.field("menu_url", &self.menu_url.as_str())
			.field("site_name", &self.site_name)
			.field("menu_name", &self.menu_name)
			.field("cache_ttl", &self.cache_ttl)
			.finish()
	}
}

fn today() -> Date {
	OffsetDateTime::now_utc().date()
}

fn log_failure(err: &Error, date: Date) {
	match err {
		Error::Transport(err) => match err.kind() {
			TransportErrorKind::RateLimitedExhausted => tracing::warn!(
				%date,
				kind = %err.kind(),
				error = %err,
				"Upstream capacity exhausted; serving the placeholder menu."
			),
			TransportErrorKind::NetworkError => tracing::warn!(
				%date,
				kind = %err.kind(),
				error = %err,
				"Upstream unreachable; serving the placeholder menu."
			),
			TransportErrorKind::AuthRejected | TransportErrorKind::MalformedResponse => {
				let preview = match err {
					TransportError::MalformedResponse { preview, .. } => preview.as_str(),
					_ => "",
				};

				tracing::error!(
					%date,
					kind = %err.kind(),
					error = %err,
					preview,
					"Upstream menu request failed; serving the placeholder menu."
				)
			},
		},
		Error::Auth(err) =>
			tracing::error!(%date, error = %err, "Upstream login failed; serving the placeholder menu."),
		Error::Config(err) =>
			tracing::error!(%date, error = %err, "Menu request is misconfigured."),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		config::Credentials,
		http::{HttpClientError, HttpFuture, HttpRequest, HttpResponse},
	};

	#[derive(Default)]
	struct Unreachable {
		calls: Mutex<u32>,
	}
	impl MenuHttpClient for Unreachable {
		fn send(&self, _: HttpRequest) -> HttpFuture<'_, HttpResponse> {
			*self.calls.lock() += 1;

			Box::pin(async { Err(HttpClientError::Timeout(Duration::from_secs(5))) })
		}
	}

	fn service(client: Arc<Unreachable>) -> MenuService<Unreachable> {
		let config = MenuConfig::new(
			Url::parse("https://menu.example.com/api/").expect("Fixture URL should parse."),
			"lunch menu",
			"campus",
			Credentials::new("tf", "kitchen", "hunter2"),
		);

		MenuService::with_http_client(&config, client)
			.expect("Service should build from a valid config.")
			.with_policy(RetryPolicy {
				max_attempts: 1,
				max_jitter: Duration::ZERO,
				..RetryPolicy::default()
			})
	}

	#[test]
	fn menu_url_carries_site_date_and_menu() {
		let service = service(Default::default());

		assert_eq!(
			service.menu_url_for(macros::date!(2025 - 01 - 06)).as_str(),
			"https://menu.example.com/api/public/publicmenu/dates/campus?dates=2025-01-06&menu=lunch+menu"
		);
	}

	#[tokio::test]
	async fn invalid_dates_short_circuit_to_today() {
		let client = Arc::new(Unreachable::default());
		let view = service(client.clone()).fetch_menu("next tuesday", "SV").await;

		assert_eq!(view.day(), today().to_string());
		assert_eq!(view.day_name(), Language::Sv.weekday_name(today().weekday()));
		assert!(view.is_unavailable());
		assert_eq!(*client.calls.lock(), 0);
	}

	#[tokio::test]
	async fn failures_are_absorbed_and_not_cached() {
		let client = Arc::new(Unreachable::default());
		let service = service(client.clone());

		for _ in 0..2 {
			let view = service.fetch_menu("2025-01-06", "klingon").await;

			assert_eq!(view.day_name(), "Monday");
			assert!(view.is_unavailable());
		}

		assert_eq!(*client.calls.lock(), 2);
		assert_eq!(service.flight_metrics().fallbacks(), 2);
		assert_eq!(service.purge_expired(), 0);
	}
}
