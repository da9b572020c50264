//! Upstream access configuration loaded from env-style key/value sources.

// self
use crate::{_prelude::*, auth::AuthToken, error::ConfigError};

/// Requests per second granted to the upstream when `RATE_LIMIT` is unset.
pub const DEFAULT_RATE_LIMIT: f64 = 3.;
/// Cache lifetime applied when `MENU_CACHE_TTL_SECONDS` is unset.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
/// Tenant sent to the login endpoint when `API_TENANT` is unset.
pub const DEFAULT_TENANT: &str = "tf";

/// Login credentials posted to the upstream `/login` endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	/// Tenant identifier.
	pub tenant: String,
	/// Public API user name.
	pub username: String,
	/// Public API password; redacted in `Debug` output.
	pub password: AuthToken,
}
impl Credentials {
	/// Bundles tenant, user name, and password.
	pub fn new(
		tenant: impl Into<String>,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self {
			tenant: tenant.into(),
			username: username.into(),
			password: AuthToken::new(password),
		}
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("tenant", &self.tenant)
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Everything the access layer needs to reach one upstream site/menu pair.
#[derive(Clone, Debug)]
pub struct MenuConfig {
	/// Upstream API root; `/login` and `/public/...` are appended to it.
	pub base_url: Url,
	/// Menu identifier passed as the `menu` query parameter.
	pub menu_name: String,
	/// Site identifier used in the menu path and the cache key.
	pub site_name: String,
	/// Login credentials.
	pub credentials: Credentials,
	/// Token bucket fill rate in requests per second; also sets the bucket capacity.
	pub rate_limit: f64,
	/// Lifetime of a cached menu view.
	pub cache_ttl: Duration,
}
impl MenuConfig {
	/// Creates a configuration with default rate limit and cache TTL.
	pub fn new(
		base_url: Url,
		menu_name: impl Into<String>,
		site_name: impl Into<String>,
		credentials: Credentials,
	) -> Self {
		Self {
			base_url,
			menu_name: menu_name.into(),
			site_name: site_name.into(),
			credentials,
			rate_limit: DEFAULT_RATE_LIMIT,
			cache_ttl: DEFAULT_CACHE_TTL,
		}
	}

	/// Overrides the requests-per-second budget.
	pub fn with_rate_limit(mut self, rate: f64) -> Self {
		self.rate_limit = rate;

		self
	}

	/// Overrides the cache lifetime.
	pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;

		self
	}

	/// Loads configuration from the process environment.
	///
	/// # Environment Variables
	/// - `API_BASE_URL`, `MENU_NAME`, `SITE_NAME`, `API_USERNAME`, `API_PASSWORD` (required)
	/// - `API_TENANT` (default: `tf`)
	/// - `RATE_LIMIT` - requests per second (default: 3)
	/// - `MENU_CACHE_TTL_SECONDS` - cache lifetime (default: 60)
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Loads configuration from an arbitrary key/value lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let require = |key: &'static str| {
			lookup(key)
				.map(|value| value.trim().to_owned())
				.filter(|value| !value.is_empty())
				.ok_or(ConfigError::MissingVar { key })
		};
		let base_url = parse_base_url(&require("API_BASE_URL")?)?;
		let credentials = Credentials::new(
			lookup("API_TENANT")
				.filter(|value| !value.trim().is_empty())
				.unwrap_or_else(|| DEFAULT_TENANT.into()),
			require("API_USERNAME")?,
			require("API_PASSWORD")?,
		);
		let rate_limit = match lookup("RATE_LIMIT") {
			Some(raw) => parse_rate(&raw)?,
			None => DEFAULT_RATE_LIMIT,
		};
		let cache_ttl = match lookup("MENU_CACHE_TTL_SECONDS") {
			Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|err| {
				ConfigError::InvalidVar {
					key: "MENU_CACHE_TTL_SECONDS",
					value: raw.clone(),
					reason: err.to_string(),
				}
			})?),
			None => DEFAULT_CACHE_TTL,
		};

		Ok(Self {
			base_url,
			menu_name: require("MENU_NAME")?,
			site_name: require("SITE_NAME")?,
			credentials,
			rate_limit,
			cache_ttl,
		})
	}
}

/// Parses and validates the upstream root URL.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl { source })?;

	if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::UnsupportedBaseUrl { url: url.into() });
	}

	Ok(url)
}

fn parse_rate(raw: &str) -> Result<f64, ConfigError> {
	let rate = raw.trim().parse::<f64>().map_err(|err| ConfigError::InvalidVar {
		key: "RATE_LIMIT",
		value: raw.to_owned(),
		reason: err.to_string(),
	})?;

	if !rate.is_finite() || rate <= 0. {
		return Err(ConfigError::InvalidRateLimit { rate });
	}

	Ok(rate)
}
