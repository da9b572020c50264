//! TTL cache with per-key single-flight coordination.
//!
//! [`SingleFlightCache::get_or_compute`] guarantees at most one concurrent compute per key in
//! this process. The first caller for a missing key wins a non-blocking `try_lock` on the
//! key's guard and runs the compute function; concurrent callers poll the cache until a value
//! appears, the winner finishes empty-handed, or the wait window closes, and then fall back to
//! a caller-supplied default instead of issuing a redundant compute.
//!
//! Only values produced by a successful compute are stored. Entries are snapshots: reads and
//! writes clone at the boundary, so callers never observe each other's mutations.

mod metrics;

pub use metrics::FlightMetrics;

// self
use crate::_prelude::*;

/// Stored value plus its expiry instant.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
	/// Cached snapshot.
	pub value: V,
	/// Instant after which the entry is treated as absent.
	pub expires_at: Instant,
}
impl<V> CacheEntry<V> {
	/// Creates an entry that lives for `ttl` from `now`.
	pub fn new(value: V, now: Instant, ttl: Duration) -> Self {
		Self { value, expires_at: now + ttl }
	}

	/// Whether the entry is past its expiry at `now`.
	pub fn is_expired_at(&self, now: Instant) -> bool {
		now > self.expires_at
	}
}

/// How a [`SingleFlightCache::get_or_compute`] call was served.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlightOutcome<V> {
	/// A live entry was already cached.
	Cached(V),
	/// This caller ran the compute function and stored its value.
	Computed(V),
	/// This caller waited for a peer's compute and read the stored value.
	Joined(V),
	/// No value was produced in time; the fallback was used and nothing was stored.
	Fallback(V),
}
impl<V> FlightOutcome<V> {
	/// Borrows the carried value.
	pub fn value(&self) -> &V {
		match self {
			Self::Cached(value) | Self::Computed(value) | Self::Joined(value) | Self::Fallback(value) =>
				value,
		}
	}

	/// Unwraps the carried value.
	pub fn into_value(self) -> V {
		match self {
			Self::Cached(value) | Self::Computed(value) | Self::Joined(value) | Self::Fallback(value) =>
				value,
		}
	}

	/// Whether the fallback was used.
	pub fn is_fallback(&self) -> bool {
		matches!(self, Self::Fallback(_))
	}
}

/// Waiting behavior for callers that lose the single-flight race.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlightSettings {
	/// Longest time a waiter polls for a peer's result.
	pub wait_timeout: Duration,
	/// Sleep between polls.
	pub poll_interval: Duration,
}
impl Default for FlightSettings {
	fn default() -> Self {
		Self { wait_timeout: Duration::from_secs(10), poll_interval: Duration::from_millis(50) }
	}
}

/// TTL cache whose misses are coalesced per key.
#[derive(Debug)]
pub struct SingleFlightCache<K, V> {
	entries: RwLock<HashMap<K, CacheEntry<V>>>,
	guards: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
	settings: FlightSettings,
	metrics: FlightMetrics,
}
impl<K, V> SingleFlightCache<K, V>
where
	K: Clone + Debug + Eq + Hash,
	V: Clone,
{
	/// Creates an empty cache with default [`FlightSettings`].
	pub fn new() -> Self {
		Self::with_settings(FlightSettings::default())
	}

	/// Creates an empty cache with custom waiting behavior.
	pub fn with_settings(settings: FlightSettings) -> Self {
		Self {
			entries: Default::default(),
			guards: Default::default(),
			settings,
			metrics: Default::default(),
		}
	}

	/// Lookup counters.
	pub fn metrics(&self) -> &FlightMetrics {
		&self.metrics
	}

	/// Number of stored entries, expired ones included until they are dropped.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Whether nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Returns a copy of the live value for `key`, lazily dropping it if expired.
	pub fn get(&self, key: &K) -> Option<V> {
		let now = Instant::now();

		{
			let entries = self.entries.read();

			match entries.get(key) {
				Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut entries = self.entries.write();

		if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
			entries.remove(key);
		}

		None
	}

	/// Stores a copy of `value` for `ttl`.
	pub fn insert(&self, key: K, value: V, ttl: Duration) {
		self.entries.write().insert(key, CacheEntry::new(value, Instant::now(), ttl));
	}

	/// Drops every expired entry and returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let mut entries = self.entries.write();
		let before = entries.len();

		entries.retain(|_, entry| !entry.is_expired_at(now));

		before - entries.len()
	}

	/// Returns the cached value for `key`, computing it at most once across concurrent callers.
	///
	/// `compute` returning `None` is a negative result: nothing is stored and `fallback`
	/// provides the answer.
	pub async fn get_or_compute<F, Fut, D>(
		&self,
		key: K,
		ttl: Duration,
		compute: F,
		fallback: D,
	) -> FlightOutcome<V>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Option<V>>,
		D: FnOnce() -> V,
	{
		if let Some(value) = self.get(&key) {
			tracing::debug!(?key, "Cache hit.");
			self.metrics.record_hit();

			return FlightOutcome::Cached(value);
		}

		let guard = self.guard(&key);
		let Some(flight) = guard.try_lock() else {
			tracing::debug!(?key, "Joining an in-flight computation.");

			let outcome = self.wait_for_peer(&key, &guard, fallback).await;

			self.release_guard(&key, &guard);

			return outcome;
		};
		// A peer may have stored the value between our miss and the lock.
		let outcome = if let Some(value) = self.get(&key) {
			self.metrics.record_hit();

			FlightOutcome::Cached(value)
		} else {
			tracing::debug!(?key, "Cache miss; computing.");
			self.metrics.record_compute();

			match compute().await {
				Some(value) => {
					self.insert(key.clone(), value.clone(), ttl);

					FlightOutcome::Computed(value)
				},
				None => {
					self.metrics.record_fallback();

					FlightOutcome::Fallback(fallback())
				},
			}
		};

		drop(flight);
		self.release_guard(&key, &guard);

		outcome
	}

	async fn wait_for_peer<D>(&self, key: &K, guard: &AsyncMutex<()>, fallback: D) -> FlightOutcome<V>
	where
		D: FnOnce() -> V,
	{
		let deadline = Instant::now() + self.settings.wait_timeout;

		loop {
			tokio::time::sleep(self.settings.poll_interval).await;

			if let Some(value) = self.get(key) {
				self.metrics.record_join();

				return FlightOutcome::Joined(value);
			}
			if guard.try_lock().is_some() {
				// The peer released the guard; it either stored a value just now or failed.
				if let Some(value) = self.get(key) {
					self.metrics.record_join();

					return FlightOutcome::Joined(value);
				}

				tracing::debug!(?key, "In-flight computation finished without a value.");

				break;
			}
			if Instant::now() >= deadline {
				tracing::warn!(
					?key,
					timeout = ?self.settings.wait_timeout,
					"Gave up waiting for an in-flight computation."
				);

				break;
			}
		}

		self.metrics.record_fallback();

		FlightOutcome::Fallback(fallback())
	}

	/// Returns (and creates on demand) the single-flight guard for `key`.
	fn guard(&self, key: &K) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Drops the table's guard for `key` once nobody but the table and the caller holds it.
	fn release_guard(&self, key: &K, guard: &Arc<AsyncMutex<()>>) {
		let mut guards = self.guards.lock();

		if Arc::strong_count(guard) <= 2
			&& guards.get(key).is_some_and(|stored| Arc::ptr_eq(stored, guard))
		{
			guards.remove(key);
		}
	}
}
impl<K, V> Default for SingleFlightCache<K, V>
where
	K: Clone + Debug + Eq + Hash,
	V: Clone,
{
	fn default() -> Self {
		Self::new()
	}
}
