// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing how [`SingleFlightCache`](super::SingleFlightCache) lookups
/// were served.
#[derive(Debug, Default)]
pub struct FlightMetrics {
	hits: AtomicU64,
	computes: AtomicU64,
	joins: AtomicU64,
	fallbacks: AtomicU64,
}
impl FlightMetrics {
	/// Lookups answered from a live cache entry.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Compute functions actually invoked.
	pub fn computes(&self) -> u64 {
		self.computes.load(Ordering::Relaxed)
	}

	/// Lookups answered by waiting on a peer's in-flight computation.
	pub fn joins(&self) -> u64 {
		self.joins.load(Ordering::Relaxed)
	}

	/// Lookups answered with the caller-supplied fallback.
	pub fn fallbacks(&self) -> u64 {
		self.fallbacks.load(Ordering::Relaxed)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_compute(&self) {
		self.computes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_join(&self) {
		self.joins.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fallback(&self) {
		self.fallbacks.fetch_add(1, Ordering::Relaxed);
	}
}
