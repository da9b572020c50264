//! Token-bucket gate applied before every upstream call.
//!
//! Refill happens lazily at acquisition time (`tokens = min(capacity, tokens + elapsed * rate)`),
//! so the bucket needs no background timer. Time is read from [`tokio::time::Instant`], which
//! lets tests drive the bucket with a paused clock.

// self
use crate::{_prelude::*, error::ConfigError};

/// Bucket state guarded by [`RateLimiter`].
///
/// Invariant: `0 <= tokens <= capacity`.
#[derive(Clone, Debug)]
pub struct RateBucket {
	capacity: f64,
	tokens: f64,
	fill_rate: f64,
	last_refill: Instant,
}
impl RateBucket {
	fn refill(&mut self, now: Instant) {
		let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

		self.tokens = (self.tokens + elapsed * self.fill_rate).min(self.capacity);
		self.last_refill = now;
	}

	/// Consumes one token, or reports how long until one accrues.
	fn take(&mut self, now: Instant) -> Result<(), Duration> {
		self.refill(now);

		if self.tokens >= 1. {
			self.tokens -= 1.;

			Ok(())
		} else {
			Err(Duration::from_secs_f64((1. - self.tokens) / self.fill_rate))
		}
	}
}

/// Process-wide token bucket shared by every upstream call.
#[derive(Debug)]
pub struct RateLimiter {
	bucket: Mutex<RateBucket>,
}
impl RateLimiter {
	/// Creates a full bucket holding `capacity` tokens and refilling `fill_rate` tokens per
	/// second.
	pub fn new(capacity: u32, fill_rate: f64) -> Result<Self, ConfigError> {
		if !fill_rate.is_finite() || fill_rate <= 0. {
			return Err(ConfigError::InvalidRateLimit { rate: fill_rate });
		}

		let capacity = f64::from(capacity.max(1));

		Ok(Self {
			bucket: Mutex::new(RateBucket {
				capacity,
				tokens: capacity,
				fill_rate,
				last_refill: Instant::now(),
			}),
		})
	}

	/// Creates a bucket whose capacity matches one second worth of `rate` (at least one token).
	pub fn per_second(rate: f64) -> Result<Self, ConfigError> {
		let capacity = if rate.is_finite() && rate > 1. { rate.ceil() as u32 } else { 1 };

		Self::new(capacity, rate)
	}

	/// Waits until a token is available, then consumes it. Never fails.
	pub async fn acquire(&self) {
		loop {
			let wait = match self.bucket.lock().take(Instant::now()) {
				Ok(()) => return,
				Err(wait) => wait,
			};

			tracing::trace!(?wait, "Rate limiter is empty; waiting for a token.");
			tokio::time::sleep(wait).await;
		}
	}

	/// Consumes a token if one is available right now.
	pub fn try_acquire(&self) -> bool {
		self.bucket.lock().take(Instant::now()).is_ok()
	}

	/// Tokens currently available, after applying the lazy refill.
	pub fn available(&self) -> f64 {
		let mut bucket = self.bucket.lock();

		bucket.refill(Instant::now());

		bucket.tokens
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn try_acquire_drains_then_refills_continuously() {
		let limiter = RateLimiter::new(2, 4.).expect("Positive rate should be accepted.");

		assert!(limiter.try_acquire());
		assert!(limiter.try_acquire());
		assert!(!limiter.try_acquire());

		tokio::time::advance(Duration::from_millis(125)).await;

		// Half a token has accrued; not enough yet.
		assert!(!limiter.try_acquire());

		tokio::time::advance(Duration::from_millis(125)).await;

		assert!(limiter.try_acquire());

		tokio::time::advance(Duration::from_secs(10)).await;

		assert_eq!(limiter.available(), 2.);
	}

	#[tokio::test(start_paused = true)]
	async fn acquire_waits_for_the_next_token() {
		let limiter = RateLimiter::new(1, 2.).expect("Positive rate should be accepted.");
		let started = Instant::now();

		limiter.acquire().await;

		assert_eq!(started.elapsed(), Duration::ZERO);

		limiter.acquire().await;

		assert!(started.elapsed() >= Duration::from_millis(500));
		assert!(started.elapsed() < Duration::from_millis(600));
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_acquirers_are_spread_by_fill_rate() {
		let limiter = Arc::new(RateLimiter::new(1, 10.).expect("Positive rate should be accepted."));
		let started = Instant::now();
		let handles = (0..5)
			.map(|_| {
				let limiter = limiter.clone();

				tokio::spawn(async move { limiter.acquire().await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			handle.await.expect("Acquirer task should not panic.");
		}

		assert!(started.elapsed() >= Duration::from_millis(400));
		assert!(limiter.available() < 1.);
	}

	#[test]
	fn rejects_non_positive_rates() {
		assert!(matches!(RateLimiter::new(1, 0.), Err(ConfigError::InvalidRateLimit { .. })));
		assert!(matches!(
			RateLimiter::per_second(f64::NAN),
			Err(ConfigError::InvalidRateLimit { .. })
		));
	}

	#[test]
	fn per_second_sizes_capacity_from_rate() {
		let limiter = RateLimiter::per_second(3.).expect("Positive rate should be accepted.");

		assert_eq!(limiter.bucket.lock().capacity, 3.);
	}
}
