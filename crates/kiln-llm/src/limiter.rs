//! Token-bucket rate limiting that never blocks the async scheduler:
//! acquisition is a plain `.await` on a `tokio::sync::Semaphore`, and a
//! background task refills permits on a `tokio::time::interval` tick —
//! the same idle-poll actor shape used elsewhere in the corpus for
//! background bookkeeping alongside a command loop, just without the
//! command side since this task has nothing to react to but the clock.

use std::sync::Arc;
use std::time::Duration;

use kiln_config::RateLimitConfig;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;

pub struct RateLimiter {
	semaphore: Arc<Semaphore>,
	refill_task: JoinHandle<()>,
}

impl RateLimiter {
	pub fn new(config: RateLimitConfig) -> Self {
		let burst = config.burst.max(1) as usize;
		let semaphore = Arc::new(Semaphore::new(burst));
		let refill_period = Duration::from_secs_f64(60.0 / f64::from(config.requests_per_minute.max(1)));

		let sem = semaphore.clone();
		let refill_task = tokio::spawn(async move {
			let mut tick = interval(refill_period);
			loop {
				tick.tick().await;
				if sem.available_permits() < burst {
					sem.add_permits(1);
				}
			}
		});

		Self { semaphore, refill_task }
	}

	/// Acquires one permit, honoring cancellation. Never blocks a
	/// worker thread: both arms of the select are async waits.
	pub async fn acquire(&self, cancellation: &CancellationToken) -> Result<SemaphorePermit<'_>, LlmError> {
		tokio::select! {
			biased;
			_ = cancellation.cancelled() => Err(LlmError::Cancelled),
			permit = self.semaphore.acquire() => Ok(permit.expect("rate limiter semaphore is never closed")),
		}
	}
}

impl Drop for RateLimiter {
	fn drop(&mut self) {
		self.refill_task.abort();
	}
}

#[cfg(test)]
mod tests {
	use std::time::Instant;

	use super::*;

	#[tokio::test]
	async fn acquisition_does_not_block_other_tasks() {
		let limiter = RateLimiter::new(RateLimitConfig { requests_per_minute: 60, burst: 1 });
		let cancellation = CancellationToken::new();
		let _permit = limiter.acquire(&cancellation).await.unwrap();

		// With the single permit held, a concurrently scheduled task must
		// still get to run promptly: the semaphore wait never blocks the
		// executor thread.
		let progressed = Arc::new(std::sync::atomic::AtomicBool::new(false));
		let flag = progressed.clone();
		tokio::spawn(async move {
			flag.store(true, std::sync::atomic::Ordering::SeqCst);
		});

		let start = Instant::now();
		while !progressed.load(std::sync::atomic::Ordering::SeqCst) && start.elapsed() < Duration::from_secs(1) {
			tokio::task::yield_now().await;
		}
		assert!(progressed.load(std::sync::atomic::Ordering::SeqCst));
	}

	#[tokio::test]
	async fn cancellation_interrupts_a_pending_acquire() {
		let limiter = RateLimiter::new(RateLimitConfig { requests_per_minute: 60, burst: 1 });
		let cancellation = CancellationToken::new();
		let _held = limiter.acquire(&cancellation).await.unwrap();

		cancellation.cancel();
		let err = limiter.acquire(&cancellation).await.unwrap_err();
		assert!(matches!(err, LlmError::Cancelled));
	}
}
