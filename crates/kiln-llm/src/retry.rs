//! Exponential backoff with jitter over a fixed attempt budget. Small
//! enough (no external backoff crate pulled in for it) and deliberately
//! generic over the error type so both generation and embedding calls
//! share it.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}

impl Default for RetryBudget {
	fn default() -> Self {
		Self { max_attempts: 5, base_delay: Duration::from_millis(200), max_delay: Duration::from_secs(30) }
	}
}

/// The delay before retry attempt `attempt` (1-indexed): `base * 2^(attempt-1)`,
/// capped at `max_delay`, plus up to 50% jitter so many concurrent callers
/// retrying together don't land on the same instant.
pub fn backoff_delay(budget: &RetryBudget, attempt: u32) -> Duration {
	let exp = budget.base_delay.saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX));
	let capped = exp.min(budget.max_delay);
	let jitter_frac: f64 = rand::rng().random_range(0.0..0.5);
	capped.mul_f64(1.0 + jitter_frac)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn delay_grows_with_attempt_number() {
		let budget = RetryBudget { max_attempts: 10, base_delay: Duration::from_millis(100), max_delay: Duration::from_secs(60) };
		let d1 = backoff_delay(&budget, 1).as_millis();
		let d3 = backoff_delay(&budget, 3).as_millis();
		// attempt 3's *minimum* (no jitter) is 400ms, attempt 1's *maximum* (full jitter) is 150ms.
		assert!(d3 >= 400);
		assert!(d1 <= 150);
	}

	#[test]
	fn delay_never_exceeds_max_delay_plus_jitter_bound() {
		let budget = RetryBudget { max_attempts: 20, base_delay: Duration::from_millis(100), max_delay: Duration::from_secs(1) };
		let d = backoff_delay(&budget, 20);
		assert!(d <= Duration::from_secs(1).mul_f64(1.5));
	}
}
