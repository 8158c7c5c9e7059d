// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry of transactions that lost a race.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use warden_core::AccessError;

/// Errors that know whether repeating the operation may succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for AccessError {
	fn is_retryable(&self) -> bool {
		AccessError::is_retryable(self)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
	/// Total attempts, including the first.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			base_delay: Duration::from_millis(10),
			max_delay: Duration::from_millis(200),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Delay before the retry that follows attempt `attempt` (1-based).
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(16) as i32;
		let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
		let capped = scaled.min(self.max_delay.as_secs_f64()).max(0.0);

		let secs = if self.jitter {
			capped / 2.0 + fastrand::f64() * capped / 2.0
		} else {
			capped
		};
		Duration::from_secs_f64(secs)
	}
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is used up.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + Display,
{
	let mut attempt: u32 = 1;
	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(e) if e.is_retryable() && attempt < config.max_attempts => {
				let delay = config.delay_for(attempt);
				tracing::debug!(
					attempt,
					delay_ms = delay.as_millis() as u64,
					error = %e,
					"retrying after conflict"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(e) => {
				if e.is_retryable() {
					tracing::warn!(attempts = attempt, error = %e, "giving up after repeated conflicts");
				}
				return Err(e);
			}
		}
	}
}
