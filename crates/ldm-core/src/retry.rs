// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry-with-jitter for composed orchestrators (spec §7 "Propagation
//! policy": "Composite orchestrators may catch `Transient` and retry their
//! own transaction up to a small bound (default 3) with jitter").
//!
//! Grounded on the teacher's `loom-common-http::retry` module — same
//! exponential-backoff-plus-jitter shape, generalized from "HTTP request
//! that returns a retryable status code" to "repository call that returns
//! `LdmError::Transient`". Only `Transient` is ever retried (spec §7 "All
//! other kinds propagate to the caller"); every other `LdmError` variant
//! returns on the first attempt.

use std::time::Duration;

use ldm_types::LdmError;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
}

impl Default for RetryConfig {
	/// Spec §7: "up to a small bound (default 3) with jitter".
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(50),
			max_delay: Duration::from_secs(2),
			backoff_factor: 2.0,
		}
	}
}

impl RetryConfig {
	/// Same as `Default` but with `max_attempts` driven by
	/// `DatabaseConfig::max_transient_retries` rather than the spec default.
	pub fn with_max_attempts(max_attempts: u32) -> Self {
		Self { max_attempts, ..Self::default() }
	}
}

fn calculate_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
	let exponential_delay = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
	let capped_delay = exponential_delay.min(cfg.max_delay.as_secs_f64());
	let jitter_factor = 0.5 + fastrand::f64();
	Duration::from_secs_f64(capped_delay * jitter_factor)
}

/// Runs `f`, retrying its own transaction on `LdmError::Transient` up to
/// `cfg.max_attempts` times. Any other error kind propagates immediately
/// (spec §7).
pub async fn retry_transient<F, Fut, T>(cfg: &RetryConfig, mut f: F) -> Result<T, LdmError>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<T, LdmError>>,
{
	let mut attempt = 0;
	loop {
		match f().await {
			Ok(result) => return Ok(result),
			Err(err) => {
				if !err.is_retryable() {
					return Err(err);
				}
				attempt += 1;
				if attempt >= cfg.max_attempts {
					warn!(error = %err, attempt, max_attempts = cfg.max_attempts, "max retry attempts exhausted");
					return Err(err);
				}
				let delay = calculate_delay(cfg, attempt - 1);
				warn!(error = %err, attempt, delay_ms = delay.as_millis(), "retrying transaction after transient error");
				tokio::time::sleep(delay).await;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[tokio::test]
	async fn non_retryable_error_fails_immediately() {
		let count = Arc::new(AtomicU32::new(0));
		let c = Arc::clone(&count);
		let result: Result<(), LdmError> = retry_transient(&RetryConfig::default(), || {
			let c = Arc::clone(&c);
			async move {
				c.fetch_add(1, Ordering::SeqCst);
				Err(LdmError::NotFound("x".into()))
			}
		})
		.await;
		assert!(result.is_err());
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn transient_error_retries_up_to_max_attempts() {
		let count = Arc::new(AtomicU32::new(0));
		let c = Arc::clone(&count);
		let cfg = RetryConfig { max_attempts: 3, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), backoff_factor: 2.0 };
		let result: Result<(), LdmError> = retry_transient(&cfg, || {
			let c = Arc::clone(&c);
			async move {
				c.fetch_add(1, Ordering::SeqCst);
				Err(LdmError::Transient("db busy".into()))
			}
		})
		.await;
		assert!(result.is_err());
		assert_eq!(count.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn succeeds_after_transient_retries() {
		let count = Arc::new(AtomicU32::new(0));
		let c = Arc::clone(&count);
		let cfg = RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), backoff_factor: 2.0 };
		let result = retry_transient(&cfg, || {
			let c = Arc::clone(&c);
			async move {
				let current = c.fetch_add(1, Ordering::SeqCst);
				if current < 2 {
					Err(LdmError::Transient("db busy".into()))
				} else {
					Ok("ok")
				}
			}
		})
		.await;
		assert_eq!(result.unwrap(), "ok");
		assert_eq!(count.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn delay_respects_max_delay() {
		let cfg = RetryConfig { max_attempts: 10, base_delay: Duration::from_secs(1), max_delay: Duration::from_secs(2), backoff_factor: 10.0 };
		for attempt in 0..10 {
			let delay = calculate_delay(&cfg, attempt);
			assert!(delay <= Duration::from_secs_f64(2.0 * 1.5), "delay {delay:?} at attempt {attempt} exceeds max_delay with jitter headroom");
		}
	}
}
