// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database configuration loaded from the environment.

use std::env;
use std::time::Duration;

/// Connection and tuning parameters for both backends.
///
/// Only the fields relevant to the mode actually in use are read by the
/// factory (spec §4.6): a deployment running exclusively offline never
/// needs `online_url` to resolve to a live Postgres instance.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	/// Postgres connection string for the online backend.
	pub online_url: String,
	/// Filesystem path (or `sqlite::memory:`) for the offline backend.
	pub offline_path: String,
	/// Max connections held by each pool.
	pub max_connections: u32,
	/// Default trash retention window (spec §4.4.8, default 30 days).
	pub trash_retention_days: i64,
	/// Modulus applied when deriving negative local IDs (spec §4.2, 10^9).
	pub negative_id_modulus: i64,
	/// Bound on composite-orchestrator retries for `Transient` errors (spec §7).
	pub max_transient_retries: u32,
	/// Per-attempt timeout applied to pool acquisition.
	pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			online_url: "postgres://localhost/ldm".to_string(),
			offline_path: "sqlite://./ldm-offline.db".to_string(),
			max_connections: 10,
			trash_retention_days: 30,
			negative_id_modulus: 1_000_000_000,
			max_transient_retries: 3,
			connect_timeout: Duration::from_secs(10),
		}
	}
}

impl DatabaseConfig {
	/// Load from environment variables, falling back to defaults for any
	/// that are unset.
	///
	/// Recognized variables: `LDM_ONLINE_URL`, `LDM_OFFLINE_PATH`,
	/// `LDM_DB_MAX_CONNECTIONS`, `LDM_TRASH_RETENTION_DAYS`,
	/// `LDM_NEGATIVE_ID_MODULUS`, `LDM_MAX_TRANSIENT_RETRIES`.
	pub fn from_env() -> Self {
		let defaults = Self::default();
		Self {
			online_url: env::var("LDM_ONLINE_URL").unwrap_or(defaults.online_url),
			offline_path: env::var("LDM_OFFLINE_PATH").unwrap_or(defaults.offline_path),
			max_connections: env::var("LDM_DB_MAX_CONNECTIONS")
				.ok()
				.and_then(|v| v.parse().ok())
				.unwrap_or(defaults.max_connections),
			trash_retention_days: env::var("LDM_TRASH_RETENTION_DAYS")
				.ok()
				.and_then(|v| v.parse().ok())
				.unwrap_or(defaults.trash_retention_days),
			negative_id_modulus: env::var("LDM_NEGATIVE_ID_MODULUS")
				.ok()
				.and_then(|v| v.parse().ok())
				.unwrap_or(defaults.negative_id_modulus),
			max_transient_retries: env::var("LDM_MAX_TRANSIENT_RETRIES")
				.ok()
				.and_then(|v| v.parse().ok())
				.unwrap_or(defaults.max_transient_retries),
			..defaults
		}
	}
}
