// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use ldm_types::LdmError;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::PgPool;
use std::str::FromStr;

use crate::config::DatabaseConfig;

/// Connect the online (Postgres) pool.
#[tracing::instrument(skip(config))]
pub async fn create_online_pool(config: &DatabaseConfig) -> Result<PgPool, LdmError> {
	let pool = PgPoolOptions::new()
		.max_connections(config.max_connections)
		.acquire_timeout(config.connect_timeout)
		.connect(&config.online_url)
		.await?;

	tracing::debug!("online database pool created");
	Ok(pool)
}

/// Connect the offline (SQLite) pool with WAL mode, matching the teacher's
/// `create_pool` tuning.
///
/// Offline is a single-writer embedded store (spec §5): the pool is sized
/// small on purpose and every write serializes through SQLite's own locking.
#[tracing::instrument(skip(config))]
pub async fn create_offline_pool(config: &DatabaseConfig) -> Result<SqlitePool, LdmError> {
	let options = SqliteConnectOptions::from_str(&config.offline_path)
		.map_err(|e| LdmError::IntegrityViolation(format!("invalid offline database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(config.max_connections)
		.acquire_timeout(config.connect_timeout)
		.connect_with(options)
		.await?;

	tracing::debug!("offline database pool created");
	Ok(pool)
}
