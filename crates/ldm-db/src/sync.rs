// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sync subscription tracking (spec §3 `sync_subscriptions`, a
//! SPEC_FULL supplement recovered from `original_source/server/database/offline.py`):
//! which server entities a local install currently mirrors. The actual
//! last-write-wins merge lives in `ldm-core`'s sync merger; this module
//! only owns the tracking table's CRUD.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ldm_types::{Result, SyncSubscription};
use sqlx::{Row, SqlitePool};

#[async_trait]
pub trait SyncStore: Send + Sync {
	async fn add_subscription(&self, entity_type: &str, entity_id: i64, entity_name: &str) -> Result<SyncSubscription>;
	async fn remove_subscription(&self, entity_type: &str, entity_id: i64) -> Result<bool>;
	async fn is_subscribed(&self, entity_type: &str, entity_id: i64) -> Result<bool>;
	async fn update_subscription_status(&self, entity_type: &str, entity_id: i64, status: &str) -> Result<()>;
	async fn get_all_subscriptions(&self) -> Result<Vec<SyncSubscription>>;
}

fn row_to_subscription(r: &sqlx::sqlite::SqliteRow) -> SyncSubscription {
	SyncSubscription {
		entity_type: r.get("entity_type"),
		entity_id: r.get("entity_id"),
		entity_name: r.get("entity_name"),
		status: r.get("status"),
		created_at: DateTime::parse_from_rfc3339(&r.get::<String, _>("created_at")).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
	}
}

/// Offline-only: the online backend has nothing to subscribe to (it *is*
/// the server of record).
#[derive(Clone)]
pub struct OfflineSyncRepository {
	pool: SqlitePool,
}

impl OfflineSyncRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(entity_type = %entity_type, entity_id))]
	pub async fn add_subscription(&self, entity_type: &str, entity_id: i64, entity_name: &str) -> Result<SyncSubscription> {
		sqlx::query(
			"INSERT INTO offline_sync_subscriptions (entity_type, entity_id, entity_name, status, created_at) VALUES (?, ?, ?, 'active', ?) \
			 ON CONFLICT (entity_type, entity_id) DO UPDATE SET entity_name = excluded.entity_name, status = 'active'",
		)
		.bind(entity_type)
		.bind(entity_id)
		.bind(entity_name)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;
		let row = sqlx::query("SELECT entity_type, entity_id, entity_name, status, created_at FROM offline_sync_subscriptions WHERE entity_type = ? AND entity_id = ?")
			.bind(entity_type)
			.bind(entity_id)
			.fetch_one(&self.pool)
			.await?;
		Ok(row_to_subscription(&row))
	}

	pub async fn remove_subscription(&self, entity_type: &str, entity_id: i64) -> Result<bool> {
		let result = sqlx::query("DELETE FROM offline_sync_subscriptions WHERE entity_type = ? AND entity_id = ?").bind(entity_type).bind(entity_id).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn is_subscribed(&self, entity_type: &str, entity_id: i64) -> Result<bool> {
		let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM offline_sync_subscriptions WHERE entity_type = ? AND entity_id = ? AND status = 'active') AS e")
			.bind(entity_type)
			.bind(entity_id)
			.fetch_one(&self.pool)
			.await?;
		Ok(row.get::<i64, _>("e") != 0)
	}

	pub async fn update_subscription_status(&self, entity_type: &str, entity_id: i64, status: &str) -> Result<()> {
		sqlx::query("UPDATE offline_sync_subscriptions SET status = ? WHERE entity_type = ? AND entity_id = ?").bind(status).bind(entity_type).bind(entity_id).execute(&self.pool).await?;
		Ok(())
	}

	pub async fn get_all_subscriptions(&self) -> Result<Vec<SyncSubscription>> {
		let rows = sqlx::query("SELECT entity_type, entity_id, entity_name, status, created_at FROM offline_sync_subscriptions ORDER BY created_at").fetch_all(&self.pool).await?;
		Ok(rows.iter().map(row_to_subscription).collect())
	}
}

#[async_trait]
impl SyncStore for OfflineSyncRepository {
	async fn add_subscription(&self, entity_type: &str, entity_id: i64, entity_name: &str) -> Result<SyncSubscription> {
		self.add_subscription(entity_type, entity_id, entity_name).await
	}
	async fn remove_subscription(&self, entity_type: &str, entity_id: i64) -> Result<bool> {
		self.remove_subscription(entity_type, entity_id).await
	}
	async fn is_subscribed(&self, entity_type: &str, entity_id: i64) -> Result<bool> {
		self.is_subscribed(entity_type, entity_id).await
	}
	async fn update_subscription_status(&self, entity_type: &str, entity_id: i64, status: &str) -> Result<()> {
		self.update_subscription_status(entity_type, entity_id, status).await
	}
	async fn get_all_subscriptions(&self) -> Result<Vec<SyncSubscription>> {
		self.get_all_subscriptions().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	#[tokio::test]
	async fn add_then_remove_subscription() {
		let pool = offline_test_pool().await;
		let repo = OfflineSyncRepository::new(pool);
		repo.add_subscription("file", 42, "report.csv").await.unwrap();
		assert!(repo.is_subscribed("file", 42).await.unwrap());
		repo.update_subscription_status("file", 42, "paused").await.unwrap();
		assert!(!repo.is_subscribed("file", 42).await.unwrap());
		assert!(repo.remove_subscription("file", 42).await.unwrap());
		assert!(!repo.is_subscribed("file", 42).await.unwrap());
	}
}
