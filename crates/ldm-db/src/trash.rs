// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! TrashRepository (spec §4.4.8): the `trash` table's own CRUD. The
//! recursive serialize-into-trash / restore-from-trash walk over
//! Folder/File/Row is a cross-entity orchestration and lives in
//! `ldm-core`, not here (spec §2 component split).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ldm_types::{FolderId, LdmError, ProjectId, Result, Trash, TrashId, TrashItemType, TrashStatus, UserId};
use serde_json::Value as Json;
use sqlx::{PgPool, Row, SqlitePool};

#[async_trait]
pub trait TrashStore: Send + Sync {
	async fn get(&self, id: TrashId) -> Result<Option<Trash>>;
	async fn get_for_user(&self, user_id: UserId) -> Result<Vec<Trash>>;
	async fn get_expired(&self) -> Result<Vec<Trash>>;
	#[allow(clippy::too_many_arguments)]
	async fn create(
		&self,
		item_type: TrashItemType,
		item_id: i64,
		item_name: &str,
		item_data: Json,
		deleted_by: UserId,
		parent_project_id: Option<ProjectId>,
		parent_folder_id: Option<FolderId>,
		retention_days: i64,
	) -> Result<Trash>;
	/// Flips `status` to `restored` and returns the stored payload; a
	/// restore coordinator in `ldm-core` owns recreating the entities.
	/// `deleted_by == user_id` is required unless `is_admin`.
	async fn restore(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<Trash>;
	async fn permanent_delete(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<bool>;
	async fn empty_for_user(&self, user_id: UserId) -> Result<i64>;
	async fn cleanup_expired(&self) -> Result<i64>;
	async fn count_for_user(&self, user_id: UserId) -> Result<i64>;
}

const TRASH_COLUMNS: &str = "id, item_type, item_id, item_name, item_data, parent_project_id, parent_folder_id, deleted_by, deleted_at, expires_at, status";

fn sqlite_row_to_trash(r: &sqlx::sqlite::SqliteRow) -> Trash {
	Trash {
		id: TrashId::new(r.get("id")),
		item_type: r.get::<String, _>("item_type").parse().unwrap_or(TrashItemType::File),
		item_id: r.get("item_id"),
		item_name: r.get("item_name"),
		item_data: serde_json::from_str(&r.get::<String, _>("item_data")).unwrap_or(Json::Null),
		parent_project_id: r.get::<Option<i64>, _>("parent_project_id").map(ProjectId::new),
		parent_folder_id: r.get::<Option<i64>, _>("parent_folder_id").map(FolderId::new),
		deleted_by: UserId::new(r.get("deleted_by")),
		deleted_at: DateTime::parse_from_rfc3339(&r.get::<String, _>("deleted_at")).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
		expires_at: DateTime::parse_from_rfc3339(&r.get::<String, _>("expires_at")).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
		status: r.get::<String, _>("status").parse().unwrap_or(TrashStatus::Trashed),
	}
}

fn pg_row_to_trash(r: &sqlx::postgres::PgRow) -> Trash {
	Trash {
		id: TrashId::new(r.get("id")),
		item_type: r.get::<String, _>("item_type").parse().unwrap_or(TrashItemType::File),
		item_id: r.get("item_id"),
		item_name: r.get("item_name"),
		item_data: r.get("item_data"),
		parent_project_id: r.get::<Option<i64>, _>("parent_project_id").map(ProjectId::new),
		parent_folder_id: r.get::<Option<i64>, _>("parent_folder_id").map(FolderId::new),
		deleted_by: UserId::new(r.get("deleted_by")),
		deleted_at: r.get("deleted_at"),
		expires_at: r.get("expires_at"),
		status: r.get::<String, _>("status").parse().unwrap_or(TrashStatus::Trashed),
	}
}

fn check_owner(current: &Trash, user_id: UserId, is_admin: bool) -> Result<()> {
	if !is_admin && current.deleted_by != user_id {
		return Err(LdmError::PermissionDenied(format!("user {user_id} did not delete trash record")));
	}
	Ok(())
}

// ---------------------------------------------------------------------------
// Online (Postgres)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OnlineTrashRepository {
	pool: PgPool,
}

impl OnlineTrashRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: TrashId) -> Result<Option<Trash>> {
		let row = sqlx::query(&format!("SELECT {TRASH_COLUMNS} FROM ldm_trash WHERE id = $1")).bind(id.get()).fetch_optional(&self.pool).await?;
		Ok(row.as_ref().map(pg_row_to_trash))
	}

	pub async fn get_for_user(&self, user_id: UserId) -> Result<Vec<Trash>> {
		let rows = sqlx::query(&format!("SELECT {TRASH_COLUMNS} FROM ldm_trash WHERE deleted_by = $1 AND status = 'trashed' ORDER BY deleted_at DESC")).bind(user_id.get()).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(pg_row_to_trash).collect())
	}

	pub async fn get_expired(&self) -> Result<Vec<Trash>> {
		let rows = sqlx::query(&format!("SELECT {TRASH_COLUMNS} FROM ldm_trash WHERE status = 'trashed' AND expires_at < now()")).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(pg_row_to_trash).collect())
	}

	#[tracing::instrument(skip(self, item_data), fields(item_type = %item_type, item_id))]
	pub async fn create(
		&self,
		item_type: TrashItemType,
		item_id: i64,
		item_name: &str,
		item_data: Json,
		deleted_by: UserId,
		parent_project_id: Option<ProjectId>,
		parent_folder_id: Option<FolderId>,
		retention_days: i64,
	) -> Result<Trash> {
		let now = Utc::now();
		let expires_at = now + Duration::days(retention_days);
		let row = sqlx::query(&format!(
			"INSERT INTO ldm_trash (item_type, item_id, item_name, item_data, parent_project_id, parent_folder_id, deleted_by, deleted_at, expires_at, status) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'trashed') RETURNING {TRASH_COLUMNS}"
		))
		.bind(item_type.to_string())
		.bind(item_id)
		.bind(item_name)
		.bind(&item_data)
		.bind(parent_project_id.map(ProjectId::get))
		.bind(parent_folder_id.map(FolderId::get))
		.bind(deleted_by.get())
		.bind(now)
		.bind(expires_at)
		.fetch_one(&self.pool)
		.await?;
		Ok(pg_row_to_trash(&row))
	}

	#[tracing::instrument(skip(self), fields(trash_id = %id))]
	pub async fn restore(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<Trash> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("trash {id}")))?;
		check_owner(&current, user_id, is_admin)?;
		sqlx::query("UPDATE ldm_trash SET status = 'restored' WHERE id = $1").bind(id.get()).execute(&self.pool).await?;
		Ok(Trash { status: TrashStatus::Restored, ..current })
	}

	#[tracing::instrument(skip(self), fields(trash_id = %id))]
	pub async fn permanent_delete(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<bool> {
		let Some(current) = self.get(id).await? else {
			return Ok(false);
		};
		check_owner(&current, user_id, is_admin)?;
		let result = sqlx::query("DELETE FROM ldm_trash WHERE id = $1").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn empty_for_user(&self, user_id: UserId) -> Result<i64> {
		let result = sqlx::query("DELETE FROM ldm_trash WHERE deleted_by = $1 AND status = 'trashed'").bind(user_id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() as i64)
	}

	pub async fn cleanup_expired(&self) -> Result<i64> {
		let result = sqlx::query("DELETE FROM ldm_trash WHERE status = 'trashed' AND expires_at < now()").execute(&self.pool).await?;
		Ok(result.rows_affected() as i64)
	}

	pub async fn count_for_user(&self, user_id: UserId) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM ldm_trash WHERE deleted_by = $1 AND status = 'trashed'").bind(user_id.get()).fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}
}

#[async_trait]
impl TrashStore for OnlineTrashRepository {
	async fn get(&self, id: TrashId) -> Result<Option<Trash>> {
		self.get(id).await
	}
	async fn get_for_user(&self, user_id: UserId) -> Result<Vec<Trash>> {
		self.get_for_user(user_id).await
	}
	async fn get_expired(&self) -> Result<Vec<Trash>> {
		self.get_expired().await
	}
	async fn create(
		&self,
		item_type: TrashItemType,
		item_id: i64,
		item_name: &str,
		item_data: Json,
		deleted_by: UserId,
		parent_project_id: Option<ProjectId>,
		parent_folder_id: Option<FolderId>,
		retention_days: i64,
	) -> Result<Trash> {
		self.create(item_type, item_id, item_name, item_data, deleted_by, parent_project_id, parent_folder_id, retention_days).await
	}
	async fn restore(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<Trash> {
		self.restore(id, user_id, is_admin).await
	}
	async fn permanent_delete(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<bool> {
		self.permanent_delete(id, user_id, is_admin).await
	}
	async fn empty_for_user(&self, user_id: UserId) -> Result<i64> {
		self.empty_for_user(user_id).await
	}
	async fn cleanup_expired(&self) -> Result<i64> {
		self.cleanup_expired().await
	}
	async fn count_for_user(&self, user_id: UserId) -> Result<i64> {
		self.count_for_user(user_id).await
	}
}

// ---------------------------------------------------------------------------
// Offline (SQLite)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OfflineTrashRepository {
	pool: SqlitePool,
}

impl OfflineTrashRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: TrashId) -> Result<Option<Trash>> {
		let row = sqlx::query(&format!("SELECT {TRASH_COLUMNS} FROM offline_trash WHERE id = ?")).bind(id.get()).fetch_optional(&self.pool).await?;
		Ok(row.as_ref().map(sqlite_row_to_trash))
	}

	pub async fn get_for_user(&self, user_id: UserId) -> Result<Vec<Trash>> {
		let rows = sqlx::query(&format!("SELECT {TRASH_COLUMNS} FROM offline_trash WHERE deleted_by = ? AND status = 'trashed' ORDER BY deleted_at DESC")).bind(user_id.get()).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(sqlite_row_to_trash).collect())
	}

	pub async fn get_expired(&self) -> Result<Vec<Trash>> {
		let now = Utc::now().to_rfc3339();
		let rows = sqlx::query(&format!("SELECT {TRASH_COLUMNS} FROM offline_trash WHERE status = 'trashed' AND expires_at < ?")).bind(now).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(sqlite_row_to_trash).collect())
	}

	#[tracing::instrument(skip(self, item_data), fields(item_type = %item_type, item_id))]
	pub async fn create(
		&self,
		item_type: TrashItemType,
		item_id: i64,
		item_name: &str,
		item_data: Json,
		deleted_by: UserId,
		parent_project_id: Option<ProjectId>,
		parent_folder_id: Option<FolderId>,
		retention_days: i64,
	) -> Result<Trash> {
		let now = Utc::now();
		let expires_at = now + Duration::days(retention_days);
		let result = sqlx::query(
			"INSERT INTO offline_trash (item_type, item_id, item_name, item_data, parent_project_id, parent_folder_id, deleted_by, deleted_at, expires_at, status) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'trashed')",
		)
		.bind(item_type.to_string())
		.bind(item_id)
		.bind(item_name)
		.bind(item_data.to_string())
		.bind(parent_project_id.map(ProjectId::get))
		.bind(parent_folder_id.map(FolderId::get))
		.bind(deleted_by.get())
		.bind(now.to_rfc3339())
		.bind(expires_at.to_rfc3339())
		.execute(&self.pool)
		.await?;
		self.get(TrashId::new(result.last_insert_rowid())).await?.ok_or_else(|| LdmError::NotFound("just-inserted trash record".into()))
	}

	#[tracing::instrument(skip(self), fields(trash_id = %id))]
	pub async fn restore(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<Trash> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("trash {id}")))?;
		check_owner(&current, user_id, is_admin)?;
		sqlx::query("UPDATE offline_trash SET status = 'restored' WHERE id = ?").bind(id.get()).execute(&self.pool).await?;
		Ok(Trash { status: TrashStatus::Restored, ..current })
	}

	#[tracing::instrument(skip(self), fields(trash_id = %id))]
	pub async fn permanent_delete(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<bool> {
		let Some(current) = self.get(id).await? else {
			return Ok(false);
		};
		check_owner(&current, user_id, is_admin)?;
		let result = sqlx::query("DELETE FROM offline_trash WHERE id = ?").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn empty_for_user(&self, user_id: UserId) -> Result<i64> {
		let result = sqlx::query("DELETE FROM offline_trash WHERE deleted_by = ? AND status = 'trashed'").bind(user_id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() as i64)
	}

	pub async fn cleanup_expired(&self) -> Result<i64> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query("DELETE FROM offline_trash WHERE status = 'trashed' AND expires_at < ?").bind(now).execute(&self.pool).await?;
		Ok(result.rows_affected() as i64)
	}

	pub async fn count_for_user(&self, user_id: UserId) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM offline_trash WHERE deleted_by = ? AND status = 'trashed'").bind(user_id.get()).fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}
}

#[async_trait]
impl TrashStore for OfflineTrashRepository {
	async fn get(&self, id: TrashId) -> Result<Option<Trash>> {
		self.get(id).await
	}
	async fn get_for_user(&self, user_id: UserId) -> Result<Vec<Trash>> {
		self.get_for_user(user_id).await
	}
	async fn get_expired(&self) -> Result<Vec<Trash>> {
		self.get_expired().await
	}
	async fn create(
		&self,
		item_type: TrashItemType,
		item_id: i64,
		item_name: &str,
		item_data: Json,
		deleted_by: UserId,
		parent_project_id: Option<ProjectId>,
		parent_folder_id: Option<FolderId>,
		retention_days: i64,
	) -> Result<Trash> {
		self.create(item_type, item_id, item_name, item_data, deleted_by, parent_project_id, parent_folder_id, retention_days).await
	}
	async fn restore(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<Trash> {
		self.restore(id, user_id, is_admin).await
	}
	async fn permanent_delete(&self, id: TrashId, user_id: UserId, is_admin: bool) -> Result<bool> {
		self.permanent_delete(id, user_id, is_admin).await
	}
	async fn empty_for_user(&self, user_id: UserId) -> Result<i64> {
		self.empty_for_user(user_id).await
	}
	async fn cleanup_expired(&self) -> Result<i64> {
		self.cleanup_expired().await
	}
	async fn count_for_user(&self, user_id: UserId) -> Result<i64> {
		self.count_for_user(user_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	#[tokio::test]
	async fn cleanup_expired_removes_only_expired_scenario_s6() {
		let pool = offline_test_pool().await;
		let repo = OfflineTrashRepository::new(pool.clone());
		let old = repo.create(TrashItemType::Folder, 1, "Old", Json::Null, UserId::new(1), None, None, 30).await.unwrap();
		sqlx::query("UPDATE offline_trash SET deleted_at = ?, expires_at = ? WHERE id = ?")
			.bind((Utc::now() - Duration::days(31)).to_rfc3339())
			.bind((Utc::now() - Duration::days(1)).to_rfc3339())
			.bind(old.id.get())
			.execute(&pool)
			.await
			.unwrap();
		let recent = repo.create(TrashItemType::Folder, 2, "Recent", Json::Null, UserId::new(1), None, None, 30).await.unwrap();
		sqlx::query("UPDATE offline_trash SET deleted_at = ?, expires_at = ? WHERE id = ?")
			.bind((Utc::now() - Duration::days(10)).to_rfc3339())
			.bind((Utc::now() + Duration::days(20)).to_rfc3339())
			.bind(recent.id.get())
			.execute(&pool)
			.await
			.unwrap();

		let removed = repo.cleanup_expired().await.unwrap();
		assert_eq!(removed, 1);
		assert!(repo.get(old.id).await.unwrap().is_none());
		assert!(repo.get(recent.id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn restore_rejects_non_owner_without_admin() {
		let pool = offline_test_pool().await;
		let repo = OfflineTrashRepository::new(pool);
		let trash = repo.create(TrashItemType::File, 1, "F", Json::Null, UserId::new(1), None, None, 30).await.unwrap();
		let err = repo.restore(trash.id, UserId::new(2), false).await.unwrap_err();
		assert!(matches!(err, LdmError::PermissionDenied(_)));
		let restored = repo.restore(trash.id, UserId::new(2), true).await.unwrap();
		assert_eq!(restored.status, TrashStatus::Restored);
	}
}
