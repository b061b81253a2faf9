// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PlatformRepository (spec §4.4.1): top-level grouping, globally unique
//! name, no auto-rename on create.

use async_trait::async_trait;
use ldm_types::{LdmError, Platform, PlatformId, ProjectId, Result, UserId};
use sqlx::{PgPool, Row, SqlitePool};

#[async_trait]
pub trait PlatformStore: Send + Sync {
	async fn get(&self, id: PlatformId) -> Result<Option<Platform>>;
	async fn get_all(&self) -> Result<Vec<Platform>>;
	async fn create(
		&self,
		name: &str,
		owner_id: UserId,
		description: Option<&str>,
		is_restricted: bool,
	) -> Result<Platform>;
	async fn update(&self, id: PlatformId, name: Option<&str>, description: Option<&str>) -> Result<Platform>;
	async fn delete(&self, id: PlatformId) -> Result<bool>;
	async fn get_with_project_count(&self, id: PlatformId) -> Result<Option<(Platform, i64)>>;
	async fn set_restriction(&self, id: PlatformId, is_restricted: bool) -> Result<()>;
	async fn assign_project(&self, project_id: ProjectId, platform_id: Option<PlatformId>) -> Result<()>;
	async fn check_name_exists(&self, name: &str, exclude_id: Option<PlatformId>) -> Result<bool>;
	async fn count(&self) -> Result<i64>;
	async fn get_projects(&self, platform_id: PlatformId) -> Result<Vec<ProjectId>>;
	async fn search(&self, query: &str) -> Result<Vec<Platform>>;
	/// Reinserts a platform with its original ID, for the `ldm-core` restore
	/// coordinator (spec §8 testable property 7, §4.7 "Restore").
	async fn recreate_with_id(&self, platform: &Platform) -> Result<()>;
}

fn row_to_platform(id: i64, name: String, description: Option<String>, owner_id: i64, is_restricted: bool) -> Platform {
	Platform {
		id: PlatformId::new(id),
		name,
		description,
		owner_id: UserId::new(owner_id),
		is_restricted,
	}
}

// ---------------------------------------------------------------------------
// Online (Postgres)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OnlinePlatformRepository {
	pool: PgPool,
}

impl OnlinePlatformRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(platform_id = %id))]
	pub async fn get(&self, id: PlatformId) -> Result<Option<Platform>> {
		let row = sqlx::query(
			"SELECT id, name, description, owner_id, is_restricted FROM ldm_platforms WHERE id = $1",
		)
		.bind(id.get())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.map(|r| {
			row_to_platform(
				r.get("id"),
				r.get("name"),
				r.get("description"),
				r.get("owner_id"),
				r.get("is_restricted"),
			)
		}))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_all(&self) -> Result<Vec<Platform>> {
		let rows = sqlx::query("SELECT id, name, description, owner_id, is_restricted FROM ldm_platforms ORDER BY name")
			.fetch_all(&self.pool)
			.await?;
		Ok(rows
			.into_iter()
			.map(|r| row_to_platform(r.get("id"), r.get("name"), r.get("description"), r.get("owner_id"), r.get("is_restricted")))
			.collect())
	}

	#[tracing::instrument(skip(self, description), fields(name = %name))]
	pub async fn create(&self, name: &str, owner_id: UserId, description: Option<&str>, is_restricted: bool) -> Result<Platform> {
		if self.check_name_exists(name, None).await? {
			return Err(LdmError::NameCollision(format!("platform '{name}' already exists")));
		}
		let row = sqlx::query(
			"INSERT INTO ldm_platforms (name, description, owner_id, is_restricted) VALUES ($1, $2, $3, $4) RETURNING id",
		)
		.bind(name)
		.bind(description)
		.bind(owner_id.get())
		.bind(is_restricted)
		.fetch_one(&self.pool)
		.await?;
		let id: i64 = row.get("id");
		tracing::debug!(platform_id = id, "platform created");
		Ok(Platform {
			id: PlatformId::new(id),
			name: name.to_string(),
			description: description.map(str::to_string),
			owner_id,
			is_restricted,
		})
	}

	#[tracing::instrument(skip(self, name, description), fields(platform_id = %id))]
	pub async fn update(&self, id: PlatformId, name: Option<&str>, description: Option<&str>) -> Result<Platform> {
		if let Some(name) = name {
			if self.check_name_exists(name, Some(id)).await? {
				return Err(LdmError::NameCollision(format!("platform '{name}' already exists")));
			}
		}
		sqlx::query(
			"UPDATE ldm_platforms SET name = COALESCE($1, name), description = COALESCE($2, description) WHERE id = $3",
		)
		.bind(name)
		.bind(description)
		.bind(id.get())
		.execute(&self.pool)
		.await?;
		self
			.get(id)
			.await?
			.ok_or_else(|| LdmError::NotFound(format!("platform {id} vanished after update")))
	}

	#[tracing::instrument(skip(self), fields(platform_id = %id))]
	pub async fn delete(&self, id: PlatformId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		sqlx::query("UPDATE ldm_projects SET platform_id = NULL WHERE platform_id = $1")
			.bind(id.get())
			.execute(&mut *tx)
			.await?;
		let result = sqlx::query("DELETE FROM ldm_platforms WHERE id = $1")
			.bind(id.get())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(platform_id = %id))]
	pub async fn get_with_project_count(&self, id: PlatformId) -> Result<Option<(Platform, i64)>> {
		let Some(platform) = self.get(id).await? else {
			return Ok(None);
		};
		let row = sqlx::query("SELECT COUNT(*) AS n FROM ldm_projects WHERE platform_id = $1")
			.bind(id.get())
			.fetch_one(&self.pool)
			.await?;
		Ok(Some((platform, row.get("n"))))
	}

	#[tracing::instrument(skip(self), fields(platform_id = %id))]
	pub async fn set_restriction(&self, id: PlatformId, is_restricted: bool) -> Result<()> {
		sqlx::query("UPDATE ldm_platforms SET is_restricted = $1 WHERE id = $2")
			.bind(is_restricted)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(project_id = %project_id))]
	pub async fn assign_project(&self, project_id: ProjectId, platform_id: Option<PlatformId>) -> Result<()> {
		sqlx::query("UPDATE ldm_projects SET platform_id = $1 WHERE id = $2")
			.bind(platform_id.map(PlatformId::get))
			.bind(project_id.get())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn check_name_exists(&self, name: &str, exclude_id: Option<PlatformId>) -> Result<bool> {
		let row = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM ldm_platforms WHERE lower(name) = lower($1) AND ($2::bigint IS NULL OR id != $2)) AS exists_",
		)
		.bind(name)
		.bind(exclude_id.map(PlatformId::get))
		.fetch_one(&self.pool)
		.await?;
		Ok(row.get("exists_"))
	}

	pub async fn count(&self) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM ldm_platforms").fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}

	#[tracing::instrument(skip(self), fields(platform_id = %platform_id))]
	pub async fn get_projects(&self, platform_id: PlatformId) -> Result<Vec<ProjectId>> {
		let rows = sqlx::query("SELECT id FROM ldm_projects WHERE platform_id = $1")
			.bind(platform_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(|r| ProjectId::new(r.get("id"))).collect())
	}

	#[tracing::instrument(skip(self), fields(query = %query))]
	pub async fn search(&self, query: &str) -> Result<Vec<Platform>> {
		let pattern = format!("%{query}%");
		let rows = sqlx::query(
			"SELECT id, name, description, owner_id, is_restricted FROM ldm_platforms WHERE name ILIKE $1 ORDER BY name",
		)
		.bind(pattern)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows
			.into_iter()
			.map(|r| row_to_platform(r.get("id"), r.get("name"), r.get("description"), r.get("owner_id"), r.get("is_restricted")))
			.collect())
	}

	#[tracing::instrument(skip(self, platform), fields(platform_id = %platform.id))]
	pub async fn recreate_with_id(&self, platform: &Platform) -> Result<()> {
		sqlx::query("INSERT INTO ldm_platforms (id, name, description, owner_id, is_restricted) VALUES ($1, $2, $3, $4, $5)")
			.bind(platform.id.get())
			.bind(&platform.name)
			.bind(&platform.description)
			.bind(platform.owner_id.get())
			.bind(platform.is_restricted)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[async_trait]
impl PlatformStore for OnlinePlatformRepository {
	async fn get(&self, id: PlatformId) -> Result<Option<Platform>> {
		self.get(id).await
	}
	async fn get_all(&self) -> Result<Vec<Platform>> {
		self.get_all().await
	}
	async fn create(&self, name: &str, owner_id: UserId, description: Option<&str>, is_restricted: bool) -> Result<Platform> {
		self.create(name, owner_id, description, is_restricted).await
	}
	async fn update(&self, id: PlatformId, name: Option<&str>, description: Option<&str>) -> Result<Platform> {
		self.update(id, name, description).await
	}
	async fn delete(&self, id: PlatformId) -> Result<bool> {
		self.delete(id).await
	}
	async fn get_with_project_count(&self, id: PlatformId) -> Result<Option<(Platform, i64)>> {
		self.get_with_project_count(id).await
	}
	async fn set_restriction(&self, id: PlatformId, is_restricted: bool) -> Result<()> {
		self.set_restriction(id, is_restricted).await
	}
	async fn assign_project(&self, project_id: ProjectId, platform_id: Option<PlatformId>) -> Result<()> {
		self.assign_project(project_id, platform_id).await
	}
	async fn check_name_exists(&self, name: &str, exclude_id: Option<PlatformId>) -> Result<bool> {
		self.check_name_exists(name, exclude_id).await
	}
	async fn count(&self) -> Result<i64> {
		self.count().await
	}
	async fn get_projects(&self, platform_id: PlatformId) -> Result<Vec<ProjectId>> {
		self.get_projects(platform_id).await
	}
	async fn search(&self, query: &str) -> Result<Vec<Platform>> {
		self.search(query).await
	}
	async fn recreate_with_id(&self, platform: &Platform) -> Result<()> {
		self.recreate_with_id(platform).await
	}
}

// ---------------------------------------------------------------------------
// Offline (SQLite)
// ---------------------------------------------------------------------------

/// Offline adapter. The well-known Offline-Storage platform (id = -1) is
/// seeded idempotently by `crate::testing`/init code, not by this
/// repository — operations here treat it as an ordinary row.
#[derive(Clone)]
pub struct OfflinePlatformRepository {
	pool: SqlitePool,
	id_alloc: std::sync::Arc<crate::id_alloc::IdAllocator>,
}

impl OfflinePlatformRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::default()) }
	}

	/// Same as [`Self::new`] but with the ID modulus driven by
	/// `DatabaseConfig::negative_id_modulus` rather than the built-in default.
	pub fn with_modulus(pool: SqlitePool, modulus: i64) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::new(modulus)) }
	}

	#[tracing::instrument(skip(self), fields(platform_id = %id))]
	pub async fn get(&self, id: PlatformId) -> Result<Option<Platform>> {
		let row = sqlx::query(
			"SELECT id, name, description, owner_id, is_restricted FROM offline_platforms WHERE id = ?",
		)
		.bind(id.get())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.map(|r| {
			row_to_platform(
				r.get("id"),
				r.get("name"),
				r.get("description"),
				r.get("owner_id"),
				r.get::<i64, _>("is_restricted") != 0,
			)
		}))
	}

	pub async fn get_all(&self) -> Result<Vec<Platform>> {
		let rows = sqlx::query("SELECT id, name, description, owner_id, is_restricted FROM offline_platforms ORDER BY name")
			.fetch_all(&self.pool)
			.await?;
		Ok(rows
			.into_iter()
			.map(|r| row_to_platform(r.get("id"), r.get("name"), r.get("description"), r.get("owner_id"), r.get::<i64, _>("is_restricted") != 0))
			.collect())
	}

	#[tracing::instrument(skip(self, description), fields(name = %name))]
	pub async fn create(&self, name: &str, owner_id: UserId, description: Option<&str>, is_restricted: bool) -> Result<Platform> {
		if self.check_name_exists(name, None).await? {
			return Err(LdmError::NameCollision(format!("platform '{name}' already exists")));
		}
		let id = crate::id_alloc::insert_with_retry(&self.id_alloc, |candidate| {
			let pool = self.pool.clone();
			async move {
				sqlx::query(
					"INSERT INTO offline_platforms (id, name, description, owner_id, is_restricted) VALUES (?, ?, ?, ?, ?)",
				)
				.bind(candidate)
				.bind(name)
				.bind(description)
				.bind(owner_id.get())
				.bind(is_restricted)
				.execute(&pool)
				.await?;
				Ok(candidate)
			}
		})
		.await?;
		Ok(Platform {
			id: PlatformId::new(id),
			name: name.to_string(),
			description: description.map(str::to_string),
			owner_id,
			is_restricted,
		})
	}

	#[tracing::instrument(skip(self, name, description), fields(platform_id = %id))]
	pub async fn update(&self, id: PlatformId, name: Option<&str>, description: Option<&str>) -> Result<Platform> {
		if let Some(name) = name {
			if self.check_name_exists(name, Some(id)).await? {
				return Err(LdmError::NameCollision(format!("platform '{name}' already exists")));
			}
		}
		sqlx::query("UPDATE offline_platforms SET name = COALESCE(?, name), description = COALESCE(?, description) WHERE id = ?")
			.bind(name)
			.bind(description)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		self
			.get(id)
			.await?
			.ok_or_else(|| LdmError::NotFound(format!("platform {id} vanished after update")))
	}

	#[tracing::instrument(skip(self), fields(platform_id = %id))]
	pub async fn delete(&self, id: PlatformId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		sqlx::query("UPDATE offline_projects SET platform_id = NULL WHERE platform_id = ?")
			.bind(id.get())
			.execute(&mut *tx)
			.await?;
		let result = sqlx::query("DELETE FROM offline_platforms WHERE id = ?")
			.bind(id.get())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn get_with_project_count(&self, id: PlatformId) -> Result<Option<(Platform, i64)>> {
		let Some(platform) = self.get(id).await? else {
			return Ok(None);
		};
		let row = sqlx::query("SELECT COUNT(*) AS n FROM offline_projects WHERE platform_id = ?")
			.bind(id.get())
			.fetch_one(&self.pool)
			.await?;
		Ok(Some((platform, row.get("n"))))
	}

	pub async fn set_restriction(&self, id: PlatformId, is_restricted: bool) -> Result<()> {
		sqlx::query("UPDATE offline_platforms SET is_restricted = ? WHERE id = ?")
			.bind(is_restricted)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn assign_project(&self, project_id: ProjectId, platform_id: Option<PlatformId>) -> Result<()> {
		sqlx::query("UPDATE offline_projects SET platform_id = ? WHERE id = ?")
			.bind(platform_id.map(PlatformId::get))
			.bind(project_id.get())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn check_name_exists(&self, name: &str, exclude_id: Option<PlatformId>) -> Result<bool> {
		let row = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM offline_platforms WHERE lower(name) = lower(?) AND (?1 IS NULL OR id != ?2)) AS exists_",
		)
		.bind(name)
		.bind(exclude_id.map(PlatformId::get))
		.bind(exclude_id.map(PlatformId::get))
		.fetch_one(&self.pool)
		.await?;
		Ok(row.get::<i64, _>("exists_") != 0)
	}

	pub async fn count(&self) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM offline_platforms").fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}

	pub async fn get_projects(&self, platform_id: PlatformId) -> Result<Vec<ProjectId>> {
		let rows = sqlx::query("SELECT id FROM offline_projects WHERE platform_id = ?")
			.bind(platform_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(|r| ProjectId::new(r.get("id"))).collect())
	}

	pub async fn search(&self, query: &str) -> Result<Vec<Platform>> {
		let pattern = format!("%{query}%");
		let rows = sqlx::query(
			"SELECT id, name, description, owner_id, is_restricted FROM offline_platforms WHERE name LIKE ? COLLATE NOCASE ORDER BY name",
		)
		.bind(pattern)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows
			.into_iter()
			.map(|r| row_to_platform(r.get("id"), r.get("name"), r.get("description"), r.get("owner_id"), r.get::<i64, _>("is_restricted") != 0))
			.collect())
	}

	#[tracing::instrument(skip(self, platform), fields(platform_id = %platform.id))]
	pub async fn recreate_with_id(&self, platform: &Platform) -> Result<()> {
		sqlx::query("INSERT INTO offline_platforms (id, name, description, owner_id, is_restricted) VALUES (?, ?, ?, ?, ?)")
			.bind(platform.id.get())
			.bind(&platform.name)
			.bind(&platform.description)
			.bind(platform.owner_id.get())
			.bind(platform.is_restricted)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[async_trait]
impl PlatformStore for OfflinePlatformRepository {
	async fn get(&self, id: PlatformId) -> Result<Option<Platform>> {
		self.get(id).await
	}
	async fn get_all(&self) -> Result<Vec<Platform>> {
		self.get_all().await
	}
	async fn create(&self, name: &str, owner_id: UserId, description: Option<&str>, is_restricted: bool) -> Result<Platform> {
		self.create(name, owner_id, description, is_restricted).await
	}
	async fn update(&self, id: PlatformId, name: Option<&str>, description: Option<&str>) -> Result<Platform> {
		self.update(id, name, description).await
	}
	async fn delete(&self, id: PlatformId) -> Result<bool> {
		self.delete(id).await
	}
	async fn get_with_project_count(&self, id: PlatformId) -> Result<Option<(Platform, i64)>> {
		self.get_with_project_count(id).await
	}
	async fn set_restriction(&self, id: PlatformId, is_restricted: bool) -> Result<()> {
		self.set_restriction(id, is_restricted).await
	}
	async fn assign_project(&self, project_id: ProjectId, platform_id: Option<PlatformId>) -> Result<()> {
		self.assign_project(project_id, platform_id).await
	}
	async fn check_name_exists(&self, name: &str, exclude_id: Option<PlatformId>) -> Result<bool> {
		self.check_name_exists(name, exclude_id).await
	}
	async fn count(&self) -> Result<i64> {
		self.count().await
	}
	async fn get_projects(&self, platform_id: PlatformId) -> Result<Vec<ProjectId>> {
		self.get_projects(platform_id).await
	}
	async fn search(&self, query: &str) -> Result<Vec<Platform>> {
		self.search(query).await
	}
	async fn recreate_with_id(&self, platform: &Platform) -> Result<()> {
		self.recreate_with_id(platform).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	#[tokio::test]
	async fn create_rejects_duplicate_name_case_insensitively() {
		let pool = offline_test_pool().await;
		let repo = OfflinePlatformRepository::new(pool);
		repo.create("Acme", UserId::new(1), None, false).await.unwrap();
		let err = repo.create("acme", UserId::new(1), None, false).await.unwrap_err();
		assert!(matches!(err, LdmError::NameCollision(_)));
	}

	#[tokio::test]
	async fn create_allocates_a_negative_id() {
		let pool = offline_test_pool().await;
		let repo = OfflinePlatformRepository::new(pool);
		let platform = repo.create("Acme", UserId::new(1), None, false).await.unwrap();
		assert!(platform.id.is_local());
		assert!(!platform.id.is_online());
	}

	#[tokio::test]
	async fn delete_detaches_child_projects_instead_of_cascading() {
		let pool = offline_test_pool().await;
		let repo = OfflinePlatformRepository::new(pool.clone());
		let platform = repo.create("Acme", UserId::new(1), None, false).await.unwrap();
		let project_id = sqlx::query("INSERT INTO offline_projects (name, owner_id, platform_id, is_restricted) VALUES (?, ?, ?, 0)")
			.bind("Widgets")
			.bind(1_i64)
			.bind(platform.id.get())
			.execute(&pool)
			.await
			.unwrap()
			.last_insert_rowid();

		assert!(repo.delete(platform.id).await.unwrap());

		let row = sqlx::query("SELECT platform_id FROM offline_projects WHERE id = ?")
			.bind(project_id)
			.fetch_one(&pool)
			.await
			.unwrap();
		let platform_id: Option<i64> = row.get("platform_id");
		assert_eq!(platform_id, None);
	}
}
