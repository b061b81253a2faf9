// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ProjectRepository (spec §4.4.2): name unique within its platform (or
//! among platform-less projects); `create` auto-renames via the Naming
//! Service, `rename` does not.

use async_trait::async_trait;
use ldm_types::{LdmError, PlatformId, Project, ProjectId, Result, UserId};
use sqlx::{PgPool, Row, SqlitePool};

use crate::naming::{generate_unique_name, NameExistsCheck};

#[async_trait]
pub trait ProjectStore: Send + Sync {
	async fn get(&self, id: ProjectId) -> Result<Option<Project>>;
	async fn get_all(&self, platform_id: Option<PlatformId>) -> Result<Vec<Project>>;
	/// Auto-renames on collision; returns the project under its effective name.
	async fn create(
		&self,
		name: &str,
		owner_id: UserId,
		description: Option<&str>,
		platform_id: Option<PlatformId>,
		is_restricted: bool,
	) -> Result<Project>;
	/// Fails with `NameCollision` instead of auto-renaming.
	async fn rename(&self, id: ProjectId, name: &str) -> Result<Project>;
	async fn update(&self, id: ProjectId, description: Option<&str>, is_restricted: Option<bool>) -> Result<Project>;
	async fn delete(&self, id: ProjectId) -> Result<bool>;
	async fn check_name_exists(&self, name: &str, platform_id: Option<PlatformId>, exclude_id: Option<ProjectId>) -> Result<bool>;
	async fn count(&self) -> Result<i64>;
	/// Reinserts a project with its original ID, for the `ldm-core` restore
	/// coordinator (spec §8 testable property 7, §4.7 "Restore").
	async fn recreate_with_id(&self, project: &Project) -> Result<()>;
}

fn row_to_project(
	id: i64,
	name: String,
	description: Option<String>,
	owner_id: i64,
	platform_id: Option<i64>,
	is_restricted: bool,
) -> Project {
	Project {
		id: ProjectId::new(id),
		name,
		description,
		owner_id: UserId::new(owner_id),
		platform_id: platform_id.map(PlatformId::new),
		is_restricted,
	}
}

// ---------------------------------------------------------------------------
// Online (Postgres)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OnlineProjectRepository {
	pool: PgPool,
}

struct OnlineScopeCheck<'a> {
	pool: &'a PgPool,
	platform_id: Option<PlatformId>,
}

#[async_trait]
impl NameExistsCheck for OnlineScopeCheck<'_> {
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool> {
		let row = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM ldm_projects WHERE lower(name) = lower($1) \
			 AND platform_id IS NOT DISTINCT FROM $2 AND ($3::bigint IS NULL OR id != $3)) AS exists_",
		)
		.bind(candidate)
		.bind(self.platform_id.map(PlatformId::get))
		.bind(exclude_id)
		.fetch_one(self.pool)
		.await?;
		Ok(row.get("exists_"))
	}
}

impl OnlineProjectRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(project_id = %id))]
	pub async fn get(&self, id: ProjectId) -> Result<Option<Project>> {
		let row = sqlx::query(
			"SELECT id, name, description, owner_id, platform_id, is_restricted FROM ldm_projects WHERE id = $1",
		)
		.bind(id.get())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.map(|r| row_to_project(r.get("id"), r.get("name"), r.get("description"), r.get("owner_id"), r.get("platform_id"), r.get("is_restricted"))))
	}

	pub async fn get_all(&self, platform_id: Option<PlatformId>) -> Result<Vec<Project>> {
		let rows = sqlx::query(
			"SELECT id, name, description, owner_id, platform_id, is_restricted FROM ldm_projects \
			 WHERE platform_id IS NOT DISTINCT FROM $1 ORDER BY name",
		)
		.bind(platform_id.map(PlatformId::get))
		.fetch_all(&self.pool)
		.await?;
		Ok(rows
			.into_iter()
			.map(|r| row_to_project(r.get("id"), r.get("name"), r.get("description"), r.get("owner_id"), r.get("platform_id"), r.get("is_restricted")))
			.collect())
	}

	#[tracing::instrument(skip(self, description), fields(name = %name))]
	pub async fn create(&self, name: &str, owner_id: UserId, description: Option<&str>, platform_id: Option<PlatformId>, is_restricted: bool) -> Result<Project> {
		let checker = OnlineScopeCheck { pool: &self.pool, platform_id };
		let effective_name = generate_unique_name(name, &checker, None).await?;
		let row = sqlx::query(
			"INSERT INTO ldm_projects (name, description, owner_id, platform_id, is_restricted) VALUES ($1, $2, $3, $4, $5) RETURNING id",
		)
		.bind(&effective_name)
		.bind(description)
		.bind(owner_id.get())
		.bind(platform_id.map(PlatformId::get))
		.bind(is_restricted)
		.fetch_one(&self.pool)
		.await?;
		Ok(row_to_project(row.get("id"), effective_name, description.map(str::to_string), owner_id.get(), platform_id.map(PlatformId::get), is_restricted))
	}

	#[tracing::instrument(skip(self), fields(project_id = %id, name = %name))]
	pub async fn rename(&self, id: ProjectId, name: &str) -> Result<Project> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("project {id}")))?;
		let checker = OnlineScopeCheck { pool: &self.pool, platform_id: current.platform_id };
		if checker.name_exists(name, Some(id.get())).await? {
			return Err(LdmError::NameCollision(format!("project '{name}' already exists in this scope")));
		}
		sqlx::query("UPDATE ldm_projects SET name = $1 WHERE id = $2")
			.bind(name)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("project {id} vanished after rename")))
	}

	pub async fn update(&self, id: ProjectId, description: Option<&str>, is_restricted: Option<bool>) -> Result<Project> {
		sqlx::query("UPDATE ldm_projects SET description = COALESCE($1, description), is_restricted = COALESCE($2, is_restricted) WHERE id = $3")
			.bind(description)
			.bind(is_restricted)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("project {id} vanished after update")))
	}

	#[tracing::instrument(skip(self), fields(project_id = %id))]
	pub async fn delete(&self, id: ProjectId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM ldm_projects WHERE id = $1").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn check_name_exists(&self, name: &str, platform_id: Option<PlatformId>, exclude_id: Option<ProjectId>) -> Result<bool> {
		let checker = OnlineScopeCheck { pool: &self.pool, platform_id };
		checker.name_exists(name, exclude_id.map(ProjectId::get)).await
	}

	pub async fn count(&self) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM ldm_projects").fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}

	#[tracing::instrument(skip(self, project), fields(project_id = %project.id))]
	pub async fn recreate_with_id(&self, project: &Project) -> Result<()> {
		sqlx::query("INSERT INTO ldm_projects (id, name, description, owner_id, platform_id, is_restricted) VALUES ($1, $2, $3, $4, $5, $6)")
			.bind(project.id.get())
			.bind(&project.name)
			.bind(&project.description)
			.bind(project.owner_id.get())
			.bind(project.platform_id.map(PlatformId::get))
			.bind(project.is_restricted)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[async_trait]
impl ProjectStore for OnlineProjectRepository {
	async fn get(&self, id: ProjectId) -> Result<Option<Project>> {
		self.get(id).await
	}
	async fn get_all(&self, platform_id: Option<PlatformId>) -> Result<Vec<Project>> {
		self.get_all(platform_id).await
	}
	async fn create(&self, name: &str, owner_id: UserId, description: Option<&str>, platform_id: Option<PlatformId>, is_restricted: bool) -> Result<Project> {
		self.create(name, owner_id, description, platform_id, is_restricted).await
	}
	async fn rename(&self, id: ProjectId, name: &str) -> Result<Project> {
		self.rename(id, name).await
	}
	async fn update(&self, id: ProjectId, description: Option<&str>, is_restricted: Option<bool>) -> Result<Project> {
		self.update(id, description, is_restricted).await
	}
	async fn delete(&self, id: ProjectId) -> Result<bool> {
		self.delete(id).await
	}
	async fn check_name_exists(&self, name: &str, platform_id: Option<PlatformId>, exclude_id: Option<ProjectId>) -> Result<bool> {
		self.check_name_exists(name, platform_id, exclude_id).await
	}
	async fn count(&self) -> Result<i64> {
		self.count().await
	}
	async fn recreate_with_id(&self, project: &Project) -> Result<()> {
		self.recreate_with_id(project).await
	}
}

// ---------------------------------------------------------------------------
// Offline (SQLite)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OfflineProjectRepository {
	pool: SqlitePool,
	id_alloc: std::sync::Arc<crate::id_alloc::IdAllocator>,
}

struct OfflineScopeCheck<'a> {
	pool: &'a SqlitePool,
	platform_id: Option<PlatformId>,
}

#[async_trait]
impl NameExistsCheck for OfflineScopeCheck<'_> {
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool> {
		let row = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM offline_projects WHERE lower(name) = lower(?) \
			 AND platform_id IS ? AND (?3 IS NULL OR id != ?3)) AS exists_",
		)
		.bind(candidate)
		.bind(self.platform_id.map(PlatformId::get))
		.bind(exclude_id)
		.fetch_one(self.pool)
		.await?;
		Ok(row.get::<i64, _>("exists_") != 0)
	}
}

impl OfflineProjectRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::default()) }
	}

	/// Same as [`Self::new`] but with the ID modulus driven by
	/// `DatabaseConfig::negative_id_modulus` rather than the built-in default.
	pub fn with_modulus(pool: SqlitePool, modulus: i64) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::new(modulus)) }
	}

	#[tracing::instrument(skip(self), fields(project_id = %id))]
	pub async fn get(&self, id: ProjectId) -> Result<Option<Project>> {
		let row = sqlx::query(
			"SELECT id, name, description, owner_id, platform_id, is_restricted FROM offline_projects WHERE id = ?",
		)
		.bind(id.get())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.map(|r| row_to_project(r.get("id"), r.get("name"), r.get("description"), r.get("owner_id"), r.get("platform_id"), r.get::<i64, _>("is_restricted") != 0)))
	}

	pub async fn get_all(&self, platform_id: Option<PlatformId>) -> Result<Vec<Project>> {
		let rows = sqlx::query(
			"SELECT id, name, description, owner_id, platform_id, is_restricted FROM offline_projects WHERE platform_id IS ? ORDER BY name",
		)
		.bind(platform_id.map(PlatformId::get))
		.fetch_all(&self.pool)
		.await?;
		Ok(rows
			.into_iter()
			.map(|r| row_to_project(r.get("id"), r.get("name"), r.get("description"), r.get("owner_id"), r.get("platform_id"), r.get::<i64, _>("is_restricted") != 0))
			.collect())
	}

	#[tracing::instrument(skip(self, description), fields(name = %name))]
	pub async fn create(&self, name: &str, owner_id: UserId, description: Option<&str>, platform_id: Option<PlatformId>, is_restricted: bool) -> Result<Project> {
		let checker = OfflineScopeCheck { pool: &self.pool, platform_id };
		let effective_name = generate_unique_name(name, &checker, None).await?;
		let id = crate::id_alloc::insert_with_retry(&self.id_alloc, |candidate| {
			let pool = self.pool.clone();
			let effective_name = effective_name.clone();
			async move {
				sqlx::query(
					"INSERT INTO offline_projects (id, name, description, owner_id, platform_id, is_restricted) VALUES (?, ?, ?, ?, ?, ?)",
				)
				.bind(candidate)
				.bind(&effective_name)
				.bind(description)
				.bind(owner_id.get())
				.bind(platform_id.map(PlatformId::get))
				.bind(is_restricted)
				.execute(&pool)
				.await?;
				Ok(candidate)
			}
		})
		.await?;
		Ok(row_to_project(
			id,
			effective_name,
			description.map(str::to_string),
			owner_id.get(),
			platform_id.map(PlatformId::get),
			is_restricted,
		))
	}

	#[tracing::instrument(skip(self), fields(project_id = %id, name = %name))]
	pub async fn rename(&self, id: ProjectId, name: &str) -> Result<Project> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("project {id}")))?;
		let checker = OfflineScopeCheck { pool: &self.pool, platform_id: current.platform_id };
		if checker.name_exists(name, Some(id.get())).await? {
			return Err(LdmError::NameCollision(format!("project '{name}' already exists in this scope")));
		}
		sqlx::query("UPDATE offline_projects SET name = ? WHERE id = ?")
			.bind(name)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("project {id} vanished after rename")))
	}

	pub async fn update(&self, id: ProjectId, description: Option<&str>, is_restricted: Option<bool>) -> Result<Project> {
		sqlx::query("UPDATE offline_projects SET description = COALESCE(?, description), is_restricted = COALESCE(?, is_restricted) WHERE id = ?")
			.bind(description)
			.bind(is_restricted)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("project {id} vanished after update")))
	}

	#[tracing::instrument(skip(self), fields(project_id = %id))]
	pub async fn delete(&self, id: ProjectId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM offline_projects WHERE id = ?").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn check_name_exists(&self, name: &str, platform_id: Option<PlatformId>, exclude_id: Option<ProjectId>) -> Result<bool> {
		let checker = OfflineScopeCheck { pool: &self.pool, platform_id };
		checker.name_exists(name, exclude_id.map(ProjectId::get)).await
	}

	pub async fn count(&self) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM offline_projects").fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}

	#[tracing::instrument(skip(self, project), fields(project_id = %project.id))]
	pub async fn recreate_with_id(&self, project: &Project) -> Result<()> {
		sqlx::query("INSERT INTO offline_projects (id, name, description, owner_id, platform_id, is_restricted) VALUES (?, ?, ?, ?, ?, ?)")
			.bind(project.id.get())
			.bind(&project.name)
			.bind(&project.description)
			.bind(project.owner_id.get())
			.bind(project.platform_id.map(PlatformId::get))
			.bind(project.is_restricted)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[async_trait]
impl ProjectStore for OfflineProjectRepository {
	async fn get(&self, id: ProjectId) -> Result<Option<Project>> {
		self.get(id).await
	}
	async fn get_all(&self, platform_id: Option<PlatformId>) -> Result<Vec<Project>> {
		self.get_all(platform_id).await
	}
	async fn create(&self, name: &str, owner_id: UserId, description: Option<&str>, platform_id: Option<PlatformId>, is_restricted: bool) -> Result<Project> {
		self.create(name, owner_id, description, platform_id, is_restricted).await
	}
	async fn rename(&self, id: ProjectId, name: &str) -> Result<Project> {
		self.rename(id, name).await
	}
	async fn update(&self, id: ProjectId, description: Option<&str>, is_restricted: Option<bool>) -> Result<Project> {
		self.update(id, description, is_restricted).await
	}
	async fn delete(&self, id: ProjectId) -> Result<bool> {
		self.delete(id).await
	}
	async fn check_name_exists(&self, name: &str, platform_id: Option<PlatformId>, exclude_id: Option<ProjectId>) -> Result<bool> {
		self.check_name_exists(name, platform_id, exclude_id).await
	}
	async fn count(&self) -> Result<i64> {
		self.count().await
	}
	async fn recreate_with_id(&self, project: &Project) -> Result<()> {
		self.recreate_with_id(project).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	#[tokio::test]
	async fn create_auto_renames_on_collision_scenario_s1() {
		let pool = offline_test_pool().await;
		let repo = OfflineProjectRepository::new(pool);
		let platform_id = PlatformId::new(1);
		repo.create("Alpha", UserId::new(7), None, Some(platform_id), false).await.unwrap();
		let second = repo.create("Alpha", UserId::new(7), None, Some(platform_id), false).await.unwrap();
		assert_eq!(second.name, "Alpha_1");
	}

	#[tokio::test]
	async fn rename_fails_with_collision_instead_of_auto_renaming() {
		let pool = offline_test_pool().await;
		let repo = OfflineProjectRepository::new(pool);
		let platform_id = PlatformId::new(1);
		let a = repo.create("Alpha", UserId::new(7), None, Some(platform_id), false).await.unwrap();
		let b = repo.create("Beta", UserId::new(7), None, Some(platform_id), false).await.unwrap();
		let err = repo.rename(b.id, "alpha").await.unwrap_err();
		assert!(matches!(err, LdmError::NameCollision(_)));
		let _ = a;
	}

	#[tokio::test]
	async fn platform_less_projects_form_their_own_namespace() {
		let pool = offline_test_pool().await;
		let repo = OfflineProjectRepository::new(pool);
		let platform_id = PlatformId::new(1);
		repo.create("Shared", UserId::new(7), None, Some(platform_id), false).await.unwrap();
		let unattached = repo.create("Shared", UserId::new(7), None, None, false).await.unwrap();
		assert_eq!(unattached.name, "Shared");
	}
}
