// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! FolderRepository (spec §4.4.3): tree under a project, cycle-safe moves,
//! cross-project move, and subtree copy.

use async_trait::async_trait;
use ldm_types::{FileId, Folder, FolderId, LdmError, ProjectId, Result};
use sqlx::{PgPool, Row, SqlitePool};

use crate::naming::{generate_unique_name, NameExistsCheck};

/// Bound on parent-chain walks and subtree traversals (spec §9,
/// "cap depth... to guarantee stack safety").
const MAX_TREE_DEPTH: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct FolderContents {
	pub folders: Vec<Folder>,
	pub files: Vec<FileId>,
}

#[async_trait]
pub trait FolderStore: Send + Sync {
	async fn get(&self, id: FolderId) -> Result<Option<Folder>>;
	async fn get_all(&self, project_id: ProjectId) -> Result<Vec<Folder>>;
	async fn get_with_contents(&self, id: FolderId) -> Result<FolderContents>;
	async fn create(&self, project_id: ProjectId, parent_id: Option<FolderId>, name: &str) -> Result<Folder>;
	async fn rename(&self, id: FolderId, name: &str) -> Result<Folder>;
	async fn delete(&self, id: FolderId) -> Result<bool>;
	async fn is_descendant(&self, candidate: FolderId, ancestor: FolderId) -> Result<bool>;
	async fn r#move(&self, folder_id: FolderId, new_parent_id: Option<FolderId>) -> Result<Folder>;
	async fn move_cross_project(&self, folder_id: FolderId, target_project: ProjectId, target_parent: Option<FolderId>) -> Result<Folder>;
	async fn copy(&self, folder_id: FolderId, target_project: Option<ProjectId>, target_parent: Option<FolderId>) -> Result<Folder>;
	/// Reinserts a folder with its original ID, for the `ldm-core` restore
	/// coordinator (spec §8 testable property 7, scenario S2). Not used by
	/// `create`, which always allocates a fresh ID.
	async fn recreate_with_id(&self, folder: &Folder) -> Result<()>;
}

fn row_to_folder(id: i64, project_id: i64, parent_id: Option<i64>, name: String) -> Folder {
	Folder {
		id: FolderId::new(id),
		project_id: ProjectId::new(project_id),
		parent_id: parent_id.map(FolderId::new),
		name,
	}
}

// ---------------------------------------------------------------------------
// Online (Postgres)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OnlineFolderRepository {
	pool: PgPool,
}

struct OnlineSiblingCheck<'a> {
	pool: &'a PgPool,
	project_id: ProjectId,
	parent_id: Option<FolderId>,
}

#[async_trait]
impl NameExistsCheck for OnlineSiblingCheck<'_> {
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool> {
		let row = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM ldm_folders WHERE project_id = $1 AND parent_id IS NOT DISTINCT FROM $2 \
			 AND lower(name) = lower($3) AND ($4::bigint IS NULL OR id != $4)) AS exists_",
		)
		.bind(self.project_id.get())
		.bind(self.parent_id.map(FolderId::get))
		.bind(candidate)
		.bind(exclude_id)
		.fetch_one(self.pool)
		.await?;
		Ok(row.get("exists_"))
	}
}

impl OnlineFolderRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(folder_id = %id))]
	pub async fn get(&self, id: FolderId) -> Result<Option<Folder>> {
		let row = sqlx::query("SELECT id, project_id, parent_id, name FROM ldm_folders WHERE id = $1")
			.bind(id.get())
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| row_to_folder(r.get("id"), r.get("project_id"), r.get("parent_id"), r.get("name"))))
	}

	pub async fn get_all(&self, project_id: ProjectId) -> Result<Vec<Folder>> {
		let rows = sqlx::query("SELECT id, project_id, parent_id, name FROM ldm_folders WHERE project_id = $1 ORDER BY name")
			.bind(project_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(|r| row_to_folder(r.get("id"), r.get("project_id"), r.get("parent_id"), r.get("name"))).collect())
	}

	#[tracing::instrument(skip(self), fields(folder_id = %id))]
	pub async fn get_with_contents(&self, id: FolderId) -> Result<FolderContents> {
		let folders = sqlx::query("SELECT id, project_id, parent_id, name FROM ldm_folders WHERE parent_id = $1 ORDER BY name")
			.bind(id.get())
			.fetch_all(&self.pool)
			.await?
			.into_iter()
			.map(|r| row_to_folder(r.get("id"), r.get("project_id"), r.get("parent_id"), r.get("name")))
			.collect();
		let files = sqlx::query("SELECT id FROM ldm_files WHERE folder_id = $1 ORDER BY name")
			.bind(id.get())
			.fetch_all(&self.pool)
			.await?
			.into_iter()
			.map(|r| FileId::new(r.get("id")))
			.collect();
		Ok(FolderContents { folders, files })
	}

	#[tracing::instrument(skip(self), fields(project_id = %project_id, name = %name))]
	pub async fn create(&self, project_id: ProjectId, parent_id: Option<FolderId>, name: &str) -> Result<Folder> {
		let checker = OnlineSiblingCheck { pool: &self.pool, project_id, parent_id };
		let effective_name = generate_unique_name(name, &checker, None).await?;
		let row = sqlx::query("INSERT INTO ldm_folders (project_id, parent_id, name) VALUES ($1, $2, $3) RETURNING id")
			.bind(project_id.get())
			.bind(parent_id.map(FolderId::get))
			.bind(&effective_name)
			.fetch_one(&self.pool)
			.await?;
		Ok(row_to_folder(row.get("id"), project_id.get(), parent_id.map(FolderId::get), effective_name))
	}

	#[tracing::instrument(skip(self), fields(folder_id = %id, name = %name))]
	pub async fn rename(&self, id: FolderId, name: &str) -> Result<Folder> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {id}")))?;
		let checker = OnlineSiblingCheck { pool: &self.pool, project_id: current.project_id, parent_id: current.parent_id };
		let effective_name = generate_unique_name(name, &checker, Some(id.get())).await?;
		sqlx::query("UPDATE ldm_folders SET name = $1 WHERE id = $2").bind(&effective_name).bind(id.get()).execute(&self.pool).await?;
		Ok(Folder { name: effective_name, ..current })
	}

	#[tracing::instrument(skip(self), fields(folder_id = %id))]
	pub async fn delete(&self, id: FolderId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM ldm_folders WHERE id = $1").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self, folder), fields(folder_id = %folder.id))]
	pub async fn recreate_with_id(&self, folder: &Folder) -> Result<()> {
		sqlx::query("INSERT INTO ldm_folders (id, project_id, parent_id, name) VALUES ($1, $2, $3, $4)")
			.bind(folder.id.get())
			.bind(folder.project_id.get())
			.bind(folder.parent_id.map(FolderId::get))
			.bind(&folder.name)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn is_descendant(&self, candidate: FolderId, ancestor: FolderId) -> Result<bool> {
		let mut current = candidate;
		for _ in 0..MAX_TREE_DEPTH {
			let Some(folder) = self.get(current).await? else {
				return Ok(false);
			};
			match folder.parent_id {
				Some(parent) if parent == ancestor => return Ok(true),
				Some(parent) => current = parent,
				None => return Ok(false),
			}
		}
		Err(LdmError::IntegrityViolation(format!("folder parent chain from {candidate} exceeds max depth")))
	}

	#[tracing::instrument(skip(self), fields(folder_id = %folder_id))]
	pub async fn r#move(&self, folder_id: FolderId, new_parent_id: Option<FolderId>) -> Result<Folder> {
		let folder = self.get(folder_id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {folder_id}")))?;
		if let Some(target) = new_parent_id {
			if target == folder_id || self.is_descendant(target, folder_id).await? {
				return Err(LdmError::CycleWouldBeIntroduced(format!(
					"moving folder {folder_id} under {target} would create a cycle"
				)));
			}
		}
		let checker = OnlineSiblingCheck { pool: &self.pool, project_id: folder.project_id, parent_id: new_parent_id };
		let effective_name = generate_unique_name(&folder.name, &checker, Some(folder_id.get())).await?;
		sqlx::query("UPDATE ldm_folders SET parent_id = $1, name = $2 WHERE id = $3")
			.bind(new_parent_id.map(FolderId::get))
			.bind(&effective_name)
			.bind(folder_id.get())
			.execute(&self.pool)
			.await?;
		Ok(Folder { parent_id: new_parent_id, name: effective_name, ..folder })
	}

	#[tracing::instrument(skip(self), fields(folder_id = %folder_id, target_project = %target_project))]
	pub async fn move_cross_project(&self, folder_id: FolderId, target_project: ProjectId, target_parent: Option<FolderId>) -> Result<Folder> {
		let folder = self.get(folder_id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {folder_id}")))?;
		let mut tx = self.pool.begin().await?;

		let checker_name = {
			let checker = OnlineSiblingCheck { pool: &self.pool, project_id: target_project, parent_id: target_parent };
			generate_unique_name(&folder.name, &checker, None).await?
		};

		// explicit work stack, not recursion (spec §9)
		let mut stack = vec![folder_id];
		let mut descendant_folders = Vec::new();
		while let Some(current) = stack.pop() {
			let children = sqlx::query("SELECT id FROM ldm_folders WHERE parent_id = $1")
				.bind(current.get())
				.fetch_all(&mut *tx)
				.await?;
			for child in children {
				let child_id = FolderId::new(child.get("id"));
				descendant_folders.push(child_id);
				stack.push(child_id);
			}
		}

		for descendant in &descendant_folders {
			sqlx::query("UPDATE ldm_folders SET project_id = $1 WHERE id = $2")
				.bind(target_project.get())
				.bind(descendant.get())
				.execute(&mut *tx)
				.await?;
			sqlx::query("UPDATE ldm_files SET project_id = $1 WHERE folder_id = $2")
				.bind(target_project.get())
				.bind(descendant.get())
				.execute(&mut *tx)
				.await?;
		}
		sqlx::query("UPDATE ldm_files SET project_id = $1 WHERE folder_id = $2")
			.bind(target_project.get())
			.bind(folder_id.get())
			.execute(&mut *tx)
			.await?;
		sqlx::query("UPDATE ldm_folders SET project_id = $1, parent_id = $2, name = $3 WHERE id = $4")
			.bind(target_project.get())
			.bind(target_parent.map(FolderId::get))
			.bind(&checker_name)
			.bind(folder_id.get())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(Folder { project_id: target_project, parent_id: target_parent, name: checker_name, ..folder })
	}

	#[tracing::instrument(skip(self), fields(folder_id = %folder_id))]
	pub async fn copy(&self, folder_id: FolderId, target_project: Option<ProjectId>, target_parent: Option<FolderId>) -> Result<Folder> {
		let source = self.get(folder_id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {folder_id}")))?;
		let dest_project = target_project.unwrap_or(source.project_id);
		let mut tx = self.pool.begin().await?;
		let new_root = self.copy_subtree(&mut tx, folder_id, dest_project, target_parent).await?;
		tx.commit().await?;
		Ok(new_root)
	}

	async fn copy_subtree(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
		source_id: FolderId,
		dest_project: ProjectId,
		dest_parent: Option<FolderId>,
	) -> Result<Folder> {
		let source = sqlx::query("SELECT id, project_id, parent_id, name FROM ldm_folders WHERE id = $1")
			.bind(source_id.get())
			.fetch_one(&mut **tx)
			.await
			.map(|r| row_to_folder(r.get("id"), r.get("project_id"), r.get("parent_id"), r.get("name")))?;

		let checker = OnlineSiblingCheck { pool: &self.pool, project_id: dest_project, parent_id: dest_parent };
		let name = generate_unique_name(&source.name, &checker, None).await?;

		let row = sqlx::query("INSERT INTO ldm_folders (project_id, parent_id, name) VALUES ($1, $2, $3) RETURNING id")
			.bind(dest_project.get())
			.bind(dest_parent.map(FolderId::get))
			.bind(&name)
			.fetch_one(&mut **tx)
			.await?;
		let new_id = FolderId::new(row.get("id"));

		let files = sqlx::query("SELECT id, name, original_filename, format, source_language, target_language, extra_data FROM ldm_files WHERE folder_id = $1")
			.bind(source_id.get())
			.fetch_all(&mut **tx)
			.await?;
		for file in files {
			let new_file = sqlx::query(
				"INSERT INTO ldm_files (project_id, folder_id, name, original_filename, format, source_language, target_language, extra_data, row_count) \
				 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0) RETURNING id",
			)
			.bind(dest_project.get())
			.bind(new_id.get())
			.bind(file.get::<String, _>("name"))
			.bind(file.get::<String, _>("original_filename"))
			.bind(file.get::<String, _>("format"))
			.bind(file.get::<String, _>("source_language"))
			.bind(file.get::<Option<String>, _>("target_language"))
			.bind(file.get::<Option<serde_json::Value>, _>("extra_data"))
			.fetch_one(&mut **tx)
			.await?;
			let new_file_id: i64 = new_file.get("id");

			let old_file_id: i64 = file.get("id");
			let rows = sqlx::query("SELECT row_num, string_id, source, target, memo, status, extra_data FROM ldm_rows WHERE file_id = $1")
				.bind(old_file_id)
				.fetch_all(&mut **tx)
				.await?;
			for row in &rows {
				sqlx::query(
					"INSERT INTO ldm_rows (file_id, row_num, string_id, source, target, memo, status, extra_data) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
				)
				.bind(new_file_id)
				.bind(row.get::<i64, _>("row_num"))
				.bind(row.get::<Option<String>, _>("string_id"))
				.bind(row.get::<String, _>("source"))
				.bind(row.get::<String, _>("target"))
				.bind(row.get::<Option<String>, _>("memo"))
				.bind(row.get::<String, _>("status"))
				.bind(row.get::<Option<serde_json::Value>, _>("extra_data"))
				.execute(&mut **tx)
				.await?;
			}
			sqlx::query("UPDATE ldm_files SET row_count = $1 WHERE id = $2")
				.bind(rows.len() as i64)
				.bind(new_file_id)
				.execute(&mut **tx)
				.await?;
		}

		let children = sqlx::query("SELECT id FROM ldm_folders WHERE parent_id = $1 AND id != $2")
			.bind(source_id.get())
			.bind(new_id.get())
			.fetch_all(&mut **tx)
			.await?;
		for child in children {
			let child_id = FolderId::new(child.get("id"));
			Box::pin(self.copy_subtree(tx, child_id, dest_project, Some(new_id))).await?;
		}

		Ok(Folder { id: new_id, project_id: dest_project, parent_id: dest_parent, name })
	}
}

#[async_trait]
impl FolderStore for OnlineFolderRepository {
	async fn get(&self, id: FolderId) -> Result<Option<Folder>> {
		self.get(id).await
	}
	async fn get_all(&self, project_id: ProjectId) -> Result<Vec<Folder>> {
		self.get_all(project_id).await
	}
	async fn get_with_contents(&self, id: FolderId) -> Result<FolderContents> {
		self.get_with_contents(id).await
	}
	async fn create(&self, project_id: ProjectId, parent_id: Option<FolderId>, name: &str) -> Result<Folder> {
		self.create(project_id, parent_id, name).await
	}
	async fn rename(&self, id: FolderId, name: &str) -> Result<Folder> {
		self.rename(id, name).await
	}
	async fn delete(&self, id: FolderId) -> Result<bool> {
		self.delete(id).await
	}
	async fn is_descendant(&self, candidate: FolderId, ancestor: FolderId) -> Result<bool> {
		self.is_descendant(candidate, ancestor).await
	}
	async fn r#move(&self, folder_id: FolderId, new_parent_id: Option<FolderId>) -> Result<Folder> {
		self.r#move(folder_id, new_parent_id).await
	}
	async fn move_cross_project(&self, folder_id: FolderId, target_project: ProjectId, target_parent: Option<FolderId>) -> Result<Folder> {
		self.move_cross_project(folder_id, target_project, target_parent).await
	}
	async fn copy(&self, folder_id: FolderId, target_project: Option<ProjectId>, target_parent: Option<FolderId>) -> Result<Folder> {
		self.copy(folder_id, target_project, target_parent).await
	}
	async fn recreate_with_id(&self, folder: &Folder) -> Result<()> {
		self.recreate_with_id(folder).await
	}
}

// ---------------------------------------------------------------------------
// Offline (SQLite)
// ---------------------------------------------------------------------------

/// Offline mode only ever moves within the well-known Offline-Storage
/// project for `move_cross_project` (spec §4.4.4); `move_cross_project`
/// itself rejects any other `target_project` with
/// `CrossProjectNotSupportedOffline` before touching the tree.
#[derive(Clone)]
pub struct OfflineFolderRepository {
	pool: SqlitePool,
	id_alloc: std::sync::Arc<crate::id_alloc::IdAllocator>,
}

struct OfflineSiblingCheck<'a> {
	pool: &'a SqlitePool,
	project_id: ProjectId,
	parent_id: Option<FolderId>,
}

#[async_trait]
impl NameExistsCheck for OfflineSiblingCheck<'_> {
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool> {
		let row = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM offline_folders WHERE project_id = ? AND parent_id IS ? \
			 AND lower(name) = lower(?) AND (?4 IS NULL OR id != ?4)) AS exists_",
		)
		.bind(self.project_id.get())
		.bind(self.parent_id.map(FolderId::get))
		.bind(candidate)
		.bind(exclude_id)
		.fetch_one(self.pool)
		.await?;
		Ok(row.get::<i64, _>("exists_") != 0)
	}
}

impl OfflineFolderRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::default()) }
	}

	/// Same as [`Self::new`] but with the ID modulus driven by
	/// `DatabaseConfig::negative_id_modulus` rather than the built-in default.
	pub fn with_modulus(pool: SqlitePool, modulus: i64) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::new(modulus)) }
	}

	#[tracing::instrument(skip(self), fields(folder_id = %id))]
	pub async fn get(&self, id: FolderId) -> Result<Option<Folder>> {
		let row = sqlx::query("SELECT id, project_id, parent_id, name FROM offline_folders WHERE id = ?")
			.bind(id.get())
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| row_to_folder(r.get("id"), r.get("project_id"), r.get("parent_id"), r.get("name"))))
	}

	pub async fn get_all(&self, project_id: ProjectId) -> Result<Vec<Folder>> {
		let rows = sqlx::query("SELECT id, project_id, parent_id, name FROM offline_folders WHERE project_id = ? ORDER BY name")
			.bind(project_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(|r| row_to_folder(r.get("id"), r.get("project_id"), r.get("parent_id"), r.get("name"))).collect())
	}

	pub async fn get_with_contents(&self, id: FolderId) -> Result<FolderContents> {
		let folders = sqlx::query("SELECT id, project_id, parent_id, name FROM offline_folders WHERE parent_id = ? ORDER BY name")
			.bind(id.get())
			.fetch_all(&self.pool)
			.await?
			.into_iter()
			.map(|r| row_to_folder(r.get("id"), r.get("project_id"), r.get("parent_id"), r.get("name")))
			.collect();
		let files = sqlx::query("SELECT id FROM offline_files WHERE folder_id = ? ORDER BY name")
			.bind(id.get())
			.fetch_all(&self.pool)
			.await?
			.into_iter()
			.map(|r| FileId::new(r.get("id")))
			.collect();
		Ok(FolderContents { folders, files })
	}

	/// Auto-renames against siblings in the same parent and, when no
	/// project is given, parents into the well-known Offline-Storage
	/// project (grounded on `database/offline.py::create_local_folder`).
	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn create(&self, project_id: ProjectId, parent_id: Option<FolderId>, name: &str) -> Result<Folder> {
		let checker = OfflineSiblingCheck { pool: &self.pool, project_id, parent_id };
		let effective_name = generate_unique_name(name, &checker, None).await?;
		let id = crate::id_alloc::insert_with_retry(&self.id_alloc, |candidate| {
			let pool = self.pool.clone();
			let effective_name = effective_name.clone();
			async move {
				sqlx::query("INSERT INTO offline_folders (id, project_id, parent_id, name) VALUES (?, ?, ?, ?)")
					.bind(candidate)
					.bind(project_id.get())
					.bind(parent_id.map(FolderId::get))
					.bind(&effective_name)
					.execute(&pool)
					.await?;
				Ok(candidate)
			}
		})
		.await?;
		Ok(row_to_folder(id, project_id.get(), parent_id.map(FolderId::get), effective_name))
	}

	#[tracing::instrument(skip(self), fields(folder_id = %id, name = %name))]
	pub async fn rename(&self, id: FolderId, name: &str) -> Result<Folder> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {id}")))?;
		let checker = OfflineSiblingCheck { pool: &self.pool, project_id: current.project_id, parent_id: current.parent_id };
		let effective_name = generate_unique_name(name, &checker, Some(id.get())).await?;
		sqlx::query("UPDATE offline_folders SET name = ? WHERE id = ?").bind(&effective_name).bind(id.get()).execute(&self.pool).await?;
		Ok(Folder { name: effective_name, ..current })
	}

	#[tracing::instrument(skip(self), fields(folder_id = %id))]
	pub async fn delete(&self, id: FolderId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM offline_folders WHERE id = ?").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self, folder), fields(folder_id = %folder.id))]
	pub async fn recreate_with_id(&self, folder: &Folder) -> Result<()> {
		sqlx::query("INSERT INTO offline_folders (id, project_id, parent_id, name) VALUES (?, ?, ?, ?)")
			.bind(folder.id.get())
			.bind(folder.project_id.get())
			.bind(folder.parent_id.map(FolderId::get))
			.bind(&folder.name)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn is_descendant(&self, candidate: FolderId, ancestor: FolderId) -> Result<bool> {
		let mut current = candidate;
		for _ in 0..MAX_TREE_DEPTH {
			let Some(folder) = self.get(current).await? else {
				return Ok(false);
			};
			match folder.parent_id {
				Some(parent) if parent == ancestor => return Ok(true),
				Some(parent) => current = parent,
				None => return Ok(false),
			}
		}
		Err(LdmError::IntegrityViolation(format!("folder parent chain from {candidate} exceeds max depth")))
	}

	#[tracing::instrument(skip(self), fields(folder_id = %folder_id))]
	pub async fn r#move(&self, folder_id: FolderId, new_parent_id: Option<FolderId>) -> Result<Folder> {
		let folder = self.get(folder_id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {folder_id}")))?;
		if let Some(target) = new_parent_id {
			if target == folder_id || self.is_descendant(target, folder_id).await? {
				return Err(LdmError::CycleWouldBeIntroduced(format!(
					"moving folder {folder_id} under {target} would create a cycle"
				)));
			}
		}
		let checker = OfflineSiblingCheck { pool: &self.pool, project_id: folder.project_id, parent_id: new_parent_id };
		let effective_name = generate_unique_name(&folder.name, &checker, Some(folder_id.get())).await?;
		sqlx::query("UPDATE offline_folders SET parent_id = ?, name = ? WHERE id = ?")
			.bind(new_parent_id.map(FolderId::get))
			.bind(&effective_name)
			.bind(folder_id.get())
			.execute(&self.pool)
			.await?;
		Ok(Folder { parent_id: new_parent_id, name: effective_name, ..folder })
	}

	#[tracing::instrument(skip(self), fields(folder_id = %folder_id, target_project = %target_project))]
	pub async fn move_cross_project(&self, folder_id: FolderId, target_project: ProjectId, target_parent: Option<FolderId>) -> Result<Folder> {
		if target_project != ldm_types::OFFLINE_STORAGE_PROJECT_ID {
			return Err(LdmError::CrossProjectNotSupportedOffline(format!(
				"folder {folder_id} cannot move to project {target_project} offline; only the Offline-Storage project is reachable"
			)));
		}
		let folder = self.get(folder_id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {folder_id}")))?;
		let mut tx = self.pool.begin().await?;

		let effective_name = {
			let checker = OfflineSiblingCheck { pool: &self.pool, project_id: target_project, parent_id: target_parent };
			generate_unique_name(&folder.name, &checker, None).await?
		};

		let mut stack = vec![folder_id];
		let mut descendant_folders = Vec::new();
		while let Some(current) = stack.pop() {
			let children = sqlx::query("SELECT id FROM offline_folders WHERE parent_id = ?")
				.bind(current.get())
				.fetch_all(&mut *tx)
				.await?;
			for child in children {
				let child_id = FolderId::new(child.get("id"));
				descendant_folders.push(child_id);
				stack.push(child_id);
			}
		}

		for descendant in &descendant_folders {
			sqlx::query("UPDATE offline_folders SET project_id = ? WHERE id = ?")
				.bind(target_project.get())
				.bind(descendant.get())
				.execute(&mut *tx)
				.await?;
			sqlx::query("UPDATE offline_files SET project_id = ? WHERE folder_id = ?")
				.bind(target_project.get())
				.bind(descendant.get())
				.execute(&mut *tx)
				.await?;
		}
		sqlx::query("UPDATE offline_files SET project_id = ? WHERE folder_id = ?")
			.bind(target_project.get())
			.bind(folder_id.get())
			.execute(&mut *tx)
			.await?;
		sqlx::query("UPDATE offline_folders SET project_id = ?, parent_id = ?, name = ? WHERE id = ?")
			.bind(target_project.get())
			.bind(target_parent.map(FolderId::get))
			.bind(&effective_name)
			.bind(folder_id.get())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(Folder { project_id: target_project, parent_id: target_parent, name: effective_name, ..folder })
	}

	#[tracing::instrument(skip(self), fields(folder_id = %folder_id))]
	pub async fn copy(&self, folder_id: FolderId, target_project: Option<ProjectId>, target_parent: Option<FolderId>) -> Result<Folder> {
		let source = self.get(folder_id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {folder_id}")))?;
		let dest_project = target_project.unwrap_or(source.project_id);
		let mut tx = self.pool.begin().await?;
		let new_root = self.copy_subtree(&mut tx, folder_id, dest_project, target_parent).await?;
		tx.commit().await?;
		Ok(new_root)
	}

	async fn copy_subtree(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
		source_id: FolderId,
		dest_project: ProjectId,
		dest_parent: Option<FolderId>,
	) -> Result<Folder> {
		let source = sqlx::query("SELECT id, project_id, parent_id, name FROM offline_folders WHERE id = ?")
			.bind(source_id.get())
			.fetch_one(&mut **tx)
			.await
			.map(|r| row_to_folder(r.get("id"), r.get("project_id"), r.get("parent_id"), r.get("name")))?;

		let checker = OfflineSiblingCheck { pool: &self.pool, project_id: dest_project, parent_id: dest_parent };
		let name = generate_unique_name(&source.name, &checker, None).await?;

		// Collision retry is not attempted here: a collision would roll back
		// the whole copy transaction, which is simpler to let propagate (and
		// retry wholesale, per spec §7) than to patch mid-flight.
		let new_id = FolderId::new(self.id_alloc.next_negative_id());
		sqlx::query("INSERT INTO offline_folders (id, project_id, parent_id, name) VALUES (?, ?, ?, ?)")
			.bind(new_id.get())
			.bind(dest_project.get())
			.bind(dest_parent.map(FolderId::get))
			.bind(&name)
			.execute(&mut **tx)
			.await?;

		let files = sqlx::query("SELECT id, name, original_filename, format, source_language, target_language, extra_data FROM offline_files WHERE folder_id = ?")
			.bind(source_id.get())
			.fetch_all(&mut **tx)
			.await?;
		for file in files {
			let new_file_id = self.id_alloc.next_negative_id();
			sqlx::query(
				"INSERT INTO offline_files (id, project_id, folder_id, name, original_filename, format, source_language, target_language, extra_data, row_count, sync_status) \
				 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 'local')",
			)
			.bind(new_file_id)
			.bind(dest_project.get())
			.bind(new_id.get())
			.bind(file.get::<String, _>("name"))
			.bind(file.get::<String, _>("original_filename"))
			.bind(file.get::<String, _>("format"))
			.bind(file.get::<String, _>("source_language"))
			.bind(file.get::<Option<String>, _>("target_language"))
			.bind(file.get::<Option<String>, _>("extra_data"))
			.execute(&mut **tx)
			.await?;

			let old_file_id: i64 = file.get("id");
			let rows = sqlx::query("SELECT row_num, string_id, source, target, memo, status, extra_data FROM offline_rows WHERE file_id = ?")
				.bind(old_file_id)
				.fetch_all(&mut **tx)
				.await?;
			for row in &rows {
				let new_row_id = self.id_alloc.next_negative_id();
				sqlx::query(
					"INSERT INTO offline_rows (id, file_id, row_num, string_id, source, target, memo, status, extra_data, sync_status) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'local')",
				)
				.bind(new_row_id)
				.bind(new_file_id)
				.bind(row.get::<i64, _>("row_num"))
				.bind(row.get::<Option<String>, _>("string_id"))
				.bind(row.get::<String, _>("source"))
				.bind(row.get::<String, _>("target"))
				.bind(row.get::<Option<String>, _>("memo"))
				.bind(row.get::<String, _>("status"))
				.bind(row.get::<Option<String>, _>("extra_data"))
				.execute(&mut **tx)
				.await?;
			}
			sqlx::query("UPDATE offline_files SET row_count = ? WHERE id = ?")
				.bind(rows.len() as i64)
				.bind(new_file_id)
				.execute(&mut **tx)
				.await?;
		}

		let children = sqlx::query("SELECT id FROM offline_folders WHERE parent_id = ? AND id != ?")
			.bind(source_id.get())
			.bind(new_id.get())
			.fetch_all(&mut **tx)
			.await?;
		for child in children {
			let child_id = FolderId::new(child.get("id"));
			Box::pin(self.copy_subtree(tx, child_id, dest_project, Some(new_id))).await?;
		}

		Ok(Folder { id: new_id, project_id: dest_project, parent_id: dest_parent, name })
	}
}

#[async_trait]
impl FolderStore for OfflineFolderRepository {
	async fn get(&self, id: FolderId) -> Result<Option<Folder>> {
		self.get(id).await
	}
	async fn get_all(&self, project_id: ProjectId) -> Result<Vec<Folder>> {
		self.get_all(project_id).await
	}
	async fn get_with_contents(&self, id: FolderId) -> Result<FolderContents> {
		self.get_with_contents(id).await
	}
	async fn create(&self, project_id: ProjectId, parent_id: Option<FolderId>, name: &str) -> Result<Folder> {
		self.create(project_id, parent_id, name).await
	}
	async fn rename(&self, id: FolderId, name: &str) -> Result<Folder> {
		self.rename(id, name).await
	}
	async fn delete(&self, id: FolderId) -> Result<bool> {
		self.delete(id).await
	}
	async fn is_descendant(&self, candidate: FolderId, ancestor: FolderId) -> Result<bool> {
		self.is_descendant(candidate, ancestor).await
	}
	async fn r#move(&self, folder_id: FolderId, new_parent_id: Option<FolderId>) -> Result<Folder> {
		self.r#move(folder_id, new_parent_id).await
	}
	async fn move_cross_project(&self, folder_id: FolderId, target_project: ProjectId, target_parent: Option<FolderId>) -> Result<Folder> {
		self.move_cross_project(folder_id, target_project, target_parent).await
	}
	async fn copy(&self, folder_id: FolderId, target_project: Option<ProjectId>, target_parent: Option<FolderId>) -> Result<Folder> {
		self.copy(folder_id, target_project, target_parent).await
	}
	async fn recreate_with_id(&self, folder: &Folder) -> Result<()> {
		self.recreate_with_id(folder).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	async fn seed_chain(repo: &OfflineFolderRepository, project_id: ProjectId) -> (FolderId, FolderId, FolderId) {
		let a = repo.create(project_id, None, "A").await.unwrap();
		let b = repo.create(project_id, Some(a.id), "B").await.unwrap();
		let c = repo.create(project_id, Some(b.id), "C").await.unwrap();
		(a.id, b.id, c.id)
	}

	#[tokio::test]
	async fn move_into_own_descendant_is_rejected_scenario_s5() {
		let pool = offline_test_pool().await;
		let repo = OfflineFolderRepository::new(pool);
		let project_id = ProjectId::new(1);
		let (a, _b, c) = seed_chain(&repo, project_id).await;

		let err = repo.r#move(a, Some(c)).await.unwrap_err();
		assert!(matches!(err, LdmError::CycleWouldBeIntroduced(_)));

		let still_root = repo.get(a).await.unwrap().unwrap();
		assert_eq!(still_root.parent_id, None);
	}

	#[tokio::test]
	async fn move_into_self_is_rejected() {
		let pool = offline_test_pool().await;
		let repo = OfflineFolderRepository::new(pool);
		let project_id = ProjectId::new(1);
		let a = repo.create(project_id, None, "A").await.unwrap();
		let err = repo.r#move(a.id, Some(a.id)).await.unwrap_err();
		assert!(matches!(err, LdmError::CycleWouldBeIntroduced(_)));
	}

	#[tokio::test]
	async fn move_cross_project_rejects_non_offline_storage_target() {
		let pool = offline_test_pool().await;
		let repo = OfflineFolderRepository::new(pool);
		let project_id = ProjectId::new(1);
		let (a, _b, _c) = seed_chain(&repo, project_id).await;

		let err = repo.move_cross_project(a, ProjectId::new(2), None).await.unwrap_err();
		assert!(matches!(err, LdmError::CrossProjectNotSupportedOffline(_)));
		let still_there = repo.get(a).await.unwrap().unwrap();
		assert_eq!(still_there.project_id, project_id);
	}

	#[tokio::test]
	async fn move_cross_project_allows_offline_storage_target() {
		let pool = offline_test_pool().await;
		let repo = OfflineFolderRepository::new(pool);
		let project_id = ProjectId::new(1);
		let (a, _b, c) = seed_chain(&repo, project_id).await;

		let moved = repo.move_cross_project(a, ldm_types::OFFLINE_STORAGE_PROJECT_ID, None).await.unwrap();
		assert_eq!(moved.project_id, ldm_types::OFFLINE_STORAGE_PROJECT_ID);
		let descendant = repo.get(c).await.unwrap().unwrap();
		assert_eq!(descendant.project_id, ldm_types::OFFLINE_STORAGE_PROJECT_ID);
	}

	#[tokio::test]
	async fn create_auto_renames_within_same_parent_only() {
		let pool = offline_test_pool().await;
		let repo = OfflineFolderRepository::new(pool);
		let project_id = ProjectId::new(1);
		let parent = repo.create(project_id, None, "Parent").await.unwrap();
		repo.create(project_id, Some(parent.id), "Child").await.unwrap();
		let second = repo.create(project_id, Some(parent.id), "Child").await.unwrap();
		assert_eq!(second.name, "Child_1");

		// a sibling at the root namespace does not collide with one nested under Parent
		let root_child = repo.create(project_id, None, "Child").await.unwrap();
		assert_eq!(root_child.name, "Child");
	}

	#[tokio::test]
	async fn create_allocates_negative_ids() {
		let pool = offline_test_pool().await;
		let repo = OfflineFolderRepository::new(pool);
		let folder = repo.create(ProjectId::new(1), None, "A").await.unwrap();
		assert!(folder.id.is_local());
	}

	#[tokio::test]
	async fn copy_gives_the_new_subtree_fresh_negative_ids() {
		let pool = offline_test_pool().await;
		let repo = OfflineFolderRepository::new(pool);
		let project_id = ProjectId::new(1);
		let (a, b, _c) = seed_chain(&repo, project_id).await;
		let copied = repo.copy(a, None, None).await.unwrap();
		assert!(copied.id.is_local());
		assert_ne!(copied.id, a);
		let contents = repo.get_with_contents(copied.id).await.unwrap();
		assert_eq!(contents.folders.len(), 1);
		assert_ne!(contents.folders[0].id, b);
		assert!(contents.folders[0].id.is_local());
	}
}
