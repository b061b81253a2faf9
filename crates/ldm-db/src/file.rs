// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! FileRepository (spec §4.4.4): file metadata and row-count bookkeeping.
//! Row content itself lives in `row.rs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ldm_types::{File, FileId, FolderId, LdmError, OfflineFileFields, ProjectId, Result, SyncStatus};
use sqlx::{PgPool, Row as _, SqlitePool};

use crate::naming::{generate_unique_name, NameExistsCheck};

#[async_trait]
pub trait FileStore: Send + Sync {
	async fn get(&self, id: FileId) -> Result<Option<File>>;
	async fn get_all(&self, project_id: ProjectId, folder_id: Option<FolderId>) -> Result<Vec<File>>;
	#[allow(clippy::too_many_arguments)]
	async fn create(
		&self,
		project_id: ProjectId,
		folder_id: Option<FolderId>,
		name: &str,
		original_filename: &str,
		format: &str,
		source_language: &str,
		target_language: Option<&str>,
	) -> Result<File>;
	async fn rename(&self, id: FileId, name: &str) -> Result<File>;
	async fn r#move(&self, id: FileId, new_folder_id: Option<FolderId>) -> Result<File>;
	/// Rewrites `project_id` (and `folder_id`) to a destination project,
	/// auto-renaming against the destination's siblings. Rows are carried
	/// over untouched, row IDs preserved (spec §4.4.4). The Offline adapter
	/// rejects any `target_project` other than the well-known Offline-Storage
	/// project with `CrossProjectNotSupportedOffline`; the Online adapter has
	/// no such restriction.
	async fn move_cross_project(&self, id: FileId, target_project: ProjectId, target_folder: Option<FolderId>) -> Result<File>;
	async fn delete(&self, id: FileId) -> Result<bool>;
	async fn recount_rows(&self, id: FileId) -> Result<i64>;
	async fn mark_downloaded(&self, id: FileId, server_id: i64, server_project_id: i64, server_folder_id: Option<i64>) -> Result<File>;
	/// Reinserts a file with its original ID, for the `ldm-core` restore
	/// coordinator (spec §8 testable property 7, scenario S2).
	async fn recreate_with_id(&self, file: &File) -> Result<()>;
}

fn row_to_file(row: &sqlx::postgres::PgRow) -> File {
	File {
		id: FileId::new(row.get("id")),
		project_id: ProjectId::new(row.get("project_id")),
		folder_id: row.get::<Option<i64>, _>("folder_id").map(FolderId::new),
		name: row.get("name"),
		original_filename: row.get("original_filename"),
		format: row.get("format"),
		row_count: row.get("row_count"),
		source_language: row.get("source_language"),
		target_language: row.get("target_language"),
		extra_data: row.get("extra_data"),
		offline: OfflineFileFields::default(),
	}
}

fn offline_row_to_file(row: &sqlx::sqlite::SqliteRow) -> File {
	let extra_data = row
		.get::<Option<String>, _>("extra_data")
		.and_then(|s| serde_json::from_str(&s).ok());
	File {
		id: FileId::new(row.get("id")),
		project_id: ProjectId::new(row.get("project_id")),
		folder_id: row.get::<Option<i64>, _>("folder_id").map(FolderId::new),
		name: row.get("name"),
		original_filename: row.get("original_filename"),
		format: row.get("format"),
		row_count: row.get("row_count"),
		source_language: row.get("source_language"),
		target_language: row.get("target_language"),
		extra_data,
		offline: OfflineFileFields {
			sync_status: row.get::<Option<String>, _>("sync_status").and_then(|s| s.parse().ok()),
			server_id: row.get("server_id"),
			server_project_id: row.get("server_project_id"),
			server_folder_id: row.get("server_folder_id"),
			downloaded_at: row
				.get::<Option<String>, _>("downloaded_at")
				.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
				.map(|dt| dt.with_timezone(&Utc)),
		},
	}
}

// ---------------------------------------------------------------------------
// Online (Postgres)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OnlineFileRepository {
	pool: PgPool,
}

struct OnlineSiblingCheck<'a> {
	pool: &'a PgPool,
	project_id: ProjectId,
	folder_id: Option<FolderId>,
}

#[async_trait]
impl NameExistsCheck for OnlineSiblingCheck<'_> {
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool> {
		let row = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM ldm_files WHERE project_id = $1 AND folder_id IS NOT DISTINCT FROM $2 \
			 AND lower(name) = lower($3) AND ($4::bigint IS NULL OR id != $4)) AS exists_",
		)
		.bind(self.project_id.get())
		.bind(self.folder_id.map(FolderId::get))
		.bind(candidate)
		.bind(exclude_id)
		.fetch_one(self.pool)
		.await?;
		Ok(row.get("exists_"))
	}
}

impl OnlineFileRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(file_id = %id))]
	pub async fn get(&self, id: FileId) -> Result<Option<File>> {
		let row = sqlx::query(
			"SELECT id, project_id, folder_id, name, original_filename, format, row_count, source_language, target_language, extra_data \
			 FROM ldm_files WHERE id = $1",
		)
		.bind(id.get())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.as_ref().map(row_to_file))
	}

	pub async fn get_all(&self, project_id: ProjectId, folder_id: Option<FolderId>) -> Result<Vec<File>> {
		let rows = sqlx::query(
			"SELECT id, project_id, folder_id, name, original_filename, format, row_count, source_language, target_language, extra_data \
			 FROM ldm_files WHERE project_id = $1 AND folder_id IS NOT DISTINCT FROM $2 ORDER BY name",
		)
		.bind(project_id.get())
		.bind(folder_id.map(FolderId::get))
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(row_to_file).collect())
	}

	#[tracing::instrument(skip(self, original_filename), fields(project_id = %project_id, name = %name))]
	pub async fn create(
		&self,
		project_id: ProjectId,
		folder_id: Option<FolderId>,
		name: &str,
		original_filename: &str,
		format: &str,
		source_language: &str,
		target_language: Option<&str>,
	) -> Result<File> {
		let checker = OnlineSiblingCheck { pool: &self.pool, project_id, folder_id };
		let effective_name = generate_unique_name(name, &checker, None).await?;
		let row = sqlx::query(
			"INSERT INTO ldm_files (project_id, folder_id, name, original_filename, format, source_language, target_language, row_count) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, 0) \
			 RETURNING id, project_id, folder_id, name, original_filename, format, row_count, source_language, target_language, extra_data",
		)
		.bind(project_id.get())
		.bind(folder_id.map(FolderId::get))
		.bind(&effective_name)
		.bind(original_filename)
		.bind(format)
		.bind(source_language)
		.bind(target_language)
		.fetch_one(&self.pool)
		.await?;
		Ok(row_to_file(&row))
	}

	#[tracing::instrument(skip(self), fields(file_id = %id, name = %name))]
	pub async fn rename(&self, id: FileId, name: &str) -> Result<File> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("file {id}")))?;
		let checker = OnlineSiblingCheck { pool: &self.pool, project_id: current.project_id, folder_id: current.folder_id };
		let effective_name = generate_unique_name(name, &checker, Some(id.get())).await?;
		sqlx::query("UPDATE ldm_files SET name = $1 WHERE id = $2").bind(&effective_name).bind(id.get()).execute(&self.pool).await?;
		Ok(File { name: effective_name, ..current })
	}

	#[tracing::instrument(skip(self), fields(file_id = %id))]
	pub async fn r#move(&self, id: FileId, new_folder_id: Option<FolderId>) -> Result<File> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("file {id}")))?;
		let checker = OnlineSiblingCheck { pool: &self.pool, project_id: current.project_id, folder_id: new_folder_id };
		let effective_name = generate_unique_name(&current.name, &checker, Some(id.get())).await?;
		sqlx::query("UPDATE ldm_files SET folder_id = $1, name = $2 WHERE id = $3")
			.bind(new_folder_id.map(FolderId::get))
			.bind(&effective_name)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		Ok(File { folder_id: new_folder_id, name: effective_name, ..current })
	}

	#[tracing::instrument(skip(self), fields(file_id = %id))]
	pub async fn delete(&self, id: FileId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM ldm_files WHERE id = $1").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self, file), fields(file_id = %file.id))]
	pub async fn recreate_with_id(&self, file: &File) -> Result<()> {
		sqlx::query(
			"INSERT INTO ldm_files (id, project_id, folder_id, name, original_filename, format, row_count, source_language, target_language, extra_data) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
		)
		.bind(file.id.get())
		.bind(file.project_id.get())
		.bind(file.folder_id.map(FolderId::get))
		.bind(&file.name)
		.bind(&file.original_filename)
		.bind(&file.format)
		.bind(file.row_count)
		.bind(&file.source_language)
		.bind(&file.target_language)
		.bind(&file.extra_data)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(file_id = %id))]
	pub async fn recount_rows(&self, id: FileId) -> Result<i64> {
		let row = sqlx::query("SELECT count(*) AS n FROM ldm_rows WHERE file_id = $1").bind(id.get()).fetch_one(&self.pool).await?;
		let count: i64 = row.get("n");
		sqlx::query("UPDATE ldm_files SET row_count = $1 WHERE id = $2").bind(count).bind(id.get()).execute(&self.pool).await?;
		Ok(count)
	}

	/// Online files carry no download provenance; this exists so the
	/// trait is symmetric across backends (offline rejects with
	/// `CapabilityRequiresOnline`... inverted here: it's simply a no-op
	/// marker the online side never calls).
	pub async fn mark_downloaded(&self, _id: FileId, _server_id: i64, _server_project_id: i64, _server_folder_id: Option<i64>) -> Result<File> {
		Err(LdmError::IntegrityViolation("mark_downloaded is an offline-only operation".into()))
	}

	#[tracing::instrument(skip(self), fields(file_id = %id, target_project = %target_project))]
	pub async fn move_cross_project(&self, id: FileId, target_project: ProjectId, target_folder: Option<FolderId>) -> Result<File> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("file {id}")))?;
		let checker = OnlineSiblingCheck { pool: &self.pool, project_id: target_project, folder_id: target_folder };
		let effective_name = generate_unique_name(&current.name, &checker, None).await?;
		sqlx::query("UPDATE ldm_files SET project_id = $1, folder_id = $2, name = $3 WHERE id = $4")
			.bind(target_project.get())
			.bind(target_folder.map(FolderId::get))
			.bind(&effective_name)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		Ok(File { project_id: target_project, folder_id: target_folder, name: effective_name, ..current })
	}
}

#[async_trait]
impl FileStore for OnlineFileRepository {
	async fn get(&self, id: FileId) -> Result<Option<File>> {
		self.get(id).await
	}
	async fn get_all(&self, project_id: ProjectId, folder_id: Option<FolderId>) -> Result<Vec<File>> {
		self.get_all(project_id, folder_id).await
	}
	async fn create(
		&self,
		project_id: ProjectId,
		folder_id: Option<FolderId>,
		name: &str,
		original_filename: &str,
		format: &str,
		source_language: &str,
		target_language: Option<&str>,
	) -> Result<File> {
		self.create(project_id, folder_id, name, original_filename, format, source_language, target_language).await
	}
	async fn rename(&self, id: FileId, name: &str) -> Result<File> {
		self.rename(id, name).await
	}
	async fn r#move(&self, id: FileId, new_folder_id: Option<FolderId>) -> Result<File> {
		self.r#move(id, new_folder_id).await
	}
	async fn move_cross_project(&self, id: FileId, target_project: ProjectId, target_folder: Option<FolderId>) -> Result<File> {
		self.move_cross_project(id, target_project, target_folder).await
	}
	async fn delete(&self, id: FileId) -> Result<bool> {
		self.delete(id).await
	}
	async fn recount_rows(&self, id: FileId) -> Result<i64> {
		self.recount_rows(id).await
	}
	async fn mark_downloaded(&self, id: FileId, server_id: i64, server_project_id: i64, server_folder_id: Option<i64>) -> Result<File> {
		self.mark_downloaded(id, server_id, server_project_id, server_folder_id).await
	}
	async fn recreate_with_id(&self, file: &File) -> Result<()> {
		self.recreate_with_id(file).await
	}
}

// ---------------------------------------------------------------------------
// Offline (SQLite)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OfflineFileRepository {
	pool: SqlitePool,
	id_alloc: std::sync::Arc<crate::id_alloc::IdAllocator>,
}

struct OfflineSiblingCheck<'a> {
	pool: &'a SqlitePool,
	project_id: ProjectId,
	folder_id: Option<FolderId>,
}

#[async_trait]
impl NameExistsCheck for OfflineSiblingCheck<'_> {
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool> {
		let row = sqlx::query(
			"SELECT EXISTS(SELECT 1 FROM offline_files WHERE project_id = ? AND folder_id IS ? \
			 AND lower(name) = lower(?) AND (?4 IS NULL OR id != ?4)) AS exists_",
		)
		.bind(self.project_id.get())
		.bind(self.folder_id.map(FolderId::get))
		.bind(candidate)
		.bind(exclude_id)
		.fetch_one(self.pool)
		.await?;
		Ok(row.get::<i64, _>("exists_") != 0)
	}
}

impl OfflineFileRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::default()) }
	}

	/// Same as [`Self::new`] but with the ID modulus driven by
	/// `DatabaseConfig::negative_id_modulus` rather than the built-in default.
	pub fn with_modulus(pool: SqlitePool, modulus: i64) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::new(modulus)) }
	}

	#[tracing::instrument(skip(self), fields(file_id = %id))]
	pub async fn get(&self, id: FileId) -> Result<Option<File>> {
		let row = sqlx::query(
			"SELECT id, project_id, folder_id, name, original_filename, format, row_count, source_language, target_language, extra_data, \
			 sync_status, server_id, server_project_id, server_folder_id, downloaded_at FROM offline_files WHERE id = ?",
		)
		.bind(id.get())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.as_ref().map(offline_row_to_file))
	}

	pub async fn get_all(&self, project_id: ProjectId, folder_id: Option<FolderId>) -> Result<Vec<File>> {
		let rows = sqlx::query(
			"SELECT id, project_id, folder_id, name, original_filename, format, row_count, source_language, target_language, extra_data, \
			 sync_status, server_id, server_project_id, server_folder_id, downloaded_at FROM offline_files \
			 WHERE project_id = ? AND folder_id IS ? ORDER BY name",
		)
		.bind(project_id.get())
		.bind(folder_id.map(FolderId::get))
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(offline_row_to_file).collect())
	}

	#[tracing::instrument(skip(self, original_filename), fields(project_id = %project_id, name = %name))]
	pub async fn create(
		&self,
		project_id: ProjectId,
		folder_id: Option<FolderId>,
		name: &str,
		original_filename: &str,
		format: &str,
		source_language: &str,
		target_language: Option<&str>,
	) -> Result<File> {
		let checker = OfflineSiblingCheck { pool: &self.pool, project_id, folder_id };
		let effective_name = generate_unique_name(name, &checker, None).await?;
		let id = crate::id_alloc::insert_with_retry(&self.id_alloc, |candidate| {
			let pool = self.pool.clone();
			let effective_name = effective_name.clone();
			async move {
				sqlx::query(
					"INSERT INTO offline_files (id, project_id, folder_id, name, original_filename, format, source_language, target_language, row_count, sync_status) \
					 VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 'local')",
				)
				.bind(candidate)
				.bind(project_id.get())
				.bind(folder_id.map(FolderId::get))
				.bind(&effective_name)
				.bind(original_filename)
				.bind(format)
				.bind(source_language)
				.bind(target_language)
				.execute(&pool)
				.await?;
				Ok(candidate)
			}
		})
		.await?;
		self.get(FileId::new(id)).await?.ok_or_else(|| LdmError::NotFound("just-inserted file".into()))
	}

	#[tracing::instrument(skip(self), fields(file_id = %id, name = %name))]
	pub async fn rename(&self, id: FileId, name: &str) -> Result<File> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("file {id}")))?;
		let checker = OfflineSiblingCheck { pool: &self.pool, project_id: current.project_id, folder_id: current.folder_id };
		let effective_name = generate_unique_name(name, &checker, Some(id.get())).await?;
		sqlx::query("UPDATE offline_files SET name = ? WHERE id = ?").bind(&effective_name).bind(id.get()).execute(&self.pool).await?;
		Ok(File { name: effective_name, ..current })
	}

	#[tracing::instrument(skip(self), fields(file_id = %id))]
	pub async fn r#move(&self, id: FileId, new_folder_id: Option<FolderId>) -> Result<File> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("file {id}")))?;
		let checker = OfflineSiblingCheck { pool: &self.pool, project_id: current.project_id, folder_id: new_folder_id };
		let effective_name = generate_unique_name(&current.name, &checker, Some(id.get())).await?;
		sqlx::query("UPDATE offline_files SET folder_id = ?, name = ? WHERE id = ?")
			.bind(new_folder_id.map(FolderId::get))
			.bind(&effective_name)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		Ok(File { folder_id: new_folder_id, name: effective_name, ..current })
	}

	#[tracing::instrument(skip(self), fields(file_id = %id))]
	pub async fn delete(&self, id: FileId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM offline_files WHERE id = ?").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self, file), fields(file_id = %file.id))]
	pub async fn recreate_with_id(&self, file: &File) -> Result<()> {
		let extra_data = file.extra_data.as_ref().map(|v| v.to_string());
		sqlx::query(
			"INSERT INTO offline_files (id, project_id, folder_id, name, original_filename, format, row_count, source_language, target_language, extra_data, sync_status, server_id, server_project_id, server_folder_id, downloaded_at) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(file.id.get())
		.bind(file.project_id.get())
		.bind(file.folder_id.map(FolderId::get))
		.bind(&file.name)
		.bind(&file.original_filename)
		.bind(&file.format)
		.bind(file.row_count)
		.bind(&file.source_language)
		.bind(&file.target_language)
		.bind(extra_data)
		.bind(file.offline.sync_status.map(|s| s.to_string()).unwrap_or_else(|| "local".into()))
		.bind(file.offline.server_id)
		.bind(file.offline.server_project_id)
		.bind(file.offline.server_folder_id)
		.bind(file.offline.downloaded_at.map(|dt| dt.to_rfc3339()))
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(file_id = %id))]
	pub async fn recount_rows(&self, id: FileId) -> Result<i64> {
		let row = sqlx::query("SELECT count(*) AS n FROM offline_rows WHERE file_id = ?").bind(id.get()).fetch_one(&self.pool).await?;
		let count: i64 = row.get("n");
		sqlx::query("UPDATE offline_files SET row_count = ? WHERE id = ?").bind(count).bind(id.get()).execute(&self.pool).await?;
		Ok(count)
	}

	/// Records that a locally-created file now has a server-side twin
	/// (spec §5, sync down/up bookkeeping). `sync_status` flips to
	/// `Synced` and `downloaded_at` is stamped.
	#[tracing::instrument(skip(self), fields(file_id = %id, server_id))]
	pub async fn mark_downloaded(&self, id: FileId, server_id: i64, server_project_id: i64, server_folder_id: Option<i64>) -> Result<File> {
		let now = Utc::now().to_rfc3339();
		sqlx::query(
			"UPDATE offline_files SET sync_status = ?, server_id = ?, server_project_id = ?, server_folder_id = ?, downloaded_at = ? WHERE id = ?",
		)
		.bind(SyncStatus::Synced.to_string())
		.bind(server_id)
		.bind(server_project_id)
		.bind(server_folder_id)
		.bind(&now)
		.bind(id.get())
		.execute(&self.pool)
		.await?;
		self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("file {id}")))
	}

	#[tracing::instrument(skip(self), fields(file_id = %id, target_project = %target_project))]
	pub async fn move_cross_project(&self, id: FileId, target_project: ProjectId, target_folder: Option<FolderId>) -> Result<File> {
		if target_project != ldm_types::OFFLINE_STORAGE_PROJECT_ID {
			return Err(LdmError::CrossProjectNotSupportedOffline(format!(
				"file {id} cannot move to project {target_project} offline; only the Offline-Storage project is reachable"
			)));
		}
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("file {id}")))?;
		let checker = OfflineSiblingCheck { pool: &self.pool, project_id: target_project, folder_id: target_folder };
		let effective_name = generate_unique_name(&current.name, &checker, None).await?;
		sqlx::query("UPDATE offline_files SET project_id = ?, folder_id = ?, name = ? WHERE id = ?")
			.bind(target_project.get())
			.bind(target_folder.map(FolderId::get))
			.bind(&effective_name)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		Ok(File { project_id: target_project, folder_id: target_folder, name: effective_name, ..current })
	}
}

#[async_trait]
impl FileStore for OfflineFileRepository {
	async fn get(&self, id: FileId) -> Result<Option<File>> {
		self.get(id).await
	}
	async fn get_all(&self, project_id: ProjectId, folder_id: Option<FolderId>) -> Result<Vec<File>> {
		self.get_all(project_id, folder_id).await
	}
	async fn create(
		&self,
		project_id: ProjectId,
		folder_id: Option<FolderId>,
		name: &str,
		original_filename: &str,
		format: &str,
		source_language: &str,
		target_language: Option<&str>,
	) -> Result<File> {
		self.create(project_id, folder_id, name, original_filename, format, source_language, target_language).await
	}
	async fn rename(&self, id: FileId, name: &str) -> Result<File> {
		self.rename(id, name).await
	}
	async fn r#move(&self, id: FileId, new_folder_id: Option<FolderId>) -> Result<File> {
		self.r#move(id, new_folder_id).await
	}
	async fn move_cross_project(&self, id: FileId, target_project: ProjectId, target_folder: Option<FolderId>) -> Result<File> {
		self.move_cross_project(id, target_project, target_folder).await
	}
	async fn delete(&self, id: FileId) -> Result<bool> {
		self.delete(id).await
	}
	async fn recount_rows(&self, id: FileId) -> Result<i64> {
		self.recount_rows(id).await
	}
	async fn mark_downloaded(&self, id: FileId, server_id: i64, server_project_id: i64, server_folder_id: Option<i64>) -> Result<File> {
		self.mark_downloaded(id, server_id, server_project_id, server_folder_id).await
	}
	async fn recreate_with_id(&self, file: &File) -> Result<()> {
		self.recreate_with_id(file).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	#[tokio::test]
	async fn create_auto_renames_on_collision() {
		let pool = offline_test_pool().await;
		let repo = OfflineFileRepository::new(pool);
		let project_id = ProjectId::new(1);
		repo.create(project_id, None, "strings.json", "strings.json", "json", "en", Some("fr")).await.unwrap();
		let second = repo.create(project_id, None, "strings.json", "strings.json", "json", "en", Some("fr")).await.unwrap();
		assert_eq!(second.name, "strings_1.json");
	}

	#[tokio::test]
	async fn create_allocates_a_negative_id() {
		let pool = offline_test_pool().await;
		let repo = OfflineFileRepository::new(pool);
		let file = repo.create(ProjectId::new(1), None, "f.json", "f.json", "json", "en", None).await.unwrap();
		assert!(file.id.is_local());
	}

	#[tokio::test]
	async fn recount_rows_reflects_inserted_rows() {
		let pool = offline_test_pool().await;
		let repo = OfflineFileRepository::new(pool.clone());
		let project_id = ProjectId::new(1);
		let file = repo.create(project_id, None, "f.json", "f.json", "json", "en", None).await.unwrap();
		sqlx::query("INSERT INTO offline_rows (file_id, row_num, source) VALUES (?, 0, 'hi'), (?, 1, 'bye')")
			.bind(file.id.get())
			.bind(file.id.get())
			.execute(&pool)
			.await
			.unwrap();
		let count = repo.recount_rows(file.id).await.unwrap();
		assert_eq!(count, 2);
		assert_eq!(repo.get(file.id).await.unwrap().unwrap().row_count, 2);
	}

	#[tokio::test]
	async fn move_cross_project_preserves_row_count_and_renames_on_collision() {
		let pool = offline_test_pool().await;
		let repo = OfflineFileRepository::new(pool.clone());
		let source_project = ProjectId::new(1);
		let dest_project = ldm_types::OFFLINE_STORAGE_PROJECT_ID;
		repo.create(dest_project, None, "report.csv", "report.csv", "csv", "en", None).await.unwrap();
		let file = repo.create(source_project, None, "report.csv", "report.csv", "csv", "en", None).await.unwrap();
		sqlx::query("INSERT INTO offline_rows (file_id, row_num, source) VALUES (?, 0, 'hi')").bind(file.id.get()).execute(&pool).await.unwrap();
		repo.recount_rows(file.id).await.unwrap();

		let moved = repo.move_cross_project(file.id, dest_project, None).await.unwrap();
		assert_eq!(moved.project_id, dest_project);
		assert_eq!(moved.name, "report_1.csv");
		assert_eq!(moved.row_count, 1);
	}

	#[tokio::test]
	async fn move_cross_project_rejects_non_offline_storage_target() {
		let pool = offline_test_pool().await;
		let repo = OfflineFileRepository::new(pool);
		let source_project = ProjectId::new(1);
		let file = repo.create(source_project, None, "report.csv", "report.csv", "csv", "en", None).await.unwrap();
		let err = repo.move_cross_project(file.id, ProjectId::new(2), None).await.unwrap_err();
		assert!(matches!(err, LdmError::CrossProjectNotSupportedOffline(_)));
	}

	#[tokio::test]
	async fn mark_downloaded_stamps_sync_metadata() {
		let pool = offline_test_pool().await;
		let repo = OfflineFileRepository::new(pool);
		let project_id = ProjectId::new(1);
		let file = repo.create(project_id, None, "f.json", "f.json", "json", "en", None).await.unwrap();
		let updated = repo.mark_downloaded(file.id, 501, 9, None).await.unwrap();
		assert_eq!(updated.offline.server_id, Some(501));
		assert_eq!(updated.offline.sync_status, Some(SyncStatus::Synced));
		assert!(updated.offline.downloaded_at.is_some());
	}
}
