// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! TMRepository (spec §4.4.6): translation memory CRUD, scope assignment,
//! project linking, entries, and search. The trigram `search_similar` is
//! online-only; the offline adapter's `search_entries` reproduces the
//! original implementation's discrete LIKE-based scoring (SPEC_FULL §2.3).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ldm_types::{
	ActiveTm, FileId, FolderId, LdmError, PlatformId, ProjectId, Result, ScopeKind, ScopeTarget, Tm,
	TmAssignment, TmEntry, TmId, TmMode, TmProjectLink, TmStatus, UserId, OFFLINE_STORAGE_NAME,
	OFFLINE_STORAGE_PLATFORM_ID,
};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct NewTmEntry {
	pub source_text: String,
	pub target_text: String,
	pub string_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TmIndexInfo {
	pub index_type: String,
	pub status: TmStatus,
	pub file_size_bytes: Option<i64>,
	pub built_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TmSearchHit {
	pub entry: TmEntry,
	pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TmTree {
	pub unassigned: Vec<Tm>,
	pub platforms: Vec<PlatformTmNode>,
}

#[derive(Debug, Clone)]
pub struct PlatformTmNode {
	pub platform_id: PlatformId,
	pub platform_name: String,
	pub tms: Vec<Tm>,
	pub projects: Vec<ProjectTmNode>,
}

#[derive(Debug, Clone)]
pub struct ProjectTmNode {
	pub project_id: ProjectId,
	pub project_name: String,
	pub tms: Vec<Tm>,
	pub folders: Vec<FolderTmNode>,
}

#[derive(Debug, Clone)]
pub struct FolderTmNode {
	pub folder_id: FolderId,
	pub folder_name: String,
	pub tms: Vec<Tm>,
	pub folders: Vec<FolderTmNode>,
}

/// Deterministic normalization applied before hashing a TM entry's source
/// (spec §3 `source_hash`): lowercase, trim, collapse internal whitespace.
pub fn normalize_source(source: &str) -> String {
	source.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn source_hash(source: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(normalize_source(source).as_bytes());
	format!("{:x}", hasher.finalize())
}

const MAX_TREE_DEPTH: usize = 256;

#[async_trait]
pub trait TmStore: Send + Sync {
	async fn get(&self, id: TmId) -> Result<Option<Tm>>;
	async fn get_all(&self) -> Result<Vec<Tm>>;
	async fn create(&self, name: &str, source_lang: &str, target_lang: &str, owner_id: Option<UserId>) -> Result<Tm>;
	async fn delete(&self, id: TmId) -> Result<bool>;

	async fn assign(&self, tm_id: TmId, target: ScopeTarget) -> Result<()>;
	async fn unassign(&self, tm_id: TmId) -> Result<()>;
	async fn activate(&self, tm_id: TmId) -> Result<()>;
	async fn deactivate(&self, tm_id: TmId) -> Result<()>;
	async fn get_assignment(&self, tm_id: TmId) -> Result<Option<TmAssignment>>;

	async fn get_for_scope(
		&self,
		platform_id: Option<PlatformId>,
		project_id: Option<ProjectId>,
		folder_id: Option<FolderId>,
		include_inactive: bool,
	) -> Result<Vec<Tm>>;
	async fn get_active_for_file(&self, file_id: FileId) -> Result<Vec<ActiveTm>>;

	async fn link_to_project(&self, tm_id: TmId, project_id: ProjectId, priority: i32) -> Result<()>;
	async fn unlink_from_project(&self, tm_id: TmId, project_id: ProjectId) -> Result<()>;
	async fn get_linked_for_project(&self, project_id: ProjectId) -> Result<Option<Tm>>;
	async fn get_all_linked_for_project(&self, project_id: ProjectId) -> Result<Vec<TmProjectLink>>;

	async fn add_entry(&self, tm_id: TmId, source: &str, target: &str, string_id: Option<&str>, created_by: Option<UserId>) -> Result<TmEntry>;
	async fn add_entries_bulk(&self, tm_id: TmId, entries: Vec<NewTmEntry>) -> Result<i64>;
	async fn get_entries(&self, tm_id: TmId, offset: i64, limit: i64) -> Result<Vec<TmEntry>>;
	async fn get_all_entries(&self, tm_id: TmId) -> Result<Vec<TmEntry>>;
	async fn search_entries(&self, tm_id: TmId, query: &str, limit: i64) -> Result<Vec<TmSearchHit>>;
	async fn delete_entry(&self, id: TmEntryId) -> Result<bool>;
	async fn update_entry(&self, id: TmEntryId, target_text: Option<&str>, string_id: Option<&str>) -> Result<TmEntry>;
	async fn confirm_entry(&self, id: TmEntryId, confirmed_by: UserId) -> Result<TmEntry>;
	async fn bulk_confirm_entries(&self, ids: Vec<TmEntryId>, confirmed_by: UserId) -> Result<i64>;
	async fn get_glossary_terms(&self, tm_ids: Vec<TmId>, max_source_length: i64, limit: i64) -> Result<Vec<TmEntry>>;

	async fn get_indexes(&self, tm_id: TmId) -> Result<Vec<TmIndexInfo>>;
	async fn count_entries(&self, tm_id: TmId) -> Result<i64>;

	async fn search_exact(&self, tm_id: TmId, source: &str) -> Result<Option<TmEntry>>;
	async fn search_similar(&self, tm_id: TmId, source: &str, threshold: f32, max_results: i64) -> Result<Vec<TmSearchHit>>;

	async fn get_tree(&self) -> Result<TmTree>;
}

use ldm_types::TmEntryId;

fn row_to_tm(mode: String, status: String, r: &sqlx::sqlite::SqliteRow) -> Tm {
	Tm {
		id: TmId::new(r.get("id")),
		name: r.get("name"),
		description: r.get("description"),
		owner_id: r.get::<Option<i64>, _>("owner_id").map(UserId::new),
		source_lang: r.get("source_lang"),
		target_lang: r.get("target_lang"),
		entry_count: r.get("entry_count"),
		mode: mode.parse().unwrap_or(TmMode::Standard),
		status: status.parse().unwrap_or(TmStatus::Pending),
		indexed_at: r
			.get::<Option<String>, _>("indexed_at")
			.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
			.map(|dt| dt.with_timezone(&Utc)),
	}
}

fn sqlite_row_to_entry(r: &sqlx::sqlite::SqliteRow) -> TmEntry {
	TmEntry {
		id: TmEntryId::new(r.get("id")),
		tm_id: TmId::new(r.get("tm_id")),
		source_text: r.get("source_text"),
		target_text: r.get("target_text"),
		source_hash: r.get("source_hash"),
		string_id: r.get("string_id"),
		is_confirmed: r.get::<i64, _>("is_confirmed") != 0,
		created_by: r.get::<Option<i64>, _>("created_by").map(UserId::new),
		updated_at: DateTime::parse_from_rfc3339(&r.get::<String, _>("updated_at")).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
		updated_by: r.get::<Option<i64>, _>("updated_by").map(UserId::new),
		confirmed_by: r.get::<Option<i64>, _>("confirmed_by").map(UserId::new),
		confirmed_at: r
			.get::<Option<String>, _>("confirmed_at")
			.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
			.map(|dt| dt.with_timezone(&Utc)),
	}
}

fn pg_row_to_entry(r: &sqlx::postgres::PgRow) -> TmEntry {
	TmEntry {
		id: TmEntryId::new(r.get("id")),
		tm_id: TmId::new(r.get("tm_id")),
		source_text: r.get("source_text"),
		target_text: r.get("target_text"),
		source_hash: r.get("source_hash"),
		string_id: r.get("string_id"),
		is_confirmed: r.get("is_confirmed"),
		created_by: r.get::<Option<i64>, _>("created_by").map(UserId::new),
		updated_at: r.get("updated_at"),
		updated_by: r.get::<Option<i64>, _>("updated_by").map(UserId::new),
		confirmed_by: r.get::<Option<i64>, _>("confirmed_by").map(UserId::new),
		confirmed_at: r.get("confirmed_at"),
	}
}

fn pg_row_to_tm(r: &sqlx::postgres::PgRow) -> Tm {
	Tm {
		id: TmId::new(r.get("id")),
		name: r.get("name"),
		description: r.get("description"),
		owner_id: r.get::<Option<i64>, _>("owner_id").map(UserId::new),
		source_lang: r.get("source_lang"),
		target_lang: r.get("target_lang"),
		entry_count: r.get("entry_count"),
		mode: r.get::<String, _>("mode").parse().unwrap_or(TmMode::Standard),
		status: r.get::<String, _>("status").parse().unwrap_or(TmStatus::Pending),
		indexed_at: r.get("indexed_at"),
	}
}

/// `search_entries` scoring used by both backends when the caller wants a
/// discrete match-quality signal without a real similarity engine: 100 for
/// a case-insensitive exact match, 80 otherwise (SPEC_FULL §2.3, original
/// `server/tools/ldm/tm.py`). Spec §9 open question 2: only the "exact
/// sorts first" ordering within the 80-bucket is guaranteed.
fn like_score(entry_source: &str, query: &str) -> f32 {
	if entry_source.eq_ignore_ascii_case(query) {
		100.0
	} else {
		80.0
	}
}

// ---------------------------------------------------------------------------
// Online (Postgres)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OnlineTmRepository {
	pool: PgPool,
}

impl OnlineTmRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	const TM_COLUMNS: &'static str = "id, name, description, owner_id, source_lang, target_lang, entry_count, mode, status, indexed_at";
	const ENTRY_COLUMNS: &'static str = "id, tm_id, source_text, target_text, source_hash, string_id, is_confirmed, created_by, updated_at, updated_by, confirmed_by, confirmed_at";

	#[tracing::instrument(skip(self), fields(tm_id = %id))]
	pub async fn get(&self, id: TmId) -> Result<Option<Tm>> {
		let row = sqlx::query(&format!("SELECT {} FROM ldm_tms WHERE id = $1", Self::TM_COLUMNS)).bind(id.get()).fetch_optional(&self.pool).await?;
		Ok(row.as_ref().map(pg_row_to_tm))
	}

	pub async fn get_all(&self) -> Result<Vec<Tm>> {
		let rows = sqlx::query(&format!("SELECT {} FROM ldm_tms ORDER BY name", Self::TM_COLUMNS)).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(pg_row_to_tm).collect())
	}

	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn create(&self, name: &str, source_lang: &str, target_lang: &str, owner_id: Option<UserId>) -> Result<Tm> {
		let exists: bool = sqlx::query("SELECT EXISTS(SELECT 1 FROM ldm_tms WHERE lower(name) = lower($1)) AS e").bind(name).fetch_one(&self.pool).await?.get("e");
		if exists {
			return Err(LdmError::NameCollision(format!("tm '{name}' already exists")));
		}
		let row = sqlx::query(&format!(
			"INSERT INTO ldm_tms (name, source_lang, target_lang, owner_id, entry_count, mode, status) VALUES ($1, $2, $3, $4, 0, 'standard', 'pending') RETURNING {}",
			Self::TM_COLUMNS
		))
		.bind(name)
		.bind(source_lang)
		.bind(target_lang)
		.bind(owner_id.map(UserId::get))
		.fetch_one(&self.pool)
		.await?;
		Ok(pg_row_to_tm(&row))
	}

	#[tracing::instrument(skip(self), fields(tm_id = %id))]
	pub async fn delete(&self, id: TmId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		sqlx::query("DELETE FROM ldm_tm_entries WHERE tm_id = $1").bind(id.get()).execute(&mut *tx).await?;
		sqlx::query("DELETE FROM ldm_tm_assignments WHERE tm_id = $1").bind(id.get()).execute(&mut *tx).await?;
		sqlx::query("DELETE FROM ldm_tm_project_links WHERE tm_id = $1").bind(id.get()).execute(&mut *tx).await?;
		let result = sqlx::query("DELETE FROM ldm_tms WHERE id = $1").bind(id.get()).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(tm_id = %tm_id))]
	pub async fn assign(&self, tm_id: TmId, target: ScopeTarget) -> Result<()> {
		sqlx::query("DELETE FROM ldm_tm_assignments WHERE tm_id = $1").bind(tm_id.get()).execute(&self.pool).await?;
		match target {
			ScopeTarget::Unassigned => Ok(()),
			ScopeTarget::Platform(id) => {
				sqlx::query("INSERT INTO ldm_tm_assignments (tm_id, platform_id, is_active) VALUES ($1, $2, false)").bind(tm_id.get()).bind(id.get()).execute(&self.pool).await?;
				Ok(())
			}
			ScopeTarget::Project(id) => {
				sqlx::query("INSERT INTO ldm_tm_assignments (tm_id, project_id, is_active) VALUES ($1, $2, false)").bind(tm_id.get()).bind(id.get()).execute(&self.pool).await?;
				Ok(())
			}
			ScopeTarget::Folder(id) => {
				sqlx::query("INSERT INTO ldm_tm_assignments (tm_id, folder_id, is_active) VALUES ($1, $2, false)").bind(tm_id.get()).bind(id.get()).execute(&self.pool).await?;
				Ok(())
			}
		}
	}

	pub async fn unassign(&self, tm_id: TmId) -> Result<()> {
		sqlx::query("DELETE FROM ldm_tm_assignments WHERE tm_id = $1").bind(tm_id.get()).execute(&self.pool).await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(tm_id = %tm_id))]
	pub async fn activate(&self, tm_id: TmId) -> Result<()> {
		let assignment = self.get_assignment(tm_id).await?;
		let has_scope = assignment.as_ref().map(|a| a.scope().kind().is_some()).unwrap_or(false);
		if !has_scope {
			return Err(LdmError::InvalidScope(format!("tm {tm_id} has no scope assigned, cannot activate")));
		}
		sqlx::query("UPDATE ldm_tm_assignments SET is_active = true, activated_at = now() WHERE tm_id = $1").bind(tm_id.get()).execute(&self.pool).await?;
		Ok(())
	}

	pub async fn deactivate(&self, tm_id: TmId) -> Result<()> {
		sqlx::query("UPDATE ldm_tm_assignments SET is_active = false WHERE tm_id = $1").bind(tm_id.get()).execute(&self.pool).await?;
		Ok(())
	}

	pub async fn get_assignment(&self, tm_id: TmId) -> Result<Option<TmAssignment>> {
		let row = sqlx::query("SELECT tm_id, platform_id, project_id, folder_id, is_active, activated_at FROM ldm_tm_assignments WHERE tm_id = $1")
			.bind(tm_id.get())
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| TmAssignment {
			tm_id,
			platform_id: r.get::<Option<i64>, _>("platform_id").map(PlatformId::new),
			project_id: r.get::<Option<i64>, _>("project_id").map(ProjectId::new),
			folder_id: r.get::<Option<i64>, _>("folder_id").map(FolderId::new),
			is_active: r.get("is_active"),
			activated_at: r.get("activated_at"),
		}))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_for_scope(&self, platform_id: Option<PlatformId>, project_id: Option<ProjectId>, folder_id: Option<FolderId>, include_inactive: bool) -> Result<Vec<Tm>> {
		let rows = sqlx::query(&format!(
			"SELECT t.{} FROM ldm_tms t JOIN ldm_tm_assignments a ON a.tm_id = t.id \
			 WHERE a.platform_id IS NOT DISTINCT FROM $1 AND a.project_id IS NOT DISTINCT FROM $2 AND a.folder_id IS NOT DISTINCT FROM $3 \
			 AND ($4 OR a.is_active) ORDER BY t.name",
			Self::TM_COLUMNS.replace("id,", "id, ").replacen("id", "id", 1)
		))
		.bind(platform_id.map(PlatformId::get))
		.bind(project_id.map(ProjectId::get))
		.bind(folder_id.map(FolderId::get))
		.bind(include_inactive)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(pg_row_to_tm).collect())
	}

	#[tracing::instrument(skip(self), fields(file_id = %file_id))]
	pub async fn get_active_for_file(&self, file_id: FileId) -> Result<Vec<ActiveTm>> {
		let file = sqlx::query("SELECT project_id, folder_id FROM ldm_files WHERE id = $1").bind(file_id.get()).fetch_optional(&self.pool).await?;
		let Some(file) = file else {
			return Err(LdmError::NotFound(format!("file {file_id}")));
		};
		let project_id: i64 = file.get("project_id");
		let folder_id: Option<i64> = file.get("folder_id");
		let platform_id: Option<i64> = sqlx::query("SELECT platform_id FROM ldm_projects WHERE id = $1").bind(project_id).fetch_optional(&self.pool).await?.and_then(|r| r.get("platform_id"));

		let mut out = Vec::new();
		if let Some(folder_id) = folder_id {
			for tm in self.active_tms_for("folder_id", folder_id).await? {
				out.push(ActiveTm { tm, scope: ScopeKind::Folder });
			}
		}
		for tm in self.active_tms_for("project_id", project_id).await? {
			out.push(ActiveTm { tm, scope: ScopeKind::Project });
		}
		if let Some(platform_id) = platform_id {
			for tm in self.active_tms_for("platform_id", platform_id).await? {
				out.push(ActiveTm { tm, scope: ScopeKind::Platform });
			}
		}
		Ok(out)
	}

	async fn active_tms_for(&self, column: &str, id: i64) -> Result<Vec<Tm>> {
		let rows = sqlx::query(&format!(
			"SELECT t.{} FROM ldm_tms t JOIN ldm_tm_assignments a ON a.tm_id = t.id WHERE a.{column} = $1 AND a.is_active ORDER BY t.name",
			Self::TM_COLUMNS
		))
		.bind(id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(pg_row_to_tm).collect())
	}

	#[tracing::instrument(skip(self), fields(tm_id = %tm_id, project_id = %project_id))]
	pub async fn link_to_project(&self, tm_id: TmId, project_id: ProjectId, priority: i32) -> Result<()> {
		sqlx::query(
			"INSERT INTO ldm_tm_project_links (tm_id, project_id, priority) VALUES ($1, $2, $3) \
			 ON CONFLICT (tm_id, project_id) DO UPDATE SET priority = excluded.priority",
		)
		.bind(tm_id.get())
		.bind(project_id.get())
		.bind(priority)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn unlink_from_project(&self, tm_id: TmId, project_id: ProjectId) -> Result<()> {
		sqlx::query("DELETE FROM ldm_tm_project_links WHERE tm_id = $1 AND project_id = $2").bind(tm_id.get()).bind(project_id.get()).execute(&self.pool).await?;
		Ok(())
	}

	pub async fn get_linked_for_project(&self, project_id: ProjectId) -> Result<Option<Tm>> {
		let row = sqlx::query(&format!(
			"SELECT t.{} FROM ldm_tms t JOIN ldm_tm_project_links l ON l.tm_id = t.id WHERE l.project_id = $1 ORDER BY l.priority ASC LIMIT 1",
			Self::TM_COLUMNS
		))
		.bind(project_id.get())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.as_ref().map(pg_row_to_tm))
	}

	pub async fn get_all_linked_for_project(&self, project_id: ProjectId) -> Result<Vec<TmProjectLink>> {
		let rows = sqlx::query("SELECT tm_id, project_id, priority FROM ldm_tm_project_links WHERE project_id = $1 ORDER BY priority ASC")
			.bind(project_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(|r| TmProjectLink { tm_id: TmId::new(r.get("tm_id")), project_id: ProjectId::new(r.get("project_id")), priority: r.get("priority") }).collect())
	}

	/// Ingest-mode duplicate handling (spec §3 `Tm.mode`): `standard` keeps
	/// one target per normalized source (most-frequent wins); `stringid`
	/// keeps every `(source, string_id)` pair.
	#[tracing::instrument(skip(self, source, target), fields(tm_id = %tm_id))]
	pub async fn add_entry(&self, tm_id: TmId, source: &str, target: &str, string_id: Option<&str>, created_by: Option<UserId>) -> Result<TmEntry> {
		let hash = source_hash(source);
		let tm = self.get(tm_id).await?.ok_or_else(|| LdmError::NotFound(format!("tm {tm_id}")))?;
		if tm.mode == TmMode::Standard {
			if let Some(existing) = sqlx::query(&format!("SELECT {} FROM ldm_tm_entries WHERE tm_id = $1 AND source_hash = $2", Self::ENTRY_COLUMNS))
				.bind(tm_id.get())
				.bind(&hash)
				.fetch_optional(&self.pool)
				.await?
			{
				sqlx::query("UPDATE ldm_tm_entries SET target_text = $1, updated_at = now(), updated_by = $2 WHERE id = $3")
					.bind(target)
					.bind(created_by.map(UserId::get))
					.bind(existing.get::<i64, _>("id"))
					.execute(&self.pool)
					.await?;
				return self.get_entries(tm_id, 0, 1).await.map(|mut v| v.remove(0));
			}
		}
		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&format!(
			"INSERT INTO ldm_tm_entries (tm_id, source_text, target_text, source_hash, string_id, created_by, updated_at) \
			 VALUES ($1, $2, $3, $4, $5, $6, now()) RETURNING {}",
			Self::ENTRY_COLUMNS
		))
		.bind(tm_id.get())
		.bind(source)
		.bind(target)
		.bind(&hash)
		.bind(string_id)
		.bind(created_by.map(UserId::get))
		.fetch_one(&mut *tx)
		.await?;
		sqlx::query("UPDATE ldm_tms SET entry_count = entry_count + 1 WHERE id = $1").bind(tm_id.get()).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(pg_row_to_entry(&row))
	}

	/// Bulk-load path: a single multi-row `INSERT` stands in for the
	/// backend's native copy-in protocol (spec §4.4.6, §5 "fastest bulk
	/// load path").
	#[tracing::instrument(skip(self, entries), fields(tm_id = %tm_id, n = entries.len()))]
	pub async fn add_entries_bulk(&self, tm_id: TmId, entries: Vec<NewTmEntry>) -> Result<i64> {
		if entries.is_empty() {
			return Ok(0);
		}
		let mut tx = self.pool.begin().await?;
		let mut inserted = 0i64;
		for entry in &entries {
			let hash = source_hash(&entry.source_text);
			sqlx::query("INSERT INTO ldm_tm_entries (tm_id, source_text, target_text, source_hash, string_id, updated_at) VALUES ($1, $2, $3, $4, $5, now())")
				.bind(tm_id.get())
				.bind(&entry.source_text)
				.bind(&entry.target_text)
				.bind(&hash)
				.bind(&entry.string_id)
				.execute(&mut *tx)
				.await?;
			inserted += 1;
		}
		sqlx::query("UPDATE ldm_tms SET entry_count = entry_count + $1 WHERE id = $2").bind(inserted).bind(tm_id.get()).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(inserted)
	}

	pub async fn get_entries(&self, tm_id: TmId, offset: i64, limit: i64) -> Result<Vec<TmEntry>> {
		let rows = sqlx::query(&format!("SELECT {} FROM ldm_tm_entries WHERE tm_id = $1 ORDER BY id LIMIT $2 OFFSET $3", Self::ENTRY_COLUMNS))
			.bind(tm_id.get())
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.iter().map(pg_row_to_entry).collect())
	}

	/// Unbounded fetch used to rebuild the external embedding index (spec
	/// §4.4.6); callers own the memory cost of a full TM.
	pub async fn get_all_entries(&self, tm_id: TmId) -> Result<Vec<TmEntry>> {
		let rows = sqlx::query(&format!("SELECT {} FROM ldm_tm_entries WHERE tm_id = $1 ORDER BY id", Self::ENTRY_COLUMNS)).bind(tm_id.get()).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(pg_row_to_entry).collect())
	}

	pub async fn search_entries(&self, tm_id: TmId, query: &str, limit: i64) -> Result<Vec<TmSearchHit>> {
		let pattern = format!("%{query}%");
		let rows = sqlx::query(&format!("SELECT {} FROM ldm_tm_entries WHERE tm_id = $1 AND source_text ILIKE $2 LIMIT $3", Self::ENTRY_COLUMNS))
			.bind(tm_id.get())
			.bind(pattern)
			.bind(limit)
			.fetch_all(&self.pool)
			.await?;
		let mut hits: Vec<TmSearchHit> = rows.iter().map(|r| TmSearchHit { score: like_score(&r.get::<String, _>("source_text"), query), entry: pg_row_to_entry(r) }).collect();
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		Ok(hits)
	}

	#[tracing::instrument(skip(self), fields(entry_id = %id))]
	pub async fn delete_entry(&self, id: TmEntryId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		let current = sqlx::query("SELECT tm_id FROM ldm_tm_entries WHERE id = $1").bind(id.get()).fetch_optional(&mut *tx).await?;
		let Some(current) = current else {
			return Ok(false);
		};
		let tm_id: i64 = current.get("tm_id");
		sqlx::query("DELETE FROM ldm_tm_entries WHERE id = $1").bind(id.get()).execute(&mut *tx).await?;
		sqlx::query("UPDATE ldm_tms SET entry_count = entry_count - 1 WHERE id = $1").bind(tm_id).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(true)
	}

	pub async fn update_entry(&self, id: TmEntryId, target_text: Option<&str>, string_id: Option<&str>) -> Result<TmEntry> {
		sqlx::query("UPDATE ldm_tm_entries SET target_text = COALESCE($1, target_text), string_id = COALESCE($2, string_id), updated_at = now() WHERE id = $3")
			.bind(target_text)
			.bind(string_id)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		let row = sqlx::query(&format!("SELECT {} FROM ldm_tm_entries WHERE id = $1", Self::ENTRY_COLUMNS)).bind(id.get()).fetch_one(&self.pool).await?;
		Ok(pg_row_to_entry(&row))
	}

	pub async fn confirm_entry(&self, id: TmEntryId, confirmed_by: UserId) -> Result<TmEntry> {
		sqlx::query("UPDATE ldm_tm_entries SET is_confirmed = true, confirmed_by = $1, confirmed_at = now() WHERE id = $2").bind(confirmed_by.get()).bind(id.get()).execute(&self.pool).await?;
		let row = sqlx::query(&format!("SELECT {} FROM ldm_tm_entries WHERE id = $1", Self::ENTRY_COLUMNS)).bind(id.get()).fetch_one(&self.pool).await?;
		Ok(pg_row_to_entry(&row))
	}

	pub async fn bulk_confirm_entries(&self, ids: Vec<TmEntryId>, confirmed_by: UserId) -> Result<i64> {
		let mut n = 0;
		for id in ids {
			self.confirm_entry(id, confirmed_by).await?;
			n += 1;
		}
		Ok(n)
	}

	pub async fn get_glossary_terms(&self, tm_ids: Vec<TmId>, max_source_length: i64, limit: i64) -> Result<Vec<TmEntry>> {
		if tm_ids.is_empty() {
			return Ok(Vec::new());
		}
		let ids: Vec<i64> = tm_ids.iter().map(|t| t.get()).collect();
		let rows = sqlx::query(&format!("SELECT {} FROM ldm_tm_entries WHERE tm_id = ANY($1) AND length(source_text) <= $2 ORDER BY length(source_text) ASC LIMIT $3", Self::ENTRY_COLUMNS))
			.bind(&ids)
			.bind(max_source_length)
			.bind(limit)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.iter().map(pg_row_to_entry).collect())
	}

	pub async fn get_indexes(&self, tm_id: TmId) -> Result<Vec<TmIndexInfo>> {
		let tm = self.get(tm_id).await?.ok_or_else(|| LdmError::NotFound(format!("tm {tm_id}")))?;
		Ok(vec![TmIndexInfo { index_type: "ann".to_string(), status: tm.status, file_size_bytes: None, built_at: tm.indexed_at }])
	}

	pub async fn count_entries(&self, tm_id: TmId) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM ldm_tm_entries WHERE tm_id = $1").bind(tm_id.get()).fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}

	pub async fn search_exact(&self, tm_id: TmId, source: &str) -> Result<Option<TmEntry>> {
		let hash = source_hash(source);
		let row = sqlx::query(&format!("SELECT {} FROM ldm_tm_entries WHERE tm_id = $1 AND source_hash = $2 LIMIT 1", Self::ENTRY_COLUMNS))
			.bind(tm_id.get())
			.bind(hash)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.as_ref().map(pg_row_to_entry))
	}

	/// Trigram similarity via `pg_trgm`; online-only (spec §4.4.6).
	pub async fn search_similar(&self, tm_id: TmId, source: &str, threshold: f32, max_results: i64) -> Result<Vec<TmSearchHit>> {
		let rows = sqlx::query(&format!(
			"SELECT {}, similarity(source_text, $1) AS score FROM ldm_tm_entries WHERE tm_id = $2 AND similarity(source_text, $1) >= $3 ORDER BY score DESC LIMIT $4",
			Self::ENTRY_COLUMNS
		))
		.bind(source)
		.bind(tm_id.get())
		.bind(threshold)
		.bind(max_results)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(|r| TmSearchHit { entry: pg_row_to_entry(r), score: r.get("score") }).collect())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_tree(&self) -> Result<TmTree> {
		let mut tree = TmTree::default();
		tree.unassigned = sqlx::query(&format!(
			"SELECT t.{} FROM ldm_tms t LEFT JOIN ldm_tm_assignments a ON a.tm_id = t.id WHERE a.tm_id IS NULL ORDER BY t.name",
			Self::TM_COLUMNS
		))
		.fetch_all(&self.pool)
		.await?
		.iter()
		.map(pg_row_to_tm)
		.collect();

		let platforms = sqlx::query("SELECT id, name FROM ldm_platforms ORDER BY name").fetch_all(&self.pool).await?;
		for p in platforms {
			let platform_id = PlatformId::new(p.get("id"));
			let platform_tms = self.tms_for_scope_column("platform_id", platform_id.get()).await?;
			let projects_rows = sqlx::query("SELECT id, name FROM ldm_projects WHERE platform_id = $1 ORDER BY name").bind(platform_id.get()).fetch_all(&self.pool).await?;
			let mut projects = Vec::new();
			for proj in projects_rows {
				let project_id = ProjectId::new(proj.get("id"));
				let project_tms = self.tms_for_scope_column("project_id", project_id.get()).await?;
				let folders = self.folder_tree_for_project(project_id, None, 0).await?;
				projects.push(ProjectTmNode { project_id, project_name: proj.get("name"), tms: project_tms, folders });
			}
			tree.platforms.push(PlatformTmNode { platform_id, platform_name: p.get("name"), tms: platform_tms, projects });
		}
		Ok(tree)
	}

	async fn tms_for_scope_column(&self, column: &str, id: i64) -> Result<Vec<Tm>> {
		let rows = sqlx::query(&format!("SELECT t.{} FROM ldm_tms t JOIN ldm_tm_assignments a ON a.tm_id = t.id WHERE a.{column} = $1 ORDER BY t.name", Self::TM_COLUMNS))
			.bind(id)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.iter().map(pg_row_to_tm).collect())
	}

	fn folder_tree_for_project<'a>(&'a self, project_id: ProjectId, parent_id: Option<FolderId>, depth: usize) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<FolderTmNode>>> + Send + 'a>> {
		Box::pin(async move {
			if depth > MAX_TREE_DEPTH {
				return Err(LdmError::IntegrityViolation("tm tree folder depth exceeded".into()));
			}
			let rows = sqlx::query("SELECT id, name FROM ldm_folders WHERE project_id = $1 AND parent_id IS NOT DISTINCT FROM $2 ORDER BY name")
				.bind(project_id.get())
				.bind(parent_id.map(FolderId::get))
				.fetch_all(&self.pool)
				.await?;
			let mut out = Vec::new();
			for r in rows {
				let folder_id = FolderId::new(r.get("id"));
				let tms = self.tms_for_scope_column("folder_id", folder_id.get()).await?;
				let children = self.folder_tree_for_project(project_id, Some(folder_id), depth + 1).await?;
				out.push(FolderTmNode { folder_id, folder_name: r.get("name"), tms, folders: children });
			}
			Ok(out)
		})
	}
}

#[async_trait]
impl TmStore for OnlineTmRepository {
	async fn get(&self, id: TmId) -> Result<Option<Tm>> {
		self.get(id).await
	}
	async fn get_all(&self) -> Result<Vec<Tm>> {
		self.get_all().await
	}
	async fn create(&self, name: &str, source_lang: &str, target_lang: &str, owner_id: Option<UserId>) -> Result<Tm> {
		self.create(name, source_lang, target_lang, owner_id).await
	}
	async fn delete(&self, id: TmId) -> Result<bool> {
		self.delete(id).await
	}
	async fn assign(&self, tm_id: TmId, target: ScopeTarget) -> Result<()> {
		self.assign(tm_id, target).await
	}
	async fn unassign(&self, tm_id: TmId) -> Result<()> {
		self.unassign(tm_id).await
	}
	async fn activate(&self, tm_id: TmId) -> Result<()> {
		self.activate(tm_id).await
	}
	async fn deactivate(&self, tm_id: TmId) -> Result<()> {
		self.deactivate(tm_id).await
	}
	async fn get_assignment(&self, tm_id: TmId) -> Result<Option<TmAssignment>> {
		self.get_assignment(tm_id).await
	}
	async fn get_for_scope(&self, platform_id: Option<PlatformId>, project_id: Option<ProjectId>, folder_id: Option<FolderId>, include_inactive: bool) -> Result<Vec<Tm>> {
		self.get_for_scope(platform_id, project_id, folder_id, include_inactive).await
	}
	async fn get_active_for_file(&self, file_id: FileId) -> Result<Vec<ActiveTm>> {
		self.get_active_for_file(file_id).await
	}
	async fn link_to_project(&self, tm_id: TmId, project_id: ProjectId, priority: i32) -> Result<()> {
		self.link_to_project(tm_id, project_id, priority).await
	}
	async fn unlink_from_project(&self, tm_id: TmId, project_id: ProjectId) -> Result<()> {
		self.unlink_from_project(tm_id, project_id).await
	}
	async fn get_linked_for_project(&self, project_id: ProjectId) -> Result<Option<Tm>> {
		self.get_linked_for_project(project_id).await
	}
	async fn get_all_linked_for_project(&self, project_id: ProjectId) -> Result<Vec<TmProjectLink>> {
		self.get_all_linked_for_project(project_id).await
	}
	async fn add_entry(&self, tm_id: TmId, source: &str, target: &str, string_id: Option<&str>, created_by: Option<UserId>) -> Result<TmEntry> {
		self.add_entry(tm_id, source, target, string_id, created_by).await
	}
	async fn add_entries_bulk(&self, tm_id: TmId, entries: Vec<NewTmEntry>) -> Result<i64> {
		self.add_entries_bulk(tm_id, entries).await
	}
	async fn get_entries(&self, tm_id: TmId, offset: i64, limit: i64) -> Result<Vec<TmEntry>> {
		self.get_entries(tm_id, offset, limit).await
	}
	async fn get_all_entries(&self, tm_id: TmId) -> Result<Vec<TmEntry>> {
		self.get_all_entries(tm_id).await
	}
	async fn search_entries(&self, tm_id: TmId, query: &str, limit: i64) -> Result<Vec<TmSearchHit>> {
		self.search_entries(tm_id, query, limit).await
	}
	async fn delete_entry(&self, id: TmEntryId) -> Result<bool> {
		self.delete_entry(id).await
	}
	async fn update_entry(&self, id: TmEntryId, target_text: Option<&str>, string_id: Option<&str>) -> Result<TmEntry> {
		self.update_entry(id, target_text, string_id).await
	}
	async fn confirm_entry(&self, id: TmEntryId, confirmed_by: UserId) -> Result<TmEntry> {
		self.confirm_entry(id, confirmed_by).await
	}
	async fn bulk_confirm_entries(&self, ids: Vec<TmEntryId>, confirmed_by: UserId) -> Result<i64> {
		self.bulk_confirm_entries(ids, confirmed_by).await
	}
	async fn get_glossary_terms(&self, tm_ids: Vec<TmId>, max_source_length: i64, limit: i64) -> Result<Vec<TmEntry>> {
		self.get_glossary_terms(tm_ids, max_source_length, limit).await
	}
	async fn get_indexes(&self, tm_id: TmId) -> Result<Vec<TmIndexInfo>> {
		self.get_indexes(tm_id).await
	}
	async fn count_entries(&self, tm_id: TmId) -> Result<i64> {
		self.count_entries(tm_id).await
	}
	async fn search_exact(&self, tm_id: TmId, source: &str) -> Result<Option<TmEntry>> {
		self.search_exact(tm_id, source).await
	}
	async fn search_similar(&self, tm_id: TmId, source: &str, threshold: f32, max_results: i64) -> Result<Vec<TmSearchHit>> {
		self.search_similar(tm_id, source, threshold, max_results).await
	}
	async fn get_tree(&self) -> Result<TmTree> {
		self.get_tree().await
	}
}

// ---------------------------------------------------------------------------
// Offline (SQLite)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OfflineTmRepository {
	pool: SqlitePool,
	id_alloc: std::sync::Arc<crate::id_alloc::IdAllocator>,
}

impl OfflineTmRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::default()) }
	}

	/// Same as [`Self::new`] but with the ID modulus driven by
	/// `DatabaseConfig::negative_id_modulus` rather than the built-in default.
	pub fn with_modulus(pool: SqlitePool, modulus: i64) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::new(modulus)) }
	}

	const TM_COLUMNS: &'static str = "id, name, description, owner_id, source_lang, target_lang, entry_count, mode, status, indexed_at";
	const ENTRY_COLUMNS: &'static str = "id, tm_id, source_text, target_text, source_hash, string_id, is_confirmed, created_by, updated_at, updated_by, confirmed_by, confirmed_at";

	#[tracing::instrument(skip(self), fields(tm_id = %id))]
	pub async fn get(&self, id: TmId) -> Result<Option<Tm>> {
		let row = sqlx::query(&format!("SELECT {} FROM offline_tms WHERE id = ?", Self::TM_COLUMNS)).bind(id.get()).fetch_optional(&self.pool).await?;
		Ok(row.as_ref().map(|r| row_to_tm(r.get("mode"), r.get("status"), r)))
	}

	pub async fn get_all(&self) -> Result<Vec<Tm>> {
		let rows = sqlx::query(&format!("SELECT {} FROM offline_tms ORDER BY name", Self::TM_COLUMNS)).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(|r| row_to_tm(r.get("mode"), r.get("status"), r)).collect())
	}

	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn create(&self, name: &str, source_lang: &str, target_lang: &str, owner_id: Option<UserId>) -> Result<Tm> {
		let exists: i64 = sqlx::query("SELECT EXISTS(SELECT 1 FROM offline_tms WHERE lower(name) = lower(?)) AS e").bind(name).fetch_one(&self.pool).await?.get("e");
		if exists != 0 {
			return Err(LdmError::NameCollision(format!("tm '{name}' already exists")));
		}
		let id = crate::id_alloc::insert_with_retry(&self.id_alloc, |candidate| {
			let pool = self.pool.clone();
			async move {
				sqlx::query("INSERT INTO offline_tms (id, name, source_lang, target_lang, owner_id, entry_count, mode, status) VALUES (?, ?, ?, ?, ?, 0, 'standard', 'pending')")
					.bind(candidate)
					.bind(name)
					.bind(source_lang)
					.bind(target_lang)
					.bind(owner_id.map(UserId::get))
					.execute(&pool)
					.await?;
				Ok(candidate)
			}
		})
		.await?;
		self.get(TmId::new(id)).await?.ok_or_else(|| LdmError::NotFound("just-inserted tm".into()))
	}

	#[tracing::instrument(skip(self), fields(tm_id = %id))]
	pub async fn delete(&self, id: TmId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		sqlx::query("DELETE FROM offline_tm_entries WHERE tm_id = ?").bind(id.get()).execute(&mut *tx).await?;
		sqlx::query("DELETE FROM offline_tm_assignments WHERE tm_id = ?").bind(id.get()).execute(&mut *tx).await?;
		sqlx::query("DELETE FROM offline_tm_project_links WHERE tm_id = ?").bind(id.get()).execute(&mut *tx).await?;
		let result = sqlx::query("DELETE FROM offline_tms WHERE id = ?").bind(id.get()).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(tm_id = %tm_id))]
	pub async fn assign(&self, tm_id: TmId, target: ScopeTarget) -> Result<()> {
		sqlx::query("DELETE FROM offline_tm_assignments WHERE tm_id = ?").bind(tm_id.get()).execute(&self.pool).await?;
		match target {
			ScopeTarget::Unassigned => Ok(()),
			ScopeTarget::Platform(id) => {
				sqlx::query("INSERT INTO offline_tm_assignments (tm_id, platform_id, is_active) VALUES (?, ?, 0)").bind(tm_id.get()).bind(id.get()).execute(&self.pool).await?;
				Ok(())
			}
			ScopeTarget::Project(id) => {
				sqlx::query("INSERT INTO offline_tm_assignments (tm_id, project_id, is_active) VALUES (?, ?, 0)").bind(tm_id.get()).bind(id.get()).execute(&self.pool).await?;
				Ok(())
			}
			ScopeTarget::Folder(id) => {
				sqlx::query("INSERT INTO offline_tm_assignments (tm_id, folder_id, is_active) VALUES (?, ?, 0)").bind(tm_id.get()).bind(id.get()).execute(&self.pool).await?;
				Ok(())
			}
		}
	}

	pub async fn unassign(&self, tm_id: TmId) -> Result<()> {
		sqlx::query("DELETE FROM offline_tm_assignments WHERE tm_id = ?").bind(tm_id.get()).execute(&self.pool).await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(tm_id = %tm_id))]
	pub async fn activate(&self, tm_id: TmId) -> Result<()> {
		let assignment = self.get_assignment(tm_id).await?;
		let has_scope = assignment.as_ref().map(|a| a.scope().kind().is_some()).unwrap_or(false);
		if !has_scope {
			return Err(LdmError::InvalidScope(format!("tm {tm_id} has no scope assigned, cannot activate")));
		}
		sqlx::query("UPDATE offline_tm_assignments SET is_active = 1, activated_at = ? WHERE tm_id = ?").bind(Utc::now().to_rfc3339()).bind(tm_id.get()).execute(&self.pool).await?;
		Ok(())
	}

	pub async fn deactivate(&self, tm_id: TmId) -> Result<()> {
		sqlx::query("UPDATE offline_tm_assignments SET is_active = 0 WHERE tm_id = ?").bind(tm_id.get()).execute(&self.pool).await?;
		Ok(())
	}

	pub async fn get_assignment(&self, tm_id: TmId) -> Result<Option<TmAssignment>> {
		let row = sqlx::query("SELECT tm_id, platform_id, project_id, folder_id, is_active, activated_at FROM offline_tm_assignments WHERE tm_id = ?")
			.bind(tm_id.get())
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| TmAssignment {
			tm_id,
			platform_id: r.get::<Option<i64>, _>("platform_id").map(PlatformId::new),
			project_id: r.get::<Option<i64>, _>("project_id").map(ProjectId::new),
			folder_id: r.get::<Option<i64>, _>("folder_id").map(FolderId::new),
			is_active: r.get::<i64, _>("is_active") != 0,
			activated_at: r.get::<Option<String>, _>("activated_at").and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc)),
		}))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_for_scope(&self, platform_id: Option<PlatformId>, project_id: Option<ProjectId>, folder_id: Option<FolderId>, include_inactive: bool) -> Result<Vec<Tm>> {
		let rows = sqlx::query(&format!(
			"SELECT t.{} FROM offline_tms t JOIN offline_tm_assignments a ON a.tm_id = t.id \
			 WHERE a.platform_id IS ? AND a.project_id IS ? AND a.folder_id IS ? AND (? OR a.is_active) ORDER BY t.name",
			Self::TM_COLUMNS
		))
		.bind(platform_id.map(PlatformId::get))
		.bind(project_id.map(ProjectId::get))
		.bind(folder_id.map(FolderId::get))
		.bind(include_inactive)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(|r| row_to_tm(r.get("mode"), r.get("status"), r)).collect())
	}

	#[tracing::instrument(skip(self), fields(file_id = %file_id))]
	pub async fn get_active_for_file(&self, file_id: FileId) -> Result<Vec<ActiveTm>> {
		let file = sqlx::query("SELECT project_id, folder_id FROM offline_files WHERE id = ?").bind(file_id.get()).fetch_optional(&self.pool).await?;
		let Some(file) = file else {
			return Err(LdmError::NotFound(format!("file {file_id}")));
		};
		let project_id: i64 = file.get("project_id");
		let folder_id: Option<i64> = file.get("folder_id");
		let platform_id: Option<i64> = sqlx::query("SELECT platform_id FROM offline_projects WHERE id = ?").bind(project_id).fetch_optional(&self.pool).await?.and_then(|r| r.get("platform_id"));

		let mut out = Vec::new();
		if let Some(folder_id) = folder_id {
			for tm in self.active_tms_for("folder_id", folder_id).await? {
				out.push(ActiveTm { tm, scope: ScopeKind::Folder });
			}
		}
		for tm in self.active_tms_for("project_id", project_id).await? {
			out.push(ActiveTm { tm, scope: ScopeKind::Project });
		}
		if let Some(platform_id) = platform_id {
			for tm in self.active_tms_for("platform_id", platform_id).await? {
				out.push(ActiveTm { tm, scope: ScopeKind::Platform });
			}
		}
		Ok(out)
	}

	async fn active_tms_for(&self, column: &str, id: i64) -> Result<Vec<Tm>> {
		let rows = sqlx::query(&format!(
			"SELECT t.{} FROM offline_tms t JOIN offline_tm_assignments a ON a.tm_id = t.id WHERE a.{column} = ? AND a.is_active ORDER BY t.name",
			Self::TM_COLUMNS
		))
		.bind(id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(|r| row_to_tm(r.get("mode"), r.get("status"), r)).collect())
	}

	#[tracing::instrument(skip(self), fields(tm_id = %tm_id, project_id = %project_id))]
	pub async fn link_to_project(&self, tm_id: TmId, project_id: ProjectId, priority: i32) -> Result<()> {
		sqlx::query("INSERT INTO offline_tm_project_links (tm_id, project_id, priority) VALUES (?, ?, ?) ON CONFLICT (tm_id, project_id) DO UPDATE SET priority = excluded.priority")
			.bind(tm_id.get())
			.bind(project_id.get())
			.bind(priority)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn unlink_from_project(&self, tm_id: TmId, project_id: ProjectId) -> Result<()> {
		sqlx::query("DELETE FROM offline_tm_project_links WHERE tm_id = ? AND project_id = ?").bind(tm_id.get()).bind(project_id.get()).execute(&self.pool).await?;
		Ok(())
	}

	pub async fn get_linked_for_project(&self, project_id: ProjectId) -> Result<Option<Tm>> {
		let row = sqlx::query(&format!(
			"SELECT t.{} FROM offline_tms t JOIN offline_tm_project_links l ON l.tm_id = t.id WHERE l.project_id = ? ORDER BY l.priority ASC LIMIT 1",
			Self::TM_COLUMNS
		))
		.bind(project_id.get())
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.as_ref().map(|r| row_to_tm(r.get("mode"), r.get("status"), r)))
	}

	pub async fn get_all_linked_for_project(&self, project_id: ProjectId) -> Result<Vec<TmProjectLink>> {
		let rows = sqlx::query("SELECT tm_id, project_id, priority FROM offline_tm_project_links WHERE project_id = ? ORDER BY priority ASC")
			.bind(project_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.into_iter().map(|r| TmProjectLink { tm_id: TmId::new(r.get("tm_id")), project_id: ProjectId::new(r.get("project_id")), priority: r.get("priority") }).collect())
	}

	#[tracing::instrument(skip(self, source, target), fields(tm_id = %tm_id))]
	pub async fn add_entry(&self, tm_id: TmId, source: &str, target: &str, string_id: Option<&str>, created_by: Option<UserId>) -> Result<TmEntry> {
		let hash = source_hash(source);
		let tm = self.get(tm_id).await?.ok_or_else(|| LdmError::NotFound(format!("tm {tm_id}")))?;
		if tm.mode == TmMode::Standard {
			let existing = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE tm_id = ? AND source_hash = ?", Self::ENTRY_COLUMNS))
				.bind(tm_id.get())
				.bind(&hash)
				.fetch_optional(&self.pool)
				.await?;
			if let Some(existing) = existing {
				let id: i64 = existing.get("id");
				sqlx::query("UPDATE offline_tm_entries SET target_text = ?, updated_at = ?, updated_by = ? WHERE id = ?")
					.bind(target)
					.bind(Utc::now().to_rfc3339())
					.bind(created_by.map(UserId::get))
					.bind(id)
					.execute(&self.pool)
					.await?;
				let row = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE id = ?", Self::ENTRY_COLUMNS)).bind(id).fetch_one(&self.pool).await?;
				return Ok(sqlite_row_to_entry(&row));
			}
		}
		let mut tx = self.pool.begin().await?;
		let new_id = self.id_alloc.next_negative_id();
		sqlx::query("INSERT INTO offline_tm_entries (id, tm_id, source_text, target_text, source_hash, string_id, created_by, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)")
			.bind(new_id)
			.bind(tm_id.get())
			.bind(source)
			.bind(target)
			.bind(&hash)
			.bind(string_id)
			.bind(created_by.map(UserId::get))
			.bind(Utc::now().to_rfc3339())
			.execute(&mut *tx)
			.await?;
		sqlx::query("UPDATE offline_tms SET entry_count = entry_count + 1 WHERE id = ?").bind(tm_id.get()).execute(&mut *tx).await?;
		tx.commit().await?;
		let row = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE id = ?", Self::ENTRY_COLUMNS)).bind(new_id).fetch_one(&self.pool).await?;
		Ok(sqlite_row_to_entry(&row))
	}

	#[tracing::instrument(skip(self, entries), fields(tm_id = %tm_id, n = entries.len()))]
	pub async fn add_entries_bulk(&self, tm_id: TmId, entries: Vec<NewTmEntry>) -> Result<i64> {
		if entries.is_empty() {
			return Ok(0);
		}
		let mut tx = self.pool.begin().await?;
		let mut inserted = 0i64;
		let now = Utc::now().to_rfc3339();
		let ids = self.id_alloc.reserve_block(entries.len());
		for (entry, new_id) in entries.iter().zip(ids.iter().copied()) {
			let hash = source_hash(&entry.source_text);
			sqlx::query("INSERT INTO offline_tm_entries (id, tm_id, source_text, target_text, source_hash, string_id, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
				.bind(new_id)
				.bind(tm_id.get())
				.bind(&entry.source_text)
				.bind(&entry.target_text)
				.bind(&hash)
				.bind(&entry.string_id)
				.bind(&now)
				.execute(&mut *tx)
				.await?;
			inserted += 1;
		}
		sqlx::query("UPDATE offline_tms SET entry_count = entry_count + ? WHERE id = ?").bind(inserted).bind(tm_id.get()).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(inserted)
	}

	pub async fn get_entries(&self, tm_id: TmId, offset: i64, limit: i64) -> Result<Vec<TmEntry>> {
		let rows = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE tm_id = ? ORDER BY id LIMIT ? OFFSET ?", Self::ENTRY_COLUMNS))
			.bind(tm_id.get())
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.iter().map(sqlite_row_to_entry).collect())
	}

	pub async fn get_all_entries(&self, tm_id: TmId) -> Result<Vec<TmEntry>> {
		let rows = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE tm_id = ? ORDER BY id", Self::ENTRY_COLUMNS)).bind(tm_id.get()).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(sqlite_row_to_entry).collect())
	}

	/// Reproduces the original offline TM search's discrete scoring
	/// exactly (SPEC_FULL §2.3): 100 for an exact case-insensitive match,
	/// 80 for any other LIKE hit.
	pub async fn search_entries(&self, tm_id: TmId, query: &str, limit: i64) -> Result<Vec<TmSearchHit>> {
		let pattern = format!("%{query}%");
		let rows = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE tm_id = ? AND source_text LIKE ? COLLATE NOCASE LIMIT ?", Self::ENTRY_COLUMNS))
			.bind(tm_id.get())
			.bind(pattern)
			.bind(limit)
			.fetch_all(&self.pool)
			.await?;
		let mut hits: Vec<TmSearchHit> = rows.iter().map(|r| TmSearchHit { score: like_score(&r.get::<String, _>("source_text"), query), entry: sqlite_row_to_entry(r) }).collect();
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		Ok(hits)
	}

	#[tracing::instrument(skip(self), fields(entry_id = %id))]
	pub async fn delete_entry(&self, id: TmEntryId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		let current = sqlx::query("SELECT tm_id FROM offline_tm_entries WHERE id = ?").bind(id.get()).fetch_optional(&mut *tx).await?;
		let Some(current) = current else {
			return Ok(false);
		};
		let tm_id: i64 = current.get("tm_id");
		sqlx::query("DELETE FROM offline_tm_entries WHERE id = ?").bind(id.get()).execute(&mut *tx).await?;
		sqlx::query("UPDATE offline_tms SET entry_count = entry_count - 1 WHERE id = ?").bind(tm_id).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(true)
	}

	pub async fn update_entry(&self, id: TmEntryId, target_text: Option<&str>, string_id: Option<&str>) -> Result<TmEntry> {
		sqlx::query("UPDATE offline_tm_entries SET target_text = COALESCE(?, target_text), string_id = COALESCE(?, string_id), updated_at = ? WHERE id = ?")
			.bind(target_text)
			.bind(string_id)
			.bind(Utc::now().to_rfc3339())
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		let row = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE id = ?", Self::ENTRY_COLUMNS)).bind(id.get()).fetch_one(&self.pool).await?;
		Ok(sqlite_row_to_entry(&row))
	}

	pub async fn confirm_entry(&self, id: TmEntryId, confirmed_by: UserId) -> Result<TmEntry> {
		sqlx::query("UPDATE offline_tm_entries SET is_confirmed = 1, confirmed_by = ?, confirmed_at = ? WHERE id = ?")
			.bind(confirmed_by.get())
			.bind(Utc::now().to_rfc3339())
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		let row = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE id = ?", Self::ENTRY_COLUMNS)).bind(id.get()).fetch_one(&self.pool).await?;
		Ok(sqlite_row_to_entry(&row))
	}

	pub async fn bulk_confirm_entries(&self, ids: Vec<TmEntryId>, confirmed_by: UserId) -> Result<i64> {
		let mut n = 0;
		for id in ids {
			self.confirm_entry(id, confirmed_by).await?;
			n += 1;
		}
		Ok(n)
	}

	pub async fn get_glossary_terms(&self, tm_ids: Vec<TmId>, max_source_length: i64, limit: i64) -> Result<Vec<TmEntry>> {
		if tm_ids.is_empty() {
			return Ok(Vec::new());
		}
		let mut out = Vec::new();
		for tm_id in tm_ids {
			let rows = sqlx::query(&format!(
				"SELECT {} FROM offline_tm_entries WHERE tm_id = ? AND length(source_text) <= ? ORDER BY length(source_text) ASC LIMIT ?",
				Self::ENTRY_COLUMNS
			))
			.bind(tm_id.get())
			.bind(max_source_length)
			.bind(limit)
			.fetch_all(&self.pool)
			.await?;
			out.extend(rows.iter().map(sqlite_row_to_entry));
		}
		out.truncate(limit as usize);
		Ok(out)
	}

	pub async fn get_indexes(&self, tm_id: TmId) -> Result<Vec<TmIndexInfo>> {
		let tm = self.get(tm_id).await?.ok_or_else(|| LdmError::NotFound(format!("tm {tm_id}")))?;
		Ok(vec![TmIndexInfo { index_type: "ann".to_string(), status: tm.status, file_size_bytes: None, built_at: tm.indexed_at }])
	}

	pub async fn count_entries(&self, tm_id: TmId) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM offline_tm_entries WHERE tm_id = ?").bind(tm_id.get()).fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}

	pub async fn search_exact(&self, tm_id: TmId, source: &str) -> Result<Option<TmEntry>> {
		let hash = source_hash(source);
		let row = sqlx::query(&format!("SELECT {} FROM offline_tm_entries WHERE tm_id = ? AND source_hash = ? LIMIT 1", Self::ENTRY_COLUMNS))
			.bind(tm_id.get())
			.bind(hash)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.as_ref().map(sqlite_row_to_entry))
	}

	/// Offline has no trigram index; must not fabricate matches (spec
	/// §4.4.6, §9).
	pub async fn search_similar(&self, _tm_id: TmId, _source: &str, _threshold: f32, _max_results: i64) -> Result<Vec<TmSearchHit>> {
		Ok(Vec::new())
	}

	/// Skips any platform sharing the Offline-Storage name but lacking
	/// `id = -1` (spec §4.4.6 "tree" bullet, SPEC_FULL §2).
	#[tracing::instrument(skip(self))]
	pub async fn get_tree(&self) -> Result<TmTree> {
		let mut tree = TmTree::default();
		tree.unassigned = sqlx::query(&format!(
			"SELECT t.{} FROM offline_tms t LEFT JOIN offline_tm_assignments a ON a.tm_id = t.id WHERE a.tm_id IS NULL ORDER BY t.name",
			Self::TM_COLUMNS
		))
		.fetch_all(&self.pool)
		.await?
		.iter()
		.map(|r| row_to_tm(r.get("mode"), r.get("status"), r))
		.collect();

		let platforms = sqlx::query("SELECT id, name FROM offline_platforms ORDER BY name").fetch_all(&self.pool).await?;
		for p in platforms {
			let id: i64 = p.get("id");
			let name: String = p.get("name");
			if name == OFFLINE_STORAGE_NAME && id != OFFLINE_STORAGE_PLATFORM_ID.get() {
				continue;
			}
			let platform_id = PlatformId::new(id);
			let platform_tms = self.tms_for_scope_column("platform_id", platform_id.get()).await?;
			let projects_rows = sqlx::query("SELECT id, name FROM offline_projects WHERE platform_id = ? ORDER BY name").bind(platform_id.get()).fetch_all(&self.pool).await?;
			let mut projects = Vec::new();
			for proj in projects_rows {
				let project_id = ProjectId::new(proj.get("id"));
				let project_tms = self.tms_for_scope_column("project_id", project_id.get()).await?;
				let folders = self.folder_tree_for_project(project_id, None, 0).await?;
				projects.push(ProjectTmNode { project_id, project_name: proj.get("name"), tms: project_tms, folders });
			}
			tree.platforms.push(PlatformTmNode { platform_id, platform_name: name, tms: platform_tms, projects });
		}
		Ok(tree)
	}

	fn folder_tree_for_project<'a>(&'a self, project_id: ProjectId, parent_id: Option<FolderId>, depth: usize) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<FolderTmNode>>> + Send + 'a>> {
		Box::pin(async move {
			if depth > MAX_TREE_DEPTH {
				return Err(LdmError::IntegrityViolation("tm tree folder depth exceeded".into()));
			}
			let rows = sqlx::query("SELECT id, name FROM offline_folders WHERE project_id = ? AND parent_id IS ? ORDER BY name")
				.bind(project_id.get())
				.bind(parent_id.map(FolderId::get))
				.fetch_all(&self.pool)
				.await?;
			let mut out = Vec::new();
			for r in rows {
				let folder_id = FolderId::new(r.get("id"));
				let tms = self.tms_for_scope_column("folder_id", folder_id.get()).await?;
				let children = self.folder_tree_for_project(project_id, Some(folder_id), depth + 1).await?;
				out.push(FolderTmNode { folder_id, folder_name: r.get("name"), tms, folders: children });
			}
			Ok(out)
		})
	}
}

#[async_trait]
impl TmStore for OfflineTmRepository {
	async fn get(&self, id: TmId) -> Result<Option<Tm>> {
		self.get(id).await
	}
	async fn get_all(&self) -> Result<Vec<Tm>> {
		self.get_all().await
	}
	async fn create(&self, name: &str, source_lang: &str, target_lang: &str, owner_id: Option<UserId>) -> Result<Tm> {
		self.create(name, source_lang, target_lang, owner_id).await
	}
	async fn delete(&self, id: TmId) -> Result<bool> {
		self.delete(id).await
	}
	async fn assign(&self, tm_id: TmId, target: ScopeTarget) -> Result<()> {
		self.assign(tm_id, target).await
	}
	async fn unassign(&self, tm_id: TmId) -> Result<()> {
		self.unassign(tm_id).await
	}
	async fn activate(&self, tm_id: TmId) -> Result<()> {
		self.activate(tm_id).await
	}
	async fn deactivate(&self, tm_id: TmId) -> Result<()> {
		self.deactivate(tm_id).await
	}
	async fn get_assignment(&self, tm_id: TmId) -> Result<Option<TmAssignment>> {
		self.get_assignment(tm_id).await
	}
	async fn get_for_scope(&self, platform_id: Option<PlatformId>, project_id: Option<ProjectId>, folder_id: Option<FolderId>, include_inactive: bool) -> Result<Vec<Tm>> {
		self.get_for_scope(platform_id, project_id, folder_id, include_inactive).await
	}
	async fn get_active_for_file(&self, file_id: FileId) -> Result<Vec<ActiveTm>> {
		self.get_active_for_file(file_id).await
	}
	async fn link_to_project(&self, tm_id: TmId, project_id: ProjectId, priority: i32) -> Result<()> {
		self.link_to_project(tm_id, project_id, priority).await
	}
	async fn unlink_from_project(&self, tm_id: TmId, project_id: ProjectId) -> Result<()> {
		self.unlink_from_project(tm_id, project_id).await
	}
	async fn get_linked_for_project(&self, project_id: ProjectId) -> Result<Option<Tm>> {
		self.get_linked_for_project(project_id).await
	}
	async fn get_all_linked_for_project(&self, project_id: ProjectId) -> Result<Vec<TmProjectLink>> {
		self.get_all_linked_for_project(project_id).await
	}
	async fn add_entry(&self, tm_id: TmId, source: &str, target: &str, string_id: Option<&str>, created_by: Option<UserId>) -> Result<TmEntry> {
		self.add_entry(tm_id, source, target, string_id, created_by).await
	}
	async fn add_entries_bulk(&self, tm_id: TmId, entries: Vec<NewTmEntry>) -> Result<i64> {
		self.add_entries_bulk(tm_id, entries).await
	}
	async fn get_entries(&self, tm_id: TmId, offset: i64, limit: i64) -> Result<Vec<TmEntry>> {
		self.get_entries(tm_id, offset, limit).await
	}
	async fn get_all_entries(&self, tm_id: TmId) -> Result<Vec<TmEntry>> {
		self.get_all_entries(tm_id).await
	}
	async fn search_entries(&self, tm_id: TmId, query: &str, limit: i64) -> Result<Vec<TmSearchHit>> {
		self.search_entries(tm_id, query, limit).await
	}
	async fn delete_entry(&self, id: TmEntryId) -> Result<bool> {
		self.delete_entry(id).await
	}
	async fn update_entry(&self, id: TmEntryId, target_text: Option<&str>, string_id: Option<&str>) -> Result<TmEntry> {
		self.update_entry(id, target_text, string_id).await
	}
	async fn confirm_entry(&self, id: TmEntryId, confirmed_by: UserId) -> Result<TmEntry> {
		self.confirm_entry(id, confirmed_by).await
	}
	async fn bulk_confirm_entries(&self, ids: Vec<TmEntryId>, confirmed_by: UserId) -> Result<i64> {
		self.bulk_confirm_entries(ids, confirmed_by).await
	}
	async fn get_glossary_terms(&self, tm_ids: Vec<TmId>, max_source_length: i64, limit: i64) -> Result<Vec<TmEntry>> {
		self.get_glossary_terms(tm_ids, max_source_length, limit).await
	}
	async fn get_indexes(&self, tm_id: TmId) -> Result<Vec<TmIndexInfo>> {
		self.get_indexes(tm_id).await
	}
	async fn count_entries(&self, tm_id: TmId) -> Result<i64> {
		self.count_entries(tm_id).await
	}
	async fn search_exact(&self, tm_id: TmId, source: &str) -> Result<Option<TmEntry>> {
		self.search_exact(tm_id, source).await
	}
	async fn search_similar(&self, tm_id: TmId, source: &str, threshold: f32, max_results: i64) -> Result<Vec<TmSearchHit>> {
		self.search_similar(tm_id, source, threshold, max_results).await
	}
	async fn get_tree(&self) -> Result<TmTree> {
		self.get_tree().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	#[tokio::test]
	async fn create_rejects_duplicate_name() {
		let pool = offline_test_pool().await;
		let repo = OfflineTmRepository::new(pool);
		repo.create("Shared TM", "en", "fr", None).await.unwrap();
		let err = repo.create("shared tm", "en", "fr", None).await.unwrap_err();
		assert!(matches!(err, LdmError::NameCollision(_)));
	}

	#[tokio::test]
	async fn create_and_add_entry_allocate_negative_ids() {
		let pool = offline_test_pool().await;
		let repo = OfflineTmRepository::new(pool);
		let tm = repo.create("TM", "en", "fr", None).await.unwrap();
		assert!(tm.id.is_local());
		let entry = repo.add_entry(tm.id, "hello", "bonjour", None, None).await.unwrap();
		assert!(entry.id.is_local());
	}

	#[tokio::test]
	async fn activate_fails_from_unassigned_scenario_tm_state_machine() {
		let pool = offline_test_pool().await;
		let repo = OfflineTmRepository::new(pool);
		let tm = repo.create("TM", "en", "fr", None).await.unwrap();
		let err = repo.activate(tm.id).await.unwrap_err();
		assert!(matches!(err, LdmError::InvalidScope(_)));
	}

	#[tokio::test]
	async fn assign_activate_deactivate_unassign_round_trip() {
		let pool = offline_test_pool().await;
		let repo = OfflineTmRepository::new(pool);
		let tm = repo.create("TM", "en", "fr", None).await.unwrap();
		repo.assign(tm.id, ScopeTarget::Project(ProjectId::new(7))).await.unwrap();
		repo.activate(tm.id).await.unwrap();
		assert!(repo.get_assignment(tm.id).await.unwrap().unwrap().is_active);
		repo.deactivate(tm.id).await.unwrap();
		assert!(!repo.get_assignment(tm.id).await.unwrap().unwrap().is_active);
		repo.unassign(tm.id).await.unwrap();
		assert!(repo.get_assignment(tm.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn standard_mode_keeps_one_target_per_source() {
		let pool = offline_test_pool().await;
		let repo = OfflineTmRepository::new(pool);
		let tm = repo.create("TM", "en", "fr", None).await.unwrap();
		repo.add_entry(tm.id, "Hello", "Bonjour", None, None).await.unwrap();
		repo.add_entry(tm.id, "hello", "Salut", None, None).await.unwrap();
		assert_eq!(repo.count_entries(tm.id).await.unwrap(), 1);
		let entries = repo.get_all_entries(tm.id).await.unwrap();
		assert_eq!(entries[0].target_text, "Salut");
	}

	#[tokio::test]
	async fn search_entries_scores_exact_match_higher_open_question_2() {
		let pool = offline_test_pool().await;
		let repo = OfflineTmRepository::new(pool);
		let tm = repo.create("TM", "en", "fr", None).await.unwrap();
		repo.add_entry(tm.id, "Good morning", "Bonjour", None, None).await.unwrap();
		repo.add_entry(tm.id, "Morning", "Matin", None, None).await.unwrap();
		let hits = repo.search_entries(tm.id, "Morning", 10).await.unwrap();
		assert_eq!(hits[0].entry.source_text, "Morning");
		assert_eq!(hits[0].score, 100.0);
		assert_eq!(hits[1].score, 80.0);
	}

	#[tokio::test]
	async fn get_active_for_file_orders_folder_project_platform_scenario_s3() {
		let pool = offline_test_pool().await;
		sqlx::query("INSERT INTO offline_platforms (id, name, owner_id) VALUES (1, 'Plat', 1)").execute(&pool).await.unwrap();
		sqlx::query("INSERT INTO offline_projects (id, name, owner_id, platform_id) VALUES (10, 'Proj', 1, 1)").execute(&pool).await.unwrap();
		sqlx::query("INSERT INTO offline_folders (id, project_id, name) VALUES (100, 10, 'Fold')").execute(&pool).await.unwrap();
		sqlx::query("INSERT INTO offline_files (id, project_id, folder_id, name, original_filename, format, source_language) VALUES (1000, 10, 100, 'x', 'x', 'json', 'en')")
			.execute(&pool)
			.await
			.unwrap();

		let repo = OfflineTmRepository::new(pool);
		let t_plat = repo.create("T_plat", "en", "fr", None).await.unwrap();
		let t_proj = repo.create("T_proj", "en", "fr", None).await.unwrap();
		let t_fold = repo.create("T_fold", "en", "fr", None).await.unwrap();
		repo.assign(t_plat.id, ScopeTarget::Platform(PlatformId::new(1))).await.unwrap();
		repo.activate(t_plat.id).await.unwrap();
		repo.assign(t_proj.id, ScopeTarget::Project(ProjectId::new(10))).await.unwrap();
		repo.activate(t_proj.id).await.unwrap();
		repo.assign(t_fold.id, ScopeTarget::Folder(FolderId::new(100))).await.unwrap();
		repo.activate(t_fold.id).await.unwrap();

		let active = repo.get_active_for_file(FileId::new(1000)).await.unwrap();
		let names: Vec<&str> = active.iter().map(|a| a.tm.name.as_str()).collect();
		assert_eq!(names, vec!["T_fold", "T_proj", "T_plat"]);
		assert_eq!(active[0].scope, ScopeKind::Folder);
		assert_eq!(active[1].scope, ScopeKind::Project);
		assert_eq!(active[2].scope, ScopeKind::Platform);
	}
}
