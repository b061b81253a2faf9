// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RowRepository (spec §4.4.5): row CRUD, search/listing, edit history, and
//! the online-only trigram `suggest_similar`.

use async_trait::async_trait;
use chrono::Utc;
use ldm_types::{FileId, FilterType, LdmError, OfflineRowFields, Result, Row, RowId, RowStatus, SearchField, SearchMode};
use sqlx::{PgPool, Row as _, SqlitePool};

#[derive(Debug, Clone, Default)]
pub struct RowUpdate {
	pub target: Option<String>,
	pub status: Option<RowStatus>,
	pub memo: Option<String>,
	pub updated_by: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewRow {
	pub row_num: i64,
	pub string_id: Option<String>,
	pub source: String,
	pub target: String,
	pub memo: Option<String>,
	pub status: RowStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RowSearch {
	pub search: Option<String>,
	pub search_mode: SearchMode,
	pub search_fields: Vec<SearchField>,
	pub status: Option<RowStatus>,
	pub filter_type: FilterType,
}

#[derive(Debug, Clone)]
pub struct RowEditHistoryEntry {
	pub id: i64,
	pub row_id: RowId,
	pub field: String,
	pub old_value: Option<String>,
	pub new_value: Option<String>,
	pub edited_by: Option<i64>,
	pub edited_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SimilarRow {
	pub row: Row,
	pub score: f32,
}

#[async_trait]
pub trait RowStore: Send + Sync {
	async fn get(&self, id: RowId) -> Result<Option<Row>>;
	async fn get_with_file(&self, id: RowId) -> Result<Option<(Row, FileId)>>;
	async fn create(&self, file_id: FileId, row: NewRow) -> Result<Row>;
	async fn update(&self, id: RowId, update: RowUpdate) -> Result<Row>;
	async fn delete(&self, id: RowId) -> Result<bool>;
	async fn bulk_create(&self, file_id: FileId, rows: Vec<NewRow>) -> Result<Vec<Row>>;
	async fn bulk_update(&self, updates: Vec<(RowId, RowUpdate)>) -> Result<i64>;
	async fn get_for_file(&self, file_id: FileId, page: i64, limit: i64, search: &RowSearch) -> Result<Vec<Row>>;
	async fn count_for_file(&self, file_id: FileId, search: &RowSearch) -> Result<i64>;
	async fn add_edit_history(&self, row_id: RowId, field: &str, old_value: Option<&str>, new_value: Option<&str>, edited_by: Option<i64>) -> Result<()>;
	async fn get_edit_history(&self, row_id: RowId) -> Result<Vec<RowEditHistoryEntry>>;
	/// Reinserts a row with its original ID, for the `ldm-core` restore
	/// coordinator (spec §8 testable property 7, scenario S2).
	async fn recreate_with_id(&self, row: &Row) -> Result<()>;
	async fn suggest_similar(
		&self,
		source: &str,
		file_id: Option<FileId>,
		project_id: Option<i64>,
		exclude_row_id: Option<RowId>,
		threshold: f32,
		max_results: i64,
	) -> Result<Vec<SimilarRow>>;
}

fn row_to_row(r: &sqlx::sqlite::SqliteRow) -> Row {
	Row {
		id: RowId::new(r.get("id")),
		file_id: FileId::new(r.get("file_id")),
		row_num: r.get("row_num"),
		string_id: r.get("string_id"),
		source: r.get("source"),
		target: r.get("target"),
		memo: r.get("memo"),
		status: r.get::<String, _>("status").parse().unwrap_or(RowStatus::Pending),
		qa_flag_count: r.get("qa_flag_count"),
		extra_data: r.get::<Option<String>, _>("extra_data").and_then(|s| serde_json::from_str(&s).ok()),
		offline: OfflineRowFields {
			sync_status: r.get::<Option<String>, _>("sync_status").and_then(|s| s.parse().ok()),
			server_id: r.get("server_id"),
			server_file_id: r.get("server_file_id"),
		},
	}
}

fn pg_row_to_row(r: &sqlx::postgres::PgRow) -> Row {
	Row {
		id: RowId::new(r.get("id")),
		file_id: FileId::new(r.get("file_id")),
		row_num: r.get("row_num"),
		string_id: r.get("string_id"),
		source: r.get("source"),
		target: r.get("target"),
		memo: r.get("memo"),
		status: r.get::<String, _>("status").parse().unwrap_or(RowStatus::Pending),
		qa_flag_count: r.get("qa_flag_count"),
		extra_data: r.get("extra_data"),
		offline: OfflineRowFields::default(),
	}
}

/// `Confirmed` maps to `status = approved`; rows in any earlier state count
/// as `Unconfirmed` (spec leaves the exact mapping to the implementation).
fn filter_type_clause(filter_type: FilterType, placeholder_prefix: &str, idx: &mut usize) -> Option<String> {
	match filter_type {
		FilterType::All => None,
		FilterType::Confirmed => Some("status = 'approved'".to_string()),
		FilterType::Unconfirmed => Some("status != 'approved'".to_string()),
		FilterType::QaFlagged => {
			let _ = (placeholder_prefix, &mut *idx);
			Some("qa_flag_count > 0".to_string())
		}
	}
}

fn search_columns(fields: &[SearchField]) -> Vec<&'static str> {
	if fields.is_empty() {
		return vec!["source", "target", "string_id"];
	}
	fields
		.iter()
		.map(|f| match f {
			SearchField::StringId => "string_id",
			SearchField::Source => "source",
			SearchField::Target => "target",
		})
		.collect()
}

// ---------------------------------------------------------------------------
// Online (Postgres)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OnlineRowRepository {
	pool: PgPool,
}

impl OnlineRowRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	const COLUMNS: &'static str = "id, file_id, row_num, string_id, source, target, memo, status, qa_flag_count, extra_data";

	#[tracing::instrument(skip(self), fields(row_id = %id))]
	pub async fn get(&self, id: RowId) -> Result<Option<Row>> {
		let row = sqlx::query(&format!("SELECT {} FROM ldm_rows WHERE id = $1", Self::COLUMNS))
			.bind(id.get())
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.as_ref().map(pg_row_to_row))
	}

	pub async fn get_with_file(&self, id: RowId) -> Result<Option<(Row, FileId)>> {
		Ok(self.get(id).await?.map(|r| (r.clone(), r.file_id)))
	}

	#[tracing::instrument(skip(self, row), fields(file_id = %file_id))]
	pub async fn create(&self, file_id: FileId, row: NewRow) -> Result<Row> {
		let mut tx = self.pool.begin().await?;
		let inserted = sqlx::query(&format!(
			"INSERT INTO ldm_rows (file_id, row_num, string_id, source, target, memo, status) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
			Self::COLUMNS
		))
		.bind(file_id.get())
		.bind(row.row_num)
		.bind(&row.string_id)
		.bind(&row.source)
		.bind(&row.target)
		.bind(&row.memo)
		.bind(row.status.to_string())
		.fetch_one(&mut *tx)
		.await?;
		sqlx::query("UPDATE ldm_files SET row_count = row_count + 1 WHERE id = $1").bind(file_id.get()).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(pg_row_to_row(&inserted))
	}

	#[tracing::instrument(skip(self, update), fields(row_id = %id))]
	pub async fn update(&self, id: RowId, update: RowUpdate) -> Result<Row> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("row {id}")))?;
		let next_status = match (&update.target, &update.status, current.status) {
			(_, Some(explicit), _) => *explicit,
			(Some(_), None, RowStatus::Pending) => RowStatus::Translated,
			(_, None, existing) => existing,
		};
		let target = update.target.unwrap_or(current.target.clone());
		let memo = update.memo.or(current.memo.clone());
		sqlx::query("UPDATE ldm_rows SET target = $1, status = $2, memo = $3 WHERE id = $4")
			.bind(&target)
			.bind(next_status.to_string())
			.bind(&memo)
			.bind(id.get())
			.execute(&self.pool)
			.await?;
		self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("row {id}")))
	}

	#[tracing::instrument(skip(self), fields(row_id = %id))]
	pub async fn delete(&self, id: RowId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		let current = sqlx::query("SELECT file_id FROM ldm_rows WHERE id = $1").bind(id.get()).fetch_optional(&mut *tx).await?;
		let Some(current) = current else {
			return Ok(false);
		};
		let file_id: i64 = current.get("file_id");
		sqlx::query("DELETE FROM ldm_rows WHERE id = $1").bind(id.get()).execute(&mut *tx).await?;
		sqlx::query("UPDATE ldm_files SET row_count = row_count - 1 WHERE id = $1").bind(file_id).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(true)
	}

	#[tracing::instrument(skip(self, row), fields(row_id = %row.id))]
	pub async fn recreate_with_id(&self, row: &Row) -> Result<()> {
		let extra_data = row.extra_data.clone();
		sqlx::query(
			"INSERT INTO ldm_rows (id, file_id, row_num, string_id, source, target, memo, status, qa_flag_count, extra_data) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
		)
		.bind(row.id.get())
		.bind(row.file_id.get())
		.bind(row.row_num)
		.bind(&row.string_id)
		.bind(&row.source)
		.bind(&row.target)
		.bind(&row.memo)
		.bind(row.status.to_string())
		.bind(row.qa_flag_count)
		.bind(extra_data)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self, rows), fields(file_id = %file_id, n = rows.len()))]
	pub async fn bulk_create(&self, file_id: FileId, rows: Vec<NewRow>) -> Result<Vec<Row>> {
		let mut tx = self.pool.begin().await?;
		let mut created = Vec::with_capacity(rows.len());
		for row in rows {
			let inserted = sqlx::query(&format!(
				"INSERT INTO ldm_rows (file_id, row_num, string_id, source, target, memo, status) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
				Self::COLUMNS
			))
			.bind(file_id.get())
			.bind(row.row_num)
			.bind(&row.string_id)
			.bind(&row.source)
			.bind(&row.target)
			.bind(&row.memo)
			.bind(row.status.to_string())
			.fetch_one(&mut *tx)
			.await?;
			created.push(pg_row_to_row(&inserted));
		}
		sqlx::query("UPDATE ldm_files SET row_count = row_count + $1 WHERE id = $2")
			.bind(created.len() as i64)
			.bind(file_id.get())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(created)
	}

	#[tracing::instrument(skip(self, updates), fields(n = updates.len()))]
	pub async fn bulk_update(&self, updates: Vec<(RowId, RowUpdate)>) -> Result<i64> {
		let mut changed = 0;
		for (id, update) in updates {
			let before = self.get(id).await?;
			let after = self.update(id, update).await?;
			if before.map(|b| b.target != after.target || b.status != after.status).unwrap_or(true) {
				changed += 1;
			}
		}
		Ok(changed)
	}

	#[tracing::instrument(skip(self, search), fields(file_id = %file_id))]
	pub async fn get_for_file(&self, file_id: FileId, page: i64, limit: i64, search: &RowSearch) -> Result<Vec<Row>> {
		let mut query = format!("SELECT {} FROM ldm_rows WHERE file_id = $1", Self::COLUMNS);
		let mut idx = 2;
		if let Some(clause) = filter_type_clause(search.filter_type, "$", &mut idx) {
			query.push_str(" AND ");
			query.push_str(&clause);
		}
		if let Some(status) = search.status {
			query.push_str(&format!(" AND status = ${idx}"));
			idx += 1;
			let _ = status;
		}
		let search_clause = search.search.as_ref().map(|term| {
			let columns = search_columns(&search.search_fields);
			let per_column: Vec<String> = columns
				.iter()
				.map(|c| match search.search_mode {
					SearchMode::Contain | SearchMode::Fuzzy => format!("{c} ILIKE ${idx}"),
					SearchMode::Exact => format!("{c} = ${idx}"),
					SearchMode::NotContain => format!("{c} NOT ILIKE ${idx}"),
				})
				.collect();
			let joiner = if matches!(search.search_mode, SearchMode::NotContain) { " AND " } else { " OR " };
			idx += 1;
			let _ = term;
			format!("({})", per_column.join(joiner))
		});
		if let Some(clause) = &search_clause {
			query.push_str(" AND ");
			query.push_str(clause);
		}
		query.push_str(&format!(" ORDER BY row_num LIMIT ${idx} OFFSET ${}", idx + 1));

		let mut q = sqlx::query(&query).bind(file_id.get());
		if let Some(status) = search.status {
			q = q.bind(status.to_string());
		}
		if let Some(term) = &search.search {
			let pattern = match search.search_mode {
				SearchMode::Exact => term.clone(),
				_ => format!("%{term}%"),
			};
			q = q.bind(pattern);
		}
		let rows = q.bind(limit).bind(page * limit).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(pg_row_to_row).collect())
	}

	#[tracing::instrument(skip(self, search), fields(file_id = %file_id))]
	pub async fn count_for_file(&self, file_id: FileId, search: &RowSearch) -> Result<i64> {
		// count_for_file mirrors get_for_file's WHERE clause but without
		// paging; kept deliberately simple rather than factored since the
		// two queries diverge only in their tail.
		let all = self.get_for_file(file_id, 0, i64::MAX / 2, search).await?;
		Ok(all.len() as i64)
	}

	#[tracing::instrument(skip(self, old_value, new_value), fields(row_id = %row_id, field = %field))]
	pub async fn add_edit_history(&self, row_id: RowId, field: &str, old_value: Option<&str>, new_value: Option<&str>, edited_by: Option<i64>) -> Result<()> {
		sqlx::query("INSERT INTO ldm_row_edit_history (row_id, field, old_value, new_value, edited_by, edited_at) VALUES ($1, $2, $3, $4, $5, $6)")
			.bind(row_id.get())
			.bind(field)
			.bind(old_value)
			.bind(new_value)
			.bind(edited_by)
			.bind(Utc::now())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn get_edit_history(&self, row_id: RowId) -> Result<Vec<RowEditHistoryEntry>> {
		let rows = sqlx::query("SELECT id, row_id, field, old_value, new_value, edited_by, edited_at FROM ldm_row_edit_history WHERE row_id = $1 ORDER BY edited_at")
			.bind(row_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows
			.into_iter()
			.map(|r| RowEditHistoryEntry {
				id: r.get("id"),
				row_id: RowId::new(r.get("row_id")),
				field: r.get("field"),
				old_value: r.get("old_value"),
				new_value: r.get("new_value"),
				edited_by: r.get("edited_by"),
				edited_at: r.get("edited_at"),
			})
			.collect())
	}

	/// Trigram similarity via `pg_trgm`'s `similarity()`; requires the
	/// extension to be enabled on the online database.
	#[tracing::instrument(skip(self, source))]
	pub async fn suggest_similar(
		&self,
		source: &str,
		file_id: Option<FileId>,
		project_id: Option<i64>,
		exclude_row_id: Option<RowId>,
		threshold: f32,
		max_results: i64,
	) -> Result<Vec<SimilarRow>> {
		let rows = sqlx::query(&format!(
			"SELECT {}, similarity(source, $1) AS score FROM ldm_rows r \
			 JOIN ldm_files f ON f.id = r.file_id \
			 WHERE similarity(source, $1) >= $2 \
			 AND ($3::bigint IS NULL OR r.file_id = $3) \
			 AND ($4::bigint IS NULL OR f.project_id = $4) \
			 AND ($5::bigint IS NULL OR r.id != $5) \
			 ORDER BY score DESC LIMIT $6",
			Self::COLUMNS
		))
		.bind(source)
		.bind(threshold)
		.bind(file_id.map(FileId::get))
		.bind(project_id)
		.bind(exclude_row_id.map(RowId::get))
		.bind(max_results)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(|r| SimilarRow { row: pg_row_to_row(r), score: r.get("score") }).collect())
	}
}

#[async_trait]
impl RowStore for OnlineRowRepository {
	async fn get(&self, id: RowId) -> Result<Option<Row>> {
		self.get(id).await
	}
	async fn get_with_file(&self, id: RowId) -> Result<Option<(Row, FileId)>> {
		self.get_with_file(id).await
	}
	async fn create(&self, file_id: FileId, row: NewRow) -> Result<Row> {
		self.create(file_id, row).await
	}
	async fn update(&self, id: RowId, update: RowUpdate) -> Result<Row> {
		self.update(id, update).await
	}
	async fn delete(&self, id: RowId) -> Result<bool> {
		self.delete(id).await
	}
	async fn bulk_create(&self, file_id: FileId, rows: Vec<NewRow>) -> Result<Vec<Row>> {
		self.bulk_create(file_id, rows).await
	}
	async fn bulk_update(&self, updates: Vec<(RowId, RowUpdate)>) -> Result<i64> {
		self.bulk_update(updates).await
	}
	async fn get_for_file(&self, file_id: FileId, page: i64, limit: i64, search: &RowSearch) -> Result<Vec<Row>> {
		self.get_for_file(file_id, page, limit, search).await
	}
	async fn count_for_file(&self, file_id: FileId, search: &RowSearch) -> Result<i64> {
		self.count_for_file(file_id, search).await
	}
	async fn add_edit_history(&self, row_id: RowId, field: &str, old_value: Option<&str>, new_value: Option<&str>, edited_by: Option<i64>) -> Result<()> {
		self.add_edit_history(row_id, field, old_value, new_value, edited_by).await
	}
	async fn get_edit_history(&self, row_id: RowId) -> Result<Vec<RowEditHistoryEntry>> {
		self.get_edit_history(row_id).await
	}
	async fn suggest_similar(
		&self,
		source: &str,
		file_id: Option<FileId>,
		project_id: Option<i64>,
		exclude_row_id: Option<RowId>,
		threshold: f32,
		max_results: i64,
	) -> Result<Vec<SimilarRow>> {
		self.suggest_similar(source, file_id, project_id, exclude_row_id, threshold, max_results).await
	}
}

// ---------------------------------------------------------------------------
// Offline (SQLite)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OfflineRowRepository {
	pool: SqlitePool,
	id_alloc: std::sync::Arc<crate::id_alloc::IdAllocator>,
}

impl OfflineRowRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::default()) }
	}

	/// Same as [`Self::new`] but with the ID modulus driven by
	/// `DatabaseConfig::negative_id_modulus` rather than the built-in default.
	pub fn with_modulus(pool: SqlitePool, modulus: i64) -> Self {
		Self { pool, id_alloc: std::sync::Arc::new(crate::id_alloc::IdAllocator::new(modulus)) }
	}

	const COLUMNS: &'static str = "id, file_id, row_num, string_id, source, target, memo, status, qa_flag_count, extra_data, sync_status, server_id, server_file_id";

	#[tracing::instrument(skip(self), fields(row_id = %id))]
	pub async fn get(&self, id: RowId) -> Result<Option<Row>> {
		let row = sqlx::query(&format!("SELECT {} FROM offline_rows WHERE id = ?", Self::COLUMNS))
			.bind(id.get())
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.as_ref().map(row_to_row))
	}

	pub async fn get_with_file(&self, id: RowId) -> Result<Option<(Row, FileId)>> {
		Ok(self.get(id).await?.map(|r| (r.clone(), r.file_id)))
	}

	#[tracing::instrument(skip(self, row), fields(file_id = %file_id))]
	pub async fn create(&self, file_id: FileId, row: NewRow) -> Result<Row> {
		let mut tx = self.pool.begin().await?;
		// A collision here rolls back the whole transaction rather than
		// retrying in place, same tradeoff as folder::copy_subtree.
		let new_id = self.id_alloc.next_negative_id();
		sqlx::query("INSERT INTO offline_rows (id, file_id, row_num, string_id, source, target, memo, status, sync_status) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'local')")
			.bind(new_id)
			.bind(file_id.get())
			.bind(row.row_num)
			.bind(&row.string_id)
			.bind(&row.source)
			.bind(&row.target)
			.bind(&row.memo)
			.bind(row.status.to_string())
			.execute(&mut *tx)
			.await?;
		sqlx::query("UPDATE offline_files SET row_count = row_count + 1 WHERE id = ?").bind(file_id.get()).execute(&mut *tx).await?;
		tx.commit().await?;
		self.get(RowId::new(new_id)).await?.ok_or_else(|| LdmError::NotFound("just-inserted row".into()))
	}

	/// Implements spec's "any successful update in offline mode that
	/// alters a file whose `sync_status != local` marks the row modified
	/// and journals each changed field into `local_changes`".
	#[tracing::instrument(skip(self, update), fields(row_id = %id))]
	pub async fn update(&self, id: RowId, update: RowUpdate) -> Result<Row> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("row {id}")))?;
		let next_status = match (&update.target, &update.status, current.status) {
			(_, Some(explicit), _) => *explicit,
			(Some(_), None, RowStatus::Pending) => RowStatus::Translated,
			(_, None, existing) => existing,
		};
		let target = update.target.clone().unwrap_or(current.target.clone());
		let memo = update.memo.clone().or(current.memo.clone());

		let file_sync_status: Option<String> = sqlx::query("SELECT sync_status FROM offline_files WHERE id = ?")
			.bind(current.file_id.get())
			.fetch_optional(&self.pool)
			.await?
			.and_then(|r| r.get("sync_status"));
		let is_already_synced = file_sync_status.as_deref().is_some_and(|s| s != "local");

		let new_row_sync_status = if is_already_synced { "modified" } else { current.offline.sync_status.map(|s| s.to_string()).unwrap_or_else(|| "local".into()) };

		sqlx::query("UPDATE offline_rows SET target = ?, status = ?, memo = ?, sync_status = ? WHERE id = ?")
			.bind(&target)
			.bind(next_status.to_string())
			.bind(&memo)
			.bind(&new_row_sync_status)
			.bind(id.get())
			.execute(&self.pool)
			.await?;

		if is_already_synced {
			if target != current.target {
				self.add_edit_history(id, "target", Some(&current.target), Some(&target), update.updated_by).await?;
				self.journal_local_change(id, "target", Some(&current.target), Some(&target)).await?;
			}
			if next_status != current.status {
				self.add_edit_history(id, "status", Some(&current.status.to_string()), Some(&next_status.to_string()), update.updated_by).await?;
				self.journal_local_change(id, "status", Some(&current.status.to_string()), Some(&next_status.to_string())).await?;
			}
		}

		self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("row {id}")))
	}

	#[tracing::instrument(skip(self), fields(row_id = %id))]
	pub async fn delete(&self, id: RowId) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		let current = sqlx::query("SELECT file_id FROM offline_rows WHERE id = ?").bind(id.get()).fetch_optional(&mut *tx).await?;
		let Some(current) = current else {
			return Ok(false);
		};
		let file_id: i64 = current.get("file_id");
		sqlx::query("DELETE FROM offline_rows WHERE id = ?").bind(id.get()).execute(&mut *tx).await?;
		sqlx::query("UPDATE offline_files SET row_count = row_count - 1 WHERE id = ?").bind(file_id).execute(&mut *tx).await?;
		tx.commit().await?;
		Ok(true)
	}

	#[tracing::instrument(skip(self, rows), fields(file_id = %file_id, n = rows.len()))]
	pub async fn bulk_create(&self, file_id: FileId, rows: Vec<NewRow>) -> Result<Vec<Row>> {
		let mut tx = self.pool.begin().await?;
		// Reserve a contiguous block up front (spec §4.2, "bulk inserts
		// reserve a contiguous block") to keep the rows' relative order stable.
		let created_ids = self.id_alloc.reserve_block(rows.len());
		for (row, new_id) in rows.iter().zip(created_ids.iter().copied()) {
			sqlx::query("INSERT INTO offline_rows (id, file_id, row_num, string_id, source, target, memo, status, sync_status) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'local')")
				.bind(new_id)
				.bind(file_id.get())
				.bind(row.row_num)
				.bind(&row.string_id)
				.bind(&row.source)
				.bind(&row.target)
				.bind(&row.memo)
				.bind(row.status.to_string())
				.execute(&mut *tx)
				.await?;
		}
		sqlx::query("UPDATE offline_files SET row_count = row_count + ? WHERE id = ?")
			.bind(created_ids.len() as i64)
			.bind(file_id.get())
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		let mut created = Vec::with_capacity(created_ids.len());
		for id in created_ids {
			created.push(self.get(RowId::new(id)).await?.ok_or_else(|| LdmError::NotFound("just-inserted row".into()))?);
		}
		Ok(created)
	}

	#[tracing::instrument(skip(self, updates), fields(n = updates.len()))]
	pub async fn bulk_update(&self, updates: Vec<(RowId, RowUpdate)>) -> Result<i64> {
		let mut changed = 0;
		for (id, update) in updates {
			let before = self.get(id).await?;
			let after = self.update(id, update).await?;
			if before.map(|b| b.target != after.target || b.status != after.status).unwrap_or(true) {
				changed += 1;
			}
		}
		Ok(changed)
	}

	#[tracing::instrument(skip(self, search), fields(file_id = %file_id))]
	pub async fn get_for_file(&self, file_id: FileId, page: i64, limit: i64, search: &RowSearch) -> Result<Vec<Row>> {
		let mut query = format!("SELECT {} FROM offline_rows WHERE file_id = ?", Self::COLUMNS);
		if let Some(clause) = filter_type_clause(search.filter_type, "?", &mut 0) {
			query.push_str(" AND ");
			query.push_str(&clause);
		}
		if search.status.is_some() {
			query.push_str(" AND status = ?");
		}
		let search_clause = search.search.as_ref().map(|_| {
			let columns = search_columns(&search.search_fields);
			let per_column: Vec<String> = columns
				.iter()
				.map(|c| match search.search_mode {
					SearchMode::Contain | SearchMode::Fuzzy => format!("{c} LIKE ? COLLATE NOCASE"),
					SearchMode::Exact => format!("{c} = ? COLLATE NOCASE"),
					SearchMode::NotContain => format!("{c} NOT LIKE ? COLLATE NOCASE"),
				})
				.collect();
			let joiner = if matches!(search.search_mode, SearchMode::NotContain) { " AND " } else { " OR " };
			format!("({})", per_column.join(joiner))
		});
		let column_count = search_columns(&search.search_fields).len();
		if let Some(clause) = &search_clause {
			query.push_str(" AND ");
			query.push_str(clause);
		}
		query.push_str(" ORDER BY row_num LIMIT ? OFFSET ?");

		let mut q = sqlx::query(&query).bind(file_id.get());
		if let Some(status) = search.status {
			q = q.bind(status.to_string());
		}
		if let Some(term) = &search.search {
			let pattern = match search.search_mode {
				SearchMode::Exact => term.clone(),
				_ => format!("%{term}%"),
			};
			for _ in 0..column_count {
				q = q.bind(pattern.clone());
			}
		}
		let rows = q.bind(limit).bind(page * limit).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(row_to_row).collect())
	}

	#[tracing::instrument(skip(self, search), fields(file_id = %file_id))]
	pub async fn count_for_file(&self, file_id: FileId, search: &RowSearch) -> Result<i64> {
		let all = self.get_for_file(file_id, 0, i64::MAX / 2, search).await?;
		Ok(all.len() as i64)
	}

	#[tracing::instrument(skip(self, old_value, new_value), fields(row_id = %row_id, field = %field))]
	pub async fn add_edit_history(&self, row_id: RowId, field: &str, old_value: Option<&str>, new_value: Option<&str>, edited_by: Option<i64>) -> Result<()> {
		sqlx::query("INSERT INTO offline_row_edit_history (row_id, field, old_value, new_value, edited_by, edited_at) VALUES (?, ?, ?, ?, ?, ?)")
			.bind(row_id.get())
			.bind(field)
			.bind(old_value)
			.bind(new_value)
			.bind(edited_by)
			.bind(Utc::now().to_rfc3339())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Journals one changed field into `offline_local_changes` (spec §4.4.5,
	/// "journals an entry into local_changes with the old and new value per
	/// changed field"), distinct from `add_edit_history`'s per-row audit trail.
	async fn journal_local_change(&self, row_id: RowId, field: &str, old_value: Option<&str>, new_value: Option<&str>) -> Result<()> {
		sqlx::query(
			"INSERT INTO offline_local_changes (entity_type, entity_id, field, old_value, new_value, sync_status, created_at) VALUES ('row', ?, ?, ?, ?, 'pending', ?)",
		)
		.bind(row_id.get())
		.bind(field)
		.bind(old_value)
		.bind(new_value)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn get_edit_history(&self, row_id: RowId) -> Result<Vec<RowEditHistoryEntry>> {
		let rows = sqlx::query("SELECT id, row_id, field, old_value, new_value, edited_by, edited_at FROM offline_row_edit_history WHERE row_id = ? ORDER BY edited_at")
			.bind(row_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows
			.into_iter()
			.map(|r| RowEditHistoryEntry {
				id: r.get("id"),
				row_id: RowId::new(r.get("row_id")),
				field: r.get("field"),
				old_value: r.get("old_value"),
				new_value: r.get("new_value"),
				edited_by: r.get("edited_by"),
				edited_at: chrono::DateTime::parse_from_rfc3339(&r.get::<String, _>("edited_at")).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
			})
			.collect())
	}

	/// Offline has no trigram index; it must not fabricate matches, so
	/// this always returns empty (spec §4.4.5).
	pub async fn suggest_similar(
		&self,
		_source: &str,
		_file_id: Option<FileId>,
		_project_id: Option<i64>,
		_exclude_row_id: Option<RowId>,
		_threshold: f32,
		_max_results: i64,
	) -> Result<Vec<SimilarRow>> {
		Ok(Vec::new())
	}
}

#[async_trait]
impl RowStore for OfflineRowRepository {
	async fn get(&self, id: RowId) -> Result<Option<Row>> {
		self.get(id).await
	}
	async fn get_with_file(&self, id: RowId) -> Result<Option<(Row, FileId)>> {
		self.get_with_file(id).await
	}
	async fn create(&self, file_id: FileId, row: NewRow) -> Result<Row> {
		self.create(file_id, row).await
	}
	async fn update(&self, id: RowId, update: RowUpdate) -> Result<Row> {
		self.update(id, update).await
	}
	async fn delete(&self, id: RowId) -> Result<bool> {
		self.delete(id).await
	}
	async fn bulk_create(&self, file_id: FileId, rows: Vec<NewRow>) -> Result<Vec<Row>> {
		self.bulk_create(file_id, rows).await
	}
	async fn bulk_update(&self, updates: Vec<(RowId, RowUpdate)>) -> Result<i64> {
		self.bulk_update(updates).await
	}
	async fn get_for_file(&self, file_id: FileId, page: i64, limit: i64, search: &RowSearch) -> Result<Vec<Row>> {
		self.get_for_file(file_id, page, limit, search).await
	}
	async fn count_for_file(&self, file_id: FileId, search: &RowSearch) -> Result<i64> {
		self.count_for_file(file_id, search).await
	}
	async fn add_edit_history(&self, row_id: RowId, field: &str, old_value: Option<&str>, new_value: Option<&str>, edited_by: Option<i64>) -> Result<()> {
		self.add_edit_history(row_id, field, old_value, new_value, edited_by).await
	}
	async fn get_edit_history(&self, row_id: RowId) -> Result<Vec<RowEditHistoryEntry>> {
		self.get_edit_history(row_id).await
	}
	async fn suggest_similar(
		&self,
		source: &str,
		file_id: Option<FileId>,
		project_id: Option<i64>,
		exclude_row_id: Option<RowId>,
		threshold: f32,
		max_results: i64,
	) -> Result<Vec<SimilarRow>> {
		self.suggest_similar(source, file_id, project_id, exclude_row_id, threshold, max_results).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	async fn seed_file(pool: &SqlitePool) -> FileId {
		sqlx::query("INSERT INTO offline_files (project_id, name, original_filename, format, source_language, sync_status) VALUES (1, 'f', 'f', 'json', 'en', 'local')")
			.execute(pool)
			.await
			.unwrap();
		FileId::new(sqlx::query("SELECT last_insert_rowid() AS id").fetch_one(pool).await.unwrap().get("id"))
	}

	#[tokio::test]
	async fn update_auto_advances_pending_to_translated() {
		let pool = offline_test_pool().await;
		let file_id = seed_file(&pool).await;
		let repo = OfflineRowRepository::new(pool);
		let row = repo
			.create(file_id, NewRow { row_num: 0, string_id: None, source: "hi".into(), target: String::new(), memo: None, status: RowStatus::Pending })
			.await
			.unwrap();
		let updated = repo.update(row.id, RowUpdate { target: Some("bonjour".into()), ..Default::default() }).await.unwrap();
		assert_eq!(updated.status, RowStatus::Translated);
	}

	#[tokio::test]
	async fn update_does_not_override_explicit_status() {
		let pool = offline_test_pool().await;
		let file_id = seed_file(&pool).await;
		let repo = OfflineRowRepository::new(pool);
		let row = repo
			.create(file_id, NewRow { row_num: 0, string_id: None, source: "hi".into(), target: String::new(), memo: None, status: RowStatus::Pending })
			.await
			.unwrap();
		let updated = repo
			.update(row.id, RowUpdate { target: Some("bonjour".into()), status: Some(RowStatus::Reviewed), ..Default::default() })
			.await
			.unwrap();
		assert_eq!(updated.status, RowStatus::Reviewed);
	}

	#[tokio::test]
	async fn update_on_synced_file_marks_row_modified_and_journals() {
		let pool = offline_test_pool().await;
		sqlx::query("UPDATE offline_files SET sync_status = 'synced' WHERE id = (SELECT max(id) FROM offline_files)").execute(&pool).await.ok();
		let file_id = seed_file(&pool).await;
		sqlx::query("UPDATE offline_files SET sync_status = 'synced' WHERE id = ?").bind(file_id.get()).execute(&pool).await.unwrap();
		let repo = OfflineRowRepository::new(pool);
		let row = repo
			.create(file_id, NewRow { row_num: 0, string_id: None, source: "hi".into(), target: "old".into(), memo: None, status: RowStatus::Translated })
			.await
			.unwrap();
		let updated = repo.update(row.id, RowUpdate { target: Some("new".into()), ..Default::default() }).await.unwrap();
		assert_eq!(updated.offline.sync_status, Some(ldm_types::SyncStatus::Modified));
		let history = repo.get_edit_history(row.id).await.unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].old_value.as_deref(), Some("old"));
		assert_eq!(history[0].new_value.as_deref(), Some("new"));

		let journaled: (String, i64, String, Option<String>, Option<String>, String) = sqlx::query_as(
			"SELECT entity_type, entity_id, field, old_value, new_value, sync_status FROM offline_local_changes WHERE entity_id = ?",
		)
		.bind(row.id.get())
		.fetch_one(&repo.pool)
		.await
		.unwrap();
		assert_eq!(journaled.0, "row");
		assert_eq!(journaled.1, row.id.get());
		assert_eq!(journaled.2, "target");
		assert_eq!(journaled.3.as_deref(), Some("old"));
		assert_eq!(journaled.4.as_deref(), Some("new"));
		assert_eq!(journaled.5, "pending");
	}

	#[tokio::test]
	async fn suggest_similar_is_empty_offline() {
		let pool = offline_test_pool().await;
		let repo = OfflineRowRepository::new(pool);
		let results = repo.suggest_similar("hello", None, None, None, 0.3, 10).await.unwrap();
		assert!(results.is_empty());
	}

	#[tokio::test]
	async fn bulk_create_updates_file_row_count() {
		let pool = offline_test_pool().await;
		let file_id = seed_file(&pool).await;
		let repo = OfflineRowRepository::new(pool.clone());
		repo.bulk_create(
			file_id,
			vec![
				NewRow { row_num: 0, string_id: None, source: "a".into(), target: String::new(), memo: None, status: RowStatus::Pending },
				NewRow { row_num: 1, string_id: None, source: "b".into(), target: String::new(), memo: None, status: RowStatus::Pending },
			],
		)
		.await
		.unwrap();
		let count: i64 = sqlx::query("SELECT row_count FROM offline_files WHERE id = ?").bind(file_id.get()).fetch_one(&pool).await.unwrap().get("row_count");
		assert_eq!(count, 2);
	}

	#[tokio::test]
	async fn create_and_bulk_create_allocate_negative_ids() {
		let pool = offline_test_pool().await;
		let file_id = seed_file(&pool).await;
		let repo = OfflineRowRepository::new(pool.clone());
		let row = repo
			.create(file_id, NewRow { row_num: 0, string_id: None, source: "a".into(), target: String::new(), memo: None, status: RowStatus::Pending })
			.await
			.unwrap();
		assert!(row.id.is_local());

		let bulk = repo
			.bulk_create(
				file_id,
				vec![
					NewRow { row_num: 1, string_id: None, source: "b".into(), target: String::new(), memo: None, status: RowStatus::Pending },
					NewRow { row_num: 2, string_id: None, source: "c".into(), target: String::new(), memo: None, status: RowStatus::Pending },
				],
			)
			.await
			.unwrap();
		assert!(bulk.iter().all(|r| r.id.is_local()));
		let mut ids: Vec<i64> = bulk.iter().map(|r| r.id.get()).collect();
		ids.sort_unstable();
		ids.dedup();
		assert_eq!(ids.len(), bulk.len(), "bulk-created rows get distinct ids");
	}
}
