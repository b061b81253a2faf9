// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! QAResultRepository (spec §4.4.7): QA flag CRUD with the
//! `qa_flag_count` reconciliation invariant centralized in one helper per
//! adapter, rather than relied on via triggers (spec §9 "QA counter
//! invariant" — SQLite has no portable trigger story shared with Postgres).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ldm_types::{FileId, LdmError, QaCheckType, QaResult, QaResultId, QaSeverity, Result, RowId, UserId};
use serde_json::Value as Json;
use sqlx::{PgPool, Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct NewQaResult {
	pub row_id: RowId,
	pub file_id: FileId,
	pub check_type: QaCheckType,
	pub severity: QaSeverity,
	pub message: String,
	pub details: Option<Json>,
}

#[derive(Debug, Clone, Default)]
pub struct QaSummary {
	pub total_unresolved: i64,
	pub by_check_type: Vec<(QaCheckType, i64)>,
	pub by_severity: Vec<(QaSeverity, i64)>,
}

#[async_trait]
pub trait QaResultStore: Send + Sync {
	async fn get(&self, id: QaResultId) -> Result<Option<QaResult>>;
	async fn get_for_row(&self, row_id: RowId) -> Result<Vec<QaResult>>;
	async fn get_for_file(&self, file_id: FileId, check_type: Option<QaCheckType>, include_resolved: bool) -> Result<Vec<QaResult>>;
	async fn get_summary(&self, file_id: FileId) -> Result<QaSummary>;
	async fn create(&self, entry: NewQaResult) -> Result<QaResult>;
	async fn bulk_create(&self, entries: Vec<NewQaResult>) -> Result<Vec<QaResult>>;
	async fn resolve(&self, id: QaResultId, resolved_by: UserId) -> Result<QaResult>;
	async fn delete_unresolved_for_row(&self, row_id: RowId) -> Result<i64>;
	async fn delete_for_file(&self, file_id: FileId) -> Result<i64>;
	async fn count_unresolved_for_row(&self, row_id: RowId) -> Result<i64>;
	async fn update_row_qa_count(&self, row_id: RowId) -> Result<i64>;
}

fn sqlite_row_to_qa(r: &sqlx::sqlite::SqliteRow) -> QaResult {
	QaResult {
		id: QaResultId::new(r.get("id")),
		row_id: RowId::new(r.get("row_id")),
		file_id: FileId::new(r.get("file_id")),
		check_type: r.get::<String, _>("check_type").parse().unwrap_or(QaCheckType::Pattern),
		severity: r.get::<String, _>("severity").parse().unwrap_or(QaSeverity::Warning),
		message: r.get("message"),
		details: r.get::<Option<String>, _>("details").and_then(|s| serde_json::from_str(&s).ok()),
		created_at: DateTime::parse_from_rfc3339(&r.get::<String, _>("created_at")).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now()),
		resolved_at: r.get::<Option<String>, _>("resolved_at").and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc)),
		resolved_by: r.get::<Option<i64>, _>("resolved_by").map(UserId::new),
	}
}

fn pg_row_to_qa(r: &sqlx::postgres::PgRow) -> QaResult {
	QaResult {
		id: QaResultId::new(r.get("id")),
		row_id: RowId::new(r.get("row_id")),
		file_id: FileId::new(r.get("file_id")),
		check_type: r.get::<String, _>("check_type").parse().unwrap_or(QaCheckType::Pattern),
		severity: r.get::<String, _>("severity").parse().unwrap_or(QaSeverity::Warning),
		message: r.get("message"),
		details: r.get("details"),
		created_at: r.get("created_at"),
		resolved_at: r.get("resolved_at"),
		resolved_by: r.get::<Option<i64>, _>("resolved_by").map(UserId::new),
	}
}

fn summarize(results: &[QaResult]) -> QaSummary {
	let mut summary = QaSummary::default();
	for r in results.iter().filter(|r| r.resolved_at.is_none()) {
		summary.total_unresolved += 1;
		match summary.by_check_type.iter_mut().find(|(t, _)| *t == r.check_type) {
			Some((_, n)) => *n += 1,
			None => summary.by_check_type.push((r.check_type, 1)),
		}
		match summary.by_severity.iter_mut().find(|(s, _)| *s == r.severity) {
			Some((_, n)) => *n += 1,
			None => summary.by_severity.push((r.severity, 1)),
		}
	}
	summary
}

const QA_COLUMNS: &str = "id, row_id, file_id, check_type, severity, message, details, created_at, resolved_at, resolved_by";

// ---------------------------------------------------------------------------
// Online (Postgres)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OnlineQaResultRepository {
	pool: PgPool,
}

impl OnlineQaResultRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: QaResultId) -> Result<Option<QaResult>> {
		let row = sqlx::query(&format!("SELECT {QA_COLUMNS} FROM ldm_qa_results WHERE id = $1")).bind(id.get()).fetch_optional(&self.pool).await?;
		Ok(row.as_ref().map(pg_row_to_qa))
	}

	pub async fn get_for_row(&self, row_id: RowId) -> Result<Vec<QaResult>> {
		let rows = sqlx::query(&format!("SELECT {QA_COLUMNS} FROM ldm_qa_results WHERE row_id = $1 ORDER BY id")).bind(row_id.get()).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(pg_row_to_qa).collect())
	}

	pub async fn get_for_file(&self, file_id: FileId, check_type: Option<QaCheckType>, include_resolved: bool) -> Result<Vec<QaResult>> {
		let rows = sqlx::query(&format!(
			"SELECT {QA_COLUMNS} FROM ldm_qa_results WHERE file_id = $1 AND ($2::text IS NULL OR check_type = $2) AND ($3 OR resolved_at IS NULL) ORDER BY id"
		))
		.bind(file_id.get())
		.bind(check_type.map(|c| c.to_string()))
		.bind(include_resolved)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(pg_row_to_qa).collect())
	}

	pub async fn get_summary(&self, file_id: FileId) -> Result<QaSummary> {
		Ok(summarize(&self.get_for_file(file_id, None, true).await?))
	}

	#[tracing::instrument(skip(self, entry), fields(row_id = %entry.row_id))]
	pub async fn create(&self, entry: NewQaResult) -> Result<QaResult> {
		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&format!(
			"INSERT INTO ldm_qa_results (row_id, file_id, check_type, severity, message, details, created_at) VALUES ($1, $2, $3, $4, $5, $6, now()) RETURNING {QA_COLUMNS}"
		))
		.bind(entry.row_id.get())
		.bind(entry.file_id.get())
		.bind(entry.check_type.to_string())
		.bind(entry.severity.to_string())
		.bind(&entry.message)
		.bind(&entry.details)
		.fetch_one(&mut *tx)
		.await?;
		reconcile_tx_pg(&mut tx, entry.row_id).await?;
		tx.commit().await?;
		Ok(pg_row_to_qa(&row))
	}

	#[tracing::instrument(skip(self, entries), fields(n = entries.len()))]
	pub async fn bulk_create(&self, entries: Vec<NewQaResult>) -> Result<Vec<QaResult>> {
		let mut tx = self.pool.begin().await?;
		let mut out = Vec::with_capacity(entries.len());
		let mut touched_rows: Vec<RowId> = Vec::new();
		for entry in entries {
			let row = sqlx::query(&format!(
				"INSERT INTO ldm_qa_results (row_id, file_id, check_type, severity, message, details, created_at) VALUES ($1, $2, $3, $4, $5, $6, now()) RETURNING {QA_COLUMNS}"
			))
			.bind(entry.row_id.get())
			.bind(entry.file_id.get())
			.bind(entry.check_type.to_string())
			.bind(entry.severity.to_string())
			.bind(&entry.message)
			.bind(&entry.details)
			.fetch_one(&mut *tx)
			.await?;
			if !touched_rows.contains(&entry.row_id) {
				touched_rows.push(entry.row_id);
			}
			out.push(pg_row_to_qa(&row));
		}
		for row_id in touched_rows {
			reconcile_tx_pg(&mut tx, row_id).await?;
		}
		tx.commit().await?;
		Ok(out)
	}

	#[tracing::instrument(skip(self), fields(qa_id = %id))]
	pub async fn resolve(&self, id: QaResultId, resolved_by: UserId) -> Result<QaResult> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("qa result {id}")))?;
		if current.resolved_at.is_some() {
			return Ok(current);
		}
		let mut tx = self.pool.begin().await?;
		let row = sqlx::query(&format!("UPDATE ldm_qa_results SET resolved_at = now(), resolved_by = $1 WHERE id = $2 RETURNING {QA_COLUMNS}"))
			.bind(resolved_by.get())
			.bind(id.get())
			.fetch_one(&mut *tx)
			.await?;
		reconcile_tx_pg(&mut tx, current.row_id).await?;
		tx.commit().await?;
		Ok(pg_row_to_qa(&row))
	}

	#[tracing::instrument(skip(self), fields(row_id = %row_id))]
	pub async fn delete_unresolved_for_row(&self, row_id: RowId) -> Result<i64> {
		let mut tx = self.pool.begin().await?;
		let result = sqlx::query("DELETE FROM ldm_qa_results WHERE row_id = $1 AND resolved_at IS NULL").bind(row_id.get()).execute(&mut *tx).await?;
		reconcile_tx_pg(&mut tx, row_id).await?;
		tx.commit().await?;
		Ok(result.rows_affected() as i64)
	}

	#[tracing::instrument(skip(self), fields(file_id = %file_id))]
	pub async fn delete_for_file(&self, file_id: FileId) -> Result<i64> {
		let mut tx = self.pool.begin().await?;
		let row_ids: Vec<i64> = sqlx::query("SELECT DISTINCT row_id FROM ldm_qa_results WHERE file_id = $1").bind(file_id.get()).fetch_all(&mut *tx).await?.iter().map(|r| r.get("row_id")).collect();
		let result = sqlx::query("DELETE FROM ldm_qa_results WHERE file_id = $1").bind(file_id.get()).execute(&mut *tx).await?;
		for row_id in row_ids {
			reconcile_tx_pg(&mut tx, RowId::new(row_id)).await?;
		}
		tx.commit().await?;
		Ok(result.rows_affected() as i64)
	}

	pub async fn count_unresolved_for_row(&self, row_id: RowId) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM ldm_qa_results WHERE row_id = $1 AND resolved_at IS NULL").bind(row_id.get()).fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}

	pub async fn update_row_qa_count(&self, row_id: RowId) -> Result<i64> {
		let mut tx = self.pool.begin().await?;
		let n = reconcile_tx_pg(&mut tx, row_id).await?;
		tx.commit().await?;
		Ok(n)
	}
}

async fn reconcile_tx_pg(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, row_id: RowId) -> Result<i64> {
	let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM ldm_qa_results WHERE row_id = $1 AND resolved_at IS NULL").bind(row_id.get()).fetch_one(&mut **tx).await?.get("n");
	sqlx::query("UPDATE ldm_rows SET qa_flag_count = $1 WHERE id = $2").bind(count).bind(row_id.get()).execute(&mut **tx).await?;
	Ok(count)
}

#[async_trait]
impl QaResultStore for OnlineQaResultRepository {
	async fn get(&self, id: QaResultId) -> Result<Option<QaResult>> {
		self.get(id).await
	}
	async fn get_for_row(&self, row_id: RowId) -> Result<Vec<QaResult>> {
		self.get_for_row(row_id).await
	}
	async fn get_for_file(&self, file_id: FileId, check_type: Option<QaCheckType>, include_resolved: bool) -> Result<Vec<QaResult>> {
		self.get_for_file(file_id, check_type, include_resolved).await
	}
	async fn get_summary(&self, file_id: FileId) -> Result<QaSummary> {
		self.get_summary(file_id).await
	}
	async fn create(&self, entry: NewQaResult) -> Result<QaResult> {
		self.create(entry).await
	}
	async fn bulk_create(&self, entries: Vec<NewQaResult>) -> Result<Vec<QaResult>> {
		self.bulk_create(entries).await
	}
	async fn resolve(&self, id: QaResultId, resolved_by: UserId) -> Result<QaResult> {
		self.resolve(id, resolved_by).await
	}
	async fn delete_unresolved_for_row(&self, row_id: RowId) -> Result<i64> {
		self.delete_unresolved_for_row(row_id).await
	}
	async fn delete_for_file(&self, file_id: FileId) -> Result<i64> {
		self.delete_for_file(file_id).await
	}
	async fn count_unresolved_for_row(&self, row_id: RowId) -> Result<i64> {
		self.count_unresolved_for_row(row_id).await
	}
	async fn update_row_qa_count(&self, row_id: RowId) -> Result<i64> {
		self.update_row_qa_count(row_id).await
	}
}

// ---------------------------------------------------------------------------
// Offline (SQLite)
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OfflineQaResultRepository {
	pool: SqlitePool,
}

impl OfflineQaResultRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, id: QaResultId) -> Result<Option<QaResult>> {
		let row = sqlx::query(&format!("SELECT {QA_COLUMNS} FROM offline_qa_results WHERE id = ?")).bind(id.get()).fetch_optional(&self.pool).await?;
		Ok(row.as_ref().map(sqlite_row_to_qa))
	}

	pub async fn get_for_row(&self, row_id: RowId) -> Result<Vec<QaResult>> {
		let rows = sqlx::query(&format!("SELECT {QA_COLUMNS} FROM offline_qa_results WHERE row_id = ? ORDER BY id")).bind(row_id.get()).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(sqlite_row_to_qa).collect())
	}

	pub async fn get_for_file(&self, file_id: FileId, check_type: Option<QaCheckType>, include_resolved: bool) -> Result<Vec<QaResult>> {
		let rows = sqlx::query(&format!(
			"SELECT {QA_COLUMNS} FROM offline_qa_results WHERE file_id = ? AND (? IS NULL OR check_type = ?) AND (? OR resolved_at IS NULL) ORDER BY id"
		))
		.bind(file_id.get())
		.bind(check_type.map(|c| c.to_string()))
		.bind(check_type.map(|c| c.to_string()))
		.bind(include_resolved)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(sqlite_row_to_qa).collect())
	}

	pub async fn get_summary(&self, file_id: FileId) -> Result<QaSummary> {
		Ok(summarize(&self.get_for_file(file_id, None, true).await?))
	}

	#[tracing::instrument(skip(self, entry), fields(row_id = %entry.row_id))]
	pub async fn create(&self, entry: NewQaResult) -> Result<QaResult> {
		let mut tx = self.pool.begin().await?;
		let details = entry.details.as_ref().map(|d| d.to_string());
		let result = sqlx::query("INSERT INTO offline_qa_results (row_id, file_id, check_type, severity, message, details, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
			.bind(entry.row_id.get())
			.bind(entry.file_id.get())
			.bind(entry.check_type.to_string())
			.bind(entry.severity.to_string())
			.bind(&entry.message)
			.bind(&details)
			.bind(Utc::now().to_rfc3339())
			.execute(&mut *tx)
			.await?;
		reconcile_tx_sqlite(&mut tx, entry.row_id).await?;
		tx.commit().await?;
		self.get(QaResultId::new(result.last_insert_rowid())).await?.ok_or_else(|| LdmError::NotFound("just-inserted qa result".into()))
	}

	#[tracing::instrument(skip(self, entries), fields(n = entries.len()))]
	pub async fn bulk_create(&self, entries: Vec<NewQaResult>) -> Result<Vec<QaResult>> {
		let mut tx = self.pool.begin().await?;
		let mut ids = Vec::with_capacity(entries.len());
		let mut touched_rows: Vec<RowId> = Vec::new();
		let now = Utc::now().to_rfc3339();
		for entry in &entries {
			let details = entry.details.as_ref().map(|d| d.to_string());
			let result = sqlx::query("INSERT INTO offline_qa_results (row_id, file_id, check_type, severity, message, details, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
				.bind(entry.row_id.get())
				.bind(entry.file_id.get())
				.bind(entry.check_type.to_string())
				.bind(entry.severity.to_string())
				.bind(&entry.message)
				.bind(&details)
				.bind(&now)
				.execute(&mut *tx)
				.await?;
			ids.push(result.last_insert_rowid());
			if !touched_rows.contains(&entry.row_id) {
				touched_rows.push(entry.row_id);
			}
		}
		for row_id in touched_rows {
			reconcile_tx_sqlite(&mut tx, row_id).await?;
		}
		tx.commit().await?;
		let mut out = Vec::with_capacity(ids.len());
		for id in ids {
			out.push(self.get(QaResultId::new(id)).await?.ok_or_else(|| LdmError::NotFound("just-inserted qa result".into()))?);
		}
		Ok(out)
	}

	#[tracing::instrument(skip(self), fields(qa_id = %id))]
	pub async fn resolve(&self, id: QaResultId, resolved_by: UserId) -> Result<QaResult> {
		let current = self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("qa result {id}")))?;
		if current.resolved_at.is_some() {
			return Ok(current);
		}
		let mut tx = self.pool.begin().await?;
		sqlx::query("UPDATE offline_qa_results SET resolved_at = ?, resolved_by = ? WHERE id = ?").bind(Utc::now().to_rfc3339()).bind(resolved_by.get()).bind(id.get()).execute(&mut *tx).await?;
		reconcile_tx_sqlite(&mut tx, current.row_id).await?;
		tx.commit().await?;
		self.get(id).await?.ok_or_else(|| LdmError::NotFound(format!("qa result {id}")))
	}

	#[tracing::instrument(skip(self), fields(row_id = %row_id))]
	pub async fn delete_unresolved_for_row(&self, row_id: RowId) -> Result<i64> {
		let mut tx = self.pool.begin().await?;
		let result = sqlx::query("DELETE FROM offline_qa_results WHERE row_id = ? AND resolved_at IS NULL").bind(row_id.get()).execute(&mut *tx).await?;
		reconcile_tx_sqlite(&mut tx, row_id).await?;
		tx.commit().await?;
		Ok(result.rows_affected() as i64)
	}

	#[tracing::instrument(skip(self), fields(file_id = %file_id))]
	pub async fn delete_for_file(&self, file_id: FileId) -> Result<i64> {
		let mut tx = self.pool.begin().await?;
		let row_ids: Vec<i64> = sqlx::query("SELECT DISTINCT row_id FROM offline_qa_results WHERE file_id = ?").bind(file_id.get()).fetch_all(&mut *tx).await?.iter().map(|r| r.get("row_id")).collect();
		let result = sqlx::query("DELETE FROM offline_qa_results WHERE file_id = ?").bind(file_id.get()).execute(&mut *tx).await?;
		for row_id in row_ids {
			reconcile_tx_sqlite(&mut tx, RowId::new(row_id)).await?;
		}
		tx.commit().await?;
		Ok(result.rows_affected() as i64)
	}

	pub async fn count_unresolved_for_row(&self, row_id: RowId) -> Result<i64> {
		let row = sqlx::query("SELECT COUNT(*) AS n FROM offline_qa_results WHERE row_id = ? AND resolved_at IS NULL").bind(row_id.get()).fetch_one(&self.pool).await?;
		Ok(row.get("n"))
	}

	pub async fn update_row_qa_count(&self, row_id: RowId) -> Result<i64> {
		let mut tx = self.pool.begin().await?;
		let n = reconcile_tx_sqlite(&mut tx, row_id).await?;
		tx.commit().await?;
		Ok(n)
	}
}

async fn reconcile_tx_sqlite(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, row_id: RowId) -> Result<i64> {
	let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM offline_qa_results WHERE row_id = ? AND resolved_at IS NULL").bind(row_id.get()).fetch_one(&mut **tx).await?.get("n");
	sqlx::query("UPDATE offline_rows SET qa_flag_count = ? WHERE id = ?").bind(count).bind(row_id.get()).execute(&mut **tx).await?;
	Ok(count)
}

#[async_trait]
impl QaResultStore for OfflineQaResultRepository {
	async fn get(&self, id: QaResultId) -> Result<Option<QaResult>> {
		self.get(id).await
	}
	async fn get_for_row(&self, row_id: RowId) -> Result<Vec<QaResult>> {
		self.get_for_row(row_id).await
	}
	async fn get_for_file(&self, file_id: FileId, check_type: Option<QaCheckType>, include_resolved: bool) -> Result<Vec<QaResult>> {
		self.get_for_file(file_id, check_type, include_resolved).await
	}
	async fn get_summary(&self, file_id: FileId) -> Result<QaSummary> {
		self.get_summary(file_id).await
	}
	async fn create(&self, entry: NewQaResult) -> Result<QaResult> {
		self.create(entry).await
	}
	async fn bulk_create(&self, entries: Vec<NewQaResult>) -> Result<Vec<QaResult>> {
		self.bulk_create(entries).await
	}
	async fn resolve(&self, id: QaResultId, resolved_by: UserId) -> Result<QaResult> {
		self.resolve(id, resolved_by).await
	}
	async fn delete_unresolved_for_row(&self, row_id: RowId) -> Result<i64> {
		self.delete_unresolved_for_row(row_id).await
	}
	async fn delete_for_file(&self, file_id: FileId) -> Result<i64> {
		self.delete_for_file(file_id).await
	}
	async fn count_unresolved_for_row(&self, row_id: RowId) -> Result<i64> {
		self.count_unresolved_for_row(row_id).await
	}
	async fn update_row_qa_count(&self, row_id: RowId) -> Result<i64> {
		self.update_row_qa_count(row_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::offline_test_pool;

	async fn seed_row(pool: &SqlitePool) -> (FileId, RowId) {
		sqlx::query("INSERT INTO offline_files (id, project_id, name, original_filename, format, source_language) VALUES (1, -1, 'f', 'f', 'json', 'en')").execute(pool).await.unwrap();
		sqlx::query("INSERT INTO offline_rows (id, file_id, row_num, source) VALUES (1, 1, 1, 'hi')").execute(pool).await.unwrap();
		(FileId::new(1), RowId::new(1))
	}

	#[tokio::test]
	async fn create_reconciles_row_qa_flag_count() {
		let pool = offline_test_pool().await;
		let (file_id, row_id) = seed_row(&pool).await;
		let repo = OfflineQaResultRepository::new(pool.clone());
		repo.create(NewQaResult { row_id, file_id, check_type: QaCheckType::Term, severity: QaSeverity::Warning, message: "bad term".into(), details: None }).await.unwrap();
		let count: i64 = sqlx::query("SELECT qa_flag_count FROM offline_rows WHERE id = ?").bind(row_id.get()).fetch_one(&pool).await.unwrap().get("qa_flag_count");
		assert_eq!(count, 1);
	}

	#[tokio::test]
	async fn resolve_is_a_no_op_on_an_already_resolved_result() {
		let pool = offline_test_pool().await;
		let (file_id, row_id) = seed_row(&pool).await;
		let repo = OfflineQaResultRepository::new(pool.clone());
		let created = repo.create(NewQaResult { row_id, file_id, check_type: QaCheckType::Pattern, severity: QaSeverity::Error, message: "m".into(), details: None }).await.unwrap();
		let first = repo.resolve(created.id, UserId::new(1)).await.unwrap();
		let second = repo.resolve(created.id, UserId::new(2)).await.unwrap();
		assert_eq!(first.resolved_by, second.resolved_by);
		let count: i64 = sqlx::query("SELECT qa_flag_count FROM offline_rows WHERE id = ?").bind(row_id.get()).fetch_one(&pool).await.unwrap().get("qa_flag_count");
		assert_eq!(count, 0);
	}

	#[tokio::test]
	async fn delete_unresolved_for_row_reconciles_to_zero() {
		let pool = offline_test_pool().await;
		let (file_id, row_id) = seed_row(&pool).await;
		let repo = OfflineQaResultRepository::new(pool.clone());
		repo.bulk_create(vec![
			NewQaResult { row_id, file_id, check_type: QaCheckType::Pattern, severity: QaSeverity::Error, message: "a".into(), details: None },
			NewQaResult { row_id, file_id, check_type: QaCheckType::Line, severity: QaSeverity::Warning, message: "b".into(), details: None },
		])
		.await
		.unwrap();
		assert_eq!(repo.count_unresolved_for_row(row_id).await.unwrap(), 2);
		let deleted = repo.delete_unresolved_for_row(row_id).await.unwrap();
		assert_eq!(deleted, 2);
		assert_eq!(repo.count_unresolved_for_row(row_id).await.unwrap(), 0);
	}
}
