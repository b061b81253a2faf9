// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Routing Row/File Repository (spec §4.5): a decorator that dispatches
//! each call to the Online or Offline adapter purely by the sign of the
//! relevant ID. No other component in the crate is allowed to branch on
//! ID sign (spec §9 "Routing-by-ID-sign") — this is the one place that
//! does.

use std::sync::Arc;

use async_trait::async_trait;
use ldm_types::{FileId, FolderId, ProjectId, Result, Row, RowId};

use crate::file::FileStore;
use crate::row::{NewRow, RowEditHistoryEntry, RowSearch, RowStore, RowUpdate, SimilarRow};

/// Wraps a primary adapter (Online, or Server-SQLite in a deployment
/// without a separate offline/online split) and the Offline adapter,
/// dispatching by the sign of the ID each call carries (spec §4.5).
pub struct RoutingRowRepository {
	primary: Arc<dyn RowStore>,
	offline: Arc<dyn RowStore>,
}

impl RoutingRowRepository {
	pub fn new(primary: Arc<dyn RowStore>, offline: Arc<dyn RowStore>) -> Self {
		Self { primary, offline }
	}

	fn for_id(&self, id: RowId) -> &Arc<dyn RowStore> {
		if id.is_local() {
			&self.offline
		} else {
			&self.primary
		}
	}

	fn for_file(&self, file_id: FileId) -> &Arc<dyn RowStore> {
		if file_id.is_local() {
			&self.offline
		} else {
			&self.primary
		}
	}
}

#[async_trait]
impl RowStore for RoutingRowRepository {
	async fn get(&self, id: RowId) -> Result<Option<Row>> {
		self.for_id(id).get(id).await
	}

	async fn get_with_file(&self, id: RowId) -> Result<Option<(Row, FileId)>> {
		self.for_id(id).get_with_file(id).await
	}

	async fn create(&self, file_id: FileId, row: NewRow) -> Result<Row> {
		self.for_file(file_id).create(file_id, row).await
	}

	async fn update(&self, id: RowId, update: RowUpdate) -> Result<Row> {
		self.for_id(id).update(id, update).await
	}

	async fn delete(&self, id: RowId) -> Result<bool> {
		self.for_id(id).delete(id).await
	}

	async fn bulk_create(&self, file_id: FileId, rows: Vec<NewRow>) -> Result<Vec<Row>> {
		self.for_file(file_id).bulk_create(file_id, rows).await
	}

	/// Partitions by ID sign and fans out to both adapters, summing the
	/// returned counts (spec §4.5, testable property 12 / scenario S4).
	async fn bulk_update(&self, updates: Vec<(RowId, RowUpdate)>) -> Result<i64> {
		let (online_updates, offline_updates): (Vec<_>, Vec<_>) = updates.into_iter().partition(|(id, _)| id.is_online());
		let mut total = 0;
		if !online_updates.is_empty() {
			total += self.primary.bulk_update(online_updates).await?;
		}
		if !offline_updates.is_empty() {
			total += self.offline.bulk_update(offline_updates).await?;
		}
		Ok(total)
	}

	async fn get_for_file(&self, file_id: FileId, page: i64, limit: i64, search: &RowSearch) -> Result<Vec<Row>> {
		self.for_file(file_id).get_for_file(file_id, page, limit, search).await
	}

	async fn count_for_file(&self, file_id: FileId, search: &RowSearch) -> Result<i64> {
		self.for_file(file_id).count_for_file(file_id, search).await
	}

	async fn add_edit_history(&self, row_id: RowId, field: &str, old_value: Option<&str>, new_value: Option<&str>, edited_by: Option<i64>) -> Result<()> {
		self.for_id(row_id).add_edit_history(row_id, field, old_value, new_value, edited_by).await
	}

	async fn get_edit_history(&self, row_id: RowId) -> Result<Vec<RowEditHistoryEntry>> {
		self.for_id(row_id).get_edit_history(row_id).await
	}

	/// Negative `file_id` always returns empty rather than asking the
	/// offline adapter for its own (also-empty) answer, per spec §4.5
	/// verbatim: "negative always returns empty".
	async fn suggest_similar(&self, source: &str, file_id: Option<FileId>, project_id: Option<i64>, exclude_row_id: Option<RowId>, threshold: f32, max_results: i64) -> Result<Vec<SimilarRow>> {
		if let Some(file_id) = file_id {
			if file_id.is_local() {
				return Ok(Vec::new());
			}
		}
		self.primary.suggest_similar(source, file_id, project_id, exclude_row_id, threshold, max_results).await
	}
}

/// The File-side counterpart the factory composes alongside the Row
/// routing repository (spec §4.6: "For the Row and File repositories the
/// factory additionally wraps the primary adapter with the Routing Row
/// Repository").
pub struct RoutingFileRepository {
	primary: Arc<dyn FileStore>,
	offline: Arc<dyn FileStore>,
}

impl RoutingFileRepository {
	pub fn new(primary: Arc<dyn FileStore>, offline: Arc<dyn FileStore>) -> Self {
		Self { primary, offline }
	}

	fn for_id(&self, id: FileId) -> &Arc<dyn FileStore> {
		if id.is_local() {
			&self.offline
		} else {
			&self.primary
		}
	}

	fn for_project(&self, project_id: ProjectId) -> &Arc<dyn FileStore> {
		if project_id.is_local() {
			&self.offline
		} else {
			&self.primary
		}
	}
}

#[async_trait]
impl FileStore for RoutingFileRepository {
	async fn get(&self, id: FileId) -> Result<Option<ldm_types::File>> {
		self.for_id(id).get(id).await
	}

	async fn get_all(&self, project_id: ProjectId, folder_id: Option<FolderId>) -> Result<Vec<ldm_types::File>> {
		self.for_project(project_id).get_all(project_id, folder_id).await
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
	) -> Result<ldm_types::File> {
		self.for_project(project_id).create(project_id, folder_id, name, original_filename, format, source_language, target_language).await
	}

	async fn rename(&self, id: FileId, name: &str) -> Result<ldm_types::File> {
		self.for_id(id).rename(id, name).await
	}

	async fn r#move(&self, id: FileId, new_folder_id: Option<FolderId>) -> Result<ldm_types::File> {
		self.for_id(id).r#move(id, new_folder_id).await
	}

	async fn move_cross_project(&self, id: FileId, target_project: ProjectId, target_folder: Option<FolderId>) -> Result<ldm_types::File> {
		self.for_id(id).move_cross_project(id, target_project, target_folder).await
	}

	async fn delete(&self, id: FileId) -> Result<bool> {
		self.for_id(id).delete(id).await
	}

	async fn recount_rows(&self, id: FileId) -> Result<i64> {
		self.for_id(id).recount_rows(id).await
	}

	async fn mark_downloaded(&self, id: FileId, server_id: i64, server_project_id: i64, server_folder_id: Option<i64>) -> Result<ldm_types::File> {
		self.for_id(id).mark_downloaded(id, server_id, server_project_id, server_folder_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::row::OfflineRowRepository;
	use crate::testing::{create_test_pool, offline_test_pool};

	async fn seed_file(pool: &sqlx::SqlitePool, id: i64) {
		sqlx::query("INSERT INTO offline_files (id, project_id, name, original_filename, format, source_language) VALUES (?, -1, 'f', 'f', 'json', 'en')").bind(id).execute(pool).await.unwrap();
	}

	/// Testable property 10 (spec §8): a negative row ID must never touch
	/// the "primary" leg. Two distinct backing pools make cross-
	/// contamination observable instead of merely asserted.
	#[tokio::test]
	async fn negative_row_id_never_reaches_the_primary_adapter() {
		let primary_pool = create_test_pool().await;
		crate::testing::create_offline_schema(&primary_pool).await;
		seed_file(&primary_pool, 1).await;
		let offline_pool = offline_test_pool().await;
		seed_file(&offline_pool, 1).await;
		sqlx::query("INSERT INTO offline_rows (id, file_id, row_num, source) VALUES (-5, 1, 1, 'hola')").execute(&offline_pool).await.unwrap();

		let primary: Arc<dyn RowStore> = Arc::new(OfflineRowRepository::new(primary_pool));
		let offline: Arc<dyn RowStore> = Arc::new(OfflineRowRepository::new(offline_pool));
		let routing = RoutingRowRepository::new(primary, offline);

		let row = routing.get(RowId::new(-5)).await.unwrap().expect("row -5 must resolve via the offline leg");
		assert_eq!(row.source, "hola");
	}

	#[tokio::test]
	async fn bulk_update_sums_counts_across_both_legs_scenario_s4() {
		let primary_pool = create_test_pool().await;
		crate::testing::create_offline_schema(&primary_pool).await;
		seed_file(&primary_pool, 1).await;
		sqlx::query("INSERT INTO offline_rows (id, file_id, row_num, source) VALUES (5, 1, 1, 'a'), (6, 1, 2, 'b')").execute(&primary_pool).await.unwrap();
		let offline_pool = offline_test_pool().await;
		seed_file(&offline_pool, 1).await;
		sqlx::query("INSERT INTO offline_rows (id, file_id, row_num, source) VALUES (-123, 1, 1, 'c'), (-124, 1, 2, 'd')").execute(&offline_pool).await.unwrap();

		let primary: Arc<dyn RowStore> = Arc::new(OfflineRowRepository::new(primary_pool));
		let offline: Arc<dyn RowStore> = Arc::new(OfflineRowRepository::new(offline_pool));
		let routing = RoutingRowRepository::new(primary, offline);

		let updated = routing
			.bulk_update(vec![
				(RowId::new(5), RowUpdate { status: Some(ldm_types::RowStatus::Translated), ..Default::default() }),
				(RowId::new(-123), RowUpdate { target: Some("x".into()), ..Default::default() }),
				(RowId::new(6), RowUpdate { status: Some(ldm_types::RowStatus::Translated), ..Default::default() }),
				(RowId::new(-124), RowUpdate { status: Some(ldm_types::RowStatus::Reviewed), ..Default::default() }),
			])
			.await
			.unwrap();

		assert_eq!(updated, 4);
	}
}
