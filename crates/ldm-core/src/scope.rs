// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scope & Inheritance Resolver (spec §2, §4.5): the file-scoped
//! Translation Memory lookup order — folder scope first, then project,
//! then platform. The ordering itself already lives in
//! `TmStore::get_active_for_file` (`ldm-db/src/tm.rs`); this gives the
//! resolver its own named seam per the component list rather than having
//! callers reach into `ldm-db` directly, and is where cross-cutting
//! concerns (caching, event emission) would be layered in without
//! touching the per-backend adapters.

use std::sync::Arc;

use ldm_db::tm::TmStore;
use ldm_types::{ActiveTm, FileId, Result};

pub struct ScopeResolver {
	tm_store: Arc<dyn TmStore>,
}

impl ScopeResolver {
	pub fn new(tm_store: Arc<dyn TmStore>) -> Self {
		Self { tm_store }
	}

	/// Translation Memories active for `file_id`, ordered folder, project,
	/// platform (spec §8 scenario S3).
	#[tracing::instrument(skip(self), fields(file_id = %file_id))]
	pub async fn active_tms_for_file(&self, file_id: FileId) -> Result<Vec<ActiveTm>> {
		self.tm_store.get_active_for_file(file_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use ldm_types::{ActiveTm, FolderId, LdmError, PlatformId, ProjectId, ScopeKind, ScopeTarget, Tm, TmAssignment, TmId, TmMode, TmStatus};

	struct FakeTmStore;

	#[async_trait]
	impl TmStore for FakeTmStore {
		async fn get(&self, _id: TmId) -> Result<Option<Tm>> {
			unimplemented!()
		}
		async fn get_all(&self) -> Result<Vec<Tm>> {
			unimplemented!()
		}
		async fn create(&self, _name: &str, _source_lang: &str, _target_lang: &str, _owner_id: Option<ldm_types::UserId>) -> Result<Tm> {
			unimplemented!()
		}
		async fn delete(&self, _id: TmId) -> Result<bool> {
			unimplemented!()
		}
		async fn assign(&self, _tm_id: TmId, _target: ScopeTarget) -> Result<()> {
			unimplemented!()
		}
		async fn unassign(&self, _tm_id: TmId) -> Result<()> {
			unimplemented!()
		}
		async fn activate(&self, _tm_id: TmId) -> Result<()> {
			unimplemented!()
		}
		async fn deactivate(&self, _tm_id: TmId) -> Result<()> {
			unimplemented!()
		}
		async fn get_assignment(&self, _tm_id: TmId) -> Result<Option<TmAssignment>> {
			unimplemented!()
		}
		async fn get_for_scope(&self, _platform_id: Option<PlatformId>, _project_id: Option<ProjectId>, _folder_id: Option<FolderId>, _include_inactive: bool) -> Result<Vec<Tm>> {
			unimplemented!()
		}
		async fn get_active_for_file(&self, file_id: FileId) -> Result<Vec<ActiveTm>> {
			let _ = file_id;
			let stub = |n: i64, scope: ScopeKind| ActiveTm {
				tm: Tm {
					id: TmId::new(n),
					name: format!("tm-{n}"),
					description: None,
					owner_id: None,
					source_lang: "en".into(),
					target_lang: "fr".into(),
					entry_count: 0,
					mode: TmMode::Standard,
					status: TmStatus::Ready,
					indexed_at: None,
				},
				scope,
			};
			Ok(vec![stub(1, ScopeKind::Folder), stub(2, ScopeKind::Project), stub(3, ScopeKind::Platform)])
		}
		async fn link_to_project(&self, _tm_id: TmId, _project_id: ProjectId, _priority: i32) -> Result<()> {
			unimplemented!()
		}
		async fn unlink_from_project(&self, _tm_id: TmId, _project_id: ProjectId) -> Result<()> {
			unimplemented!()
		}
		async fn get_linked_for_project(&self, _project_id: ProjectId) -> Result<Option<Tm>> {
			unimplemented!()
		}
		async fn get_all_linked_for_project(&self, _project_id: ProjectId) -> Result<Vec<ldm_types::TmProjectLink>> {
			unimplemented!()
		}
		async fn add_entry(&self, _tm_id: TmId, _source: &str, _target: &str, _string_id: Option<&str>, _created_by: Option<ldm_types::UserId>) -> Result<ldm_types::TmEntry> {
			unimplemented!()
		}
		async fn add_entries_bulk(&self, _tm_id: TmId, _entries: Vec<ldm_db::tm::NewTmEntry>) -> Result<i64> {
			unimplemented!()
		}
		async fn get_entries(&self, _tm_id: TmId, _offset: i64, _limit: i64) -> Result<Vec<ldm_types::TmEntry>> {
			unimplemented!()
		}
		async fn get_all_entries(&self, _tm_id: TmId) -> Result<Vec<ldm_types::TmEntry>> {
			unimplemented!()
		}
		async fn search_entries(&self, _tm_id: TmId, _query: &str, _limit: i64) -> Result<Vec<ldm_db::tm::TmSearchHit>> {
			unimplemented!()
		}
		async fn delete_entry(&self, _id: ldm_types::TmEntryId) -> Result<bool> {
			unimplemented!()
		}
		async fn update_entry(&self, _id: ldm_types::TmEntryId, _target_text: Option<&str>, _string_id: Option<&str>) -> Result<ldm_types::TmEntry> {
			unimplemented!()
		}
		async fn confirm_entry(&self, _id: ldm_types::TmEntryId, _confirmed_by: ldm_types::UserId) -> Result<ldm_types::TmEntry> {
			unimplemented!()
		}
		async fn bulk_confirm_entries(&self, _ids: Vec<ldm_types::TmEntryId>, _confirmed_by: ldm_types::UserId) -> Result<i64> {
			unimplemented!()
		}
		async fn get_glossary_terms(&self, _tm_ids: Vec<TmId>, _max_source_length: i64, _limit: i64) -> Result<Vec<ldm_types::TmEntry>> {
			unimplemented!()
		}
		async fn get_indexes(&self, _tm_id: TmId) -> Result<Vec<ldm_db::tm::TmIndexInfo>> {
			unimplemented!()
		}
		async fn count_entries(&self, _tm_id: TmId) -> Result<i64> {
			unimplemented!()
		}
		async fn search_exact(&self, _tm_id: TmId, _source: &str) -> Result<Option<ldm_types::TmEntry>> {
			unimplemented!()
		}
		async fn search_similar(&self, _tm_id: TmId, _source: &str, _threshold: f32, _max_results: i64) -> Result<Vec<ldm_db::tm::TmSearchHit>> {
			unimplemented!()
		}
		async fn get_tree(&self) -> Result<ldm_db::tm::TmTree> {
			unimplemented!()
		}
	}

	#[tokio::test]
	async fn resolver_preserves_folder_project_platform_order_scenario_s3() {
		let resolver = ScopeResolver::new(Arc::new(FakeTmStore));
		let active = resolver.active_tms_for_file(FileId::new(1)).await.unwrap();
		let scopes: Vec<ScopeKind> = active.iter().map(|a| a.scope).collect();
		assert_eq!(scopes, vec![ScopeKind::Folder, ScopeKind::Project, ScopeKind::Platform]);
	}

	#[allow(dead_code)]
	fn unused(_: LdmError) {}
}
