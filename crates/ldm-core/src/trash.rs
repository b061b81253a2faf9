// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Trash / Restore Coordinator (spec §2, §4.7, §6, §8 scenario S2): the
//! recursive serialize-into-trash and restore-from-trash walk over
//! Platform/Project/Folder/File/Row that `TrashStore` itself deliberately
//! leaves to the cross-entity layer.
//!
//! Folder serialization and restoration use an explicit work stack rather
//! than native recursion (spec §9 "Recursion"), capped at
//! [`MAX_TREE_DEPTH`]. The Naming Service only runs against the entity
//! named directly by the trash record being restored — nested
//! files/folders keep their original names even if that now collides
//! with a sibling (spec §9 "Soft delete").

use std::collections::HashSet;
use std::sync::Arc;

use ldm_db::capability::CapabilityStore;
use ldm_db::file::FileStore;
use ldm_db::folder::FolderStore;
use ldm_db::naming::{generate_unique_name, NameExistsCheck};
use ldm_db::platform::PlatformStore;
use ldm_db::project::ProjectStore;
use ldm_db::row::{RowSearch, RowStore};
use ldm_db::trash::TrashStore;
use ldm_types::{
	CapabilityName, File, FileId, Folder, FolderId, LdmError, Platform, PlatformId, Project, ProjectId, Result, Row, Trash, TrashId, TrashItemType, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Folder trees deeper than this are rejected rather than walked (spec §9).
pub const MAX_TREE_DEPTH: usize = 256;

/// Default trash retention, in days (spec §4.4.8 "Default retention: 30
/// days").
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePayload {
	pub file: File,
	pub rows: Vec<Row>,
}

/// Byte-exact shape spec'd in §6: `subfolders` is omitted entirely for a
/// leaf folder rather than serialized as an empty array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderPayload {
	pub folder: Folder,
	pub files: Vec<FilePayload>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub subfolders: Vec<FolderPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectPayload {
	pub project: Project,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub files: Vec<FilePayload>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub folders: Vec<FolderPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformPayload {
	pub platform: Platform,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub projects: Vec<ProjectPayload>,
}

/// Matches names case-insensitively against a fixed set fetched once up
/// front — used to drive [`generate_unique_name`] for entities (folders,
/// files) that have no dedicated `check_name_exists` on their store.
struct StaticNameSet(HashSet<String>);

#[async_trait::async_trait]
impl NameExistsCheck for StaticNameSet {
	async fn name_exists(&self, candidate: &str, _exclude_id: Option<i64>) -> Result<bool> {
		Ok(self.0.contains(&candidate.to_lowercase()))
	}
}

struct ProjectNameChecker<'a> {
	store: &'a dyn ProjectStore,
	platform_id: Option<PlatformId>,
}

#[async_trait::async_trait]
impl NameExistsCheck for ProjectNameChecker<'_> {
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool> {
		self.store.check_name_exists(candidate, self.platform_id, exclude_id.map(ProjectId::new)).await
	}
}

struct PlatformNameChecker<'a> {
	store: &'a dyn PlatformStore,
}

#[async_trait::async_trait]
impl NameExistsCheck for PlatformNameChecker<'_> {
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool> {
		self.store.check_name_exists(candidate, exclude_id.map(PlatformId::new)).await
	}
}

/// Postorder (children before parent) flattening of a folder tree using an
/// explicit stack, for deletion order.
fn flatten_postorder(root: &FolderPayload) -> Vec<&FolderPayload> {
	let mut stack = vec![(root, false)];
	let mut order = Vec::new();
	while let Some((node, expanded)) = stack.pop() {
		if expanded {
			order.push(node);
		} else {
			stack.push((node, true));
			for sub in &node.subfolders {
				stack.push((sub, false));
			}
		}
	}
	order
}

pub struct TrashCoordinator {
	platform_store: Arc<dyn PlatformStore>,
	project_store: Arc<dyn ProjectStore>,
	folder_store: Arc<dyn FolderStore>,
	file_store: Arc<dyn FileStore>,
	row_store: Arc<dyn RowStore>,
	trash_store: Arc<dyn TrashStore>,
	capability_store: Arc<dyn CapabilityStore>,
	retention_days: i64,
}

impl TrashCoordinator {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		platform_store: Arc<dyn PlatformStore>,
		project_store: Arc<dyn ProjectStore>,
		folder_store: Arc<dyn FolderStore>,
		file_store: Arc<dyn FileStore>,
		row_store: Arc<dyn RowStore>,
		trash_store: Arc<dyn TrashStore>,
		capability_store: Arc<dyn CapabilityStore>,
	) -> Self {
		Self::with_retention_days(platform_store, project_store, folder_store, file_store, row_store, trash_store, capability_store, DEFAULT_RETENTION_DAYS)
	}

	/// Same as [`Self::new`] but with the retention window driven by
	/// `DatabaseConfig::trash_retention_days` rather than the spec default.
	#[allow(clippy::too_many_arguments)]
	pub fn with_retention_days(
		platform_store: Arc<dyn PlatformStore>,
		project_store: Arc<dyn ProjectStore>,
		folder_store: Arc<dyn FolderStore>,
		file_store: Arc<dyn FileStore>,
		row_store: Arc<dyn RowStore>,
		trash_store: Arc<dyn TrashStore>,
		capability_store: Arc<dyn CapabilityStore>,
		retention_days: i64,
	) -> Self {
		Self { platform_store, project_store, folder_store, file_store, row_store, trash_store, capability_store, retention_days }
	}

	async fn fetch_file_payload(&self, file_id: FileId) -> Result<FilePayload> {
		let file = self.file_store.get(file_id).await?.ok_or_else(|| LdmError::NotFound(format!("file {}", file_id.get())))?;
		let rows = self.row_store.get_for_file(file_id, 0, i64::MAX / 2, &RowSearch::default()).await?;
		Ok(FilePayload { file, rows })
	}

	/// Collects a folder's full subtree via an explicit work stack,
	/// honoring [`MAX_TREE_DEPTH`], instead of recursing.
	async fn collect_folder_subtree(&self, root: FolderId) -> Result<FolderPayload> {
		struct Frame {
			folder: Folder,
			file_ids: Vec<FileId>,
			child_ids: Vec<FolderId>,
		}

		let mut to_visit = vec![(root, 0usize)];
		let mut frames: Vec<(usize, Frame)> = Vec::new();
		while let Some((folder_id, depth)) = to_visit.pop() {
			if depth > MAX_TREE_DEPTH {
				return Err(LdmError::IntegrityViolation(format!("folder subtree exceeds max depth {MAX_TREE_DEPTH}")));
			}
			let folder = self.folder_store.get(folder_id).await?.ok_or_else(|| LdmError::NotFound(format!("folder {}", folder_id.get())))?;
			let contents = self.folder_store.get_with_contents(folder_id).await?;
			let child_ids: Vec<FolderId> = contents.folders.iter().map(|f| f.id).collect();
			for child_id in &child_ids {
				to_visit.push((*child_id, depth + 1));
			}
			frames.push((depth, Frame { folder, file_ids: contents.files, child_ids }));
		}

		frames.sort_by(|a, b| b.0.cmp(&a.0));
		let mut built: std::collections::HashMap<FolderId, FolderPayload> = std::collections::HashMap::new();
		for (_, frame) in frames {
			let mut files = Vec::with_capacity(frame.file_ids.len());
			for file_id in &frame.file_ids {
				files.push(self.fetch_file_payload(*file_id).await?);
			}
			let mut subfolders = Vec::with_capacity(frame.child_ids.len());
			for child_id in &frame.child_ids {
				if let Some(payload) = built.remove(child_id) {
					subfolders.push(payload);
				}
			}
			built.insert(frame.folder.id, FolderPayload { folder: frame.folder, files, subfolders });
		}
		built.remove(&root).ok_or_else(|| LdmError::IntegrityViolation("folder subtree missing root after traversal".into()))
	}

	async fn collect_project_subtree(&self, project_id: ProjectId) -> Result<ProjectPayload> {
		let project = self.project_store.get(project_id).await?.ok_or_else(|| LdmError::NotFound(format!("project {}", project_id.get())))?;
		let root_files = self.file_store.get_all(project_id, None).await?;
		let mut files = Vec::with_capacity(root_files.len());
		for f in &root_files {
			files.push(self.fetch_file_payload(f.id).await?);
		}
		let top_folders: Vec<Folder> = self.folder_store.get_all(project_id).await?.into_iter().filter(|f| f.parent_id.is_none()).collect();
		let mut folders = Vec::with_capacity(top_folders.len());
		for tf in &top_folders {
			folders.push(self.collect_folder_subtree(tf.id).await?);
		}
		Ok(ProjectPayload { project, files, folders })
	}

	async fn collect_platform_subtree(&self, platform_id: PlatformId) -> Result<PlatformPayload> {
		let platform = self.platform_store.get(platform_id).await?.ok_or_else(|| LdmError::NotFound(format!("platform {}", platform_id.get())))?;
		let project_ids = self.platform_store.get_projects(platform_id).await?;
		let mut projects = Vec::with_capacity(project_ids.len());
		for project_id in project_ids {
			projects.push(self.collect_project_subtree(project_id).await?);
		}
		Ok(PlatformPayload { platform, projects })
	}

	async fn delete_file_payload(&self, fp: &FilePayload) -> Result<()> {
		for row in &fp.rows {
			self.row_store.delete(row.id).await?;
		}
		self.file_store.delete(fp.file.id).await?;
		Ok(())
	}

	async fn delete_folder_tree(&self, payload: &FolderPayload) -> Result<()> {
		for node in flatten_postorder(payload) {
			for fp in &node.files {
				self.delete_file_payload(fp).await?;
			}
			self.folder_store.delete(node.folder.id).await?;
		}
		Ok(())
	}

	/// Soft-deletes a single file (spec §4.7), trashing its rows with it.
	#[tracing::instrument(skip(self), fields(file_id = %file_id))]
	pub async fn soft_delete_file(&self, file_id: FileId, deleted_by: UserId) -> Result<Trash> {
		let payload = self.fetch_file_payload(file_id).await?;
		let item_data = serde_json::to_value(&payload)?;
		let item_type = if file_id.is_local() { TrashItemType::LocalFile } else { TrashItemType::File };
		let trash = self
			.trash_store
			.create(item_type, file_id.get(), &payload.file.name, item_data, deleted_by, Some(payload.file.project_id), payload.file.folder_id, self.retention_days)
			.await?;
		self.delete_file_payload(&payload).await?;
		Ok(trash)
	}

	/// Soft-deletes a folder and its whole subtree (spec §4.7, scenario S2).
	#[tracing::instrument(skip(self), fields(folder_id = %folder_id))]
	pub async fn soft_delete_folder(&self, folder_id: FolderId, deleted_by: UserId) -> Result<Trash> {
		let payload = self.collect_folder_subtree(folder_id).await?;
		let item_data = serde_json::to_value(&payload)?;
		let item_type = if folder_id.is_local() { TrashItemType::LocalFolder } else { TrashItemType::Folder };
		let trash = self
			.trash_store
			.create(item_type, folder_id.get(), &payload.folder.name, item_data, deleted_by, Some(payload.folder.project_id), payload.folder.parent_id, self.retention_days)
			.await?;
		self.delete_folder_tree(&payload).await?;
		Ok(trash)
	}

	/// Soft-deletes a whole project: walk children, serialize into one
	/// trash record, delete rows → files → folders → project (spec §4.7).
	/// Requires the `delete_project` capability (spec §4.4.9).
	#[tracing::instrument(skip(self), fields(project_id = %project_id))]
	pub async fn soft_delete_project(&self, project_id: ProjectId, deleted_by: UserId) -> Result<Trash> {
		if !self.capability_store.has_capability(deleted_by, CapabilityName::DeleteProject).await? {
			return Err(LdmError::PermissionDenied(format!("user {} lacks delete_project capability", deleted_by.get())));
		}
		let payload = self.collect_project_subtree(project_id).await?;
		let item_data = serde_json::to_value(&payload)?;
		let trash = self
			.trash_store
			.create(TrashItemType::Project, project_id.get(), &payload.project.name, item_data, deleted_by, Some(project_id), None, self.retention_days)
			.await?;
		for folder in &payload.folders {
			self.delete_folder_tree(folder).await?;
		}
		for fp in &payload.files {
			self.delete_file_payload(fp).await?;
		}
		self.project_store.delete(project_id).await?;
		Ok(trash)
	}

	/// Soft-deletes a whole platform and every project beneath it,
	/// generalizing the project case one level up. Requires the
	/// `delete_platform` capability. This is distinct from
	/// `PlatformStore::delete`, which permanently removes a platform and
	/// merely orphans its projects (`platform_id = NULL`) rather than
	/// trashing the subtree — see `DESIGN.md`.
	#[tracing::instrument(skip(self), fields(platform_id = %platform_id))]
	pub async fn soft_delete_platform(&self, platform_id: PlatformId, deleted_by: UserId) -> Result<Trash> {
		if !self.capability_store.has_capability(deleted_by, CapabilityName::DeletePlatform).await? {
			return Err(LdmError::PermissionDenied(format!("user {} lacks delete_platform capability", deleted_by.get())));
		}
		let payload = self.collect_platform_subtree(platform_id).await?;
		let item_data = serde_json::to_value(&payload)?;
		let trash = self
			.trash_store
			.create(TrashItemType::Platform, platform_id.get(), &payload.platform.name, item_data, deleted_by, None, None, self.retention_days)
			.await?;
		for project in &payload.projects {
			for folder in &project.folders {
				self.delete_folder_tree(folder).await?;
			}
			for fp in &project.files {
				self.delete_file_payload(fp).await?;
			}
			self.project_store.delete(project.project.id).await?;
		}
		self.platform_store.delete(platform_id).await?;
		Ok(trash)
	}

	async fn restore_file_payload(&self, mut fp: FilePayload, project_id: ProjectId, top_level: bool) -> Result<()> {
		if top_level {
			let siblings = self.file_store.get_all(project_id, fp.file.folder_id).await?;
			let existing: HashSet<String> = siblings.iter().map(|f| f.name.to_lowercase()).collect();
			if existing.contains(&fp.file.name.to_lowercase()) {
				fp.file.name = generate_unique_name(&fp.file.name, &StaticNameSet(existing), None).await?;
			}
		}
		self.file_store.recreate_with_id(&fp.file).await?;
		for row in &fp.rows {
			self.row_store.recreate_with_id(row).await?;
		}
		Ok(())
	}

	async fn restore_folder_payload(&self, root: FolderPayload, project_id: ProjectId, top_level: bool) -> Result<()> {
		let mut stack = vec![(root, top_level, 0usize)];
		while let Some((mut node, is_top, depth)) = stack.pop() {
			if depth > MAX_TREE_DEPTH {
				return Err(LdmError::IntegrityViolation(format!("restored folder subtree exceeds max depth {MAX_TREE_DEPTH}")));
			}
			if is_top {
				let siblings = self.folder_store.get_all(project_id).await?;
				let existing: HashSet<String> = siblings.iter().filter(|f| f.parent_id == node.folder.parent_id).map(|f| f.name.to_lowercase()).collect();
				if existing.contains(&node.folder.name.to_lowercase()) {
					node.folder.name = generate_unique_name(&node.folder.name, &StaticNameSet(existing), None).await?;
				}
			}
			self.folder_store.recreate_with_id(&node.folder).await?;
			for fp in node.files.drain(..) {
				self.restore_file_payload(fp, project_id, false).await?;
			}
			for sub in node.subfolders.drain(..) {
				stack.push((sub, false, depth + 1));
			}
		}
		Ok(())
	}

	async fn restore_project_payload(&self, mut payload: ProjectPayload, top_level: bool) -> Result<()> {
		if top_level {
			let exists = self.project_store.check_name_exists(&payload.project.name, payload.project.platform_id, None).await?;
			if exists {
				let checker = ProjectNameChecker { store: self.project_store.as_ref(), platform_id: payload.project.platform_id };
				payload.project.name = generate_unique_name(&payload.project.name, &checker, None).await?;
			}
		}
		let project_id = payload.project.id;
		self.project_store.recreate_with_id(&payload.project).await?;
		for fp in payload.files {
			self.restore_file_payload(fp, project_id, false).await?;
		}
		for folder in payload.folders {
			self.restore_folder_payload(folder, project_id, false).await?;
		}
		Ok(())
	}

	async fn restore_platform_payload(&self, mut payload: PlatformPayload) -> Result<()> {
		let exists = self.platform_store.check_name_exists(&payload.platform.name, None).await?;
		if exists {
			let checker = PlatformNameChecker { store: self.platform_store.as_ref() };
			payload.platform.name = generate_unique_name(&payload.platform.name, &checker, None).await?;
		}
		self.platform_store.recreate_with_id(&payload.platform).await?;
		for project in payload.projects {
			self.restore_project_payload(project, false).await?;
		}
		Ok(())
	}

	/// Restores a trashed entity under its original IDs (spec §4.7
	/// "Restore", §9 "Soft delete"). Permission (`deleted_by == user_id`,
	/// admins bypass) is enforced by `TrashStore::restore` itself; this
	/// only drives the reinsertion once that check has passed.
	#[tracing::instrument(skip(self), fields(trash_id = %trash_id.get()))]
	pub async fn restore(&self, trash_id: TrashId, user_id: UserId, is_admin: bool) -> Result<Trash> {
		let trash = self.trash_store.restore(trash_id, user_id, is_admin).await?;
		match trash.item_type {
			TrashItemType::Folder | TrashItemType::LocalFolder => {
				let payload: FolderPayload = serde_json::from_value(trash.item_data.clone())?;
				let project_id = trash.parent_project_id.ok_or_else(|| LdmError::IntegrityViolation("folder trash entry missing parent_project_id".into()))?;
				self.restore_folder_payload(payload, project_id, true).await?;
			}
			TrashItemType::File | TrashItemType::LocalFile => {
				let payload: FilePayload = serde_json::from_value(trash.item_data.clone())?;
				let project_id = trash.parent_project_id.ok_or_else(|| LdmError::IntegrityViolation("file trash entry missing parent_project_id".into()))?;
				self.restore_file_payload(payload, project_id, true).await?;
			}
			TrashItemType::Project => {
				let payload: ProjectPayload = serde_json::from_value(trash.item_data.clone())?;
				self.restore_project_payload(payload, true).await?;
			}
			TrashItemType::Platform => {
				let payload: PlatformPayload = serde_json::from_value(trash.item_data.clone())?;
				self.restore_platform_payload(payload).await?;
			}
		}
		Ok(trash)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn folder_payload_omits_subfolders_key_when_empty() {
		let folder = Folder { id: FolderId::new(1), project_id: ProjectId::new(1), parent_id: None, name: "F1".into() };
		let payload = FolderPayload { folder, files: vec![], subfolders: vec![] };
		let json = serde_json::to_value(&payload).unwrap();
		assert!(json.get("subfolders").is_none());
		assert!(json.get("folder").is_some());
		assert!(json.get("files").is_some());
	}

	#[test]
	fn folder_payload_keeps_subfolders_key_when_present() {
		let leaf = Folder { id: FolderId::new(2), project_id: ProjectId::new(1), parent_id: Some(FolderId::new(1)), name: "F2".into() };
		let root = Folder { id: FolderId::new(1), project_id: ProjectId::new(1), parent_id: None, name: "F1".into() };
		let payload = FolderPayload {
			folder: root,
			files: vec![],
			subfolders: vec![FolderPayload { folder: leaf, files: vec![], subfolders: vec![] }],
		};
		let json = serde_json::to_value(&payload).unwrap();
		assert_eq!(json["subfolders"].as_array().unwrap().len(), 1);
	}

	#[test]
	fn postorder_visits_children_before_parent() {
		let leaf = Folder { id: FolderId::new(2), project_id: ProjectId::new(1), parent_id: Some(FolderId::new(1)), name: "F2".into() };
		let root = Folder { id: FolderId::new(1), project_id: ProjectId::new(1), parent_id: None, name: "F1".into() };
		let payload = FolderPayload {
			folder: root,
			files: vec![],
			subfolders: vec![FolderPayload { folder: leaf, files: vec![], subfolders: vec![] }],
		};
		let order: Vec<i64> = flatten_postorder(&payload).iter().map(|p| p.folder.id.get()).collect();
		assert_eq!(order, vec![2, 1]);
	}
}
