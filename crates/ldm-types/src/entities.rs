// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Domain entities and their enums (spec §3 "Data model").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

use crate::error::LdmError;
use crate::ids::{
	CapabilityGrantId, FileId, FolderId, PlatformId, ProjectId, QaResultId, RowId, TmEntryId, TmId,
	TrashId, UserId,
};

/// A row's workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
	Pending,
	Translated,
	Reviewed,
	Approved,
}

impl fmt::Display for RowStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			RowStatus::Pending => "pending",
			RowStatus::Translated => "translated",
			RowStatus::Reviewed => "reviewed",
			RowStatus::Approved => "approved",
		};
		write!(f, "{s}")
	}
}

impl FromStr for RowStatus {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(RowStatus::Pending),
			"translated" => Ok(RowStatus::Translated),
			"reviewed" => Ok(RowStatus::Reviewed),
			"approved" => Ok(RowStatus::Approved),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "row status"))),
		}
	}
}

/// Offline-only per-row/per-file sync flag (glossary: "Sync status").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
	Synced,
	Modified,
	New,
	Local,
	Orphaned,
}

impl fmt::Display for SyncStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			SyncStatus::Synced => "synced",
			SyncStatus::Modified => "modified",
			SyncStatus::New => "new",
			SyncStatus::Local => "local",
			SyncStatus::Orphaned => "orphaned",
		};
		write!(f, "{s}")
	}
}

impl FromStr for SyncStatus {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"synced" => Ok(SyncStatus::Synced),
			"modified" => Ok(SyncStatus::Modified),
			"new" => Ok(SyncStatus::New),
			"local" => Ok(SyncStatus::Local),
			"orphaned" => Ok(SyncStatus::Orphaned),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "sync status"))),
		}
	}
}

/// TM duplicate-handling mode at ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TmMode {
	Standard,
	StringId,
}

impl fmt::Display for TmMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			TmMode::Standard => "standard",
			TmMode::StringId => "stringid",
		};
		write!(f, "{s}")
	}
}

impl FromStr for TmMode {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"standard" => Ok(TmMode::Standard),
			"stringid" => Ok(TmMode::StringId),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "tm mode"))),
		}
	}
}

/// TM indexing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TmStatus {
	Pending,
	Indexing,
	Ready,
	Error,
}

impl fmt::Display for TmStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			TmStatus::Pending => "pending",
			TmStatus::Indexing => "indexing",
			TmStatus::Ready => "ready",
			TmStatus::Error => "error",
		};
		write!(f, "{s}")
	}
}

impl FromStr for TmStatus {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(TmStatus::Pending),
			"indexing" => Ok(TmStatus::Indexing),
			"ready" => Ok(TmStatus::Ready),
			"error" => Ok(TmStatus::Error),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "tm status"))),
		}
	}
}

/// QA check category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaCheckType {
	Pattern,
	Line,
	Term,
	Character,
	Grammar,
}

impl fmt::Display for QaCheckType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			QaCheckType::Pattern => "pattern",
			QaCheckType::Line => "line",
			QaCheckType::Term => "term",
			QaCheckType::Character => "character",
			QaCheckType::Grammar => "grammar",
		};
		write!(f, "{s}")
	}
}

impl FromStr for QaCheckType {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pattern" => Ok(QaCheckType::Pattern),
			"line" => Ok(QaCheckType::Line),
			"term" => Ok(QaCheckType::Term),
			"character" => Ok(QaCheckType::Character),
			"grammar" => Ok(QaCheckType::Grammar),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "qa check type"))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaSeverity {
	Error,
	Warning,
}

impl fmt::Display for QaSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			QaSeverity::Error => "error",
			QaSeverity::Warning => "warning",
		};
		write!(f, "{s}")
	}
}

impl FromStr for QaSeverity {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"error" => Ok(QaSeverity::Error),
			"warning" => Ok(QaSeverity::Warning),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "qa severity"))),
		}
	}
}

/// What a Trash record's `item_data` blob holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashItemType {
	File,
	Folder,
	Project,
	Platform,
	LocalFile,
	LocalFolder,
}

impl fmt::Display for TrashItemType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			TrashItemType::File => "file",
			TrashItemType::Folder => "folder",
			TrashItemType::Project => "project",
			TrashItemType::Platform => "platform",
			TrashItemType::LocalFile => "local-file",
			TrashItemType::LocalFolder => "local-folder",
		};
		write!(f, "{s}")
	}
}

impl FromStr for TrashItemType {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"file" => Ok(TrashItemType::File),
			"folder" => Ok(TrashItemType::Folder),
			"project" => Ok(TrashItemType::Project),
			"platform" => Ok(TrashItemType::Platform),
			"local-file" => Ok(TrashItemType::LocalFile),
			"local-folder" => Ok(TrashItemType::LocalFolder),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "trash item type"))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashStatus {
	Trashed,
	Restored,
}

impl fmt::Display for TrashStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			TrashStatus::Trashed => "trashed",
			TrashStatus::Restored => "restored",
		};
		write!(f, "{s}")
	}
}

impl FromStr for TrashStatus {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"trashed" => Ok(TrashStatus::Trashed),
			"restored" => Ok(TrashStatus::Restored),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "trash status"))),
		}
	}
}

/// A named permission grant, online only (spec §3 "Capability Grant").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityName {
	DeletePlatform,
	DeleteProject,
	CrossProjectMove,
	EmptyTrash,
}

impl fmt::Display for CapabilityName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			CapabilityName::DeletePlatform => "delete_platform",
			CapabilityName::DeleteProject => "delete_project",
			CapabilityName::CrossProjectMove => "cross_project_move",
			CapabilityName::EmptyTrash => "empty_trash",
		};
		write!(f, "{s}")
	}
}

impl FromStr for CapabilityName {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"delete_platform" => Ok(CapabilityName::DeletePlatform),
			"delete_project" => Ok(CapabilityName::DeleteProject),
			"cross_project_move" => Ok(CapabilityName::CrossProjectMove),
			"empty_trash" => Ok(CapabilityName::EmptyTrash),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "capability name"))),
		}
	}
}

/// Row search comparison mode (spec §4.4.5 `RowRepository.get_for_file`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
	#[default]
	Contain,
	Exact,
	NotContain,
	Fuzzy,
}

/// Which columns a row search matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
	StringId,
	Source,
	Target,
}

/// Row listing filter (spec §4.4.5).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
	#[default]
	All,
	Confirmed,
	Unconfirmed,
	QaFlagged,
}

/// Offline-only per-field edit journal entry's sync state (spec §3 `local_changes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalChangeStatus {
	Pending,
	Synced,
	Discarded,
}

impl fmt::Display for LocalChangeStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			LocalChangeStatus::Pending => "pending",
			LocalChangeStatus::Synced => "synced",
			LocalChangeStatus::Discarded => "discarded",
		};
		write!(f, "{s}")
	}
}

impl FromStr for LocalChangeStatus {
	type Err = LdmError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(LocalChangeStatus::Pending),
			"synced" => Ok(LocalChangeStatus::Synced),
			"discarded" => Ok(LocalChangeStatus::Discarded),
			other => Err(LdmError::IntegrityViolation(format!("unknown {}: {other}", "local change status"))),
		}
	}
}

/// The hierarchical chain a TM assignment or active-TM lookup walks
/// (glossary: "Scope").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
	Platform,
	Project,
	Folder,
}

/// A scope target for TM assignment: at most one of the three IDs is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeTarget {
	Platform(PlatformId),
	Project(ProjectId),
	Folder(FolderId),
	Unassigned,
}

impl ScopeTarget {
	pub fn kind(&self) -> Option<ScopeKind> {
		match self {
			ScopeTarget::Platform(_) => Some(ScopeKind::Platform),
			ScopeTarget::Project(_) => Some(ScopeKind::Project),
			ScopeTarget::Folder(_) => Some(ScopeKind::Folder),
			ScopeTarget::Unassigned => None,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
	pub id: PlatformId,
	pub name: String,
	pub description: Option<String>,
	pub owner_id: UserId,
	pub is_restricted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
	pub id: ProjectId,
	pub name: String,
	pub description: Option<String>,
	pub owner_id: UserId,
	pub platform_id: Option<PlatformId>,
	pub is_restricted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
	pub id: FolderId,
	pub project_id: ProjectId,
	pub parent_id: Option<FolderId>,
	pub name: String,
}

/// Offline-only fields carried by a File (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OfflineFileFields {
	pub sync_status: Option<SyncStatus>,
	pub server_id: Option<i64>,
	pub server_project_id: Option<i64>,
	pub server_folder_id: Option<i64>,
	pub downloaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
	pub id: FileId,
	pub project_id: ProjectId,
	pub folder_id: Option<FolderId>,
	pub name: String,
	pub original_filename: String,
	pub format: String,
	pub row_count: i64,
	pub source_language: String,
	pub target_language: Option<String>,
	pub extra_data: Option<Json>,
	#[serde(default)]
	pub offline: OfflineFileFields,
}

/// Offline-only fields carried by a Row (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OfflineRowFields {
	pub sync_status: Option<SyncStatus>,
	pub server_id: Option<i64>,
	pub server_file_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
	pub id: RowId,
	pub file_id: FileId,
	pub row_num: i64,
	pub string_id: Option<String>,
	pub source: String,
	pub target: String,
	pub memo: Option<String>,
	pub status: RowStatus,
	pub qa_flag_count: i64,
	pub extra_data: Option<Json>,
	#[serde(default)]
	pub offline: OfflineRowFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tm {
	pub id: TmId,
	pub name: String,
	pub description: Option<String>,
	pub owner_id: Option<UserId>,
	pub source_lang: String,
	pub target_lang: String,
	pub entry_count: i64,
	pub mode: TmMode,
	pub status: TmStatus,
	pub indexed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmEntry {
	pub id: TmEntryId,
	pub tm_id: TmId,
	pub source_text: String,
	pub target_text: String,
	pub source_hash: String,
	pub string_id: Option<String>,
	pub is_confirmed: bool,
	pub created_by: Option<UserId>,
	pub updated_at: DateTime<Utc>,
	pub updated_by: Option<UserId>,
	pub confirmed_by: Option<UserId>,
	pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmAssignment {
	pub tm_id: TmId,
	pub platform_id: Option<PlatformId>,
	pub project_id: Option<ProjectId>,
	pub folder_id: Option<FolderId>,
	pub is_active: bool,
	pub activated_at: Option<DateTime<Utc>>,
}

impl TmAssignment {
	pub fn scope(&self) -> ScopeTarget {
		if let Some(id) = self.folder_id {
			ScopeTarget::Folder(id)
		} else if let Some(id) = self.project_id {
			ScopeTarget::Project(id)
		} else if let Some(id) = self.platform_id {
			ScopeTarget::Platform(id)
		} else {
			ScopeTarget::Unassigned
		}
	}
}

/// An active TM resolved against a file, tagged with the scope it came from
/// (spec §4.4.6 `get_active_for_file`).
#[derive(Debug, Clone)]
pub struct ActiveTm {
	pub tm: Tm,
	pub scope: ScopeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmProjectLink {
	pub tm_id: TmId,
	pub project_id: ProjectId,
	pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaResult {
	pub id: QaResultId,
	pub row_id: RowId,
	pub file_id: FileId,
	pub check_type: QaCheckType,
	pub severity: QaSeverity,
	pub message: String,
	pub details: Option<Json>,
	pub created_at: DateTime<Utc>,
	pub resolved_at: Option<DateTime<Utc>>,
	pub resolved_by: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trash {
	pub id: TrashId,
	pub item_type: TrashItemType,
	pub item_id: i64,
	pub item_name: String,
	pub item_data: Json,
	pub parent_project_id: Option<ProjectId>,
	pub parent_folder_id: Option<FolderId>,
	pub deleted_by: UserId,
	pub deleted_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	pub status: TrashStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityGrant {
	pub id: CapabilityGrantId,
	pub user_id: UserId,
	pub capability_name: CapabilityName,
	pub granted_by: UserId,
	pub granted_at: DateTime<Utc>,
	pub expires_at: Option<DateTime<Utc>>,
}

/// Append-only per-field edit log entry (spec §3 `local_changes`, shape
/// recovered from `original_source/server/database/offline.py`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalChange {
	pub id: i64,
	pub entity_type: String,
	pub entity_id: i64,
	pub field: String,
	pub old_value: Option<String>,
	pub new_value: Option<String>,
	pub sync_status: LocalChangeStatus,
	pub created_at: DateTime<Utc>,
}

/// Tracks which server entities a local install mirrors (spec §3
/// `sync_subscriptions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSubscription {
	pub entity_type: String,
	pub entity_id: i64,
	pub entity_name: String,
	pub status: String,
	pub created_at: DateTime<Utc>,
}
