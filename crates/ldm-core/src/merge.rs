// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sync Merger (spec §2, §9 "Last-write-wins"): conflict resolution for
//! rows and TM entries pulled down from the server into an offline
//! install. Grounded on `original_source/server/database/offline.py`'s
//! `merge_row`/`merge_tm_entry`: a row or entry that is locally `synced`
//! always takes the server version outright; one with pending local
//! edits (`modified`/`new`) is resolved by comparing `updated_at` — a
//! tie goes to the local side so a user never silently loses work. Any
//! other local status (`local`, `orphaned`) is left alone.
//!
//! The `Row` domain type carries no `updated_at` of its own — that
//! column is offline-only bookkeeping the shared `Row` struct
//! deliberately doesn't expose (spec §9 "offline-only columns") — so the
//! merger takes the timestamp as an explicit side channel alongside the
//! row payload rather than reading it off the struct.

use ldm_types::{Row, SyncStatus, TmEntry};

/// Outcome of a single merge decision (mirrors `offline.py`'s return
/// strings `'inserted' | 'updated' | 'skipped'`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
	Inserted,
	Updated,
	Skipped,
}

/// A row as received from the server, paired with the `updated_at` the
/// sync payload carries for it.
#[derive(Debug, Clone)]
pub struct IncomingRow {
	pub row: Row,
	pub updated_at: String,
}

/// The local counterpart of an [`IncomingRow`], if one exists.
#[derive(Debug, Clone)]
pub struct LocalRow {
	pub row: Row,
	pub updated_at: String,
	pub sync_status: SyncStatus,
}

pub struct SyncMerger;

impl SyncMerger {
	/// Decides how to reconcile an incoming server row against its local
	/// copy, if any. This is a pure decision — applying `Updated` (write
	/// the server row, clear any pending `local_changes` entries) or
	/// `Inserted` (create it) is the caller's job through `RowStore`.
	pub fn merge_row(local: Option<&LocalRow>, server: &IncomingRow) -> MergeOutcome {
		let Some(local) = local else {
			return MergeOutcome::Inserted;
		};
		match local.sync_status {
			SyncStatus::Synced => MergeOutcome::Updated,
			SyncStatus::Modified | SyncStatus::New => {
				if server.updated_at.as_str() > local.updated_at.as_str() {
					MergeOutcome::Updated
				} else {
					MergeOutcome::Skipped
				}
			}
			SyncStatus::Local | SyncStatus::Orphaned => MergeOutcome::Skipped,
		}
	}

	/// Same decision for a TM entry. `TmEntry::updated_at` is already a
	/// parsed `DateTime<Utc>` rather than a raw string; chronological
	/// order on a valid timestamp agrees with the spec's lexicographic
	/// ISO-8601 rule, so comparing the parsed values directly is
	/// equivalent and avoids a round trip through string formatting.
	pub fn merge_tm_entry(local: Option<(&TmEntry, SyncStatus)>, server: &TmEntry) -> MergeOutcome {
		let Some((local_entry, sync_status)) = local else {
			return MergeOutcome::Inserted;
		};
		match sync_status {
			SyncStatus::Synced => MergeOutcome::Updated,
			SyncStatus::Modified | SyncStatus::New => {
				if server.updated_at > local_entry.updated_at {
					MergeOutcome::Updated
				} else {
					MergeOutcome::Skipped
				}
			}
			SyncStatus::Local | SyncStatus::Orphaned => MergeOutcome::Skipped,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Utc};
	use ldm_types::{FileId, OfflineRowFields, RowId, RowStatus, TmEntryId, TmId};

	fn row(id: i64) -> Row {
		Row {
			id: RowId::new(id),
			file_id: FileId::new(1),
			row_num: 0,
			string_id: None,
			source: "hello".into(),
			target: "bonjour".into(),
			memo: None,
			status: RowStatus::Translated,
			qa_flag_count: 0,
			extra_data: None,
			offline: OfflineRowFields { sync_status: None, server_id: None, server_file_id: None },
		}
	}

	#[test]
	fn new_local_row_is_inserted() {
		let server = IncomingRow { row: row(1), updated_at: "2026-01-01T00:00:00.000Z".into() };
		assert_eq!(SyncMerger::merge_row(None, &server), MergeOutcome::Inserted);
	}

	#[test]
	fn synced_local_row_always_takes_server() {
		let local = LocalRow { row: row(1), updated_at: "2099-01-01T00:00:00.000Z".into(), sync_status: SyncStatus::Synced };
		let server = IncomingRow { row: row(1), updated_at: "2000-01-01T00:00:00.000Z".into() };
		assert_eq!(SyncMerger::merge_row(Some(&local), &server), MergeOutcome::Updated);
	}

	#[test]
	fn modified_row_with_newer_server_timestamp_takes_server() {
		let local = LocalRow { row: row(1), updated_at: "2026-01-01T00:00:00.000Z".into(), sync_status: SyncStatus::Modified };
		let server = IncomingRow { row: row(1), updated_at: "2026-01-02T00:00:00.000Z".into() };
		assert_eq!(SyncMerger::merge_row(Some(&local), &server), MergeOutcome::Updated);
	}

	#[test]
	fn equal_timestamps_resolve_to_local_wins() {
		let local = LocalRow { row: row(1), updated_at: "2026-01-01T00:00:00.000Z".into(), sync_status: SyncStatus::New };
		let server = IncomingRow { row: row(1), updated_at: "2026-01-01T00:00:00.000Z".into() };
		assert_eq!(SyncMerger::merge_row(Some(&local), &server), MergeOutcome::Skipped);
	}

	#[test]
	fn orphaned_local_row_is_left_alone() {
		let local = LocalRow { row: row(1), updated_at: "2000-01-01T00:00:00.000Z".into(), sync_status: SyncStatus::Orphaned };
		let server = IncomingRow { row: row(1), updated_at: "2099-01-01T00:00:00.000Z".into() };
		assert_eq!(SyncMerger::merge_row(Some(&local), &server), MergeOutcome::Skipped);
	}

	fn tm_entry(id: i64, updated_at: chrono::DateTime<Utc>) -> TmEntry {
		TmEntry {
			id: TmEntryId::new(id),
			tm_id: TmId::new(1),
			source_text: "hello".into(),
			target_text: "bonjour".into(),
			source_hash: "deadbeef".into(),
			string_id: None,
			is_confirmed: false,
			created_by: None,
			updated_at,
			updated_by: None,
			confirmed_by: None,
			confirmed_at: None,
		}
	}

	#[test]
	fn modified_tm_entry_with_newer_local_timestamp_is_skipped() {
		let local = tm_entry(1, Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
		let server = tm_entry(1, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
		assert_eq!(SyncMerger::merge_tm_entry(Some((&local, SyncStatus::Modified)), &server), MergeOutcome::Skipped);
	}
}
