// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ID newtypes for every entity in the LDM data model.
//!
//! Every ID is a transparent wrapper around `i64`. The sign carries meaning
//! throughout the core (spec §6, "ID sign convention"): positive values are
//! server-owned, negative values are locally-allocated offline entities, and
//! zero is never produced or accepted.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(i64);

		impl $name {
			/// Wrap a raw ID. Panics in debug builds on a zero value, which the
			/// backend never produces and no caller should pass.
			pub fn new(id: i64) -> Self {
				debug_assert_ne!(id, 0, "entity IDs are never zero");
				Self(id)
			}

			/// The raw signed integer value.
			pub fn get(self) -> i64 {
				self.0
			}

			/// True for locally-allocated offline entities (negative IDs).
			pub fn is_local(self) -> bool {
				self.0 < 0
			}

			/// True for server-owned entities (positive IDs).
			pub fn is_online(self) -> bool {
				self.0 > 0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<i64> for $name {
			fn from(id: i64) -> Self {
				Self::new(id)
			}
		}

		impl From<$name> for i64 {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(PlatformId, "Identifier for a Platform.");
define_id_type!(ProjectId, "Identifier for a Project.");
define_id_type!(FolderId, "Identifier for a Folder.");
define_id_type!(FileId, "Identifier for a File.");
define_id_type!(RowId, "Identifier for a Row (translation unit).");
define_id_type!(TmId, "Identifier for a Translation Memory.");
define_id_type!(TmEntryId, "Identifier for a TM Entry.");
define_id_type!(QaResultId, "Identifier for a QA Result.");
define_id_type!(TrashId, "Identifier for a Trash record.");
define_id_type!(CapabilityGrantId, "Identifier for a Capability Grant.");
define_id_type!(UserId, "Identifier for a user (owned by an external auth system).");

/// The well-known Offline-Storage platform ID (spec §6).
pub const OFFLINE_STORAGE_PLATFORM_ID: PlatformId = PlatformId(-1);
/// The well-known Offline-Storage project ID (spec §6).
pub const OFFLINE_STORAGE_PROJECT_ID: ProjectId = ProjectId(-1);
/// Human-readable name seeded for both well-known Offline-Storage records.
pub const OFFLINE_STORAGE_NAME: &str = "Offline Storage";

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sign_predicates() {
		assert!(RowId::new(-123).is_local());
		assert!(!RowId::new(-123).is_online());
		assert!(RowId::new(5).is_online());
		assert!(!RowId::new(5).is_local());
	}

	#[test]
	fn round_trips_through_i64() {
		let id = FileId::new(42);
		let raw: i64 = id.into();
		assert_eq!(raw, 42);
		assert_eq!(FileId::from(raw), id);
	}

	#[test]
	fn well_known_constants_are_negative_one() {
		assert_eq!(OFFLINE_STORAGE_PLATFORM_ID.get(), -1);
		assert_eq!(OFFLINE_STORAGE_PROJECT_ID.get(), -1);
	}
}
