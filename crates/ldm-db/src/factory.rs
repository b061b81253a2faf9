// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mode Resolver / Factory (spec §4.6): classifies a request's auth token
//! and binds the right adapter per entity for that session. For Row and
//! File, the Online binding is additionally wrapped in the Routing
//! Repository so a session can address both server-owned and
//! locally-allocated entities transparently (spec §4.6 last sentence).

use std::sync::Arc;

use sqlx::{PgPool, SqlitePool};

use crate::capability::{CapabilityStore, OfflineCapabilityRepository, OnlineCapabilityRepository};
use crate::file::{FileStore, OfflineFileRepository, OnlineFileRepository};
use crate::folder::{FolderStore, OfflineFolderRepository, OnlineFolderRepository};
use crate::platform::{OfflinePlatformRepository, OnlinePlatformRepository, PlatformStore};
use crate::project::{OfflineProjectRepository, OnlineProjectRepository, ProjectStore};
use crate::qa::{OfflineQaResultRepository, OnlineQaResultRepository, QaResultStore};
use crate::row::{OfflineRowRepository, OnlineRowRepository, RowStore};
use crate::routing::{RoutingFileRepository, RoutingRowRepository};
use crate::sync::{OfflineSyncRepository, SyncStore};
use crate::tm::{OfflineTmRepository, OnlineTmRepository, TmStore};
use crate::trash::{OfflineTrashRepository, OnlineTrashRepository, TrashStore};

/// The literal bearer-token prefix that selects offline mode (spec §6
/// "Mode token format"; exact value recovered from
/// `original_source/server/auth.py` per SPEC_FULL §2.1).
pub const OFFLINE_MODE_TOKEN_PREFIX: &str = "OFFLINE_MODE_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	Online,
	Offline,
}

/// Classifies a session's auth token. The resolver never parses the
/// remainder of the token — identity and authorization are handled
/// elsewhere (spec §6).
pub fn is_offline_token(token: &str) -> bool {
	token.starts_with(OFFLINE_MODE_TOKEN_PREFIX)
}

pub fn resolve_mode(token: &str) -> Mode {
	if is_offline_token(token) {
		Mode::Offline
	} else {
		Mode::Online
	}
}

/// Binds per-entity repository adapters for a resolved `Mode`. Holds no
/// per-session state itself — every `*_store` call returns a fresh
/// `Arc<dyn Trait>` bound to the pools handed to `new` (spec §5 "no
/// shared mutable state inside repositories").
#[derive(Clone)]
pub struct RepositoryFactory {
	online_pool: PgPool,
	offline_pool: SqlitePool,
	negative_id_modulus: i64,
}

impl RepositoryFactory {
	pub fn new(online_pool: PgPool, offline_pool: SqlitePool) -> Self {
		Self::with_negative_id_modulus(online_pool, offline_pool, crate::id_alloc::IdAllocator::default_modulus())
	}

	/// Same as [`Self::new`] but with the negative-ID modulus driven by
	/// `DatabaseConfig::negative_id_modulus` rather than the built-in default.
	pub fn with_negative_id_modulus(online_pool: PgPool, offline_pool: SqlitePool, negative_id_modulus: i64) -> Self {
		Self { online_pool, offline_pool, negative_id_modulus }
	}

	pub fn platform_store(&self, mode: Mode) -> Arc<dyn PlatformStore> {
		match mode {
			Mode::Online => Arc::new(OnlinePlatformRepository::new(self.online_pool.clone())),
			Mode::Offline => Arc::new(OfflinePlatformRepository::with_modulus(self.offline_pool.clone(), self.negative_id_modulus)),
		}
	}

	pub fn project_store(&self, mode: Mode) -> Arc<dyn ProjectStore> {
		match mode {
			Mode::Online => Arc::new(OnlineProjectRepository::new(self.online_pool.clone())),
			Mode::Offline => Arc::new(OfflineProjectRepository::with_modulus(self.offline_pool.clone(), self.negative_id_modulus)),
		}
	}

	pub fn folder_store(&self, mode: Mode) -> Arc<dyn FolderStore> {
		match mode {
			Mode::Online => Arc::new(OnlineFolderRepository::new(self.online_pool.clone())),
			Mode::Offline => Arc::new(OfflineFolderRepository::with_modulus(self.offline_pool.clone(), self.negative_id_modulus)),
		}
	}

	/// Online sessions get the Routing decorator so a positive-ID file
	/// coexists with locally-allocated negative-ID files in the same
	/// session; Offline sessions talk to the Offline adapter directly —
	/// there is nothing to route to (spec §4.6).
	pub fn file_store(&self, mode: Mode) -> Arc<dyn FileStore> {
		match mode {
			Mode::Online => {
				let online: Arc<dyn FileStore> = Arc::new(OnlineFileRepository::new(self.online_pool.clone()));
				let offline: Arc<dyn FileStore> = Arc::new(OfflineFileRepository::with_modulus(self.offline_pool.clone(), self.negative_id_modulus));
				Arc::new(RoutingFileRepository::new(online, offline))
			}
			Mode::Offline => Arc::new(OfflineFileRepository::with_modulus(self.offline_pool.clone(), self.negative_id_modulus)),
		}
	}

	pub fn row_store(&self, mode: Mode) -> Arc<dyn RowStore> {
		match mode {
			Mode::Online => {
				let online: Arc<dyn RowStore> = Arc::new(OnlineRowRepository::new(self.online_pool.clone()));
				let offline: Arc<dyn RowStore> = Arc::new(OfflineRowRepository::with_modulus(self.offline_pool.clone(), self.negative_id_modulus));
				Arc::new(RoutingRowRepository::new(online, offline))
			}
			Mode::Offline => Arc::new(OfflineRowRepository::with_modulus(self.offline_pool.clone(), self.negative_id_modulus)),
		}
	}

	pub fn tm_store(&self, mode: Mode) -> Arc<dyn TmStore> {
		match mode {
			Mode::Online => Arc::new(OnlineTmRepository::new(self.online_pool.clone())),
			Mode::Offline => Arc::new(OfflineTmRepository::with_modulus(self.offline_pool.clone(), self.negative_id_modulus)),
		}
	}

	pub fn qa_result_store(&self, mode: Mode) -> Arc<dyn QaResultStore> {
		match mode {
			Mode::Online => Arc::new(OnlineQaResultRepository::new(self.online_pool.clone())),
			Mode::Offline => Arc::new(OfflineQaResultRepository::new(self.offline_pool.clone())),
		}
	}

	pub fn trash_store(&self, mode: Mode) -> Arc<dyn TrashStore> {
		match mode {
			Mode::Online => Arc::new(OnlineTrashRepository::new(self.online_pool.clone())),
			Mode::Offline => Arc::new(OfflineTrashRepository::new(self.offline_pool.clone())),
		}
	}

	/// Online only (spec §4.4.9); the offline leg never fabricates a
	/// grant.
	pub fn capability_store(&self, mode: Mode) -> Arc<dyn CapabilityStore> {
		match mode {
			Mode::Online => Arc::new(OnlineCapabilityRepository::new(self.online_pool.clone())),
			Mode::Offline => Arc::new(OfflineCapabilityRepository::new()),
		}
	}

	/// Subscriptions are a property of the offline install, not of the
	/// session's resolved mode — always bound to the offline pool.
	pub fn sync_store(&self) -> Arc<dyn SyncStore> {
		Arc::new(OfflineSyncRepository::new(self.offline_pool.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn offline_prefix_selects_offline_mode() {
		assert_eq!(resolve_mode("OFFLINE_MODE_abc123"), Mode::Offline);
		assert!(is_offline_token("OFFLINE_MODE_"));
	}

	#[test]
	fn any_other_token_selects_online_mode() {
		assert_eq!(resolve_mode("sess_abc123"), Mode::Online);
		assert_eq!(resolve_mode(""), Mode::Online);
		assert!(!is_offline_token("offline_mode_lowercase_does_not_match"));
	}
}
