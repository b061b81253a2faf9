// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cross-entity orchestration for the LDM server (spec §2, §4.7).
//!
//! `ldm-db` gives every entity a polymorphic `*Store`; this crate composes
//! those stores into the operations that span more than one of them under
//! a single transactional boundary — the trash/restore walk, the TM scope
//! resolver, the sync merge decision, and the retry-with-jitter wrapper
//! composed operations use around a `Transient` failure.

pub mod merge;
pub mod retry;
pub mod scope;
pub mod trash;

pub use merge::{IncomingRow, LocalRow, MergeOutcome, SyncMerger};
pub use retry::{retry_transient, RetryConfig};
pub use scope::ScopeResolver;
pub use trash::{FilePayload, FolderPayload, PlatformPayload, ProjectPayload, TrashCoordinator, DEFAULT_RETENTION_DAYS, MAX_TREE_DEPTH};
