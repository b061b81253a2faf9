// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error kinds shared by every layer of the LDM core (spec §7).
//!
//! These are semantic categories, not a mirror of the underlying SQL driver's
//! error type. Repositories surface the kind that matches what actually went
//! wrong; they never collapse a typed failure into a boolean or a log line.

#[derive(Debug, thiserror::Error)]
pub enum LdmError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("name collision: {0}")]
	NameCollision(String),

	#[error("cycle would be introduced: {0}")]
	CycleWouldBeIntroduced(String),

	#[error("invalid scope: {0}")]
	InvalidScope(String),

	#[error("cross-project operation not supported offline: {0}")]
	CrossProjectNotSupportedOffline(String),

	#[error("capability requires online mode: {0}")]
	CapabilityRequiresOnline(String),

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	#[error("integrity violation: {0}")]
	IntegrityViolation(String),

	#[error("transient failure, retry: {0}")]
	Transient(String),

	#[error("database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LdmError>;

impl LdmError {
	/// Whether a composed orchestrator may retry its own transaction for this
	/// error (spec §7 propagation policy: only `Transient` is retryable).
	pub fn is_retryable(&self) -> bool {
		matches!(self, LdmError::Transient(_))
	}
}
