// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CapabilityRepository (spec §4.4.9): online-only permission grants. The
//! offline adapter never fabricates a grant — reads return empty and
//! mutations raise `CapabilityRequiresOnline` (spec §9 "Testing" bullet).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ldm_types::{CapabilityGrant, CapabilityGrantId, CapabilityName, LdmError, Result, UserId};
use sqlx::{PgPool, Row};

#[async_trait]
pub trait CapabilityStore: Send + Sync {
	async fn grant(&self, user_id: UserId, capability_name: CapabilityName, granted_by: UserId, expires_at: Option<DateTime<Utc>>) -> Result<CapabilityGrant>;
	async fn revoke(&self, id: CapabilityGrantId) -> Result<bool>;
	async fn get_for_user(&self, user_id: UserId) -> Result<Vec<CapabilityGrant>>;
	async fn has_capability(&self, user_id: UserId, capability_name: CapabilityName) -> Result<bool>;
	async fn get_all(&self) -> Result<Vec<CapabilityGrant>>;
}

const GRANT_COLUMNS: &str = "id, user_id, capability_name, granted_by, granted_at, expires_at";

fn pg_row_to_grant(r: &sqlx::postgres::PgRow) -> CapabilityGrant {
	CapabilityGrant {
		id: CapabilityGrantId::new(r.get("id")),
		user_id: UserId::new(r.get("user_id")),
		capability_name: r.get::<String, _>("capability_name").parse().unwrap_or(CapabilityName::DeletePlatform),
		granted_by: UserId::new(r.get("granted_by")),
		granted_at: r.get("granted_at"),
		expires_at: r.get("expires_at"),
	}
}

#[derive(Clone)]
pub struct OnlineCapabilityRepository {
	pool: PgPool,
}

impl OnlineCapabilityRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, capability = %capability_name))]
	pub async fn grant(&self, user_id: UserId, capability_name: CapabilityName, granted_by: UserId, expires_at: Option<DateTime<Utc>>) -> Result<CapabilityGrant> {
		let row = sqlx::query(&format!(
			"INSERT INTO ldm_capability_grants (user_id, capability_name, granted_by, granted_at, expires_at) VALUES ($1, $2, $3, now(), $4) RETURNING {GRANT_COLUMNS}"
		))
		.bind(user_id.get())
		.bind(capability_name.to_string())
		.bind(granted_by.get())
		.bind(expires_at)
		.fetch_one(&self.pool)
		.await?;
		Ok(pg_row_to_grant(&row))
	}

	pub async fn revoke(&self, id: CapabilityGrantId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM ldm_capability_grants WHERE id = $1").bind(id.get()).execute(&self.pool).await?;
		Ok(result.rows_affected() > 0)
	}

	pub async fn get_for_user(&self, user_id: UserId) -> Result<Vec<CapabilityGrant>> {
		let rows = sqlx::query(&format!("SELECT {GRANT_COLUMNS} FROM ldm_capability_grants WHERE user_id = $1 AND (expires_at IS NULL OR expires_at > now()) ORDER BY granted_at"))
			.bind(user_id.get())
			.fetch_all(&self.pool)
			.await?;
		Ok(rows.iter().map(pg_row_to_grant).collect())
	}

	pub async fn has_capability(&self, user_id: UserId, capability_name: CapabilityName) -> Result<bool> {
		let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM ldm_capability_grants WHERE user_id = $1 AND capability_name = $2 AND (expires_at IS NULL OR expires_at > now())) AS e")
			.bind(user_id.get())
			.bind(capability_name.to_string())
			.fetch_one(&self.pool)
			.await?;
		Ok(row.get("e"))
	}

	pub async fn get_all(&self) -> Result<Vec<CapabilityGrant>> {
		let rows = sqlx::query(&format!("SELECT {GRANT_COLUMNS} FROM ldm_capability_grants ORDER BY granted_at")).fetch_all(&self.pool).await?;
		Ok(rows.iter().map(pg_row_to_grant).collect())
	}
}

#[async_trait]
impl CapabilityStore for OnlineCapabilityRepository {
	async fn grant(&self, user_id: UserId, capability_name: CapabilityName, granted_by: UserId, expires_at: Option<DateTime<Utc>>) -> Result<CapabilityGrant> {
		self.grant(user_id, capability_name, granted_by, expires_at).await
	}
	async fn revoke(&self, id: CapabilityGrantId) -> Result<bool> {
		self.revoke(id).await
	}
	async fn get_for_user(&self, user_id: UserId) -> Result<Vec<CapabilityGrant>> {
		self.get_for_user(user_id).await
	}
	async fn has_capability(&self, user_id: UserId, capability_name: CapabilityName) -> Result<bool> {
		self.has_capability(user_id, capability_name).await
	}
	async fn get_all(&self) -> Result<Vec<CapabilityGrant>> {
		self.get_all().await
	}
}

/// Always empty on read, always `CapabilityRequiresOnline` on write (spec
/// §4.4.9, §9 "divergence MUST be explicitly declared and tested").
#[derive(Clone, Default)]
pub struct OfflineCapabilityRepository;

impl OfflineCapabilityRepository {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl CapabilityStore for OfflineCapabilityRepository {
	async fn grant(&self, _user_id: UserId, _capability_name: CapabilityName, _granted_by: UserId, _expires_at: Option<DateTime<Utc>>) -> Result<CapabilityGrant> {
		Err(LdmError::CapabilityRequiresOnline("capability grants require the online backend".into()))
	}
	async fn revoke(&self, _id: CapabilityGrantId) -> Result<bool> {
		Err(LdmError::CapabilityRequiresOnline("capability grants require the online backend".into()))
	}
	async fn get_for_user(&self, _user_id: UserId) -> Result<Vec<CapabilityGrant>> {
		Ok(Vec::new())
	}
	async fn has_capability(&self, _user_id: UserId, _capability_name: CapabilityName) -> Result<bool> {
		Ok(false)
	}
	async fn get_all(&self) -> Result<Vec<CapabilityGrant>> {
		Ok(Vec::new())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn offline_reads_are_empty_and_writes_require_online() {
		let repo = OfflineCapabilityRepository::new();
		assert!(repo.get_for_user(UserId::new(1)).await.unwrap().is_empty());
		assert!(!repo.has_capability(UserId::new(1), CapabilityName::EmptyTrash).await.unwrap());
		let err = repo.grant(UserId::new(1), CapabilityName::EmptyTrash, UserId::new(2), None).await.unwrap_err();
		assert!(matches!(err, LdmError::CapabilityRequiresOnline(_)));
	}
}
