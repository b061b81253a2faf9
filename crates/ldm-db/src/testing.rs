// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory offline schema for unit tests, following the teacher's
//! `create_test_pool` / `create_*_table` convention. Online-adapter tests
//! need a live Postgres and are gated behind the `integration-postgres`
//! feature (see DESIGN.md).

use sqlx::sqlite::SqlitePool;

use ldm_types::{OFFLINE_STORAGE_NAME, OFFLINE_STORAGE_PLATFORM_ID, OFFLINE_STORAGE_PROJECT_ID};

pub async fn create_test_pool() -> SqlitePool {
	SqlitePool::connect(":memory:").await.unwrap()
}

pub async fn create_offline_schema(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_platforms (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL,
			description TEXT,
			owner_id INTEGER NOT NULL,
			is_restricted INTEGER NOT NULL DEFAULT 0
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_projects (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL,
			description TEXT,
			owner_id INTEGER NOT NULL,
			platform_id INTEGER REFERENCES offline_platforms(id),
			is_restricted INTEGER NOT NULL DEFAULT 0
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_folders (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			project_id INTEGER NOT NULL REFERENCES offline_projects(id),
			parent_id INTEGER REFERENCES offline_folders(id),
			name TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_files (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			project_id INTEGER NOT NULL REFERENCES offline_projects(id),
			folder_id INTEGER REFERENCES offline_folders(id),
			name TEXT NOT NULL,
			original_filename TEXT NOT NULL,
			format TEXT NOT NULL,
			row_count INTEGER NOT NULL DEFAULT 0,
			source_language TEXT NOT NULL,
			target_language TEXT,
			extra_data TEXT,
			sync_status TEXT NOT NULL DEFAULT 'local',
			server_id INTEGER,
			server_project_id INTEGER,
			server_folder_id INTEGER,
			downloaded_at TEXT
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_rows (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			file_id INTEGER NOT NULL REFERENCES offline_files(id),
			row_num INTEGER NOT NULL,
			string_id TEXT,
			source TEXT NOT NULL,
			target TEXT NOT NULL DEFAULT '',
			memo TEXT,
			status TEXT NOT NULL DEFAULT 'pending',
			qa_flag_count INTEGER NOT NULL DEFAULT 0,
			extra_data TEXT,
			sync_status TEXT NOT NULL DEFAULT 'local',
			server_id INTEGER,
			server_file_id INTEGER
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_row_edit_history (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			row_id INTEGER NOT NULL REFERENCES offline_rows(id),
			field TEXT NOT NULL,
			old_value TEXT,
			new_value TEXT,
			edited_by INTEGER,
			edited_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_tms (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL,
			description TEXT,
			owner_id INTEGER,
			source_lang TEXT NOT NULL,
			target_lang TEXT NOT NULL,
			entry_count INTEGER NOT NULL DEFAULT 0,
			mode TEXT NOT NULL DEFAULT 'standard',
			status TEXT NOT NULL DEFAULT 'pending',
			indexed_at TEXT
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_tm_entries (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			tm_id INTEGER NOT NULL REFERENCES offline_tms(id),
			source_text TEXT NOT NULL,
			target_text TEXT NOT NULL,
			source_hash TEXT NOT NULL,
			string_id TEXT,
			is_confirmed INTEGER NOT NULL DEFAULT 0,
			created_by INTEGER,
			updated_at TEXT NOT NULL,
			updated_by INTEGER,
			confirmed_by INTEGER,
			confirmed_at TEXT
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_tm_assignments (
			tm_id INTEGER NOT NULL REFERENCES offline_tms(id),
			platform_id INTEGER,
			project_id INTEGER,
			folder_id INTEGER,
			is_active INTEGER NOT NULL DEFAULT 0,
			activated_at TEXT,
			PRIMARY KEY (tm_id, platform_id, project_id, folder_id)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_tm_project_links (
			tm_id INTEGER NOT NULL REFERENCES offline_tms(id),
			project_id INTEGER NOT NULL REFERENCES offline_projects(id),
			priority INTEGER NOT NULL DEFAULT 0,
			PRIMARY KEY (tm_id, project_id)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_qa_results (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			row_id INTEGER NOT NULL REFERENCES offline_rows(id),
			file_id INTEGER NOT NULL REFERENCES offline_files(id),
			check_type TEXT NOT NULL,
			severity TEXT NOT NULL,
			message TEXT NOT NULL,
			details TEXT,
			created_at TEXT NOT NULL,
			resolved_at TEXT,
			resolved_by INTEGER
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_trash (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			item_type TEXT NOT NULL,
			item_id INTEGER NOT NULL,
			item_name TEXT NOT NULL,
			item_data TEXT NOT NULL,
			parent_project_id INTEGER,
			parent_folder_id INTEGER,
			deleted_by INTEGER NOT NULL,
			deleted_at TEXT NOT NULL,
			expires_at TEXT NOT NULL,
			status TEXT NOT NULL DEFAULT 'trashed'
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_local_changes (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			entity_type TEXT NOT NULL,
			entity_id INTEGER NOT NULL,
			field TEXT NOT NULL,
			old_value TEXT,
			new_value TEXT,
			sync_status TEXT NOT NULL DEFAULT 'pending',
			created_at TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS offline_sync_subscriptions (
			entity_type TEXT NOT NULL,
			entity_id INTEGER NOT NULL,
			entity_name TEXT NOT NULL,
			status TEXT NOT NULL,
			created_at TEXT NOT NULL,
			PRIMARY KEY (entity_type, entity_id)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	seed_offline_storage(pool).await;
}

/// Seed the well-known Offline-Storage platform/project idempotently
/// (spec §6). Uses `INSERT OR IGNORE` with explicit IDs since SQLite lets
/// an autoincrement table accept an explicit negative primary key.
async fn seed_offline_storage(pool: &SqlitePool) {
	sqlx::query("INSERT OR IGNORE INTO offline_platforms (id, name, owner_id, is_restricted) VALUES (?, ?, 0, 0)")
		.bind(OFFLINE_STORAGE_PLATFORM_ID.get())
		.bind(OFFLINE_STORAGE_NAME)
		.execute(pool)
		.await
		.unwrap();

	sqlx::query(
		"INSERT OR IGNORE INTO offline_projects (id, name, owner_id, platform_id, is_restricted) VALUES (?, ?, 0, ?, 0)",
	)
	.bind(OFFLINE_STORAGE_PROJECT_ID.get())
	.bind(OFFLINE_STORAGE_NAME)
	.bind(OFFLINE_STORAGE_PLATFORM_ID.get())
	.execute(pool)
	.await
	.unwrap();
}

/// An in-memory SQLite pool with the full offline schema applied, ready
/// for a repository test.
pub async fn offline_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	create_offline_schema(&pool).await;
	pool
}
