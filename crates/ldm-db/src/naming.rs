// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Naming Service (spec §4.3): unique-name policy and auto-rename
//! generation shared by every entity repository that enforces a sibling
//! namespace (platforms, projects, folders, files, TMs).

use async_trait::async_trait;
use ldm_types::LdmError;

/// Per-scope collision check, implemented by each repository against its
/// own sibling namespace (global for platforms/TMs, per-platform for
/// projects, `(project_id, parent_id)` for folders/files — spec §4.3).
#[async_trait]
pub trait NameExistsCheck: Send + Sync {
	/// Case-insensitive existence check within the caller's scope,
	/// optionally excluding one ID (used by rename, which must not collide
	/// with itself).
	async fn name_exists(&self, candidate: &str, exclude_id: Option<i64>) -> Result<bool, LdmError>;
}

/// Split `name` into `(base, ext)` the way the service does before
/// appending a numeric suffix: at the last `.`, unless the name begins
/// with `.` (dotfiles keep an empty extension) — spec §4.3 step 2.
pub fn split_base_ext(name: &str) -> (&str, &str) {
	if name.starts_with('.') {
		return (name, "");
	}
	match name.rfind('.') {
		Some(idx) => (&name[..idx], &name[idx..]),
		None => (name, ""),
	}
}

/// Produce a name guaranteed not to collide in `checker`'s scope (spec
/// §4.3): return `desired_name` unchanged if free, otherwise
/// `{base}_{n}{ext}` for the smallest `n >= 1` that is free.
pub async fn generate_unique_name(
	desired_name: &str,
	checker: &dyn NameExistsCheck,
	exclude_id: Option<i64>,
) -> Result<String, LdmError> {
	if !checker.name_exists(desired_name, exclude_id).await? {
		return Ok(desired_name.to_string());
	}

	let (base, ext) = split_base_ext(desired_name);
	let mut n: u64 = 1;
	loop {
		let candidate = format!("{base}_{n}{ext}");
		if !checker.name_exists(&candidate, exclude_id).await? {
			return Ok(candidate);
		}
		n += 1;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;
	use std::sync::Mutex;

	struct FakeChecker(Mutex<HashSet<String>>);

	#[async_trait]
	impl NameExistsCheck for FakeChecker {
		async fn name_exists(&self, candidate: &str, _exclude_id: Option<i64>) -> Result<bool, LdmError> {
			Ok(self.0.lock().unwrap().contains(&candidate.to_lowercase()))
		}
	}

	#[test]
	fn splits_extension_at_last_dot() {
		assert_eq!(split_base_ext("report.final.xlsx"), ("report.final", ".xlsx"));
		assert_eq!(split_base_ext("readme"), ("readme", ""));
		assert_eq!(split_base_ext(".gitignore"), (".gitignore", ""));
	}

	#[tokio::test]
	async fn returns_desired_name_when_free() {
		let checker = FakeChecker(Mutex::new(HashSet::new()));
		let name = generate_unique_name("Alpha", &checker, None).await.unwrap();
		assert_eq!(name, "Alpha");
	}

	#[tokio::test]
	async fn appends_smallest_free_suffix_preserving_extension() {
		let taken: HashSet<String> = ["alpha.xlsx", "alpha_1.xlsx"].iter().map(|s| s.to_string()).collect();
		let checker = FakeChecker(Mutex::new(taken));
		let name = generate_unique_name("Alpha.xlsx", &checker, None).await.unwrap();
		assert_eq!(name, "Alpha_2.xlsx");
	}
}
