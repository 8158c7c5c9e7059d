// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission catalog.
//!
//! Permission sets are looked up by their globally unique name. Permissions
//! are unique by `(permission_set_id, name)` and keep the order in which they
//! were declared.

use chrono::Utc;
use sqlx::{sqlite::SqliteConnection, Row};
use warden_core::{Permission, PermissionId, PermissionSet, PermissionSetId};

use crate::codec::{decode_info, encode_info, parse_timestamp, parse_uuid, placeholders};
use crate::error::DbError;

pub struct PermissionSetRepository<'c> {
	conn: &'c mut SqliteConnection,
}

impl<'c> PermissionSetRepository<'c> {
	pub fn new(conn: &'c mut SqliteConnection) -> Self {
		Self { conn }
	}

	// =========================================================================
	// Permission sets
	// =========================================================================

	/// Create a permission set and its permissions.
	///
	/// Duplicate permission names collapse to a single permission.
	///
	/// # Errors
	/// Returns `DbError::InvalidArgument` if the name is already taken.
	#[tracing::instrument(skip(self, set, permissions), fields(name = %set.name, count = permissions.len()))]
	pub async fn create_permission_set(
		&mut self,
		set: &PermissionSet,
		permissions: &[String],
	) -> Result<Vec<Permission>, DbError> {
		if self.get_permission_set(&set.name).await?.is_some() {
			return Err(DbError::InvalidArgument(format!(
				"permission set '{}' already exists",
				set.name
			)));
		}

		sqlx::query(
			r#"
			INSERT INTO permission_sets (id, name, additional_info, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(set.id.to_string())
		.bind(&set.name)
		.bind(encode_info(&set.additional_info)?)
		.bind(set.created_at.to_rfc3339())
		.bind(set.updated_at.to_rfc3339())
		.execute(&mut *self.conn)
		.await
		.map_err(|e| DbError::from_write(e, "permission set"))?;

		for name in permissions {
			self.add_permission(&set.id, name).await?;
		}

		tracing::debug!(name = %set.name, "permission set created");
		self.permissions_of(&set.id).await
	}

	/// Get a permission set by name.
	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn get_permission_set(&mut self, name: &str) -> Result<Option<PermissionSet>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, additional_info, created_at, updated_at
			FROM permission_sets
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&mut *self.conn)
		.await?;

		row.map(|r| row_to_permission_set(&r)).transpose()
	}

	/// List all permission sets ordered by name.
	#[tracing::instrument(skip(self))]
	pub async fn list_permission_sets(&mut self) -> Result<Vec<PermissionSet>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, additional_info, created_at, updated_at
			FROM permission_sets
			ORDER BY name ASC
			"#,
		)
		.fetch_all(&mut *self.conn)
		.await?;

		rows.iter().map(row_to_permission_set).collect()
	}

	/// Replace a permission set's metadata.
	#[tracing::instrument(skip(self, additional_info), fields(set_id = %id))]
	pub async fn update_info(
		&mut self,
		id: &PermissionSetId,
		additional_info: &Option<serde_json::Value>,
	) -> Result<(), DbError> {
		sqlx::query(
			r#"
			UPDATE permission_sets
			SET additional_info = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(encode_info(additional_info)?)
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&mut *self.conn)
		.await?;

		Ok(())
	}

	/// Bump `updated_at` after the permission list changed.
	pub async fn touch(&mut self, id: &PermissionSetId) -> Result<(), DbError> {
		sqlx::query("UPDATE permission_sets SET updated_at = ? WHERE id = ?")
			.bind(Utc::now().to_rfc3339())
			.bind(id.to_string())
			.execute(&mut *self.conn)
			.await?;
		Ok(())
	}

	/// Delete a permission set and the permissions it owns.
	///
	/// Callers must make sure no object is bound to the set first.
	#[tracing::instrument(skip(self), fields(set_id = %id))]
	pub async fn delete_permission_set(&mut self, id: &PermissionSetId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM permission_sets WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *self.conn)
			.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(set_id = %id, "permission set deleted");
		}
		Ok(removed)
	}

	// =========================================================================
	// Permissions
	// =========================================================================

	/// Add a permission to a set. Adding an existing name is a no-op.
	#[tracing::instrument(skip(self), fields(set_id = %set_id, permission = %name))]
	pub async fn add_permission(
		&mut self,
		set_id: &PermissionSetId,
		name: &str,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO permissions (id, permission_set_id, name, position)
			VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM permissions WHERE permission_set_id = ?))
			ON CONFLICT (permission_set_id, name) DO NOTHING
			"#,
		)
		.bind(PermissionId::generate().to_string())
		.bind(set_id.to_string())
		.bind(name)
		.bind(set_id.to_string())
		.execute(&mut *self.conn)
		.await
		.map_err(|e| DbError::from_write(e, "permission"))?;

		Ok(result.rows_affected() > 0)
	}

	/// Remove a single permission row.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn remove_permission(&mut self, id: &PermissionId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM permissions WHERE id = ?")
			.bind(id.to_string())
			.execute(&mut *self.conn)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Permissions owned by a set, in declaration order.
	#[tracing::instrument(skip(self), fields(set_id = %set_id))]
	pub async fn permissions_of(
		&mut self,
		set_id: &PermissionSetId,
	) -> Result<Vec<Permission>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, permission_set_id, name
			FROM permissions
			WHERE permission_set_id = ?
			ORDER BY position ASC
			"#,
		)
		.bind(set_id.to_string())
		.fetch_all(&mut *self.conn)
		.await?;

		rows.iter().map(row_to_permission).collect()
	}

	/// Resolve a permission by name, only if one of the given sets owns it.
	///
	/// When several of the sets define the name, the earliest set in
	/// `set_names` wins.
	#[tracing::instrument(skip(self), fields(permission = %permission_name))]
	pub async fn permission_named(
		&mut self,
		set_names: &[String],
		permission_name: &str,
	) -> Result<Option<Permission>, DbError> {
		if set_names.is_empty() {
			return Ok(None);
		}

		let sql = format!(
			r#"
			SELECT p.id, p.permission_set_id, p.name, s.name AS set_name
			FROM permissions p
			INNER JOIN permission_sets s ON s.id = p.permission_set_id
			WHERE p.name = ? AND s.name IN ({})
			"#,
			placeholders(set_names.len())
		);
		let mut query = sqlx::query(&sql).bind(permission_name);
		for set_name in set_names {
			query = query.bind(set_name);
		}
		let rows = query.fetch_all(&mut *self.conn).await?;

		let mut best: Option<(usize, Permission)> = None;
		for row in &rows {
			let set_name: String = row.get("set_name");
			let rank = set_names
				.iter()
				.position(|n| *n == set_name)
				.unwrap_or(usize::MAX);
			if best.as_ref().map(|(r, _)| rank < *r).unwrap_or(true) {
				best = Some((rank, row_to_permission(row)?));
			}
		}
		Ok(best.map(|(_, permission)| permission))
	}

	/// Which of `names` exist anywhere in the catalog, regardless of set.
	///
	/// Matching is exact and case-sensitive. Each existing name is returned once.
	#[tracing::instrument(skip(self, names), fields(count = names.len()))]
	pub async fn existing_permission_names(&mut self, names: &[String]) -> Result<Vec<String>, DbError> {
		if names.is_empty() {
			return Ok(vec![]);
		}

		let sql = format!(
			"SELECT DISTINCT name FROM permissions WHERE name IN ({}) ORDER BY name ASC",
			placeholders(names.len())
		);
		let mut query = sqlx::query_scalar::<_, String>(&sql);
		for name in names {
			query = query.bind(name);
		}
		Ok(query.fetch_all(&mut *self.conn).await?)
	}
}

pub(crate) fn row_to_permission_set(row: &sqlx::sqlite::SqliteRow) -> Result<PermissionSet, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(PermissionSet {
		id: PermissionSetId::new(parse_uuid(&id, "permission set id")?),
		name: row.get("name"),
		additional_info: decode_info(row.get("additional_info"))?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

pub(crate) fn row_to_permission(row: &sqlx::sqlite::SqliteRow) -> Result<Permission, DbError> {
	let id: String = row.get("id");
	let set_id: String = row.get("permission_set_id");

	Ok(Permission {
		id: PermissionId::new(parse_uuid(&id, "permission id")?),
		permission_set_id: PermissionSetId::new(parse_uuid(&set_id, "permission_set_id")?),
		name: row.get("name"),
	})
}
