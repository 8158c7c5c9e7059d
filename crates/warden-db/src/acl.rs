// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ACL store.
//!
//! Access-control entries bind one permission on one object to a set of
//! granted subjects. The `(object_id, permission_id)` unique constraint is the
//! tie-breaker when concurrent grants race to create the first entry.

use chrono::Utc;
use sqlx::{sqlite::SqliteConnection, Row};
use warden_core::{
	AccessControlEntry, AceId, ObjectId, Permission, PermissionId, SubjectId, SubjectKind,
	SubjectToken,
};

use crate::codec::{parse_timestamp, parse_uuid};
use crate::error::DbError;
use crate::permission_set::row_to_permission;

/// An ACE together with its permission and current grants.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantedAce {
	pub ace: AccessControlEntry,
	pub permission: Permission,
	/// Granted subjects, sorted by id.
	pub subjects: Vec<SubjectToken>,
}

impl GrantedAce {
	pub fn is_empty(&self) -> bool {
		self.subjects.is_empty()
	}
}

pub struct AclRepository<'c> {
	conn: &'c mut SqliteConnection,
}

impl<'c> AclRepository<'c> {
	pub fn new(conn: &'c mut SqliteConnection) -> Self {
		Self { conn }
	}

	// =========================================================================
	// Entries
	// =========================================================================

	#[tracing::instrument(skip(self), fields(object_id = %object_id, permission_id = %permission_id))]
	pub async fn ace_for(
		&mut self,
		object_id: &ObjectId,
		permission_id: &PermissionId,
	) -> Result<Option<AccessControlEntry>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, object_id, permission_id, created_at
			FROM access_control_entries
			WHERE object_id = ? AND permission_id = ?
			"#,
		)
		.bind(object_id.as_str())
		.bind(permission_id.to_string())
		.fetch_optional(&mut *self.conn)
		.await?;

		row.map(|r| row_to_ace(&r)).transpose()
	}

	/// Return the ACE for `(object, permission)`, creating an empty one first
	/// if none exists.
	#[tracing::instrument(skip(self), fields(object_id = %object_id, permission_id = %permission_id))]
	pub async fn ensure_ace(
		&mut self,
		object_id: &ObjectId,
		permission_id: &PermissionId,
	) -> Result<AccessControlEntry, DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO access_control_entries (id, object_id, permission_id, created_at)
			VALUES (?, ?, ?, ?)
			ON CONFLICT (object_id, permission_id) DO NOTHING
			"#,
		)
		.bind(AceId::generate().to_string())
		.bind(object_id.as_str())
		.bind(permission_id.to_string())
		.bind(Utc::now().to_rfc3339())
		.execute(&mut *self.conn)
		.await
		.map_err(|e| DbError::from_write(e, "access control entry"))?;

		if result.rows_affected() > 0 {
			tracing::debug!(object_id = %object_id, permission_id = %permission_id, "access control entry created");
		}

		self.ace_for(object_id, permission_id)
			.await?
			.ok_or_else(|| {
				DbError::Conflict(format!(
					"access control entry for object '{object_id}' vanished during upsert"
				))
			})
	}

	/// Every ACE on an object with its permission and grants, ordered by
	/// permission name.
	#[tracing::instrument(skip(self), fields(object_id = %object_id))]
	pub async fn aces_for_object(&mut self, object_id: &ObjectId) -> Result<Vec<GrantedAce>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT a.id AS ace_id, a.object_id, a.permission_id, a.created_at,
			       p.id, p.permission_set_id, p.name,
			       s.id AS subject_id, s.kind AS subject_kind
			FROM access_control_entries a
			INNER JOIN permissions p ON p.id = a.permission_id
			LEFT JOIN ace_subjects g ON g.ace_id = a.id
			LEFT JOIN subjects s ON s.id = g.subject_id
			WHERE a.object_id = ?
			ORDER BY p.name ASC, a.id ASC, s.id ASC
			"#,
		)
		.bind(object_id.as_str())
		.fetch_all(&mut *self.conn)
		.await?;

		let mut aces: Vec<GrantedAce> = Vec::new();
		for row in &rows {
			let ace_id: String = row.get("ace_id");
			let ace_id = AceId::new(parse_uuid(&ace_id, "ace id")?);

			if aces.last().map(|last| last.ace.id != ace_id).unwrap_or(true) {
				let created_at: String = row.get("created_at");
				let object_id: String = row.get("object_id");
				aces.push(GrantedAce {
					ace: AccessControlEntry {
						id: ace_id,
						object_id: ObjectId::new(object_id),
						permission_id: {
							let raw: String = row.get("permission_id");
							PermissionId::new(parse_uuid(&raw, "permission_id")?)
						},
						created_at: parse_timestamp(&created_at, "created_at")?,
					},
					permission: row_to_permission(row)?,
					subjects: Vec::new(),
				});
			}

			let subject_id: Option<String> = row.get("subject_id");
			let subject_kind: Option<String> = row.get("subject_kind");
			if let (Some(id), Some(kind), Some(current)) = (subject_id, subject_kind, aces.last_mut()) {
				current.subjects.push(SubjectToken {
					kind: parse_kind(&kind)?,
					id: SubjectId::new(id),
				});
			}
		}

		Ok(aces)
	}

	/// Delete every ACE on an object, grant edges first.
	#[tracing::instrument(skip(self), fields(object_id = %object_id))]
	pub async fn delete_aces_for_object(&mut self, object_id: &ObjectId) -> Result<u64, DbError> {
		sqlx::query(
			r#"
			DELETE FROM ace_subjects
			WHERE ace_id IN (SELECT id FROM access_control_entries WHERE object_id = ?)
			"#,
		)
		.bind(object_id.as_str())
		.execute(&mut *self.conn)
		.await?;

		let result = sqlx::query("DELETE FROM access_control_entries WHERE object_id = ?")
			.bind(object_id.as_str())
			.execute(&mut *self.conn)
			.await?;

		Ok(result.rows_affected())
	}

	/// Delete a single ACE and its grant edges.
	#[tracing::instrument(skip(self), fields(ace_id = %ace_id))]
	pub async fn delete_ace(&mut self, ace_id: &AceId) -> Result<bool, DbError> {
		sqlx::query("DELETE FROM ace_subjects WHERE ace_id = ?")
			.bind(ace_id.to_string())
			.execute(&mut *self.conn)
			.await?;

		let result = sqlx::query("DELETE FROM access_control_entries WHERE id = ?")
			.bind(ace_id.to_string())
			.execute(&mut *self.conn)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	// =========================================================================
	// Permission-wide queries
	// =========================================================================

	/// Number of grant edges across all ACEs for a permission.
	#[tracing::instrument(skip(self), fields(permission_id = %permission_id))]
	pub async fn count_grants_for_permission(
		&mut self,
		permission_id: &PermissionId,
	) -> Result<i64, DbError> {
		let count: i64 = sqlx::query_scalar(
			r#"
			SELECT COUNT(*)
			FROM ace_subjects g
			INNER JOIN access_control_entries a ON a.id = g.ace_id
			WHERE a.permission_id = ?
			"#,
		)
		.bind(permission_id.to_string())
		.fetch_one(&mut *self.conn)
		.await?;
		Ok(count)
	}

	/// Delete every ACE for a permission. Callers check that none grants
	/// anyone first.
	#[tracing::instrument(skip(self), fields(permission_id = %permission_id))]
	pub async fn delete_aces_for_permission(
		&mut self,
		permission_id: &PermissionId,
	) -> Result<u64, DbError> {
		sqlx::query(
			r#"
			DELETE FROM ace_subjects
			WHERE ace_id IN (SELECT id FROM access_control_entries WHERE permission_id = ?)
			"#,
		)
		.bind(permission_id.to_string())
		.execute(&mut *self.conn)
		.await?;

		let result = sqlx::query("DELETE FROM access_control_entries WHERE permission_id = ?")
			.bind(permission_id.to_string())
			.execute(&mut *self.conn)
			.await?;
		Ok(result.rows_affected())
	}

	// =========================================================================
	// Grants
	// =========================================================================

	/// Grant an ACE to a subject. Granting twice is a no-op.
	///
	/// # Returns
	/// `true` if a new grant edge was written.
	#[tracing::instrument(skip(self), fields(ace_id = %ace_id, subject_id = %subject_id))]
	pub async fn grant(&mut self, ace_id: &AceId, subject_id: &SubjectId) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO ace_subjects (ace_id, subject_id, created_at)
			VALUES (?, ?, ?)
			ON CONFLICT (ace_id, subject_id) DO NOTHING
			"#,
		)
		.bind(ace_id.to_string())
		.bind(subject_id.as_str())
		.bind(Utc::now().to_rfc3339())
		.execute(&mut *self.conn)
		.await
		.map_err(|e| DbError::from_write(e, "grant"))?;

		let added = result.rows_affected() > 0;
		if added {
			tracing::debug!(ace_id = %ace_id, subject_id = %subject_id, "grant added");
		}
		Ok(added)
	}

	/// Remove a subject from an ACE.
	///
	/// # Returns
	/// `true` if the subject was granted and has been removed.
	#[tracing::instrument(skip(self), fields(ace_id = %ace_id, subject_id = %subject_id))]
	pub async fn revoke(&mut self, ace_id: &AceId, subject_id: &SubjectId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM ace_subjects WHERE ace_id = ? AND subject_id = ?")
			.bind(ace_id.to_string())
			.bind(subject_id.as_str())
			.execute(&mut *self.conn)
			.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(ace_id = %ace_id, subject_id = %subject_id, "grant revoked");
		}
		Ok(removed)
	}

	/// Subjects directly granted an ACE, sorted by id.
	#[tracing::instrument(skip(self), fields(ace_id = %ace_id))]
	pub async fn granted_subjects(&mut self, ace_id: &AceId) -> Result<Vec<SubjectToken>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT s.id, s.kind
			FROM ace_subjects g
			INNER JOIN subjects s ON s.id = g.subject_id
			WHERE g.ace_id = ?
			ORDER BY s.id ASC
			"#,
		)
		.bind(ace_id.to_string())
		.fetch_all(&mut *self.conn)
		.await?;

		rows.iter()
			.map(|row| {
				let kind: String = row.get("kind");
				Ok(SubjectToken {
					kind: parse_kind(&kind)?,
					id: SubjectId::new(row.get::<String, _>("id")),
				})
			})
			.collect()
	}

	/// Objects on which a user holds at least one grant, directly or through
	/// a group.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn objects_granted_to(&mut self, user_id: &SubjectId) -> Result<Vec<ObjectId>, DbError> {
		let ids: Vec<String> = sqlx::query_scalar(
			r#"
			SELECT DISTINCT a.object_id
			FROM access_control_entries a
			INNER JOIN ace_subjects g ON g.ace_id = a.id
			WHERE g.subject_id = ?
			   OR g.subject_id IN (SELECT group_id FROM memberships WHERE user_id = ?)
			ORDER BY a.object_id ASC
			"#,
		)
		.bind(user_id.as_str())
		.bind(user_id.as_str())
		.fetch_all(&mut *self.conn)
		.await?;

		Ok(ids.into_iter().map(ObjectId::new).collect())
	}
}

fn parse_kind(kind: &str) -> Result<SubjectKind, DbError> {
	match kind {
		"user" => Ok(SubjectKind::User),
		"group" => Ok(SubjectKind::Group),
		other => Err(DbError::Internal(format!("Invalid subject kind: {other}"))),
	}
}

fn row_to_ace(row: &sqlx::sqlite::SqliteRow) -> Result<AccessControlEntry, DbError> {
	let id: String = row.get("id");
	let permission_id: String = row.get("permission_id");
	let created_at: String = row.get("created_at");

	Ok(AccessControlEntry {
		id: AceId::new(parse_uuid(&id, "ace id")?),
		object_id: ObjectId::new(row.get::<String, _>("object_id")),
		permission_id: PermissionId::new(parse_uuid(&permission_id, "permission_id")?),
		created_at: parse_timestamp(&created_at, "created_at")?,
	})
}
