// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity store.
//!
//! This module provides database access for subjects:
//! - User and group CRUD
//! - Group membership edges (groups contain users only)
//! - Auto-vivification of users named by grants or group members

use chrono::Utc;
use sqlx::{sqlite::SqliteConnection, Row};
use warden_core::{Subject, SubjectId, SubjectKind};

use crate::codec::{decode_info, encode_info, parse_timestamp};
use crate::error::DbError;

/// Repository for subjects and memberships.
///
/// Borrows a connection so that several stores can take part in the same
/// transaction.
pub struct SubjectRepository<'c> {
	conn: &'c mut SqliteConnection,
}

impl<'c> SubjectRepository<'c> {
	pub fn new(conn: &'c mut SqliteConnection) -> Self {
		Self { conn }
	}

	// =========================================================================
	// Subjects
	// =========================================================================

	/// Insert a new subject.
	///
	/// # Errors
	/// Returns `DbError::InvalidArgument` if the id is already used by any
	/// subject, of either kind.
	#[tracing::instrument(skip(self, subject), fields(subject_id = %subject.id, kind = %subject.kind))]
	pub async fn create_subject(&mut self, subject: &Subject) -> Result<(), DbError> {
		if self.get_subject(&subject.id, None).await?.is_some() {
			return Err(DbError::InvalidArgument(format!(
				"subject id '{}' is already in use",
				subject.id
			)));
		}

		sqlx::query(
			r#"
			INSERT INTO subjects (id, kind, additional_info, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(subject.id.as_str())
		.bind(subject.kind.as_str())
		.bind(encode_info(&subject.additional_info)?)
		.bind(subject.created_at.to_rfc3339())
		.bind(subject.updated_at.to_rfc3339())
		.execute(&mut *self.conn)
		.await
		.map_err(|e| DbError::from_write(e, "subject"))?;

		tracing::debug!(subject_id = %subject.id, kind = %subject.kind, "subject created");
		Ok(())
	}

	/// Look up a subject by its immutable id, optionally filtered by kind.
	#[tracing::instrument(skip(self), fields(subject_id = %id))]
	pub async fn get_subject(
		&mut self,
		id: &SubjectId,
		kind: Option<SubjectKind>,
	) -> Result<Option<Subject>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, kind, additional_info, created_at, updated_at
			FROM subjects
			WHERE id = ? AND (? IS NULL OR kind = ?)
			"#,
		)
		.bind(id.as_str())
		.bind(kind.map(|k| k.as_str()))
		.bind(kind.map(|k| k.as_str()))
		.fetch_optional(&mut *self.conn)
		.await?;

		row.map(|r| row_to_subject(&r)).transpose()
	}

	/// List subjects ordered by id, optionally filtered by kind.
	#[tracing::instrument(skip(self))]
	pub async fn list_subjects(&mut self, kind: Option<SubjectKind>) -> Result<Vec<Subject>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, kind, additional_info, created_at, updated_at
			FROM subjects
			WHERE ? IS NULL OR kind = ?
			ORDER BY id ASC
			"#,
		)
		.bind(kind.map(|k| k.as_str()))
		.bind(kind.map(|k| k.as_str()))
		.fetch_all(&mut *self.conn)
		.await?;

		rows.iter().map(row_to_subject).collect()
	}

	/// Return the user with this id, creating it if no subject has the id yet.
	///
	/// # Errors
	/// Returns `DbError::InvalidArgument` if the id belongs to a group.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn ensure_user(&mut self, id: &SubjectId) -> Result<Subject, DbError> {
		let candidate = Subject::new(id.clone(), SubjectKind::User, None);
		let result = sqlx::query(
			r#"
			INSERT INTO subjects (id, kind, additional_info, created_at, updated_at)
			VALUES (?, 'user', NULL, ?, ?)
			ON CONFLICT (id) DO NOTHING
			"#,
		)
		.bind(id.as_str())
		.bind(candidate.created_at.to_rfc3339())
		.bind(candidate.updated_at.to_rfc3339())
		.execute(&mut *self.conn)
		.await
		.map_err(|e| DbError::from_write(e, "user"))?;

		if result.rows_affected() > 0 {
			tracing::debug!(user_id = %id, "user created on demand");
			return Ok(candidate);
		}

		let existing = self
			.get_subject(id, None)
			.await?
			.ok_or_else(|| DbError::Internal(format!("subject '{id}' vanished during upsert")))?;
		if existing.kind != SubjectKind::User {
			return Err(DbError::InvalidArgument(format!(
				"subject '{id}' is a group, not a user"
			)));
		}
		Ok(existing)
	}

	/// Delete a subject together with its membership and grant edges.
	///
	/// # Returns
	/// `true` if a subject was removed, `false` if not found.
	#[tracing::instrument(skip(self), fields(subject_id = %id))]
	pub async fn delete_subject(&mut self, id: &SubjectId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM subjects WHERE id = ?")
			.bind(id.as_str())
			.execute(&mut *self.conn)
			.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(subject_id = %id, "subject deleted");
		}
		Ok(removed)
	}

	// =========================================================================
	// Memberships
	// =========================================================================

	/// Add a user to a group. Adding an existing member is a no-op.
	///
	/// The user is created if no subject with that id exists.
	///
	/// # Returns
	/// `true` if a new membership edge was written.
	///
	/// # Errors
	/// - `DbError::NotFound` if the group does not exist
	/// - `DbError::InvalidArgument` if `user_id` names a group
	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn add_member(
		&mut self,
		group_id: &SubjectId,
		user_id: &SubjectId,
	) -> Result<bool, DbError> {
		if self
			.get_subject(group_id, Some(SubjectKind::Group))
			.await?
			.is_none()
		{
			return Err(DbError::NotFound(format!("group '{group_id}'")));
		}
		self.ensure_user(user_id).await?;

		let result = sqlx::query(
			r#"
			INSERT INTO memberships (group_id, user_id, created_at)
			VALUES (?, ?, ?)
			ON CONFLICT (group_id, user_id) DO NOTHING
			"#,
		)
		.bind(group_id.as_str())
		.bind(user_id.as_str())
		.bind(Utc::now().to_rfc3339())
		.execute(&mut *self.conn)
		.await
		.map_err(|e| DbError::from_write(e, "membership"))?;

		let added = result.rows_affected() > 0;
		if added {
			tracing::debug!(group_id = %group_id, user_id = %user_id, "member added to group");
		}
		Ok(added)
	}

	/// Remove a user from a group.
	///
	/// # Returns
	/// `true` if a member was removed, `false` if not found.
	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn remove_member(
		&mut self,
		group_id: &SubjectId,
		user_id: &SubjectId,
	) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM memberships WHERE group_id = ? AND user_id = ?")
			.bind(group_id.as_str())
			.bind(user_id.as_str())
			.execute(&mut *self.conn)
			.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(group_id = %group_id, user_id = %user_id, "member removed from group");
		}
		Ok(removed)
	}

	/// User ids belonging to a group, ordered by id.
	#[tracing::instrument(skip(self), fields(group_id = %group_id))]
	pub async fn members_of(&mut self, group_id: &SubjectId) -> Result<Vec<SubjectId>, DbError> {
		let ids: Vec<String> = sqlx::query_scalar(
			r#"
			SELECT user_id
			FROM memberships
			WHERE group_id = ?
			ORDER BY user_id ASC
			"#,
		)
		.bind(group_id.as_str())
		.fetch_all(&mut *self.conn)
		.await?;

		Ok(ids.into_iter().map(SubjectId::new).collect())
	}

	/// Group ids containing a user, ordered by id.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn groups_containing(
		&mut self,
		user_id: &SubjectId,
	) -> Result<Vec<SubjectId>, DbError> {
		let ids: Vec<String> = sqlx::query_scalar(
			r#"
			SELECT group_id
			FROM memberships
			WHERE user_id = ?
			ORDER BY group_id ASC
			"#,
		)
		.bind(user_id.as_str())
		.fetch_all(&mut *self.conn)
		.await?;

		Ok(ids.into_iter().map(SubjectId::new).collect())
	}
}

fn row_to_subject(row: &sqlx::sqlite::SqliteRow) -> Result<Subject, DbError> {
	let kind_str: String = row.get("kind");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	let kind = match kind_str.as_str() {
		"user" => SubjectKind::User,
		"group" => SubjectKind::Group,
		other => return Err(DbError::Internal(format!("Invalid subject kind: {other}"))),
	};

	Ok(Subject {
		id: SubjectId::new(row.get::<String, _>("id")),
		kind,
		additional_info: decode_info(row.get("additional_info"))?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}
