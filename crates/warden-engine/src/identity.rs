// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Users, groups and memberships.

use sqlx::sqlite::SqliteConnection;
use warden_core::{
	AccessError, GroupInput, Result, Subject, SubjectId, SubjectKind, SubjectToken, SubjectView,
	UserInfo,
};
use warden_db::{AclRepository, SubjectRepository};

use crate::engine::{commit, AccessEngine};
use crate::retry::retry;

impl AccessEngine {
	/// Create a user or group.
	///
	/// A server id is generated when `id` is `None`.
	///
	/// # Errors
	/// Returns `InvalidArgument` if `id` is empty or already used by any
	/// subject.
	#[tracing::instrument(skip(self, additional_info), fields(kind = %kind, subject_id = ?id))]
	pub async fn create_subject(
		&self,
		kind: SubjectKind,
		id: Option<&SubjectId>,
		additional_info: Option<serde_json::Value>,
	) -> Result<SubjectView> {
		retry(&self.retry, || {
			self.create_subject_once(kind, id, &additional_info, &[])
		})
		.await
	}

	pub async fn create_user(
		&self,
		id: Option<&SubjectId>,
		additional_info: Option<serde_json::Value>,
	) -> Result<SubjectView> {
		self.create_subject(SubjectKind::User, id, additional_info).await
	}

	/// Create a group and add its members, creating member users that do not
	/// exist yet.
	#[tracing::instrument(skip(self, input), fields(group_id = ?input.id, members = input.members.len()))]
	pub async fn create_group(&self, input: &GroupInput) -> Result<SubjectView> {
		retry(&self.retry, || {
			self.create_subject_once(
				SubjectKind::Group,
				input.id.as_ref(),
				&input.additional_info,
				&input.members,
			)
		})
		.await
	}

	async fn create_subject_once(
		&self,
		kind: SubjectKind,
		id: Option<&SubjectId>,
		additional_info: &Option<serde_json::Value>,
		members: &[SubjectId],
	) -> Result<SubjectView> {
		let id = match id {
			Some(id) if id.as_str().trim().is_empty() => {
				return Err(AccessError::invalid("subject id must not be empty"));
			}
			Some(id) => id.clone(),
			None => SubjectId::generate(),
		};

		let mut tx = self.begin().await?;
		let subject = Subject::new(id, kind, additional_info.clone());

		let mut subjects = SubjectRepository::new(&mut tx);
		subjects.create_subject(&subject).await?;
		for member in members {
			subjects.add_member(&subject.id, member).await?;
		}

		let view = subject_view(&mut tx, subject).await?;
		commit(tx).await?;

		tracing::info!(subject_id = %view.id, kind = %kind, "subject created");
		Ok(view)
	}

	/// Look up a subject, optionally requiring a kind.
	#[tracing::instrument(skip(self), fields(subject_id = %id))]
	pub async fn get_subject(&self, id: &SubjectId, kind: Option<SubjectKind>) -> Result<SubjectView> {
		let mut tx = self.begin().await?;
		let subject = require_subject(&mut tx, id, kind).await?;
		let view = subject_view(&mut tx, subject).await?;
		commit(tx).await?;
		Ok(view)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_subjects(&self, kind: Option<SubjectKind>) -> Result<Vec<SubjectView>> {
		let mut tx = self.begin().await?;
		let subjects = SubjectRepository::new(&mut tx).list_subjects(kind).await?;
		let mut views = Vec::with_capacity(subjects.len());
		for subject in subjects {
			views.push(subject_view(&mut tx, subject).await?);
		}
		commit(tx).await?;
		Ok(views)
	}

	/// Add a user to a group. Adding an existing member is a no-op.
	///
	/// # Errors
	/// - `NotFound` if the group does not exist
	/// - `InvalidArgument` if `user_id` names a group
	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn add_member(&self, group_id: &SubjectId, user_id: &SubjectId) -> Result<SubjectView> {
		retry(&self.retry, || self.add_member_once(group_id, user_id)).await
	}

	async fn add_member_once(&self, group_id: &SubjectId, user_id: &SubjectId) -> Result<SubjectView> {
		let mut tx = self.begin().await?;
		SubjectRepository::new(&mut tx)
			.add_member(group_id, user_id)
			.await?;
		let group = require_subject(&mut tx, group_id, Some(SubjectKind::Group)).await?;
		let view = subject_view(&mut tx, group).await?;
		commit(tx).await?;
		Ok(view)
	}

	/// # Errors
	/// Returns `NotFound` if the group does not exist or `user_id` is not a
	/// member.
	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn remove_member(
		&self,
		group_id: &SubjectId,
		user_id: &SubjectId,
	) -> Result<SubjectView> {
		retry(&self.retry, || self.remove_member_once(group_id, user_id)).await
	}

	async fn remove_member_once(
		&self,
		group_id: &SubjectId,
		user_id: &SubjectId,
	) -> Result<SubjectView> {
		let mut tx = self.begin().await?;
		let group = require_subject(&mut tx, group_id, Some(SubjectKind::Group)).await?;

		let removed = SubjectRepository::new(&mut tx)
			.remove_member(group_id, user_id)
			.await?;
		if !removed {
			return Err(AccessError::not_found(format!(
				"user '{user_id}' is not a member of group '{group_id}'"
			)));
		}

		let view = subject_view(&mut tx, group).await?;
		commit(tx).await?;

		tracing::info!(group_id = %group_id, user_id = %user_id, "member removed");
		Ok(view)
	}

	/// Delete a subject along with its memberships and every grant naming it.
	#[tracing::instrument(skip(self), fields(subject_id = %id))]
	pub async fn delete_subject(&self, id: &SubjectId) -> Result<()> {
		retry(&self.retry, || self.delete_subject_once(id)).await
	}

	async fn delete_subject_once(&self, id: &SubjectId) -> Result<()> {
		let mut tx = self.begin().await?;
		if !SubjectRepository::new(&mut tx).delete_subject(id).await? {
			return Err(AccessError::not_found(format!("subject '{id}'")));
		}
		commit(tx).await?;

		tracing::info!(subject_id = %id, "subject deleted");
		Ok(())
	}

	/// Groups a user belongs to and objects it holds any permission on.
	///
	/// # Errors
	/// Returns `NotFound` unless `user_id` names an existing user.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn user_info(&self, user_id: &SubjectId) -> Result<UserInfo> {
		let mut tx = self.begin().await?;
		require_subject(&mut tx, user_id, Some(SubjectKind::User)).await?;

		let groups = SubjectRepository::new(&mut tx)
			.groups_containing(user_id)
			.await?;
		let objects = AclRepository::new(&mut tx)
			.objects_granted_to(user_id)
			.await?;
		commit(tx).await?;

		Ok(UserInfo {
			id: user_id.clone(),
			groups,
			objects,
		})
	}
}

async fn require_subject(
	conn: &mut SqliteConnection,
	id: &SubjectId,
	kind: Option<SubjectKind>,
) -> Result<Subject> {
	SubjectRepository::new(conn)
		.get_subject(id, kind)
		.await?
		.ok_or_else(|| match kind {
			Some(kind) => AccessError::not_found(format!("{kind} '{id}'")),
			None => AccessError::not_found(format!("subject '{id}'")),
		})
}

/// Groups list their members as `u-` tokens; users have none.
async fn subject_view(conn: &mut SqliteConnection, subject: Subject) -> Result<SubjectView> {
	let members = if subject.is_group() {
		SubjectRepository::new(conn)
			.members_of(&subject.id)
			.await?
			.into_iter()
			.map(|id| SubjectToken::user(id).to_string())
			.collect()
	} else {
		Vec::new()
	};
	Ok(SubjectView::new(subject, members))
}
