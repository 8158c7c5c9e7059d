// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{BTreeMap, BTreeSet};

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::{Sqlite, Transaction};
use warden_core::{
	AccessError, Object, ObjectId, ObjectView, PermissionSet, Result, SubjectId, SubjectKind,
	SubjectToken,
};
use warden_db::{AclRepository, DbError, GrantedAce, ObjectRepository, SubjectRepository};

use crate::retry::RetryConfig;

/// Access resolution engine.
///
/// Owns the pool handed to it at startup. Every mutating operation runs in a
/// single transaction and is retried when it loses a race to a concurrent
/// writer.
#[derive(Clone)]
pub struct AccessEngine {
	pub(crate) pool: SqlitePool,
	pub(crate) retry: RetryConfig,
}

impl AccessEngine {
	pub fn new(pool: SqlitePool, retry: RetryConfig) -> Self {
		Self { pool, retry }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub fn retry_config(&self) -> &RetryConfig {
		&self.retry
	}

	pub(crate) async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
		Ok(self.pool.begin().await.map_err(DbError::from)?)
	}

	/// Resolve a subject token in its own transaction.
	///
	/// Bare and `u-` tokens name users, which are created when missing.
	/// `g-` tokens name groups, which must already exist.
	#[tracing::instrument(skip(self), fields(token = %token))]
	pub async fn resolve_subject(&self, token: &str) -> Result<warden_core::Subject> {
		crate::retry::retry(&self.retry, move || async move {
			let mut tx = self.begin().await?;
			let subject = resolve_subject(&mut tx, token).await?;
			commit(tx).await?;
			Ok(subject)
		})
		.await
	}
}

pub(crate) async fn commit(tx: Transaction<'static, Sqlite>) -> Result<()> {
	Ok(tx.commit().await.map_err(DbError::from)?)
}

pub(crate) async fn resolve_subject(
	conn: &mut SqliteConnection,
	token: &str,
) -> Result<warden_core::Subject> {
	let token = SubjectToken::parse(token)?;
	let mut subjects = SubjectRepository::new(conn);
	match token.kind {
		SubjectKind::User => Ok(subjects.ensure_user(&token.id).await?),
		SubjectKind::Group => subjects
			.get_subject(&token.id, Some(SubjectKind::Group))
			.await?
			.ok_or_else(|| AccessError::not_found(format!("group '{}'", token.id))),
	}
}

pub(crate) async fn require_object(conn: &mut SqliteConnection, id: &ObjectId) -> Result<Object> {
	ObjectRepository::new(conn)
		.get_object(id)
		.await?
		.ok_or_else(|| AccessError::not_found(format!("object '{id}'")))
}

pub(crate) async fn object_view(conn: &mut SqliteConnection, object: Object) -> Result<ObjectView> {
	let sets: Vec<PermissionSet> = ObjectRepository::new(&mut *conn)
		.bound_permission_sets(&object.id)
		.await?;
	let aces = AclRepository::new(&mut *conn)
		.aces_for_object(&object.id)
		.await?;
	Ok(ObjectView::new(object, &sets, render_acl(&aces)))
}

/// Permission name to sorted subject tokens, leaving out entries that grant
/// nobody.
pub(crate) fn render_acl(aces: &[GrantedAce]) -> BTreeMap<String, Vec<String>> {
	let mut acl: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
	for ace in aces.iter().filter(|ace| !ace.is_empty()) {
		acl.entry(ace.permission.name.clone())
			.or_default()
			.extend(ace.subjects.iter().map(ToString::to_string));
	}
	acl.into_iter()
		.map(|(name, tokens)| (name, tokens.into_iter().collect()))
		.collect()
}

/// Users covered by a set of granted subjects: users as-is, groups replaced
/// by their current members.
pub(crate) async fn effective_users(
	conn: &mut SqliteConnection,
	granted: &[SubjectToken],
) -> Result<BTreeSet<SubjectId>> {
	let mut users = BTreeSet::new();
	let mut subjects = SubjectRepository::new(conn);
	for token in granted {
		match token.kind {
			SubjectKind::User => {
				users.insert(token.id.clone());
			}
			SubjectKind::Group => {
				users.extend(subjects.members_of(&token.id).await?);
			}
		}
	}
	Ok(users)
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_core::{AccessControlEntry, AceId, Permission, PermissionId, PermissionSetId};
	use warden_db::testing::create_test_pool;

	fn ace(permission: &str, subjects: Vec<SubjectToken>) -> GrantedAce {
		let permission = Permission {
			id: PermissionId::generate(),
			permission_set_id: PermissionSetId::generate(),
			name: permission.to_string(),
		};
		GrantedAce {
			ace: AccessControlEntry {
				id: AceId::generate(),
				object_id: ObjectId::new("o"),
				permission_id: permission.id,
				created_at: chrono::Utc::now(),
			},
			permission,
			subjects,
		}
	}

	#[test]
	fn render_acl_merges_and_drops_empty_entries() {
		let aces = vec![
			ace("read", vec![SubjectToken::user("b"), SubjectToken::group("g")]),
			ace("read", vec![SubjectToken::user("a")]),
			ace("write", vec![]),
		];

		let acl = render_acl(&aces);
		assert_eq!(acl.len(), 1);
		assert_eq!(acl["read"], vec!["g-g", "u-a", "u-b"]);
	}

	#[tokio::test]
	async fn resolve_subject_creates_users_but_not_groups() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		let user = resolve_subject(&mut conn, "u-alice").await.unwrap();
		assert_eq!(user.kind, SubjectKind::User);
		let bare = resolve_subject(&mut conn, "alice").await.unwrap();
		assert_eq!(bare.id, user.id);

		let err = resolve_subject(&mut conn, "g-missing").await.unwrap_err();
		assert!(matches!(err, AccessError::NotFound(_)));
	}

	#[tokio::test]
	async fn user_token_naming_a_group_is_rejected() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		SubjectRepository::new(&mut conn)
			.create_subject(&warden_core::Subject::new(
				SubjectId::new("ops"),
				SubjectKind::Group,
				None,
			))
			.await
			.unwrap();

		let group = resolve_subject(&mut conn, "g-ops").await.unwrap();
		assert!(group.is_group());
		let err = resolve_subject(&mut conn, "u-ops").await.unwrap_err();
		assert!(matches!(err, AccessError::InvalidArgument(_)));
	}
}
