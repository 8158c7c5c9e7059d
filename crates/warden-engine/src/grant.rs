// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Granting and revoking permissions on objects.

use std::collections::HashSet;

use sqlx::sqlite::SqliteConnection;
use warden_core::{AccessError, ObjectId, ObjectView, Permission, Result};
use warden_db::{AclRepository, ObjectRepository, PermissionSetRepository};

use crate::engine::{commit, object_view, require_object, resolve_subject, AccessEngine};
use crate::retry::retry;

impl AccessEngine {
	/// Grant one permission on an object to a subject token.
	///
	/// # Errors
	/// - `NotFound` if the object or a `g-` group does not exist
	/// - `InvalidArgument` if the permission is not defined by any of the
	///   object's bound permission sets
	#[tracing::instrument(skip(self), fields(object_id = %object_id, permission = %permission, subject = %subject))]
	pub async fn grant_permission(
		&self,
		object_id: &ObjectId,
		permission: &str,
		subject: &str,
	) -> Result<ObjectView> {
		let permissions = [permission.to_string()];
		self.grant_permissions(object_id, &permissions, subject).await
	}

	/// Grant several permissions to one subject. Either every grant is
	/// applied or none is.
	#[tracing::instrument(skip(self, permissions), fields(object_id = %object_id, subject = %subject, count = permissions.len()))]
	pub async fn grant_permissions(
		&self,
		object_id: &ObjectId,
		permissions: &[String],
		subject: &str,
	) -> Result<ObjectView> {
		retry(&self.retry, || self.grant_once(object_id, permissions, subject)).await
	}

	async fn grant_once(
		&self,
		object_id: &ObjectId,
		permissions: &[String],
		subject: &str,
	) -> Result<ObjectView> {
		let mut tx = self.begin().await?;

		require_object(&mut tx, object_id).await?;
		let set_names = bound_set_names(&mut tx, object_id).await?;
		if apply_grants(&mut tx, object_id, &set_names, permissions, subject).await? {
			ObjectRepository::new(&mut tx).touch(object_id).await?;
		}

		let object = require_object(&mut tx, object_id).await?;
		let view = object_view(&mut tx, object).await?;
		commit(tx).await?;

		tracing::info!(object_id = %object_id, subject = %subject, "permissions granted");
		Ok(view)
	}

	/// Revoke a permission from a subject.
	///
	/// Every entry on the object for a bound permission of that name is
	/// cleared of the subject, so a grant stays revocable when two bound sets
	/// define the same name.
	///
	/// Revocation is not idempotent: revoking a grant that does not exist is
	/// an `InvalidArgument`.
	#[tracing::instrument(skip(self), fields(object_id = %object_id, permission = %permission, subject = %subject))]
	pub async fn revoke_permission(
		&self,
		object_id: &ObjectId,
		permission: &str,
		subject: &str,
	) -> Result<ObjectView> {
		retry(&self.retry, || self.revoke_once(object_id, permission, subject)).await
	}

	async fn revoke_once(
		&self,
		object_id: &ObjectId,
		permission_name: &str,
		subject: &str,
	) -> Result<ObjectView> {
		let mut tx = self.begin().await?;

		require_object(&mut tx, object_id).await?;
		let bound = ObjectRepository::new(&mut tx)
			.bound_permission_sets(object_id)
			.await?;
		let set_names: Vec<String> = bound.iter().map(|set| set.name.clone()).collect();
		applicable_permission(&mut tx, object_id, &set_names, permission_name).await?;
		let subject = resolve_subject(&mut tx, subject).await?;

		let bound_ids: HashSet<_> = bound.iter().map(|set| set.id).collect();
		let mut acl = AclRepository::new(&mut tx);
		let aces = acl.aces_for_object(object_id).await?;
		let mut revoked = false;
		for ace in aces.iter().filter(|ace| {
			ace.permission.name == permission_name
				&& bound_ids.contains(&ace.permission.permission_set_id)
		}) {
			revoked |= acl.revoke(&ace.ace.id, &subject.id).await?;
		}
		if !revoked {
			return Err(AccessError::invalid(format!(
				"no matching access-control entry for '{permission_name}' on object '{object_id}'"
			)));
		}

		ObjectRepository::new(&mut tx).touch(object_id).await?;
		let object = require_object(&mut tx, object_id).await?;
		let view = object_view(&mut tx, object).await?;
		commit(tx).await?;

		tracing::info!(object_id = %object_id, permission = %permission_name, subject_id = %subject.id, "permission revoked");
		Ok(view)
	}
}

/// Names of the permission sets bound to an object, in binding order.
pub(crate) async fn bound_set_names(
	conn: &mut SqliteConnection,
	object_id: &ObjectId,
) -> Result<Vec<String>> {
	Ok(ObjectRepository::new(conn)
		.bound_permission_sets(object_id)
		.await?
		.into_iter()
		.map(|set| set.name)
		.collect())
}

pub(crate) async fn applicable_permission(
	conn: &mut SqliteConnection,
	object_id: &ObjectId,
	set_names: &[String],
	permission_name: &str,
) -> Result<Permission> {
	PermissionSetRepository::new(conn)
		.permission_named(set_names, permission_name)
		.await?
		.ok_or_else(|| {
			AccessError::invalid(format!(
				"permission '{permission_name}' does not apply to object '{object_id}'"
			))
		})
}

/// Resolve every permission against the object's sets, then the subject, then
/// write the grants. Returns whether any grant was new.
pub(crate) async fn apply_grants(
	conn: &mut SqliteConnection,
	object_id: &ObjectId,
	set_names: &[String],
	permission_names: &[String],
	subject: &str,
) -> Result<bool> {
	let mut permissions = Vec::with_capacity(permission_names.len());
	for name in permission_names {
		permissions.push(applicable_permission(&mut *conn, object_id, set_names, name).await?);
	}

	let subject = resolve_subject(&mut *conn, subject).await?;

	let mut acl = AclRepository::new(conn);
	let mut changed = false;
	for permission in &permissions {
		let ace = acl.ensure_ace(object_id, &permission.id).await?;
		changed |= acl.grant(&ace.id, &subject.id).await?;
	}
	Ok(changed)
}
