// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Object lifecycle: creation with ACL seeding, rebinding, cascade deletion
//! and per-user permission aggregation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use sqlx::sqlite::SqliteConnection;
use warden_core::permission::dedup_names;
use warden_core::{
	AccessError, Object, ObjectId, ObjectInput, ObjectUpdate, ObjectView, PermissionSet, Result,
	SubjectId,
};
use warden_db::{AclRepository, ObjectRepository, PermissionSetRepository};

use crate::engine::{commit, effective_users, object_view, require_object, AccessEngine};
use crate::grant::{apply_grants, bound_set_names};
use crate::retry::retry;

impl AccessEngine {
	/// Create an object, bind its permission sets and seed its ACL.
	///
	/// # Errors
	/// - `InvalidArgument` if a caller-supplied id is taken, a permission set
	///   does not exist, or an ACL permission does not apply to the bound sets
	/// - `NotFound` if an ACL token names a missing group
	#[tracing::instrument(skip(self, input), fields(object_id = ?input.id))]
	pub async fn create_object(&self, input: &ObjectInput) -> Result<ObjectView> {
		retry(&self.retry, || self.create_object_once(input)).await
	}

	async fn create_object_once(&self, input: &ObjectInput) -> Result<ObjectView> {
		let id = match &input.id {
			Some(id) if id.as_str().trim().is_empty() => {
				return Err(AccessError::invalid("object id must not be empty"));
			}
			Some(id) => id.clone(),
			None => ObjectId::generate(),
		};

		let mut tx = self.begin().await?;

		let object = Object::new(id, input.name.clone(), input.additional_info.clone());
		ObjectRepository::new(&mut tx).create_object(&object).await?;

		let sets = resolve_permission_sets(&mut tx, &input.permission_sets).await?;
		let set_ids: Vec<_> = sets.iter().map(|set| set.id).collect();
		ObjectRepository::new(&mut tx)
			.bind_permission_sets(&object.id, &set_ids)
			.await?;

		let set_names: Vec<String> = sets.into_iter().map(|set| set.name).collect();
		seed_acl(&mut tx, &object.id, &set_names, &input.acl).await?;

		let view = object_view(&mut tx, object).await?;
		commit(tx).await?;

		tracing::info!(object_id = %view.id, "object created");
		Ok(view)
	}

	#[tracing::instrument(skip(self), fields(object_id = %object_id))]
	pub async fn get_object(&self, object_id: &ObjectId) -> Result<ObjectView> {
		let mut tx = self.begin().await?;
		let object = require_object(&mut tx, object_id).await?;
		let view = object_view(&mut tx, object).await?;
		commit(tx).await?;
		Ok(view)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_objects(&self) -> Result<Vec<ObjectView>> {
		let mut tx = self.begin().await?;
		let objects = ObjectRepository::new(&mut tx).list_objects().await?;
		let mut views = Vec::with_capacity(objects.len());
		for object in objects {
			views.push(object_view(&mut tx, object).await?);
		}
		commit(tx).await?;
		Ok(views)
	}

	/// Update an object's metadata, bindings and grants.
	///
	/// Replacing the permission sets fails with `InvalidArgument` while an
	/// entry that grants someone refers to a permission outside the new sets.
	/// Empty entries for such permissions are dropped.
	#[tracing::instrument(skip(self, update), fields(object_id = %object_id))]
	pub async fn update_object(&self, object_id: &ObjectId, update: &ObjectUpdate) -> Result<ObjectView> {
		retry(&self.retry, || self.update_object_once(object_id, update)).await
	}

	async fn update_object_once(
		&self,
		object_id: &ObjectId,
		update: &ObjectUpdate,
	) -> Result<ObjectView> {
		let mut tx = self.begin().await?;

		let mut object = require_object(&mut tx, object_id).await?;
		if let Some(name) = &update.name {
			object.name = Some(name.clone());
		}
		if let Some(info) = &update.additional_info {
			object.additional_info = Some(info.clone());
		}
		ObjectRepository::new(&mut tx).update_object(&object).await?;

		if let Some(names) = &update.permission_sets {
			let sets = resolve_permission_sets(&mut tx, names).await?;
			rebind(&mut tx, object_id, &sets).await?;
		}

		let set_names = bound_set_names(&mut tx, object_id).await?;
		seed_acl(&mut tx, object_id, &set_names, &update.acl).await?;

		let object = require_object(&mut tx, object_id).await?;
		let view = object_view(&mut tx, object).await?;
		commit(tx).await?;

		tracing::info!(object_id = %object_id, "object updated");
		Ok(view)
	}

	/// Delete an object and everything hanging off it.
	///
	/// The order is fixed: permission-set bindings are detached, then every
	/// ACE is deleted together with its grant edges, then the object row.
	#[tracing::instrument(skip(self), fields(object_id = %object_id))]
	pub async fn delete_object(&self, object_id: &ObjectId) -> Result<()> {
		retry(&self.retry, || self.delete_object_once(object_id)).await
	}

	async fn delete_object_once(&self, object_id: &ObjectId) -> Result<()> {
		let mut tx = self.begin().await?;

		let unbound = ObjectRepository::new(&mut tx)
			.unbind_permission_sets(object_id)
			.await?;
		let aces = AclRepository::new(&mut tx)
			.delete_aces_for_object(object_id)
			.await?;
		let removed = ObjectRepository::new(&mut tx).delete_object(object_id).await?;
		if !removed {
			return Err(AccessError::not_found(format!("object '{object_id}'")));
		}

		commit(tx).await?;
		tracing::info!(object_id = %object_id, unbound, aces, "object deleted");
		Ok(())
	}

	/// Permissions held by each user on an object, directly or through a
	/// group. Users without any permission are left out.
	///
	/// # Errors
	/// Returns `NotFound` if the object does not exist.
	#[tracing::instrument(skip(self), fields(object_id = %object_id))]
	pub async fn effective_permissions_by_user(
		&self,
		object_id: &ObjectId,
	) -> Result<BTreeMap<SubjectId, BTreeSet<String>>> {
		let mut tx = self.begin().await?;
		require_object(&mut tx, object_id).await?;

		let aces = AclRepository::new(&mut tx).aces_for_object(object_id).await?;
		let mut by_user: BTreeMap<SubjectId, BTreeSet<String>> = BTreeMap::new();
		for ace in aces.iter().filter(|ace| !ace.is_empty()) {
			for user in effective_users(&mut tx, &ace.subjects).await? {
				by_user
					.entry(user)
					.or_default()
					.insert(ace.permission.name.clone());
			}
		}

		commit(tx).await?;
		Ok(by_user)
	}
}

/// Look up permission sets by name, in the given order, dropping repeats.
pub(crate) async fn resolve_permission_sets(
	conn: &mut SqliteConnection,
	names: &[String],
) -> Result<Vec<PermissionSet>> {
	let mut catalog = PermissionSetRepository::new(conn);
	let mut sets = Vec::new();
	for name in dedup_names(names.iter()) {
		let set = catalog.get_permission_set(&name).await?.ok_or_else(|| {
			AccessError::invalid(format!("permission set '{name}' does not exist"))
		})?;
		sets.push(set);
	}
	Ok(sets)
}

/// Replace an object's bindings, refusing to strand live grants.
async fn rebind(
	conn: &mut SqliteConnection,
	object_id: &ObjectId,
	sets: &[PermissionSet],
) -> Result<()> {
	let allowed: HashSet<_> = sets.iter().map(|set| set.id).collect();

	let mut acl = AclRepository::new(&mut *conn);
	let aces = acl.aces_for_object(object_id).await?;
	let stranded: Vec<_> = aces
		.iter()
		.filter(|ace| !allowed.contains(&ace.permission.permission_set_id))
		.collect();

	if let Some(live) = stranded.iter().find(|ace| !ace.is_empty()) {
		return Err(AccessError::invalid(format!(
			"permission '{}' is still granted on object '{object_id}'",
			live.permission.name
		)));
	}
	for ace in &stranded {
		acl.delete_ace(&ace.ace.id).await?;
	}

	let set_ids: Vec<_> = sets.iter().map(|set| set.id).collect();
	let mut objects = ObjectRepository::new(conn);
	objects.unbind_permission_sets(object_id).await?;
	objects.bind_permission_sets(object_id, &set_ids).await?;
	Ok(())
}

async fn seed_acl(
	conn: &mut SqliteConnection,
	object_id: &ObjectId,
	set_names: &[String],
	acl: &BTreeMap<String, Vec<String>>,
) -> Result<()> {
	for (permission, tokens) in acl {
		let permissions = [permission.clone()];
		for token in tokens {
			apply_grants(&mut *conn, object_id, set_names, &permissions, token).await?;
		}
	}
	Ok(())
}
