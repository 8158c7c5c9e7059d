// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission catalog operations.

use std::collections::HashSet;

use sqlx::sqlite::SqliteConnection;
use warden_core::permission::dedup_names;
use warden_core::{
	AccessError, PermissionSet, PermissionSetInput, PermissionSetUpdate, PermissionSetView, Result,
};
use warden_db::{AclRepository, ObjectRepository, PermissionSetRepository};

use crate::engine::{commit, AccessEngine};
use crate::retry::retry;

impl AccessEngine {
	/// # Errors
	/// Returns `InvalidArgument` if the name is missing or already taken.
	#[tracing::instrument(skip(self, input), fields(name = ?input.name))]
	pub async fn create_permission_set(&self, input: &PermissionSetInput) -> Result<PermissionSetView> {
		let name = match input.name.as_deref().map(str::trim) {
			Some(name) if !name.is_empty() => name.to_string(),
			_ => return Err(AccessError::invalid("permission set name is required")),
		};
		let permissions = dedup_names(input.permissions.iter());

		retry(&self.retry, || {
			self.create_permission_set_once(&name, &permissions, &input.additional_info)
		})
		.await
	}

	async fn create_permission_set_once(
		&self,
		name: &str,
		permissions: &[String],
		additional_info: &Option<serde_json::Value>,
	) -> Result<PermissionSetView> {
		let mut tx = self.begin().await?;

		let set = PermissionSet::new(name, additional_info.clone());
		let created = PermissionSetRepository::new(&mut tx)
			.create_permission_set(&set, permissions)
			.await?;
		commit(tx).await?;

		tracing::info!(name = %name, permissions = created.len(), "permission set created");
		Ok(PermissionSetView::new(
			set,
			created.into_iter().map(|p| p.name).collect(),
		))
	}

	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn get_permission_set(&self, name: &str) -> Result<PermissionSetView> {
		let mut tx = self.begin().await?;
		let set = require_permission_set(&mut tx, name).await?;
		let view = permission_set_view(&mut tx, set).await?;
		commit(tx).await?;
		Ok(view)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_permission_sets(&self) -> Result<Vec<PermissionSetView>> {
		let mut tx = self.begin().await?;
		let sets = PermissionSetRepository::new(&mut tx)
			.list_permission_sets()
			.await?;
		let mut views = Vec::with_capacity(sets.len());
		for set in sets {
			views.push(permission_set_view(&mut tx, set).await?);
		}
		commit(tx).await?;
		Ok(views)
	}

	/// Replace a set's metadata and, when given, its exact permission list.
	///
	/// # Errors
	/// Returns `InvalidArgument` when a permission being removed is still
	/// granted to a subject on some object.
	#[tracing::instrument(skip(self, update), fields(name = %name))]
	pub async fn update_permission_set(
		&self,
		name: &str,
		update: &PermissionSetUpdate,
	) -> Result<PermissionSetView> {
		let desired = update
			.permissions
			.as_ref()
			.map(|names| dedup_names(names.iter()));
		retry(&self.retry, || {
			self.update_permission_set_once(name, &update.additional_info, desired.as_deref())
		})
		.await
	}

	async fn update_permission_set_once(
		&self,
		name: &str,
		additional_info: &Option<serde_json::Value>,
		desired: Option<&[String]>,
	) -> Result<PermissionSetView> {
		let mut tx = self.begin().await?;
		let set = require_permission_set(&mut tx, name).await?;

		if additional_info.is_some() {
			PermissionSetRepository::new(&mut tx)
				.update_info(&set.id, additional_info)
				.await?;
		}

		if let Some(desired) = desired {
			let keep: HashSet<&str> = desired.iter().map(String::as_str).collect();
			let current = PermissionSetRepository::new(&mut tx)
				.permissions_of(&set.id)
				.await?;

			for permission in current.iter().filter(|p| !keep.contains(p.name.as_str())) {
				let mut acl = AclRepository::new(&mut tx);
				if acl.count_grants_for_permission(&permission.id).await? > 0 {
					return Err(AccessError::invalid(format!(
						"permission '{}' is granted on at least one object",
						permission.name
					)));
				}
				acl.delete_aces_for_permission(&permission.id).await?;
				PermissionSetRepository::new(&mut tx)
					.remove_permission(&permission.id)
					.await?;
			}

			let mut catalog = PermissionSetRepository::new(&mut tx);
			for name in desired {
				catalog.add_permission(&set.id, name).await?;
			}
			catalog.touch(&set.id).await?;
		}

		let set = require_permission_set(&mut tx, name).await?;
		let view = permission_set_view(&mut tx, set).await?;
		commit(tx).await?;

		tracing::info!(name = %name, "permission set updated");
		Ok(view)
	}

	/// # Errors
	/// Returns `InvalidArgument` while any object is bound to the set.
	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn delete_permission_set(&self, name: &str) -> Result<()> {
		retry(&self.retry, || self.delete_permission_set_once(name)).await
	}

	async fn delete_permission_set_once(&self, name: &str) -> Result<()> {
		let mut tx = self.begin().await?;
		let set = require_permission_set(&mut tx, name).await?;

		let bound = ObjectRepository::new(&mut tx)
			.count_bound_objects(&set.id)
			.await?;
		if bound > 0 {
			return Err(AccessError::invalid(format!(
				"permission set '{name}' is bound to {bound} object(s)"
			)));
		}

		PermissionSetRepository::new(&mut tx)
			.delete_permission_set(&set.id)
			.await?;
		commit(tx).await?;

		tracing::info!(name = %name, "permission set deleted");
		Ok(())
	}
}

async fn require_permission_set(conn: &mut SqliteConnection, name: &str) -> Result<PermissionSet> {
	PermissionSetRepository::new(conn)
		.get_permission_set(name)
		.await?
		.ok_or_else(|| AccessError::not_found(format!("permission set '{name}'")))
}

async fn permission_set_view(
	conn: &mut SqliteConnection,
	set: PermissionSet,
) -> Result<PermissionSetView> {
	let permissions = PermissionSetRepository::new(conn)
		.permissions_of(&set.id)
		.await?
		.into_iter()
		.map(|p| p.name)
		.collect();
	Ok(PermissionSetView::new(set, permissions))
}
