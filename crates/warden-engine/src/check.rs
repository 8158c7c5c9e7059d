// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_core::permission::dedup_names;
use warden_core::{ObjectId, Result, SubjectId, SubjectToken};
use warden_db::{AclRepository, ObjectRepository, PermissionSetRepository};

use crate::engine::{effective_users, AccessEngine};

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessDecision {
	Granted,
	Denied,
}

impl AccessDecision {
	pub fn is_granted(self) -> bool {
		matches!(self, AccessDecision::Granted)
	}
}

impl From<bool> for AccessDecision {
	fn from(granted: bool) -> Self {
		if granted {
			AccessDecision::Granted
		} else {
			AccessDecision::Denied
		}
	}
}

impl fmt::Display for AccessDecision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AccessDecision::Granted => f.write_str("granted"),
			AccessDecision::Denied => f.write_str("denied"),
		}
	}
}

impl AccessEngine {
	/// May `subject_id` exercise every one of `permissions` on `object_id`?
	///
	/// Fails closed: a missing object, an unknown permission name, an entry
	/// that grants nobody and a storage error all come back as
	/// [`AccessDecision::Denied`].
	#[tracing::instrument(skip(self, permissions), fields(object_id = %object_id, subject_id = %subject_id, permissions = ?permissions))]
	pub async fn check_access(
		&self,
		object_id: &ObjectId,
		subject_id: &SubjectId,
		permissions: &[String],
	) -> AccessDecision {
		match self.evaluate(object_id, subject_id, permissions).await {
			Ok(decision) => {
				if !decision.is_granted() {
					tracing::debug!(object_id = %object_id, subject_id = %subject_id, "access denied");
				}
				decision
			}
			Err(e) => {
				tracing::warn!(object_id = %object_id, subject_id = %subject_id, error = %e, "access check failed; denying");
				AccessDecision::Denied
			}
		}
	}

	async fn evaluate(
		&self,
		object_id: &ObjectId,
		subject_id: &SubjectId,
		permissions: &[String],
	) -> Result<AccessDecision> {
		if subject_id.as_str().is_empty() || permissions.is_empty() {
			return Ok(AccessDecision::Denied);
		}

		let mut tx = self.begin().await?;

		if ObjectRepository::new(&mut tx)
			.get_object(object_id)
			.await?
			.is_none()
		{
			return Ok(AccessDecision::Denied);
		}

		let requested = dedup_names(permissions.iter());
		let known = PermissionSetRepository::new(&mut tx)
			.existing_permission_names(&requested)
			.await?;
		if known.len() < requested.len() {
			return Ok(AccessDecision::Denied);
		}

		let aces = AclRepository::new(&mut tx).aces_for_object(object_id).await?;
		for name in &requested {
			let granted: Vec<SubjectToken> = aces
				.iter()
				.filter(|ace| ace.permission.name == *name)
				.flat_map(|ace| ace.subjects.iter().cloned())
				.collect();
			if granted.is_empty() {
				return Ok(AccessDecision::Denied);
			}

			let users = effective_users(&mut tx, &granted).await?;
			if !users.contains(subject_id) {
				return Ok(AccessDecision::Denied);
			}
		}

		Ok(AccessDecision::Granted)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decision_renders_lowercase() {
		assert_eq!(AccessDecision::Granted.to_string(), "granted");
		assert_eq!(AccessDecision::Denied.to_string(), "denied");
		assert_eq!(
			serde_json::to_string(&AccessDecision::Denied).unwrap(),
			"\"denied\""
		);
	}

	#[test]
	fn decision_from_bool() {
		assert!(AccessDecision::from(true).is_granted());
		assert!(!AccessDecision::from(false).is_granted());
	}
}
