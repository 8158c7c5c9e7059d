// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission sets and the permissions they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PermissionId, PermissionSetId};

/// A named, reusable bundle of permissions.
///
/// Objects bind to permission sets; the permissions of the bound sets are
/// exactly the permissions that may appear in the object's ACL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSet {
	pub id: PermissionSetId,

	/// Globally unique and immutable once created.
	pub name: String,

	pub additional_info: Option<serde_json::Value>,

	pub created_at: DateTime<Utc>,

	pub updated_at: DateTime<Utc>,
}

impl PermissionSet {
	pub fn new(name: impl Into<String>, additional_info: Option<serde_json::Value>) -> Self {
		let now = Utc::now();
		Self {
			id: PermissionSetId::generate(),
			name: name.into(),
			additional_info,
			created_at: now,
			updated_at: now,
		}
	}
}

/// A named capability owned by exactly one permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
	pub id: PermissionId,
	pub permission_set_id: PermissionSetId,
	pub name: String,
}

/// Collapses duplicate permission names while keeping first-seen order.
pub fn dedup_names<I, S>(names: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut seen = std::collections::HashSet::new();
	names
		.into_iter()
		.map(Into::into)
		.filter(|name| seen.insert(name.clone()))
		.collect()
}
