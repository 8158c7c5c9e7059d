// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Protected objects and their access-control entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AceId, ObjectId, PermissionId};

/// A protected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
	pub id: ObjectId,
	pub name: Option<String>,
	pub additional_info: Option<serde_json::Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Object {
	pub fn new(
		id: ObjectId,
		name: Option<String>,
		additional_info: Option<serde_json::Value>,
	) -> Self {
		let now = Utc::now();
		Self {
			id,
			name,
			additional_info,
			created_at: now,
			updated_at: now,
		}
	}
}

/// Binds one permission on one object to the set of subjects granted it.
///
/// At most one entry exists per `(object_id, permission_id)`. Entries are
/// created lazily on the first grant and removed with their object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
	pub id: AceId,
	pub object_id: ObjectId,
	pub permission_id: PermissionId,
	pub created_at: DateTime<Utc>,
}
