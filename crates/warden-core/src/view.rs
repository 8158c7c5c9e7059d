// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serialized representations handed to adapters.
//!
//! Subjects inside `acl` and `members` are rendered as prefixed tokens
//! (`u-<id>`, `g-<id>`) so that a representation can be fed back as input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::object::Object;
use crate::permission::PermissionSet;
use crate::subject::{Subject, SubjectKind};
use crate::types::{ObjectId, SubjectId};

pub const OBJECT_SCHEMA: &str = "urn:warden:schemas:object";
pub const PERMISSION_SET_SCHEMA: &str = "urn:warden:schemas:permission-set";
pub const USER_SCHEMA: &str = "urn:warden:schemas:user";
pub const GROUP_SCHEMA: &str = "urn:warden:schemas:group";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
	pub created: DateTime<Utc>,
	pub updated: DateTime<Utc>,
	pub schema: String,
}

impl Meta {
	fn new(created: DateTime<Utc>, updated: DateTime<Utc>, schema: &str) -> Self {
		Self {
			created,
			updated,
			schema: schema.to_string(),
		}
	}
}

/// Object representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectView {
	pub id: ObjectId,
	pub name: Option<String>,
	/// Name of the first bound permission set.
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
	pub additional_info: Option<serde_json::Value>,
	/// Permission name to granted subject tokens. Only permissions granted to
	/// at least one subject appear.
	pub acl: BTreeMap<String, Vec<String>>,
	pub meta: Meta,
}

impl ObjectView {
	pub fn new(
		object: Object,
		permission_sets: &[PermissionSet],
		acl: BTreeMap<String, Vec<String>>,
	) -> Self {
		Self {
			id: object.id,
			name: object.name,
			kind: permission_sets.first().map(|set| set.name.clone()),
			additional_info: object.additional_info,
			acl,
			meta: Meta::new(object.created_at, object.updated_at, OBJECT_SCHEMA),
		}
	}
}

/// Permission set representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSetView {
	pub name: String,
	pub additional_info: Option<serde_json::Value>,
	pub permissions: Vec<String>,
	pub meta: Meta,
}

impl PermissionSetView {
	pub fn new(set: PermissionSet, permissions: Vec<String>) -> Self {
		Self {
			name: set.name,
			additional_info: set.additional_info,
			permissions,
			meta: Meta::new(set.created_at, set.updated_at, PERMISSION_SET_SCHEMA),
		}
	}
}

/// User or group representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectView {
	pub id: SubjectId,
	#[serde(rename = "type")]
	pub kind: SubjectKind,
	pub additional_info: Option<serde_json::Value>,
	/// Member user tokens; groups only, omitted when empty.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub members: Vec<String>,
	pub meta: Meta,
}

impl SubjectView {
	pub fn new(subject: Subject, members: Vec<String>) -> Self {
		let schema = match subject.kind {
			SubjectKind::User => USER_SCHEMA,
			SubjectKind::Group => GROUP_SCHEMA,
		};
		Self {
			id: subject.id,
			kind: subject.kind,
			additional_info: subject.additional_info,
			members,
			meta: Meta::new(subject.created_at, subject.updated_at, schema),
		}
	}
}

/// Aggregated view of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	pub id: SubjectId,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub groups: Vec<SubjectId>,
	/// Objects on which the user holds at least one permission, directly or
	/// through a group.
	pub objects: Vec<ObjectId>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn object_view_takes_type_from_first_set() {
		let object = Object::new(ObjectId::new("www"), Some("www".into()), None);
		let sets = vec![
			PermissionSet::new("app_space", None),
			PermissionSet::new("billing", None),
		];
		let view = ObjectView::new(object, &sets, BTreeMap::new());
		assert_eq!(view.kind.as_deref(), Some("app_space"));

		let json = serde_json::to_value(&view).unwrap();
		assert_eq!(json["type"], json!("app_space"));
		assert_eq!(json["meta"]["schema"], json!(OBJECT_SCHEMA));
	}

	#[test]
	fn object_view_omits_type_without_sets() {
		let object = Object::new(ObjectId::new("bare"), None, None);
		let view = ObjectView::new(object, &[], BTreeMap::new());
		let json = serde_json::to_value(&view).unwrap();
		assert!(json.get("type").is_none());
		assert_eq!(json["acl"], json!({}));
	}

	#[test]
	fn user_view_omits_members() {
		let subject = Subject::new(SubjectId::new("alice"), SubjectKind::User, None);
		let json = serde_json::to_value(SubjectView::new(subject, vec![])).unwrap();
		assert!(json.get("members").is_none());
		assert_eq!(json["type"], json!("user"));
		assert_eq!(json["meta"]["schema"], json!(USER_SCHEMA));
	}

	#[test]
	fn group_view_lists_members() {
		let subject = Subject::new(
			SubjectId::new("ops"),
			SubjectKind::Group,
			Some(json!({"team": "sre"})),
		);
		let view = SubjectView::new(subject, vec!["u-b".into(), "u-c".into()]);
		let json = serde_json::to_value(&view).unwrap();
		assert_eq!(json["members"], json!(["u-b", "u-c"]));
		assert_eq!(json["additional_info"], json!({"team": "sre"}));
	}

	#[test]
	fn user_info_omits_empty_groups() {
		let info = UserInfo {
			id: SubjectId::new("dave"),
			groups: vec![],
			objects: vec![],
		};
		let json = serde_json::to_value(&info).unwrap();
		assert!(json.get("groups").is_none());
		assert_eq!(json["objects"], json!([]));
	}
}
