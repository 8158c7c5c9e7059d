// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subjects and group membership.
//!
//! This module provides:
//! - [`Subject`] - a user or group principal that can be granted permissions
//! - [`Membership`] - links a user to a group

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AccessError;
use crate::types::SubjectId;

/// The kind of a subject. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
	User,
	Group,
}

impl SubjectKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			SubjectKind::User => "user",
			SubjectKind::Group => "group",
		}
	}
}

impl fmt::Display for SubjectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SubjectKind {
	type Err = AccessError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"user" => Ok(SubjectKind::User),
			"group" => Ok(SubjectKind::Group),
			other => Err(AccessError::invalid(format!(
				"subject kind must be 'user' or 'group', got '{other}'"
			))),
		}
	}
}

/// A user or group principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
	/// Immutable id, unique across users and groups.
	pub id: SubjectId,

	pub kind: SubjectKind,

	/// Free-form metadata, stored and returned verbatim.
	pub additional_info: Option<serde_json::Value>,

	pub created_at: DateTime<Utc>,

	pub updated_at: DateTime<Utc>,
}

impl Subject {
	/// Creates a subject with timestamps set to now.
	pub fn new(
		id: SubjectId,
		kind: SubjectKind,
		additional_info: Option<serde_json::Value>,
	) -> Self {
		let now = Utc::now();
		Self {
			id,
			kind,
			additional_info,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn is_group(&self) -> bool {
		self.kind == SubjectKind::Group
	}

	pub fn is_user(&self) -> bool {
		self.kind == SubjectKind::User
	}
}

/// A user's membership in a group.
///
/// A (group, user) pair appears at most once; deleting either endpoint
/// deletes the membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
	pub group_id: SubjectId,
	pub user_id: SubjectId,
	pub created_at: DateTime<Utc>,
}
