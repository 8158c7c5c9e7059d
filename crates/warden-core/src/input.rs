// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured input records for mutating operations.
//!
//! Inputs are parsed before any store is touched. Anything that does not have
//! the expected shape (a permission list that is not an array, an `acl` value
//! that is not a map of arrays, ...) is rejected with
//! [`AccessError::InvalidArgument`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AccessError;
use crate::types::{ObjectId, SubjectId};

/// Parse an input record from a JSON value.
pub fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, AccessError> {
	serde_json::from_value(value).map_err(|e| AccessError::invalid(format!("malformed input: {e}")))
}

/// Parse an input record from JSON text.
pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, AccessError> {
	serde_json::from_str(text).map_err(|e| AccessError::invalid(format!("malformed input: {e}")))
}

/// Input for creating an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectInput {
	/// Caller-supplied id; generated when absent.
	#[serde(default)]
	pub id: Option<ObjectId>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub additional_info: Option<serde_json::Value>,
	/// Names of permission sets to bind, in order.
	#[serde(default)]
	pub permission_sets: Vec<String>,
	/// Permission name to subject tokens to grant it to.
	#[serde(default)]
	pub acl: BTreeMap<String, Vec<String>>,
}

/// Input for updating an object. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub additional_info: Option<serde_json::Value>,
	/// Replaces the bindings when present.
	#[serde(default)]
	pub permission_sets: Option<Vec<String>>,
	/// Additional grants.
	#[serde(default)]
	pub acl: BTreeMap<String, Vec<String>>,
}

/// Input for creating a permission set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionSetInput {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub additional_info: Option<serde_json::Value>,
	#[serde(default)]
	pub permissions: Vec<String>,
}

/// Input for updating a permission set. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionSetUpdate {
	#[serde(default)]
	pub additional_info: Option<serde_json::Value>,
	/// Replaces the permission list when present.
	#[serde(default)]
	pub permissions: Option<Vec<String>>,
}

/// Input for creating a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupInput {
	#[serde(default)]
	pub id: Option<SubjectId>,
	#[serde(default)]
	pub additional_info: Option<serde_json::Value>,
	/// Member user ids; unknown ids are created as users.
	#[serde(default)]
	pub members: Vec<SubjectId>,
}
