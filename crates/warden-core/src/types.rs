// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier newtypes.
//!
//! Two families exist:
//!
//! - **Internal keys** ([`PermissionSetId`], [`PermissionId`], [`AceId`]) are
//!   UUIDs generated by the server and never shown to callers.
//! - **Immutable ids** ([`SubjectId`], [`ObjectId`]) are opaque strings that
//!   callers see and may supply themselves. They never change after creation.
//!
//! All of them serialize transparently.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}
	};
}

macro_rules! define_external_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			/// Generate a fresh server-assigned id.
			pub fn generate() -> Self {
				Self(Uuid::new_v4().to_string())
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}

			pub fn into_inner(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self(id.to_string())
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(id)
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
	};
}

define_id_type!(PermissionSetId, "Internal key of a permission set.");
define_id_type!(PermissionId, "Internal key of a permission.");
define_id_type!(AceId, "Internal key of an access-control entry.");

define_external_id_type!(SubjectId, "Immutable id of a user or group.");
define_external_id_type!(ObjectId, "Immutable id of a protected object.");

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::HashSet;

	proptest! {
		#[test]
		fn generated_subject_ids_are_unique(count in 1..500usize) {
			let mut ids = HashSet::new();
			for _ in 0..count {
				prop_assert!(ids.insert(SubjectId::generate()), "Generated duplicate SubjectId");
			}
		}

		#[test]
		fn external_ids_keep_caller_text(id in "[A-Za-z0-9_.@-]{1,40}") {
			let object_id = ObjectId::new(id.clone());
			prop_assert_eq!(object_id.as_str(), id.as_str());
			prop_assert_eq!(object_id.to_string(), id);
		}
	}

	#[test]
	fn external_ids_serialize_transparently() {
		let id = SubjectId::new("alice");
		assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
		let back: SubjectId = serde_json::from_str("\"alice\"").unwrap();
		assert_eq!(back, id);
	}

	#[test]
	fn internal_ids_serialize_as_uuid_strings() {
		let uuid = Uuid::new_v4();
		let id = AceId::new(uuid);
		assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{uuid}\""));
	}
}
