// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subject tokens.
//!
//! Callers name subjects in ACL inputs with a small prefix convention so that
//! users and groups can be told apart without a lookup:
//!
//! | Token      | Meaning                                   |
//! |------------|-------------------------------------------|
//! | `u-<id>`   | user `<id>`, created on demand            |
//! | `g-<id>`   | group `<id>`, must already exist          |
//! | `<id>`     | bare id, treated exactly like `u-<id>`    |

use std::fmt;
use std::str::FromStr;

use crate::error::AccessError;
use crate::subject::{Subject, SubjectKind};
use crate::types::SubjectId;

const USER_PREFIX: &str = "u-";
const GROUP_PREFIX: &str = "g-";

/// A parsed subject reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectToken {
	pub kind: SubjectKind,
	pub id: SubjectId,
}

impl SubjectToken {
	pub fn user(id: impl Into<SubjectId>) -> Self {
		Self {
			kind: SubjectKind::User,
			id: id.into(),
		}
	}

	pub fn group(id: impl Into<SubjectId>) -> Self {
		Self {
			kind: SubjectKind::Group,
			id: id.into(),
		}
	}

	/// The canonical prefixed token for an existing subject.
	pub fn for_subject(subject: &Subject) -> Self {
		Self {
			kind: subject.kind,
			id: subject.id.clone(),
		}
	}

	pub fn parse(token: &str) -> Result<Self, AccessError> {
		let (kind, id) = if let Some(rest) = token.strip_prefix(GROUP_PREFIX) {
			(SubjectKind::Group, rest)
		} else if let Some(rest) = token.strip_prefix(USER_PREFIX) {
			(SubjectKind::User, rest)
		} else {
			(SubjectKind::User, token)
		};

		if id.trim().is_empty() {
			return Err(AccessError::invalid(format!(
				"subject token '{token}' does not name a subject"
			)));
		}

		Ok(Self {
			kind,
			id: SubjectId::new(id),
		})
	}
}

impl FromStr for SubjectToken {
	type Err = AccessError;

	fn from_str(token: &str) -> Result<Self, Self::Err> {
		Self::parse(token)
	}
}

impl fmt::Display for SubjectToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let prefix = match self.kind {
			SubjectKind::User => USER_PREFIX,
			SubjectKind::Group => GROUP_PREFIX,
		};
		write!(f, "{prefix}{}", self.id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn parses_prefixed_user() {
		let token = SubjectToken::parse("u-alice").unwrap();
		assert_eq!(token, SubjectToken::user("alice"));
	}

	#[test]
	fn parses_prefixed_group() {
		let token = SubjectToken::parse("g-ops").unwrap();
		assert_eq!(token, SubjectToken::group("ops"));
	}

	#[test]
	fn bare_id_is_a_user() {
		let token = SubjectToken::parse("bob").unwrap();
		assert_eq!(token.kind, SubjectKind::User);
		assert_eq!(token.id.as_str(), "bob");
	}

	#[test]
	fn empty_ids_are_rejected() {
		for raw in ["", "u-", "g-", "   ", "g-  "] {
			let err = SubjectToken::parse(raw).unwrap_err();
			assert!(matches!(err, AccessError::InvalidArgument(_)), "{raw:?}");
		}
	}

	#[test]
	fn only_the_first_prefix_is_stripped() {
		let token = SubjectToken::parse("g-u-x").unwrap();
		assert_eq!(token, SubjectToken::group("u-x"));
	}

	#[test]
	fn display_renders_prefix() {
		assert_eq!(SubjectToken::user("a").to_string(), "u-a");
		assert_eq!(SubjectToken::group("g").to_string(), "g-g");
	}

	proptest! {
		#[test]
		fn prefixed_tokens_survive_display(id in "[A-Za-z0-9_.@]{1,32}", group in any::<bool>()) {
			let token = if group { SubjectToken::group(id.as_str()) } else { SubjectToken::user(id.as_str()) };
			let parsed = SubjectToken::parse(&token.to_string()).unwrap();
			prop_assert_eq!(parsed, token);
		}
	}
}
