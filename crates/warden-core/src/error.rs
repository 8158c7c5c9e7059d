// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Caller-facing error kinds.
///
/// Every operation outside of access checks reports one of these, with enough
/// detail in the message for a caller to correct the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl AccessError {
	pub fn not_found(what: impl Into<String>) -> Self {
		Self::NotFound(what.into())
	}

	pub fn invalid(what: impl Into<String>) -> Self {
		Self::InvalidArgument(what.into())
	}

	/// Returns true for errors caused by losing a race that a fresh attempt may win.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Conflict(_))
	}
}

pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_conflict_is_retryable() {
		assert!(AccessError::Conflict("race".into()).is_retryable());
		assert!(!AccessError::not_found("object x").is_retryable());
		assert!(!AccessError::invalid("bad").is_retryable());
		assert!(!AccessError::Internal("disk".into()).is_retryable());
	}

	#[test]
	fn messages_carry_detail() {
		let err = AccessError::invalid("permission 'fly' does not apply to object 'www'");
		assert_eq!(
			err.to_string(),
			"invalid argument: permission 'fly' does not apply to object 'www'"
		);
	}
}
