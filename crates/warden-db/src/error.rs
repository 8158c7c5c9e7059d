// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use warden_core::AccessError;

// SQLITE_BUSY, SQLITE_LOCKED and SQLITE_BUSY_SNAPSHOT.
const CONTENTION_CODES: &[&str] = &["5", "6", "517"];

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
	/// Classify a driver error raised by a write.
	///
	/// Unique violations and lock contention mean another transaction got there
	/// first; both surface as [`DbError::Conflict`].
	pub fn from_write(e: sqlx::Error, what: &str) -> Self {
		if let sqlx::Error::Database(ref db_err) = e {
			if db_err.is_unique_violation() {
				return DbError::Conflict(format!("{what} already exists"));
			}
		}
		if is_contention(&e) {
			return DbError::Conflict(format!("{what}: {e}"));
		}
		DbError::Sqlx(e)
	}
}

fn is_contention(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Database(db_err) => db_err
			.code()
			.map(|code| CONTENTION_CODES.contains(&code.as_ref()))
			.unwrap_or(false),
		_ => false,
	}
}

impl From<DbError> for AccessError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::NotFound(msg) => AccessError::NotFound(msg),
			DbError::InvalidArgument(msg) => AccessError::InvalidArgument(msg),
			DbError::Conflict(msg) => AccessError::Conflict(msg),
			DbError::Internal(msg) => AccessError::Internal(msg),
			DbError::Sqlx(e) if is_contention(&e) => AccessError::Conflict(e.to_string()),
			DbError::Sqlx(e) => AccessError::Internal(e.to_string()),
			DbError::Serialization(e) => AccessError::Internal(e.to_string()),
		}
	}
}
