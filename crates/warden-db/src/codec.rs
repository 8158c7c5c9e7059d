// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Column encoding shared by the repositories.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;

pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, DbError> {
	chrono::DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid, DbError> {
	Uuid::parse_str(value).map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn encode_info(info: &Option<serde_json::Value>) -> Result<Option<String>, DbError> {
	info.as_ref()
		.map(serde_json::to_string)
		.transpose()
		.map_err(DbError::from)
}

pub(crate) fn decode_info(raw: Option<String>) -> Result<Option<serde_json::Value>, DbError> {
	raw.map(|text| serde_json::from_str(&text))
		.transpose()
		.map_err(DbError::from)
}

/// `?, ?, ?` for an `IN (...)` clause with `count` parameters.
pub(crate) fn placeholders(count: usize) -> String {
	vec!["?"; count].join(", ")
}
