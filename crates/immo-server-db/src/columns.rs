// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Text encodings shared by every table.

use chrono::{DateTime, SecondsFormat, Utc};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DbError;

/// Fixed-width RFC3339 so that text comparison in SQL orders chronologically.
pub fn format_ts(dt: DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn format_opt_ts(dt: Option<DateTime<Utc>>) -> Option<String> {
	dt.map(format_ts)
}

pub(crate) fn parse_ts(column: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

pub(crate) fn parse_opt_ts(
	column: &str,
	value: Option<String>,
) -> Result<Option<DateTime<Utc>>, DbError> {
	value.map(|v| parse_ts(column, &v)).transpose()
}

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid, DbError> {
	Uuid::parse_str(value).map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}

/// Parses a column through the type's `FromStr`, used for typed ids and enums.
pub(crate) fn parse_col<T>(value: &str) -> Result<T, DbError>
where
	T: FromStr,
	DbError: From<T::Err>,
{
	Ok(value.parse::<T>()?)
}

pub(crate) fn parse_opt_col<T>(value: Option<String>) -> Result<Option<T>, DbError>
where
	T: FromStr,
	DbError: From<T::Err>,
{
	value.map(|v| parse_col(&v)).transpose()
}
