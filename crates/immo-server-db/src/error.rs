// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use immo_server_authz::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Corrupt row: {0}")]
	Parse(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// True when the error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
