// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use immo_server_authz::ParseError;
use immo_server_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error(transparent)]
	Db(DbError),
}

impl From<DbError> for AuthzError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(what) => AuthzError::NotFound(what),
			DbError::Conflict(what) => AuthzError::Conflict(what),
			other => AuthzError::Db(other),
		}
	}
}

impl From<ParseError> for AuthzError {
	fn from(err: ParseError) -> Self {
		AuthzError::InvalidArgument(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, AuthzError>;
