// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query-level scopes over authorizable tables.
//!
//! A [`ScopeQuery`] is a WHERE predicate over one record table aliased `r`,
//! built so that it selects exactly the records the per-record checks would
//! allow: ownership columns OR an active ledger grant (direct or via group)
//! at a satisfying level. Everything is evaluated in a single statement.

use chrono::{DateTime, Utc};
use immo_server_authz::{bypasses_ledger, Actor, Authorizable, Check, Ownership};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::marker::PhantomData;

use crate::authorization::{ACTIVE_GRANT_SQL, HELD_BY_USER_SQL};
use crate::columns::format_ts;
use crate::error::DbError;

/// A record type stored in its own table with an `id` primary key and a
/// `created_at` column.
pub trait ScopedRecord: Authorizable + Sized + Send + Unpin {
	const TABLE: &'static str;

	/// Column holding the timestamp `Validatable::content_changed_at` reads.
	const CONTENT_CHANGED_COLUMN: &'static str = "updated_at";

	fn from_row(row: &SqliteRow) -> Result<Self, DbError>;
}

/// Validation-state filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationScope {
	/// An open request exists.
	Pending,
	/// The latest approval is newer than the last content change.
	Validated,
	/// The most recent request was rejected.
	Rejected,
}

/// A composable predicate over the table of `T`.
#[derive(Debug, Clone)]
pub struct ScopeQuery<T> {
	predicate: String,
	binds: Vec<String>,
	_record: PhantomData<fn() -> T>,
}

impl<T: ScopedRecord> ScopeQuery<T> {
	fn new(predicate: impl Into<String>, binds: Vec<String>) -> Self {
		Self {
			predicate: predicate.into(),
			binds,
			_record: PhantomData,
		}
	}

	/// Every record.
	pub fn all() -> Self {
		Self::new("1 = 1", Vec::new())
	}

	/// No record.
	pub fn none() -> Self {
		Self::new("0 = 1", Vec::new())
	}

	/// Records on which `actor` passes `check`.
	pub fn permitted(actor: Option<&Actor>, check: Check, now: DateTime<Utc>) -> Self {
		let Some(actor) = actor else {
			return Self::none();
		};
		if bypasses_ledger(actor) {
			return Self::all();
		}

		let user = actor.user_id.to_string();
		let mut clauses = Vec::new();
		let mut binds = Vec::new();

		if let Ownership::Attributes(attributes) = <T as immo_server_authz::Owned>::OWNERSHIP {
			for attribute in attributes {
				clauses.push(format!("r.\"{attribute}\" = ?"));
				binds.push(user.clone());
			}
		}

		let levels = check.satisfying_levels();
		let placeholders = vec!["?"; levels.len()].join(", ");
		clauses.push(format!(
			"EXISTS (SELECT 1 FROM authorizations a \
			WHERE a.resource_type = ? AND a.resource_id = r.id \
			AND a.permission_level IN ({placeholders}) \
			AND {ACTIVE_GRANT_SQL} AND {HELD_BY_USER_SQL})"
		));
		binds.push(T::KIND.as_str().to_string());
		binds.extend(levels.iter().map(|l| l.as_str().to_string()));
		binds.push(format_ts(now));
		binds.push(user.clone());
		binds.push(user);

		Self::new(format!("({})", clauses.join(" OR ")), binds)
	}

	/// Records in the given validation state.
	pub fn validation(state: ValidationScope) -> Self {
		let predicate = match state {
			ValidationScope::Pending => "EXISTS (SELECT 1 FROM validation_requests v \
				WHERE v.validatable_type = ? AND v.validatable_id = r.id \
				AND v.status IN ('pending', 'in_progress'))"
				.to_string(),
			ValidationScope::Validated => format!(
				"(SELECT v.completed_at FROM validation_requests v \
				WHERE v.validatable_type = ? AND v.validatable_id = r.id AND v.status = 'approved' \
				ORDER BY v.created_at DESC, v.rowid DESC LIMIT 1) > r.\"{column}\"",
				column = T::CONTENT_CHANGED_COLUMN
			),
			ValidationScope::Rejected => "(SELECT v.status FROM validation_requests v \
				WHERE v.validatable_type = ? AND v.validatable_id = r.id \
				ORDER BY v.created_at DESC, v.rowid DESC LIMIT 1) = 'rejected'"
				.to_string(),
		};
		Self::new(predicate, vec![T::KIND.as_str().to_string()])
	}

	/// Both predicates must hold.
	pub fn and(mut self, other: ScopeQuery<T>) -> Self {
		self.predicate = format!("({}) AND ({})", self.predicate, other.predicate);
		self.binds.extend(other.binds);
		self
	}

	pub fn sql(&self) -> String {
		format!(
			"SELECT r.* FROM {table} r WHERE {predicate} ORDER BY r.created_at, r.id",
			table = T::TABLE,
			predicate = self.predicate
		)
	}

	pub fn binds(&self) -> &[String] {
		&self.binds
	}
}

/// Executes scopes.
#[derive(Clone)]
pub struct ScopeRepository {
	pool: SqlitePool,
}

impl ScopeRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, scope), fields(table = T::TABLE))]
	pub async fn fetch<T: ScopedRecord>(&self, scope: &ScopeQuery<T>) -> Result<Vec<T>, DbError> {
		let sql = scope.sql();
		let mut query = sqlx::query(&sql);
		for bind in scope.binds() {
			query = query.bind(bind.as_str());
		}
		let rows = query.fetch_all(&self.pool).await?;

		tracing::debug!(count = rows.len(), "scope fetched");
		rows.iter().map(T::from_row).collect()
	}
}
