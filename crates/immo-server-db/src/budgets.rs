// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use immo_server_authz::{Authorizable, Owned, ResourceKind, UserId, Validatable};
use serde::{Deserialize, Serialize};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row,
};
use uuid::Uuid;

use crate::columns::{format_ts, parse_opt_col, parse_ts, parse_uuid};
use crate::error::DbError;
use crate::scope::ScopedRecord;

/// A project budget, owned through the default `user` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
	pub id: Uuid,
	pub name: String,
	pub amount_cents: i64,
	pub user: Option<UserId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Budget {
	pub fn new(name: impl Into<String>, amount_cents: i64, user: Option<UserId>) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			name: name.into(),
			amount_cents,
			user,
			created_at: now,
			updated_at: now,
		}
	}
}

impl Owned for Budget {
	fn ownership_attribute(&self, attribute: &str) -> Option<UserId> {
		(attribute == "user").then_some(self.user).flatten()
	}
}

impl Authorizable for Budget {
	const KIND: ResourceKind = ResourceKind::Budget;

	fn resource_id(&self) -> Uuid {
		self.id
	}
}

impl Validatable for Budget {
	fn content_changed_at(&self) -> DateTime<Utc> {
		self.updated_at
	}
}

impl ScopedRecord for Budget {
	const TABLE: &'static str = "budgets";

	fn from_row(row: &SqliteRow) -> Result<Self, DbError> {
		let id: String = row.get("id");
		let user: Option<String> = row.get("user");
		let created_at: String = row.get("created_at");
		let updated_at: String = row.get("updated_at");

		Ok(Budget {
			id: parse_uuid("id", &id)?,
			name: row.get("name"),
			amount_cents: row.get("amount_cents"),
			user: parse_opt_col(user)?,
			created_at: parse_ts("created_at", &created_at)?,
			updated_at: parse_ts("updated_at", &updated_at)?,
		})
	}
}

#[derive(Clone)]
pub struct BudgetRepository {
	pool: SqlitePool,
}

impl BudgetRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, budget), fields(budget_id = %budget.id))]
	pub async fn create_budget(&self, budget: &Budget) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO budgets (id, name, amount_cents, "user", created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(budget.id.to_string())
		.bind(&budget.name)
		.bind(budget.amount_cents)
		.bind(budget.user.map(|u| u.to_string()))
		.bind(format_ts(budget.created_at))
		.bind(format_ts(budget.updated_at))
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(budget_id = %id))]
	pub async fn get_budget(&self, id: &Uuid) -> Result<Option<Budget>, DbError> {
		let row = sqlx::query("SELECT * FROM budgets WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(Budget::from_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(budget_id = %id))]
	pub async fn update_amount(&self, id: &Uuid, amount_cents: i64) -> Result<bool, DbError> {
		let result = sqlx::query("UPDATE budgets SET amount_cents = ?, updated_at = ? WHERE id = ?")
			.bind(amount_cents)
			.bind(format_ts(Utc::now()))
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}
