// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use immo_server_authz::{Authorizable, Owned, Ownership, ResourceKind, UserId, Validatable};
use serde::{Deserialize, Serialize};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row,
};
use uuid::Uuid;

use crate::columns::{format_ts, parse_opt_col, parse_ts, parse_uuid};
use crate::error::DbError;
use crate::scope::ScopedRecord;

/// A building permit. Filing one does not make the filer an owner: access goes
/// through the ledger only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit {
	pub id: Uuid,
	pub reference: String,
	pub filed_by: Option<UserId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Permit {
	pub fn new(reference: impl Into<String>, filed_by: Option<UserId>) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			reference: reference.into(),
			filed_by,
			created_at: now,
			updated_at: now,
		}
	}
}

impl Owned for Permit {
	const OWNERSHIP: Ownership = Ownership::None;

	fn ownership_attribute(&self, _attribute: &str) -> Option<UserId> {
		None
	}
}

impl Authorizable for Permit {
	const KIND: ResourceKind = ResourceKind::Permit;

	fn resource_id(&self) -> Uuid {
		self.id
	}
}

impl Validatable for Permit {
	fn content_changed_at(&self) -> DateTime<Utc> {
		self.updated_at
	}
}

impl ScopedRecord for Permit {
	const TABLE: &'static str = "permits";

	fn from_row(row: &SqliteRow) -> Result<Self, DbError> {
		let id: String = row.get("id");
		let filed_by: Option<String> = row.get("filed_by");
		let created_at: String = row.get("created_at");
		let updated_at: String = row.get("updated_at");

		Ok(Permit {
			id: parse_uuid("id", &id)?,
			reference: row.get("reference"),
			filed_by: parse_opt_col(filed_by)?,
			created_at: parse_ts("created_at", &created_at)?,
			updated_at: parse_ts("updated_at", &updated_at)?,
		})
	}
}

#[derive(Clone)]
pub struct PermitRepository {
	pool: SqlitePool,
}

impl PermitRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, permit), fields(permit_id = %permit.id))]
	pub async fn create_permit(&self, permit: &Permit) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO permits (id, reference, filed_by, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(permit.id.to_string())
		.bind(&permit.reference)
		.bind(permit.filed_by.map(|u| u.to_string()))
		.bind(format_ts(permit.created_at))
		.bind(format_ts(permit.updated_at))
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(permit_id = %id))]
	pub async fn get_permit(&self, id: &Uuid) -> Result<Option<Permit>, DbError> {
		let row = sqlx::query("SELECT * FROM permits WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(Permit::from_row).transpose()
	}
}
