// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use immo_server_authz::{OrgId, User, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::columns::{format_ts, parse_col, parse_opt_col, parse_ts};
use crate::error::DbError;

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn create_user(&self, user: &User) -> Result<(), DbError>;
	async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError>;
	async fn set_super_admin(&self, id: &UserId, is_super_admin: bool) -> Result<bool, DbError>;
	async fn list_users(&self) -> Result<Vec<User>, DbError>;
}

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
	pub async fn create_user(&self, user: &User) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO users (id, display_name, organization_id, is_super_admin, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(&user.display_name)
		.bind(user.organization_id.map(|o| o.to_string()))
		.bind(user.is_super_admin)
		.bind(format_ts(user.created_at))
		.execute(&self.pool)
		.await?;

		tracing::debug!(user_id = %user.id, "user created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, display_name, organization_id, is_super_admin, created_at
			FROM users
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(row_to_user).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn set_super_admin(&self, id: &UserId, is_super_admin: bool) -> Result<bool, DbError> {
		let result = sqlx::query("UPDATE users SET is_super_admin = ? WHERE id = ?")
			.bind(is_super_admin)
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, display_name, organization_id, is_super_admin, created_at
			FROM users
			ORDER BY display_name
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_user).collect()
	}
}

#[async_trait]
impl UserStore for UserRepository {
	async fn create_user(&self, user: &User) -> Result<(), DbError> {
		self.create_user(user).await
	}

	async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError> {
		self.get_user(id).await
	}

	async fn set_super_admin(&self, id: &UserId, is_super_admin: bool) -> Result<bool, DbError> {
		self.set_super_admin(id, is_super_admin).await
	}

	async fn list_users(&self) -> Result<Vec<User>, DbError> {
		self.list_users().await
	}
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, DbError> {
	let id: String = row.get("id");
	let organization_id: Option<String> = row.get("organization_id");
	let is_super_admin: i64 = row.get("is_super_admin");
	let created_at: String = row.get("created_at");

	Ok(User {
		id: parse_col(&id)?,
		display_name: row.get("display_name"),
		organization_id: parse_opt_col::<OrgId>(organization_id)?,
		is_super_admin: is_super_admin != 0,
		created_at: parse_ts("created_at", &created_at)?,
	})
}
