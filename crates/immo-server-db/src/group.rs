// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User group repository.
//!
//! Groups are organization-scoped and are the only non-user authorization
//! subject. Deleting a group removes its memberships and every ledger row that
//! names it as subject.

use async_trait::async_trait;
use immo_server_authz::{GroupId, OrgId, UserGroup, UserGroupMembership, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::columns::{format_ts, parse_col, parse_ts, parse_uuid};
use crate::error::{is_unique_violation, DbError};

#[async_trait]
pub trait GroupStore: Send + Sync {
	async fn create_group(&self, group: &UserGroup) -> Result<(), DbError>;
	async fn get_group(&self, id: &GroupId) -> Result<Option<UserGroup>, DbError>;
	async fn delete_group(&self, id: &GroupId) -> Result<bool, DbError>;
	async fn list_groups_for_org(&self, org_id: &OrgId) -> Result<Vec<UserGroup>, DbError>;
	async fn list_groups_for_user(&self, user_id: &UserId) -> Result<Vec<UserGroup>, DbError>;
	async fn add_member(
		&self,
		group_id: &GroupId,
		user_id: &UserId,
	) -> Result<UserGroupMembership, DbError>;
	async fn remove_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError>;
	async fn list_members(&self, group_id: &GroupId) -> Result<Vec<UserGroupMembership>, DbError>;
	async fn is_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError>;
}

/// Repository for user groups and their memberships.
#[derive(Clone)]
pub struct GroupRepository {
	pool: SqlitePool,
}

impl GroupRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Groups
	// =========================================================================

	/// Create a group.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the organization already has a group with
	/// the same name.
	#[tracing::instrument(skip(self, group), fields(group_id = %group.id, org_id = %group.organization_id))]
	pub async fn create_group(&self, group: &UserGroup) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO user_groups (id, organization_id, name, description, created_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(group.id.to_string())
		.bind(group.organization_id.to_string())
		.bind(&group.name)
		.bind(&group.description)
		.bind(format_ts(group.created_at))
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!(group_id = %group.id, name = %group.name, "group created");
				Ok(())
			}
			Err(e) if is_unique_violation(&e) => Err(DbError::Conflict(format!(
				"group '{}' already exists in organization {}",
				group.name, group.organization_id
			))),
			Err(e) => Err(e.into()),
		}
	}

	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn get_group(&self, id: &GroupId) -> Result<Option<UserGroup>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, organization_id, name, description, created_at
			FROM user_groups
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(row_to_group).transpose()
	}

	/// Delete a group with its memberships and group-subject grants.
	///
	/// Returns `false` if the group did not exist.
	#[tracing::instrument(skip(self), fields(group_id = %id))]
	pub async fn delete_group(&self, id: &GroupId) -> Result<bool, DbError> {
		let id_str = id.to_string();
		let mut tx = self.pool.begin().await?;

		let grants = sqlx::query(
			"DELETE FROM authorizations WHERE subject_type = 'group' AND subject_id = ?",
		)
		.bind(&id_str)
		.execute(&mut *tx)
		.await?;

		let members = sqlx::query("DELETE FROM user_group_memberships WHERE group_id = ?")
			.bind(&id_str)
			.execute(&mut *tx)
			.await?;

		let group = sqlx::query("DELETE FROM user_groups WHERE id = ?")
			.bind(&id_str)
			.execute(&mut *tx)
			.await?;

		if group.rows_affected() == 0 {
			return Ok(false);
		}

		tx.commit().await?;

		tracing::info!(
			group_id = %id,
			grants = grants.rows_affected(),
			members = members.rows_affected(),
			"group deleted"
		);
		Ok(true)
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn list_groups_for_org(&self, org_id: &OrgId) -> Result<Vec<UserGroup>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, organization_id, name, description, created_at
			FROM user_groups
			WHERE organization_id = ?
			ORDER BY name
			"#,
		)
		.bind(org_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_group).collect()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_groups_for_user(&self, user_id: &UserId) -> Result<Vec<UserGroup>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT g.id, g.organization_id, g.name, g.description, g.created_at
			FROM user_groups g
			JOIN user_group_memberships m ON m.group_id = g.id
			WHERE m.user_id = ?
			ORDER BY g.name
			"#,
		)
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_group).collect()
	}

	// =========================================================================
	// Memberships
	// =========================================================================

	/// Add a user to a group.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the group does not exist and
	/// `DbError::Conflict` if the user is already a member.
	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn add_member(
		&self,
		group_id: &GroupId,
		user_id: &UserId,
	) -> Result<UserGroupMembership, DbError> {
		if self.get_group(group_id).await?.is_none() {
			return Err(DbError::NotFound(format!("group {group_id}")));
		}

		let membership = UserGroupMembership::new(*group_id, *user_id);
		let result = sqlx::query(
			r#"
			INSERT INTO user_group_memberships (id, group_id, user_id, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(membership.id.to_string())
		.bind(group_id.to_string())
		.bind(user_id.to_string())
		.bind(format_ts(membership.created_at))
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!(group_id = %group_id, user_id = %user_id, "member added");
				Ok(membership)
			}
			Err(e) if is_unique_violation(&e) => Err(DbError::Conflict(format!(
				"user {user_id} is already a member of group {group_id}"
			))),
			Err(e) => Err(e.into()),
		}
	}

	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn remove_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError> {
		let result =
			sqlx::query("DELETE FROM user_group_memberships WHERE group_id = ? AND user_id = ?")
				.bind(group_id.to_string())
				.bind(user_id.to_string())
				.execute(&self.pool)
				.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(group_id = %group_id, user_id = %user_id, "member removed");
		}
		Ok(removed)
	}

	#[tracing::instrument(skip(self), fields(group_id = %group_id))]
	pub async fn list_members(
		&self,
		group_id: &GroupId,
	) -> Result<Vec<UserGroupMembership>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, group_id, user_id, created_at
			FROM user_group_memberships
			WHERE group_id = ?
			ORDER BY created_at
			"#,
		)
		.bind(group_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_membership).collect()
	}

	#[tracing::instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
	pub async fn is_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError> {
		let row = sqlx::query(
			"SELECT 1 AS present FROM user_group_memberships WHERE group_id = ? AND user_id = ?",
		)
		.bind(group_id.to_string())
		.bind(user_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.is_some())
	}
}

#[async_trait]
impl GroupStore for GroupRepository {
	async fn create_group(&self, group: &UserGroup) -> Result<(), DbError> {
		self.create_group(group).await
	}

	async fn get_group(&self, id: &GroupId) -> Result<Option<UserGroup>, DbError> {
		self.get_group(id).await
	}

	async fn delete_group(&self, id: &GroupId) -> Result<bool, DbError> {
		self.delete_group(id).await
	}

	async fn list_groups_for_org(&self, org_id: &OrgId) -> Result<Vec<UserGroup>, DbError> {
		self.list_groups_for_org(org_id).await
	}

	async fn list_groups_for_user(&self, user_id: &UserId) -> Result<Vec<UserGroup>, DbError> {
		self.list_groups_for_user(user_id).await
	}

	async fn add_member(
		&self,
		group_id: &GroupId,
		user_id: &UserId,
	) -> Result<UserGroupMembership, DbError> {
		self.add_member(group_id, user_id).await
	}

	async fn remove_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError> {
		self.remove_member(group_id, user_id).await
	}

	async fn list_members(&self, group_id: &GroupId) -> Result<Vec<UserGroupMembership>, DbError> {
		self.list_members(group_id).await
	}

	async fn is_member(&self, group_id: &GroupId, user_id: &UserId) -> Result<bool, DbError> {
		self.is_member(group_id, user_id).await
	}
}

fn row_to_group(row: &sqlx::sqlite::SqliteRow) -> Result<UserGroup, DbError> {
	let id: String = row.get("id");
	let organization_id: String = row.get("organization_id");
	let created_at: String = row.get("created_at");

	Ok(UserGroup {
		id: parse_col(&id)?,
		organization_id: parse_col(&organization_id)?,
		name: row.get("name"),
		description: row.get("description"),
		created_at: parse_ts("created_at", &created_at)?,
	})
}

fn row_to_membership(row: &sqlx::sqlite::SqliteRow) -> Result<UserGroupMembership, DbError> {
	let id: String = row.get("id");
	let group_id: String = row.get("group_id");
	let user_id: String = row.get("user_id");
	let created_at: String = row.get("created_at");

	Ok(UserGroupMembership {
		id: parse_uuid("id", &id)?,
		group_id: parse_col(&group_id)?,
		user_id: parse_col(&user_id)?,
		created_at: parse_ts("created_at", &created_at)?,
	})
}
