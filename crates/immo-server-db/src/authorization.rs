// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization ledger repository.
//!
//! Grants are append-only: a revocation stamps `revoked_at`/`revoked_by` and
//! appends a note to the comment, it never deletes. Every grant and revocation
//! writes an `authorization_events` row in the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use immo_server_authz::{
	append_revocation_note, Authorization, AuthorizationEvent, AuthorizationEventKind,
	AuthorizationId, GroupId, PermissionLevel, ResourceRef, Subject, UserId,
};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::columns::{format_opt_ts, format_ts, parse_col, parse_opt_col, parse_opt_ts, parse_ts};
use crate::error::DbError;

/// Active-grant predicate on an `authorizations` row aliased `a`. Binds: now.
pub(crate) const ACTIVE_GRANT_SQL: &str =
	"a.revoked_at IS NULL AND (a.expires_at IS NULL OR a.expires_at > ?)";

/// Row aliased `a` is held by the user directly or through one of their
/// groups. Binds: user id, user id.
pub(crate) const HELD_BY_USER_SQL: &str = "((a.subject_type = 'user' AND a.subject_id = ?) \
	OR (a.subject_type = 'group' AND a.subject_id IN \
	(SELECT m.group_id FROM user_group_memberships m WHERE m.user_id = ?)))";

const AUTHORIZATION_COLUMNS: &str = "a.id, a.subject_type, a.subject_id, a.resource_type, \
	a.resource_id, a.permission_level, a.granted_by, a.granted_at, a.expires_at, a.revoked_at, \
	a.revoked_by, a.comment";

const AUTHORIZATION_RETURNING: &str = "id, subject_type, subject_id, resource_type, resource_id, \
	permission_level, granted_by, granted_at, expires_at, revoked_at, revoked_by, comment";

#[async_trait]
pub trait AuthorizationStore: Send + Sync {
	async fn create_authorization(&self, authorization: &Authorization) -> Result<(), DbError>;
	async fn get_authorization(
		&self,
		id: &AuthorizationId,
	) -> Result<Option<Authorization>, DbError>;
	async fn revoke_latest(
		&self,
		resource: &ResourceRef,
		subject: &Subject,
		level: PermissionLevel,
		revoked_by: &UserId,
		note: Option<&str>,
	) -> Result<Option<Authorization>, DbError>;
	async fn active_levels_for_user(
		&self,
		resource: &ResourceRef,
		user_id: &UserId,
		now: DateTime<Utc>,
	) -> Result<Vec<PermissionLevel>, DbError>;
	async fn list_active(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<Authorization>, DbError>;
	async fn list_for_resource(&self, resource: &ResourceRef) -> Result<Vec<Authorization>, DbError>;
	async fn authorized_user_ids(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<UserId>, DbError>;
	async fn authorized_group_ids(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<GroupId>, DbError>;
	async fn list_events(&self, id: &AuthorizationId) -> Result<Vec<AuthorizationEvent>, DbError>;
}

/// Repository for the authorization ledger.
#[derive(Clone)]
pub struct AuthorizationRepository {
	pool: SqlitePool,
}

impl AuthorizationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a grant together with its `granted` event.
	#[tracing::instrument(
		skip(self, authorization),
		fields(
			authorization_id = %authorization.id,
			subject = %authorization.subject,
			resource = %authorization.resource,
			level = %authorization.permission_level
		)
	)]
	pub async fn create_authorization(&self, authorization: &Authorization) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO authorizations (
				id, subject_type, subject_id, resource_type, resource_id, permission_level,
				granted_by, granted_at, expires_at, revoked_at, revoked_by, comment
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(authorization.id.to_string())
		.bind(authorization.subject.kind().as_str())
		.bind(authorization.subject.id().to_string())
		.bind(authorization.resource.kind.as_str())
		.bind(authorization.resource.id.to_string())
		.bind(authorization.permission_level.as_str())
		.bind(authorization.granted_by.to_string())
		.bind(format_ts(authorization.granted_at))
		.bind(format_opt_ts(authorization.expires_at))
		.bind(format_opt_ts(authorization.revoked_at))
		.bind(authorization.revoked_by.map(|u| u.to_string()))
		.bind(&authorization.comment)
		.execute(&mut *tx)
		.await?;

		let event = AuthorizationEvent::new(
			authorization.id,
			AuthorizationEventKind::Granted,
			authorization.granted_by,
			authorization.comment.clone(),
			authorization.granted_at,
		);
		insert_event(&mut tx, &event).await?;

		tx.commit().await?;

		tracing::debug!(authorization_id = %authorization.id, "authorization granted");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(authorization_id = %id))]
	pub async fn get_authorization(
		&self,
		id: &AuthorizationId,
	) -> Result<Option<Authorization>, DbError> {
		let sql = format!("SELECT {AUTHORIZATION_COLUMNS} FROM authorizations a WHERE a.id = ?");
		let row = sqlx::query(&sql)
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(row_to_authorization).transpose()
	}

	/// Revoke the most recent active grant of `level` held directly by
	/// `subject` on `resource`. Older duplicates stay active.
	///
	/// The note is appended to the row's existing comment. The update is the
	/// first statement of the transaction so concurrent revocations serialize on
	/// the write lock.
	#[tracing::instrument(
		skip(self, note),
		fields(resource = %resource, subject = %subject, level = %level, revoked_by = %revoked_by)
	)]
	pub async fn revoke_latest(
		&self,
		resource: &ResourceRef,
		subject: &Subject,
		level: PermissionLevel,
		revoked_by: &UserId,
		note: Option<&str>,
	) -> Result<Option<Authorization>, DbError> {
		let now = Utc::now();
		let now_str = format_ts(now);
		let line = append_revocation_note(None, revoked_by, now, note);

		let mut tx = self.pool.begin().await?;

		let sql = format!(
			r#"
			UPDATE authorizations
			SET revoked_at = ?,
				revoked_by = ?,
				comment = CASE
					WHEN comment IS NULL OR comment = '' THEN ?
					ELSE comment || char(10) || ?
				END
			WHERE id = (
				SELECT a.id FROM authorizations a
				WHERE a.resource_type = ? AND a.resource_id = ?
					AND a.subject_type = ? AND a.subject_id = ?
					AND a.permission_level = ?
					AND {ACTIVE_GRANT_SQL}
				ORDER BY a.granted_at DESC, a.rowid DESC
				LIMIT 1
			)
			RETURNING {AUTHORIZATION_RETURNING}
			"#
		);
		let row = sqlx::query(&sql)
			.bind(&now_str)
			.bind(revoked_by.to_string())
			.bind(&line)
			.bind(&line)
			.bind(resource.kind.as_str())
			.bind(resource.id.to_string())
			.bind(subject.kind().as_str())
			.bind(subject.id().to_string())
			.bind(level.as_str())
			.bind(&now_str)
			.fetch_optional(&mut *tx)
			.await?;

		let Some(row) = row else {
			return Ok(None);
		};
		let revoked = row_to_authorization(&row)?;

		let event = AuthorizationEvent::new(
			revoked.id,
			AuthorizationEventKind::Revoked,
			*revoked_by,
			note.map(str::to_string),
			now,
		);
		insert_event(&mut tx, &event).await?;

		tx.commit().await?;

		tracing::debug!(authorization_id = %revoked.id, "authorization revoked");
		Ok(Some(revoked))
	}

	/// Distinct levels the user holds on the resource, directly or through any
	/// of their groups, from active grants only.
	#[tracing::instrument(skip(self, now), fields(resource = %resource, user_id = %user_id))]
	pub async fn active_levels_for_user(
		&self,
		resource: &ResourceRef,
		user_id: &UserId,
		now: DateTime<Utc>,
	) -> Result<Vec<PermissionLevel>, DbError> {
		let sql = format!(
			r#"
			SELECT DISTINCT a.permission_level
			FROM authorizations a
			WHERE a.resource_type = ? AND a.resource_id = ?
				AND {ACTIVE_GRANT_SQL}
				AND {HELD_BY_USER_SQL}
			"#
		);
		let rows = sqlx::query(&sql)
			.bind(resource.kind.as_str())
			.bind(resource.id.to_string())
			.bind(format_ts(now))
			.bind(user_id.to_string())
			.bind(user_id.to_string())
			.fetch_all(&self.pool)
			.await?;

		rows
			.iter()
			.map(|row| {
				let level: String = row.get("permission_level");
				parse_col(&level)
			})
			.collect()
	}

	#[tracing::instrument(skip(self, now), fields(resource = %resource))]
	pub async fn list_active(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<Authorization>, DbError> {
		let sql = format!(
			r#"
			SELECT {AUTHORIZATION_COLUMNS}
			FROM authorizations a
			WHERE a.resource_type = ? AND a.resource_id = ?
				AND {ACTIVE_GRANT_SQL}
				AND (? IS NULL OR a.permission_level = ?)
			ORDER BY a.granted_at
			"#
		);
		let level = level.map(|l| l.as_str());
		let rows = sqlx::query(&sql)
			.bind(resource.kind.as_str())
			.bind(resource.id.to_string())
			.bind(format_ts(now))
			.bind(level)
			.bind(level)
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_authorization).collect()
	}

	/// Full ledger of the resource including revoked and expired rows.
	#[tracing::instrument(skip(self), fields(resource = %resource))]
	pub async fn list_for_resource(
		&self,
		resource: &ResourceRef,
	) -> Result<Vec<Authorization>, DbError> {
		let sql = format!(
			r#"
			SELECT {AUTHORIZATION_COLUMNS}
			FROM authorizations a
			WHERE a.resource_type = ? AND a.resource_id = ?
			ORDER BY a.granted_at
			"#
		);
		let rows = sqlx::query(&sql)
			.bind(resource.kind.as_str())
			.bind(resource.id.to_string())
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_authorization).collect()
	}

	/// Users holding an active direct grant, optionally of one level.
	#[tracing::instrument(skip(self, now), fields(resource = %resource))]
	pub async fn authorized_user_ids(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<UserId>, DbError> {
		let ids = self.subject_ids(resource, "user", level, now).await?;
		ids.iter().map(|id| parse_col(id)).collect()
	}

	/// Groups holding an active grant, optionally of one level.
	#[tracing::instrument(skip(self, now), fields(resource = %resource))]
	pub async fn authorized_group_ids(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<GroupId>, DbError> {
		let ids = self.subject_ids(resource, "group", level, now).await?;
		ids.iter().map(|id| parse_col(id)).collect()
	}

	async fn subject_ids(
		&self,
		resource: &ResourceRef,
		subject_type: &str,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<String>, DbError> {
		let sql = format!(
			r#"
			SELECT a.subject_id, MIN(a.granted_at) AS first_granted
			FROM authorizations a
			WHERE a.resource_type = ? AND a.resource_id = ?
				AND a.subject_type = ?
				AND {ACTIVE_GRANT_SQL}
				AND (? IS NULL OR a.permission_level = ?)
			GROUP BY a.subject_id
			ORDER BY first_granted
			"#
		);
		let level = level.map(|l| l.as_str());
		let rows = sqlx::query(&sql)
			.bind(resource.kind.as_str())
			.bind(resource.id.to_string())
			.bind(subject_type)
			.bind(format_ts(now))
			.bind(level)
			.bind(level)
			.fetch_all(&self.pool)
			.await?;

		Ok(rows.iter().map(|row| row.get("subject_id")).collect())
	}

	/// Audit trail of one ledger entry, oldest first.
	#[tracing::instrument(skip(self), fields(authorization_id = %id))]
	pub async fn list_events(
		&self,
		id: &AuthorizationId,
	) -> Result<Vec<AuthorizationEvent>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, authorization_id, event, actor_id, comment, occurred_at
			FROM authorization_events
			WHERE authorization_id = ?
			ORDER BY occurred_at, rowid
			"#,
		)
		.bind(id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_event).collect()
	}
}

#[async_trait]
impl AuthorizationStore for AuthorizationRepository {
	async fn create_authorization(&self, authorization: &Authorization) -> Result<(), DbError> {
		self.create_authorization(authorization).await
	}

	async fn get_authorization(
		&self,
		id: &AuthorizationId,
	) -> Result<Option<Authorization>, DbError> {
		self.get_authorization(id).await
	}

	async fn revoke_latest(
		&self,
		resource: &ResourceRef,
		subject: &Subject,
		level: PermissionLevel,
		revoked_by: &UserId,
		note: Option<&str>,
	) -> Result<Option<Authorization>, DbError> {
		self
			.revoke_latest(resource, subject, level, revoked_by, note)
			.await
	}

	async fn active_levels_for_user(
		&self,
		resource: &ResourceRef,
		user_id: &UserId,
		now: DateTime<Utc>,
	) -> Result<Vec<PermissionLevel>, DbError> {
		self.active_levels_for_user(resource, user_id, now).await
	}

	async fn list_active(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<Authorization>, DbError> {
		self.list_active(resource, level, now).await
	}

	async fn list_for_resource(&self, resource: &ResourceRef) -> Result<Vec<Authorization>, DbError> {
		self.list_for_resource(resource).await
	}

	async fn authorized_user_ids(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<UserId>, DbError> {
		self.authorized_user_ids(resource, level, now).await
	}

	async fn authorized_group_ids(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
		now: DateTime<Utc>,
	) -> Result<Vec<GroupId>, DbError> {
		self.authorized_group_ids(resource, level, now).await
	}

	async fn list_events(&self, id: &AuthorizationId) -> Result<Vec<AuthorizationEvent>, DbError> {
		self.list_events(id).await
	}
}

async fn insert_event(
	tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
	event: &AuthorizationEvent,
) -> Result<(), DbError> {
	sqlx::query(
		r#"
		INSERT INTO authorization_events (id, authorization_id, event, actor_id, comment, occurred_at)
		VALUES (?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(event.id.to_string())
	.bind(event.authorization_id.to_string())
	.bind(event.kind.to_string())
	.bind(event.actor.to_string())
	.bind(&event.comment)
	.bind(format_ts(event.occurred_at))
	.execute(&mut **tx)
	.await?;
	Ok(())
}

pub(crate) fn row_to_authorization(row: &sqlx::sqlite::SqliteRow) -> Result<Authorization, DbError> {
	let id: String = row.get("id");
	let subject_type: String = row.get("subject_type");
	let subject_id: String = row.get("subject_id");
	let resource_type: String = row.get("resource_type");
	let resource_id: String = row.get("resource_id");
	let level: String = row.get("permission_level");
	let granted_by: String = row.get("granted_by");
	let granted_at: String = row.get("granted_at");
	let revoked_by: Option<String> = row.get("revoked_by");

	Ok(Authorization {
		id: parse_col(&id)?,
		subject: Subject::from_parts(&subject_type, &subject_id)?,
		resource: ResourceRef::from_parts(&resource_type, &resource_id)?,
		permission_level: parse_col(&level)?,
		granted_by: parse_col(&granted_by)?,
		granted_at: parse_ts("granted_at", &granted_at)?,
		expires_at: parse_opt_ts("expires_at", row.get("expires_at"))?,
		revoked_at: parse_opt_ts("revoked_at", row.get("revoked_at"))?,
		revoked_by: parse_opt_col(revoked_by)?,
		comment: row.get("comment"),
	})
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuthorizationEvent, DbError> {
	let id: String = row.get("id");
	let authorization_id: String = row.get("authorization_id");
	let event: String = row.get("event");
	let actor_id: String = row.get("actor_id");
	let occurred_at: String = row.get("occurred_at");

	Ok(AuthorizationEvent {
		id: crate::columns::parse_uuid("id", &id)?,
		authorization_id: parse_col(&authorization_id)?,
		kind: parse_col(&event)?,
		actor: parse_col(&actor_id)?,
		comment: row.get("comment"),
		occurred_at: parse_ts("occurred_at", &occurred_at)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::group::GroupRepository;
	use crate::testing::create_test_pool;
	use chrono::Duration;
	use immo_server_authz::{OrgId, ResourceKind, UserGroup};

	fn document() -> ResourceRef {
		ResourceRef::new(ResourceKind::Document, Uuid::new_v4())
	}

	async fn setup() -> (AuthorizationRepository, GroupRepository) {
		let pool = create_test_pool().await;
		(
			AuthorizationRepository::new(pool.clone()),
			GroupRepository::new(pool),
		)
	}

	#[tokio::test]
	async fn grant_is_stored_with_event() {
		let (repo, _) = setup().await;
		let doc = document();
		let alice = UserId::generate();
		let admin = UserId::generate();

		let grant = Authorization::new(alice.into(), doc, PermissionLevel::Read, admin)
			.with_comment(Some("site access".to_string()));
		repo.create_authorization(&grant).await.unwrap();

		let fetched = repo.get_authorization(&grant.id).await.unwrap().unwrap();
		assert_eq!(fetched.subject, Subject::User(alice));
		assert_eq!(fetched.resource, doc);
		assert_eq!(fetched.granted_by, admin);
		assert_eq!(fetched.comment.as_deref(), Some("site access"));

		let events = repo.list_events(&grant.id).await.unwrap();
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, AuthorizationEventKind::Granted);
		assert_eq!(events[0].actor, admin);
	}

	#[tokio::test]
	async fn active_levels_ignore_expired_and_revoked() {
		let (repo, _) = setup().await;
		let doc = document();
		let alice = UserId::generate();
		let admin = UserId::generate();
		let now = Utc::now();

		let expired = Authorization::new(alice.into(), doc, PermissionLevel::Write, admin)
			.with_expiry(Some(now - Duration::hours(1)));
		let read = Authorization::new(alice.into(), doc, PermissionLevel::Read, admin);
		let admin_grant = Authorization::new(alice.into(), doc, PermissionLevel::Admin, admin);
		for grant in [&expired, &read, &admin_grant] {
			repo.create_authorization(grant).await.unwrap();
		}
		repo
			.revoke_latest(&doc, &alice.into(), PermissionLevel::Admin, &admin, None)
			.await
			.unwrap()
			.unwrap();

		let levels = repo.active_levels_for_user(&doc, &alice, Utc::now()).await.unwrap();
		assert_eq!(levels, vec![PermissionLevel::Read]);
	}

	#[tokio::test]
	async fn group_grants_reach_members() {
		let (repo, groups) = setup().await;
		let doc = document();
		let bob = UserId::generate();
		let admin = UserId::generate();

		let group = UserGroup::new(OrgId::generate(), "Architects");
		groups.create_group(&group).await.unwrap();
		groups.add_member(&group.id, &bob).await.unwrap();

		let grant = Authorization::new(group.id.into(), doc, PermissionLevel::Write, admin);
		repo.create_authorization(&grant).await.unwrap();

		let levels = repo.active_levels_for_user(&doc, &bob, Utc::now()).await.unwrap();
		assert_eq!(levels, vec![PermissionLevel::Write]);

		groups.remove_member(&group.id, &bob).await.unwrap();
		let levels = repo.active_levels_for_user(&doc, &bob, Utc::now()).await.unwrap();
		assert!(levels.is_empty());
	}

	#[tokio::test]
	async fn revoke_appends_note_and_keeps_row() {
		let (repo, _) = setup().await;
		let doc = document();
		let alice = UserId::generate();
		let admin = UserId::generate();

		let grant = Authorization::new(alice.into(), doc, PermissionLevel::Read, admin)
			.with_comment(Some("initial".to_string()));
		repo.create_authorization(&grant).await.unwrap();

		let revoked = repo
			.revoke_latest(&doc, &alice.into(), PermissionLevel::Read, &admin, Some("left project"))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(revoked.id, grant.id);

		let row = repo.get_authorization(&grant.id).await.unwrap().unwrap();
		assert!(row.revoked_at.is_some());
		assert_eq!(row.revoked_by, Some(admin));
		let comment = row.comment.unwrap();
		assert!(comment.starts_with("initial\n[revoked "));
		assert!(comment.ends_with("left project"));

		let events = repo.list_events(&grant.id).await.unwrap();
		assert_eq!(events.len(), 2);
		assert_eq!(events[1].kind, AuthorizationEventKind::Revoked);
		assert_eq!(events[1].comment.as_deref(), Some("left project"));
	}

	#[tokio::test]
	async fn revoke_without_match_changes_nothing() {
		let (repo, _) = setup().await;
		let doc = document();
		let alice = UserId::generate();
		let admin = UserId::generate();

		let grant = Authorization::new(alice.into(), doc, PermissionLevel::Read, admin);
		repo.create_authorization(&grant).await.unwrap();

		let revoked = repo
			.revoke_latest(&doc, &alice.into(), PermissionLevel::Write, &admin, None)
			.await
			.unwrap();
		assert!(revoked.is_none());
		assert!(repo.get_authorization(&grant.id).await.unwrap().unwrap().is_active());
	}

	#[tokio::test]
	async fn revoke_targets_most_recent_duplicate() {
		let (repo, _) = setup().await;
		let doc = document();
		let alice = UserId::generate();
		let admin = UserId::generate();

		let older = Authorization::new(alice.into(), doc, PermissionLevel::Read, admin);
		let mut newer = Authorization::new(alice.into(), doc, PermissionLevel::Read, admin);
		newer.granted_at = older.granted_at + Duration::seconds(1);
		repo.create_authorization(&older).await.unwrap();
		repo.create_authorization(&newer).await.unwrap();

		let revoked = repo
			.revoke_latest(&doc, &alice.into(), PermissionLevel::Read, &admin, None)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(revoked.id, newer.id);

		let active = repo.list_active(&doc, None, Utc::now()).await.unwrap();
		assert_eq!(active.len(), 1);
		assert_eq!(active[0].id, older.id);
		assert_eq!(repo.list_for_resource(&doc).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn authorized_subjects_are_distinct() {
		let (repo, _) = setup().await;
		let doc = document();
		let alice = UserId::generate();
		let bob = UserId::generate();
		let group = GroupId::generate();
		let admin = UserId::generate();

		for grant in [
			Authorization::new(alice.into(), doc, PermissionLevel::Read, admin),
			Authorization::new(alice.into(), doc, PermissionLevel::Write, admin),
			Authorization::new(bob.into(), doc, PermissionLevel::Validate, admin),
			Authorization::new(group.into(), doc, PermissionLevel::Read, admin),
		] {
			repo.create_authorization(&grant).await.unwrap();
		}

		let now = Utc::now();
		let users = repo.authorized_user_ids(&doc, None, now).await.unwrap();
		assert_eq!(users.len(), 2);
		assert!(users.contains(&alice) && users.contains(&bob));

		let validators = repo
			.authorized_user_ids(&doc, Some(PermissionLevel::Validate), now)
			.await
			.unwrap();
		assert_eq!(validators, vec![bob]);

		let groups = repo.authorized_group_ids(&doc, None, now).await.unwrap();
		assert_eq!(groups, vec![group]);
	}

	#[tokio::test]
	async fn events_cannot_be_rewritten() {
		let pool = create_test_pool().await;
		let repo = AuthorizationRepository::new(pool.clone());
		let grant = Authorization::new(
			UserId::generate().into(),
			document(),
			PermissionLevel::Read,
			UserId::generate(),
		);
		repo.create_authorization(&grant).await.unwrap();

		let result = sqlx::query("DELETE FROM authorization_events")
			.execute(&pool)
			.await;
		assert!(result.is_err());
		assert_eq!(repo.list_events(&grant.id).await.unwrap().len(), 1);
	}
}
