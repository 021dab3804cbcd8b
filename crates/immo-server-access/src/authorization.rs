// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ledger operations and permission predicates.
//!
//! Every predicate follows the same order:
//! 1. no actor: deny
//! 2. super-admin bypass and ownership, both without touching the ledger
//! 3. active grants held directly or through any group
//!
//! Predicates never fail: storage errors are logged and treated as a denial.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use immo_server_authz::{
	is_allowed, Actor, Authorizable, Authorization, AuthorizationEvent, AuthorizationId, Check,
	GroupId, PermissionLevel, ResourceRef, Subject, UserId,
};
use immo_server_db::{
	AuthorizationRepository, AuthorizationStore, GroupRepository, GroupStore, SqlitePool,
};
use tracing::{instrument, warn};

use crate::error::{AuthzError, Result};
use crate::events::{AuthzEvent, EventBus};

/// Optional attributes of a new grant.
#[derive(Debug, Clone, Default)]
pub struct GrantOptions {
	/// `None` means the grant never expires.
	pub expires_at: Option<DateTime<Utc>>,
	pub comment: Option<String>,
}

impl GrantOptions {
	pub fn expiring(expires_at: DateTime<Utc>) -> Self {
		Self {
			expires_at: Some(expires_at),
			comment: None,
		}
	}

	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}
}

#[derive(Clone)]
pub struct AuthorizationService {
	ledger: Arc<dyn AuthorizationStore>,
	groups: Arc<dyn GroupStore>,
	events: EventBus,
}

impl AuthorizationService {
	pub fn new(
		ledger: Arc<dyn AuthorizationStore>,
		groups: Arc<dyn GroupStore>,
		events: EventBus,
	) -> Self {
		Self {
			ledger,
			groups,
			events,
		}
	}

	pub fn from_pool(pool: SqlitePool, events: EventBus) -> Self {
		Self::new(
			Arc::new(AuthorizationRepository::new(pool.clone())),
			Arc::new(GroupRepository::new(pool)),
			events,
		)
	}

	// =========================================================================
	// Ledger
	// =========================================================================

	pub async fn authorize_user(
		&self,
		resource: &ResourceRef,
		user: &UserId,
		level: PermissionLevel,
		granted_by: &UserId,
		options: GrantOptions,
	) -> Result<Authorization> {
		self
			.authorize(resource, Subject::User(*user), level, granted_by, options)
			.await
	}

	/// # Errors
	/// Returns `AuthzError::InvalidArgument` if the group does not exist.
	pub async fn authorize_group(
		&self,
		resource: &ResourceRef,
		group: &GroupId,
		level: PermissionLevel,
		granted_by: &UserId,
		options: GrantOptions,
	) -> Result<Authorization> {
		self
			.authorize(resource, Subject::Group(*group), level, granted_by, options)
			.await
	}

	/// Grant from untyped subject parts, as received from an operator.
	///
	/// # Errors
	/// Returns `AuthzError::InvalidArgument` if the kind is neither `user` nor
	/// `group`, the id is malformed, or the group does not exist.
	pub async fn authorize_subject(
		&self,
		resource: &ResourceRef,
		subject_kind: &str,
		subject_id: &str,
		level: PermissionLevel,
		granted_by: &UserId,
		options: GrantOptions,
	) -> Result<Authorization> {
		let subject = Subject::from_parts(subject_kind, subject_id)?;
		self
			.authorize(resource, subject, level, granted_by, options)
			.await
	}

	#[instrument(skip(self, options), fields(resource = %resource, subject = %subject, level = %level))]
	async fn authorize(
		&self,
		resource: &ResourceRef,
		subject: Subject,
		level: PermissionLevel,
		granted_by: &UserId,
		options: GrantOptions,
	) -> Result<Authorization> {
		if let Subject::Group(group_id) = subject {
			if self.groups.get_group(&group_id).await?.is_none() {
				return Err(AuthzError::InvalidArgument(format!(
					"group {group_id} does not exist"
				)));
			}
		}

		let authorization = Authorization::new(subject, *resource, level, *granted_by)
			.with_expiry(options.expires_at)
			.with_comment(options.comment);
		self.ledger.create_authorization(&authorization).await?;

		self
			.events
			.emit(AuthzEvent::Granted {
				authorization: authorization.clone(),
			})
			.await;
		Ok(authorization)
	}

	/// Revoke the most recent active grant of `level` held by `subject`.
	///
	/// # Errors
	/// Returns `AuthzError::NotFound` if the subject holds no such active grant.
	#[instrument(skip(self, subject, comment), fields(resource = %resource, level = %level))]
	pub async fn revoke_authorization(
		&self,
		resource: &ResourceRef,
		subject: impl Into<Subject>,
		level: PermissionLevel,
		revoked_by: &UserId,
		comment: Option<&str>,
	) -> Result<Authorization> {
		let subject = subject.into();
		let revoked = self
			.ledger
			.revoke_latest(resource, &subject, level, revoked_by, comment)
			.await?
			.ok_or_else(|| {
				AuthzError::NotFound(format!("no active {level} authorization for {subject} on {resource}"))
			})?;

		self
			.events
			.emit(AuthzEvent::Revoked {
				authorization: revoked.clone(),
			})
			.await;
		Ok(revoked)
	}

	/// Every ledger row of the resource, including revoked and expired ones.
	pub async fn ledger(&self, resource: &ResourceRef) -> Result<Vec<Authorization>> {
		Ok(self.ledger.list_for_resource(resource).await?)
	}

	/// Audit trail of one ledger row.
	pub async fn history(&self, id: &AuthorizationId) -> Result<Vec<AuthorizationEvent>> {
		Ok(self.ledger.list_events(id).await?)
	}

	// =========================================================================
	// Predicates
	// =========================================================================

	pub async fn readable_by<R: Authorizable>(&self, resource: &R, actor: Option<&Actor>) -> bool {
		self.authorized_for(resource, actor, Check::Read).await
	}

	pub async fn writable_by<R: Authorizable>(&self, resource: &R, actor: Option<&Actor>) -> bool {
		self.authorized_for(resource, actor, Check::Write).await
	}

	pub async fn admin_by<R: Authorizable>(&self, resource: &R, actor: Option<&Actor>) -> bool {
		self.authorized_for(resource, actor, Check::Admin).await
	}

	pub async fn can_validate<R: Authorizable>(&self, resource: &R, actor: Option<&Actor>) -> bool {
		self.authorized_for(resource, actor, Check::Validate).await
	}

	pub async fn authorized_for<R: Authorizable>(
		&self,
		resource: &R,
		actor: Option<&Actor>,
		check: Check,
	) -> bool {
		let Some(actor) = actor else {
			return false;
		};
		let owned = resource.owned_by(Some(&actor.user_id));
		self
			.decide(&resource.resource_ref(), owned, actor, check)
			.await
	}

	/// Check on a bare reference, for resource kinds with no loaded record.
	/// Ownership is supplied by the caller.
	pub async fn authorized_for_ref(
		&self,
		resource: &ResourceRef,
		owned: bool,
		actor: Option<&Actor>,
		check: Check,
	) -> bool {
		let Some(actor) = actor else {
			return false;
		};
		self.decide(resource, owned, actor, check).await
	}

	#[instrument(skip(self, actor), fields(resource = %resource, user_id = %actor.user_id, check = %check))]
	async fn decide(&self, resource: &ResourceRef, owned: bool, actor: &Actor, check: Check) -> bool {
		if is_allowed(actor, check, owned, &[]) {
			return true;
		}

		match self
			.ledger
			.active_levels_for_user(resource, &actor.user_id, Utc::now())
			.await
		{
			Ok(held) => is_allowed(actor, check, owned, &held),
			Err(e) => {
				warn!(error = %e, "permission lookup failed, denying");
				false
			}
		}
	}

	// =========================================================================
	// Listings
	// =========================================================================

	/// Distinct levels the user holds through active grants on any path.
	/// Ownership and the super-admin bypass are not grants and do not appear.
	#[instrument(skip(self, user), fields(resource = %resource))]
	pub async fn permissions_for(
		&self,
		resource: &ResourceRef,
		user: Option<&UserId>,
	) -> Result<BTreeSet<PermissionLevel>> {
		let Some(user) = user else {
			return Ok(BTreeSet::new());
		};
		let held = self
			.ledger
			.active_levels_for_user(resource, user, Utc::now())
			.await?;
		Ok(held.into_iter().collect())
	}

	pub async fn authorized_users(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
	) -> Result<Vec<UserId>> {
		Ok(self
			.ledger
			.authorized_user_ids(resource, level, Utc::now())
			.await?)
	}

	pub async fn authorized_groups(
		&self,
		resource: &ResourceRef,
		level: Option<PermissionLevel>,
	) -> Result<Vec<GroupId>> {
		Ok(self
			.ledger
			.authorized_group_ids(resource, level, Utc::now())
			.await?)
	}
}
