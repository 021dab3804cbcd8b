// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization ledger entries and their audit events.
//!
//! - [`Authorization`] - one grant of one level to one subject on one resource
//! - [`AuthorizationEvent`] - immutable grant/revoke history
//!
//! Grants are never deleted by revocation; `revoked_at` is a one-way flag and the
//! comment only ever grows.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParseError;
use crate::types::{AuthorizationId, PermissionLevel, ResourceRef, Subject, UserId};

/// A ledger row conferring one permission level to one subject on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
	pub id: AuthorizationId,
	pub subject: Subject,
	pub resource: ResourceRef,
	pub permission_level: PermissionLevel,
	pub granted_by: UserId,
	pub granted_at: DateTime<Utc>,
	/// `None` means the grant never expires.
	pub expires_at: Option<DateTime<Utc>>,
	pub revoked_at: Option<DateTime<Utc>>,
	pub revoked_by: Option<UserId>,
	pub comment: Option<String>,
}

impl Authorization {
	/// Creates a fresh, active grant.
	pub fn new(
		subject: Subject,
		resource: ResourceRef,
		permission_level: PermissionLevel,
		granted_by: UserId,
	) -> Self {
		Self {
			id: AuthorizationId::generate(),
			subject,
			resource,
			permission_level,
			granted_by,
			granted_at: Utc::now(),
			expires_at: None,
			revoked_at: None,
			revoked_by: None,
			comment: None,
		}
	}

	pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
		self.expires_at = expires_at;
		self
	}

	pub fn with_comment(mut self, comment: Option<String>) -> Self {
		self.comment = comment.filter(|c| !c.trim().is_empty());
		self
	}

	/// Active iff not revoked and not past its expiry.
	pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
		self.revoked_at.is_none() && self.expires_at.map_or(true, |exp| exp > now)
	}

	pub fn is_active(&self) -> bool {
		self.is_active_at(Utc::now())
	}

	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|exp| exp <= now)
	}
}

/// Appends a revocation note to an existing comment without losing it.
pub fn append_revocation_note(
	existing: Option<&str>,
	revoked_by: &UserId,
	revoked_at: DateTime<Utc>,
	note: Option<&str>,
) -> String {
	let stamp = format!(
		"[revoked {} by {}]",
		revoked_at.to_rfc3339_opts(SecondsFormat::Secs, true),
		revoked_by
	);
	let line = match note.map(str::trim).filter(|n| !n.is_empty()) {
		Some(note) => format!("{stamp} {note}"),
		None => stamp,
	};
	match existing.filter(|c| !c.is_empty()) {
		Some(existing) => format!("{existing}\n{line}"),
		None => line,
	}
}

// =============================================================================
// Events
// =============================================================================

/// What happened to a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationEventKind {
	Granted,
	Revoked,
}

impl fmt::Display for AuthorizationEventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuthorizationEventKind::Granted => write!(f, "granted"),
			AuthorizationEventKind::Revoked => write!(f, "revoked"),
		}
	}
}

impl FromStr for AuthorizationEventKind {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"granted" => Ok(AuthorizationEventKind::Granted),
			"revoked" => Ok(AuthorizationEventKind::Revoked),
			other => Err(ParseError::UnknownEventKind(other.to_string())),
		}
	}
}

/// Immutable audit row written alongside every ledger change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEvent {
	pub id: Uuid,
	pub authorization_id: AuthorizationId,
	pub kind: AuthorizationEventKind,
	pub actor: UserId,
	pub comment: Option<String>,
	pub occurred_at: DateTime<Utc>,
}

impl AuthorizationEvent {
	pub fn new(
		authorization_id: AuthorizationId,
		kind: AuthorizationEventKind,
		actor: UserId,
		comment: Option<String>,
		occurred_at: DateTime<Utc>,
	) -> Self {
		Self {
			id: Uuid::new_v4(),
			authorization_id,
			kind,
			actor,
			comment,
			occurred_at,
		}
	}
}
