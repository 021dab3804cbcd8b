// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for resource authorization.
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs ([`UserId`], [`GroupId`], ...)
//! - **Permission levels**: [`PermissionLevel`], where `read < write < admin` and
//!   `validate` sits on its own axis
//! - **Resource references**: [`ResourceKind`] is the closed set of authorizable
//!   entity types; [`ResourceRef`] pairs a kind with an id
//! - **Subjects**: [`Subject`] is the tagged union of grantees (user or group)
//!
//! Every enum has a stable lowercase string form used in storage and on the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParseError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = ParseError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s)
					.map(Self)
					.map_err(|e| ParseError::InvalidId(format!("{s}: {e}")))
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(OrgId, "Unique identifier for an organization.");
define_id_type!(GroupId, "Unique identifier for a user group.");
define_id_type!(AuthorizationId, "Unique identifier for a ledger entry.");
define_id_type!(
	ValidationRequestId,
	"Unique identifier for a validation request."
);
define_id_type!(
	DocumentValidationId,
	"Unique identifier for a single validator's vote row."
);

// =============================================================================
// Permission Levels
// =============================================================================

/// Permission level conferred by a grant.
///
/// The derived ordering is only meaningful along the `read < write < admin`
/// axis; `validate` is orthogonal and must never be compared ordinally. Use
/// [`crate::policy::Check`] to ask whether a level satisfies an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
	Read,
	Write,
	Admin,
	Validate,
}

impl PermissionLevel {
	/// Returns all permission levels.
	pub fn all() -> &'static [PermissionLevel] {
		&[
			PermissionLevel::Read,
			PermissionLevel::Write,
			PermissionLevel::Admin,
			PermissionLevel::Validate,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			PermissionLevel::Read => "read",
			PermissionLevel::Write => "write",
			PermissionLevel::Admin => "admin",
			PermissionLevel::Validate => "validate",
		}
	}
}

impl fmt::Display for PermissionLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PermissionLevel {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"read" => Ok(PermissionLevel::Read),
			"write" => Ok(PermissionLevel::Write),
			"admin" => Ok(PermissionLevel::Admin),
			"validate" => Ok(PermissionLevel::Validate),
			other => Err(ParseError::UnknownPermissionLevel(other.to_string())),
		}
	}
}

// =============================================================================
// Resources
// =============================================================================

/// Closed set of entity types that can carry authorizations and validations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
	Document,
	Folder,
	Space,
	Budget,
	Permit,
	Contract,
	Project,
}

impl ResourceKind {
	/// Returns all resource kinds.
	pub fn all() -> &'static [ResourceKind] {
		&[
			ResourceKind::Document,
			ResourceKind::Folder,
			ResourceKind::Space,
			ResourceKind::Budget,
			ResourceKind::Permit,
			ResourceKind::Contract,
			ResourceKind::Project,
		]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ResourceKind::Document => "document",
			ResourceKind::Folder => "folder",
			ResourceKind::Space => "space",
			ResourceKind::Budget => "budget",
			ResourceKind::Permit => "permit",
			ResourceKind::Contract => "contract",
			ResourceKind::Project => "project",
		}
	}
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ResourceKind {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ResourceKind::all()
			.iter()
			.copied()
			.find(|k| k.as_str() == s)
			.ok_or_else(|| ParseError::UnknownResourceKind(s.to_string()))
	}
}

/// A `(resource_type, resource_id)` pair pointing at one authorizable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
	pub kind: ResourceKind,
	pub id: Uuid,
}

impl ResourceRef {
	pub fn new(kind: ResourceKind, id: Uuid) -> Self {
		Self { kind, id }
	}

	/// Builds a reference from its stored string parts.
	pub fn from_parts(kind: &str, id: &str) -> Result<Self, ParseError> {
		let kind = kind.parse()?;
		let id = Uuid::parse_str(id).map_err(|e| ParseError::InvalidId(format!("{id}: {e}")))?;
		Ok(Self { kind, id })
	}
}

impl fmt::Display for ResourceRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind, self.id)
	}
}

// =============================================================================
// Subjects
// =============================================================================

/// Discriminant of a [`Subject`], stored in the `subject_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
	User,
	Group,
}

impl SubjectKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			SubjectKind::User => "user",
			SubjectKind::Group => "group",
		}
	}
}

impl fmt::Display for SubjectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SubjectKind {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"user" => Ok(SubjectKind::User),
			"group" => Ok(SubjectKind::Group),
			other => Err(ParseError::UnknownSubjectKind(other.to_string())),
		}
	}
}

/// The grantee of an authorization: exactly one user or one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
	User(UserId),
	Group(GroupId),
}

impl Subject {
	pub fn kind(&self) -> SubjectKind {
		match self {
			Subject::User(_) => SubjectKind::User,
			Subject::Group(_) => SubjectKind::Group,
		}
	}

	pub fn id(&self) -> Uuid {
		match self {
			Subject::User(id) => id.into_inner(),
			Subject::Group(id) => id.into_inner(),
		}
	}

	/// Builds a subject from untyped parts, rejecting anything that is not a
	/// user or a group.
	pub fn from_parts(kind: &str, id: &str) -> Result<Self, ParseError> {
		match kind.parse::<SubjectKind>()? {
			SubjectKind::User => Ok(Subject::User(id.parse()?)),
			SubjectKind::Group => Ok(Subject::Group(id.parse()?)),
		}
	}
}

impl From<UserId> for Subject {
	fn from(id: UserId) -> Self {
		Subject::User(id)
	}
}

impl From<GroupId> for Subject {
	fn from(id: GroupId) -> Self {
		Subject::Group(id)
	}
}

impl fmt::Display for Subject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind(), self.id())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	mod id_types {
		use super::*;

		#[test]
		fn user_id_serializes_as_uuid() {
			let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
			let json = serde_json::to_string(&UserId::new(uuid)).unwrap();
			assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");
		}

		#[test]
		fn parse_rejects_garbage() {
			assert!(matches!(
				"not-a-uuid".parse::<GroupId>(),
				Err(ParseError::InvalidId(_))
			));
		}

		proptest! {
			#[test]
			fn user_id_display_parses_back(a: u128) {
				let id = UserId::new(Uuid::from_u128(a));
				prop_assert_eq!(id.to_string().parse::<UserId>().unwrap(), id);
			}
		}
	}

	mod levels {
		use super::*;

		#[test]
		fn string_forms_are_stable() {
			for level in PermissionLevel::all() {
				assert_eq!(level.as_str().parse::<PermissionLevel>().unwrap(), *level);
			}
			assert_eq!(
				serde_json::to_string(&PermissionLevel::Validate).unwrap(),
				"\"validate\""
			);
		}

		#[test]
		fn unknown_level_is_rejected() {
			assert!(matches!(
				"owner".parse::<PermissionLevel>(),
				Err(ParseError::UnknownPermissionLevel(s)) if s == "owner"
			));
		}
	}

	mod resources {
		use super::*;

		#[test]
		fn kinds_roundtrip_through_strings() {
			for kind in ResourceKind::all() {
				assert_eq!(kind.to_string().parse::<ResourceKind>().unwrap(), *kind);
			}
		}

		#[test]
		fn unknown_kind_is_rejected() {
			assert!(ResourceRef::from_parts("invoice", &Uuid::new_v4().to_string()).is_err());
		}
	}

	mod subjects {
		use super::*;

		#[test]
		fn only_users_and_groups_are_subjects() {
			let id = Uuid::new_v4().to_string();
			assert!(matches!(
				Subject::from_parts("user", &id),
				Ok(Subject::User(_))
			));
			assert!(matches!(
				Subject::from_parts("group", &id),
				Ok(Subject::Group(_))
			));
			assert!(matches!(
				Subject::from_parts("organization", &id),
				Err(ParseError::UnknownSubjectKind(_))
			));
		}

		#[test]
		fn serializes_as_tagged_union() {
			let id = GroupId::generate();
			let json = serde_json::to_string(&Subject::Group(id)).unwrap();
			assert_eq!(json, format!("{{\"kind\":\"group\",\"id\":\"{id}\"}}"));
		}
	}
}
