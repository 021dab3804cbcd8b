// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User groups and their memberships.
//!
//! - [`UserGroup`] - a named set of users inside one organization
//! - [`UserGroupMembership`] - links a user to a group; unique per pair
//!
//! Grants made to a group apply to every member for as long as the membership
//! exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{GroupId, OrgId, UserId};

/// A group of users within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
	pub id: GroupId,

	/// The organization this group belongs to.
	pub organization_id: OrgId,

	pub name: String,

	pub description: Option<String>,

	pub created_at: DateTime<Utc>,
}

impl UserGroup {
	/// Creates a new group with a generated id.
	pub fn new(organization_id: OrgId, name: impl Into<String>) -> Self {
		Self {
			id: GroupId::generate(),
			organization_id,
			name: name.into(),
			description: None,
			created_at: Utc::now(),
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}
}

/// A user's membership in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupMembership {
	pub id: Uuid,
	pub group_id: GroupId,
	pub user_id: UserId,
	pub created_at: DateTime<Utc>,
}

impl UserGroupMembership {
	pub fn new(group_id: GroupId, user_id: UserId) -> Self {
		Self {
			id: Uuid::new_v4(),
			group_id,
			user_id,
			created_at: Utc::now(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_group_belongs_to_its_organization() {
		let org_id = OrgId::generate();
		let group = UserGroup::new(org_id, "Maîtrise d'oeuvre");

		assert_eq!(group.organization_id, org_id);
		assert_eq!(group.name, "Maîtrise d'oeuvre");
		assert!(group.description.is_none());
	}

	#[test]
	fn new_groups_get_distinct_ids() {
		let org_id = OrgId::generate();
		assert_ne!(UserGroup::new(org_id, "a").id, UserGroup::new(org_id, "b").id);
	}

	#[test]
	fn membership_links_user_and_group() {
		let group_id = GroupId::generate();
		let user_id = UserId::generate();
		let membership = UserGroupMembership::new(group_id, user_id);

		assert_eq!(membership.group_id, group_id);
		assert_eq!(membership.user_id, user_id);
	}

	#[test]
	fn group_deserializes_from_json() {
		let group = UserGroup::new(OrgId::generate(), "Juristes").with_description("legal team");
		let json = serde_json::to_string(&group).unwrap();
		let back: UserGroup = serde_json::from_str(&json).unwrap();
		assert_eq!(back, group);
	}
}
