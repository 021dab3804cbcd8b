// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The acting principal handed to permission checks.

use serde::{Deserialize, Serialize};

use crate::types::{OrgId, UserId};

/// The user a permission check is evaluated for.
///
/// The super-admin classification comes from the organization/role model and is
/// consumed here as a plain input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub user_id: UserId,
	pub organization_id: Option<OrgId>,
	pub super_admin: bool,
}

impl Actor {
	/// Creates a regular (non super-admin) actor.
	pub fn new(user_id: UserId) -> Self {
		Self {
			user_id,
			organization_id: None,
			super_admin: false,
		}
	}

	/// Creates a super-admin actor.
	pub fn super_admin(user_id: UserId) -> Self {
		Self {
			user_id,
			organization_id: None,
			super_admin: true,
		}
	}

	pub fn in_organization(mut self, org_id: OrgId) -> Self {
		self.organization_id = Some(org_id);
		self
	}

	pub fn is_super_admin(&self) -> bool {
		self.super_admin
	}
}
