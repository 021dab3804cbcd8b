// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::types::{OrgId, UserId};

/// Minimal user record: enough to build an [`Actor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub display_name: String,
	pub organization_id: Option<OrgId>,
	pub is_super_admin: bool,
	pub created_at: DateTime<Utc>,
}

impl User {
	pub fn new(display_name: impl Into<String>) -> Self {
		Self {
			id: UserId::generate(),
			display_name: display_name.into(),
			organization_id: None,
			is_super_admin: false,
			created_at: Utc::now(),
		}
	}

	pub fn actor(&self) -> Actor {
		Actor {
			user_id: self.id,
			organization_id: self.organization_id,
			super_admin: self.is_super_admin,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn actor_carries_super_admin_flag() {
		let mut user = User::new("Claire");
		assert!(!user.actor().is_super_admin());

		user.is_super_admin = true;
		let actor = user.actor();
		assert!(actor.is_super_admin());
		assert_eq!(actor.user_id, user.id);
	}
}
