// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission decision engine.
//!
//! Decisions are evaluated in three steps:
//!
//! 1. **Super-admin short-circuit**: [`bypasses_ledger`] grants everything before any
//!    grant lookup happens
//! 2. **Ownership**: an owner passes every check
//! 3. **Ledger**: the active levels held by the user (directly or through a group)
//!    are matched against the [`Check`] being asked
//!
//! Everything here is pure; callers load the facts (ownership, held levels) first.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

use crate::actor::Actor;
use crate::types::PermissionLevel;

/// The question asked of the engine.
///
/// `read`/`write`/`admin` form a ladder for the purpose of satisfying a check,
/// but `validate` is its own axis: only `validate` or `admin` grants satisfy it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
	Read,
	Write,
	Admin,
	Validate,
}

impl Check {
	/// Levels that satisfy this check when held by an active grant.
	pub fn satisfying_levels(self) -> &'static [PermissionLevel] {
		match self {
			Check::Read => &[
				PermissionLevel::Read,
				PermissionLevel::Write,
				PermissionLevel::Admin,
			],
			Check::Write => &[PermissionLevel::Write, PermissionLevel::Admin],
			Check::Admin => &[PermissionLevel::Admin],
			Check::Validate => &[PermissionLevel::Validate, PermissionLevel::Admin],
		}
	}

	pub fn is_satisfied_by(self, level: PermissionLevel) -> bool {
		self.satisfying_levels().contains(&level)
	}
}

impl From<PermissionLevel> for Check {
	fn from(level: PermissionLevel) -> Self {
		match level {
			PermissionLevel::Read => Check::Read,
			PermissionLevel::Write => Check::Write,
			PermissionLevel::Admin => Check::Admin,
			PermissionLevel::Validate => Check::Validate,
		}
	}
}

impl fmt::Display for Check {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Check::Read => write!(f, "read"),
			Check::Write => write!(f, "write"),
			Check::Admin => write!(f, "admin"),
			Check::Validate => write!(f, "validate"),
		}
	}
}

/// Returns true when the actor skips the ledger entirely.
pub fn bypasses_ledger(actor: &Actor) -> bool {
	actor.is_super_admin()
}

/// Evaluates a check for a known actor.
///
/// * `owned` - whether the resource's ownership resolver matched the actor
/// * `held` - levels of the actor's active grants, any path, duplicates allowed
#[instrument(
	level = "debug",
	skip(actor, held),
	fields(user_id = %actor.user_id, check = %check, owned)
)]
pub fn is_allowed(actor: &Actor, check: Check, owned: bool, held: &[PermissionLevel]) -> bool {
	if bypasses_ledger(actor) {
		return true;
	}

	if owned {
		return true;
	}

	held.iter().any(|level| check.is_satisfied_by(*level))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::UserId;
	use proptest::prelude::*;

	fn actor() -> Actor {
		Actor::new(UserId::generate())
	}

	fn level_strategy() -> impl Strategy<Value = PermissionLevel> {
		prop::sample::select(PermissionLevel::all().to_vec())
	}

	mod short_circuit {
		use super::*;

		#[test]
		fn super_admin_passes_with_empty_ledger() {
			let admin = Actor::super_admin(UserId::generate());
			for check in [Check::Read, Check::Write, Check::Admin, Check::Validate] {
				assert!(is_allowed(&admin, check, false, &[]));
			}
		}

		#[test]
		fn regular_actor_does_not_bypass() {
			assert!(!bypasses_ledger(&actor()));
		}
	}

	mod ownership {
		use super::*;

		#[test]
		fn owner_passes_every_check() {
			let a = actor();
			for check in [Check::Read, Check::Write, Check::Admin, Check::Validate] {
				assert!(is_allowed(&a, check, true, &[]));
			}
		}
	}

	mod ledger {
		use super::*;

		#[test]
		fn write_and_admin_imply_read() {
			let a = actor();
			assert!(is_allowed(&a, Check::Read, false, &[PermissionLevel::Write]));
			assert!(is_allowed(&a, Check::Read, false, &[PermissionLevel::Admin]));
		}

		#[test]
		fn read_and_write_do_not_imply_admin() {
			let a = actor();
			assert!(!is_allowed(
				&a,
				Check::Admin,
				false,
				&[PermissionLevel::Read, PermissionLevel::Write]
			));
		}

		#[test]
		fn validate_is_orthogonal() {
			let a = actor();
			assert!(!is_allowed(&a, Check::Read, false, &[PermissionLevel::Validate]));
			assert!(!is_allowed(&a, Check::Validate, false, &[PermissionLevel::Write]));
			assert!(is_allowed(&a, Check::Validate, false, &[PermissionLevel::Admin]));
			assert!(is_allowed(&a, Check::Validate, false, &[PermissionLevel::Validate]));
		}

		#[test]
		fn nothing_held_means_denied() {
			let a = actor();
			assert!(!is_allowed(&a, Check::Read, false, &[]));
		}
	}

	proptest! {
		#[test]
		fn writable_implies_readable(held in prop::collection::vec(level_strategy(), 0..6)) {
			let a = actor();
			if is_allowed(&a, Check::Write, false, &held) {
				prop_assert!(is_allowed(&a, Check::Read, false, &held));
			}
		}

		#[test]
		fn admin_implies_write_and_read(held in prop::collection::vec(level_strategy(), 0..6)) {
			let a = actor();
			if is_allowed(&a, Check::Admin, false, &held) {
				prop_assert!(is_allowed(&a, Check::Write, false, &held));
				prop_assert!(is_allowed(&a, Check::Read, false, &held));
			}
		}

		#[test]
		fn duplicates_do_not_change_decisions(level in level_strategy(), copies in 1usize..5) {
			let a = actor();
			let once = vec![level];
			let many = vec![level; copies];
			for check in [Check::Read, Check::Write, Check::Admin, Check::Validate] {
				prop_assert_eq!(
					is_allowed(&a, check, false, &once),
					is_allowed(&a, check, false, &many)
				);
			}
		}
	}
}
