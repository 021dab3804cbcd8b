// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Attribute-based ownership.
//!
//! A resource type declares, in order, the attributes whose user value denotes
//! ownership (`uploaded_by`, `project_manager`, ...). Ownership is not a grant:
//! it confers full access independently of the ledger. Attribute names double as
//! column names for query-level scopes.

use crate::types::UserId;

/// Ownership declaration of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
	/// Ordered attribute names holding owner user ids.
	Attributes(&'static [&'static str]),
	/// The type has no ownership concept.
	None,
}

impl Ownership {
	/// A single `user` attribute.
	pub const DEFAULT: Ownership = Ownership::Attributes(&["user"]);

	pub fn attributes(&self) -> &'static [&'static str] {
		match self {
			Ownership::Attributes(attrs) => attrs,
			Ownership::None => &[],
		}
	}
}

impl Default for Ownership {
	fn default() -> Self {
		Ownership::DEFAULT
	}
}

/// Capability of resolving the owners of a record.
pub trait Owned {
	/// Ownership declaration for this type.
	const OWNERSHIP: Ownership = Ownership::DEFAULT;

	/// Value of a declared ownership attribute; unknown names yield `None`.
	fn ownership_attribute(&self, attribute: &str) -> Option<UserId>;

	/// True iff the candidate equals the value of any declared attribute.
	fn owned_by(&self, candidate: Option<&UserId>) -> bool {
		let Some(candidate) = candidate else {
			return false;
		};
		Self::OWNERSHIP
			.attributes()
			.iter()
			.any(|attr| self.ownership_attribute(attr).as_ref() == Some(candidate))
	}

	/// Distinct non-null owners in declaration order.
	fn owners(&self) -> Vec<UserId> {
		let mut owners: Vec<UserId> = Vec::new();
		for attr in Self::OWNERSHIP.attributes() {
			if let Some(user) = self.ownership_attribute(attr) {
				if !owners.contains(&user) {
					owners.push(user);
				}
			}
		}
		owners
	}

	/// First non-null owner in declaration order.
	fn owner(&self) -> Option<UserId> {
		Self::OWNERSHIP
			.attributes()
			.iter()
			.find_map(|attr| self.ownership_attribute(attr))
	}
}
