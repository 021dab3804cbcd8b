// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capabilities implemented by consuming entities (documents, budgets, permits, ...).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ownership::Owned;
use crate::types::{ResourceKind, ResourceRef};

/// An entity that can carry ledger grants.
pub trait Authorizable: Owned + Send + Sync {
	const KIND: ResourceKind;

	fn resource_id(&self) -> Uuid;

	fn resource_ref(&self) -> ResourceRef {
		ResourceRef::new(Self::KIND, self.resource_id())
	}
}

/// An entity that can go through validation requests.
pub trait Validatable: Authorizable {
	/// Last time the content under review changed.
	///
	/// An approval older than this is stale. Each type decides which of its
	/// attributes count as content; bookkeeping timestamps should not.
	fn content_changed_at(&self) -> DateTime<Utc>;
}
