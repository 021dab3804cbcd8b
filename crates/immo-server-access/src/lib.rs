// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource authorization and validation services for Immo Promo.
//!
//! [`AuthorizationService`] answers per-record permission questions and
//! manages the grant ledger, [`ScopeService`] returns the matching
//! collections, and [`ValidationService`] drives quorum approvals. State
//! changes are published to an [`EventBus`].

pub mod authorization;
pub mod error;
pub mod events;
pub mod scope;
pub mod validation;

pub use authorization::{AuthorizationService, GrantOptions};
pub use error::{AuthzError, Result};
pub use events::{AuthzEvent, EventBus, EventSink, EventSinkError, MemoryEventSink, TracingEventSink};
pub use scope::ScopeService;
pub use validation::{ValidationRequestParams, ValidationService, VoteOutcome};

/// Every service over one pool, sharing the same event bus.
#[derive(Clone)]
pub struct AccessServices {
	pub authorization: AuthorizationService,
	pub scopes: ScopeService,
	pub validation: ValidationService,
}

impl AccessServices {
	pub fn new(pool: immo_server_db::SqlitePool, events: EventBus, default_min_validations: u32) -> Self {
		Self {
			authorization: AuthorizationService::from_pool(pool.clone(), events.clone()),
			scopes: ScopeService::from_pool(pool.clone()),
			validation: ValidationService::from_pool(pool, events)
				.with_default_min_validations(default_min_validations),
		}
	}
}
