// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource authorization model for Immo Promo.
//!
//! This crate holds the storage-agnostic half of the access model:
//!
//! - [`types`] - ids, permission levels, resource references and subjects
//! - [`policy`] - the pure permission decision engine
//! - [`ownership`] - attribute-based ownership resolution
//! - [`authorization`] - ledger entries and their audit events
//! - [`group`] - user groups and memberships
//! - [`validation`] - validation requests, votes and quorum resolution
//! - [`resource`] - traits consuming entities implement
//!
//! Persistence lives in `immo-server-db`; orchestration in `immo-server-access`.

pub mod actor;
pub mod authorization;
pub mod error;
pub mod group;
pub mod ownership;
pub mod policy;
pub mod resource;
pub mod types;
pub mod user;
pub mod validation;

pub use actor::Actor;
pub use authorization::{
	append_revocation_note, Authorization, AuthorizationEvent, AuthorizationEventKind,
};
pub use error::ParseError;
pub use group::{UserGroup, UserGroupMembership};
pub use ownership::{Owned, Ownership};
pub use policy::{bypasses_ledger, is_allowed, Check};
pub use resource::{Authorizable, Validatable};
pub use types::{
	AuthorizationId, DocumentValidationId, GroupId, OrgId, PermissionLevel, ResourceKind,
	ResourceRef, Subject, SubjectKind, UserId, ValidationRequestId,
};
pub use user::User;
pub use validation::{
	approval_is_current, DocumentValidation, Tally, ValidationRequest, ValidationStatus, VoteStatus,
};
