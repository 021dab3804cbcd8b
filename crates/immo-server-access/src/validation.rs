// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Quorum-based validation workflow over [`Validatable`] resources.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use immo_server_authz::{
	approval_is_current, Actor, DocumentValidation, Tally, UserId, Validatable, ValidationRequest,
	ValidationRequestId, VoteStatus,
};
use immo_server_db::{SqlitePool, ValidationRepository, ValidationStore, VoteRecord};
use tracing::{instrument, warn};

use crate::error::{AuthzError, Result};
use crate::events::{AuthzEvent, EventBus};

/// Inputs of a new validation request.
#[derive(Debug, Clone, Default)]
pub struct ValidationRequestParams {
	pub validators: Vec<UserId>,
	/// Falls back to the service default when `None`.
	pub min_validations: Option<u32>,
	pub due_date: Option<DateTime<Utc>>,
	pub description: Option<String>,
}

impl ValidationRequestParams {
	pub fn new(validators: impl IntoIterator<Item = UserId>) -> Self {
		Self {
			validators: validators.into_iter().collect(),
			..Self::default()
		}
	}

	pub fn with_min_validations(mut self, min_validations: u32) -> Self {
		self.min_validations = Some(min_validations);
		self
	}

	pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
		self.due_date = Some(due_date);
		self
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}
}

/// What happened to a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
	Recorded {
		request: ValidationRequest,
		validation: DocumentValidation,
	},
	/// The validator had already voted on this request.
	AlreadyVoted(DocumentValidation),
	/// The request was already approved, rejected or completed.
	Closed(ValidationRequest),
}

impl VoteOutcome {
	pub fn is_recorded(&self) -> bool {
		matches!(self, VoteOutcome::Recorded { .. })
	}
}

#[derive(Clone)]
pub struct ValidationService {
	store: Arc<dyn ValidationStore>,
	events: EventBus,
	default_min_validations: u32,
}

impl ValidationService {
	pub const DEFAULT_MIN_VALIDATIONS: u32 = 1;

	pub fn new(store: Arc<dyn ValidationStore>, events: EventBus) -> Self {
		Self {
			store,
			events,
			default_min_validations: Self::DEFAULT_MIN_VALIDATIONS,
		}
	}

	pub fn from_pool(pool: SqlitePool, events: EventBus) -> Self {
		Self::new(Arc::new(ValidationRepository::new(pool)), events)
	}

	/// Quorum used when a request does not name one. Values below 1 are
	/// clamped to 1.
	pub fn with_default_min_validations(mut self, min_validations: u32) -> Self {
		self.default_min_validations = min_validations.max(1);
		self
	}

	// =========================================================================
	// Workflow
	// =========================================================================

	/// Open a request on `resource` with one pending row per distinct
	/// validator. Returns `None` if the resource already has an open request.
	///
	/// # Errors
	/// Returns `AuthzError::InvalidArgument` if no validator is given or the
	/// quorum is outside `1..=` the number of distinct validators.
	#[instrument(skip(self, resource, params), fields(requester = %requester, validators = params.validators.len()))]
	pub async fn request_validation<R: Validatable>(
		&self,
		resource: &R,
		requester: &UserId,
		params: ValidationRequestParams,
	) -> Result<Option<ValidationRequest>> {
		let mut validators: Vec<UserId> = Vec::with_capacity(params.validators.len());
		for validator in params.validators {
			if !validators.contains(&validator) {
				validators.push(validator);
			}
		}
		if validators.is_empty() {
			return Err(AuthzError::InvalidArgument(
				"at least one validator is required".to_string(),
			));
		}

		let min_validations = params.min_validations.unwrap_or(self.default_min_validations);
		if min_validations < 1 || min_validations as usize > validators.len() {
			return Err(AuthzError::InvalidArgument(format!(
				"min_validations must be between 1 and {}, got {min_validations}",
				validators.len()
			)));
		}

		let mut request = ValidationRequest::new(resource.resource_ref(), *requester, min_validations);
		request.due_date = params.due_date;
		request.description = params.description;

		if !self.store.create_request(&request, &validators).await? {
			return Ok(None);
		}

		self
			.events
			.emit(AuthzEvent::ValidationRequested {
				request: request.clone(),
				validators,
			})
			.await;
		Ok(Some(request))
	}

	/// Record `validator`'s decision on the open request, or on the latest
	/// request when none is open.
	///
	/// # Errors
	/// - `AuthzError::InvalidArgument` when rejecting without a comment
	/// - `AuthzError::NotFound` when the resource has no request or the user is
	///   not one of its validators
	#[instrument(skip(self, resource, comment), fields(validator = %validator))]
	pub async fn validate_by<R: Validatable>(
		&self,
		resource: &R,
		validator: &UserId,
		approved: bool,
		comment: Option<&str>,
	) -> Result<VoteOutcome> {
		let comment = comment.map(str::trim).filter(|c| !c.is_empty());
		if !approved && comment.is_none() {
			return Err(AuthzError::InvalidArgument(
				"a comment is required when rejecting".to_string(),
			));
		}

		let resource_ref = resource.resource_ref();
		let request = match self.store.open_request(&resource_ref).await? {
			Some(request) => request,
			None => self
				.store
				.latest_request(&resource_ref)
				.await?
				.ok_or_else(|| {
					AuthzError::NotFound(format!("no validation request on {resource_ref}"))
				})?,
		};

		let record = self
			.store
			.record_vote(&request.id, validator, VoteStatus::from_approval(approved), comment)
			.await?;

		Ok(match record {
			VoteRecord::Recorded {
				request,
				validation,
				completed,
			} => {
				self.events.emit(AuthzEvent::vote(&validation)).await;
				if completed {
					self
						.events
						.emit(AuthzEvent::ValidationCompleted {
							request: request.clone(),
						})
						.await;
				}
				VoteOutcome::Recorded {
					request,
					validation,
				}
			}
			VoteRecord::AlreadyVoted(validation) => VoteOutcome::AlreadyVoted(validation),
			VoteRecord::Closed(request) => VoteOutcome::Closed(request),
		})
	}

	/// Close the open request as rejected. Returns `false` if nothing was open.
	#[instrument(skip(self, resource, reason), fields(cancelled_by = %cancelled_by))]
	pub async fn cancel_validation<R: Validatable>(
		&self,
		resource: &R,
		cancelled_by: &UserId,
		reason: Option<&str>,
	) -> Result<bool> {
		let Some(request) = self
			.store
			.cancel_open(&resource.resource_ref(), cancelled_by, reason)
			.await?
		else {
			return Ok(false);
		};

		self
			.events
			.emit(AuthzEvent::ValidationCancelled { request })
			.await;
		Ok(true)
	}

	// =========================================================================
	// Derived state
	// =========================================================================

	pub async fn validation_pending<R: Validatable>(&self, resource: &R) -> Result<bool> {
		Ok(self
			.store
			.open_request(&resource.resource_ref())
			.await?
			.is_some())
	}

	/// True when the most recent approval completed after the last content
	/// change of the resource.
	pub async fn validated<R: Validatable>(&self, resource: &R) -> Result<bool> {
		let approved = self
			.store
			.latest_approved_request(&resource.resource_ref())
			.await?;
		Ok(approved
			.and_then(|request| request.completed_at)
			.is_some_and(|at| approval_is_current(at, resource.content_changed_at())))
	}

	/// Share of validators of the latest request who have acted, 0 to 100.
	pub async fn validation_progress<R: Validatable>(&self, resource: &R) -> Result<u8> {
		let Some(request) = self.store.latest_request(&resource.resource_ref()).await? else {
			return Ok(0);
		};
		let votes = self.store.list_validations(&request.id).await?;
		Ok(Tally::from_votes(votes.iter().map(|v| &v.status)).progress())
	}

	/// The actor is an assigned validator of the open request and has not
	/// voted yet. There is no super-admin bypass here.
	pub async fn can_be_validated_by<R: Validatable>(
		&self,
		resource: &R,
		actor: Option<&Actor>,
	) -> bool {
		let Some(actor) = actor else {
			return false;
		};
		match self.pending_vote(resource, &actor.user_id).await {
			Ok(pending) => pending,
			Err(e) => {
				warn!(error = %e, user_id = %actor.user_id, "validation lookup failed, denying");
				false
			}
		}
	}

	async fn pending_vote<R: Validatable>(&self, resource: &R, user: &UserId) -> Result<bool> {
		let Some(request) = self.store.open_request(&resource.resource_ref()).await? else {
			return Ok(false);
		};
		let votes = self.store.list_validations(&request.id).await?;
		Ok(votes
			.iter()
			.any(|v| v.validator == *user && !v.has_acted()))
	}

	// =========================================================================
	// Queries
	// =========================================================================

	pub async fn current_validation_request<R: Validatable>(
		&self,
		resource: &R,
	) -> Result<Option<ValidationRequest>> {
		Ok(self.store.open_request(&resource.resource_ref()).await?)
	}

	/// Every request on the resource, newest first.
	pub async fn validation_history<R: Validatable>(
		&self,
		resource: &R,
	) -> Result<Vec<ValidationRequest>> {
		Ok(self.store.list_requests(&resource.resource_ref()).await?)
	}

	pub async fn validations_for(
		&self,
		request_id: &ValidationRequestId,
	) -> Result<Vec<DocumentValidation>> {
		Ok(self.store.list_validations(request_id).await?)
	}

	/// Open requests still waiting on `validator`.
	pub async fn pending_validations_for_validator(
		&self,
		validator: &UserId,
	) -> Result<Vec<ValidationRequest>> {
		Ok(self.store.open_requests_for_validator(validator).await?)
	}
}
