// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Validation request repository.
//!
//! A partial unique index keeps at most one open request per resource, so
//! concurrent creators race safely: the loser gets `false`. Votes take the database write lock before
//! reading the tally: two validators voting at once are serialized and the
//! second one sees the first one's vote.

use async_trait::async_trait;
use chrono::Utc;
use immo_server_authz::{
	DocumentValidation, ResourceRef, Tally, UserId, ValidationRequest, ValidationRequestId,
	ValidationStatus, VoteStatus,
};
use sqlx::{sqlite::SqlitePool, Row};

use crate::columns::{format_opt_ts, format_ts, parse_col, parse_opt_col, parse_opt_ts, parse_ts};
use crate::error::{is_unique_violation, DbError};

const REQUEST_COLUMNS: &str = "r.id, r.validatable_type, r.validatable_id, r.requester_id, \
	r.min_validations, r.status, r.due_date, r.description, r.completed_at, r.cancelled_by, \
	r.cancellation_reason, r.created_at, r.updated_at";

const REQUEST_RETURNING: &str = "id, validatable_type, validatable_id, requester_id, \
	min_validations, status, due_date, description, completed_at, cancelled_by, \
	cancellation_reason, created_at, updated_at";

/// Result of recording one validator's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteRecord {
	/// The vote was stored and the request re-evaluated.
	Recorded {
		request: ValidationRequest,
		validation: DocumentValidation,
		/// The request reached a terminal status with this vote.
		completed: bool,
	},
	/// The validator had already voted; nothing changed.
	AlreadyVoted(DocumentValidation),
	/// The request is no longer open; nothing changed.
	Closed(ValidationRequest),
}

#[async_trait]
pub trait ValidationStore: Send + Sync {
	async fn create_request(
		&self,
		request: &ValidationRequest,
		validators: &[UserId],
	) -> Result<bool, DbError>;
	async fn get_request(
		&self,
		id: &ValidationRequestId,
	) -> Result<Option<ValidationRequest>, DbError>;
	async fn open_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError>;
	async fn latest_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError>;
	async fn latest_approved_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError>;
	async fn list_requests(&self, validatable: &ResourceRef)
		-> Result<Vec<ValidationRequest>, DbError>;
	async fn list_validations(
		&self,
		request_id: &ValidationRequestId,
	) -> Result<Vec<DocumentValidation>, DbError>;
	async fn record_vote(
		&self,
		request_id: &ValidationRequestId,
		validator: &UserId,
		decision: VoteStatus,
		comment: Option<&str>,
	) -> Result<VoteRecord, DbError>;
	async fn cancel_open(
		&self,
		validatable: &ResourceRef,
		cancelled_by: &UserId,
		reason: Option<&str>,
	) -> Result<Option<ValidationRequest>, DbError>;
	async fn open_requests_for_validator(
		&self,
		validator: &UserId,
	) -> Result<Vec<ValidationRequest>, DbError>;
}

/// Repository for validation requests and their per-validator rows.
#[derive(Clone)]
pub struct ValidationRepository {
	pool: SqlitePool,
}

impl ValidationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a request and one pending row per distinct validator.
	///
	/// Returns `false` without writing anything when the resource already has
	/// an open request.
	#[tracing::instrument(
		skip(self, request, validators),
		fields(request_id = %request.id, validatable = %request.validatable, validators = validators.len())
	)]
	pub async fn create_request(
		&self,
		request: &ValidationRequest,
		validators: &[UserId],
	) -> Result<bool, DbError> {
		let mut tx = self.pool.begin().await?;

		// Write before any read so the transaction holds the write lock from its
		// first statement. idx_validation_requests_one_open rejects a duplicate.
		let inserted = sqlx::query(
			r#"
			INSERT INTO validation_requests (
				id, validatable_type, validatable_id, requester_id, min_validations, status,
				due_date, description, completed_at, cancelled_by, cancellation_reason,
				created_at, updated_at
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(request.id.to_string())
		.bind(request.validatable.kind.as_str())
		.bind(request.validatable.id.to_string())
		.bind(request.requester.to_string())
		.bind(i64::from(request.min_validations))
		.bind(request.status.as_str())
		.bind(format_opt_ts(request.due_date))
		.bind(&request.description)
		.bind(format_opt_ts(request.completed_at))
		.bind(request.cancelled_by.map(|u| u.to_string()))
		.bind(&request.cancellation_reason)
		.bind(format_ts(request.created_at))
		.bind(format_ts(request.updated_at))
		.execute(&mut *tx)
		.await;

		match inserted {
			Ok(_) => {}
			Err(e) if is_unique_violation(&e) => {
				tracing::debug!(validatable = %request.validatable, "open request already exists");
				return Ok(false);
			}
			Err(e) => return Err(e.into()),
		}

		let mut seen: Vec<UserId> = Vec::with_capacity(validators.len());
		for validator in validators {
			if seen.contains(validator) {
				continue;
			}
			seen.push(*validator);

			let row = DocumentValidation::pending(request.id, *validator);
			sqlx::query(
				r#"
				INSERT INTO document_validations (id, validation_request_id, validator_id, status, comment, validated_at)
				VALUES (?, ?, ?, ?, NULL, NULL)
				"#,
			)
			.bind(row.id.to_string())
			.bind(request.id.to_string())
			.bind(validator.to_string())
			.bind(row.status.as_str())
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		tracing::debug!(request_id = %request.id, validators = seen.len(), "validation requested");
		Ok(true)
	}

	#[tracing::instrument(skip(self), fields(request_id = %id))]
	pub async fn get_request(
		&self,
		id: &ValidationRequestId,
	) -> Result<Option<ValidationRequest>, DbError> {
		let sql = format!("SELECT {REQUEST_COLUMNS} FROM validation_requests r WHERE r.id = ?");
		let row = sqlx::query(&sql)
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(row_to_request).transpose()
	}

	/// The pending or in-progress request of the resource, if any.
	#[tracing::instrument(skip(self), fields(validatable = %validatable))]
	pub async fn open_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError> {
		let sql = format!(
			r#"
			SELECT {REQUEST_COLUMNS}
			FROM validation_requests r
			WHERE r.validatable_type = ? AND r.validatable_id = ?
				AND r.status IN ('pending', 'in_progress')
			"#
		);
		let row = sqlx::query(&sql)
			.bind(validatable.kind.as_str())
			.bind(validatable.id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(row_to_request).transpose()
	}

	/// The most recently created request of the resource, whatever its status.
	#[tracing::instrument(skip(self), fields(validatable = %validatable))]
	pub async fn latest_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError> {
		self.latest_with_status(validatable, None).await
	}

	#[tracing::instrument(skip(self), fields(validatable = %validatable))]
	pub async fn latest_approved_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError> {
		self
			.latest_with_status(validatable, Some(ValidationStatus::Approved))
			.await
	}

	async fn latest_with_status(
		&self,
		validatable: &ResourceRef,
		status: Option<ValidationStatus>,
	) -> Result<Option<ValidationRequest>, DbError> {
		let sql = format!(
			r#"
			SELECT {REQUEST_COLUMNS}
			FROM validation_requests r
			WHERE r.validatable_type = ? AND r.validatable_id = ?
				AND (? IS NULL OR r.status = ?)
			ORDER BY r.created_at DESC, r.rowid DESC
			LIMIT 1
			"#
		);
		let status = status.map(|s| s.as_str());
		let row = sqlx::query(&sql)
			.bind(validatable.kind.as_str())
			.bind(validatable.id.to_string())
			.bind(status)
			.bind(status)
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(row_to_request).transpose()
	}

	/// Every request of the resource, newest first.
	#[tracing::instrument(skip(self), fields(validatable = %validatable))]
	pub async fn list_requests(
		&self,
		validatable: &ResourceRef,
	) -> Result<Vec<ValidationRequest>, DbError> {
		let sql = format!(
			r#"
			SELECT {REQUEST_COLUMNS}
			FROM validation_requests r
			WHERE r.validatable_type = ? AND r.validatable_id = ?
			ORDER BY r.created_at DESC, r.rowid DESC
			"#
		);
		let rows = sqlx::query(&sql)
			.bind(validatable.kind.as_str())
			.bind(validatable.id.to_string())
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_request).collect()
	}

	#[tracing::instrument(skip(self), fields(request_id = %request_id))]
	pub async fn list_validations(
		&self,
		request_id: &ValidationRequestId,
	) -> Result<Vec<DocumentValidation>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, validation_request_id, validator_id, status, comment, validated_at
			FROM document_validations
			WHERE validation_request_id = ?
			ORDER BY rowid
			"#,
		)
		.bind(request_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_validation).collect()
	}

	/// Record a validator's decision and re-evaluate the request.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the request does not exist or the user is
	/// not one of its assigned validators.
	#[tracing::instrument(
		skip(self, comment),
		fields(request_id = %request_id, validator = %validator, decision = %decision)
	)]
	pub async fn record_vote(
		&self,
		request_id: &ValidationRequestId,
		validator: &UserId,
		decision: VoteStatus,
		comment: Option<&str>,
	) -> Result<VoteRecord, DbError> {
		let now = Utc::now();
		let now_str = format_ts(now);
		let mut tx = self.pool.begin().await?;

		// Writing first upgrades the transaction to the write lock before the
		// tally is read.
		let touched = sqlx::query("UPDATE validation_requests SET updated_at = ? WHERE id = ?")
			.bind(&now_str)
			.bind(request_id.to_string())
			.execute(&mut *tx)
			.await?;
		if touched.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("validation request {request_id}")));
		}

		let sql = format!("SELECT {REQUEST_COLUMNS} FROM validation_requests r WHERE r.id = ?");
		let row = sqlx::query(&sql)
			.bind(request_id.to_string())
			.fetch_one(&mut *tx)
			.await?;
		let mut request = row_to_request(&row)?;

		let row = sqlx::query(
			r#"
			SELECT id, validation_request_id, validator_id, status, comment, validated_at
			FROM document_validations
			WHERE validation_request_id = ? AND validator_id = ?
			"#,
		)
		.bind(request_id.to_string())
		.bind(validator.to_string())
		.fetch_optional(&mut *tx)
		.await?;
		let Some(row) = row else {
			return Err(DbError::NotFound(format!(
				"validator {validator} on request {request_id}"
			)));
		};
		let mut validation = row_to_validation(&row)?;

		if request.status.is_terminal() {
			return Ok(VoteRecord::Closed(request));
		}
		if validation.has_acted() {
			return Ok(VoteRecord::AlreadyVoted(validation));
		}

		let comment = comment.map(str::trim).filter(|c| !c.is_empty());
		sqlx::query(
			r#"
			UPDATE document_validations
			SET status = ?, comment = ?, validated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(decision.as_str())
		.bind(comment)
		.bind(&now_str)
		.bind(validation.id.to_string())
		.execute(&mut *tx)
		.await?;
		validation.status = decision;
		validation.comment = comment.map(str::to_string);
		validation.validated_at = Some(now);

		let rows = sqlx::query("SELECT status FROM document_validations WHERE validation_request_id = ?")
			.bind(request_id.to_string())
			.fetch_all(&mut *tx)
			.await?;
		let votes = rows
			.iter()
			.map(|row| {
				let status: String = row.get("status");
				parse_col::<VoteStatus>(&status)
			})
			.collect::<Result<Vec<_>, _>>()?;
		let next = Tally::from_votes(votes.iter()).resolve(request.min_validations);

		let completed = next.is_terminal();
		let completed_at = completed.then_some(now);
		sqlx::query(
			r#"
			UPDATE validation_requests
			SET status = ?, completed_at = COALESCE(completed_at, ?)
			WHERE id = ? AND status IN ('pending', 'in_progress')
			"#,
		)
		.bind(next.as_str())
		.bind(format_opt_ts(completed_at))
		.bind(request_id.to_string())
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		request.status = next;
		request.updated_at = now;
		if request.completed_at.is_none() {
			request.completed_at = completed_at;
		}

		tracing::debug!(request_id = %request_id, status = %next, "vote recorded");
		Ok(VoteRecord::Recorded {
			request,
			validation,
			completed,
		})
	}

	/// Close the open request of the resource as rejected, recording who
	/// cancelled it and why. Returns `None` when nothing was open.
	#[tracing::instrument(skip(self, reason), fields(validatable = %validatable, cancelled_by = %cancelled_by))]
	pub async fn cancel_open(
		&self,
		validatable: &ResourceRef,
		cancelled_by: &UserId,
		reason: Option<&str>,
	) -> Result<Option<ValidationRequest>, DbError> {
		let now_str = format_ts(Utc::now());
		let reason = reason.map(str::trim).filter(|r| !r.is_empty());
		let mut tx = self.pool.begin().await?;

		let sql = format!(
			r#"
			UPDATE validation_requests
			SET status = 'rejected',
				completed_at = ?,
				updated_at = ?,
				cancelled_by = ?,
				cancellation_reason = ?
			WHERE validatable_type = ? AND validatable_id = ?
				AND status IN ('pending', 'in_progress')
			RETURNING {REQUEST_RETURNING}
			"#
		);
		let row = sqlx::query(&sql)
			.bind(&now_str)
			.bind(&now_str)
			.bind(cancelled_by.to_string())
			.bind(reason)
			.bind(validatable.kind.as_str())
			.bind(validatable.id.to_string())
			.fetch_optional(&mut *tx)
			.await?;

		let Some(row) = row else {
			return Ok(None);
		};
		let request = row_to_request(&row)?;
		tx.commit().await?;

		tracing::debug!(request_id = %request.id, "validation cancelled");
		Ok(Some(request))
	}

	/// Open requests on which the validator still has to act.
	#[tracing::instrument(skip(self), fields(validator = %validator))]
	pub async fn open_requests_for_validator(
		&self,
		validator: &UserId,
	) -> Result<Vec<ValidationRequest>, DbError> {
		let sql = format!(
			r#"
			SELECT {REQUEST_COLUMNS}
			FROM validation_requests r
			JOIN document_validations v ON v.validation_request_id = r.id
			WHERE v.validator_id = ? AND v.status = 'pending'
				AND r.status IN ('pending', 'in_progress')
			ORDER BY r.due_date IS NULL, r.due_date, r.created_at
			"#
		);
		let rows = sqlx::query(&sql)
			.bind(validator.to_string())
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(row_to_request).collect()
	}
}

#[async_trait]
impl ValidationStore for ValidationRepository {
	async fn create_request(
		&self,
		request: &ValidationRequest,
		validators: &[UserId],
	) -> Result<bool, DbError> {
		self.create_request(request, validators).await
	}

	async fn get_request(
		&self,
		id: &ValidationRequestId,
	) -> Result<Option<ValidationRequest>, DbError> {
		self.get_request(id).await
	}

	async fn open_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError> {
		self.open_request(validatable).await
	}

	async fn latest_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError> {
		self.latest_request(validatable).await
	}

	async fn latest_approved_request(
		&self,
		validatable: &ResourceRef,
	) -> Result<Option<ValidationRequest>, DbError> {
		self.latest_approved_request(validatable).await
	}

	async fn list_requests(
		&self,
		validatable: &ResourceRef,
	) -> Result<Vec<ValidationRequest>, DbError> {
		self.list_requests(validatable).await
	}

	async fn list_validations(
		&self,
		request_id: &ValidationRequestId,
	) -> Result<Vec<DocumentValidation>, DbError> {
		self.list_validations(request_id).await
	}

	async fn record_vote(
		&self,
		request_id: &ValidationRequestId,
		validator: &UserId,
		decision: VoteStatus,
		comment: Option<&str>,
	) -> Result<VoteRecord, DbError> {
		self
			.record_vote(request_id, validator, decision, comment)
			.await
	}

	async fn cancel_open(
		&self,
		validatable: &ResourceRef,
		cancelled_by: &UserId,
		reason: Option<&str>,
	) -> Result<Option<ValidationRequest>, DbError> {
		self.cancel_open(validatable, cancelled_by, reason).await
	}

	async fn open_requests_for_validator(
		&self,
		validator: &UserId,
	) -> Result<Vec<ValidationRequest>, DbError> {
		self.open_requests_for_validator(validator).await
	}
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<ValidationRequest, DbError> {
	let id: String = row.get("id");
	let validatable_type: String = row.get("validatable_type");
	let validatable_id: String = row.get("validatable_id");
	let requester_id: String = row.get("requester_id");
	let min_validations: i64 = row.get("min_validations");
	let status: String = row.get("status");
	let cancelled_by: Option<String> = row.get("cancelled_by");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(ValidationRequest {
		id: parse_col(&id)?,
		validatable: ResourceRef::from_parts(&validatable_type, &validatable_id)?,
		requester: parse_col(&requester_id)?,
		min_validations: u32::try_from(min_validations)
			.map_err(|e| DbError::Internal(format!("Invalid min_validations: {e}")))?,
		status: parse_col(&status)?,
		due_date: parse_opt_ts("due_date", row.get("due_date"))?,
		description: row.get("description"),
		completed_at: parse_opt_ts("completed_at", row.get("completed_at"))?,
		cancelled_by: parse_opt_col(cancelled_by)?,
		cancellation_reason: row.get("cancellation_reason"),
		created_at: parse_ts("created_at", &created_at)?,
		updated_at: parse_ts("updated_at", &updated_at)?,
	})
}

fn row_to_validation(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentValidation, DbError> {
	let id: String = row.get("id");
	let request_id: String = row.get("validation_request_id");
	let validator_id: String = row.get("validator_id");
	let status: String = row.get("status");

	Ok(DocumentValidation {
		id: parse_col(&id)?,
		validation_request_id: parse_col(&request_id)?,
		validator: parse_col(&validator_id)?,
		status: parse_col(&status)?,
		comment: row.get("comment"),
		validated_at: parse_opt_ts("validated_at", row.get("validated_at"))?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{create_file_test_pool, create_test_pool};
	use immo_server_authz::ResourceKind;
	use std::sync::Arc;
	use uuid::Uuid;

	fn document() -> ResourceRef {
		ResourceRef::new(ResourceKind::Document, Uuid::new_v4())
	}

	async fn open(
		repo: &ValidationRepository,
		doc: ResourceRef,
		min: u32,
		validators: &[UserId],
	) -> ValidationRequest {
		let request = ValidationRequest::new(doc, UserId::generate(), min);
		assert!(repo.create_request(&request, validators).await.unwrap());
		request
	}

	#[tokio::test]
	async fn one_open_request_per_resource() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let doc = document();
		let v1 = UserId::generate();
		open(&repo, doc, 1, &[v1]).await;

		let second = ValidationRequest::new(doc, UserId::generate(), 1);
		assert!(!repo.create_request(&second, &[v1]).await.unwrap());
		assert!(repo.get_request(&second.id).await.unwrap().is_none());
		assert_eq!(repo.list_requests(&doc).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn validators_are_deduplicated() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let v1 = UserId::generate();
		let request = open(&repo, document(), 1, &[v1, v1]).await;

		let rows = repo.list_validations(&request.id).await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].status, VoteStatus::Pending);
	}

	#[tokio::test]
	async fn quorum_approval() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let doc = document();
		let (v1, v2, v3) = (UserId::generate(), UserId::generate(), UserId::generate());
		let request = open(&repo, doc, 2, &[v1, v2, v3]).await;

		let VoteRecord::Recorded { request: r, completed, .. } = repo
			.record_vote(&request.id, &v1, VoteStatus::Approved, None)
			.await
			.unwrap()
		else {
			panic!("expected recorded vote");
		};
		assert_eq!(r.status, ValidationStatus::InProgress);
		assert!(!completed);

		let VoteRecord::Recorded { request: r, completed, .. } = repo
			.record_vote(&request.id, &v2, VoteStatus::Approved, None)
			.await
			.unwrap()
		else {
			panic!("expected recorded vote");
		};
		assert_eq!(r.status, ValidationStatus::Approved);
		assert!(completed);
		assert!(r.completed_at.is_some());

		let stored = repo.get_request(&request.id).await.unwrap().unwrap();
		assert_eq!(stored.status, ValidationStatus::Approved);
		assert!(stored.completed_at.is_some());

		let late = repo
			.record_vote(&request.id, &v3, VoteStatus::Approved, None)
			.await
			.unwrap();
		assert!(matches!(late, VoteRecord::Closed(_)));
		assert!(repo.open_request(&doc).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn rejection_vetoes() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let (v1, v2) = (UserId::generate(), UserId::generate());
		let request = open(&repo, document(), 2, &[v1, v2]).await;

		let VoteRecord::Recorded { request: r, validation, .. } = repo
			.record_vote(&request.id, &v1, VoteStatus::Rejected, Some("missing stamp"))
			.await
			.unwrap()
		else {
			panic!("expected recorded vote");
		};
		assert_eq!(r.status, ValidationStatus::Rejected);
		assert_eq!(validation.comment.as_deref(), Some("missing stamp"));
		assert!(validation.validated_at.is_some());
	}

	#[tokio::test]
	async fn second_vote_is_ignored() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let (v1, v2) = (UserId::generate(), UserId::generate());
		let request = open(&repo, document(), 2, &[v1, v2]).await;

		repo
			.record_vote(&request.id, &v1, VoteStatus::Approved, None)
			.await
			.unwrap();
		let again = repo
			.record_vote(&request.id, &v1, VoteStatus::Rejected, Some("changed my mind"))
			.await
			.unwrap();
		let VoteRecord::AlreadyVoted(existing) = again else {
			panic!("expected already voted");
		};
		assert_eq!(existing.status, VoteStatus::Approved);

		let stored = repo.get_request(&request.id).await.unwrap().unwrap();
		assert_eq!(stored.status, ValidationStatus::InProgress);
	}

	#[tokio::test]
	async fn unassigned_validator_is_not_found() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let request = open(&repo, document(), 1, &[UserId::generate()]).await;

		let err = repo
			.record_vote(&request.id, &UserId::generate(), VoteStatus::Approved, None)
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));

		let err = repo
			.record_vote(
				&ValidationRequestId::generate(),
				&UserId::generate(),
				VoteStatus::Approved,
				None,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}

	#[tokio::test]
	async fn cancel_closes_open_request() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let doc = document();
		let v1 = UserId::generate();
		let canceller = UserId::generate();
		open(&repo, doc, 1, &[v1]).await;

		let cancelled = repo
			.cancel_open(&doc, &canceller, Some("superseded"))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(cancelled.status, ValidationStatus::Rejected);
		assert_eq!(cancelled.cancelled_by, Some(canceller));
		assert_eq!(cancelled.cancellation_reason.as_deref(), Some("superseded"));
		assert!(cancelled.completed_at.is_some());

		assert!(repo.cancel_open(&doc, &canceller, None).await.unwrap().is_none());
		open(&repo, doc, 1, &[v1]).await;
		assert_eq!(repo.list_requests(&doc).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn pending_work_for_validator() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let v1 = UserId::generate();
		let a = open(&repo, document(), 1, &[v1]).await;
		let b = open(&repo, document(), 2, &[v1, UserId::generate()]).await;

		assert_eq!(repo.open_requests_for_validator(&v1).await.unwrap().len(), 2);

		repo
			.record_vote(&b.id, &v1, VoteStatus::Approved, None)
			.await
			.unwrap();
		let pending = repo.open_requests_for_validator(&v1).await.unwrap();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].id, a.id);
	}

	#[tokio::test]
	async fn latest_approved_skips_later_rejections() {
		let repo = ValidationRepository::new(create_test_pool().await);
		let doc = document();
		let v1 = UserId::generate();

		let first = open(&repo, doc, 1, &[v1]).await;
		repo
			.record_vote(&first.id, &v1, VoteStatus::Approved, None)
			.await
			.unwrap();
		let second = open(&repo, doc, 1, &[v1]).await;
		repo
			.record_vote(&second.id, &v1, VoteStatus::Rejected, None)
			.await
			.unwrap();

		assert_eq!(repo.latest_request(&doc).await.unwrap().unwrap().id, second.id);
		assert_eq!(
			repo.latest_approved_request(&doc).await.unwrap().unwrap().id,
			first.id
		);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_requests_open_exactly_one() {
		let dir = tempfile::tempdir().unwrap();
		let repo = Arc::new(ValidationRepository::new(create_file_test_pool(dir.path()).await));
		let validator = UserId::generate();

		for _ in 0..10 {
			let doc = document();
			let mut handles = Vec::new();
			for _ in 0..8 {
				let repo = Arc::clone(&repo);
				handles.push(tokio::spawn(async move {
					let request = ValidationRequest::new(doc, UserId::generate(), 1);
					repo.create_request(&request, &[validator]).await
				}));
			}

			let mut created = 0;
			for handle in handles {
				if handle.await.unwrap().unwrap() {
					created += 1;
				}
			}
			assert_eq!(created, 1);
			assert_eq!(repo.list_requests(&doc).await.unwrap().len(), 1);
		}
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_votes_reach_quorum_once() {
		let dir = tempfile::tempdir().unwrap();
		let repo = Arc::new(ValidationRepository::new(create_file_test_pool(dir.path()).await));
		let validators: Vec<UserId> = (0..4).map(|_| UserId::generate()).collect();
		let request = open(&repo, document(), 2, &validators).await;

		let mut handles = Vec::new();
		for validator in validators.clone() {
			let repo = Arc::clone(&repo);
			let request_id = request.id;
			handles.push(tokio::spawn(async move {
				repo
					.record_vote(&request_id, &validator, VoteStatus::Approved, None)
					.await
			}));
		}

		let mut completions = 0;
		for handle in handles {
			match handle.await.unwrap().unwrap() {
				VoteRecord::Recorded { completed: true, .. } => completions += 1,
				VoteRecord::Recorded { .. } | VoteRecord::Closed(_) => {}
				VoteRecord::AlreadyVoted(_) => panic!("each validator voted once"),
			}
		}
		assert_eq!(completions, 1);

		let stored = repo.get_request(&request.id).await.unwrap().unwrap();
		assert_eq!(stored.status, ValidationStatus::Approved);
	}
}
