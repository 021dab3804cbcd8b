// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Validation workflow model.
//!
//! A [`ValidationRequest`] asks a set of validators to approve a resource. Each
//! validator owns one [`DocumentValidation`] row. After every vote the request is
//! re-evaluated with [`Tally::resolve`]:
//!
//! ```text
//! pending ──vote──▶ in_progress ──quorum──▶ approved
//!    │                   │
//!    └──── any reject ───┴──────────────▶ rejected
//! ```
//!
//! `completed` is terminal as well but is never produced by a vote; it exists for
//! requests closed out by other means.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::types::{DocumentValidationId, ResourceRef, UserId, ValidationRequestId};

/// Status of a validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
	Pending,
	InProgress,
	Approved,
	Rejected,
	Completed,
}

impl ValidationStatus {
	/// Pending or in progress.
	pub fn is_open(&self) -> bool {
		matches!(self, ValidationStatus::Pending | ValidationStatus::InProgress)
	}

	pub fn is_terminal(&self) -> bool {
		!self.is_open()
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ValidationStatus::Pending => "pending",
			ValidationStatus::InProgress => "in_progress",
			ValidationStatus::Approved => "approved",
			ValidationStatus::Rejected => "rejected",
			ValidationStatus::Completed => "completed",
		}
	}
}

impl fmt::Display for ValidationStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ValidationStatus {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(ValidationStatus::Pending),
			"in_progress" => Ok(ValidationStatus::InProgress),
			"approved" => Ok(ValidationStatus::Approved),
			"rejected" => Ok(ValidationStatus::Rejected),
			"completed" => Ok(ValidationStatus::Completed),
			other => Err(ParseError::UnknownValidationStatus(other.to_string())),
		}
	}
}

/// Status of one validator's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
	Pending,
	Approved,
	Rejected,
}

impl VoteStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			VoteStatus::Pending => "pending",
			VoteStatus::Approved => "approved",
			VoteStatus::Rejected => "rejected",
		}
	}

	pub fn from_approval(approved: bool) -> Self {
		if approved {
			VoteStatus::Approved
		} else {
			VoteStatus::Rejected
		}
	}
}

impl fmt::Display for VoteStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for VoteStatus {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(VoteStatus::Pending),
			"approved" => Ok(VoteStatus::Approved),
			"rejected" => Ok(VoteStatus::Rejected),
			other => Err(ParseError::UnknownVoteStatus(other.to_string())),
		}
	}
}

/// A quorum-based approval workflow attached to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
	pub id: ValidationRequestId,
	pub validatable: ResourceRef,
	pub requester: UserId,
	pub min_validations: u32,
	pub status: ValidationStatus,
	pub due_date: Option<DateTime<Utc>>,
	pub description: Option<String>,
	pub completed_at: Option<DateTime<Utc>>,
	pub cancelled_by: Option<UserId>,
	pub cancellation_reason: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl ValidationRequest {
	pub fn new(validatable: ResourceRef, requester: UserId, min_validations: u32) -> Self {
		let now = Utc::now();
		Self {
			id: ValidationRequestId::generate(),
			validatable,
			requester,
			min_validations,
			status: ValidationStatus::Pending,
			due_date: None,
			description: None,
			completed_at: None,
			cancelled_by: None,
			cancellation_reason: None,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn is_open(&self) -> bool {
		self.status.is_open()
	}

	pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
		self.is_open() && self.due_date.is_some_and(|due| due < now)
	}
}

/// One validator's assignment and vote on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentValidation {
	pub id: DocumentValidationId,
	pub validation_request_id: ValidationRequestId,
	pub validator: UserId,
	pub status: VoteStatus,
	pub comment: Option<String>,
	pub validated_at: Option<DateTime<Utc>>,
}

impl DocumentValidation {
	pub fn pending(validation_request_id: ValidationRequestId, validator: UserId) -> Self {
		Self {
			id: DocumentValidationId::generate(),
			validation_request_id,
			validator,
			status: VoteStatus::Pending,
			comment: None,
			validated_at: None,
		}
	}

	pub fn has_acted(&self) -> bool {
		self.status != VoteStatus::Pending
	}
}

/// Vote counts of one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
	pub assigned: u32,
	pub approved: u32,
	pub rejected: u32,
}

impl Tally {
	pub fn from_votes<'a>(votes: impl IntoIterator<Item = &'a VoteStatus>) -> Self {
		let mut tally = Tally::default();
		for vote in votes {
			tally.assigned += 1;
			match vote {
				VoteStatus::Approved => tally.approved += 1,
				VoteStatus::Rejected => tally.rejected += 1,
				VoteStatus::Pending => {}
			}
		}
		tally
	}

	pub fn acted(&self) -> u32 {
		self.approved + self.rejected
	}

	/// Status after the latest vote: one rejection vetoes, otherwise the quorum
	/// decides.
	pub fn resolve(&self, min_validations: u32) -> ValidationStatus {
		if self.rejected > 0 {
			ValidationStatus::Rejected
		} else if self.approved >= min_validations {
			ValidationStatus::Approved
		} else if self.acted() > 0 {
			ValidationStatus::InProgress
		} else {
			ValidationStatus::Pending
		}
	}

	/// Percentage of assigned validators who have acted, rounded, 0 to 100.
	pub fn progress(&self) -> u8 {
		if self.assigned == 0 {
			return 0;
		}
		let pct = (self.acted() as f64 * 100.0 / self.assigned as f64).round();
		pct.clamp(0.0, 100.0) as u8
	}
}

/// An approval stays current until the content under review changes.
pub fn approval_is_current(approved_at: DateTime<Utc>, content_changed_at: DateTime<Utc>) -> bool {
	approved_at > content_changed_at
}
