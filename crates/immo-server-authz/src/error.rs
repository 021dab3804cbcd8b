// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Failures turning untyped input (storage columns, CLI arguments) into model types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
	#[error("invalid id: {0}")]
	InvalidId(String),

	#[error("unknown permission level '{0}'")]
	UnknownPermissionLevel(String),

	#[error("unknown resource kind '{0}'")]
	UnknownResourceKind(String),

	#[error("subject must be a user or a group, got '{0}'")]
	UnknownSubjectKind(String),

	#[error("unknown validation status '{0}'")]
	UnknownValidationStatus(String),

	#[error("unknown vote status '{0}'")]
	UnknownVoteStatus(String),

	#[error("unknown authorization event '{0}'")]
	UnknownEventKind(String),
}
