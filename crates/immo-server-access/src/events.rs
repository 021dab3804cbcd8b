// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Domain events published after ledger and validation changes commit.
//!
//! Sinks are best-effort: a failing sink is logged and never rolls back or
//! fails the operation that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use immo_server_authz::{
	Authorization, DocumentValidation, UserId, ValidationRequest, ValidationRequestId, VoteStatus,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthzEvent {
	Granted {
		authorization: Authorization,
	},
	Revoked {
		authorization: Authorization,
	},
	ValidationRequested {
		request: ValidationRequest,
		validators: Vec<UserId>,
	},
	VoteRecorded {
		request_id: ValidationRequestId,
		validator: UserId,
		decision: VoteStatus,
		comment: Option<String>,
	},
	ValidationCompleted {
		request: ValidationRequest,
	},
	ValidationCancelled {
		request: ValidationRequest,
	},
}

impl AuthzEvent {
	pub fn name(&self) -> &'static str {
		match self {
			AuthzEvent::Granted { .. } => "authorization.granted",
			AuthzEvent::Revoked { .. } => "authorization.revoked",
			AuthzEvent::ValidationRequested { .. } => "validation.requested",
			AuthzEvent::VoteRecorded { .. } => "validation.vote_recorded",
			AuthzEvent::ValidationCompleted { .. } => "validation.completed",
			AuthzEvent::ValidationCancelled { .. } => "validation.cancelled",
		}
	}

	pub(crate) fn vote(validation: &DocumentValidation) -> Self {
		AuthzEvent::VoteRecorded {
			request_id: validation.validation_request_id,
			validator: validation.validator,
			decision: validation.status,
			comment: validation.comment.clone(),
		}
	}
}

#[derive(Error, Debug)]
pub enum EventSinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),
}

/// Receiver of [`AuthzEvent`]s, e.g. a notification mailer.
#[async_trait]
pub trait EventSink: Send + Sync {
	fn name(&self) -> &str;

	async fn publish(&self, event: Arc<AuthzEvent>) -> Result<(), EventSinkError>;
}

/// Writes each event as one structured `info!` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
	fn name(&self) -> &str {
		"tracing"
	}

	async fn publish(&self, event: Arc<AuthzEvent>) -> Result<(), EventSinkError> {
		let payload = serde_json::to_string(event.as_ref())
			.map_err(|e| EventSinkError::Permanent(format!("JSON serialization failed: {e}")))?;
		info!(event = event.name(), %payload, "authz event");
		Ok(())
	}
}

/// Keeps events in memory.
#[derive(Default)]
pub struct MemoryEventSink {
	events: Mutex<Vec<Arc<AuthzEvent>>>,
}

impl MemoryEventSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn events(&self) -> Vec<Arc<AuthzEvent>> {
		self.events.lock().await.clone()
	}

	pub async fn names(&self) -> Vec<&'static str> {
		self.events.lock().await.iter().map(|e| e.name()).collect()
	}
}

#[async_trait]
impl EventSink for MemoryEventSink {
	fn name(&self) -> &str {
		"memory"
	}

	async fn publish(&self, event: Arc<AuthzEvent>) -> Result<(), EventSinkError> {
		self.events.lock().await.push(event);
		Ok(())
	}
}

/// Fans events out to every registered sink.
#[derive(Clone, Default)]
pub struct EventBus {
	sinks: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.sinks.push(sink);
		self
	}

	pub fn sink_names(&self) -> Vec<&str> {
		self.sinks.iter().map(|s| s.name()).collect()
	}

	pub async fn emit(&self, event: AuthzEvent) {
		let event = Arc::new(event);
		for sink in &self.sinks {
			if let Err(e) = sink.publish(Arc::clone(&event)).await {
				warn!(sink = sink.name(), event = event.name(), error = %e, "event sink failed");
			}
		}
	}
}
