// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collection queries matching the per-record predicates.

use chrono::Utc;
use immo_server_authz::{Actor, Check};
use immo_server_db::{ScopeQuery, ScopeRepository, ScopedRecord, SqlitePool, ValidationScope};
use tracing::instrument;

use crate::error::Result;

#[derive(Clone)]
pub struct ScopeService {
	repo: ScopeRepository,
}

impl ScopeService {
	pub fn new(repo: ScopeRepository) -> Self {
		Self { repo }
	}

	pub fn from_pool(pool: SqlitePool) -> Self {
		Self::new(ScopeRepository::new(pool))
	}

	pub async fn readable_by<T: ScopedRecord>(&self, actor: Option<&Actor>) -> Result<Vec<T>> {
		self.permitted(actor, Check::Read).await
	}

	pub async fn writable_by<T: ScopedRecord>(&self, actor: Option<&Actor>) -> Result<Vec<T>> {
		self.permitted(actor, Check::Write).await
	}

	#[instrument(skip(self, actor), fields(table = T::TABLE, check = %check))]
	pub async fn permitted<T: ScopedRecord>(
		&self,
		actor: Option<&Actor>,
		check: Check,
	) -> Result<Vec<T>> {
		self.fetch(&ScopeQuery::permitted(actor, check, Utc::now())).await
	}

	/// Records with an open validation request.
	pub async fn pending_validation<T: ScopedRecord>(&self) -> Result<Vec<T>> {
		self.fetch(&ScopeQuery::validation(ValidationScope::Pending)).await
	}

	/// Records whose latest approval is newer than their last content change.
	pub async fn validated<T: ScopedRecord>(&self) -> Result<Vec<T>> {
		self.fetch(&ScopeQuery::validation(ValidationScope::Validated)).await
	}

	/// Records whose most recent request was rejected.
	pub async fn rejected<T: ScopedRecord>(&self) -> Result<Vec<T>> {
		self.fetch(&ScopeQuery::validation(ValidationScope::Rejected)).await
	}

	/// Run a composed scope, e.g. readable records still awaiting validation.
	pub async fn fetch<T: ScopedRecord>(&self, scope: &ScopeQuery<T>) -> Result<Vec<T>> {
		Ok(self.repo.fetch(scope).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::authorization::{AuthorizationService, GrantOptions};
	use crate::events::EventBus;
	use immo_server_authz::{Authorizable, PermissionLevel, UserId};
	use immo_server_db::testing::create_test_pool;
	use immo_server_db::{Document, DocumentRepository};

	async fn setup() -> (ScopeService, AuthorizationService, DocumentRepository) {
		let pool = create_test_pool().await;
		(
			ScopeService::from_pool(pool.clone()),
			AuthorizationService::from_pool(pool.clone(), EventBus::new()),
			DocumentRepository::new(pool),
		)
	}

	fn ids(docs: &[Document]) -> Vec<uuid::Uuid> {
		docs.iter().map(|d| d.id).collect()
	}

	#[tokio::test]
	async fn readable_scope_agrees_with_predicate() {
		let (scopes, authz, documents) = setup().await;
		let user = UserId::generate();
		let other = UserId::generate();

		let owned = Document::new("Own plan", Some(user));
		let granted = Document::new("Shared plan", Some(other));
		let hidden = Document::new("Private plan", Some(other));
		for doc in [&owned, &granted, &hidden] {
			documents.create_document(doc).await.unwrap();
		}
		authz
			.authorize_user(
				&granted.resource_ref(),
				&user,
				PermissionLevel::Read,
				&other,
				GrantOptions::default(),
			)
			.await
			.unwrap();

		let actor = Actor::new(user);
		let readable: Vec<Document> = scopes.readable_by(Some(&actor)).await.unwrap();
		let mut expected = Vec::new();
		for doc in [&owned, &granted, &hidden] {
			if authz.readable_by(doc, Some(&actor)).await {
				expected.push(doc.id);
			}
		}
		let mut got = ids(&readable);
		got.sort();
		expected.sort();
		assert_eq!(got, expected);
		assert_eq!(expected.len(), 2);

		let writable: Vec<Document> = scopes.writable_by(Some(&actor)).await.unwrap();
		assert_eq!(ids(&writable), vec![owned.id]);
	}

	#[tokio::test]
	async fn anonymous_scope_is_empty() {
		let (scopes, _, documents) = setup().await;
		documents
			.create_document(&Document::new("Plan", None))
			.await
			.unwrap();
		let readable: Vec<Document> = scopes.readable_by(None).await.unwrap();
		assert!(readable.is_empty());
	}

	#[tokio::test]
	async fn super_admin_scope_is_everything() {
		let (scopes, _, documents) = setup().await;
		for title in ["A", "B"] {
			documents
				.create_document(&Document::new(title, None))
				.await
				.unwrap();
		}
		let root = Actor::super_admin(UserId::generate());
		let readable: Vec<Document> = scopes.readable_by(Some(&root)).await.unwrap();
		assert_eq!(readable.len(), 2);
	}

	#[tokio::test]
	async fn validated_scope_agrees_with_validated() {
		use crate::validation::{ValidationRequestParams, ValidationService};

		let pool = create_test_pool().await;
		let scopes = ScopeService::from_pool(pool.clone());
		let validation = ValidationService::from_pool(pool.clone(), EventBus::new());
		let documents = DocumentRepository::new(pool);
		let validator = UserId::generate();

		let mut docs = Vec::new();
		for title in ["Plan", "Coupe"] {
			let doc = Document::new(title, None);
			documents.create_document(&doc).await.unwrap();
			validation
				.request_validation(&doc, &UserId::generate(), ValidationRequestParams::new([validator]))
				.await
				.unwrap()
				.unwrap();
			validation
				.validate_by(&doc, &validator, true, None)
				.await
				.unwrap();
			docs.push(doc);
		}
		docs[0] = documents.update_title(&docs[0].id, "Plan indice B").await.unwrap();

		let validated: Vec<Document> = scopes.validated().await.unwrap();
		for doc in &docs {
			assert_eq!(
				validation.validated(doc).await.unwrap(),
				validated.iter().any(|d| d.id == doc.id),
				"{}",
				doc.title
			);
		}
		assert_eq!(validated.len(), 1);
	}
}
