// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Documents: owned by their uploader and their project manager, and subject
//! to validation. Only title changes count as content changes.

use chrono::{DateTime, Utc};
use immo_server_authz::{Authorizable, Owned, Ownership, ResourceKind, UserId, Validatable};
use serde::{Deserialize, Serialize};
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	Row,
};
use uuid::Uuid;

use crate::columns::{format_ts, parse_opt_col, parse_ts, parse_uuid};
use crate::error::DbError;
use crate::scope::ScopedRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
	pub id: Uuid,
	pub title: String,
	pub uploaded_by: Option<UserId>,
	pub project_manager: Option<UserId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub content_updated_at: DateTime<Utc>,
}

impl Document {
	pub fn new(title: impl Into<String>, uploaded_by: Option<UserId>) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			title: title.into(),
			uploaded_by,
			project_manager: None,
			created_at: now,
			updated_at: now,
			content_updated_at: now,
		}
	}

	pub fn with_project_manager(mut self, project_manager: UserId) -> Self {
		self.project_manager = Some(project_manager);
		self
	}
}

impl Owned for Document {
	const OWNERSHIP: Ownership = Ownership::Attributes(&["uploaded_by", "project_manager"]);

	fn ownership_attribute(&self, attribute: &str) -> Option<UserId> {
		match attribute {
			"uploaded_by" => self.uploaded_by,
			"project_manager" => self.project_manager,
			_ => None,
		}
	}
}

impl Authorizable for Document {
	const KIND: ResourceKind = ResourceKind::Document;

	fn resource_id(&self) -> Uuid {
		self.id
	}
}

impl Validatable for Document {
	fn content_changed_at(&self) -> DateTime<Utc> {
		self.content_updated_at
	}
}

impl ScopedRecord for Document {
	const TABLE: &'static str = "documents";
	const CONTENT_CHANGED_COLUMN: &'static str = "content_updated_at";

	fn from_row(row: &SqliteRow) -> Result<Self, DbError> {
		let id: String = row.get("id");
		let uploaded_by: Option<String> = row.get("uploaded_by");
		let project_manager: Option<String> = row.get("project_manager");
		let created_at: String = row.get("created_at");
		let updated_at: String = row.get("updated_at");
		let content_updated_at: String = row.get("content_updated_at");

		Ok(Document {
			id: parse_uuid("id", &id)?,
			title: row.get("title"),
			uploaded_by: parse_opt_col(uploaded_by)?,
			project_manager: parse_opt_col(project_manager)?,
			created_at: parse_ts("created_at", &created_at)?,
			updated_at: parse_ts("updated_at", &updated_at)?,
			content_updated_at: parse_ts("content_updated_at", &content_updated_at)?,
		})
	}
}

#[derive(Clone)]
pub struct DocumentRepository {
	pool: SqlitePool,
}

impl DocumentRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, document), fields(document_id = %document.id))]
	pub async fn create_document(&self, document: &Document) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO documents (id, title, uploaded_by, project_manager, created_at, updated_at, content_updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(document.id.to_string())
		.bind(&document.title)
		.bind(document.uploaded_by.map(|u| u.to_string()))
		.bind(document.project_manager.map(|u| u.to_string()))
		.bind(format_ts(document.created_at))
		.bind(format_ts(document.updated_at))
		.bind(format_ts(document.content_updated_at))
		.execute(&self.pool)
		.await?;

		tracing::debug!(document_id = %document.id, "document created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(document_id = %id))]
	pub async fn get_document(&self, id: &Uuid) -> Result<Option<Document>, DbError> {
		let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(Document::from_row).transpose()
	}

	/// Change the title. This is a content change and stales prior approvals.
	#[tracing::instrument(skip(self, title), fields(document_id = %id))]
	pub async fn update_title(&self, id: &Uuid, title: &str) -> Result<Document, DbError> {
		let now = format_ts(Utc::now());
		let result = sqlx::query(
			"UPDATE documents SET title = ?, updated_at = ?, content_updated_at = ? WHERE id = ?",
		)
		.bind(title)
		.bind(&now)
		.bind(&now)
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("document {id}")));
		}
		self
			.get_document(id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("document {id}")))
	}

	/// Reassign the project manager. Bookkeeping only: approvals stay current.
	#[tracing::instrument(skip(self), fields(document_id = %id))]
	pub async fn set_project_manager(
		&self,
		id: &Uuid,
		project_manager: Option<UserId>,
	) -> Result<Document, DbError> {
		let result = sqlx::query("UPDATE documents SET project_manager = ?, updated_at = ? WHERE id = ?")
			.bind(project_manager.map(|u| u.to_string()))
			.bind(format_ts(Utc::now()))
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("document {id}")));
		}
		self
			.get_document(id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("document {id}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn project_manager_change_is_not_content() {
		let repo = DocumentRepository::new(create_test_pool().await);
		let doc = Document::new("Plan RDC", Some(UserId::generate()));
		repo.create_document(&doc).await.unwrap();

		let pm = UserId::generate();
		let updated = repo.set_project_manager(&doc.id, Some(pm)).await.unwrap();
		assert_eq!(updated.project_manager, Some(pm));
		assert!(updated.updated_at > updated.content_updated_at);
		assert!(updated.owned_by(Some(&pm)));
	}

	#[tokio::test]
	async fn title_change_is_content() {
		let repo = DocumentRepository::new(create_test_pool().await);
		let doc = Document::new("Plan RDC", None);
		repo.create_document(&doc).await.unwrap();

		let updated = repo.update_title(&doc.id, "Plan R+1").await.unwrap();
		assert_eq!(updated.title, "Plan R+1");
		assert_eq!(updated.content_changed_at(), updated.updated_at);
	}

	#[tokio::test]
	async fn missing_document_updates_fail() {
		let repo = DocumentRepository::new(create_test_pool().await);
		let err = repo.update_title(&Uuid::new_v4(), "x").await.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}
}
