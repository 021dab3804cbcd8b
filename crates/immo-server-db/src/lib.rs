// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the Immo Promo access model.
//!
//! Each table family has a `*Store` trait and a `*Repository` implementation
//! over a shared [`sqlx::SqlitePool`]. Schema changes live in `migrations/`
//! and are embedded through [`MIGRATOR`].

pub mod authorization;
pub mod budgets;
pub mod columns;
pub mod documents;
pub mod error;
pub mod group;
pub mod permits;
pub mod pool;
pub mod scope;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod user;
pub mod validation;

pub use authorization::{AuthorizationRepository, AuthorizationStore};
pub use budgets::{Budget, BudgetRepository};
pub use documents::{Document, DocumentRepository};
pub use error::{DbError, Result};
pub use group::{GroupRepository, GroupStore};
pub use permits::{Permit, PermitRepository};
pub use pool::{create_pool, run_migrations, MIGRATOR};
pub use scope::{ScopeQuery, ScopeRepository, ScopedRecord, ValidationScope};
pub use user::{UserRepository, UserStore};
pub use validation::{ValidationRepository, ValidationStore, VoteRecord};
pub use sqlx::SqlitePool;
