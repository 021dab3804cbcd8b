// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pools for tests, with the full schema applied.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::pool::{create_pool, run_migrations};

/// Single-connection in-memory pool. Every connection to `:memory:` is a fresh
/// database, so the pool must never open a second one.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool");

	run_migrations(&pool)
		.await
		.expect("Failed to run migrations");
	pool
}

/// File-backed WAL pool under `dir`, for tests that need real concurrency.
pub async fn create_file_test_pool(dir: &Path) -> SqlitePool {
	let url = format!("sqlite://{}", dir.join("immo-test.db").display());
	let pool = create_pool(&url).await.expect("Failed to create file pool");
	run_migrations(&pool)
		.await
		.expect("Failed to run migrations");
	pool
}
