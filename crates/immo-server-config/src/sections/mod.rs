// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a resolved `*Config` and a partial
//! `*ConfigLayer` used while merging sources.

mod database;
mod logging;
mod validation;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use validation::{ValidationConfig, ValidationConfigLayer};
