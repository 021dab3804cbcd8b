// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database section: where the grant ledger and validation tables live.

use serde::Deserialize;

use crate::error::ConfigError;

pub(crate) const DEFAULT_DATABASE_URL: &str = "sqlite:./immo.db";

const SQLITE_SCHEME: &str = "sqlite:";

/// Resolved database settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_DATABASE_URL.to_string(),
		}
	}
}

impl DatabaseConfig {
	/// The store is SQLite only, so the URL must carry the `sqlite:` scheme and
	/// name a database after it.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let url = self.url.trim();
		if url.is_empty() {
			return Err(ConfigError::InvalidValue {
				key: "database.url".to_string(),
				message: "must not be empty".to_string(),
			});
		}
		let Some(target) = url.strip_prefix(SQLITE_SCHEME) else {
			return Err(ConfigError::InvalidValue {
				key: "database.url".to_string(),
				message: format!("expected a {SQLITE_SCHEME} URL, got {url:?}"),
			});
		};
		if target.trim_start_matches('/').is_empty() {
			return Err(ConfigError::InvalidValue {
				key: "database.url".to_string(),
				message: "no database path or :memory: after the scheme".to_string(),
			});
		}
		Ok(())
	}

	pub fn is_in_memory(&self) -> bool {
		self.url.contains(":memory:") || self.url.contains("mode=memory")
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config(url: &str) -> DatabaseConfig {
		DatabaseConfig {
			url: url.to_string(),
		}
	}

	#[test]
	fn default_url_is_a_local_file() {
		let config = DatabaseConfigLayer::default().finalize();
		assert_eq!(config.url, "sqlite:./immo.db");
		assert!(config.validate().is_ok());
		assert!(!config.is_in_memory());
	}

	#[test]
	fn later_layer_wins() {
		let mut layer = DatabaseConfigLayer::default();
		layer.merge(DatabaseConfigLayer {
			url: Some("sqlite:/var/lib/immo/immo.db".to_string()),
		});
		layer.merge(DatabaseConfigLayer::default());
		assert_eq!(layer.finalize().url, "sqlite:/var/lib/immo/immo.db");
	}

	#[test]
	fn accepts_sqlite_urls() {
		for url in [
			"sqlite:/srv/immo.db",
			"sqlite:///srv/immo.db?mode=rwc",
			"sqlite::memory:",
		] {
			assert!(config(url).validate().is_ok(), "{url}");
		}
		assert!(config("sqlite::memory:").is_in_memory());
	}

	#[test]
	fn rejects_other_schemes_and_missing_paths() {
		for url in ["", "   ", "postgres://localhost/immo", "./immo.db", "sqlite:", "sqlite://"] {
			let err = config(url).validate().unwrap_err();
			assert!(
				matches!(&err, ConfigError::InvalidValue { key, .. } if key == "database.url"),
				"{url}: {err}"
			);
		}
	}
}
