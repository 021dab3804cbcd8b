// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Immo Promo authorization server.
//!
//! Values are layered from built-in defaults, a TOML file and
//! `IMMO_SERVER_*` environment variables, in increasing precedence.
//!
//! ```ignore
//! use immo_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("database: {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub validation: ValidationConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`IMMO_SERVER_*`)
/// 2. Config file (`/etc/immo/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Same as [`load_config`] with an explicit config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_from(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		validation: layer.validation.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		database = %config.database.url,
		log_level = %config.logging.level,
		default_min_validations = config.validation.default_min_validations,
		"Server configuration loaded"
	);
	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.validation.default_min_validations < 1 {
		return Err(ConfigError::Validation(
			"validation.default_min_validations must be at least 1".to_string(),
		));
	}
	config.database.validate()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	struct FixedSource(Precedence, ServerConfigLayer);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
			Ok(self.1.clone())
		}
	}

	fn quorum_layer(min: Option<u32>) -> ServerConfigLayer {
		ServerConfigLayer {
			validation: Some(ValidationConfigLayer {
				default_min_validations: min,
			}),
			..Default::default()
		}
	}

	#[test]
	fn defaults_resolve() {
		let config = load_from(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config.database.url, "sqlite:./immo.db");
		assert_eq!(config.logging.level, "info");
		assert_eq!(config.validation.default_min_validations, 1);
	}

	#[test]
	fn zero_quorum_is_rejected() {
		let err = load_from(vec![Box::new(FixedSource(
			Precedence::ConfigFile,
			quorum_layer(Some(0)),
		))])
		.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn non_sqlite_url_is_rejected() {
		let layer = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("postgres://localhost/immo".to_string()),
			}),
			..Default::default()
		};
		let err = load_from(vec![
			Box::new(DefaultsSource),
			Box::new(FixedSource(Precedence::Environment, layer)),
		])
		.unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}

	#[test]
	fn file_values_apply() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("server.toml");
		std::fs::write(
			&path,
			"[database]\nurl = \"sqlite:/srv/immo.db\"\n\n[logging]\nlevel = \"debug\"\n",
		)
		.unwrap();

		let config = load_from(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(&path)),
		])
		.unwrap();
		assert_eq!(config.database.url, "sqlite:/srv/immo.db");
		assert_eq!(config.logging.level, "debug");
	}

	proptest! {
		#[test]
		fn higher_precedence_wins_regardless_of_order(file in 1u32..10, env in 1u32..10, env_first: bool) {
			let file_source: Box<dyn ConfigSource> =
				Box::new(FixedSource(Precedence::ConfigFile, quorum_layer(Some(file))));
			let env_source: Box<dyn ConfigSource> =
				Box::new(FixedSource(Precedence::Environment, quorum_layer(Some(env))));
			let sources = if env_first {
				vec![env_source, file_source]
			} else {
				vec![file_source, env_source]
			};

			let config = load_from(sources).unwrap();
			prop_assert_eq!(config.validation.default_min_validations, env);
		}

		#[test]
		fn unset_fields_fall_through(file in 1u32..10) {
			let config = load_from(vec![
				Box::new(FixedSource(Precedence::Environment, quorum_layer(None))),
				Box::new(FixedSource(Precedence::ConfigFile, quorum_layer(Some(file)))),
			])
			.unwrap();
			prop_assert_eq!(config.validation.default_min_validations, file);
		}
	}
}
