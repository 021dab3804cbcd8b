// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration as produced by a single source.

use serde::Deserialize;

use crate::sections::{DatabaseConfigLayer, LoggingConfigLayer, ValidationConfigLayer};

/// Every section is optional; later sources override earlier ones field by
/// field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub validation: Option<ValidationConfigLayer>,
}

impl ServerConfigLayer {
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.validation, other.validation, ValidationConfigLayer::merge);
	}
}

fn merge_section<T>(current: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (current.as_mut(), other) {
		(Some(current), Some(other)) => merge(current, other),
		(None, Some(other)) => *current = Some(other),
		(_, None) => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn later_layer_overrides_set_fields_only() {
		let mut base = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:./base.db".to_string()),
			}),
			logging: Some(LoggingConfigLayer {
				level: Some("debug".to_string()),
			}),
			validation: None,
		};
		base.merge(ServerConfigLayer {
			database: Some(DatabaseConfigLayer { url: None }),
			logging: Some(LoggingConfigLayer {
				level: Some("warn".to_string()),
			}),
			validation: Some(ValidationConfigLayer {
				default_min_validations: Some(2),
			}),
		});

		assert_eq!(
			base.database.and_then(|d| d.url).as_deref(),
			Some("sqlite:./base.db")
		);
		assert_eq!(base.logging.and_then(|l| l.level).as_deref(), Some("warn"));
		assert_eq!(
			base.validation.and_then(|v| v.default_min_validations),
			Some(2)
		);
	}

	#[test]
	fn parses_toml_sections() {
		let layer: ServerConfigLayer = toml::from_str(
			r#"
			[database]
			url = "sqlite:/var/lib/immo/immo.db"

			[validation]
			default_min_validations = 3
			"#,
		)
		.unwrap();
		assert!(layer.logging.is_none());
		assert_eq!(
			layer.validation.and_then(|v| v.default_min_validations),
			Some(3)
		);
	}

	#[test]
	fn unknown_sections_are_rejected() {
		let parsed: Result<ServerConfigLayer, _> = toml::from_str("[http]\nport = 8080\n");
		assert!(parsed.is_err());
	}
}
