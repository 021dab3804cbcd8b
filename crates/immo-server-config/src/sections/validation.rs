// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Validation workflow configuration.

use serde::Deserialize;

/// Validation workflow configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct ValidationConfig {
	/// Quorum applied to requests that do not specify one.
	pub default_min_validations: u32,
}

impl Default for ValidationConfig {
	fn default() -> Self {
		Self {
			default_min_validations: 1,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfigLayer {
	#[serde(default)]
	pub default_min_validations: Option<u32>,
}

impl ValidationConfigLayer {
	pub fn merge(&mut self, other: ValidationConfigLayer) {
		if other.default_min_validations.is_some() {
			self.default_min_validations = other.default_min_validations;
		}
	}

	pub fn finalize(self) -> ValidationConfig {
		ValidationConfig {
			default_min_validations: self.default_min_validations.unwrap_or(1),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn single_validator_by_default() {
		let config = ValidationConfigLayer::default().finalize();
		assert_eq!(config.default_min_validations, 1);
	}
}
