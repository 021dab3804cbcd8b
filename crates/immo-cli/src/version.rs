// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for immo-authz.

/// Format version info for display.
pub fn format_version_info() -> String {
	let latest_migration = immo_server_db::MIGRATOR
		.iter()
		.map(|m| m.version)
		.max()
		.unwrap_or_default();

	format!(
		"immo-authz version: {}\n\
		 Schema version:     {}\n\
		 Platform:           {}-{}",
		env!("CARGO_PKG_VERSION"),
		latest_migration,
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reports_package_and_schema_version() {
		let info = format_version_info();
		assert!(info.contains(env!("CARGO_PKG_VERSION")));
		assert!(info.contains("Schema version:     5"));
	}
}
