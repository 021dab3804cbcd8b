// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `immo-authz`: operator CLI for grants, groups and validation requests.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use immo_server_authz::{GroupId, OrgId, PermissionLevel, ResourceKind, ResourceRef, UserId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod commands;
mod version;

/// Immo Promo authorization CLI.
#[derive(Parser, Debug)]
#[command(
	name = "immo-authz",
	about = "Manage Immo Promo authorizations, groups and validations",
	version
)]
struct Args {
	/// Config file (defaults to /etc/immo/server.toml)
	#[arg(long, global = true, env = "IMMO_SERVER_CONFIG")]
	config: Option<PathBuf>,

	/// Override the configured database URL
	#[arg(long, global = true)]
	database_url: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Apply pending database migrations
	Migrate,

	/// Manage users
	User {
		#[command(subcommand)]
		command: UserCommand,
	},

	/// Grant a permission level on a resource to a user or group
	Grant(GrantArgs),

	/// Revoke the most recent matching active grant
	Revoke(RevokeArgs),

	/// Decide whether a user passes a check on a resource
	Check(CheckArgs),

	/// List the distinct levels a user holds on a resource
	Permissions(PermissionsArgs),

	/// Manage user groups
	Group {
		#[command(subcommand)]
		command: GroupCommand,
	},

	/// Drive validation requests
	Validation {
		#[command(subcommand)]
		command: ValidationCommand,
	},

	/// Show version and build information
	Version,
}

#[derive(clap::Args, Debug, Clone)]
struct ResourceArgs {
	/// document, folder, space, budget, permit, contract or project
	#[arg(long = "resource-type", id = "resource-type")]
	kind: ResourceKind,

	#[arg(long = "resource-id", id = "resource-id")]
	id: Uuid,
}

impl ResourceArgs {
	fn resource_ref(&self) -> ResourceRef {
		ResourceRef::new(self.kind, self.id)
	}
}

#[derive(clap::Args, Debug, Clone)]
struct SubjectArgs {
	/// user or group
	#[arg(long = "subject-type", id = "subject-type")]
	kind: String,

	#[arg(long = "subject-id", id = "subject-id")]
	id: String,
}

#[derive(clap::Args, Debug)]
struct GrantArgs {
	#[command(flatten)]
	resource: ResourceArgs,

	#[command(flatten)]
	subject: SubjectArgs,

	#[arg(long)]
	level: PermissionLevel,

	#[arg(long)]
	granted_by: UserId,

	/// RFC 3339 timestamp after which the grant no longer applies
	#[arg(long)]
	expires_at: Option<DateTime<Utc>>,

	#[arg(long)]
	comment: Option<String>,
}

#[derive(clap::Args, Debug)]
struct RevokeArgs {
	#[command(flatten)]
	resource: ResourceArgs,

	#[command(flatten)]
	subject: SubjectArgs,

	#[arg(long)]
	level: PermissionLevel,

	#[arg(long)]
	revoked_by: UserId,

	/// Appended to the grant's comment
	#[arg(long)]
	comment: Option<String>,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
	#[command(flatten)]
	resource: ResourceArgs,

	#[arg(long)]
	user: UserId,

	/// read, write, admin or validate
	#[arg(long)]
	check: PermissionLevel,
}

#[derive(clap::Args, Debug)]
struct PermissionsArgs {
	#[command(flatten)]
	resource: ResourceArgs,

	#[arg(long)]
	user: UserId,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
	/// Create a user and print its id
	Create {
		#[arg(long)]
		name: String,

		#[arg(long)]
		super_admin: bool,
	},
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
	/// Create a group in an organization
	Create {
		#[arg(long)]
		org: OrgId,

		#[arg(long)]
		name: String,

		#[arg(long)]
		description: Option<String>,
	},
	/// Delete a group with its memberships and grants
	Delete {
		#[arg(long)]
		group: GroupId,
	},
	/// Add a user to a group
	AddMember {
		#[arg(long)]
		group: GroupId,

		#[arg(long)]
		user: UserId,
	},
	/// Remove a user from a group
	RemoveMember {
		#[arg(long)]
		group: GroupId,

		#[arg(long)]
		user: UserId,
	},
}

#[derive(Subcommand, Debug)]
enum ValidationCommand {
	/// Open a validation request
	Request {
		#[command(flatten)]
		resource: ResourceArgs,

		#[arg(long)]
		requester: UserId,

		/// Assigned validator; repeat for several
		#[arg(long = "validator", required = true)]
		validators: Vec<UserId>,

		/// Approvals required (defaults to the configured quorum)
		#[arg(long)]
		min_validations: Option<u32>,

		#[arg(long)]
		due_date: Option<DateTime<Utc>>,

		#[arg(long)]
		description: Option<String>,
	},
	/// Record a validator's decision
	Vote {
		#[command(flatten)]
		resource: ResourceArgs,

		#[arg(long)]
		validator: UserId,

		#[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
		approve: bool,

		#[arg(long)]
		reject: bool,

		/// Required when rejecting
		#[arg(long)]
		comment: Option<String>,
	},
	/// Cancel the open request
	Cancel {
		#[command(flatten)]
		resource: ResourceArgs,

		#[arg(long)]
		cancelled_by: UserId,

		#[arg(long)]
		reason: Option<String>,
	},
	/// Show the validation state of a resource
	Status {
		#[command(flatten)]
		resource: ResourceArgs,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(ExitCode::SUCCESS);
	}

	dotenvy::dotenv().ok();

	let mut config = match &args.config {
		Some(path) => immo_server_config::load_config_with_file(path)?,
		None => immo_server_config::load_config()?,
	};
	if let Some(url) = args.database_url.clone() {
		config.database.url = url;
		config.database.validate()?;
	}

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	tracing::debug!(database = %config.database.url, "starting immo-authz");
	if config.database.is_in_memory() {
		tracing::warn!("in-memory database; nothing is kept after this command");
	}

	let pool = immo_server_db::create_pool(&config.database.url).await?;
	immo_server_db::run_migrations(&pool).await?;

	let ctx = commands::Context::new(pool, &config);
	commands::run(&ctx, args.command).await
}
