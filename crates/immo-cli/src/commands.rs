// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use immo_server_access::{
	AccessServices, EventBus, GrantOptions, TracingEventSink, ValidationRequestParams, VoteOutcome,
};
use immo_server_authz::{
	Actor, Check, ResourceKind, ResourceRef, Subject, User, UserGroup, UserId,
};
use immo_server_config::ServerConfig;
use immo_server_db::{
	Budget, BudgetRepository, Document, DocumentRepository, GroupRepository, Permit,
	PermitRepository, SqlitePool, UserRepository,
};
use serde::Serialize;
use serde_json::json;

use crate::{CheckArgs, Command, GroupCommand, ResourceArgs, UserCommand, ValidationCommand};

pub struct Context {
	pool: SqlitePool,
	services: AccessServices,
	users: UserRepository,
	groups: GroupRepository,
}

impl Context {
	pub fn new(pool: SqlitePool, config: &ServerConfig) -> Self {
		let events = EventBus::new().with_sink(Arc::new(TracingEventSink));
		Self {
			services: AccessServices::new(
				pool.clone(),
				events,
				config.validation.default_min_validations,
			),
			users: UserRepository::new(pool.clone()),
			groups: GroupRepository::new(pool.clone()),
			pool,
		}
	}
}

/// A stored record whose type carries ownership and validation rules.
enum Record {
	Document(Document),
	Budget(Budget),
	Permit(Permit),
}

macro_rules! with_record {
	($record:expr, $r:ident => $body:expr) => {
		match $record {
			Record::Document($r) => $body,
			Record::Budget($r) => $body,
			Record::Permit($r) => $body,
		}
	};
}

/// `Ok(None)` for kinds without a backing table; those are checked by
/// reference with no owner.
async fn load_record(ctx: &Context, resource: &ResourceRef) -> anyhow::Result<Option<Record>> {
	let record = match resource.kind {
		ResourceKind::Document => DocumentRepository::new(ctx.pool.clone())
			.get_document(&resource.id)
			.await?
			.map(Record::Document),
		ResourceKind::Budget => BudgetRepository::new(ctx.pool.clone())
			.get_budget(&resource.id)
			.await?
			.map(Record::Budget),
		ResourceKind::Permit => PermitRepository::new(ctx.pool.clone())
			.get_permit(&resource.id)
			.await?
			.map(Record::Permit),
		_ => return Ok(None),
	};

	match record {
		Some(record) => Ok(Some(record)),
		None => bail!("{resource} not found"),
	}
}

async fn validatable(ctx: &Context, resource: &ResourceArgs) -> anyhow::Result<Record> {
	let resource = resource.resource_ref();
	match load_record(ctx, &resource).await? {
		Some(record) => Ok(record),
		None => bail!("{} resources have no validation workflow", resource.kind),
	}
}

/// Unknown users act as plain, non-admin actors.
async fn load_actor(ctx: &Context, user: &UserId) -> anyhow::Result<Actor> {
	Ok(ctx
		.users
		.get_user(user)
		.await?
		.map(|u| u.actor())
		.unwrap_or_else(|| Actor::new(*user)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

pub async fn run(ctx: &Context, command: Command) -> anyhow::Result<ExitCode> {
	let authz = &ctx.services.authorization;

	match command {
		Command::Migrate => {
			immo_server_db::run_migrations(&ctx.pool).await?;
			println!("migrations applied");
		}

		Command::Version => println!("{}", crate::version::format_version_info()),

		Command::User { command } => match command {
			UserCommand::Create { name, super_admin } => {
				let mut user = User::new(name);
				user.is_super_admin = super_admin;
				ctx.users.create_user(&user).await?;
				print_json(&user)?;
			}
		},

		Command::Grant(args) => {
			let options = GrantOptions {
				expires_at: args.expires_at,
				comment: args.comment,
			};
			let authorization = authz
				.authorize_subject(
					&args.resource.resource_ref(),
					&args.subject.kind,
					&args.subject.id,
					args.level,
					&args.granted_by,
					options,
				)
				.await?;
			print_json(&authorization)?;
		}

		Command::Revoke(args) => {
			let subject = Subject::from_parts(&args.subject.kind, &args.subject.id)?;
			let revoked = authz
				.revoke_authorization(
					&args.resource.resource_ref(),
					subject,
					args.level,
					&args.revoked_by,
					args.comment.as_deref(),
				)
				.await?;
			print_json(&revoked)?;
		}

		Command::Check(args) => {
			let allowed = check_access(ctx, &args).await?;
			println!("{}", if allowed { "allowed" } else { "denied" });
			if !allowed {
				return Ok(ExitCode::from(1));
			}
		}

		Command::Permissions(args) => {
			let levels = authz
				.permissions_for(&args.resource.resource_ref(), Some(&args.user))
				.await?;
			print_json(&levels)?;
		}

		Command::Group { command } => run_group(ctx, command).await?,

		Command::Validation { command } => run_validation(ctx, command).await?,
	}

	Ok(ExitCode::SUCCESS)
}

async fn check_access(ctx: &Context, args: &CheckArgs) -> anyhow::Result<bool> {
	let authz = &ctx.services.authorization;
	let resource = args.resource.resource_ref();
	let actor = load_actor(ctx, &args.user).await?;
	let check = Check::from(args.check);

	Ok(match load_record(ctx, &resource).await? {
		Some(record) => {
			with_record!(record, r => authz.authorized_for(&r, Some(&actor), check).await)
		}
		None => {
			authz
				.authorized_for_ref(&resource, false, Some(&actor), check)
				.await
		}
	})
}

async fn run_group(ctx: &Context, command: GroupCommand) -> anyhow::Result<()> {
	match command {
		GroupCommand::Create {
			org,
			name,
			description,
		} => {
			let mut group = UserGroup::new(org, name);
			if let Some(description) = description {
				group = group.with_description(description);
			}
			ctx.groups.create_group(&group).await?;
			print_json(&group)?;
		}
		GroupCommand::Delete { group } => {
			if !ctx.groups.delete_group(&group).await? {
				bail!("group {group} not found");
			}
			println!("group {group} deleted");
		}
		GroupCommand::AddMember { group, user } => {
			let membership = ctx
				.groups
				.add_member(&group, &user)
				.await
				.with_context(|| format!("adding {user} to group {group}"))?;
			print_json(&membership)?;
		}
		GroupCommand::RemoveMember { group, user } => {
			if !ctx.groups.remove_member(&group, &user).await? {
				bail!("{user} is not a member of group {group}");
			}
			println!("{user} removed from group {group}");
		}
	}
	Ok(())
}

async fn run_validation(ctx: &Context, command: ValidationCommand) -> anyhow::Result<()> {
	let validation = &ctx.services.validation;

	match command {
		ValidationCommand::Request {
			resource,
			requester,
			validators,
			min_validations,
			due_date,
			description,
		} => {
			let record = validatable(ctx, &resource).await?;
			let params = ValidationRequestParams {
				validators,
				min_validations,
				due_date,
				description,
			};
			let request = with_record!(record, r => validation.request_validation(&r, &requester, params).await?);
			match request {
				Some(request) => print_json(&request)?,
				None => bail!("{} already has an open validation request", resource.resource_ref()),
			}
		}

		ValidationCommand::Vote {
			resource,
			validator,
			approve,
			reject: _,
			comment,
		} => {
			let record = validatable(ctx, &resource).await?;
			let outcome = with_record!(record, r => {
				validation
					.validate_by(&r, &validator, approve, comment.as_deref())
					.await?
			});
			match outcome {
				VoteOutcome::Recorded {
					request,
					validation: vote,
				} => print_json(&json!({ "request": request, "vote": vote }))?,
				VoteOutcome::AlreadyVoted(vote) => {
					bail!("{validator} already voted {} on this request", vote.status)
				}
				VoteOutcome::Closed(request) => {
					bail!("validation request {} is already {}", request.id, request.status)
				}
			}
		}

		ValidationCommand::Cancel {
			resource,
			cancelled_by,
			reason,
		} => {
			let record = validatable(ctx, &resource).await?;
			let cancelled = with_record!(record, r => {
				validation
					.cancel_validation(&r, &cancelled_by, reason.as_deref())
					.await?
			});
			if !cancelled {
				bail!("{} has no open validation request", resource.resource_ref());
			}
			println!("validation cancelled");
		}

		ValidationCommand::Status { resource } => {
			let record = validatable(ctx, &resource).await?;
			let status = with_record!(record, r => json!({
				"pending": validation.validation_pending(&r).await?,
				"validated": validation.validated(&r).await?,
				"progress": validation.validation_progress(&r).await?,
				"current_request": validation.current_validation_request(&r).await?,
				"history": validation.validation_history(&r).await?,
			}));
			print_json(&status)?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{GrantArgs, PermissionsArgs, RevokeArgs, SubjectArgs};
	use immo_server_authz::PermissionLevel;

	async fn context(dir: &tempfile::TempDir) -> Context {
		let url = format!("sqlite://{}", dir.path().join("cli.db").display());
		let pool = immo_server_db::create_pool(&url).await.unwrap();
		immo_server_db::run_migrations(&pool).await.unwrap();
		Context::new(pool, &ServerConfig::default())
	}

	fn resource_args(resource: &ResourceRef) -> ResourceArgs {
		ResourceArgs {
			kind: resource.kind,
			id: resource.id,
		}
	}

	async fn allowed(ctx: &Context, resource: &ResourceRef, user: UserId, level: PermissionLevel) -> anyhow::Result<bool> {
		check_access(
			ctx,
			&CheckArgs {
				resource: resource_args(resource),
				user,
				check: level,
			},
		)
		.await
	}

	#[tokio::test]
	async fn grant_check_revoke_round() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = context(&dir).await;
		let doc = Document::new("Facade", None);
		DocumentRepository::new(ctx.pool.clone())
			.create_document(&doc)
			.await
			.unwrap();
		let resource = doc_ref(&doc);
		let user = UserId::generate();
		let admin = UserId::generate();

		assert!(!allowed(&ctx, &resource, user, PermissionLevel::Read).await.unwrap());

		run(
			&ctx,
			Command::Grant(GrantArgs {
				resource: resource_args(&resource),
				subject: SubjectArgs {
					kind: "user".to_string(),
					id: user.to_string(),
				},
				level: PermissionLevel::Write,
				granted_by: admin,
				expires_at: None,
				comment: None,
			}),
		)
		.await
		.unwrap();

		assert!(allowed(&ctx, &resource, user, PermissionLevel::Read).await.unwrap());

		run(
			&ctx,
			Command::Permissions(PermissionsArgs {
				resource: resource_args(&resource),
				user,
			}),
		)
		.await
		.unwrap();

		let revoke = || {
			Command::Revoke(RevokeArgs {
				resource: resource_args(&resource),
				subject: SubjectArgs {
					kind: "user".to_string(),
					id: user.to_string(),
				},
				level: PermissionLevel::Write,
				revoked_by: admin,
				comment: Some("contract ended".to_string()),
			})
		};
		run(&ctx, revoke()).await.unwrap();
		assert!(run(&ctx, revoke()).await.is_err());

		assert!(!allowed(&ctx, &resource, user, PermissionLevel::Read).await.unwrap());
	}

	fn doc_ref(doc: &Document) -> ResourceRef {
		ResourceRef::new(ResourceKind::Document, doc.id)
	}

	#[tokio::test]
	async fn missing_record_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = context(&dir).await;
		let resource = ResourceRef::new(ResourceKind::Budget, uuid::Uuid::new_v4());
		assert!(allowed(&ctx, &resource, UserId::generate(), PermissionLevel::Read)
			.await
			.is_err());
	}

	#[tokio::test]
	async fn super_admin_user_passes_checks_on_unbacked_kinds() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = context(&dir).await;
		let mut root = User::new("root");
		root.is_super_admin = true;
		ctx.users.create_user(&root).await.unwrap();

		let project = ResourceRef::new(ResourceKind::Project, uuid::Uuid::new_v4());
		assert!(allowed(&ctx, &project, root.id, PermissionLevel::Admin).await.unwrap());
		assert!(!allowed(&ctx, &project, UserId::generate(), PermissionLevel::Read)
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn validation_flow() {
		let dir = tempfile::tempdir().unwrap();
		let ctx = context(&dir).await;
		let doc = Document::new("Section drawing", Some(UserId::generate()));
		DocumentRepository::new(ctx.pool.clone())
			.create_document(&doc)
			.await
			.unwrap();
		let resource = doc_ref(&doc);
		let validator = UserId::generate();

		run_validation(
			&ctx,
			ValidationCommand::Request {
				resource: resource_args(&resource),
				requester: UserId::generate(),
				validators: vec![validator],
				min_validations: None,
				due_date: None,
				description: Some("permit submission".to_string()),
			},
		)
		.await
		.unwrap();

		let rejected_without_comment = run_validation(
			&ctx,
			ValidationCommand::Vote {
				resource: resource_args(&resource),
				validator,
				approve: false,
				reject: true,
				comment: None,
			},
		)
		.await;
		assert!(rejected_without_comment.is_err());

		run_validation(
			&ctx,
			ValidationCommand::Vote {
				resource: resource_args(&resource),
				validator,
				approve: true,
				reject: false,
				comment: None,
			},
		)
		.await
		.unwrap();

		assert!(ctx.services.validation.validated(&doc).await.unwrap());
		run_validation(
			&ctx,
			ValidationCommand::Status {
				resource: resource_args(&resource),
			},
		)
		.await
		.unwrap();

		let nothing_open = run_validation(
			&ctx,
			ValidationCommand::Cancel {
				resource: resource_args(&resource),
				cancelled_by: UserId::generate(),
				reason: None,
			},
		)
		.await;
		assert!(nothing_open.is_err());
	}
}
