// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dispatch of parsed subcommands onto the engine.

use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;
use warden_core::input::from_json;
use warden_core::{
	GroupInput, ObjectId, ObjectInput, ObjectUpdate, PermissionSetInput, PermissionSetUpdate,
	SubjectId, SubjectKind,
};
use warden_engine::AccessEngine;

use crate::cli::{
	Command, GroupCommand, ObjectCommand, PermissionSetCommand, SubjectCommand, UserCommand,
};

pub async fn run(engine: &AccessEngine, command: Command) -> Result<ExitCode> {
	match command {
		Command::User { command } => user(engine, command).await?,
		Command::Group { command } => group(engine, command).await?,
		Command::Subject { command } => subject(engine, command).await?,
		Command::PermissionSet { command } => permission_set(engine, command).await?,
		Command::Object { command } => object(engine, command).await?,
		Command::Grant {
			object,
			subject,
			permissions,
		} => {
			let view = engine
				.grant_permissions(&ObjectId::new(object), &permissions, &subject)
				.await?;
			print_json(&view)?;
		}
		Command::Revoke {
			object,
			permission,
			subject,
		} => {
			let view = engine
				.revoke_permission(&ObjectId::new(object), &permission, &subject)
				.await?;
			print_json(&view)?;
		}
		Command::Check {
			object,
			user,
			permissions,
		} => {
			let decision = engine
				.check_access(&ObjectId::new(object), &SubjectId::new(user), &permissions)
				.await;
			println!("{decision}");
			if !decision.is_granted() {
				return Ok(ExitCode::FAILURE);
			}
		}
		// Handled before the engine exists.
		Command::Migrate | Command::Version => {}
	}
	Ok(ExitCode::SUCCESS)
}

async fn user(engine: &AccessEngine, command: UserCommand) -> Result<()> {
	match command {
		UserCommand::Create { id, info } => {
			let info = info
				.as_deref()
				.map(serde_json::from_str)
				.transpose()
				.context("--info is not valid JSON")?;
			let id = id.map(SubjectId::new);
			print_json(&engine.create_user(id.as_ref(), info).await?)
		}
		UserCommand::Show { id } => print_json(
			&engine
				.get_subject(&SubjectId::new(id), Some(SubjectKind::User))
				.await?,
		),
		UserCommand::Info { id } => print_json(&engine.user_info(&SubjectId::new(id)).await?),
	}
}

async fn group(engine: &AccessEngine, command: GroupCommand) -> Result<()> {
	match command {
		GroupCommand::Create { json } => {
			let input: GroupInput = from_json(&json)?;
			print_json(&engine.create_group(&input).await?)
		}
		GroupCommand::Show { id } => print_json(
			&engine
				.get_subject(&SubjectId::new(id), Some(SubjectKind::Group))
				.await?,
		),
		GroupCommand::AddMember { group, user } => print_json(
			&engine
				.add_member(&SubjectId::new(group), &SubjectId::new(user))
				.await?,
		),
		GroupCommand::RemoveMember { group, user } => print_json(
			&engine
				.remove_member(&SubjectId::new(group), &SubjectId::new(user))
				.await?,
		),
	}
}

async fn subject(engine: &AccessEngine, command: SubjectCommand) -> Result<()> {
	match command {
		SubjectCommand::Delete { id } => {
			engine.delete_subject(&SubjectId::new(id.as_str())).await?;
			eprintln!("deleted subject '{id}'");
			Ok(())
		}
		SubjectCommand::List { kind } => {
			let kind = kind.as_deref().map(str::parse::<SubjectKind>).transpose()?;
			print_json(&engine.list_subjects(kind).await?)
		}
	}
}

async fn permission_set(engine: &AccessEngine, command: PermissionSetCommand) -> Result<()> {
	match command {
		PermissionSetCommand::Create { json } => {
			let input: PermissionSetInput = from_json(&json)?;
			print_json(&engine.create_permission_set(&input).await?)
		}
		PermissionSetCommand::Show { name } => print_json(&engine.get_permission_set(&name).await?),
		PermissionSetCommand::List => print_json(&engine.list_permission_sets().await?),
		PermissionSetCommand::Update { name, json } => {
			let update: PermissionSetUpdate = from_json(&json)?;
			print_json(&engine.update_permission_set(&name, &update).await?)
		}
		PermissionSetCommand::Delete { name } => {
			engine.delete_permission_set(&name).await?;
			eprintln!("deleted permission set '{name}'");
			Ok(())
		}
	}
}

async fn object(engine: &AccessEngine, command: ObjectCommand) -> Result<()> {
	match command {
		ObjectCommand::Create { json } => {
			let input: ObjectInput = from_json(&json)?;
			print_json(&engine.create_object(&input).await?)
		}
		ObjectCommand::Show { id } => print_json(&engine.get_object(&ObjectId::new(id)).await?),
		ObjectCommand::List => print_json(&engine.list_objects().await?),
		ObjectCommand::Update { id, json } => {
			let update: ObjectUpdate = from_json(&json)?;
			print_json(&engine.update_object(&ObjectId::new(id), &update).await?)
		}
		ObjectCommand::Delete { id } => {
			engine.delete_object(&ObjectId::new(id.as_str())).await?;
			eprintln!("deleted object '{id}'");
			Ok(())
		}
		ObjectCommand::Permissions { id } => print_json(
			&engine
				.effective_permissions_by_user(&ObjectId::new(id))
				.await?,
		),
	}
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
	println!("{rendered}");
	Ok(())
}
