// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Warden - access-control engine for objects, users and groups.
#[derive(Parser, Debug)]
#[command(name = "warden", about = "Warden access-control engine", version)]
pub struct Args {
	/// Config file (defaults to /etc/warden/warden.toml)
	#[arg(long, global = true, env = "WARDEN_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Apply database migrations and exit
	Migrate,

	/// Manage users
	User {
		#[command(subcommand)]
		command: UserCommand,
	},

	/// Manage groups and their members
	Group {
		#[command(subcommand)]
		command: GroupCommand,
	},

	/// Operations on any subject
	Subject {
		#[command(subcommand)]
		command: SubjectCommand,
	},

	/// Manage permission sets
	#[command(name = "permission-set")]
	PermissionSet {
		#[command(subcommand)]
		command: PermissionSetCommand,
	},

	/// Manage objects
	Object {
		#[command(subcommand)]
		command: ObjectCommand,
	},

	/// Grant permissions on an object to a subject token (u-<id> or g-<id>)
	Grant {
		object: String,
		subject: String,
		#[arg(required = true)]
		permissions: Vec<String>,
	},

	/// Revoke a permission on an object from a subject token
	Revoke {
		object: String,
		permission: String,
		subject: String,
	},

	/// Check whether a user holds every listed permission on an object
	Check {
		object: String,
		user: String,
		#[arg(required = true)]
		permissions: Vec<String>,
	},

	/// Show version and build information
	Version,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
	Create {
		#[arg(long)]
		id: Option<String>,
		/// Free-form JSON metadata
		#[arg(long)]
		info: Option<String>,
	},
	Show {
		id: String,
	},
	/// Groups and reachable objects of a user
	Info {
		id: String,
	},
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
	/// Create a group from a JSON record: {"id", "additional_info", "members"}
	Create {
		json: String,
	},
	Show {
		id: String,
	},
	AddMember {
		group: String,
		user: String,
	},
	RemoveMember {
		group: String,
		user: String,
	},
}

#[derive(Subcommand, Debug)]
pub enum SubjectCommand {
	Delete {
		id: String,
	},
	List {
		/// Only list `user` or `group` subjects
		#[arg(long)]
		kind: Option<String>,
	},
}

#[derive(Subcommand, Debug)]
pub enum PermissionSetCommand {
	/// Create from a JSON record: {"name", "additional_info", "permissions"}
	Create {
		json: String,
	},
	Show {
		name: String,
	},
	List,
	/// Update from a JSON record: {"additional_info", "permissions"}
	Update {
		name: String,
		json: String,
	},
	Delete {
		name: String,
	},
}

#[derive(Subcommand, Debug)]
pub enum ObjectCommand {
	/// Create from a JSON record: {"id", "name", "additional_info", "permission_sets", "acl"}
	Create {
		json: String,
	},
	Show {
		id: String,
	},
	List,
	/// Update from a JSON record: {"name", "additional_info", "permission_sets", "acl"}
	Update {
		id: String,
		json: String,
	},
	Delete {
		id: String,
	},
	/// Effective permissions per user
	Permissions {
		id: String,
	},
}
