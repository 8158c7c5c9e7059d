// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core access-control model for Warden.
//!
//! This crate holds the plain value records shared by the storage layer and the
//! resolution engine:
//!
//! - **Identities**: [`Subject`] (users and groups) and [`Membership`] edges
//! - **Catalog**: [`PermissionSet`] and the [`Permission`]s it owns
//! - **Objects**: protected [`Object`]s and their [`AccessControlEntry`] rows
//! - **Tokens**: [`SubjectToken`], the `u-`/`g-` prefixed form callers use
//! - **Representations**: the serialized views returned to adapters
//! - **Inputs**: structured records accepted by mutating operations
//!
//! Nothing here touches storage.

pub mod error;
pub mod input;
pub mod object;
pub mod permission;
pub mod subject;
pub mod token;
pub mod types;
pub mod view;

pub use error::{AccessError, Result};
pub use input::{GroupInput, ObjectInput, ObjectUpdate, PermissionSetInput, PermissionSetUpdate};
pub use object::{AccessControlEntry, Object};
pub use permission::{Permission, PermissionSet};
pub use subject::{Membership, Subject, SubjectKind};
pub use token::SubjectToken;
pub use types::{AceId, ObjectId, PermissionId, PermissionSetId, SubjectId};
pub use view::{Meta, ObjectView, PermissionSetView, SubjectView, UserInfo};
