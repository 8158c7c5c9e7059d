// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for Warden.
//!
//! Each repository borrows a [`sqlx::SqliteConnection`], so the engine can
//! open one transaction and hand `&mut *tx` to every store it touches.

pub mod acl;
mod codec;
pub mod error;
pub mod object;
pub mod permission_set;
pub mod pool;
pub mod subject;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use acl::{AclRepository, GrantedAce};
pub use error::{DbError, Result};
pub use object::ObjectRepository;
pub use permission_set::PermissionSetRepository;
pub use pool::{create_pool, run_migrations};
pub use subject::SubjectRepository;
