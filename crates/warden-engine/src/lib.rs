// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access resolution engine for Warden.
//!
//! [`AccessEngine`] coordinates the identity, catalog, object and ACL stores
//! from `warden-db`:
//!
//! - **Grants**: `grant_permission`, `grant_permissions`, `revoke_permission`
//! - **Checks**: `check_access`, which fails closed, and
//!   `effective_permissions_by_user`
//! - **Objects**: creation with ACL seeding, rebinding and cascade deletion
//! - **Catalog** and **identity** management
//!
//! Mutations run in one transaction each and are retried on conflict
//! according to [`RetryConfig`].

mod catalog;
mod check;
mod engine;
mod grant;
mod identity;
mod objects;
pub mod retry;

pub use check::AccessDecision;
pub use engine::AccessEngine;
pub use retry::{retry, RetryConfig, RetryableError};
