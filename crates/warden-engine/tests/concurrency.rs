// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Concurrent writers against a file-backed database.

use std::time::Duration;

use warden_core::{ObjectId, ObjectInput, PermissionSetInput, SubjectId};
use warden_db::{create_pool, run_migrations, AclRepository};
use warden_engine::{AccessDecision, AccessEngine, RetryConfig};

const WRITERS: usize = 8;

async fn file_engine(dir: &tempfile::TempDir) -> AccessEngine {
	let url = format!("sqlite:{}", dir.path().join("warden.db").display());
	let pool = create_pool(&url, WRITERS as u32).await.unwrap();
	run_migrations(&pool).await.unwrap();

	AccessEngine::new(
		pool,
		RetryConfig {
			max_attempts: 50,
			base_delay: Duration::from_millis(2),
			max_delay: Duration::from_millis(50),
			backoff_factor: 2.0,
			jitter: true,
		},
	)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_grants_share_one_entry() {
	let dir = tempfile::tempdir().unwrap();
	let engine = file_engine(&dir).await;

	engine
		.create_permission_set(&PermissionSetInput {
			name: Some("app_space".to_string()),
			additional_info: None,
			permissions: vec!["read".to_string()],
		})
		.await
		.unwrap();
	engine
		.create_object(&ObjectInput {
			id: Some(ObjectId::new("www")),
			permission_sets: vec!["app_space".to_string()],
			..ObjectInput::default()
		})
		.await
		.unwrap();

	let mut handles = Vec::new();
	for i in 0..WRITERS {
		let engine = engine.clone();
		handles.push(tokio::spawn(async move {
			engine
				.grant_permission(&ObjectId::new("www"), "read", &format!("u-user{i}"))
				.await
		}));
	}
	for handle in handles {
		handle.await.unwrap().unwrap();
	}

	let www = ObjectId::new("www");
	let view = engine.get_object(&www).await.unwrap();
	assert_eq!(view.acl["read"].len(), WRITERS);

	let mut conn = engine.pool().acquire().await.unwrap();
	let aces = AclRepository::new(&mut conn).aces_for_object(&www).await.unwrap();
	assert_eq!(aces.len(), 1);
	drop(conn);

	for i in 0..WRITERS {
		let decision = engine
			.check_access(&www, &SubjectId::new(format!("user{i}")), &["read".to_string()])
			.await;
		assert_eq!(decision, AccessDecision::Granted);
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn checks_run_alongside_writers() {
	let dir = tempfile::tempdir().unwrap();
	let engine = file_engine(&dir).await;

	engine
		.create_permission_set(&PermissionSetInput {
			name: Some("docs".to_string()),
			additional_info: None,
			permissions: vec!["read".to_string()],
		})
		.await
		.unwrap();
	let mut acl = std::collections::BTreeMap::new();
	acl.insert("read".to_string(), vec!["u-reader".to_string()]);
	engine
		.create_object(&ObjectInput {
			id: Some(ObjectId::new("doc")),
			permission_sets: vec!["docs".to_string()],
			acl,
			..ObjectInput::default()
		})
		.await
		.unwrap();

	let writer = {
		let engine = engine.clone();
		tokio::spawn(async move {
			for i in 0..20 {
				engine
					.grant_permission(&ObjectId::new("doc"), "read", &format!("w{i}"))
					.await
					.unwrap();
			}
		})
	};

	for _ in 0..20 {
		let decision = engine
			.check_access(
				&ObjectId::new("doc"),
				&SubjectId::new("reader"),
				&["read".to_string()],
			)
			.await;
		assert_eq!(decision, AccessDecision::Granted);
	}

	writer.await.unwrap();
	let view = engine.get_object(&ObjectId::new("doc")).await.unwrap();
	assert_eq!(view.acl["read"].len(), 21);
}
