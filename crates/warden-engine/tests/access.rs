// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use warden_core::{
	AccessError, GroupInput, ObjectId, ObjectInput, PermissionSetInput, SubjectId,
};
use warden_db::testing::create_test_pool;
use warden_db::AclRepository;
use warden_engine::{AccessDecision, AccessEngine, RetryConfig};

async fn engine() -> AccessEngine {
	AccessEngine::new(create_test_pool().await, RetryConfig::default())
}

fn strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|s| s.to_string()).collect()
}

async fn permission_set(engine: &AccessEngine, name: &str, permissions: &[&str]) {
	engine
		.create_permission_set(&PermissionSetInput {
			name: Some(name.to_string()),
			additional_info: None,
			permissions: strings(permissions),
		})
		.await
		.unwrap();
}

async fn group(engine: &AccessEngine, id: &str, members: &[&str]) {
	engine
		.create_group(&GroupInput {
			id: Some(SubjectId::new(id)),
			additional_info: None,
			members: members.iter().map(|m| SubjectId::new(*m)).collect(),
		})
		.await
		.unwrap();
}

/// `grants` holds `(permission, subject token)` pairs.
async fn object(engine: &AccessEngine, id: &str, sets: &[&str], grants: &[(&str, &str)]) {
	let mut acl: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for (permission, token) in grants {
		acl.entry(permission.to_string())
			.or_default()
			.push(token.to_string());
	}
	engine
		.create_object(&ObjectInput {
			id: Some(ObjectId::new(id)),
			name: Some(id.to_string()),
			additional_info: None,
			permission_sets: strings(sets),
			acl,
		})
		.await
		.unwrap();
}

async fn check(engine: &AccessEngine, object: &str, subject: &str, permissions: &[&str]) -> AccessDecision {
	engine
		.check_access(
			&ObjectId::new(object),
			&SubjectId::new(subject),
			&strings(permissions),
		)
		.await
}

/// The app_space scenario: A granted directly, B and C through group G.
async fn app_space() -> AccessEngine {
	let engine = engine().await;
	permission_set(&engine, "app_space", &["read", "write", "delete"]).await;
	group(&engine, "G", &["B", "C"]).await;
	object(&engine, "www", &["app_space"], &[("read", "u-A"), ("read", "g-G")]).await;
	engine
}

#[tokio::test]
async fn end_to_end_group_and_direct_grants() {
	let engine = app_space().await;

	for user in ["A", "B", "C"] {
		assert_eq!(check(&engine, "www", user, &["read"]).await, AccessDecision::Granted);
	}
	assert_eq!(check(&engine, "www", "D", &["read"]).await, AccessDecision::Denied);

	let view = engine.get_object(&ObjectId::new("www")).await.unwrap();
	assert_eq!(view.kind.as_deref(), Some("app_space"));
	assert_eq!(view.acl["read"], strings(&["g-G", "u-A"]));
	assert_eq!(view.meta.schema, "urn:warden:schemas:object");
}

#[tokio::test]
async fn check_is_conjunctive() {
	let engine = app_space().await;

	assert_eq!(check(&engine, "www", "A", &["read"]).await, AccessDecision::Granted);
	assert_eq!(
		check(&engine, "www", "A", &["read", "write"]).await,
		AccessDecision::Denied
	);

	engine
		.grant_permission(&ObjectId::new("www"), "write", "A")
		.await
		.unwrap();
	assert_eq!(
		check(&engine, "www", "A", &["read", "write"]).await,
		AccessDecision::Granted
	);
}

#[tokio::test]
async fn check_fails_closed() {
	let engine = app_space().await;

	assert_eq!(check(&engine, "www", "A", &[]).await, AccessDecision::Denied);
	assert_eq!(check(&engine, "www", "", &["read"]).await, AccessDecision::Denied);
	assert_eq!(check(&engine, "nope", "A", &["read"]).await, AccessDecision::Denied);
	assert_eq!(check(&engine, "www", "A", &["fly"]).await, AccessDecision::Denied);
	assert_eq!(check(&engine, "www", "A", &["Read"]).await, AccessDecision::Denied);
	// Defined and applicable, but granted to nobody.
	assert_eq!(check(&engine, "www", "A", &["delete"]).await, AccessDecision::Denied);
	// A group id is not a user.
	assert_eq!(check(&engine, "www", "G", &["read"]).await, AccessDecision::Denied);
}

#[tokio::test]
async fn repeated_permission_names_are_collapsed() {
	let engine = app_space().await;
	assert_eq!(
		check(&engine, "www", "B", &["read", "read"]).await,
		AccessDecision::Granted
	);
}

#[tokio::test]
async fn membership_changes_apply_immediately() {
	let engine = app_space().await;
	let g = SubjectId::new("G");

	engine.add_member(&g, &SubjectId::new("D")).await.unwrap();
	assert_eq!(check(&engine, "www", "D", &["read"]).await, AccessDecision::Granted);

	engine.remove_member(&g, &SubjectId::new("B")).await.unwrap();
	assert_eq!(check(&engine, "www", "B", &["read"]).await, AccessDecision::Denied);
}

#[tokio::test]
async fn granting_twice_matches_granting_once() {
	let engine = app_space().await;
	let www = ObjectId::new("www");

	let once = engine.grant_permission(&www, "write", "u-E").await.unwrap();
	let twice = engine.grant_permission(&www, "write", "u-E").await.unwrap();
	assert_eq!(once.acl, twice.acl);
	assert_eq!(twice.acl["write"], strings(&["u-E"]));
}

#[tokio::test]
async fn revoke_is_not_idempotent() {
	let engine = app_space().await;
	let www = ObjectId::new("www");

	let err = engine.revoke_permission(&www, "write", "A").await.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));

	let view = engine.revoke_permission(&www, "read", "u-A").await.unwrap();
	assert_eq!(view.acl["read"], strings(&["g-G"]));
	assert_eq!(check(&engine, "www", "A", &["read"]).await, AccessDecision::Denied);

	let err = engine.revoke_permission(&www, "read", "u-A").await.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));
}

#[tokio::test]
async fn revoking_last_subject_hides_permission_from_acl() {
	let engine = engine().await;
	permission_set(&engine, "docs", &["read"]).await;
	object(&engine, "doc", &["docs"], &[("read", "u-A")]).await;

	let view = engine
		.revoke_permission(&ObjectId::new("doc"), "read", "A")
		.await
		.unwrap();
	assert!(view.acl.is_empty());
}

#[tokio::test]
async fn grants_are_scoped_to_bound_permission_sets() {
	let engine = app_space().await;
	permission_set(&engine, "billing", &["pay"]).await;

	let err = engine
		.grant_permission(&ObjectId::new("www"), "pay", "A")
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));

	// The name exists globally, so the check reaches the ACL and denies there.
	assert_eq!(check(&engine, "www", "A", &["pay"]).await, AccessDecision::Denied);
}

#[tokio::test]
async fn batched_grant_is_all_or_nothing() {
	let engine = app_space().await;
	let www = ObjectId::new("www");

	let err = engine
		.grant_permissions(&www, &strings(&["write", "pay"]), "u-E")
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));
	assert_eq!(check(&engine, "www", "E", &["write"]).await, AccessDecision::Denied);

	engine
		.grant_permissions(&www, &strings(&["write", "delete"]), "u-E")
		.await
		.unwrap();
	assert_eq!(
		check(&engine, "www", "E", &["write", "delete"]).await,
		AccessDecision::Granted
	);
}

#[tokio::test]
async fn grant_errors_name_the_failing_part() {
	let engine = app_space().await;

	let err = engine
		.grant_permission(&ObjectId::new("missing"), "read", "A")
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));

	let err = engine
		.grant_permission(&ObjectId::new("www"), "read", "g-nobody")
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));

	let err = engine
		.grant_permission(&ObjectId::new("www"), "read", "u-G")
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));
}

#[tokio::test]
async fn delete_object_cascades() {
	let engine = app_space().await;
	let www = ObjectId::new("www");

	engine.delete_object(&www).await.unwrap();

	let err = engine.get_object(&www).await.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));

	let mut conn = engine.pool().acquire().await.unwrap();
	assert!(AclRepository::new(&mut conn)
		.aces_for_object(&www)
		.await
		.unwrap()
		.is_empty());
	drop(conn);

	let err = engine.delete_object(&www).await.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));

	// The set is no longer bound and can go.
	engine.delete_permission_set("app_space").await.unwrap();
}

#[tokio::test]
async fn effective_permissions_expand_groups() {
	let engine = app_space().await;
	let www = ObjectId::new("www");
	engine.grant_permission(&www, "write", "B").await.unwrap();
	engine.grant_permission(&www, "delete", "g-G").await.unwrap();

	let effective = engine.effective_permissions_by_user(&www).await.unwrap();

	let expected: BTreeMap<SubjectId, BTreeSet<String>> = [
		("A", vec!["read"]),
		("B", vec!["delete", "read", "write"]),
		("C", vec!["delete", "read"]),
	]
	.into_iter()
	.map(|(user, perms)| {
		(
			SubjectId::new(user),
			perms.into_iter().map(String::from).collect(),
		)
	})
	.collect();
	assert_eq!(effective, expected);

	let err = engine
		.effective_permissions_by_user(&ObjectId::new("nope"))
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));
}

#[tokio::test]
async fn create_object_rolls_back_on_bad_input() {
	let engine = engine().await;
	permission_set(&engine, "docs", &["read"]).await;

	let mut acl = BTreeMap::new();
	acl.insert("write".to_string(), strings(&["u-A"]));
	let err = engine
		.create_object(&ObjectInput {
			id: Some(ObjectId::new("doc")),
			name: None,
			additional_info: Some(json!({"k": "v"})),
			permission_sets: strings(&["docs"]),
			acl,
		})
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));
	assert!(engine.list_objects().await.unwrap().is_empty());

	let err = engine
		.create_object(&ObjectInput {
			permission_sets: strings(&["nope"]),
			..ObjectInput::default()
		})
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));
}

#[tokio::test]
async fn generated_object_ids_are_unique() {
	let engine = engine().await;
	let a = engine.create_object(&ObjectInput::default()).await.unwrap();
	let b = engine.create_object(&ObjectInput::default()).await.unwrap();
	assert_ne!(a.id, b.id);
	assert!(a.kind.is_none());
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
	let engine = app_space().await;

	let err = engine
		.create_object(&ObjectInput {
			id: Some(ObjectId::new("www")),
			..ObjectInput::default()
		})
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));

	let err = engine
		.create_user(Some(&SubjectId::new("G")), None)
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));
}

#[tokio::test]
async fn removing_granted_permission_from_set_is_rejected() {
	let engine = app_space().await;

	let err = engine
		.update_permission_set(
			"app_space",
			&warden_core::PermissionSetUpdate {
				additional_info: None,
				permissions: Some(strings(&["write", "delete"])),
			},
		)
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));

	// `delete` is granted to nobody, so it can go; `admin` is new.
	let view = engine
		.update_permission_set(
			"app_space",
			&warden_core::PermissionSetUpdate {
				additional_info: Some(json!({"owner": "web"})),
				permissions: Some(strings(&["read", "write", "admin"])),
			},
		)
		.await
		.unwrap();
	assert_eq!(view.permissions, strings(&["read", "write", "admin"]));
	assert_eq!(view.additional_info, Some(json!({"owner": "web"})));
}

#[tokio::test]
async fn bound_permission_set_cannot_be_deleted() {
	let engine = app_space().await;

	let err = engine.delete_permission_set("app_space").await.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));

	let err = engine.delete_permission_set("ghost").await.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));
}

#[tokio::test]
async fn rebinding_keeps_live_grants_inside_new_sets() {
	let engine = app_space().await;
	permission_set(&engine, "billing", &["pay"]).await;
	let www = ObjectId::new("www");

	let err = engine
		.update_object(
			&www,
			&warden_core::ObjectUpdate {
				permission_sets: Some(strings(&["billing"])),
				..Default::default()
			},
		)
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));

	let mut acl = BTreeMap::new();
	acl.insert("pay".to_string(), strings(&["u-A"]));
	let view = engine
		.update_object(
			&www,
			&warden_core::ObjectUpdate {
				name: Some("website".to_string()),
				permission_sets: Some(strings(&["app_space", "billing"])),
				acl,
				..Default::default()
			},
		)
		.await
		.unwrap();
	assert_eq!(view.name.as_deref(), Some("website"));
	assert_eq!(view.acl["pay"], strings(&["u-A"]));
	assert_eq!(check(&engine, "www", "A", &["read", "pay"]).await, AccessDecision::Granted);
}

#[tokio::test]
async fn user_info_lists_groups_and_reachable_objects() {
	let engine = app_space().await;
	permission_set(&engine, "docs", &["read"]).await;
	object(&engine, "doc", &["docs"], &[("read", "C")]).await;
	object(&engine, "private", &["docs"], &[]).await;

	let info = engine.user_info(&SubjectId::new("C")).await.unwrap();
	assert_eq!(info.groups, vec![SubjectId::new("G")]);
	assert_eq!(info.objects, vec![ObjectId::new("doc"), ObjectId::new("www")]);

	let err = engine.user_info(&SubjectId::new("G")).await.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));
}

#[tokio::test]
async fn deleting_subject_removes_its_grants() {
	let engine = app_space().await;

	engine.delete_subject(&SubjectId::new("G")).await.unwrap();

	let view = engine.get_object(&ObjectId::new("www")).await.unwrap();
	assert_eq!(view.acl["read"], strings(&["u-A"]));
	assert_eq!(check(&engine, "www", "B", &["read"]).await, AccessDecision::Denied);

	let err = engine.delete_subject(&SubjectId::new("G")).await.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));
}

#[tokio::test]
async fn group_view_lists_member_tokens() {
	let engine = app_space().await;

	let view = engine
		.get_subject(&SubjectId::new("G"), None)
		.await
		.unwrap();
	assert_eq!(view.members, strings(&["u-B", "u-C"]));
	assert_eq!(view.meta.schema, "urn:warden:schemas:group");

	let err = engine
		.remove_member(&SubjectId::new("G"), &SubjectId::new("A"))
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::NotFound(_)));

	let users = engine
		.list_subjects(Some(warden_core::SubjectKind::User))
		.await
		.unwrap();
	let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
	assert_eq!(ids, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn grant_stays_revocable_when_another_bound_set_gains_the_name() {
	let engine = engine().await;
	permission_set(&engine, "a", &[]).await;
	permission_set(&engine, "b", &["read"]).await;
	object(&engine, "www", &["a", "b"], &[]).await;
	let www = ObjectId::new("www");

	engine.grant_permission(&www, "read", "u-alice").await.unwrap();
	engine
		.update_permission_set(
			"a",
			&warden_core::PermissionSetUpdate {
				additional_info: None,
				permissions: Some(strings(&["read"])),
			},
		)
		.await
		.unwrap();

	let view = engine.get_object(&www).await.unwrap();
	assert_eq!(view.acl["read"], strings(&["u-alice"]));
	assert_eq!(check(&engine, "www", "alice", &["read"]).await, AccessDecision::Granted);

	let view = engine.revoke_permission(&www, "read", "u-alice").await.unwrap();
	assert!(view.acl.is_empty());
	assert_eq!(check(&engine, "www", "alice", &["read"]).await, AccessDecision::Denied);

	let err = engine
		.revoke_permission(&www, "read", "u-alice")
		.await
		.unwrap_err();
	assert!(matches!(err, AccessError::InvalidArgument(_)));
}

#[tokio::test]
async fn acl_changes_stamp_object_updated() {
	let engine = app_space().await;
	let www = ObjectId::new("www");
	let before = engine.get_object(&www).await.unwrap().meta.updated;

	tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	let granted = engine.grant_permission(&www, "write", "u-E").await.unwrap();
	assert!(granted.meta.updated > before);

	tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	let again = engine.grant_permission(&www, "write", "u-E").await.unwrap();
	assert_eq!(again.meta.updated, granted.meta.updated);

	tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	let revoked = engine.revoke_permission(&www, "write", "u-E").await.unwrap();
	assert!(revoked.meta.updated > granted.meta.updated);
}
