// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Object store.
//!
//! Objects and their ordered bindings to permission sets. The first bound set
//! is the object's type in representations.

use chrono::Utc;
use sqlx::{sqlite::SqliteConnection, Row};
use warden_core::{Object, ObjectId, PermissionSet, PermissionSetId};

use crate::codec::{decode_info, encode_info, parse_timestamp};
use crate::error::DbError;
use crate::permission_set::row_to_permission_set;

pub struct ObjectRepository<'c> {
	conn: &'c mut SqliteConnection,
}

impl<'c> ObjectRepository<'c> {
	pub fn new(conn: &'c mut SqliteConnection) -> Self {
		Self { conn }
	}

	/// Insert a new object row.
	///
	/// # Errors
	/// Returns `DbError::InvalidArgument` if the id is already in use.
	#[tracing::instrument(skip(self, object), fields(object_id = %object.id))]
	pub async fn create_object(&mut self, object: &Object) -> Result<(), DbError> {
		if self.get_object(&object.id).await?.is_some() {
			return Err(DbError::InvalidArgument(format!(
				"object id '{}' is already in use",
				object.id
			)));
		}

		sqlx::query(
			r#"
			INSERT INTO objects (id, name, additional_info, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(object.id.as_str())
		.bind(&object.name)
		.bind(encode_info(&object.additional_info)?)
		.bind(object.created_at.to_rfc3339())
		.bind(object.updated_at.to_rfc3339())
		.execute(&mut *self.conn)
		.await
		.map_err(|e| DbError::from_write(e, "object"))?;

		tracing::debug!(object_id = %object.id, "object created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(object_id = %id))]
	pub async fn get_object(&mut self, id: &ObjectId) -> Result<Option<Object>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, additional_info, created_at, updated_at
			FROM objects
			WHERE id = ?
			"#,
		)
		.bind(id.as_str())
		.fetch_optional(&mut *self.conn)
		.await?;

		row.map(|r| row_to_object(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_objects(&mut self) -> Result<Vec<Object>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, additional_info, created_at, updated_at
			FROM objects
			ORDER BY id ASC
			"#,
		)
		.fetch_all(&mut *self.conn)
		.await?;

		rows.iter().map(row_to_object).collect()
	}

	/// Persist `name` and `additional_info`, stamping `updated_at`.
	#[tracing::instrument(skip(self, object), fields(object_id = %object.id))]
	pub async fn update_object(&mut self, object: &Object) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE objects
			SET name = ?, additional_info = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&object.name)
		.bind(encode_info(&object.additional_info)?)
		.bind(Utc::now().to_rfc3339())
		.bind(object.id.as_str())
		.execute(&mut *self.conn)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("object '{}'", object.id)));
		}
		Ok(())
	}

	// =========================================================================
	// Permission set bindings
	// =========================================================================

	/// Stamp `updated_at` after a change that does not rewrite the row, such as
	/// an ACL edit.
	#[tracing::instrument(skip(self), fields(object_id = %id))]
	pub async fn touch(&mut self, id: &ObjectId) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE objects SET updated_at = ? WHERE id = ?")
			.bind(Utc::now().to_rfc3339())
			.bind(id.as_str())
			.execute(&mut *self.conn)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("object '{id}'")));
		}
		Ok(())
	}

	/// Bind permission sets to an object, after any already bound.
	///
	/// Sets that are already bound keep their position.
	#[tracing::instrument(skip(self, set_ids), fields(object_id = %object_id, count = set_ids.len()))]
	pub async fn bind_permission_sets(
		&mut self,
		object_id: &ObjectId,
		set_ids: &[PermissionSetId],
	) -> Result<(), DbError> {
		for set_id in set_ids {
			sqlx::query(
				r#"
				INSERT INTO object_permission_sets (object_id, permission_set_id, position)
				VALUES (?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM object_permission_sets WHERE object_id = ?))
				ON CONFLICT (object_id, permission_set_id) DO NOTHING
				"#,
			)
			.bind(object_id.as_str())
			.bind(set_id.to_string())
			.bind(object_id.as_str())
			.execute(&mut *self.conn)
			.await
			.map_err(|e| DbError::from_write(e, "permission set binding"))?;
		}
		Ok(())
	}

	/// Permission sets bound to an object, in binding order.
	#[tracing::instrument(skip(self), fields(object_id = %object_id))]
	pub async fn bound_permission_sets(
		&mut self,
		object_id: &ObjectId,
	) -> Result<Vec<PermissionSet>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT s.id, s.name, s.additional_info, s.created_at, s.updated_at
			FROM object_permission_sets b
			INNER JOIN permission_sets s ON s.id = b.permission_set_id
			WHERE b.object_id = ?
			ORDER BY b.position ASC
			"#,
		)
		.bind(object_id.as_str())
		.fetch_all(&mut *self.conn)
		.await?;

		rows.iter().map(row_to_permission_set).collect()
	}

	/// Detach every permission set from an object.
	#[tracing::instrument(skip(self), fields(object_id = %object_id))]
	pub async fn unbind_permission_sets(&mut self, object_id: &ObjectId) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM object_permission_sets WHERE object_id = ?")
			.bind(object_id.as_str())
			.execute(&mut *self.conn)
			.await?;
		Ok(result.rows_affected())
	}

	/// Number of objects bound to a permission set.
	#[tracing::instrument(skip(self), fields(set_id = %set_id))]
	pub async fn count_bound_objects(&mut self, set_id: &PermissionSetId) -> Result<i64, DbError> {
		let count: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM object_permission_sets WHERE permission_set_id = ?",
		)
		.bind(set_id.to_string())
		.fetch_one(&mut *self.conn)
		.await?;
		Ok(count)
	}

	/// Delete the object row. Bindings and ACEs must already be gone.
	#[tracing::instrument(skip(self), fields(object_id = %id))]
	pub async fn delete_object(&mut self, id: &ObjectId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM objects WHERE id = ?")
			.bind(id.as_str())
			.execute(&mut *self.conn)
			.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::debug!(object_id = %id, "object deleted");
		}
		Ok(removed)
	}
}

fn row_to_object(row: &sqlx::sqlite::SqliteRow) -> Result<Object, DbError> {
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Object {
		id: ObjectId::new(row.get::<String, _>("id")),
		name: row.get("name"),
		additional_info: decode_info(row.get("additional_info"))?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::permission_set::PermissionSetRepository;
	use crate::testing::create_test_pool;
	use serde_json::json;

	#[tokio::test]
	async fn test_create_get_and_update_object() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let mut repo = ObjectRepository::new(&mut conn);

		let mut object = Object::new(
			ObjectId::new("www"),
			Some("website".to_string()),
			Some(json!({"region": "eu"})),
		);
		repo.create_object(&object).await.unwrap();

		object.name = Some("renamed".to_string());
		object.additional_info = None;
		repo.update_object(&object).await.unwrap();

		let fetched = repo.get_object(&object.id).await.unwrap().unwrap();
		assert_eq!(fetched.name.as_deref(), Some("renamed"));
		assert_eq!(fetched.additional_info, None);
	}

	#[tokio::test]
	async fn test_duplicate_object_id_is_rejected() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let mut repo = ObjectRepository::new(&mut conn);

		let object = Object::new(ObjectId::new("dup"), None, None);
		repo.create_object(&object).await.unwrap();
		let err = repo.create_object(&object).await.unwrap_err();
		assert!(matches!(err, DbError::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn test_update_missing_object_is_not_found() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let mut repo = ObjectRepository::new(&mut conn);

		let err = repo
			.update_object(&Object::new(ObjectId::new("ghost"), None, None))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}

	#[tokio::test]
	async fn test_bindings_keep_order_and_count() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		let first = PermissionSet::new("first", None);
		let second = PermissionSet::new("second", None);
		{
			let mut sets = PermissionSetRepository::new(&mut conn);
			sets.create_permission_set(&second, &[]).await.unwrap();
			sets.create_permission_set(&first, &[]).await.unwrap();
		}

		let mut repo = ObjectRepository::new(&mut conn);
		let object = Object::new(ObjectId::new("o"), None, None);
		repo.create_object(&object).await.unwrap();
		repo.bind_permission_sets(&object.id, &[first.id, second.id, first.id])
			.await
			.unwrap();

		let bound: Vec<_> = repo
			.bound_permission_sets(&object.id)
			.await
			.unwrap()
			.into_iter()
			.map(|s| s.name)
			.collect();
		assert_eq!(bound, vec!["first", "second"]);
		assert_eq!(repo.count_bound_objects(&first.id).await.unwrap(), 1);

		assert_eq!(repo.unbind_permission_sets(&object.id).await.unwrap(), 2);
		assert_eq!(repo.count_bound_objects(&first.id).await.unwrap(), 0);
		assert!(repo.delete_object(&object.id).await.unwrap());
		assert!(repo.get_object(&object.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_list_objects_sorted_by_id() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let mut repo = ObjectRepository::new(&mut conn);

		for id in ["b", "a", "c"] {
			repo.create_object(&Object::new(ObjectId::new(id), None, None))
				.await
				.unwrap();
		}

		let ids: Vec<_> = repo
			.list_objects()
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.id.into_inner())
			.collect();
		assert_eq!(ids, vec!["a", "b", "c"]);
	}

	#[tokio::test]
	async fn test_touch_advances_updated_at() {
		let pool = create_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let mut repo = ObjectRepository::new(&mut conn);

		let object = Object::new(ObjectId::new("www"), None, None);
		repo.create_object(&object).await.unwrap();
		tokio::time::sleep(std::time::Duration::from_millis(5)).await;
		repo.touch(&object.id).await.unwrap();

		let fetched = repo.get_object(&object.id).await.unwrap().unwrap();
		assert!(fetched.updated_at > fetched.created_at);

		let err = repo.touch(&ObjectId::new("ghost")).await.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}
}
