// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_server_auth::{User, UserId};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Executor, Row};

use crate::convert::{parse_id, parse_optional_timestamp, parse_timestamp};
use crate::error::DbError;

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn create_user(&self, user: &User) -> Result<(), DbError>;
	async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError>;
	async fn update_user(&self, user: &User) -> Result<(), DbError>;
}

#[async_trait]
impl UserStore for UserRepository {
	async fn create_user(&self, user: &User) -> Result<(), DbError> {
		self.create_user(user).await
	}

	async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError> {
		self.get_user(id).await
	}

	async fn update_user(&self, user: &User) -> Result<(), DbError> {
		self.update_user(user).await
	}
}

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
	pub async fn create_user(&self, user: &User) -> Result<(), DbError> {
		insert_user(&self.pool, user).await
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, created_at, updated_at, last_login_at, disabled
			FROM users
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_user_row).transpose()
	}

	#[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
	pub async fn update_user(&self, user: &User) -> Result<(), DbError> {
		write_user_update(&self.pool, user).await
	}
}

pub(crate) async fn insert_user<'e, E>(executor: E, user: &User) -> Result<(), DbError>
where
	E: Executor<'e, Database = Sqlite>,
{
	sqlx::query(
		r#"
		INSERT INTO users (id, created_at, updated_at, last_login_at, disabled)
		VALUES (?, ?, ?, ?, ?)
		"#,
	)
	.bind(user.id.to_string())
	.bind(user.created_at.to_rfc3339())
	.bind(user.updated_at.to_rfc3339())
	.bind(user.last_login_at.map(|t| t.to_rfc3339()))
	.bind(user.disabled)
	.execute(executor)
	.await
	.map_err(|e| DbError::from_insert(e, "user id"))?;

	tracing::debug!(user_id = %user.id, "user created");
	Ok(())
}

pub(crate) async fn write_user_update<'e, E>(executor: E, user: &User) -> Result<(), DbError>
where
	E: Executor<'e, Database = Sqlite>,
{
	let result = sqlx::query(
		r#"
		UPDATE users
		SET updated_at = ?, last_login_at = ?, disabled = ?
		WHERE id = ?
		"#,
	)
	.bind(user.updated_at.to_rfc3339())
	.bind(user.last_login_at.map(|t| t.to_rfc3339()))
	.bind(user.disabled)
	.bind(user.id.to_string())
	.execute(executor)
	.await?;

	if result.rows_affected() == 0 {
		return Err(DbError::NotFound(format!("user {}", user.id)));
	}

	tracing::debug!(user_id = %user.id, "user updated");
	Ok(())
}

/// Record a login without touching any other column of the user.
pub(crate) async fn write_login<'e, E>(executor: E, user_id: &UserId, at: DateTime<Utc>) -> Result<(), DbError>
where
	E: Executor<'e, Database = Sqlite>,
{
	let row = sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ? RETURNING disabled")
		.bind(at.to_rfc3339())
		.bind(at.to_rfc3339())
		.bind(user_id.to_string())
		.fetch_optional(executor)
		.await?;

	let Some(row) = row else {
		return Err(DbError::NotFound(format!("user {user_id}")));
	};
	let disabled: bool = row.try_get("disabled")?;
	if disabled {
		return Err(DbError::UserDisabled(format!("user {user_id}")));
	}

	tracing::debug!(user_id = %user_id, "login recorded");
	Ok(())
}

fn parse_user_row(row: &SqliteRow) -> Result<User, DbError> {
	let id: String = row.try_get("id")?;
	let created_at: String = row.try_get("created_at")?;
	let updated_at: String = row.try_get("updated_at")?;
	let last_login_at: Option<String> = row.try_get("last_login_at")?;

	Ok(User {
		id: parse_id(&id, "user id")?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
		last_login_at: parse_optional_timestamp(last_login_at, "last_login_at")?,
		disabled: row.try_get("disabled")?,
	})
}
