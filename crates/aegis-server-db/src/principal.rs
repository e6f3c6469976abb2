// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Principal stores, one per login mechanism.
//!
//! Uniqueness enforced here:
//! - principal ids across all mechanisms (`principal_ids` table)
//! - `(login_id_key, login_id, realm)` among password principals
//! - `(provider, provider_user_id)` among OAuth principals
//!
//! Violations surface as [`DbError::Conflict`].

use aegis_common_secret::SecretString;
use aegis_server_auth::{AnonymousPrincipal, OAuthPrincipal, PasswordPrincipal, PrincipalId, PrincipalKind, UserId};
use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Executor, Row, SqliteConnection};

use crate::convert::{parse_id, parse_timestamp};
use crate::error::DbError;

#[async_trait]
pub trait PasswordPrincipalStore: Send + Sync {
	async fn create_password_principal(&self, principal: &PasswordPrincipal) -> Result<(), DbError>;
	async fn get_password_principal(&self, id: &PrincipalId) -> Result<Option<PasswordPrincipal>, DbError>;
	/// Password principals with the given login id in `realm`. `login_id_key`
	/// of `None` matches any key.
	async fn find_password_principals(
		&self,
		login_id_key: Option<&str>,
		login_id: &str,
		realm: &str,
	) -> Result<Vec<PasswordPrincipal>, DbError>;
	async fn list_password_principals_for_user(&self, user_id: &UserId) -> Result<Vec<PasswordPrincipal>, DbError>;
	async fn update_password_principal(&self, principal: &PasswordPrincipal) -> Result<(), DbError>;
}

#[async_trait]
pub trait AnonymousPrincipalStore: Send + Sync {
	async fn create_anonymous_principal(&self, principal: &AnonymousPrincipal) -> Result<(), DbError>;
	async fn get_anonymous_principal(&self, id: &PrincipalId) -> Result<Option<AnonymousPrincipal>, DbError>;
	async fn list_anonymous_principals_for_user(&self, user_id: &UserId) -> Result<Vec<AnonymousPrincipal>, DbError>;
}

#[async_trait]
pub trait OAuthPrincipalStore: Send + Sync {
	async fn create_oauth_principal(&self, principal: &OAuthPrincipal) -> Result<(), DbError>;
	async fn get_oauth_principal(&self, id: &PrincipalId) -> Result<Option<OAuthPrincipal>, DbError>;
	async fn find_oauth_principal(
		&self,
		provider: &str,
		provider_user_id: &str,
	) -> Result<Option<OAuthPrincipal>, DbError>;
	async fn list_oauth_principals_for_user(&self, user_id: &UserId) -> Result<Vec<OAuthPrincipal>, DbError>;
	async fn update_oauth_principal(&self, principal: &OAuthPrincipal) -> Result<(), DbError>;
}

/// SQLite-backed store for every principal mechanism.
#[derive(Clone)]
pub struct PrincipalRepository {
	pool: SqlitePool,
}

impl PrincipalRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl PasswordPrincipalStore for PrincipalRepository {
	#[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id, user_id = %principal.user_id))]
	async fn create_password_principal(&self, principal: &PasswordPrincipal) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		insert_password_principal(&mut tx, principal).await?;
		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(principal_id = %id))]
	async fn get_password_principal(&self, id: &PrincipalId) -> Result<Option<PasswordPrincipal>, DbError> {
		let row = sqlx::query(&format!("{PASSWORD_SELECT} WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_password_row).transpose()
	}

	#[tracing::instrument(skip(self, login_id))]
	async fn find_password_principals(
		&self,
		login_id_key: Option<&str>,
		login_id: &str,
		realm: &str,
	) -> Result<Vec<PasswordPrincipal>, DbError> {
		let rows = match login_id_key {
			Some(key) => {
				sqlx::query(&format!(
					"{PASSWORD_SELECT} WHERE login_id_key = ? AND login_id = ? AND realm = ? ORDER BY created_at, id"
				))
				.bind(key)
				.bind(login_id)
				.bind(realm)
				.fetch_all(&self.pool)
				.await?
			}
			None => {
				sqlx::query(&format!(
					"{PASSWORD_SELECT} WHERE login_id = ? AND realm = ? ORDER BY created_at, id"
				))
				.bind(login_id)
				.bind(realm)
				.fetch_all(&self.pool)
				.await?
			}
		};
		rows.iter().map(parse_password_row).collect()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	async fn list_password_principals_for_user(&self, user_id: &UserId) -> Result<Vec<PasswordPrincipal>, DbError> {
		let rows = sqlx::query(&format!("{PASSWORD_SELECT} WHERE user_id = ? ORDER BY created_at, id"))
			.bind(user_id.to_string())
			.fetch_all(&self.pool)
			.await?;
		rows.iter().map(parse_password_row).collect()
	}

	#[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
	async fn update_password_principal(&self, principal: &PasswordPrincipal) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE password_principals
			SET hashed_password = ?, claims = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(principal.hashed_password.expose().as_str())
		.bind(serde_json::to_string(&principal.claims)?)
		.bind(principal.updated_at.to_rfc3339())
		.bind(principal.id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("password principal {}", principal.id)));
		}
		tracing::debug!(principal_id = %principal.id, "password principal updated");
		Ok(())
	}
}

#[async_trait]
impl AnonymousPrincipalStore for PrincipalRepository {
	#[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id, user_id = %principal.user_id))]
	async fn create_anonymous_principal(&self, principal: &AnonymousPrincipal) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		insert_anonymous_principal(&mut tx, principal).await?;
		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(principal_id = %id))]
	async fn get_anonymous_principal(&self, id: &PrincipalId) -> Result<Option<AnonymousPrincipal>, DbError> {
		let row = sqlx::query("SELECT id, user_id, created_at FROM anonymous_principals WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_anonymous_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	async fn list_anonymous_principals_for_user(&self, user_id: &UserId) -> Result<Vec<AnonymousPrincipal>, DbError> {
		let rows = sqlx::query(
			"SELECT id, user_id, created_at FROM anonymous_principals WHERE user_id = ? ORDER BY created_at, id",
		)
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;
		rows.iter().map(parse_anonymous_row).collect()
	}
}

#[async_trait]
impl OAuthPrincipalStore for PrincipalRepository {
	#[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id, provider = %principal.provider))]
	async fn create_oauth_principal(&self, principal: &OAuthPrincipal) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		insert_oauth_principal(&mut tx, principal).await?;
		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(principal_id = %id))]
	async fn get_oauth_principal(&self, id: &PrincipalId) -> Result<Option<OAuthPrincipal>, DbError> {
		let row = sqlx::query(&format!("{OAUTH_SELECT} WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_oauth_row).transpose()
	}

	#[tracing::instrument(skip(self, provider_user_id))]
	async fn find_oauth_principal(
		&self,
		provider: &str,
		provider_user_id: &str,
	) -> Result<Option<OAuthPrincipal>, DbError> {
		let row = sqlx::query(&format!("{OAUTH_SELECT} WHERE provider = ? AND provider_user_id = ?"))
			.bind(provider)
			.bind(provider_user_id)
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_oauth_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	async fn list_oauth_principals_for_user(&self, user_id: &UserId) -> Result<Vec<OAuthPrincipal>, DbError> {
		let rows = sqlx::query(&format!("{OAUTH_SELECT} WHERE user_id = ? ORDER BY created_at, id"))
			.bind(user_id.to_string())
			.fetch_all(&self.pool)
			.await?;
		rows.iter().map(parse_oauth_row).collect()
	}

	#[tracing::instrument(skip(self, principal), fields(principal_id = %principal.id))]
	async fn update_oauth_principal(&self, principal: &OAuthPrincipal) -> Result<(), DbError> {
		write_oauth_update(&self.pool, principal).await
	}
}

const PASSWORD_SELECT: &str = r#"
	SELECT id, user_id, login_id_key, login_id, realm, hashed_password, claims, created_at, updated_at
	FROM password_principals
"#;

const OAUTH_SELECT: &str = r#"
	SELECT id, user_id, provider, provider_user_id, profile, claims, created_at, updated_at
	FROM oauth_principals
"#;

async fn register_principal_id(
	conn: &mut SqliteConnection,
	id: &PrincipalId,
	kind: PrincipalKind,
) -> Result<(), DbError> {
	sqlx::query("INSERT INTO principal_ids (id, kind) VALUES (?, ?)")
		.bind(id.to_string())
		.bind(kind.to_string())
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "principal id"))?;
	Ok(())
}

pub(crate) async fn insert_password_principal(
	conn: &mut SqliteConnection,
	principal: &PasswordPrincipal,
) -> Result<(), DbError> {
	register_principal_id(conn, &principal.id, PrincipalKind::Password).await?;
	sqlx::query(
		r#"
		INSERT INTO password_principals (
			id, user_id, login_id_key, login_id, realm, hashed_password, claims, created_at, updated_at
		) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(principal.id.to_string())
	.bind(principal.user_id.to_string())
	.bind(&principal.login_id_key)
	.bind(&principal.login_id)
	.bind(&principal.realm)
	// hashed_password is never logged
	.bind(principal.hashed_password.expose().as_str())
	.bind(serde_json::to_string(&principal.claims)?)
	.bind(principal.created_at.to_rfc3339())
	.bind(principal.updated_at.to_rfc3339())
	.execute(&mut *conn)
	.await
	.map_err(|e| DbError::from_insert(e, "login id"))?;

	tracing::debug!(principal_id = %principal.id, user_id = %principal.user_id, "password principal created");
	Ok(())
}

pub(crate) async fn insert_anonymous_principal(
	conn: &mut SqliteConnection,
	principal: &AnonymousPrincipal,
) -> Result<(), DbError> {
	register_principal_id(conn, &principal.id, PrincipalKind::Anonymous).await?;
	sqlx::query("INSERT INTO anonymous_principals (id, user_id, created_at) VALUES (?, ?, ?)")
		.bind(principal.id.to_string())
		.bind(principal.user_id.to_string())
		.bind(principal.created_at.to_rfc3339())
		.execute(&mut *conn)
		.await
		.map_err(|e| DbError::from_insert(e, "principal id"))?;

	tracing::debug!(principal_id = %principal.id, user_id = %principal.user_id, "anonymous principal created");
	Ok(())
}

pub(crate) async fn insert_oauth_principal(
	conn: &mut SqliteConnection,
	principal: &OAuthPrincipal,
) -> Result<(), DbError> {
	register_principal_id(conn, &principal.id, PrincipalKind::OAuth).await?;
	sqlx::query(
		r#"
		INSERT INTO oauth_principals (
			id, user_id, provider, provider_user_id, profile, claims, created_at, updated_at
		) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(principal.id.to_string())
	.bind(principal.user_id.to_string())
	.bind(&principal.provider)
	.bind(&principal.provider_user_id)
	.bind(serde_json::to_string(&principal.profile)?)
	.bind(serde_json::to_string(&principal.claims)?)
	.bind(principal.created_at.to_rfc3339())
	.bind(principal.updated_at.to_rfc3339())
	.execute(&mut *conn)
	.await
	.map_err(|e| DbError::from_insert(e, "provider user id"))?;

	tracing::debug!(principal_id = %principal.id, provider = %principal.provider, "oauth principal created");
	Ok(())
}

pub(crate) async fn write_oauth_update<'e, E>(executor: E, principal: &OAuthPrincipal) -> Result<(), DbError>
where
	E: Executor<'e, Database = Sqlite>,
{
	let result = sqlx::query(
		r#"
		UPDATE oauth_principals
		SET profile = ?, claims = ?, updated_at = ?
		WHERE id = ?
		"#,
	)
	.bind(serde_json::to_string(&principal.profile)?)
	.bind(serde_json::to_string(&principal.claims)?)
	.bind(principal.updated_at.to_rfc3339())
	.bind(principal.id.to_string())
	.execute(executor)
	.await?;

	if result.rows_affected() == 0 {
		return Err(DbError::NotFound(format!("oauth principal {}", principal.id)));
	}
	tracing::debug!(principal_id = %principal.id, "oauth principal updated");
	Ok(())
}

fn parse_password_row(row: &SqliteRow) -> Result<PasswordPrincipal, DbError> {
	let id: String = row.try_get("id")?;
	let user_id: String = row.try_get("user_id")?;
	let hashed_password: String = row.try_get("hashed_password")?;
	let claims: String = row.try_get("claims")?;
	let created_at: String = row.try_get("created_at")?;
	let updated_at: String = row.try_get("updated_at")?;

	Ok(PasswordPrincipal {
		id: parse_id(&id, "principal id")?,
		user_id: parse_id(&user_id, "user id")?,
		login_id_key: row.try_get("login_id_key")?,
		login_id: row.try_get("login_id")?,
		realm: row.try_get("realm")?,
		hashed_password: SecretString::new(hashed_password),
		claims: serde_json::from_str(&claims)?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

fn parse_anonymous_row(row: &SqliteRow) -> Result<AnonymousPrincipal, DbError> {
	let id: String = row.try_get("id")?;
	let user_id: String = row.try_get("user_id")?;
	let created_at: String = row.try_get("created_at")?;

	Ok(AnonymousPrincipal {
		id: parse_id(&id, "principal id")?,
		user_id: parse_id(&user_id, "user id")?,
		created_at: parse_timestamp(&created_at, "created_at")?,
	})
}

fn parse_oauth_row(row: &SqliteRow) -> Result<OAuthPrincipal, DbError> {
	let id: String = row.try_get("id")?;
	let user_id: String = row.try_get("user_id")?;
	let profile: String = row.try_get("profile")?;
	let claims: String = row.try_get("claims")?;
	let created_at: String = row.try_get("created_at")?;
	let updated_at: String = row.try_get("updated_at")?;

	Ok(OAuthPrincipal {
		id: parse_id(&id, "principal id")?,
		user_id: parse_id(&user_id, "user id")?,
		provider: row.try_get("provider")?,
		provider_user_id: row.try_get("provider_user_id")?,
		profile: serde_json::from_str(&profile)?,
		claims: serde_json::from_str(&claims)?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}
