// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session store.
//!
//! Rows hold only token digests. Updates are narrow: each [`SessionChange`]
//! writes just the columns it names.

use aegis_common_secret::SecretString;
use aegis_server_auth::{AuthenticatorInfo, PrincipalId, Session, SessionId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Executor, QueryBuilder, Row};

use crate::convert::{parse_id, parse_optional_timestamp, parse_timestamp};
use crate::error::DbError;

/// A field-level mutation of a stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
	Accessed {
		accessed_at: DateTime<Utc>,
	},
	AccessToken {
		access_token_hash: SecretString,
		access_token_created_at: DateTime<Utc>,
	},
	Authenticator(Option<AuthenticatorInfo>),
	Principal(PrincipalId),
}

impl SessionChange {
	pub fn apply(&self, session: &mut Session) {
		match self {
			SessionChange::Accessed { accessed_at } => session.accessed_at = *accessed_at,
			SessionChange::AccessToken {
				access_token_hash,
				access_token_created_at,
			} => {
				session.access_token_hash = access_token_hash.clone();
				session.access_token_created_at = *access_token_created_at;
			}
			SessionChange::Authenticator(info) => session.authenticator = info.clone(),
			SessionChange::Principal(principal_id) => session.principal_id = *principal_id,
		}
	}
}

#[async_trait]
pub trait SessionStore: Send + Sync {
	/// Insert a new session. An id that is already stored is rejected, never
	/// overwritten.
	async fn create_session(&self, session: &Session) -> Result<(), DbError>;
	async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError>;
	/// Returns false when the session does not exist.
	async fn update_session(&self, id: &SessionId, change: &SessionChange) -> Result<bool, DbError>;
	/// Returns false when the session did not exist.
	async fn delete_session(&self, id: &SessionId) -> Result<bool, DbError>;
	async fn delete_sessions(&self, ids: &[SessionId]) -> Result<u64, DbError>;
	/// Delete every session of `user_id` except `except`.
	async fn delete_sessions_for_user(&self, user_id: &UserId, except: Option<&SessionId>) -> Result<u64, DbError>;
	/// Sessions of `user_id` in no particular order.
	async fn list_sessions_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, DbError>;
}

#[async_trait]
impl SessionStore for SessionRepository {
	async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		self.create_session(session).await
	}

	async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
		self.get_session(id).await
	}

	async fn update_session(&self, id: &SessionId, change: &SessionChange) -> Result<bool, DbError> {
		self.update_session(id, change).await
	}

	async fn delete_session(&self, id: &SessionId) -> Result<bool, DbError> {
		self.delete_session(id).await
	}

	async fn delete_sessions(&self, ids: &[SessionId]) -> Result<u64, DbError> {
		self.delete_sessions(ids).await
	}

	async fn delete_sessions_for_user(&self, user_id: &UserId, except: Option<&SessionId>) -> Result<u64, DbError> {
		self.delete_sessions_for_user(user_id, except).await
	}

	async fn list_sessions_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, DbError> {
		self.list_sessions_for_user(user_id).await
	}
}

/// Repository for session database operations.
///
/// All tokens are stored as hashes, never in plaintext.
#[derive(Clone)]
pub struct SessionRepository {
	pool: SqlitePool,
}

impl SessionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// # Errors
	/// Returns `DbError::Internal` if the session id is already stored.
	#[tracing::instrument(skip(self, session), fields(session_id = %session.id, user_id = %session.user_id))]
	pub async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		insert_session(&self.pool, session).await
	}

	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
		let row = sqlx::query(&format!("{SESSION_SELECT} WHERE id = ?"))
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_session_row).transpose()
	}

	#[tracing::instrument(skip(self, change), fields(session_id = %id))]
	pub async fn update_session(&self, id: &SessionId, change: &SessionChange) -> Result<bool, DbError> {
		let query = match change {
			SessionChange::Accessed { accessed_at } => sqlx::query("UPDATE sessions SET accessed_at = ? WHERE id = ?")
				.bind(accessed_at.to_rfc3339()),
			SessionChange::AccessToken {
				access_token_hash,
				access_token_created_at,
			} => sqlx::query("UPDATE sessions SET access_token_hash = ?, access_token_created_at = ? WHERE id = ?")
				.bind(access_token_hash.expose().clone())
				.bind(access_token_created_at.to_rfc3339()),
			SessionChange::Authenticator(info) => sqlx::query(
				r#"
				UPDATE sessions
				SET authenticator_id = ?, authenticator_type = ?, authenticator_oob_channel = ?, authenticator_updated_at = ?
				WHERE id = ?
				"#,
			)
			.bind(info.as_ref().map(|a| a.id.clone()))
			.bind(info.as_ref().map(|a| a.kind.clone()))
			.bind(info.as_ref().and_then(|a| a.oob_channel.clone()))
			.bind(info.as_ref().map(|a| a.updated_at.to_rfc3339())),
			SessionChange::Principal(principal_id) => {
				sqlx::query("UPDATE sessions SET principal_id = ? WHERE id = ?").bind(principal_id.to_string())
			}
		};

		let result = query.bind(id.to_string()).execute(&self.pool).await?;
		let updated = result.rows_affected() > 0;
		tracing::debug!(session_id = %id, updated, "session updated");
		Ok(updated)
	}

	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn delete_session(&self, id: &SessionId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		tracing::debug!(session_id = %id, deleted, "session deleted");
		Ok(deleted)
	}

	#[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
	pub async fn delete_sessions(&self, ids: &[SessionId]) -> Result<u64, DbError> {
		if ids.is_empty() {
			return Ok(0);
		}

		let mut deleted = 0;
		for chunk in ids.chunks(DELETE_BATCH_SIZE) {
			let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM sessions WHERE id IN (");
			let mut separated = builder.separated(", ");
			for id in chunk {
				separated.push_bind(id.to_string());
			}
			separated.push_unseparated(")");

			deleted += builder.build().execute(&self.pool).await?.rows_affected();
		}
		tracing::debug!(deleted, "sessions deleted");
		Ok(deleted)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn delete_sessions_for_user(&self, user_id: &UserId, except: Option<&SessionId>) -> Result<u64, DbError> {
		let result = match except {
			Some(keep) => {
				sqlx::query("DELETE FROM sessions WHERE user_id = ? AND id != ?")
					.bind(user_id.to_string())
					.bind(keep.to_string())
					.execute(&self.pool)
					.await?
			}
			None => {
				sqlx::query("DELETE FROM sessions WHERE user_id = ?")
					.bind(user_id.to_string())
					.execute(&self.pool)
					.await?
			}
		};

		tracing::debug!(user_id = %user_id, deleted = result.rows_affected(), "user sessions deleted");
		Ok(result.rows_affected())
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_sessions_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, DbError> {
		let rows = sqlx::query(&format!("{SESSION_SELECT} WHERE user_id = ?"))
			.bind(user_id.to_string())
			.fetch_all(&self.pool)
			.await?;
		rows.iter().map(parse_session_row).collect()
	}
}

/// Bound parameters per `DELETE ... IN (...)`, below SQLite's variable limit.
const DELETE_BATCH_SIZE: usize = 500;

const SESSION_SELECT: &str = r#"
	SELECT id, user_id, principal_id, client_id, created_at, accessed_at,
		   access_token_hash, access_token_created_at, refresh_token_hash,
		   authenticator_id, authenticator_type, authenticator_oob_channel, authenticator_updated_at,
		   ip_address, user_agent
	FROM sessions
"#;

pub(crate) async fn insert_session<'e, E>(executor: E, session: &Session) -> Result<(), DbError>
where
	E: Executor<'e, Database = Sqlite>,
{
	let authenticator = session.authenticator.as_ref();
	sqlx::query(
		r#"
		INSERT INTO sessions (
			id, user_id, principal_id, client_id, created_at, accessed_at,
			access_token_hash, access_token_created_at, refresh_token_hash,
			authenticator_id, authenticator_type, authenticator_oob_channel, authenticator_updated_at,
			ip_address, user_agent
		) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(session.id.to_string())
	.bind(session.user_id.to_string())
	.bind(session.principal_id.to_string())
	.bind(&session.client_id)
	.bind(session.created_at.to_rfc3339())
	.bind(session.accessed_at.to_rfc3339())
	// digest only, never the secret
	.bind(session.access_token_hash.expose().as_str())
	.bind(session.access_token_created_at.to_rfc3339())
	.bind(session.refresh_token_hash.as_ref().map(|h| h.expose().clone()))
	.bind(authenticator.map(|a| a.id.clone()))
	.bind(authenticator.map(|a| a.kind.clone()))
	.bind(authenticator.and_then(|a| a.oob_channel.clone()))
	.bind(authenticator.map(|a| a.updated_at.to_rfc3339()))
	.bind(&session.ip_address)
	.bind(&session.user_agent)
	.execute(executor)
	.await
	.map_err(|e| match DbError::from_insert(e, "session id") {
		DbError::Conflict(_) => DbError::Internal(format!("session id {} already in use", session.id)),
		other => other,
	})?;

	tracing::debug!(session_id = %session.id, user_id = %session.user_id, "session created");
	Ok(())
}

fn parse_session_row(row: &SqliteRow) -> Result<Session, DbError> {
	let id: String = row.try_get("id")?;
	let user_id: String = row.try_get("user_id")?;
	let principal_id: String = row.try_get("principal_id")?;
	let created_at: String = row.try_get("created_at")?;
	let accessed_at: String = row.try_get("accessed_at")?;
	let access_token_hash: String = row.try_get("access_token_hash")?;
	let access_token_created_at: String = row.try_get("access_token_created_at")?;
	let refresh_token_hash: Option<String> = row.try_get("refresh_token_hash")?;
	let authenticator_id: Option<String> = row.try_get("authenticator_id")?;
	let authenticator_type: Option<String> = row.try_get("authenticator_type")?;
	let authenticator_oob_channel: Option<String> = row.try_get("authenticator_oob_channel")?;
	let authenticator_updated_at: Option<String> = row.try_get("authenticator_updated_at")?;

	let authenticator = match (
		authenticator_id,
		authenticator_type,
		parse_optional_timestamp(authenticator_updated_at, "authenticator_updated_at")?,
	) {
		(Some(id), Some(kind), Some(updated_at)) => Some(AuthenticatorInfo {
			id,
			kind,
			oob_channel: authenticator_oob_channel,
			updated_at,
		}),
		_ => None,
	};

	Ok(Session {
		id: parse_id(&id, "session id")?,
		user_id: parse_id(&user_id, "user id")?,
		principal_id: parse_id(&principal_id, "principal id")?,
		client_id: row.try_get("client_id")?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		accessed_at: parse_timestamp(&accessed_at, "accessed_at")?,
		access_token_hash: SecretString::new(access_token_hash),
		access_token_created_at: parse_timestamp(&access_token_created_at, "access_token_created_at")?,
		refresh_token_hash: refresh_token_hash.map(SecretString::new),
		authenticator,
		ip_address: row.try_get("ip_address")?,
		user_agent: row.try_get("user_agent")?,
	})
}
