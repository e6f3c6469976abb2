// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transaction boundary for multi-record writes.
//!
//! A flow receives a [`UnitOfWork`] by value, stages writes on it and hands
//! it back together with its result. Only then does the committer apply the
//! staged writes, all or nothing. Returning an error from the flow drops the
//! unit of work, so nothing it staged is ever written.

use std::future::Future;

use aegis_server_auth::{AnonymousPrincipal, AuthError, OAuthPrincipal, PasswordPrincipal, Principal, Session, User, UserId};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use crate::error::DbError;
use crate::principal::{insert_anonymous_principal, insert_oauth_principal, insert_password_principal, write_oauth_update};
use crate::session::insert_session;
use crate::user::{insert_user, write_login};

#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
	CreateUser(User),
	/// Sets `last_login_at` and `updated_at` only. Fails when the user has
	/// been disabled in the meantime.
	RecordLogin {
		user_id: UserId,
		at: DateTime<Utc>,
	},
	CreatePasswordPrincipal(PasswordPrincipal),
	CreateAnonymousPrincipal(AnonymousPrincipal),
	CreateOAuthPrincipal(OAuthPrincipal),
	UpdateOAuthPrincipal(OAuthPrincipal),
	CreateSession(Session),
}

/// Writes staged for one logical transaction, applied in staging order.
#[derive(Debug, Default)]
pub struct UnitOfWork {
	writes: Vec<StagedWrite>,
}

impl UnitOfWork {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn create_user(&mut self, user: User) {
		self.writes.push(StagedWrite::CreateUser(user));
	}

	pub fn record_login(&mut self, user_id: UserId, at: DateTime<Utc>) {
		self.writes.push(StagedWrite::RecordLogin { user_id, at });
	}

	pub fn create_principal(&mut self, principal: Principal) {
		self.writes.push(match principal {
			Principal::Password(p) => StagedWrite::CreatePasswordPrincipal(p),
			Principal::Anonymous(p) => StagedWrite::CreateAnonymousPrincipal(p),
			Principal::OAuth(p) => StagedWrite::CreateOAuthPrincipal(p),
		});
	}

	pub fn update_oauth_principal(&mut self, principal: OAuthPrincipal) {
		self.writes.push(StagedWrite::UpdateOAuthPrincipal(principal));
	}

	pub fn create_session(&mut self, session: Session) {
		self.writes.push(StagedWrite::CreateSession(session));
	}

	pub fn writes(&self) -> &[StagedWrite] {
		&self.writes
	}

	pub fn into_writes(self) -> Vec<StagedWrite> {
		self.writes
	}

	pub fn is_empty(&self) -> bool {
		self.writes.is_empty()
	}
}

#[async_trait]
pub trait TransactionCommitter: Send + Sync {
	/// Apply every staged write atomically.
	async fn commit(&self, unit: UnitOfWork) -> Result<(), DbError>;
}

/// Run `work` inside one transaction.
///
/// `work` gets a fresh [`UnitOfWork`] and must return it alongside its
/// result. The staged writes are committed only when `work` succeeds.
pub async fn run_in_transaction<C, F, Fut, T>(committer: &C, work: F) -> Result<T, AuthError>
where
	C: TransactionCommitter + ?Sized,
	F: FnOnce(UnitOfWork) -> Fut,
	Fut: Future<Output = Result<(UnitOfWork, T), AuthError>>,
{
	let (unit, value) = work(UnitOfWork::new()).await?;
	let staged = unit.writes().len();
	committer.commit(unit).await?;
	tracing::debug!(staged, "unit of work committed");
	Ok(value)
}

/// Commits a unit of work inside one SQLite transaction.
#[derive(Clone)]
pub struct SqliteCommitter {
	pool: SqlitePool,
}

impl SqliteCommitter {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl TransactionCommitter for SqliteCommitter {
	#[tracing::instrument(skip(self, unit), fields(staged = unit.writes().len()))]
	async fn commit(&self, unit: UnitOfWork) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		for write in unit.into_writes() {
			match &write {
				StagedWrite::CreateUser(user) => insert_user(&mut *tx, user).await?,
				StagedWrite::RecordLogin { user_id, at } => write_login(&mut *tx, user_id, *at).await?,
				StagedWrite::CreatePasswordPrincipal(p) => insert_password_principal(&mut tx, p).await?,
				StagedWrite::CreateAnonymousPrincipal(p) => insert_anonymous_principal(&mut tx, p).await?,
				StagedWrite::CreateOAuthPrincipal(p) => insert_oauth_principal(&mut tx, p).await?,
				StagedWrite::UpdateOAuthPrincipal(p) => write_oauth_update(&mut *tx, p).await?,
				StagedWrite::CreateSession(session) => insert_session(&mut *tx, session).await?,
			}
		}
		tx.commit().await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::principal::{PasswordPrincipalStore, PrincipalRepository};
	use crate::session::{SessionRepository, SessionStore};
	use crate::testing::create_migrated_pool;
	use crate::user::{UserRepository, UserStore};
	use aegis_common_secret::SecretString;
	use aegis_server_auth::{hash_token, Claims, PrincipalId, SessionId};
	use chrono::Utc;

	fn session_for(user: &User, principal_id: PrincipalId) -> Session {
		let now = Utc::now();
		Session {
			id: SessionId::generate(),
			user_id: user.id,
			principal_id,
			client_id: None,
			created_at: now,
			accessed_at: now,
			access_token_hash: SecretString::new(hash_token("secret")),
			access_token_created_at: now,
			refresh_token_hash: None,
			authenticator: None,
			ip_address: None,
			user_agent: None,
		}
	}

	fn password(user: &User, login_id: &str) -> PasswordPrincipal {
		PasswordPrincipal::new(user.id, "username", login_id, "default", "pw", Claims::new(), Utc::now()).unwrap()
	}

	#[tokio::test]
	async fn commits_all_staged_writes() {
		let pool = create_migrated_pool().await;
		let committer = SqliteCommitter::new(pool.clone());
		let user = User::new(Utc::now());
		let principal = password(&user, "jane");
		let session = session_for(&user, principal.id);

		let returned = run_in_transaction(&committer, |mut uow| {
			let (user, principal, session) = (user.clone(), principal.clone(), session.clone());
			async move {
				uow.create_user(user);
				uow.create_principal(principal.into());
				uow.create_session(session);
				Ok((uow, 7))
			}
		})
		.await
		.unwrap();
		assert_eq!(returned, 7);

		assert!(UserRepository::new(pool.clone()).get_user(&user.id).await.unwrap().is_some());
		assert!(PrincipalRepository::new(pool.clone())
			.get_password_principal(&principal.id)
			.await
			.unwrap()
			.is_some());
		assert!(SessionRepository::new(pool).get_session(&session.id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn failing_work_writes_nothing() {
		let pool = create_migrated_pool().await;
		let committer = SqliteCommitter::new(pool.clone());
		let user = User::new(Utc::now());

		let result: Result<(), AuthError> = run_in_transaction(&committer, |mut uow| {
			let user = user.clone();
			async move {
				uow.create_user(user);
				Err(AuthError::InvalidArgument("bail".to_string()))
			}
		})
		.await;
		assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
		assert!(UserRepository::new(pool).get_user(&user.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn login_for_disabled_user_rolls_back() {
		let pool = create_migrated_pool().await;
		let committer = SqliteCommitter::new(pool.clone());
		let users = UserRepository::new(pool.clone());
		let mut user = User::new(Utc::now());
		users.create_user(&user).await.unwrap();
		let principal = password(&user, "jane");
		let session = session_for(&user, principal.id);

		user.disabled = true;
		users.update_user(&user).await.unwrap();

		let result: Result<(), AuthError> = run_in_transaction(&committer, |mut uow| {
			let session = session.clone();
			let user_id = user.id;
			async move {
				uow.record_login(user_id, Utc::now());
				uow.create_session(session);
				Ok((uow, ()))
			}
		})
		.await;

		assert!(matches!(result, Err(AuthError::UserDisabled)));
		let stored = users.get_user(&user.id).await.unwrap().unwrap();
		assert!(stored.disabled);
		assert_eq!(stored.last_login_at, None);
		assert!(SessionRepository::new(pool).get_session(&session.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn conflict_rolls_back_earlier_writes() {
		let pool = create_migrated_pool().await;
		let committer = SqliteCommitter::new(pool.clone());
		let existing = User::new(Utc::now());
		UserRepository::new(pool.clone()).create_user(&existing).await.unwrap();
		PrincipalRepository::new(pool.clone())
			.create_password_principal(&password(&existing, "jane"))
			.await
			.unwrap();

		let user = User::new(Utc::now());
		let principal = password(&user, "jane");
		let session = session_for(&user, principal.id);
		let result: Result<(), AuthError> = run_in_transaction(&committer, |mut uow| {
			let (user, principal, session) = (user.clone(), principal.clone(), session.clone());
			async move {
				uow.create_user(user);
				uow.create_principal(principal.into());
				uow.create_session(session);
				Ok((uow, ()))
			}
		})
		.await;

		assert!(matches!(result, Err(AuthError::DuplicateUser)));
		assert!(UserRepository::new(pool.clone()).get_user(&user.id).await.unwrap().is_none());
		assert!(SessionRepository::new(pool).get_session(&session.id).await.unwrap().is_none());
	}
}
