// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory implementation of every store and of the transaction
//! committer.
//!
//! Enforces the same uniqueness rules as the SQLite schema. A commit applies
//! its writes to a copy of the state and swaps it in only if every write
//! succeeded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use aegis_server_auth::{
	AnonymousPrincipal, OAuthPrincipal, PasswordPrincipal, PrincipalId, Session, SessionId, User, UserId,
};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::principal::{AnonymousPrincipalStore, OAuthPrincipalStore, PasswordPrincipalStore};
use crate::session::{SessionChange, SessionStore};
use crate::unit_of_work::{StagedWrite, TransactionCommitter, UnitOfWork};
use crate::user::UserStore;

#[derive(Debug, Default, Clone)]
struct MemoryState {
	users: HashMap<UserId, User>,
	password: HashMap<PrincipalId, PasswordPrincipal>,
	anonymous: HashMap<PrincipalId, AnonymousPrincipal>,
	oauth: HashMap<PrincipalId, OAuthPrincipal>,
	sessions: HashMap<SessionId, Session>,
}

impl MemoryState {
	fn principal_id_taken(&self, id: &PrincipalId) -> bool {
		self.password.contains_key(id) || self.anonymous.contains_key(id) || self.oauth.contains_key(id)
	}

	fn require_user(&self, id: &UserId) -> Result<(), DbError> {
		if self.users.contains_key(id) {
			Ok(())
		} else {
			Err(DbError::NotFound(format!("user {id}")))
		}
	}

	fn insert_password(&mut self, principal: PasswordPrincipal) -> Result<(), DbError> {
		self.require_user(&principal.user_id)?;
		if self.principal_id_taken(&principal.id) {
			return Err(DbError::Conflict("principal id".to_string()));
		}
		let taken = self.password.values().any(|p| {
			p.login_id_key == principal.login_id_key && p.login_id == principal.login_id && p.realm == principal.realm
		});
		if taken {
			return Err(DbError::Conflict("login id".to_string()));
		}
		self.password.insert(principal.id, principal);
		Ok(())
	}

	fn insert_anonymous(&mut self, principal: AnonymousPrincipal) -> Result<(), DbError> {
		self.require_user(&principal.user_id)?;
		if self.principal_id_taken(&principal.id) {
			return Err(DbError::Conflict("principal id".to_string()));
		}
		self.anonymous.insert(principal.id, principal);
		Ok(())
	}

	fn insert_oauth(&mut self, principal: OAuthPrincipal) -> Result<(), DbError> {
		self.require_user(&principal.user_id)?;
		if self.principal_id_taken(&principal.id) {
			return Err(DbError::Conflict("principal id".to_string()));
		}
		let taken = self
			.oauth
			.values()
			.any(|p| p.provider == principal.provider && p.provider_user_id == principal.provider_user_id);
		if taken {
			return Err(DbError::Conflict("provider user id".to_string()));
		}
		self.oauth.insert(principal.id, principal);
		Ok(())
	}

	fn insert_session(&mut self, session: Session) -> Result<(), DbError> {
		if self.sessions.contains_key(&session.id) {
			return Err(DbError::Internal(format!("session id {} already in use", session.id)));
		}
		self.sessions.insert(session.id, session);
		Ok(())
	}

	fn apply(&mut self, write: StagedWrite) -> Result<(), DbError> {
		match write {
			StagedWrite::CreateUser(user) => {
				if self.users.contains_key(&user.id) {
					return Err(DbError::Conflict("user id".to_string()));
				}
				self.users.insert(user.id, user);
			}
			StagedWrite::RecordLogin { user_id, at } => {
				let user = self
					.users
					.get_mut(&user_id)
					.ok_or_else(|| DbError::NotFound(format!("user {user_id}")))?;
				if user.disabled {
					return Err(DbError::UserDisabled(format!("user {user_id}")));
				}
				user.record_login(at);
			}
			StagedWrite::CreatePasswordPrincipal(p) => self.insert_password(p)?,
			StagedWrite::CreateAnonymousPrincipal(p) => self.insert_anonymous(p)?,
			StagedWrite::CreateOAuthPrincipal(p) => self.insert_oauth(p)?,
			StagedWrite::UpdateOAuthPrincipal(p) => {
				if !self.oauth.contains_key(&p.id) {
					return Err(DbError::NotFound(format!("oauth principal {}", p.id)));
				}
				self.oauth.insert(p.id, p);
			}
			StagedWrite::CreateSession(session) => self.insert_session(session)?,
		}
		Ok(())
	}
}

#[derive(Debug, Default)]
pub struct MemoryStore {
	state: RwLock<MemoryState>,
	fail_commits: AtomicBool,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make every following commit fail with a store error.
	pub fn fail_commits(&self, fail: bool) {
		self.fail_commits.store(fail, Ordering::SeqCst);
	}

	pub async fn user_count(&self) -> usize {
		self.state.read().await.users.len()
	}

	pub async fn principal_count(&self) -> usize {
		let state = self.state.read().await;
		state.password.len() + state.anonymous.len() + state.oauth.len()
	}

	pub async fn session_count(&self) -> usize {
		self.state.read().await.sessions.len()
	}
}

#[async_trait]
impl TransactionCommitter for MemoryStore {
	async fn commit(&self, unit: UnitOfWork) -> Result<(), DbError> {
		if self.fail_commits.load(Ordering::SeqCst) {
			return Err(DbError::Internal("store unavailable".to_string()));
		}

		let mut state = self.state.write().await;
		let mut next = state.clone();
		for write in unit.into_writes() {
			next.apply(write)?;
		}
		*state = next;
		Ok(())
	}
}

#[async_trait]
impl UserStore for MemoryStore {
	async fn create_user(&self, user: &User) -> Result<(), DbError> {
		self.state.write().await.apply(StagedWrite::CreateUser(user.clone()))
	}

	async fn get_user(&self, id: &UserId) -> Result<Option<User>, DbError> {
		Ok(self.state.read().await.users.get(id).cloned())
	}

	async fn update_user(&self, user: &User) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		state.require_user(&user.id)?;
		state.users.insert(user.id, user.clone());
		Ok(())
	}
}

#[async_trait]
impl PasswordPrincipalStore for MemoryStore {
	async fn create_password_principal(&self, principal: &PasswordPrincipal) -> Result<(), DbError> {
		self.state.write().await.insert_password(principal.clone())
	}

	async fn get_password_principal(&self, id: &PrincipalId) -> Result<Option<PasswordPrincipal>, DbError> {
		Ok(self.state.read().await.password.get(id).cloned())
	}

	async fn find_password_principals(
		&self,
		login_id_key: Option<&str>,
		login_id: &str,
		realm: &str,
	) -> Result<Vec<PasswordPrincipal>, DbError> {
		let state = self.state.read().await;
		let mut found: Vec<PasswordPrincipal> = state
			.password
			.values()
			.filter(|p| p.login_id == login_id && p.realm == realm)
			.filter(|p| login_id_key.map_or(true, |key| p.login_id_key == key))
			.cloned()
			.collect();
		found.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
		Ok(found)
	}

	async fn list_password_principals_for_user(&self, user_id: &UserId) -> Result<Vec<PasswordPrincipal>, DbError> {
		let state = self.state.read().await;
		let mut found: Vec<PasswordPrincipal> =
			state.password.values().filter(|p| &p.user_id == user_id).cloned().collect();
		found.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
		Ok(found)
	}

	async fn update_password_principal(&self, principal: &PasswordPrincipal) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		match state.password.get_mut(&principal.id) {
			Some(existing) => {
				existing.hashed_password = principal.hashed_password.clone();
				existing.claims = principal.claims.clone();
				existing.updated_at = principal.updated_at;
				Ok(())
			}
			None => Err(DbError::NotFound(format!("password principal {}", principal.id))),
		}
	}
}

#[async_trait]
impl AnonymousPrincipalStore for MemoryStore {
	async fn create_anonymous_principal(&self, principal: &AnonymousPrincipal) -> Result<(), DbError> {
		self.state.write().await.insert_anonymous(principal.clone())
	}

	async fn get_anonymous_principal(&self, id: &PrincipalId) -> Result<Option<AnonymousPrincipal>, DbError> {
		Ok(self.state.read().await.anonymous.get(id).cloned())
	}

	async fn list_anonymous_principals_for_user(&self, user_id: &UserId) -> Result<Vec<AnonymousPrincipal>, DbError> {
		let state = self.state.read().await;
		let mut found: Vec<AnonymousPrincipal> =
			state.anonymous.values().filter(|p| &p.user_id == user_id).cloned().collect();
		found.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
		Ok(found)
	}
}

#[async_trait]
impl OAuthPrincipalStore for MemoryStore {
	async fn create_oauth_principal(&self, principal: &OAuthPrincipal) -> Result<(), DbError> {
		self.state.write().await.insert_oauth(principal.clone())
	}

	async fn get_oauth_principal(&self, id: &PrincipalId) -> Result<Option<OAuthPrincipal>, DbError> {
		Ok(self.state.read().await.oauth.get(id).cloned())
	}

	async fn find_oauth_principal(
		&self,
		provider: &str,
		provider_user_id: &str,
	) -> Result<Option<OAuthPrincipal>, DbError> {
		let state = self.state.read().await;
		Ok(state
			.oauth
			.values()
			.find(|p| p.provider == provider && p.provider_user_id == provider_user_id)
			.cloned())
	}

	async fn list_oauth_principals_for_user(&self, user_id: &UserId) -> Result<Vec<OAuthPrincipal>, DbError> {
		let state = self.state.read().await;
		let mut found: Vec<OAuthPrincipal> = state.oauth.values().filter(|p| &p.user_id == user_id).cloned().collect();
		found.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
		Ok(found)
	}

	async fn update_oauth_principal(&self, principal: &OAuthPrincipal) -> Result<(), DbError> {
		self.state
			.write()
			.await
			.apply(StagedWrite::UpdateOAuthPrincipal(principal.clone()))
	}
}

#[async_trait]
impl SessionStore for MemoryStore {
	async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		self.state.write().await.insert_session(session.clone())
	}

	async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, DbError> {
		Ok(self.state.read().await.sessions.get(id).cloned())
	}

	async fn update_session(&self, id: &SessionId, change: &SessionChange) -> Result<bool, DbError> {
		let mut state = self.state.write().await;
		match state.sessions.get_mut(id) {
			Some(session) => {
				change.apply(session);
				Ok(true)
			}
			None => Ok(false),
		}
	}

	async fn delete_session(&self, id: &SessionId) -> Result<bool, DbError> {
		Ok(self.state.write().await.sessions.remove(id).is_some())
	}

	async fn delete_sessions(&self, ids: &[SessionId]) -> Result<u64, DbError> {
		let mut state = self.state.write().await;
		Ok(ids.iter().filter(|id| state.sessions.remove(*id).is_some()).count() as u64)
	}

	async fn delete_sessions_for_user(&self, user_id: &UserId, except: Option<&SessionId>) -> Result<u64, DbError> {
		let mut state = self.state.write().await;
		let before = state.sessions.len();
		state
			.sessions
			.retain(|id, s| &s.user_id != user_id || Some(id) == except);
		Ok((before - state.sessions.len()) as u64)
	}

	async fn list_sessions_for_user(&self, user_id: &UserId) -> Result<Vec<Session>, DbError> {
		let state = self.state.read().await;
		Ok(state.sessions.values().filter(|s| &s.user_id == user_id).cloned().collect())
	}
}
