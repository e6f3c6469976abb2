// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session lifecycle: create, look up, touch, refresh, invalidate, list.
//!
//! # Security Model
//!
//! - The full token `<session-id>.<secret>` is returned once, at create or
//!   refresh, and is unrecoverable afterwards
//! - Only SHA-256 digests of secrets are persisted
//! - [`SessionProvider::get_by_token`] reports an unknown id, a wrong secret
//!   and a malformed token as the same [`AuthError::SessionNotFound`]
//! - Refresh overwrites the stored digest; the previous token stops working
//!   immediately

use std::sync::Arc;

use aegis_common_secret::SecretString;
use aegis_server_auth::{
	format_token, hash_token, parse_token, AuthError, AuthenticatorInfo, MfaOptions, PrincipalId, Session,
	SessionContext, SessionId, SessionTokenKind, SessionTokens, UserId,
};
use aegis_server_db::{SessionChange, SessionStore, UnitOfWork};

use crate::clock::Clock;
use crate::generator::TokenGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionProviderConfig {
	/// Issue a refresh token alongside the access token.
	pub refresh_token_enabled: bool,
}

pub struct SessionProvider {
	store: Arc<dyn SessionStore>,
	clock: Arc<dyn Clock>,
	generator: Arc<dyn TokenGenerator>,
	config: SessionProviderConfig,
}

impl SessionProvider {
	pub fn new(
		store: Arc<dyn SessionStore>,
		clock: Arc<dyn Clock>,
		generator: Arc<dyn TokenGenerator>,
		config: SessionProviderConfig,
	) -> Self {
		Self {
			store,
			clock,
			generator,
			config,
		}
	}

	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Build a new session and its tokens without persisting anything.
	pub fn issue(&self, user_id: UserId, principal_id: PrincipalId, context: SessionContext) -> (Session, SessionTokens) {
		let now = self.clock.now();
		let id = self.generator.session_id();
		let access_secret = self.generator.secret();
		let refresh_secret = self.config.refresh_token_enabled.then(|| self.generator.secret());

		let session = Session {
			id,
			user_id,
			principal_id,
			client_id: context.client_id,
			created_at: now,
			accessed_at: now,
			access_token_hash: SecretString::new(hash_token(&access_secret)),
			access_token_created_at: now,
			refresh_token_hash: refresh_secret.as_deref().map(|s| SecretString::new(hash_token(s))),
			authenticator: None,
			ip_address: context.ip_address,
			user_agent: context.user_agent,
		};
		let tokens = SessionTokens {
			access_token: format_token(&id, &access_secret),
			refresh_token: refresh_secret.as_deref().map(|s| format_token(&id, s)),
		};
		(session, tokens)
	}

	/// Issue a session and persist it immediately.
	#[tracing::instrument(skip(self, context), fields(user_id = %user_id, principal_id = %principal_id))]
	pub async fn create(
		&self,
		user_id: UserId,
		principal_id: PrincipalId,
		context: SessionContext,
	) -> Result<(Session, SessionTokens), AuthError> {
		let (session, tokens) = self.issue(user_id, principal_id, context);
		self.store.create_session(&session).await?;

		tracing::info!(session_id = %session.id, user_id = %user_id, "session created");
		Ok((session, tokens))
	}

	/// Issue a session and stage its creation on `unit`. It is persisted
	/// when the unit of work commits.
	pub fn create_in(
		&self,
		unit: &mut UnitOfWork,
		user_id: UserId,
		principal_id: PrincipalId,
		context: SessionContext,
	) -> (Session, SessionTokens) {
		let (session, tokens) = self.issue(user_id, principal_id, context);
		unit.create_session(session.clone());
		tracing::debug!(session_id = %session.id, user_id = %user_id, "session staged");
		(session, tokens)
	}

	#[tracing::instrument(skip(self, token))]
	pub async fn get_by_token(&self, token: &str, kind: SessionTokenKind) -> Result<Session, AuthError> {
		let Some((id, secret)) = parse_token(token) else {
			tracing::debug!("session token rejected");
			return Err(AuthError::SessionNotFound);
		};

		match self.store.get_session(&id).await? {
			Some(session) if session.verify_secret(secret, kind) => Ok(session),
			_ => {
				tracing::debug!("session token rejected");
				Err(AuthError::SessionNotFound)
			}
		}
	}

	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn get(&self, id: &SessionId) -> Result<Session, AuthError> {
		self.store.get_session(id).await?.ok_or(AuthError::SessionNotFound)
	}

	/// Record an authenticated request on the session. Succeeds even if the
	/// session was invalidated concurrently.
	#[tracing::instrument(skip(self, session), fields(session_id = %session.id))]
	pub async fn access(&self, session: &mut Session) -> Result<(), AuthError> {
		let accessed_at = self.clock.now();
		self.store
			.update_session(&session.id, &SessionChange::Accessed { accessed_at })
			.await?;
		session.accessed_at = accessed_at;
		Ok(())
	}

	/// Replace the access secret and return the new access token.
	#[tracing::instrument(skip(self, session), fields(session_id = %session.id))]
	pub async fn refresh(&self, session: &mut Session) -> Result<SecretString, AuthError> {
		let now = self.clock.now();
		let secret = self.generator.secret();
		let change = SessionChange::AccessToken {
			access_token_hash: SecretString::new(hash_token(&secret)),
			access_token_created_at: now,
		};

		if !self.store.update_session(&session.id, &change).await? {
			return Err(AuthError::SessionNotFound);
		}
		change.apply(session);

		tracing::info!(session_id = %session.id, "session access token refreshed");
		Ok(format_token(&session.id, &secret))
	}

	/// Delete the session. Unknown ids succeed.
	#[tracing::instrument(skip(self), fields(session_id = %id))]
	pub async fn invalidate(&self, id: &SessionId) -> Result<(), AuthError> {
		let deleted = self.store.delete_session(id).await?;
		tracing::info!(session_id = %id, deleted, "session invalidated");
		Ok(())
	}

	#[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
	pub async fn invalidate_batch(&self, ids: &[SessionId]) -> Result<(), AuthError> {
		let deleted = self.store.delete_sessions(ids).await?;
		tracing::info!(deleted, "sessions invalidated");
		Ok(())
	}

	/// Delete every session of `user_id` except `except`, typically the
	/// caller's current session.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn invalidate_all(&self, user_id: &UserId, except: Option<&SessionId>) -> Result<(), AuthError> {
		let deleted = self.store.delete_sessions_for_user(user_id, except).await?;
		tracing::info!(user_id = %user_id, deleted, "user sessions invalidated");
		Ok(())
	}

	/// Sessions of `user_id` ordered by creation time, then id.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list(&self, user_id: &UserId) -> Result<Vec<Session>, AuthError> {
		let mut sessions = self.store.list_sessions_for_user(user_id).await?;
		sessions.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
		Ok(sessions)
	}

	#[tracing::instrument(skip(self, session, options), fields(session_id = %session.id))]
	pub async fn update_mfa(&self, session: &mut Session, options: MfaOptions) -> Result<(), AuthError> {
		let info = AuthenticatorInfo {
			id: options.authenticator_id,
			kind: options.authenticator_type,
			oob_channel: options.oob_channel,
			updated_at: self.clock.now(),
		};
		self.apply_change(session, SessionChange::Authenticator(Some(info))).await
	}

	#[tracing::instrument(skip(self, session), fields(session_id = %session.id, principal_id = %principal_id))]
	pub async fn update_principal(&self, session: &mut Session, principal_id: PrincipalId) -> Result<(), AuthError> {
		self.apply_change(session, SessionChange::Principal(principal_id)).await
	}

	async fn apply_change(&self, session: &mut Session, change: SessionChange) -> Result<(), AuthError> {
		if !self.store.update_session(&session.id, &change).await? {
			return Err(AuthError::SessionNotFound);
		}
		change.apply(session);
		tracing::debug!(session_id = %session.id, "session updated");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::MockClock;
	use crate::generator::{RandomTokenGenerator, SequentialTokenGenerator};
	use aegis_server_db::{MemoryStore, SessionRepository};
	use chrono::{DateTime, Duration, TimeZone, Utc};
	use proptest::prelude::*;

	fn t0() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()
	}

	struct Fixture {
		store: Arc<MemoryStore>,
		clock: Arc<MockClock>,
		provider: SessionProvider,
	}

	fn fixture_with(config: SessionProviderConfig) -> Fixture {
		let store = Arc::new(MemoryStore::new());
		let clock = Arc::new(MockClock::new(t0()));
		let provider = SessionProvider::new(
			store.clone(),
			clock.clone(),
			Arc::new(RandomTokenGenerator::default()),
			config,
		);
		Fixture { store, clock, provider }
	}

	fn fixture() -> Fixture {
		fixture_with(SessionProviderConfig::default())
	}

	fn ids() -> (UserId, PrincipalId) {
		(UserId::generate(), PrincipalId::generate())
	}

	mod create {
		use super::*;

		#[tokio::test]
		async fn returns_session_with_clock_timestamps() {
			let f = fixture();
			let (user, principal) = ids();
			let context = SessionContext::default().with_client_id("api-key-1").with_ip("10.0.0.1");
			let (session, tokens) = f.provider.create(user, principal, context).await.unwrap();

			assert_eq!(session.user_id, user);
			assert_eq!(session.principal_id, principal);
			assert_eq!(session.created_at, t0());
			assert_eq!(session.accessed_at, t0());
			assert_eq!(session.access_token_created_at, t0());
			assert_eq!(session.client_id.as_deref(), Some("api-key-1"));
			assert!(session.refresh_token_hash.is_none());
			assert!(tokens.refresh_token.is_none());
			assert!(tokens.access_token.expose().starts_with(&format!("{}.", session.id)));
		}

		#[tokio::test]
		async fn stores_digest_not_secret() {
			let f = fixture();
			let (user, principal) = ids();
			let (session, tokens) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			let (_, secret) = parse_token(tokens.access_token.expose()).unwrap();
			let stored = f.store.get_session(&session.id).await.unwrap().unwrap();
			assert!(!stored.access_token_hash.ct_eq(secret));
			assert!(stored.access_token_hash.ct_eq(hash_token(secret)));
		}

		#[tokio::test]
		async fn allows_many_sessions_per_principal() {
			let f = fixture();
			let (user, principal) = ids();
			let (a, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			let (b, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			assert_ne!(a.id, b.id);
			assert_eq!(f.store.session_count().await, 2);
		}

		#[tokio::test]
		async fn issues_refresh_token_when_enabled() {
			let f = fixture_with(SessionProviderConfig {
				refresh_token_enabled: true,
			});
			let (user, principal) = ids();
			let (session, tokens) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			let refresh = tokens.refresh_token.unwrap();

			let found = f
				.provider
				.get_by_token(refresh.expose(), SessionTokenKind::Refresh)
				.await
				.unwrap();
			assert_eq!(found.id, session.id);
			assert!(matches!(
				f.provider.get_by_token(refresh.expose(), SessionTokenKind::Access).await,
				Err(AuthError::SessionNotFound)
			));
		}

		#[tokio::test]
		async fn create_in_persists_only_on_commit() {
			use aegis_server_db::TransactionCommitter;

			let f = fixture();
			let (user, principal) = ids();
			let mut unit = UnitOfWork::new();
			let (session, tokens) = f.provider.create_in(&mut unit, user, principal, SessionContext::default());
			assert_eq!(f.store.session_count().await, 0);

			f.store.commit(unit).await.unwrap();
			let found = f
				.provider
				.get_by_token(tokens.access_token.expose(), SessionTokenKind::Access)
				.await
				.unwrap();
			assert_eq!(found, session);
		}

		#[tokio::test]
		async fn reused_session_id_is_store_error() {
			let store = Arc::new(MemoryStore::new());
			let generator = Arc::new(SequentialTokenGenerator::new());
			let provider = SessionProvider::new(
				store.clone(),
				Arc::new(MockClock::new(t0())),
				generator,
				SessionProviderConfig::default(),
			);
			let (user, principal) = ids();
			let (first, _) = provider.create(user, principal, SessionContext::default()).await.unwrap();

			let replay = SessionProvider::new(
				store.clone(),
				Arc::new(MockClock::new(t0())),
				Arc::new(SequentialTokenGenerator::new()),
				SessionProviderConfig::default(),
			);
			let err = replay.create(user, principal, SessionContext::default()).await.unwrap_err();
			assert!(matches!(err, AuthError::Store(_)));
			assert_eq!(store.get_session(&first.id).await.unwrap(), Some(first));
		}
	}

	mod get_by_token {
		use super::*;

		#[tokio::test]
		async fn returns_created_snapshot() {
			let f = fixture();
			let (user, principal) = ids();
			let (session, tokens) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			f.clock.advance_seconds(30);
			let found = f
				.provider
				.get_by_token(tokens.access_token.expose(), SessionTokenKind::Access)
				.await
				.unwrap();
			assert_eq!(found, session);
		}

		#[tokio::test]
		async fn rejects_unknown_wrong_and_malformed_alike() {
			let f = fixture();
			let (user, principal) = ids();
			let (session, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			let unknown = format!("{}.{}", SessionId::generate(), "a".repeat(64));
			let wrong = format!("{}.incorrect-token", session.id);
			for token in [unknown.as_str(), wrong.as_str(), "invalid-token", "", "."] {
				let err = f
					.provider
					.get_by_token(token, SessionTokenKind::Access)
					.await
					.unwrap_err();
				assert!(matches!(err, AuthError::SessionNotFound), "token {token:?}");
			}
		}

		#[tokio::test]
		async fn get_by_id_reports_missing_session() {
			let f = fixture();
			assert!(matches!(
				f.provider.get(&SessionId::generate()).await,
				Err(AuthError::SessionNotFound)
			));
		}
	}

	mod access {
		use super::*;

		#[tokio::test]
		async fn updates_accessed_at_only() {
			let f = fixture();
			let (user, principal) = ids();
			let (mut session, tokens) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			f.clock.advance_seconds(100);
			f.provider.access(&mut session).await.unwrap();
			assert_eq!(session.accessed_at, t0() + Duration::seconds(100));
			assert_eq!(session.created_at, t0());

			let found = f
				.provider
				.get_by_token(tokens.access_token.expose(), SessionTokenKind::Access)
				.await
				.unwrap();
			assert_eq!(found, session);
		}

		#[tokio::test]
		async fn succeeds_after_invalidation() {
			let f = fixture();
			let (user, principal) = ids();
			let (mut session, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			f.provider.invalidate(&session.id).await.unwrap();
			f.provider.access(&mut session).await.unwrap();
			assert_eq!(f.store.session_count().await, 0);
		}
	}

	mod refresh {
		use super::*;

		#[tokio::test]
		async fn old_token_stops_working() {
			let f = fixture();
			let (user, principal) = ids();
			let (mut session, tokens) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			f.clock.advance_seconds(60);
			let new_token = f.provider.refresh(&mut session).await.unwrap();

			assert!(matches!(
				f.provider
					.get_by_token(tokens.access_token.expose(), SessionTokenKind::Access)
					.await,
				Err(AuthError::SessionNotFound)
			));
			let found = f
				.provider
				.get_by_token(new_token.expose(), SessionTokenKind::Access)
				.await
				.unwrap();
			assert_eq!(found.id, session.id);
			assert_eq!(found.access_token_created_at, t0() + Duration::seconds(60));
			assert_eq!(found.created_at, t0());
		}

		#[tokio::test]
		async fn missing_session_is_not_found() {
			let f = fixture();
			let (user, principal) = ids();
			let (mut session, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			f.provider.invalidate(&session.id).await.unwrap();
			assert!(matches!(
				f.provider.refresh(&mut session).await,
				Err(AuthError::SessionNotFound)
			));
		}
	}

	mod invalidate {
		use super::*;

		#[tokio::test]
		async fn twice_succeeds_and_leaves_nothing() {
			let f = fixture();
			let (user, principal) = ids();
			let (session, tokens) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			f.provider.invalidate(&session.id).await.unwrap();
			f.provider.invalidate(&session.id).await.unwrap();
			assert_eq!(f.store.session_count().await, 0);
			assert!(f
				.provider
				.get_by_token(tokens.access_token.expose(), SessionTokenKind::Access)
				.await
				.is_err());
		}

		#[tokio::test]
		async fn unknown_id_leaves_others() {
			let f = fixture();
			let (user, principal) = ids();
			f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			f.provider.invalidate(&SessionId::generate()).await.unwrap();
			assert_eq!(f.store.session_count().await, 1);
		}

		#[tokio::test]
		async fn batch_ignores_unknown_ids() {
			let f = fixture();
			let (user, principal) = ids();
			let (a, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			let (b, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			f.provider
				.invalidate_batch(&[a.id, SessionId::generate(), a.id])
				.await
				.unwrap();
			assert_eq!(f.provider.list(&user).await.unwrap(), vec![b]);
		}

		#[tokio::test]
		async fn all_keeps_current_session_and_other_users() {
			let f = fixture();
			let (user, principal) = ids();
			let (other_user, other_principal) = ids();
			let (current, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			let (other, _) = f
				.provider
				.create(other_user, other_principal, SessionContext::default())
				.await
				.unwrap();

			f.provider.invalidate_all(&user, Some(&current.id)).await.unwrap();
			assert_eq!(f.provider.list(&user).await.unwrap(), vec![current]);
			assert_eq!(f.provider.list(&other_user).await.unwrap(), vec![other]);

			f.provider.invalidate_all(&user, None).await.unwrap();
			assert!(f.provider.list(&user).await.unwrap().is_empty());
		}
	}

	mod list {
		use super::*;

		#[tokio::test]
		async fn orders_by_creation_then_id() {
			let f = fixture();
			let (user, principal) = ids();
			let mut created = Vec::new();
			for step in [30, 0, 0, 10, 0] {
				f.clock.advance_seconds(step);
				let (session, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
				created.push(session);
			}
			created.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

			let first = f.provider.list(&user).await.unwrap();
			let second = f.provider.list(&user).await.unwrap();
			assert_eq!(first, created);
			assert_eq!(first, second);
		}

		#[tokio::test]
		async fn sqlite_store_gives_same_order() {
			let pool = aegis_server_db::testing::create_migrated_pool().await;
			let clock = Arc::new(MockClock::new(t0()));
			let provider = SessionProvider::new(
				Arc::new(SessionRepository::new(pool)),
				clock.clone(),
				Arc::new(RandomTokenGenerator::default()),
				SessionProviderConfig::default(),
			);
			let (user, principal) = ids();
			let (late, _) = {
				clock.advance_seconds(50);
				provider.create(user, principal, SessionContext::default()).await.unwrap()
			};
			clock.set(t0());
			let (early, _) = provider.create(user, principal, SessionContext::default()).await.unwrap();

			assert_eq!(provider.list(&user).await.unwrap(), vec![early, late]);
		}
	}

	mod mutators {
		use super::*;

		#[tokio::test]
		async fn update_mfa_records_authenticator() {
			let f = fixture();
			let (user, principal) = ids();
			let (mut session, tokens) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			f.clock.advance_seconds(5);
			f.provider
				.update_mfa(
					&mut session,
					MfaOptions {
						authenticator_id: "oob-1".to_string(),
						authenticator_type: "oob".to_string(),
						oob_channel: Some("sms".to_string()),
					},
				)
				.await
				.unwrap();

			let found = f
				.provider
				.get_by_token(tokens.access_token.expose(), SessionTokenKind::Access)
				.await
				.unwrap();
			let info = found.authenticator.unwrap();
			assert_eq!(info.kind, "oob");
			assert_eq!(info.oob_channel.as_deref(), Some("sms"));
			assert_eq!(info.updated_at, t0() + Duration::seconds(5));
			assert_eq!(found.accessed_at, t0());
		}

		#[tokio::test]
		async fn update_principal_rebinds_session() {
			let f = fixture();
			let (user, principal) = ids();
			let (mut session, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

			let linked = PrincipalId::generate();
			f.provider.update_principal(&mut session, linked).await.unwrap();
			assert_eq!(session.principal_id, linked);
			assert_eq!(f.provider.get(&session.id).await.unwrap().principal_id, linked);
		}

		#[tokio::test]
		async fn mutators_on_missing_session_fail() {
			let f = fixture();
			let (user, principal) = ids();
			let (mut session, _) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();
			f.provider.invalidate(&session.id).await.unwrap();
			assert!(matches!(
				f.provider.update_principal(&mut session, PrincipalId::generate()).await,
				Err(AuthError::SessionNotFound)
			));
		}
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(32))]

		#[test]
		fn prop_mutated_secret_is_session_not_found(idx in 0usize..64, replacement in "[0-9a-f]") {
			let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
			runtime.block_on(async {
				let f = fixture();
				let (user, principal) = ids();
				let (session, tokens) = f.provider.create(user, principal, SessionContext::default()).await.unwrap();

				let (_, secret) = parse_token(tokens.access_token.expose()).unwrap();
				let mut mutated: Vec<char> = secret.chars().collect();
				let replacement = replacement.chars().next().unwrap();
				prop_assume!(mutated[idx] != replacement);
				mutated[idx] = replacement;
				let token = format!("{}.{}", session.id, mutated.into_iter().collect::<String>());

				let result = f.provider.get_by_token(&token, SessionTokenKind::Access).await;
				prop_assert!(matches!(result, Err(AuthError::SessionNotFound)));
				Ok(())
			})?;
		}
	}
}
