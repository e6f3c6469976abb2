// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use aegis_server_auth::{AuthError, Claims, Principal, PrincipalId, PrincipalKind, User, UserId};
use aegis_server_db::{AnonymousPrincipalStore, OAuthPrincipalStore, PasswordPrincipalStore, UserStore};

/// Resolves principal references without callers special-casing mechanisms.
#[derive(Clone)]
pub struct IdentityProvider {
	users: Arc<dyn UserStore>,
	password: Arc<dyn PasswordPrincipalStore>,
	anonymous: Arc<dyn AnonymousPrincipalStore>,
	oauth: Arc<dyn OAuthPrincipalStore>,
}

impl IdentityProvider {
	pub fn new(
		users: Arc<dyn UserStore>,
		password: Arc<dyn PasswordPrincipalStore>,
		anonymous: Arc<dyn AnonymousPrincipalStore>,
		oauth: Arc<dyn OAuthPrincipalStore>,
	) -> Self {
		Self {
			users,
			password,
			anonymous,
			oauth,
		}
	}

	/// Use one store for users and every principal mechanism.
	pub fn from_store<S>(store: Arc<S>) -> Self
	where
		S: UserStore + PasswordPrincipalStore + AnonymousPrincipalStore + OAuthPrincipalStore + 'static,
	{
		Self::new(store.clone(), store.clone(), store.clone(), store)
	}

	pub fn users(&self) -> &Arc<dyn UserStore> {
		&self.users
	}

	pub fn password_principals(&self) -> &Arc<dyn PasswordPrincipalStore> {
		&self.password
	}

	pub fn oauth_principals(&self) -> &Arc<dyn OAuthPrincipalStore> {
		&self.oauth
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, AuthError> {
		Ok(self.users.get_user(id).await?)
	}

	/// Load a principal of any mechanism.
	///
	/// Returns [`AuthError::PrincipalNotFound`] if no mechanism's store has it.
	#[tracing::instrument(skip(self), fields(principal_id = %id))]
	pub async fn get_principal(&self, id: &PrincipalId) -> Result<Principal, AuthError> {
		for kind in PrincipalKind::ALL {
			if let Some(principal) = self.get_principal_of_kind(kind, id).await? {
				return Ok(principal);
			}
		}
		Err(AuthError::PrincipalNotFound(*id))
	}

	async fn get_principal_of_kind(&self, kind: PrincipalKind, id: &PrincipalId) -> Result<Option<Principal>, AuthError> {
		let principal = match kind {
			PrincipalKind::Password => self.password.get_password_principal(id).await?.map(Principal::from),
			PrincipalKind::Anonymous => self.anonymous.get_anonymous_principal(id).await?.map(Principal::from),
			PrincipalKind::OAuth => self.oauth.get_oauth_principal(id).await?.map(Principal::from),
		};
		Ok(principal)
	}

	/// Every principal of `user_id`, oldest first.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_principals_for_user(&self, user_id: &UserId) -> Result<Vec<Principal>, AuthError> {
		let mut principals = Vec::new();
		for kind in PrincipalKind::ALL {
			match kind {
				PrincipalKind::Password => principals.extend(
					self.password
						.list_password_principals_for_user(user_id)
						.await?
						.into_iter()
						.map(Principal::from),
				),
				PrincipalKind::Anonymous => principals.extend(
					self.anonymous
						.list_anonymous_principals_for_user(user_id)
						.await?
						.into_iter()
						.map(Principal::from),
				),
				PrincipalKind::OAuth => principals.extend(
					self.oauth
						.list_oauth_principals_for_user(user_id)
						.await?
						.into_iter()
						.map(Principal::from),
				),
			}
		}
		principals.sort_by(|a, b| (a.created_at(), a.id()).cmp(&(b.created_at(), b.id())));
		Ok(principals)
	}

	/// Claims of all principals of `user_id` merged; newer principals win.
	pub async fn claims_for_user(&self, user_id: &UserId) -> Result<Claims, AuthError> {
		let mut claims = Claims::new();
		for principal in self.list_principals_for_user(user_id).await? {
			claims.extend(principal.claims());
		}
		Ok(claims)
	}
}
