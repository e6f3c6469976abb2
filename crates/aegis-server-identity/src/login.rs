// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_common_secret::SecretString;
use aegis_server_auth::{
	verify_unknown_password, AuthError, AuthEvent, SessionContext, SessionCreateReason, DEFAULT_REALM,
};
use aegis_server_db::run_in_transaction;
use aegis_server_session::Clock;
use serde::Deserialize;

use crate::response::AuthResponse;
use crate::services::AuthServices;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
	/// Restrict the lookup to one login-id key. `None` matches any key.
	#[serde(default)]
	pub login_id_key: Option<String>,
	pub login_id: String,
	#[serde(default = "default_realm")]
	pub realm: String,
	pub password: SecretString,
}

fn default_realm() -> String {
	DEFAULT_REALM.to_string()
}

impl LoginRequest {
	pub fn new(login_id: impl Into<String>, password: impl Into<String>) -> Self {
		Self {
			login_id_key: None,
			login_id: login_id.into(),
			realm: default_realm(),
			password: SecretString::new(password.into()),
		}
	}

	pub fn with_key(mut self, key: impl Into<String>) -> Self {
		self.login_id_key = Some(key.into());
		self
	}

	pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
		self.realm = realm.into();
		self
	}
}

/// Authenticates a password principal and opens a session for it.
pub struct PasswordLoginFlow {
	services: AuthServices,
}

impl PasswordLoginFlow {
	pub fn new(services: AuthServices) -> Self {
		Self { services }
	}

	/// Unknown login ids and wrong passwords both fail with
	/// [`AuthError::InvalidCredentials`].
	#[tracing::instrument(skip(self, request, context), fields(realm = %request.realm))]
	pub async fn login(&self, request: LoginRequest, context: SessionContext) -> Result<AuthResponse, AuthError> {
		let candidates = self
			.services
			.identities
			.password_principals()
			.find_password_principals(request.login_id_key.as_deref(), &request.login_id, &request.realm)
			.await?;

		let password = request.password.expose();
		if candidates.is_empty() {
			verify_unknown_password(password);
			tracing::debug!("password login rejected");
			return Err(AuthError::InvalidCredentials);
		}
		let Some(principal) = candidates.into_iter().find(|p| p.verify_password(password)) else {
			tracing::debug!("password login rejected");
			return Err(AuthError::InvalidCredentials);
		};

		let Some(user) = self.services.identities.get_user(&principal.user_id).await? else {
			tracing::warn!(principal_id = %principal.id, user_id = %principal.user_id, "principal without user");
			return Err(AuthError::InvalidCredentials);
		};
		if user.disabled {
			tracing::debug!(user_id = %user.id, "login for disabled user");
			return Err(AuthError::UserDisabled);
		}

		let sessions = &self.services.sessions;
		let now = sessions.clock().now();
		let user_id = user.id;
		let principal_id = principal.id;
		let (session, tokens) = run_in_transaction(self.services.committer.as_ref(), |mut unit| async move {
			unit.record_login(user_id, now);
			let issued = sessions.create_in(&mut unit, user_id, principal_id, context);
			Ok((unit, issued))
		})
		.await?;

		tracing::info!(user_id = %user_id, session_id = %session.id, "password login");
		self.services.events.notify(AuthEvent::SessionCreated {
			user_id,
			principal_id,
			session_id: session.id,
			reason: SessionCreateReason::Login,
		});
		Ok(AuthResponse::new(&session, tokens, principal.claims))
	}
}
