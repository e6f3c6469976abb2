// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User signup.
//!
//! A request with login ids and a password creates one password principal
//! per login id. A request with neither creates an anonymous principal.
//! The user, its principals and the first session commit together.

use std::collections::BTreeMap;

use aegis_common_secret::SecretString;
use aegis_server_auth::{
	AnonymousPrincipal, AuthError, AuthEvent, Claims, LoginIdChecker, PasswordPrincipal, Principal, PrincipalId,
	Session, SessionContext, SessionCreateReason, StandardClaim, User, DEFAULT_REALM,
};
use aegis_server_db::run_in_transaction;
use aegis_server_session::Clock;
use serde::Deserialize;

use crate::response::AuthResponse;
use crate::services::AuthServices;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
	#[serde(default)]
	pub login_ids: BTreeMap<String, String>,
	#[serde(default)]
	pub password: Option<SecretString>,
	#[serde(default = "default_realm")]
	pub realm: String,
}

fn default_realm() -> String {
	DEFAULT_REALM.to_string()
}

impl SignupRequest {
	pub fn anonymous() -> Self {
		Self {
			login_ids: BTreeMap::new(),
			password: None,
			realm: default_realm(),
		}
	}

	pub fn password(login_ids: BTreeMap<String, String>, password: impl Into<String>) -> Self {
		Self {
			login_ids,
			password: Some(SecretString::new(password.into())),
			realm: default_realm(),
		}
	}

	pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
		self.realm = realm.into();
		self
	}

	fn password_str(&self) -> &str {
		self.password.as_ref().map(|p| p.expose().as_str()).unwrap_or("")
	}
}

#[derive(Debug, Clone, Default)]
pub struct SignupConfig {
	pub login_ids: LoginIdChecker,
	/// Send a welcome email when the new user has an email claim.
	pub welcome_email_enabled: bool,
	/// Login-id keys that get a verification code right after signup.
	pub verify_code_keys: Vec<String>,
}

pub struct SignupFlow {
	services: AuthServices,
	config: SignupConfig,
}

impl SignupFlow {
	pub fn new(services: AuthServices, config: SignupConfig) -> Self {
		Self { services, config }
	}

	#[tracing::instrument(skip(self, request, context), fields(realm = %request.realm, login_id_keys = request.login_ids.len()))]
	pub async fn signup(&self, request: SignupRequest, context: SessionContext) -> Result<AuthResponse, AuthError> {
		let now = self.services.sessions.clock().now();
		let user = User::new(now);
		let principals = self.build_principals(&user, &request).await?;

		let first = principals_first(&principals)?;
		let sessions = &self.services.sessions;
		let staged_user = user.clone();
		let staged = principals.clone();
		let (session, tokens) = run_in_transaction(self.services.committer.as_ref(), |mut unit| async move {
			let user_id = staged_user.id;
			unit.create_user(staged_user);
			for principal in staged {
				unit.create_principal(principal);
			}
			let issued = sessions.create_in(&mut unit, user_id, first, context);
			Ok((unit, issued))
		})
		.await?;

		tracing::info!(user_id = %user.id, session_id = %session.id, principals = principals.len(), "user signed up");

		let claims = merged_claims(&principals);
		self.notify_created(&user, &principals, &session, &claims);
		Ok(AuthResponse::new(&session, tokens, claims))
	}

	async fn build_principals(&self, user: &User, request: &SignupRequest) -> Result<Vec<Principal>, AuthError> {
		let password = request.password_str();
		if request.login_ids.is_empty() && password.is_empty() {
			return Ok(vec![AnonymousPrincipal::new(user.id, user.created_at).into()]);
		}
		if request.login_ids.is_empty() {
			return Err(AuthError::InvalidArgument("login id is required".to_string()));
		}
		if request.realm.is_empty() {
			return Err(AuthError::InvalidArgument("empty realm".to_string()));
		}
		self.config.login_ids.validate(&request.login_ids)?;

		let mut principals = Vec::with_capacity(request.login_ids.len());
		for (key, login_id) in &request.login_ids {
			let existing = self
				.services
				.identities
				.password_principals()
				.find_password_principals(Some(key.as_str()), login_id, &request.realm)
				.await?;
			if !existing.is_empty() {
				tracing::debug!(login_id_key = %key, realm = %request.realm, "login id already registered");
				return Err(AuthError::DuplicateUser);
			}

			let claims = self.config.login_ids.claims_for(key, login_id);
			let principal = PasswordPrincipal::new(
				user.id,
				key.as_str(),
				login_id.as_str(),
				request.realm.as_str(),
				password,
				claims,
				user.created_at,
			)?;
			principals.push(principal.into());
		}
		Ok(principals)
	}

	fn notify_created(&self, user: &User, principals: &[Principal], session: &Session, claims: &Claims) {
		let events = &self.services.events;
		events.notify(AuthEvent::UserCreated {
			user_id: user.id,
			principal_ids: principals.iter().map(Principal::id).collect(),
		});
		for principal in principals {
			events.notify(AuthEvent::IdentityCreated {
				user_id: user.id,
				principal_id: principal.id(),
				provider_id: principal.provider_id(),
			});
		}
		events.notify(AuthEvent::SessionCreated {
			user_id: user.id,
			principal_id: session.principal_id,
			session_id: session.id,
			reason: SessionCreateReason::Signup,
		});
		events.notify(AuthEvent::UserSync { user_id: user.id });

		if self.config.welcome_email_enabled {
			if let Some(email) = claims.get(StandardClaim::Email.claim_name()).and_then(|v| v.as_str()) {
				events.notify(AuthEvent::WelcomeEmail {
					user_id: user.id,
					email: email.to_string(),
				});
			}
		}

		for principal in principals {
			if let Principal::Password(p) = principal {
				if self.config.verify_code_keys.iter().any(|k| k == &p.login_id_key) {
					events.notify(AuthEvent::VerifyCode {
						user_id: user.id,
						login_id_key: p.login_id_key.clone(),
						login_id: p.login_id.clone(),
					});
				}
			}
		}
	}
}

fn principals_first(principals: &[Principal]) -> Result<PrincipalId, AuthError> {
	principals
		.first()
		.map(Principal::id)
		.ok_or_else(|| AuthError::InvalidArgument("no principal to sign in with".to_string()))
}

fn merged_claims(principals: &[Principal]) -> Claims {
	let mut claims = Claims::new();
	for principal in principals {
		claims.extend(principal.claims());
	}
	claims
}
