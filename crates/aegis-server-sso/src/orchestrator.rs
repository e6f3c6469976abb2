// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_common_secret::SecretString;
use aegis_server_auth::{
	AuthError, AuthEvent, ExternalIdentity, OAuthPrincipal, OnUserDuplicate, Principal, SessionContext,
	SessionCreateReason, SessionId, StandardClaim, User, UserId,
};
use aegis_server_db::run_in_transaction;
use aegis_server_identity::{AuthResponse, AuthServices};
use aegis_server_session::Clock;
use url::Url;

use crate::auth_url::{AuthAction, AuthUrlRequest};
use crate::config::{LoginState, SsoConfig};
use crate::provider::ProviderRegistry;

/// How an external identity maps onto local users.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginDecision {
	/// The identity already has an OAuth principal.
	ExistingOAuthUser { user: User, principal: OAuthPrincipal },
	/// Attach a new OAuth principal to a user found by duplicate detection.
	MergeUser { user: User },
	/// Create a new user and OAuth principal.
	NewUser,
}

impl LoginDecision {
	pub fn name(&self) -> &'static str {
		match self {
			LoginDecision::ExistingOAuthUser { .. } => "existing_oauth_user",
			LoginDecision::MergeUser { .. } => "merge_user",
			LoginDecision::NewUser => "new_user",
		}
	}
}

/// What a committed SSO login wrote.
struct Committed {
	decision: &'static str,
	user_id: UserId,
	principal: OAuthPrincipal,
	created_user: bool,
	created_principal: bool,
}

pub struct SsoOrchestrator {
	services: AuthServices,
	providers: ProviderRegistry,
	config: SsoConfig,
}

impl SsoOrchestrator {
	pub fn new(services: AuthServices, providers: ProviderRegistry, config: SsoConfig) -> Self {
		Self {
			services,
			providers,
			config,
		}
	}

	/// Log in with a third-party access token.
	///
	/// Token verification failures are [`AuthError::ExternalAuthFailed`].
	#[tracing::instrument(skip(self, access_token, state, context), fields(provider = %provider_name))]
	pub async fn login(
		&self,
		provider_name: &str,
		access_token: &SecretString,
		state: LoginState,
		context: SessionContext,
	) -> Result<AuthResponse, AuthError> {
		if !self.config.external_access_token_flow_enabled {
			return Err(AuthError::InvalidArgument(
				"external access token flow is disabled".to_string(),
			));
		}
		state.validate(&self.config)?;

		let provider = self
			.providers
			.get(provider_name)
			.ok_or_else(|| AuthError::InvalidArgument(format!("unknown identity provider: {provider_name}")))?;
		let identity = provider.verify(access_token).await.map_err(|e| {
			tracing::debug!(error = %e, "external access token rejected");
			AuthError::from(e)
		})?;

		self.login_with_identity(identity, state, context).await
	}

	/// Authorization URL for a redirect-based login with `provider_name`.
	///
	/// `current_user` is carried in the state when an authenticated user
	/// starts the attempt.
	#[tracing::instrument(skip(self, request), fields(provider = %provider_name))]
	pub fn login_auth_url(
		&self,
		provider_name: &str,
		request: AuthUrlRequest,
		current_user: Option<UserId>,
	) -> Result<Url, AuthError> {
		let provider = self
			.providers
			.get(provider_name)
			.ok_or_else(|| AuthError::InvalidArgument(format!("unknown identity provider: {provider_name}")))?;
		let params = request.into_params(AuthAction::Login, current_user)?;
		let url = provider.auth_url(&params)?;
		tracing::debug!(ux_mode = %params.state.ux_mode, "built authorization url");
		Ok(url)
	}

	/// Log in with an identity already verified by its provider.
	#[tracing::instrument(
		skip(self, identity, state, context),
		fields(provider = %identity.provider, policy = %state.on_user_duplicate, realm = %state.merge_realm)
	)]
	pub async fn login_with_identity(
		&self,
		identity: ExternalIdentity,
		state: LoginState,
		context: SessionContext,
	) -> Result<AuthResponse, AuthError> {
		state.validate(&self.config)?;
		let decision = self.resolve(&identity, &state).await?;
		let decision_name = decision.name();

		let sessions = &self.services.sessions;
		let now = sessions.clock().now();
		let (committed, session, tokens) = run_in_transaction(self.services.committer.as_ref(), |mut unit| async move {
			let committed = match decision {
				LoginDecision::ExistingOAuthUser { user, mut principal } => {
					principal.sync(&identity, now);
					unit.update_oauth_principal(principal.clone());
					let user_id = user.id;
					unit.record_login(user_id, now);
					Committed {
						decision: decision_name,
						user_id,
						principal,
						created_user: false,
						created_principal: false,
					}
				}
				LoginDecision::MergeUser { user } => {
					let principal = OAuthPrincipal::new(user.id, &identity, now);
					unit.create_principal(Principal::OAuth(principal.clone()));
					let user_id = user.id;
					unit.record_login(user_id, now);
					Committed {
						decision: decision_name,
						user_id,
						principal,
						created_user: false,
						created_principal: true,
					}
				}
				LoginDecision::NewUser => {
					let mut user = User::new(now);
					user.record_login(now);
					let principal = OAuthPrincipal::new(user.id, &identity, now);
					let user_id = user.id;
					unit.create_user(user);
					unit.create_principal(Principal::OAuth(principal.clone()));
					Committed {
						decision: decision_name,
						user_id,
						principal,
						created_user: true,
						created_principal: true,
					}
				}
			};
			let (session, tokens) = sessions.create_in(&mut unit, committed.user_id, committed.principal.id, context);
			Ok((unit, (committed, session, tokens)))
		})
		.await?;

		tracing::info!(
			user_id = %committed.user_id,
			principal_id = %committed.principal.id,
			session_id = %session.id,
			decision = committed.decision,
			"sso login"
		);

		self.notify_committed(&committed, session.id);
		Ok(AuthResponse::new(&session, tokens, committed.principal.claims))
	}

	/// Decide how `identity` maps onto local users without writing anything.
	///
	/// Fails with [`AuthError::DuplicateUser`] when a duplicate exists and the
	/// policy is `reject`.
	pub async fn resolve(&self, identity: &ExternalIdentity, state: &LoginState) -> Result<LoginDecision, AuthError> {
		if let Some(principal) = self
			.services
			.identities
			.oauth_principals()
			.find_oauth_principal(&identity.provider, &identity.provider_user_id)
			.await?
		{
			let user = self.load_active_user(&principal.user_id).await?;
			return Ok(LoginDecision::ExistingOAuthUser { user, principal });
		}

		let Some(duplicate) = self.find_duplicate_user(identity, &state.merge_realm).await? else {
			return Ok(LoginDecision::NewUser);
		};

		match state.on_user_duplicate {
			OnUserDuplicate::Reject => {
				tracing::debug!(user_id = %duplicate, "sso identity matches existing user");
				Err(AuthError::DuplicateUser)
			}
			OnUserDuplicate::CreateNew => Ok(LoginDecision::NewUser),
			OnUserDuplicate::Merge => {
				let user = self.load_active_user(&duplicate).await?;
				Ok(LoginDecision::MergeUser { user })
			}
		}
	}

	/// A user owning a password principal whose login id equals the
	/// identity's email, under a key mapped to the email claim, in `realm`.
	async fn find_duplicate_user(&self, identity: &ExternalIdentity, realm: &str) -> Result<Option<UserId>, AuthError> {
		let Some(email) = identity.email() else {
			return Ok(None);
		};

		let keys: Vec<String> = self
			.config
			.login_ids
			.keys_for_claim(StandardClaim::Email)
			.map(str::to_string)
			.collect();
		for key in keys {
			let found = self
				.services
				.identities
				.password_principals()
				.find_password_principals(Some(key.as_str()), email, realm)
				.await?;
			if let Some(principal) = found.into_iter().next() {
				return Ok(Some(principal.user_id));
			}
		}
		Ok(None)
	}

	async fn load_active_user(&self, id: &UserId) -> Result<User, AuthError> {
		let user = self
			.services
			.identities
			.get_user(id)
			.await?
			.ok_or_else(|| AuthError::store(format!("user {id} referenced by a principal does not exist")))?;
		if user.disabled {
			tracing::debug!(user_id = %id, "sso login for disabled user");
			return Err(AuthError::UserDisabled);
		}
		Ok(user)
	}

	fn notify_committed(&self, committed: &Committed, session_id: SessionId) {
		let events = &self.services.events;
		let user_id = committed.user_id;
		let principal = Principal::OAuth(committed.principal.clone());

		if committed.created_user {
			events.notify(AuthEvent::UserCreated {
				user_id,
				principal_ids: vec![principal.id()],
			});
		}
		if committed.created_principal {
			events.notify(AuthEvent::IdentityCreated {
				user_id,
				principal_id: principal.id(),
				provider_id: principal.provider_id(),
			});
		}
		events.notify(AuthEvent::SessionCreated {
			user_id,
			principal_id: principal.id(),
			session_id,
			reason: if committed.created_user {
				SessionCreateReason::Signup
			} else {
				SessionCreateReason::Login
			},
		});
		events.notify(AuthEvent::UserSync { user_id });

		if committed.created_user && self.config.welcome_email_enabled {
			if let Some(email) = principal
				.claims()
				.get(StandardClaim::Email.claim_name())
				.and_then(|v| v.as_str())
			{
				events.notify(AuthEvent::WelcomeEmail {
					user_id,
					email: email.to_string(),
				});
			}
		}
	}
}
