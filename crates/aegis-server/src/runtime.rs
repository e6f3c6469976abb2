// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Assembles the authentication flows from a loaded [`ServerConfig`].

use std::sync::Arc;

use aegis_server_config::ServerConfig;
use aegis_server_db::{PrincipalRepository, SessionRepository, SqliteCommitter, UserRepository};
use aegis_server_identity::{
	AuthServices, EventHandler, HookDispatcher, IdentityProvider, PasswordLoginFlow, SignupConfig, SignupFlow,
	TracingEventHandler,
};
use aegis_server_session::{RandomTokenGenerator, SessionProvider, SessionProviderConfig, SystemClock};
use aegis_server_sso::{GitHubProvider, ProviderRegistry, SsoConfig, SsoOrchestrator};
use anyhow::Context;
use sqlx::SqlitePool;
use url::Url;

const EVENT_QUEUE_CAPACITY: usize = 1024;

pub struct AuthRuntime {
	pub services: AuthServices,
	pub signup: SignupFlow,
	pub login: PasswordLoginFlow,
	pub sso: SsoOrchestrator,
}

impl AuthRuntime {
	/// Must be called within a Tokio runtime; event delivery runs on a
	/// background task.
	pub fn from_config(config: &ServerConfig, pool: SqlitePool) -> anyhow::Result<Self> {
		let principals = Arc::new(PrincipalRepository::new(pool.clone()));
		let identities = Arc::new(IdentityProvider::new(
			Arc::new(UserRepository::new(pool.clone())),
			principals.clone(),
			principals.clone(),
			principals,
		));

		let sessions = Arc::new(SessionProvider::new(
			Arc::new(SessionRepository::new(pool.clone())),
			Arc::new(SystemClock),
			Arc::new(RandomTokenGenerator::new(config.session.secret_bytes)),
			session_provider_config(config),
		));

		let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(TracingEventHandler)];
		let events = Arc::new(HookDispatcher::new(EVENT_QUEUE_CAPACITY, handlers));

		let services = AuthServices::new(identities, sessions, Arc::new(SqliteCommitter::new(pool)), events);

		let api_base = Url::parse(&config.sso.github_api_url)
			.with_context(|| format!("invalid sso.github_api_url '{}'", config.sso.github_api_url))?;
		let mut github = GitHubProvider::with_api_base(api_base)?;
		if let Some(client_id) = &config.sso.github_client_id {
			let authorize_url = Url::parse(&config.sso.github_authorize_url).with_context(|| {
				format!("invalid sso.github_authorize_url '{}'", config.sso.github_authorize_url)
			})?;
			github = github.with_oauth_app(client_id.clone(), authorize_url);
		}
		let registry = ProviderRegistry::new().with(Arc::new(github));

		Ok(Self {
			signup: SignupFlow::new(services.clone(), signup_config(config)),
			login: PasswordLoginFlow::new(services.clone()),
			sso: SsoOrchestrator::new(services.clone(), registry, sso_config(config)),
			services,
		})
	}
}

pub fn session_provider_config(config: &ServerConfig) -> SessionProviderConfig {
	SessionProviderConfig {
		refresh_token_enabled: config.session.refresh_token_enabled,
	}
}

pub fn signup_config(config: &ServerConfig) -> SignupConfig {
	SignupConfig {
		login_ids: config.signup.login_id_checker(),
		welcome_email_enabled: config.signup.welcome_email_enabled,
		verify_code_keys: config.signup.verify_code_keys.clone(),
	}
}

/// SSO duplicate detection searches the same login-id keys signup accepts.
pub fn sso_config(config: &ServerConfig) -> SsoConfig {
	SsoConfig {
		external_access_token_flow_enabled: config.sso.external_access_token_flow_enabled,
		welcome_email_enabled: config.sso.welcome_email_enabled,
		allow_merge: config.sso.allow_merge,
		allow_create_new: config.sso.allow_create_new,
		login_ids: config.signup.login_id_checker(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	use aegis_server_auth::{SessionContext, SessionTokenKind};
	use aegis_server_db::testing::create_migrated_pool;
	use aegis_server_identity::{LoginRequest, SignupRequest};
	use aegis_server_sso::{AuthUrlRequest, UxMode};

	fn config() -> ServerConfig {
		let mut config = ServerConfig::default();
		config.session.refresh_token_enabled = true;
		config.sso.allow_merge = true;
		config.signup.welcome_email_enabled = true;
		config
	}

	#[test]
	fn sections_map_onto_flow_configs() {
		let config = config();
		assert!(session_provider_config(&config).refresh_token_enabled);
		assert!(signup_config(&config).welcome_email_enabled);

		let sso = sso_config(&config);
		assert!(sso.allow_merge);
		assert!(!sso.allow_create_new);
		assert!(!sso.external_access_token_flow_enabled);
		assert_eq!(sso.login_ids, signup_config(&config).login_ids);
	}

	#[tokio::test]
	async fn signup_then_login_against_sqlite() {
		let runtime = AuthRuntime::from_config(&config(), create_migrated_pool().await).unwrap();

		let mut login_ids = BTreeMap::new();
		login_ids.insert("email".to_string(), "jane@example.com".to_string());
		let signed_up = runtime
			.signup
			.signup(SignupRequest::password(login_ids, "hunter22"), SessionContext::default())
			.await
			.unwrap();
		assert!(signed_up.refresh_token.is_some());

		let logged_in = runtime
			.login
			.login(LoginRequest::new("jane@example.com", "hunter22"), SessionContext::default())
			.await
			.unwrap();
		assert_eq!(logged_in.user_id, signed_up.user_id);

		let session = runtime
			.services
			.sessions
			.get_by_token(logged_in.access_token.expose(), SessionTokenKind::Access)
			.await
			.unwrap();
		assert_eq!(session.id, logged_in.session_id);

		runtime
			.services
			.sessions
			.invalidate_all(&signed_up.user_id, None)
			.await
			.unwrap();
		assert!(runtime.services.sessions.list(&signed_up.user_id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn invalid_github_url_is_rejected() {
		let mut config = config();
		config.sso.github_api_url = "not a url".to_string();
		assert!(AuthRuntime::from_config(&config, create_migrated_pool().await).is_err());
	}

	#[tokio::test]
	async fn github_auth_url_needs_client_id() {
		let request = || AuthUrlRequest::new("https://app.example.com/cb", UxMode::WebRedirect);

		let runtime = AuthRuntime::from_config(&config(), create_migrated_pool().await).unwrap();
		assert!(runtime.sso.login_auth_url("github", request(), None).is_err());

		let mut config = config();
		config.sso.github_client_id = Some("Iv1.abc".to_string());
		let runtime = AuthRuntime::from_config(&config, create_migrated_pool().await).unwrap();
		let url = runtime.sso.login_auth_url("github", request(), None).unwrap();
		assert!(url.as_str().starts_with("https://github.com/login/oauth/authorize?client_id=Iv1.abc"));
	}
}
