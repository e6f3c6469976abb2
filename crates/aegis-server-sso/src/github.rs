// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub access-token verification.
//!
//! The token is checked by calling `/user` and `/user/emails` with it. The
//! raw `/user` response becomes the principal's profile. Only the primary
//! verified email is turned into an `email` claim.
//!
//! With an OAuth app client id configured, the provider also builds
//! authorization URLs for redirect-based login.

use aegis_common_secret::SecretString;
use aegis_server_auth::{Claims, ExternalIdentity};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth_url::AuthUrlParams;
use crate::error::OAuthError;
use crate::provider::ExternalAccessTokenProvider;

pub const PROVIDER_NAME: &str = "github";
const GITHUB_API_URL: &str = "https://api.github.com/";
const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
	pub id: i64,
	pub login: String,
	pub name: Option<String>,
	pub email: Option<String>,
	pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubEmail {
	pub email: String,
	pub primary: bool,
	pub verified: bool,
}

#[derive(Debug, Clone)]
pub struct GitHubProvider {
	http_client: reqwest::Client,
	api_base: Url,
	authorize_url: Url,
	client_id: Option<String>,
}

impl GitHubProvider {
	pub fn new() -> Result<Self, OAuthError> {
		let base = Url::parse(GITHUB_API_URL).map_err(|e| OAuthError::Api(e.to_string()))?;
		Self::with_api_base(base)
	}

	/// Point the provider at another API root, such as GitHub Enterprise.
	///
	/// Endpoints resolve below the root whether or not it ends in `/`.
	pub fn with_api_base(mut api_base: Url) -> Result<Self, OAuthError> {
		if !api_base.path().ends_with('/') {
			let path = format!("{}/", api_base.path());
			api_base.set_path(&path);
		}
		let authorize_url = Url::parse(GITHUB_AUTHORIZE_URL).map_err(|e| OAuthError::Api(e.to_string()))?;
		let http_client = reqwest::Client::builder()
			.user_agent(concat!("aegis-server/", env!("CARGO_PKG_VERSION")))
			.build()?;
		Ok(Self {
			http_client,
			api_base,
			authorize_url,
			client_id: None,
		})
	}

	/// Enable authorization URLs for an OAuth app.
	pub fn with_oauth_app(mut self, client_id: impl Into<String>, authorize_url: Url) -> Self {
		self.client_id = Some(client_id.into());
		self.authorize_url = authorize_url;
		self
	}

	fn endpoint(&self, path: &str) -> Result<Url, OAuthError> {
		self.api_base.join(path).map_err(|e| OAuthError::Api(e.to_string()))
	}

	async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, access_token: &str) -> Result<T, OAuthError> {
		let response = self
			.http_client
			.get(self.endpoint(path)?)
			.header("Accept", "application/vnd.github+json")
			.header("Authorization", format!("Bearer {access_token}"))
			.header("X-GitHub-Api-Version", GITHUB_API_VERSION)
			.send()
			.await?;

		match response.status() {
			status if status.is_success() => response
				.json()
				.await
				.map_err(|e| OAuthError::Parse(format!("failed to parse {path} response: {e}"))),
			StatusCode::UNAUTHORIZED => Err(OAuthError::Unauthorized(PROVIDER_NAME.to_string())),
			status => {
				let body = response.text().await.unwrap_or_default();
				Err(OAuthError::Api(format!("{path} returned {status}: {body}")))
			}
		}
	}

	#[tracing::instrument(skip(self, access_token), name = "GitHubProvider::get_user")]
	pub async fn get_user(&self, access_token: &str) -> Result<serde_json::Value, OAuthError> {
		tracing::debug!("fetching GitHub user info");
		self.get_json("user", access_token).await
	}

	#[tracing::instrument(skip(self, access_token), name = "GitHubProvider::get_emails")]
	pub async fn get_emails(&self, access_token: &str) -> Result<Vec<GitHubEmail>, OAuthError> {
		tracing::debug!("fetching GitHub user emails");
		self.get_json("user/emails", access_token).await
	}
}

#[async_trait]
impl ExternalAccessTokenProvider for GitHubProvider {
	fn name(&self) -> &str {
		PROVIDER_NAME
	}

	async fn verify(&self, access_token: &SecretString) -> Result<ExternalIdentity, OAuthError> {
		let token = access_token.expose();
		let profile = self.get_user(token).await?;
		let emails = self.get_emails(token).await?;
		identity_from_profile(profile, &emails)
	}

	#[tracing::instrument(skip(self, params), fields(ux_mode = %params.state.ux_mode))]
	fn auth_url(&self, params: &AuthUrlParams) -> Result<Url, OAuthError> {
		let client_id = self
			.client_id
			.as_deref()
			.ok_or_else(|| OAuthError::NotConfigured("github client id".to_string()))?;
		let state = serde_json::to_string(&params.state)
			.map_err(|e| OAuthError::Api(format!("failed to encode state: {e}")))?;

		let mut url = self.authorize_url.clone();
		{
			let mut query = url.query_pairs_mut();
			query.append_pair("client_id", client_id);
			if !params.scope.is_empty() {
				query.append_pair("scope", &params.scope.join(" "));
			}
			for (key, value) in &params.options {
				if !matches!(key.as_str(), "client_id" | "scope" | "state") {
					query.append_pair(key, value);
				}
			}
			query.append_pair("state", &state);
		}
		Ok(url)
	}
}

fn identity_from_profile(profile: serde_json::Value, emails: &[GitHubEmail]) -> Result<ExternalIdentity, OAuthError> {
	let user: GitHubUser = serde_json::from_value(profile.clone())
		.map_err(|e| OAuthError::Parse(format!("failed to parse user response: {e}")))?;

	let mut claims = Claims::new();
	claims.insert("preferred_username".to_string(), user.login.clone().into());
	if let Some(name) = user.name.as_deref().filter(|n| !n.is_empty()) {
		claims.insert("name".to_string(), name.into());
	}
	if let Some(primary) = emails.iter().find(|e| e.primary && e.verified) {
		claims.insert("email".to_string(), primary.email.clone().into());
		claims.insert("email_verified".to_string(), true.into());
	}

	Ok(ExternalIdentity::new(PROVIDER_NAME, user.id.to_string(), profile, claims))
}
