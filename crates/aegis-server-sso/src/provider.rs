// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use aegis_common_secret::SecretString;
use aegis_server_auth::ExternalIdentity;
use async_trait::async_trait;
use url::Url;

use crate::auth_url::AuthUrlParams;
use crate::error::OAuthError;

/// Exchanges a third-party access token for the identity it belongs to.
///
/// Implementations build the identity only from the provider's responses.
#[async_trait]
pub trait ExternalAccessTokenProvider: Send + Sync {
	/// Provider name used in `oauth:<provider>` and principal records.
	fn name(&self) -> &str;

	async fn verify(&self, access_token: &SecretString) -> Result<ExternalIdentity, OAuthError>;

	/// Where to send the user to authorize a redirect-based login.
	fn auth_url(&self, params: &AuthUrlParams) -> Result<Url, OAuthError> {
		let _ = params;
		Err(OAuthError::NotConfigured(format!("{} has no authorization URL", self.name())))
	}
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
	providers: HashMap<String, Arc<dyn ExternalAccessTokenProvider>>,
}

impl ProviderRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, provider: Arc<dyn ExternalAccessTokenProvider>) {
		self.providers.insert(provider.name().to_string(), provider);
	}

	pub fn with(mut self, provider: Arc<dyn ExternalAccessTokenProvider>) -> Self {
		self.register(provider);
		self
	}

	pub fn get(&self, name: &str) -> Option<&Arc<dyn ExternalAccessTokenProvider>> {
		self.providers.get(name)
	}
}
