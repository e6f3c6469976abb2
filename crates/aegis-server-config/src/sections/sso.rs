// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com/";
const DEFAULT_GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoConfig {
	pub external_access_token_flow_enabled: bool,
	pub welcome_email_enabled: bool,
	pub allow_merge: bool,
	pub allow_create_new: bool,
	pub github_api_url: String,
	pub github_authorize_url: String,
	/// OAuth app client id. Auth URLs cannot be built without it.
	pub github_client_id: Option<String>,
}

impl Default for SsoConfig {
	fn default() -> Self {
		SsoConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SsoConfigLayer {
	#[serde(default)]
	pub external_access_token_flow_enabled: Option<bool>,
	#[serde(default)]
	pub welcome_email_enabled: Option<bool>,
	#[serde(default)]
	pub allow_merge: Option<bool>,
	#[serde(default)]
	pub allow_create_new: Option<bool>,
	#[serde(default)]
	pub github_api_url: Option<String>,
	#[serde(default)]
	pub github_authorize_url: Option<String>,
	#[serde(default)]
	pub github_client_id: Option<String>,
}

impl SsoConfigLayer {
	pub fn merge(&mut self, other: SsoConfigLayer) {
		if other.external_access_token_flow_enabled.is_some() {
			self.external_access_token_flow_enabled = other.external_access_token_flow_enabled;
		}
		if other.welcome_email_enabled.is_some() {
			self.welcome_email_enabled = other.welcome_email_enabled;
		}
		if other.allow_merge.is_some() {
			self.allow_merge = other.allow_merge;
		}
		if other.allow_create_new.is_some() {
			self.allow_create_new = other.allow_create_new;
		}
		if other.github_api_url.is_some() {
			self.github_api_url = other.github_api_url;
		}
		if other.github_authorize_url.is_some() {
			self.github_authorize_url = other.github_authorize_url;
		}
		if other.github_client_id.is_some() {
			self.github_client_id = other.github_client_id;
		}
	}

	pub fn finalize(self) -> SsoConfig {
		SsoConfig {
			external_access_token_flow_enabled: self.external_access_token_flow_enabled.unwrap_or(false),
			welcome_email_enabled: self.welcome_email_enabled.unwrap_or(false),
			allow_merge: self.allow_merge.unwrap_or(false),
			allow_create_new: self.allow_create_new.unwrap_or(false),
			github_api_url: self
				.github_api_url
				.unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
			github_authorize_url: self
				.github_authorize_url
				.unwrap_or_else(|| DEFAULT_GITHUB_AUTHORIZE_URL.to_string()),
			github_client_id: self.github_client_id.filter(|id| !id.is_empty()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn later_layers_override_github_settings() {
		let mut layer = SsoConfigLayer {
			github_client_id: Some("Iv1.base".to_string()),
			..SsoConfigLayer::default()
		};
		layer.merge(SsoConfigLayer {
			github_authorize_url: Some("https://ghe.example.com/login/oauth/authorize".to_string()),
			..SsoConfigLayer::default()
		});

		let config = layer.finalize();
		assert_eq!(config.github_client_id.as_deref(), Some("Iv1.base"));
		assert_eq!(config.github_authorize_url, "https://ghe.example.com/login/oauth/authorize");
		assert_eq!(config.github_api_url, DEFAULT_GITHUB_API_URL);
	}

	#[test]
	fn empty_client_id_is_unset() {
		let layer = SsoConfigLayer {
			github_client_id: Some(String::new()),
			..SsoConfigLayer::default()
		};
		assert_eq!(layer.finalize().github_client_id, None);
	}
}
