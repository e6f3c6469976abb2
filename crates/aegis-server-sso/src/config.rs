// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_server_auth::{AuthError, LoginIdChecker, OnUserDuplicate, DEFAULT_REALM};
use serde::Deserialize;

#[derive(Debug, Clone, Default)]
pub struct SsoConfig {
	/// Accept logins with a third-party access token.
	pub external_access_token_flow_enabled: bool,
	/// Send a welcome email to users created by SSO.
	pub welcome_email_enabled: bool,
	pub allow_merge: bool,
	pub allow_create_new: bool,
	/// Login-id keys searched for duplicates of the external email claim.
	pub login_ids: LoginIdChecker,
}

impl SsoConfig {
	/// `reject` is always allowed.
	pub fn allows(&self, policy: OnUserDuplicate) -> bool {
		match policy {
			OnUserDuplicate::Reject => true,
			OnUserDuplicate::Merge => self.allow_merge,
			OnUserDuplicate::CreateNew => self.allow_create_new,
		}
	}
}

/// Per-attempt SSO options. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginState {
	#[serde(default = "default_realm")]
	pub merge_realm: String,
	#[serde(default)]
	pub on_user_duplicate: OnUserDuplicate,
}

fn default_realm() -> String {
	DEFAULT_REALM.to_string()
}

impl Default for LoginState {
	fn default() -> Self {
		Self {
			merge_realm: default_realm(),
			on_user_duplicate: OnUserDuplicate::default(),
		}
	}
}

impl LoginState {
	pub fn new(on_user_duplicate: OnUserDuplicate) -> Self {
		Self {
			on_user_duplicate,
			..Self::default()
		}
	}

	pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
		self.merge_realm = realm.into();
		self
	}

	pub(crate) fn validate(&self, config: &SsoConfig) -> Result<(), AuthError> {
		if self.merge_realm.is_empty() {
			return Err(AuthError::InvalidArgument("empty merge realm".to_string()));
		}
		if !config.allows(self.on_user_duplicate) {
			return Err(AuthError::InvalidArgument(format!(
				"on_user_duplicate policy not enabled: {}",
				self.on_user_duplicate
			)));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn payload_defaults() {
		let state: LoginState = serde_json::from_value(json!({})).unwrap();
		assert_eq!(state.merge_realm, "default");
		assert_eq!(state.on_user_duplicate, OnUserDuplicate::Reject);
	}

	#[test]
	fn abort_is_reject() {
		let state: LoginState = serde_json::from_value(json!({"on_user_duplicate": "abort"})).unwrap();
		assert_eq!(state.on_user_duplicate, OnUserDuplicate::Reject);
	}

	#[test]
	fn disabled_policies_are_invalid() {
		let config = SsoConfig::default();
		assert!(LoginState::default().validate(&config).is_ok());
		for policy in [OnUserDuplicate::Merge, OnUserDuplicate::CreateNew] {
			let err = LoginState::new(policy).validate(&config).unwrap_err();
			assert!(matches!(err, AuthError::InvalidArgument(_)));
		}

		let config = SsoConfig {
			allow_merge: true,
			..SsoConfig::default()
		};
		assert!(LoginState::new(OnUserDuplicate::Merge).validate(&config).is_ok());
		assert!(LoginState::new(OnUserDuplicate::CreateNew).validate(&config).is_err());
	}

	#[test]
	fn empty_realm_is_invalid() {
		let err = LoginState::default().with_realm("").validate(&SsoConfig::default()).unwrap_err();
		assert!(matches!(err, AuthError::InvalidArgument(_)));
	}
}
