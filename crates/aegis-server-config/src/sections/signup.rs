// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_server_auth::{LoginIdChecker, LoginIdKey, StandardClaim};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupConfig {
	pub login_id_keys: Vec<LoginIdKey>,
	pub welcome_email_enabled: bool,
	pub verify_code_keys: Vec<String>,
}

impl Default for SignupConfig {
	fn default() -> Self {
		SignupConfigLayer::default().finalize()
	}
}

impl SignupConfig {
	pub fn login_id_checker(&self) -> LoginIdChecker {
		LoginIdChecker::new(self.login_id_keys.clone())
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupConfigLayer {
	#[serde(default)]
	pub login_id_keys: Option<Vec<LoginIdKey>>,
	#[serde(default)]
	pub welcome_email_enabled: Option<bool>,
	#[serde(default)]
	pub verify_code_keys: Option<Vec<String>>,
}

impl SignupConfigLayer {
	pub fn merge(&mut self, other: SignupConfigLayer) {
		if other.login_id_keys.is_some() {
			self.login_id_keys = other.login_id_keys;
		}
		if other.welcome_email_enabled.is_some() {
			self.welcome_email_enabled = other.welcome_email_enabled;
		}
		if other.verify_code_keys.is_some() {
			self.verify_code_keys = other.verify_code_keys;
		}
	}

	pub fn finalize(self) -> SignupConfig {
		SignupConfig {
			login_id_keys: self
				.login_id_keys
				.unwrap_or_else(|| LoginIdChecker::default().keys().to_vec()),
			welcome_email_enabled: self.welcome_email_enabled.unwrap_or(false),
			verify_code_keys: self.verify_code_keys.unwrap_or_default(),
		}
	}
}

/// Parse `key[:claim],...`, e.g. `email:email,phone:phone,username`.
pub(crate) fn parse_login_id_keys(value: &str) -> Result<Vec<LoginIdKey>, String> {
	value
		.split(',')
		.map(str::trim)
		.filter(|entry| !entry.is_empty())
		.map(|entry| {
			let (key, claim) = match entry.split_once(':') {
				Some((key, claim)) => (key.trim(), Some(claim.trim())),
				None => (entry, None),
			};
			let standard_claim = match claim {
				None | Some("") => None,
				Some("email") => Some(StandardClaim::Email),
				Some("phone") | Some("phone_number") => Some(StandardClaim::Phone),
				Some(other) => return Err(format!("unknown standard claim '{other}'")),
			};
			Ok(LoginIdKey::new(key, standard_claim))
		})
		.collect()
}
