// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Login-id keys and the standard claims derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AuthError, Claims};

/// A standard identity claim a login-id key can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardClaim {
	Email,
	Phone,
}

impl StandardClaim {
	pub fn claim_name(&self) -> &'static str {
		match self {
			StandardClaim::Email => "email",
			StandardClaim::Phone => "phone_number",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginIdKey {
	pub key: String,
	#[serde(default)]
	pub standard_claim: Option<StandardClaim>,
}

impl LoginIdKey {
	pub fn new(key: impl Into<String>, standard_claim: Option<StandardClaim>) -> Self {
		Self {
			key: key.into(),
			standard_claim,
		}
	}
}

/// Validates login ids against the configured keys and derives claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginIdChecker {
	keys: Vec<LoginIdKey>,
}

impl Default for LoginIdChecker {
	fn default() -> Self {
		Self::new(vec![
			LoginIdKey::new("email", Some(StandardClaim::Email)),
			LoginIdKey::new("phone", Some(StandardClaim::Phone)),
			LoginIdKey::new("username", None),
		])
	}
}

impl LoginIdChecker {
	pub fn new(keys: Vec<LoginIdKey>) -> Self {
		Self { keys }
	}

	pub fn keys(&self) -> &[LoginIdKey] {
		&self.keys
	}

	fn lookup(&self, key: &str) -> Option<&LoginIdKey> {
		self.keys.iter().find(|k| k.key == key)
	}

	/// Rejects unknown keys and empty values.
	pub fn validate(&self, login_ids: &BTreeMap<String, String>) -> Result<(), AuthError> {
		for (key, value) in login_ids {
			if self.lookup(key).is_none() {
				return Err(AuthError::InvalidArgument(format!("login id key is not allowed: {key}")));
			}
			if value.trim().is_empty() {
				return Err(AuthError::InvalidArgument(format!("empty login id for key: {key}")));
			}
		}
		Ok(())
	}

	/// Claims a password principal with this login id carries.
	pub fn claims_for(&self, key: &str, value: &str) -> Claims {
		let mut claims = Claims::new();
		if let Some(claim) = self.lookup(key).and_then(|k| k.standard_claim) {
			claims.insert(claim.claim_name().to_string(), value.into());
		}
		claims
	}

	/// Login-id keys mapped to the given standard claim.
	pub fn keys_for_claim(&self, claim: StandardClaim) -> impl Iterator<Item = &str> {
		self.keys
			.iter()
			.filter(move |k| k.standard_claim == Some(claim))
			.map(|k| k.key.as_str())
	}
}
