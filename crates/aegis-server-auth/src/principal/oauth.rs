// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Attributes, Claims, PrincipalId, UserId};

/// An identity verified by a third-party provider.
///
/// Built only from the provider's own profile response, never from client
/// input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalIdentity {
	pub provider: String,
	pub provider_user_id: String,
	pub profile: serde_json::Value,
	pub claims: Claims,
}

impl ExternalIdentity {
	pub fn new(
		provider: impl Into<String>,
		provider_user_id: impl Into<String>,
		profile: serde_json::Value,
		claims: Claims,
	) -> Self {
		Self {
			provider: provider.into(),
			provider_user_id: provider_user_id.into(),
			profile,
			claims,
		}
	}

	pub fn email(&self) -> Option<&str> {
		self.claims.get("email").and_then(|v| v.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthPrincipal {
	pub id: PrincipalId,
	pub user_id: UserId,
	pub provider: String,
	pub provider_user_id: String,
	pub profile: serde_json::Value,
	pub claims: Claims,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl OAuthPrincipal {
	pub fn new(user_id: UserId, identity: &ExternalIdentity, now: DateTime<Utc>) -> Self {
		Self {
			id: PrincipalId::generate(),
			user_id,
			provider: identity.provider.clone(),
			provider_user_id: identity.provider_user_id.clone(),
			profile: identity.profile.clone(),
			claims: identity.claims.clone(),
			created_at: now,
			updated_at: now,
		}
	}

	/// Replace profile and claims with a fresh provider response.
	pub fn sync(&mut self, identity: &ExternalIdentity, now: DateTime<Utc>) {
		self.profile = identity.profile.clone();
		self.claims = identity.claims.clone();
		self.updated_at = now;
	}

	pub fn attributes(&self) -> Attributes {
		let mut attributes = Attributes::new();
		attributes.insert("provider".to_string(), self.provider.clone().into());
		attributes.insert("provider_user_id".to_string(), self.provider_user_id.clone().into());
		attributes.insert("raw_profile".to_string(), self.profile.clone());
		attributes
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use serde_json::json;

	#[test]
	fn sync_replaces_profile_and_claims() {
		let now = Utc::now();
		let first = ExternalIdentity::new("github", "42", json!({"login": "old"}), Claims::new());
		let mut principal = OAuthPrincipal::new(UserId::generate(), &first, now);

		let mut claims = Claims::new();
		claims.insert("email".to_string(), json!("new@example.com"));
		let second = ExternalIdentity::new("github", "42", json!({"login": "new"}), claims);
		principal.sync(&second, now + Duration::seconds(5));

		assert_eq!(principal.profile, json!({"login": "new"}));
		assert_eq!(principal.claims.get("email"), Some(&json!("new@example.com")));
		assert_eq!(principal.created_at, now);
		assert_eq!(principal.updated_at, now + Duration::seconds(5));
	}
}
