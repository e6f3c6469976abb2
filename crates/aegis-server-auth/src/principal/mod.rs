// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Login mechanisms.
//!
//! [`Principal`] is a closed sum over every mechanism the core supports.
//! Code that must behave differently per mechanism matches on it (or on
//! [`PrincipalKind`]) so adding a mechanism is a compile error at every
//! dispatch site.

mod anonymous;
mod login_id;
mod oauth;
mod password;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PrincipalId, UserId};

pub use anonymous::AnonymousPrincipal;
pub use login_id::{LoginIdChecker, LoginIdKey, StandardClaim};
pub use oauth::{ExternalIdentity, OAuthPrincipal};
pub use password::{hash_password, verify_unknown_password, PasswordPrincipal};

/// Non-secret, mechanism-specific fields used for display and audit.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Verified identity claims (`email`, `phone_number`, ...).
pub type Claims = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
	Password,
	Anonymous,
	OAuth,
}

impl PrincipalKind {
	pub const ALL: [PrincipalKind; 3] = [PrincipalKind::Password, PrincipalKind::Anonymous, PrincipalKind::OAuth];
}

impl fmt::Display for PrincipalKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PrincipalKind::Password => write!(f, "password"),
			PrincipalKind::Anonymous => write!(f, "anonymous"),
			PrincipalKind::OAuth => write!(f, "oauth"),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
	Password(PasswordPrincipal),
	Anonymous(AnonymousPrincipal),
	OAuth(OAuthPrincipal),
}

impl Principal {
	pub fn id(&self) -> PrincipalId {
		match self {
			Principal::Password(p) => p.id,
			Principal::Anonymous(p) => p.id,
			Principal::OAuth(p) => p.id,
		}
	}

	pub fn user_id(&self) -> UserId {
		match self {
			Principal::Password(p) => p.user_id,
			Principal::Anonymous(p) => p.user_id,
			Principal::OAuth(p) => p.user_id,
		}
	}

	pub fn kind(&self) -> PrincipalKind {
		match self {
			Principal::Password(_) => PrincipalKind::Password,
			Principal::Anonymous(_) => PrincipalKind::Anonymous,
			Principal::OAuth(_) => PrincipalKind::OAuth,
		}
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		match self {
			Principal::Password(p) => p.created_at,
			Principal::Anonymous(p) => p.created_at,
			Principal::OAuth(p) => p.created_at,
		}
	}

	/// Mechanism discriminator: `password`, `anonymous` or `oauth:<provider>`.
	pub fn provider_id(&self) -> String {
		match self {
			Principal::Password(_) => PrincipalKind::Password.to_string(),
			Principal::Anonymous(_) => PrincipalKind::Anonymous.to_string(),
			Principal::OAuth(p) => format!("oauth:{}", p.provider),
		}
	}

	pub fn attributes(&self) -> Attributes {
		match self {
			Principal::Password(p) => p.attributes(),
			Principal::Anonymous(_) => Attributes::new(),
			Principal::OAuth(p) => p.attributes(),
		}
	}

	pub fn claims(&self) -> Claims {
		match self {
			Principal::Password(p) => p.claims.clone(),
			Principal::Anonymous(_) => Claims::new(),
			Principal::OAuth(p) => p.claims.clone(),
		}
	}
}

impl From<PasswordPrincipal> for Principal {
	fn from(p: PasswordPrincipal) -> Self {
		Principal::Password(p)
	}
}

impl From<AnonymousPrincipal> for Principal {
	fn from(p: AnonymousPrincipal) -> Self {
		Principal::Anonymous(p)
	}
}

impl From<OAuthPrincipal> for Principal {
	fn from(p: OAuthPrincipal) -> Self {
		Principal::OAuth(p)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use serde_json::json;

	fn password_principal() -> PasswordPrincipal {
		let mut claims = Claims::new();
		claims.insert("email".to_string(), json!("jane@example.com"));
		PasswordPrincipal::new(
			UserId::generate(),
			"email",
			"jane@example.com",
			crate::DEFAULT_REALM,
			"correct horse",
			claims,
			Utc::now(),
		)
		.unwrap()
	}

	#[test]
	fn provider_ids_per_mechanism() {
		let user = UserId::generate();
		let now = Utc::now();
		assert_eq!(Principal::from(password_principal()).provider_id(), "password");
		assert_eq!(Principal::from(AnonymousPrincipal::new(user, now)).provider_id(), "anonymous");

		let identity = ExternalIdentity::new("github", "42", json!({"login": "jane"}), Claims::new());
		let oauth = OAuthPrincipal::new(user, &identity, now);
		assert_eq!(Principal::from(oauth).provider_id(), "oauth:github");
	}

	#[test]
	fn attributes_never_contain_password_hash() {
		let principal = password_principal();
		let hash = principal.hashed_password.expose().clone();
		let attributes = Principal::from(principal).attributes();
		assert_eq!(attributes.get("login_id"), Some(&json!("jane@example.com")));
		assert_eq!(attributes.get("realm"), Some(&json!("default")));
		assert!(attributes.values().all(|v| v != &json!(hash)));
	}

	#[test]
	fn anonymous_has_no_claims_or_attributes() {
		let principal = Principal::from(AnonymousPrincipal::new(UserId::generate(), Utc::now()));
		assert!(principal.attributes().is_empty());
		assert!(principal.claims().is_empty());
		assert_eq!(principal.kind(), PrincipalKind::Anonymous);
	}
}
