// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session records and the session token format.
//!
//! # Token format
//!
//! Clients hold `<session-id>.<secret>`. The id is a UUID and contains no
//! `.`, so the token is split on the first `.`. Only the SHA-256 digest of
//! the secret is stored; the id alone never authenticates.
//!
//! # Security Model
//!
//! - Secrets come from an injected generator (32 random bytes, hex encoded)
//! - Digests are compared in constant time
//! - Digests are wrapped in [`SecretString`] so they never reach logs

use aegis_common_secret::SecretString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{PrincipalId, SessionId, UserId};

/// Which secret of a session a presented token carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTokenKind {
	Access,
	Refresh,
}

/// Request metadata recorded on a new session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
	/// API client the login came through.
	pub client_id: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

impl SessionContext {
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());
		self
	}

	pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
		self.user_agent = Some(ua.into());
		self
	}
}

/// The authenticator used for step-up authentication on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorInfo {
	pub id: String,
	pub kind: String,
	pub oob_channel: Option<String>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaOptions {
	pub authenticator_id: String,
	pub authenticator_type: String,
	pub oob_channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
	pub id: SessionId,
	pub user_id: UserId,
	pub principal_id: PrincipalId,
	pub client_id: Option<String>,
	pub created_at: DateTime<Utc>,
	pub accessed_at: DateTime<Utc>,
	pub access_token_hash: SecretString,
	pub access_token_created_at: DateTime<Utc>,
	pub refresh_token_hash: Option<SecretString>,
	pub authenticator: Option<AuthenticatorInfo>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

impl Session {
	/// Check a presented secret against the stored digest of the given kind.
	///
	/// A refresh secret never matches a session issued without one.
	pub fn verify_secret(&self, secret: &str, kind: SessionTokenKind) -> bool {
		let digest = match kind {
			SessionTokenKind::Access => Some(&self.access_token_hash),
			SessionTokenKind::Refresh => self.refresh_token_hash.as_ref(),
		};
		match digest {
			Some(digest) => digest.ct_eq(hash_token(secret)),
			None => false,
		}
	}
}

/// Tokens handed to the client exactly once, at issue or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
	pub access_token: SecretString,
	pub refresh_token: Option<SecretString>,
}

/// SHA-256 hex digest of a token secret.
pub fn hash_token(secret: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(secret.as_bytes());
	hex::encode(hasher.finalize())
}

pub fn format_token(id: &SessionId, secret: &str) -> SecretString {
	SecretString::new(format!("{id}.{secret}"))
}

/// Split a presented token into session id and secret.
///
/// Returns `None` for anything that is not `<uuid>.<non-empty secret>`.
pub fn parse_token(token: &str) -> Option<(SessionId, &str)> {
	let (id, secret) = token.split_once('.')?;
	if secret.is_empty() {
		return None;
	}
	let id = id.parse().ok()?;
	Some((id, secret))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn session_with(access: &str, refresh: Option<&str>) -> Session {
		let now = Utc::now();
		Session {
			id: SessionId::generate(),
			user_id: UserId::generate(),
			principal_id: PrincipalId::generate(),
			client_id: None,
			created_at: now,
			accessed_at: now,
			access_token_hash: SecretString::new(hash_token(access)),
			access_token_created_at: now,
			refresh_token_hash: refresh.map(|r| SecretString::new(hash_token(r))),
			authenticator: None,
			ip_address: None,
			user_agent: None,
		}
	}

	mod token_format {
		use super::*;

		#[test]
		fn splits_on_first_dot() {
			let id = SessionId::generate();
			let token = format!("{id}.abc.def");
			let (parsed, secret) = parse_token(&token).unwrap();
			assert_eq!(parsed, id);
			assert_eq!(secret, "abc.def");
		}

		#[test]
		fn rejects_malformed_tokens() {
			let id = SessionId::generate();
			assert!(parse_token("invalid-token").is_none());
			assert!(parse_token(&format!("{id}.")).is_none());
			assert!(parse_token(&format!("{id}")).is_none());
			assert!(parse_token("session-id.secret").is_none());
		}

		#[test]
		fn format_then_parse() {
			let id = SessionId::generate();
			let token = format_token(&id, "deadbeef");
			assert_eq!(parse_token(token.expose()), Some((id, "deadbeef")));
		}
	}

	mod secrets {
		use super::*;

		#[test]
		fn hash_is_sha256_hex() {
			assert_eq!(
				hash_token("test"),
				"9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
			);
		}

		#[test]
		fn verifies_matching_kind_only() {
			let session = session_with("access", Some("refresh"));
			assert!(session.verify_secret("access", SessionTokenKind::Access));
			assert!(session.verify_secret("refresh", SessionTokenKind::Refresh));
			assert!(!session.verify_secret("refresh", SessionTokenKind::Access));
			assert!(!session.verify_secret("access", SessionTokenKind::Refresh));
		}

		#[test]
		fn refresh_kind_fails_without_refresh_token() {
			let session = session_with("access", None);
			assert!(!session.verify_secret("access", SessionTokenKind::Refresh));
		}

		#[test]
		fn debug_output_hides_digests() {
			let session = session_with("access", None);
			let debug = format!("{session:?}");
			assert!(!debug.contains(&hash_token("access")));
		}
	}

	proptest! {
		#[test]
		fn prop_mutated_secret_never_verifies(secret in "[0-9a-f]{64}", idx in 0usize..64) {
			let session = session_with(&secret, None);
			let mut bytes = secret.into_bytes();
			bytes[idx] = if bytes[idx] == b'0' { b'1' } else { b'0' };
			let mutated = String::from_utf8(bytes).unwrap();
			prop_assert!(!session.verify_secret(&mutated, SessionTokenKind::Access));
		}
	}
}
