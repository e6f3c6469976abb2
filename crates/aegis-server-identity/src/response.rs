// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_common_secret::SecretString;
use aegis_server_auth::{Claims, PrincipalId, Session, SessionId, SessionTokens, UserId};
use serde::{Serialize, Serializer};

/// Result of a successful signup or login.
///
/// This is the only place session tokens are serialized in the clear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResponse {
	pub user_id: UserId,
	pub principal_id: PrincipalId,
	pub session_id: SessionId,
	#[serde(serialize_with = "expose")]
	pub access_token: SecretString,
	#[serde(serialize_with = "expose_optional", skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<SecretString>,
	pub claims: Claims,
}

impl AuthResponse {
	pub fn new(session: &Session, tokens: SessionTokens, claims: Claims) -> Self {
		Self {
			user_id: session.user_id,
			principal_id: session.principal_id,
			session_id: session.id,
			access_token: tokens.access_token,
			refresh_token: tokens.refresh_token,
			claims,
		}
	}
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(secret.expose())
}

fn expose_optional<S: Serializer>(secret: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error> {
	match secret {
		Some(secret) => serializer.serialize_some(secret.expose()),
		None => serializer.serialize_none(),
	}
}
