// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password principals.
//!
//! The secret is stored as an Argon2id PHC string. Verification is a single
//! `verify_password` call, which compares in constant time.

use std::sync::OnceLock;

use aegis_common_secret::SecretString;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Utc};

use crate::argon2_config::argon2_instance;
use crate::{Attributes, AuthError, Claims, PrincipalId, UserId};

#[derive(Debug, Clone, PartialEq)]
pub struct PasswordPrincipal {
	pub id: PrincipalId,
	pub user_id: UserId,
	pub login_id_key: String,
	pub login_id: String,
	pub realm: String,
	pub hashed_password: SecretString,
	pub claims: Claims,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl PasswordPrincipal {
	pub fn new(
		user_id: UserId,
		login_id_key: impl Into<String>,
		login_id: impl Into<String>,
		realm: impl Into<String>,
		password: &str,
		claims: Claims,
		now: DateTime<Utc>,
	) -> Result<Self, AuthError> {
		let login_id_key = login_id_key.into();
		let login_id = login_id.into();
		let realm = realm.into();

		if login_id_key.is_empty() || login_id.is_empty() {
			return Err(AuthError::InvalidArgument("empty login id".to_string()));
		}
		if realm.is_empty() {
			return Err(AuthError::InvalidArgument("empty realm".to_string()));
		}

		Ok(Self {
			id: PrincipalId::generate(),
			user_id,
			login_id_key,
			login_id,
			realm,
			hashed_password: hash_password(password)?,
			claims,
			created_at: now,
			updated_at: now,
		})
	}

	pub fn verify_password(&self, candidate: &str) -> bool {
		let parsed = match PasswordHash::new(self.hashed_password.expose()) {
			Ok(h) => h,
			Err(_) => return false,
		};
		argon2_instance()
			.verify_password(candidate.as_bytes(), &parsed)
			.is_ok()
	}

	pub fn set_password(&mut self, password: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
		self.hashed_password = hash_password(password)?;
		self.updated_at = now;
		Ok(())
	}

	pub fn attributes(&self) -> Attributes {
		let mut attributes = Attributes::new();
		attributes.insert("login_id_key".to_string(), self.login_id_key.clone().into());
		attributes.insert("login_id".to_string(), self.login_id.clone().into());
		attributes.insert("realm".to_string(), self.realm.clone().into());
		attributes
	}
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<SecretString, AuthError> {
	if password.is_empty() {
		return Err(AuthError::InvalidArgument("empty password".to_string()));
	}
	let salt = SaltString::generate(&mut OsRng);
	let hash = argon2_instance()
		.hash_password(password.as_bytes(), &salt)
		.map_err(|e| AuthError::Hashing(e.to_string()))?;
	Ok(SecretString::new(hash.to_string()))
}

/// Run a full verification against a throwaway hash and report failure.
///
/// Login calls this when no principal matches, so unknown login ids cost
/// the same Argon2 work as a wrong password.
pub fn verify_unknown_password(candidate: &str) -> bool {
	static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
	let hash = DUMMY_HASH.get_or_init(|| {
		let unguessable = SaltString::generate(&mut OsRng);
		let salt = SaltString::generate(&mut OsRng);
		argon2_instance()
			.hash_password(unguessable.as_str().as_bytes(), &salt)
			.map(|h| h.to_string())
			.ok()
	});
	if let Some(parsed) = hash.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
		let _ = argon2_instance().verify_password(candidate.as_bytes(), &parsed);
	}
	false
}
