// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication error taxonomy.
//!
//! Every variant maps to a stable [`AuthError::kind`] string. Store failures
//! render a generic message; the underlying cause is kept as the error
//! source for logging only.

use aegis_common_signing::SigningError;
use thiserror::Error;

use crate::PrincipalId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Session Errors
	// =========================================================================
	/// Unknown session id, wrong secret or malformed token. Callers cannot
	/// tell these apart.
	#[error("session not found")]
	SessionNotFound,

	// =========================================================================
	// Identity Errors
	// =========================================================================
	#[error("user duplicated")]
	DuplicateUser,

	#[error("invalid credentials")]
	InvalidCredentials,

	#[error("user disabled")]
	UserDisabled,

	#[error("principal not found: {0}")]
	PrincipalNotFound(PrincipalId),

	/// The third-party provider rejected or could not verify the access token.
	#[error("external authentication failed: {0}")]
	ExternalAuthFailed(String),

	// =========================================================================
	// Signing Errors
	// =========================================================================
	#[error("invalid signature")]
	InvalidSignature,

	#[error("expired signature")]
	ExpiredSignature,

	// =========================================================================
	// Input Errors
	// =========================================================================
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	// =========================================================================
	// Internal Errors
	// =========================================================================
	#[error("store error")]
	Store(#[source] BoxError),

	#[error("password hashing failed")]
	Hashing(String),
}

impl AuthError {
	pub fn store(err: impl Into<BoxError>) -> Self {
		AuthError::Store(err.into())
	}

	/// Stable machine-readable name for the error kind.
	pub fn kind(&self) -> &'static str {
		match self {
			AuthError::SessionNotFound => "session_not_found",
			AuthError::DuplicateUser => "duplicate_user",
			AuthError::InvalidCredentials => "invalid_credentials",
			AuthError::UserDisabled => "user_disabled",
			AuthError::PrincipalNotFound(_) => "principal_not_found",
			AuthError::ExternalAuthFailed(_) => "external_auth_failed",
			AuthError::InvalidSignature => "invalid_signature",
			AuthError::ExpiredSignature => "expired_signature",
			AuthError::InvalidArgument(_) => "invalid_argument",
			AuthError::Store(_) | AuthError::Hashing(_) => "store_error",
		}
	}

	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(self, AuthError::Store(_) | AuthError::Hashing(_))
	}

	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::SessionNotFound
			| AuthError::InvalidCredentials
			| AuthError::ExternalAuthFailed(_)
			| AuthError::InvalidSignature
			| AuthError::ExpiredSignature => 401,

			AuthError::UserDisabled => 403,

			AuthError::PrincipalNotFound(_) => 404,

			AuthError::DuplicateUser => 409,

			AuthError::InvalidArgument(_) => 400,

			AuthError::Store(_) | AuthError::Hashing(_) => 500,
		}
	}
}

impl From<SigningError> for AuthError {
	fn from(err: SigningError) -> Self {
		match err {
			SigningError::InvalidSignature => AuthError::InvalidSignature,
			SigningError::ExpiredSignature => AuthError::ExpiredSignature,
			SigningError::MalformedUri(msg) => AuthError::InvalidArgument(msg),
		}
	}
}
