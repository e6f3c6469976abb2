// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use aegis_server_auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("User disabled: {0}")]
	UserDisabled(String),

	/// A uniqueness constraint on principals was violated.
	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
	/// Map an insert failure, turning unique violations into `Conflict`.
	pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
		match &err {
			sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Conflict(what.to_string()),
			_ => DbError::Sqlx(err),
		}
	}
}

impl From<DbError> for AuthError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::Conflict(_) => AuthError::DuplicateUser,
			DbError::UserDisabled(_) => AuthError::UserDisabled,
			other => AuthError::store(other),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conflict_maps_to_duplicate_user() {
		let err: AuthError = DbError::Conflict("login id".to_string()).into();
		assert!(matches!(err, AuthError::DuplicateUser));
	}

	#[test]
	fn disabled_maps_to_user_disabled() {
		let err: AuthError = DbError::UserDisabled("user 1".to_string()).into();
		assert!(matches!(err, AuthError::UserDisabled));
	}

	#[test]
	fn other_errors_map_to_store() {
		let err: AuthError = DbError::Internal("pool closed".to_string()).into();
		assert!(matches!(err, AuthError::Store(_)));
		assert_eq!(err.to_string(), "store error");
	}
}
