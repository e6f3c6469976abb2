// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier newtypes and small shared enums.
//!
//! All id types serialize transparently as UUID strings and parse with
//! [`std::str::FromStr`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::AuthError;

/// Realm used when a caller does not name one.
pub const DEFAULT_REALM: &str = "default";

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			pub fn into_inner(self) -> Uuid {
				self.0
			}

			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(SessionId, "Unique identifier for a session. Never reused.");
define_id_type!(
	PrincipalId,
	"Unique identifier for a principal, unique across every login mechanism."
);

/// What an SSO login does when the external identity's claims match a
/// password principal belonging to another user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnUserDuplicate {
	/// Fail with [`AuthError::DuplicateUser`].
	#[default]
	#[serde(alias = "abort")]
	Reject,
	/// Attach the external identity to the existing user.
	Merge,
	/// Ignore the match and create a fresh user.
	CreateNew,
}

impl fmt::Display for OnUserDuplicate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OnUserDuplicate::Reject => write!(f, "reject"),
			OnUserDuplicate::Merge => write!(f, "merge"),
			OnUserDuplicate::CreateNew => write!(f, "create_new"),
		}
	}
}

impl FromStr for OnUserDuplicate {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"" | "reject" | "abort" => Ok(OnUserDuplicate::Reject),
			"merge" => Ok(OnUserDuplicate::Merge),
			"create_new" | "create" => Ok(OnUserDuplicate::CreateNew),
			other => Err(AuthError::InvalidArgument(format!(
				"unknown on_user_duplicate policy: {other}"
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	mod ids {
		use super::*;

		#[test]
		fn parse_round_trips_display() {
			let id = SessionId::generate();
			let parsed: SessionId = id.to_string().parse().unwrap();
			assert_eq!(parsed, id);
		}

		#[test]
		fn parse_rejects_garbage() {
			assert!("not-a-session".parse::<SessionId>().is_err());
		}

		#[test]
		fn serializes_as_plain_uuid() {
			let id = UserId::generate();
			let json = serde_json::to_string(&id).unwrap();
			assert_eq!(json, format!("\"{id}\""));
		}
	}

	mod duplicate_policy {
		use super::*;

		#[test]
		fn defaults_to_reject() {
			assert_eq!(OnUserDuplicate::default(), OnUserDuplicate::Reject);
			assert_eq!("".parse::<OnUserDuplicate>().unwrap(), OnUserDuplicate::Reject);
		}

		#[test]
		fn accepts_abort_alias() {
			assert_eq!("abort".parse::<OnUserDuplicate>().unwrap(), OnUserDuplicate::Reject);
			let parsed: OnUserDuplicate = serde_json::from_str("\"abort\"").unwrap();
			assert_eq!(parsed, OnUserDuplicate::Reject);
		}

		#[test]
		fn parses_display_form() {
			for policy in [OnUserDuplicate::Reject, OnUserDuplicate::Merge, OnUserDuplicate::CreateNew] {
				assert_eq!(policy.to_string().parse::<OnUserDuplicate>().unwrap(), policy);
			}
		}

		#[test]
		fn rejects_unknown_policy() {
			let err = "replace".parse::<OnUserDuplicate>().unwrap_err();
			assert!(matches!(err, AuthError::InvalidArgument(_)));
		}
	}
}
