// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PrincipalId, UserId};

/// A principal with no login id or secret. The principal id is the only
/// correlation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousPrincipal {
	pub id: PrincipalId,
	pub user_id: UserId,
	pub created_at: DateTime<Utc>,
}

impl AnonymousPrincipal {
	pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
		Self {
			id: PrincipalId::generate(),
			user_id,
			created_at: now,
		}
	}
}
