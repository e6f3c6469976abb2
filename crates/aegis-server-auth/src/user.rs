// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A local user. Principals and sessions reference it by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub last_login_at: Option<DateTime<Utc>>,
	pub disabled: bool,
}

impl User {
	pub fn new(now: DateTime<Utc>) -> Self {
		Self {
			id: UserId::generate(),
			created_at: now,
			updated_at: now,
			last_login_at: None,
			disabled: false,
		}
	}

	pub fn record_login(&mut self, now: DateTime<Utc>) {
		self.last_login_at = Some(now);
		self.updated_at = now;
	}
}
