// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Post-commit notifications.
//!
//! Flows emit these only after their unit of work committed. Delivery is
//! fire-and-forget: [`EventSink::notify`] never blocks the flow and its
//! failures never fail it.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::{PrincipalId, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCreateReason {
	Signup,
	Login,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
	UserCreated {
		user_id: UserId,
		principal_ids: Vec<PrincipalId>,
	},
	IdentityCreated {
		user_id: UserId,
		principal_id: PrincipalId,
		provider_id: String,
	},
	SessionCreated {
		user_id: UserId,
		principal_id: PrincipalId,
		session_id: SessionId,
		reason: SessionCreateReason,
	},
	/// The user's profile or claims changed and downstream copies should
	/// be refreshed.
	UserSync { user_id: UserId },
	WelcomeEmail { user_id: UserId, email: String },
	VerifyCode {
		user_id: UserId,
		login_id_key: String,
		login_id: String,
	},
}

impl AuthEvent {
	pub fn name(&self) -> &'static str {
		match self {
			AuthEvent::UserCreated { .. } => "user_create",
			AuthEvent::IdentityCreated { .. } => "identity_create",
			AuthEvent::SessionCreated { .. } => "session_create",
			AuthEvent::UserSync { .. } => "user_sync",
			AuthEvent::WelcomeEmail { .. } => "welcome_email",
			AuthEvent::VerifyCode { .. } => "verify_code",
		}
	}
}

pub trait EventSink: Send + Sync {
	fn notify(&self, event: AuthEvent);
}

pub struct NoopEventSink;

impl EventSink for NoopEventSink {
	fn notify(&self, _event: AuthEvent) {}
}

/// Keeps every event in memory. Used by tests of the flows.
#[derive(Default)]
pub struct RecordingEventSink {
	events: Mutex<Vec<AuthEvent>>,
}

impl RecordingEventSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<AuthEvent> {
		self.events.lock().map(|e| e.clone()).unwrap_or_default()
	}

	pub fn names(&self) -> Vec<&'static str> {
		self.events().iter().map(AuthEvent::name).collect()
	}
}

impl EventSink for RecordingEventSink {
	fn notify(&self, event: AuthEvent) {
		if let Ok(mut events) = self.events.lock() {
			events.push(event);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recording_sink_keeps_order() {
		let sink = RecordingEventSink::new();
		let user_id = UserId::generate();
		sink.notify(AuthEvent::UserSync { user_id });
		sink.notify(AuthEvent::WelcomeEmail {
			user_id,
			email: "jane@example.com".to_string(),
		});
		assert_eq!(sink.names(), vec!["user_sync", "welcome_email"]);
	}

	#[test]
	fn serializes_with_event_tag() {
		let user_id = UserId::generate();
		let json = serde_json::to_value(AuthEvent::UserSync { user_id }).unwrap();
		assert_eq!(json["event"], "user_sync");
		assert_eq!(json["user_id"], user_id.to_string());
	}
}
