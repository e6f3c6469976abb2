// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

/// Shortest accepted session secret, in random bytes.
pub const MIN_SECRET_BYTES: usize = 16;
const DEFAULT_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	pub secret_bytes: usize,
	pub refresh_token_enabled: bool,
}

impl Default for SessionConfig {
	fn default() -> Self {
		SessionConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfigLayer {
	#[serde(default)]
	pub secret_bytes: Option<usize>,
	#[serde(default)]
	pub refresh_token_enabled: Option<bool>,
}

impl SessionConfigLayer {
	pub fn merge(&mut self, other: SessionConfigLayer) {
		if other.secret_bytes.is_some() {
			self.secret_bytes = other.secret_bytes;
		}
		if other.refresh_token_enabled.is_some() {
			self.refresh_token_enabled = other.refresh_token_enabled;
		}
	}

	pub fn finalize(self) -> SessionConfig {
		SessionConfig {
			secret_bytes: self.secret_bytes.unwrap_or(DEFAULT_SECRET_BYTES),
			refresh_token_enabled: self.refresh_token_enabled.unwrap_or(false),
		}
	}
}
